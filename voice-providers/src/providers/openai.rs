/// OpenAI chat completions as a conversational LLM
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capability::{Capability, Language, ProviderName};
use crate::cleanup::{clean_generated_text, limit_questions};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::gemini::MAX_QUESTIONS_PER_REPLY;
use crate::providers::{http, LlmAdapter};
use crate::screening::summary_prompt;
use crate::transcription::{Speaker, Turn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiLlmProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: String,
}

impl OpenAiLlmProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            system_prompt: system_prompt.into(),
        }
    }

    fn messages(&self, history: &[Turn], language: Language) -> Vec<ChatMessage> {
        let system = ChatMessage {
            role: "system".to_string(),
            content: Some(format!(
                "{}\n\nThe user is speaking {}.",
                self.system_prompt,
                language.english_name()
            )),
        };
        std::iter::once(system)
            .chain(history.iter().map(|turn| ChatMessage {
                role: match turn.speaker {
                    Speaker::User => "user",
                    Speaker::Agent => "assistant",
                }
                .to_string(),
                content: Some(turn.text.clone()),
            }))
            .collect()
    }

    async fn complete(&self, messages: Vec<ChatMessage>, temperature: f32) -> ProviderResult<String> {
        let (provider, capability) = (ProviderName::OpenAi, Capability::Llm);
        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: 500,
            temperature,
        };
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        let response: ChatResponse = http::send_json(provider, capability, request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::empty_result(provider, capability, "no choices returned"))
    }
}

#[async_trait]
impl LlmAdapter for OpenAiLlmProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::OpenAi
    }

    async fn reply(&self, history: &[Turn], language: Language) -> ProviderResult<String> {
        let (provider, capability) = (ProviderName::OpenAi, Capability::Llm);
        if history.is_empty() {
            return Err(ProviderError::invalid_input(provider, capability, "history is empty"));
        }

        info!(provider = %provider, history_turns = history.len(), language = %language, "Generating reply");

        let raw = self.complete(self.messages(history, language), 0.7).await?;
        Ok(limit_questions(&clean_generated_text(&raw), MAX_QUESTIONS_PER_REPLY))
    }

    async fn summarize(&self, history: &[Turn]) -> ProviderResult<String> {
        let prompt = ChatMessage {
            role: "user".to_string(),
            content: Some(summary_prompt(history)),
        };
        let summary = self.complete(vec![prompt], 0.3).await?;
        Ok(summary.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_leads_and_roles_alternate() {
        let llm = OpenAiLlmProvider::new(reqwest::Client::new(), "key", DEFAULT_BASE_URL, DEFAULT_MODEL, "Be brief.");
        let history = vec![Turn::user("hello", Language::En), Turn::agent("hi", Language::En)];
        let messages = llm.messages(&history, Language::En);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert!(messages[0].content.as_deref().unwrap().starts_with("Be brief."));
    }
}
