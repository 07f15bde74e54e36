/// Google Gemini `generateContent` adapters for translation and conversation
///
/// Translation into Tamil asks for colloquial, spoken Tamil that keeps common
/// English terms, which reads more naturally when synthesised than the
/// literary register Google Translate produces.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capability::{Capability, Language, ProviderName};
use crate::cleanup::{clean_generated_text, limit_questions};
use crate::error::{ProviderError, ProviderResult};
use crate::providers::{http, LlmAdapter, TranslateAdapter};
use crate::screening::summary_prompt;
use crate::transcription::{Speaker, Turn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Spoken replies ask at most this many questions
pub const MAX_QUESTIONS_PER_REPLY: usize = 2;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Thin client shared by both Gemini adapters
struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    async fn generate(
        &self,
        capability: Capability,
        request: &GenerateContentRequest,
    ) -> ProviderResult<String> {
        let provider = ProviderName::Gemini;
        let http_request = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(request);

        let body: GenerateContentResponse = http::send_json(provider, capability, http_request).await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::empty_result(provider, capability, "no candidates returned"));
        }
        Ok(text)
    }
}

fn translation_prompt(text: &str, source: Language, target: Language) -> String {
    if target == Language::Ta {
        format!(
            "Translate the following {} text into natural, colloquial spoken Tamil with a warm, \
             respectful tone. Keep common English and medical terms in English. Write Tamil words \
             in Tamil script. Reply with the translation only.\n\nText: \"{}\"",
            source.english_name(),
            text
        )
    } else {
        format!(
            "Translate the following {} text into {}. Reply with the translation only.\n\nText: \"{}\"",
            source.english_name(),
            target.english_name(),
            text
        )
    }
}

pub struct GeminiTranslateProvider {
    inner: GeminiClient,
}

impl GeminiTranslateProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            inner: GeminiClient {
                client,
                api_key: api_key.into(),
                base_url: base_url.into(),
                model: model.into(),
            },
        }
    }
}

#[async_trait]
impl TranslateAdapter for GeminiTranslateProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::Gemini
    }

    async fn translate(&self, text: &str, source: Language, target: Language) -> ProviderResult<String> {
        let capability = Capability::Translate;
        if text.trim().is_empty() {
            return Err(ProviderError::invalid_input(ProviderName::Gemini, capability, "text is empty"));
        }

        info!(
            provider = "gemini",
            source = %source,
            target = %target,
            text_chars = text.chars().count(),
            "Starting translation"
        );

        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), translation_prompt(text, source, target))],
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 2048,
            },
        };
        let raw = self.inner.generate(capability, &request).await?;
        Ok(clean_generated_text(&raw))
    }
}

pub struct GeminiLlmProvider {
    inner: GeminiClient,
    system_prompt: String,
}

impl GeminiLlmProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            inner: GeminiClient {
                client,
                api_key: api_key.into(),
                base_url: base_url.into(),
                model: model.into(),
            },
            system_prompt: system_prompt.into(),
        }
    }

    fn build_request(&self, history: &[Turn], language: Language) -> GenerateContentRequest {
        let contents = history
            .iter()
            .map(|turn| {
                let role = match turn.speaker {
                    Speaker::User => "user",
                    Speaker::Agent => "model",
                };
                Content::text(Some(role), turn.text.clone())
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(
                None,
                format!(
                    "{}\n\nThe user is speaking {}.",
                    self.system_prompt,
                    language.english_name()
                ),
            )),
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 500,
            },
        }
    }
}

/// One-shot request outside the conversation persona
fn summary_request(history: &[Turn]) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text(Some("user"), summary_prompt(history))],
        system_instruction: None,
        generation_config: GenerationConfig {
            temperature: 0.3,
            max_output_tokens: 500,
        },
    }
}

#[async_trait]
impl LlmAdapter for GeminiLlmProvider {
    fn provider(&self) -> ProviderName {
        ProviderName::Gemini
    }

    async fn reply(&self, history: &[Turn], language: Language) -> ProviderResult<String> {
        let capability = Capability::Llm;
        if history.is_empty() {
            return Err(ProviderError::invalid_input(ProviderName::Gemini, capability, "history is empty"));
        }

        info!(provider = "gemini", history_turns = history.len(), language = %language, "Generating reply");
        let raw = self.inner.generate(capability, &self.build_request(history, language)).await?;
        let reply = limit_questions(&clean_generated_text(&raw), MAX_QUESTIONS_PER_REPLY);
        info!(provider = "gemini", reply_chars = reply.chars().count(), "Reply generated");
        Ok(reply)
    }

    async fn summarize(&self, history: &[Turn]) -> ProviderResult<String> {
        info!(provider = "gemini", history_turns = history.len(), "Generating screening summary");
        let summary = self.inner.generate(Capability::Llm, &summary_request(history)).await?;
        Ok(summary.trim().to_string())
    }
}
