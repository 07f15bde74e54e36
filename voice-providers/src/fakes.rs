//! Recording in-memory adapters
//!
//! Each fake counts its calls and keeps the arguments it saw so tests can
//! assert on adapter traffic without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::capability::{Capability, Language, ProviderName};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::providers::{LlmAdapter, SttAdapter, TranslateAdapter, TtsAdapter};
use crate::transcription::{
    Speaker, SttOptions, SynthesisRequest, SynthesizedAudio, Transcription, Turn,
};

fn scripted_error(provider: ProviderName, capability: Capability, kind: ProviderErrorKind) -> ProviderError {
    ProviderError::new(provider, capability, kind, format!("scripted {} failure", kind.as_str()))
}

enum SttBehaviour {
    Fixed(Transcription),
    /// Audio bytes are read back as UTF-8 text in the given language
    Echo(Language),
    Fail(ProviderErrorKind),
}

pub struct FakeStt {
    name: ProviderName,
    behaviour: SttBehaviour,
    calls: AtomicUsize,
}

impl FakeStt {
    pub fn new(name: ProviderName, transcription: Transcription) -> Self {
        Self { name, behaviour: SttBehaviour::Fixed(transcription), calls: AtomicUsize::new(0) }
    }

    pub fn echo(name: ProviderName, language: Language) -> Self {
        Self { name, behaviour: SttBehaviour::Echo(language), calls: AtomicUsize::new(0) }
    }

    pub fn failing(name: ProviderName, kind: ProviderErrorKind) -> Self {
        Self { name, behaviour: SttBehaviour::Fail(kind), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SttAdapter for FakeStt {
    fn provider(&self) -> ProviderName {
        self.name
    }

    async fn transcribe(&self, audio: &[u8], _options: &SttOptions) -> ProviderResult<Transcription> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            SttBehaviour::Fixed(t) => Ok(t.clone()),
            SttBehaviour::Echo(language) => Ok(Transcription {
                text: String::from_utf8_lossy(audio).into_owned(),
                language: *language,
                confidence: 0.9,
                timestamps: None,
            }),
            SttBehaviour::Fail(kind) => Err(scripted_error(self.name, Capability::Stt, *kind)),
        }
    }
}

/// Recorded translate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateCall {
    pub text: String,
    pub source: Language,
    pub target: Language,
}

pub struct FakeTranslate {
    name: ProviderName,
    failure: Option<ProviderErrorKind>,
    calls: Mutex<Vec<TranslateCall>>,
}

impl FakeTranslate {
    /// Translates to `"[<target>] <text>"`
    pub fn new(name: ProviderName) -> Self {
        Self { name, failure: None, calls: Mutex::new(Vec::new()) }
    }

    pub fn failing(name: ProviderName, kind: ProviderErrorKind) -> Self {
        Self { name, failure: Some(kind), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<TranslateCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TranslateAdapter for FakeTranslate {
    fn provider(&self) -> ProviderName {
        self.name
    }

    async fn translate(&self, text: &str, source: Language, target: Language) -> ProviderResult<String> {
        self.calls.lock().push(TranslateCall { text: text.to_string(), source, target });
        match self.failure {
            Some(kind) => Err(scripted_error(self.name, Capability::Translate, kind)),
            None => Ok(format!("[{target}] {text}")),
        }
    }
}

pub struct FakeTts {
    name: ProviderName,
    failure: Option<ProviderErrorKind>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeTts {
    /// Returns `ID3` followed by the UTF-8 text
    pub fn new(name: ProviderName) -> Self {
        Self { name, failure: None, requests: Mutex::new(Vec::new()) }
    }

    pub fn failing(name: ProviderName, kind: ProviderErrorKind) -> Self {
        Self { name, failure: Some(kind), requests: Mutex::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl TtsAdapter for FakeTts {
    fn provider(&self) -> ProviderName {
        self.name
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> ProviderResult<SynthesizedAudio> {
        self.requests.lock().push(request.clone());
        if let Some(kind) = self.failure {
            return Err(scripted_error(self.name, Capability::Tts, kind));
        }
        let mut bytes = b"ID3".to_vec();
        bytes.extend_from_slice(request.text.as_bytes());
        Ok(SynthesizedAudio { bytes, mime_type: "audio/mpeg" })
    }
}

pub struct FakeLlm {
    name: ProviderName,
    failure: Option<ProviderErrorKind>,
    delay: Option<Duration>,
    fixed_reply: Option<String>,
    histories: Mutex<Vec<Vec<Turn>>>,
    summaries: Mutex<Vec<Vec<Turn>>>,
}

impl FakeLlm {
    /// Replies `"reply to: <latest user text>"`
    pub fn new(name: ProviderName) -> Self {
        Self {
            name,
            failure: None,
            delay: None,
            fixed_reply: None,
            histories: Mutex::new(Vec::new()),
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: ProviderName, kind: ProviderErrorKind) -> Self {
        Self { failure: Some(kind), ..Self::new(name) }
    }

    pub fn replying(name: ProviderName, reply: impl Into<String>) -> Self {
        Self { fixed_reply: Some(reply.into()), ..Self::new(name) }
    }

    /// Sleep before answering, to widen race windows in concurrency tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// History snapshot passed to each call
    pub fn histories(&self) -> Vec<Vec<Turn>> {
        self.histories.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.histories.lock().len()
    }

    /// History snapshot passed to each summary request
    pub fn summaries(&self) -> Vec<Vec<Turn>> {
        self.summaries.lock().clone()
    }
}

#[async_trait]
impl LlmAdapter for FakeLlm {
    fn provider(&self) -> ProviderName {
        self.name
    }

    async fn reply(&self, history: &[Turn], _language: Language) -> ProviderResult<String> {
        self.histories.lock().push(history.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(kind) = self.failure {
            return Err(scripted_error(self.name, Capability::Llm, kind));
        }
        if let Some(reply) = &self.fixed_reply {
            return Ok(reply.clone());
        }
        let latest = history
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::User)
            .map(|turn| turn.text.as_str())
            .unwrap_or_default();
        Ok(format!("reply to: {latest}"))
    }

    /// Summarises as `"summary: <patient messages joined by | >"`
    async fn summarize(&self, history: &[Turn]) -> ProviderResult<String> {
        self.summaries.lock().push(history.to_vec());
        if let Some(kind) = self.failure {
            return Err(scripted_error(self.name, Capability::Llm, kind));
        }
        Ok(format!("summary: {}", crate::screening::patient_messages(history).join(" | ")))
    }
}
