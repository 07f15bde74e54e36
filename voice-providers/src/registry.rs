//! Provider registry
//!
//! One [`ProviderTable`] per capability maps a [`ProviderName`] to a shared
//! adapter plus the capability's ordered fallback list. Tables are filled by
//! [`ProviderRegistryBuilder`] at start-up and are read-only afterwards.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::capability::{Capability, ProviderName};
use crate::error::{ProviderError, ProviderResult, RegistryError, UnknownProviderError};
use crate::providers::{LlmAdapter, SttAdapter, TranslateAdapter, TtsAdapter};

/// Result of a fallback chain
#[derive(Debug)]
pub struct FallbackOutcome<T> {
    pub value: T,
    /// Provider whose call succeeded
    pub provider: ProviderName,
    /// Failures from providers tried before `provider`, in order
    pub failures: Vec<ProviderError>,
}

impl<T> FallbackOutcome<T> {
    pub fn fallback_used(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct ProviderTable<A: ?Sized> {
    capability: Capability,
    adapters: BTreeMap<ProviderName, Arc<A>>,
    fallback: Vec<ProviderName>,
}

impl<A: ?Sized + Send + Sync> ProviderTable<A> {
    fn new(capability: Capability) -> Self {
        Self {
            capability,
            adapters: BTreeMap::new(),
            fallback: Vec::new(),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Look up the adapter registered under `name`
    pub fn resolve(&self, name: ProviderName) -> Result<Arc<A>, UnknownProviderError> {
        self.adapters
            .get(&name)
            .cloned()
            .ok_or_else(|| UnknownProviderError::new(self.capability, name.as_str()))
    }

    /// Parse and resolve a client-supplied provider string
    pub fn resolve_named(&self, name: &str) -> Result<(ProviderName, Arc<A>), UnknownProviderError> {
        let parsed: ProviderName = name
            .parse()
            .map_err(|_| UnknownProviderError::new(self.capability, name))?;
        Ok((parsed, self.resolve(parsed)?))
    }

    pub fn contains(&self, name: ProviderName) -> bool {
        self.adapters.contains_key(&name)
    }

    pub fn names(&self) -> Vec<ProviderName> {
        self.adapters.keys().copied().collect()
    }

    pub fn fallback_order(&self) -> &[ProviderName] {
        &self.fallback
    }

    /// `requested` followed by the configured fallbacks, without duplicates
    pub fn chain(&self, requested: ProviderName) -> Vec<ProviderName> {
        let mut chain = vec![requested];
        for name in &self.fallback {
            if !chain.contains(name) {
                chain.push(*name);
            }
        }
        chain
    }

    /// Try `call` against each provider in `names` until one succeeds.
    ///
    /// Every name is resolved before the first call, so an unregistered name
    /// fails without any vendor traffic. The chain moves on only for provider
    /// errors whose kind falls through; the last provider's error is returned
    /// when all fail.
    pub async fn resolve_with_fallback<T, F, Fut>(
        &self,
        names: &[ProviderName],
        mut call: F,
    ) -> Result<FallbackOutcome<T>, RegistryError>
    where
        F: FnMut(Arc<A>) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let adapters = names
            .iter()
            .map(|name| self.resolve(*name).map(|adapter| (*name, adapter)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut failures: Vec<ProviderError> = Vec::new();
        let mut remaining = adapters.len();
        for (name, adapter) in adapters {
            remaining -= 1;
            match call(adapter).await {
                Ok(value) => {
                    return Ok(FallbackOutcome {
                        value,
                        provider: name,
                        failures,
                    })
                }
                Err(err) if err.kind.falls_through() && remaining > 0 => {
                    warn!(
                        capability = %self.capability,
                        provider = %name,
                        kind = err.kind.as_str(),
                        error = %err,
                        "Provider failed, trying next in chain"
                    );
                    failures.push(err);
                }
                Err(err) => return Err(RegistryError::Provider(err)),
            }
        }

        Err(RegistryError::EmptyChain(self.capability))
    }
}

/// Typed adapter handed to [`ProviderRegistryBuilder::register`]
#[derive(Clone)]
pub enum Adapter {
    Stt(Arc<dyn SttAdapter>),
    Translate(Arc<dyn TranslateAdapter>),
    Tts(Arc<dyn TtsAdapter>),
    Llm(Arc<dyn LlmAdapter>),
}

impl Adapter {
    pub fn capability(&self) -> Capability {
        match self {
            Adapter::Stt(_) => Capability::Stt,
            Adapter::Translate(_) => Capability::Translate,
            Adapter::Tts(_) => Capability::Tts,
            Adapter::Llm(_) => Capability::Llm,
        }
    }
}

/// Immutable mapping from `(Capability, ProviderName)` to adapters
pub struct ProviderRegistry {
    stt: ProviderTable<dyn SttAdapter>,
    translate: ProviderTable<dyn TranslateAdapter>,
    tts: ProviderTable<dyn TtsAdapter>,
    llm: ProviderTable<dyn LlmAdapter>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn stt(&self) -> &ProviderTable<dyn SttAdapter> {
        &self.stt
    }

    pub fn translate(&self) -> &ProviderTable<dyn TranslateAdapter> {
        &self.translate
    }

    pub fn tts(&self) -> &ProviderTable<dyn TtsAdapter> {
        &self.tts
    }

    pub fn llm(&self) -> &ProviderTable<dyn LlmAdapter> {
        &self.llm
    }

    /// Capability-generic lookup
    pub fn resolve(&self, capability: Capability, name: ProviderName) -> Result<Adapter, UnknownProviderError> {
        Ok(match capability {
            Capability::Stt => Adapter::Stt(self.stt.resolve(name)?),
            Capability::Translate => Adapter::Translate(self.translate.resolve(name)?),
            Capability::Tts => Adapter::Tts(self.tts.resolve(name)?),
            Capability::Llm => Adapter::Llm(self.llm.resolve(name)?),
        })
    }

    pub fn registered(&self, capability: Capability) -> Vec<ProviderName> {
        match capability {
            Capability::Stt => self.stt.names(),
            Capability::Translate => self.translate.names(),
            Capability::Tts => self.tts.names(),
            Capability::Llm => self.llm.names(),
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("stt", &self.stt.names())
            .field("translate", &self.translate.names())
            .field("tts", &self.tts.names())
            .field("llm", &self.llm.names())
            .finish()
    }
}

pub struct ProviderRegistryBuilder {
    stt: ProviderTable<dyn SttAdapter>,
    translate: ProviderTable<dyn TranslateAdapter>,
    tts: ProviderTable<dyn TtsAdapter>,
    llm: ProviderTable<dyn LlmAdapter>,
}

impl Default for ProviderRegistryBuilder {
    fn default() -> Self {
        Self {
            stt: ProviderTable::new(Capability::Stt),
            translate: ProviderTable::new(Capability::Translate),
            tts: ProviderTable::new(Capability::Tts),
            llm: ProviderTable::new(Capability::Llm),
        }
    }
}

impl ProviderRegistryBuilder {
    /// Register `adapter` under `name` for the adapter's capability; a later registration replaces an earlier one
    pub fn register(mut self, name: ProviderName, adapter: Adapter) -> Self {
        match adapter {
            Adapter::Stt(a) => {
                self.stt.adapters.insert(name, a);
            }
            Adapter::Translate(a) => {
                self.translate.adapters.insert(name, a);
            }
            Adapter::Tts(a) => {
                self.tts.adapters.insert(name, a);
            }
            Adapter::Llm(a) => {
                self.llm.adapters.insert(name, a);
            }
        }
        self
    }

    pub fn stt(self, adapter: Arc<dyn SttAdapter>) -> Self {
        let name = adapter.provider();
        self.register(name, Adapter::Stt(adapter))
    }

    pub fn translate(self, adapter: Arc<dyn TranslateAdapter>) -> Self {
        let name = adapter.provider();
        self.register(name, Adapter::Translate(adapter))
    }

    pub fn tts(self, adapter: Arc<dyn TtsAdapter>) -> Self {
        let name = adapter.provider();
        self.register(name, Adapter::Tts(adapter))
    }

    pub fn llm(self, adapter: Arc<dyn LlmAdapter>) -> Self {
        let name = adapter.provider();
        self.register(name, Adapter::Llm(adapter))
    }

    /// Ordered providers tried after the requested one
    pub fn fallback(mut self, capability: Capability, order: Vec<ProviderName>) -> Self {
        match capability {
            Capability::Stt => self.stt.fallback = order,
            Capability::Translate => self.translate.fallback = order,
            Capability::Tts => self.tts.fallback = order,
            Capability::Llm => self.llm.fallback = order,
        }
        self
    }

    /// Freeze the registry, rejecting fallback lists that name unregistered providers
    pub fn build(self) -> Result<ProviderRegistry, RegistryError> {
        fn check<A: ?Sized + Send + Sync>(table: &ProviderTable<A>) -> Result<(), RegistryError> {
            match table.fallback.iter().find(|name| !table.contains(**name)) {
                Some(name) => Err(RegistryError::InvalidFallback {
                    capability: table.capability,
                    name: *name,
                }),
                None => Ok(()),
            }
        }

        check(&self.stt)?;
        check(&self.translate)?;
        check(&self.tts)?;
        check(&self.llm)?;

        Ok(ProviderRegistry {
            stt: self.stt,
            translate: self.translate,
            tts: self.tts,
            llm: self.llm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Language;
    use crate::error::ProviderErrorKind;
    use crate::fakes::{FakeLlm, FakeStt, FakeTranslate, FakeTts};
    use crate::transcription::{SttOptions, Transcription};
    use tokio_test::{assert_err, assert_ok};

    fn transcript(text: &str) -> Transcription {
        Transcription {
            text: text.to_string(),
            language: Language::Ta,
            confidence: 0.9,
            timestamps: None,
        }
    }

    #[test]
    fn resolve_returns_the_exact_registered_adapter() {
        let sarvam = Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("a")));
        let google = Arc::new(FakeStt::new(ProviderName::Google, transcript("b")));
        let translate = Arc::new(FakeTranslate::new(ProviderName::Google));
        let tts = Arc::new(FakeTts::new(ProviderName::ElevenLabs));
        let llm = Arc::new(FakeLlm::new(ProviderName::Gemini));

        let sarvam_dyn: Arc<dyn SttAdapter> = sarvam.clone();
        let google_dyn: Arc<dyn SttAdapter> = google.clone();
        let translate_dyn: Arc<dyn TranslateAdapter> = translate.clone();
        let tts_dyn: Arc<dyn TtsAdapter> = tts.clone();
        let llm_dyn: Arc<dyn LlmAdapter> = llm.clone();

        let registry = ProviderRegistry::builder()
            .stt(sarvam_dyn.clone())
            .stt(google_dyn.clone())
            .translate(translate_dyn.clone())
            .tts(tts_dyn.clone())
            .llm(llm_dyn.clone())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&registry.stt().resolve(ProviderName::Sarvam).unwrap(), &sarvam_dyn));
        assert!(Arc::ptr_eq(&registry.stt().resolve(ProviderName::Google).unwrap(), &google_dyn));
        assert!(Arc::ptr_eq(&registry.translate().resolve(ProviderName::Google).unwrap(), &translate_dyn));
        assert!(Arc::ptr_eq(&registry.tts().resolve(ProviderName::ElevenLabs).unwrap(), &tts_dyn));
        assert!(Arc::ptr_eq(&registry.llm().resolve(ProviderName::Gemini).unwrap(), &llm_dyn));
    }

    #[test]
    fn every_unregistered_pair_fails_closed() {
        let registry = ProviderRegistry::builder()
            .stt(Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("a"))))
            .tts(Arc::new(FakeTts::new(ProviderName::ElevenLabs)))
            .build()
            .unwrap();

        for capability in Capability::ALL {
            let registered = registry.registered(capability);
            for name in ProviderName::ALL {
                let resolved = registry.resolve(capability, name);
                if registered.contains(&name) {
                    assert_eq!(resolved.ok().map(|a| a.capability()), Some(capability));
                } else {
                    let err = resolved.err().unwrap();
                    assert_eq!(err, UnknownProviderError::new(capability, name.as_str()));
                }
            }
        }
    }

    #[test]
    fn resolve_named_rejects_typos() {
        let registry = ProviderRegistry::builder()
            .stt(Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("a"))))
            .build()
            .unwrap();

        let name = assert_ok!(registry.stt().resolve_named("Sarvam").map(|(name, _)| name));
        assert_eq!(name, ProviderName::Sarvam);
        let err = assert_err!(registry.stt().resolve_named("sarvm").map(|(name, _)| name));
        assert_eq!(err.name, "sarvm");
        assert_eq!(err.capability, Capability::Stt);
    }

    #[test]
    fn build_rejects_fallback_to_unregistered_provider() {
        let result = ProviderRegistry::builder()
            .stt(Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("a"))))
            .fallback(Capability::Stt, vec![ProviderName::Google])
            .build();

        assert_eq!(
            result.err(),
            Some(RegistryError::InvalidFallback {
                capability: Capability::Stt,
                name: ProviderName::Google
            })
        );
    }

    #[test]
    fn chain_puts_requested_first_without_duplicates() {
        let registry = ProviderRegistry::builder()
            .stt(Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("a"))))
            .stt(Arc::new(FakeStt::new(ProviderName::Google, transcript("b"))))
            .fallback(Capability::Stt, vec![ProviderName::Google])
            .build()
            .unwrap();

        assert_eq!(registry.stt().chain(ProviderName::Sarvam), vec![ProviderName::Sarvam, ProviderName::Google]);
        assert_eq!(registry.stt().chain(ProviderName::Google), vec![ProviderName::Google]);
    }

    async fn run_chain(registry: &ProviderRegistry, names: &[ProviderName]) -> Result<FallbackOutcome<Transcription>, RegistryError> {
        let options = SttOptions::default();
        registry
            .stt()
            .resolve_with_fallback(names, |stt| {
                let options = options.clone();
                async move { stt.transcribe(b"audio-bytes", &options).await }
            })
            .await
    }

    #[tokio::test]
    async fn provider_error_falls_through_to_next() {
        let sarvam = Arc::new(FakeStt::failing(ProviderName::Sarvam, ProviderErrorKind::Network));
        let google = Arc::new(FakeStt::new(ProviderName::Google, transcript("from google")));
        let registry = ProviderRegistry::builder()
            .stt(sarvam.clone())
            .stt(google.clone())
            .build()
            .unwrap();

        let outcome = run_chain(&registry, &[ProviderName::Sarvam, ProviderName::Google]).await.unwrap();

        assert_eq!(outcome.provider, ProviderName::Google);
        assert_eq!(outcome.value.text, "from google");
        assert!(outcome.fallback_used());
        assert_eq!(sarvam.calls(), 1);
        assert_eq!(google.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_input_stops_the_chain() {
        let sarvam = Arc::new(FakeStt::failing(ProviderName::Sarvam, ProviderErrorKind::InvalidInput));
        let google = Arc::new(FakeStt::new(ProviderName::Google, transcript("unused")));
        let registry = ProviderRegistry::builder()
            .stt(sarvam.clone())
            .stt(google.clone())
            .build()
            .unwrap();

        let err = run_chain(&registry, &[ProviderName::Sarvam, ProviderName::Google]).await.unwrap_err();

        assert!(matches!(err, RegistryError::Provider(e) if e.kind == ProviderErrorKind::InvalidInput));
        assert_eq!(google.calls(), 0);
    }

    #[tokio::test]
    async fn last_error_is_returned_when_all_fail() {
        let registry = ProviderRegistry::builder()
            .stt(Arc::new(FakeStt::failing(ProviderName::Sarvam, ProviderErrorKind::Network)))
            .stt(Arc::new(FakeStt::failing(ProviderName::Google, ProviderErrorKind::QuotaExceeded)))
            .build()
            .unwrap();

        let err = run_chain(&registry, &[ProviderName::Sarvam, ProviderName::Google]).await.unwrap_err();

        assert!(matches!(err, RegistryError::Provider(e) if e.provider == ProviderName::Google && e.is_quota_exceeded()));
    }

    #[tokio::test]
    async fn unknown_name_in_chain_fails_before_any_call() {
        let sarvam = Arc::new(FakeStt::new(ProviderName::Sarvam, transcript("unused")));
        let registry = ProviderRegistry::builder().stt(sarvam.clone()).build().unwrap();

        let err = run_chain(&registry, &[ProviderName::Sarvam, ProviderName::ElevenLabs]).await.unwrap_err();

        assert!(matches!(err, RegistryError::UnknownProvider(_)));
        assert_eq!(sarvam.calls(), 0);
    }

    #[tokio::test]
    async fn empty_chain_is_an_error() {
        let registry = ProviderRegistry::builder().build().unwrap();
        let err = run_chain(&registry, &[]).await.unwrap_err();
        assert_eq!(err, RegistryError::EmptyChain(Capability::Stt));
    }
}
