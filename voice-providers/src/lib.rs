//! Voice provider adapters for the Tamil Voice Gateway
//!
//! Wraps third-party speech-to-text, translation, text-to-speech and LLM
//! vendors behind one async trait per capability, and maps
//! `(Capability, ProviderName)` pairs to adapters through an immutable
//! [`ProviderRegistry`].
//!
//! # Providers
//!
//! | capability | providers |
//! |---|---|
//! | stt | Sarvam (`saarika:v2.5`), Google Cloud Speech, ElevenLabs |
//! | translate | Google Translate v2, Gemini (colloquial Tamil) |
//! | tts | ElevenLabs |
//! | llm | Gemini, OpenAI |
//!
//! Provider names are a closed enum. A name that is not registered for a
//! capability fails with [`UnknownProviderError`] instead of falling back to a
//! default.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use voice_providers::{LanguageHint, ProviderName, ProvidersConfig, SttOptions};
//!
//! # async fn example(audio: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProvidersConfig::from_env()?;
//! let registry = config.build_registry()?;
//!
//! let chain = registry.stt().chain(ProviderName::Sarvam);
//! let options = SttOptions { language: LanguageHint::Auto, timestamps: false };
//! let outcome = registry
//!     .stt()
//!     .resolve_with_fallback(&chain, |stt| {
//!         let audio = audio.clone();
//!         let options = options.clone();
//!         async move { stt.transcribe(&audio, &options).await }
//!     })
//!     .await?;
//!
//! println!("{} answered: {}", outcome.provider, outcome.value.text);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod providers;
pub mod registry;
pub mod screening;
pub mod transcription;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;

pub use capability::*;
pub use config::*;
pub use error::*;
pub use providers::{LlmAdapter, SttAdapter, TranslateAdapter, TtsAdapter};
pub use registry::*;
pub use screening::{ready_for_closure, ScreeningFindings, CLOSURE_MESSAGE};
pub use transcription::*;
