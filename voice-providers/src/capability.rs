use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical capability an adapter provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Stt,
    Translate,
    Tts,
    Llm,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Stt,
        Capability::Translate,
        Capability::Tts,
        Capability::Llm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Stt => "stt",
            Capability::Translate => "translate",
            Capability::Tts => "tts",
            Capability::Llm => "llm",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor behind an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderName {
    #[serde(rename = "sarvam")]
    Sarvam,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderName {
    pub const ALL: [ProviderName; 5] = [
        ProviderName::Sarvam,
        ProviderName::Google,
        ProviderName::ElevenLabs,
        ProviderName::Gemini,
        ProviderName::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Sarvam => "sarvam",
            ProviderName::Google => "google",
            ProviderName::ElevenLabs => "elevenlabs",
            ProviderName::Gemini => "gemini",
            ProviderName::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised provider name '{0}'")]
pub struct ParseProviderError(pub String);

impl FromStr for ProviderName {
    type Err = ParseProviderError;

    /// Case-insensitive and exact; typos are rejected rather than defaulted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        ProviderName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| ParseProviderError(s.to_string()))
    }
}

/// Supported language codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ta,
    En,
    Hi,
    Bn,
    Gu,
    Kn,
    Ml,
    Mr,
    Or,
    Pa,
    Te,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::Ta,
        Language::En,
        Language::Hi,
        Language::Bn,
        Language::Gu,
        Language::Kn,
        Language::Ml,
        Language::Mr,
        Language::Or,
        Language::Pa,
        Language::Te,
    ];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ta => "ta",
            Language::En => "en",
            Language::Hi => "hi",
            Language::Bn => "bn",
            Language::Gu => "gu",
            Language::Kn => "kn",
            Language::Ml => "ml",
            Language::Mr => "mr",
            Language::Or => "or",
            Language::Pa => "pa",
            Language::Te => "te",
        }
    }

    /// Indian-region BCP-47 tag, e.g. `ta-IN`
    pub fn regional_tag(&self) -> String {
        format!("{}-IN", self.code())
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::Ta => "Tamil",
            Language::En => "English",
            Language::Hi => "Hindi",
            Language::Bn => "Bengali",
            Language::Gu => "Gujarati",
            Language::Kn => "Kannada",
            Language::Ml => "Malayalam",
            Language::Mr => "Marathi",
            Language::Or => "Odia",
            Language::Pa => "Punjabi",
            Language::Te => "Telugu",
        }
    }

    pub fn is_english(&self) -> bool {
        matches!(self, Language::En)
    }

    fn from_iso639_3(code: &str) -> Option<Self> {
        let lang = match code {
            "tam" => Language::Ta,
            "eng" => Language::En,
            "hin" => Language::Hi,
            "ben" => Language::Bn,
            "guj" => Language::Gu,
            "kan" => Language::Kn,
            "mal" => Language::Ml,
            "mar" => Language::Mr,
            "ori" | "ory" => Language::Or,
            "pan" => Language::Pa,
            "tel" => Language::Te,
            _ => return None,
        };
        Some(lang)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language code '{0}'")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    /// Accepts `ta`, `ta-IN`, `tam` and English names such as `tamil`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let primary = lowered.split(['-', '_']).next().unwrap_or_default();

        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == primary || lang.english_name().eq_ignore_ascii_case(primary))
            .or_else(|| Language::from_iso639_3(primary))
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}

/// Language hint passed to speech-to-text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageHint {
    #[default]
    Auto,
    Fixed(Language),
}

impl LanguageHint {
    pub fn language(&self) -> Option<Language> {
        match self {
            LanguageHint::Auto => None,
            LanguageHint::Fixed(lang) => Some(*lang),
        }
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageHint::Auto => f.write_str("auto"),
            LanguageHint::Fixed(lang) => lang.fmt(f),
        }
    }
}

impl FromStr for LanguageHint {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" | "unknown" => Ok(LanguageHint::Auto),
            _ => s.parse().map(LanguageHint::Fixed),
        }
    }
}

/// True when any character falls in the Tamil Unicode block
pub fn contains_tamil_script(text: &str) -> bool {
    text.chars().any(|c| ('\u{0B80}'..='\u{0BFF}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!("Sarvam".parse::<ProviderName>(), Ok(ProviderName::Sarvam));
        assert_eq!(" elevenlabs ".parse::<ProviderName>(), Ok(ProviderName::ElevenLabs));
        assert_eq!("openai".parse::<ProviderName>(), Ok(ProviderName::OpenAi));
    }

    #[test]
    fn provider_name_typos_fail_closed() {
        assert!("sarvamm".parse::<ProviderName>().is_err());
        assert!("google_fallback".parse::<ProviderName>().is_err());
        assert!("".parse::<ProviderName>().is_err());
    }

    #[test]
    fn provider_names_round_trip_through_display() {
        for name in ProviderName::ALL {
            assert_eq!(name.to_string().parse::<ProviderName>(), Ok(name));
        }
    }

    #[test]
    fn languages_accept_regional_and_three_letter_codes() {
        assert_eq!("ta-IN".parse::<Language>(), Ok(Language::Ta));
        assert_eq!("en-US".parse::<Language>(), Ok(Language::En));
        assert_eq!("tam".parse::<Language>(), Ok(Language::Ta));
        assert_eq!("Tamil".parse::<Language>(), Ok(Language::Ta));
        assert_eq!("ory".parse::<Language>(), Ok(Language::Or));
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!("fr".parse::<Language>().is_err());
        assert!("xx-IN".parse::<Language>().is_err());
    }

    #[test]
    fn language_hint_auto_aliases() {
        assert_eq!("auto".parse::<LanguageHint>(), Ok(LanguageHint::Auto));
        assert_eq!("unknown".parse::<LanguageHint>(), Ok(LanguageHint::Auto));
        assert_eq!("ta".parse::<LanguageHint>(), Ok(LanguageHint::Fixed(Language::Ta)));
    }

    #[test]
    fn detects_tamil_script() {
        assert!(contains_tamil_script("வணக்கம் doctor"));
        assert!(!contains_tamil_script("hello doctor"));
    }
}
