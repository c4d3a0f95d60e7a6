use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a conversation; one dialogue state per id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Returns `None` for blank input so callers can surface an unbound session.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Portuguese,
    English,
    Spanish,
    French,
    German,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Self::Portuguese,
        Self::English,
        Self::Spanish,
        Self::French,
        Self::German,
        Self::Chinese,
        Self::Japanese,
        Self::Korean,
    ];

    /// English name, as embedded into prompts ("Respond in the {name} language").
    pub fn name(&self) -> &'static str {
        match self {
            Self::Portuguese => "Portuguese",
            Self::English => "English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::German => "German",
            Self::Chinese => "Chinese",
            Self::Japanese => "Japanese",
            Self::Korean => "Korean",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Portuguese => "pt",
            Self::English => "en",
            Self::Spanish => "es",
            Self::French => "fr",
            Self::German => "de",
            Self::Chinese => "zh",
            Self::Japanese => "ja",
            Self::Korean => "ko",
        }
    }

    /// Opening line shown before the first user message.
    pub fn greeting(&self) -> &'static str {
        match self {
            Self::Portuguese => "Como eu posso ajudar?",
            Self::English => "How can I help?",
            Self::Spanish => "¿Cómo puedo ayudar?",
            Self::French => "Comment puis-je vous aider ?",
            Self::German => "Wie kann ich helfen?",
            Self::Chinese => "我能为您做些什么？",
            Self::Japanese => "どのようにお手伝いできますか？",
            Self::Korean => "무엇을 도와드릴까요?",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported language `{value}` (expected one of {expected})")]
pub struct LanguageParseError {
    pub value: String,
    pub expected: String,
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| {
                language.name().eq_ignore_ascii_case(&normalized) || language.code() == normalized
            })
            .ok_or_else(|| LanguageParseError {
                value: value.trim().to_string(),
                expected: Self::ALL.iter().map(Language::name).collect::<Vec<_>>().join("|"),
            })
    }
}
