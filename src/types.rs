use serde::{Deserialize, Serialize};

/// Minimal textual unit produced by segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub is_japanese: bool,
}

impl Token {
    pub fn new(text: impl Into<String>, is_japanese: bool) -> Self {
        Self {
            text: text.into(),
            is_japanese,
        }
    }
}

/// Script classification of a Japanese token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    Kanji,
    Hiragana,
    Katakana,
    Mixed,
}

impl ScriptType {
    /// Identifier carried in `data-type` and lookup requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::Kanji => "kanji",
            ScriptType::Hiragana => "hiragana",
            ScriptType::Katakana => "katakana",
            ScriptType::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "kanji" => Some(ScriptType::Kanji),
            "hiragana" => Some(ScriptType::Hiragana),
            "katakana" => Some(ScriptType::Katakana),
            "mixed" => Some(ScriptType::Mixed),
            _ => None,
        }
    }

    /// Human readable label used in tooltips.
    pub fn display_name(&self) -> &'static str {
        match self {
            ScriptType::Kanji => "Kanji (漢字)",
            ScriptType::Hiragana => "Hiragana (ひらがな)",
            ScriptType::Katakana => "Katakana (カタカナ)",
            ScriptType::Mixed => "Mixed",
        }
    }
}

/// User-declared override mapping a mis-segmented text to its preferred form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub original_text: String,
    pub corrected_text: String,
    /// Carried through for the host; never used for matching.
    #[serde(default)]
    pub context: String,
}

impl Correction {
    pub fn new(original_text: impl Into<String>, corrected_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            corrected_text: corrected_text.into(),
            context: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordFragment {
    pub text: String,
    pub script_type: ScriptType,
    pub is_corrected: bool,
}

/// Either an untouched span of text or an annotated word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Plain(String),
    Word(WordFragment),
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Fragment::Plain(text) => text,
            Fragment::Word(word) => &word.text,
        }
    }

    pub fn as_word(&self) -> Option<&WordFragment> {
        match self {
            Fragment::Word(word) => Some(word),
            Fragment::Plain(_) => None,
        }
    }
}

/// Message emitted when the user activates an annotated word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub word: String,
    pub script_type: ScriptType,
    pub context: String,
}

/// Destination for lookup requests; the host owns delivery and the response.
pub trait LookupSink {
    fn send(&self, request: LookupRequest);
}

impl LookupSink for std::sync::mpsc::Sender<LookupRequest> {
    fn send(&self, request: LookupRequest) {
        if std::sync::mpsc::Sender::send(self, request).is_err() {
            tracing::debug!("lookup receiver dropped, request discarded");
        }
    }
}
