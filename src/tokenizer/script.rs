use unicode_script::{Script as UniScript, UnicodeScript};

use super::corrections::CorrectionStore;
use crate::types::ScriptType;

/// Coarse per-character script used to refine word-bound segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentScript {
    Han,
    Hiragana,
    Katakana,
    LatinDigit,
    Other,
}

const PARTICLES: &[char] = &[
    'は', 'が', 'を', 'に', 'で', 'と', 'の', 'へ', 'や', 'か', 'も', 'ね', 'よ', 'な',
];

const PUNCTUATION: &[char] = &[
    '。', '、', '！', '？', '：', '；', '（', '）', '「', '」', '『', '』',
];

pub fn classify_script(c: char) -> SegmentScript {
    if is_cjk_char(c) {
        SegmentScript::Han
    } else {
        match c.script() {
            UniScript::Hiragana => SegmentScript::Hiragana,
            UniScript::Katakana => SegmentScript::Katakana,
            UniScript::Latin => SegmentScript::LatinDigit,
            _ if c.is_ascii_alphanumeric() => SegmentScript::LatinDigit,
            _ => SegmentScript::Other,
        }
    }
}

/// Script of a segment, taken from its first character with a definite script.
pub fn segment_script(text: &str) -> SegmentScript {
    text.chars()
        .map(classify_script)
        .find(|script| *script != SegmentScript::Other)
        .unwrap_or(SegmentScript::Other)
}

pub fn is_cjk_char(c: char) -> bool {
    matches!(
      c,
      '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2B73F}'
        | '\u{2B740}'..='\u{2B81F}'
        | '\u{2B820}'..='\u{2CEAF}'
    )
}

#[inline]
pub fn is_hiragana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}')
}

#[inline]
pub fn is_katakana(c: char) -> bool {
    matches!(c, '\u{30A0}'..='\u{30FF}')
}

/// Code points that mark text as Japanese: kana, the core ideograph blocks,
/// fullwidth forms and CJK punctuation.
#[inline]
pub fn is_japanese_char(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{309F}'
            | '\u{30A0}'..='\u{30FF}'
            | '\u{4E00}'..='\u{9FAF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{FF00}'..='\u{FFEF}'
            | '\u{3000}'..='\u{303F}'
    )
}

pub fn is_japanese(text: &str) -> bool {
    text.chars().any(is_japanese_char)
}

/// Kanji wins over Hiragana, Hiragana over Katakana; anything else is Mixed.
pub fn classify(token: &str) -> ScriptType {
    if token.chars().any(is_cjk_char) {
        ScriptType::Kanji
    } else if token.chars().any(is_hiragana) {
        ScriptType::Hiragana
    } else if token.chars().any(is_katakana) {
        ScriptType::Katakana
    } else {
        ScriptType::Mixed
    }
}

pub fn is_particle(c: char) -> bool {
    PARTICLES.contains(&c)
}

pub fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(&c)
}

/// Single particles and punctuation are skipped unless a correction names them.
pub fn is_word_like(token: &str, corrections: &CorrectionStore) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if chars.next().is_some() {
        return true;
    }
    if corrections.mentions(token) {
        return true;
    }
    !(is_particle(first) || is_punctuation(first))
}
