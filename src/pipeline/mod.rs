mod annotator;

pub use annotator::{
    ACTIVATED_CLASS, Annotator, CORRECTED_CLASS, WORD_CLASS, is_word_element, lookup_request,
    set_activated, set_raised, strip_words, within_word,
};

use super::{
    tokenizer::{CorrectionStore, Segmenter, is_japanese},
    types::{Fragment, Token},
};

/// Text-to-fragments pipeline run once per eligible text node.
pub struct Pipeline {
    segmenter: Segmenter,
    annotator: Annotator,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Segmenter::new())
    }
}

impl Pipeline {
    pub fn new(segmenter: Segmenter) -> Self {
        Self {
            segmenter,
            annotator: Annotator,
        }
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    /// Segment `text`, then split each Japanese token around its correction.
    pub fn corrected_tokens(&self, text: &str, corrections: &CorrectionStore) -> Vec<Token> {
        let mut tokens = Vec::new();
        for token in self.segmenter.segment(text) {
            if !token.is_japanese || corrections.is_empty() {
                if !token.text.is_empty() {
                    tokens.push(token);
                }
                continue;
            }
            for piece in corrections.apply(&token.text) {
                if piece.is_empty() {
                    continue;
                }
                let japanese = is_japanese(&piece);
                tokens.push(Token::new(piece, japanese));
            }
        }
        tokens
    }

    pub fn fragments(&self, text: &str, corrections: &CorrectionStore) -> Vec<Fragment> {
        let tokens = self.corrected_tokens(text, corrections);
        self.annotator.annotate(&tokens, corrections)
    }
}
