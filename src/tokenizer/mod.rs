use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, warn};

pub mod breakers;
pub mod corrections;
mod script;

pub use breakers::{RegexRunBreaker, UnicodeWordBreaker, WordBreaker};
pub use corrections::CorrectionStore;
pub use script::{classify, is_japanese, is_word_like};

use crate::{
    errors::{Result, SegmentError},
    types::Token,
};

/// Turns raw text into tokens whose concatenation reproduces the input.
///
/// Non-Japanese text is returned untouched as one token. Japanese text goes
/// through the primary breaker when one is configured, otherwise through the
/// regex run breaker. Any breaker failure degrades to a single identity token.
pub struct Segmenter {
    primary: Option<Box<dyn WordBreaker>>,
    fallback: RegexRunBreaker,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self::with_breaker(UnicodeWordBreaker)
    }

    /// Segmenter without a word-boundary primitive; uses script runs only.
    pub fn regex_only() -> Self {
        Self {
            primary: None,
            fallback: RegexRunBreaker,
        }
    }

    pub fn with_breaker<B>(breaker: B) -> Self
    where
        B: WordBreaker + 'static,
    {
        Self {
            primary: Some(Box::new(breaker)),
            fallback: RegexRunBreaker,
        }
    }

    pub fn breaker_name(&self) -> &'static str {
        self.active_breaker().name()
    }

    pub fn segment(&self, text: &str) -> Vec<Token> {
        match self.try_segment(text) {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!(error = %err, "segmentation failed, passing text through");
                vec![Token::new(text, is_japanese(text))]
            }
        }
    }

    /// Strict form of [`Segmenter::segment`]: breaker errors, invalid boundaries
    /// and breaker panics are returned instead of degrading to one token.
    pub fn try_segment(&self, text: &str) -> Result<Vec<Token>> {
        if !is_japanese(text) {
            return Ok(vec![Token::new(text, false)]);
        }

        let breaker = self.active_breaker();
        match catch_unwind(AssertUnwindSafe(|| Self::tokens_from(breaker, text))) {
            Ok(tokens) => Ok(tokens?),
            Err(_) => {
                warn!(breaker = breaker.name(), "word breaker panicked");
                Err(SegmentError::Failed {
                    breaker: breaker.name(),
                    reason: "breaker panicked".to_string(),
                }
                .into())
            }
        }
    }

    fn tokens_from(breaker: &dyn WordBreaker, text: &str) -> Result<Vec<Token>, SegmentError> {
        let ranges = breaker.breaks(text)?;
        breakers::validate_breaks(breaker.name(), text, &ranges)?;
        Ok(ranges
            .into_iter()
            .filter(|range| !range.is_empty())
            .map(|range| {
                let piece = &text[range];
                Token::new(piece, is_japanese(piece))
            })
            .collect())
    }

    fn active_breaker(&self) -> &dyn WordBreaker {
        match &self.primary {
            Some(primary) => primary.as_ref(),
            None => &self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;
    use crate::errors::Error;

    struct FailingBreaker;

    impl WordBreaker for FailingBreaker {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn breaks(&self, _text: &str) -> Result<Vec<Range<usize>>, SegmentError> {
            Err(SegmentError::Failed {
                breaker: "failing",
                reason: "no dictionary".to_string(),
            })
        }
    }

    struct PanickingBreaker;

    impl WordBreaker for PanickingBreaker {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn breaks(&self, _text: &str) -> Result<Vec<Range<usize>>, SegmentError> {
            panic!("breaker bug")
        }
    }

    struct OverlappingBreaker;

    impl WordBreaker for OverlappingBreaker {
        fn name(&self) -> &'static str {
            "overlapping"
        }

        fn breaks(&self, text: &str) -> Result<Vec<Range<usize>>, SegmentError> {
            Ok(vec![0..text.len(), 0..text.len()])
        }
    }

    fn joined(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn non_japanese_text_is_a_single_token() {
        let tokens = Segmenter::new().segment("Hello world");
        assert_eq!(tokens, vec![Token::new("Hello world", false)]);
    }

    #[test]
    fn segmentation_round_trips_for_every_policy() {
        let inputs = [
            "これは猫です。",
            "Rustで日本語を書く 2024年",
            "カタカナとひらがな、漢字！",
            "ＡＢＣ　テスト",
            "emoji 🍣 寿司",
            "",
        ];
        let segmenters = [
            Segmenter::new(),
            Segmenter::regex_only(),
            Segmenter::with_breaker(FailingBreaker),
            Segmenter::with_breaker(OverlappingBreaker),
        ];
        for segmenter in &segmenters {
            for input in inputs {
                let tokens = segmenter.segment(input);
                assert_eq!(
                    joined(&tokens),
                    input,
                    "round trip failed for {input:?} with {}",
                    segmenter.breaker_name()
                );
            }
        }
    }

    #[test]
    fn regex_fallback_groups_scripts() {
        let tokens = Segmenter::regex_only().segment("Rustで日本語");
        assert_eq!(
            tokens,
            vec![Token::new("Rust", false), Token::new("で日本語", true)]
        );
    }

    #[test]
    fn breaker_errors_degrade_to_identity() {
        let text = "これは猫です。";
        for segmenter in [
            Segmenter::with_breaker(FailingBreaker),
            Segmenter::with_breaker(OverlappingBreaker),
            Segmenter::with_breaker(PanickingBreaker),
        ] {
            assert_eq!(segmenter.segment(text), vec![Token::new(text, true)]);
        }
    }

    #[test]
    fn strict_segmentation_reports_breaker_failures() {
        let text = "これは猫です。";
        let failed = Segmenter::with_breaker(FailingBreaker).try_segment(text);
        assert!(
            matches!(failed, Err(Error::Segment(SegmentError::Failed { breaker: "failing", .. }))),
            "{failed:?}"
        );
        let overlapping = Segmenter::with_breaker(OverlappingBreaker).try_segment(text);
        assert!(
            matches!(overlapping, Err(Error::Segment(SegmentError::Discontiguous { .. }))),
            "{overlapping:?}"
        );
        let panicked = Segmenter::with_breaker(PanickingBreaker).try_segment(text);
        assert!(matches!(panicked, Err(Error::Segment(_))), "{panicked:?}");

        let english = Segmenter::with_breaker(FailingBreaker).try_segment("Hello world");
        assert_eq!(english.unwrap(), vec![Token::new("Hello world", false)]);
        assert_eq!(Segmenter::new().try_segment(text).unwrap().len(), 5);
    }

    #[test]
    fn example_sentence_tokens() {
        let tokens = Segmenter::new().segment("これは猫です。");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(texts.contains(&"猫"), "got {texts:?}");
        assert!(texts.contains(&"は"), "got {texts:?}");
        assert!(tokens.iter().all(|t| t.is_japanese));
    }
}
