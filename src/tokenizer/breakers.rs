use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use super::script::{SegmentScript, is_particle, segment_script};
use crate::errors::SegmentError;

/// Splits text into contiguous byte ranges that tile the input.
pub trait WordBreaker: Send + Sync {
    fn name(&self) -> &'static str;

    fn breaks(&self, text: &str) -> Result<Vec<Range<usize>>, SegmentError>;
}

static JAPANESE_RUNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}\x{3400}-\x{4DBF}\x{FF00}-\x{FFEF}\x{3000}-\x{303F}]+|[^\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}\x{3400}-\x{4DBF}\x{FF00}-\x{FFEF}\x{3000}-\x{303F}]+",
    )
    .expect("japanese run pattern is valid")
});

/// Groups maximal runs of Japanese-script code points against runs of everything else.
pub struct RegexRunBreaker;

impl WordBreaker for RegexRunBreaker {
    fn name(&self) -> &'static str {
        "regex-runs"
    }

    fn breaks(&self, text: &str) -> Result<Vec<Range<usize>>, SegmentError> {
        Ok(JAPANESE_RUNS.find_iter(text).map(|m| m.range()).collect())
    }
}

/// UAX #29 word bounds with a Japanese refinement: UAX #29 leaves ideographs and
/// hiragana as one segment per character, so adjacent segments of the same
/// script are merged back into runs and a trailing particle is split off a
/// hiragana run.
pub struct UnicodeWordBreaker;

impl WordBreaker for UnicodeWordBreaker {
    fn name(&self) -> &'static str {
        "unicode-words"
    }

    fn breaks(&self, text: &str) -> Result<Vec<Range<usize>>, SegmentError> {
        let mut runs: Vec<(SegmentScript, Range<usize>)> = Vec::new();
        for (start, segment) in text.split_word_bound_indices() {
            let end = start + segment.len();
            let script = match runs.last() {
                Some((last_script, _)) if segment.chars().all(is_run_extender) => *last_script,
                _ => segment_script(segment),
            };
            if let Some((last_script, last)) = runs.last_mut() {
                if *last_script == script && merges_within_run(script) && last.end == start {
                    last.end = end;
                    continue;
                }
            }
            runs.push((script, start..end));
        }

        let mut out = Vec::with_capacity(runs.len() + 1);
        for (script, range) in runs {
            if script == SegmentScript::Hiragana {
                if let Some(split) = trailing_particle_split(&text[range.clone()]) {
                    let at = range.start + split;
                    out.push(range.start..at);
                    out.push(at..range.end);
                    continue;
                }
            }
            out.push(range);
        }
        Ok(out)
    }
}

fn merges_within_run(script: SegmentScript) -> bool {
    matches!(
        script,
        SegmentScript::Han | SegmentScript::Hiragana | SegmentScript::Katakana
    )
}

/// Prolonged-sound and iteration marks continue whatever run precedes them.
fn is_run_extender(c: char) -> bool {
    matches!(c, 'ー' | '々' | '〻')
}

fn trailing_particle_split(run: &str) -> Option<usize> {
    let (idx, last) = run.char_indices().last()?;
    (idx > 0 && is_particle(last)).then_some(idx)
}

/// Checks that `ranges` tile `text` exactly and fall on char boundaries.
pub(crate) fn validate_breaks(
    breaker: &'static str,
    text: &str,
    ranges: &[Range<usize>],
) -> Result<(), SegmentError> {
    let mut cursor = 0usize;
    for range in ranges {
        if range.start != cursor || range.end < range.start {
            return Err(SegmentError::Discontiguous {
                breaker,
                at: cursor,
            });
        }
        if !text.is_char_boundary(range.end) {
            return Err(SegmentError::NotCharBoundary {
                breaker,
                at: range.end,
            });
        }
        cursor = range.end;
    }
    if cursor != text.len() {
        return Err(SegmentError::Incomplete {
            breaker,
            at: cursor,
            len: text.len(),
        });
    }
    Ok(())
}
