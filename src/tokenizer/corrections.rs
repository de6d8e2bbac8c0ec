use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::{errors::Result, types::Correction};

/// In-memory set of user corrections, replaced wholesale by the host.
///
/// At most one correction is active per `original_text`; a later entry for the
/// same original replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct CorrectionStore {
    entries: Vec<Correction>,
    by_original: HashMap<String, usize>,
    corrected: HashSet<String>,
}

impl CorrectionStore {
    pub fn new(corrections: Vec<Correction>) -> Self {
        let mut store = Self::default();
        store.set_all(corrections);
        store
    }

    pub fn parse_payload(payload: &str) -> Result<Vec<Correction>> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn set_all(&mut self, corrections: Vec<Correction>) {
        self.entries.clear();
        self.by_original.clear();
        for correction in corrections {
            if correction.original_text.is_empty() {
                debug!("skipping correction with empty original text");
                continue;
            }
            match self.by_original.get(&correction.original_text) {
                Some(&idx) => self.entries[idx] = correction,
                None => {
                    self.by_original
                        .insert(correction.original_text.clone(), self.entries.len());
                    self.entries.push(correction);
                }
            }
        }
        self.rebuild_corrected();
    }

    /// Replace the set from a serialized payload. A payload that fails to parse
    /// leaves the store empty.
    pub fn set_from_payload(&mut self, payload: &str) -> usize {
        match Self::parse_payload(payload) {
            Ok(corrections) => self.set_all(corrections),
            Err(err) => {
                warn!(error = %err, "ignoring malformed correction payload");
                self.set_all(Vec::new());
            }
        }
        self.len()
    }

    /// Add or replace the correction for `original`. Returns false when the
    /// corrected text is empty or identical to the original once trimmed.
    pub fn upsert(&mut self, original: &str, corrected: &str) -> bool {
        let corrected = corrected.trim();
        if original.is_empty() || corrected.is_empty() || corrected == original {
            return false;
        }
        let mut entries: Vec<Correction> = self
            .entries
            .drain(..)
            .filter(|entry| entry.original_text != original)
            .collect();
        entries.push(Correction::new(original, corrected));
        self.set_all(entries);
        true
    }

    /// Split `token` around its correction: `[corrected, remainder]`, where the
    /// remainder is the token with the first occurrence of the corrected text
    /// deleted and is dropped when blank.
    pub fn apply(&self, token: &str) -> Vec<String> {
        let Some(correction) = self.get(token) else {
            return vec![token.to_string()];
        };
        let corrected = &correction.corrected_text;
        if !token.contains(corrected.as_str()) {
            debug!(
                token,
                corrected = corrected.as_str(),
                "corrected text is not a substring of the token"
            );
        }
        let remainder = token.replacen(corrected.as_str(), "", 1);
        if remainder.trim().is_empty() {
            vec![corrected.clone()]
        } else {
            vec![corrected.clone(), remainder]
        }
    }

    pub fn get(&self, original: &str) -> Option<&Correction> {
        self.by_original.get(original).map(|&idx| &self.entries[idx])
    }

    pub fn is_corrected_text(&self, text: &str) -> bool {
        self.corrected.contains(text)
    }

    /// True when `text` appears as an original or corrected text.
    pub fn mentions(&self, text: &str) -> bool {
        self.by_original.contains_key(text) || self.corrected.contains(text)
    }

    pub fn entries(&self) -> &[Correction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the active list in the host's wire shape.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    fn rebuild_corrected(&mut self) {
        self.corrected = self
            .entries
            .iter()
            .map(|entry| entry.corrected_text.clone())
            .collect();
    }
}
