use std::collections::BTreeSet;

use crate::{
    document::{Document, NodeId},
    errors::Result,
    tokenizer::{CorrectionStore, classify, is_word_like},
    types::{Fragment, LookupRequest, ScriptType, Token, WordFragment},
};

/// Marker class carried by every annotated word element.
pub const WORD_CLASS: &str = "japanese-word";
pub const ACTIVATED_CLASS: &str = "activated";
pub const CORRECTED_CLASS: &str = "corrected";

const HOVER_Z_INDEX: &str = "10";

#[derive(Debug, Clone, Copy, Default)]
pub struct Annotator;

impl Annotator {
    /// Word fragments for Japanese word-like tokens, plain text for the rest.
    /// Adjacent plain tokens are merged.
    pub fn annotate(&self, tokens: &[Token], corrections: &CorrectionStore) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token.is_japanese && is_word_like(&token.text, corrections) {
                fragments.push(Fragment::Word(WordFragment {
                    text: token.text.clone(),
                    script_type: classify(&token.text),
                    is_corrected: corrections.is_corrected_text(&token.text),
                }));
                continue;
            }
            match fragments.last_mut() {
                Some(Fragment::Plain(previous)) => previous.push_str(&token.text),
                _ => fragments.push(Fragment::Plain(token.text.clone())),
            }
        }
        fragments
    }

    /// Up to `radius` fragments either side of `index`, itself included, trimmed.
    pub fn context(fragments: &[Fragment], index: usize, radius: usize) -> String {
        let start = index.saturating_sub(radius);
        let end = index.saturating_add(radius).saturating_add(1).min(fragments.len());
        fragments[start..end]
            .iter()
            .map(Fragment::text)
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Create detached nodes for `fragments`; words become interactive spans.
    pub fn render(
        &self,
        doc: &mut Document,
        fragments: &[Fragment],
        context_radius: usize,
    ) -> Result<Vec<NodeId>> {
        let mut nodes = Vec::with_capacity(fragments.len());
        for (idx, fragment) in fragments.iter().enumerate() {
            let node = match fragment {
                Fragment::Plain(text) => doc.create_text(text.as_str()),
                Fragment::Word(word) => {
                    let context = Self::context(fragments, idx, context_radius);
                    self.render_word(doc, word, &context)?
                }
            };
            nodes.push(node);
        }
        Ok(nodes)
    }

    fn render_word(&self, doc: &mut Document, word: &WordFragment, context: &str) -> Result<NodeId> {
        let span = doc.create_element("span");
        doc.add_class(span, WORD_CLASS)?;
        if word.is_corrected {
            doc.add_class(span, CORRECTED_CLASS)?;
        }
        doc.set_attribute(span, "data-word", word.text.as_str())?;
        doc.set_attribute(span, "data-type", word.script_type.as_str())?;
        doc.set_attribute(span, "data-context", context)?;
        doc.set_attribute(span, "data-corrected", word.is_corrected.to_string())?;
        doc.set_attribute(
            span,
            "title",
            format!("{} · {}", word.text, word.script_type.display_name()),
        )?;
        let text = doc.create_text(word.text.as_str());
        doc.append_child(span, text)?;
        Ok(span)
    }
}

pub fn is_word_element(doc: &Document, node: NodeId) -> bool {
    doc.has_class(node, WORD_CLASS)
}

/// True when `node` is a word element or sits inside one.
pub fn within_word(doc: &Document, node: NodeId) -> bool {
    is_word_element(doc, node) || doc.ancestors(node).any(|a| is_word_element(doc, a))
}

/// Lookup payload carried by a rendered word element.
pub fn lookup_request(doc: &Document, node: NodeId) -> Option<LookupRequest> {
    if !is_word_element(doc, node) {
        return None;
    }
    let word = doc
        .attribute(node, "data-word")
        .map(str::to_string)
        .unwrap_or_else(|| doc.text_content(node));
    let script_type = doc
        .attribute(node, "data-type")
        .and_then(ScriptType::parse)
        .unwrap_or_else(|| classify(&word));
    let context = doc
        .attribute(node, "data-context")
        .unwrap_or_default()
        .to_string();
    Some(LookupRequest {
        word,
        script_type,
        context,
    })
}

pub fn set_activated(doc: &mut Document, node: NodeId, activated: bool) -> Result<()> {
    if activated {
        doc.add_class(node, ACTIVATED_CLASS)
    } else {
        doc.remove_class(node, ACTIVATED_CLASS)
    }
}

pub fn set_raised(doc: &mut Document, node: NodeId, raised: bool) -> Result<()> {
    if raised {
        doc.set_style_property(node, "z-index", HOVER_Z_INDEX)
    } else {
        doc.remove_style_property(node, "z-index")
    }
}

/// Replace every word element under `scope` with its plain text and merge the
/// text left behind. Returns the number of words removed.
pub fn strip_words(doc: &mut Document, scope: NodeId) -> Result<usize> {
    let words = doc.elements_with_class(scope, WORD_CLASS);
    let mut parents = BTreeSet::new();
    let mut removed = 0;
    for word in words.into_iter().rev() {
        let Some(parent) = doc.parent(word) else {
            continue;
        };
        let text = doc.create_text(doc.text_content(word));
        doc.replace_with(word, &[text])?;
        parents.insert(parent);
        removed += 1;
    }
    for parent in parents {
        doc.normalize(parent)?;
    }
    Ok(removed)
}
