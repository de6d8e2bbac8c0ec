use tracing::{debug, warn};

use crate::{
    document::{Document, NodeId},
    errors::Result,
    pipeline::{Pipeline, is_word_element},
    tokenizer::{CorrectionStore, is_japanese},
};

/// Containers whose text is never tokenized.
pub const OPAQUE_CONTAINERS: &[&str] = &[
    "script", "style", "noscript", "template", "textarea", "pre", "code",
];

pub const DEFAULT_CONTEXT_RADIUS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub text_nodes: usize,
    pub rewritten: usize,
    pub words: usize,
    pub failures: usize,
}

impl WalkStats {
    pub(crate) fn merge(&mut self, other: WalkStats) {
        self.text_nodes += other.text_nodes;
        self.rewritten += other.rewritten;
        self.words += other.words;
        self.failures += other.failures;
    }
}

pub fn is_opaque(doc: &Document, node: NodeId) -> bool {
    doc.tag(node)
        .is_some_and(|tag| OPAQUE_CONTAINERS.contains(&tag))
}

/// Whether descendants of `node` may be annotated: not opaque, not a word, and
/// not nested inside either.
pub fn accepts_descendants(doc: &Document, node: NodeId) -> bool {
    let blocked = |id: NodeId| is_opaque(doc, id) || is_word_element(doc, id);
    !blocked(node) && !doc.ancestors(node).any(blocked)
}

/// Rewrites eligible text nodes into annotated fragments.
pub struct DocumentWalker<'a> {
    pipeline: &'a Pipeline,
    corrections: &'a CorrectionStore,
    context_radius: usize,
}

impl<'a> DocumentWalker<'a> {
    pub fn new(pipeline: &'a Pipeline, corrections: &'a CorrectionStore) -> Self {
        Self {
            pipeline,
            corrections,
            context_radius: DEFAULT_CONTEXT_RADIUS,
        }
    }

    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    /// Annotate every eligible text node under `subtree`.
    pub fn process(&self, doc: &mut Document, subtree: NodeId) -> WalkStats {
        if doc.is_text(subtree) {
            let eligible = doc
                .parent(subtree)
                .is_none_or(|parent| accepts_descendants(doc, parent));
            return if eligible {
                self.rewrite_all(doc, vec![subtree])
            } else {
                WalkStats::default()
            };
        }
        if !accepts_descendants(doc, subtree) {
            return WalkStats::default();
        }

        let mut texts = Vec::new();
        let mut stack: Vec<NodeId> = doc.children(subtree).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if doc.is_text(current) {
                texts.push(current);
            } else if !is_opaque(doc, current) && !is_word_element(doc, current) {
                stack.extend(doc.children(current).iter().rev().copied());
            }
        }
        self.rewrite_all(doc, texts)
    }

    /// Annotate only the direct text children of `node`.
    pub fn process_direct(&self, doc: &mut Document, node: NodeId) -> WalkStats {
        if !accepts_descendants(doc, node) {
            return WalkStats::default();
        }
        let texts: Vec<NodeId> = doc
            .children(node)
            .iter()
            .copied()
            .filter(|child| doc.is_text(*child))
            .collect();
        self.rewrite_all(doc, texts)
    }

    fn rewrite_all(&self, doc: &mut Document, texts: Vec<NodeId>) -> WalkStats {
        let mut stats = WalkStats::default();
        for text in texts {
            match self.rewrite(doc, text) {
                Ok(node_stats) => stats.merge(node_stats),
                Err(err) => {
                    warn!(node = text.index(), error = %err, "failed to annotate text node");
                    stats.failures += 1;
                }
            }
        }
        stats
    }

    fn rewrite(&self, doc: &mut Document, node: NodeId) -> Result<WalkStats> {
        let mut stats = WalkStats {
            text_nodes: 1,
            ..WalkStats::default()
        };
        let Some(text) = doc.text(node) else {
            return Ok(stats);
        };
        if doc.parent(node).is_none() || !is_japanese(text) {
            return Ok(stats);
        }

        let fragments = self.pipeline.fragments(text, self.corrections);
        if fragments.len() <= 1 {
            return Ok(stats);
        }
        stats.words = fragments.iter().filter(|f| f.as_word().is_some()).count();
        stats.rewritten = 1;

        let annotator = self.pipeline.annotator();
        let radius = self.context_radius;
        doc.without_records(|doc| {
            let nodes = annotator.render(doc, &fragments, radius)?;
            doc.replace_with(node, &nodes)
        })?;
        debug!(node = node.index(), words = stats.words, "annotated text node");
        Ok(stats)
    }
}
