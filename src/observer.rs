use tracing::debug;

use crate::{
    document::{Document, ObserverHandle},
    pipeline::within_word,
    walker::{DocumentWalker, WalkStats},
};

/// Re-runs the walker over subtrees the host inserts while highlighting is on.
#[derive(Debug, Default)]
pub struct ChangeObserver {
    handle: Option<ObserverHandle>,
}

impl ChangeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to insertions, dropping any earlier subscription.
    pub fn arm(&mut self, doc: &mut Document) {
        self.disarm(doc);
        self.handle = Some(doc.observe());
    }

    pub fn disarm(&mut self, doc: &mut Document) {
        if let Some(handle) = self.handle.take() {
            doc.disconnect(handle);
        }
    }

    pub fn is_armed(&self, doc: &Document) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| doc.is_observed_by(handle))
    }

    /// Drain pending records and annotate every inserted node that is still
    /// attached and not part of an existing word.
    pub fn deliver(&mut self, doc: &mut Document, walker: &DocumentWalker<'_>) -> WalkStats {
        let Some(handle) = self.handle.as_ref() else {
            return WalkStats::default();
        };
        let records = doc.take_records(handle);
        let mut stats = WalkStats::default();
        for record in records {
            for node in record.added {
                if !doc.is_attached(node) || within_word(doc, node) {
                    continue;
                }
                let node_stats = walker.process(doc, node);
                debug!(
                    target_node = record.target.index(),
                    node = node.index(),
                    rewritten = node_stats.rewritten,
                    "annotated inserted subtree"
                );
                stats.merge(node_stats);
            }
        }
        stats
    }
}
