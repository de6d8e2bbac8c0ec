use std::collections::VecDeque;

use tracing::debug;

use crate::{
    document::{Document, NodeId},
    pipeline::is_word_element,
    walker::{DocumentWalker, WalkStats, is_opaque},
};

/// Nodes with this many direct children or more are not descended into.
pub const DEFAULT_FAN_OUT_CEILING: usize = 100;

/// Result of a single [`ChunkedScheduler::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Stale(NodeId),
    Processed { node: NodeId, stats: WalkStats },
}

/// Breadth-first driver that annotates one node per step so the host keeps control
/// between steps.
#[derive(Debug)]
pub struct ChunkedScheduler {
    queue: VecDeque<(NodeId, u64)>,
    fan_out_ceiling: usize,
}

impl Default for ChunkedScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FAN_OUT_CEILING)
    }
}

impl ChunkedScheduler {
    pub fn new(fan_out_ceiling: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            fan_out_ceiling,
        }
    }

    pub fn fan_out_ceiling(&self) -> usize {
        self.fan_out_ceiling
    }

    pub fn start(&mut self, root: NodeId, generation: u64) {
        self.queue.push_back((root, generation));
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Pop and process one queued node. Entries from an older generation are
    /// dropped without touching the document.
    pub fn step(&mut self, doc: &mut Document, walker: &DocumentWalker<'_>, generation: u64) -> Step {
        let Some((node, queued_at)) = self.queue.pop_front() else {
            return Step::Idle;
        };
        if queued_at != generation || !doc.is_attached(node) {
            debug!(node = node.index(), queued_at, generation, "skipping stale scheduler entry");
            return Step::Stale(node);
        }

        // Fan-out counts the children present before the text rewrite.
        let children = doc.children(node);
        let descend = children.len() < self.fan_out_ceiling;
        if !descend {
            debug!(
                node = node.index(),
                children = children.len(),
                ceiling = self.fan_out_ceiling,
                "fan-out ceiling reached, not descending"
            );
        }
        let next: Vec<NodeId> = if descend {
            children
                .iter()
                .copied()
                .filter(|child| {
                    doc.element(*child).is_some()
                        && !is_opaque(doc, *child)
                        && !is_word_element(doc, *child)
                })
                .collect()
        } else {
            Vec::new()
        };

        let stats = walker.process_direct(doc, node);
        self.queue.extend(next.into_iter().map(|child| (child, generation)));
        Step::Processed { node, stats }
    }
}
