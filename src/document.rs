//! Minimal arena-backed document tree.
//!
//! Nodes live in a `Vec` and are addressed by [`NodeId`]; removing a node only
//! detaches it, so ids stay valid for the lifetime of the document. While an
//! observer is registered, every insertion is queued as a [`MutationRecord`]
//! that the observer drains later, never synchronously inside the mutation.

use std::collections::{BTreeMap, VecDeque};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub style: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Structural insertion observed under the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

/// Registration returned by [`Document::observe`]; only the latest handle is live.
#[derive(Debug, PartialEq, Eq)]
pub struct ObserverHandle(u64);

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    highlighted: bool,
    observer: Option<u64>,
    next_observer: u64,
    records_paused: bool,
    records: VecDeque<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty `html` root with `head` and `body`.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            highlighted: false,
            observer: None,
            next_observer: 0,
            records_paused: false,
            records: VecDeque::new(),
        };
        let root = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        for child in [head, body] {
            doc.nodes[child.0].parent = Some(root);
            doc.nodes[root.0].children.push(child);
        }
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub(crate) fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(Element {
            tag: tag.to_ascii_lowercase(),
            ..Element::default()
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(Error::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).map(|node| &node.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id)? {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            NodeData::Text(_) => Err(Error::NotAnElement(id)),
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(text) => {
                *text = value.into();
                Ok(())
            }
            NodeData::Element(_) => Err(Error::NotText(id)),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|ancestor| ancestor == self.root)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .get(name)
            .map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> Result<()> {
        self.element_mut(id)?
            .attributes
            .insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.element_mut(id)?.attributes.remove(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attribute(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let element = self.element_mut(id)?;
        let classes = element.attributes.entry("class".to_string()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        let element = self.element_mut(id)?;
        if let Some(classes) = element.attributes.get_mut("class") {
            let kept = classes
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
            *classes = kept;
        }
        Ok(())
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.style.get(name).map(String::as_str)
    }

    pub fn set_style_property(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.element_mut(id)?
            .style
            .insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove_style_property(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.element_mut(id)?.style.remove(name);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_children(parent, &[child], None)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<()> {
        if self.parent(reference) != Some(parent) {
            return Err(Error::NotAChild { parent, reference });
        }
        self.insert_children(parent, &[child], Some(reference))
    }

    /// Detach `id` from its parent. Detached nodes keep their own subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|c| *c != id);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Put `replacements` where `id` was, in order, and detach `id`.
    pub fn replace_with(&mut self, id: NodeId, replacements: &[NodeId]) -> Result<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        let siblings = &self.node(parent)?.children;
        let next = siblings
            .iter()
            .position(|c| *c == id)
            .and_then(|idx| siblings.get(idx + 1).copied());
        self.remove(id)?;
        self.insert_children(parent, replacements, next)
    }

    fn insert_children(
        &mut self,
        parent: NodeId,
        children: &[NodeId],
        before: Option<NodeId>,
    ) -> Result<()> {
        if !matches!(self.node(parent)?.data, NodeData::Element(_)) {
            return Err(Error::NotAnElement(parent));
        }
        for &child in children {
            self.node(child)?;
            if child == parent || self.ancestors(parent).any(|a| a == child) {
                return Err(Error::HierarchyCycle { parent, child });
            }
        }
        for &child in children {
            self.remove(child)?;
        }
        let siblings = &self.node(parent)?.children;
        let mut index = before
            .and_then(|reference| siblings.iter().position(|c| *c == reference))
            .unwrap_or(siblings.len());
        for &child in children {
            self.node_mut(child)?.parent = Some(parent);
            self.node_mut(parent)?.children.insert(index, child);
            index += 1;
        }
        if !children.is_empty() {
            self.record(parent, children);
        }
        Ok(())
    }

    /// Concatenated text of all descendant text nodes, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.data(current) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(NodeData::Element(_)) => {
                    stack.extend(self.children(current).iter().rev().copied());
                }
                None => {}
            }
        }
        out
    }

    /// Merge adjacent text children of `id` and drop empty ones.
    pub fn normalize(&mut self, id: NodeId) -> Result<()> {
        let children = self.node(id)?.children.clone();
        let mut kept = Vec::with_capacity(children.len());
        let mut last_text: Option<NodeId> = None;
        for child in children {
            let Some(text) = self.text(child).map(str::to_string) else {
                kept.push(child);
                last_text = None;
                continue;
            };
            if text.is_empty() {
                self.node_mut(child)?.parent = None;
                continue;
            }
            match last_text {
                Some(previous) => {
                    if let NodeData::Text(existing) = &mut self.node_mut(previous)?.data {
                        existing.push_str(&text);
                    }
                    self.node_mut(child)?.parent = None;
                }
                None => {
                    kept.push(child);
                    last_text = Some(child);
                }
            }
        }
        self.node_mut(id)?.children = kept;
        Ok(())
    }

    /// Elements under `scope` (inclusive) carrying `class`, in document order.
    pub fn elements_with_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.has_class(*id, class))
            .collect()
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.attribute(*id, "id") == Some(value))
    }

    /// `scope` and everything below it, pre-order.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![scope];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Register an observer, replacing any previous registration.
    pub fn observe(&mut self) -> ObserverHandle {
        self.next_observer += 1;
        self.observer = Some(self.next_observer);
        self.records.clear();
        ObserverHandle(self.next_observer)
    }

    pub fn disconnect(&mut self, handle: ObserverHandle) {
        if self.observer == Some(handle.0) {
            self.observer = None;
            self.records.clear();
        }
    }

    pub fn is_observed_by(&self, handle: &ObserverHandle) -> bool {
        self.observer == Some(handle.0)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn take_records(&mut self, handle: &ObserverHandle) -> Vec<MutationRecord> {
        if !self.is_observed_by(handle) {
            return Vec::new();
        }
        self.records.drain(..).collect()
    }

    /// Run `f` without queuing mutation records for its insertions.
    pub fn without_records<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.records_paused, true);
        let out = f(self);
        self.records_paused = previous;
        out
    }

    fn record(&mut self, target: NodeId, added: &[NodeId]) {
        if self.observer.is_none() || self.records_paused || !self.is_attached(target) {
            return;
        }
        self.records.push_back(MutationRecord {
            target,
            added: added.to_vec(),
        });
    }

    /// Serialize `id` as HTML-like markup, escaping text and attribute values.
    pub fn to_markup(&self, id: NodeId) -> String {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }
        let mut out = String::new();
        let mut stack = vec![Step::Open(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(current) => match self.data(current) {
                    Some(NodeData::Text(text)) => escape_into(&mut out, text, false),
                    Some(NodeData::Element(element)) => {
                        out.push('<');
                        out.push_str(&element.tag);
                        for (name, value) in &element.attributes {
                            out.push(' ');
                            out.push_str(name);
                            out.push_str("=\"");
                            escape_into(&mut out, value, true);
                            out.push('"');
                        }
                        if !element.style.is_empty() {
                            out.push_str(" style=\"");
                            let style = inline_style(&element.style);
                            escape_into(&mut out, &style, true);
                            out.push('"');
                        }
                        out.push('>');
                        stack.push(Step::Close(current));
                        stack.extend(self.children(current).iter().rev().map(|c| Step::Open(*c)));
                    }
                    None => {}
                },
                Step::Close(current) => {
                    if let Some(tag) = self.tag(current) {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                }
            }
        }
        out
    }
}

fn inline_style(style: &BTreeMap<String, String>) -> String {
    style
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
