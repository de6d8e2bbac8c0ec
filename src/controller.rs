use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    document::{Document, NodeId},
    errors::Result,
    observer::ChangeObserver,
    pipeline::{Pipeline, is_word_element, lookup_request, set_activated, set_raised, strip_words},
    presentation::{
        Presentation, StyleResource, apply_document_properties, validate_color,
        validate_font_size, validate_line_spacing,
    },
    scheduler::{ChunkedScheduler, Step},
    tokenizer::{CorrectionStore, Segmenter},
    types::{Correction, LookupSink},
    walker::DocumentWalker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

/// Pending removal of the `activated` class from a word.
#[derive(Debug, Clone, Copy)]
struct Flash {
    due: Instant,
    node: NodeId,
    generation: u64,
}

/// Owns one document and everything the engine attaches to it: the highlighted
/// flag, the injected stylesheet, the observer subscription, the correction store
/// and the generation counter that invalidates work queued by an earlier pass.
///
/// All operations take `&mut self`, so enable, disable and reapply never overlap.
/// The host drives pending work with [`StateController::poll`] or
/// [`StateController::run_until_idle`].
pub struct StateController {
    document: Document,
    state: HighlightState,
    generation: u64,
    corrections: CorrectionStore,
    pipeline: Pipeline,
    scheduler: ChunkedScheduler,
    observer: ChangeObserver,
    presentation: Presentation,
    lookup: Option<Box<dyn LookupSink>>,
    flashes: Vec<Flash>,
    auto_highlight: bool,
    context_radius: usize,
    activation_flash: Duration,
}

impl StateController {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, EngineConfig::default())
    }

    pub fn with_config(document: Document, config: EngineConfig) -> Self {
        let activation_flash = config.activation_flash();
        Self {
            document,
            state: HighlightState::Disabled,
            generation: 0,
            corrections: CorrectionStore::new(config.corrections),
            pipeline: Pipeline::default(),
            scheduler: ChunkedScheduler::new(config.fan_out_ceiling),
            observer: ChangeObserver::new(),
            presentation: config.presentation,
            lookup: None,
            flashes: Vec::new(),
            auto_highlight: config.auto_highlight,
            context_radius: config.context_radius,
            activation_flash,
        }
    }

    pub fn with_lookup_sink<S>(mut self, sink: S) -> Self
    where
        S: LookupSink + 'static,
    {
        self.lookup = Some(Box::new(sink));
        self
    }

    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.pipeline = Pipeline::new(segmenter);
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Host-side mutations go through here; insertions are picked up on the next poll.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_highlighted(&self) -> bool {
        self.document.is_highlighted()
    }

    /// True while the current pass still has queued nodes.
    pub fn is_scanning(&self) -> bool {
        self.state == HighlightState::Enabled && !self.scheduler.is_idle()
    }

    pub fn corrections(&self) -> &CorrectionStore {
        &self.corrections
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Page-load sequence: highlight or clean up per the configured
    /// auto-highlight flag, then apply the stored presentation.
    pub fn start(&mut self) -> Result<()> {
        validate_color(&self.presentation.highlight_color)?;
        validate_font_size(self.presentation.font_size)?;
        validate_line_spacing(self.presentation.line_spacing)?;
        self.toggle(self.auto_highlight)?;
        apply_document_properties(&mut self.document, &self.presentation)?;
        StyleResource::update(&mut self.document, &self.presentation)?;
        Ok(())
    }

    pub fn enable(&mut self) -> Result<()> {
        if self.document.is_highlighted() {
            debug!(generation = self.generation, "already highlighted");
            return Ok(());
        }
        self.state = HighlightState::Enabling;
        self.document.set_highlighted(true);
        if let Err(err) = StyleResource::inject(&mut self.document, &self.presentation) {
            warn!(error = %err, "failed to inject word stylesheet");
        }
        let root = self.document.root();
        self.scheduler.start(root, self.generation);
        self.observer.arm(&mut self.document);
        self.state = HighlightState::Enabled;
        info!(generation = self.generation, corrections = self.corrections.len(), "highlighting enabled");
        Ok(())
    }

    pub fn disable(&mut self) -> Result<()> {
        if !self.document.is_highlighted() {
            debug!(generation = self.generation, "not highlighted");
            return Ok(());
        }
        self.state = HighlightState::Disabling;
        self.generation += 1;
        self.observer.disarm(&mut self.document);

        let root = self.document.root();
        let stripped = strip_words(&mut self.document, root);
        let style = StyleResource::remove(&mut self.document);
        self.document.set_highlighted(false);
        self.state = HighlightState::Disabled;

        let words = stripped?;
        style?;
        info!(generation = self.generation, words, "highlighting disabled");
        Ok(())
    }

    pub fn toggle(&mut self, enabled: bool) -> Result<()> {
        if enabled { self.enable() } else { self.disable() }
    }

    /// Replace the correction set from a serialized payload. Takes effect on the
    /// next rebuild. Returns the number of corrections kept.
    pub fn set_corrections(&mut self, payload: &str) -> usize {
        self.corrections.set_from_payload(payload)
    }

    pub fn reapply_with_corrections(&mut self, corrections: Vec<Correction>) -> Result<()> {
        self.corrections.set_all(corrections);
        self.reapply()
    }

    /// Full rebuild with the current corrections.
    pub fn reapply(&mut self) -> Result<()> {
        self.disable()?;
        self.enable()
    }

    /// Record a user correction; an annotated document is rebuilt with it.
    pub fn add_correction(&mut self, original: &str, corrected: &str) -> Result<bool> {
        if !self.corrections.upsert(original, corrected) {
            return Ok(false);
        }
        if self.document.is_highlighted() {
            self.reapply()?;
        }
        Ok(true)
    }

    /// Active corrections in the wire shape, for the host to persist.
    pub fn corrections_payload(&self) -> Result<String> {
        self.corrections.to_payload()
    }

    pub fn set_highlight_color(&mut self, color: &str) -> Result<()> {
        validate_color(color)?;
        self.presentation.highlight_color = color.trim().to_string();
        StyleResource::update(&mut self.document, &self.presentation)?;
        Ok(())
    }

    pub fn set_font_size(&mut self, px: f32) -> Result<()> {
        validate_font_size(px)?;
        self.presentation.font_size = px;
        apply_document_properties(&mut self.document, &self.presentation)
    }

    pub fn set_line_spacing(&mut self, multiplier: f32) -> Result<()> {
        validate_line_spacing(multiplier)?;
        self.presentation.line_spacing = multiplier;
        apply_document_properties(&mut self.document, &self.presentation)
    }

    /// One turn of the event loop: deliver pending insertions, then process one
    /// queued node. Returns false once there is nothing left to do.
    pub fn poll(&mut self) -> bool {
        let walker = DocumentWalker::new(&self.pipeline, &self.corrections)
            .with_context_radius(self.context_radius);
        let observed = self.observer.deliver(&mut self.document, &walker);
        let step = self.scheduler.step(&mut self.document, &walker, self.generation);
        if observed.failures > 0 {
            warn!(failures = observed.failures, "some inserted text could not be annotated");
        }
        match step {
            Step::Idle => observed.text_nodes > 0,
            Step::Stale(_) => true,
            Step::Processed { node, stats } => {
                if stats.failures > 0 {
                    warn!(node = node.index(), failures = stats.failures, "scheduler step had failures");
                }
                true
            }
        }
    }

    /// Poll until the scheduler queue is empty and no insertions are pending.
    pub fn run_until_idle(&mut self) -> usize {
        let mut turns = 0;
        while self.poll() {
            turns += 1;
        }
        turns
    }

    pub fn activate(&mut self, node: NodeId) -> bool {
        self.activate_at(node, Instant::now())
    }

    /// Emit a lookup request for the word at `node` and flash it until
    /// `now` plus the activation delay.
    pub fn activate_at(&mut self, node: NodeId, now: Instant) -> bool {
        let Some(request) = lookup_request(&self.document, node) else {
            return false;
        };
        match &self.lookup {
            Some(sink) => sink.send(request),
            None => debug!(word = %request.word, "no lookup sink registered"),
        }
        if let Err(err) = set_activated(&mut self.document, node, true) {
            warn!(node = node.index(), error = %err, "failed to mark word as activated");
            return true;
        }
        let due = now.checked_add(self.activation_flash).unwrap_or_else(|| {
            warn!(
                delay_ms = self.activation_flash.as_millis() as u64,
                "activation delay out of range, clearing on the next timer pass"
            );
            now
        });
        self.flashes.push(Flash {
            due,
            node,
            generation: self.generation,
        });
        true
    }

    /// Clear every activation flash due at or before `now`. Returns how many were
    /// cleared.
    pub fn fire_due_timers(&mut self, now: Instant) -> usize {
        let (due, pending): (Vec<Flash>, Vec<Flash>) =
            self.flashes.drain(..).partition(|flash| flash.due <= now);
        self.flashes = pending;

        let mut cleared = 0;
        for flash in due {
            if flash.generation != self.generation || !is_word_element(&self.document, flash.node) {
                continue;
            }
            match set_activated(&mut self.document, flash.node, false) {
                Ok(()) => cleared += 1,
                Err(err) => warn!(node = flash.node.index(), error = %err, "failed to clear activation"),
            }
        }
        cleared
    }

    pub fn next_timer_due(&self) -> Option<Instant> {
        self.flashes.iter().map(|flash| flash.due).min()
    }

    pub fn pointer_enter(&mut self, node: NodeId) -> Result<()> {
        if !is_word_element(&self.document, node) {
            return Ok(());
        }
        set_raised(&mut self.document, node, true)
    }

    pub fn pointer_leave(&mut self, node: NodeId) -> Result<()> {
        if !is_word_element(&self.document, node) {
            return Ok(());
        }
        set_raised(&mut self.document, node, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ACTIVATED_CLASS, WORD_CLASS};
    use std::sync::mpsc;

    fn document_with(texts: &[&str]) -> Document {
        let mut doc = Document::new();
        for text in texts {
            let p = doc.create_element("p");
            let t = doc.create_text(*text);
            doc.append_child(p, t).unwrap();
            doc.append_child(doc.body(), p).unwrap();
        }
        doc
    }

    fn words(controller: &StateController) -> Vec<NodeId> {
        let doc = controller.document();
        doc.elements_with_class(doc.root(), WORD_CLASS)
    }

    #[test]
    fn walks_the_state_machine() {
        let mut controller = StateController::new(document_with(&["これは猫です。"]));
        assert_eq!(controller.state(), HighlightState::Disabled);
        controller.disable().unwrap();
        assert_eq!(controller.generation(), 0, "disable while disabled is a no-op");

        controller.enable().unwrap();
        assert_eq!(controller.state(), HighlightState::Enabled);
        assert!(controller.is_scanning());
        controller.run_until_idle();
        assert!(!controller.is_scanning());
        assert_eq!(words(&controller).len(), 3);

        controller.toggle(false).unwrap();
        assert_eq!(controller.state(), HighlightState::Disabled);
        assert_eq!(controller.generation(), 1);
        assert!(words(&controller).is_empty());
    }

    #[test]
    fn activation_sends_one_request_and_flashes() {
        let (tx, rx) = mpsc::channel();
        let mut controller =
            StateController::new(document_with(&["これは猫です。"])).with_lookup_sink(tx);
        controller.enable().unwrap();
        controller.run_until_idle();

        let cat = words(&controller)
            .into_iter()
            .find(|w| controller.document().text_content(*w) == "猫")
            .expect("猫 is annotated");
        let t0 = Instant::now();
        assert!(controller.activate_at(cat, t0));
        let request = rx.try_recv().unwrap();
        assert_eq!(request.word, "猫");
        assert_eq!(request.context, "これは猫です。");
        assert!(rx.try_recv().is_err(), "exactly one request per activation");
        assert!(controller.document().has_class(cat, ACTIVATED_CLASS));
        assert_eq!(controller.next_timer_due(), Some(t0 + Duration::from_millis(300)));

        assert_eq!(controller.fire_due_timers(t0 + Duration::from_millis(299)), 0);
        assert!(controller.document().has_class(cat, ACTIVATED_CLASS));
        assert_eq!(controller.fire_due_timers(t0 + Duration::from_millis(300)), 1);
        assert!(!controller.document().has_class(cat, ACTIVATED_CLASS));
        assert!(controller.next_timer_due().is_none());
    }

    #[test]
    fn activating_plain_nodes_does_nothing() {
        let (tx, rx) = mpsc::channel();
        let mut controller = StateController::new(document_with(&["Hello world"])).with_lookup_sink(tx);
        controller.enable().unwrap();
        controller.run_until_idle();
        let body = controller.document().body();
        let p = controller.document().children(body)[0];
        assert!(!controller.activate(p));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn flashes_from_a_previous_pass_are_dropped() {
        let mut controller = StateController::new(document_with(&["これは猫です。"]));
        controller.enable().unwrap();
        controller.run_until_idle();
        let word = words(&controller)[0];
        let t0 = Instant::now();
        controller.activate_at(word, t0);
        controller.reapply().unwrap();
        assert_eq!(controller.fire_due_timers(t0 + Duration::from_secs(1)), 0);
    }

    #[test]
    fn oversized_flash_delay_does_not_overflow() {
        let config = EngineConfig {
            activation_flash_ms: u64::MAX,
            context_radius: usize::MAX,
            ..EngineConfig::default()
        };
        let mut controller = StateController::with_config(document_with(&["これは猫です。"]), config);
        controller.enable().unwrap();
        controller.run_until_idle();
        let word = words(&controller)[0];
        assert_eq!(
            controller.document().attribute(word, "data-context"),
            Some("これは猫です。")
        );

        let t0 = Instant::now();
        assert!(controller.activate_at(word, t0));
        assert!(controller.document().has_class(word, ACTIVATED_CLASS));
        assert_eq!(controller.fire_due_timers(t0), 1);
        assert!(!controller.document().has_class(word, ACTIVATED_CLASS));
    }

    #[test]
    fn pointer_events_raise_and_restore_words() {
        let mut controller = StateController::new(document_with(&["これは猫です。"]));
        controller.enable().unwrap();
        controller.run_until_idle();
        let word = words(&controller)[0];
        controller.pointer_enter(word).unwrap();
        assert_eq!(controller.document().style_property(word, "z-index"), Some("10"));
        controller.pointer_leave(word).unwrap();
        assert_eq!(controller.document().style_property(word, "z-index"), None);
    }

    #[test]
    fn presentation_setters_validate_and_update_in_place() {
        let mut controller = StateController::new(document_with(&["これは猫です。"]));
        controller.enable().unwrap();
        let style = StyleResource::find(controller.document()).expect("style injected");

        controller.set_highlight_color("#90CAF9").unwrap();
        assert_eq!(StyleResource::find(controller.document()), Some(style));
        assert!(controller.document().text_content(style).contains("#90CAF9"));
        assert!(controller.set_highlight_color("").is_err());
        assert_eq!(controller.presentation().highlight_color, "#90CAF9");

        controller.set_font_size(18.0).unwrap();
        controller.set_line_spacing(1.5).unwrap();
        assert!(controller.set_font_size(-2.0).is_err());
        let body = controller.document().body();
        assert_eq!(controller.document().style_property(body, "font-size"), Some("18px"));
        assert_eq!(controller.document().style_property(body, "line-height"), Some("1.5"));
        assert_eq!(controller.state(), HighlightState::Enabled);
    }

    #[test]
    fn malformed_payload_clears_corrections() {
        let mut controller = StateController::new(Document::new());
        let kept = controller.set_corrections(
            r#"[{"originalText": "猫ちゃん", "correctedText": "猫", "context": ""}]"#,
        );
        assert_eq!(kept, 1);
        assert_eq!(controller.set_corrections("not json"), 0);
        assert!(controller.corrections().is_empty());
    }

    #[test]
    fn adding_a_correction_rebuilds_highlighted_documents() {
        let mut controller = StateController::new(document_with(&["猫ちゃん"]));
        controller.enable().unwrap();
        controller.run_until_idle();
        assert!(controller.add_correction("猫ちゃん", "猫").unwrap());
        assert!(!controller.add_correction("猫ちゃん", "猫ちゃん").unwrap());
        assert_eq!(controller.generation(), 1);
        controller.run_until_idle();

        let doc = controller.document();
        let corrected: Vec<String> = words(&controller)
            .into_iter()
            .filter(|w| doc.attribute(*w, "data-corrected") == Some("true"))
            .map(|w| doc.text_content(w))
            .collect();
        assert_eq!(corrected, vec!["猫"]);
        let payload = controller.corrections_payload().unwrap();
        assert!(payload.contains("\"correctedText\":\"猫\""), "{payload:?}");
    }
}
