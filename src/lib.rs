mod config;
mod controller;
mod document;
mod errors;
mod observer;
mod pipeline;
mod presentation;
mod scheduler;
mod tokenizer;
mod types;
mod walker;

pub use config::{DEFAULT_ACTIVATION_FLASH_MS, EngineConfig};
pub use controller::{HighlightState, StateController};
pub use document::{Document, Element, MutationRecord, NodeData, NodeId, ObserverHandle};
pub use errors::{Error, Result, SegmentError};
pub use observer::ChangeObserver;
pub use pipeline::{
    ACTIVATED_CLASS, Annotator, CORRECTED_CLASS, Pipeline, WORD_CLASS, is_word_element,
    lookup_request, strip_words, within_word,
};
pub use presentation::{
    DEFAULT_FONT_SIZE, DEFAULT_HIGHLIGHT_COLOR, DEFAULT_LINE_SPACING, Presentation,
    STYLE_ELEMENT_ID, StyleResource,
};
pub use scheduler::{ChunkedScheduler, DEFAULT_FAN_OUT_CEILING, Step};
pub use tokenizer::{
    CorrectionStore, RegexRunBreaker, Segmenter, UnicodeWordBreaker, WordBreaker, classify,
    is_japanese, is_word_like,
};
pub use types::{Correction, Fragment, LookupRequest, LookupSink, ScriptType, Token, WordFragment};
pub use walker::{DEFAULT_CONTEXT_RADIUS, DocumentWalker, OPAQUE_CONTAINERS, WalkStats};

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, sync::mpsc};
    use tempfile::tempdir;

    const SENTENCE: &str = "これは猫です。";
    const STUDY: &str = "日本語を勉強します";
    const ENGLISH: &str = "Hello world";

    /// A small article: headings, nested inline markup, a code sample and a script.
    fn article() -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        let section = doc.create_element("section");
        doc.append_child(body, section).unwrap();

        let heading = doc.create_element("h1");
        let heading_text = doc.create_text(STUDY);
        doc.append_child(heading, heading_text).unwrap();
        doc.append_child(section, heading).unwrap();

        let p = doc.create_element("p");
        let lead = doc.create_text("今日は ");
        let em = doc.create_element("em");
        let em_text = doc.create_text(SENTENCE);
        let tail = doc.create_text(" and some English.");
        doc.append_child(em, em_text).unwrap();
        for child in [lead, em, tail] {
            doc.append_child(p, child).unwrap();
        }
        doc.append_child(section, p).unwrap();

        for (tag, text) in [("code", SENTENCE), ("script", "var 猫 = 1;")] {
            let el = doc.create_element(tag);
            let t = doc.create_text(text);
            doc.append_child(el, t).unwrap();
            doc.append_child(section, el).unwrap();
        }
        doc
    }

    fn word_texts(doc: &Document) -> Vec<String> {
        doc.elements_with_class(doc.root(), WORD_CLASS)
            .into_iter()
            .map(|w| doc.text_content(w))
            .collect()
    }

    fn assert_has_word(doc: &Document, word: &str) {
        let words = word_texts(doc);
        assert!(
            words.iter().any(|w| w == word),
            "expected {word:?} to be annotated, got {:?}",
            words
        );
    }

    fn highlighted(doc: Document) -> StateController {
        let mut controller = StateController::new(doc);
        controller.enable().unwrap();
        controller.run_until_idle();
        controller
    }

    #[test]
    fn enable_annotates_words_outside_opaque_containers() {
        let controller = highlighted(article());
        let doc = controller.document();
        assert_has_word(doc, "猫");
        assert_has_word(doc, "日本語");
        assert!(!word_texts(doc).contains(&"は".to_string()));

        for word in doc.elements_with_class(doc.root(), WORD_CLASS) {
            let inside_opaque = doc
                .ancestors(word)
                .any(|a| matches!(doc.tag(a), Some("code") | Some("script")));
            assert!(!inside_opaque, "word {:?} inside an opaque container", doc.text_content(word));
        }
        assert!(StyleResource::find(doc).is_some());
        assert!(doc.is_highlighted());
    }

    #[test]
    fn enable_is_idempotent() {
        let mut controller = highlighted(article());
        let once = controller.document().to_markup(controller.document().root());
        controller.enable().unwrap();
        controller.run_until_idle();
        let twice = controller.document().to_markup(controller.document().root());
        assert_eq!(once, twice);
    }

    #[test]
    fn enable_then_disable_restores_markup() {
        let doc = article();
        let original = doc.to_markup(doc.root());
        let mut controller = highlighted(doc);
        assert_ne!(controller.document().to_markup(controller.document().root()), original);

        controller.disable().unwrap();
        let doc = controller.document();
        assert_eq!(doc.to_markup(doc.root()), original);
        assert!(StyleResource::find(doc).is_none());
        assert!(!doc.is_highlighted());
    }

    #[test]
    fn disable_mid_scan_leaves_no_annotations() {
        let doc = article();
        let original = doc.to_markup(doc.root());
        let mut controller = StateController::new(doc);
        controller.enable().unwrap();
        for _ in 0..5 {
            controller.poll();
        }
        controller.disable().unwrap();
        controller.run_until_idle();

        let doc = controller.document();
        assert!(word_texts(doc).is_empty(), "stale steps annotated {:?}", word_texts(doc));
        assert_eq!(doc.to_markup(doc.root()), original);
    }

    #[test]
    fn inserted_subtrees_are_annotated_once() {
        let mut controller = highlighted(article());
        let before = word_texts(controller.document()).len();

        let doc = controller.document_mut();
        let aside = doc.create_element("aside");
        let p = doc.create_element("p");
        let text = doc.create_text(STUDY);
        doc.append_child(p, text).unwrap();
        doc.append_child(aside, p).unwrap();
        let body = doc.body();
        doc.append_child(body, aside).unwrap();
        controller.run_until_idle();

        let doc = controller.document();
        let inserted = doc.elements_with_class(aside, WORD_CLASS);
        assert!(!inserted.is_empty());
        assert_eq!(word_texts(doc).len(), before + inserted.len());
        assert!(!doc.has_pending_records(), "annotation writes must not be observed");
    }

    #[test]
    fn insertions_after_disable_are_ignored() {
        let mut controller = highlighted(article());
        controller.disable().unwrap();
        let doc = controller.document_mut();
        let p = doc.create_element("p");
        let text = doc.create_text(SENTENCE);
        doc.append_child(p, text).unwrap();
        let body = doc.body();
        doc.append_child(body, p).unwrap();
        controller.run_until_idle();
        assert!(word_texts(controller.document()).is_empty());
    }

    #[test]
    fn reapply_with_corrections_splits_words() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text("I saw 猫ちゃん today");
        doc.append_child(p, text).unwrap();
        let body = doc.body();
        doc.append_child(body, p).unwrap();

        let mut controller = StateController::new(doc).with_segmenter(Segmenter::regex_only());
        controller.enable().unwrap();
        controller.run_until_idle();
        assert_eq!(word_texts(controller.document()), vec!["猫ちゃん"]);

        controller
            .reapply_with_corrections(vec![Correction::new("猫ちゃん", "猫")])
            .unwrap();
        controller.run_until_idle();
        let doc = controller.document();
        assert_eq!(word_texts(doc), vec!["猫", "ちゃん"]);
        let corrected = doc.elements_with_class(doc.root(), CORRECTED_CLASS);
        assert_eq!(corrected.len(), 1);
        assert_eq!(doc.text_content(corrected[0]), "猫");
        assert_eq!(doc.text_content(p), "I saw 猫ちゃん today");
    }

    #[test]
    fn english_only_document_is_untouched() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text(ENGLISH);
        doc.append_child(p, text).unwrap();
        let body = doc.body();
        doc.append_child(body, p).unwrap();
        let before = doc.to_markup(body);

        let controller = highlighted(doc);
        assert_eq!(controller.document().to_markup(body), before);
        assert!(controller.document().is_attached(text));
    }

    #[test]
    fn activation_reaches_the_lookup_channel() {
        let (tx, rx) = mpsc::channel();
        let mut controller = StateController::new(article()).with_lookup_sink(tx);
        controller.enable().unwrap();
        controller.run_until_idle();

        let doc = controller.document();
        let study = doc
            .elements_with_class(doc.root(), WORD_CLASS)
            .into_iter()
            .find(|w| doc.text_content(*w) == "勉強")
            .expect("勉強 is annotated");
        assert!(controller.activate(study));

        let request = rx.try_recv().unwrap();
        assert_eq!(request.word, "勉強");
        assert_eq!(request.script_type, ScriptType::Kanji);
        assert!(request.context.contains("勉強"), "{:?}", request.context);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn start_applies_stored_configuration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(
            &path,
            r##"{
                "autoHighlight": false,
                "presentation": {"highlightColor": "#C5E1A5", "fontSize": 20, "lineSpacing": 1.6},
                "corrections": [{"originalText": "猫ちゃん", "correctedText": "猫"}]
            }"##,
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();

        let mut controller = StateController::with_config(article(), config.clone());
        controller.start().unwrap();
        let doc = controller.document();
        let body = doc.body();
        assert!(!doc.is_highlighted());
        assert_eq!(doc.style_property(body, "font-size"), Some("20px"));
        assert_eq!(doc.style_property(body, "line-height"), Some("1.6"));
        assert_eq!(controller.corrections().len(), 1);

        let enabled = EngineConfig {
            auto_highlight: true,
            ..config
        };
        let mut controller = StateController::with_config(article(), enabled);
        controller.start().unwrap();
        controller.run_until_idle();
        let doc = controller.document();
        let style = StyleResource::find(doc).expect("style injected");
        assert!(doc.text_content(style).contains("#C5E1A5"));
        assert_has_word(doc, "猫");
    }

    #[test]
    fn wide_nodes_are_not_descended() {
        let mut doc = Document::new();
        let body = doc.body();
        let own = doc.create_text(SENTENCE);
        doc.append_child(body, own).unwrap();
        for _ in 0..149 {
            let p = doc.create_element("p");
            let t = doc.create_text(STUDY);
            doc.append_child(p, t).unwrap();
            doc.append_child(body, p).unwrap();
        }

        let controller = highlighted(doc);
        let doc = controller.document();
        let words = doc.elements_with_class(doc.root(), WORD_CLASS);
        assert!(!words.is_empty());
        assert!(
            words.iter().all(|w| doc.parent(*w) == Some(body)),
            "only the wide node's own text is annotated"
        );
    }

    #[test]
    fn inline_markup_in_long_paragraphs_is_annotated() {
        let mut doc = Document::new();
        let body = doc.body();
        let p = doc.create_element("p");
        doc.append_child(body, p).unwrap();
        let long = doc.create_text("猫と犬と鳥と魚と".repeat(15));
        doc.append_child(p, long).unwrap();
        let em = doc.create_element("em");
        let em_text = doc.create_text(STUDY);
        doc.append_child(em, em_text).unwrap();
        doc.append_child(p, em).unwrap();

        let controller = highlighted(doc);
        let doc = controller.document();
        assert!(doc.children(p).len() > DEFAULT_FAN_OUT_CEILING);
        let nested: Vec<String> = doc
            .elements_with_class(em, WORD_CLASS)
            .into_iter()
            .map(|w| doc.text_content(w))
            .collect();
        assert!(
            nested.contains(&"日本語".to_string()),
            "expected the em to be annotated, got {:?}",
            nested
        );
    }
}
