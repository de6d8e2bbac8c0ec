use serde::{Deserialize, Serialize};

use crate::{
    document::{Document, NodeId},
    errors::{Error, Result},
    pipeline::{ACTIVATED_CLASS, CORRECTED_CLASS, WORD_CLASS},
};

/// Identifier of the injected `<style>` element.
pub const STYLE_ELEMENT_ID: &str = "kotoba-highlight-style";

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFF59D";
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_LINE_SPACING: f32 = 1.2;

const HOVER_COLOR: &str = "#FFEE58";

/// Host-supplied display preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Presentation {
    pub highlight_color: String,
    pub font_size: f32,
    pub line_spacing: f32,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }
}

impl Presentation {
    pub fn stylesheet(&self) -> String {
        format!(
            ".{WORD_CLASS} {{ background-color: {color}; border-radius: 3px; padding: 0 2px; margin: 0 1px; \
             box-shadow: 0 0 2px rgba(0,0,0,0.2); transition: background-color 0.3s; cursor: pointer; position: relative; }}\n\
             .{WORD_CLASS}:hover {{ background-color: {HOVER_COLOR}; }}\n\
             .{WORD_CLASS}.{ACTIVATED_CLASS} {{ background-color: {HOVER_COLOR}; box-shadow: 0 0 4px rgba(0,0,0,0.4); }}\n\
             .{WORD_CLASS}.{CORRECTED_CLASS} {{ border-bottom: 1px dashed rgba(0,0,0,0.4); }}\n",
            color = self.highlight_color,
        )
    }
}

pub fn validate_color(color: &str) -> Result<()> {
    let color = color.trim();
    if color.is_empty() {
        return Err(Error::InvalidPresentation("highlight color is empty".into()));
    }
    if color.contains([';', '{', '}', '<', '>']) {
        return Err(Error::InvalidPresentation(format!(
            "highlight color {color:?} contains CSS delimiters"
        )));
    }
    Ok(())
}

pub fn validate_font_size(px: f32) -> Result<()> {
    if !px.is_finite() || px <= 0.0 {
        return Err(Error::InvalidPresentation(format!("font size {px}")));
    }
    Ok(())
}

pub fn validate_line_spacing(multiplier: f32) -> Result<()> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(Error::InvalidPresentation(format!(
            "line spacing {multiplier}"
        )));
    }
    Ok(())
}

/// The single injected style element, looked up by [`STYLE_ELEMENT_ID`].
pub struct StyleResource;

impl StyleResource {
    pub fn find(doc: &Document) -> Option<NodeId> {
        doc.element_by_id(STYLE_ELEMENT_ID)
    }

    /// Inject the style element unless one is already present.
    pub fn inject(doc: &mut Document, presentation: &Presentation) -> Result<NodeId> {
        if let Some(existing) = Self::find(doc) {
            return Ok(existing);
        }
        let style = doc.create_element("style");
        doc.set_attribute(style, "id", STYLE_ELEMENT_ID)?;
        let text = doc.create_text(presentation.stylesheet());
        doc.append_child(style, text)?;
        let head = doc.head();
        doc.without_records(|doc| doc.append_child(head, style))?;
        Ok(style)
    }

    /// Rewrite the stylesheet text in place; a no-op when nothing is injected.
    pub fn update(doc: &mut Document, presentation: &Presentation) -> Result<bool> {
        let Some(style) = Self::find(doc) else {
            return Ok(false);
        };
        match doc.children(style).first().copied() {
            Some(text) if doc.is_text(text) => doc.set_text(text, presentation.stylesheet())?,
            _ => {
                let text = doc.create_text(presentation.stylesheet());
                doc.without_records(|doc| doc.append_child(style, text))?;
            }
        }
        Ok(true)
    }

    pub fn remove(doc: &mut Document) -> Result<bool> {
        let Some(style) = Self::find(doc) else {
            return Ok(false);
        };
        doc.remove(style)?;
        Ok(true)
    }
}

/// Font size and line height live on the body, independent of highlighting.
pub fn apply_document_properties(doc: &mut Document, presentation: &Presentation) -> Result<()> {
    let body = doc.body();
    doc.set_style_property(body, "font-size", format!("{}px", presentation.font_size))?;
    doc.set_style_property(body, "line-height", presentation.line_spacing.to_string())?;
    Ok(())
}
