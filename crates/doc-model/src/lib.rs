pub mod comment;
pub mod geometry;
pub mod state;

use serde::{Deserialize, Serialize};

pub use comment::{tags, CommentId, CommentKind, PageComment};
pub use geometry::{NormalizedRect, PixelPoint, PixelRect, SurfaceSize};
pub use state::AnnotationState;

/// 1-based page number within the loaded document.
pub type PageNumber = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Select,
    Highlight,
    Comment,
    Note,
}

impl Tool {
    pub fn draws_rectangles(self) -> bool {
        matches!(self, Self::Highlight)
    }

    pub fn comment_kind(self) -> Option<CommentKind> {
        match self {
            Self::Comment => Some(CommentKind::Comment),
            Self::Note => Some(CommentKind::Note),
            Self::Select | Self::Highlight => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Text,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];

impl DocumentKind {
    /// Guess the content kind from the locator's extension. Anything
    /// unrecognised is treated as plain text.
    pub fn detect(locator: &str) -> Self {
        let path = locator.split(['?', '#']).next().unwrap_or(locator);
        let Some((stem, extension)) = path.rsplit_once('.') else {
            return Self::Text;
        };

        if stem.is_empty() || extension.contains('/') {
            return Self::Text;
        }

        let extension = extension.to_ascii_lowercase();
        if extension == "pdf" {
            Self::Pdf
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Self::Image
        } else {
            Self::Text
        }
    }

    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Pdf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub locator: String,
    pub kind: DocumentKind,
}

impl DocumentSource {
    pub fn new(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        let kind = DocumentKind::detect(&locator);
        Self { locator, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub default_tool: Tool,
    pub history_limit: usize,
    pub min_drag_px: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self { theme: Theme::Light, default_tool: Tool::Highlight, history_limit: 100, min_drag_px: 3.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_document_kind_from_extension() {
        assert_eq!(DocumentKind::detect("/docs/report.PDF"), DocumentKind::Pdf);
        assert_eq!(DocumentKind::detect("https://host/scan.jpeg?v=2"), DocumentKind::Image);
        assert_eq!(DocumentKind::detect("notes.txt"), DocumentKind::Text);
    }

    #[test]
    fn unknown_or_missing_extension_falls_back_to_text() {
        assert_eq!(DocumentKind::detect("README"), DocumentKind::Text);
        assert_eq!(DocumentKind::detect("archive.tar.zst"), DocumentKind::Text);
        assert_eq!(DocumentKind::detect("./dir.d/file"), DocumentKind::Text);
        assert_eq!(DocumentKind::detect(".pdf"), DocumentKind::Text);
    }

    #[test]
    fn only_highlight_draws_and_comment_tools_map_to_kinds() {
        assert!(Tool::Highlight.draws_rectangles());
        assert!(!Tool::Select.draws_rectangles());
        assert_eq!(Tool::Note.comment_kind(), Some(CommentKind::Note));
        assert_eq!(Tool::Comment.comment_kind(), Some(CommentKind::Comment));
        assert_eq!(Tool::Highlight.comment_kind(), None);
    }

    #[test]
    fn preferences_fill_missing_fields_with_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"theme":"dark"}"#).expect("valid json");
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.history_limit, Preferences::default().history_limit);
        assert_eq!(prefs.default_tool, Tool::Highlight);
    }
}
