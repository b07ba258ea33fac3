//! Page comments and notes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag vocabulary offered by the comment editor. Stored tags are free-form.
pub mod tags {
    pub const NONE: &str = "None";
    pub const IMPORTANT: &str = "Important";
    pub const TODO: &str = "Todo";
    pub const QUESTION: &str = "Question";
    pub const IDEA: &str = "Idea";

    pub const VOCABULARY: [&str; 5] = [NONE, IMPORTANT, TODO, QUESTION, IDEA];

    pub fn is_known_tag(tag: &str) -> bool {
        VOCABULARY.contains(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Comment,
    Note,
}

impl CommentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "comment" => Some(Self::Comment),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

/// Identifier of a comment record.
///
/// Imported records keep whatever id they were saved with; new records get a
/// random UUID v4.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageComment {
    pub id: CommentId,
    pub kind: CommentKind,
    /// Normalized position on the page
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub tag: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl PageComment {
    /// Fresh, empty record as created by a comment or note tool click.
    pub fn new(kind: CommentKind, x: f64, y: f64) -> Self {
        Self {
            id: CommentId::generate(),
            kind,
            x,
            y,
            text: String::new(),
            tag: tags::NONE.to_owned(),
            created_at: Utc::now(),
        }
    }
}
