//! JSON import/export of a document's annotation state
//!
//! Import is validated at the boundary: unparseable input is rejected as a
//! whole, while individual malformed records and out-of-range pages are
//! dropped and reported so the rest of the file still lands.

use chrono::{DateTime, Utc};
use doc_model::{
    tags, AnnotationState, CommentId, CommentKind, NormalizedRect, PageComment, PageNumber,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("import must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Annotations,
    Comments,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annotations => f.write_str("annotations"),
            Self::Comments => f.write_str("comments"),
        }
    }
}

/// A record (or whole page/section) dropped during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub section: Section,
    /// Page key as it appeared in the input; `None` when the whole section was malformed.
    pub page_key: Option<String>,
    pub index: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub accepted_annotations: usize,
    pub accepted_comments: usize,
    pub rejected: Vec<RejectedRecord>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub state: AnnotationState,
    pub report: ImportReport,
}

/// Parse and validate an exported annotation file.
///
/// `page_count`, when known, bounds the accepted page numbers.
pub fn parse_import(bytes: &[u8], page_count: Option<u32>) -> Result<ImportOutcome, ImportError> {
    let root = match serde_json::from_slice(bytes)? {
        Value::Object(root) => root,
        other => return Err(ImportError::NotAnObject(json_type_name(&other))),
    };

    let mut state = AnnotationState::default();
    let mut report = ImportReport::default();

    for (page, list) in pages(&root, Section::Annotations, page_count, &mut report) {
        for (index, record) in list.iter().enumerate() {
            match parse_rect(record) {
                Ok(rect) => {
                    state.push_annotation(page.number, rect);
                    report.accepted_annotations += 1;
                }
                Err(reason) => report.rejected.push(RejectedRecord {
                    section: Section::Annotations,
                    page_key: Some(page.key.clone()),
                    index: Some(index),
                    reason,
                }),
            }
        }
    }

    let mut seen_ids = HashSet::new();
    for (page, list) in pages(&root, Section::Comments, page_count, &mut report) {
        for (index, record) in list.iter().enumerate() {
            let parsed = parse_comment(record).and_then(|comment| {
                if seen_ids.insert(comment.id.clone()) {
                    Ok(comment)
                } else {
                    Err(format!("duplicate comment id {:?}", comment.id.as_str()))
                }
            });

            match parsed {
                Ok(comment) => {
                    state.push_comment(page.number, comment);
                    report.accepted_comments += 1;
                }
                Err(reason) => report.rejected.push(RejectedRecord {
                    section: Section::Comments,
                    page_key: Some(page.key.clone()),
                    index: Some(index),
                    reason,
                }),
            }
        }
    }

    Ok(ImportOutcome { state, report })
}

pub fn to_export_json(state: &AnnotationState) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(state)
}

/// File name offered when exporting annotations for `locator`.
pub fn suggested_file_name(locator: &str) -> String {
    let name = locator.rsplit(['/', '\\']).next().unwrap_or(locator);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    if stem.is_empty() {
        "annotations.json".to_owned()
    } else {
        format!("{stem}-annotations.json")
    }
}

struct PageEntry {
    key: String,
    number: PageNumber,
}

fn pages<'a>(
    root: &'a Map<String, Value>,
    section: Section,
    page_count: Option<u32>,
    report: &mut ImportReport,
) -> Vec<(PageEntry, &'a Vec<Value>)> {
    let pages = match root.get(&section.to_string()) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Object(pages)) => pages,
        Some(other) => {
            report.rejected.push(RejectedRecord {
                section,
                page_key: None,
                index: None,
                reason: format!("expected an object of pages, found {}", json_type_name(other)),
            });
            return Vec::new();
        }
    };

    let mut accepted = Vec::new();
    for (key, list) in pages {
        let reject = |reason: String| RejectedRecord {
            section,
            page_key: Some(key.clone()),
            index: None,
            reason,
        };

        let number = match key.trim().parse::<PageNumber>() {
            Ok(number) if number >= 1 => number,
            _ => {
                report.rejected.push(reject(format!("page key {key:?} is not a page number")));
                continue;
            }
        };

        if let Some(count) = page_count {
            if number > count {
                report.rejected.push(reject(format!("page {number} is beyond page count {count}")));
                continue;
            }
        }

        let Value::Array(list) = list else {
            report.rejected.push(reject(format!("expected an array, found {}", json_type_name(list))));
            continue;
        };

        accepted.push((PageEntry { key: key.clone(), number }, list));
    }

    accepted
}

fn parse_rect(record: &Value) -> Result<NormalizedRect, String> {
    let Value::Object(fields) = record else {
        return Err(format!("expected an object, found {}", json_type_name(record)));
    };

    let rect = NormalizedRect::new(
        number_field(fields, "x")?,
        number_field(fields, "y")?,
        number_field(fields, "width")?,
        number_field(fields, "height")?,
    );

    if rect.width < 0.0 || rect.height < 0.0 {
        return Err("width and height must not be negative".to_owned());
    }

    Ok(rect)
}

fn parse_comment(record: &Value) -> Result<PageComment, String> {
    let Value::Object(fields) = record else {
        return Err(format!("expected an object, found {}", json_type_name(record)));
    };

    let id = match fields.get("id") {
        Some(Value::String(id)) if !id.is_empty() => CommentId::new(id.clone()),
        Some(Value::Number(id)) => CommentId::new(id.to_string()),
        _ => return Err("missing or empty \"id\"".to_owned()),
    };

    let kind = fields
        .get("kind")
        .and_then(Value::as_str)
        .and_then(CommentKind::parse)
        .ok_or_else(|| "\"kind\" must be \"comment\" or \"note\"".to_owned())?;

    let text = optional_string_field(fields, "text", "")?;
    let tag = optional_string_field(fields, "tag", tags::NONE)?;

    let created_at = fields
        .get("createdAt")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .ok_or_else(|| "\"createdAt\" must be an ISO-8601 timestamp".to_owned())?;

    Ok(PageComment {
        id,
        kind,
        x: number_field(fields, "x")?,
        y: number_field(fields, "y")?,
        text,
        tag,
        created_at,
    })
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Result<f64, String> {
    fields
        .get(name)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{name:?} must be a finite number"))
}

fn optional_string_field(
    fields: &Map<String, Value>,
    name: &str,
    default: &str,
) -> Result<String, String> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(default.to_owned()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(format!("{name:?} must be a string, found {}", json_type_name(other))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
