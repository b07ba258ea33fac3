//! Per-document annotation state
//!
//! Two page-keyed mappings of ordered sequences. Insertion order is display
//! order; a page missing from a mapping reads as an empty sequence. The state
//! is plain owned data, so `Clone` produces an independent deep copy that is
//! safe to use as a history snapshot.

use crate::comment::{CommentId, PageComment};
use crate::geometry::NormalizedRect;
use crate::PageNumber;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationState {
    #[serde(default)]
    pub annotations: BTreeMap<PageNumber, Vec<NormalizedRect>>,
    #[serde(default)]
    pub comments: BTreeMap<PageNumber, Vec<PageComment>>,
}

impl AnnotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_annotations(&self, page: PageNumber) -> &[NormalizedRect] {
        self.annotations.get(&page).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn page_comments(&self, page: PageNumber) -> &[PageComment] {
        self.comments.get(&page).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn push_annotation(&mut self, page: PageNumber, rect: NormalizedRect) {
        self.annotations.entry(page).or_default().push(rect);
    }

    pub fn push_comment(&mut self, page: PageNumber, comment: PageComment) {
        self.comments.entry(page).or_default().push(comment);
    }

    pub fn comment(&self, page: PageNumber, id: &CommentId) -> Option<&PageComment> {
        self.page_comments(page).iter().find(|comment| &comment.id == id)
    }

    /// Replace text and tag of a record, leaving its identity, kind, position
    /// and timestamp alone. Returns `false` when no such record exists.
    pub fn update_comment(
        &mut self,
        page: PageNumber,
        id: &CommentId,
        text: impl Into<String>,
        tag: impl Into<String>,
    ) -> bool {
        let Some(comment) =
            self.comments.get_mut(&page).and_then(|list| list.iter_mut().find(|c| &c.id == id))
        else {
            return false;
        };

        comment.text = text.into();
        comment.tag = tag.into();
        true
    }

    pub fn remove_comment(&mut self, page: PageNumber, id: &CommentId) -> Option<PageComment> {
        let list = self.comments.get_mut(&page)?;
        let index = list.iter().position(|comment| &comment.id == id)?;
        let removed = list.remove(index);

        if list.is_empty() {
            self.comments.remove(&page);
        }

        Some(removed)
    }

    /// All comments carrying `tag`, in page order then display order.
    pub fn comments_tagged(&self, tag: &str) -> Vec<(PageNumber, &PageComment)> {
        self.comments
            .iter()
            .flat_map(|(page, list)| list.iter().map(move |comment| (*page, comment)))
            .filter(|(_, comment)| comment.tag == tag)
            .collect()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.values().map(Vec::len).sum()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.annotation_count() == 0 && self.comment_count() == 0
    }

    /// Drop every page outside `1..=page_count`.
    pub fn retain_pages(&mut self, page_count: u32) {
        let in_range = |page: &PageNumber| (1..=page_count).contains(page);
        self.annotations.retain(|page, _| in_range(page));
        self.comments.retain(|page, _| in_range(page));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{tags, CommentKind};

    fn rect(x: f64) -> NormalizedRect {
        NormalizedRect::new(x, 0.1, 0.2, 0.2)
    }

    #[test]
    fn missing_page_reads_as_empty() {
        let state = AnnotationState::new();
        assert!(state.page_annotations(3).is_empty());
        assert!(state.page_comments(3).is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn annotations_keep_insertion_order_and_allow_duplicates() {
        let mut state = AnnotationState::new();
        state.push_annotation(1, rect(0.3));
        state.push_annotation(1, rect(0.1));
        state.push_annotation(1, rect(0.1));

        let xs: Vec<f64> = state.page_annotations(1).iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![0.3, 0.1, 0.1]);
        assert_eq!(state.annotation_count(), 3);
    }

    #[test]
    fn update_comment_preserves_identity_fields() {
        let mut state = AnnotationState::new();
        let comment = PageComment::new(CommentKind::Comment, 0.4, 0.6);
        let original = comment.clone();
        state.push_comment(2, comment);

        assert!(state.update_comment(2, &original.id, "hello", tags::IDEA));

        let updated = state.comment(2, &original.id).expect("comment should exist");
        assert_eq!(updated.text, "hello");
        assert_eq!(updated.tag, "Idea");
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.kind, original.kind);
        assert_eq!((updated.x, updated.y), (original.x, original.y));
        assert_eq!(updated.created_at, original.created_at);
    }

    #[test]
    fn update_or_remove_unknown_comment_changes_nothing() {
        let mut state = AnnotationState::new();
        state.push_comment(1, PageComment::new(CommentKind::Note, 0.1, 0.1));
        let before = state.clone();

        let missing = CommentId::new("missing");
        assert!(!state.update_comment(1, &missing, "x", "Todo"));
        assert!(!state.update_comment(7, &missing, "x", "Todo"));
        assert!(state.remove_comment(1, &missing).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn removing_last_comment_drops_page_entry() {
        let mut state = AnnotationState::new();
        let comment = PageComment::new(CommentKind::Note, 0.1, 0.1);
        let id = comment.id.clone();
        state.push_comment(4, comment);

        assert!(state.remove_comment(4, &id).is_some());
        assert!(!state.comments.contains_key(&4));
    }

    #[test]
    fn comments_tagged_walks_pages_in_order() {
        let mut state = AnnotationState::new();
        for page in [3, 1] {
            let mut comment = PageComment::new(CommentKind::Comment, 0.0, 0.0);
            comment.tag = tags::TODO.to_owned();
            state.push_comment(page, comment);
        }
        state.push_comment(2, PageComment::new(CommentKind::Comment, 0.0, 0.0));

        let pages: Vec<PageNumber> =
            state.comments_tagged(tags::TODO).into_iter().map(|(page, _)| page).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn retain_pages_drops_out_of_range_entries() {
        let mut state = AnnotationState::new();
        state.push_annotation(1, rect(0.1));
        state.push_annotation(5, rect(0.1));
        state.push_comment(0, PageComment::new(CommentKind::Note, 0.0, 0.0));

        state.retain_pages(3);

        assert_eq!(state.annotations.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(state.comments.is_empty());
    }

    #[test]
    fn page_keys_serialize_as_strings() {
        let mut state = AnnotationState::new();
        state.push_annotation(2, NormalizedRect::new(0.0, 0.0, 0.2, 0.2));

        let json = serde_json::to_value(&state).expect("serializable");
        assert!(json["annotations"]["2"].is_array());
        assert_eq!(json["comments"], serde_json::json!({}));

        let back: AnnotationState = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, state);
    }

    #[test]
    fn clone_is_independent() {
        let mut state = AnnotationState::new();
        state.push_annotation(1, rect(0.1));
        let snapshot = state.clone();

        state.push_annotation(1, rect(0.2));
        assert_eq!(snapshot.page_annotations(1).len(), 1);
    }
}
