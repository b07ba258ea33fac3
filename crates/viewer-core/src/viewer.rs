//! Document-level controller
//!
//! `ViewerController` is the only writer of canonical annotation state. Page
//! controllers hand it intents; every mutation snapshots the prior state into
//! history first, then applies the change, then persists.

use crate::history::History;
use crate::load::{LoadTicket, LoadTracker};
use crate::page::{PageController, PageIntent, PageView};
use doc_model::{
    tags, AnnotationState, CommentId, CommentKind, DocumentSource, NormalizedRect, PageComment,
    PageNumber, Preferences, Theme, Tool,
};
use storage::{ImportError, ImportReport, StorageBackend, StorageError};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: PageNumber, page_count: u32 },
    #[error("rectangle has non-finite coordinates")]
    InvalidGeometry,
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("export failed: {0}")]
    Export(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Maximum undo steps kept; 0 keeps everything.
    pub history_limit: usize,
    pub min_drag_px: f64,
    pub default_tool: Tool,
    pub theme: Theme,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::from(&Preferences::default())
    }
}

impl From<&Preferences> for ViewerConfig {
    fn from(preferences: &Preferences) -> Self {
        Self {
            history_limit: preferences.history_limit,
            min_drag_px: preferences.min_drag_px,
            default_tool: preferences.default_tool,
            theme: preferences.theme,
        }
    }
}

impl ViewerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_min_drag_px(mut self, min_drag_px: f64) -> Self {
        self.min_drag_px = min_drag_px;
        self
    }

    pub fn with_default_tool(mut self, tool: Tool) -> Self {
        self.default_tool = tool;
        self
    }
}

/// Text and tag being edited in the sidebar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    pub tag: String,
}

impl Default for Draft {
    fn default() -> Self {
        Self { text: String::new(), tag: tags::NONE.to_owned() }
    }
}

impl Draft {
    fn from_comment(comment: &PageComment) -> Self {
        Self { text: comment.text.clone(), tag: comment.tag.clone() }
    }
}

/// Comment editing panel. At most one record is selected per document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Sidebar {
    #[default]
    Closed,
    Open { page: PageNumber, selected: Option<CommentId>, draft: Draft },
}

impl Sidebar {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn selected(&self) -> Option<(PageNumber, &CommentId)> {
        match self {
            Self::Open { page, selected: Some(id), .. } => Some((*page, id)),
            _ => None,
        }
    }
}

/// User-facing message the embedding UI should surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ImportFailed { reason: String },
    ImportPartial { accepted: usize, rejected: usize },
    LoadFailed { locator: String, reason: String },
    /// Persisted records on pages past the end of the loaded document were
    /// discarded; they are removed from storage on the next write.
    RecordsDropped { locator: String, page_count: u32, annotations: usize, comments: usize },
    /// A write to storage failed. In-memory state still holds the change.
    PersistFailed { locator: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub source: DocumentSource,
    pub page_count: u32,
}

pub struct ViewerController {
    storage: Box<dyn StorageBackend>,
    config: ViewerConfig,
    state: AnnotationState,
    history: History<AnnotationState>,
    document: Option<LoadedDocument>,
    loads: LoadTracker,
    tool: Tool,
    theme: Theme,
    sidebar: Sidebar,
    notices: Vec<Notice>,
}

impl ViewerController {
    pub fn new(storage: Box<dyn StorageBackend>, config: ViewerConfig) -> Self {
        Self {
            storage,
            history: History::new(config.history_limit),
            tool: config.default_tool,
            theme: config.theme,
            config,
            state: AnnotationState::default(),
            document: None,
            loads: LoadTracker::new(),
            sidebar: Sidebar::Closed,
            notices: Vec::new(),
        }
    }

    /// Build a controller configured from the preferences saved in `storage`.
    pub fn with_saved_preferences(backend: Box<dyn StorageBackend>) -> Self {
        let preferences = storage::load_preferences(backend.as_ref()).unwrap_or_else(|error| {
            warn!(?error, "failed to load preferences, using defaults");
            Preferences::default()
        });

        Self::new(backend, ViewerConfig::from(&preferences))
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            theme: self.theme,
            default_tool: self.tool,
            history_limit: self.config.history_limit,
            min_drag_px: self.config.min_drag_px,
        }
    }

    pub fn save_preferences(&mut self) -> Result<(), ViewerError> {
        let preferences = self.preferences();
        storage::save_preferences(self.storage.as_mut(), &preferences)?;
        Ok(())
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Switch to a new document source. The returned ticket must accompany
    /// the load completion; completions for superseded tickets are ignored.
    pub fn open_document(&mut self, locator: impl Into<String>) -> LoadTicket {
        let ticket = self.loads.begin(locator);
        info!(locator = ticket.locator(), generation = ticket.generation(), "opening document");

        self.document = None;
        self.state = AnnotationState::default();
        self.history.clear();
        self.sidebar = Sidebar::Closed;
        ticket
    }

    /// Finish a load started by [`Self::open_document`]. Returns `false` when the
    /// ticket was superseded.
    pub fn complete_load(&mut self, ticket: &LoadTicket, page_count: u32) -> bool {
        if !self.loads.finish(ticket) {
            debug!(
                locator = ticket.locator(),
                generation = ticket.generation(),
                "dropping stale load completion"
            );
            return false;
        }

        let source = DocumentSource::new(ticket.locator());
        let mut state = storage::load_state(self.storage.as_ref(), &source.locator);

        let before = (state.annotation_count(), state.comment_count());
        state.retain_pages(page_count);
        let annotations = before.0 - state.annotation_count();
        let comments = before.1 - state.comment_count();
        if annotations + comments > 0 {
            warn!(
                locator = %source.locator,
                page_count,
                annotations,
                comments,
                "dropped persisted records beyond page count"
            );
            self.notices.push(Notice::RecordsDropped {
                locator: source.locator.clone(),
                page_count,
                annotations,
                comments,
            });
        }

        info!(
            locator = %source.locator,
            page_count,
            annotations = state.annotation_count(),
            comments = state.comment_count(),
            "document loaded"
        );

        self.state = state;
        self.history.clear();
        self.sidebar = Sidebar::Closed;
        self.document = Some(LoadedDocument { source, page_count });
        true
    }

    pub fn fail_load(&mut self, ticket: &LoadTicket, reason: impl Into<String>) {
        if !self.loads.finish(ticket) {
            return;
        }

        let reason = reason.into();
        warn!(locator = ticket.locator(), %reason, "document load failed");
        self.notices.push(Notice::LoadFailed { locator: ticket.locator().to_owned(), reason });
    }

    /// Controller for one rendered page, seeded with its current view and the
    /// configured drag threshold.
    pub fn page_controller(&self, page: PageNumber) -> PageController {
        let mut controller = PageController::new(page).with_min_drag_px(self.config.min_drag_px);
        controller.receive(self.page_view(page));
        controller
    }

    /// Read-only copy of one page for a render pass.
    pub fn page_view(&self, page: PageNumber) -> PageView {
        PageView {
            page,
            annotations: self.state.page_annotations(page).to_vec(),
            comments: self.state.page_comments(page).to_vec(),
        }
    }

    pub fn apply(&mut self, intent: PageIntent) -> Result<(), ViewerError> {
        debug!(?intent, "applying intent");

        match intent {
            PageIntent::CreateAnnotation { page, rect } => self.create_annotation(page, rect),
            PageIntent::RequestComment { page, x, y, kind } => {
                self.request_comment(page, x, y, kind).map(|_| ())
            }
            PageIntent::SelectComment { page, id } => self.select_comment(page, &id).map(|_| ()),
        }
    }

    pub fn create_annotation(
        &mut self,
        page: PageNumber,
        rect: NormalizedRect,
    ) -> Result<(), ViewerError> {
        self.check_page(page)?;
        if !rect.is_finite() {
            return Err(ViewerError::InvalidGeometry);
        }

        self.record();
        self.state.push_annotation(page, rect);
        self.persist();
        Ok(())
    }

    /// Add an empty comment or note and focus the sidebar on it.
    pub fn request_comment(
        &mut self,
        page: PageNumber,
        x: f64,
        y: f64,
        kind: CommentKind,
    ) -> Result<CommentId, ViewerError> {
        self.check_page(page)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(ViewerError::InvalidGeometry);
        }

        let comment = PageComment::new(kind, x, y);
        let id = comment.id.clone();

        self.record();
        self.state.push_comment(page, comment);
        self.persist();

        self.sidebar = Sidebar::Open { page, selected: Some(id.clone()), draft: Draft::default() };
        Ok(id)
    }

    /// Focus the sidebar on an existing record. Does not touch stored state.
    pub fn select_comment(&mut self, page: PageNumber, id: &CommentId) -> Result<bool, ViewerError> {
        self.check_page(page)?;

        let Some(comment) = self.state.comment(page, id) else {
            debug!(page, %id, "select for unknown comment ignored");
            return Ok(false);
        };

        self.sidebar =
            Sidebar::Open { page, selected: Some(id.clone()), draft: Draft::from_comment(comment) };
        Ok(true)
    }

    /// Replace a record's text and tag. A missing record (for example one
    /// removed by an undo in the meantime) is a no-op and returns `false`.
    pub fn save_comment(
        &mut self,
        page: PageNumber,
        id: &CommentId,
        text: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<bool, ViewerError> {
        self.check_page(page)?;

        if self.state.comment(page, id).is_none() {
            debug!(page, %id, "save for unknown comment ignored");
            return Ok(false);
        }

        let (text, tag) = (text.into(), tag.into());

        self.record();
        self.state.update_comment(page, id, text.clone(), tag.clone());
        self.persist();

        if let Sidebar::Open { selected: Some(selected), draft, .. } = &mut self.sidebar {
            if *selected == *id {
                *draft = Draft { text, tag };
            }
        }

        Ok(true)
    }

    pub fn delete_comment(&mut self, page: PageNumber, id: &CommentId) -> Result<bool, ViewerError> {
        self.check_page(page)?;

        if self.state.comment(page, id).is_none() {
            debug!(page, %id, "delete for unknown comment ignored");
            return Ok(false);
        }

        self.record();
        self.state.remove_comment(page, id);
        self.persist();

        if let Sidebar::Open { selected, draft, .. } = &mut self.sidebar {
            *selected = None;
            *draft = Draft::default();
        }

        Ok(true)
    }

    pub fn update_draft(&mut self, text: impl Into<String>, tag: impl Into<String>) {
        if let Sidebar::Open { draft, .. } = &mut self.sidebar {
            *draft = Draft { text: text.into(), tag: tag.into() };
        }
    }

    /// Save the sidebar draft into the selected record.
    pub fn save_draft(&mut self) -> Result<bool, ViewerError> {
        let Sidebar::Open { page, selected: Some(id), draft } = &self.sidebar else {
            return Ok(false);
        };

        let (page, id, draft) = (*page, id.clone(), draft.clone());
        self.save_comment(page, &id, draft.text, draft.tag)
    }

    pub fn close_sidebar(&mut self) {
        self.sidebar = Sidebar::Closed;
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(&self.state) else {
            return false;
        };

        self.state = previous;
        self.after_restore();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(&self.state) else {
            return false;
        };

        self.state = next;
        self.after_restore();
        true
    }

    pub fn export_snapshot(&self) -> AnnotationState {
        self.state.clone()
    }

    pub fn export_json(&self) -> Result<String, ViewerError> {
        Ok(storage::to_export_json(&self.state)?)
    }

    pub fn export_file_name(&self) -> Option<String> {
        self.document.as_ref().map(|document| storage::suggested_file_name(&document.source.locator))
    }

    /// Replace all annotations and comments with the contents of an export.
    ///
    /// Unparseable input leaves state untouched and queues
    /// [`Notice::ImportFailed`]. Otherwise invalid records are dropped, listed
    /// in the report and summarised in [`Notice::ImportPartial`].
    ///
    /// A failed write to storage is returned as [`ViewerError::Storage`] after
    /// the imported state has replaced the in-memory state; `undo` reverts it.
    pub fn import_json(&mut self, bytes: &[u8]) -> Result<ImportReport, ViewerError> {
        let page_count = self.document.as_ref().ok_or(ViewerError::NoDocument)?.page_count;

        let outcome = match storage::parse_import(bytes, Some(page_count)) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(?error, "import rejected");
                self.notices.push(Notice::ImportFailed { reason: error.to_string() });
                return Err(error.into());
            }
        };

        self.record();
        self.state = outcome.state;
        self.reconcile_sidebar();

        let report = outcome.report;
        if !report.is_clean() {
            warn!(rejected = report.rejected.len(), "import dropped invalid records");
            self.notices.push(Notice::ImportPartial {
                accepted: report.accepted_annotations + report.accepted_comments,
                rejected: report.rejected.len(),
            });
        }

        if let Err(error) = self.store() {
            self.persist_failed(&error);
            return Err(error.into());
        }

        Ok(report)
    }

    fn check_page(&self, page: PageNumber) -> Result<(), ViewerError> {
        let page_count = self.document.as_ref().ok_or(ViewerError::NoDocument)?.page_count;

        if page == 0 || page > page_count {
            return Err(ViewerError::PageOutOfRange { page, page_count });
        }

        Ok(())
    }

    fn record(&mut self) {
        self.history.push_state(&self.state);
    }

    fn persist(&mut self) {
        if let Err(error) = self.store() {
            self.persist_failed(&error);
        }
    }

    fn store(&mut self) -> Result<(), StorageError> {
        match &self.document {
            Some(document) => {
                storage::save_state(self.storage.as_mut(), &document.source.locator, &self.state)
            }
            None => Ok(()),
        }
    }

    fn persist_failed(&mut self, error: &StorageError) {
        let locator = self
            .document
            .as_ref()
            .map(|document| document.source.locator.clone())
            .unwrap_or_default();

        warn!(?error, %locator, "failed to persist annotations");
        self.notices.push(Notice::PersistFailed { locator, reason: error.to_string() });
    }

    fn after_restore(&mut self) {
        self.persist();
        self.reconcile_sidebar();
    }

    /// Drop a sidebar selection whose record no longer exists.
    fn reconcile_sidebar(&mut self) {
        let Sidebar::Open { page, selected, draft } = &mut self.sidebar else {
            return;
        };

        match selected.as_ref().and_then(|id| self.state.comment(*page, id)) {
            Some(comment) => *draft = Draft::from_comment(comment),
            None => {
                *selected = None;
                *draft = Draft::default();
            }
        }
    }
}

impl Default for ViewerController {
    fn default() -> Self {
        Self::new(Box::new(storage::MemoryStorage::new()), ViewerConfig::default())
    }
}
