//! Per-page pointer handling
//!
//! A `PageController` owns one rendered page surface. It reads a copy of the
//! page's canonical annotations, interprets pointer input for the active tool
//! and emits [`PageIntent`]s. It never mutates canonical state: moving or
//! resizing an existing rectangle only changes how this controller draws it
//! until the next [`PageController::receive`].

use crate::coords::{
    clamp_to_surface, exceeds_threshold, point_to_normalized, point_to_pixels, rect_from_corners,
    to_normalized, to_pixels, DEFAULT_MIN_DRAG_PX,
};
use doc_model::{
    CommentId, CommentKind, DocumentKind, NormalizedRect, PageComment, PageNumber, PixelPoint,
    PixelRect, SurfaceSize, Tool,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Hit radius around a rectangle's bottom-right corner that starts a resize
pub const RESIZE_HANDLE_PX: f64 = 6.0;

/// Hit radius around a comment marker
pub const COMMENT_MARKER_PX: f64 = 10.0;

/// Read-only copy of one page's canonical collections for a render pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageView {
    pub page: PageNumber,
    pub annotations: Vec<NormalizedRect>,
    pub comments: Vec<PageComment>,
}

/// Desired state change, applied only by the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum PageIntent {
    CreateAnnotation { page: PageNumber, rect: NormalizedRect },
    RequestComment { page: PageNumber, x: f64, y: f64, kind: CommentKind },
    SelectComment { page: PageNumber, id: CommentId },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    Drawing { origin: PixelPoint, current: PixelPoint },
    Dragging { index: usize, grab_offset: PixelPoint, rect: PixelRect },
    Resizing { index: usize, anchor: PixelPoint, rect: PixelRect },
}

#[derive(Debug)]
pub struct PageController {
    page: PageNumber,
    surface: Option<SurfaceSize>,
    view: PageView,
    gesture: Gesture,
    overrides: BTreeMap<usize, NormalizedRect>,
    min_drag_px: f64,
}

impl PageController {
    pub fn new(page: PageNumber) -> Self {
        Self {
            page,
            surface: None,
            view: PageView { page, ..PageView::default() },
            gesture: Gesture::Idle,
            overrides: BTreeMap::new(),
            min_drag_px: DEFAULT_MIN_DRAG_PX,
        }
    }

    pub fn with_min_drag_px(mut self, min_drag_px: f64) -> Self {
        self.min_drag_px = min_drag_px.max(0.0);
        self
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn surface(&self) -> Option<SurfaceSize> {
        self.surface
    }

    pub fn set_surface(&mut self, surface: SurfaceSize) {
        self.surface = Some(surface);
    }

    /// Take a fresh copy of canonical state. Local move/resize previews are
    /// discarded; canonical geometry wins on redraw.
    pub fn receive(&mut self, view: PageView) {
        if view.page != self.page {
            debug!(expected = self.page, received = view.page, "ignoring view for another page");
            return;
        }

        self.view = view;
        self.overrides.clear();

        if matches!(self.gesture, Gesture::Dragging { .. } | Gesture::Resizing { .. }) {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn view(&self) -> &PageView {
        &self.view
    }

    pub fn pointer_down(&mut self, point: PixelPoint, tool: Tool) {
        if self.laid_out_surface().is_none() {
            return;
        }

        self.gesture = match tool {
            Tool::Highlight => Gesture::Drawing { origin: point, current: point },
            Tool::Select => self.grab_existing(point).unwrap_or(Gesture::Idle),
            Tool::Comment | Tool::Note => Gesture::Idle,
        };
    }

    pub fn pointer_move(&mut self, point: PixelPoint) {
        self.gesture = match self.gesture {
            Gesture::Idle => Gesture::Idle,
            Gesture::Drawing { origin, .. } => Gesture::Drawing { origin, current: point },
            Gesture::Dragging { index, grab_offset, rect } => Gesture::Dragging {
                index,
                grab_offset,
                rect: PixelRect { left: point.x - grab_offset.x, top: point.y - grab_offset.y, ..rect },
            },
            Gesture::Resizing { index, anchor, .. } => {
                Gesture::Resizing { index, anchor, rect: rect_from_corners(anchor, point) }
            }
        };
    }

    /// Finish the gesture. Only a completed draw of non-trivial size yields an
    /// intent; moves and resizes stay local to this controller.
    pub fn pointer_up(&mut self, point: PixelPoint) -> Option<PageIntent> {
        self.pointer_move(point);
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let surface = self.laid_out_surface()?;

        match gesture {
            Gesture::Idle => None,
            Gesture::Drawing { origin, current } => {
                let rect = clamp_to_surface(rect_from_corners(origin, current), surface);
                self.creation_intent(rect, surface)
            }
            Gesture::Dragging { index, rect, .. } | Gesture::Resizing { index, rect, .. } => {
                if let Some(normalized) = to_normalized(rect, surface) {
                    self.overrides.insert(index, normalized);
                }
                None
            }
        }
    }

    pub fn cancel_gesture(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Single click: place a comment/note, or pick an existing marker with the
    /// select tool.
    pub fn click(&self, point: PixelPoint, tool: Tool) -> Option<PageIntent> {
        let surface = self.laid_out_surface()?;

        if let Some(kind) = tool.comment_kind() {
            let (x, y) = point_to_normalized(point, surface)?;
            return Some(PageIntent::RequestComment { page: self.page, x, y, kind });
        }

        if tool != Tool::Select {
            return None;
        }

        self.comment_markers()
            .into_iter()
            .rev()
            .find(|(_, marker)| marker.distance_to(&point) <= COMMENT_MARKER_PX)
            .map(|(id, _)| PageIntent::SelectComment { page: self.page, id })
    }

    /// Highlight captured from a text selection rather than a drag. Only
    /// applies to plain-text content; the bounds go through the same
    /// normalization as a drawn rectangle.
    pub fn text_selection(
        &self,
        bounds: PixelRect,
        tool: Tool,
        content: DocumentKind,
    ) -> Option<PageIntent> {
        if !tool.draws_rectangles() || content != DocumentKind::Text {
            return None;
        }

        let surface = self.laid_out_surface()?;
        self.creation_intent(clamp_to_surface(bounds, surface), surface)
    }

    /// Stored rectangles in current pixels, with local move/resize previews applied.
    pub fn render_rects(&self) -> Vec<PixelRect> {
        let Some(surface) = self.surface else {
            return Vec::new();
        };

        self.view
            .annotations
            .iter()
            .enumerate()
            .map(|(index, rect)| to_pixels(*self.overrides.get(&index).unwrap_or(rect), surface))
            .collect()
    }

    /// Rectangle currently under the pointer, if a gesture is in progress.
    pub fn preview_rect(&self) -> Option<PixelRect> {
        match self.gesture {
            Gesture::Idle => None,
            Gesture::Drawing { origin, current } => {
                let surface = self.surface?;
                Some(clamp_to_surface(rect_from_corners(origin, current), surface))
            }
            Gesture::Dragging { rect, .. } | Gesture::Resizing { rect, .. } => Some(rect),
        }
    }

    pub fn comment_markers(&self) -> Vec<(CommentId, PixelPoint)> {
        let Some(surface) = self.surface else {
            return Vec::new();
        };

        self.view
            .comments
            .iter()
            .map(|comment| (comment.id.clone(), point_to_pixels(comment.x, comment.y, surface)))
            .collect()
    }

    fn laid_out_surface(&self) -> Option<SurfaceSize> {
        self.surface.filter(SurfaceSize::is_laid_out)
    }

    fn grab_existing(&self, point: PixelPoint) -> Option<Gesture> {
        let rects = self.render_rects();
        let (index, rect) = rects.into_iter().enumerate().rev().find(|(_, rect)| {
            rect.contains(&point) || rect.bottom_right().distance_to(&point) <= RESIZE_HANDLE_PX
        })?;

        if rect.bottom_right().distance_to(&point) <= RESIZE_HANDLE_PX {
            let anchor = PixelPoint::new(rect.left, rect.top);
            return Some(Gesture::Resizing { index, anchor, rect });
        }

        let grab_offset = PixelPoint::new(point.x - rect.left, point.y - rect.top);
        Some(Gesture::Dragging { index, grab_offset, rect })
    }

    fn creation_intent(&self, rect: PixelRect, surface: SurfaceSize) -> Option<PageIntent> {
        if !exceeds_threshold(rect, self.min_drag_px) {
            debug!(page = self.page, ?rect, "discarding sub-threshold rectangle");
            return None;
        }

        let rect = to_normalized(rect, surface)?;
        Some(PageIntent::CreateAnnotation { page: self.page, rect })
    }
}
