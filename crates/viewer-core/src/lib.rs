//! Annotation editing core: bounded history, coordinate mapping, per-page
//! gesture handling and the document-level controller that owns state.

pub mod coords;
pub mod history;
pub mod load;
pub mod page;
pub mod viewer;

pub use history::{History, DEFAULT_HISTORY_LIMIT};
pub use load::{LoadTicket, LoadTracker};
pub use page::{Gesture, PageController, PageIntent, PageView};
pub use viewer::{
    Draft, LoadedDocument, Notice, Sidebar, ViewerConfig, ViewerController, ViewerError,
};
