//! Load generations for document opens
//!
//! Each open begins a new generation. Completions carrying an older ticket are
//! stale and must be dropped, so a slow first load can never overwrite the
//! document the user switched to afterwards.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    locator: String,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

#[derive(Debug, Default)]
pub struct LoadTracker {
    generation: u64,
    pending: Option<u64>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, superseding whatever was in flight.
    pub fn begin(&mut self, locator: impl Into<String>) -> LoadTicket {
        self.generation += 1;
        self.pending = Some(self.generation);
        LoadTicket { generation: self.generation, locator: locator.into() }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.pending == Some(ticket.generation)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept a completion. Returns `false` for stale or already-finished tickets.
    pub fn finish(&mut self, ticket: &LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.pending = None;
        true
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
