//! Commit gating for circle selections.
//!
//! Edits arrive continuously while the user drags the circle and only
//! refresh the caption. A query is issued on commit, and only if an edit
//! happened since the last accepted commit.

use geo_dashboard_models::{Caption, CircleSelection, GeometryEdit};
use strum_macros::{AsRefStr, Display};

/// Where the controller is in the edit/commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    /// No pending edit; commits are ignored.
    Idle,
    /// An edit happened; the next commit issues a query.
    PendingUpdate,
    /// A commit is being turned into a query.
    Querying,
}

/// Tracks the circle and whether a commit should issue a query.
#[derive(Debug, Clone)]
pub struct SelectionController {
    state: GateState,
    circle: CircleSelection,
    committing: Option<CircleSelection>,
}

impl SelectionController {
    /// Starts idle at `initial`, whose query the caller issues itself.
    #[must_use]
    pub const fn new(initial: CircleSelection) -> Self {
        Self {
            state: GateState::Idle,
            circle: initial,
            committing: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    /// The circle of the last edit or accepted commit.
    #[must_use]
    pub const fn circle(&self) -> CircleSelection {
        self.circle
    }

    /// Records an edit and returns the caption to display.
    pub fn on_edit(&mut self, edit: &GeometryEdit) -> Caption {
        log::trace!("{} edit to {}", edit.kind, Caption::from(&edit.circle));
        self.circle = edit.circle;
        self.state = GateState::PendingUpdate;
        Caption::from(&self.circle)
    }

    /// Handles a commit. Returns the geometry to query with, taken from
    /// the commit itself, or `None` if nothing was edited since the last
    /// accepted commit.
    pub fn on_commit(&mut self, circle: CircleSelection) -> Option<CircleSelection> {
        if self.state != GateState::PendingUpdate {
            log::debug!("Ignoring commit in {} state", self.state);
            return None;
        }
        self.committing = Some(circle);
        self.state = GateState::Querying;
        Some(circle)
    }

    /// Finishes a commit. An accepted commit becomes the current circle.
    /// A rejected one is dropped and the edit stays pending so the next
    /// commit retries it.
    pub fn settle(&mut self, accepted: bool) {
        if self.state != GateState::Querying {
            return;
        }
        let committed = self.committing.take();
        if accepted {
            if let Some(circle) = committed {
                self.circle = circle;
            }
            self.state = GateState::Idle;
        } else {
            self.state = GateState::PendingUpdate;
        }
    }
}
