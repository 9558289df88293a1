//! Data structures for a single captured tree node.
//!
//! [`NodeSnapshot`] is an owned copy of everything a query needs from one
//! node, taken during a single UI-thread pass.  It is fully `Send` and
//! `Serialize` -- no live toolkit references are held, and screen bounds
//! are already resolved through the full ancestor transform chain.

use serde::Serialize;

use crate::geometry::{Bounds, Point};
use crate::toolkit::{NodeId, WindowId};

/// An owned snapshot of one node, in depth-first pre-order position.
///
/// `visible` folds the node's own flag with every ancestor's and the
/// owning window's, so a snapshot of a child inside a hidden pane reads
/// as invisible.  Snapshots are recomputed per query and must not be
/// retained across UI mutation.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub window: WindowId,
    pub kind: String,
    pub structural_id: Option<String>,
    pub style_classes: Vec<String>,
    pub text: Option<String>,
    pub editable: bool,
    /// Bounds in absolute screen coordinates.
    pub screen_bounds: Bounds,
    pub visible: bool,
    pub depth: usize,
}

impl NodeSnapshot {
    /// Whether the node bears display text (label or text input).
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// Center of the on-screen bounds.
    pub fn center(&self) -> Point {
        self.screen_bounds.center()
    }
}
