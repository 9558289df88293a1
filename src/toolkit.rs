//! Injected platform capabilities: the UI toolkit accessor and the
//! primitive input robot.
//!
//! The core never talks to a real GUI toolkit or OS input layer directly.
//! It consumes two trait objects supplied by the embedder:
//!
//! - [`UiToolkit`] -- read access to the live window/node tree plus event
//!   processing and render flushing.  Exclusively owned by the UI thread
//!   spawned in [`crate::dispatch`]; nothing else ever holds a reference.
//! - [`PlatformRobot`] -- input-event injection and pixel capture at the
//!   platform level.  Injection does not round-trip through the UI thread.
//!
//! All id types are opaque `u64` newtypes minted by the toolkit.
//! [`WindowId`]s are minted monotonically, so their `Ord` is creation
//! order -- the documented sort key for ordered window listings.

use std::any::Any;

use serde::Serialize;

use crate::errors::DriverError;
use crate::geometry::{Bounds, Point, Transform};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Handle to a top-level window.  Ordering is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WindowId(pub u64);

/// Handle to the scene (node-tree root container) owned by one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SceneId(pub u64);

/// Handle to one node of a window's visual tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u64);

// ---------------------------------------------------------------------------
// Owned window/node records
// ---------------------------------------------------------------------------

/// Owned snapshot of one top-level window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    pub id: WindowId,
    /// The one scene this window hosts.
    pub scene: SceneId,
    pub title: String,
    pub visible: bool,
    pub focused: bool,
    /// Full window rectangle in screen coordinates, chrome included.
    pub bounds: Bounds,
    /// Screen position of the scene's local origin (inside any chrome).
    pub content_origin: Point,
}

/// Live record of one node, read under the UI-thread lock.
///
/// `text` is `None` for nodes with no text capability; `Some("")` is a
/// text-bearing node that currently displays nothing.  `local_bounds` is
/// in the node's own coordinate space; `transform` maps that space into
/// the parent's (or the scene's, for a root node).
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub window: WindowId,
    /// Control-type name, e.g. "Button", "Label", "Pane".
    pub kind: String,
    /// Structural id, addressable as `#id` in selector queries.
    pub structural_id: Option<String>,
    /// Style classes, addressable as `.class` in selector queries.
    pub style_classes: Vec<String>,
    pub text: Option<String>,
    /// Whether the node accepts character input.
    pub editable: bool,
    pub local_bounds: Bounds,
    pub transform: Transform,
    pub visible: bool,
}

// ---------------------------------------------------------------------------
// Input events and devices
// ---------------------------------------------------------------------------

/// A keyboard key.  `Char` covers printable keys; the rest are the named
/// keys the robot state machine tracks individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Escape,
    Space,
    Backspace,
    Delete,
    Shift,
    Control,
    Alt,
    Meta,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Function(u8),
}

/// A mouse button with its own press/release state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

/// One synthetic input event, as injected by a [`PlatformRobot`] and
/// consumed by [`UiToolkit::process_event`] on the UI thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPress(Key),
    KeyRelease(Key),
    /// A complete character-input event directed at a specific scene,
    /// distinct from raw press/release.  Used for text entry.
    CharType {
        scene: SceneId,
        key: Key,
        character: char,
    },
    MouseMove(Point),
    MousePress(MouseButton),
    MouseRelease(MouseButton),
    /// Signed notch count; sign encodes direction.
    Scroll(i32),
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Read/process access to the live UI state.
///
/// Implementations are handed to [`crate::dispatch::UiDispatcher::spawn`],
/// which moves them onto the dedicated UI thread.  Every method here runs
/// on that thread only.
pub trait UiToolkit: Send {
    /// All open windows in the toolkit's enumeration order (typically
    /// stacking order).  Not the deterministic order -- callers wanting
    /// stability sort by [`WindowId`].
    fn windows(&self) -> Vec<WindowInfo>;

    /// The implementation-defined primary window, used when no explicit
    /// target has been set.
    fn primary_window(&self) -> Option<WindowId>;

    fn window(&self, id: WindowId) -> Option<WindowInfo>;

    /// The window owning `scene`, if the scene is still hosted.
    fn window_of_scene(&self, scene: SceneId) -> Option<WindowId>;

    /// Root node of the window's scene.
    fn root_node(&self, window: WindowId) -> Option<NodeId>;

    /// Live lookup; `None` once the node is detached.
    fn node(&self, id: NodeId) -> Option<NodeInfo>;

    fn children(&self, id: NodeId) -> Vec<NodeId>;

    /// Apply one injected event to the UI state.
    fn process_event(&mut self, event: InputEvent);

    /// Drain events the toolkit queued internally while processing (e.g.
    /// accelerator-triggered follow-ons).  The dispatcher re-feeds these
    /// through [`Self::process_event`] before taking the next job.
    fn take_queued(&mut self) -> Vec<InputEvent>;

    /// Complete all pending layout/render passes so pixel capture reflects
    /// the latest committed frame.
    fn flush_render(&mut self);

    /// Downcast hook so embedder-specific surfaces (window builders in a
    /// headless toolkit, say) stay reachable from lifecycle callbacks.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Platform-level input injection and pixel capture.
///
/// Failures are unrecoverable for the triggering call; the robot layer
/// propagates them and never proceeds as if the input succeeded.
pub trait PlatformRobot: Send {
    fn inject(&mut self, event: InputEvent) -> Result<(), DriverError>;

    /// Pixel snapshot of an absolute screen rectangle.  The caller has
    /// already flushed pending render passes via the UI thread.
    fn capture_region(&mut self, region: Bounds) -> Result<image::RgbaImage, DriverError>;
}
