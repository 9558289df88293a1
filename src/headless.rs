//! In-memory toolkit and robot for tests and CI machines with no display.
//!
//! [`HeadlessToolkit`] keeps a mutable window/node tree behind the same
//! [`UiToolkit`] surface a real platform adapter would expose; tests reach
//! its builder methods through [`UiToolkit::as_any_mut`].  Event handling
//! is a deliberately small model of a real toolkit: character input lands
//! on the focused editable node, a primary-button release refocuses the
//! editable node under the pointer, key releases fan out any registered
//! accelerator follow-ons through the internal queue.
//!
//! [`HeadlessRobot`] closes the loop for input tests: injection posts the
//! event straight back to the dispatcher, and capture rasterizes window
//! fill colors into an [`image::RgbaImage`].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::RgbaImage;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::geometry::{Bounds, Point, Transform};
use crate::toolkit::{
    InputEvent, Key, MouseButton, NodeId, NodeInfo, PlatformRobot, SceneId, UiToolkit, WindowId,
    WindowInfo,
};

/// Vertical chrome (title bar) of a headless window.  The scene's content
/// origin sits this far below the window's top edge.
const TITLE_BAR_HEIGHT: f64 = 24.0;

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const DEFAULT_FILL: [u8; 4] = [255, 255, 255, 255];

// ---------------------------------------------------------------------------
// Node specifications
// ---------------------------------------------------------------------------

/// Declarative description of one node, consumed by
/// [`HeadlessToolkit::new_node`].
#[derive(Debug, Clone)]
pub struct NodeSpec {
    kind: &'static str,
    text: Option<String>,
    editable: bool,
    structural_id: Option<String>,
    style_classes: Vec<String>,
    bounds: Bounds,
    transform: Transform,
}

impl NodeSpec {
    fn base(kind: &'static str, text: Option<String>, editable: bool, bounds: Bounds) -> Self {
        Self {
            kind,
            text,
            editable,
            structural_id: None,
            style_classes: Vec::new(),
            bounds,
            transform: Transform::IDENTITY,
        }
    }

    pub fn pane() -> Self {
        Self::base("Pane", None, false, Bounds::from_size(0.0, 0.0, 200.0, 200.0))
    }

    pub fn label(text: &str) -> Self {
        Self::base(
            "Label",
            Some(text.to_string()),
            false,
            Bounds::from_size(0.0, 0.0, 120.0, 24.0),
        )
    }

    pub fn button(text: &str) -> Self {
        Self::base(
            "Button",
            Some(text.to_string()),
            false,
            Bounds::from_size(0.0, 0.0, 100.0, 28.0),
        )
    }

    /// Editable node; starts with empty (not absent) text.
    pub fn text_field() -> Self {
        Self::base(
            "TextField",
            Some(String::new()),
            true,
            Bounds::from_size(0.0, 0.0, 160.0, 28.0),
        )
    }

    pub fn id(mut self, id: &str) -> Self {
        self.structural_id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.style_classes.push(class.to_string());
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

// ---------------------------------------------------------------------------
// Toolkit
// ---------------------------------------------------------------------------

struct WindowRec {
    id: WindowId,
    scene: SceneId,
    title: String,
    visible: bool,
    bounds: Bounds,
    content_origin: Point,
    root: NodeId,
    fill: [u8; 4],
}

struct NodeRec {
    parent: Option<NodeId>,
    window: WindowId,
    kind: String,
    structural_id: Option<String>,
    style_classes: Vec<String>,
    text: Option<String>,
    editable: bool,
    local_bounds: Bounds,
    transform: Transform,
    visible: bool,
    children: Vec<NodeId>,
}

/// Fully in-memory [`UiToolkit`].
pub struct HeadlessToolkit {
    next_id: u64,
    /// Back-to-front stacking order; the last entry is topmost and focused.
    stacking: Vec<WindowRec>,
    nodes: HashMap<NodeId, NodeRec>,
    primary: Option<WindowId>,
    focused_node: Option<NodeId>,
    accelerators: HashMap<Key, Vec<InputEvent>>,
    queued: Vec<InputEvent>,
    keys_down: HashSet<Key>,
    buttons_down: HashSet<MouseButton>,
    pointer: Point,
    scroll_offset: i64,
    events_processed: u64,
    pending_render_passes: u32,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            stacking: Vec::new(),
            nodes: HashMap::new(),
            primary: None,
            focused_node: None,
            accelerators: HashMap::new(),
            queued: Vec::new(),
            keys_down: HashSet::new(),
            buttons_down: HashSet::new(),
            pointer: Point::new(0.0, 0.0),
            scroll_offset: 0,
            events_processed: 0,
            pending_render_passes: 0,
        }
    }

    fn mint(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Open a window at `bounds` (chrome included) and raise it to the
    /// top of the stack.  The scene's root node spans the content area
    /// below the title bar.
    pub fn new_window(&mut self, title: &str, bounds: Bounds) -> WindowId {
        let id = WindowId(self.mint());
        let scene = SceneId(self.mint());
        let root = NodeId(self.mint());
        self.nodes.insert(
            root,
            NodeRec {
                parent: None,
                window: id,
                kind: "Root".to_string(),
                structural_id: None,
                style_classes: Vec::new(),
                text: None,
                editable: false,
                local_bounds: Bounds::from_size(
                    0.0,
                    0.0,
                    bounds.width(),
                    (bounds.height() - TITLE_BAR_HEIGHT).max(0.0),
                ),
                transform: Transform::IDENTITY,
                visible: true,
                children: Vec::new(),
            },
        );
        self.stacking.push(WindowRec {
            id,
            scene,
            title: title.to_string(),
            visible: true,
            bounds,
            content_origin: Point::new(bounds.left, bounds.top + TITLE_BAR_HEIGHT),
            root,
            fill: DEFAULT_FILL,
        });
        if self.primary.is_none() {
            self.primary = Some(id);
        }
        id
    }

    /// Panics when the window is not open: a fixture pointing at a stale
    /// window is a bug in the test, not a runtime condition.
    pub fn root_of(&self, window: WindowId) -> NodeId {
        match self.stacking.iter().find(|w| w.id == window) {
            Some(w) => w.root,
            None => panic!("root_of: {window:?} is not open"),
        }
    }

    /// Panics when `parent` is detached, so a bad fixture fails loudly
    /// instead of growing an orphan subtree.
    pub fn new_node(&mut self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.mint());
        let window = match self.nodes.get(&parent) {
            Some(p) => p.window,
            None => panic!("new_node: parent {parent:?} is detached"),
        };
        self.nodes.insert(
            id,
            NodeRec {
                parent: Some(parent),
                window,
                kind: spec.kind.to_string(),
                structural_id: spec.structural_id,
                style_classes: spec.style_classes,
                text: spec.text,
                editable: spec.editable,
                local_bounds: spec.bounds,
                transform: spec.transform,
                visible: true,
                children: Vec::new(),
            },
        );
        // Presence was checked above.
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.visible = visible;
        }
    }

    pub fn set_local_bounds(&mut self, node: NodeId, bounds: Bounds) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.local_bounds = bounds;
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.text = Some(text.to_string());
        }
    }

    /// Detach `node` and its whole subtree.
    pub fn remove_node(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(&node).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
        }
        self.remove_subtree(node);
    }

    fn remove_subtree(&mut self, node: NodeId) {
        if let Some(rec) = self.nodes.remove(&node) {
            if self.focused_node == Some(node) {
                self.focused_node = None;
            }
            for child in rec.children {
                self.remove_subtree(child);
            }
        }
    }

    pub fn close_window(&mut self, window: WindowId) {
        if let Some(pos) = self.stacking.iter().position(|w| w.id == window) {
            let rec = self.stacking.remove(pos);
            self.remove_subtree(rec.root);
        }
    }

    pub fn focus_node(&mut self, node: NodeId) {
        if self.nodes.contains_key(&node) {
            self.focused_node = Some(node);
        }
    }

    /// Solid color the window rasterizes as in [`Self::render_region`].
    pub fn set_window_fill(&mut self, window: WindowId, fill: [u8; 4]) {
        if let Some(w) = self.stacking.iter_mut().find(|w| w.id == window) {
            w.fill = fill;
        }
    }

    /// Register follow-on events emitted when `key` is released.
    pub fn set_accelerator(&mut self, key: Key, follow_ons: Vec<InputEvent>) {
        self.accelerators.insert(key, follow_ons);
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn scroll_offset(&self) -> i64 {
        self.scroll_offset
    }

    pub fn buttons_down(&self) -> HashSet<MouseButton> {
        self.buttons_down.clone()
    }

    pub fn text_of(&self, node: NodeId) -> Option<String> {
        self.nodes.get(&node).and_then(|n| n.text.clone())
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    /// Rasterize a screen rectangle: each pixel takes the fill of the
    /// topmost visible window covering it, or the background.
    pub fn render_region(&self, region: Bounds) -> RgbaImage {
        let width = region.width().max(0.0) as u32;
        let height = region.height().max(0.0) as u32;
        RgbaImage::from_fn(width, height, |x, y| {
            let p = Point::new(region.left + x as f64 + 0.5, region.top + y as f64 + 0.5);
            let fill = self
                .stacking
                .iter()
                .rev()
                .find(|w| w.visible && w.bounds.contains(p))
                .map(|w| w.fill)
                .unwrap_or(BACKGROUND);
            image::Rgba(fill)
        })
    }

    fn window_rec(&self, id: WindowId) -> Option<&WindowRec> {
        self.stacking.iter().find(|w| w.id == id)
    }

    fn info(&self, rec: &WindowRec) -> WindowInfo {
        WindowInfo {
            id: rec.id,
            scene: rec.scene,
            title: rec.title.clone(),
            visible: rec.visible,
            focused: self.stacking.last().map(|w| w.id) == Some(rec.id),
            bounds: rec.bounds,
            content_origin: rec.content_origin,
        }
    }

    fn type_into_focused(&mut self, scene: SceneId, character: char) {
        let owner = match self.stacking.iter().find(|w| w.scene == scene) {
            Some(w) => w.id,
            None => return,
        };
        let target = match self.focused_node {
            Some(id) => id,
            None => return,
        };
        if let Some(n) = self.nodes.get_mut(&target) {
            if n.window == owner && n.editable {
                if let Some(text) = n.text.as_mut() {
                    text.push(character);
                }
                self.pending_render_passes += 1;
            }
        }
    }

    fn focus_editable_under_pointer(&mut self) {
        let pointer = self.pointer;
        let window = match self
            .stacking
            .iter()
            .rev()
            .find(|w| w.visible && w.bounds.contains(pointer))
        {
            Some(w) => w.id,
            None => return,
        };
        let hit = self
            .nodes
            .iter()
            .filter(|(_, n)| n.window == window && n.editable)
            .map(|(id, _)| *id)
            .find(|id| {
                crate::tree::screen_bounds(self, *id)
                    .map(|b| b.contains(pointer))
                    .unwrap_or(false)
            });
        if let Some(id) = hit {
            self.focused_node = Some(id);
        }
    }
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl UiToolkit for HeadlessToolkit {
    fn windows(&self) -> Vec<WindowInfo> {
        self.stacking.iter().map(|w| self.info(w)).collect()
    }

    fn primary_window(&self) -> Option<WindowId> {
        self.primary
            .filter(|id| self.window_rec(*id).is_some())
            .or_else(|| self.stacking.first().map(|w| w.id))
    }

    fn window(&self, id: WindowId) -> Option<WindowInfo> {
        self.window_rec(id).map(|w| self.info(w))
    }

    fn window_of_scene(&self, scene: SceneId) -> Option<WindowId> {
        self.stacking.iter().find(|w| w.scene == scene).map(|w| w.id)
    }

    fn root_node(&self, window: WindowId) -> Option<NodeId> {
        self.window_rec(window).map(|w| w.root)
    }

    fn node(&self, id: NodeId) -> Option<NodeInfo> {
        self.nodes.get(&id).map(|n| NodeInfo {
            id,
            parent: n.parent,
            window: n.window,
            kind: n.kind.clone(),
            structural_id: n.structural_id.clone(),
            style_classes: n.style_classes.clone(),
            text: n.text.clone(),
            editable: n.editable,
            local_bounds: n.local_bounds,
            transform: n.transform,
            visible: n.visible,
        })
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn process_event(&mut self, event: InputEvent) {
        self.events_processed += 1;
        match event {
            InputEvent::KeyPress(key) => {
                self.keys_down.insert(key);
            }
            InputEvent::KeyRelease(key) => {
                self.keys_down.remove(&key);
                if let Some(follow_ons) = self.accelerators.get(&key) {
                    self.queued.extend(follow_ons.iter().copied());
                }
            }
            InputEvent::CharType {
                scene, character, ..
            } => self.type_into_focused(scene, character),
            InputEvent::MouseMove(p) => self.pointer = p,
            InputEvent::MousePress(button) => {
                self.buttons_down.insert(button);
            }
            InputEvent::MouseRelease(button) => {
                self.buttons_down.remove(&button);
                if button == MouseButton::Primary {
                    self.focus_editable_under_pointer();
                }
            }
            InputEvent::Scroll(notches) => self.scroll_offset += i64::from(notches),
        }
    }

    fn take_queued(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.queued)
    }

    fn flush_render(&mut self) {
        self.pending_render_passes = 0;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// [`PlatformRobot`] that short-circuits injection back into the
/// dispatcher's event queue and captures pixels via
/// [`HeadlessToolkit::render_region`].
pub struct HeadlessRobot {
    dispatcher: Arc<UiDispatcher>,
}

impl HeadlessRobot {
    pub fn new(dispatcher: Arc<UiDispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl PlatformRobot for HeadlessRobot {
    fn inject(&mut self, event: InputEvent) -> Result<(), DriverError> {
        self.dispatcher
            .post_event(event)
            .map_err(|e| DriverError::Input(format!("headless injection failed: {e}")))
    }

    fn capture_region(&mut self, region: Bounds) -> Result<RgbaImage, DriverError> {
        self.dispatcher.run(move |tk| {
            tk.as_any_mut()
                .downcast_mut::<HeadlessToolkit>()
                .map(|h| h.render_region(region))
                .ok_or_else(|| {
                    DriverError::Capture("capture target is not a headless toolkit".into())
                })
        })?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
