//! Point location: turning bounds, nodes, scenes, and windows into
//! absolute screen coordinates.
//!
//! A [`PointQuery`] is deferred: it stores an anchor plus accumulated
//! offsets and resolves lazily.  Resolution re-reads the anchor's
//! *current* bounds through the UI thread, so two resolutions of the same
//! query after the UI has moved may differ -- intentionally, the locator
//! tracks the current target, not a frozen snapshot.

use std::sync::Arc;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::geometry::{Bounds, Point};
use crate::tree;
use crate::toolkit::{NodeId, SceneId, UiToolkit, WindowId};

/// The base reference a [`PointQuery`] is anchored at.
#[derive(Debug, Clone, Copy)]
pub enum PointAnchor {
    /// Fixed rectangle; resolves to its anchor point (center, or the
    /// minimum corner when degenerate).
    Bounds(Bounds),
    /// Identity passthrough.
    Point(Point),
    /// A node's current on-screen bounds, resolved through the full
    /// ancestor transform chain at resolution time.
    Node(NodeId),
    /// Center of the scene's current screen bounds.
    Scene(SceneId),
    /// Center of the window's current screen bounds.
    Window(WindowId),
}

/// A deferred coordinate computation: anchor plus pending offsets.
#[derive(Clone)]
pub struct PointQuery {
    dispatcher: Arc<UiDispatcher>,
    anchor: PointAnchor,
    dx: f64,
    dy: f64,
}

impl PointQuery {
    /// Add a relative offset.  Chainable; offsets accumulate.
    pub fn at_offset(mut self, dx: f64, dy: f64) -> Self {
        self.dx += dx;
        self.dy += dy;
        self
    }

    /// Resolve to one absolute screen coordinate against current bounds.
    ///
    /// Degenerate bounds resolve to the minimum corner rather than
    /// failing.  An anchor whose node/scene/window has gone away is an
    /// argument error.
    pub fn resolve(&self) -> Result<Point, DriverError> {
        let base = match self.anchor {
            PointAnchor::Point(p) => p,
            PointAnchor::Bounds(b) => b.anchor_point(),
            PointAnchor::Node(id) => self
                .dispatcher
                .run(move |tk| tree::screen_bounds(tk, id))??
                .anchor_point(),
            PointAnchor::Scene(scene) => self
                .dispatcher
                .run(move |tk| scene_screen_bounds(tk, scene))??
                .anchor_point(),
            PointAnchor::Window(window) => self
                .dispatcher
                .run(move |tk| {
                    tk.window(window).map(|w| w.bounds).ok_or_else(|| {
                        DriverError::Argument(format!("window {window:?} is no longer open"))
                    })
                })??
                .anchor_point(),
        };
        Ok(base.translated(self.dx, self.dy))
    }
}

/// Current screen bounds of a scene: its root node's bounds.
fn scene_screen_bounds(tk: &dyn UiToolkit, scene: SceneId) -> Result<Bounds, DriverError> {
    let window = tk
        .window_of_scene(scene)
        .ok_or_else(|| DriverError::Argument(format!("{scene:?} is no longer hosted")))?;
    let root = tk
        .root_node(window)
        .ok_or_else(|| DriverError::Argument(format!("{scene:?} has no root node")))?;
    tree::screen_bounds(tk, root)
}

/// Factory for [`PointQuery`]s.  Pure construction; all live reads are
/// deferred to resolution.
pub struct PointLocator {
    dispatcher: Arc<UiDispatcher>,
}

impl PointLocator {
    pub fn new(dispatcher: Arc<UiDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn point_for(&self, anchor: PointAnchor) -> PointQuery {
        PointQuery {
            dispatcher: self.dispatcher.clone(),
            anchor,
            dx: 0.0,
            dy: 0.0,
        }
    }

    /// Anchor at a previously captured node.  The snapshot's identity is
    /// used, not its frozen bounds: resolution re-reads the live tree.
    pub fn point_for_node(&self, node: &crate::tree::NodeSnapshot) -> PointQuery {
        self.point_for(PointAnchor::Node(node.id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::headless::{HeadlessToolkit, NodeSpec};

    struct Fixture {
        locator: PointLocator,
        dispatcher: Arc<UiDispatcher>,
        window: WindowId,
        label: NodeId,
    }

    fn fixture() -> Fixture {
        let mut tk = HeadlessToolkit::new();
        let w = tk.new_window("main", Bounds::from_size(100.0, 100.0, 400.0, 300.0));
        let root = tk.root_of(w);
        let label = tk.new_node(
            root,
            NodeSpec::label("x").bounds(Bounds::from_size(10.0, 10.0, 20.0, 20.0)),
        );
        let dispatcher = UiDispatcher::spawn(Box::new(tk)).unwrap();
        Fixture {
            locator: PointLocator::new(dispatcher.clone()),
            dispatcher,
            window: w,
            label,
        }
    }

    #[test]
    fn test_point_passthrough_with_chained_offsets() {
        let fx = fixture();
        let p = fx
            .locator
            .point_for(PointAnchor::Point(Point::new(5.0, 5.0)))
            .at_offset(10.0, 0.0)
            .at_offset(0.0, -2.0)
            .resolve()
            .unwrap();
        assert_eq!(p, Point::new(15.0, 3.0));
    }

    #[test]
    fn test_bounds_anchor_is_center() {
        let fx = fixture();
        let p = fx
            .locator
            .point_for(PointAnchor::Bounds(Bounds::new(0.0, 0.0, 10.0, 10.0)))
            .resolve()
            .unwrap();
        assert_eq!(p, Point::new(5.0, 5.0));
    }

    #[test]
    fn test_node_anchor_is_screen_center() {
        let fx = fixture();
        let origin = fx
            .dispatcher
            .run({
                let w = fx.window;
                move |tk| tk.window(w).unwrap().content_origin
            })
            .unwrap();
        let p = fx
            .locator
            .point_for(PointAnchor::Node(fx.label))
            .resolve()
            .unwrap();
        // label local (10,10)..(30,30), center (20,20), plus the origin.
        assert_eq!(p, Point::new(origin.x + 20.0, origin.y + 20.0));
    }

    #[test]
    fn test_resolution_tracks_ui_movement() {
        let fx = fixture();
        let query = fx.locator.point_for(PointAnchor::Node(fx.label));
        let before = query.resolve().unwrap();
        fx.dispatcher
            .run({
                let id = fx.label;
                move |tk| {
                    tk.as_any_mut()
                        .downcast_mut::<HeadlessToolkit>()
                        .unwrap()
                        .set_local_bounds(id, Bounds::from_size(110.0, 10.0, 20.0, 20.0));
                }
            })
            .unwrap();
        let after = query.resolve().unwrap();
        assert_eq!(after, Point::new(before.x + 100.0, before.y));
    }

    #[test]
    fn test_degenerate_bounds_resolve_to_min_corner() {
        let fx = fixture();
        let p = fx
            .locator
            .point_for(PointAnchor::Bounds(Bounds::new(7.0, 9.0, 7.0, 9.0)))
            .resolve()
            .unwrap();
        assert_eq!(p, Point::new(7.0, 9.0));
    }

    #[test]
    fn test_window_and_scene_anchors() {
        let fx = fixture();
        let window_point = fx
            .locator
            .point_for(PointAnchor::Window(fx.window))
            .resolve()
            .unwrap();
        assert_eq!(window_point, Point::new(300.0, 250.0));

        let scene = fx
            .dispatcher
            .run({
                let w = fx.window;
                move |tk| tk.window(w).unwrap().scene
            })
            .unwrap();
        let scene_point = fx
            .locator
            .point_for(PointAnchor::Scene(scene))
            .resolve()
            .unwrap();
        // The scene root sits inside the window chrome, so its center is
        // not the window's.
        assert_ne!(scene_point, window_point);
    }

    #[test]
    fn test_vanished_node_anchor_is_argument_error() {
        let fx = fixture();
        let query = fx.locator.point_for(PointAnchor::Node(fx.label));
        fx.dispatcher
            .run({
                let id = fx.label;
                move |tk| {
                    tk.as_any_mut()
                        .downcast_mut::<HeadlessToolkit>()
                        .unwrap()
                        .remove_node(id);
                }
            })
            .unwrap();
        assert!(matches!(query.resolve(), Err(DriverError::Argument(_))));
    }
}
