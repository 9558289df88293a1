//! Tree snapshot capture and the local-to-screen transform chain.
//!
//! [`capture_subtree`] copies a subtree out of a live [`UiToolkit`] as a
//! flat depth-first pre-order list of [`NodeSnapshot`]s.  It must run on
//! the UI thread (inside a [`crate::dispatch::UiDispatcher`] round trip)
//! so the walk never races the toolkit's own mutation.
//!
//! Coordinate resolution composes the explicit chain
//! `node -> ancestors -> scene origin -> window origin` instead of
//! assuming a single offset, so nested translation/scaling stays correct.

pub mod element;

pub use element::NodeSnapshot;

use crate::errors::DriverError;
use crate::geometry::{Bounds, Transform};
use crate::toolkit::{NodeId, UiToolkit};

/// Depth guard against malformed parent links; mirrors the stack budget
/// of a recursive walk.
const MAX_TREE_DEPTH: usize = 64;

/// Transform mapping `id`'s local space to absolute screen space, plus
/// the folded visibility of the chain (window, every ancestor, and `id`
/// itself).
///
/// Fails with an argument error when the node is detached or its owning
/// window has closed.
fn local_to_screen(
    tk: &dyn UiToolkit,
    id: NodeId,
    depth: usize,
) -> Result<(Transform, bool), DriverError> {
    if depth > MAX_TREE_DEPTH {
        return Err(DriverError::Argument(format!(
            "ancestor chain of {id:?} exceeds depth {MAX_TREE_DEPTH} (parent cycle?)"
        )));
    }

    let info = tk
        .node(id)
        .ok_or_else(|| DriverError::Argument(format!("node {id:?} is detached")))?;

    match info.parent {
        Some(parent) => {
            let (parent_to_screen, chain_visible) = local_to_screen(tk, parent, depth + 1)?;
            Ok((
                info.transform.then(&parent_to_screen),
                chain_visible && info.visible,
            ))
        }
        None => {
            let win = tk.window(info.window).ok_or_else(|| {
                DriverError::Argument(format!(
                    "window {:?} owning node {id:?} is no longer open",
                    info.window
                ))
            })?;
            let origin = Transform::translation(win.content_origin.x, win.content_origin.y);
            Ok((info.transform.then(&origin), win.visible && info.visible))
        }
    }
}

/// Current on-screen bounds of a node, resolved through the full
/// transform chain.  Re-reads live state on every call.
pub fn screen_bounds(tk: &dyn UiToolkit, id: NodeId) -> Result<Bounds, DriverError> {
    let info = tk
        .node(id)
        .ok_or_else(|| DriverError::Argument(format!("node {id:?} is detached")))?;
    let (to_screen, _) = local_to_screen(tk, id, 0)?;
    Ok(to_screen.apply_bounds(info.local_bounds))
}

/// Whether the node currently belongs to a scene of an open window.
pub fn is_attached(tk: &dyn UiToolkit, id: NodeId) -> bool {
    tk.node(id)
        .map(|info| tk.window(info.window).is_some())
        .unwrap_or(false)
}

/// Copy the subtree rooted at `root` out of the live tree.
///
/// Returns snapshots in depth-first pre-order, each with screen bounds
/// and folded visibility already resolved.  `root` itself may sit
/// arbitrarily deep; its ancestor chain is composed first.
///
/// Fails with an argument error when `root` is detached or its window
/// has closed.  Nodes that vanish mid-walk are skipped, not errors: the
/// snapshot is the tree as observed during this one pass.
pub fn capture_subtree(tk: &dyn UiToolkit, root: NodeId) -> Result<Vec<NodeSnapshot>, DriverError> {
    let info = tk
        .node(root)
        .ok_or_else(|| DriverError::Argument(format!("scope root {root:?} is detached")))?;

    let (parent_to_screen, ancestors_visible) = match info.parent {
        Some(parent) => local_to_screen(tk, parent, 0)?,
        None => {
            let win = tk.window(info.window).ok_or_else(|| {
                DriverError::Argument(format!(
                    "window {:?} owning scope root {root:?} is no longer open",
                    info.window
                ))
            })?;
            (
                Transform::translation(win.content_origin.x, win.content_origin.y),
                win.visible,
            )
        }
    };

    let mut out = Vec::new();
    walk(tk, root, &parent_to_screen, ancestors_visible, 0, &mut out);
    Ok(out)
}

fn walk(
    tk: &dyn UiToolkit,
    id: NodeId,
    parent_to_screen: &Transform,
    ancestors_visible: bool,
    depth: usize,
    out: &mut Vec<NodeSnapshot>,
) {
    if depth > MAX_TREE_DEPTH {
        log::warn!("subtree walk clamped at depth {MAX_TREE_DEPTH}");
        return;
    }
    let Some(info) = tk.node(id) else {
        return;
    };

    let to_screen = info.transform.then(parent_to_screen);
    let visible = ancestors_visible && info.visible;

    out.push(NodeSnapshot {
        id,
        window: info.window,
        kind: info.kind,
        structural_id: info.structural_id,
        style_classes: info.style_classes,
        text: info.text,
        editable: info.editable,
        screen_bounds: to_screen.apply_bounds(info.local_bounds),
        visible,
        depth,
    });

    for child in tk.children(id) {
        walk(tk, child, &to_screen, visible, depth + 1, out);
    }
}

/// Serialize snapshots as JSON for diagnostics.
pub fn dump_json(nodes: &[NodeSnapshot]) -> String {
    serde_json::to_string(nodes).unwrap_or_else(|e| format!("<serialize failed: {e}>"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Point, Transform};
    use crate::headless::{HeadlessToolkit, NodeSpec};

    fn toolkit_with_window() -> (HeadlessToolkit, crate::toolkit::WindowId) {
        let mut tk = HeadlessToolkit::new();
        let w = tk.new_window("main", Bounds::from_size(100.0, 50.0, 400.0, 300.0));
        (tk, w)
    }

    #[test]
    fn test_capture_is_preorder() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        let pane = tk.new_node(root, NodeSpec::pane().bounds(Bounds::from_size(0.0, 0.0, 200.0, 200.0)));
        let a = tk.new_node(pane, NodeSpec::label("a"));
        let b = tk.new_node(pane, NodeSpec::label("b"));
        let sibling = tk.new_node(root, NodeSpec::label("c"));

        let snaps = capture_subtree(&tk, root).unwrap();
        let ids: Vec<_> = snaps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![root, pane, a, b, sibling]);
        assert_eq!(snaps[0].depth, 0);
        assert_eq!(snaps[1].depth, 1);
        assert_eq!(snaps[2].depth, 2);
    }

    #[test]
    fn test_screen_bounds_compose_transform_chain() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        // A pane shifted by (10, 20) inside the scene, scaled by 2.
        let pane = tk.new_node(
            root,
            NodeSpec::pane()
                .bounds(Bounds::from_size(0.0, 0.0, 100.0, 100.0))
                .transform(Transform {
                    scale_x: 2.0,
                    scale_y: 2.0,
                    translate_x: 10.0,
                    translate_y: 20.0,
                }),
        );
        // A label at local (5, 5), size 10x10, inside the scaled pane.
        let label = tk.new_node(
            pane,
            NodeSpec::label("x").bounds(Bounds::from_size(5.0, 5.0, 10.0, 10.0)),
        );

        let origin = tk.window(w).unwrap().content_origin;
        let b = screen_bounds(&tk, label).unwrap();
        // local (5,5)..(15,15) -> pane space doubles and shifts -> scene
        // (20,30)..(40,50) -> screen adds the content origin.
        assert_eq!(b.left, origin.x + 20.0);
        assert_eq!(b.top, origin.y + 30.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 20.0);
    }

    #[test]
    fn test_visibility_folds_down_the_chain() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        let pane = tk.new_node(root, NodeSpec::pane());
        let label = tk.new_node(pane, NodeSpec::label("buried"));
        tk.set_visible(pane, false);

        let snaps = capture_subtree(&tk, root).unwrap();
        let snap = snaps.iter().find(|s| s.id == label).unwrap();
        assert!(!snap.visible, "child of a hidden pane must read invisible");
    }

    #[test]
    fn test_capture_detached_root_is_argument_error() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        let pane = tk.new_node(root, NodeSpec::pane());
        tk.remove_node(pane);

        match capture_subtree(&tk, pane) {
            Err(DriverError::Argument(msg)) => assert!(msg.contains("detached")),
            other => panic!("expected Argument error, got {other:?}"),
        }
    }

    #[test]
    fn test_is_attached_tracks_window_close() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        let label = tk.new_node(root, NodeSpec::label("x"));
        assert!(is_attached(&tk, label));
        tk.close_window(w);
        assert!(!is_attached(&tk, label));
    }

    #[test]
    fn test_dump_json_round_trips_ids() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        tk.new_node(root, NodeSpec::label("hello").id("greeting"));
        let snaps = capture_subtree(&tk, root).unwrap();
        let json = dump_json(&snaps);
        assert!(json.contains("greeting"));
        assert!(json.contains("hello"));
    }

    #[test]
    fn test_degenerate_node_still_resolves() {
        let (mut tk, w) = toolkit_with_window();
        let root = tk.root_of(w);
        let empty = tk.new_node(
            root,
            NodeSpec::pane().bounds(Bounds::from_size(30.0, 40.0, 0.0, 0.0)),
        );
        let origin = tk.window(w).unwrap().content_origin;
        let b = screen_bounds(&tk, empty).unwrap();
        assert!(b.is_degenerate());
        assert_eq!(b.anchor_point(), Point::new(origin.x + 30.0, origin.y + 40.0));
    }
}
