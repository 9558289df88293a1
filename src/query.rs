//! Node queries over a live UI tree.
//!
//! A [`NodeQuery`] is a closed tagged union -- selector text, predicate,
//! or generic matcher -- dispatched through one resolution function
//! instead of overloaded entry points.  [`NodeFinder`] resolves queries
//! against a snapshot taken in a single UI-thread round trip: the subtree
//! is copied out under the UI thread's exclusive ownership, then filtered
//! on the calling thread, never iterated concurrently with live mutation.
//!
//! # Selector syntax
//!
//! - `#id` -- structural-id match.
//! - `.class` -- style-class match.
//! - anything else -- exact match against the display text of
//!   label-bearing or text-input-bearing nodes.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::tree::{self, NodeSnapshot};
use crate::toolkit::NodeId;
use crate::window::{WindowFinder, WindowTarget};

/// Caller-supplied predicate over an owned node snapshot.
pub type NodePredicate = Arc<dyn Fn(&NodeSnapshot) -> bool + Send + Sync>;

/// A generic matcher.  Unlike a predicate, a matcher may reject a node as
/// *inapplicable* (an argument error) rather than merely non-matching.
pub trait NodeMatcher: Send + Sync {
    /// Human-readable description, used in error messages.
    fn description(&self) -> String;

    fn matches(&self, node: &NodeSnapshot) -> Result<bool, DriverError>;
}

/// A declarative node query; immutable, supplied per call.
#[derive(Clone)]
pub enum NodeQuery {
    /// Selector text (see module docs for the syntax).
    Selector(String),
    Predicate {
        description: String,
        predicate: NodePredicate,
    },
    Matcher(Arc<dyn NodeMatcher>),
}

impl NodeQuery {
    pub fn selector(text: impl Into<String>) -> Self {
        NodeQuery::Selector(text.into())
    }

    pub fn predicate(
        description: impl Into<String>,
        predicate: impl Fn(&NodeSnapshot) -> bool + Send + Sync + 'static,
    ) -> Self {
        NodeQuery::Predicate {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matcher(matcher: impl NodeMatcher + 'static) -> Self {
        NodeQuery::Matcher(Arc::new(matcher))
    }

    /// Description used in error messages.
    pub fn description(&self) -> String {
        match self {
            NodeQuery::Selector(s) => s.clone(),
            NodeQuery::Predicate { description, .. } => description.clone(),
            NodeQuery::Matcher(m) => m.description(),
        }
    }
}

impl fmt::Debug for NodeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeQuery::Selector(s) => f.debug_tuple("Selector").field(s).finish(),
            NodeQuery::Predicate { description, .. } => {
                f.debug_tuple("Predicate").field(description).finish()
            }
            NodeQuery::Matcher(m) => f.debug_tuple("Matcher").field(&m.description()).finish(),
        }
    }
}

/// The single dispatch point for all three query kinds.
fn query_matches(query: &NodeQuery, node: &NodeSnapshot) -> Result<bool, DriverError> {
    match query {
        NodeQuery::Selector(text) => Ok(selector_matches(text, node)),
        NodeQuery::Predicate { predicate, .. } => Ok(predicate(node)),
        NodeQuery::Matcher(matcher) => matcher.matches(node),
    }
}

fn selector_matches(text: &str, node: &NodeSnapshot) -> bool {
    if let Some(id) = text.strip_prefix('#') {
        node.structural_id.as_deref() == Some(id)
    } else if let Some(class) = text.strip_prefix('.') {
        node.style_classes.iter().any(|c| c == class)
    } else {
        node.has_text() && node.text.as_deref() == Some(text)
    }
}

/// Matches nodes whose display text equals the expected string.
///
/// Strict per the error taxonomy: applying it to a node with no text
/// capability is an argument error, not a non-match.  Scope such queries
/// to text-bearing subtrees, or use a selector (which skips text-less
/// nodes) for tree-wide text search.
pub struct TextEquals(pub String);

impl NodeMatcher for TextEquals {
    fn description(&self) -> String {
        format!("text == \"{}\"", self.0)
    }

    fn matches(&self, node: &NodeSnapshot) -> Result<bool, DriverError> {
        match node.text.as_deref() {
            Some(text) => Ok(text == self.0),
            None => Err(DriverError::Argument(format!(
                "text-equality matcher applied to {} node {:?} with no text capability",
                node.kind, node.id
            ))),
        }
    }
}

/// Resolves declarative queries against the tree rooted at the current
/// target window (or an explicit scope node).
pub struct NodeFinder {
    dispatcher: Arc<UiDispatcher>,
    windows: Arc<WindowFinder>,
}

impl NodeFinder {
    pub fn new(dispatcher: Arc<UiDispatcher>, windows: Arc<WindowFinder>) -> Self {
        Self { dispatcher, windows }
    }

    /// The full ordered match set (depth-first pre-order).  Never fails
    /// on empty: zero matches is an empty vector.
    pub fn nodes(&self, query: &NodeQuery) -> Result<Vec<NodeSnapshot>, DriverError> {
        let snapshot = self.snapshot_default_scope()?;
        select(query, &snapshot)
    }

    /// The first traversal-order match that is also visible.
    ///
    /// Zero structural matches fail with [`DriverError::NoMatch`];
    /// matches that are all invisible fail with
    /// [`DriverError::NoVisibleMatch`] -- distinct, to aid diagnosis.
    pub fn node(&self, query: &NodeQuery) -> Result<NodeSnapshot, DriverError> {
        let snapshot = self.snapshot_default_scope()?;
        first_visible(query, &snapshot)
    }

    /// [`Self::nodes`] restricted to the subtree rooted at `scope`.
    /// A detached scope node is an argument error.
    pub fn nodes_in(
        &self,
        query: &NodeQuery,
        scope: NodeId,
    ) -> Result<Vec<NodeSnapshot>, DriverError> {
        let snapshot = self.snapshot_scope(scope)?;
        select(query, &snapshot)
    }

    /// [`Self::node`] restricted to the subtree rooted at `scope`.
    pub fn node_in(&self, query: &NodeQuery, scope: NodeId) -> Result<NodeSnapshot, DriverError> {
        let snapshot = self.snapshot_scope(scope)?;
        first_visible(query, &snapshot)
    }

    /// Root node of a window target, without changing the stored target.
    pub fn root(&self, target: WindowTarget) -> Result<NodeSnapshot, DriverError> {
        let window = self.windows.resolve(&target)?;
        let root = self
            .dispatcher
            .run(move |tk| tk.root_node(window))?
            .ok_or_else(|| {
                DriverError::Argument(format!("window {window:?} has no scene root"))
            })?;
        let mut snapshot = self.snapshot_scope(root)?;
        // Pre-order: the scope root is always the first entry.
        Ok(snapshot.remove(0))
    }

    fn snapshot_default_scope(&self) -> Result<Vec<NodeSnapshot>, DriverError> {
        let window = self.windows.last_target_window()?.id;
        let root = self
            .dispatcher
            .run(move |tk| tk.root_node(window))?
            .ok_or_else(|| {
                DriverError::Argument(format!("window {window:?} has no scene root"))
            })?;
        self.snapshot_scope(root)
    }

    fn snapshot_scope(&self, root: NodeId) -> Result<Vec<NodeSnapshot>, DriverError> {
        self.dispatcher.run(move |tk| tree::capture_subtree(tk, root))?
    }
}

fn select(query: &NodeQuery, snapshot: &[NodeSnapshot]) -> Result<Vec<NodeSnapshot>, DriverError> {
    let mut matches = Vec::new();
    for node in snapshot {
        if query_matches(query, node)? {
            matches.push(node.clone());
        }
    }
    Ok(matches)
}

fn first_visible(
    query: &NodeQuery,
    snapshot: &[NodeSnapshot],
) -> Result<NodeSnapshot, DriverError> {
    let matches = select(query, snapshot)?;
    if matches.is_empty() {
        log::debug!(
            "query `{}` matched 0 of {} snapshot nodes",
            query.description(),
            snapshot.len()
        );
        return Err(DriverError::NoMatch {
            query: query.description(),
        });
    }

    matches
        .iter()
        .find(|n| n.visible && !n.screen_bounds.is_degenerate())
        .cloned()
        .ok_or_else(|| DriverError::NoVisibleMatch {
            query: query.description(),
            matched: matches.len(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::headless::{HeadlessToolkit, NodeSpec};
    use crate::toolkit::UiToolkit;

    struct Fixture {
        finder: NodeFinder,
        dispatcher: Arc<UiDispatcher>,
    }

    /// One window holding a pane with two labels ("save" visible,
    /// "discard" hidden), a text field, and a bare pane with no text.
    fn fixture() -> Fixture {
        let mut tk = HeadlessToolkit::new();
        let w = tk.new_window("main", Bounds::from_size(0.0, 0.0, 640.0, 480.0));
        let root = tk.root_of(w);
        let pane = tk.new_node(root, NodeSpec::pane().id("toolbar").class("bar"));
        tk.new_node(pane, NodeSpec::button("save").id("save-button").class("primary"));
        let discard = tk.new_node(pane, NodeSpec::button("discard").class("primary"));
        tk.set_visible(discard, false);
        tk.new_node(root, NodeSpec::text_field().id("name-field"));

        let dispatcher = UiDispatcher::spawn(Box::new(tk)).unwrap();
        let windows = Arc::new(WindowFinder::new(dispatcher.clone()));
        Fixture {
            finder: NodeFinder::new(dispatcher.clone(), windows),
            dispatcher,
        }
    }

    #[test]
    fn test_nodes_never_fails_on_empty() {
        let fx = fixture();
        let matches = fx
            .finder
            .nodes(&NodeQuery::selector("#no-such-id"))
            .unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_selector_id_and_class_and_text() {
        let fx = fixture();
        let by_id = fx.finder.node(&NodeQuery::selector("#save-button")).unwrap();
        assert_eq!(by_id.text.as_deref(), Some("save"));

        let by_class = fx.finder.nodes(&NodeQuery::selector(".primary")).unwrap();
        assert_eq!(by_class.len(), 2);

        let by_text = fx.finder.node(&NodeQuery::selector("save")).unwrap();
        assert_eq!(by_text.id, by_id.id);
    }

    #[test]
    fn test_node_text_query_returns_node_with_that_text() {
        let fx = fixture();
        let node = fx.finder.node(&NodeQuery::selector("save")).unwrap();
        assert_eq!(node.text.as_deref(), Some("save"));
    }

    #[test]
    fn test_node_zero_matches_is_no_match() {
        let fx = fixture();
        match fx.finder.node(&NodeQuery::selector("does not exist")) {
            Err(DriverError::NoMatch { query }) => assert_eq!(query, "does not exist"),
            other => panic!("expected NoMatch, got {other:?}"),
        }
    }

    #[test]
    fn test_node_invisible_matches_is_no_visible_match() {
        let fx = fixture();
        match fx.finder.node(&NodeQuery::selector("discard")) {
            Err(DriverError::NoVisibleMatch { matched, .. }) => assert_eq!(matched, 1),
            other => panic!("expected NoVisibleMatch, got {other:?}"),
        }
    }

    #[test]
    fn test_predicate_query_runs_in_traversal_order() {
        let fx = fixture();
        let buttons = fx
            .finder
            .nodes(&NodeQuery::predicate("kind == Button", |n| n.kind == "Button"))
            .unwrap();
        assert_eq!(buttons.len(), 2);
        assert_eq!(buttons[0].text.as_deref(), Some("save"));
        assert_eq!(buttons[1].text.as_deref(), Some("discard"));
    }

    #[test]
    fn test_matcher_on_text_less_node_is_argument_error() {
        let fx = fixture();
        // The tree-wide scope contains panes with no text capability.
        match fx.finder.nodes(&NodeQuery::matcher(TextEquals("save".into()))) {
            Err(DriverError::Argument(msg)) => assert!(msg.contains("no text capability")),
            other => panic!("expected Argument error, got {other:?}"),
        }
    }

    #[test]
    fn test_scoped_query_restricts_to_subtree() {
        let fx = fixture();
        let toolbar = fx.finder.node(&NodeQuery::selector("#toolbar")).unwrap();
        let in_scope = fx
            .finder
            .nodes_in(&NodeQuery::selector(".primary"), toolbar.id)
            .unwrap();
        assert_eq!(in_scope.len(), 2);
        let field = fx
            .finder
            .nodes_in(&NodeQuery::selector("#name-field"), toolbar.id)
            .unwrap();
        assert!(field.is_empty(), "node outside the scope must not match");
    }

    #[test]
    fn test_scoped_single_node_query() {
        let fx = fixture();
        let toolbar = fx.finder.node(&NodeQuery::selector("#toolbar")).unwrap();
        let save = fx
            .finder
            .node_in(&NodeQuery::selector(".primary"), toolbar.id)
            .unwrap();
        assert_eq!(save.text.as_deref(), Some("save"));
    }

    #[test]
    fn test_scoped_query_with_detached_parent_is_argument_error() {
        let fx = fixture();
        let toolbar = fx.finder.node(&NodeQuery::selector("#toolbar")).unwrap();
        fx.dispatcher
            .run(move |tk| {
                tk.as_any_mut()
                    .downcast_mut::<HeadlessToolkit>()
                    .unwrap()
                    .remove_node(toolbar.id)
            })
            .unwrap();
        assert!(matches!(
            fx.finder.nodes_in(&NodeQuery::selector(".primary"), toolbar.id),
            Err(DriverError::Argument(_))
        ));
    }

    #[test]
    fn test_root_returns_scene_root_without_retargeting() {
        let fx = fixture();
        let root = fx
            .finder
            .root(crate::window::WindowTarget::Index(0))
            .unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.kind, "Root");
    }

    #[test]
    fn test_query_reflects_mutation_between_calls() {
        let fx = fixture();
        assert!(fx.finder.node(&NodeQuery::selector("#late")).is_err());
        fx.dispatcher
            .run(|tk| {
                let h = tk.as_any_mut().downcast_mut::<HeadlessToolkit>().unwrap();
                let w = h.primary_window().unwrap();
                let root = h.root_of(w);
                h.new_node(root, NodeSpec::label("late").id("late"));
            })
            .unwrap();
        assert!(fx.finder.node(&NodeQuery::selector("#late")).is_ok());
    }
}
