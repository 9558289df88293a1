//! Window targeting and enumeration.
//!
//! [`WindowFinder`] tracks the single "last target window" that scopes
//! node queries, and resolves four targeting forms: explicit window,
//! ordered-list index, title pattern, and owning scene.
//!
//! # Ordering
//!
//! `list_ordered_windows` sorts by **creation order** ([`WindowId`]s are
//! minted monotonically).  This is the one fixed, documented order used
//! for index targeting, so `target(Index(i))` is stable for the life of a
//! test run as long as no windows are opened or closed in between.

use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::toolkit::{SceneId, WindowId, WindowInfo};

/// One window-targeting request.
#[derive(Debug, Clone)]
pub enum WindowTarget {
    /// An explicit window handle.
    Window(WindowId),
    /// Index into [`WindowFinder::list_ordered_windows`].
    Index(usize),
    /// Regular expression matched against the full window title.
    Title(String),
    /// The window owning this scene.
    Scene(SceneId),
}

/// Tracks open windows and the current automation target.
pub struct WindowFinder {
    dispatcher: Arc<UiDispatcher>,
    last_target: Mutex<Option<WindowId>>,
}

impl WindowFinder {
    pub fn new(dispatcher: Arc<UiDispatcher>) -> Self {
        Self {
            dispatcher,
            last_target: Mutex::new(None),
        }
    }

    /// All open windows in the toolkit's own enumeration order (typically
    /// stacking).  Use [`Self::list_ordered_windows`] when determinism
    /// matters.
    pub fn list_windows(&self) -> Result<Vec<WindowInfo>, DriverError> {
        self.dispatcher.run(|tk| tk.windows())
    }

    /// All open windows in creation order.
    pub fn list_ordered_windows(&self) -> Result<Vec<WindowInfo>, DriverError> {
        let mut windows = self.list_windows()?;
        windows.sort_by_key(|w| w.id);
        Ok(windows)
    }

    /// Resolve a target without storing it.
    pub fn resolve(&self, target: &WindowTarget) -> Result<WindowId, DriverError> {
        match target {
            WindowTarget::Window(id) => {
                let id = *id;
                self.dispatcher
                    .run(move |tk| tk.window(id).map(|w| w.id))?
                    .ok_or_else(|| DriverError::WindowNotFound(format!("{id:?} is not open")))
            }
            WindowTarget::Index(index) => {
                let ordered = self.list_ordered_windows()?;
                ordered.get(*index).map(|w| w.id).ok_or_else(|| {
                    DriverError::Argument(format!(
                        "window index {index} out of range (0..{})",
                        ordered.len()
                    ))
                })
            }
            WindowTarget::Title(pattern) => {
                // Anchored: the pattern must match the whole title, not a
                // substring of it.
                let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    DriverError::Argument(format!("invalid title pattern `{pattern}`: {e}"))
                })?;
                self.list_ordered_windows()?
                    .into_iter()
                    .find(|w| re.is_match(&w.title))
                    .map(|w| w.id)
                    .ok_or_else(|| {
                        DriverError::WindowNotFound(format!(
                            "no window title matches `{pattern}`"
                        ))
                    })
            }
            WindowTarget::Scene(scene) => {
                let scene = *scene;
                self.dispatcher
                    .run(move |tk| tk.window_of_scene(scene))?
                    .ok_or_else(|| {
                        DriverError::WindowNotFound(format!("no open window owns {scene:?}"))
                    })
            }
        }
    }

    /// Resolve a target and store it as the last target window.  The
    /// store is the method's only side effect.
    pub fn target(&self, target: WindowTarget) -> Result<WindowId, DriverError> {
        let id = self.resolve(&target)?;
        log::debug!("targeting {id:?} via {target:?}");
        *self.last_target.lock() = Some(id);
        Ok(id)
    }

    /// The last explicitly targeted window, or the toolkit's primary
    /// window when no target has been set.
    pub fn last_target_window(&self) -> Result<WindowInfo, DriverError> {
        let stored = *self.last_target.lock();
        match stored {
            Some(id) => self
                .dispatcher
                .run(move |tk| tk.window(id))?
                .ok_or_else(|| {
                    DriverError::WindowNotFound(format!("last target {id:?} has closed"))
                }),
            None => self
                .dispatcher
                .run(|tk| tk.primary_window().and_then(|id| tk.window(id)))?
                .ok_or_else(|| DriverError::WindowNotFound("no windows are open".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
