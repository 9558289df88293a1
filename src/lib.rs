//! `uidriver` -- toolkit-agnostic GUI test-automation core.
//!
//! Drives a live UI through two injected capabilities -- a [`toolkit::UiToolkit`]
//! for tree access and a [`toolkit::PlatformRobot`] for raw input -- so the
//! same engine runs against a real platform adapter or the bundled
//! [`headless`] toolkit on a machine with no display.
//!
//! Every read or mutation of UI state is marshaled onto one dedicated UI
//! thread by the [`dispatch`] layer; callers block with a timeout, never
//! spin.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `DriverError` enum via `thiserror` |
//! | [`geometry`] | Points, bounds, and affine transform composition |
//! | [`toolkit`] | Injected capability traits plus id/event types |
//! | [`dispatch`] | UI-thread marshaling, event queue, `awaitEvents` barrier |
//! | [`tree`] | Subtree snapshot capture and local-to-screen resolution |
//! | [`window`] | Window listing, targeting, and title-pattern lookup |
//! | [`query`] | Node queries: selectors, predicates, matchers |
//! | [`point`] | Lazy anchor-plus-offset point resolution |
//! | [`input`] | Stateful robot: keyboard, mouse, scroll, pixel capture |
//! | [`lifecycle`] | Application-under-test lifecycle transitions |
//! | [`headless`] | In-memory toolkit/robot for tests and CI |

pub mod dispatch;
pub mod errors;
pub mod geometry;
pub mod headless;
pub mod input;
pub mod lifecycle;
pub mod point;
pub mod query;
pub mod toolkit;
pub mod tree;
pub mod window;
