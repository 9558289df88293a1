//! Keyboard and mouse simulation over a [`PlatformRobot`].
//!
//! [`Robot`] is a thin state machine per input device on top of the
//! injected platform primitive: one {released, pressed} state per key and
//! per button, plus a single absolute mouse position.  Device state is
//! process-wide and single-instance; the design assumes serialized robot
//! calls from one automation thread -- concurrent robot use is not
//! synchronized beyond memory safety.
//!
//! Injection is platform-level and does not round-trip through the UI
//! thread; callers use [`Robot::await_events`] as the explicit barrier
//! before inspecting UI state.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::geometry::{Bounds, Point};
use crate::toolkit::{InputEvent, Key, MouseButton, PlatformRobot, SceneId};

struct DeviceState {
    keys: HashSet<Key>,
    buttons: HashSet<MouseButton>,
    mouse: Point,
}

/// The base input robot.
pub struct Robot {
    dispatcher: Arc<UiDispatcher>,
    platform: Mutex<Box<dyn PlatformRobot>>,
    state: Mutex<DeviceState>,
}

impl Robot {
    pub fn new(dispatcher: Arc<UiDispatcher>, platform: Box<dyn PlatformRobot>) -> Self {
        Self {
            dispatcher,
            platform: Mutex::new(platform),
            state: Mutex::new(DeviceState {
                keys: HashSet::new(),
                buttons: HashSet::new(),
                mouse: Point::new(0.0, 0.0),
            }),
        }
    }

    fn inject(&self, event: InputEvent) -> Result<(), DriverError> {
        self.platform.lock().inject(event)
    }

    // -- keyboard ----------------------------------------------------------

    /// Press a key.  Pressing an already-pressed key is not an error;
    /// platform repeat semantics apply and this layer does not enforce
    /// strict alternation.
    pub fn press_key(&self, key: Key) -> Result<(), DriverError> {
        self.inject(InputEvent::KeyPress(key))?;
        self.state.lock().keys.insert(key);
        Ok(())
    }

    pub fn release_key(&self, key: Key) -> Result<(), DriverError> {
        self.inject(InputEvent::KeyRelease(key))?;
        self.state.lock().keys.remove(&key);
        Ok(())
    }

    /// Keys currently held, per this robot's bookkeeping.
    pub fn pressed_keys(&self) -> HashSet<Key> {
        self.state.lock().keys.clone()
    }

    /// Synthesize a complete character-input event directed at `scene`,
    /// distinct from raw press/release.  Used for text entry.
    pub fn type_char(&self, scene: SceneId, key: Key, character: char) -> Result<(), DriverError> {
        self.inject(InputEvent::CharType {
            scene,
            key,
            character,
        })
    }

    // -- mouse -------------------------------------------------------------

    /// Move the mouse to an absolute screen coordinate.  The only
    /// operation that mutates the tracked position.
    pub fn move_mouse(&self, to: Point) -> Result<(), DriverError> {
        self.inject(InputEvent::MouseMove(to))?;
        self.state.lock().mouse = to;
        Ok(())
    }

    /// The last position set via [`Self::move_mouse`].
    pub fn mouse_position(&self) -> Point {
        self.state.lock().mouse
    }

    pub fn press_mouse(&self, button: MouseButton) -> Result<(), DriverError> {
        self.inject(InputEvent::MousePress(button))?;
        self.state.lock().buttons.insert(button);
        Ok(())
    }

    pub fn release_mouse(&self, button: MouseButton) -> Result<(), DriverError> {
        self.inject(InputEvent::MouseRelease(button))?;
        self.state.lock().buttons.remove(&button);
        Ok(())
    }

    pub fn pressed_buttons(&self) -> HashSet<MouseButton> {
        self.state.lock().buttons.clone()
    }

    /// Scroll by a signed notch count: positive scrolls down, negative
    /// up.  Magnitude is the number of notches.
    pub fn scroll(&self, amount: i32) -> Result<(), DriverError> {
        self.inject(InputEvent::Scroll(amount))
    }

    // -- capture and synchronization ---------------------------------------

    /// Pixel snapshot of an absolute screen rectangle.
    ///
    /// Flushes pending layout/render passes through the UI thread first,
    /// so the capture reflects the latest committed frame.
    pub fn capture_region(&self, region: Bounds) -> Result<image::RgbaImage, DriverError> {
        self.dispatcher.run(|tk| tk.flush_render())?;
        self.platform.lock().capture_region(region)
    }

    /// Block until every injected event, including internally queued
    /// follow-ons, has been processed.  A no-op returning immediately
    /// when nothing is pending.
    pub fn await_events(&self) -> Result<(), DriverError> {
        self.dispatcher.await_events()
    }

    /// Release every held key and button.  Cleanup surface for
    /// between-test hygiene.
    pub fn release_all(&self) -> Result<(), DriverError> {
        let (keys, buttons) = {
            let state = self.state.lock();
            (
                state.keys.iter().copied().collect::<Vec<_>>(),
                state.buttons.iter().copied().collect::<Vec<_>>(),
            )
        };
        for key in keys {
            self.release_key(key)?;
        }
        for button in buttons {
            self.release_mouse(button)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessRobot, HeadlessToolkit, NodeSpec};
    use crate::toolkit::UiToolkit;

    struct Fixture {
        robot: Robot,
        dispatcher: Arc<UiDispatcher>,
    }

    fn fixture_with(tk: HeadlessToolkit) -> Fixture {
        let dispatcher = UiDispatcher::spawn(Box::new(tk)).unwrap();
        let platform = Box::new(HeadlessRobot::new(dispatcher.clone()));
        Fixture {
            robot: Robot::new(dispatcher.clone(), platform),
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(HeadlessToolkit::new())
    }

    #[test]
    fn test_press_release_pairing_is_stateless_across_repeats() {
        let fx = fixture();
        for _ in 0..2 {
            fx.robot.press_mouse(MouseButton::Primary).unwrap();
            fx.robot.release_mouse(MouseButton::Primary).unwrap();
        }
        fx.robot.await_events().unwrap();
        assert!(fx.robot.pressed_buttons().is_empty());
        let held = fx
            .dispatcher
            .run(|tk| {
                tk.as_any_mut()
                    .downcast_mut::<HeadlessToolkit>()
                    .unwrap()
                    .buttons_down()
            })
            .unwrap();
        assert!(held.is_empty());
    }

    #[test]
    fn test_pressing_a_pressed_key_is_not_an_error() {
        let fx = fixture();
        fx.robot.press_key(Key::Shift).unwrap();
        fx.robot.press_key(Key::Shift).unwrap();
        assert_eq!(fx.robot.pressed_keys().len(), 1);
        fx.robot.release_key(Key::Shift).unwrap();
        assert!(fx.robot.pressed_keys().is_empty());
    }

    #[test]
    fn test_mouse_position_tracks_last_move_only() {
        let fx = fixture();
        fx.robot.move_mouse(Point::new(10.0, 20.0)).unwrap();
        fx.robot.scroll(-3).unwrap();
        fx.robot.press_key(Key::Char('a')).unwrap();
        assert_eq!(fx.robot.mouse_position(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_scroll_sign_reaches_toolkit() {
        let fx = fixture();
        fx.robot.scroll(4).unwrap();
        fx.robot.scroll(-1).unwrap();
        fx.robot.await_events().unwrap();
        let offset = fx
            .dispatcher
            .run(|tk| {
                tk.as_any_mut()
                    .downcast_mut::<HeadlessToolkit>()
                    .unwrap()
                    .scroll_offset()
            })
            .unwrap();
        assert_eq!(offset, 3);
    }

    #[test]
    fn test_barrier_covers_accelerator_follow_ons() {
        let mut tk = HeadlessToolkit::new();
        tk.set_accelerator(
            Key::Function(5),
            vec![InputEvent::Scroll(1), InputEvent::Scroll(1)],
        );
        let fx = fixture_with(tk);
        fx.robot.press_key(Key::Function(5)).unwrap();
        fx.robot.release_key(Key::Function(5)).unwrap();
        fx.robot.await_events().unwrap();
        let offset = fx
            .dispatcher
            .run(|tk| {
                tk.as_any_mut()
                    .downcast_mut::<HeadlessToolkit>()
                    .unwrap()
                    .scroll_offset()
            })
            .unwrap();
        assert_eq!(offset, 2, "follow-ons must be processed before the barrier returns");
    }

    #[test]
    fn test_type_char_enters_text_into_focused_field() {
        let mut tk = HeadlessToolkit::new();
        let w = tk.new_window("main", Bounds::from_size(0.0, 0.0, 300.0, 200.0));
        let root = tk.root_of(w);
        let field = tk.new_node(root, NodeSpec::text_field().id("name"));
        tk.focus_node(field);
        let scene = tk.window(w).unwrap().scene;

        let fx = fixture_with(tk);
        for ch in "hi".chars() {
            fx.robot.type_char(scene, Key::Char(ch), ch).unwrap();
        }
        fx.robot.await_events().unwrap();

        let text = fx
            .dispatcher
            .run(move |tk| {
                tk.as_any_mut()
                    .downcast_mut::<HeadlessToolkit>()
                    .unwrap()
                    .text_of(field)
            })
            .unwrap();
        assert_eq!(text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_release_all_empties_both_device_sets() {
        let fx = fixture();
        fx.robot.press_key(Key::Control).unwrap();
        fx.robot.press_key(Key::Char('c')).unwrap();
        fx.robot.press_mouse(MouseButton::Secondary).unwrap();
        fx.robot.release_all().unwrap();
        assert!(fx.robot.pressed_keys().is_empty());
        assert!(fx.robot.pressed_buttons().is_empty());
    }

    #[test]
    fn test_capture_region_reflects_committed_frame() {
        let mut tk = HeadlessToolkit::new();
        let w = tk.new_window("main", Bounds::from_size(0.0, 0.0, 50.0, 50.0));
        tk.set_window_fill(w, [200, 10, 10, 255]);

        let fx = fixture_with(tk);
        let shot = fx
            .robot
            .capture_region(Bounds::from_size(0.0, 0.0, 20.0, 20.0))
            .unwrap();
        assert_eq!(shot.dimensions(), (20, 20));
        assert_eq!(shot.get_pixel(5, 5).0, [200, 10, 10, 255]);
    }
}
