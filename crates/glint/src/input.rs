//! Conversion of winit window events into glint pointer events.

use glam::Vec2;
use glint_core::PointerEvent;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};

/// Tracks the cursor between winit events, since button presses carry no position.
///
/// Positions are converted from physical window pixels to logical client
/// coordinates using the window's scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerTracker {
    position: Vec2,
    scale_factor: f64,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PointerTracker {
    pub fn new(scale_factor: f64) -> Self {
        Self {
            position: Vec2::ZERO,
            scale_factor,
        }
    }

    /// Last known cursor position in logical pixels.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    fn to_logical(&self, position: PhysicalPosition<f64>) -> Vec2 {
        let logical = position.to_logical::<f64>(self.scale_factor);
        Vec2::new(logical.x as f32, logical.y as f32)
    }

    pub fn cursor_moved(&mut self, position: PhysicalPosition<f64>) -> PointerEvent {
        self.position = self.to_logical(position);
        PointerEvent::mouse_move(self.position.x, self.position.y)
    }

    /// Only left-button presses count as pointer-down.
    pub fn mouse_input(&self, state: ElementState, button: MouseButton) -> Option<PointerEvent> {
        match (button, state) {
            (MouseButton::Left, ElementState::Pressed) => {
                Some(PointerEvent::mouse_down(self.position.x, self.position.y))
            }
            _ => None,
        }
    }

    pub fn touch(&mut self, phase: TouchPhase, location: PhysicalPosition<f64>) -> Option<PointerEvent> {
        let position = self.to_logical(location);
        match phase {
            TouchPhase::Started => {
                self.position = position;
                Some(PointerEvent::touch_start(position.x, position.y))
            }
            TouchPhase::Moved => {
                self.position = position;
                Some(PointerEvent::touch_move(position.x, position.y))
            }
            TouchPhase::Ended | TouchPhase::Cancelled => None,
        }
    }
}

/// Converts a winit window event, updating `tracker`. Events that are not
/// pointer input yield `None`.
pub fn pointer_event_from_winit(
    tracker: &mut PointerTracker,
    event: &WindowEvent,
) -> Option<PointerEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => Some(tracker.cursor_moved(*position)),
        WindowEvent::MouseInput { state, button, .. } => tracker.mouse_input(*state, *button),
        WindowEvent::Touch(touch) => tracker.touch(touch.phase, touch.location),
        WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
            tracker.set_scale_factor(*scale_factor);
            None
        }
        _ => None,
    }
}
