//! Pointer input independent of any windowing library.

use glam::{UVec2, Vec2};

/// Device that produced a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// What the pointer is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Mouse button press or touch start.
    Down,
    Move,
}

/// Element the event originated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerTarget {
    /// The rendering surface itself.
    #[default]
    Surface,
    /// Something layered over it, such as a UI overlay.
    Overlay,
}

/// A pointer sample in client (logical) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub position: Vec2,
    pub target: PointerTarget,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, phase: PointerPhase, position: Vec2) -> Self {
        Self {
            kind,
            phase,
            position,
            target: PointerTarget::Surface,
        }
    }

    pub fn mouse_move(x: f32, y: f32) -> Self {
        Self::new(PointerKind::Mouse, PointerPhase::Move, Vec2::new(x, y))
    }

    pub fn mouse_down(x: f32, y: f32) -> Self {
        Self::new(PointerKind::Mouse, PointerPhase::Down, Vec2::new(x, y))
    }

    pub fn touch_start(x: f32, y: f32) -> Self {
        Self::new(PointerKind::Touch, PointerPhase::Down, Vec2::new(x, y))
    }

    pub fn touch_move(x: f32, y: f32) -> Self {
        Self::new(PointerKind::Touch, PointerPhase::Move, Vec2::new(x, y))
    }

    #[must_use]
    pub fn with_target(mut self, target: PointerTarget) -> Self {
        self.target = target;
        self
    }

    pub fn on_surface(&self) -> bool {
        self.target == PointerTarget::Surface
    }
}

/// Placement of the rendering surface in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    /// Logical size.
    pub width: f32,
    pub height: f32,
    /// Backing-buffer pixels per logical pixel.
    pub pixel_ratio: f32,
}

impl SurfaceRect {
    pub fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
            pixel_ratio,
        }
    }

    /// Size of the backing buffer in physical pixels.
    pub fn buffer_size(&self) -> UVec2 {
        UVec2::new(
            (self.width * self.pixel_ratio).round().max(1.0) as u32,
            (self.height * self.pixel_ratio).round().max(1.0) as u32,
        )
    }

    /// Backing-buffer pixel under `position`, top-left origin.
    ///
    /// Returns `None` outside the surface.
    pub fn to_buffer_pixel(&self, position: Vec2) -> Option<UVec2> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let local = position - Vec2::new(self.left, self.top);
        if local.x < 0.0 || local.y < 0.0 || local.x >= self.width || local.y >= self.height {
            return None;
        }
        let buffer = self.buffer_size();
        let x = (local.x * buffer.x as f32 / self.width).floor() as u32;
        let y = (local.y * buffer.y as f32 / self.height).floor() as u32;
        Some(UVec2::new(x.min(buffer.x - 1), y.min(buffer.y - 1)))
    }

    /// Normalized device coordinates of `position`, +Y up.
    pub fn to_ndc(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            (position.x - self.left) / self.width * 2.0 - 1.0,
            -(position.y - self.top) / self.height * 2.0 + 1.0,
        )
    }
}
