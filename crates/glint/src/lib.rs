//! glint: offscreen rendering effects for wgpu scenes.
//!
//! Three effects render the scene into their own targets once per frame,
//! before the main camera render:
//!
//! - [`Reflector`] - a planar mirror with optional blur
//! - [`ContactShadows`] - soft shadows baked from below the ground
//! - [`GpuPicker`] - hover and click notifications from a 1x1 color-ID render
//!
//! Every change they make to renderer-global state goes through a
//! [`StateScope`], so the host's output target, clear settings, tone mapping
//! and scene background are untouched when they return.
//!
//! # Quick Start
//!
//! ```no_run
//! use glint::*;
//!
//! fn main() -> RenderResult<()> {
//!     init_logging();
//!     let mut renderer = create_headless_renderer(640, 480)?;
//!     let mut scene = Scene::new();
//!     let cube = Mesh::new(
//!         Geometry::cuboid(Vec3::ONE),
//!         Material::Basic(BasicMaterial::new(Vec3::X)),
//!     );
//!     scene.add(Node::mesh("cube", cube).with_transform(Mat4::from_translation(Vec3::Y)));
//!
//!     let mut reflector = Reflector::new(&mut renderer, ReflectorConfig::default().with_blur(2.0));
//!     reflector.attach_to(&mut scene, None)?;
//!
//!     let camera = Camera::perspective(45.0, 640.0 / 480.0, 0.1, 100.0)
//!         .looking_at(Vec3::new(0.0, 3.0, 6.0), Vec3::ZERO, Vec3::Y);
//!     let mut frames = FrameLoop::new();
//!     frames.render_frame(&mut renderer, &mut scene, &camera, &mut [&mut reflector])?;
//!     render_to_file(&mut renderer, &scene, &camera, "frame.png")
//! }
//! ```

pub mod frame;
pub mod headless;
pub mod input;

// Re-export core types
pub use glint_core::{
    blur_kernel, mirror, pick, ray_picker, run_scoped, BasicMaterial, BlurKernel, BlurQuality,
    Camera, CameraView, ContactShadowConfig, EffectsConfig, EventHub, Geometry, GlintError,
    HasBackground, HasRenderState, HoverState, Material, Mesh, Node, NodeId, OrthoBounds,
    OutputEncoding, PickEvent, PickEventKind, PickRegistry, PickerConfig, PointerEvent,
    PointerKind, PointerPhase, PointerTarget, ProjectedBlend, ProjectedMaterial, RayPicker,
    ReflectorConfig, RenderState, Scene, Side, StateScope, Subscription, SurfaceRect, TargetId,
    ToneMapping, MAX_PICK_ID,
};
pub use glint_core::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

// Re-export render types
pub use glint_render::{
    encode_png, save_png, save_target_png, BlurStage, ContactShadows, FilterMode, GpuPicker,
    OffscreenEffect, Reflector, RenderError, RenderInfo, RenderResult, Renderer, ShadowNodes,
    TargetDescriptor,
};

pub use frame::{FrameLoop, FrameReport};
pub use headless::{create_headless_renderer, render_to_file, render_to_image};
pub use input::{pointer_event_from_winit, PointerTracker};

/// Installs `env_logger` as the `log` backend. The level comes from `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
