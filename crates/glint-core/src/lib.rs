//! Core abstractions for glint.
//!
//! This crate holds everything the offscreen effects need that does not touch the GPU:
//! - [`Scene`] graph with meshes, materials and visibility
//! - Cameras, mirror cameras and oblique near-plane clipping
//! - Gaussian blur kernels
//! - The [`StateScope`] guard around renderer-global state
//! - Color-ID pick encoding, hover tracking and a CPU ray picker
//! - Effect configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Config structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel and index math converts between integer and float freely
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

pub mod blur_kernel;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod mirror;
pub mod pick;
pub mod ray_picker;
pub mod scene;
pub mod state;

pub use blur_kernel::{blur_passes, BlurKernel, BlurQuality, BlurTap};
pub use camera::{Camera, CameraView, OrthoBounds, ProjectionMode, ViewOffset};
pub use config::{ContactShadowConfig, EffectsConfig, PickerConfig, ReflectorConfig};
pub use error::{GlintError, Result};
pub use events::{EventHub, EventKind, Subscription};
pub use input::{PointerEvent, PointerKind, PointerPhase, PointerTarget, SurfaceRect};
pub use mirror::{
    apply_oblique_clip, mirror_camera, reflection_matrix, MirrorFrame, MirrorPlane, VirtualCamera,
};
pub use pick::{HoverState, PickEntry, PickEvent, PickEventKind, PickRegistry, MAX_PICK_ID};
pub use ray_picker::{Ray, RayHit, RayPicker};
pub use scene::{
    BasicMaterial, DrawItem, Geometry, GeometryId, Material, Mesh, Node, NodeId,
    ProjectedBlend, ProjectedMaterial, Scene, Side, TargetId,
};
pub use state::{
    run_scoped, HasBackground, HasRenderState, OutputEncoding, RenderState, StateScope,
    StateSnapshot, ToneMapping,
};

// Re-export glam types for convenience
pub use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};
