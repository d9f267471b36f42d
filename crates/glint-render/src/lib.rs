//! Rendering backend for glint.
//!
//! This crate provides the wgpu side of the offscreen effects:
//! - [`Renderer`] owning the device, render targets and renderer-global state
//! - Offscreen targets with optional mip chains and depth
//! - A separable Gaussian [`BlurStage`]
//! - The [`Reflector`], [`ContactShadows`] and [`GpuPicker`] effects
//! - PNG capture of any target

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel sizes and counts move between u32, u64 and f32 constantly
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::similar_names)]

pub mod blur;
pub mod buffer;
pub mod capture;
pub mod contact_shadows;
pub mod effect;
pub mod error;
pub mod mipmap;
pub mod picker;
pub mod pipelines;
pub mod reflector;
pub mod renderer;
pub mod target;

pub use blur::BlurStage;
pub use capture::{encode_png, save_png, save_target_png};
pub use contact_shadows::{ContactShadows, ShadowNodes};
pub use effect::OffscreenEffect;
pub use error::{RenderError, RenderResult};
pub use mipmap::MipmapGenerator;
pub use picker::GpuPicker;
pub use pipelines::{DrawUniforms, PipelineKey, ScenePipelines};
pub use reflector::{default_surface_transform, Reflector};
pub use renderer::{RenderInfo, Renderer};
pub use target::{FilterMode, OffscreenTarget, TargetDescriptor, COLOR_FORMAT, DEPTH_FORMAT};
