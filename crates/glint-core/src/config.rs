//! Effect configuration.

use glam::{UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::blur_kernel::BlurQuality;
use crate::error::Result;

/// Planar reflector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorConfig {
    /// Size of the default surface plane.
    pub width: f32,
    pub height: f32,
    /// Resolution of the reflection target.
    pub texture_width: u32,
    pub texture_height: u32,
    /// Tint multiplied into the reflection.
    pub color: Vec3,
    /// Pulls the oblique near plane back to hide seams at the mirror edge.
    pub clip_bias: f32,
    /// 0 hides the reflection, 1 shows it undimmed.
    pub opacity: f32,
    /// Blur radius in texels; 0 disables blurring.
    pub blur: f32,
    /// Run one blur pass instead of two.
    pub fast_blur: bool,
    /// Only render when the host calls `render` explicitly.
    pub manual_render: bool,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            width: 32.0,
            height: 32.0,
            texture_width: 512,
            texture_height: 512,
            color: Vec3::ONE,
            clip_bias: 0.0,
            opacity: 1.0,
            blur: 0.0,
            fast_blur: false,
            manual_render: false,
        }
    }
}

impl ReflectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_texture_size(mut self, width: u32, height: u32) -> Self {
        self.texture_width = width;
        self.texture_height = height;
        self
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_clip_bias(mut self, clip_bias: f32) -> Self {
        self.clip_bias = clip_bias;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_blur(mut self, blur: f32) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_fast_blur(mut self, fast_blur: bool) -> Self {
        self.fast_blur = fast_blur;
        self
    }

    pub fn with_manual_render(mut self, manual_render: bool) -> Self {
        self.manual_render = manual_render;
        self
    }

    pub fn texture_size(&self) -> UVec2 {
        UVec2::new(self.texture_width, self.texture_height)
    }

    pub fn blur_quality(&self) -> BlurQuality {
        BlurQuality::from_fast_flag(self.fast_blur)
    }
}

/// Contact shadow configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactShadowConfig {
    /// Ground footprint covered by the shadow camera.
    pub width: f32,
    pub height: f32,
    /// Height of the shadow camera above the ground; also its far plane.
    pub camera_height: f32,
    pub blur: f32,
    /// Scales the alpha baked into the shadow stamp.
    pub darkness: f32,
    /// Opacity of the shadow plane, independent of `darkness`.
    pub opacity: f32,
    pub plane_color: Vec3,
    pub plane_opacity: f32,
    /// Draw a plane in `plane_color` beneath the shadow.
    pub fill_plane: bool,
    /// Show a wireframe-like box outlining the shadow camera volume.
    pub debug_camera: bool,
    /// Run one blur pass instead of two.
    pub fast: bool,
    /// Square resolution of the shadow target.
    pub resolution: u32,
}

impl Default for ContactShadowConfig {
    fn default() -> Self {
        Self {
            width: 10.0,
            height: 10.0,
            camera_height: 10.0,
            blur: 8.0,
            darkness: 1.0,
            opacity: 1.0,
            plane_color: Vec3::ONE,
            plane_opacity: 1.0,
            fill_plane: true,
            debug_camera: false,
            fast: false,
            resolution: 512,
        }
    }
}

impl ContactShadowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_camera_height(mut self, camera_height: f32) -> Self {
        self.camera_height = camera_height;
        self
    }

    pub fn with_blur(mut self, blur: f32) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_darkness(mut self, darkness: f32) -> Self {
        self.darkness = darkness;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_fill_plane(mut self, color: Vec3, opacity: f32) -> Self {
        self.fill_plane = true;
        self.plane_color = color;
        self.plane_opacity = opacity;
        self
    }

    pub fn without_fill_plane(mut self) -> Self {
        self.fill_plane = false;
        self
    }

    pub fn with_debug_camera(mut self, debug_camera: bool) -> Self {
        self.debug_camera = debug_camera;
        self
    }

    pub fn with_fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn blur_quality(&self) -> BlurQuality {
        BlurQuality::from_fast_flag(self.fast)
    }
}

/// GPU picker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Backing-buffer pixels per logical pixel.
    pub pixel_ratio: f32,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self { pixel_ratio: 1.0 }
    }
}

impl PickerConfig {
    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }
}

/// Configuration bundle for all effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub reflector: ReflectorConfig,
    pub contact_shadows: ContactShadowConfig,
    pub picker: PickerConfig,
}

impl EffectsConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
