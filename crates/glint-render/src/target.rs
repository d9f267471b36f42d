//! Offscreen render targets.

use glint_core::TargetId;

/// Color format of every target. Linear, so pick colors survive unchanged.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Depth format of targets created with a depth buffer.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Texture filtering used when a target is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Linear,
    Nearest,
}

impl FilterMode {
    fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Linear => wgpu::FilterMode::Linear,
            Self::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

/// Describes an [`OffscreenTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub filter: FilterMode,
    /// Generate a mip chain after each render.
    pub mipmaps: bool,
    /// Attach a depth buffer.
    pub depth: bool,
}

impl TargetDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            label: String::from("offscreen target"),
            width,
            height,
            filter: FilterMode::Linear,
            mipmaps: false,
            depth: false,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: bool) -> Self {
        self.depth = depth;
        self
    }
}

/// Number of mip levels for a target.
///
/// Mipmaps are only generated for non-zero power-of-two sizes; anything else
/// falls back to a single level with a warning.
pub fn mip_level_count(width: u32, height: u32, requested: bool) -> u32 {
    if !requested {
        return 1;
    }
    if width == 0 || height == 0 || !width.is_power_of_two() || !height.is_power_of_two() {
        log::warn!("mipmaps disabled for {width}x{height} target: size is not a non-zero power of two");
        return 1;
    }
    32 - width.max(height).leading_zeros()
}

/// A color texture with an optional depth buffer.
pub struct OffscreenTarget {
    id: TargetId,
    descriptor: TargetDescriptor,
    texture: wgpu::Texture,
    /// Mip 0 only, used as a color attachment.
    render_view: wgpu::TextureView,
    /// All mips, used for sampling.
    sample_view: wgpu::TextureView,
    depth: Option<(wgpu::Texture, wgpu::TextureView)>,
    sampler: wgpu::Sampler,
    mip_levels: u32,
}

impl OffscreenTarget {
    /// Creates the GPU resources for `descriptor`. Zero sizes are clamped to 1.
    pub fn new(device: &wgpu::Device, id: TargetId, mut descriptor: TargetDescriptor) -> Self {
        if descriptor.width == 0 || descriptor.height == 0 {
            log::warn!(
                "target '{}' requested with size {}x{}, clamping to at least 1x1",
                descriptor.label,
                descriptor.width,
                descriptor.height
            );
        }
        let mip_levels = mip_level_count(descriptor.width, descriptor.height, descriptor.mipmaps);
        descriptor.width = descriptor.width.max(1);
        descriptor.height = descriptor.height.max(1);

        let size = wgpu::Extent3d {
            width: descriptor.width,
            height: descriptor.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&descriptor.label),
            size,
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let render_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("target render view"),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let sample_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = descriptor.depth.then(|| {
            let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("target depth"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
            (depth_texture, view)
        });

        let filter = descriptor.filter.to_wgpu();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("target sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            ..Default::default()
        });

        log::debug!(
            "created target '{}' {}x{} ({} mips, depth: {})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            mip_levels,
            descriptor.depth
        );

        Self {
            id,
            descriptor,
            texture,
            render_view,
            sample_view,
            depth,
            sampler,
            mip_levels,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn render_view(&self) -> &wgpu::TextureView {
        &self.render_view
    }

    pub fn sample_view(&self) -> &wgpu::TextureView {
        &self.sample_view
    }

    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.depth.as_ref().map(|(_, view)| view)
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_levels
    }
}

impl std::fmt::Debug for OffscreenTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffscreenTarget")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("mip_levels", &self.mip_levels)
            .finish_non_exhaustive()
    }
}
