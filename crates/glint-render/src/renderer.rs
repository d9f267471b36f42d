//! The wgpu scene renderer shared by the main pass and every offscreen effect.

use std::collections::HashMap;
use std::num::NonZeroU64;

use glint_core::{CameraView, HasRenderState, Material, RenderState, Scene, TargetId};

use crate::buffer::{align_to, padded_bytes_per_row};
use crate::error::{RenderError, RenderResult};
use crate::mipmap::MipmapGenerator;
use crate::pipelines::{DrawUniforms, GeometryCache, PipelineKey, ScenePipelines};
use crate::target::{OffscreenTarget, TargetDescriptor, COLOR_FORMAT};

/// Draws in the initial per-draw uniform buffer.
const INITIAL_DRAW_CAPACITY: u64 = 64;

/// Counters accumulated since the last [`Renderer::reset_info`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Indexed draws issued by scene renders.
    pub draw_calls: u64,
    /// Render passes recorded, including blur and mipmap passes.
    pub render_passes: u64,
    /// Calls to [`Renderer::render`].
    pub renders: u64,
}

struct PreparedDraw {
    key: PipelineKey,
    geometry: glint_core::GeometryId,
    texture: Option<TargetId>,
}

/// Owns the GPU device, the render targets and the renderer-global [`RenderState`].
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: RenderState,
    main_target: OffscreenTarget,
    targets: HashMap<TargetId, OffscreenTarget>,
    pipelines: ScenePipelines,
    mipmaps: MipmapGenerator,
    geometry: GeometryCache,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_capacity: u64,
    uniform_stride: u64,
    info: RenderInfo,
    frame: u64,
}

impl Renderer {
    /// Creates a renderer without a window. The main target is `width` x `height`.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "using adapter '{}' ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("glint device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        Ok(Self::from_device(device, queue, width, height))
    }

    /// Wraps an existing device, for hosts that already own one.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let main_target = OffscreenTarget::new(
            &device,
            TargetId::next(),
            TargetDescriptor::new(width, height)
                .with_label("main target")
                .with_depth(true),
        );
        let pipelines = ScenePipelines::new(&device);
        let mipmaps = MipmapGenerator::new(&device);

        let uniform_stride = align_to(
            std::mem::size_of::<DrawUniforms>() as u64,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let (draw_buffer, draw_bind_group) =
            Self::create_draw_buffer(&device, &pipelines, INITIAL_DRAW_CAPACITY, uniform_stride);

        Self {
            device,
            queue,
            state: RenderState::default(),
            main_target,
            targets: HashMap::new(),
            pipelines,
            mipmaps,
            geometry: GeometryCache::new(),
            draw_buffer,
            draw_bind_group,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            uniform_stride,
            info: RenderInfo::default(),
            frame: 0,
        }
    }

    fn create_draw_buffer(
        device: &wgpu::Device,
        pipelines: &ScenePipelines,
        capacity: u64,
        stride: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniform Buffer"),
            size: capacity * stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout: &pipelines.draw_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn ensure_draw_capacity(&mut self, draws: u64) {
        if draws <= self.draw_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_draw_buffer(&self.device, &self.pipelines, capacity, self.uniform_stride);
        self.draw_buffer = buffer;
        self.draw_bind_group = bind_group;
        self.draw_capacity = capacity;
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Size of the main target.
    pub fn size(&self) -> (u32, u32) {
        (self.main_target.width(), self.main_target.height())
    }

    /// Recreates the main target at a new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size() {
            return;
        }
        self.main_target = OffscreenTarget::new(
            &self.device,
            self.main_target.id(),
            TargetDescriptor::new(width, height)
                .with_label("main target")
                .with_depth(true),
        );
    }

    pub fn main_target(&self) -> &OffscreenTarget {
        &self.main_target
    }

    /// Allocates a new offscreen target.
    pub fn create_target(&mut self, descriptor: TargetDescriptor) -> TargetId {
        let id = TargetId::next();
        let target = OffscreenTarget::new(&self.device, id, descriptor);
        self.targets.insert(id, target);
        id
    }

    /// Releases a target created by [`Renderer::create_target`].
    pub fn dispose_target(&mut self, id: TargetId) -> RenderResult<()> {
        let target = self.targets.remove(&id).ok_or(RenderError::TargetNotFound(id))?;
        if self.state.render_target == Some(id) {
            self.state.render_target = None;
        }
        log::debug!("disposed target '{}'", target.descriptor().label);
        Ok(())
    }

    pub fn target(&self, id: TargetId) -> RenderResult<&OffscreenTarget> {
        if id == self.main_target.id() {
            return Ok(&self.main_target);
        }
        self.targets.get(&id).ok_or(RenderError::TargetNotFound(id))
    }

    /// The target for `id`, where `None` selects the main target.
    pub fn resolve_target(&self, id: Option<TargetId>) -> RenderResult<&OffscreenTarget> {
        match id {
            Some(id) => self.target(id),
            None => Ok(&self.main_target),
        }
    }

    pub fn contains_target(&self, id: TargetId) -> bool {
        id == self.main_target.id() || self.targets.contains_key(&id)
    }

    /// Redirects subsequent renders. `None` selects the main target.
    pub fn set_render_target(&mut self, target: Option<TargetId>) -> RenderResult<()> {
        if let Some(id) = target {
            if !self.contains_target(id) {
                return Err(RenderError::TargetNotFound(id));
            }
        }
        self.state.render_target = target;
        Ok(())
    }

    pub fn render_target(&self) -> Option<TargetId> {
        self.state.render_target
    }

    pub fn info(&self) -> RenderInfo {
        self.info
    }

    pub fn reset_info(&mut self) {
        self.info = RenderInfo::default();
    }

    /// Number of scene renders so far; used to age cached geometry.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn record_passes(&mut self, passes: u64) {
        self.info.render_passes += passes;
    }

    /// Drops GPU geometry unused for more than `max_idle` renders.
    pub fn collect_garbage(&mut self, max_idle: u64) -> usize {
        let dropped = self.geometry.collect_garbage(self.frame, max_idle);
        if dropped > 0 {
            log::debug!("released {dropped} unused geometry buffers");
        }
        dropped
    }

    /// Clears the current target to the clear color and resets its depth.
    pub fn clear(&mut self) -> RenderResult<()> {
        let state = self.state;
        let target = self.resolve_target(state.render_target)?;
        let color = state.clear_color.extend(state.clear_alpha).as_dvec4();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.render_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.x,
                            g: color.y,
                            b: color.z,
                            a: color.w,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: target.depth_view().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.info.render_passes += 1;
        Ok(())
    }

    /// Draws every visible mesh of `scene` from `camera` into the current target.
    ///
    /// The scene's `override_material`, when set, replaces every mesh
    /// material. Projected materials that sample the target being drawn
    /// into are skipped.
    pub fn render<C: CameraView + ?Sized>(&mut self, scene: &Scene, camera: &C) -> RenderResult<()> {
        let state = self.state;
        let (target_id, has_depth) = {
            let target = self.resolve_target(state.render_target)?;
            (target.id(), target.has_depth())
        };
        self.frame += 1;
        self.info.renders += 1;

        let view_proj = camera.view_projection_matrix();
        let mut draws = Vec::new();
        let mut uniforms = Vec::new();
        for item in scene.draw_list() {
            let material = scene.override_material.as_ref().unwrap_or(&item.mesh.material);
            let texture = match material {
                Material::Projected(projected) if projected.target == target_id => {
                    log::debug!("skipping '{:?}': samples the target being drawn", item.node);
                    continue;
                }
                Material::Projected(projected) if !self.targets.contains_key(&projected.target) => {
                    log::warn!(
                        "skipping {:?}: projected target {:?} does not exist",
                        item.node,
                        projected.target
                    );
                    continue;
                }
                Material::Projected(projected) => Some(projected.target),
                Material::Basic(_) | Material::DepthStamp { .. } => None,
            };
            if item.mesh.geometry.indices().is_empty() {
                continue;
            }

            let key = PipelineKey::for_material(material, COLOR_FORMAT, has_depth);
            self.pipelines.prepare(&self.device, key);
            self.geometry.prepare(&self.device, &item.mesh.geometry, self.frame);
            uniforms.push(DrawUniforms::new(
                material,
                item.world,
                view_proj,
                state.tone_mapping,
                state.output_encoding,
            ));
            draws.push(PreparedDraw {
                key,
                geometry: item.mesh.geometry.id(),
                texture,
            });
        }

        self.ensure_draw_capacity(draws.len() as u64);
        let stride = self.uniform_stride as usize;
        if !uniforms.is_empty() {
            let mut bytes = vec![0u8; stride * uniforms.len()];
            for (chunk, u) in bytes.chunks_mut(stride).zip(&uniforms) {
                let raw = bytemuck::bytes_of(u);
                chunk[..raw.len()].copy_from_slice(raw);
            }
            self.queue.write_buffer(&self.draw_buffer, 0, &bytes);
        }

        let texture_bind_groups: Vec<Option<wgpu::BindGroup>> = draws
            .iter()
            .map(|draw| {
                let source = self.targets.get(&draw.texture?)?;
                Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Projected Texture Bind Group"),
                    layout: &self.pipelines.texture_bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(source.sample_view()),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(source.sampler()),
                        },
                    ],
                }))
            })
            .collect();

        let clear = scene
            .background
            .map_or(state.clear_color.extend(state.clear_alpha), |bg| bg.extend(1.0))
            .as_dvec4();
        let (color_load, depth_load) = if state.auto_clear {
            (
                wgpu::LoadOp::Clear(wgpu::Color {
                    r: clear.x,
                    g: clear.y,
                    b: clear.z,
                    a: clear.w,
                }),
                wgpu::LoadOp::Clear(1.0),
            )
        } else {
            (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };

        let target = self.resolve_target(state.render_target)?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });
        let mut issued = 0u64;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.render_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: target.depth_view().map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: depth_load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                ..Default::default()
            });

            for (index, draw) in draws.iter().enumerate() {
                let (Some(pipeline), Some(gpu)) =
                    (self.pipelines.get(&draw.key), self.geometry.get(draw.geometry))
                else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.draw_bind_group, &[(index * stride) as u32]);
                if let Some(bind_group) = &texture_bind_groups[index] {
                    pass.set_bind_group(1, bind_group, &[]);
                }
                pass.set_vertex_buffer(0, gpu.positions.slice(..));
                pass.set_vertex_buffer(1, gpu.colors.slice(..));
                pass.set_index_buffer(gpu.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..gpu.index_count, 0, 0..1);
                issued += 1;
            }
        }
        let mip_passes = self.mipmaps.generate(&self.device, &mut encoder, target);
        self.queue.submit(std::iter::once(encoder.finish()));

        self.info.draw_calls += issued;
        self.info.render_passes += 1 + u64::from(mip_passes);
        Ok(())
    }

    /// Regenerates the mip chain of `id` from its level 0.
    pub fn generate_mipmaps(&mut self, id: TargetId) -> RenderResult<()> {
        let target = self.target(id)?;
        if target.mip_level_count() <= 1 {
            return Ok(());
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Mipmap Encoder"),
            });
        let passes = self.mipmaps.generate(&self.device, &mut encoder, target);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.info.render_passes += u64::from(passes);
        Ok(())
    }

    /// Copies a rectangle of a target back to the CPU as tightly packed RGBA8 rows.
    ///
    /// Blocks until the GPU has finished all submitted work.
    pub fn read_pixels(
        &self,
        target: Option<TargetId>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> RenderResult<Vec<u8>> {
        let source = self.resolve_target(target)?;
        let fits = x.checked_add(width).is_some_and(|r| r <= source.width())
            && y.checked_add(height).is_some_and(|b| b <= source.height());
        if !fits {
            return Err(RenderError::OutOfBounds {
                x,
                y,
                width,
                height,
                target_width: source.width(),
                target_height: source.height(),
            });
        }
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let padded_row = padded_bytes_per_row(width);
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size: u64::from(padded_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: source.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?;
        rx.recv()
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?
            .map_err(|e| RenderError::ReadbackFailed(e.to_string()))?;

        let row_bytes = width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_row as usize).take(height as usize) {
                pixels.extend_from_slice(&row[..row_bytes]);
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    /// Reads one RGBA8 pixel.
    pub fn read_pixel(&self, target: Option<TargetId>, x: u32, y: u32) -> RenderResult<[u8; 4]> {
        let data = self.read_pixels(target, x, y, 1, 1)?;
        match data.as_slice() {
            [r, g, b, a] => Ok([*r, *g, *b, *a]),
            _ => Err(RenderError::ReadbackFailed(format!(
                "expected 4 bytes, got {}",
                data.len()
            ))),
        }
    }
}

impl HasRenderState for Renderer {
    fn render_state(&self) -> &RenderState {
        &self.state
    }

    fn render_state_mut(&mut self) -> &mut RenderState {
        &mut self.state
    }
}
