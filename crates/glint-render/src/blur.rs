//! Separable Gaussian blur over a pair of offscreen targets.
//!
//! The primary target is convolved horizontally into the scratch target,
//! then vertically back into the primary. The kernel taps are uploaded once;
//! the radius only scales the per-pass UV step.

use std::num::NonZeroU64;

use glint_core::{blur_passes, BlurKernel, BlurQuality, TargetId};
use wgpu::util::DeviceExt;

use crate::buffer::align_to;
use crate::error::{RenderError, RenderResult};
use crate::renderer::Renderer;
use crate::target::COLOR_FORMAT;

/// Largest kernel the shader accepts.
pub const MAX_TAPS: usize = 64;

/// Passes per blur: two radii, each horizontal then vertical.
const MAX_STEPS: u64 = 4;

/// Kernel taps as `(offset, weight, 0, 0)`. Mirrors `Kernel` in `blur.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniforms {
    pub taps: [[f32; 4]; MAX_TAPS],
    pub count: [u32; 4],
}

impl KernelUniforms {
    pub fn from_kernel(kernel: &BlurKernel) -> Self {
        let mut uniforms = Self {
            taps: [[0.0; 4]; MAX_TAPS],
            count: [0; 4],
        };
        if kernel.size() > MAX_TAPS {
            log::warn!(
                "blur kernel has {} taps, truncating to {MAX_TAPS}",
                kernel.size()
            );
        }
        for (slot, tap) in uniforms.taps.iter_mut().zip(kernel.taps()) {
            *slot = [tap.offset, tap.weight, 0.0, 0.0];
        }
        uniforms.count[0] = kernel.size().min(MAX_TAPS) as u32;
        uniforms
    }
}

/// UV step of one directional pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StepUniforms {
    pub step: [f32; 2],
    pub _padding: [f32; 2],
}

/// UV steps for one blur of `radius` over a `width` x `height` target,
/// in submission order.
pub fn pass_steps(radius: f32, quality: BlurQuality, width: u32, height: u32) -> Vec<[f32; 2]> {
    blur_passes(radius, quality)
        .into_iter()
        .flat_map(|r| [[r / width as f32, 0.0], [0.0, r / height as f32]])
        .collect()
}

/// GPU resources of the blur.
pub struct BlurStage {
    kernel: BlurKernel,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    kernel_buffer: wgpu::Buffer,
    step_buffer: wgpu::Buffer,
    step_stride: u64,
    sampler: wgpu::Sampler,
}

impl BlurStage {
    /// A blur with the default 21-tap kernel.
    pub fn new(device: &wgpu::Device) -> Self {
        Self::with_kernel(device, BlurKernel::default())
    }

    pub fn with_kernel(device: &wgpu::Device, kernel: BlurKernel) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blur Bind Group Layout"),
            entries: &[
                // Source texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Kernel
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<KernelUniforms>() as u64),
                    },
                    count: None,
                },
                // Per-pass step
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(16),
                    },
                    count: None,
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blur Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blur.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blur Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blur Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let kernel_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Blur Kernel Buffer"),
            contents: bytemuck::bytes_of(&KernelUniforms::from_kernel(&kernel)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let step_stride = align_to(
            std::mem::size_of::<StepUniforms>() as u64,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let step_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blur Step Buffer"),
            size: step_stride * MAX_STEPS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Blur Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            kernel,
            pipeline,
            bind_group_layout,
            kernel_buffer,
            step_buffer,
            step_stride,
            sampler,
        }
    }

    pub fn kernel(&self) -> &BlurKernel {
        &self.kernel
    }

    /// Rebuilds and re-uploads the kernel when size or sigma change.
    ///
    /// Returns whether the kernel was rebuilt.
    pub fn set_kernel(&mut self, queue: &wgpu::Queue, size: usize, sigma: f32) -> bool {
        if !self.kernel.needs_rebuild(size, sigma) {
            return false;
        }
        self.kernel = BlurKernel::gaussian(size, sigma);
        queue.write_buffer(
            &self.kernel_buffer,
            0,
            bytemuck::bytes_of(&KernelUniforms::from_kernel(&self.kernel)),
        );
        log::debug!("blur kernel rebuilt: {size} taps, sigma {sigma}");
        true
    }

    fn bind_group(&self, device: &wgpu::Device, source: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blur Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.kernel_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.step_buffer,
                        offset: 0,
                        size: NonZeroU64::new(std::mem::size_of::<StepUniforms>() as u64),
                    }),
                },
            ],
        })
    }

    /// Blurs `primary` in place, using `scratch` as the intermediate.
    ///
    /// A radius of zero (or NaN) records nothing and leaves `primary` untouched.
    /// Returns the number of directional passes run.
    pub fn apply(
        &self,
        renderer: &mut Renderer,
        primary: TargetId,
        scratch: TargetId,
        radius: f32,
        quality: BlurQuality,
    ) -> RenderResult<u32> {
        let (width, height) = {
            let target = renderer.target(primary)?;
            (target.width(), target.height())
        };
        let steps = pass_steps(radius, quality, width, height);
        if steps.is_empty() {
            return Ok(0);
        }

        let primary_target = renderer.target(primary)?;
        let scratch_target = renderer.target(scratch)?;
        if (scratch_target.width(), scratch_target.height()) != (width, height) {
            return Err(RenderError::SizeMismatch {
                expected: (width, height),
                actual: (scratch_target.width(), scratch_target.height()),
            });
        }

        let stride = self.step_stride as usize;
        let mut bytes = vec![0u8; stride * steps.len()];
        for (chunk, step) in bytes.chunks_mut(stride).zip(&steps) {
            let raw = StepUniforms {
                step: *step,
                _padding: [0.0; 2],
            };
            chunk[..std::mem::size_of::<StepUniforms>()].copy_from_slice(bytemuck::bytes_of(&raw));
        }
        renderer.queue().write_buffer(&self.step_buffer, 0, &bytes);

        let device = renderer.device();
        let from_primary = self.bind_group(device, primary_target.sample_view());
        let from_scratch = self.bind_group(device, scratch_target.sample_view());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Blur Encoder"),
        });
        for (index, _) in steps.iter().enumerate() {
            // Even passes run horizontally into scratch, odd ones vertically back.
            let (bind_group, destination) = if index % 2 == 0 {
                (&from_primary, scratch_target.render_view())
            } else {
                (&from_scratch, primary_target.render_view())
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blur Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: destination,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[(index * stride) as u32]);
            pass.draw(0..3, 0..1);
        }
        renderer.queue().submit(std::iter::once(encoder.finish()));

        let passes = steps.len() as u32;
        renderer.record_passes(u64::from(passes));
        renderer.generate_mipmaps(primary)?;
        Ok(passes)
    }
}
