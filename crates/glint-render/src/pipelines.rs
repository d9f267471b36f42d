//! Scene material pipelines, per-draw uniforms and GPU geometry.

use std::collections::HashMap;
use std::num::NonZeroU64;

use glam::{Mat4, Vec3};
use glint_core::scene::MAX_CLIP_PLANES;
use glint_core::{Geometry, GeometryId, Material, OutputEncoding, ProjectedBlend, Side, ToneMapping};

use crate::buffer::{create_index_buffer, create_vertex_buffer};
use crate::target::DEPTH_FORMAT;

/// Per-draw uniforms. Mirrors `DrawUniforms` in `scene.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub model: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub texture_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub clip_planes: [[f32; 4]; MAX_CLIP_PLANES],
    /// Clip plane count, vertex colors, tone mapping, output encoding.
    pub flags: [u32; 4],
    /// Darkness, projected blend mode.
    pub params: [f32; 4],
}

impl DrawUniforms {
    /// Packs one draw of `material`.
    pub fn new(
        material: &Material,
        model: Mat4,
        view_proj: Mat4,
        tone_mapping: ToneMapping,
        output_encoding: OutputEncoding,
    ) -> Self {
        let mut uniforms = Self {
            model: model.to_cols_array_2d(),
            view_proj: view_proj.to_cols_array_2d(),
            texture_matrix: Mat4::IDENTITY.to_cols_array_2d(),
            color: [1.0; 4],
            clip_planes: [[0.0; 4]; MAX_CLIP_PLANES],
            flags: [
                0,
                0,
                tone_mapping.shader_index(),
                output_encoding.shader_index(),
            ],
            params: [0.0; 4],
        };

        let planes = material.clip_planes();
        if planes.len() > MAX_CLIP_PLANES {
            log::warn!(
                "material has {} clip planes, only the first {MAX_CLIP_PLANES} are used",
                planes.len()
            );
        }
        for (slot, plane) in uniforms.clip_planes.iter_mut().zip(planes) {
            *slot = plane.to_array();
        }
        uniforms.flags[0] = planes.len().min(MAX_CLIP_PLANES) as u32;

        match material {
            Material::Basic(basic) => {
                uniforms.color = basic.color.extend(basic.opacity).to_array();
                uniforms.flags[1] = u32::from(basic.vertex_colors);
            }
            Material::DepthStamp { darkness } => {
                uniforms.params[0] = *darkness;
            }
            Material::Projected(projected) => {
                uniforms.texture_matrix = projected.texture_matrix.to_cols_array_2d();
                uniforms.color = projected.color.extend(projected.opacity).to_array();
                uniforms.params[1] = match projected.blend {
                    ProjectedBlend::Premultiplied => 0.0,
                    ProjectedBlend::Normal => 1.0,
                };
            }
        }
        uniforms
    }
}

/// Which fragment program a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Basic,
    DepthStamp,
    Projected,
}

/// Color blending of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendKind {
    Opaque,
    Alpha,
    Premultiplied,
}

impl BlendKind {
    fn state(self) -> Option<wgpu::BlendState> {
        match self {
            Self::Opaque => None,
            Self::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
            Self::Premultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        }
    }
}

/// Everything that selects a distinct render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub format: wgpu::TextureFormat,
    pub kind: MaterialKind,
    pub side: Side,
    pub blend: BlendKind,
    pub depth_write: bool,
    pub depth_test: bool,
    /// Whether the target has a depth attachment.
    pub has_depth: bool,
}

impl PipelineKey {
    /// Pipeline state for drawing `material` into a target of `format`.
    pub fn for_material(material: &Material, format: wgpu::TextureFormat, has_depth: bool) -> Self {
        match material {
            Material::Basic(basic) => Self {
                format,
                kind: MaterialKind::Basic,
                side: basic.side,
                blend: if basic.transparent {
                    BlendKind::Alpha
                } else {
                    BlendKind::Opaque
                },
                depth_write: basic.depth_write,
                depth_test: true,
                has_depth,
            },
            Material::DepthStamp { .. } => Self {
                format,
                kind: MaterialKind::DepthStamp,
                side: Side::Double,
                blend: BlendKind::Opaque,
                depth_write: false,
                depth_test: false,
                has_depth,
            },
            Material::Projected(projected) => Self {
                format,
                kind: MaterialKind::Projected,
                side: Side::Front,
                blend: match projected.blend {
                    ProjectedBlend::Premultiplied => BlendKind::Premultiplied,
                    ProjectedBlend::Normal => BlendKind::Alpha,
                },
                depth_write: false,
                depth_test: true,
                has_depth,
            },
        }
    }

    fn cull_mode(self) -> Option<wgpu::Face> {
        match self.side {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

/// Lazily built pipelines for every [`PipelineKey`] in use.
pub struct ScenePipelines {
    shader: wgpu::ShaderModule,
    /// Per-draw uniforms, bound with a dynamic offset.
    pub draw_bind_group_layout: wgpu::BindGroupLayout,
    /// Sampled target for projected materials.
    pub texture_bind_group_layout: wgpu::BindGroupLayout,
    basic_layout: wgpu::PipelineLayout,
    projected_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl ScenePipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let draw_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Draw Uniforms Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64),
                    },
                    count: None,
                }],
            });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Projected Texture Bind Group Layout"),
                entries: &[
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
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let basic_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&draw_bind_group_layout],
            push_constant_ranges: &[],
        });

        let projected_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Projected Pipeline Layout"),
            bind_group_layouts: &[&draw_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            shader,
            draw_bind_group_layout,
            texture_bind_group_layout,
            basic_layout,
            projected_layout,
            pipelines: HashMap::new(),
        }
    }

    /// Builds the pipeline for `key` if it does not exist yet.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let pipeline = self.create_pipeline(device, key);
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    fn create_pipeline(&self, device: &wgpu::Device, key: PipelineKey) -> wgpu::RenderPipeline {
        let (layout, fragment_entry) = match key.kind {
            MaterialKind::Basic => (&self.basic_layout, "fs_basic"),
            MaterialKind::DepthStamp => (&self.basic_layout, "fs_depth_stamp"),
            MaterialKind::Projected => (&self.projected_layout, "fs_projected"),
        };

        let depth_stencil = key.has_depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 1,
                        }],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: key.blend.state(),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: key.cull_mode(),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

/// Vertex and index buffers of one uploaded [`Geometry`].
pub struct GpuGeometry {
    pub positions: wgpu::Buffer,
    pub colors: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
    last_used: u64,
}

/// Uploaded geometry keyed by [`GeometryId`].
#[derive(Default)]
pub struct GeometryCache {
    entries: HashMap<GeometryId, GpuGeometry>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads `geometry` unless it is already resident, and marks it used in `frame`.
    pub fn prepare(&mut self, device: &wgpu::Device, geometry: &Geometry, frame: u64) {
        let entry = self.entries.entry(geometry.id()).or_insert_with(|| {
            let positions: Vec<[f32; 3]> = geometry.positions().iter().map(|p| p.to_array()).collect();
            let colors: Vec<[f32; 3]> = match geometry.colors() {
                Some(colors) => colors.iter().map(|c| c.to_array()).collect(),
                None => vec![Vec3::ONE.to_array(); positions.len()],
            };
            GpuGeometry {
                positions: create_vertex_buffer(device, &positions, Some("geometry positions")),
                colors: create_vertex_buffer(device, &colors, Some("geometry colors")),
                indices: create_index_buffer(device, geometry.indices(), Some("geometry indices")),
                index_count: geometry.indices().len() as u32,
                last_used: frame,
            }
        });
        entry.last_used = frame;
    }

    pub fn get(&self, id: GeometryId) -> Option<&GpuGeometry> {
        self.entries.get(&id)
    }

    /// Drops geometry not used during the last `max_idle` frames. Returns the number dropped.
    pub fn collect_garbage(&mut self, frame: u64, max_idle: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| frame.saturating_sub(entry.last_used) <= max_idle);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
