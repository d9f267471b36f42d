//! Soft contact shadows on a ground plane.
//!
//! The scene is rendered from below the ground, looking up through an
//! orthographic camera, with every material replaced by a depth stamp that
//! writes black with alpha falling off with height. The result is blurred
//! and drawn on a plane that samples it.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use glint_core::mirror::texture_projection_matrix;
use glint_core::{
    run_scoped, BasicMaterial, BlurKernel, Camera, CameraView, ContactShadowConfig, Geometry,
    GlintError, HasRenderState, Material, Mesh, Node, NodeId, OrthoBounds, ProjectedBlend,
    ProjectedMaterial, Scene, Side, TargetId,
};

use crate::blur::BlurStage;
use crate::effect::{hide_nodes, restore_visibility, OffscreenEffect};
use crate::error::RenderResult;
use crate::reflector::default_surface_transform;
use crate::renderer::Renderer;
use crate::target::TargetDescriptor;

/// The orthographic camera looking up from the ground at `root_world`'s origin.
///
/// Only the origin is used; the shadow volume stays axis-aligned.
pub fn shadow_camera(config: &ContactShadowConfig, root_world: Mat4) -> Camera {
    let origin = root_world.w_axis.truncate();
    Camera::orthographic(
        OrthoBounds::centered(config.width, config.height),
        0.0,
        config.camera_height,
    )
    .looking_at(origin, origin + Vec3::Y, Vec3::Z)
}

/// Nodes making up an attached contact shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowNodes {
    pub root: NodeId,
    pub shadow_plane: NodeId,
    pub fill_plane: Option<NodeId>,
    pub helper: Option<NodeId>,
}

/// Contact shadow projector.
pub struct ContactShadows {
    config: ContactShadowConfig,
    primary: TargetId,
    scratch: TargetId,
    blur: BlurStage,
    nodes: Option<ShadowNodes>,
    texture_matrix: Mat4,
}

impl ContactShadows {
    pub fn new(renderer: &mut Renderer, config: ContactShadowConfig) -> Self {
        let primary = renderer.create_target(
            TargetDescriptor::new(config.resolution, config.resolution).with_label("contact shadows"),
        );
        let scratch = renderer.create_target(
            TargetDescriptor::new(config.resolution, config.resolution)
                .with_label("contact shadows blur"),
        );
        let blur = BlurStage::new(renderer.device());

        Self {
            config,
            primary,
            scratch,
            blur,
            nodes: None,
            texture_matrix: Mat4::IDENTITY,
        }
    }

    /// Inserts the shadow group into `scene` below `parent`. Re-attaching rebuilds it.
    ///
    /// The group's origin is the center of the shadowed area on the ground.
    pub fn attach_to(&mut self, scene: &mut Scene, parent: Option<NodeId>) -> RenderResult<ShadowNodes> {
        if let Some(previous) = self.nodes.take() {
            if scene.contains(previous.root) {
                scene.remove(previous.root)?;
            }
        }

        let plane = Arc::new(Geometry::plane(self.config.width, self.config.height));
        let root = scene.insert(parent, Node::group("contact shadows"))?;

        let fill_plane = if self.config.fill_plane {
            let mesh = Mesh::new(Arc::clone(&plane), self.fill_material());
            let node = Node::mesh("contact shadows fill", mesh)
                .with_transform(default_surface_transform());
            Some(scene.add_child(root, node)?)
        } else {
            None
        };

        let mut shadow_mesh = Mesh::new(plane, Material::Projected(self.shadow_material()));
        // Drawn after the fill plane.
        shadow_mesh.render_order = 1;
        let shadow_node = Node::mesh("contact shadows plane", shadow_mesh)
            .with_transform(default_surface_transform());
        let shadow_plane = scene.add_child(root, shadow_node)?;

        let helper = if self.config.debug_camera {
            let h = self.config.camera_height;
            let volume = Geometry::cuboid(Vec3::new(self.config.width, h, self.config.height));
            let material = BasicMaterial::new(Vec3::new(1.0, 0.5, 0.0))
                .with_opacity(0.25)
                .with_side(Side::Double);
            let node = Node::mesh(
                "contact shadows camera",
                Mesh::new(
                    volume,
                    Material::Basic(BasicMaterial {
                        depth_write: false,
                        ..material
                    }),
                ),
            )
            .with_transform(Mat4::from_translation(Vec3::new(0.0, h * 0.5, 0.0)));
            Some(scene.add_child(root, node)?)
        } else {
            None
        };

        let nodes = ShadowNodes {
            root,
            shadow_plane,
            fill_plane,
            helper,
        };
        self.nodes = Some(nodes);
        Ok(nodes)
    }

    /// Removes the shadow group from `scene` and releases both targets.
    pub fn dispose(self, renderer: &mut Renderer, scene: &mut Scene) -> RenderResult<()> {
        if let Some(nodes) = self.nodes {
            if scene.contains(nodes.root) {
                scene.remove(nodes.root)?;
            }
        }
        renderer.dispose_target(self.primary)?;
        renderer.dispose_target(self.scratch)?;
        Ok(())
    }

    fn shadow_material(&self) -> ProjectedMaterial {
        ProjectedMaterial {
            target: self.primary,
            texture_matrix: self.texture_matrix,
            color: Vec3::ONE,
            opacity: self.config.opacity,
            blend: ProjectedBlend::Normal,
        }
    }

    fn fill_material(&self) -> Material {
        let material = BasicMaterial::new(self.config.plane_color)
            .with_opacity(self.config.plane_opacity)
            .with_side(Side::Double);
        Material::Basic(BasicMaterial {
            depth_write: false,
            ..material
        })
    }

    fn sync_materials(&self, scene: &mut Scene) {
        let Some(nodes) = self.nodes else {
            return;
        };
        if let Some(mesh) = scene.node_mut(nodes.shadow_plane).and_then(|n| n.mesh.as_mut()) {
            mesh.material = Material::Projected(self.shadow_material());
        }
        if let Some(mesh) = nodes
            .fill_plane
            .and_then(|id| scene.node_mut(id))
            .and_then(|n| n.mesh.as_mut())
        {
            mesh.material = self.fill_material();
        }
    }

    /// Renders the shadow for this frame. Returns `Ok(false)` when not attached or hidden.
    pub fn render(&mut self, renderer: &mut Renderer, scene: &mut Scene) -> RenderResult<bool> {
        let Some(nodes) = self.nodes else {
            return Ok(false);
        };
        if !scene.is_effectively_visible(nodes.root) {
            return Ok(false);
        }
        let root_world = scene
            .world_matrix(nodes.root)
            .ok_or(GlintError::NodeNotFound(nodes.root))?;
        let camera = shadow_camera(&self.config, root_world);
        let plane_world = scene
            .world_matrix(nodes.shadow_plane)
            .ok_or(GlintError::NodeNotFound(nodes.shadow_plane))?;
        self.texture_matrix = texture_projection_matrix(
            camera.projection_matrix(),
            camera.view_matrix(),
            plane_world,
        );
        self.sync_materials(scene);

        let hidden = hide_nodes(scene, [nodes.root]);
        let previous_override = scene.override_material.replace(Material::DepthStamp {
            darkness: self.config.darkness,
        });
        let target = self.primary;
        let result = run_scoped(renderer, scene, |renderer, scene| {
            let state = renderer.render_state_mut();
            state.render_target = Some(target);
            state.clear_color = Vec3::ZERO;
            state.clear_alpha = 0.0;
            state.auto_clear = true;
            renderer.render(scene, &camera)
        });
        scene.override_material = previous_override;
        restore_visibility(scene, &hidden);
        result?;

        self.blur.apply(
            renderer,
            self.primary,
            self.scratch,
            self.config.blur,
            self.config.blur_quality(),
        )?;
        Ok(true)
    }

    pub fn config(&self) -> &ContactShadowConfig {
        &self.config
    }

    pub fn nodes(&self) -> Option<ShadowNodes> {
        self.nodes
    }

    /// Target holding the blurred shadow.
    pub fn target(&self) -> TargetId {
        self.primary
    }

    pub fn scratch_target(&self) -> TargetId {
        self.scratch
    }

    pub fn texture_matrix(&self) -> Mat4 {
        self.texture_matrix
    }

    /// Opacity of the shadow plane. Applied on the next render.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.config.opacity = opacity;
    }

    pub fn set_darkness(&mut self, darkness: f32) {
        self.config.darkness = darkness;
    }

    pub fn blur_kernel(&self) -> &BlurKernel {
        self.blur.kernel()
    }

    /// Replaces the blur kernel; a no-op when size and sigma are unchanged.
    pub fn set_blur_kernel(&mut self, renderer: &Renderer, size: usize, sigma: f32) -> bool {
        self.blur.set_kernel(renderer.queue(), size, sigma)
    }

    pub fn set_blur(&mut self, blur: f32) {
        self.config.blur = blur;
    }

    pub fn set_fast(&mut self, fast: bool) {
        self.config.fast = fast;
    }

    /// Color and opacity of the fill plane, if one was attached.
    pub fn set_fill(&mut self, color: Vec3, opacity: f32) {
        self.config.plane_color = color;
        self.config.plane_opacity = opacity;
    }
}

impl OffscreenEffect for ContactShadows {
    fn name(&self) -> &str {
        "contact shadows"
    }

    fn render_effect(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut Scene,
        _camera: &dyn CameraView,
    ) -> RenderResult<bool> {
        self.render(renderer, scene)
    }
}
