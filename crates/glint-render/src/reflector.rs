//! Planar mirror reflections.
//!
//! Each frame the camera is mirrored across the surface plane, the scene is
//! rendered from the mirrored camera into an offscreen target with the near
//! plane clipped to the mirror, and the surface samples that target through
//! a projective texture matrix.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use glint_core::{
    mirror_camera, run_scoped, BlurKernel, CameraView, Geometry, GlintError, HasRenderState,
    Material, Mesh, MirrorFrame, Node, NodeId, ProjectedBlend, ProjectedMaterial, ReflectorConfig,
    Scene, TargetId,
};

use crate::blur::BlurStage;
use crate::effect::{hide_nodes, restore_visibility, OffscreenEffect};
use crate::error::RenderResult;
use crate::renderer::Renderer;
use crate::target::TargetDescriptor;

/// Transform given to the surface node on attach: local +Z, the mirror normal, faces world +Y.
pub fn default_surface_transform() -> Mat4 {
    Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2)
}

/// A reflective planar surface.
pub struct Reflector {
    config: ReflectorConfig,
    primary: TargetId,
    scratch: TargetId,
    blur: BlurStage,
    geometry: Arc<Geometry>,
    surface: Option<NodeId>,
    excluded: Vec<NodeId>,
    texture_matrix: Mat4,
    last_frame: Option<MirrorFrame>,
}

impl Reflector {
    /// A reflector drawing a `width` x `height` plane.
    pub fn new(renderer: &mut Renderer, config: ReflectorConfig) -> Self {
        let geometry = Geometry::plane(config.width, config.height);
        Self::with_geometry(renderer, geometry, config)
    }

    /// A reflector drawing custom geometry. The mirror plane is the node's local XY plane.
    pub fn with_geometry(
        renderer: &mut Renderer,
        geometry: impl Into<Arc<Geometry>>,
        config: ReflectorConfig,
    ) -> Self {
        let primary = renderer.create_target(
            TargetDescriptor::new(config.texture_width, config.texture_height)
                .with_label("reflector")
                .with_mipmaps(true)
                .with_depth(true),
        );
        let scratch = renderer.create_target(
            TargetDescriptor::new(config.texture_width, config.texture_height)
                .with_label("reflector blur"),
        );
        let blur = BlurStage::new(renderer.device());

        Self {
            config,
            primary,
            scratch,
            blur,
            geometry: geometry.into(),
            surface: None,
            excluded: Vec::new(),
            texture_matrix: Mat4::IDENTITY,
            last_frame: None,
        }
    }

    /// Inserts the surface mesh into `scene` below `parent`. Re-attaching moves it.
    pub fn attach_to(&mut self, scene: &mut Scene, parent: Option<NodeId>) -> RenderResult<NodeId> {
        if let Some(previous) = self.surface.take() {
            if scene.contains(previous) {
                scene.remove(previous)?;
            }
        }
        let mesh = Mesh::new(
            Arc::clone(&self.geometry),
            Material::Projected(self.material()),
        );
        let node = Node::mesh("reflector", mesh).with_transform(default_surface_transform());
        let id = scene.insert(parent, node)?;
        self.surface = Some(id);
        Ok(id)
    }

    /// Removes the surface from `scene` and releases both targets.
    pub fn dispose(self, renderer: &mut Renderer, scene: &mut Scene) -> RenderResult<()> {
        if let Some(surface) = self.surface {
            if scene.contains(surface) {
                scene.remove(surface)?;
            }
        }
        renderer.dispose_target(self.primary)?;
        renderer.dispose_target(self.scratch)?;
        Ok(())
    }

    /// The composited material the surface draws with.
    pub fn material(&self) -> ProjectedMaterial {
        ProjectedMaterial {
            target: self.primary,
            texture_matrix: self.texture_matrix,
            color: self.config.color,
            opacity: self.config.opacity,
            blend: ProjectedBlend::Premultiplied,
        }
    }

    fn sync_material(&self, scene: &mut Scene) {
        let Some(mesh) = self
            .surface
            .and_then(|id| scene.node_mut(id))
            .and_then(|node| node.mesh.as_mut())
        else {
            return;
        };
        mesh.material = Material::Projected(self.material());
    }

    /// Renders the reflection for `camera`.
    ///
    /// Returns `Ok(false)` without drawing when the reflector is not attached
    /// or the surface faces away from the camera; the target then keeps the
    /// previous frame.
    pub fn render<C: CameraView + ?Sized>(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut Scene,
        camera: &C,
    ) -> RenderResult<bool> {
        let Some(surface) = self.surface else {
            return Ok(false);
        };
        let surface_world = scene
            .world_matrix(surface)
            .ok_or(GlintError::NodeNotFound(surface))?;
        self.sync_material(scene);

        let Some(frame) = mirror_camera(camera, surface_world, self.config.clip_bias) else {
            log::debug!("reflector faces away from the camera, keeping the previous frame");
            return Ok(false);
        };
        self.texture_matrix = frame.texture_matrix;
        self.sync_material(scene);

        let hidden = hide_nodes(
            scene,
            std::iter::once(surface).chain(self.excluded.iter().copied()),
        );
        let target = self.primary;
        let result = run_scoped(renderer, scene, |renderer, scene| {
            let state = renderer.render_state_mut();
            state.render_target = Some(target);
            state.clear_color = Vec3::ZERO;
            state.clear_alpha = 0.0;
            state.auto_clear = true;
            renderer.render(scene, &frame.camera)
        });
        restore_visibility(scene, &hidden);
        result?;

        self.blur.apply(
            renderer,
            self.primary,
            self.scratch,
            self.config.blur,
            self.config.blur_quality(),
        )?;
        self.last_frame = Some(frame);
        Ok(true)
    }

    pub fn config(&self) -> &ReflectorConfig {
        &self.config
    }

    /// Target holding the reflection.
    pub fn target(&self) -> TargetId {
        self.primary
    }

    pub fn scratch_target(&self) -> TargetId {
        self.scratch
    }

    pub fn surface(&self) -> Option<NodeId> {
        self.surface
    }

    pub fn texture_matrix(&self) -> Mat4 {
        self.texture_matrix
    }

    /// The mirror state of the last rendered frame.
    pub fn last_frame(&self) -> Option<&MirrorFrame> {
        self.last_frame.as_ref()
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.config.opacity = opacity;
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.config.color = color;
    }

    pub fn set_blur(&mut self, blur: f32) {
        self.config.blur = blur;
    }

    pub fn blur_kernel(&self) -> &BlurKernel {
        self.blur.kernel()
    }

    /// Replaces the blur kernel; a no-op when size and sigma are unchanged.
    pub fn set_blur_kernel(&mut self, renderer: &Renderer, size: usize, sigma: f32) -> bool {
        self.blur.set_kernel(renderer.queue(), size, sigma)
    }

    pub fn set_fast_blur(&mut self, fast_blur: bool) {
        self.config.fast_blur = fast_blur;
    }

    pub fn set_clip_bias(&mut self, clip_bias: f32) {
        self.config.clip_bias = clip_bias;
    }

    pub fn set_manual_render(&mut self, manual_render: bool) {
        self.config.manual_render = manual_render;
    }

    /// Hides `node` while the reflection renders.
    pub fn exclude(&mut self, node: NodeId) {
        if !self.excluded.contains(&node) {
            self.excluded.push(node);
        }
    }

    /// Stops excluding `node`. Returns `false` if it was not excluded.
    pub fn include(&mut self, node: NodeId) -> bool {
        let before = self.excluded.len();
        self.excluded.retain(|id| *id != node);
        self.excluded.len() != before
    }

    pub fn excluded(&self) -> &[NodeId] {
        &self.excluded
    }
}

impl OffscreenEffect for Reflector {
    fn name(&self) -> &str {
        "reflector"
    }

    fn is_manual(&self) -> bool {
        self.config.manual_render
    }

    fn render_effect(
        &mut self,
        renderer: &mut Renderer,
        scene: &mut Scene,
        camera: &dyn CameraView,
    ) -> RenderResult<bool> {
        self.render(renderer, scene, camera)
    }
}
