//! GPU color-ID picking.
//!
//! Registered objects are cloned into a private pick scene where every vertex
//! carries the object's id as an RGB color. On pointer moves the pick scene is
//! rendered into a 1x1 target through a view offset covering only the pixel
//! under the cursor, and that single pixel is read back and decoded.

use std::sync::Arc;

use glam::{UVec2, Vec2, Vec3};
use glint_core::pick::{decode_pixel, id_to_rgb, validate_pick_id};
use glint_core::{
    run_scoped, BasicMaterial, Camera, EventHub, HasRenderState, HoverState, Material, Mesh,
    NodeId, OutputEncoding, PickEvent, PickEventKind, PickRegistry, PickerConfig, PointerEvent,
    PointerKind, PointerPhase, Scene, Side, Subscription, SurfaceRect, TargetId, ToneMapping,
};

use crate::error::RenderResult;
use crate::renderer::Renderer;
use crate::target::{FilterMode, TargetDescriptor};

/// Rewrites a mesh for the pick scene: flat `color` on every vertex, unlit,
/// keeping the original clip planes and face culling.
pub fn pick_mesh(mesh: &Mesh, color: Vec3) -> Mesh {
    let side = match &mesh.material {
        Material::Basic(basic) => basic.side,
        Material::DepthStamp { .. } => Side::Double,
        Material::Projected(_) => Side::Front,
    };
    let material = BasicMaterial {
        vertex_colors: true,
        ..BasicMaterial::new(Vec3::ONE)
            .with_side(side)
            .with_clip_planes(mesh.material.clip_planes().to_vec())
    };
    Mesh {
        geometry: Arc::new(mesh.geometry.with_uniform_color(color)),
        material: Material::Basic(material),
        render_order: mesh.render_order,
    }
}

/// Picks objects under the pointer by rendering their ids.
pub struct GpuPicker {
    config: PickerConfig,
    scene: Scene,
    target: TargetId,
    registry: PickRegistry,
    hover: HoverState,
    surface: SurfaceRect,
    events: EventHub<PickEvent>,
}

impl GpuPicker {
    /// A picker covering the renderer's main target.
    pub fn new(renderer: &mut Renderer, config: PickerConfig) -> Self {
        let mut config = config;
        if config.pixel_ratio <= 0.0 || !config.pixel_ratio.is_finite() {
            log::warn!("invalid pixel ratio {}, using 1", config.pixel_ratio);
            config.pixel_ratio = 1.0;
        }

        let target = renderer.create_target(
            TargetDescriptor::new(1, 1)
                .with_label("picker")
                .with_filter(FilterMode::Nearest)
                .with_depth(true),
        );
        let (width, height) = renderer.size();
        let surface = SurfaceRect::new(
            width as f32 / config.pixel_ratio,
            height as f32 / config.pixel_ratio,
            config.pixel_ratio,
        );
        let mut scene = Scene::new();
        scene.background = Some(Vec3::ZERO);

        Self {
            config,
            scene,
            target,
            registry: PickRegistry::new(),
            hover: HoverState::new(),
            surface,
            events: EventHub::new(),
        }
    }

    /// Releases the pick target.
    pub fn dispose(self, renderer: &mut Renderer) -> RenderResult<()> {
        renderer.dispose_target(self.target)
    }

    /// Updates the placement of the rendering surface in client coordinates.
    pub fn set_surface(&mut self, surface: SurfaceRect) {
        self.surface = surface;
    }

    pub fn surface(&self) -> SurfaceRect {
        self.surface
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    /// Makes the subtree at `node` in `source` pickable under `id`.
    ///
    /// The clone is a snapshot; later edits to the source are not tracked.
    /// Registering an id again replaces its previous clone.
    pub fn register(&mut self, source: &Scene, node: NodeId, id: u32) -> RenderResult<NodeId> {
        let id = validate_pick_id(id)?;
        if let Some(previous) = self.registry.get(id).map(|entry| entry.root) {
            if self.scene.contains(previous) {
                self.scene.remove(previous)?;
            }
        }

        let color = id_to_rgb(id);
        let root = source.clone_subtree_into(node, &mut self.scene, None, &mut |mesh| {
            pick_mesh(mesh, color)
        })?;
        if let Some(clone) = self.scene.node_mut(root) {
            clone.tag = Some(id);
        }
        self.registry.insert(id, root)?;
        Ok(root)
    }

    pub fn unregister(&mut self, id: u32) -> RenderResult<()> {
        let entry = self.registry.remove(id)?;
        if self.scene.contains(entry.root) {
            self.scene.remove(entry.root)?;
        }
        Ok(())
    }

    /// Shows or hides the clones of `ids`. Fails without changing anything
    /// if any id is not registered.
    pub fn set_visible(&mut self, ids: &[u32], visible: bool) -> RenderResult<()> {
        if let Some(missing) = ids.iter().find(|id| !self.registry.contains(**id)) {
            return Err(glint_core::GlintError::PickIdNotRegistered(*missing).into());
        }
        for id in ids {
            let root = self.registry.set_visible(*id, visible)?;
            self.scene.set_visible(root, visible);
        }
        Ok(())
    }

    pub fn enable(&mut self, ids: &[u32]) -> RenderResult<()> {
        self.set_visible(ids, true)
    }

    pub fn disable(&mut self, ids: &[u32]) -> RenderResult<()> {
        self.set_visible(ids, false)
    }

    /// Reads the id under backing-buffer `pixel` as seen by `camera`.
    pub fn pick_at(
        &mut self,
        renderer: &mut Renderer,
        camera: &Camera,
        pixel: UVec2,
    ) -> RenderResult<Option<u32>> {
        let buffer = self.surface.buffer_size();
        let mut pick_camera = camera.clone();
        pick_camera.set_view_offset(
            buffer.x as f32,
            buffer.y as f32,
            pixel.x as f32,
            pixel.y as f32,
            1.0,
            1.0,
        );

        let target = self.target;
        let rgba = run_scoped(renderer, &mut self.scene, |renderer, scene| {
            let state = renderer.render_state_mut();
            state.render_target = Some(target);
            state.clear_color = Vec3::ZERO;
            state.clear_alpha = 1.0;
            state.auto_clear = true;
            state.tone_mapping = ToneMapping::None;
            state.output_encoding = OutputEncoding::Linear;
            renderer.render(scene, &pick_camera)?;
            renderer.read_pixel(Some(target), 0, 0)
        })?;
        Ok(decode_pixel(rgba))
    }

    /// Samples the id under `position` (client coordinates) and emits hover transitions.
    pub fn pointer_move(
        &mut self,
        renderer: &mut Renderer,
        camera: &Camera,
        position: Vec2,
    ) -> RenderResult<Vec<PickEvent>> {
        let sample = match self.surface.to_buffer_pixel(position) {
            Some(pixel) => self.pick_at(renderer, camera, pixel)?,
            None => None,
        };
        let events = self.hover.update(sample);
        self.events.emit_all(&events);
        Ok(events)
    }

    /// Resolves a press against the hovered id.
    pub fn pointer_down(&mut self, on_surface: bool) -> Option<PickEvent> {
        let event = self.hover.on_pointer_down(on_surface)?;
        self.events.emit(&event);
        Some(event)
    }

    /// Dispatches a pointer event. A touch start samples before resolving the press.
    pub fn handle_pointer_event(
        &mut self,
        renderer: &mut Renderer,
        camera: &Camera,
        event: &PointerEvent,
    ) -> RenderResult<Vec<PickEvent>> {
        match (event.kind, event.phase) {
            (_, PointerPhase::Move) => self.pointer_move(renderer, camera, event.position),
            (PointerKind::Mouse, PointerPhase::Down) => {
                Ok(self.pointer_down(event.on_surface()).into_iter().collect())
            }
            (PointerKind::Touch, PointerPhase::Down) => {
                let mut events = self.pointer_move(renderer, camera, event.position)?;
                events.extend(self.pointer_down(event.on_surface()));
                Ok(events)
            }
        }
    }

    pub fn subscribe(
        &mut self,
        kind: PickEventKind,
        callback: impl FnMut(&PickEvent) + 'static,
    ) -> Subscription {
        self.events.subscribe(kind, callback)
    }

    pub fn subscribe_all(&mut self, callback: impl FnMut(&PickEvent) + 'static) -> Subscription {
        self.events.subscribe_all(callback)
    }

    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        self.events.unsubscribe(token)
    }

    pub fn hovered(&self) -> Option<u32> {
        self.hover.current()
    }

    pub fn registry(&self) -> &PickRegistry {
        &self.registry
    }

    /// The private scene holding the color-tagged clones.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn target(&self) -> TargetId {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use glint_core::{Geometry, ProjectedMaterial};

    #[test]
    fn test_pick_mesh_colors_every_vertex() {
        let mut source = Mesh::new(
            Geometry::cuboid(Vec3::ONE),
            Material::Basic(
                BasicMaterial::new(Vec3::X)
                    .with_opacity(0.3)
                    .with_side(Side::Back)
                    .with_clip_planes(vec![Vec4::new(0.0, 1.0, 0.0, 0.5)]),
            ),
        );
        source.render_order = 2;

        let color = id_to_rgb(0x00_FF00);
        let mesh = pick_mesh(&source, color);
        let colors = mesh.geometry.colors().unwrap();
        assert_eq!(colors.len(), source.geometry.positions().len());
        assert!(colors.iter().all(|c| *c == Vec3::new(0.0, 1.0, 0.0)));
        assert_eq!(mesh.render_order, 2);

        let Material::Basic(material) = &mesh.material else {
            panic!("expected a basic material");
        };
        assert!(material.vertex_colors);
        assert_eq!(material.color, Vec3::ONE);
        assert_eq!(material.opacity, 1.0);
        assert!(!material.transparent);
        assert_eq!(material.side, Side::Back);
        assert_eq!(material.clip_planes, vec![Vec4::new(0.0, 1.0, 0.0, 0.5)]);
    }

    #[test]
    fn test_pick_mesh_projected_surface_is_front_facing() {
        let source = Mesh::new(
            Geometry::plane(1.0, 1.0),
            Material::Projected(ProjectedMaterial::new(TargetId::next())),
        );
        let Material::Basic(material) = pick_mesh(&source, Vec3::ONE).material else {
            panic!("expected a basic material");
        };
        assert_eq!(material.side, Side::Front);
        assert!(material.clip_planes.is_empty());
    }
}
