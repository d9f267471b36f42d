//! CPU ray-cast picking with the same notifications as the GPU picker.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::CameraView;
use crate::error::{GlintError, Result};
use crate::events::{EventHub, Subscription};
use crate::input::{PointerEvent, PointerKind, PointerPhase, SurfaceRect};
use crate::pick::{validate_pick_id, HoverState, PickEvent, PickEventKind};
use crate::scene::{Material, NodeId, Scene, Side};

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Ray from the near plane through `ndc` (+Y up).
pub fn camera_ray<C: CameraView + ?Sized>(camera: &C, ndc: Vec2) -> Option<Ray> {
    let inv_view_proj = camera.view_projection_matrix().inverse();

    // wgpu-style NDC depth [0, 1]
    let near = inv_view_proj * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
    let far = inv_view_proj * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);

    if near.w.abs() < 1e-6 || far.w.abs() < 1e-6 {
        return None;
    }

    let origin = near.truncate() / near.w;
    let ray_far = far.truncate() / far.w;
    let direction = (ray_far - origin).normalize_or_zero();
    if direction.length_squared() < 1e-12 {
        return None;
    }

    Some(Ray { origin, direction })
}

/// Möller–Trumbore intersection. Returns the ray parameter of the hit.
///
/// `side` selects which faces count: front faces are wound counter-clockwise
/// as seen by the ray.
pub fn ray_intersect_triangle(ray: &Ray, [v0, v1, v2]: [Vec3; 3], side: Side) -> Option<f32> {
    let eps = 1e-6;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);
    let facing = match side {
        Side::Front => a > eps,
        Side::Back => a < -eps,
        Side::Double => a.abs() > eps,
    };
    if !facing {
        return None;
    }
    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(q);
    if t > eps {
        Some(t)
    } else {
        None
    }
}

/// Nearest intersection found by [`RayPicker::intersect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Id the hit target was registered under.
    pub id: u32,
    /// Mesh node that was hit.
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Picks registered scene nodes by casting a ray from the camera through the pointer.
///
/// Notifications are suppressed while `enabled` is `false`, except
/// [`PickEvent::Clear`]; hover tracking continues regardless.
#[derive(Debug)]
pub struct RayPicker {
    targets: Vec<(u32, NodeId)>,
    hover: HoverState,
    surface: SurfaceRect,
    events: EventHub<PickEvent>,
    pub enabled: bool,
}

impl RayPicker {
    pub fn new(surface: SurfaceRect) -> Self {
        Self {
            targets: Vec::new(),
            hover: HoverState::new(),
            surface,
            events: EventHub::new(),
            enabled: true,
        }
    }

    /// Makes `node` and its subtree respond under `id`.
    pub fn add(&mut self, node: NodeId, id: u32) -> Result<()> {
        let id = validate_pick_id(id)?;
        self.targets.retain(|(existing, _)| *existing != id);
        self.targets.push((id, node));
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Result<()> {
        let before = self.targets.len();
        self.targets.retain(|(existing, _)| *existing != id);
        if self.targets.len() == before {
            return Err(GlintError::PickIdNotRegistered(id));
        }
        if self.hover.current() == Some(id) {
            self.hover.reset();
        }
        Ok(())
    }

    pub fn set_surface(&mut self, surface: SurfaceRect) {
        self.surface = surface;
    }

    pub fn surface(&self) -> &SurfaceRect {
        &self.surface
    }

    pub fn hovered(&self) -> Option<u32> {
        self.hover.current()
    }

    pub fn subscribe(
        &mut self,
        kind: PickEventKind,
        callback: impl FnMut(&PickEvent) + 'static,
    ) -> Subscription {
        self.events.subscribe(kind, callback)
    }

    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        self.events.unsubscribe(token)
    }

    /// Nearest visible registered triangle along `ray`.
    pub fn intersect(&self, scene: &Scene, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for (id, root) in &self.targets {
            if !scene.is_effectively_visible(*root) {
                continue;
            }
            let Some(root_world) = scene.world_matrix(*root) else {
                continue;
            };
            let mut stack: Vec<(NodeId, Mat4)> = vec![(*root, root_world)];
            while let Some((node_id, world)) = stack.pop() {
                let Some(node) = scene.node(node_id) else {
                    continue;
                };
                if !node.visible {
                    continue;
                }
                if let Some(mesh) = &node.mesh {
                    let side = match &mesh.material {
                        Material::Basic(m) => m.side,
                        _ => Side::Front,
                    };
                    for tri in mesh.geometry.triangles() {
                        let tri = tri.map(|p| world.transform_point3(p));
                        if let Some(t) = ray_intersect_triangle(ray, tri, side) {
                            if best.as_ref().is_none_or(|b| t < b.distance) {
                                best = Some(RayHit {
                                    id: *id,
                                    node: node_id,
                                    distance: t,
                                    point: ray.at(t),
                                });
                            }
                        }
                    }
                }
                stack.extend(
                    node.children()
                        .iter()
                        .filter_map(|c| scene.node(*c).map(|n| (*c, world * n.transform))),
                );
            }
        }
        best
    }

    fn dispatch(&mut self, events: Vec<PickEvent>) -> Vec<PickEvent> {
        let delivered: Vec<PickEvent> = events
            .into_iter()
            .filter(|e| self.enabled || *e == PickEvent::Clear)
            .collect();
        self.events.emit_all(&delivered);
        delivered
    }

    /// Updates the hover state from a pointer position in client coordinates.
    pub fn pointer_move<C: CameraView + ?Sized>(
        &mut self,
        scene: &Scene,
        camera: &C,
        position: Vec2,
    ) -> Vec<PickEvent> {
        let ndc = self.surface.to_ndc(position);
        let hit = camera_ray(camera, ndc).and_then(|ray| self.intersect(scene, &ray));
        let transitions = self.hover.update(hit.map(|h| h.id));
        self.dispatch(transitions)
    }

    pub fn pointer_down(&mut self, on_surface: bool) -> Vec<PickEvent> {
        let event = self.hover.on_pointer_down(on_surface);
        self.dispatch(event.into_iter().collect())
    }

    /// Routes a pointer event. A touch start is a move followed by a press.
    pub fn handle_pointer_event<C: CameraView + ?Sized>(
        &mut self,
        scene: &Scene,
        camera: &C,
        event: &PointerEvent,
    ) -> Vec<PickEvent> {
        match (event.kind, event.phase) {
            (_, PointerPhase::Move) => self.pointer_move(scene, camera, event.position),
            (PointerKind::Mouse, PointerPhase::Down) => self.pointer_down(event.on_surface()),
            (PointerKind::Touch, PointerPhase::Down) => {
                let mut events = self.pointer_move(scene, camera, event.position);
                events.extend(self.pointer_down(event.on_surface()));
                events
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::input::PointerTarget;
    use crate::scene::{BasicMaterial, Geometry, Mesh, Node};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cube_at(scene: &mut Scene, x: f32) -> NodeId {
        scene.add(
            Node::mesh(
                "cube",
                Mesh::new(Geometry::cuboid(Vec3::ONE), Material::Basic(BasicMaterial::default())),
            )
            .with_transform(Mat4::from_translation(Vec3::new(x, 0.0, 0.0))),
        )
    }

    fn setup() -> (Scene, Camera, RayPicker, NodeId, NodeId) {
        let mut scene = Scene::new();
        let left = cube_at(&mut scene, -2.0);
        let right = cube_at(&mut scene, 2.0);
        let camera = Camera::new(1.0).looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let mut picker = RayPicker::new(SurfaceRect::new(100.0, 100.0, 1.0));
        picker.add(left, 1).unwrap();
        picker.add(right, 2).unwrap();
        (scene, camera, picker, left, right)
    }

    /// Client position of a world point.
    fn client_of(camera: &Camera, world: Vec3) -> Vec2 {
        let ndc = camera.view_projection_matrix().project_point3(world);
        Vec2::new((ndc.x + 1.0) * 50.0, (1.0 - ndc.y) * 50.0)
    }

    #[test]
    fn test_triangle_sides() {
        let ray = Ray {
            origin: Vec3::new(0.2, 0.2, 1.0),
            direction: Vec3::NEG_Z,
        };
        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!((ray_intersect_triangle(&ray, tri, Side::Front).unwrap() - 1.0).abs() < 1e-6);
        assert!(ray_intersect_triangle(&ray, tri, Side::Back).is_none());
        assert!(ray_intersect_triangle(&ray, tri, Side::Double).is_some());
    }

    #[test]
    fn test_camera_ray_through_center() {
        let camera = Camera::new(1.0).looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let ray = camera_ray(&camera, Vec2::ZERO).unwrap();
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_hover_and_click() {
        let (scene, camera, mut picker, _, _) = setup();
        let left = client_of(&camera, Vec3::new(-2.0, 0.0, 0.5));
        let right = client_of(&camera, Vec3::new(2.0, 0.0, 0.5));

        assert_eq!(
            picker.pointer_move(&scene, &camera, left),
            vec![PickEvent::Enter(1)]
        );
        assert!(picker.pointer_move(&scene, &camera, left).is_empty());
        assert_eq!(
            picker.pointer_move(&scene, &camera, right),
            vec![PickEvent::Exit(1), PickEvent::Enter(2)]
        );
        assert_eq!(picker.pointer_down(true), vec![PickEvent::Click(2)]);
        assert_eq!(
            picker.pointer_move(&scene, &camera, Vec2::new(50.0, 50.0)),
            vec![PickEvent::Exit(2)]
        );
        assert_eq!(picker.pointer_down(true), vec![PickEvent::Clear]);
        assert!(picker.pointer_down(false).is_empty());
    }

    #[test]
    fn test_hidden_target_is_not_hit() {
        let (mut scene, camera, mut picker, left, _) = setup();
        scene.set_visible(left, false);
        let pos = client_of(&camera, Vec3::new(-2.0, 0.0, 0.5));
        assert!(picker.pointer_move(&scene, &camera, pos).is_empty());
    }

    #[test]
    fn test_disabled_suppresses_all_but_clear() {
        let (scene, camera, mut picker, _, _) = setup();
        picker.enabled = false;
        let pos = client_of(&camera, Vec3::new(-2.0, 0.0, 0.5));
        assert!(picker.pointer_move(&scene, &camera, pos).is_empty());
        assert_eq!(picker.hovered(), Some(1));
        assert!(picker.pointer_down(true).is_empty());

        picker.pointer_move(&scene, &camera, Vec2::new(50.0, 50.0));
        assert_eq!(picker.pointer_down(true), vec![PickEvent::Clear]);
    }

    #[test]
    fn test_touch_start_moves_then_clicks() {
        let (scene, camera, mut picker, _, _) = setup();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        picker.subscribe(PickEventKind::Click, move |e| sink.borrow_mut().push(*e));

        let pos = client_of(&camera, Vec3::new(2.0, 0.0, 0.5));
        let events = picker.handle_pointer_event(
            &scene,
            &camera,
            &PointerEvent::touch_start(pos.x, pos.y),
        );
        assert_eq!(events, vec![PickEvent::Enter(2), PickEvent::Click(2)]);
        assert_eq!(*received.borrow(), vec![PickEvent::Click(2)]);

        let overlay = PointerEvent::mouse_down(0.0, 0.0).with_target(PointerTarget::Overlay);
        assert_eq!(
            picker.handle_pointer_event(&scene, &camera, &overlay),
            vec![PickEvent::Click(2)]
        );
    }

    #[test]
    fn test_remove_target() {
        let (_, _, mut picker, _, _) = setup();
        picker.remove(1).unwrap();
        assert!(matches!(picker.remove(1), Err(GlintError::PickIdNotRegistered(1))));
    }
}
