//! Scene graph shared by the main render and every offscreen pass.
//!
//! Nodes live in an arena keyed by [`NodeId`]. A node carries a local
//! transform, its own visibility flag and optionally a [`Mesh`]. A node is
//! drawn only when it and all of its ancestors are visible, so hiding a group
//! hides its whole subtree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use crate::error::{GlintError, Result};

/// Maximum number of clip planes a material can carry.
pub const MAX_CLIP_PLANES: usize = 4;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identifier of a node inside one [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

/// Process-unique identifier of a [`Geometry`], used as the GPU buffer cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(u64);

/// Process-unique identifier of an offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocates a fresh target id.
    #[must_use]
    pub fn next() -> Self {
        Self(next_resource_id())
    }
}

/// Triangle geometry with optional per-vertex colors.
#[derive(Debug, Clone)]
pub struct Geometry {
    id: GeometryId,
    positions: Vec<Vec3>,
    colors: Option<Vec<Vec3>>,
    indices: Vec<u32>,
}

impl Geometry {
    /// Creates indexed triangle geometry.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            id: GeometryId(next_resource_id()),
            positions,
            colors: None,
            indices,
        }
    }

    /// A `width` x `height` rectangle in the local XY plane, facing +Z.
    pub fn plane(width: f32, height: f32) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        Self::new(
            vec![
                Vec3::new(-hw, -hh, 0.0),
                Vec3::new(hw, -hh, 0.0),
                Vec3::new(hw, hh, 0.0),
                Vec3::new(-hw, hh, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// An axis-aligned box centered on the origin.
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        // (normal axis, u axis, v axis) per face, wound counter-clockwise seen from outside
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];
        let mut positions = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, u, v) in faces {
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                positions.push((n + u * su + v * sv) * h);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(positions, indices)
    }

    /// Returns a copy with every position transformed by `matrix`.
    #[must_use]
    pub fn transformed(&self, matrix: Mat4) -> Self {
        Self {
            id: GeometryId(next_resource_id()),
            positions: self
                .positions
                .iter()
                .map(|p| matrix.transform_point3(*p))
                .collect(),
            colors: self.colors.clone(),
            indices: self.indices.clone(),
        }
    }

    /// Returns a copy carrying the given per-vertex colors.
    ///
    /// Colors are truncated or padded with white to the vertex count.
    #[must_use]
    pub fn with_vertex_colors(&self, mut colors: Vec<Vec3>) -> Self {
        if colors.len() != self.positions.len() {
            log::warn!(
                "geometry has {} vertices but {} colors were given",
                self.positions.len(),
                colors.len()
            );
        }
        colors.resize(self.positions.len(), Vec3::ONE);
        Self {
            id: GeometryId(next_resource_id()),
            positions: self.positions.clone(),
            colors: Some(colors),
            indices: self.indices.clone(),
        }
    }

    /// Returns a copy where every vertex carries `color`.
    #[must_use]
    pub fn with_uniform_color(&self, color: Vec3) -> Self {
        self.with_vertex_colors(vec![color; self.positions.len()])
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> Option<&[Vec3]> {
        self.colors.as_deref()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Iterates triangles as position triples. Out-of-range indices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = *self.positions.get(tri[0] as usize)?;
            let b = *self.positions.get(tri[1] as usize)?;
            let c = *self.positions.get(tri[2] as usize)?;
            Some([a, b, c])
        })
    }

    /// Axis-aligned bounds, or `None` for empty geometry.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
        )
    }
}

/// Which triangle faces are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Unlit color material.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicMaterial {
    pub color: Vec3,
    pub opacity: f32,
    /// Multiply `color` by the geometry's per-vertex colors.
    pub vertex_colors: bool,
    pub side: Side,
    /// Blend with the destination using `opacity`.
    pub transparent: bool,
    pub depth_write: bool,
    /// World-space planes `(n, d)`; fragments with `n·p + d < 0` are discarded.
    pub clip_planes: Vec<Vec4>,
}

impl Default for BasicMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            opacity: 1.0,
            vertex_colors: false,
            side: Side::Front,
            transparent: false,
            depth_write: true,
            clip_planes: Vec::new(),
        }
    }
}

impl BasicMaterial {
    pub fn new(color: Vec3) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self.transparent = opacity < 1.0;
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn with_clip_planes(mut self, planes: Vec<Vec4>) -> Self {
        self.clip_planes = planes;
        self
    }
}

/// How a [`ProjectedMaterial`] combines with the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectedBlend {
    /// Color is pre-multiplied by opacity before `One, OneMinusSrcAlpha` blending.
    #[default]
    Premultiplied,
    /// Straight `SrcAlpha, OneMinusSrcAlpha` blending.
    Normal,
}

/// Samples an offscreen target through a projective texture matrix.
///
/// `texture_matrix` maps local positions to homogeneous texture coordinates;
/// the fragment samples at `uv = xy / w`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedMaterial {
    pub target: TargetId,
    pub texture_matrix: Mat4,
    pub color: Vec3,
    pub opacity: f32,
    pub blend: ProjectedBlend,
}

impl ProjectedMaterial {
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            texture_matrix: Mat4::IDENTITY,
            color: Vec3::ONE,
            opacity: 1.0,
            blend: ProjectedBlend::Premultiplied,
        }
    }
}

/// Materials understood by the scene renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Basic(BasicMaterial),
    /// Writes black with alpha `(1 - depth) * darkness`, without depth test or write.
    DepthStamp { darkness: f32 },
    Projected(ProjectedMaterial),
}

impl Default for Material {
    fn default() -> Self {
        Material::Basic(BasicMaterial::default())
    }
}

impl Material {
    /// Clip planes carried by the material, if any.
    pub fn clip_planes(&self) -> &[Vec4] {
        match self {
            Material::Basic(m) => &m.clip_planes,
            Material::DepthStamp { .. } | Material::Projected(_) => &[],
        }
    }
}

/// Geometry plus material.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    /// Meshes draw in ascending order; ties keep traversal order.
    pub render_order: i32,
}

impl Mesh {
    pub fn new(geometry: impl Into<Arc<Geometry>>, material: Material) -> Self {
        Self {
            geometry: geometry.into(),
            material,
            render_order: 0,
        }
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Transform relative to the parent.
    pub transform: Mat4,
    pub visible: bool,
    pub mesh: Option<Mesh>,
    /// Free-form tag; the pickers store pick ids here.
    pub tag: Option<u32>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    /// An empty grouping node.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            visible: true,
            mesh: None,
            tag: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// A node drawing `mesh`.
    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::group(name)
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A visible mesh resolved for drawing.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: &'a Mesh,
}

/// The scene graph.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: u64,
    /// Clear color used when rendering this scene; `None` keeps the renderer's clear color.
    pub background: Option<Vec3>,
    /// When set, replaces every mesh material for the duration of a render.
    pub override_material: Option<Material>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    /// Adds a node at the root of the scene.
    pub fn add(&mut self, mut node: Node) -> NodeId {
        let id = self.allocate();
        node.parent = None;
        node.children.clear();
        self.nodes.insert(id, node);
        self.roots.push(id);
        id
    }

    /// Adds a node below `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return Err(GlintError::NodeNotFound(parent));
        }
        let id = self.allocate();
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.insert(id, node);
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Adds a node below `parent`, or at the root when `parent` is `None`.
    pub fn insert(&mut self, parent: Option<NodeId>, node: Node) -> Result<NodeId> {
        match parent {
            Some(parent) => self.add_child(parent, node),
            None => Ok(self.add(node)),
        }
    }

    /// Removes a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(&id).ok_or(GlintError::NodeNotFound(id))?;
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&current) {
                stack.extend(removed.children);
            }
        }
        Ok(())
    }

    /// Removes every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sets a node's own visibility flag. Returns `false` when the node does not exist.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.visible = visible;
                true
            }
            None => false,
        }
    }

    /// The node's own visibility flag (`None` when missing).
    pub fn visible(&self, id: NodeId) -> Option<bool> {
        self.nodes.get(&id).map(|n| n.visible)
    }

    /// Whether the node and all of its ancestors are visible.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cid) = current {
            match self.nodes.get(&cid) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Composes local transforms from the root down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut world = node.transform;
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            world = node.transform * world;
        }
        Some(world)
    }

    /// Collects visible meshes with their world transforms, ordered by
    /// `render_order` and then depth-first traversal order.
    pub fn draw_list(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, Mat4::IDENTITY))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform;
            if let Some(mesh) = &node.mesh {
                items.push(DrawItem {
                    node: id,
                    world,
                    mesh,
                });
            }
            stack.extend(node.children.iter().rev().map(|c| (*c, world)));
        }
        items.sort_by_key(|item| item.mesh.render_order);
        items
    }

    /// Deep-copies the subtree rooted at `id` into `dest` below `parent`.
    ///
    /// The copied root keeps the source's world transform, so the clone lines
    /// up with the original regardless of where it is inserted. `rewrite`
    /// produces the mesh stored on each copied node.
    pub fn clone_subtree_into(
        &self,
        id: NodeId,
        dest: &mut Scene,
        parent: Option<NodeId>,
        rewrite: &mut dyn FnMut(&Mesh) -> Mesh,
    ) -> Result<NodeId> {
        let world = self.world_matrix(id).ok_or(GlintError::NodeNotFound(id))?;
        let root = self.copy_node(id, dest, parent, rewrite)?;
        if let Some(node) = dest.node_mut(root) {
            node.transform = world;
        }
        Ok(root)
    }

    fn copy_node(
        &self,
        id: NodeId,
        dest: &mut Scene,
        parent: Option<NodeId>,
        rewrite: &mut dyn FnMut(&Mesh) -> Mesh,
    ) -> Result<NodeId> {
        let source = self.nodes.get(&id).ok_or(GlintError::NodeNotFound(id))?;
        let copy = Node {
            name: source.name.clone(),
            transform: source.transform,
            visible: source.visible,
            mesh: source.mesh.as_ref().map(|m| rewrite(m)),
            tag: source.tag,
            parent: None,
            children: Vec::new(),
        };
        let new_id = dest.insert(parent, copy)?;
        for child in &source.children {
            self.copy_node(*child, dest, Some(new_id), rewrite)?;
        }
        Ok(new_id)
    }

    /// Finds the first root whose tag equals `tag`.
    pub fn find_root_by_tag(&self, tag: u32) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).and_then(|n| n.tag) == Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Material {
        Material::Basic(BasicMaterial::new(Vec3::X))
    }

    #[test]
    fn test_plane_geometry_faces_positive_z() {
        let plane = Geometry::plane(2.0, 4.0);
        let [a, b, c] = plane.triangles().next().unwrap();
        let normal = (b - a).cross(c - a).normalize();
        assert!((normal - Vec3::Z).length() < 1e-6);
        let (lo, hi) = plane.bounding_box().unwrap();
        assert_eq!(lo, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_cuboid_faces_point_outward() {
        let cube = Geometry::cuboid(Vec3::ONE);
        assert_eq!(cube.vertex_count(), 24);
        for [a, b, c] in cube.triangles() {
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0, "inward triangle at {center:?}");
        }
    }

    #[test]
    fn test_uniform_color_gets_new_id() {
        let plane = Geometry::plane(1.0, 1.0);
        let colored = plane.with_uniform_color(Vec3::Y);
        assert_ne!(plane.id(), colored.id());
        assert!(colored.colors().unwrap().iter().all(|c| *c == Vec3::Y));
    }

    #[test]
    fn test_hidden_parent_hides_children() {
        let mut scene = Scene::new();
        let group = scene.add(Node::group("group"));
        let child = scene
            .add_child(
                group,
                Node::mesh("child", Mesh::new(Geometry::plane(1.0, 1.0), red())),
            )
            .unwrap();
        assert_eq!(scene.draw_list().len(), 1);
        scene.set_visible(group, false);
        assert!(scene.draw_list().is_empty());
        assert!(!scene.is_effectively_visible(child));
        assert_eq!(scene.visible(child), Some(true));
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let group =
            scene.add(Node::group("g").with_transform(Mat4::from_translation(Vec3::X)));
        let child = scene
            .add_child(
                group,
                Node::group("c").with_transform(Mat4::from_translation(Vec3::Y)),
            )
            .unwrap();
        let world = scene.world_matrix(child).unwrap();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_remove_subtree() {
        let mut scene = Scene::new();
        let group = scene.add(Node::group("g"));
        let child = scene.add_child(group, Node::group("c")).unwrap();
        scene.remove(group).unwrap();
        assert!(!scene.contains(child));
        assert!(scene.roots().is_empty());
        assert!(matches!(
            scene.remove(group),
            Err(GlintError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_draw_list_respects_render_order() {
        let mut scene = Scene::new();
        let mut late = Mesh::new(Geometry::plane(1.0, 1.0), red());
        late.render_order = 1;
        let late_id = scene.add(Node::mesh("late", late));
        let early_id = scene.add(Node::mesh(
            "early",
            Mesh::new(Geometry::plane(1.0, 1.0), red()),
        ));
        let order: Vec<NodeId> = scene.draw_list().iter().map(|d| d.node).collect();
        assert_eq!(order, vec![early_id, late_id]);
    }

    #[test]
    fn test_clone_subtree_keeps_world_transform() {
        let mut scene = Scene::new();
        let group =
            scene.add(Node::group("g").with_transform(Mat4::from_translation(Vec3::Z)));
        let mesh_node = scene
            .add_child(
                group,
                Node::mesh("m", Mesh::new(Geometry::plane(1.0, 1.0), red()))
                    .with_transform(Mat4::from_translation(Vec3::X)),
            )
            .unwrap();
        let _grandchild = scene.add_child(mesh_node, Node::group("leaf")).unwrap();

        let mut dest = Scene::new();
        let root = scene
            .clone_subtree_into(mesh_node, &mut dest, None, &mut |m| m.clone())
            .unwrap();
        assert_eq!(dest.len(), 2);
        let world = dest.world_matrix(root).unwrap();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 0.0, 1.0));
    }
}
