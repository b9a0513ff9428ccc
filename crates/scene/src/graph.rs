//! Scene graph and GPU-resource pools.
//!
//! Nodes, geometries, materials and textures live in generational
//! [`SlotMap`]s owned by the [`Scene`]. Handles that outlive a disposal
//! simply stop resolving, which makes double disposal a no-op and
//! use-after-dispose observable instead of undefined.

use glam::Mat4;
use slotmap::{SlotMap, new_key_type};
use tracing::debug;

use crate::geometry::{Aabb, Geometry};
use crate::material::Material;
use crate::texture::Texture;
use crate::transform::Transform;

new_key_type! {
    /// Handle to a scene node.
    pub struct NodeId;
    /// Handle to a geometry buffer.
    pub struct GeometryId;
    /// Handle to a material; doubles as the material's unique id.
    pub struct MaterialId;
    /// Handle to a texture.
    pub struct TextureId;
}

/// Renderable mesh component.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub geometry: Option<GeometryId>,
    pub material: Option<MaterialId>,
    pub skinned: bool,
    /// Instance count for instanced meshes
    pub instances: Option<u32>,
    pub morph_weights: Vec<f32>,
}

impl MeshData {
    pub fn new(geometry: GeometryId, material: Option<MaterialId>) -> Self {
        Self {
            geometry: Some(geometry),
            material,
            skinned: false,
            instances: None,
            morph_weights: Vec::new(),
        }
    }
}

/// What a node carries besides its transform.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshData),
}

/// A named object in the scene.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Sequential id starting at 1; 0 is never assigned
    pub object_id: u32,
    pub transform: Transform,
    pub visible: bool,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub frustum_culled: bool,
    pub raycastable: bool,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self::with_kind(name, NodeKind::Mesh(mesh))
    }

    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            object_id: 0,
            transform: Transform::default(),
            visible: true,
            cast_shadow: false,
            receive_shadow: false,
            frustum_culled: true,
            raycastable: false,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }
}

/// Owner of every node and GPU resource.
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    geometries: SlotMap<GeometryId, Geometry>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    next_object_id: u32,
    /// Environment texture used as background/reflection source
    pub environment: Option<TextureId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            geometries: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            next_object_id: 1,
            environment: None,
        }
    }

    // --- nodes ---

    /// Insert a node under `parent` (or as a root) and assign its object id.
    pub fn add_node(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        node.object_id = self.next_object_id;
        self.next_object_id += 1;
        node.parent = parent.filter(|p| self.nodes.contains_key(*p));
        node.children.clear();
        let parent = node.parent;
        let id = self.nodes.insert(node);
        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Detach a subtree and drop its nodes. Geometry and materials stay in
    /// their pools; dispose them first if they should be released.
    pub fn remove_node(&mut self, id: NodeId) -> Vec<NodeId> {
        let removed = self.descendants(id);
        if removed.is_empty() {
            return removed;
        }
        match self.nodes[id].parent {
            Some(p) => {
                if let Some(parent) = self.nodes.get_mut(p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        for node in &removed {
            self.nodes.remove(*node);
        }
        removed
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Pre-order traversal of every root subtree.
    pub fn traverse(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .flat_map(|root| self.descendants(*root))
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.traverse()
            .into_iter()
            .find(|id| self.nodes[*id].name == name)
    }

    pub fn find_by_object_id(&self, object_id: u32) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.object_id == object_id)
            .map(|(id, _)| id)
    }

    /// Visible unless the node or any ancestor is hidden.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(c)) {
            if !node.visible {
                return false;
            }
            current = node.parent;
        }
        current.is_none()
    }

    /// World matrix composed through the parent chain.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(c)) {
            matrix = node.transform.local_matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// World-space bounds of every mesh in the subtree.
    pub fn bounding_box(&self, id: NodeId) -> Aabb {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| {
                let geometry = self.nodes[n].as_mesh()?.geometry?;
                let bounds = self.geometries.get(geometry)?.bounds();
                Some(bounds.transformed(self.world_matrix(n)))
            })
            .fold(Aabb::EMPTY, Aabb::union)
    }

    /// Mesh nodes currently referencing `material`.
    pub fn material_users(&self, material: MaterialId) -> usize {
        self.nodes
            .values()
            .filter(|n| n.as_mesh().is_some_and(|m| m.material == Some(material)))
            .count()
    }

    // --- pools ---

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.insert(geometry)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    /// Release a geometry. Returns false if it was already released.
    pub fn dispose_geometry(&mut self, id: GeometryId) -> bool {
        let released = self.geometries.remove(id).is_some();
        if released {
            debug!(?id, "Disposed geometry");
        }
        released
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials.iter()
    }

    /// Copy a material into a new, independently mutable slot.
    pub fn clone_material(&mut self, id: MaterialId) -> Option<MaterialId> {
        let copy = self.materials.get(id)?.clone();
        Some(self.materials.insert(copy))
    }

    /// Release a material. Returns false if it was already released.
    pub fn dispose_material(&mut self, id: MaterialId) -> bool {
        let released = self.materials.remove(id).is_some();
        if released {
            debug!(?id, "Disposed material");
        }
        released
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Release a texture. Returns false if it was already released.
    pub fn dispose_texture(&mut self, id: TextureId) -> bool {
        let released = self.textures.remove(id).is_some();
        if released {
            debug!(?id, "Disposed texture");
        }
        released
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn cube_node(scene: &mut Scene, name: &str, parent: Option<NodeId>) -> NodeId {
        let geometry = scene.add_geometry(Geometry::cuboid(Vec3::ONE));
        let material = scene.add_material(Material::default());
        scene.add_node(Node::mesh(name, MeshData::new(geometry, Some(material))), parent)
    }

    #[test]
    fn test_object_ids_are_sequential_from_one() {
        let mut scene = Scene::new();
        let a = scene.add_node(Node::group("a"), None);
        let b = scene.add_node(Node::group("b"), Some(a));
        assert_eq!(scene.node(a).unwrap().object_id, 1);
        assert_eq!(scene.node(b).unwrap().object_id, 2);
        assert_eq!(scene.find_by_object_id(2), Some(b));
        assert_eq!(scene.find_by_object_id(0), None);
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = scene.add_node(
            Node::group("parent")
                .with_transform(Transform::new().with_position(Vec3::new(10.0, 0.0, 0.0))),
            None,
        );
        let child = scene.add_node(
            Node::group("child")
                .with_transform(Transform::new().with_position(Vec3::new(0.0, 5.0, 0.0))),
            Some(parent),
        );
        let p = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5, "got {p:?}");
    }

    #[test]
    fn test_traverse_is_pre_order() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("root"), None);
        let a = scene.add_node(Node::group("a"), Some(root));
        let a1 = scene.add_node(Node::group("a1"), Some(a));
        let b = scene.add_node(Node::group("b"), Some(root));
        assert_eq!(scene.traverse(), vec![root, a, a1, b]);
        assert_eq!(scene.find_by_name("a1"), Some(a1));
    }

    #[test]
    fn test_remove_node_drops_subtree() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("root"), None);
        let child = cube_node(&mut scene, "child", Some(root));
        let removed = scene.remove_node(root);
        assert_eq!(removed.len(), 2);
        assert!(!scene.contains(child));
        assert!(scene.roots().is_empty());
        // pools are untouched by node removal
        assert_eq!(scene.geometry_count(), 1);
        assert!(scene.remove_node(root).is_empty());
    }

    #[test]
    fn test_double_dispose_is_noop() {
        let mut scene = Scene::new();
        let material = scene.add_material(Material::default());
        let geometry = scene.add_geometry(Geometry::default());
        assert!(scene.dispose_material(material));
        assert!(!scene.dispose_material(material));
        assert!(scene.dispose_geometry(geometry));
        assert!(!scene.dispose_geometry(geometry));
        assert!(scene.material(material).is_none());
    }

    #[test]
    fn test_visibility_inherits_from_ancestors() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("root"), None);
        let child = cube_node(&mut scene, "child", Some(root));
        assert!(scene.is_visible(child));
        scene.node_mut(root).unwrap().visible = false;
        assert!(!scene.is_visible(child));
    }

    #[test]
    fn test_bounding_box_in_world_space() {
        let mut scene = Scene::new();
        let root = scene.add_node(
            Node::group("root")
                .with_transform(Transform::new().with_position(Vec3::new(0.0, 2.0, 0.0))),
            None,
        );
        cube_node(&mut scene, "child", Some(root));
        let bounds = scene.bounding_box(root);
        assert_eq!(bounds.center(), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(bounds.size(), Vec3::ONE);
    }

    #[test]
    fn test_clone_material_is_independent() {
        let mut scene = Scene::new();
        let original = scene.add_material(Material::default());
        let copy = scene.clone_material(original).unwrap();
        scene.material_mut(copy).unwrap().roughness = 0.2;
        assert_eq!(scene.material(original).unwrap().roughness, 1.0);
        assert_ne!(original, copy);
    }
}
