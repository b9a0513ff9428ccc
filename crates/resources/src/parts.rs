//! Part name to scene node index.
//!
//! Built once after a mesh loads. A node belongs to the longest configured
//! part that matches its own name or, failing that, its nearest ancestor's.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ripe_scene::{NodeId, Scene};

/// `true` when a node name follows the naming convention for `part`:
/// the bare part name or the part name followed by `_suffix`.
pub fn matches_part(name: &str, part: &str) -> bool {
    match name.strip_prefix(part) {
        Some(rest) => rest.is_empty() || rest.starts_with('_'),
        None => false,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartIndex {
    by_part: BTreeMap<String, Vec<NodeId>>,
    by_node: HashMap<NodeId, String>,
    /// Every part name the index was built against, matched or not
    searched: BTreeSet<String>,
}

impl PartIndex {
    /// Index every mesh under `root` against `parts`.
    pub fn build<'a>(scene: &Scene, root: NodeId, parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut parts: Vec<&str> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        // longest first so `side_part` wins over `side`
        parts.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        parts.dedup();

        let mut index = PartIndex {
            searched: parts.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        for id in scene.descendants(root) {
            if !scene.node(id).is_some_and(|n| n.is_mesh()) {
                continue;
            }
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                let Some(node) = scene.node(current) else {
                    break;
                };
                if let Some(part) = parts.iter().find(|p| matches_part(&node.name, p)) {
                    index.by_part.entry(part.to_string()).or_default().push(id);
                    index.by_node.insert(id, part.to_string());
                    break;
                }
                if current == root {
                    break;
                }
                cursor = node.parent();
            }
        }
        index
    }

    pub fn nodes(&self, part: &str) -> &[NodeId] {
        self.by_part.get(part).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn part_of(&self, node: NodeId) -> Option<&str> {
        self.by_node.get(&node).map(String::as_str)
    }

    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.by_part.keys().map(String::as_str)
    }

    pub fn contains(&self, part: &str) -> bool {
        self.by_part.contains_key(part)
    }

    /// `true` when `part` was looked up by the last build, even if no
    /// node matched it.
    pub fn covers(&self, part: &str) -> bool {
        self.searched.contains(part)
    }

    /// Drop nodes that left the scene.
    pub fn forget(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            if let Some(part) = self.by_node.remove(node)
                && let Some(list) = self.by_part.get_mut(&part)
            {
                list.retain(|n| n != node);
                if list.is_empty() {
                    self.by_part.remove(&part);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_part.clear();
        self.by_node.clear();
        self.searched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use ripe_scene::{Geometry, MeshData, Node};

    fn mesh(scene: &mut Scene, name: &str, parent: NodeId) -> NodeId {
        let geometry = scene.add_geometry(Geometry::cuboid(Vec3::ONE));
        scene.add_node(Node::mesh(name, MeshData::new(geometry, None)), Some(parent))
    }

    #[test]
    fn test_part_naming_convention() {
        assert!(matches_part("side", "side"));
        assert!(matches_part("side_1", "side"));
        assert!(matches_part("side_part", "side"));
        assert!(!matches_part("sidewall", "side"));
        assert!(!matches_part("inside", "side"));
    }

    #[test]
    fn test_index_prefers_longest_part_and_ancestors() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("shoe"), None);
        let side = mesh(&mut scene, "side_1", root);
        let lining = mesh(&mut scene, "side_lining", root);
        let wall = mesh(&mut scene, "sidewall", root);
        let laces = scene.add_node(Node::group("laces"), Some(root));
        let lace = mesh(&mut scene, "Cylinder.004", laces);

        let index = PartIndex::build(&scene, root, ["side", "side_lining", "laces"]);

        assert_eq!(index.nodes("side"), &[side]);
        assert_eq!(index.part_of(lining), Some("side_lining"));
        assert_eq!(index.part_of(wall), None);
        assert_eq!(index.part_of(lace), Some("laces"));
        assert!(index.nodes("sole").is_empty());
    }

    #[test]
    fn test_forget_removes_empty_parts() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("shoe"), None);
        let sole = mesh(&mut scene, "sole", root);
        let mut index = PartIndex::build(&scene, root, ["sole"]);
        index.forget(&[sole]);
        assert!(!index.contains("sole"));
        assert_eq!(index.part_of(sole), None);
        assert!(index.covers("sole"));
    }

    #[test]
    fn test_unmatched_parts_are_still_covered() {
        let mut scene = Scene::new();
        let root = scene.add_node(Node::group("shoe"), None);
        mesh(&mut scene, "sole", root);
        let mut index = PartIndex::build(&scene, root, ["sole", "tongue"]);
        assert!(!index.contains("tongue"));
        assert!(index.covers("tongue"));
        assert!(!index.covers("laces"));
        index.clear();
        assert!(!index.covers("sole"));
    }
}
