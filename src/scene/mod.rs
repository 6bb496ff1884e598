//! Scene graph
//!
//! The scene is an arena of nodes keyed by [`NodeId`]. The root tree holds
//! the background rectangle followed by one sub-tree per toplevel, ordered
//! back to front. A toplevel's sub-tree root carries the [`ToplevelId`] it
//! belongs to, which is how hit-testing resolves a surface back to its
//! window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::compositor::{Rect, SurfaceId, SurfaceManager, ToplevelId};
use crate::renderer::Canvas;

/// Unique identifier for scene nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a node draws
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Grouping node, draws nothing itself
    Tree,
    /// Solid color rectangle
    Rect {
        width: i32,
        height: i32,
        color: [f32; 4],
    },
    /// The current buffer of a client surface
    Surface(SurfaceId),
}

/// A node in the scene
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Children, back to front
    pub children: Vec<NodeId>,
    /// Position relative to the parent
    pub x: i32,
    pub y: i32,
    pub enabled: bool,
    /// Set on the sub-tree root of a toplevel
    pub toplevel: Option<ToplevelId>,
}

/// Result of a hit-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Owning toplevel, if the surface belongs to one
    pub toplevel: Option<ToplevelId>,
    /// Surface under the point
    pub surface: SurfaceId,
    /// Surface-local coordinates
    pub sx: f64,
    pub sy: f64,
}

/// The node tree composed into the output
#[derive(Debug)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    damaged: bool,
}

impl SceneGraph {
    /// Create a scene with an empty root tree
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                kind: NodeKind::Tree,
                parent: None,
                children: Vec::new(),
                x: 0,
                y: 0,
                enabled: true,
                toplevel: None,
            },
        );
        Self {
            nodes,
            root,
            damaged: true,
        }
    }

    /// The root tree
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn insert(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId::new();
        let parent = if self.nodes.contains_key(&parent) {
            parent
        } else {
            self.root
        };
        self.nodes.insert(
            id,
            Node {
                id,
                kind,
                parent: Some(parent),
                children: Vec::new(),
                x: 0,
                y: 0,
                enabled: true,
                toplevel: None,
            },
        );
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        self.damaged = true;
        id
    }

    /// Add a grouping node on top of `parent`'s children
    pub fn create_tree(&mut self, parent: NodeId) -> NodeId {
        self.insert(parent, NodeKind::Tree)
    }

    /// Add a solid rectangle
    pub fn create_rect(&mut self, parent: NodeId, width: i32, height: i32, color: [f32; 4]) -> NodeId {
        self.insert(
            parent,
            NodeKind::Rect {
                width,
                height,
                color,
            },
        )
    }

    /// Add a node displaying a surface's buffer
    pub fn create_surface(&mut self, parent: NodeId, surface: SurfaceId) -> NodeId {
        self.insert(parent, NodeKind::Surface(surface))
    }

    /// Get a node
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Check whether a node is still alive
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A scene always has its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Move a node relative to its parent
    pub fn set_position(&mut self, id: NodeId, x: i32, y: i32) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if (node.x, node.y) != (x, y) {
                node.x = x;
                node.y = y;
                self.damaged = true;
            }
        }
    }

    /// Position relative to the parent
    pub fn position(&self, id: NodeId) -> Option<(i32, i32)> {
        self.nodes.get(&id).map(|n| (n.x, n.y))
    }

    /// Position in layout coordinates
    pub fn absolute_position(&self, id: NodeId) -> Option<(i32, i32)> {
        let mut node = self.nodes.get(&id)?;
        let (mut x, mut y) = (node.x, node.y);
        while let Some(parent) = node.parent.and_then(|p| self.nodes.get(&p)) {
            x += parent.x;
            y += parent.y;
            node = parent;
        }
        Some((x, y))
    }

    /// Show or hide a node and its sub-tree
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if node.enabled != enabled {
                node.enabled = enabled;
                self.damaged = true;
            }
        }
    }

    /// A node is visible when it and all its ancestors are enabled
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.nodes.get(&c)) {
            if !node.enabled {
                return false;
            }
            current = node.parent;
        }
        current.is_none()
    }

    /// Resize a rectangle node
    pub fn set_rect_size(&mut self, id: NodeId, new_width: i32, new_height: i32) {
        if let Some(Node {
            kind: NodeKind::Rect { width, height, .. },
            ..
        }) = self.nodes.get_mut(&id)
        {
            *width = new_width;
            *height = new_height;
            self.damaged = true;
        }
    }

    /// Recolor a rectangle node
    pub fn set_rect_color(&mut self, id: NodeId, new_color: [f32; 4]) {
        if let Some(Node {
            kind: NodeKind::Rect { color, .. },
            ..
        }) = self.nodes.get_mut(&id)
        {
            *color = new_color;
            self.damaged = true;
        }
    }

    /// Tag a sub-tree root with the toplevel owning it
    pub fn set_toplevel(&mut self, id: NodeId, toplevel: ToplevelId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.toplevel = Some(toplevel);
        }
    }

    /// Move a node above all its siblings
    pub fn raise_to_top(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            if parent.children.last() != Some(&id) {
                parent.children.retain(|c| *c != id);
                parent.children.push(id);
                self.damaged = true;
            }
        }
    }

    /// Destroy a node and everything below it
    pub fn destroy(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut stack = node.children;
        while let Some(child) = stack.pop() {
            if let Some(child) = self.nodes.remove(&child) {
                stack.extend(child.children);
            }
        }
        self.damaged = true;
        debug!("Destroyed scene node {:?}", id);
    }

    /// Mark the whole output as needing a repaint
    pub fn damage(&mut self) {
        self.damaged = true;
    }

    /// Check for unconsumed damage
    pub fn is_damaged(&self) -> bool {
        self.damaged
    }

    /// Consume damage after a frame has been presented
    pub fn clear_damage(&mut self) {
        self.damaged = false;
    }

    /// Find the front-most node under a layout point
    pub fn node_at(&self, x: f64, y: f64, surfaces: &SurfaceManager) -> Option<(NodeId, f64, f64)> {
        self.node_at_in(self.root, (0, 0), x, y, surfaces)
    }

    fn node_at_in(
        &self,
        id: NodeId,
        origin: (i32, i32),
        x: f64,
        y: f64,
        surfaces: &SurfaceManager,
    ) -> Option<(NodeId, f64, f64)> {
        let node = self.nodes.get(&id)?;
        if !node.enabled {
            return None;
        }
        let (nx, ny) = (origin.0 + node.x, origin.1 + node.y);

        for child in node.children.iter().rev() {
            if let Some(hit) = self.node_at_in(*child, (nx, ny), x, y, surfaces) {
                return Some(hit);
            }
        }

        let (lx, ly) = (x - nx as f64, y - ny as f64);
        match node.kind {
            NodeKind::Surface(surface) => surfaces
                .get(surface)
                .filter(|s| s.accepts_input(lx, ly))
                .map(|_| (id, lx, ly)),
            NodeKind::Rect { width, height, .. } => Rect::new(nx, ny, width, height)
                .contains(x, y)
                .then_some((id, lx, ly)),
            NodeKind::Tree => None,
        }
    }

    /// Hit-test for a client surface and resolve its toplevel
    pub fn toplevel_at(&self, x: f64, y: f64, surfaces: &SurfaceManager) -> Option<Hit> {
        let (id, sx, sy) = self.node_at(x, y, surfaces)?;
        let node = self.nodes.get(&id)?;
        let NodeKind::Surface(surface) = node.kind else {
            return None;
        };

        let mut parent = node.parent.and_then(|p| self.nodes.get(&p));
        while let Some(p) = parent {
            if p.toplevel.is_some() {
                break;
            }
            parent = p.parent.and_then(|pp| self.nodes.get(&pp));
        }

        Some(Hit {
            toplevel: parent.and_then(|p| p.toplevel),
            surface,
            sx,
            sy,
        })
    }

    /// Layout-space bounding box of the visible content below a node
    pub fn bounds(&self, id: NodeId, surfaces: &SurfaceManager) -> Rect {
        let Some(node) = self.nodes.get(&id) else {
            return Rect::default();
        };
        let origin = node
            .parent
            .and_then(|p| self.absolute_position(p))
            .unwrap_or((0, 0));
        self.bounds_in(id, origin, surfaces)
    }

    fn bounds_in(&self, id: NodeId, origin: (i32, i32), surfaces: &SurfaceManager) -> Rect {
        let Some(node) = self.nodes.get(&id).filter(|n| n.enabled) else {
            return Rect::default();
        };
        let (nx, ny) = (origin.0 + node.x, origin.1 + node.y);
        let own = match node.kind {
            NodeKind::Surface(surface) => {
                let (w, h) = surfaces.get(surface).map(|s| s.size()).unwrap_or((0, 0));
                Rect::new(nx, ny, w, h)
            }
            NodeKind::Rect { width, height, .. } => Rect::new(nx, ny, width, height),
            NodeKind::Tree => Rect::default(),
        };
        node.children.iter().fold(own, |acc, child| {
            acc.union(&self.bounds_in(*child, (nx, ny), surfaces))
        })
    }

    /// Draw every visible node back to front
    pub fn compose(&self, canvas: &mut Canvas, surfaces: &SurfaceManager) {
        canvas.clear();
        self.compose_node(self.root, (0, 0), canvas, surfaces);
    }

    fn compose_node(&self, id: NodeId, origin: (i32, i32), canvas: &mut Canvas, surfaces: &SurfaceManager) {
        let Some(node) = self.nodes.get(&id).filter(|n| n.enabled) else {
            return;
        };
        let (nx, ny) = (origin.0 + node.x, origin.1 + node.y);
        match node.kind {
            NodeKind::Rect {
                width,
                height,
                color,
            } => canvas.fill_rect(Rect::new(nx, ny, width, height), color),
            NodeKind::Surface(surface) => {
                if let Some(buffer) = surfaces.get(surface).and_then(|s| s.buffer.as_ref()) {
                    canvas.blit(nx, ny, buffer);
                }
            }
            NodeKind::Tree => {}
        }
        for child in &node.children {
            self.compose_node(*child, (nx, ny), canvas, surfaces);
        }
    }

    /// Surfaces currently shown on the output
    pub fn visible_surfaces(&self) -> Vec<SurfaceId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id).filter(|n| n.enabled) else {
                continue;
            };
            if let NodeKind::Surface(surface) = node.kind {
                out.push(surface);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{PixelBuffer, PixelFormat};

    fn surface_with_buffer(surfaces: &mut SurfaceManager, w: u32, h: u32, pixel: u32) -> SurfaceId {
        let id = surfaces.create_surface();
        let surface = surfaces.get_mut(id).unwrap();
        surface.attach(Some(PixelBuffer::filled(w, h, PixelFormat::Argb8888, pixel)));
        surface.commit();
        id
    }

    #[test]
    fn test_hit_resolves_toplevel_through_parents() {
        let mut surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        let toplevel = ToplevelId(42);

        let tree = scene.create_tree(scene.root());
        scene.set_toplevel(tree, toplevel);
        scene.set_position(tree, 10, 10);
        let main = surface_with_buffer(&mut surfaces, 100, 100, 0xffff_ffff);
        let main_node = scene.create_surface(tree, main);
        let popup_tree = scene.create_tree(tree);
        scene.set_position(popup_tree, 50, 50);
        let popup = surface_with_buffer(&mut surfaces, 20, 20, 0xff00_0000);
        scene.create_surface(popup_tree, popup);
        assert!(scene.contains(main_node));

        let hit = scene.toplevel_at(65.0, 65.0, &surfaces).unwrap();
        assert_eq!(hit.surface, popup);
        assert_eq!(hit.toplevel, Some(toplevel));
        assert_eq!((hit.sx, hit.sy), (5.0, 5.0));

        let hit = scene.toplevel_at(20.0, 20.0, &surfaces).unwrap();
        assert_eq!(hit.surface, main);
        assert_eq!(hit.toplevel, Some(toplevel));
    }

    #[test]
    fn test_background_is_not_a_hit() {
        let surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        scene.create_rect(scene.root(), 100, 100, [1.0; 4]);
        assert!(scene.node_at(5.0, 5.0, &surfaces).is_some());
        assert!(scene.toplevel_at(5.0, 5.0, &surfaces).is_none());
    }

    #[test]
    fn test_raise_to_top_changes_hit_order() {
        let mut surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        let a = surface_with_buffer(&mut surfaces, 50, 50, 0xffff_0000);
        let b = surface_with_buffer(&mut surfaces, 50, 50, 0xff00_ff00);
        let node_a = scene.create_surface(scene.root(), a);
        scene.create_surface(scene.root(), b);

        assert_eq!(scene.toplevel_at(1.0, 1.0, &surfaces).unwrap().surface, b);
        scene.raise_to_top(node_a);
        assert_eq!(scene.toplevel_at(1.0, 1.0, &surfaces).unwrap().surface, a);
    }

    #[test]
    fn test_disabled_nodes_are_skipped() {
        let mut surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        let a = surface_with_buffer(&mut surfaces, 50, 50, 0xffff_0000);
        let tree = scene.create_tree(scene.root());
        scene.create_surface(tree, a);
        scene.set_enabled(tree, false);

        assert!(scene.toplevel_at(1.0, 1.0, &surfaces).is_none());
        assert!(scene.visible_surfaces().is_empty());
        assert_eq!(scene.bounds(tree, &surfaces), Rect::default());
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut scene = SceneGraph::new();
        let tree = scene.create_tree(scene.root());
        let child = scene.create_tree(tree);
        scene.destroy(tree);
        assert!(!scene.contains(tree));
        assert!(!scene.contains(child));
        assert_eq!(scene.len(), 1);
        assert!(scene.get(scene.root()).unwrap().children.is_empty());
    }

    #[test]
    fn test_bounds_and_absolute_position() {
        let mut surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        let a = surface_with_buffer(&mut surfaces, 30, 40, 0xffff_ffff);
        let tree = scene.create_tree(scene.root());
        scene.set_position(tree, 5, 6);
        let node = scene.create_surface(tree, a);

        assert_eq!(scene.absolute_position(node), Some((5, 6)));
        assert_eq!(scene.bounds(tree, &surfaces), Rect::new(5, 6, 30, 40));
    }

    #[test]
    fn test_compose_draws_back_to_front() {
        let mut surfaces = SurfaceManager::new();
        let mut scene = SceneGraph::new();
        scene.create_rect(scene.root(), 4, 4, [1.0, 1.0, 1.0, 1.0]);
        let a = surface_with_buffer(&mut surfaces, 2, 2, 0xff00_00ff);
        let node = scene.create_surface(scene.root(), a);
        scene.set_position(node, 2, 2);

        let mut canvas = Canvas::new(4, 4);
        scene.compose(&mut canvas, &surfaces);
        assert_eq!(canvas.pixel(0, 0), Some(0xffff_ffff));
        assert_eq!(canvas.pixel(3, 3), Some(0xff00_00ff));
    }

    #[test]
    fn test_damage_tracking() {
        let mut scene = SceneGraph::new();
        scene.clear_damage();
        let rect = scene.create_rect(scene.root(), 1, 1, [0.0; 4]);
        assert!(scene.is_damaged());
        scene.clear_damage();
        scene.set_position(rect, 0, 0);
        assert!(!scene.is_damaged());
        scene.set_rect_size(rect, 2, 2);
        assert!(scene.is_damaged());
    }
}
