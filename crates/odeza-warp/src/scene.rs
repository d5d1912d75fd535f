//! Scene queries for node-tracking warp targets

use ahash::AHashMap;
use odeza_core::Transform;
use serde::{Deserialize, Serialize};

/// Handle to a scene node a warp target can follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Read access to world transforms of scene nodes
pub trait SceneQuery {
    /// World transform of `node`, optionally at one of its named sockets.
    ///
    /// `None` means the node (or socket) no longer exists.
    fn node_transform(&self, node: NodeId, socket: Option<&str>) -> Option<Transform>;
}

/// A scene with nothing in it
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyScene;

impl SceneQuery for EmptyScene {
    fn node_transform(&self, _node: NodeId, _socket: Option<&str>) -> Option<Transform> {
        None
    }
}

#[derive(Debug, Clone, Default)]
struct SceneNode {
    transform: Transform,
    sockets: AHashMap<String, Transform>,
}

/// Hash-map backed scene of flat nodes with local sockets
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    nodes: AHashMap<NodeId, SceneNode>,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move a node
    pub fn set_node(&mut self, node: NodeId, transform: Transform) {
        self.nodes.entry(node).or_default().transform = transform;
    }

    /// Attach a socket, relative to the node, to an existing node
    pub fn set_socket(&mut self, node: NodeId, socket: impl Into<String>, local: Transform) -> bool {
        match self.nodes.get_mut(&node) {
            Some(entry) => {
                entry.sockets.insert(socket.into(), local);
                true
            }
            None => false,
        }
    }

    /// Remove a node and its sockets
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        self.nodes.remove(&node).is_some()
    }
}

impl SceneQuery for StaticScene {
    fn node_transform(&self, node: NodeId, socket: Option<&str>) -> Option<Transform> {
        let entry = self.nodes.get(&node)?;
        match socket {
            None => Some(entry.transform),
            Some(name) => entry.sockets.get(name).map(|local| entry.transform * *local),
        }
    }
}
