pub mod node_type;

use crate::node_graph::NodeId;
use serde::{Deserialize, Serialize};

use self::node_type::NodeType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

impl Default for Side {
    fn default() -> Self {
        Self::Input
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Node {
    pub node_id: NodeId,
    pub node_type: NodeType,
}

impl Node {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_id: NodeId(0),
            node_type,
        }
    }

    /// Name of the local variable holding the given output of this node in generated code.
    pub fn variable_name(&self, slot: &str) -> String {
        format!("n{}_{}", self.node_id, slot)
    }
}
