use crate::{
    error::{Result, ShaderGraphError},
    node::Side,
    node_graph::NodeId,
};
use serde::{Deserialize, Serialize};

/// Carries the value of one node parameter into a parameter of another node. Slots are
/// parameter names.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub output_id: NodeId,
    pub input_id: NodeId,
    pub output_slot: String,
    pub input_slot: String,
}

impl Edge {
    pub fn new(output_id: NodeId, input_id: NodeId, output_slot: &str, input_slot: &str) -> Self {
        Self {
            output_id,
            input_id,
            output_slot: output_slot.to_string(),
            input_slot: input_slot.to_string(),
        }
    }

    pub fn from_arbitrary(
        a_node: NodeId,
        a_side: Side,
        a_slot: &str,
        b_node: NodeId,
        b_side: Side,
        b_slot: &str,
    ) -> Result<Self> {
        if a_node == b_node || a_side == b_side {
            return Err(ShaderGraphError::InvalidEdge);
        }

        Ok(match a_side {
            Side::Input => Self::new(b_node, a_node, b_slot, a_slot),
            Side::Output => Self::new(a_node, b_node, a_slot, b_slot),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_arbitrary_orders_by_side() {
        let edge =
            Edge::from_arbitrary(NodeId(4), Side::Input, "x", NodeId(2), Side::Output, "result")
                .unwrap();

        assert_eq!(edge, Edge::new(NodeId(2), NodeId(4), "result", "x"));
    }

    #[test]
    fn from_arbitrary_rejects_same_side() {
        assert!(
            Edge::from_arbitrary(NodeId(1), Side::Input, "x", NodeId(2), Side::Input, "y").is_err()
        );
        assert!(
            Edge::from_arbitrary(NodeId(1), Side::Input, "x", NodeId(1), Side::Output, "y")
                .is_err()
        );
    }
}
