use crate::{
    edge::Edge,
    error::{Result, ShaderGraphError},
    node::{Node, Side},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// The body of a shader graph: function-call nodes and the value-flow edges between their
/// parameters.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn new_id(&self) -> NodeId {
        loop {
            let id = NodeId(rand::random());
            if !self.has_node_with_id(id) {
                return id;
            }
        }
    }

    fn has_node_with_id(&self, node_id: NodeId) -> bool {
        self.nodes.iter().any(|node| node.node_id == node_id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_with_id(&self, node_id: NodeId) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|node| node.node_id == node_id)
            .ok_or(ShaderGraphError::InvalidNodeId)
    }

    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.new_id();
        node.node_id = id;
        self.nodes.push(node);
        id
    }

    pub fn add_node_with_id(&mut self, mut node: Node, id: NodeId) -> Result<NodeId> {
        if self.has_node_with_id(id) {
            return Err(ShaderGraphError::InvalidNodeId);
        }

        node.node_id = id;
        self.nodes.push(node);
        Ok(id)
    }

    /// Connects the `output_slot` parameter of `output_id` to the `input_slot` parameter of
    /// `input_id`. An input parameter can only have one source.
    pub fn connect(
        &mut self,
        output_id: NodeId,
        input_id: NodeId,
        output_slot: &str,
        input_slot: &str,
    ) -> Result<()> {
        if !self.has_node_with_id(output_id) || !self.has_node_with_id(input_id) {
            return Err(ShaderGraphError::InvalidNodeId);
        }

        if output_id == input_id {
            return Err(ShaderGraphError::InvalidEdge);
        }

        if self.slot_occupied(input_id, Side::Input, input_slot) {
            return Err(ShaderGraphError::SlotOccupied(input_slot.to_string()));
        }

        self.edges
            .push(Edge::new(output_id, input_id, output_slot, input_slot));

        Ok(())
    }

    pub fn slot_occupied(&self, id: NodeId, side: Side, slot: &str) -> bool {
        match side {
            Side::Input => self
                .edges
                .iter()
                .any(|edge| edge.input_id == id && edge.input_slot == slot),
            Side::Output => self
                .edges
                .iter()
                .any(|edge| edge.output_id == id && edge.output_slot == slot),
        }
    }

    /// The edge feeding the given input parameter, if any.
    pub fn edge_into(&self, id: NodeId, slot: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|edge| edge.input_id == id && edge.input_slot == slot)
    }

    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        let parents: BTreeSet<NodeId> = self
            .edges
            .iter()
            .filter(|edge| edge.input_id == id)
            .map(|edge| edge.output_id)
            .collect();
        parents.into_iter().collect()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let children: BTreeSet<NodeId> = self
            .edges
            .iter()
            .filter(|edge| edge.output_id == id)
            .map(|edge| edge.input_id)
            .collect();
        children.into_iter().collect()
    }

    /// Nodes without any incoming edges.
    pub fn root_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|node| node.node_id)
            .filter(|id| !self.edges.iter().any(|edge| edge.input_id == *id))
            .collect()
    }

    /// Orders every node so that it comes after all of its parents. Among nodes that are ready
    /// at the same time the lowest `NodeId` goes first, which keeps generated code stable.
    pub fn topological_order(&self, graph_name: &str) -> Result<Vec<NodeId>> {
        let mut pending_parents: BTreeMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|node| (node.node_id, self.parents(node.node_id).len()))
            .collect();

        for edge in &self.edges {
            if !pending_parents.contains_key(&edge.output_id)
                || !pending_parents.contains_key(&edge.input_id)
            {
                return Err(ShaderGraphError::InvalidEdge);
            }
        }

        let mut ready: BTreeSet<NodeId> = pending_parents
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(id) = ready.iter().next().copied() {
            ready.remove(&id);
            order.push(id);

            for child in self.children(id) {
                if let Some(count) = pending_parents.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            Err(ShaderGraphError::CyclicGraph(graph_name.to_string()))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{instantiation::InstantiationParameters, node::node_type::NodeType};

    fn procedure(archive_name: &str) -> Node {
        Node::new(NodeType::Procedure {
            archive_name: archive_name.to_string(),
            parameters: InstantiationParameters::new(),
        })
    }

    #[test]
    fn connect_rejects_unknown_nodes() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node(procedure("a.hlsl::A"));

        assert!(matches!(
            graph.connect(a, NodeId(a.0.wrapping_add(1)), "result", "x"),
            Err(ShaderGraphError::InvalidNodeId)
        ));
    }

    #[test]
    fn connect_rejects_occupied_input() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node_with_id(procedure("a.hlsl::A"), NodeId(1)).unwrap();
        let b = graph.add_node_with_id(procedure("a.hlsl::B"), NodeId(2)).unwrap();
        let c = graph.add_node_with_id(procedure("a.hlsl::C"), NodeId(3)).unwrap();

        graph.connect(a, c, "result", "x").unwrap();
        assert!(matches!(
            graph.connect(b, c, "result", "x"),
            Err(ShaderGraphError::SlotOccupied(_))
        ));
        assert!(graph.slot_occupied(c, Side::Input, "x"));
        assert!(graph.slot_occupied(a, Side::Output, "result"));
    }

    #[test]
    fn topological_order_breaks_ties_by_id() {
        let mut graph = NodeGraph::new();
        let late = graph.add_node_with_id(procedure("a.hlsl::A"), NodeId(9)).unwrap();
        let early = graph.add_node_with_id(procedure("a.hlsl::B"), NodeId(2)).unwrap();
        let sink = graph.add_node_with_id(procedure("a.hlsl::C"), NodeId(5)).unwrap();

        graph.connect(late, sink, "result", "x").unwrap();
        graph.connect(early, sink, "result", "y").unwrap();

        assert_eq!(graph.topological_order("G").unwrap(), vec![early, late, sink]);
        assert_eq!(graph.root_ids(), vec![late, early]);
        assert_eq!(graph.parents(sink), vec![early, late]);
    }

    #[test]
    fn topological_order_detects_cycles() {
        let mut graph = NodeGraph::new();
        let a = graph.add_node_with_id(procedure("a.hlsl::A"), NodeId(1)).unwrap();
        let b = graph.add_node_with_id(procedure("a.hlsl::B"), NodeId(2)).unwrap();

        graph.connect(a, b, "result", "x").unwrap();
        graph.connect(b, a, "result", "x").unwrap();

        assert!(matches!(
            graph.topological_order("Loop"),
            Err(ShaderGraphError::CyclicGraph(name)) if name == "Loop"
        ));
    }
}
