//! Turns the body of a node graph into the text of one shader function.

use crate::{
    archive_name::{classify_dependency, split_archive_name, DependencyKind},
    edge::Edge,
    error::{Result, ShaderGraphError},
    instantiation::{Dependency, InstantiationParameters, ParameterBinding},
    node::{node_type::NodeType, Node},
    node_graph::{NodeGraph, NodeId},
    options::InstantiationOptions,
    provider::GraphProvider,
    signature::{FunctionSignature, Parameter, ParameterDirection},
};
use std::{
    collections::HashSet,
    fmt::Write,
};

/// Name of the slot a procedure's return value is exposed on.
pub const RESULT_SLOT: &str = "result";
/// Name of the slot a `Constant` node exposes its value on.
pub const VALUE_SLOT: &str = "value";

/// The output of a `FunctionGenerator`.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedFunction {
    pub text: String,
    pub signature: FunctionSignature,
    /// Everything the generated text calls into, in order of first use.
    pub dependencies: Vec<Dependency>,
}

pub trait FunctionGenerator: Send + Sync {
    fn generate(
        &self,
        graph: &NodeGraph,
        name: &str,
        parameters: &InstantiationParameters,
        provider: &dyn GraphProvider,
    ) -> Result<GeneratedFunction>;
}

/// Builds the symbol name an instantiation is emitted under.
pub fn make_graph_name(base_name: &str, instantiation_hash: u64) -> String {
    if instantiation_hash == 0 {
        base_name.to_string()
    } else {
        format!("{}_{}", base_name, instantiation_hash)
    }
}

/// Emits HLSL. Every procedure output becomes a local named after its node and slot, and
/// procedures are called in topological order.
#[derive(Clone, Debug)]
pub struct HlslFunctionGenerator {
    graph_extension: String,
}

impl Default for HlslFunctionGenerator {
    fn default() -> Self {
        Self::new(&InstantiationOptions::default())
    }
}

impl HlslFunctionGenerator {
    pub fn new(options: &InstantiationOptions) -> Self {
        Self {
            graph_extension: options.graph_extension.clone(),
        }
    }
}

impl FunctionGenerator for HlslFunctionGenerator {
    fn generate(
        &self,
        graph: &NodeGraph,
        name: &str,
        parameters: &InstantiationParameters,
        provider: &dyn GraphProvider,
    ) -> Result<GeneratedFunction> {
        let order = graph.topological_order(name)?;
        let mut state = GeneratorState {
            graph,
            parameters,
            declared: HashSet::new(),
            body: String::new(),
            dependencies: Vec::new(),
        };

        for id in order {
            let node = graph.node_with_id(id)?;
            match &node.node_type {
                NodeType::Procedure {
                    archive_name,
                    parameters: call_parameters,
                } => self.emit_call(&mut state, node, archive_name, call_parameters, provider)?,
                NodeType::Output { name, type_name } => {
                    let value = match graph.edge_into(id, name) {
                        Some(edge) => state.source_expression(edge)?,
                        None => default_value(type_name),
                    };
                    writeln!(state.body, "\t{} = {};", name, value).ok();
                }
                NodeType::Input { .. } | NodeType::Constant(_) => {}
            }
        }

        let signature = generated_signature(graph, name, parameters);
        let mut text = signature.declaration(name);
        text.push_str("\n{\n");
        text.push_str(&state.body);
        text.push_str("}\n");

        Ok(GeneratedFunction {
            text,
            signature,
            dependencies: state.dependencies,
        })
    }
}

impl HlslFunctionGenerator {
    fn emit_call(
        &self,
        state: &mut GeneratorState,
        node: &Node,
        archive_name: &str,
        call_parameters: &InstantiationParameters,
        provider: &dyn GraphProvider,
    ) -> Result<()> {
        let graph = state.graph;
        let bindings = state.parameters;

        // A procedure named after a function binding is a placeholder for the bound function.
        let (archive_name, call_parameters) = match bindings.get(archive_name) {
            Some(ParameterBinding::Function {
                archive_name,
                parameters,
            }) => (archive_name.as_str(), parameters),
            _ => (archive_name, call_parameters),
        };

        let callee = provider
            .find_signature(archive_name)
            .ok_or_else(|| ShaderGraphError::UnknownFunction(archive_name.to_string()))?;

        for edge in graph.edges().iter().filter(|e| e.input_id == node.node_id) {
            if callee.find_parameter(&edge.input_slot).is_none() {
                return Err(ShaderGraphError::UnknownParameter {
                    function: archive_name.to_string(),
                    parameter: edge.input_slot.clone(),
                });
            }
        }

        let base_name = match split_archive_name(archive_name) {
            (_, Some(identifier)) => identifier,
            (_, None) => callee.name.as_str(),
        };
        let call_name = match classify_dependency(archive_name, &self.graph_extension) {
            DependencyKind::Graph { .. } => {
                make_graph_name(base_name, call_parameters.calculate_hash())
            }
            DependencyKind::PlainInclude { .. } => base_name.to_string(),
        };

        let mut arguments = Vec::with_capacity(callee.parameters.len());
        for parameter in &callee.parameters {
            let input = match graph.edge_into(node.node_id, &parameter.name) {
                Some(edge) => state.source_expression(edge)?,
                None => default_value(&parameter.type_name),
            };
            let argument = match parameter.direction {
                ParameterDirection::In => input,
                ParameterDirection::Out => {
                    let variable = node.variable_name(&parameter.name);
                    writeln!(state.body, "\t{} {};", parameter.type_name, variable).ok();
                    variable
                }
                ParameterDirection::InOut => {
                    let variable = node.variable_name(&parameter.name);
                    writeln!(
                        state.body,
                        "\t{} {} = {};",
                        parameter.type_name, variable, input
                    )
                    .ok();
                    variable
                }
            };
            if parameter.direction.is_output() {
                state.declared.insert((node.node_id, parameter.name.clone()));
            }
            arguments.push(argument);
        }

        let call = format!("{}({})", call_name, arguments.join(", "));
        if callee.returns_value() {
            writeln!(
                state.body,
                "\t{} {} = {};",
                callee.return_type,
                node.variable_name(RESULT_SLOT),
                call
            )
            .ok();
            state
                .declared
                .insert((node.node_id, RESULT_SLOT.to_string()));
        } else {
            writeln!(state.body, "\t{};", call).ok();
        }

        let dependency = Dependency::new(archive_name, call_parameters.clone());
        if !state.dependencies.contains(&dependency) {
            state.dependencies.push(dependency);
        }
        Ok(())
    }
}

struct GeneratorState<'a> {
    graph: &'a NodeGraph,
    parameters: &'a InstantiationParameters,
    declared: HashSet<(NodeId, String)>,
    body: String,
    dependencies: Vec<Dependency>,
}

impl<'a> GeneratorState<'a> {
    /// The expression carrying the value that flows along `edge`.
    fn source_expression(&self, edge: &Edge) -> Result<String> {
        let source = self.graph.node_with_id(edge.output_id)?;
        match &source.node_type {
            NodeType::Input { name, .. } => Ok(self
                .parameters
                .constant(name)
                .map_or_else(|| name.clone(), str::to_string)),
            NodeType::Constant(value) => {
                if edge.output_slot == VALUE_SLOT {
                    Ok(value.clone())
                } else {
                    Err(ShaderGraphError::InvalidEdge)
                }
            }
            NodeType::Procedure { archive_name, .. } => {
                if self
                    .declared
                    .contains(&(source.node_id, edge.output_slot.clone()))
                {
                    Ok(source.variable_name(&edge.output_slot))
                } else {
                    Err(ShaderGraphError::UnknownParameter {
                        function: archive_name.clone(),
                        parameter: edge.output_slot.clone(),
                    })
                }
            }
            NodeType::Output { .. } => Err(ShaderGraphError::InvalidEdge),
        }
    }
}

/// Graph inputs become parameters unless they are bound to a constant, graph outputs become
/// `out` parameters.
fn generated_signature(
    graph: &NodeGraph,
    name: &str,
    parameters: &InstantiationParameters,
) -> FunctionSignature {
    let mut signature = FunctionSignature::new(name);
    let mut seen = HashSet::new();

    for node in graph.nodes().iter().filter(|n| n.node_type.is_input()) {
        if let NodeType::Input { name, type_name } = &node.node_type {
            if parameters.constant(name).is_none() && seen.insert(name.clone()) {
                signature.parameters.push(Parameter::input(name, type_name));
            }
        }
    }
    for node in graph.nodes().iter().filter(|n| n.node_type.is_output()) {
        if let NodeType::Output { name, type_name } = &node.node_type {
            if seen.insert(name.clone()) {
                signature.parameters.push(Parameter::output(name, type_name));
            }
        }
    }

    signature
}

fn default_value(type_name: &str) -> String {
    format!("({})0", type_name)
}
