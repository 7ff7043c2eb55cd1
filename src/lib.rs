pub mod archive_name;
pub mod batch;
pub mod edge;
pub mod error;
pub mod file_provider;
pub mod function_generator;
pub mod instantiation;
pub mod instantiator;
pub mod node;
pub mod node_graph;
pub mod options;
pub mod provider;
pub mod scaffold;
pub mod signature;
pub mod signature_loader;

pub use crate::{
    error::{Result, ShaderGraphError},
    instantiation::{Dependency, InstantiationParameters, ParameterBinding},
    instantiator::{instantiate_shader, instantiate_shader_from_file, ShaderInstantiator},
    provider::{GraphDefinition, GraphProvider, MemoryGraphProvider},
};
