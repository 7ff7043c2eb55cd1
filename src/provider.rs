use crate::{
    archive_name::{make_archive_name, split_archive_name},
    error::Result,
    node_graph::NodeGraph,
    signature::FunctionSignature,
    signature_loader::load_signatures,
};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

/// Resolves archive names to graphs and function signatures.
///
/// Both lookups return `None` when nothing is found, so the caller can report exactly which
/// reference was broken.
pub trait GraphProvider: Send + Sync {
    fn find_graph(&self, archive_name: &str) -> Option<GraphDefinition>;
    fn find_signature(&self, archive_name: &str) -> Option<FunctionSignature>;
}

/// A loaded graph together with its externally visible signature and the provider that
/// resolves the graph's own dependencies.
#[derive(Clone)]
pub struct GraphDefinition {
    pub name: String,
    /// The `file::function` name the graph was resolved from. Two definitions with the same
    /// archive name are the same graph.
    pub archive_name: String,
    pub graph: NodeGraph,
    pub signature: FunctionSignature,
    pub sub_provider: Arc<dyn GraphProvider>,
}

impl fmt::Debug for GraphDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GraphDefinition")
            .field("name", &self.name)
            .field("archive_name", &self.archive_name)
            .field("graph", &self.graph)
            .field("signature", &self.signature)
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    graphs: HashMap<String, (NodeGraph, FunctionSignature)>,
    signatures: HashMap<String, FunctionSignature>,
}

/// Keeps graphs and signatures in memory, keyed by archive name. Cloning is cheap and clones
/// share the same registry.
#[derive(Clone, Default)]
pub struct MemoryGraphProvider {
    registry: Arc<RwLock<Registry>>,
}

impl MemoryGraphProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a graph under `archive_name`. The graph's signature is what callers see, and
    /// is also returned by `find_signature` for the same name.
    pub fn add_graph(
        &self,
        archive_name: &str,
        graph: NodeGraph,
        signature: FunctionSignature,
    ) -> Result<()> {
        self.registry
            .write()?
            .graphs
            .insert(archive_name.to_string(), (graph, signature));
        Ok(())
    }

    pub fn add_signature(&self, archive_name: &str, signature: FunctionSignature) -> Result<()> {
        self.registry
            .write()?
            .signatures
            .insert(archive_name.to_string(), signature);
        Ok(())
    }

    /// Parses `source` and registers every function in it as `file_name::function`.
    pub fn add_source(&self, file_name: &str, source: &str) -> Result<()> {
        let signatures = load_signatures(file_name, source)?;
        let mut registry = self.registry.write()?;
        for signature in signatures.functions {
            registry
                .signatures
                .entry(make_archive_name(file_name, &signature.name))
                .or_insert(signature);
        }
        Ok(())
    }
}

impl GraphProvider for MemoryGraphProvider {
    fn find_graph(&self, archive_name: &str) -> Option<GraphDefinition> {
        let registry = self.registry.read().ok()?;
        let (graph, signature) = registry.graphs.get(archive_name)?;
        let name = match split_archive_name(archive_name) {
            (_, Some(identifier)) => identifier.to_string(),
            (file, None) => file.to_string(),
        };

        Some(GraphDefinition {
            name,
            archive_name: archive_name.to_string(),
            graph: graph.clone(),
            signature: signature.clone(),
            sub_provider: Arc::new(self.clone()),
        })
    }

    fn find_signature(&self, archive_name: &str) -> Option<FunctionSignature> {
        let registry = self.registry.read().ok()?;
        registry
            .signatures
            .get(archive_name)
            .or_else(|| registry.graphs.get(archive_name).map(|(_, s)| s))
            .cloned()
    }
}
