//! Expands a shader graph, and every graph it depends on, into shader source fragments.

use crate::{
    archive_name::{classify_dependency, make_archive_name, DependencyKind},
    error::{Result, ShaderGraphError},
    file_provider::{FileGraphProvider, SearchRules},
    function_generator::{make_graph_name, FunctionGenerator, HlslFunctionGenerator},
    instantiation::InstantiationParameters,
    options::InstantiationOptions,
    provider::{GraphDefinition, GraphProvider},
    scaffold::{HlslScaffoldGenerator, ScaffoldGenerator},
};
use indexmap::IndexSet;
use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{debug, instrument, trace};

struct PendingInstantiation {
    graph: GraphDefinition,
    parameters: InstantiationParameters,
}

pub struct ShaderInstantiator<F = HlslFunctionGenerator, S = HlslScaffoldGenerator> {
    function_generator: F,
    scaffold_generator: S,
    options: InstantiationOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for ShaderInstantiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderInstantiator {
    pub fn new() -> Self {
        Self::with_options(InstantiationOptions::default())
    }

    pub fn with_options(options: InstantiationOptions) -> Self {
        Self::with_generators(
            HlslFunctionGenerator::new(&options),
            HlslScaffoldGenerator,
            options,
        )
    }
}

impl<F: FunctionGenerator, S: ScaffoldGenerator> ShaderInstantiator<F, S> {
    pub fn with_generators(
        function_generator: F,
        scaffold_generator: S,
        options: InstantiationOptions,
    ) -> Self {
        Self {
            function_generator,
            scaffold_generator,
            options,
            cancel: None,
        }
    }

    /// Checked before every instantiation; once set, the call fails with `Cancelled`.
    pub fn cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |cancel| cancel.load(Ordering::Relaxed))
    }

    /// Resolves `entry_file::entry_function` through `provider` and instantiates it.
    pub fn instantiate_entry(
        &self,
        provider: &dyn GraphProvider,
        entry_file: &str,
        entry_function: &str,
        parameters: &InstantiationParameters,
    ) -> Result<Vec<String>> {
        let graph = provider
            .find_graph(&make_archive_name(entry_file, entry_function))
            .ok_or_else(|| ShaderGraphError::GraphLoad {
                file: entry_file.to_string(),
                function: entry_function.to_string(),
                reason: "graph not found".to_string(),
            })?;
        self.instantiate(&graph, parameters)
    }

    /// Loads `entry_function` from the graph file `entry_file` and instantiates it.
    pub fn instantiate_file(
        &self,
        search_rules: &SearchRules,
        entry_file: &str,
        entry_function: &str,
        parameters: &InstantiationParameters,
    ) -> Result<Vec<String>> {
        let provider = FileGraphProvider::with_options(search_rules.clone(), self.options.clone());
        let graph = provider.load_graph(entry_file, entry_function)?;
        self.instantiate(&graph, parameters)
    }

    /// Generates the entry graph and everything it depends on.
    ///
    /// The result is a scaffold and an implementation for every instantiation, in the order
    /// they were generated, followed by one block of `#include` lines for the plain headers
    /// that were called into. The entry point keeps its own name; nested instantiations are
    /// named after their graph plus the hash of their parameters.
    #[instrument(skip_all, fields(graph = %entry_graph.name))]
    pub fn instantiate(
        &self,
        entry_graph: &GraphDefinition,
        parameters: &InstantiationParameters,
    ) -> Result<Vec<String>> {
        let mut includes: IndexSet<String> = IndexSet::new();
        // Scaffold name to the archive name and parameter hash it was emitted for.
        let mut emitted: HashMap<String, (String, u64)> = HashMap::new();
        let mut fragments = Vec::new();

        let mut instantiations = vec![PendingInstantiation {
            graph: entry_graph.clone(),
            parameters: parameters.clone(),
        }];

        let mut root_instantiation = true;
        while let Some(inst) = instantiations.pop() {
            if self.cancelled() {
                return Err(ShaderGraphError::Cancelled);
            }

            let parameter_hash = inst.parameters.calculate_hash();
            let scaffold_name = if root_instantiation {
                root_instantiation = false;
                inst.graph.name.clone()
            } else {
                make_graph_name(&inst.graph.name, parameter_hash)
            };

            match emitted.entry(scaffold_name.clone()) {
                Entry::Occupied(entry) => {
                    let (existing, existing_hash) = entry.get();
                    if *existing != inst.graph.archive_name || *existing_hash != parameter_hash {
                        return Err(ShaderGraphError::ScaffoldNameCollision {
                            scaffold_name,
                            existing: existing.clone(),
                            existing_hash: *existing_hash,
                            archive_name: inst.graph.archive_name.clone(),
                            parameter_hash,
                        });
                    }
                    if self.options.skip_duplicates {
                        trace!(scaffold = %scaffold_name, "already instantiated");
                        continue;
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert((inst.graph.archive_name.clone(), parameter_hash));
                }
            }

            let implementation_name = format!("{}_impl", scaffold_name);
            debug!(
                graph = %inst.graph.name,
                scaffold = %scaffold_name,
                parameter_hash,
                "instantiating"
            );

            let with_context = |source: ShaderGraphError| ShaderGraphError::Generation {
                instantiation: scaffold_name.clone(),
                parameter_hash,
                source: Box::new(source),
            };
            let generated = self
                .function_generator
                .generate(
                    &inst.graph.graph,
                    &implementation_name,
                    &inst.parameters,
                    inst.graph.sub_provider.as_ref(),
                )
                .map_err(with_context)?;
            let scaffold = self
                .scaffold_generator
                .generate(
                    &inst.graph.signature,
                    &generated.signature,
                    &scaffold_name,
                    &implementation_name,
                )
                .map_err(with_context)?;

            fragments.push(scaffold);
            fragments.push(generated.text);

            for dependency in generated.dependencies {
                match classify_dependency(&dependency.archive_name, &self.options.graph_extension)
                {
                    DependencyKind::Graph { .. } => {
                        let graph = inst
                            .graph
                            .sub_provider
                            .find_graph(&dependency.archive_name)
                            .ok_or_else(|| ShaderGraphError::UnresolvedGraphReference {
                                archive_name: dependency.archive_name.clone(),
                                parent: inst.graph.name.clone(),
                                parameter_hash,
                            })?;
                        instantiations.push(PendingInstantiation {
                            graph,
                            parameters: dependency.parameters.clone(),
                        });
                    }
                    DependencyKind::PlainInclude { file } => {
                        let include = if !dependency.parameters.is_empty() {
                            make_graph_name(file, dependency.parameters.calculate_hash())
                        } else {
                            inst.graph
                                .sub_provider
                                .find_signature(&dependency.archive_name)
                                .ok_or_else(|| ShaderGraphError::UnresolvedSignatureReference {
                                    archive_name: dependency.archive_name.clone(),
                                    parent: inst.graph.name.clone(),
                                    parameter_hash,
                                })?
                                .source_file
                        };
                        trace!(include = %include, "include");
                        includes.insert(include);
                    }
                }
            }
        }

        fragments.push(include_block(&includes));

        debug!(
            fragments = fragments.len(),
            includes = includes.len(),
            "instantiation complete"
        );
        Ok(fragments)
    }
}

fn include_block(includes: &IndexSet<String>) -> String {
    let mut block = String::new();
    for include in includes {
        writeln!(block, "#include <{}>", include).ok();
    }
    block
}

/// Instantiates `entry_graph` with the default HLSL generators.
pub fn instantiate_shader(
    entry_graph: &GraphDefinition,
    parameters: &InstantiationParameters,
) -> Result<Vec<String>> {
    ShaderInstantiator::new().instantiate(entry_graph, parameters)
}

/// Loads `entry_function` from the graph file `entry_file` and instantiates it with the
/// default HLSL generators.
pub fn instantiate_shader_from_file(
    search_rules: &SearchRules,
    entry_file: &str,
    entry_function: &str,
    parameters: &InstantiationParameters,
) -> Result<Vec<String>> {
    ShaderInstantiator::new().instantiate_file(search_rules, entry_file, entry_function, parameters)
}
