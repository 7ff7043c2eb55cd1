use crate::{
    archive_name::{has_extension, make_archive_name, split_archive_name},
    error::{Result, ShaderGraphError},
    node_graph::NodeGraph,
    options::InstantiationOptions,
    provider::{GraphDefinition, GraphProvider},
    signature::FunctionSignature,
    signature_loader::{load_signatures, ShaderSourceSignatures},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{debug, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
struct SearchDirectory {
    path: PathBuf,
    /// Where `path` sits relative to the search root it was derived from, using `/`.
    prefix: String,
}

/// Ordered list of directories that relative file names are looked up in.
///
/// Names are always reported relative to a search root, so a file found next to a nested
/// graph is named the same way as when it is found from the root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchRules {
    directories: Vec<SearchDirectory>,
}

impl SearchRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directories.push(SearchDirectory {
            path: directory.into(),
            prefix: String::new(),
        });
        self
    }

    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.directories.iter().map(|d| d.path.as_path())
    }

    /// The same rules, but searching `directory` before anything else. Names found there are
    /// prefixed with `prefix`.
    pub fn with_local_directory(&self, directory: &Path, prefix: &str) -> Self {
        let mut directories = vec![SearchDirectory {
            path: directory.to_path_buf(),
            prefix: prefix.to_string(),
        }];
        directories.extend(
            self.directories
                .iter()
                .filter(|d| d.path.as_path() != directory)
                .cloned(),
        );
        Self { directories }
    }

    /// Finds `file`, trying each of `extensions` when it has none of its own. Returns the
    /// path on disk and the name as it should be referred to from a search root, including
    /// any added extension.
    pub fn resolve(&self, file: &str, extensions: &[String]) -> Option<(PathBuf, String)> {
        let mut candidates = vec![file.to_string()];
        if Path::new(file).extension().is_none() {
            candidates.extend(extensions.iter().map(|ext| format!("{}.{}", file, ext)));
        }

        for directory in &self.directories {
            for candidate in &candidates {
                let path = directory.path.join(candidate);
                if path.is_file() {
                    return Some((path, join_name(&directory.prefix, candidate)));
                }
            }
        }
        None
    }
}

/// Joins `name` onto `prefix` with `/`, folding away `.` and `dir/..` segments.
fn join_name(prefix: &str, name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in prefix.split(is_separator).chain(name.split(is_separator)) {
        match segment {
            "" | "." => {}
            ".." if matches!(segments.last(), Some(last) if *last != "..") => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Everything in `name` before its last path separator.
fn parent_name(name: &str) -> &str {
    name.rfind(is_separator).map_or("", |index| &name[..index])
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// One graph inside a `.graph` file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GraphEntry {
    pub name: String,
    pub signature: FunctionSignature,
    pub graph: NodeGraph,
}

/// The JSON contents of a `.graph` file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct GraphDocument {
    pub graphs: Vec<GraphEntry>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn find(&self, name: &str) -> Option<&GraphEntry> {
        self.graphs.iter().find(|entry| entry.name == name)
    }
}

#[derive(Clone)]
enum LoadedFile {
    Graphs(Arc<GraphDocument>),
    Source(Arc<ShaderSourceSignatures>),
}

/// Loads graphs and shader headers from disk through `SearchRules`.
///
/// Parsed files are cached. The cache is shared with every sub-provider handed out with a
/// graph, so a file is read at most once per provider tree.
#[derive(Clone)]
pub struct FileGraphProvider {
    search_rules: SearchRules,
    options: InstantiationOptions,
    cache: Arc<Mutex<HashMap<PathBuf, LoadedFile>>>,
}

impl FileGraphProvider {
    pub fn new(search_rules: SearchRules) -> Self {
        Self::with_options(search_rules, InstantiationOptions::default())
    }

    pub fn with_options(search_rules: SearchRules, options: InstantiationOptions) -> Self {
        Self {
            search_rules,
            options,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn search_rules(&self) -> &SearchRules {
        &self.search_rules
    }

    fn with_local_directory(&self, directory: &Path, prefix: &str) -> Self {
        Self {
            search_rules: self.search_rules.with_local_directory(directory, prefix),
            options: self.options.clone(),
            cache: Arc::clone(&self.cache),
        }
    }

    /// Loads the graph `function` from `file`, reporting why it could not be loaded.
    pub fn load_graph(&self, file: &str, function: &str) -> Result<GraphDefinition> {
        let graph_load = |reason: String| ShaderGraphError::GraphLoad {
            file: file.to_string(),
            function: function.to_string(),
            reason,
        };

        let (path, resolved_name) = self
            .search_rules
            .resolve(file, &[self.options.graph_extension.clone()])
            .ok_or_else(|| graph_load("file not found".to_string()))?;
        let document = match self.load(&path, &resolved_name) {
            Ok(LoadedFile::Graphs(document)) => document,
            Ok(LoadedFile::Source(_)) => return Err(graph_load("not a graph file".to_string())),
            Err(e) => return Err(graph_load(e.to_string())),
        };
        let entry = document
            .find(function)
            .ok_or_else(|| graph_load("no graph with that name in the file".to_string()))?;

        Ok(self.definition(&path, &resolved_name, entry))
    }

    fn definition(&self, path: &Path, resolved_name: &str, entry: &GraphEntry) -> GraphDefinition {
        let mut signature = entry.signature.clone();
        if signature.source_file.is_empty() {
            signature.source_file = resolved_name.to_string();
        }
        let directory = path.parent().unwrap_or_else(|| Path::new(""));

        GraphDefinition {
            name: entry.name.clone(),
            archive_name: make_archive_name(resolved_name, &entry.name),
            graph: entry.graph.clone(),
            signature,
            sub_provider: Arc::new(
                self.with_local_directory(directory, parent_name(resolved_name)),
            ),
        }
    }

    fn load(&self, path: &Path, resolved_name: &str) -> Result<LoadedFile> {
        if let Some(loaded) = self.cache.lock()?.get(path) {
            return Ok(loaded.clone());
        }

        let text = fs::read_to_string(path)?;
        let loaded = if has_extension(resolved_name, &self.options.graph_extension) {
            LoadedFile::Graphs(Arc::new(GraphDocument::from_json(&text)?))
        } else {
            LoadedFile::Source(Arc::new(load_signatures(resolved_name, &text)?))
        };
        debug!(path = %path.display(), "loaded shader graph asset");

        self.cache
            .lock()?
            .insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    fn lookup(&self, archive_name: &str) -> Option<(PathBuf, String, LoadedFile, String)> {
        let (file, identifier) = split_archive_name(archive_name);
        let (path, resolved_name) = self
            .search_rules
            .resolve(file, &self.options.include_extensions)?;
        let identifier = match identifier {
            Some(identifier) => identifier.to_string(),
            None => Path::new(file).file_stem()?.to_str()?.to_string(),
        };

        match self.load(&path, &resolved_name) {
            Ok(loaded) => Some((path, resolved_name, loaded, identifier)),
            Err(e) => {
                warn!(archive_name, error = %e, "could not load shader graph asset");
                None
            }
        }
    }
}

impl GraphProvider for FileGraphProvider {
    fn find_graph(&self, archive_name: &str) -> Option<GraphDefinition> {
        match self.lookup(archive_name)? {
            (path, resolved_name, LoadedFile::Graphs(document), identifier) => document
                .find(&identifier)
                .map(|entry| self.definition(&path, &resolved_name, entry)),
            _ => None,
        }
    }

    fn find_signature(&self, archive_name: &str) -> Option<FunctionSignature> {
        match self.lookup(archive_name)? {
            (_, resolved_name, LoadedFile::Graphs(document), identifier) => {
                document.find(&identifier).map(|entry| {
                    let mut signature = entry.signature.clone();
                    if signature.source_file.is_empty() {
                        signature.source_file = resolved_name;
                    }
                    signature
                })
            }
            (_, _, LoadedFile::Source(signatures), identifier) => {
                signatures.find_function(&identifier).cloned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_directory_is_searched_first() {
        let rules = SearchRules::new()
            .with_directory("shaders")
            .with_directory("shaders/lib");
        let local = rules.with_local_directory(Path::new("shaders/lib"), "lib");

        assert_eq!(
            local.directories().collect::<Vec<_>>(),
            vec![Path::new("shaders/lib"), Path::new("shaders")]
        );
    }

    #[test]
    fn names_found_locally_are_relative_to_the_search_root() {
        let rules = SearchRules::new().with_directory("data");
        let local = rules.with_local_directory(Path::new("data/Effects"), "Effects");

        assert_eq!(
            local.resolve("Common.hlsl", &[]),
            Some((
                PathBuf::from("data/Effects/Common.hlsl"),
                "Effects/Common.hlsl".to_string()
            ))
        );
        assert_eq!(
            local.resolve("Utility", &["hlsl".to_string()]),
            Some((PathBuf::from("data/Utility.hlsl"), "Utility.hlsl".to_string()))
        );
    }

    #[test]
    fn joined_names_fold_relative_segments() {
        assert_eq!(join_name("", "Utility.hlsl"), "Utility.hlsl");
        assert_eq!(join_name("Effects", "./Common.hlsl"), "Effects/Common.hlsl");
        assert_eq!(join_name("Effects", "../Utility.hlsl"), "Utility.hlsl");
        assert_eq!(join_name("", "../Shared/Noise.hlsl"), "../Shared/Noise.hlsl");
        assert_eq!(parent_name("Effects/Blur.graph"), "Effects");
        assert_eq!(parent_name("Main.graph"), "");
    }

    #[test]
    fn graph_documents_round_trip_through_json() {
        let document = GraphDocument {
            graphs: vec![GraphEntry {
                name: "Main".to_string(),
                signature: FunctionSignature::new("Main"),
                graph: NodeGraph::new(),
            }],
        };

        let json = document.to_json().unwrap();
        assert_eq!(GraphDocument::from_json(&json).unwrap(), document);
    }
}
