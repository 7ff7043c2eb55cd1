//! Parameter bindings that customize one instantiation of a graph, and the dependencies a
//! generated function reports back.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    collections::{btree_map, BTreeMap},
    iter::FromIterator,
};

/// What a single instantiation parameter is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ParameterBinding {
    /// Replaces the graph input of the same name with a literal.
    Constant(String),
    /// Redirects calls to the placeholder of the same name to another function.
    Function {
        archive_name: String,
        #[serde(default)]
        parameters: InstantiationParameters,
    },
}

impl ParameterBinding {
    pub fn constant(value: impl ToString) -> Self {
        Self::Constant(value.to_string())
    }

    pub fn function(archive_name: &str, parameters: InstantiationParameters) -> Self {
        Self::Function {
            archive_name: archive_name.to_string(),
            parameters,
        }
    }
}

/// An immutable set of named bindings. Bindings are kept sorted by name, so neither equality
/// nor the hash depend on the order they were added in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct InstantiationParameters {
    parameter_bindings: BTreeMap<String, ParameterBinding>,
}

impl InstantiationParameters {
    pub fn new() -> Self {
        Self {
            parameter_bindings: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, binding: ParameterBinding) -> Self {
        self.parameter_bindings.insert(name.to_string(), binding);
        self
    }

    pub fn with_constant(self, name: &str, value: impl ToString) -> Self {
        self.with(name, ParameterBinding::constant(value))
    }

    pub fn get(&self, name: &str) -> Option<&ParameterBinding> {
        self.parameter_bindings.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&str> {
        match self.parameter_bindings.get(name) {
            Some(ParameterBinding::Constant(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParameterBinding> {
        self.parameter_bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.parameter_bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameter_bindings.is_empty()
    }

    /// A 64 bit identity for this binding set, used to mangle instantiated names.
    ///
    /// The empty set hashes to 0, which means "no mangling". Any non-empty set hashes to a
    /// non-zero value. The value is derived from a SHA-256 digest, so it is the same across
    /// runs, builds and platforms.
    pub fn calculate_hash(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }

        let mut hasher = Sha256::new();
        self.feed(&mut hasher);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        match u64::from_le_bytes(bytes) {
            0 => 1,
            hash => hash,
        }
    }

    fn feed(&self, hasher: &mut Sha256) {
        hasher.update((self.parameter_bindings.len() as u64).to_le_bytes());
        for (name, binding) in &self.parameter_bindings {
            feed_str(hasher, name);
            match binding {
                ParameterBinding::Constant(value) => {
                    hasher.update([0u8]);
                    feed_str(hasher, value);
                }
                ParameterBinding::Function {
                    archive_name,
                    parameters,
                } => {
                    hasher.update([1u8]);
                    feed_str(hasher, archive_name);
                    parameters.feed(hasher);
                }
            }
        }
    }
}

fn feed_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

impl<S: Into<String>> FromIterator<(S, ParameterBinding)> for InstantiationParameters {
    fn from_iter<I: IntoIterator<Item = (S, ParameterBinding)>>(iter: I) -> Self {
        Self {
            parameter_bindings: iter
                .into_iter()
                .map(|(name, binding)| (name.into(), binding))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a InstantiationParameters {
    type Item = (&'a String, &'a ParameterBinding);
    type IntoIter = btree_map::Iter<'a, String, ParameterBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Something a generated function calls into: either another graph that needs its own
/// instantiation, or a function from a plain shader header.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Dependency {
    pub archive_name: String,
    #[serde(default)]
    pub parameters: InstantiationParameters,
}

impl Dependency {
    pub fn new(archive_name: &str, parameters: InstantiationParameters) -> Self {
        Self {
            archive_name: archive_name.to_string(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_insertion_order() {
        let a = InstantiationParameters::new()
            .with_constant("radius", 3)
            .with_constant("samples", 8)
            .with(
                "filter",
                ParameterBinding::function("Filters.hlsl::Gaussian", InstantiationParameters::new()),
            );
        let b: InstantiationParameters = vec![
            (
                "filter",
                ParameterBinding::function("Filters.hlsl::Gaussian", InstantiationParameters::new()),
            ),
            ("samples", ParameterBinding::constant(8)),
            ("radius", ParameterBinding::constant(3)),
        ]
        .into_iter()
        .collect();

        assert_eq!(a, b);
        assert_eq!(a.calculate_hash(), b.calculate_hash());
    }

    #[test]
    fn empty_set_hashes_to_zero() {
        assert_eq!(InstantiationParameters::new().calculate_hash(), 0);
        assert!(InstantiationParameters::new().is_empty());
    }

    #[test]
    fn non_empty_sets_never_hash_to_zero() {
        for i in 0..256 {
            let params = InstantiationParameters::new().with_constant("value", i);
            assert_ne!(params.calculate_hash(), 0);
        }
    }

    #[test]
    fn hash_distinguishes_values_and_kinds() {
        let three = InstantiationParameters::new().with_constant("radius", 3);
        let four = InstantiationParameters::new().with_constant("radius", 4);
        let function = InstantiationParameters::new().with(
            "radius",
            ParameterBinding::function("3", InstantiationParameters::new()),
        );

        assert_ne!(three.calculate_hash(), four.calculate_hash());
        assert_ne!(three.calculate_hash(), function.calculate_hash());
    }

    #[test]
    fn nested_parameters_contribute_to_hash() {
        let inner_a = InstantiationParameters::new().with_constant("taps", 5);
        let inner_b = InstantiationParameters::new().with_constant("taps", 7);

        let a = InstantiationParameters::new()
            .with("filter", ParameterBinding::function("Blur.graph::Apply", inner_a));
        let b = InstantiationParameters::new()
            .with("filter", ParameterBinding::function("Blur.graph::Apply", inner_b));

        assert_ne!(a.calculate_hash(), b.calculate_hash());
    }

    #[test]
    fn hash_is_stable_across_runs() {
        let params = InstantiationParameters::new().with_constant("radius", 3);

        assert_eq!(params.calculate_hash(), RADIUS_3_HASH);
    }

    // Pinned so that a change to the hashing scheme, which would rename every generated
    // symbol, shows up as a test failure.
    const RADIUS_3_HASH: u64 = 610813176946104168;

    #[test]
    fn deserializes_constants_and_functions() {
        let params: InstantiationParameters = serde_json::from_str(
            r#"{
                "radius": "3",
                "filter": { "archive_name": "Filters.hlsl::Box", "parameters": { "taps": "5" } }
            }"#,
        )
        .unwrap();

        assert_eq!(params.constant("radius"), Some("3"));
        assert_eq!(
            params.get("filter"),
            Some(&ParameterBinding::function(
                "Filters.hlsl::Box",
                InstantiationParameters::new().with_constant("taps", 5)
            ))
        );
    }
}
