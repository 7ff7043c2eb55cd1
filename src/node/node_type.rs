use crate::instantiation::InstantiationParameters;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub enum NodeType {
    /// A call to the function named by `archive_name`, instantiated with `parameters`.
    Procedure {
        archive_name: String,
        #[serde(default)]
        parameters: InstantiationParameters,
    },
    /// A parameter of the graph's own signature.
    Input { name: String, type_name: String },
    /// An `out` parameter of the graph's own signature.
    Output { name: String, type_name: String },
    /// A literal, exposed on the `value` slot.
    Constant(String),
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeType::Procedure { archive_name, .. } => write!(f, "Procedure: {}", archive_name),
            NodeType::Input { name, .. } => write!(f, "Input: {}", name),
            NodeType::Output { name, .. } => write!(f, "Output: {}", name),
            NodeType::Constant(value) => write!(f, "Constant: {}", value),
        }
    }
}

impl NodeType {
    pub fn procedure(archive_name: &str) -> Self {
        Self::Procedure {
            archive_name: archive_name.to_string(),
            parameters: InstantiationParameters::new(),
        }
    }

    pub fn procedure_with(archive_name: &str, parameters: InstantiationParameters) -> Self {
        Self::Procedure {
            archive_name: archive_name.to_string(),
            parameters,
        }
    }

    pub fn input(name: &str, type_name: &str) -> Self {
        Self::Input {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub fn output(name: &str, type_name: &str) -> Self {
        Self::Output {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output { .. })
    }
}
