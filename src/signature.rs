use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterDirection {
    In,
    Out,
    InOut,
}

impl Default for ParameterDirection {
    fn default() -> Self {
        Self::In
    }
}

impl fmt::Display for ParameterDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
            Self::InOut => write!(f, "inout"),
        }
    }
}

impl ParameterDirection {
    pub fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub direction: ParameterDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
}

impl Parameter {
    pub fn new(name: &str, type_name: &str, direction: ParameterDirection) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            direction,
            semantic: None,
        }
    }

    pub fn input(name: &str, type_name: &str) -> Self {
        Self::new(name, type_name, ParameterDirection::In)
    }

    pub fn output(name: &str, type_name: &str) -> Self {
        Self::new(name, type_name, ParameterDirection::Out)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.direction != ParameterDirection::In {
            write!(f, "{} ", self.direction)?;
        }
        write!(f, "{} {}", self.type_name, self.name)?;
        if let Some(semantic) = &self.semantic {
            write!(f, " : {}", semantic)?;
        }
        Ok(())
    }
}

/// The callable interface of a shader function or graph.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    #[serde(default = "void")]
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// The file the function was declared in, as it should appear in an `#include`.
    #[serde(default)]
    pub source_file: String,
}

fn void() -> String {
    "void".to_string()
}

impl FunctionSignature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            return_type: void(),
            parameters: Vec::new(),
            source_file: String::new(),
        }
    }

    pub fn return_type(mut self, return_type: &str) -> Self {
        self.return_type = return_type.to_string();
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn source_file(mut self, source_file: &str) -> Self {
        self.source_file = source_file.to_string();
        self
    }

    pub fn returns_value(&self) -> bool {
        self.return_type != "void"
    }

    pub fn find_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Declaration text for this signature under a different function name.
    pub fn declaration(&self, name: &str) -> String {
        let parameters = self
            .parameters
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({})", self.return_type, name, parameters)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StructMember {
    pub name: String,
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
}

/// Layout of a `struct` declared in a shader header.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParameterStructSignature {
    pub name: String,
    pub members: Vec<StructMember>,
    #[serde(default)]
    pub source_file: String,
}
