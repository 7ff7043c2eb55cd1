use crate::{
    error::{Result, ShaderGraphError},
    function_generator::RESULT_SLOT,
    signature::FunctionSignature,
};
use std::fmt::Write;

/// Emits a function with a graph's original interface that forwards to the function
/// generated for one instantiation of it.
pub trait ScaffoldGenerator: Send + Sync {
    fn generate(
        &self,
        original_signature: &FunctionSignature,
        generated_signature: &FunctionSignature,
        scaffold_name: &str,
        implementation_name: &str,
    ) -> Result<String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HlslScaffoldGenerator;

impl ScaffoldGenerator for HlslScaffoldGenerator {
    fn generate(
        &self,
        original_signature: &FunctionSignature,
        generated_signature: &FunctionSignature,
        scaffold_name: &str,
        implementation_name: &str,
    ) -> Result<String> {
        let mismatch = |message: String| ShaderGraphError::SignatureMismatch {
            function: scaffold_name.to_string(),
            message,
        };

        let returns_value = original_signature.returns_value();
        if returns_value && original_signature.find_parameter(RESULT_SLOT).is_some() {
            return Err(mismatch(format!(
                "a function returning a value can not have a parameter named `{}`",
                RESULT_SLOT
            )));
        }

        let mut arguments = Vec::with_capacity(generated_signature.parameters.len());
        for parameter in &generated_signature.parameters {
            match original_signature.find_parameter(&parameter.name) {
                Some(original) => {
                    if original.type_name != parameter.type_name {
                        return Err(mismatch(format!(
                            "`{}` is `{}` but the implementation expects `{}`",
                            parameter.name, original.type_name, parameter.type_name
                        )));
                    }
                    if parameter.direction.is_output() && !original.direction.is_output() {
                        return Err(mismatch(format!(
                            "`{}` is an input but the implementation writes to it",
                            parameter.name
                        )));
                    }
                }
                None if returns_value
                    && parameter.name == RESULT_SLOT
                    && parameter.direction.is_output()
                    && parameter.type_name == original_signature.return_type => {}
                None => {
                    return Err(mismatch(format!(
                        "the implementation expects a parameter `{}` that the original signature lacks",
                        parameter.name
                    )))
                }
            }
            arguments.push(parameter.name.as_str());
        }

        let mut text = original_signature.declaration(scaffold_name);
        text.push_str("\n{\n");
        if returns_value {
            writeln!(text, "\t{} {};", original_signature.return_type, RESULT_SLOT).ok();
        }
        writeln!(text, "\t{}({});", implementation_name, arguments.join(", ")).ok();
        if returns_value {
            writeln!(text, "\treturn {};", RESULT_SLOT).ok();
        }
        text.push_str("}\n");

        Ok(text)
    }
}
