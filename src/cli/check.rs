//! Compile an expression without running it and report what it needs

use std::fmt;

use super::CliError;
use crate::{CompileOptions, ParserContext, Ty, compile};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to check
    pub expression: String,
    pub strict: bool,
    pub decimal: bool,
}

/// What a successful compilation found
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub egress: Option<Ty>,
    pub literal_only: bool,
    pub inputs: Vec<(String, Option<Ty>)>,
    pub variables: Vec<(String, Option<Ty>)>,
    pub warnings: Vec<String>,
}

fn describe(ty: &Option<Ty>) -> &str {
    ty.as_ref().map_or("Object", Ty::name)
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: {}", describe(&self.egress))?;
        if self.literal_only {
            writeln!(f, "constant: yes")?;
        }
        for (name, ty) in &self.inputs {
            writeln!(f, "input: {} ({})", name, describe(ty))?;
        }
        for (name, ty) in &self.variables {
            writeln!(f, "variable: {} ({})", name, describe(ty))?;
        }
        for warning in &self.warnings {
            writeln!(f, "{}", warning)?;
        }
        Ok(())
    }
}

/// Execute a mace check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckReport, CliError> {
    let compile_options = CompileOptions::default()
        .with_strict_typing(options.strict)
        .with_decimal_arithmetic(options.decimal)
        .with_source_name("<cli>");
    let compiled = compile(&options.expression, ParserContext::new(compile_options))?;

    let collect = |names: &std::collections::BTreeMap<String, Option<Ty>>| {
        names
            .iter()
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect::<Vec<_>>()
    };
    Ok(CheckReport {
        egress: compiled.egress_type().cloned(),
        literal_only: compiled.is_literal_only(),
        inputs: collect(compiled.inputs()),
        variables: collect(compiled.variables()),
        warnings: compiled.context().warnings().map(|w| w.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_inputs_and_variables() {
        let report = execute_check(&CheckOptions {
            expression: "total = price * 2; total".to_string(),
            ..Default::default()
        })
        .unwrap();
        let inputs: Vec<&str> = report.inputs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(inputs, ["price"]);
        assert_eq!(report.variables.len(), 1);
        assert_eq!(report.variables[0].0, "total");
    }

    #[test]
    fn test_strict_mode_rejects_unknown_inputs() {
        let result = execute_check(&CheckOptions {
            expression: "price * 2".to_string(),
            strict: true,
            ..Default::default()
        });
        assert!(matches!(result, Err(CliError::Compile(_))));
    }
}
