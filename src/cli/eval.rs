//! Compile and execute an expression against a JSON root object

use super::CliError;
use crate::output::{from_json, from_json_str};
use crate::{
    CompileOptions, MapVariableResolverFactory, ParserContext, Value, compile, execute,
};

/// Options for the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// The expression to evaluate
    pub expression: String,
    /// JSON document used as the root object
    pub input: Option<String>,
    /// `name=value` variable bindings
    pub variables: Vec<String>,
    pub strict: bool,
    pub no_fold: bool,
    pub decimal: bool,
    pub debug_symbols: bool,
}

/// Split `name=value`. The value is read as JSON when it parses, otherwise as a
/// plain string.
pub fn parse_variable(arg: &str) -> Result<(String, Value), CliError> {
    let (name, raw) = arg
        .split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| CliError::InvalidVariable(arg.to_string()))?;
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => from_json(json),
        Err(_) => Value::String(raw.to_string()),
    };
    Ok((name.trim().to_string(), value))
}

/// Execute a mace eval operation
pub fn execute_eval(options: &EvalOptions) -> Result<Value, CliError> {
    let compile_options = CompileOptions::default()
        .with_strict_typing(options.strict)
        .with_fold_constants(!options.no_fold)
        .with_decimal_arithmetic(options.decimal)
        .with_debug_symbols(options.debug_symbols)
        .with_source_name("<cli>");

    let mut vars = MapVariableResolverFactory::new();
    let mut context = ParserContext::new(compile_options);
    for arg in &options.variables {
        let (name, value) = parse_variable(arg)?;
        context.add_input(name.clone(), value.ty());
        vars = vars.with(name, value);
    }

    let compiled = compile(&options.expression, context)?;
    let root = match &options.input {
        Some(json) => from_json_str(json)?,
        None => Value::Null,
    };
    Ok(execute(&compiled, root, &vars)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_against_input() {
        let options = EvalOptions {
            expression: "user.name + ' is ' + user.age".to_string(),
            input: Some(r#"{"user": {"name": "Ada", "age": 36}}"#.to_string()),
            ..Default::default()
        };
        assert_eq!(execute_eval(&options).unwrap(), Value::from("Ada is 36"));
    }

    #[test]
    fn test_variables_parse_as_json_or_text() {
        assert_eq!(parse_variable("n=5").unwrap(), ("n".to_string(), Value::Integer(5)));
        assert_eq!(
            parse_variable("s=hello").unwrap(),
            ("s".to_string(), Value::from("hello"))
        );
        assert!(parse_variable("novalue").is_err());
    }
}
