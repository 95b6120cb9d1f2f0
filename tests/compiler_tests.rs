use mace_lang::ast::NodeKind;
use mace_lang::{CompileOptions, ParserContext, Ty, Value, compile, compile_expression};
use pretty_assertions::assert_eq;

fn strict() -> ParserContext {
    ParserContext::new(CompileOptions::default().with_strict_typing(true))
}

fn names(map: &std::collections::BTreeMap<String, Option<Ty>>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

#[test]
fn test_inputs_and_variables_are_inferred() {
    let compiled =
        compile_expression("test != foo && bo.addSomething(trouble); String bleh = foo; twa = bleh;")
            .unwrap();

    assert_eq!(names(compiled.inputs()), vec!["bo", "foo", "test", "trouble"]);
    assert_eq!(names(compiled.variables()), vec!["bleh", "twa"]);
    assert_eq!(compiled.variables()["bleh"], Some(Ty::String));
    assert_eq!(compiled.variables()["twa"], Some(Ty::String));
}

#[test]
fn test_declared_names_are_not_inputs() {
    let compiled = compile_expression("x = 10; y = x * 2; y").unwrap();
    assert!(compiled.inputs().is_empty());
    assert_eq!(names(compiled.variables()), vec!["x", "y"]);
}

#[test]
fn test_literal_runs_fold_to_a_single_value() {
    let compiled = compile_expression("10 + 1 + 8").unwrap();
    assert!(compiled.is_literal_only());
    assert_eq!(compiled.literal_value(), Some(&Value::Integer(19)));

    let compiled = compile_expression("'foo' + 'bar' == 'foobar'").unwrap();
    assert_eq!(compiled.literal_value(), Some(&Value::Boolean(true)));
}

#[test]
fn test_folding_can_be_disabled() {
    let options = CompileOptions::default().with_fold_constants(false);
    let compiled = compile("10 + 1 + 8", ParserContext::new(options)).unwrap();
    assert!(!compiled.is_literal_only());
}

#[test]
fn test_partial_folding_keeps_names() {
    let compiled = compile_expression("a + 2 * 3").unwrap();
    assert!(!compiled.is_literal_only());
    let literals: Vec<&Value> = compiled.chain().nodes().iter().filter_map(|n| n.literal()).collect();
    assert_eq!(literals, vec![&Value::Integer(6)]);
}

#[test]
fn test_egress_types() {
    let egress = |source: &str| compile_expression(source).unwrap().egress_type().cloned();
    assert_eq!(egress("1 + 2"), Some(Ty::Integer));
    assert_eq!(egress("a > b"), Some(Ty::Boolean));
    assert_eq!(egress("[1, 2, 3]"), Some(Ty::List));
    assert_eq!(egress("['a': 1]"), Some(Ty::Map));
    assert_eq!(egress("s = 'abc'; s.length()"), Some(Ty::Integer));
    assert_eq!(egress("a"), None);
}

#[test]
fn test_strict_mode_requires_declared_inputs() {
    let err = compile("price * 2", strict()).unwrap_err();
    let first = err.first().unwrap();
    assert!(first.message.contains("price"), "{first}");

    let mut ctx = strict();
    ctx.add_input("price", Some(Ty::Integer));
    assert!(compile("price * 2", ctx).is_ok());
}

#[test]
fn test_strict_mode_rejects_ill_typed_assignment() {
    let err = compile("int count = 'many'", strict()).unwrap_err();
    assert!(err.to_string().contains("cannot assign"), "{err}");

    // lossless literal coercions are allowed
    assert!(compile("long total = 5", strict()).is_ok());
}

#[test]
fn test_strict_mode_rejects_unknown_members() {
    let mut ctx = strict();
    ctx.add_input("name", Some(Ty::String));
    let err = compile("name.frobnicate()", ctx).unwrap_err();
    assert!(err.to_string().contains("frobnicate"), "{err}");

    // the same expression only warns outside strict mode
    let mut ctx = ParserContext::default();
    ctx.add_input("name", Some(Ty::String));
    let compiled = compile("name.frobnicate()", ctx).unwrap();
    assert_eq!(compiled.context().warnings().count(), 1);
}

#[test]
fn test_diagnostics_carry_line_and_column() {
    let err = compile("1 + 1;\n  zz * 2", strict()).unwrap_err();
    let first = err.first().unwrap();
    assert_eq!(first.location.line, 2);
    assert_eq!(first.location.column, 2);
    assert_eq!(first.location.snippet, "zz");
}

#[test]
fn test_parse_errors_become_diagnostics() {
    let err = compile_expression("foo(1, 2").unwrap_err();
    assert_eq!(err.errors().count(), 1);
    assert!(err.to_string().contains("unbalanced"), "{err}");
}

#[test]
fn test_arity_is_checked_at_compile_time() {
    let err = compile_expression("def add(a, b) { a + b }; add(1)").unwrap_err();
    assert!(err.to_string().contains("expects 2 arguments"), "{err}");
}

#[test]
fn test_debug_symbols_emit_line_labels() {
    let options = CompileOptions::default()
        .with_debug_symbols(true)
        .with_source_name("labels");
    let compiled = compile("a = 1\nb = 2\nc = a + b", ParserContext::new(options)).unwrap();
    let lines: Vec<usize> = compiled
        .chain()
        .nodes()
        .iter()
        .filter_map(|n| match &n.kind {
            NodeKind::LineLabel { line, source } => {
                assert_eq!(&**source, "labels");
                Some(*line)
            }
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn test_no_line_labels_without_debug_symbols() {
    let compiled = compile_expression("a = 1\nb = 2").unwrap();
    assert!(
        !compiled
            .chain()
            .nodes()
            .iter()
            .any(|n| matches!(n.kind, NodeKind::LineLabel { .. }))
    );
}

#[test]
fn test_imports_resolve_static_members() {
    let mut ctx = strict();
    assert!(ctx.import_qualified("lang.Math.abs", true));
    let compiled = compile("abs(-4)", ctx).unwrap();
    assert!(compiled.inputs().is_empty());
}

#[test]
fn test_comments_are_ignored() {
    let compiled = compile_expression("// leading\n1 + /* inline */ 2").unwrap();
    assert_eq!(compiled.literal_value(), Some(&Value::Integer(3)));
}
