use mace_lang::output::from_json_str;
use mace_lang::{
    MapVariableResolverFactory, RuntimeError, Value, VariableResolverFactory, compile_expression,
    eval, execute,
};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Value {
    eval(source, Value::Null, &MapVariableResolverFactory::new()).unwrap()
}

fn try_run(source: &str) -> Result<Value, RuntimeError> {
    let compiled = compile_expression(source).unwrap();
    execute(&compiled, Value::Null, &MapVariableResolverFactory::new())
}

fn list(items: &[i32]) -> Value {
    Value::list(items.iter().copied().map(Value::Integer).collect())
}

#[test]
fn test_if_else_chain() {
    let source = "if (n > 10) { 'big' } else if (n > 5) { 'medium' } else { 'small' }";
    let compiled = compile_expression(source).unwrap();
    for (n, expected) in [(20, "big"), (7, "medium"), (1, "small")] {
        let vars = MapVariableResolverFactory::new().with("n", n);
        assert_eq!(execute(&compiled, Value::Null, &vars), Ok(Value::from(expected)));
    }
}

#[test]
fn test_foreach_accumulates() {
    assert_eq!(
        run("total = 0; foreach (x : [1, 2, 3, 4]) { total += x } total"),
        Value::Integer(10)
    );
    assert_eq!(
        run("out = ''; foreach (c : 'abc') { out = c + out } out"),
        Value::from("cba")
    );
}

#[test]
fn test_classic_for_and_while() {
    assert_eq!(
        run("acc = 1; for (int i = 1; i <= 5; i++) { acc *= i } acc"),
        Value::Integer(120)
    );
    assert_eq!(run("i = 0; while (i < 7) { i += 2 } i"), Value::Integer(8));
}

#[test]
fn test_inline_collections() {
    assert_eq!(run("[1, 2, 3]"), list(&[1, 2, 3]));
    assert_eq!(run("[1, 2, 3][1]"), Value::Integer(2));
    assert_eq!(run("['a': 1, 'b': 2].b"), Value::Integer(2));
    assert_eq!(run("{4, 5}.length"), Value::Integer(2));
    assert_eq!(run("[[1, 2], [3]][0][1]"), Value::Integer(2));
}

#[test]
fn test_projection() {
    let root = from_json_str(r#"{"people": [{"name": "ada"}, {"name": "alan"}]}"#).unwrap();
    let compiled = compile_expression("(name in people)").unwrap();
    let value = execute(&compiled, root, &MapVariableResolverFactory::new()).unwrap();
    assert_eq!(
        value,
        Value::list(vec![Value::from("ada"), Value::from("alan")])
    );
}

#[test]
fn test_projection_names_are_not_inputs() {
    let compiled = compile_expression("(name.toUpperCase() in people)").unwrap();
    let inputs: Vec<&str> = compiled.inputs().keys().map(String::as_str).collect();
    assert_eq!(inputs, vec!["people"]);
}

#[test]
fn test_with_block_sets_several_properties() {
    let vars = MapVariableResolverFactory::new().with("order", Value::empty_map());
    let compiled =
        compile_expression("with (order) { status = 'paid', total = 10 * 2 }; order.total").unwrap();
    assert_eq!(execute(&compiled, Value::Null, &vars), Ok(Value::Integer(20)));
    let order = vars.get("order").unwrap();
    assert_eq!(
        mace_lang::get_property("status", &order).unwrap(),
        Value::from("paid")
    );
}

#[test]
fn test_null_safe_navigation() {
    let root = from_json_str(r#"{"user": {"address": null}}"#).unwrap();
    let compiled = compile_expression("user.address.?city").unwrap();
    assert_eq!(
        execute(&compiled, root, &MapVariableResolverFactory::new()),
        Ok(Value::Null)
    );
}

#[test]
fn test_string_methods() {
    assert_eq!(run("'  Mace  '.trim().toUpperCase()"), Value::from("MACE"));
    assert_eq!(run("'hello'.substring(1, 3)"), Value::from("el"));
    assert_eq!(run("'a,b,c'.split(',').length"), Value::Integer(3));
    assert_eq!(run("'abc'.charAt(1) == 'b'"), Value::Boolean(true));
}

#[test]
fn test_static_members() {
    assert_eq!(run("Math.abs(-3)"), Value::Integer(3));
    assert_eq!(run("Math.max(3, 7)"), Value::Integer(7));
    assert_eq!(run("Integer.parseInt('42') + 1"), Value::Integer(43));
    assert_eq!(run("String.valueOf(5) + 5"), Value::from("55"));
    assert_eq!(run("import static lang.Math.abs; abs(-9)"), Value::Integer(9));
}

#[test]
fn test_functions() {
    assert_eq!(run("def add(a, b) { a + b }; add(2, 3)"), Value::Integer(5));
    assert_eq!(
        run("def sign(x) { if (x < 0) { return 'neg' } 'pos' }; sign(-1) + sign(1)"),
        Value::from("negpos")
    );
    assert_eq!(
        run("def twice(int x) { x * 2 }; twice('21')"),
        Value::Integer(42)
    );
}

#[test]
fn test_function_locals_stay_local() {
    let vars = MapVariableResolverFactory::new();
    let compiled = compile_expression("def f() { tmp = 5; tmp * 2 }; f()").unwrap();
    assert_eq!(execute(&compiled, Value::Null, &vars), Ok(Value::Integer(10)));
    assert!(!vars.is_resolvable("tmp"));
    assert!(vars.is_resolvable("f"));
}

#[test]
fn test_protos() {
    let source = "proto Point { int x; int y = 3; def sum() { x + y } }; \
                  p = new Point(4); p.sum()";
    assert_eq!(run(source), Value::Integer(7));

    let source = "proto Counter { int n; def inc() { n = n + 1; n } }; \
                  c = new Counter(); c.inc(); c.inc(); c.n";
    assert_eq!(run(source), Value::Integer(2));

    assert_eq!(
        run("proto P { var a; }; new P() instanceof P"),
        Value::Boolean(true)
    );
}

#[test]
fn test_proto_field_assignment() {
    assert_eq!(
        run("proto Box { int v; }; b = new Box(); b.v = 9; b.v"),
        Value::Integer(9)
    );
    assert!(matches!(
        try_run("proto Box { int v; }; b = new Box(); b.w = 9"),
        Err(RuntimeError::Access { .. })
    ));
}

#[test]
fn test_new_builtin_collections() {
    assert_eq!(
        run("l = new ArrayList(); l.add(1); l.add(2); l.size()"),
        Value::Integer(2)
    );
    assert_eq!(
        run("m = new HashMap(); m.put('k', 'v'); m.k"),
        Value::from("v")
    );
    assert_eq!(run("new String[] {'a', 'b'}[1]"), Value::from("b"));
}

#[test]
fn test_assert_and_isdef() {
    assert_eq!(run("assert 1 + 1 == 2"), Value::Boolean(true));
    assert!(matches!(
        try_run("assert 1 == 2"),
        Err(RuntimeError::Assertion { .. })
    ));

    let vars = MapVariableResolverFactory::new().with("present", 1);
    let compiled = compile_expression("isdef present && !isdef absent").unwrap();
    assert_eq!(execute(&compiled, Value::Null, &vars), Ok(Value::Boolean(true)));
}

#[test]
fn test_increments() {
    assert_eq!(run("x = 5; y = x++; y * 10 + x"), Value::Integer(56));
    assert_eq!(run("x = 5; y = ++x; y * 10 + x"), Value::Integer(66));
    assert_eq!(run("x = 5; x -= 2; x"), Value::Integer(3));
}

#[test]
fn test_typed_declarations_coerce() {
    assert_eq!(run("long big = 5; big"), Value::Long(5));
    assert_eq!(run("String s = 12; s + 1"), Value::from("121"));
}

#[test]
fn test_statements_separated_by_newlines() {
    assert_eq!(run("a = 2\nb = 3\na * b"), Value::Integer(6));
}
