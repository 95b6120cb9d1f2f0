use std::sync::{Arc, Mutex};
use std::thread;

use mace_lang::error::AccessError;
use mace_lang::{
    CompileOptions, DebugContext, DebugDecision, ExpressionCache, Interpreter,
    MapVariableResolverFactory, ParserContext, RuntimeError, Value, VariableResolverFactory,
    compile, compile_expression, eval, execute,
};
use pretty_assertions::assert_eq;

fn run(source: &str) -> Value {
    eval(source, Value::Null, &MapVariableResolverFactory::new()).unwrap()
}

fn run_with(source: &str, vars: &MapVariableResolverFactory) -> Result<Value, RuntimeError> {
    let compiled = compile_expression(source).unwrap();
    execute(&compiled, Value::Null, vars)
}

#[test]
fn test_precedence() {
    assert_eq!(run("10-5*2+5*8-4"), Value::Integer(36));
    assert_eq!(run("2 + 3 * 4 ** 2"), Value::Integer(50));
    assert_eq!(run("(2 + 3) * 4"), Value::Integer(20));
    assert_eq!(run("1 + 2 == 3 && 4 > 3"), Value::Boolean(true));
}

#[test]
fn test_folded_and_unfolded_agree() {
    for source in [
        "(100 % 3) * 2 - 1 / 1 + 8 + (5 * 2)",
        "10-5*2+5*8-4",
        "7 % 3 + 2 * 5",
        "'a' + 1 + 2",
        "1 << 3 | 1",
    ] {
        let folded = compile_expression(source).unwrap();
        let folded = execute(&folded, Value::Null, &MapVariableResolverFactory::new()).unwrap();
        assert_eq!(folded, run(source), "{source}");
    }
}

#[test]
fn test_short_circuit_skips_right_operand() {
    let vars = MapVariableResolverFactory::new();
    assert_eq!(run_with("false && nothing.boom()", &vars), Ok(Value::Boolean(false)));
    assert_eq!(run_with("true || nothing.boom()", &vars), Ok(Value::Boolean(true)));
    assert_eq!(
        run_with("false && nothing.boom() || true", &vars),
        Ok(Value::Boolean(true))
    );
}

#[test]
fn test_ternary() {
    let vars = MapVariableResolverFactory::new().with("zero", 0);
    assert_eq!(
        run_with("zero==1?'foobie':'blimpie'", &vars),
        Ok(Value::from("blimpie"))
    );
    assert_eq!(
        run_with("zero == 0 ? (zero + 1 > 0 ? 'a' : 'b') : 'c'", &vars),
        Ok(Value::from("a"))
    );
}

#[test]
fn test_unsigned_shift_left_clears_sign() {
    assert_eq!(run("-2 <<< 0"), Value::Integer(2));
}

#[test]
fn test_integer_division_widens() {
    assert_eq!(run("6 / 2"), Value::Integer(3));
    assert_eq!(run("7 / 2"), Value::Double(3.5));

    let options = CompileOptions::default().with_decimal_arithmetic(true);
    let compiled = compile("7 / 2", ParserContext::new(options)).unwrap();
    let value = execute(&compiled, Value::Null, &MapVariableResolverFactory::new()).unwrap();
    assert!(matches!(value, Value::Decimal(_)), "{value:?}");
    assert_eq!(value.as_string(), "3.5");
}

#[test]
fn test_division_by_zero_is_reported() {
    let vars = MapVariableResolverFactory::new().with("n", 0);
    assert!(matches!(
        run_with("10 / n", &vars),
        Err(RuntimeError::Arithmetic { .. })
    ));
}

#[test]
fn test_text_operators() {
    assert_eq!(run("'foo' # 1 # 2"), Value::from("foo12"));
    assert_eq!(run("'abc123' ~= '[a-z]+[0-9]+'"), Value::Boolean(true));
    assert_eq!(run("'abc' ~= 'b'"), Value::Boolean(false));
    assert_eq!(run("'Robert' soundex 'Rupert'"), Value::Boolean(true));
    assert_eq!(run("[1, 2, 3] contains 2"), Value::Boolean(true));
    assert_eq!(run("'haystack' contains 'st'"), Value::Boolean(true));
}

#[test]
fn test_type_operators() {
    assert_eq!(run("'abc' instanceof String"), Value::Boolean(true));
    assert_eq!(run("5 is String"), Value::Boolean(false));
    assert_eq!(run("'42' convertable_to Integer"), Value::Boolean(true));
    assert_eq!(run("(int) 3.9"), Value::Integer(3));
}

#[test]
fn test_unresolved_identifier() {
    let vars = MapVariableResolverFactory::new();
    assert_eq!(
        run_with("missing + 1", &vars),
        Err(RuntimeError::Unresolved {
            name: "missing".to_string()
        })
    );
}

#[test]
fn test_null_target_access() {
    let vars = MapVariableResolverFactory::new().with("user", Value::Null);
    assert!(matches!(
        run_with("user.name", &vars),
        Err(RuntimeError::Access {
            error: AccessError::NullTarget { .. },
            ..
        })
    ));
    assert_eq!(run_with("user.?name", &vars), Ok(Value::Null));
}

#[test]
fn test_root_object_properties() {
    let compiled = compile_expression("name + ' has ' + items.size() + ' items'").unwrap();
    let root = mace_lang::output::from_json_str(r#"{"name": "cart", "items": [1, 2, 3]}"#).unwrap();
    let value = execute(&compiled, root, &MapVariableResolverFactory::new()).unwrap();
    assert_eq!(value, Value::from("cart has 3 items"));
}

#[test]
fn test_variables_shadow_root_properties() {
    let compiled = compile_expression("name").unwrap();
    let root = mace_lang::output::from_json_str(r#"{"name": "root"}"#).unwrap();
    let vars = MapVariableResolverFactory::new().with("name", "var");
    assert_eq!(execute(&compiled, root.clone(), &vars), Ok(Value::from("var")));
    assert_eq!(
        execute(&compiled, root, &MapVariableResolverFactory::new()),
        Ok(Value::from("root"))
    );
}

#[test]
fn test_assignments_write_back_to_variables() {
    let vars = MapVariableResolverFactory::new().with("count", 1);
    assert_eq!(run_with("count += 4; count * 2", &vars), Ok(Value::Integer(10)));
    assert_eq!(vars.get("count"), Some(Value::Integer(5)));

    assert_eq!(run_with("total = count - 1", &vars), Ok(Value::Integer(4)));
    assert_eq!(vars.get("total"), Some(Value::Integer(4)));
}

#[test]
fn test_one_chain_many_threads() {
    let compiled = Arc::new(compile_expression("x * 2 + y").unwrap());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiled = Arc::clone(&compiled);
            thread::spawn(move || {
                let vars = MapVariableResolverFactory::new().with("x", i).with("y", 1);
                (0..100)
                    .map(|_| execute(&compiled, Value::Null, &vars).unwrap())
                    .all(|v| v == Value::Integer(i * 2 + 1))
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn test_cache_shares_compiled_chains_across_threads() {
    let cache = ExpressionCache::new(8);
    let results: Vec<Value> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = &cache;
                s.spawn(move || {
                    let compiled = cache.get_or_compile("n + 1").unwrap();
                    let vars = MapVariableResolverFactory::new().with("n", i);
                    execute(&compiled, Value::Null, &vars).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(
        results,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3), Value::Integer(4)]
    );
    assert_eq!(cache.len(), 1);
}

fn debug_compile(source: &str) -> mace_lang::CompiledChain {
    let options = CompileOptions::default()
        .with_debug_symbols(true)
        .with_source_name("script");
    compile(source, ParserContext::new(options)).unwrap()
}

#[test]
fn test_breakpoint_sees_variables() {
    let compiled = debug_compile("a = 1\nb = a + 1\nb * 10");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let debugger = DebugContext::new(move |frame: &mace_lang::Frame<'_>| {
        recorder
            .lock()
            .unwrap()
            .push((frame.line, frame.variable("a"), frame.variable("b")));
        DebugDecision::Continue
    });
    debugger.breakpoints().add("script", 2);

    let vars = MapVariableResolverFactory::new();
    let value = Interpreter::new()
        .with_debugger(&debugger)
        .execute(&compiled, Value::Null, &vars)
        .unwrap();

    assert_eq!(value, Value::Integer(20));
    assert_eq!(*seen.lock().unwrap(), vec![(2, Some(Value::Integer(1)), None)]);
}

#[test]
fn test_stepping_pauses_at_every_line() {
    let compiled = debug_compile("a = 1\nb = 2\nc = a + b");
    let lines = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&lines);
    let debugger = DebugContext::new(move |frame: &mace_lang::Frame<'_>| {
        recorder.lock().unwrap().push(frame.line);
        if frame.line < 3 {
            DebugDecision::Step
        } else {
            DebugDecision::Continue
        }
    });
    debugger.breakpoints().add("script", 1);

    let vars = MapVariableResolverFactory::new();
    Interpreter::new()
        .with_debugger(&debugger)
        .execute(&compiled, Value::Null, &vars)
        .unwrap();

    assert_eq!(*lines.lock().unwrap(), vec![1, 2, 3]);
    assert!(!debugger.is_stepping());
}

#[test]
fn test_breakpoints_in_other_sources_are_ignored() {
    let compiled = debug_compile("a = 1\nb = 2");
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let debugger = DebugContext::new(move |_: &mace_lang::Frame<'_>| {
        *counter.lock().unwrap() += 1;
        DebugDecision::Continue
    });
    debugger.breakpoints().add("other", 1);

    Interpreter::new()
        .with_debugger(&debugger)
        .execute(&compiled, Value::Null, &MapVariableResolverFactory::new())
        .unwrap();
    assert_eq!(*hits.lock().unwrap(), 0);
}
