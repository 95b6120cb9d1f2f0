//! Property tests: folding literal runs at compile time never changes a result,
//! and reduction follows the usual arithmetic precedence.

use mace_lang::{
    CompileOptions, MapVariableResolverFactory, ParserContext, Value, compile, execute,
};
use proptest::prelude::*;

fn arb_op() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("+"), Just("-"), Just("*")]
}

fn run(source: &str, fold: bool, vars: &MapVariableResolverFactory) -> Value {
    let options = CompileOptions::default().with_fold_constants(fold);
    let compiled = compile(source, ParserContext::new(options)).unwrap();
    execute(&compiled, Value::Null, vars).unwrap()
}

/// Reference evaluation with `*` binding tighter than `+` and `-`.
fn reference(operands: &[i64], ops: &[&str]) -> i64 {
    let mut terms = vec![operands[0]];
    let mut signs = vec![1i64];
    for (op, n) in ops.iter().zip(&operands[1..]) {
        match *op {
            "*" => {
                if let Some(last) = terms.last_mut() {
                    *last *= n;
                }
            }
            "+" => {
                terms.push(*n);
                signs.push(1);
            }
            _ => {
                terms.push(*n);
                signs.push(-1);
            }
        }
    }
    terms.iter().zip(&signs).map(|(t, s)| t * s).sum()
}

fn source_of(operands: &[i64], ops: &[&str]) -> String {
    let mut source = operands[0].to_string();
    for (op, n) in ops.iter().zip(&operands[1..]) {
        source.push_str(&format!(" {op} {n}"));
    }
    source
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn folding_is_transparent(
        operands in prop::collection::vec(0i64..20, 2..6),
        ops in prop::collection::vec(arb_op(), 5),
    ) {
        let ops = &ops[..operands.len() - 1];
        let source = source_of(&operands, ops);
        let vars = MapVariableResolverFactory::new();
        prop_assert_eq!(run(&source, true, &vars), run(&source, false, &vars));
    }

    #[test]
    fn precedence_matches_arithmetic(
        operands in prop::collection::vec(0i64..20, 2..6),
        ops in prop::collection::vec(arb_op(), 5),
    ) {
        let ops = &ops[..operands.len() - 1];
        let source = source_of(&operands, ops);
        let value = run(&source, false, &MapVariableResolverFactory::new());
        prop_assert_eq!(value.as_i64(), Some(reference(&operands, ops)), "{}", source);
    }

    #[test]
    fn partial_folding_around_names(
        a in 0i64..50,
        b in 0i64..50,
        x in 0i32..50,
        op in arb_op(),
    ) {
        // the run after the name folds only when it binds tighter than `+`
        let source = format!("x + {a} {op} {b}");
        let vars = MapVariableResolverFactory::new().with("x", x);
        prop_assert_eq!(run(&source, true, &vars), run(&source, false, &vars));
    }
}
