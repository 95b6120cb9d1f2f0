use mace_lang::ParserContext;
use mace_lang::ast::{AssignMode, AssignTarget, ChainRoot, ChainSegment, Node, NodeKind, Op};
use mace_lang::error::{ParseError, ParseErrorKind};
use mace_lang::scanner::Scanner;
use mace_lang::Value;
use pretty_assertions::assert_eq;

fn scan_with(source: &str, mut ctx: ParserContext) -> Result<Vec<Node>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut scanner = Scanner::new(&chars, 0, chars.len());
    let mut nodes = Vec::new();
    while let Some(node) = scanner.next_node(&mut ctx)? {
        nodes.push(node);
    }
    Ok(nodes)
}

fn scan(source: &str) -> Result<Vec<Node>, ParseError> {
    scan_with(source, ParserContext::default())
}

fn kinds(source: &str) -> Vec<&'static str> {
    scan(source).unwrap().iter().map(|n| n.kind.name()).collect()
}

#[test]
fn test_literals() {
    let nodes = scan("'it\\'s' + 0x1F + 10L + 1.5 + 2B + true + null").unwrap();
    let literals: Vec<&Value> = nodes.iter().filter_map(Node::literal).collect();
    assert_eq!(literals.len(), 7);
    assert_eq!(literals[0], &Value::from("it's"));
    assert_eq!(literals[1], &Value::Integer(31));
    assert!(matches!(literals[2], Value::Long(10)));
    assert!(matches!(literals[3], Value::Double(_)));
    assert!(matches!(literals[4], Value::Decimal(_)));
    assert_eq!(literals[5], &Value::Boolean(true));
    assert_eq!(literals[6], &Value::Null);
}

#[test]
fn test_longest_operator_wins() {
    let nodes = scan("a <<< 2 ** 3 <= b").unwrap();
    let ops: Vec<Op> = nodes.iter().filter_map(Node::operator).collect();
    assert_eq!(ops, vec![Op::UShl, Op::Pow, Op::Le]);
}

#[test]
fn test_property_chain_segments() {
    let nodes = scan("order.items[0].?name.trim()").unwrap();
    assert_eq!(nodes.len(), 1);
    let NodeKind::Property(chain) = &nodes[0].kind else {
        panic!("expected a property chain, got {}", nodes[0].kind.name());
    };
    assert!(matches!(&chain.root, ChainRoot::Identifier(name) if name == "order"));
    assert_eq!(chain.segments.len(), 4);
    assert!(matches!(&chain.segments[1], ChainSegment::Index(_)));
    assert!(matches!(
        &chain.segments[2],
        ChainSegment::Property { name, null_safe: true } if name == "name"
    ));
    assert!(matches!(&chain.segments[3], ChainSegment::Method { name, .. } if name == "trim"));
}

#[test]
fn test_assignment_forms() {
    let nodes = scan("x += 2; ++y; z--; var w = 1").unwrap();
    let assignments: Vec<_> = nodes
        .iter()
        .filter_map(|n| match &n.kind {
            NodeKind::Assignment(a) => Some((a.target.name().map(str::to_string), a.op, a.mode)),
            _ => None,
        })
        .collect();
    assert_eq!(
        assignments,
        vec![
            (Some("x".to_string()), Some(Op::Add), AssignMode::Assign),
            (Some("y".to_string()), Some(Op::Add), AssignMode::Prefix),
            (Some("z".to_string()), Some(Op::Sub), AssignMode::Postfix),
            (Some("w".to_string()), None, AssignMode::Declare),
        ]
    );
}

#[test]
fn test_indexed_assignment_target() {
    let nodes = scan("innermap['test'] = 'bar'").unwrap();
    let NodeKind::Assignment(assignment) = &nodes[0].kind else {
        panic!("expected an assignment");
    };
    assert!(matches!(assignment.target, AssignTarget::Property(_)));
}

#[test]
fn test_inline_collections() {
    assert_eq!(kinds("[1, 2, 3]"), vec!["collection"]);
    assert_eq!(kinds("['a': 1, 'b': 2]"), vec!["collection"]);
    assert_eq!(kinds("{1, 2}"), vec!["collection"]);
    assert_eq!(kinds("[1, 2][0]"), vec!["collection", "union"]);
}

#[test]
fn test_control_blocks() {
    assert_eq!(
        kinds("if (a) { 1 } else if (b) { 2 } else { 3 }"),
        vec!["if", "end"]
    );
    assert_eq!(
        kinds("foreach (x : items) { total += x }\ntotal"),
        vec!["foreach", "end", "property"]
    );
    assert_eq!(kinds("do { i++ } until (i > 3)"), vec!["do", "end"]);
    assert_eq!(kinds("with (obj) { a = 1, b = 2 }"), vec!["with", "end"]);
}

#[test]
fn test_unary_forms() {
    assert_eq!(kinds("!done"), vec!["negation"]);
    assert_eq!(kinds("-x * 2"), vec!["sign", "operator", "literal"]);
    assert_eq!(kinds("isdef x"), vec!["isdef"]);
}

#[test]
fn test_function_and_proto_definitions() {
    assert_eq!(
        kinds("def add(a, b) { a + b }; add(1, 2)"),
        vec!["function", "end", "property"]
    );
    assert_eq!(
        kinds("proto Point { int x; int y; }; new Point()"),
        vec!["proto", "end", "new"]
    );
}

#[test]
fn test_unbalanced_delimiters() {
    let err = scan("foo(1, 2").unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::Unbalanced(_)), "{err:?}");
    let err = scan("'open").unwrap_err();
    assert!(matches!(err.kind, ParseErrorKind::UnterminatedString), "{err:?}");
}

#[test]
fn test_parentheses_inside_strings_do_not_close() {
    assert_eq!(kinds("foo(')', '(')"), vec!["property"]);
}
