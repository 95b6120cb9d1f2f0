//! Type verification of freshly scanned nodes.
//!
//! Each node is verified as soon as the scanner emits it: roots are resolved
//! against the [`ParserContext`], unknown names become inputs, declarations are
//! recorded and every node gets an egress type where one can be determined.

use crate::ast::{
    AssignMode, AssignTarget, Assignment, Chain, ChainRoot, ChainSegment, InlineCollection, Node,
    NodeKind, Op, PropertyChain, Span, Ty,
};
use crate::context::{Binding, Import, ParserContext};
use crate::operations::{can_convert, coerce_lossless};

pub(super) fn verify(ctx: &mut ParserContext, node: &mut Node) {
    let span = node.span;
    let egress = match &node.kind {
        NodeKind::Literal(value) => value.ty(),
        NodeKind::Property(chain) => verify_chain(ctx, chain, span),
        NodeKind::Assignment(assignment) => verify_assignment(ctx, assignment, span),
        NodeKind::Declaration { name, ty } => {
            check_redeclaration(ctx, name, ty, span);
            ctx.bind_scoped(name, Some(ty.clone()));
            None
        }
        NodeKind::With(block) => block.target.egress().cloned(),
        NodeKind::Substatement(chain) | NodeKind::Return(chain) => chain.egress().cloned(),
        NodeKind::InlineCollection(InlineCollection::List(_)) | NodeKind::Projection(_) => {
            Some(Ty::List)
        }
        NodeKind::InlineCollection(InlineCollection::Array(_)) => Some(Ty::Array),
        NodeKind::InlineCollection(InlineCollection::Map(_)) => Some(Ty::Map),
        NodeKind::TypeCast { ty, operand } => {
            if ctx.options().strict_typing
                && let Some(value) = operand.literal()
                && !can_convert(value, ty)
            {
                ctx.error(format!("cannot cast {} to {ty}", value.type_name()), span);
            }
            Some(ty.clone())
        }
        NodeKind::Negation(operand) => {
            if ctx.options().strict_typing
                && let Some(ty) = operand.egress()
                && *ty != Ty::Boolean
                && *ty != Ty::Object
            {
                ctx.error(format!("'!' requires a Boolean operand, got {ty}"), span);
            }
            Some(Ty::Boolean)
        }
        NodeKind::Sign(operand) => operand.egress().filter(|ty| ty.is_numeric()).cloned(),
        NodeKind::RegexMatch(_) | NodeKind::Assert(_) | NodeKind::IsDef(_) => Some(Ty::Boolean),
        NodeKind::New(new) if new.array => Some(Ty::Array),
        NodeKind::New(new) => Some(new.ty.clone()),
        NodeKind::FunctionDef(_) => Some(Ty::Function),
        NodeKind::ProtoDef(_) => Some(Ty::Class),
        NodeKind::Union(_)
        | NodeKind::Operator(_)
        | NodeKind::If(_)
        | NodeKind::ForEach(_)
        | NodeKind::For(_)
        | NodeKind::While(_)
        | NodeKind::DoWhile(_)
        | NodeKind::LineLabel { .. }
        | NodeKind::EndOfStatement => None,
    };
    node.egress = egress;
}

/// Report an unresolvable member: fatal under strict typing, a warning otherwise.
fn unresolved_member(ctx: &mut ParserContext, message: String, span: Span) {
    if ctx.options().strict_typing {
        ctx.error(message, span);
    } else {
        ctx.warn(message, span);
    }
}

fn verify_chain(ctx: &mut ParserContext, chain: &PropertyChain, span: Span) -> Option<Ty> {
    match &chain.root {
        ChainRoot::This => None,
        ChainRoot::Type(ty) => verify_static(ctx, ty, &chain.segments, span),
        ChainRoot::Call { name, args } => {
            match ctx.lookup(name) {
                Some(Binding::Function(func)) => {
                    if func.arity() != args.len() {
                        ctx.error(
                            format!(
                                "'{name}' expects {} arguments, got {}",
                                func.arity(),
                                args.len()
                            ),
                            span,
                        );
                    }
                }
                Some(_) => {}
                None => {
                    if ctx.options().strict_typing && !ctx.in_projection() {
                        ctx.error(format!("unknown function '{name}'"), span);
                    }
                    ctx.declare_input(name, None);
                }
            }
            walk_segments(ctx, None, &chain.segments, span)
        }
        ChainRoot::Identifier(name) => {
            let root = match ctx.lookup(name) {
                Some(Binding::Variable(ty) | Binding::Input(ty)) => ty,
                Some(Binding::Function(_)) => Some(Ty::Function),
                Some(Binding::Proto(_) | Binding::Import(Import::Type(_))) => Some(Ty::Class),
                Some(Binding::Import(Import::Static { .. })) => None,
                None => {
                    if let Some((ty, consumed)) = chain.qualified_static() {
                        return verify_static(ctx, &ty, &chain.segments[consumed..], span);
                    }
                    if ctx.options().strict_typing && !ctx.in_projection() {
                        ctx.error(format!("unqualified type in strict mode for: {name}"), span);
                    }
                    ctx.declare_input(name, None);
                    None
                }
            };
            walk_segments(ctx, root, &chain.segments, span)
        }
    }
}

/// A chain rooted at a type: the first segment is a static member.
fn verify_static(ctx: &mut ParserContext, ty: &Ty, segments: &[ChainSegment], span: Span) -> Option<Ty> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(Ty::Class);
    };
    let member = match first {
        ChainSegment::Property { name, .. } => match ty.property_type(name) {
            Some(member) => member,
            None => {
                unresolved_member(ctx, format!("unknown static field '{name}' on {ty}"), span);
                return None;
            }
        },
        ChainSegment::Method { name, .. } => match ty.method_type(name) {
            Some(member) => member,
            None => {
                unresolved_member(ctx, format!("unknown static method '{name}' on {ty}"), span);
                return None;
            }
        },
        ChainSegment::Index(_) | ChainSegment::With(_) => None,
    };
    walk_segments(ctx, member, rest, span)
}

fn walk_segments(
    ctx: &mut ParserContext,
    root: Option<Ty>,
    segments: &[ChainSegment],
    span: Span,
) -> Option<Ty> {
    let mut current = root;
    for segment in segments {
        let Some(ty) = current.take() else {
            return None;
        };
        current = match (segment, &ty) {
            (ChainSegment::With(_), _) => Some(ty.clone()),
            (ChainSegment::Index(_), _) | (_, Ty::Object) => None,
            (ChainSegment::Property { name, .. }, Ty::Proto(proto)) => {
                match ctx.proto(proto).map(|p| p.field(name).map(|f| f.ty.clone())) {
                    Some(Some(field)) => field,
                    Some(None) => {
                        unresolved_member(ctx, format!("unknown field '{name}' on {ty}"), span);
                        None
                    }
                    None => None,
                }
            }
            (ChainSegment::Method { name, .. }, Ty::Proto(proto)) => {
                let known = ctx.proto(proto).is_none_or(|p| p.method(name).is_some());
                if !known && ty.method_type(name).is_none() {
                    unresolved_member(ctx, format!("unknown method '{name}' on {ty}"), span);
                }
                None
            }
            (ChainSegment::Property { name, .. }, _) => match ty.property_type(name) {
                Some(member) => member,
                None => {
                    unresolved_member(ctx, format!("unknown property '{name}' on {ty}"), span);
                    None
                }
            },
            (ChainSegment::Method { name, .. }, _) => match ty.method_type(name) {
                Some(member) => member,
                None => {
                    unresolved_member(ctx, format!("unknown method '{name}' on {ty}"), span);
                    None
                }
            },
        };
    }
    current
}

fn check_redeclaration(ctx: &mut ParserContext, name: &str, declared: &Ty, span: Span) {
    if let Some(Binding::Variable(Some(existing)) | Binding::Input(Some(existing))) =
        ctx.lookup(name)
        && existing != *declared
        && !existing.is_assignable_from(declared)
    {
        ctx.error(
            format!("'{name}' is already declared as {existing}, cannot redeclare as {declared}"),
            span,
        );
    }
}

/// Strict-mode check that `value` fits a slot of type `target`.
fn check_assignable(ctx: &mut ParserContext, target: &Ty, value: Option<&Chain>, span: Span) {
    if !ctx.options().strict_typing {
        return;
    }
    let Some(value) = value else {
        return;
    };
    let Some(source) = value.egress() else {
        return;
    };
    if target.is_assignable_from(source) {
        return;
    }
    if value.literal().is_some_and(|lit| coerce_lossless(lit, target).is_some()) {
        return;
    }
    ctx.error(format!("cannot assign {source} to {target}"), span);
}

fn verify_assignment(ctx: &mut ParserContext, assignment: &Assignment, span: Span) -> Option<Ty> {
    let value_ty = assignment.value.as_ref().and_then(|v| v.egress().cloned());
    let name = match &assignment.target {
        AssignTarget::Property(chain) => {
            let target = verify_chain(ctx, chain, span);
            if let Some(target) = &target
                && assignment.op.is_none()
            {
                check_assignable(ctx, target, assignment.value.as_ref(), span);
            }
            return target.or(value_ty);
        }
        AssignTarget::Variable(name) => name,
    };

    match (assignment.mode, assignment.op) {
        (AssignMode::Declare, _) => {
            let ty = assignment.declared.clone().or(value_ty);
            if let Some(declared) = &assignment.declared {
                check_redeclaration(ctx, name, declared, span);
                check_assignable(ctx, declared, assignment.value.as_ref(), span);
            }
            ctx.bind_scoped(name, ty.clone());
            ty
        }
        (AssignMode::Assign, None) => match ctx.lookup(name) {
            Some(Binding::Variable(Some(existing)) | Binding::Input(Some(existing))) => {
                check_assignable(ctx, &existing, assignment.value.as_ref(), span);
                Some(existing)
            }
            Some(Binding::Variable(None) | Binding::Input(None)) => value_ty,
            Some(Binding::Function(_) | Binding::Proto(_) | Binding::Import(_)) => {
                ctx.error(format!("cannot assign to '{name}'"), span);
                None
            }
            None => {
                ctx.declare_variable(name, value_ty.clone());
                value_ty
            }
        },
        // compound assignments and increments read the name first
        _ => match ctx.lookup(name) {
            Some(Binding::Variable(ty) | Binding::Input(ty)) => ty,
            Some(_) => {
                ctx.error(format!("cannot assign to '{name}'"), span);
                None
            }
            None => {
                if ctx.options().strict_typing && !ctx.in_projection() {
                    ctx.error(format!("unqualified type in strict mode for: {name}"), span);
                }
                ctx.declare_input(name, None);
                None
            }
        },
    }
}

/// Egress of a chain: the type of its last statement.
pub(super) fn chain_egress(nodes: &[Node]) -> Option<Ty> {
    let statement: Vec<&Node> = nodes
        .rsplit(|n| matches!(n.kind, NodeKind::EndOfStatement))
        .find(|s| s.iter().any(|n| !matches!(n.kind, NodeKind::LineLabel { .. })))?
        .iter()
        .filter(|n| !matches!(n.kind, NodeKind::LineLabel { .. }))
        .collect();
    statement_type(&statement)
}

fn statement_type(nodes: &[&Node]) -> Option<Ty> {
    if nodes.iter().any(|n| matches!(n.kind, NodeKind::Union(_))) {
        return None;
    }
    let ops: Vec<Op> = nodes.iter().filter_map(|n| n.operator()).collect();
    let operands: Vec<Option<&Ty>> = nodes
        .iter()
        .filter(|n| n.is_operand())
        .map(|n| n.egress.as_ref())
        .collect();
    if ops.is_empty() {
        return operands.first().copied().flatten().cloned();
    }
    if ops.contains(&Op::Ternary) {
        return None;
    }

    // the loosest operator, rightmost among equals, is reduced last
    let last = ops
        .iter()
        .copied()
        .rev()
        .min_by_key(|op| op.precedence())?;
    if last.is_boolean() {
        return Some(Ty::Boolean);
    }
    match last {
        Op::StrAppend => Some(Ty::String),
        Op::BitAnd | Op::BitOr | Op::BitXor | Op::Shl | Op::Shr | Op::UShr | Op::UShl => {
            Some(Ty::Integer)
        }
        Op::Similarity => Some(Ty::Double),
        Op::Add | Op::Sub | Op::Mul | Op::Mod => {
            let known: Option<Vec<&Ty>> = operands.into_iter().collect();
            let known = known?;
            if last == Op::Add && known.iter().any(|ty| **ty == Ty::String) {
                return Some(Ty::String);
            }
            known
                .iter()
                .skip(1)
                .try_fold(known.first().copied()?.clone(), |acc, ty| acc.widen(ty))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileOptions;
    use crate::value::Value;

    fn lit(value: Value) -> Node {
        Node::literal_at(value, Span::default())
    }

    fn op(op: Op) -> Node {
        Node::new(NodeKind::Operator(op), Span::default())
    }

    #[test]
    fn test_statement_egress() {
        let nodes = vec![lit(Value::Integer(1)), op(Op::Add), lit(Value::Long(2))];
        assert_eq!(chain_egress(&nodes), Some(Ty::Long));

        let nodes = vec![lit(Value::Integer(1)), op(Op::Lt), lit(Value::Long(2))];
        assert_eq!(chain_egress(&nodes), Some(Ty::Boolean));

        let nodes = vec![lit(Value::from("a")), op(Op::Add), lit(Value::Integer(2))];
        assert_eq!(chain_egress(&nodes), Some(Ty::String));
    }

    #[test]
    fn test_egress_of_last_statement() {
        let nodes = vec![
            lit(Value::Integer(1)),
            Node::new(NodeKind::EndOfStatement, Span::default()),
            lit(Value::from("x")),
        ];
        assert_eq!(chain_egress(&nodes), Some(Ty::String));
    }

    #[test]
    fn test_unknown_identifier_becomes_input() {
        let mut ctx = ParserContext::default();
        let chain = PropertyChain {
            root: ChainRoot::Identifier("foo".to_string()),
            segments: vec![],
            text: "foo".into(),
        };
        assert_eq!(verify_chain(&mut ctx, &chain, Span::default()), None);
        assert!(ctx.inputs().contains_key("foo"));
    }

    #[test]
    fn test_strict_unknown_identifier_is_fatal() {
        let mut ctx = ParserContext::new(CompileOptions::default().with_strict_typing(true));
        ctx.set_source(&"foo".chars().collect::<Vec<_>>());
        let chain = PropertyChain {
            root: ChainRoot::Identifier("foo".to_string()),
            segments: vec![],
            text: "foo".into(),
        };
        verify_chain(&mut ctx, &chain, Span::new(0, 3));
        assert!(ctx.has_errors());
    }

    #[test]
    fn test_qualified_static_reference() {
        let mut ctx = ParserContext::default();
        let chain = PropertyChain {
            root: ChainRoot::Identifier("lang".to_string()),
            segments: vec![
                ChainSegment::Property {
                    name: "Math".to_string(),
                    null_safe: false,
                },
                ChainSegment::Property {
                    name: "PI".to_string(),
                    null_safe: false,
                },
            ],
            text: "lang.Math.PI".into(),
        };
        assert_eq!(verify_chain(&mut ctx, &chain, Span::default()), Some(Ty::Double));
        assert!(ctx.inputs().is_empty());
    }
}
