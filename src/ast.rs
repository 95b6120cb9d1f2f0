//! # Mace - Node Model
//!
//! The node representation shared by the scanner, compiler and interpreter.
//!
//! ## Architecture Overview
//!
//! - **[node]** - Chains, nodes and the per-construct payloads
//! - **[operators]** - Binary operators and the precedence table
//! - **[types]** - Static types and the builtin type registry
//! - **[function]** - User-defined functions and protos
//!
//! ## Chains, not trees
//!
//! The scanner emits a flat sequence of nodes for every statement list:
//!
//! ```text
//! x = 10; x * 2 + 1
//! ```
//!
//! becomes `Assignment(x), EndOfStatement, Property(x), Operator(*), Literal(2),
//! Operator(+), Literal(1)`. Operators are not nested into a tree; the precedence
//! resolver reduces each run at compile time (literal folding) or at run time.
//! Control blocks, sub-expressions and call arguments own nested [`Chain`]s.
//!
//! ## Types
//!
//! Every node may carry an egress [`Ty`] assigned by the verifier. `None` means the
//! type is only known at run time.

pub mod function;
pub mod node;
pub mod operators;
pub mod types;

pub use function::{Function, Param, Proto, ProtoField};
pub use node::{
    AssignMode, AssignTarget, Assignment, Chain, ChainRoot, ChainSegment, ForBlock,
    ForEachBlock, IfBlock, InlineCollection, NewObject, Node, NodeKind, Projection,
    PropertyChain, RegexMatch, Span, WhileBlock, WithAssignment, WithBlock,
};
pub use operators::{COMPOUND_ASSIGNMENTS, Op};
pub use types::Ty;
