use std::sync::Arc;

use regex::Regex;

use super::{Function, Op, Proto, Ty};
use crate::accessor::AccessorCache;
use crate::value::Value;

/// Absolute character range of a node in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A compiled, forward-only sequence of nodes.
///
/// Node `i` is followed by node `i + 1`; nested blocks own their own chains. A
/// chain is never mutated after compilation: folding and rewrites build a new
/// node vector instead of patching nodes in place.
#[derive(Debug, Default)]
pub struct Chain {
    nodes: Vec<Node>,
    egress: Option<Ty>,
}

impl Chain {
    pub fn new(nodes: Vec<Node>) -> Self {
        Chain {
            nodes,
            egress: None,
        }
    }

    pub(crate) fn with_egress(mut self, egress: Option<Ty>) -> Self {
        self.egress = egress;
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Result type of the chain's last statement, when known at compile time.
    pub fn egress(&self) -> Option<&Ty> {
        self.egress.as_ref()
    }

    /// The value of a chain that consists of a single literal.
    pub fn literal(&self) -> Option<&Value> {
        let mut meaningful = self
            .nodes
            .iter()
            .filter(|n| !matches!(n.kind, NodeKind::LineLabel { .. } | NodeKind::EndOfStatement));
        match (meaningful.next(), meaningful.next()) {
            (Some(node), None) => node.literal(),
            _ => None,
        }
    }
}

/// One element of a compiled chain.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Result type assigned by the verifier; `None` means dynamic.
    pub egress: Option<Ty>,
    pub(crate) accessor: AccessorCache,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Node {
            kind,
            span,
            egress: None,
            accessor: AccessorCache::default(),
        }
    }

    pub fn literal_at(value: Value, span: Span) -> Self {
        let egress = value.ty();
        Node {
            egress,
            ..Node::new(NodeKind::Literal(value), span)
        }
    }

    pub fn literal(&self) -> Option<&Value> {
        match &self.kind {
            NodeKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Op> {
        match self.kind {
            NodeKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Whether this node produces a value in operand position.
    pub fn is_operand(&self) -> bool {
        !matches!(
            self.kind,
            NodeKind::Operator(_)
                | NodeKind::Union(_)
                | NodeKind::LineLabel { .. }
                | NodeKind::EndOfStatement
        )
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Literal(Value),
    Property(PropertyChain),
    /// Continuation of the previous operand (`(a).b`, `[1, 2][0]`)
    Union(Vec<ChainSegment>),
    Operator(Op),
    Assignment(Assignment),
    /// `Type name;` without an initialiser
    Declaration { name: String, ty: Ty },
    If(IfBlock),
    ForEach(ForEachBlock),
    For(ForBlock),
    While(WhileBlock),
    DoWhile(WhileBlock),
    With(WithBlock),
    Substatement(Chain),
    InlineCollection(InlineCollection),
    TypeCast { ty: Ty, operand: Chain },
    /// Boolean `!`
    Negation(Chain),
    /// Arithmetic `-`
    Sign(Chain),
    RegexMatch(RegexMatch),
    Projection(Projection),
    New(NewObject),
    FunctionDef(Arc<Function>),
    ProtoDef(Arc<Proto>),
    Return(Chain),
    Assert(Chain),
    IsDef(String),
    /// Debug marker emitted before the first node of each source line
    LineLabel { line: usize, source: Arc<str> },
    EndOfStatement,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal(_) => "literal",
            NodeKind::Property(_) => "property",
            NodeKind::Union(_) => "union",
            NodeKind::Operator(_) => "operator",
            NodeKind::Assignment(_) => "assignment",
            NodeKind::Declaration { .. } => "declaration",
            NodeKind::If(_) => "if",
            NodeKind::ForEach(_) => "foreach",
            NodeKind::For(_) => "for",
            NodeKind::While(_) => "while",
            NodeKind::DoWhile(_) => "do",
            NodeKind::With(_) => "with",
            NodeKind::Substatement(_) => "substatement",
            NodeKind::InlineCollection(_) => "collection",
            NodeKind::TypeCast { .. } => "cast",
            NodeKind::Negation(_) => "negation",
            NodeKind::Sign(_) => "sign",
            NodeKind::RegexMatch(_) => "regex",
            NodeKind::Projection(_) => "projection",
            NodeKind::New(_) => "new",
            NodeKind::FunctionDef(_) => "function",
            NodeKind::ProtoDef(_) => "proto",
            NodeKind::Return(_) => "return",
            NodeKind::Assert(_) => "assert",
            NodeKind::IsDef(_) => "isdef",
            NodeKind::LineLabel { .. } => "line",
            NodeKind::EndOfStatement => "end",
        }
    }
}

/// `root.segment[...].method(..)`
#[derive(Debug)]
pub struct PropertyChain {
    pub root: ChainRoot,
    pub segments: Vec<ChainSegment>,
    /// Source text of the whole chain
    pub text: Arc<str>,
}

impl PropertyChain {
    pub fn root_name(&self) -> Option<&str> {
        match &self.root {
            ChainRoot::Identifier(name) | ChainRoot::Call { name, .. } => Some(name),
            ChainRoot::Type(_) | ChainRoot::This => None,
        }
    }

    /// `a.b.c` as the dotted names `["a", "b", "c"]`, stopping at the first
    /// segment that is not a plain property.
    pub fn dotted_prefix(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let ChainRoot::Identifier(name) = &self.root {
            names.push(name.as_str());
            for segment in &self.segments {
                match segment {
                    ChainSegment::Property { name, .. } => names.push(name),
                    _ => break,
                }
            }
        }
        names
    }

    /// Longest dotted prefix naming a qualified builtin type (`lang.Math.abs`),
    /// with the number of property segments it spans.
    pub fn qualified_static(&self) -> Option<(Ty, usize)> {
        let prefix = self.dotted_prefix();
        (2..=prefix.len())
            .rev()
            .find_map(|len| Ty::qualified(&prefix[..len].join(".")).map(|ty| (ty, len - 1)))
    }
}

#[derive(Debug)]
pub enum ChainRoot {
    Identifier(String),
    /// Call of a function or static import: `name(args)`
    Call { name: String, args: Vec<Chain> },
    /// A type known at compile time (builtin, imported or a proto)
    Type(Ty),
    This,
}

#[derive(Debug)]
pub enum ChainSegment {
    /// `.name`, or `.?name` when `null_safe`
    Property { name: String, null_safe: bool },
    Index(Chain),
    Method {
        name: String,
        args: Vec<Chain>,
        null_safe: bool,
    },
    /// Inline-with block `.{ a = 1, b = 2 }`
    With(Vec<WithAssignment>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignMode {
    /// `x = v`, `x += v`
    Assign,
    /// `var x = v`, `Type x = v`: binds in the innermost scope
    Declare,
    /// `++x`: yields the updated value
    Prefix,
    /// `x++`: yields the previous value
    Postfix,
}

#[derive(Debug)]
pub struct Assignment {
    pub target: AssignTarget,
    /// Operator of a compound assignment or increment
    pub op: Option<Op>,
    /// Right-hand side; absent for `++`/`--`
    pub value: Option<Chain>,
    pub declared: Option<Ty>,
    pub mode: AssignMode,
    pub text: Arc<str>,
}

#[derive(Debug)]
pub enum AssignTarget {
    Variable(String),
    /// Write through the last segment of a chain (`a.b = 1`, `m['k'] = 2`)
    Property(PropertyChain),
}

impl AssignTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            AssignTarget::Variable(name) => Some(name),
            AssignTarget::Property(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct IfBlock {
    /// `None` for a trailing `else`
    pub condition: Option<Chain>,
    pub body: Chain,
    pub otherwise: Option<Box<IfBlock>>,
}

#[derive(Debug)]
pub struct ForEachBlock {
    pub item: String,
    pub item_ty: Option<Ty>,
    pub collection: Chain,
    pub body: Chain,
}

#[derive(Debug)]
pub struct ForBlock {
    pub init: Chain,
    pub condition: Option<Chain>,
    pub step: Chain,
    pub body: Chain,
}

/// `while`, `until`, `do..while` and `do..until`
#[derive(Debug)]
pub struct WhileBlock {
    pub condition: Chain,
    pub body: Chain,
    /// Loop while the condition is false
    pub until: bool,
}

#[derive(Debug)]
pub struct WithBlock {
    pub target: Chain,
    pub assignments: Vec<WithAssignment>,
}

/// `path = value` inside a with block; the path is relative to the with target.
#[derive(Debug)]
pub struct WithAssignment {
    pub path: Vec<ChainSegment>,
    pub op: Option<Op>,
    pub value: Chain,
    pub text: Arc<str>,
}

#[derive(Debug)]
pub enum InlineCollection {
    List(Vec<Chain>),
    Array(Vec<Chain>),
    Map(Vec<(Chain, Chain)>),
}

/// `subject ~= 'literal pattern'` with the pattern compiled once.
#[derive(Debug)]
pub struct RegexMatch {
    pub subject: Chain,
    pub pattern: Arc<Regex>,
}

/// `(expr in collection)`
#[derive(Debug)]
pub struct Projection {
    pub item: Chain,
    pub collection: Chain,
}

#[derive(Debug)]
pub struct NewObject {
    pub ty: Ty,
    pub args: Vec<Chain>,
    /// `new int[n]` style array allocation
    pub array: bool,
}
