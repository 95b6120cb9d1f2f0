//! Fused scanner and node builder.
//!
//! There is no token stream. The scanner walks the shared character buffer and
//! yields one [`Node`] per call to [`Scanner::next_node`]. Nested spans (call
//! arguments, block bodies, sub-expressions, the right-hand side of an assignment)
//! are compiled on the spot through [`compiler::compile_span`], against the same
//! [`ParserContext`] as the enclosing statement.
//!
//! Statements are separated by `;`. A newline also ends a statement when the next
//! line starts with an operand.

mod blocks;
pub mod capture;
pub mod chain;

use std::collections::VecDeque;

use tracing::trace;

use crate::ast::{
    AssignMode, AssignTarget, Assignment, Chain, InlineCollection, Node, NodeKind, Op,
    Projection, Span, Ty,
};
use crate::compiler;
use crate::context::{Binding, Import, ParserContext};
use crate::error::{ParseError, ParseErrorKind};
use crate::value::Value;

use capture::{
    capture_balanced, find_assignment, find_word, has_map_separator, is_ident_start,
    line_statement_end, map_separator, read_number, read_string, read_word, skip_whitespace,
    split_top_level, text, trim,
};
use chain::{AssignOp, assignment_at, capture_chain, capture_segments, parse_chain, parse_segments};

/// Words that start a statement construct.
pub const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "foreach", "for", "while", "until", "do", "with", "def", "function", "proto",
    "import", "return", "assert", "var",
];

/// Words that can never name a variable.
pub fn is_reserved(word: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&word)
        || matches!(word, "else" | "new" | "isdef" | "true" | "false" | "null" | "nil" | "this")
        || Op::from_word(word).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    /// At the start of a statement
    Start,
    Operand,
    Operator(Op),
    /// After a unary prefix; an operand must follow
    Unary(&'static str),
}

pub struct Scanner<'s> {
    chars: &'s [char],
    cursor: usize,
    end: usize,
    last: Last,
    /// End of the last emitted node
    token_end: usize,
    pending: VecDeque<Node>,
    /// Stop at the first statement boundary instead of scanning to `end`
    single_statement: bool,
    finished: bool,
}

impl<'s> Scanner<'s> {
    pub fn new(chars: &'s [char], start: usize, end: usize) -> Self {
        Scanner {
            chars,
            cursor: start,
            end: end.min(chars.len()),
            last: Last::Start,
            token_end: start,
            pending: VecDeque::new(),
            single_statement: false,
            finished: false,
        }
    }

    /// A scanner that stops before the first statement boundary.
    pub fn statement(chars: &'s [char], start: usize, end: usize) -> Self {
        Scanner {
            single_statement: true,
            ..Scanner::new(chars, start, end)
        }
    }

    /// End of the last node scanned.
    pub fn token_end(&self) -> usize {
        self.token_end
    }

    pub fn next_node(&mut self, ctx: &mut ParserContext) -> Result<Option<Node>, ParseError> {
        if let Some(node) = self.pending.pop_front() {
            return Ok(Some(node));
        }
        loop {
            if self.finished {
                return Ok(None);
            }
            self.cursor = skip_whitespace(self.chars, self.cursor, self.end);
            if self.cursor >= self.end {
                self.check_complete()?;
                return Ok(None);
            }

            let c = self.chars[self.cursor];
            if c == ';' {
                self.check_complete()?;
                if self.single_statement {
                    self.finished = true;
                    return Ok(None);
                }
                let at = self.cursor;
                self.cursor += 1;
                if self.last == Last::Operand {
                    self.last = Last::Start;
                    return Ok(Some(Node::new(NodeKind::EndOfStatement, Span::new(at, at + 1))));
                }
                continue;
            }

            if self.last == Last::Operand && self.newline_since_token() && self.starts_operand() {
                if self.single_statement {
                    self.finished = true;
                    return Ok(None);
                }
                self.last = Last::Start;
                let at = self.cursor;
                return Ok(Some(Node::new(NodeKind::EndOfStatement, Span::new(at, at))));
            }

            if self.last == Last::Start
                && let Some(line) = ctx.take_line_label(self.cursor)
            {
                let source = ctx.options().source_name.clone();
                let at = self.cursor;
                return Ok(Some(Node::new(NodeKind::LineLabel { line, source }, Span::new(at, at))));
            }

            let node = if self.last == Last::Operand {
                Some(self.scan_operator()?)
            } else {
                self.scan_operand(ctx)?
            };
            let Some(node) = node else {
                continue;
            };
            trace!(kind = node.kind.name(), start = node.span.start, end = node.span.end, "scanned node");
            return Ok(Some(node));
        }
    }

    fn check_complete(&self) -> Result<(), ParseError> {
        match self.last {
            Last::Operator(op) => Err(ParseError::new(
                ParseErrorKind::MissingOperand(op.lexeme().to_string()),
                self.cursor,
            )),
            Last::Unary(lexeme) => Err(ParseError::new(
                ParseErrorKind::MissingOperand(lexeme.to_string()),
                self.cursor,
            )),
            Last::Start | Last::Operand => Ok(()),
        }
    }

    fn newline_since_token(&self) -> bool {
        self.chars[self.token_end.min(self.cursor)..self.cursor].contains(&'\n')
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        let at = self.cursor + offset;
        (at < self.end).then(|| self.chars[at])
    }

    /// Whether the text at the cursor begins a new operand.
    fn starts_operand(&self) -> bool {
        let Some(c) = self.peek_char(0) else {
            return false;
        };
        if is_ident_start(c) {
            let word_end = read_word(self.chars, self.cursor, self.end);
            return Op::from_word(&text(self.chars, self.cursor, word_end)).is_none();
        }
        match c {
            '\'' | '"' | '(' | '[' | '{' => true,
            '!' => self.peek_char(1) != Some('='),
            '+' => self.peek_char(1) == Some('+'),
            '-' => self.peek_char(1) == Some('-'),
            c => c.is_ascii_digit(),
        }
    }

    fn operand(&mut self, kind: NodeKind, start: usize) -> Node {
        self.last = Last::Operand;
        self.token_end = self.cursor;
        Node::new(kind, Span::new(start, self.cursor))
    }

    /// Operand followed by a possible union (`(a).b`, `'x'.length()`, `[1, 2][0]`).
    fn operand_with_union(
        &mut self,
        ctx: &mut ParserContext,
        kind: NodeKind,
        start: usize,
    ) -> Result<Node, ParseError> {
        let node = self.operand(kind, start);
        let continues = match self.peek_char(0) {
            Some('[') => true,
            Some('.') => self
                .peek_char(1)
                .is_some_and(|c| is_ident_start(c) || c == '?' || c == '{'),
            _ => false,
        };
        if continues {
            let union_start = self.cursor;
            let union_end = capture_segments(self.chars, union_start, self.end)?;
            let segments = parse_segments(ctx, self.chars, union_start, union_end)?;
            self.cursor = union_end;
            self.token_end = union_end;
            self.pending
                .push_back(Node::new(NodeKind::Union(segments), Span::new(union_start, union_end)));
        }
        Ok(node)
    }

    /// Emit a block construct, which always ends its statement.
    fn block(&mut self, kind: NodeKind, start: usize) -> Node {
        self.last = Last::Start;
        self.token_end = self.cursor;
        if self.single_statement {
            self.finished = true;
        } else {
            self.pending
                .push_back(Node::new(NodeKind::EndOfStatement, Span::new(self.cursor, self.cursor)));
        }
        Node::new(kind, Span::new(start, self.cursor))
    }

    fn scan_operator(&mut self) -> Result<Node, ParseError> {
        let start = self.cursor;
        let c = self.chars[start];
        let expected = || {
            ParseError::new(ParseErrorKind::Expected("operator or ';'".to_string()), start)
        };

        let (op, len) = if is_ident_start(c) {
            let word_end = read_word(self.chars, start, self.end);
            let op = Op::from_word(&text(self.chars, start, word_end)).ok_or_else(expected)?;
            (op, word_end - start)
        } else {
            Op::match_symbol(&self.chars[start..self.end]).ok_or_else(expected)?
        };
        if op == Op::Projection {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedOperator(op.lexeme().to_string()),
                start,
            ));
        }
        self.cursor = start + len;
        self.last = Last::Operator(op);
        self.token_end = self.cursor;
        Ok(Node::new(NodeKind::Operator(op), Span::new(start, self.cursor)))
    }

    /// Scan an operand. `None` means the construct emitted no node (`import`).
    fn scan_operand(&mut self, ctx: &mut ParserContext) -> Result<Option<Node>, ParseError> {
        let start = self.cursor;
        if self.last == Last::Start && !self.starts_with_keyword() {
            if let Some(node) = self.scan_statement_projection(ctx)? {
                return Ok(Some(node));
            }
        }

        let c = self.chars[start];
        let node = match c {
            '\'' | '"' => {
                let (value, next) = read_string(self.chars, start, self.end)?;
                self.cursor = next;
                let node = self.operand_with_union(ctx, NodeKind::Literal(Value::Null), start)?;
                Node::literal_at(Value::String(value), node.span)
            }
            c if c.is_ascii_digit() => self.scan_number(start)?,
            '.' if self.peek_char(1).is_some_and(|d| d.is_ascii_digit()) => self.scan_number(start)?,
            '(' => self.scan_paren(ctx)?,
            '[' => self.scan_list(ctx)?,
            '{' => {
                let close = capture_balanced(self.chars, start, self.end)?;
                let items = self.compile_items(ctx, start + 1, close)?;
                self.cursor = close + 1;
                self.operand_with_union(
                    ctx,
                    NodeKind::InlineCollection(InlineCollection::Array(items)),
                    start,
                )?
            }
            '!' if self.peek_char(1) != Some('=') => {
                self.cursor += 1;
                let operand = self.scan_unary_operand(ctx, "!")?;
                self.operand(NodeKind::Negation(operand), start)
            }
            '-' if self.peek_char(1).is_some_and(|d| d.is_ascii_digit() || d == '.') => {
                self.scan_number(start)?
            }
            '+' | '-' if self.peek_char(1) == Some(c) => {
                self.cursor += 2;
                let op = if c == '+' { Op::Add } else { Op::Sub };
                self.scan_increment(ctx, start, op)?
            }
            '-' => {
                self.cursor += 1;
                let operand = self.scan_unary_operand(ctx, "-")?;
                self.operand(NodeKind::Sign(operand), start)
            }
            '+' => {
                self.cursor += 1;
                self.last = Last::Unary("+");
                self.cursor = skip_whitespace(self.chars, self.cursor, self.end);
                if self.cursor >= self.end {
                    self.check_complete()?;
                }
                return self.scan_operand(ctx);
            }
            c if is_ident_start(c) => return self.scan_word(ctx),
            c => {
                return Err(match Op::match_symbol(&self.chars[start..self.end]) {
                    Some((op, _)) => ParseError::new(
                        ParseErrorKind::UnexpectedOperator(op.lexeme().to_string()),
                        start,
                    ),
                    None => ParseError::new(ParseErrorKind::UnexpectedCharacter(c), start),
                });
            }
        };
        Ok(Some(node))
    }

    fn literal(&mut self, value: Value, start: usize) -> Node {
        self.last = Last::Operand;
        self.token_end = self.cursor;
        Node::literal_at(value, Span::new(start, self.cursor))
    }

    fn scan_number(&mut self, start: usize) -> Result<Node, ParseError> {
        let (value, next) = read_number(self.chars, start, self.end)?;
        self.cursor = next;
        Ok(self.literal(value, start))
    }

    /// The single operand of a unary prefix, including any union that follows it,
    /// compiled into its own chain.
    fn scan_unary_operand(
        &mut self,
        ctx: &mut ParserContext,
        lexeme: &'static str,
    ) -> Result<Chain, ParseError> {
        self.last = Last::Unary(lexeme);
        self.cursor = skip_whitespace(self.chars, self.cursor, self.end);
        if self.cursor >= self.end || self.chars[self.cursor] == ';' {
            self.check_complete()?;
        }
        let Some(node) = self.scan_operand(ctx)? else {
            return Err(ParseError::new(
                ParseErrorKind::MissingOperand(lexeme.to_string()),
                self.cursor,
            ));
        };
        let mut nodes = vec![node];
        nodes.extend(self.pending.drain(..));
        Ok(compiler::compile_nodes(ctx, nodes))
    }

    fn scan_increment(
        &mut self,
        ctx: &mut ParserContext,
        start: usize,
        op: Op,
    ) -> Result<Node, ParseError> {
        let target_start = skip_whitespace(self.chars, self.cursor, self.end);
        if target_start >= self.end || !is_ident_start(self.chars[target_start]) {
            return Err(ParseError::new(
                ParseErrorKind::MissingOperand(if op == Op::Add { "++" } else { "--" }.to_string()),
                target_start,
            ));
        }
        let target_end = capture_chain(self.chars, target_start, self.end)?;
        let target = self.parse_target(ctx, target_start, target_end)?;
        self.cursor = target_end;
        let assignment = Assignment {
            target,
            op: Some(op),
            value: None,
            declared: None,
            mode: AssignMode::Prefix,
            text: text(self.chars, start, target_end).into(),
        };
        Ok(self.operand(NodeKind::Assignment(assignment), start))
    }

    fn starts_with_keyword(&self) -> bool {
        let word_end = read_word(self.chars, self.cursor, self.end);
        STATEMENT_KEYWORDS.contains(&text(self.chars, self.cursor, word_end).as_str())
    }

    /// `item in collection` as a whole statement.
    fn scan_statement_projection(
        &mut self,
        ctx: &mut ParserContext,
    ) -> Result<Option<Node>, ParseError> {
        let start = self.cursor;
        let stmt_end = line_statement_end(self.chars, start, self.end)?;
        let Some(in_pos) = find_word(self.chars, start, stmt_end, "in")? else {
            return Ok(None);
        };
        if find_assignment(self.chars, start, in_pos)?.is_some() {
            return Ok(None);
        }
        let projection = self.compile_projection(ctx, start, in_pos, stmt_end)?;
        self.cursor = trim(self.chars, start, stmt_end).1;
        Ok(Some(self.operand(NodeKind::Projection(projection), start)))
    }

    fn compile_projection(
        &mut self,
        ctx: &mut ParserContext,
        start: usize,
        in_pos: usize,
        end: usize,
    ) -> Result<Projection, ParseError> {
        ctx.enter_projection();
        let item = self.compile_required(ctx, start, in_pos, "projection item");
        ctx.exit_projection();
        let item = item?;
        let collection = self.compile_required(ctx, in_pos + 2, end, "collection after 'in'")?;
        Ok(Projection { item, collection })
    }

    /// Compile `start..end`, failing when it holds no expression.
    fn compile_required(
        &self,
        ctx: &mut ParserContext,
        start: usize,
        end: usize,
        what: &str,
    ) -> Result<Chain, ParseError> {
        let (s, e) = trim(self.chars, start, end);
        if s == e {
            return Err(ParseError::new(ParseErrorKind::Expected(what.to_string()), start));
        }
        compiler::compile_span(ctx, self.chars, s, e)
    }

    /// Comma-separated items of an inline collection or argument list.
    fn compile_items(
        &self,
        ctx: &mut ParserContext,
        open: usize,
        close: usize,
    ) -> Result<Vec<Chain>, ParseError> {
        split_top_level(self.chars, open, close, ',')?
            .into_iter()
            .map(|(s, e)| compiler::compile_span(ctx, self.chars, s, e))
            .collect()
    }

    /// Compile the rest of a statement starting at `start` and move past it.
    fn compile_rest(
        &mut self,
        ctx: &mut ParserContext,
        start: usize,
        what: &str,
    ) -> Result<Chain, ParseError> {
        let (chain, stop) = compiler::compile_statement(ctx, self.chars, start, self.end)?;
        if chain.is_empty() {
            return Err(ParseError::new(ParseErrorKind::Expected(what.to_string()), start));
        }
        self.cursor = stop;
        Ok(chain)
    }

    fn scan_paren(&mut self, ctx: &mut ParserContext) -> Result<Node, ParseError> {
        let open = self.cursor;
        let close = capture_balanced(self.chars, open, self.end)?;
        let (s, e) = trim(self.chars, open + 1, close);
        if s == e {
            return Err(ParseError::new(
                ParseErrorKind::Expected("expression inside '()'".to_string()),
                open,
            ));
        }

        if let Some(ty) = self.cast_type(ctx, s, e, close) {
            self.cursor = skip_whitespace(self.chars, close + 1, self.end);
            let operand = self.scan_unary_operand(ctx, ")")?;
            return Ok(self.operand(NodeKind::TypeCast { ty, operand }, open));
        }

        if let Some(in_pos) = find_word(self.chars, s, e, "in")?
            && find_assignment(self.chars, s, in_pos)?.is_none()
        {
            let projection = self.compile_projection(ctx, s, in_pos, e)?;
            self.cursor = close + 1;
            return self.operand_with_union(ctx, NodeKind::Projection(projection), open);
        }

        let chain = compiler::compile_span(ctx, self.chars, s, e)?;
        self.cursor = close + 1;
        self.operand_with_union(ctx, NodeKind::Substatement(chain), open)
    }

    /// `(Type) operand`: the content is a lone type name and an operand follows.
    fn cast_type(&self, ctx: &ParserContext, s: usize, e: usize, close: usize) -> Option<Ty> {
        if !is_ident_start(self.chars[s]) || read_word(self.chars, s, e) != e {
            return None;
        }
        let name = text(self.chars, s, e);
        if matches!(ctx.lookup(&name), Some(Binding::Variable(_) | Binding::Input(_))) {
            return None;
        }
        let ty = ctx.resolve_type(&name)?;
        let after = skip_whitespace(self.chars, close + 1, self.end);
        let next = self.chars.get(after).copied().filter(|_| after < self.end)?;
        let operand_follows = match next {
            '\'' | '"' | '(' => true,
            c if c.is_ascii_digit() => true,
            c if is_ident_start(c) => {
                let word_end = read_word(self.chars, after, self.end);
                Op::from_word(&text(self.chars, after, word_end)).is_none()
            }
            _ => false,
        };
        operand_follows.then_some(ty)
    }

    fn scan_list(&mut self, ctx: &mut ParserContext) -> Result<Node, ParseError> {
        let open = self.cursor;
        let close = capture_balanced(self.chars, open, self.end)?;
        let (s, e) = trim(self.chars, open + 1, close);

        let collection = if e == s + 1 && self.chars[s] == ':' {
            InlineCollection::Map(Vec::new())
        } else if has_map_separator(self.chars, s, e)? {
            let mut entries = Vec::new();
            for (es, ee) in split_top_level(self.chars, s, e, ',')? {
                let sep = map_separator(self.chars, es, ee)?.ok_or_else(|| {
                    ParseError::new(ParseErrorKind::Expected("':' in map entry".to_string()), es)
                })?;
                let key = self.compile_required(ctx, es, sep, "map key")?;
                let value = self.compile_required(ctx, sep + 1, ee, "map value")?;
                entries.push((key, value));
            }
            InlineCollection::Map(entries)
        } else {
            InlineCollection::List(self.compile_items(ctx, s, e)?)
        };
        self.cursor = close + 1;
        self.operand_with_union(ctx, NodeKind::InlineCollection(collection), open)
    }

    fn scan_word(&mut self, ctx: &mut ParserContext) -> Result<Option<Node>, ParseError> {
        let start = self.cursor;
        let word_end = read_word(self.chars, start, self.end);
        let word = text(self.chars, start, word_end);

        let literal = match word.as_str() {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            "null" | "nil" => Some(Value::Null),
            _ => None,
        };
        if let Some(value) = literal {
            self.cursor = word_end;
            return Ok(Some(self.literal(value, start)));
        }

        match word.as_str() {
            "new" => return self.scan_new(ctx, start, word_end).map(Some),
            "isdef" => return self.scan_isdef(start, word_end).map(Some),
            w if STATEMENT_KEYWORDS.contains(&w) => {
                if self.last != Last::Start {
                    return Err(ParseError::new(ParseErrorKind::ReservedWord(word), start));
                }
                return self.scan_keyword(ctx, &word, start, word_end);
            }
            "else" => return Err(ParseError::new(ParseErrorKind::ReservedWord(word), start)),
            w if Op::from_word(w).is_some() => {
                return Err(ParseError::new(ParseErrorKind::ReservedWord(word), start));
            }
            _ => {}
        }

        if self.last == Last::Start
            && let Some(node) = self.scan_typed_declaration(ctx, &word, start, word_end)?
        {
            return Ok(Some(node));
        }

        let chain_end = capture_chain(self.chars, start, self.end)?;
        let op_pos = skip_whitespace(self.chars, chain_end, self.end);
        match assignment_at(self.chars, op_pos, self.end) {
            Some(AssignOp::Assign(op, len)) => {
                let target = self.parse_target(ctx, start, chain_end)?;
                let value = self.compile_rest(ctx, op_pos + len, "expression after assignment")?;
                let assignment = Assignment {
                    target,
                    op,
                    value: Some(value),
                    declared: None,
                    mode: AssignMode::Assign,
                    text: text(self.chars, start, self.cursor).into(),
                };
                Ok(Some(self.operand(NodeKind::Assignment(assignment), start)))
            }
            Some(AssignOp::Increment(op)) => {
                let target = self.parse_target(ctx, start, chain_end)?;
                self.cursor = op_pos + 2;
                let assignment = Assignment {
                    target,
                    op: Some(op),
                    value: None,
                    declared: None,
                    mode: AssignMode::Postfix,
                    text: text(self.chars, start, self.cursor).into(),
                };
                Ok(Some(self.operand(NodeKind::Assignment(assignment), start)))
            }
            None => {
                let chain = parse_chain(ctx, self.chars, start, chain_end)?;
                self.cursor = chain_end;
                Ok(Some(self.operand(NodeKind::Property(chain), start)))
            }
        }
    }

    fn parse_target(
        &self,
        ctx: &mut ParserContext,
        start: usize,
        end: usize,
    ) -> Result<AssignTarget, ParseError> {
        let word_end = read_word(self.chars, start, end);
        let word = text(self.chars, start, word_end);
        if is_reserved(&word) {
            return Err(ParseError::new(ParseErrorKind::ReservedWord(word), start));
        }
        if word_end == end {
            return Ok(AssignTarget::Variable(word));
        }
        Ok(AssignTarget::Property(parse_chain(ctx, self.chars, start, end)?))
    }

    /// `Type name = expr`, `Type name;` and `Type[] name = expr`.
    fn scan_typed_declaration(
        &mut self,
        ctx: &mut ParserContext,
        word: &str,
        start: usize,
        word_end: usize,
    ) -> Result<Option<Node>, ParseError> {
        if matches!(
            ctx.lookup(word),
            Some(Binding::Variable(_) | Binding::Input(_) | Binding::Function(_))
                | Some(Binding::Import(Import::Static { .. }))
        ) {
            return Ok(None);
        }
        let Some(mut ty) = ctx.resolve_type(word) else {
            return Ok(None);
        };
        let mut pos = word_end;
        if self.chars.get(pos) == Some(&'[') && self.chars.get(pos + 1) == Some(&']') && pos + 1 < self.end {
            ty = Ty::Array;
            pos += 2;
        }
        let name_start = skip_whitespace(self.chars, pos, self.end);
        if name_start == pos || name_start >= self.end || !is_ident_start(self.chars[name_start]) {
            return Ok(None);
        }
        let name_end = read_word(self.chars, name_start, self.end);
        let name = text(self.chars, name_start, name_end);
        if Op::from_word(&name).is_some() {
            return Ok(None);
        }
        if is_reserved(&name) {
            return Err(ParseError::new(ParseErrorKind::ReservedWord(name), name_start));
        }
        self.declaration(ctx, start, name, name_end, Some(ty)).map(Some)
    }

    /// The tail of a declaration once its name is known: `= expr` or nothing.
    fn declaration(
        &mut self,
        ctx: &mut ParserContext,
        start: usize,
        name: String,
        name_end: usize,
        ty: Option<Ty>,
    ) -> Result<Node, ParseError> {
        let op_pos = skip_whitespace(self.chars, name_end, self.end);
        if let Some(AssignOp::Assign(None, 1)) = assignment_at(self.chars, op_pos, self.end) {
            let value = self.compile_rest(ctx, op_pos + 1, "expression after '='")?;
            let assignment = Assignment {
                target: AssignTarget::Variable(name),
                op: None,
                value: Some(value),
                declared: ty,
                mode: AssignMode::Declare,
                text: text(self.chars, start, self.cursor).into(),
            };
            return Ok(self.operand(NodeKind::Assignment(assignment), start));
        }
        let at_boundary = op_pos >= self.end
            || self.chars[op_pos] == ';'
            || self.chars[name_end..op_pos].contains(&'\n');
        if !at_boundary {
            return Err(ParseError::new(
                ParseErrorKind::Expected("'=' or ';' after declaration".to_string()),
                op_pos,
            ));
        }
        self.cursor = name_end;
        Ok(self.operand(
            NodeKind::Declaration {
                name,
                ty: ty.unwrap_or(Ty::Object),
            },
            start,
        ))
    }

    fn scan_isdef(&mut self, start: usize, word_end: usize) -> Result<Node, ParseError> {
        let mut pos = skip_whitespace(self.chars, word_end, self.end);
        let parenthesized = self.chars.get(pos) == Some(&'(') && pos < self.end;
        if parenthesized {
            pos = skip_whitespace(self.chars, pos + 1, self.end);
        }
        if pos >= self.end || !is_ident_start(self.chars[pos]) {
            return Err(ParseError::new(
                ParseErrorKind::Expected("a name after 'isdef'".to_string()),
                pos,
            ));
        }
        let name_end = read_word(self.chars, pos, self.end);
        let name = text(self.chars, pos, name_end);
        self.cursor = name_end;
        if parenthesized {
            let close = skip_whitespace(self.chars, name_end, self.end);
            if self.chars.get(close) != Some(&')') || close >= self.end {
                return Err(ParseError::new(ParseErrorKind::Unbalanced('('), pos));
            }
            self.cursor = close + 1;
        }
        Ok(self.operand(NodeKind::IsDef(name), start))
    }

    /// A possibly qualified type name (`util.HashMap`) starting at `start`.
    fn read_type_name(&self, start: usize) -> (String, usize) {
        let mut end = read_word(self.chars, start, self.end);
        while end + 1 < self.end && self.chars[end] == '.' && is_ident_start(self.chars[end + 1]) {
            end = read_word(self.chars, end + 1, self.end);
        }
        (text(self.chars, start, end), end)
    }
}
