//! Statement constructs: control blocks, definitions, imports.

use std::{collections::HashMap, sync::Arc};

use super::capture::{
    capture_balanced, find_char, find_word, is_ident_start, line_statement_end, read_word,
    skip_whitespace, split_top_level, statement_end, text, trim,
};
use super::chain::parse_with_assignments;
use super::{Scanner, is_reserved};
use crate::ast::{
    Chain, ForBlock, ForEachBlock, Function, IfBlock, InlineCollection, NewObject, Node, NodeKind,
    Param, Proto, ProtoField, Span, Ty, WhileBlock, WithBlock,
};
use crate::compiler;
use crate::context::ParserContext;
use crate::error::{ParseError, ParseErrorKind};

fn expected(what: impl Into<String>, at: usize) -> ParseError {
    ParseError::new(ParseErrorKind::Expected(what.into()), at)
}

/// Run `f` with a fresh compile-time scope pushed.
fn scoped<T>(
    ctx: &mut ParserContext,
    captures_declarations: bool,
    f: impl FnOnce(&mut ParserContext) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    ctx.push_scope(captures_declarations);
    let result = f(ctx);
    ctx.pop_scope();
    result
}

impl Scanner<'_> {
    pub(super) fn scan_keyword(
        &mut self,
        ctx: &mut ParserContext,
        word: &str,
        start: usize,
        word_end: usize,
    ) -> Result<Option<Node>, ParseError> {
        self.cursor = word_end;
        let kind = match word {
            "if" => NodeKind::If(self.scan_if(ctx)?),
            "foreach" => self.scan_for(ctx, false)?,
            "for" => self.scan_for(ctx, true)?,
            "while" => NodeKind::While(self.scan_while(ctx, false)?),
            "until" => NodeKind::While(self.scan_while(ctx, true)?),
            "do" => NodeKind::DoWhile(self.scan_do(ctx)?),
            "with" => {
                let target = self.condition(ctx, "with")?;
                let open = skip_whitespace(self.chars, self.cursor, self.end);
                if open >= self.end || self.chars[open] != '{' {
                    return Err(expected("'{' after with target", open));
                }
                let close = capture_balanced(self.chars, open, self.end)?;
                let assignments = parse_with_assignments(ctx, self.chars, open + 1, close)?;
                self.cursor = close + 1;
                NodeKind::With(WithBlock {
                    target,
                    assignments,
                })
            }
            "def" | "function" => {
                let func = self.scan_function(ctx)?;
                ctx.declare_function(func.clone());
                NodeKind::FunctionDef(func)
            }
            "proto" => NodeKind::ProtoDef(self.scan_proto(ctx)?),
            "import" => {
                self.scan_import(ctx, start)?;
                return Ok(None);
            }
            "return" => {
                let value = self.statement_value(ctx)?;
                return Ok(Some(self.operand(NodeKind::Return(value), start)));
            }
            "assert" => {
                let pos = self.cursor;
                let value = self.statement_value(ctx)?;
                if value.is_empty() {
                    return Err(expected("expression after 'assert'", pos));
                }
                return Ok(Some(self.operand(NodeKind::Assert(value), start)));
            }
            "var" => {
                let name_start = skip_whitespace(self.chars, self.cursor, self.end);
                if name_start >= self.end || !is_ident_start(self.chars[name_start]) {
                    return Err(expected("a name after 'var'", name_start));
                }
                let name_end = read_word(self.chars, name_start, self.end);
                let name = text(self.chars, name_start, name_end);
                if is_reserved(&name) {
                    return Err(ParseError::new(ParseErrorKind::ReservedWord(name), name_start));
                }
                return self.declaration(ctx, start, name, name_end, None).map(Some);
            }
            other => return Err(ParseError::new(ParseErrorKind::ReservedWord(other.to_string()), start)),
        };
        Ok(Some(self.block(kind, start)))
    }

    /// Rest of the statement as a value, possibly empty (`return;`).
    fn statement_value(&mut self, ctx: &mut ParserContext) -> Result<Chain, ParseError> {
        let (chain, stop) = compiler::compile_statement(ctx, self.chars, self.cursor, self.end)?;
        if !chain.is_empty() {
            self.cursor = stop;
        }
        Ok(chain)
    }

    /// Span of a parenthesized header, moving past it.
    fn header(&mut self, keyword: &str) -> Result<(usize, usize), ParseError> {
        let open = skip_whitespace(self.chars, self.cursor, self.end);
        if open >= self.end || self.chars[open] != '(' {
            return Err(expected(format!("'(' after '{keyword}'"), open));
        }
        let close = capture_balanced(self.chars, open, self.end)?;
        self.cursor = close + 1;
        Ok(trim(self.chars, open + 1, close))
    }

    fn condition(&mut self, ctx: &mut ParserContext, keyword: &str) -> Result<Chain, ParseError> {
        let (s, e) = self.header(keyword)?;
        if s == e {
            return Err(expected(format!("condition for '{keyword}'"), s));
        }
        compiler::compile_span(ctx, self.chars, s, e)
    }

    /// Span of a block body: braced, or a single statement up to `;` or the end
    /// of the line. Moves past it.
    fn body_range(&mut self) -> Result<(usize, usize), ParseError> {
        let open = skip_whitespace(self.chars, self.cursor, self.end);
        if open < self.end && self.chars[open] == '{' {
            let close = capture_balanced(self.chars, open, self.end)?;
            self.cursor = close + 1;
            return Ok((open + 1, close));
        }
        let body_end = line_statement_end(self.chars, open, self.end)?;
        self.cursor = if body_end < self.end && self.chars[body_end] == ';' {
            body_end + 1
        } else {
            body_end
        };
        Ok((open, body_end))
    }

    fn body(&mut self, ctx: &mut ParserContext) -> Result<Chain, ParseError> {
        let (s, e) = self.body_range()?;
        compiler::compile_span(ctx, self.chars, s, e)
    }

    /// The word at `pos` when it is exactly `word`.
    fn word_at(&self, pos: usize, word: &str) -> bool {
        let end = read_word(self.chars, pos, self.end);
        end > pos && text(self.chars, pos, end) == word
    }

    fn scan_if(&mut self, ctx: &mut ParserContext) -> Result<IfBlock, ParseError> {
        let condition = self.condition(ctx, "if")?;
        let body = self.body(ctx)?;

        let after = skip_whitespace(self.chars, self.cursor, self.end);
        let otherwise = if self.word_at(after, "else") {
            let next = skip_whitespace(self.chars, after + 4, self.end);
            if self.word_at(next, "if") {
                self.cursor = next + 2;
                Some(Box::new(self.scan_if(ctx)?))
            } else {
                self.cursor = after + 4;
                Some(Box::new(IfBlock {
                    condition: None,
                    body: self.body(ctx)?,
                    otherwise: None,
                }))
            }
        } else {
            None
        };
        Ok(IfBlock {
            condition: Some(condition),
            body,
            otherwise,
        })
    }

    /// `foreach (item : coll)`, `for (Type item : coll)` or `for (init; cond; step)`.
    fn scan_for(&mut self, ctx: &mut ParserContext, classic: bool) -> Result<NodeKind, ParseError> {
        let keyword = if classic { "for" } else { "foreach" };
        let (s, e) = self.header(keyword)?;

        if classic && let Some(first) = find_char(self.chars, s, e, ';')? {
            let second = find_char(self.chars, first + 1, e, ';')?
                .ok_or_else(|| expected("';' in for header", e))?;
            let chars = self.chars;
            let (body_start, body_end) = self.body_range()?;
            return scoped(ctx, false, |ctx| {
                let init = compiler::compile_span(ctx, chars, s, first)?;
                let condition = compiler::compile_span(ctx, chars, first + 1, second)?;
                let step = compiler::compile_span(ctx, chars, second + 1, e)?;
                let body = compiler::compile_span(ctx, chars, body_start, body_end)?;
                Ok(NodeKind::For(ForBlock {
                    init,
                    condition: (!condition.is_empty()).then_some(condition),
                    step,
                    body,
                }))
            });
        }

        let (sep, sep_len) = match find_char(self.chars, s, e, ':')? {
            Some(colon) => (colon, 1),
            None => (
                find_word(self.chars, s, e, "in")?
                    .ok_or_else(|| expected(format!("'item : collection' in {keyword} header"), s))?,
                2,
            ),
        };
        let declared: Vec<String> = split_words(self.chars, s, sep);
        let (item_ty, item) = match declared.as_slice() {
            [item] => (None, item.clone()),
            [ty, item] if ty == "var" => (None, item.clone()),
            [ty, item] => (
                Some(
                    ctx.resolve_type(ty)
                        .ok_or_else(|| expected(format!("a known type, found '{ty}'"), s))?,
                ),
                item.clone(),
            ),
            _ => return Err(expected("a loop variable", s)),
        };
        if is_reserved(&item) {
            return Err(ParseError::new(ParseErrorKind::ReservedWord(item), s));
        }

        let (cs, ce) = trim(self.chars, sep + sep_len, e);
        if cs == ce {
            return Err(expected("a collection", sep));
        }
        let collection = compiler::compile_span(ctx, self.chars, cs, ce)?;
        let chars = self.chars;
        let (body_start, body_end) = self.body_range()?;
        let body = scoped(ctx, false, |ctx| {
            ctx.bind_scoped(&item, item_ty.clone());
            compiler::compile_span(ctx, chars, body_start, body_end)
        })?;
        Ok(NodeKind::ForEach(ForEachBlock {
            item,
            item_ty,
            collection,
            body,
        }))
    }

    fn scan_while(&mut self, ctx: &mut ParserContext, until: bool) -> Result<WhileBlock, ParseError> {
        let condition = self.condition(ctx, if until { "until" } else { "while" })?;
        let body = self.body(ctx)?;
        Ok(WhileBlock {
            condition,
            body,
            until,
        })
    }

    fn scan_do(&mut self, ctx: &mut ParserContext) -> Result<WhileBlock, ParseError> {
        let open = skip_whitespace(self.chars, self.cursor, self.end);
        if open >= self.end || self.chars[open] != '{' {
            return Err(expected("'{' after 'do'", open));
        }
        let body = self.body(ctx)?;
        let after = skip_whitespace(self.chars, self.cursor, self.end);
        let until = if self.word_at(after, "while") {
            false
        } else if self.word_at(after, "until") {
            true
        } else {
            return Err(expected("'while' or 'until' after do block", after));
        };
        self.cursor = after + 5;
        let condition = self.condition(ctx, if until { "until" } else { "while" })?;
        Ok(WhileBlock {
            condition,
            body,
            until,
        })
    }

    /// `name(params) { body }`, cursor just after `def`/`function`.
    fn scan_function(&mut self, ctx: &mut ParserContext) -> Result<Arc<Function>, ParseError> {
        let name_start = skip_whitespace(self.chars, self.cursor, self.end);
        if name_start >= self.end || !is_ident_start(self.chars[name_start]) {
            return Err(expected("a function name", name_start));
        }
        let name_end = read_word(self.chars, name_start, self.end);
        let name = text(self.chars, name_start, name_end);
        if is_reserved(&name) {
            return Err(ParseError::new(ParseErrorKind::ReservedWord(name), name_start));
        }
        self.cursor = name_end;
        let (ps, pe) = self.header(&name)?;

        let mut params = Vec::new();
        for (s, e) in split_top_level(self.chars, ps, pe, ',')? {
            let words = split_words(self.chars, s, e);
            let param = match words.as_slice() {
                [name] => Param {
                    name: name.clone(),
                    ty: None,
                },
                [ty, name] => Param {
                    name: name.clone(),
                    ty: Some(
                        ctx.resolve_type(ty)
                            .ok_or_else(|| expected(format!("a known type, found '{ty}'"), s))?,
                    ),
                },
                _ => return Err(expected("a parameter name", s)),
            };
            if is_reserved(&param.name) {
                return Err(ParseError::new(ParseErrorKind::ReservedWord(param.name), s));
            }
            params.push(param);
        }

        let open = skip_whitespace(self.chars, self.cursor, self.end);
        if open >= self.end || self.chars[open] != '{' {
            return Err(expected("'{' before function body", open));
        }
        let chars = self.chars;
        let (body_start, body_end) = self.body_range()?;
        let body = scoped(ctx, true, |ctx| {
            ctx.bind_scoped(&name, Some(Ty::Function));
            for param in &params {
                ctx.bind_scoped(&param.name, param.ty.clone());
            }
            compiler::compile_span(ctx, chars, body_start, body_end)
        })?;
        Ok(Arc::new(Function { name, params, body }))
    }

    /// `Name { Type field = init; def method() { .. } }`, cursor just after `proto`.
    fn scan_proto(&mut self, ctx: &mut ParserContext) -> Result<Arc<Proto>, ParseError> {
        let name_start = skip_whitespace(self.chars, self.cursor, self.end);
        if name_start >= self.end || !is_ident_start(self.chars[name_start]) {
            return Err(expected("a proto name", name_start));
        }
        let name_end = read_word(self.chars, name_start, self.end);
        let name = text(self.chars, name_start, name_end);
        let open = skip_whitespace(self.chars, name_end, self.end);
        if open >= self.end || self.chars[open] != '{' {
            return Err(expected("'{' after proto name", open));
        }
        let close = capture_balanced(self.chars, open, self.end)?;

        // first pass: member spans
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut pos = open + 1;
        loop {
            pos = skip_whitespace(self.chars, pos, close);
            while pos < close && self.chars[pos] == ';' {
                pos = skip_whitespace(self.chars, pos + 1, close);
            }
            if pos >= close {
                break;
            }
            if self.word_at(pos, "def") || self.word_at(pos, "function") {
                let params = self.chars[pos..close]
                    .iter()
                    .position(|c| *c == '(')
                    .map(|i| pos + i)
                    .ok_or_else(|| expected("'(' after method name", pos))?;
                let params_close = capture_balanced(self.chars, params, close)?;
                let body_open = skip_whitespace(self.chars, params_close + 1, close);
                if body_open >= close || self.chars[body_open] != '{' {
                    return Err(expected("'{' before method body", body_open));
                }
                let body_close = capture_balanced(self.chars, body_open, close)?;
                methods.push((read_word(self.chars, pos, close), body_close + 1));
                pos = body_close + 1;
            } else {
                let member_end = statement_end(self.chars, pos, close)?;
                fields.push((pos, member_end));
                pos = member_end;
            }
        }

        let chars = self.chars;
        let proto_fields = scoped(ctx, false, |ctx| {
            let mut parsed = Vec::new();
            for (s, e) in fields {
                let (decl_end, init) = match find_char(chars, s, e, '=')? {
                    Some(eq) => (eq, Some(compiler::compile_span(ctx, chars, eq + 1, e)?)),
                    None => (e, None),
                };
                let words = split_words(chars, s, decl_end);
                let (ty, field) = match words.as_slice() {
                    [ty, field] if ty == "var" => (None, field.clone()),
                    [ty, field] => (
                        Some(
                            ctx.resolve_type(ty)
                                .ok_or_else(|| expected(format!("a known type, found '{ty}'"), s))?,
                        ),
                        field.clone(),
                    ),
                    [field] => (None, field.clone()),
                    _ => return Err(expected("a field declaration", s)),
                };
                ctx.bind_scoped(&field, ty.clone());
                parsed.push(ProtoField {
                    name: field,
                    ty,
                    init,
                });
            }
            Ok(parsed)
        });
        let proto_fields = proto_fields?;

        let saved_end = self.end;
        let mut proto_methods = HashMap::new();
        ctx.push_scope(false);
        for field in &proto_fields {
            ctx.bind_scoped(&field.name, field.ty.clone());
        }
        let mut result = Ok(());
        for (keyword_end, method_end) in methods {
            self.cursor = keyword_end;
            self.end = method_end;
            match self.scan_function(ctx) {
                Ok(method) => {
                    proto_methods.insert(method.name.clone(), method);
                }
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        ctx.pop_scope();
        self.end = saved_end;
        result?;

        self.cursor = close + 1;
        let proto = Arc::new(Proto {
            name: Arc::from(name.as_str()),
            fields: proto_fields,
            methods: proto_methods,
        });
        ctx.declare_proto(proto.clone());
        Ok(proto)
    }

    fn scan_import(&mut self, ctx: &mut ParserContext, start: usize) -> Result<(), ParseError> {
        let mut pos = skip_whitespace(self.chars, self.cursor, self.end);
        let is_static = self.word_at(pos, "static");
        if is_static {
            pos = skip_whitespace(self.chars, pos + 6, self.end);
        }
        if pos >= self.end || !is_ident_start(self.chars[pos]) {
            return Err(expected("a qualified name after 'import'", pos));
        }
        let (name, name_end) = self.read_type_name(pos);
        self.cursor = name_end;
        if !ctx.import_qualified(&name, is_static) {
            ctx.error(format!("unknown import '{name}'"), Span::new(start, name_end));
        }
        Ok(())
    }

    /// `new Type(args)`, `new Type[n]` or `new Type[] { items }`.
    pub(super) fn scan_new(
        &mut self,
        ctx: &mut ParserContext,
        start: usize,
        word_end: usize,
    ) -> Result<Node, ParseError> {
        let type_start = skip_whitespace(self.chars, word_end, self.end);
        if type_start >= self.end || !is_ident_start(self.chars[type_start]) {
            return Err(expected("a type after 'new'", type_start));
        }
        let (name, type_end) = self.read_type_name(type_start);
        let ty = ctx
            .resolve_type(&name)
            .ok_or_else(|| expected(format!("a known type after 'new', found '{name}'"), type_start))?;

        let open = type_end;
        let kind = match self.chars.get(open).filter(|_| open < self.end) {
            Some('(') => {
                let close = capture_balanced(self.chars, open, self.end)?;
                let args = self.compile_items(ctx, open + 1, close)?;
                self.cursor = close + 1;
                NodeKind::New(NewObject {
                    ty,
                    args,
                    array: false,
                })
            }
            Some('[') => {
                let close = capture_balanced(self.chars, open, self.end)?;
                let (s, e) = trim(self.chars, open + 1, close);
                if s == e {
                    let brace = skip_whitespace(self.chars, close + 1, self.end);
                    if brace >= self.end || self.chars[brace] != '{' {
                        return Err(expected("'{' after array type", brace));
                    }
                    let brace_close = capture_balanced(self.chars, brace, self.end)?;
                    let items = self.compile_items(ctx, brace + 1, brace_close)?;
                    self.cursor = brace_close + 1;
                    NodeKind::InlineCollection(InlineCollection::Array(items))
                } else {
                    let size = compiler::compile_span(ctx, self.chars, s, e)?;
                    self.cursor = close + 1;
                    NodeKind::New(NewObject {
                        ty,
                        args: vec![size],
                        array: true,
                    })
                }
            }
            _ => return Err(expected(format!("'(' or '[' after 'new {name}'"), open)),
        };

        self.operand_with_union(ctx, kind, start)
    }
}

/// Whitespace-separated identifiers of `start..end` (`int a`, `var x`).
fn split_words(chars: &[char], start: usize, end: usize) -> Vec<String> {
    let (s, e) = trim(chars, start, end);
    text(chars, s, e).split_whitespace().map(str::to_string).collect()
}
