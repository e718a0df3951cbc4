//! The evaluator (§4.D): drives a token stream against a hierarchical
//! variable environment, executing conditionals, loops and file-inclusion
//! tags, and appending literal/resolved text to an output buffer.
//!
//! Values handed back by identifier resolution are owned clones rather than
//! the source implementation's raw pointers into a `var_stack`/`op_stack`
//! scratchpad — container variants (`Array`/`Object`) are `Rc`-backed, so a
//! clone is cheap and there is no scratchpad lifetime to manage. The
//! right-to-left expression fold (§4.D.3) is still implemented exactly as
//! specified, just over a local `Vec` rather than a shared stack field.

use std::rc::Rc;

use crate::error::{ErrorKind, FmtError};
use crate::filecache::FileCache;
use crate::token::{Token, TokenKind};
use crate::value::{ArrayData, ObjectData, TokenList, Value};

/// Where a resolved identifier's value actually lives, so `:` assignment
/// can write back into it. `None` for synthesized values (`xs.end`, a
/// slice) that have no backing storage to assign into.
enum Place {
    Object(ObjectData, String),
    ArrayIndex(ArrayData, usize),
}

impl Place {
    fn set(&self, value: Value) {
        match self {
            Place::Object(object, key) => {
                object.borrow_mut().insert(key.clone(), value);
            }
            Place::ArrayIndex(array, index) => {
                array.borrow_mut()[*index] = value;
            }
        }
    }
}

/// One render of a single template body against one environment. Owns the
/// file-inclusion cache for the duration of the render and accumulates
/// whether any error was reported; `render` is the only entry point and
/// resets both before walking the token stream.
pub struct RenderContext<'a> {
    root_env: Value,
    cache: &'a mut FileCache,
    had_error: bool,
}

impl<'a> RenderContext<'a> {
    fn error(&mut self, content: &str, kind: ErrorKind, index: usize, message: impl Into<String>) {
        self.had_error = true;
        FmtError::new(kind, index, message).report(content);
    }

    fn root_object(&self) -> ObjectData {
        match &self.root_env {
            Value::Object(object) => object.clone(),
            _ => unreachable!("root environment is always an object"),
        }
    }

    /// §4.D top-level token walk: `RawString` is appended verbatim, `FmtStart`
    /// dispatches into a tag, anything else is an error.
    fn eval_tokens(&mut self, content: &str, tokens: &[Token], out: &mut String) {
        let mut cursor = 0;
        while cursor < tokens.len() {
            match tokens[cursor].kind {
                TokenKind::RawString => {
                    out.push_str(tokens[cursor].text(content));
                    cursor += 1;
                }
                TokenKind::FmtStart => {
                    cursor = self.eval_tag(content, tokens, cursor + 1, out);
                }
                other => {
                    self.error(
                        content,
                        ErrorKind::UnexpectedToken,
                        tokens[cursor].index,
                        format!("unexpected {} at template level", other.name()),
                    );
                    cursor += 1;
                }
            }
        }
    }

    /// §4.D.2: dispatches on the token right after `FmtStart` and returns
    /// the cursor positioned just past the matching `FmtEnd`.
    fn eval_tag(&mut self, content: &str, tokens: &[Token], cursor: usize, out: &mut String) -> usize {
        let Some(lead) = tokens.get(cursor) else {
            self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
            return cursor;
        };

        match lead.kind {
            TokenKind::Identifier => self.eval_identifier_tag(content, tokens, cursor, out),
            TokenKind::If => {
                let (body, next) = self.decision_tree(content, tokens, cursor + 1);
                if let Some(body) = body {
                    self.eval_tokens(content, &body, out);
                }
                self.expect_fmt_end(content, tokens, next)
            }
            TokenKind::For => self.eval_for(content, tokens, cursor + 1, out),
            TokenKind::File => {
                let (value, next) = self.load_file_value(content, tokens, cursor + 1);
                if let Value::TokenList(list) = value {
                    self.eval_tokens(&list.content, &list.tokens, out);
                }
                self.expect_fmt_end(content, tokens, next)
            }
            other => {
                self.error(
                    content,
                    ErrorKind::UnexpectedToken,
                    lead.index,
                    format!("unexpected {} at start of tag", other.name()),
                );
                self.skip_to_fmt_end(tokens, cursor)
            }
        }
    }

    /// An `Identifier` right after `FmtStart` is either an emit (`<$ x $>`)
    /// or an assignment (`<$ x : ... $>`).
    fn eval_identifier_tag(&mut self, content: &str, tokens: &[Token], cursor: usize, out: &mut String) -> usize {
        let (value, place, cursor) = self.resolve_identifier(content, tokens, cursor);

        match tokens.get(cursor).map(|t| t.kind) {
            Some(TokenKind::FmtEnd) => {
                self.emit_value(content, &value, tokens[cursor].index, out);
                cursor + 1
            }
            Some(TokenKind::Colon) => {
                let cursor = self.eval_assignment(content, tokens, cursor + 1, place);
                self.expect_fmt_end(content, tokens, cursor)
            }
            Some(other) => {
                self.error(
                    content,
                    ErrorKind::UnexpectedToken,
                    tokens[cursor].index,
                    format!("expected '$>' or ':' after identifier, found {}", other.name()),
                );
                self.skip_to_fmt_end(tokens, cursor)
            }
            None => {
                self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
                cursor
            }
        }
    }

    fn emit_value(&mut self, content: &str, value: &Value, index: usize, out: &mut String) {
        match value {
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int64(i) => out.push_str(&i.to_string()),
            Value::String(s) => out.push_str(s),
            Value::TokenList(list) => {
                let content = list.content.clone();
                let tokens = list.tokens.clone();
                self.eval_tokens(&content, &tokens, out)
            }
            Value::None => self.error(content, ErrorKind::UnknownVariable, index, "variable doesn't exist"),
            Value::Array(_) | Value::Object(_) => {
                self.error(content, ErrorKind::TypeMismatch, index, format!("a {} cannot be formatted", value.type_name()))
            }
        }
    }

    /// §4.D.2 assignment RHS. `place` is `None` when the resolved identifier
    /// was a synthesized value (e.g. `xs.end`), which cannot be assigned to.
    fn eval_assignment(&mut self, content: &str, tokens: &[Token], cursor: usize, place: Option<Place>) -> usize {
        let Some(rhs) = tokens.get(cursor) else {
            self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
            return cursor;
        };

        let (value, cursor) = match rhs.kind {
            TokenKind::String => (Value::String(Rc::from(rhs.text(content))), cursor + 1),
            TokenKind::Integer => (Value::Int64(rhs.as_int().unwrap_or(0)), cursor + 1),
            TokenKind::Boolean => (Value::Bool(rhs.as_bool().unwrap_or(false)), cursor + 1),
            TokenKind::TokenList => {
                let body = rhs.tokens().expect("TokenList token always carries tokens").clone();
                (
                    Value::TokenList(TokenList {
                        content: Rc::from(content),
                        tokens: body,
                    }),
                    cursor + 1,
                )
            }
            TokenKind::Identifier => {
                let (value, _, next) = self.resolve_identifier(content, tokens, cursor);
                (value, next)
            }
            TokenKind::File => self.load_file_value(content, tokens, cursor + 1),
            other => {
                self.error(
                    content,
                    ErrorKind::UnexpectedToken,
                    rhs.index,
                    format!("expected an assignable value, found {}", other.name()),
                );
                (Value::None, cursor + 1)
            }
        };

        match place {
            Some(place) => place.set(value),
            None => self.error(content, ErrorKind::TypeMismatch, rhs.index, "left-hand side is not assignable"),
        }

        cursor
    }

    /// §4.D.1 identifier + member-access chain resolution, always starting
    /// from the root environment. Returns the resolved value, the place it
    /// can be assigned back into (if any), and the cursor just past the
    /// chain.
    fn resolve_identifier(&mut self, content: &str, tokens: &[Token], cursor: usize) -> (Value, Option<Place>, usize) {
        let Some(name_tok) = tokens.get(cursor) else {
            self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
            return (Value::None, None, cursor);
        };
        if name_tok.kind != TokenKind::Identifier {
            self.error(
                content,
                ErrorKind::UnexpectedToken,
                name_tok.index,
                format!("expected an identifier, found {}", name_tok.kind.name()),
            );
            return (Value::None, None, cursor + 1);
        }

        let name = name_tok.text(content).to_string();
        let root = self.root_object();
        let value = {
            let mut root_mut = root.borrow_mut();
            root_mut.entry(name.clone()).or_insert(Value::None).clone()
        };

        let mut current = value;
        let mut place = Some(Place::Object(root, name));
        let mut cursor = cursor + 1;

        loop {
            match tokens.get(cursor).map(|t| t.kind) {
                Some(TokenKind::Dot) => {
                    let Some(member_tok) = tokens.get(cursor + 1) else {
                        self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
                        return (current, place, cursor + 1);
                    };
                    if member_tok.kind != TokenKind::Identifier {
                        self.error(
                            content,
                            ErrorKind::UnexpectedToken,
                            member_tok.index,
                            format!("expected a member name, found {}", member_tok.kind.name()),
                        );
                        return (current, place, cursor + 1);
                    }
                    let member = member_tok.text(content);

                    match &current {
                        Value::Object(object) => {
                            let next = {
                                let mut object_mut = object.borrow_mut();
                                object_mut.entry(member.to_string()).or_insert(Value::None).clone()
                            };
                            place = Some(Place::Object(object.clone(), member.to_string()));
                            current = next;
                            cursor += 2;
                        }
                        Value::Array(array) if member == "end" => {
                            let last = array.borrow().len() as i64 - 1;
                            current = Value::Int64(last);
                            place = None;
                            cursor += 2;
                        }
                        _ => {
                            self.error(
                                content,
                                ErrorKind::TypeMismatch,
                                member_tok.index,
                                format!("'.{member}' is not valid on a {}", current.type_name()),
                            );
                            return (Value::None, None, cursor + 2);
                        }
                    }
                }
                Some(TokenKind::BracketOpen) => {
                    let Value::Array(array) = &current else {
                        self.error(
                            content,
                            ErrorKind::TypeMismatch,
                            tokens[cursor].index,
                            format!("'[' is not valid on a {}", current.type_name()),
                        );
                        return (Value::None, None, cursor);
                    };
                    let array = array.clone();
                    let len = array.borrow().len();

                    let Some((first, next)) = self.resolve_index(content, tokens, cursor + 1) else {
                        return (Value::None, None, cursor + 1);
                    };
                    cursor = next;

                    match tokens.get(cursor).map(|t| t.kind) {
                        Some(TokenKind::Comma) => {
                            let Some((second, next)) = self.resolve_index(content, tokens, cursor + 1) else {
                                return (Value::None, None, cursor + 1);
                            };
                            cursor = next;

                            let bracket_index = tokens.get(cursor).map(|t| t.index).unwrap_or(content.len());
                            if !(0 <= first && first <= second && (second as usize) < len) {
                                self.error(content, ErrorKind::OutOfBounds, bracket_index, format!("slice [{first}, {second}] is out of bounds for length {len}"));
                                return (Value::None, None, self.consume_bracket_close(tokens, cursor));
                            }
                            let slice = array.borrow()[first as usize..=second as usize].to_vec();
                            current = Value::array(slice);
                            place = None;
                        }
                        Some(TokenKind::BracketClose) => {
                            if !(0 <= first && (first as usize) < len) {
                                self.error(content, ErrorKind::OutOfBounds, tokens[cursor].index, format!("index {first} is out of bounds for length {len}"));
                                return (Value::None, None, cursor + 1);
                            }
                            current = array.borrow()[first as usize].clone();
                            place = Some(Place::ArrayIndex(array, first as usize));
                        }
                        _ => {
                            self.error(content, ErrorKind::UnexpectedToken, tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()), "expected ',' or ']'");
                            return (Value::None, None, cursor);
                        }
                    }

                    cursor = self.consume_bracket_close(tokens, cursor);
                }
                _ => break,
            }
        }

        (current, place, cursor)
    }

    fn consume_bracket_close(&mut self, tokens: &[Token], cursor: usize) -> usize {
        if tokens.get(cursor).map(|t| t.kind) == Some(TokenKind::BracketClose) {
            cursor + 1
        } else {
            cursor
        }
    }

    /// An index inside `[...]` is either an integer literal or an identifier
    /// resolving to `Int64`.
    fn resolve_index(&mut self, content: &str, tokens: &[Token], cursor: usize) -> Option<(i64, usize)> {
        match tokens.get(cursor).map(|t| t.kind) {
            Some(TokenKind::Integer) => Some((tokens[cursor].as_int().unwrap_or(0), cursor + 1)),
            Some(TokenKind::Identifier) => {
                let (value, _, next) = self.resolve_identifier(content, tokens, cursor);
                match value.as_int64() {
                    Some(i) => Some((i, next)),
                    None => {
                        self.error(content, ErrorKind::TypeMismatch, tokens[cursor].index, "index must be an integer");
                        None
                    }
                }
            }
            _ => {
                self.error(
                    content,
                    ErrorKind::UnexpectedToken,
                    tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()),
                    "expected an index",
                );
                None
            }
        }
    }

    /// §4.D.3 conditional decision tree. Returns the token list to execute
    /// (if any) and the cursor positioned at the tag's trailing `FmtEnd`.
    fn decision_tree(&mut self, content: &str, tokens: &[Token], cursor: usize) -> (Option<Rc<[Token]>>, usize) {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut cursor = cursor;

        loop {
            match tokens.get(cursor).map(|t| t.kind) {
                Some(TokenKind::TokenList) => break,
                Some(TokenKind::Identifier) => {
                    let (value, _, next) = self.resolve_identifier(content, tokens, cursor);
                    operands.push(value);
                    cursor = next;
                }
                Some(TokenKind::String) => {
                    operands.push(Value::String(Rc::from(tokens[cursor].text(content))));
                    cursor += 1;
                }
                Some(TokenKind::Integer) => {
                    operands.push(Value::Int64(tokens[cursor].as_int().unwrap_or(0)));
                    cursor += 1;
                }
                Some(TokenKind::Boolean) => {
                    operands.push(Value::Bool(tokens[cursor].as_bool().unwrap_or(false)));
                    cursor += 1;
                }
                Some(TokenKind::Equal | TokenKind::And | TokenKind::Or) => {
                    operators.push(tokens[cursor].kind);
                    cursor += 1;
                }
                _ => {
                    self.error(
                        content,
                        ErrorKind::UnexpectedToken,
                        tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()),
                        "expected an operand, operator, or '{' in if expression",
                    );
                    return (None, self.skip_to_fmt_end(tokens, cursor));
                }
            }
        }

        let then_body = tokens[cursor].tokens().expect("TokenList token always carries tokens").clone();
        let body_index = tokens[cursor].index;
        let cursor = cursor + 1;

        if operators.len() + 1 != operands.len() {
            self.error(
                content,
                ErrorKind::BadExpression,
                body_index,
                format!("if expression has {} operand(s) and {} operator(s)", operands.len(), operators.len()),
            );
            return (None, self.skip_else_branch(tokens, cursor));
        }

        if Self::fold_expression(operands, operators).truthy() {
            (Some(then_body), self.skip_else_branch(tokens, cursor))
        } else {
            self.evaluate_else(content, tokens, cursor)
        }
    }

    /// Right-to-left fold (§4.D.3): the last operand seeds the accumulator,
    /// then each operator (walked back to front) combines the next operand
    /// to its left with the accumulator so far.
    fn fold_expression(operands: Vec<Value>, operators: Vec<TokenKind>) -> Value {
        let mut operands = operands.into_iter().rev();
        let mut acc = operands.next().expect("balanced expression has at least one operand");

        for op in operators.into_iter().rev() {
            let left = operands.next().expect("balanced expression has operators+1 operands");
            acc = match op {
                TokenKind::Equal => Value::Bool(left == acc),
                TokenKind::And => Value::Bool(left.truthy() && acc.truthy()),
                TokenKind::Or => Value::Bool(left.truthy() || acc.truthy()),
                _ => unreachable!("only =, & and | are pushed as operators"),
            };
        }

        acc
    }

    fn evaluate_else(&mut self, content: &str, tokens: &[Token], cursor: usize) -> (Option<Rc<[Token]>>, usize) {
        match tokens.get(cursor).map(|t| t.kind) {
            Some(TokenKind::Else) => match tokens.get(cursor + 1).map(|t| t.kind) {
                Some(TokenKind::If) => self.decision_tree(content, tokens, cursor + 2),
                Some(TokenKind::TokenList) => {
                    let body = tokens[cursor + 1].tokens().expect("TokenList token always carries tokens").clone();
                    (Some(body), cursor + 2)
                }
                _ => {
                    self.error(
                        content,
                        ErrorKind::UnexpectedToken,
                        tokens.get(cursor + 1).map(|t| t.index).unwrap_or(content.len()),
                        "expected 'if' or '{' after 'else'",
                    );
                    (None, self.skip_to_fmt_end(tokens, cursor))
                }
            },
            Some(TokenKind::FmtEnd) => (None, cursor),
            _ => {
                self.error(
                    content,
                    ErrorKind::UnexpectedToken,
                    tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()),
                    "expected 'else' or '$>'",
                );
                (None, self.skip_to_fmt_end(tokens, cursor))
            }
        }
    }

    /// Advances past an untaken `else`/`else if` tail without evaluating any
    /// of its conditions, so a taken `if` branch never has side effects
    /// (lazy `None` materialization) from the branch it didn't execute.
    fn skip_else_branch(&self, tokens: &[Token], cursor: usize) -> usize {
        if tokens.get(cursor).map(|t| t.kind) != Some(TokenKind::Else) {
            return cursor;
        }
        match tokens.get(cursor + 1).map(|t| t.kind) {
            Some(TokenKind::If) => {
                let mut cursor = cursor + 2;
                while tokens.get(cursor).map(|t| t.kind) != Some(TokenKind::TokenList) && cursor < tokens.len() {
                    cursor += 1;
                }
                cursor = (cursor + 1).min(tokens.len());
                self.skip_else_branch(tokens, cursor)
            }
            Some(TokenKind::TokenList) => cursor + 2,
            _ => cursor,
        }
    }

    /// §4.D.2 `for <binder> [, <index>] : <array> { body }`.
    fn eval_for(&mut self, content: &str, tokens: &[Token], mut cursor: usize, out: &mut String) -> usize {
        let Some(binder_tok) = tokens.get(cursor).filter(|t| t.kind == TokenKind::Identifier) else {
            self.error(content, ErrorKind::UnexpectedToken, tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()), "expected a binder identifier after 'for'");
            return self.skip_to_fmt_end(tokens, cursor);
        };
        let binder = binder_tok.text(content).to_string();
        cursor += 1;

        let mut index_binder = None;
        if tokens.get(cursor).map(|t| t.kind) == Some(TokenKind::Comma) {
            let Some(idx_tok) = tokens.get(cursor + 1).filter(|t| t.kind == TokenKind::Identifier) else {
                self.error(content, ErrorKind::UnexpectedToken, tokens.get(cursor + 1).map(|t| t.index).unwrap_or(content.len()), "expected an index binder after ','");
                return self.skip_to_fmt_end(tokens, cursor);
            };
            index_binder = Some(idx_tok.text(content).to_string());
            cursor += 2;
        }

        if tokens.get(cursor).map(|t| t.kind) != Some(TokenKind::Colon) {
            self.error(content, ErrorKind::UnexpectedToken, tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()), "expected ':' after for binder(s)");
            return self.skip_to_fmt_end(tokens, cursor);
        }
        cursor += 1;

        let (array_value, _, cursor_after_array) = self.resolve_identifier(content, tokens, cursor);
        cursor = cursor_after_array;

        let Some(array) = array_value.as_array().cloned() else {
            self.error(content, ErrorKind::TypeMismatch, tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()), format!("for requires an array, found {}", array_value.type_name()));
            return self.skip_to_fmt_end(tokens, cursor);
        };

        let Some(body_tok) = tokens.get(cursor).filter(|t| t.kind == TokenKind::TokenList) else {
            self.error(content, ErrorKind::UnexpectedToken, tokens.get(cursor).map(|t| t.index).unwrap_or(content.len()), "expected a '{ ... }' body for 'for'");
            return self.skip_to_fmt_end(tokens, cursor);
        };
        let body = body_tok.tokens().expect("TokenList token always carries tokens").clone();
        cursor += 1;

        let root = self.root_object();
        let items: Vec<Value> = array.borrow().clone();
        for (i, item) in items.into_iter().enumerate() {
            root.borrow_mut().insert(binder.clone(), item);
            if let Some(index_name) = &index_binder {
                root.borrow_mut().insert(index_name.clone(), Value::Int64(i as i64));
            }
            self.eval_tokens(content, &body, out);
        }

        self.expect_fmt_end(content, tokens, cursor)
    }

    /// §4.D.2 `file` inclusion: resolves a string path (literal or
    /// identifier), consults the file cache, and returns a `TokenList`
    /// carrying the included file's own content and tokens.
    fn load_file_value(&mut self, content: &str, tokens: &[Token], cursor: usize) -> (Value, usize) {
        let Some(path_tok) = tokens.get(cursor) else {
            self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
            return (Value::None, cursor);
        };

        let (path, cursor) = match path_tok.kind {
            TokenKind::String => (Some(path_tok.text(content).to_string()), cursor + 1),
            TokenKind::Identifier => {
                let (value, _, next) = self.resolve_identifier(content, tokens, cursor);
                match value.as_str() {
                    Some(s) => (Some(s.to_string()), next),
                    None => {
                        self.error(content, ErrorKind::TypeMismatch, path_tok.index, "file path must be a string");
                        (None, next)
                    }
                }
            }
            other => {
                self.error(content, ErrorKind::TypeMismatch, path_tok.index, format!("file path must be a string, found {}", other.name()));
                (None, cursor + 1)
            }
        };

        match path {
            Some(path) => {
                let cached = self.cache.get_or_load(&path);
                if cached.had_error {
                    self.error(content, ErrorKind::FileLoad, path_tok.index, format!("'{path}' failed to load or tokenize"));
                }
                (
                    Value::TokenList(TokenList {
                        content: cached.content,
                        tokens: cached.tokens,
                    }),
                    cursor,
                )
            }
            None => (Value::None, cursor),
        }
    }

    fn expect_fmt_end(&mut self, content: &str, tokens: &[Token], cursor: usize) -> usize {
        match tokens.get(cursor) {
            Some(t) if t.kind == TokenKind::FmtEnd => cursor + 1,
            Some(t) => {
                self.error(content, ErrorKind::UnexpectedToken, t.index, format!("expected '$>', found {}", t.kind.name()));
                self.skip_to_fmt_end(tokens, cursor)
            }
            None => {
                self.error(content, ErrorKind::UnterminatedTag, content.len(), "tag was never closed");
                cursor
            }
        }
    }

    fn skip_to_fmt_end(&mut self, tokens: &[Token], mut cursor: usize) -> usize {
        while let Some(t) = tokens.get(cursor) {
            if t.kind == TokenKind::FmtEnd {
                return cursor + 1;
            }
            cursor += 1;
        }
        cursor
    }
}

/// §4.D top-level contract: clears `out`, walks `tokens` against `root_env`,
/// and returns whether the render completed without any reported error.
pub fn render(content: &str, tokens: &[Token], root_env: &Value, cache: &mut FileCache, out: &mut String) -> bool {
    out.clear();
    out.reserve(content.len().min(4096).max(16));

    let mut ctx = RenderContext {
        root_env: root_env.clone(),
        cache,
        had_error: false,
    };
    ctx.eval_tokens(content, tokens, out);
    !ctx.had_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env;
    use std::cell::RefCell;
    use std::collections::HashMap;

    fn root(entries: Vec<(&str, Value)>) -> Value {
        let mut map = HashMap::new();
        for (k, v) in entries {
            map.insert(k.to_string(), v);
        }
        Value::Object(Rc::new(RefCell::new(map)))
    }

    fn render_str(template: &str, env: &Value) -> (String, bool) {
        let (tokens, lex_error) = crate::lexer::tokenize(template);
        assert!(!lex_error, "template failed to tokenize: {template}");
        let mut cache = FileCache::new();
        let mut out = String::new();
        let ok = render(template, &tokens, env, &mut cache, &mut out);
        (out, ok)
    }

    #[test]
    fn emits_bool_int_string() {
        let env = root(vec![("x", Value::Bool(true)), ("y", Value::Int64(42)), ("s", Value::String(Rc::from("hi")))]);
        let (out, ok) = render_str("<$ x $>|<$ y $>|<$ s $>", &env);
        assert!(ok);
        assert_eq!(out, "true|42|hi");
    }

    #[test]
    fn object_member_access() {
        let inner = root(vec![("b", Value::String(Rc::from("B")))]);
        let env = root(vec![("a", inner)]);
        let (out, ok) = render_str("<$ a.b $>", &env);
        assert!(ok);
        assert_eq!(out, "B");
    }

    #[test]
    fn array_index_and_end() {
        let xs = Value::array(vec![Value::Int64(10), Value::Int64(20), Value::Int64(30)]);
        let env = root(vec![("xs", xs)]);
        let (out, ok) = render_str("<$ xs[0] $>-<$ xs[xs.end] $>", &env);
        assert!(ok);
        assert_eq!(out, "10-30");
    }

    #[test]
    fn slice_of_array() {
        let xs = Value::array(vec![Value::Int64(10), Value::Int64(20), Value::Int64(30)]);
        let env = root(vec![("xs", xs)]);
        let (out, ok) = render_str("<$ for v : xs[1, 2] { <$ v $>, } $>", &env);
        assert!(ok);
        assert_eq!(out, "20, 30, ");
    }

    #[test]
    fn if_else_branches() {
        let env = root(vec![("x", Value::Bool(false))]);
        let (out, ok) = render_str("<$ if x = true { yes } else { no } $>", &env);
        assert!(ok);
        assert_eq!(out, " no ");
    }

    #[test]
    fn for_with_index() {
        let xs = Value::array(vec![Value::Int64(10), Value::Int64(20), Value::Int64(30)]);
        let env = root(vec![("xs", xs)]);
        let (out, ok) = render_str("<$ for v, i : xs { <$ i $>:<$ v $>; } $>", &env);
        assert!(ok);
        assert_eq!(out, "0:10;1:20;2:30;");
    }

    #[test]
    fn out_of_bounds_index_reports_error() {
        let xs = Value::array(vec![Value::Int64(1)]);
        let env = root(vec![("xs", xs)]);
        let (_, ok) = render_str("<$ xs[5] $>", &env);
        assert!(!ok);
    }

    #[test]
    fn assign_then_emit() {
        let env = Value::empty_object();
        let (out, ok) = render_str(r#"<$ x : "v" $><$ x $>"#, &env);
        assert!(ok);
        assert_eq!(out, "v");
    }

    #[test]
    fn unknown_variable_is_an_error_only_at_emission() {
        let env = Value::empty_object();
        let (_, ok) = render_str("<$ unset $>", &env);
        assert!(!ok);
    }

    #[test]
    fn unset_never_equals_false() {
        // Regression for §9: `None` must not compare equal to `Bool(false)`.
        let env = Value::empty_object();
        let (out, ok) = render_str("<$ if unset = false { eq } else { neq } $>", &env);
        assert!(ok);
        assert_eq!(out, " neq ");
    }

    #[test]
    fn right_to_left_fold_is_observable() {
        // `false | true & false` folds right-to-left as `false | (true & false)`
        // = `false | false` = `false`, which differs from a left-to-right
        // fold (`(false | true) & false` = `true & false` = `false` too, so
        // pick operands where the two orders actually diverge).
        let env = root(vec![("a", Value::Bool(true)), ("b", Value::Bool(false)), ("c", Value::Bool(false))]);
        // right-to-left: a | (b & c) = true | false = true
        // left-to-right: (a | b) & c = true & false = false
        let (out, ok) = render_str("<$ if a | b & c { rtl-true } else { rtl-false } $>", &env);
        assert!(ok);
        assert_eq!(out, " rtl-true ");
    }

    #[test]
    fn file_inclusion_is_memoized_and_errors_propagate() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("fmtgen-eval-test-{}.txt", std::process::id()));
        std::fs::write(&path, "included <$ name $>").unwrap();

        let env = root(vec![("name", Value::String(Rc::from("World")))]);
        let template = format!(r#"<$ file "{0}" $>|<$ file "{0}" $>"#, path.to_str().unwrap());

        let (tokens, lex_error) = crate::lexer::tokenize(&template);
        assert!(!lex_error);
        let mut cache = FileCache::new();
        let mut out = String::new();
        let ok = render(&template, &tokens, &env, &mut cache, &mut out);
        std::fs::remove_file(&path).unwrap();

        assert!(ok);
        assert_eq!(out, "included World|included World");
    }

    #[test]
    fn prepare_pass_then_render_uses_params() {
        let doc: serde_json::Value = serde_json::json!({"greeting": "hi"});
        let env = env::prepare_environment(&doc);
        env::prepare_pass(&env, env::to_value(&serde_json::json!({"name": "World"})));

        let (out, ok) = render_str("<$ greeting $>, <$ params.name $>!", &env);
        assert!(ok);
        assert_eq!(out, "hi, World!");
    }
}
