mod keywords;

use std::rc::Rc;

use crate::token::{Payload, Token, TokenKind};
use keywords::KEYWORDS;

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'-' || byte == b'_'
}

fn is_identifier_continue(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

/// Hand-rolled scanner over a template body. A single instance is used for
/// one top-level lex; `{ ... }` brace bodies are tokenized by recursing into
/// [`Lexer::scan`] with a new end delimiter rather than spinning up a new
/// lexer, so the byte cursor and error flag are shared across nesting
/// levels.
struct Lexer<'a> {
    content: &'a str,
    bytes: &'a [u8],
    index: usize,
    had_error: bool,
}

impl<'a> Lexer<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            content,
            bytes: content.as_bytes(),
            index: 0,
            had_error: false,
        }
    }

    fn at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.index + offset).copied()
    }

    fn error(&mut self, index: usize, message: impl Into<String>) {
        log::trace!("lex error at byte {index}: {}", message.into());
        self.had_error = true;
    }

    /// Scans tokens until `end_delim` is reached unescaped (or, for the
    /// sentinel `None`, until end of content). Returns the tokens collected
    /// at this nesting level.
    fn scan(&mut self, end_delim: Option<u8>) -> Vec<Token> {
        let mut tokens = Vec::with_capacity((self.bytes.len() / 10).max(2));
        let mut scan_start = self.index;

        loop {
            if self.index >= self.bytes.len() {
                break;
            }

            if let Some(delim) = end_delim {
                let prev_is_backslash = self.index > 0 && self.bytes[self.index - 1] == b'\\';
                if self.bytes[self.index] == delim && !prev_is_backslash {
                    break;
                }
            }

            let prev_is_backslash = self.index > 0 && self.bytes[self.index - 1] == b'\\';
            let is_tag_start = self.at(0) == Some(b'<') && self.at(1) == Some(b'$') && !prev_is_backslash;
            if !is_tag_start {
                self.index += 1;
                continue;
            }

            if self.index > scan_start {
                tokens.push(Token::new(
                    TokenKind::RawString,
                    scan_start,
                    Payload::Span(scan_start..self.index),
                ));
            }

            tokens.push(Token::new(TokenKind::FmtStart, self.index, Payload::None));
            self.index += 2;

            self.scan_tag(&mut tokens);
            scan_start = self.index;
        }

        if self.index > scan_start {
            tokens.push(Token::new(
                TokenKind::RawString,
                scan_start,
                Payload::Span(scan_start..self.index),
            ));
        }

        tokens
    }

    /// Scans the inside of a single `<$ ... $>` tag, appending tokens
    /// (including the trailing `FmtEnd`) to `tokens`.
    fn scan_tag(&mut self, tokens: &mut Vec<Token>) {
        loop {
            let Some(byte) = self.at(0) else {
                self.error(self.index, "tag was never closed");
                return;
            };

            match byte {
                b' ' | b'\t' | b'\r' | b'\n' | 0 => {
                    self.index += 1;
                }

                b'$' if self.at(1) == Some(b'>') => {
                    tokens.push(Token::new(TokenKind::FmtEnd, self.index, Payload::None));
                    self.index += 2;
                    return;
                }

                b'/' if self.at(1) == Some(b'/') => {
                    self.index += 2;
                    self.skip_comment(tokens);
                    return;
                }

                b'[' => self.push_punct(tokens, TokenKind::BracketOpen),
                b']' => self.push_punct(tokens, TokenKind::BracketClose),
                b':' => self.push_punct(tokens, TokenKind::Colon),
                b',' => self.push_punct(tokens, TokenKind::Comma),
                b'.' => self.push_punct(tokens, TokenKind::Dot),
                b'=' => self.push_punct(tokens, TokenKind::Equal),
                b'&' => self.push_punct(tokens, TokenKind::And),
                b'|' => self.push_punct(tokens, TokenKind::Or),

                b'{' => self.scan_braces(tokens),
                b'"' => self.scan_string(tokens),
                b'-' | b'0'..=b'9' => self.scan_number(tokens),

                _ if is_identifier_start(byte) => self.scan_identifier(tokens),

                _ => {
                    self.error(self.index, format!("invalid character inside tag ('{}')", byte as char));
                    self.index += 1;
                }
            }
        }
    }

    fn push_punct(&mut self, tokens: &mut Vec<Token>, kind: TokenKind) {
        tokens.push(Token::new(kind, self.index, Payload::None));
        self.index += 1;
    }

    fn skip_comment(&mut self, tokens: &mut Vec<Token>) {
        loop {
            match (self.at(0), self.at(1)) {
                (Some(b'$'), Some(b'>')) => {
                    tokens.push(Token::new(TokenKind::FmtEnd, self.index, Payload::None));
                    self.index += 2;
                    return;
                }
                (None, _) => {
                    self.error(self.index, "comment tag was not closed");
                    return;
                }
                _ => self.index += 1,
            }
        }
    }

    fn scan_braces(&mut self, tokens: &mut Vec<Token>) {
        let index = self.index;
        self.index += 1; // skip '{'

        let inner = self.scan(Some(b'}'));

        if self.at(0) != Some(b'}') {
            self.error(index, "brace body was never closed");
        } else {
            self.index += 1; // skip '}'
        }

        tokens.push(Token::new(
            TokenKind::TokenList,
            index,
            Payload::Tokens(Rc::from(inner)),
        ));
    }

    fn scan_string(&mut self, tokens: &mut Vec<Token>) {
        let index = self.index;
        self.index += 1; // skip opening quote
        let start = self.index;

        loop {
            match self.at(0) {
                None => {
                    self.error(index, "string was not closed");
                    break;
                }
                Some(b'\n') => {
                    self.error(index, "reached newline before closing string");
                    break;
                }
                Some(b'"') => break,
                Some(b'\\') => self.index += 2,
                Some(_) => self.index += 1,
            }
        }

        let end = self.index.min(self.bytes.len());
        tokens.push(Token::new(TokenKind::String, index, Payload::Span(start..end)));

        if self.at(0) == Some(b'"') {
            self.index += 1;
        }
    }

    fn scan_number(&mut self, tokens: &mut Vec<Token>) {
        let index = self.index;
        self.index += 1;

        while let Some(byte) = self.at(0) {
            if byte == b'-' {
                self.error(self.index, "'-' can only be used at the start of a number");
                self.index += 1;
                continue;
            }
            if !byte.is_ascii_digit() {
                break;
            }
            self.index += 1;
        }

        let text = &self.content[index..self.index];
        // A misplaced '-' already raised an error above; fold the run down to
        // its digits (plus a leading sign) so a malformed literal still
        // yields *some* value instead of a second, redundant diagnostic.
        let cleaned: String = match text.strip_prefix('-') {
            Some(rest) => format!("-{}", rest.chars().filter(char::is_ascii_digit).collect::<String>()),
            None => text.chars().filter(char::is_ascii_digit).collect(),
        };
        let value: i64 = cleaned.parse().unwrap_or(0);

        tokens.push(Token::new(TokenKind::Integer, index, Payload::Int(value)));
    }

    fn scan_identifier(&mut self, tokens: &mut Vec<Token>) {
        let index = self.index;
        self.index += 1;

        while let Some(byte) = self.at(0) {
            if !is_identifier_continue(byte) {
                break;
            }
            self.index += 1;
        }

        let text = &self.content[index..self.index];

        let token = match text {
            "true" => Token::new(TokenKind::Boolean, index, Payload::Bool(true)),
            "false" => Token::new(TokenKind::Boolean, index, Payload::Bool(false)),
            _ => match KEYWORDS.get(text) {
                Some(kind) => Token::new(*kind, index, Payload::None),
                None => Token::new(TokenKind::Identifier, index, Payload::Span(index..self.index)),
            },
        };

        tokens.push(token);
    }
}

/// Tokenizes a complete template body. The end delimiter is end-of-buffer;
/// nested `{ ... }` bodies are scanned recursively with `}` as their
/// delimiter. Returns the token stream together with whether any lexical
/// error was encountered — the stream is still produced on a best-effort
/// basis even when `true`.
pub fn tokenize(content: &str) -> (Rc<[Token]>, bool) {
    let mut lexer = Lexer::new(content);
    let tokens = lexer.scan(None);
    (Rc::from(tokens), lexer.had_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn round_trip_literal() {
        let (tokens, error) = tokenize("just some plain text");
        assert!(!error);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::RawString);
        assert_eq!(tokens[0].text("just some plain text"), "just some plain text");
    }

    #[test]
    fn tag_delimitation() {
        let content = "A<$ x $>B";
        let (tokens, error) = tokenize(content);
        assert!(!error);
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::RawString,
                TokenKind::FmtStart,
                TokenKind::Identifier,
                TokenKind::FmtEnd,
                TokenKind::RawString,
            ]
        );
        assert_eq!(tokens[0].text(content), "A");
        assert_eq!(tokens[2].text(content), "x");
        assert_eq!(tokens[4].text(content), "B");
    }

    #[test]
    fn escaped_tag_is_not_a_tag() {
        let content = r"\<$not a tag$>";
        let (tokens, error) = tokenize(content);
        assert!(!error);
        assert_eq!(kinds(&tokens), vec![TokenKind::RawString]);
    }

    #[test]
    fn keyword_retyping_is_exact() {
        let content = "<$ if $><$ iff $><$ IF $><$ else_ $>";
        let (tokens, _) = tokenize(content);
        let idents: Vec<_> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::If | TokenKind::Identifier))
            .collect();
        assert_eq!(idents[0].kind, TokenKind::If);
        assert_eq!(idents[1].kind, TokenKind::Identifier);
        assert_eq!(idents[1].text(content), "iff");
        assert_eq!(idents[2].kind, TokenKind::Identifier);
        assert_eq!(idents[2].text(content), "IF");
        assert_eq!(idents[3].kind, TokenKind::Identifier);
        assert_eq!(idents[3].text(content), "else_");
    }

    #[test]
    fn negative_integer_literal() {
        let content = "<$ -42 $>";
        let (tokens, error) = tokenize(content);
        assert!(!error);
        assert_eq!(tokens[1].kind, TokenKind::Integer);
        assert_eq!(tokens[1].as_int(), Some(-42));
    }

    #[test]
    fn dash_inside_number_is_an_error() {
        let (_, error) = tokenize("<$ 1-2 $>");
        assert!(error);
    }

    #[test]
    fn balanced_braces() {
        let content = "<$ if x { <$ if y { inner } $> } $>";
        let (tokens, error) = tokenize(content);
        assert!(!error);
        assert_eq!(tokens[2].kind, TokenKind::TokenList);
        let outer_body = tokens[2].tokens().unwrap();
        assert_eq!(outer_body[1].kind, TokenKind::TokenList);
    }

    #[test]
    fn comment_tag_is_discarded() {
        let content = "<$ // this is ignored $>kept";
        let (tokens, error) = tokenize(content);
        assert!(!error);
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::FmtStart, TokenKind::FmtEnd, TokenKind::RawString]
        );
        assert_eq!(tokens[2].text(content), "kept");
    }
}
