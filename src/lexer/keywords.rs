use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::token::TokenKind;

/// Identifiers that are retyped into reserved keyword tokens. `true`/`false`
/// are handled separately by the lexer since they also carry a boolean
/// payload; every other entry here retypes the identifier with no payload
/// change.
pub static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("if", TokenKind::If);
    map.insert("for", TokenKind::For);
    map.insert("file", TokenKind::File);
    map.insert("else", TokenKind::Else);
    map
});
