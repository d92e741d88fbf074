// Lexer for textual tensor-op IR (.tfir) files.
//
// Uses the `logos` crate for DFA-based lexing. Words cover opcodes, keywords
// and type names alike (`integer_literal`, `scope`, `Builtin.Int64`); the
// parser tells them apart.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*")]
pub enum Token {
    // ── Symbols ──
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("*")]
    Star,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // ── Names ──
    /// `%name`: a local value. Stores the name without the sigil.
    #[regex(r"%[A-Za-z0-9_]+", |lex| lex.slice()[1..].to_string())]
    Value(String),

    /// `@name`: a global or function. Stores the name without the sigil.
    #[regex(r"@[A-Za-z0-9_.$]+", |lex| lex.slice()[1..].to_string())]
    Global(String),

    // ── Literals ──
    //
    // A float needs a fraction or an exponent; plain digits lex as Int.
    #[regex(r"-?[0-9]+(\.[0-9]+([eE][+-]?[0-9]+)?|[eE][+-]?[0-9]+)", parse_float)]
    Float(f64),

    #[regex(r"-?[0-9]+", parse_int)]
    Int(i128),

    /// String literal with `\"`, `\\` and `\n` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    /// Opcodes, keywords and type names. Dots are allowed for `Builtin.*`.
    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*", |lex| lex.slice().to_string())]
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Equals => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Star => write!(f, "*"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Value(name) => write!(f, "%{name}"),
            Token::Global(name) => write!(f, "@{name}"),
            Token::Float(v) => write!(f, "{v:?}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Word(w) => write!(f, "{w}"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i128> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Escape a string for printing so that `parse_string` reads it back.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ── Public API ──

/// Lex textual IR into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected input: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(result.errors.is_empty(), "lex errors: {:?}", result.errors);
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn instruction_line() {
        let toks = kinds(r#"%3 = builtin "__tfop_Add,$in,$in" (%1, %2) : TensorHandle<Float>"#);
        assert_eq!(
            toks,
            vec![
                Token::Value("3".into()),
                Token::Equals,
                Token::Word("builtin".into()),
                Token::Str("__tfop_Add,$in,$in".into()),
                Token::LParen,
                Token::Value("1".into()),
                Token::Comma,
                Token::Value("2".into()),
                Token::RParen,
                Token::Colon,
                Token::Word("TensorHandle".into()),
                Token::Lt,
                Token::Word("Float".into()),
                Token::Gt,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("42"), vec![Token::Int(42)]);
        assert_eq!(kinds("-7"), vec![Token::Int(-7)]);
        assert_eq!(kinds("1.5"), vec![Token::Float(1.5)]);
        assert_eq!(kinds("1e-7"), vec![Token::Float(1e-7)]);
    }

    #[test]
    fn dotted_type_names_and_globals() {
        assert_eq!(
            kinds("Builtin.Int64 @_swiftEmptyArrayStorage"),
            vec![
                Token::Word("Builtin.Int64".into()),
                Token::Global("_swiftEmptyArrayStorage".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("// header\nfunc"), vec![Token::Word("func".into())]);
    }

    #[test]
    fn string_escapes_round_trip() {
        let raw = "a \"quoted\" \\ line\nnext";
        let escaped = escape_string(raw);
        assert_eq!(kinds(&escaped), vec![Token::Str(raw.to_string())]);
    }

    #[test]
    fn bad_character_is_reported_and_skipped() {
        let result = lex("func # @f");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.tokens.len(), 2);
    }
}
