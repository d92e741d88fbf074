// Parser for textual tensor-op IR (.tfir) files.
//
// Parses a token stream (from the lexer) into an `ast::Module`. Uses chumsky
// combinators. Every rule is a small generic builder function so the type
// grammar can be reused by the instruction grammar.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::ir::{CastKind, SourceLoc, StringEncoding, Type};
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a textual IR string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser();
    let (module, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        module,
        errors: all_errors,
    }
}

type ParserError<'tokens> = extra::Err<Rich<'tokens, Token, SimpleSpan>>;

// ── Terminals ──

fn kw<'tokens, I>(word: &'static str) -> impl Parser<'tokens, I, (), ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    just(Token::Word(word.to_string())).ignored()
}

fn value<'tokens, I>() -> impl Parser<'tokens, I, String, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Value(name) => name }.labelled("value")
}

fn global<'tokens, I>() -> impl Parser<'tokens, I, String, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Global(name) => name }.labelled("global name")
}

fn uint<'tokens, I>() -> impl Parser<'tokens, I, u32, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Int(n) if (0..=u32::MAX as i128).contains(&n) => n as u32 }
        .labelled("unsigned integer")
}

fn word<'tokens, I>() -> impl Parser<'tokens, I, String, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Word(w) => w }
}

/// `"file":line:col`
fn src_loc<'tokens, I>() -> impl Parser<'tokens, I, SourceLoc, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    select! { Token::Str(s) => s }
        .then_ignore(just(Token::Colon))
        .then(uint())
        .then_ignore(just(Token::Colon))
        .then(uint())
        .map(|((file, line), column)| SourceLoc { file, line, column })
}

// ── Types ──

/// Resolve a type name and its generic arguments.
fn named_type(name: &str, args: Vec<Type>) -> Result<Type, String> {
    if name == "Metatype" {
        return match <[Type; 1]>::try_from(args) {
            Ok([inner]) => Ok(Type::Metatype(Box::new(inner))),
            Err(_) => Err("Metatype takes exactly one type argument".to_string()),
        };
    }
    let Some(builtin) = name.strip_prefix("Builtin.") else {
        return Ok(Type::Nominal {
            name: name.to_string(),
            args,
        });
    };
    if !args.is_empty() {
        return Err(format!("builtin type '{name}' takes no type arguments"));
    }
    let width = |digits: &str| digits.parse::<u32>().ok().filter(|w| *w > 0);
    match builtin {
        "Word" => Ok(Type::Word),
        "RawPointer" => Ok(Type::RawPointer),
        "BridgeObject" => Ok(Type::BridgeObject),
        _ => {
            if let Some(w) = builtin.strip_prefix("Int").and_then(width) {
                Ok(Type::Int(w))
            } else if let Some(w) = builtin.strip_prefix("FPIEEE").and_then(width) {
                Ok(Type::Float(w))
            } else {
                Err(format!("unknown builtin type '{name}'"))
            }
        }
    }
}

pub fn type_parser<'tokens, I>() -> impl Parser<'tokens, I, Type, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    recursive(|ty| {
        let generic_args = ty
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::Lt), just(Token::Gt));

        let named = word()
            .then(generic_args.or_not())
            .try_map(|(name, args), span| {
                named_type(&name, args.unwrap_or_default()).map_err(|msg| Rich::custom(span, msg))
            });

        let address = just(Token::Star)
            .ignore_then(ty.clone())
            .map(|inner| Type::Address(Box::new(inner)));

        let tuple = ty
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(Type::Tuple);

        choice((address, tuple, named))
    })
    .labelled("type")
}

// ── Instructions ──

fn op_parser<'tokens, I>() -> impl Parser<'tokens, I, OpDecl, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let value_list = value()
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));
    let string = select! { Token::Str(s) => s };
    let encoding = choice((
        kw("utf8").to(StringEncoding::Utf8),
        kw("utf16").to(StringEncoding::Utf16),
    ));
    let cast_kind = choice((
        kw("unchecked_bitwise_cast").to(CastKind::UncheckedBitwise),
        kw("unchecked_ref_cast").to(CastKind::UncheckedRef),
        kw("upcast").to(CastKind::Upcast),
        kw("raw_pointer_to_ref").to(CastKind::RawPointerToRef),
        kw("address_to_pointer").to(CastKind::AddressToPointer),
    ));

    let literals = choice((
        kw("argument").ignore_then(uint()).map(OpDecl::Argument),
        kw("integer_literal")
            .ignore_then(select! { Token::Int(n) => n })
            .map(OpDecl::IntegerLiteral),
        kw("float_literal")
            .ignore_then(select! {
                Token::Float(x) => x,
                Token::Int(n) => n as f64,
            })
            .map(OpDecl::FloatLiteral),
        kw("string_literal")
            .ignore_then(encoding)
            .then(string.clone())
            .map(|(enc, s)| OpDecl::StringLiteral(enc, s)),
        kw("metatype").to(OpDecl::Metatype),
    ));

    let aggregates = choice((
        kw("struct")
            .ignore_then(value_list.clone())
            .map(OpDecl::Struct),
        kw("struct_extract")
            .ignore_then(value())
            .then_ignore(just(Token::Comma))
            .then(uint())
            .map(|(v, field)| OpDecl::StructExtract(v, field)),
        kw("enum")
            .ignore_then(word())
            .then(
                value()
                    .delimited_by(just(Token::LParen), just(Token::RParen))
                    .or_not(),
            )
            .map(|(case, payload)| OpDecl::Enum { case, payload }),
        cast_kind
            .then(value())
            .map(|(kind, v)| OpDecl::Cast(kind, v)),
        kw("object")
            .ignore_then(value_list.clone())
            .map(OpDecl::Object),
        kw("tuple_extract")
            .ignore_then(value())
            .then_ignore(just(Token::Comma))
            .then(uint())
            .map(|(v, index)| OpDecl::TupleExtract(v, index)),
    ));

    let memory = choice((
        kw("global_addr").ignore_then(global()).map(OpDecl::GlobalAddr),
        kw("global_value").ignore_then(global()).map(OpDecl::GlobalValue),
        kw("alloc_stack").to(OpDecl::AllocStack),
        kw("alloc_ref").ignore_then(value()).map(OpDecl::AllocRef),
        kw("ref_tail_addr").ignore_then(value()).map(OpDecl::RefTailAddr),
        kw("index_addr")
            .ignore_then(value())
            .then_ignore(just(Token::Comma))
            .then(value())
            .map(|(base, index)| OpDecl::IndexAddr(base, index)),
        kw("store")
            .ignore_then(value())
            .then_ignore(kw("to"))
            .then(value())
            .map(|(src, dest)| OpDecl::Store { src, dest }),
    ));

    let calls = choice((
        kw("builtin")
            .ignore_then(string)
            .then(value_list.clone())
            .map(|(name, operands)| OpDecl::Builtin { name, operands }),
        kw("apply")
            .ignore_then(global())
            .then(value_list)
            .map(|(callee, args)| OpDecl::Apply { callee, args }),
        kw("release_value")
            .ignore_then(value())
            .map(OpDecl::ReleaseValue),
        kw("return")
            .ignore_then(
                value()
                    .or_not()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map(OpDecl::Return),
    ));

    choice((literals, aggregates, memory, calls)).labelled("instruction")
}

fn inst_parser<'tokens, I>() -> impl Parser<'tokens, I, InstDecl, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    value()
        .then_ignore(just(Token::Equals))
        .or_not()
        .then(op_parser())
        .then(just(Token::Colon).ignore_then(type_parser()).or_not())
        .then(kw("loc").ignore_then(src_loc()).or_not())
        .then(kw("scope").ignore_then(uint()).or_not())
        .map_with(|((((result, op), ty), loc), scope), e| InstDecl {
            result,
            op,
            ty,
            loc,
            scope,
            span: e.span(),
        })
}

// ── Items ──

fn module_parser<'tokens, I>() -> impl Parser<'tokens, I, Module, ParserError<'tokens>> + Clone
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let body = inst_parser()
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    let scope_decl = kw("scope")
        .ignore_then(uint())
        .then(kw("loc").ignore_then(src_loc()).or_not())
        .then(kw("inlined_at").ignore_then(uint()).or_not())
        .then(kw("fn_loc").ignore_then(src_loc()).or_not())
        .map_with(|(((id, loc), inlined_at), fn_loc), e| {
            Item::Scope(ScopeDecl {
                id,
                loc,
                inlined_at,
                fn_loc,
                span: e.span(),
            })
        });

    let global_decl = kw("global")
        .ignore_then(global())
        .then(body.clone().or_not())
        .map_with(|(name, body), e| {
            Item::Global(GlobalDecl {
                name,
                body,
                span: e.span(),
            })
        });

    let func_decl = kw("func")
        .ignore_then(global())
        .then(body)
        .map_with(|(name, body), e| {
            Item::Func(FuncDecl {
                name,
                body,
                span: e.span(),
            })
        });

    choice((scope_decl, global_decl, func_decl))
        .repeated()
        .collect::<Vec<_>>()
        .map_with(|items, e| Module {
            items,
            span: e.span(),
        })
}

// ── Tests ──
