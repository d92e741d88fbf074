// tfopc — Tensor-op canonicalization pass
//
// Library root. Front end (lexer → parser → build), arena IR, and the pass
// phases (decode → validate → canonicalize, plus factory lowering).

pub mod array_literal;
pub mod ast;
pub mod build;
pub mod canonicalize;
pub mod constant;
pub mod decode;
pub mod diag;
pub mod dtype;
pub mod emit;
pub mod factory;
pub mod id;
pub mod ir;
pub mod lexer;
pub mod location;
pub mod opclass;
pub mod parser;
pub mod pipeline;
pub mod printer;
pub mod validate;
