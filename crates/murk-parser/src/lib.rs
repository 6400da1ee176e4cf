//! murk-parser: JavaScript lexer, parser, arena AST and code generator.
//!
//! # Design
//!
//! 1. **One node sum.** Statements, expressions, patterns and class members
//!    share a single `NodeKind`, so tree rewriters dispatch on one tag.
//! 2. **Arena allocation.** Nodes live in a contiguous vector and reference
//!    children by index. Replacing a node overwrites its slot in place,
//!    which keeps every reference to it valid.
//! 3. **Lexing on demand.** The lexer is driven by the parser, enabling
//!    context-sensitive tokenization (regex vs division, template literal
//!    re-entry).
//!
//! # Example
//!
//! ```
//! use murk_parser::{parse, Codegen, CodegenOptions};
//!
//! let ast = parse("const x = 1 + 2;").unwrap();
//! let options = CodegenOptions { compact: true, ..Default::default() };
//! let (code, _) = Codegen::new(&ast, options).generate().unwrap();
//! assert_eq!(code, "const x=1+2");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::match_same_arms)]

mod ast;
mod codegen;
mod lexer;
mod parser;
mod span;
mod srcmap;
mod token;

pub use ast::{
    AssignOp, Ast, BinaryOp, ClassParts, FunctionParts, MethodKind, Node, NodeId, NodeKind,
    PropertyKind, UnaryOp, UpdateOp, VarKind, NO_NODE,
};
pub use codegen::{format_number, quote_string, Codegen, CodegenOptions, GenError, SourceMapping};
pub use lexer::{Comment, Lexer};
pub use parser::{parse, ParseError, Parser};
pub use span::{LineIndex, Loc, Span};
pub use srcmap::{build_source_map, SourceMap};
pub use token::{Kw, Token, TokenKind};
