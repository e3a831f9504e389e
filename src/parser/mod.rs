//! Pseudocode source parser
//!
//! This module transforms pseudocode source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens)
//! - [`parse`]: Parser coordinator and helpers (tokens → AST)
//! - [`ast`]: AST node definitions
//!
//! # Language surface
//!
//! - Types: `INTEGER`, `REAL`, `STRING`, `CHAR`, `BOOLEAN`, `ARRAY[l:u, ...] OF T`,
//!   `POINTER TO T` (also written `^T`)
//! - Statements: `DECLARE`, `CONSTANT`, assignment (`←` or `<--`), `OUTPUT`, `INPUT`,
//!   `IF`, `WHILE`, `REPEAT`, `FOR`, `CASE`, `PROCEDURE`/`FUNCTION` definitions,
//!   `CALL`, `RETURN`, file I/O and `FREE`
//! - Expressions: arithmetic, string concatenation, comparison, logic, function calls,
//!   array indexing, `&` address-of, `*` dereference, `MALLOC`, `SIZE_OF`, `EOF`
//!
//! Keywords are upper-case and matched exactly. Identifiers are case-sensitive.
//! One statement per physical line.
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with one method per precedence level.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
mod statements;

pub use lexer::{tokenize, SyntaxError, Token, TokenKind};
pub use parse::{parse, Parser};
