//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including helper methods and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: `DECLARE`, `CONSTANT`, type clauses, procedure/function headers
//! - `statements`: Parsing statements (IF, WHILE, FOR, CASE, file I/O, ...)
//! - `expressions`: Parsing expressions with explicit precedence levels
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.
//!
//! Newlines are statement separators: every simple statement must be followed
//! by a newline or the end of input, and block statements scan statements until
//! one of a caller-supplied set of terminator keywords appears.

use crate::interpreter::constants::MAX_NESTING_DEPTH;
use crate::parser::ast::*;
use crate::parser::lexer::{Lexer, SyntaxError, Token, TokenKind};

/// Tokenize and parse a complete program
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    Parser::new(source)?.parse_program()
}

/// Recursive descent parser for pseudocode
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    /// Nesting depth of block statements; definitions are only legal at depth 0
    pub(crate) block_depth: usize,
    /// Nesting depth of expressions and type clauses
    pub(crate) expr_depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, SyntaxError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self::from_tokens(tokens))
    }

    /// Build a parser over an existing token stream. Comment tokens are dropped.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let location = tokens.last().map(|t| t.location).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", location));
        }
        Self {
            tokens,
            position: 0,
            block_depth: 0,
            expr_depth: 0,
        }
    }

    /// Parse the entire program
    pub fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let mut program = Program::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            self.parse_statement_into(&mut program.statements)?;
        }

        Ok(program)
    }

    /// Parse statements until one of `terminators` is the current token.
    /// The terminator itself is not consumed.
    pub(crate) fn parse_block(&mut self, terminators: &[&str]) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        self.enter_block()?;

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                self.block_depth -= 1;
                return Err(SyntaxError::new(
                    format!("Expected {}, found end of input", describe_keywords(terminators)),
                    self.current_location(),
                ));
            }
            if terminators.iter().any(|kw| self.peek().is_keyword(kw)) {
                break;
            }
            if let Err(e) = self.parse_statement_into(&mut statements) {
                self.block_depth -= 1;
                return Err(e);
            }
        }

        self.block_depth -= 1;
        Ok(statements)
    }

    /// Step one block deeper, refusing blocks nested past [`MAX_NESTING_DEPTH`]
    pub(crate) fn enter_block(&mut self) -> Result<(), SyntaxError> {
        if self.block_depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here(format!(
                "Blocks are nested more than {} levels deep",
                MAX_NESTING_DEPTH
            )));
        }
        self.block_depth += 1;
        Ok(())
    }

    /// Run `parse` one expression level deeper. Parentheses, prefix operators,
    /// call arguments and type clauses all nest through here.
    pub(crate) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.expr_depth >= MAX_NESTING_DEPTH {
            return Err(self.error_here(format!(
                "Expression is nested more than {} levels deep",
                MAX_NESTING_DEPTH
            )));
        }
        self.expr_depth += 1;
        let result = parse(self);
        self.expr_depth -= 1;
        result
    }

    // ===== Helper methods =====

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if !self.is_at_end() {
            self.position += 1;
        }
        token
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location
    }

    pub(crate) fn check_kind(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_keyword(&self, word: &str) -> bool {
        self.peek().is_keyword(word)
    }

    pub(crate) fn match_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_operator(&self, op: &str) -> bool {
        self.peek().is_operator(op)
    }

    pub(crate) fn match_operator(&mut self, op: &str) -> bool {
        if self.check_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check_kind(&TokenKind::Newline) {
            self.advance();
        }
    }

    pub(crate) fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_location())
    }

    pub(crate) fn expect_kind(&mut self, kind: &TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check_kind(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!("{}, found {}", message, self.peek())))
        }
    }

    pub(crate) fn expect_keyword(&mut self, word: &str, ctx: &str) -> Result<(), SyntaxError> {
        if self.match_keyword(word) {
            Ok(())
        } else {
            Err(self.error_here(format!("Expected '{}' {}, found {}", word, ctx, self.peek())))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<(), SyntaxError> {
        self.expect_kind(&TokenKind::LParen, &format!("Expected '(' {ctx}"))
            .map(|_| ())
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), SyntaxError> {
        self.expect_kind(&TokenKind::RParen, &format!("Expected ')' {ctx}"))
            .map(|_| ())
    }

    pub(crate) fn expect_colon(&mut self, ctx: &str) -> Result<(), SyntaxError> {
        self.expect_kind(&TokenKind::Colon, &format!("Expected ':' {ctx}"))
            .map(|_| ())
    }

    pub(crate) fn expect_assign(&mut self, ctx: &str) -> Result<(), SyntaxError> {
        self.expect_kind(&TokenKind::Assign, &format!("Expected '←' {ctx}"))
            .map(|_| ())
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, SyntaxError> {
        if self.check_kind(&TokenKind::Identifier) {
            Ok(self.advance().text)
        } else {
            Err(self.error_here(format!("Expected identifier, found {}", self.peek())))
        }
    }

    /// Every simple statement ends at a newline or at end of input
    pub(crate) fn expect_end_of_statement(&mut self) -> Result<(), SyntaxError> {
        if self.is_at_end() || self.match_kind(&TokenKind::Newline) {
            Ok(())
        } else {
            Err(self.error_here(format!("Expected end of line, found {}", self.peek())))
        }
    }
}

fn describe_keywords(words: &[&str]) -> String {
    let quoted: Vec<String> = words.iter().map(|w| format!("'{}'", w)).collect();
    quoted.join(" or ")
}
