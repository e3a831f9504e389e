//! Declaration parsing implementation
//!
//! This module handles parsing of:
//! - `DECLARE a, b : T` (expanded into one [`Statement::Declare`] per identifier)
//! - `CONSTANT name = value`
//! - Type clauses, including `ARRAY[l:u, ...] OF T` with literal bounds and
//!   `POINTER TO T` / `^T`
//! - `PROCEDURE` and `FUNCTION` definitions and their parameter lists
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{SyntaxError, TokenKind};
use crate::parser::parse::Parser;

impl Parser {
    /// Parse `DECLARE id {, id} : type` (the `DECLARE` keyword is already consumed)
    pub(crate) fn parse_declare(&mut self, location: SourceLocation) -> Result<Vec<Statement>, SyntaxError> {
        let mut names = vec![self.expect_identifier()?];
        while self.match_kind(&TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }

        self.expect_colon("after declared identifiers")?;
        let data_type = self.parse_type()?;
        self.expect_end_of_statement()?;

        Ok(names
            .into_iter()
            .map(|name| Statement::Declare {
                name,
                data_type: data_type.clone(),
                location,
            })
            .collect())
    }

    /// Parse `CONSTANT name = expr` (or `←`)
    pub(crate) fn parse_constant(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let name = self.expect_identifier()?;
        if !self.match_operator("=") && !self.match_kind(&TokenKind::Assign) {
            return Err(self.error_here(format!(
                "Expected '=' after constant name, found {}",
                self.peek()
            )));
        }
        let value = self.parse_expression()?;
        self.expect_end_of_statement()?;

        Ok(Statement::Constant {
            name,
            value,
            location,
        })
    }

    /// Parse a type clause
    pub(crate) fn parse_type(&mut self) -> Result<DataType, SyntaxError> {
        let token = self.peek().clone();

        if token.kind == TokenKind::Keyword {
            if let Some(scalar) = DataType::from_keyword(&token.text) {
                self.advance();
                return Ok(scalar);
            }
        }

        if self.match_keyword("ARRAY") {
            let mut dims = Vec::new();
            if self.match_kind(&TokenKind::LBracket) {
                loop {
                    dims.push(self.parse_bounds()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_kind(&TokenKind::RBracket, "Expected ']' after array bounds")?;
            }
            self.expect_keyword("OF", "after array bounds")?;
            let element = self.nested(Self::parse_type)?;
            if element.is_array() {
                return Err(SyntaxError::new(
                    "Array element type cannot itself be an array; use multiple dimensions",
                    token.location,
                ));
            }
            return Ok(DataType::Array {
                dims,
                element: Box::new(element),
            });
        }

        if self.match_keyword("POINTER") {
            self.expect_keyword("TO", "after 'POINTER'")?;
            let target = self.nested(Self::parse_type)?;
            return Ok(DataType::Pointer(Box::new(target)));
        }

        if self.match_operator("^") {
            let target = self.nested(Self::parse_type)?;
            return Ok(DataType::Pointer(Box::new(target)));
        }

        Err(self.error_here(format!("Expected type, found {}", token)))
    }

    /// Parse `lower:upper`; both ends must be integer literals (optionally negative)
    fn parse_bounds(&mut self) -> Result<Bounds, SyntaxError> {
        let lower = self.parse_literal_bound()?;
        self.expect_colon("between array bounds")?;
        let upper = self.parse_literal_bound()?;
        Ok(Bounds::new(lower, upper))
    }

    fn parse_literal_bound(&mut self) -> Result<i64, SyntaxError> {
        let location = self.current_location();
        let negative = self.match_operator("-");
        let kind = self.peek().kind.clone();
        match kind {
            TokenKind::Number(n) if n.fract() == 0.0 => {
                self.advance();
                Ok(if negative { -(n as i64) } else { n as i64 })
            }
            _ => Err(SyntaxError::new(
                format!(
                    "Array bounds must be literal integers, found {}",
                    self.peek()
                ),
                location,
            )),
        }
    }

    /// Parse `PROCEDURE name(params) ... ENDPROCEDURE` or
    /// `FUNCTION name(params) RETURNS type ... ENDFUNCTION`
    pub(crate) fn parse_callable(
        &mut self,
        is_function: bool,
        location: SourceLocation,
    ) -> Result<Statement, SyntaxError> {
        let kind = if is_function { "FUNCTION" } else { "PROCEDURE" };
        if self.block_depth > 0 {
            return Err(SyntaxError::new(
                format!("{} definitions are only allowed at the top level", kind),
                location,
            ));
        }

        let name = self.expect_identifier()?;
        let params = if self.check_kind(&TokenKind::LParen) {
            self.parse_parameter_list()?
        } else {
            Vec::new()
        };

        let return_type = if is_function {
            self.expect_keyword("RETURNS", "after function parameters")?;
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect_end_of_statement()?;

        let terminator = if is_function { "ENDFUNCTION" } else { "ENDPROCEDURE" };
        let body = self.parse_block(&[terminator])?;
        self.expect_keyword(terminator, &format!("to close {} '{}'", kind, name))?;
        self.expect_end_of_statement()?;

        let def = CallableDef {
            name,
            params,
            return_type,
            body,
            location,
        };
        Ok(if is_function {
            Statement::Function(def)
        } else {
            Statement::Procedure(def)
        })
    }

    /// Parse `( [BYVAL|BYREF] name : type, ... )`. The passing mode carries
    /// over to following parameters until another mode keyword appears.
    fn parse_parameter_list(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.expect_lparen("before parameter list")?;
        let mut params = Vec::new();

        if self.match_kind(&TokenKind::RParen) {
            return Ok(params);
        }

        let mut mode = PassMode::ByVal;
        loop {
            if self.match_keyword("BYREF") {
                mode = PassMode::ByRef;
            } else if self.match_keyword("BYVAL") {
                mode = PassMode::ByVal;
            }

            let name = self.expect_identifier()?;
            self.expect_colon("after parameter name")?;
            let param_type = self.parse_type()?;
            if params.iter().any(|p: &Param| p.name == name) {
                return Err(self.error_here(format!("Duplicate parameter '{}'", name)));
            }
            params.push(Param {
                name,
                param_type,
                mode,
            });

            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_rparen("after parameters")?;
        Ok(params)
    }
}
