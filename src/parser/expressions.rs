//! Expression parsing implementation
//!
//! Precedence, lowest to highest:
//!
//! | level          | operators                         | notes                     |
//! |----------------|-----------------------------------|---------------------------|
//! | or             | `OR`                              | left-assoc                |
//! | and            | `AND`                             | left-assoc                |
//! | not            | `NOT`                             | right-assoc prefix        |
//! | comparison     | `= <> < > <= >=`                  | non-chaining              |
//! | additive       | `+ - &`                           | `&` is string concat      |
//! | multiplicative | `* / DIV MOD`                     | left-assoc                |
//! | unary          | `-`, prefix `&` (address-of), prefix `*` (dereference) |  |
//! | primary        | literals, identifiers, calls, `MALLOC`, `SIZE_OF`, `EOF` |  |
//!
//! `&` and `*` are pointer operators only in prefix position; between two
//! operands they are concatenation and multiplication.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{SyntaxError, TokenKind};
use crate::parser::parse::Parser;

impl Parser {
    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::parse_or)
    }

    /// Parse logical OR
    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;

        while self.check_keyword("OR") {
            let location = self.advance().location;
            let right = self.parse_and()?;
            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }

        Ok(left)
    }

    /// Parse logical AND
    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;

        while self.check_keyword("AND") {
            let location = self.advance().location;
            let right = self.parse_not()?;
            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }

        Ok(left)
    }

    /// Parse `NOT` (right-associative prefix)
    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        if self.check_keyword("NOT") {
            let location = self.advance().location;
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::UnaryOp {
                op: UnOp::Not,
                operand: Box::new(operand),
                location,
            });
        }

        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<BinOp> {
        let token = self.peek();
        if token.kind != TokenKind::Operator {
            return None;
        }
        match token.text.as_str() {
            "=" => Some(BinOp::Eq),
            "<>" => Some(BinOp::Ne),
            "<" => Some(BinOp::Lt),
            "<=" => Some(BinOp::Le),
            ">" => Some(BinOp::Gt),
            ">=" => Some(BinOp::Ge),
            _ => None,
        }
    }

    /// Parse a single (non-chaining) comparison
    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_additive()?;

        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        let location = self.advance().location;
        let right = self.parse_additive()?;

        if self.comparison_op().is_some() {
            return Err(self.error_here(
                "Comparison operators cannot be chained; combine comparisons with AND/OR",
            ));
        }

        Ok(Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            location,
        })
    }

    /// Parse `+`, `-` and `&` (concatenation)
    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = if self.check_operator("+") {
                BinOp::Add
            } else if self.check_operator("-") {
                BinOp::Sub
            } else if self.check_operator("&") {
                BinOp::Concat
            } else {
                break;
            };
            let location = self.advance().location;
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }

        Ok(left)
    }

    /// Parse `*`, `/`, `DIV` and `MOD`
    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = if self.check_operator("*") {
                BinOp::Mul
            } else if self.check_operator("/") {
                BinOp::Div
            } else if self.check_keyword("DIV") {
                BinOp::IntDiv
            } else if self.check_keyword("MOD") {
                BinOp::Mod
            } else {
                break;
            };
            let location = self.advance().location;
            let right = self.parse_unary()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location,
            };
        }

        Ok(left)
    }

    /// Parse prefix `-`, `&` (address-of) and `*` (dereference)
    pub(crate) fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.check_operator("-") {
            let location = self.advance().location;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::UnaryOp {
                op: UnOp::Neg,
                operand: Box::new(operand),
                location,
            });
        }

        if self.check_operator("&") {
            let location = self.advance().location;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::AddressOf {
                operand: Box::new(operand),
                location,
            });
        }

        if self.check_operator("*") {
            let location = self.advance().location;
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Dereference {
                operand: Box::new(operand),
                location,
            });
        }

        self.parse_primary()
    }

    /// Parse primary expressions
    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let location = token.location;

        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n), location))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(Literal::String(token.text), location))
            }
            TokenKind::Char => {
                self.advance();
                let c = token.text.chars().next().unwrap_or_default();
                Ok(Expr::Literal(Literal::Char(c), location))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            TokenKind::Identifier => {
                self.advance();
                let name = token.text;
                if self.check_kind(&TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    Ok(Expr::FunctionCall {
                        name,
                        args,
                        location,
                    })
                } else if self.match_kind(&TokenKind::LBracket) {
                    let mut indices = vec![self.parse_expression()?];
                    while self.match_kind(&TokenKind::Comma) {
                        indices.push(self.parse_expression()?);
                    }
                    self.expect_kind(&TokenKind::RBracket, "Expected ']' after array indices")?;
                    Ok(Expr::ArrayAccess {
                        name,
                        indices,
                        location,
                    })
                } else {
                    Ok(Expr::Identifier(name, location))
                }
            }
            TokenKind::Keyword => match token.text.as_str() {
                "TRUE" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Boolean(true), location))
                }
                "FALSE" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Boolean(false), location))
                }
                "NULL" => {
                    self.advance();
                    Ok(Expr::Literal(Literal::Null, location))
                }
                "MALLOC" => {
                    self.advance();
                    self.parse_malloc(location)
                }
                "SIZE_OF" => {
                    self.advance();
                    self.expect_lparen("after SIZE_OF")?;
                    let target_type = self.parse_type()?;
                    self.expect_rparen("after SIZE_OF type")?;
                    Ok(Expr::SizeOf {
                        target_type,
                        location,
                    })
                }
                "EOF" => {
                    self.advance();
                    self.expect_lparen("after EOF")?;
                    let file = self.parse_expression()?;
                    self.expect_rparen("after EOF file name")?;
                    Ok(Expr::Eof {
                        file: Box::new(file),
                        location,
                    })
                }
                _ => Err(self.error_here(format!("Expected expression, found {}", token))),
            },
            _ => Err(self.error_here(format!("Expected expression, found {}", token))),
        }
    }

    /// `MALLOC(size [, TYPE])`
    fn parse_malloc(&mut self, location: SourceLocation) -> Result<Expr, SyntaxError> {
        self.expect_lparen("after MALLOC")?;
        let size = self.parse_expression()?;
        let element_type = if self.match_kind(&TokenKind::Comma) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect_rparen("after MALLOC arguments")?;

        Ok(Expr::MemoryAllocation {
            size: Box::new(size),
            element_type,
            location,
        })
    }

    /// `( [expr {, expr}] )`
    pub(crate) fn parse_arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        self.expect_lparen("before arguments")?;
        let mut args = Vec::new();

        if self.match_kind(&TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_expression()?);
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_rparen("after arguments")?;
        Ok(args)
    }
}
