//! Statement parsing implementation
//!
//! This module handles parsing of all pseudocode statement types, including:
//!
//! - Assignments (`x ← e`, `A[i, j] ← e`, `*p ← e`)
//! - `OUTPUT` / `INPUT`
//! - Control flow (`IF`, `WHILE`, `REPEAT`, `FOR`, `CASE`)
//! - `CALL` and `RETURN`
//! - File statements (`OPENFILE`, `READFILE`, `WRITEFILE`, `CLOSEFILE`)
//! - `FREE`
//!
//! Declarations and procedure/function definitions live in `declarations`.
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{SyntaxError, TokenKind};
use crate::parser::parse::Parser;

impl Parser {
    /// Parse one statement, appending the resulting node(s) to `out`
    pub(crate) fn parse_statement_into(&mut self, out: &mut Vec<Statement>) -> Result<(), SyntaxError> {
        let token = self.peek().clone();
        let loc = token.location;

        if token.kind == TokenKind::Keyword {
            match token.text.as_str() {
                "DECLARE" => {
                    self.advance();
                    out.extend(self.parse_declare(loc)?);
                    return Ok(());
                }
                "CONSTANT" => {
                    self.advance();
                    out.push(self.parse_constant(loc)?);
                    return Ok(());
                }
                "PROCEDURE" | "FUNCTION" => {
                    self.advance();
                    out.push(self.parse_callable(token.text == "FUNCTION", loc)?);
                    return Ok(());
                }
                _ => {}
            }
        }

        let statement = self.parse_statement()?;
        out.push(statement);
        Ok(())
    }

    /// Parse a single non-declaration statement
    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        let token = self.peek().clone();
        let loc = token.location;

        match token.kind {
            TokenKind::Keyword => {
                self.advance();
                match token.text.as_str() {
                    "OUTPUT" => self.parse_output(loc),
                    "INPUT" => {
                        let target = self.parse_assignable()?;
                        self.expect_end_of_statement()?;
                        Ok(Statement::Input {
                            target,
                            location: loc,
                        })
                    }
                    "IF" => self.parse_if(loc),
                    "WHILE" => self.parse_while(loc),
                    "REPEAT" => self.parse_repeat(loc),
                    "FOR" => self.parse_for(loc),
                    "CASE" => self.parse_case(loc),
                    "CALL" => self.parse_call(loc),
                    "RETURN" => {
                        let value = if self.is_at_end() || self.check_kind(&TokenKind::Newline) {
                            None
                        } else {
                            Some(self.parse_expression()?)
                        };
                        self.expect_end_of_statement()?;
                        Ok(Statement::Return {
                            value,
                            location: loc,
                        })
                    }
                    "OPENFILE" => self.parse_openfile(loc),
                    "READFILE" => {
                        let file = self.parse_expression()?;
                        self.expect_kind(&TokenKind::Comma, "Expected ',' after file name")?;
                        let target = self.parse_assignable()?;
                        self.expect_end_of_statement()?;
                        Ok(Statement::ReadFile {
                            file,
                            target,
                            location: loc,
                        })
                    }
                    "WRITEFILE" => {
                        let file = self.parse_expression()?;
                        self.expect_kind(&TokenKind::Comma, "Expected ',' after file name")?;
                        let value = self.parse_expression()?;
                        self.expect_end_of_statement()?;
                        Ok(Statement::WriteFile {
                            file,
                            value,
                            location: loc,
                        })
                    }
                    "CLOSEFILE" => {
                        let file = self.parse_expression()?;
                        self.expect_end_of_statement()?;
                        Ok(Statement::CloseFile {
                            file,
                            location: loc,
                        })
                    }
                    "FREE" => {
                        let pointer = self.parse_expression()?;
                        self.expect_end_of_statement()?;
                        Ok(Statement::Free {
                            pointer,
                            location: loc,
                        })
                    }
                    other => Err(SyntaxError::new(
                        format!("Unexpected '{}' at start of statement", other),
                        loc,
                    )),
                }
            }
            TokenKind::Identifier => self.parse_assignment(loc),
            TokenKind::Operator if token.text == "*" => self.parse_assignment(loc),
            _ => Err(SyntaxError::new(
                format!("Unexpected {} at start of statement", token),
                loc,
            )),
        }
    }

    /// `target ← expr`
    fn parse_assignment(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let target = self.parse_assignable()?;
        self.expect_assign("in assignment")?;
        let value = self.parse_expression()?;
        self.expect_end_of_statement()?;

        Ok(Statement::Assignment {
            target,
            value,
            location,
        })
    }

    /// An assignable location: identifier, array element, or dereference
    pub(crate) fn parse_assignable(&mut self) -> Result<Expr, SyntaxError> {
        let location = self.current_location();
        let target = self.parse_unary()?;
        match target {
            Expr::Identifier(..) | Expr::ArrayAccess { .. } | Expr::Dereference { .. } => Ok(target),
            _ => Err(SyntaxError::new(
                "Expected a variable, array element, or dereferenced pointer",
                location,
            )),
        }
    }

    /// `OUTPUT e1, e2, ...`
    fn parse_output(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let mut items = vec![self.parse_expression()?];
        while self.match_kind(&TokenKind::Comma) {
            items.push(self.parse_expression()?);
        }
        self.expect_end_of_statement()?;

        Ok(Statement::Output { items, location })
    }

    /// `IF cond [THEN] ... [ELSE ...] ENDIF`
    fn parse_if(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let condition = self.parse_expression()?;
        self.skip_newlines();
        self.match_keyword("THEN");

        let then_branch = self.parse_block(&["ELSE", "ENDIF"])?;
        let else_branch = if self.match_keyword("ELSE") {
            Some(self.parse_block(&["ENDIF"])?)
        } else {
            None
        };

        self.expect_keyword("ENDIF", "to close IF")?;
        self.expect_end_of_statement()?;

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
            location,
        })
    }

    /// `WHILE cond [DO] ... ENDWHILE`
    fn parse_while(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let condition = self.parse_expression()?;
        self.match_keyword("DO");
        self.expect_end_of_statement()?;

        let body = self.parse_block(&["ENDWHILE"])?;
        self.expect_keyword("ENDWHILE", "to close WHILE")?;
        self.expect_end_of_statement()?;

        Ok(Statement::While {
            condition,
            body,
            location,
        })
    }

    /// `REPEAT ... UNTIL cond`
    fn parse_repeat(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        self.expect_end_of_statement()?;
        let body = self.parse_block(&["UNTIL"])?;
        self.expect_keyword("UNTIL", "to close REPEAT")?;
        let condition = self.parse_expression()?;
        self.expect_end_of_statement()?;

        Ok(Statement::Repeat {
            body,
            condition,
            location,
        })
    }

    /// `FOR v ← start TO end [STEP step] ... NEXT [v]`
    fn parse_for(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let variable = self.expect_identifier()?;
        self.expect_assign("after FOR loop variable")?;
        let start = self.parse_expression()?;
        self.expect_keyword("TO", "in FOR loop")?;
        let end = self.parse_expression()?;
        let step = if self.match_keyword("STEP") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_end_of_statement()?;

        let body = self.parse_block(&["NEXT"])?;
        let next_location = self.current_location();
        self.expect_keyword("NEXT", "to close FOR")?;
        if self.check_kind(&TokenKind::Identifier) {
            let closing = self.advance().text;
            if closing != variable {
                return Err(SyntaxError::new(
                    format!(
                        "NEXT {} does not match FOR loop variable '{}'",
                        closing, variable
                    ),
                    next_location,
                ));
            }
        }
        self.expect_end_of_statement()?;

        Ok(Statement::For {
            variable,
            start,
            end,
            step,
            body,
            location,
        })
    }

    /// `CASE OF subject` followed by `label : statements` branches,
    /// an optional `OTHERWISE` branch, and `ENDCASE`
    fn parse_case(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        self.expect_keyword("OF", "after CASE")?;
        let subject = self.parse_expression()?;
        self.expect_end_of_statement()?;

        let mut branches = Vec::new();
        let mut otherwise = None;

        loop {
            self.skip_newlines();
            if self.check_keyword("ENDCASE") {
                break;
            }
            if self.is_at_end() {
                return Err(self.error_here("Expected 'ENDCASE', found end of input"));
            }

            if self.match_keyword("OTHERWISE") {
                self.match_kind(&TokenKind::Colon);
                otherwise = Some(self.parse_case_body()?);
                self.skip_newlines();
                if !self.check_keyword("ENDCASE") {
                    return Err(self.error_here(format!(
                        "Expected 'ENDCASE' after OTHERWISE branch, found {}",
                        self.peek()
                    )));
                }
                break;
            }

            let branch_location = self.current_location();
            let label = self.parse_case_label()?;
            self.expect_colon("after CASE label")?;
            let body = self.parse_case_body()?;
            branches.push(CaseBranch {
                label,
                body,
                location: branch_location,
            });
        }

        self.expect_keyword("ENDCASE", "to close CASE")?;
        self.expect_end_of_statement()?;

        Ok(Statement::Case {
            subject,
            branches,
            otherwise,
            location,
        })
    }

    fn parse_case_label(&mut self) -> Result<CaseLabel, SyntaxError> {
        let first = self.parse_case_literal()?;
        if self.match_keyword("TO") {
            let last = self.parse_case_literal()?;
            Ok(CaseLabel::Range(first, last))
        } else {
            Ok(CaseLabel::Value(first))
        }
    }

    fn parse_case_literal(&mut self) -> Result<Literal, SyntaxError> {
        let negative = self.match_operator("-");
        let token = self.peek().clone();
        let literal = match token.kind {
            TokenKind::Number(n) => Literal::Number(if negative { -n } else { n }),
            _ if negative => {
                return Err(self.error_here(format!("Expected number after '-', found {}", token)))
            }
            TokenKind::String => Literal::String(token.text.clone()),
            TokenKind::Char => Literal::Char(token.text.chars().next().unwrap_or_default()),
            TokenKind::Keyword if token.text == "TRUE" => Literal::Boolean(true),
            TokenKind::Keyword if token.text == "FALSE" => Literal::Boolean(false),
            _ => {
                return Err(self.error_here(format!(
                    "Expected a literal CASE label, found {}",
                    token
                )))
            }
        };
        self.advance();
        Ok(literal)
    }

    /// Statements after a CASE label, up to the next label, OTHERWISE or ENDCASE
    fn parse_case_body(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let mut body = Vec::new();
        self.enter_block()?;
        loop {
            self.skip_newlines();
            if self.is_at_end()
                || self.check_keyword("ENDCASE")
                || self.check_keyword("OTHERWISE")
                || self.is_case_label_start()
            {
                break;
            }
            if let Err(e) = self.parse_statement_into(&mut body) {
                self.block_depth -= 1;
                return Err(e);
            }
        }
        self.block_depth -= 1;
        Ok(body)
    }

    fn is_case_label_start(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Number(_) | TokenKind::String | TokenKind::Char => true,
            TokenKind::Keyword => token.text == "TRUE" || token.text == "FALSE",
            TokenKind::Operator => {
                token.text == "-"
                    && self
                        .peek_ahead(1)
                        .is_some_and(|t| matches!(t.kind, TokenKind::Number(_)))
            }
            _ => false,
        }
    }

    /// `CALL name [(args)]`
    fn parse_call(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let name = self.expect_identifier()?;
        let args = if self.check_kind(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        self.expect_end_of_statement()?;

        Ok(Statement::Call {
            name,
            args,
            location,
        })
    }

    /// `OPENFILE name FOR READ|WRITE|APPEND`
    fn parse_openfile(&mut self, location: SourceLocation) -> Result<Statement, SyntaxError> {
        let file = self.parse_expression()?;
        self.expect_keyword("FOR", "after file name in OPENFILE")?;
        let mode = if self.match_keyword("READ") {
            FileMode::Read
        } else if self.match_keyword("WRITE") {
            FileMode::Write
        } else if self.match_keyword("APPEND") {
            FileMode::Append
        } else {
            return Err(self.error_here(format!(
                "Expected READ, WRITE or APPEND, found {}",
                self.peek()
            )));
        };
        self.expect_end_of_statement()?;

        Ok(Statement::OpenFile {
            file,
            mode,
            location,
        })
    }
}
