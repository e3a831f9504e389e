//! Lexer (tokenizer) for pseudocode source
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the parser.
//! Newlines are significant (one statement per physical line) and are emitted
//! as [`TokenKind::Newline`] tokens. Comments are emitted as
//! [`TokenKind::Comment`] tokens and filtered out by the parser.

use super::ast::SourceLocation;
use std::fmt;
use thiserror::Error;

/// Reserved words. Matching is exact and case-sensitive.
pub const KEYWORDS: &[&str] = &[
    "DECLARE", "CONSTANT", "INTEGER", "REAL", "STRING", "CHAR", "BOOLEAN", "ARRAY", "OF",
    "POINTER", "TO", "OUTPUT", "INPUT", "IF", "THEN", "ELSE", "ENDIF", "WHILE", "DO",
    "ENDWHILE", "REPEAT", "UNTIL", "FOR", "STEP", "NEXT", "CASE", "OTHERWISE", "ENDCASE",
    "PROCEDURE", "ENDPROCEDURE", "FUNCTION", "RETURNS", "ENDFUNCTION", "RETURN", "CALL",
    "BYVAL", "BYREF", "AND", "OR", "NOT", "DIV", "MOD", "TRUE", "FALSE", "OPENFILE", "READ",
    "WRITE", "APPEND", "READFILE", "WRITEFILE", "CLOSEFILE", "EOF", "MALLOC", "FREE",
    "SIZE_OF", "NULL",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Token categories
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number(f64),
    String,
    Char,
    Operator,
    /// `←` or `<--`
    Assign,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Newline,
    Comment,
    Eof,
}

/// A single token. `text` holds the keyword/identifier/operator spelling, or the
/// decoded contents of a string/char literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Keyword => write!(f, "'{}'", self.text),
            TokenKind::Identifier => write!(f, "identifier '{}'", self.text),
            TokenKind::Number(_) => write!(f, "number {}", self.text),
            TokenKind::String => write!(f, "string literal \"{}\"", self.text),
            TokenKind::Char => write!(f, "char literal '{}'", self.text),
            TokenKind::Operator => write!(f, "'{}'", self.text),
            TokenKind::Assign => write!(f, "'←'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// Error raised by the tokenizer and the parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at line {}, column {}: {message}", location.line, location.column)]
pub struct SyntaxError {
    pub message: String,
    pub location: SourceLocation,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        SyntaxError {
            message: message.into(),
            location,
        }
    }

    pub fn line(&self) -> usize {
        self.location.line
    }

    pub fn column(&self) -> usize {
        self.location.column
    }
}

/// Convenience wrapper: tokenize a whole source string
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).tokenize()
}

/// Lexer for pseudocode source
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire input. Always ends with an `Eof` token on success.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", self.current_location()));
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let loc = self.current_location();
        let ch = self
            .advance()
            .ok_or_else(|| SyntaxError::new("Unexpected end of input", loc))?;

        match ch {
            '\n' => Ok(Token::new(TokenKind::Newline, "\n", loc)),

            '"' | '\'' => self.quoted_literal(ch, loc),

            '0'..='9' => self.number_literal(ch, loc),

            'a'..='z' | 'A'..='Z' | '_' => Ok(self.identifier_or_keyword(ch, loc)),

            '←' => Ok(Token::new(TokenKind::Assign, "←", loc)),

            '/' if self.peek() == Some('/') => Ok(self.line_comment(loc)),

            '<' => {
                if self.peek() == Some('-') && self.peek_ahead(1) == Some('-') {
                    self.advance();
                    self.advance();
                    Ok(Token::new(TokenKind::Assign, "<--", loc))
                } else if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::Operator, "<=", loc))
                } else if self.peek() == Some('>') {
                    self.advance();
                    Ok(Token::new(TokenKind::Operator, "<>", loc))
                } else {
                    Ok(Token::new(TokenKind::Operator, "<", loc))
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::new(TokenKind::Operator, ">=", loc))
                } else {
                    Ok(Token::new(TokenKind::Operator, ">", loc))
                }
            }
            '+' | '-' | '*' | '/' | '=' | '&' | '^' => {
                Ok(Token::new(TokenKind::Operator, ch.to_string(), loc))
            }
            ',' => Ok(Token::new(TokenKind::Comma, ",", loc)),
            ':' => Ok(Token::new(TokenKind::Colon, ":", loc)),
            '(' => Ok(Token::new(TokenKind::LParen, "(", loc)),
            ')' => Ok(Token::new(TokenKind::RParen, ")", loc)),
            '[' => Ok(Token::new(TokenKind::LBracket, "[", loc)),
            ']' => Ok(Token::new(TokenKind::RBracket, "]", loc)),

            _ => Err(SyntaxError::new(
                format!("Unexpected character: '{}'", ch),
                loc,
            )),
        }
    }

    /// Parse a `"string"` or `'c'` literal; neither may span a line
    fn quoted_literal(&mut self, quote: char, loc: SourceLocation) -> Result<Token, SyntaxError> {
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
            if ch == quote {
                let kind = if quote == '\'' && text.chars().count() == 1 {
                    TokenKind::Char
                } else {
                    TokenKind::String
                };
                return Ok(Token::new(kind, text, loc));
            }
            text.push(ch);
        }

        Err(SyntaxError::new("Unterminated string literal", loc))
    }

    /// Parse a decimal (`12`, `3.5`) or hexadecimal (`0x1F`) literal
    fn number_literal(&mut self, first_digit: char, loc: SourceLocation) -> Result<Token, SyntaxError> {
        if first_digit == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.advance();
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_alphanumeric() {
                    digits.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            let value = u64::from_str_radix(&digits, 16).map_err(|_| {
                SyntaxError::new(format!("Malformed hexadecimal literal: 0x{}", digits), loc)
            })?;
            return Ok(Token::new(
                TokenKind::Number(value as f64),
                format!("0x{}", digits),
                loc,
            ));
        }

        let mut num_str = String::new();
        num_str.push(first_digit);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num_str.push(ch);
                self.advance();
            } else if ch == '.'
                && !num_str.contains('.')
                && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit())
            {
                num_str.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let value = num_str
            .parse::<f64>()
            .map_err(|_| SyntaxError::new(format!("Invalid number literal: {}", num_str), loc))?;

        Ok(Token::new(TokenKind::Number(value), num_str, loc))
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char, loc: SourceLocation) -> Token {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_keyword(&ident) {
            Token::new(TokenKind::Keyword, ident, loc)
        } else {
            Token::new(TokenKind::Identifier, ident, loc)
        }
    }

    /// `// ...` up to (not including) the newline
    fn line_comment(&mut self, loc: SourceLocation) -> Token {
        self.advance(); // second '/'
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        Token::new(TokenKind::Comment, text.trim().to_string(), loc)
    }

    /// Skip horizontal whitespace; newlines are tokens
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\u{feff}' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}
