// AST (Abstract Syntax Tree) definitions for the pseudocode interpreter

use std::fmt;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Inclusive `[lower:upper]` bounds of one array dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub lower: i64,
    pub upper: i64,
}

impl Bounds {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    /// Number of elements in this dimension (0 for an inverted range).
    /// Saturates at `usize::MAX` for ranges wider than the address space.
    pub fn len(&self) -> usize {
        if self.upper < self.lower {
            0
        } else {
            let width = self.upper as i128 - self.lower as i128 + 1;
            usize::try_from(width).unwrap_or(usize::MAX)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: i64) -> bool {
        index >= self.lower && index <= self.upper
    }
}

/// Declared data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Real,
    String,
    Char,
    Boolean,
    /// `ARRAY[l:u, ...] OF T`; `dims` is empty for an unsized parameter type
    Array {
        dims: Vec<Bounds>,
        element: Box<DataType>,
    },
    /// `POINTER TO T` / `^T`
    Pointer(Box<DataType>),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Real)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, DataType::Array { .. })
    }

    /// Look up a scalar type by its keyword spelling
    pub fn from_keyword(name: &str) -> Option<DataType> {
        match name {
            "INTEGER" => Some(DataType::Integer),
            "REAL" => Some(DataType::Real),
            "STRING" => Some(DataType::String),
            "CHAR" => Some(DataType::Char),
            "BOOLEAN" => Some(DataType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Real => write!(f, "REAL"),
            DataType::String => write!(f, "STRING"),
            DataType::Char => write!(f, "CHAR"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Array { dims, element } => {
                if dims.is_empty() {
                    write!(f, "ARRAY OF {}", element)
                } else {
                    let dims: Vec<String> = dims
                        .iter()
                        .map(|b| format!("{}:{}", b.lower, b.upper))
                        .collect();
                    write!(f, "ARRAY[{}] OF {}", dims.join(", "), element)
                }
            }
            DataType::Pointer(target) => write!(f, "POINTER TO {}", target),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    IntDiv, // DIV
    Mod,
    // String concatenation
    Concat, // &
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IntDiv => "DIV",
            BinOp::Mod => "MOD",
            BinOp::Concat => "&",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        };
        write!(f, "{}", s)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg, // -x
    Not, // NOT x
}

/// Parameter passing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassMode {
    #[default]
    ByVal,
    ByRef,
}

/// Procedure / function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub param_type: DataType,
    pub mode: PassMode,
}

/// File open modes for `OPENFILE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    Write,
    Append,
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Read => write!(f, "READ"),
            FileMode::Write => write!(f, "WRITE"),
            FileMode::Append => write!(f, "APPEND"),
        }
    }
}

/// Literal values appearing in source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Char(char),
    Boolean(bool),
    Null,
}

/// A single `CASE` branch label
#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    Value(Literal),
    Range(Literal, Literal),
}

/// A `CASE` branch: label and the statements executed when it matches
#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub label: CaseLabel,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

/// `PROCEDURE` / `FUNCTION` definition
#[derive(Debug, Clone, PartialEq)]
pub struct CallableDef {
    pub name: String,
    pub params: Vec<Param>,
    /// `Some` for functions, `None` for procedures
    pub return_type: Option<DataType>,
    pub body: Vec<Statement>,
    pub location: SourceLocation,
}

impl CallableDef {
    pub fn is_function(&self) -> bool {
        self.return_type.is_some()
    }
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Declare {
        name: String,
        data_type: DataType,
        location: SourceLocation,
    },
    Constant {
        name: String,
        value: Expr,
        location: SourceLocation,
    },
    Assignment {
        target: Expr,
        value: Expr,
        location: SourceLocation,
    },
    Output {
        items: Vec<Expr>,
        location: SourceLocation,
    },
    Input {
        target: Expr,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
        location: SourceLocation,
    },
    Repeat {
        body: Vec<Statement>,
        condition: Expr,
        location: SourceLocation,
    },
    For {
        variable: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
        body: Vec<Statement>,
        location: SourceLocation,
    },
    Case {
        subject: Expr,
        branches: Vec<CaseBranch>,
        otherwise: Option<Vec<Statement>>,
        location: SourceLocation,
    },
    Procedure(CallableDef),
    Function(CallableDef),
    Call {
        name: String,
        args: Vec<Expr>,
        location: SourceLocation,
    },
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },
    OpenFile {
        file: Expr,
        mode: FileMode,
        location: SourceLocation,
    },
    ReadFile {
        file: Expr,
        target: Expr,
        location: SourceLocation,
    },
    WriteFile {
        file: Expr,
        value: Expr,
        location: SourceLocation,
    },
    CloseFile {
        file: Expr,
        location: SourceLocation,
    },
    Free {
        pointer: Expr,
        location: SourceLocation,
    },
}

impl Statement {
    /// Get the source location of this statement
    pub fn location(&self) -> SourceLocation {
        match self {
            Statement::Declare { location, .. }
            | Statement::Constant { location, .. }
            | Statement::Assignment { location, .. }
            | Statement::Output { location, .. }
            | Statement::Input { location, .. }
            | Statement::If { location, .. }
            | Statement::While { location, .. }
            | Statement::Repeat { location, .. }
            | Statement::For { location, .. }
            | Statement::Case { location, .. }
            | Statement::Call { location, .. }
            | Statement::Return { location, .. }
            | Statement::OpenFile { location, .. }
            | Statement::ReadFile { location, .. }
            | Statement::WriteFile { location, .. }
            | Statement::CloseFile { location, .. }
            | Statement::Free { location, .. } => *location,
            Statement::Procedure(def) | Statement::Function(def) => def.location,
        }
    }

    pub fn line(&self) -> usize {
        self.location().line
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal, SourceLocation),
    Identifier(String, SourceLocation),
    ArrayAccess {
        name: String,
        indices: Vec<Expr>,
        location: SourceLocation,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        location: SourceLocation,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        location: SourceLocation,
    },
    AddressOf {
        operand: Box<Expr>,
        location: SourceLocation,
    },
    Dereference {
        operand: Box<Expr>,
        location: SourceLocation,
    },
    MemoryAllocation {
        size: Box<Expr>,
        element_type: Option<DataType>,
        location: SourceLocation,
    },
    SizeOf {
        target_type: DataType,
        location: SourceLocation,
    },
    Eof {
        file: Box<Expr>,
        location: SourceLocation,
    },
}

impl Expr {
    /// Get the source location of this expression
    pub fn location(&self) -> SourceLocation {
        match self {
            Expr::Literal(_, loc) | Expr::Identifier(_, loc) => *loc,
            Expr::ArrayAccess { location, .. }
            | Expr::BinaryOp { location, .. }
            | Expr::UnaryOp { location, .. }
            | Expr::FunctionCall { location, .. }
            | Expr::AddressOf { location, .. }
            | Expr::Dereference { location, .. }
            | Expr::MemoryAllocation { location, .. }
            | Expr::SizeOf { location, .. }
            | Expr::Eof { location, .. } => *location,
        }
    }

    pub fn line(&self) -> usize {
        self.location().line
    }
}

/// Top-level program structure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// All top-level procedure and function definitions
    pub fn callables(&self) -> impl Iterator<Item = &CallableDef> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Procedure(def) | Statement::Function(def) => Some(def),
            _ => None,
        })
    }
}
