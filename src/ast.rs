//! Abstract syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Two closed sum types, [`Expr`] and [`Stmt`], cover every grammar
//! production; the resolver and interpreter match on them exhaustively.
//! Nodes own their children. Function bodies are shared through
//! `Rc<FunctionDecl>` so closures and class methods can point into the tree
//! without cloning it.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

/// Identity of a variable‑referencing expression node.
///
/// The resolver records scope distances keyed by this id. Ids are unique for
/// the whole process so trees parsed later (REPL lines, `eval`, imports)
/// never collide with earlier ones in an interpreter's side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        ExprId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,
    False,
    Nil,
}

/// The name part of a property access: `obj.name` or `obj[expr]`.
#[derive(Debug, Clone)]
pub enum PropertyName {
    /// Plain identifier after a dot.
    Ident(Token),

    /// Computed name inside square brackets. `bracket` is kept for error lines.
    Computed { bracket: Token, expr: Box<Expr> },
}

impl PropertyName {
    /// Token used to attribute errors to a source line.
    pub fn token(&self) -> &Token {
        match self {
            PropertyName::Ident(token) => token,
            PropertyName::Computed { bracket, .. } => bracket,
        }
    }
}

/// A function literal, named or anonymous, or a class method.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn line(&self) -> usize {
        self.name
            .as_ref()
            .or(self.params.first())
            .map_or(0, |t| t.line)
    }
}

/// **Expression nodes.**
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Prefix unary operator expression: `!ready`, `-42`.
    Unary { operator: Token, right: Box<Expr> },

    /// Infix arithmetic, comparison or equality expression.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// `name = value`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Call expression. `paren` is the closing `)` (or the `import` keyword).
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// `object.name` / `object[expr]`
    Get {
        object: Box<Expr>,
        name: PropertyName,
    },

    /// `object.name = value` / `object[expr] = value`
    Set {
        object: Box<Expr>,
        name: PropertyName,
        value: Box<Expr>,
    },

    This { id: ExprId, keyword: Token },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },

    /// `fun [name](params) body`
    Function(Rc<FunctionDecl>),

    /// `[a, b, c]`
    List { bracket: Token, elements: Vec<Expr> },

    /// `{key: value, ...}`
    Object {
        brace: Token,
        entries: Vec<(String, Expr)>,
    },

    /// Backtick shell command.
    Command { token: Token, command: String },
}

impl Expr {
    pub fn variable(name: Token) -> Self {
        Expr::Variable {
            id: ExprId::fresh(),
            name,
        }
    }

    pub fn assign(name: Token, value: Expr) -> Self {
        Expr::Assign {
            id: ExprId::fresh(),
            name,
            value: Box::new(value),
        }
    }

    /// Best‑effort source line for diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Unary { operator, .. }
            | Expr::Binary { operator, .. }
            | Expr::Logical { operator, .. } => operator.line,
            Expr::Grouping(expr) => expr.line(),
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => name.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } | Expr::Set { name, .. } => name.token().line,
            Expr::This { keyword, .. } | Expr::Super { keyword, .. } => keyword.line,
            Expr::Function(decl) => decl.line(),
            Expr::List { bracket, .. } => bracket.line,
            Expr::Object { brace, .. } => brace.line,
            Expr::Command { token, .. } => token.line,
        }
    }
}

/// **Statement nodes.** A program is a `Vec<Stmt>`.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Stand‑alone expression.
    Expression(Expr),

    Print(Expr),

    /// `var name [= initializer]`
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while`; C‑style `for` and `for each` desugar into this.
    While { condition: Expr, body: Box<Stmt> },

    /// `try stmt catch [name] stmt`
    Try {
        try_branch: Box<Stmt>,
        catch_name: Option<Token>,
        catch_branch: Box<Stmt>,
    },

    Throw { keyword: Token, value: Expr },

    /// `return [value]`; absent value ⇒ `nil`.
    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Break { keyword: Token },

    /// `class Name [< Superclass] { methods }`. The superclass is always an
    /// `Expr::Variable`.
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
