use std::fmt;

use crate::token::{Literal, Token};

/// Identity of a resolvable expression node.
///
/// Stamped by the parser on every variable reference, assignment target,
/// `this`, and `super`, monotonically within a session, so two occurrences
/// of the same identifier never share a key in the resolution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Variable {
        name: Token,
        id: ExprId,
    },
    Assign {
        name: Token,
        value: Box<Expr>,
        id: ExprId,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        keyword: Token,
        id: ExprId,
    },
    Super {
        keyword: Token,
        method: Token,
        id: ExprId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Print {
        expression: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function {
        name: Token,
        params: Vec<Token>,
        body: Vec<Stmt>,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Stmt>,
    },
}

/// Source-form printing.
///
/// Operator expressions print parenthesized and groupings print transparent,
/// so printing a parsed program yields source that re-parses to a program
/// with the same printed form (a fixed point after one round trip).
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => match value {
                Literal::String(s) => write!(f, "\"{}\"", s),
                other => write!(f, "{}", other),
            },
            Expr::Unary { operator, right } => write!(f, "({}{})", operator.lexeme, right),
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator.lexeme, right),
            Expr::Grouping { expression } => write!(f, "{}", expression),
            Expr::Variable { name, .. } => write!(f, "{}", name.lexeme),
            Expr::Assign { name, value, .. } => write!(f, "({} = {})", name.lexeme, value),
            Expr::Call {
                callee, arguments, ..
            } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Get { object, name } => write!(f, "{}.{}", object, name.lexeme),
            Expr::Set {
                object,
                name,
                value,
            } => write!(f, "({}.{} = {})", object, name.lexeme, value),
            Expr::This { .. } => write!(f, "this"),
            Expr::Super { method, .. } => write!(f, "super.{}", method.lexeme),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expression { expression } => write!(f, "{};", expression),
            Stmt::Print { expression } => write!(f, "print {};", expression),
            Stmt::Var { name, initializer } => match initializer {
                Some(init) => write!(f, "var {} = {};", name.lexeme, init),
                None => write!(f, "var {};", name.lexeme),
            },
            Stmt::Block { statements } => fmt_block(f, statements),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({}) {}", condition, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " else {}", else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => write!(f, "while ({}) {}", condition, body),
            Stmt::Function { name, params, body } => {
                write!(f, "fun ")?;
                fmt_function(f, name, params, body)
            }
            Stmt::Return { value, .. } => match value {
                Some(value) => write!(f, "return {};", value),
                None => write!(f, "return;"),
            },
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                write!(f, "class {}", name.lexeme)?;
                if let Some(superclass) = superclass {
                    write!(f, " < {}", superclass)?;
                }
                write!(f, " {{")?;
                for method in methods {
                    // Methods are Function statements without the `fun` keyword
                    if let Stmt::Function { name, params, body } = method {
                        write!(f, " ")?;
                        fmt_function(f, name, params, body)?;
                    }
                }
                write!(f, " }}")
            }
        }
    }
}

fn fmt_block(f: &mut fmt::Formatter<'_>, statements: &[Stmt]) -> fmt::Result {
    write!(f, "{{")?;
    for stmt in statements {
        write!(f, " {}", stmt)?;
    }
    write!(f, " }}")
}

fn fmt_function(
    f: &mut fmt::Formatter<'_>,
    name: &Token,
    params: &[Token],
    body: &[Stmt],
) -> fmt::Result {
    write!(f, "{}(", name.lexeme)?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param.lexeme)?;
    }
    write!(f, ") ")?;
    fmt_block(f, body)
}
