use std::collections::HashMap;

use crate::INITIALIZER_NAME;
use crate::ast::{Expr, ExprId, Stmt};
use crate::error::LoxError;
use crate::token::{Span, Token};

/// Maps resolvable expression nodes to how many scopes to walk up at
/// runtime. Nodes with no entry are globals, looked up dynamically.
pub type Resolutions = HashMap<ExprId, usize>;

/// Tracks function context for return validation
#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// Tracks class context for this/super validation
#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Info tracked for each name declared in a scope
struct VarInfo {
    defined: bool,
    used: bool,
    span: Span,
}

pub struct Resolver {
    /// Stack of lexical scopes; empty means global (not tracked)
    scopes: Vec<HashMap<String, VarInfo>>,
    resolutions: Resolutions,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            resolutions: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolutions, Vec<LoxError>> {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
        if self.errors.is_empty() {
            Ok(self.resolutions)
        } else {
            Err(self.errors)
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, info) in scope {
                if !info.used {
                    self.errors.push(LoxError::Resolution {
                        message: format!("unused local variable \"{}\"", name),
                        span: info.span,
                    });
                }
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.errors.push(LoxError::Resolution {
                    message: format!(
                        "already a variable with name \"{}\" in this scope",
                        name.lexeme
                    ),
                    span: name.span.clone(),
                });
            }
            scope.insert(
                name.lexeme.clone(),
                VarInfo {
                    defined: false,
                    used: false,
                    span: name.span.clone(),
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut()
            && let Some(info) = scope.get_mut(&name.lexeme)
        {
            info.defined = true;
        }
    }

    /// Implicitly declare a synthetic binding (`this`, `super`) that the
    /// unused-variable check must never flag.
    fn declare_synthetic(&mut self, name: &str, span: Span) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                VarInfo {
                    defined: true,
                    used: true,
                    span,
                },
            );
        }
    }

    fn resolve_local(&mut self, name: &Token, id: ExprId) {
        let len = self.scopes.len();
        for depth in 0..len {
            let scope_idx = len - 1 - depth;
            if let Some(info) = self.scopes[scope_idx].get_mut(&name.lexeme) {
                info.used = true;
                self.resolutions.insert(id, depth);
                return;
            }
        }
        // Not found: a global, left to dynamic lookup at runtime
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Function { name, params, body } => {
                self.declare(name);
                self.define(name);
                self.resolve_function(params, body, FunctionType::Function);
            }
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expr(expression);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Return { keyword, value } => {
                if let Some(value) = value {
                    if self.current_function == FunctionType::None {
                        self.errors.push(LoxError::Resolution {
                            message: "can't return a value from top-level code".to_string(),
                            span: keyword.span.clone(),
                        });
                    }
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(LoxError::Resolution {
                            message: "can't return a value from an initializer".to_string(),
                            span: keyword.span.clone(),
                        });
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.declare(name);
                self.define(name);

                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable {
                        name: superclass_name,
                        ..
                    } = superclass_expr
                        && superclass_name.lexeme == name.lexeme
                    {
                        self.errors.push(LoxError::Resolution {
                            message: "A class can't inherit from itself.".to_string(),
                            span: superclass_name.span.clone(),
                        });
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    // The super scope wraps the this scope; the interpreter's
                    // depth arithmetic for super relies on exactly this nesting
                    self.begin_scope();
                    self.declare_synthetic("super", name.span.clone());
                }

                self.begin_scope();
                self.declare_synthetic("this", name.span.clone());

                for method in methods {
                    if let Stmt::Function {
                        name: method_name,
                        params,
                        body,
                    } = method
                    {
                        let fn_type = if method_name.lexeme == INITIALIZER_NAME {
                            FunctionType::Initializer
                        } else {
                            FunctionType::Method
                        };
                        self.resolve_function(params, body, fn_type);
                    }
                }

                self.end_scope();
                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing_class;
            }
        }
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], fn_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = fn_type;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { name, id } => {
                // A declared-but-undefined name in the innermost scope means
                // the initializer of that very declaration is reading it
                if let Some(scope) = self.scopes.last()
                    && scope.get(&name.lexeme).is_some_and(|info| !info.defined)
                {
                    self.errors.push(LoxError::Resolution {
                        message: "Can't read local variable in its own initializer".to_string(),
                        span: name.span.clone(),
                    });
                }
                self.resolve_local(name, *id);
            }
            Expr::Assign { name, value, id } => {
                self.resolve_expr(value);
                self.resolve_local(name, *id);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }
            Expr::Grouping { expression } => {
                self.resolve_expr(expression);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    self.errors.push(LoxError::Resolution {
                        message: "Cannot use 'this' outside of a class method.".to_string(),
                        span: keyword.span.clone(),
                    });
                }
                self.resolve_local(keyword, *id);
            }
            Expr::Super { keyword, id, .. } => {
                if self.current_class == ClassType::None {
                    self.errors.push(LoxError::Resolution {
                        message: "Can't use 'super' outside of a class.".to_string(),
                        span: keyword.span.clone(),
                    });
                } else if self.current_class == ClassType::Class {
                    self.errors.push(LoxError::Resolution {
                        message: "Can't use 'super' in a class with no superclass.".to_string(),
                        span: keyword.span.clone(),
                    });
                }
                self.resolve_local(keyword, *id);
            }
            Expr::Literal { .. } => {}
        }
    }
}
