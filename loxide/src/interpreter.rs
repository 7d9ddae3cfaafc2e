use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::INITIALIZER_NAME;
use crate::ast::{Expr, ExprId, Stmt};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::resolver::Resolutions;
use crate::token::{Literal, Token, TokenType};
use crate::value::{Function, Instance, LoxClass, LoxFunction, NativeFunction, Value};

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    resolutions: Resolutions,
}

fn clock_native(_args: &[Value]) -> Result<Value, LoxError> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64();
    Ok(Value::Literal(Literal::Number(seconds)))
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Value::Function(Rc::new(Function::Native(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            }))),
        );
        Self {
            environment: Rc::clone(&globals),
            globals,
            resolutions: Resolutions::new(),
        }
    }

    /// Merge a run's resolution table into the interpreter's.
    ///
    /// Merging (rather than replacing) keeps functions from earlier REPL
    /// lines resolved; node ids never collide across runs.
    pub fn add_resolutions(&mut self, resolutions: Resolutions) {
        self.resolutions.extend(resolutions);
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.environment.borrow().variable_names()
    }

    pub fn execute(&mut self, stmt: &Stmt, output: &mut dyn Write) -> Result<(), LoxError> {
        match stmt {
            Stmt::Print { expression } => {
                let value = self.evaluate(expression, output)?;
                writeln!(output, "{}", value)?;
                Ok(())
            }
            Stmt::Expression { expression } => {
                self.evaluate(expression, output)?;
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Literal(Literal::Nil),
                };
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block { statements } => {
                let enclosing = Rc::clone(&self.environment);
                self.execute_block(statements, Environment::with_enclosing(enclosing), output)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition_value = self.evaluate(condition, output)?;
                if is_truthy(&condition_value) {
                    self.execute(then_branch, output)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt, output)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                loop {
                    let condition_value = self.evaluate(condition, output)?;
                    if !is_truthy(&condition_value) {
                        break;
                    }
                    self.execute(body, output)?;
                }
                Ok(())
            }
            Stmt::Function { name, params, body } => {
                let function = LoxFunction {
                    name: name.clone(),
                    params: Rc::new(params.clone()),
                    body: Rc::new(body.clone()),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                };
                self.environment.borrow_mut().define(
                    name.lexeme.clone(),
                    Value::Function(Rc::new(Function::Lox(function))),
                );
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, output)?,
                    None => Value::Literal(Literal::Nil),
                };
                // Unwinds to the innermost call; not a reportable error
                Err(LoxError::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods, output),
        }
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
        output: &mut dyn Write,
    ) -> Result<(), LoxError> {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr, output)?;
                match value {
                    Value::Class(class) => Some(class),
                    _ => {
                        return Err(LoxError::Runtime {
                            message: "Superclass must be a class.".to_string(),
                            span: name.span.clone(),
                        });
                    }
                }
            }
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Value::Literal(Literal::Nil));

        // Methods of a subclass close over an environment holding `super`
        let enclosing = Rc::clone(&self.environment);
        if let Some(superclass) = &superclass_value {
            let mut super_env = Environment::with_enclosing(Rc::clone(&self.environment));
            super_env.define("super".to_string(), Value::Class(Rc::clone(superclass)));
            self.environment = Rc::new(RefCell::new(super_env));
        }

        let mut method_map = std::collections::HashMap::new();
        for method in methods {
            if let Stmt::Function {
                name: method_name,
                params,
                body,
            } = method
            {
                let function = LoxFunction {
                    name: method_name.clone(),
                    params: Rc::new(params.clone()),
                    body: Rc::new(body.clone()),
                    closure: Rc::clone(&self.environment),
                    is_initializer: method_name.lexeme == INITIALIZER_NAME,
                };
                method_map.insert(method_name.lexeme.clone(), function);
            }
        }

        self.environment = enclosing;

        let class = Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
        });
        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(class), name.span.clone())
    }

    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Environment,
        output: &mut dyn Write,
    ) -> Result<(), LoxError> {
        let previous = Rc::clone(&self.environment);
        self.environment = Rc::new(RefCell::new(environment));

        let result = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt, output));

        // Restored on every exit, including return unwinds and errors
        self.environment = previous;
        result
    }

    pub fn evaluate(&mut self, expr: &Expr, output: &mut dyn Write) -> Result<Value, LoxError> {
        match expr {
            Expr::Literal { value } => Ok(Value::Literal(value.clone())),
            Expr::Grouping { expression } => self.evaluate(expression, output),
            Expr::Unary { operator, right } => {
                let right_value = self.evaluate(right, output)?;
                match operator.token_type {
                    TokenType::Minus => match right_value {
                        Value::Literal(Literal::Number(n)) => {
                            Ok(Value::Literal(Literal::Number(-n)))
                        }
                        _ => Err(LoxError::Runtime {
                            message: "operand must be a number".to_string(),
                            span: operator.span.clone(),
                        }),
                    },
                    TokenType::Bang => Ok(Value::Literal(Literal::Bool(!is_truthy(&right_value)))),
                    _ => unreachable!("unary operator {:?}", operator.token_type),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left, output)?;
                let right_value = self.evaluate(right, output)?;
                self.binary(&left_value, operator, &right_value)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value = self.evaluate(left, output)?;

                if operator.token_type == TokenType::Or {
                    if is_truthy(&left_value) {
                        return Ok(left_value);
                    }
                } else if !is_truthy(&left_value) {
                    return Ok(left_value);
                }

                self.evaluate(right, output)
            }
            Expr::Variable { name, id } => self.lookup_variable(name, *id),
            Expr::This { keyword, id } => self.lookup_variable(keyword, *id),
            Expr::Assign { name, value, id } => {
                let value = self.evaluate(value, output)?;
                match self.resolutions.get(id) {
                    Some(&distance) => self.environment.borrow_mut().assign_at(
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.span.clone(),
                    )?,
                    None => self.globals.borrow_mut().assign(
                        &name.lexeme,
                        value.clone(),
                        name.span.clone(),
                    )?,
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value = self.evaluate(callee, output)?;

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument, output)?);
                }

                match callee_value {
                    Value::Function(function) => {
                        self.check_arity(function.arity(), args.len(), paren)?;
                        match function.as_ref() {
                            Function::Lox(function) => self.call_function(function, args, output),
                            Function::Native(native) => (native.func)(&args),
                        }
                    }
                    Value::Class(class) => {
                        self.check_arity(class.arity(INITIALIZER_NAME), args.len(), paren)?;
                        let instance = Instance::new(Rc::clone(&class));
                        if let Some(initializer) = class.find_method(INITIALIZER_NAME) {
                            self.call_function(&initializer.bind(&instance), args, output)?;
                        }
                        Ok(Value::Instance(instance))
                    }
                    _ => Err(LoxError::Runtime {
                        message: "Can only call functions and classes.".to_string(),
                        span: paren.span.clone(),
                    }),
                }
            }
            Expr::Get { object, name } => {
                let object_value = self.evaluate(object, output)?;
                match object_value {
                    Value::Instance(instance) => Instance::get(&instance, name),
                    _ => Err(LoxError::Runtime {
                        message: "Only class instances have properties.".to_string(),
                        span: name.span.clone(),
                    }),
                }
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_value = self.evaluate(object, output)?;
                match object_value {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value, output)?;
                        instance.set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(LoxError::Runtime {
                        message: "Only class instances have fields.".to_string(),
                        span: name.span.clone(),
                    }),
                }
            }
            Expr::Super {
                keyword,
                method,
                id,
            } => {
                // The resolver guarantees `super` at depth d and the bound
                // instance (`this`) one environment below it
                let distance =
                    *self
                        .resolutions
                        .get(id)
                        .ok_or_else(|| LoxError::Runtime {
                            message: "Undefined variable \"super\".".to_string(),
                            span: keyword.span.clone(),
                        })?;
                let superclass = match self.environment.borrow().get_at(
                    distance,
                    "super",
                    keyword.span.clone(),
                )? {
                    Value::Class(class) => class,
                    other => {
                        return Err(LoxError::Runtime {
                            message: format!("Superclass must be a class, found {}.", other),
                            span: keyword.span.clone(),
                        });
                    }
                };
                let instance = match self.environment.borrow().get_at(
                    distance - 1,
                    "this",
                    keyword.span.clone(),
                )? {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(LoxError::Runtime {
                            message: format!("'this' must be an instance, found {}.", other),
                            span: keyword.span.clone(),
                        });
                    }
                };
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(Function::Lox(
                        found.bind(&instance),
                    )))),
                    None => Err(LoxError::Runtime {
                        message: format!("Undefined property \"{}\".", method.lexeme),
                        span: method.span.clone(),
                    }),
                }
            }
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFunction,
        arguments: Vec<Value>,
        output: &mut dyn Write,
    ) -> Result<Value, LoxError> {
        // The call environment encloses the captured closure, never the
        // caller's environment
        let mut environment = Environment::with_enclosing(Rc::clone(&function.closure));
        for (param, argument) in function.params.iter().zip(arguments) {
            environment.define(param.lexeme.clone(), argument);
        }

        let result = self.execute_block(&function.body, environment, output);

        match result {
            Ok(()) => {
                if function.is_initializer {
                    self.initializer_instance(function)
                } else {
                    Ok(Value::Literal(Literal::Nil))
                }
            }
            Err(LoxError::Return(value)) => {
                if function.is_initializer {
                    // Bare returns are allowed, but an initializer always
                    // produces the instance
                    self.initializer_instance(function)
                } else {
                    Ok(value)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn initializer_instance(&self, function: &LoxFunction) -> Result<Value, LoxError> {
        function
            .closure
            .borrow()
            .get_at(0, "this", function.name.span.clone())
    }

    fn lookup_variable(&self, name: &Token, id: ExprId) -> Result<Value, LoxError> {
        match self.resolutions.get(&id) {
            Some(&distance) => {
                self.environment
                    .borrow()
                    .get_at(distance, &name.lexeme, name.span.clone())
            }
            None => self.globals.borrow().get(&name.lexeme, name.span.clone()),
        }
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token) -> Result<(), LoxError> {
        if expected != got {
            return Err(LoxError::Runtime {
                message: format!("Expected {} arguments but got {}.", expected, got),
                span: paren.span.clone(),
            });
        }
        Ok(())
    }

    fn binary(&self, left: &Value, operator: &Token, right: &Value) -> Result<Value, LoxError> {
        match operator.token_type {
            TokenType::Minus | TokenType::Slash | TokenType::Star => {
                let (a, b) = require_numbers(left, right, operator.span.clone())?;
                let result = match operator.token_type {
                    TokenType::Minus => a - b,
                    TokenType::Slash => a / b,
                    TokenType::Star => a * b,
                    _ => unreachable!(),
                };
                Ok(Value::Literal(Literal::Number(result)))
            }
            TokenType::Plus => match (left, right) {
                (Value::Literal(Literal::Number(a)), Value::Literal(Literal::Number(b))) => {
                    Ok(Value::Literal(Literal::Number(a + b)))
                }
                (Value::Literal(Literal::String(a)), Value::Literal(Literal::String(b))) => {
                    Ok(Value::Literal(Literal::String(format!("{}{}", a, b))))
                }
                (Value::Literal(Literal::Number(_)), _) => Err(LoxError::Runtime {
                    message: "operands must be numbers".to_string(),
                    span: operator.span.clone(),
                }),
                (Value::Literal(Literal::String(_)), _) => Err(LoxError::Runtime {
                    message: "operands must be strings".to_string(),
                    span: operator.span.clone(),
                }),
                _ => Err(LoxError::Runtime {
                    message: "'+' operands must be two numbers or two strings".to_string(),
                    span: operator.span.clone(),
                }),
            },
            TokenType::Greater
            | TokenType::GreaterEqual
            | TokenType::Less
            | TokenType::LessEqual => {
                let (a, b) = require_numbers(left, right, operator.span.clone())?;
                let result = match operator.token_type {
                    TokenType::Greater => a > b,
                    TokenType::GreaterEqual => a >= b,
                    TokenType::Less => a < b,
                    TokenType::LessEqual => a <= b,
                    _ => unreachable!(),
                };
                Ok(Value::Literal(Literal::Bool(result)))
            }
            TokenType::EqualEqual => Ok(Value::Literal(Literal::Bool(left == right))),
            TokenType::BangEqual => Ok(Value::Literal(Literal::Bool(left != right))),
            _ => unreachable!("binary operator {:?}", operator.token_type),
        }
    }
}

/// nil and false are falsy; everything else, including 0 and "", is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Literal(Literal::Nil) => false,
        Value::Literal(Literal::Bool(b)) => *b,
        _ => true,
    }
}

fn require_numbers(
    left: &Value,
    right: &Value,
    span: crate::token::Span,
) -> Result<(f64, f64), LoxError> {
    match (left, right) {
        (Value::Literal(Literal::Number(a)), Value::Literal(Literal::Number(b))) => Ok((*a, *b)),
        _ => Err(LoxError::Runtime {
            message: "operands must be numbers".to_string(),
            span,
        }),
    }
}
