use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::environment::Environment;
use crate::error::LoxError;
use crate::token::{Literal, Token};

#[derive(Debug, Clone)]
pub enum Value {
    Literal(Literal),
    Function(Rc<Function>),
    Class(Rc<LoxClass>),
    Instance(Rc<Instance>),
}

#[derive(Debug)]
pub enum Function {
    Lox(LoxFunction),
    Native(NativeFunction),
}

impl Function {
    pub fn arity(&self) -> usize {
        match self {
            Function::Lox(f) => f.params.len(),
            Function::Native(f) => f.arity,
        }
    }
}

#[derive(Clone)]
pub struct LoxFunction {
    pub name: Token,
    pub params: Rc<Vec<Token>>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    /// Produce a copy bound to an instance: `this` lives in a fresh
    /// environment between the method body and its original closure.
    pub fn bind(&self, instance: &Rc<Instance>) -> LoxFunction {
        let mut env = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define("this".to_string(), Value::Instance(Rc::clone(instance)));
        LoxFunction {
            name: self.name.clone(),
            params: Rc::clone(&self.params),
            body: Rc::clone(&self.body),
            closure: Rc::new(RefCell::new(env)),
            is_initializer: self.is_initializer,
        }
    }
}

// The closure link makes the structure cyclic (a function defined at global
// scope is reachable from its own closure), so Debug stays shallow.
impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoxFunction")
            .field("name", &self.name.lexeme)
            .field("arity", &self.params.len())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, LoxError>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    /// Method lookup checks the own map, then the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<&LoxFunction> {
        self.methods.get(name).or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// Constructing a class takes as many arguments as its initializer.
    pub fn arity(&self, initializer_name: &str) -> usize {
        self.find_method(initializer_name)
            .map(|init| init.params.len())
            .unwrap_or(0)
    }
}

pub struct Instance {
    pub class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Rc<Instance> {
        Rc::new(Instance {
            class,
            fields: RefCell::new(HashMap::new()),
        })
    }

    /// Fields shadow methods; a method read binds `this` to the instance.
    pub fn get(instance: &Rc<Instance>, name: &Token) -> Result<Value, LoxError> {
        if let Some(value) = instance.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.class.find_method(&name.lexeme) {
            return Ok(Value::Function(Rc::new(Function::Lox(
                method.bind(instance),
            ))));
        }

        Err(LoxError::Runtime {
            message: format!("Undefined property \"{}\".", name.lexeme),
            span: name.span.clone(),
        })
    }

    /// Fields are created on first assignment.
    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

// Instance fields can refer back to the instance; Debug stays shallow.
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .finish()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(literal) => write!(f, "{}", literal),
            Value::Function(function) => write!(f, "{}", function),
            Value::Class(class) => write!(f, "{}", class.name),
            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Lox(function) => write!(f, "<fn {}>", function.name.lexeme),
            Function::Native(function) => write!(f, "<native fn {}>", function.name),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Value::Literal(literal)
    }
}

/// Structural equality for literals, identity for everything else.
/// Cross-variant comparison is false, never an error.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
