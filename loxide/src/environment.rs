use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::LoxError;
use crate::token::Span;
use crate::value::Value;

/// One link in the chain of scopes rooted at the global environment.
///
/// `get`/`assign` walk the chain by name (globals, dynamic lookup);
/// `get_at`/`assign_at` walk a resolved number of links first (locals).
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str, span: Span) -> Result<Value, LoxError> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow().get(name, span);
        }

        Err(LoxError::Runtime {
            message: format!("Undefined variable \"{}\".", name),
            span,
        })
    }

    pub fn assign(&mut self, name: &str, value: Value, span: Span) -> Result<(), LoxError> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            return Ok(());
        }

        if let Some(enclosing) = &self.enclosing {
            return enclosing.borrow_mut().assign(name, value, span);
        }

        Err(LoxError::Runtime {
            message: format!("Undefined variable \"{}\" in assignment.", name),
            span,
        })
    }

    /// Read a binding exactly `distance` environments up the chain.
    pub fn get_at(&self, distance: usize, name: &str, span: Span) -> Result<Value, LoxError> {
        if distance == 0 {
            return self.values.get(name).cloned().ok_or_else(|| LoxError::Runtime {
                message: format!("Undefined variable \"{}\".", name),
                span,
            });
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(distance - 1, name, span),
            None => Err(LoxError::Runtime {
                message: format!("Undefined variable \"{}\".", name),
                span,
            }),
        }
    }

    /// Write a binding exactly `distance` environments up the chain.
    pub fn assign_at(
        &mut self,
        distance: usize,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), LoxError> {
        if distance == 0 {
            if self.values.contains_key(name) {
                self.values.insert(name.to_string(), value);
                return Ok(());
            }
            return Err(LoxError::Runtime {
                message: format!("Undefined variable \"{}\" in assignment.", name),
                span,
            });
        }
        match &self.enclosing {
            Some(enclosing) => enclosing
                .borrow_mut()
                .assign_at(distance - 1, name, value, span),
            None => Err(LoxError::Runtime {
                message: format!("Undefined variable \"{}\" in assignment.", name),
                span,
            }),
        }
    }

    /// All names visible from this environment, innermost first.
    ///
    /// Used for REPL autocompletion.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();

        if let Some(enclosing) = &self.enclosing {
            for name in enclosing.borrow().variable_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Literal;

    fn num(n: f64) -> Value {
        Value::Literal(Literal::Number(n))
    }

    #[test]
    fn define_and_get_variable() {
        let mut env = Environment::new();
        env.define("x".to_string(), num(42.0));
        assert_eq!(env.get("x", 0..1).unwrap(), num(42.0));
    }

    #[test]
    fn get_undefined_variable_is_a_runtime_error() {
        let env = Environment::new();
        let result = env.get("x", 0..1);
        assert!(matches!(
            result,
            Err(LoxError::Runtime { ref message, .. }) if message.contains("Undefined variable")
        ));
    }

    #[test]
    fn assign_updates_existing_binding() {
        let mut env = Environment::new();
        env.define("x".to_string(), num(1.0));
        env.assign("x", num(42.0), 0..1).unwrap();
        assert_eq!(env.get("x", 0..1).unwrap(), num(42.0));
    }

    #[test]
    fn assign_to_unbound_name_is_a_runtime_error() {
        let mut env = Environment::new();
        let result = env.assign("x", num(42.0), 0..1);
        assert!(matches!(result, Err(LoxError::Runtime { .. })));
    }

    #[test]
    fn get_walks_to_enclosing_scope() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x".to_string(), num(42.0));

        let inner = Environment::with_enclosing(Rc::clone(&outer));
        assert_eq!(inner.get("x", 0..1).unwrap(), num(42.0));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x".to_string(), num(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.define("x".to_string(), num(99.0));
        assert_eq!(inner.get("x", 0..1).unwrap(), num(99.0));
    }

    #[test]
    fn assign_walks_to_enclosing_scope() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x".to_string(), num(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.assign("x", num(42.0), 0..1).unwrap();

        assert_eq!(outer.borrow().get("x", 0..1).unwrap(), num(42.0));
    }

    #[test]
    fn get_at_distance_zero_reads_local() {
        let mut env = Environment::new();
        env.define("x".to_string(), num(42.0));
        assert_eq!(env.get_at(0, "x", 0..1).unwrap(), num(42.0));
    }

    #[test]
    fn get_at_skips_shadowing_scopes() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x".to_string(), num(1.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.define("x".to_string(), num(99.0));

        // Distance 1 reads past the shadow
        assert_eq!(inner.get_at(1, "x", 0..1).unwrap(), num(1.0));
        assert_eq!(inner.get_at(0, "x", 0..1).unwrap(), num(99.0));
    }

    #[test]
    fn assign_at_writes_the_resolved_scope_only() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("x".to_string(), num(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&outer))));
        inner.borrow_mut().define("x".to_string(), num(2.0));

        inner.borrow_mut().assign_at(1, "x", num(42.0), 0..1).unwrap();
        assert_eq!(outer.borrow().get("x", 0..1).unwrap(), num(42.0));
        assert_eq!(inner.borrow().get_at(0, "x", 0..1).unwrap(), num(2.0));
    }

    #[test]
    fn get_at_missing_binding_is_a_runtime_error() {
        let env = Environment::new();
        assert!(matches!(
            env.get_at(0, "ghost", 0..1),
            Err(LoxError::Runtime { .. })
        ));
    }

    #[test]
    fn variable_names_collects_all_scopes_without_duplicates() {
        let outer = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("a".to_string(), num(1.0));
        outer.borrow_mut().define("b".to_string(), num(2.0));

        let mut inner = Environment::with_enclosing(Rc::clone(&outer));
        inner.define("a".to_string(), num(3.0));

        let names = inner.variable_names();
        assert_eq!(names.iter().filter(|n| n.as_str() == "a").count(), 1);
        assert!(names.contains(&"b".to_string()));
    }
}
