use crate::source::Position;
use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Variable {0} is undefined")]
    UndefinedVariable(String, Position), // Identifier name, position where lookup happened
}

// --- Environment Definition ---

/// One frame of bindings plus a link to the frame it was created in.
///
/// Frames are shared through `Rc<RefCell<..>>` because closures keep the
/// frame chain alive after the call that created it returns, and `let`
/// writes into whichever frame is currently innermost.
#[derive(Debug, Default)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// Creates a top-level environment seeded with host bindings.
    pub fn with_bindings<I>(bindings: I) -> Rc<RefCell<Self>>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: bindings.into_iter().collect(),
        }))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Binds `name` in *this* frame, replacing any previous binding here.
    /// Outer frames are never touched.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a variable's value, innermost frame first.
    /// `pos` is where the variable was referenced, used for error reporting.
    pub fn get(&self, name: &str, pos: Position) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, pos),
            None => Err(EnvError::UndefinedVariable(name.to_string(), pos)),
        }
    }

    fn add_identifiers(&self, identifiers: &mut HashSet<String>) {
        identifiers.extend(self.bindings.keys().cloned());
        if let Some(outer_env_ptr) = &self.outer {
            outer_env_ptr.borrow().add_identifiers(identifiers);
        }
    }

    /// Gets every identifier visible from this frame.
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers = HashSet::new();
        self.add_identifiers(&mut identifiers);
        identifiers
    }
}
