//! Binding environment for evaluating computation bodies

mod frame;

pub use frame::CallFrame;

use crate::error::EnvironmentError;
use crate::eval::RuntimeValue;

/// A single name binding.
#[derive(Debug, Clone)]
pub struct Binding {
    /// The binding's name
    pub name: String,

    /// The bound value
    pub value: RuntimeValue,
}

/// The evaluator's environment of lambda parameters and captures.
///
/// Uses a flat scope design with frame boundaries for efficient
/// scope entry/exit and cache-friendly lookups. Bindings are immutable;
/// an inner binding shadows an outer one of the same name.
///
/// # Example
///
/// ```
/// use entmoot::{Environment, Payload, RuntimeValue};
///
/// let mut env = Environment::new();
/// env.define("x", RuntimeValue::from(Payload::from(1)));
///
/// env.push_frame();
/// env.define("x", RuntimeValue::from(Payload::from(10)));
/// assert_eq!(env.get("x").and_then(|v| v.as_payload()), Some(&Payload::from(10)));
///
/// env.pop_frame();
/// assert_eq!(env.get("x").and_then(|v| v.as_payload()), Some(&Payload::from(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Environment {
    /// All bindings in a flat array (most recent at end)
    bindings: Vec<Binding>,

    /// Frame boundaries (indices into bindings)
    frames: Vec<usize>,

    /// Current call depth (for recursion limiting)
    call_depth: usize,

    /// Maximum allowed call depth
    max_call_depth: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Create a new empty environment.
    pub fn new() -> Self {
        Self::with_max_call_depth(1000)
    }

    /// Create an environment with a custom call depth limit.
    pub fn with_max_call_depth(max_depth: usize) -> Self {
        Self {
            bindings: Vec::new(),
            frames: vec![0],
            call_depth: 0,
            max_call_depth: max_depth,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Frame Management (Scope Entry/Exit)
    // ═══════════════════════════════════════════════════════════════════

    /// Enter a new scope (push a frame).
    pub fn push_frame(&mut self) {
        self.frames.push(self.bindings.len());
    }

    /// Exit the current scope (pop a frame).
    ///
    /// Does nothing at the global scope.
    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            if let Some(boundary) = self.frames.pop() {
                self.bindings.truncate(boundary);
            }
        }
    }

    /// Get the current scope depth (number of frames).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Call Depth Tracking (Stack Overflow Protection)
    // ═══════════════════════════════════════════════════════════════════

    /// Enter a function call. Returns error if max depth exceeded.
    pub fn enter_call(&mut self) -> Result<(), EnvironmentError> {
        if self.call_depth >= self.max_call_depth {
            return Err(EnvironmentError::StackOverflow {
                depth: self.call_depth,
                max: self.max_call_depth,
            });
        }
        self.call_depth += 1;
        Ok(())
    }

    /// Exit a function call.
    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    /// Get current call depth.
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    // ═══════════════════════════════════════════════════════════════════
    // Bindings
    // ═══════════════════════════════════════════════════════════════════

    /// Define a binding in the current scope, shadowing any earlier one.
    pub fn define(&mut self, name: impl Into<String>, value: RuntimeValue) {
        self.bindings.push(Binding {
            name: name.into(),
            value,
        });
    }

    /// Look up the most recent binding with the given name.
    pub fn get(&self, name: &str) -> Option<&RuntimeValue> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    /// Look up a binding, failing if it does not exist.
    pub fn lookup(&self, name: &str) -> Result<&RuntimeValue, EnvironmentError> {
        self.get(name).ok_or_else(|| EnvironmentError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Check if a binding exists.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.iter().any(|b| b.name == name)
    }

    /// The visible bindings, innermost last, for closure capture.
    ///
    /// Shadowed bindings are dropped.
    pub fn snapshot(&self) -> Vec<(String, RuntimeValue)> {
        let mut seen = std::collections::HashSet::new();
        let mut visible: Vec<(String, RuntimeValue)> = self
            .bindings
            .iter()
            .rev()
            .filter(|b| seen.insert(b.name.as_str()))
            .map(|b| (b.name.clone(), b.value.clone()))
            .collect();
        visible.reverse();
        visible
    }

    /// Get the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
