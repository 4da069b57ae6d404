//! Call frames released on every exit path

use super::Environment;
use crate::error::EnvironmentError;

/// One active closure call: a counted call level plus a fresh binding frame.
///
/// Dropping the guard pops the frame and leaves the call, so an evaluation
/// that bails out with `?` never leaks bindings into its caller.
///
/// ```
/// use entmoot::{Environment, Payload, RuntimeValue};
///
/// let mut env = Environment::with_max_call_depth(4);
/// {
///     let mut call = env.enter_frame().unwrap();
///     call.define("x", RuntimeValue::from(Payload::from(1)));
///     assert_eq!(call.call_depth(), 1);
/// }
/// assert!(!env.contains("x"));
/// assert_eq!(env.call_depth(), 0);
/// ```
pub struct CallFrame<'a> {
    env: &'a mut Environment,
}

impl Environment {
    /// Enter a call and open its frame.
    ///
    /// # Errors
    ///
    /// Returns `StackOverflow` when the call depth limit is reached; nothing
    /// is pushed in that case.
    pub fn enter_frame(&mut self) -> Result<CallFrame<'_>, EnvironmentError> {
        self.enter_call()?;
        self.push_frame();
        Ok(CallFrame { env: self })
    }
}

impl Drop for CallFrame<'_> {
    fn drop(&mut self) {
        self.env.pop_frame();
        self.env.exit_call();
    }
}

impl std::ops::Deref for CallFrame<'_> {
    type Target = Environment;

    fn deref(&self) -> &Self::Target {
        self.env
    }
}

impl std::ops::DerefMut for CallFrame<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.env
    }
}
