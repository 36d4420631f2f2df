//! Register-based bytecode virtual machine for an ES3-era scripting language
//!
//! # Example
//!
//! ```
//! use regjs::{Runtime, JsValue};
//!
//! let mut runtime = Runtime::new();
//! let result = runtime.eval("1 + 2 * 3").unwrap();
//! assert_eq!(result, JsValue::Int(7));
//! ```

pub mod api;
pub mod ast;
pub mod compiler;
pub mod error;
pub mod gc;
pub mod interpreter;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod prelude;
pub mod string_dict;
pub mod value;

pub use error::JsError;
pub use gc::{GcStats, ObjectRef};
pub use interpreter::{InterruptPolicy, Interpreter, VmConfig};
pub use value::CheapClone;
pub use value::JsString;
pub use value::JsValue;

#[cfg(feature = "debugger")]
pub use interpreter::debugger::{Debugger, DebuggerCallFrame};

/// Embedding facade over an [`Interpreter`].
///
/// Values returned to the host are recorded as escaped so that later
/// collections keep them alive; call [`Runtime::release_escaped`] once the
/// host is done with them.
pub struct Runtime {
    interpreter: Interpreter,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            interpreter: Interpreter::with_config(config),
        }
    }

    /// Evaluate global code and return the completion value
    pub fn eval(&mut self, source: &str) -> Result<JsValue, JsError> {
        self.eval_with_url(source, None)
    }

    /// Like [`Runtime::eval`], with a source URL attached to thrown errors
    pub fn eval_with_url(&mut self, source: &str, url: Option<&str>) -> Result<JsValue, JsError> {
        let value = self.interpreter.eval(source, url)?;
        self.interpreter.escape(&value);
        Ok(value)
    }

    /// Call a global function by name
    ///
    /// If `args` is a JSON array, the elements are spread as individual arguments.
    /// Otherwise, `args` is passed as a single argument.
    ///
    /// # Example
    ///
    /// ```
    /// use regjs::{Runtime, JsValue};
    /// use serde_json::json;
    ///
    /// let mut runtime = Runtime::new();
    /// runtime.eval("function add(a, b) { return a + b; }").unwrap();
    /// let result = runtime.call_function("add", &json!([1, 2])).unwrap();
    /// assert_eq!(result, JsValue::Int(3));
    /// ```
    pub fn call_function(
        &mut self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<JsValue, JsError> {
        let func = self.interpreter.get_global(name)?;
        if !self.interpreter.is_callable(&func) {
            return Err(JsError::type_error(format!("{} is not a function", name)));
        }

        let js_args: Vec<JsValue> = match args {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| api::from_json(&mut self.interpreter, item))
                .collect(),
            single => vec![api::from_json(&mut self.interpreter, single)],
        };

        let value = self
            .interpreter
            .call_function(&func, JsValue::Undefined, &js_args)?;
        self.interpreter.escape(&value);
        Ok(value)
    }

    /// Call a global function and serialize its result
    pub fn call_function_json(
        &mut self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, JsError> {
        let value = self.call_function(name, args)?;
        api::to_json(&mut self.interpreter, &value)
    }

    pub fn get_global(&mut self, name: &str) -> Result<JsValue, JsError> {
        let value = self.interpreter.get_global(name)?;
        self.interpreter.escape(&value);
        Ok(value)
    }

    /// Store a JSON value as a global variable
    pub fn set_global_json(&mut self, name: &str, json: &serde_json::Value) -> Result<(), JsError> {
        let value = api::from_json(&mut self.interpreter, json);
        self.interpreter.set_global(name, value)
    }

    pub fn to_json(&mut self, value: &JsValue) -> Result<serde_json::Value, JsError> {
        api::to_json(&mut self.interpreter, value)
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run a full collection, returning the number of objects freed
    pub fn collect_garbage(&mut self) -> usize {
        self.interpreter.collect_garbage()
    }

    pub fn gc_stats(&self) -> GcStats {
        self.interpreter.gc_stats()
    }

    /// Allocations between automatic collections; 0 disables them
    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.interpreter.set_gc_threshold(threshold);
    }

    /// Drop the host's claim on every value this runtime returned so far
    pub fn release_escaped(&mut self) {
        self.interpreter.release_escaped();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Limits and hooks
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the execution timeout in milliseconds
    ///
    /// Default is 3000ms (3 seconds). Set to 0 to disable timeout.
    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.interpreter.set_timeout_ms(timeout_ms);
    }

    /// Get the current execution timeout in milliseconds
    pub fn timeout_ms(&self) -> u64 {
        self.interpreter.timeout_ms()
    }

    /// Decide what happens when the timeout expires
    pub fn set_interrupt_policy(&mut self, policy: Box<dyn InterruptPolicy>) {
        self.interpreter.set_interrupt_policy(policy);
    }

    #[cfg(feature = "debugger")]
    pub fn set_debugger(&mut self, debugger: Option<Box<dyn Debugger>>) {
        self.interpreter.set_debugger(debugger);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
