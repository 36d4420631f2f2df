//! Register-based bytecode interpreter
//!
//! The [`Interpreter`] owns the heap, the realm and the register file.
//! Script-to-script calls stay inside one dispatch loop; native code and the
//! host enter it through [`Interpreter::call_function`],
//! [`Interpreter::construct`] and [`Interpreter::execute_program`], each of
//! which pushes an entry frame and runs a nested loop.

pub mod builtins;
mod bytecode_vm;
pub mod call_frame;
#[cfg(feature = "debugger")]
pub mod debugger;
mod exception;
pub mod operations;
pub mod realm;
pub mod register_file;
pub mod scope_chain;
pub mod timeout;

use std::rc::Rc;

use serde::Deserialize;

pub use bytecode_vm::fast;
pub(crate) use bytecode_vm::FrameSetup;
use call_frame::{CallFrameHeader, NO_FRAME};
pub use operations::PreferredType;
pub use realm::Realm;
use register_file::RegisterFile;
pub use scope_chain::ScopeChain;
pub use timeout::{AlwaysTerminate, InterruptPolicy};

use crate::compiler::{CodeBlock, CompileOptions, Compiler, SourceCode};
use crate::error::JsError;
use crate::gc::{GcStats, Heap, ObjectRef};
use crate::object::{
    ArrayStorage, ExoticObject, FunctionKind, JsObject, NativeFn, PropertyAttributes,
};
use crate::parser::Parser;
use crate::string_dict::StringDict;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

#[cfg(feature = "debugger")]
use debugger::Debugger;

/// Runtime limits and knobs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Wall clock limit per host entry in milliseconds, 0 disables it
    pub timeout_ms: u64,
    /// How often the clock is sampled while a script runs
    pub check_interval_ms: u64,
    /// Allocations between collections, 0 disables automatic collection
    pub gc_threshold: usize,
    /// Nesting limit for native and host reentry into the dispatch loop
    pub max_reentry_depth: usize,
    /// Native stack the nested entries of one host call may use, in bytes
    pub max_native_stack_bytes: usize,
    /// Register file size limit in slots
    pub max_register_file_slots: usize,
    /// Compile `Debug` instructions into new code
    pub debug_hooks: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            check_interval_ms: 10,
            gc_threshold: 10_000,
            max_reentry_depth: 64,
            max_native_stack_bytes: 512 * 1024,
            max_register_file_slots: 1 << 20,
            debug_hooks: false,
        }
    }
}

impl VmConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

pub struct Interpreter {
    pub(crate) heap: Heap<JsObject>,
    pub(crate) realm: Realm,
    pub(crate) registers: RegisterFile,
    /// Value caught by the next `Catch` instruction
    pub(crate) exception: Option<JsValue>,
    config: VmConfig,
    timeout: timeout::TimeoutChecker,
    /// Nested dispatch loops and native calls currently on the Rust stack
    reentry_depth: usize,
    /// Stack address at the outermost reentry
    stack_base: usize,
    /// Native frames on the Rust stack; collection is unsafe while nonzero
    native_depth: usize,
    /// Frame pointer of the innermost script frame
    pub(crate) current_fp: usize,
    /// Where the last thrown value was raised
    pub(crate) last_throw_location: Option<crate::error::SourceLocation>,
    /// Objects handed to the host, kept alive until released
    escaped: Vec<ObjectRef>,
    string_dict: StringDict,
    next_source_id: u32,
    #[cfg(feature = "debugger")]
    pub(crate) debugger: Option<Box<dyn Debugger>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut heap = Heap::new(config.gc_threshold);
        let realm = Realm::new(&mut heap);
        let mut interp = Self {
            heap,
            realm,
            registers: RegisterFile::new(config.max_register_file_slots),
            exception: None,
            timeout: timeout::TimeoutChecker::new(config.timeout_ms, config.check_interval_ms),
            config,
            reentry_depth: 0,
            stack_base: 0,
            native_depth: 0,
            current_fp: NO_FRAME,
            last_throw_location: None,
            escaped: Vec::new(),
            string_dict: StringDict::with_common_strings(),
            next_source_id: 1,
            #[cfg(feature = "debugger")]
            debugger: None,
        };
        builtins::init(&mut interp);
        interp
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn global_object(&self) -> ObjectRef {
        self.realm.global_object
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn heap(&self) -> &Heap<JsObject> {
        &self.heap
    }

    pub fn object(&self, obj: ObjectRef) -> Result<&JsObject, JsError> {
        self.heap.get(obj)
    }

    pub fn object_mut(&mut self, obj: ObjectRef) -> Result<&mut JsObject, JsError> {
        self.heap.get_mut(obj)
    }

    pub fn intern(&mut self, s: &str) -> JsString {
        self.string_dict.get_or_insert(s)
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.config.timeout_ms = timeout_ms;
        self.timeout.set_timeout_ms(timeout_ms);
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.timeout_ms()
    }

    pub fn set_interrupt_policy(&mut self, policy: Box<dyn InterruptPolicy>) {
        self.timeout.set_policy(policy);
    }

    pub fn set_gc_threshold(&mut self, threshold: usize) {
        self.config.gc_threshold = threshold;
        self.heap.set_threshold(threshold);
    }

    pub fn set_debug_hooks(&mut self, enabled: bool) {
        self.config.debug_hooks = enabled;
    }

    #[cfg(feature = "debugger")]
    pub fn set_debugger(&mut self, debugger: Option<Box<dyn Debugger>>) {
        self.debugger = debugger;
    }

    pub fn gc_stats(&self) -> GcStats {
        self.heap.stats()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Allocation
    // ═══════════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn alloc(&mut self, object: JsObject) -> ObjectRef {
        self.heap.alloc(object)
    }

    pub fn create_object(&mut self) -> ObjectRef {
        let proto = self.realm.object_prototype;
        self.alloc(JsObject::ordinary(Some(proto)))
    }

    pub fn create_array(&mut self, values: Vec<JsValue>) -> ObjectRef {
        let proto = self.realm.array_prototype;
        let length = values.len() as u32;
        let storage = ArrayStorage {
            elements: values.into_iter().map(Some).collect(),
            length,
        };
        self.alloc(JsObject::new(Some(proto), ExoticObject::Array(storage)))
    }

    /// Error object of the named constructor with an own `message`
    pub fn create_error(&mut self, name: &str, message: &str) -> ObjectRef {
        let proto = self.realm.error_prototype_for(name);
        let mut object = JsObject::new(Some(proto), ExoticObject::Error);
        if !message.is_empty() {
            object.define(
                PropertyKey::from("message"),
                JsValue::from(message),
                PropertyAttributes::DONT_ENUM,
            );
        }
        self.alloc(object)
    }

    /// Closure over `scope`, with a fresh `prototype` object
    pub fn create_script_function(&mut self, code: Rc<CodeBlock>, scope: ScopeChain) -> ObjectRef {
        let length = code.num_parameters.saturating_sub(1);
        let function_proto = self.realm.function_prototype;
        let mut function = JsObject::new(
            Some(function_proto),
            ExoticObject::Function(FunctionKind::Script { code, scope }),
        );
        function.define(
            PropertyKey::from("length"),
            JsValue::number(f64::from(length)),
            PropertyAttributes::FROZEN,
        );
        let function = self.alloc(function);

        let object_proto = self.realm.object_prototype;
        let mut prototype = JsObject::ordinary(Some(object_proto));
        prototype.define(
            PropertyKey::from("constructor"),
            JsValue::Object(function),
            PropertyAttributes::DONT_ENUM,
        );
        let prototype = self.alloc(prototype);
        if let Ok(function_object) = self.heap.get_mut(function) {
            function_object.define(
                PropertyKey::from("prototype"),
                JsValue::Object(prototype),
                PropertyAttributes::DONT_DELETE,
            );
        }
        function
    }

    pub fn create_native_function(
        &mut self,
        name: &str,
        call: NativeFn,
        construct: Option<NativeFn>,
        arity: u32,
    ) -> ObjectRef {
        let name = self.intern(name);
        let proto = self.realm.function_prototype;
        let mut function = JsObject::new(
            Some(proto),
            ExoticObject::Function(FunctionKind::Native {
                call,
                construct,
                name,
            }),
        );
        function.define(
            PropertyKey::from("length"),
            JsValue::number(f64::from(arity)),
            PropertyAttributes::FROZEN,
        );
        self.alloc(function)
    }

    /// Add a built-in method to `obj`
    pub fn register_method(&mut self, obj: ObjectRef, name: &str, func: NativeFn, arity: u32) {
        let function = self.create_native_function(name, func, None, arity);
        let key = PropertyKey::from(self.intern(name));
        if let Ok(object) = self.heap.get_mut(obj) {
            object.define(key, JsValue::Object(function), PropertyAttributes::BUILTIN);
        }
    }

    /// Add a non-enumerable data property to `obj`
    pub fn register_value(
        &mut self,
        obj: ObjectRef,
        name: &str,
        value: JsValue,
        attributes: PropertyAttributes,
    ) {
        let key = PropertyKey::from(self.intern(name));
        if let Ok(object) = self.heap.get_mut(obj) {
            object.define(key, value, attributes);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Host entry points
    // ═══════════════════════════════════════════════════════════════════════════

    /// Parse and compile global code
    pub fn compile(&mut self, text: &str, url: Option<&str>) -> Result<Rc<CodeBlock>, JsError> {
        let program = Parser::new(text, &mut self.string_dict).parse_program()?;
        let source = self.new_source(text, url);
        let options = self.compile_options();
        let heap = &self.heap;
        let global = self.realm.global_object;
        let has_global_property = |name: &str| {
            heap.get(global)
                .is_ok_and(|object| object.has_own(&PropertyKey::from(name)))
        };
        let code = Compiler::compile_program(
            &program,
            &mut self.realm.global_symbols,
            &has_global_property,
            options,
            source,
        )?;
        self.realm.sync_global_slots();
        Ok(code)
    }

    /// Compile and run global code
    pub fn eval(&mut self, text: &str, url: Option<&str>) -> Result<JsValue, JsError> {
        let code = self.compile(text, url)?;
        let global = self.realm.global_object;
        self.execute_program(code, ScopeChain::single(global), JsValue::Object(global))
    }

    /// Run compiled global code on `scope` with the given `this`
    pub fn execute_program(
        &mut self,
        code: Rc<CodeBlock>,
        scope: ScopeChain,
        this: JsValue,
    ) -> Result<JsValue, JsError> {
        self.realm.sync_global_slots();
        let argv = self.registers.top();
        self.registers.ensure(argv + 1)?;
        self.registers.set(argv, this)?;
        self.run_entry(FrameSetup {
            code,
            scope,
            callee: None,
            argv,
            argc: 1,
            return_register: 0,
            construct: false,
            suspended_scope: None,
        })
    }

    /// Evaluate `text` as eval code in `scope`. Variable declarations land
    /// on the first activation or global object of the chain.
    pub fn execute_eval(
        &mut self,
        text: &JsString,
        scope: ScopeChain,
        this: JsValue,
    ) -> Result<JsValue, JsError> {
        let program = Parser::new(text.as_str(), &mut self.string_dict).parse_program()?;
        let source = self.new_source(text.as_str(), None);
        let code = Compiler::compile_eval(
            &program,
            &self.realm.global_symbols,
            self.compile_options(),
            source,
        )?;
        tracing::debug!(
            length = text.utf16_len(),
            instructions = code.instructions.len(),
            "compiled eval code"
        );
        let argv = self.registers.top();
        self.registers.ensure(argv + 1)?;
        self.registers.set(argv, this)?;
        self.run_entry(FrameSetup {
            code,
            suspended_scope: Some(scope.clone()),
            scope,
            callee: None,
            argv,
            argc: 1,
            return_register: 0,
            construct: false,
        })
    }

    /// Call a function value
    pub fn call_function(
        &mut self,
        func: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let Some(obj) = func.as_object().filter(|_| self.is_callable(func)) else {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.describe_value(func)
            )));
        };
        self.execute_function(obj, this, args, false)
    }

    /// `new func(...args)`
    pub fn construct(&mut self, func: &JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
        let Some(obj) = func
            .as_object()
            .filter(|o| self.heap.get(*o).is_ok_and(JsObject::is_constructor))
        else {
            return Err(JsError::type_error(format!(
                "{} is not a constructor",
                self.describe_value(func)
            )));
        };
        let this = match self.native_construct(obj)? {
            Some(construct) => return self.call_native(construct, JsValue::Undefined, args),
            None => JsValue::Object(self.allocate_this_for(obj)?),
        };
        self.execute_function(obj, this, args, true)
    }

    /// Run `func` with the given receiver from native code or the host
    pub fn execute_function(
        &mut self,
        func: ObjectRef,
        this: JsValue,
        args: &[JsValue],
        construct: bool,
    ) -> Result<JsValue, JsError> {
        let (code, scope) = match &self.heap.get(func)?.exotic {
            ExoticObject::Function(FunctionKind::Script { code, scope }) => {
                (code.clone(), scope.clone())
            }
            ExoticObject::Function(FunctionKind::Native { call, .. }) => {
                let call = *call;
                return self.call_native(call, this, args);
            }
            _ => return Err(JsError::type_error("Value is not a function")),
        };

        let nested = self.reentry_depth > 0;
        let argv = self.registers.top();
        self.registers.ensure(argv + 1 + args.len())?;
        self.registers.set(argv, this)?;
        for (i, arg) in args.iter().enumerate() {
            self.registers.set(argv + 1 + i, arg.cheap_clone())?;
        }
        if nested {
            self.native_depth += 1;
        }
        let result = self.run_entry(FrameSetup {
            code,
            scope,
            callee: Some(func),
            argv,
            argc: args.len() + 1,
            return_register: 0,
            construct,
            suspended_scope: None,
        });
        if nested {
            self.native_depth -= 1;
        }
        result
    }

    /// Call a native function with the reentry limit applied
    pub(crate) fn call_native(
        &mut self,
        func: NativeFn,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        self.enter_reentry()?;
        self.native_depth += 1;
        let result = func(self, this, args);
        self.native_depth -= 1;
        self.exit_reentry();
        result
    }

    /// The `construct` behavior of a native constructor, if `obj` has one
    pub(crate) fn native_construct(&self, obj: ObjectRef) -> Result<Option<NativeFn>, JsError> {
        match &self.heap.get(obj)?.exotic {
            ExoticObject::Function(FunctionKind::Native { construct, .. }) => Ok(*construct),
            _ => Ok(None),
        }
    }

    /// Fresh receiver for `new` on a script function
    pub(crate) fn allocate_this_for(&mut self, func: ObjectRef) -> Result<ObjectRef, JsError> {
        let prototype = self.get_property(func, &PropertyKey::from("prototype"))?;
        let proto = prototype.as_object().unwrap_or(self.realm.object_prototype);
        Ok(self.alloc(JsObject::ordinary(Some(proto))))
    }

    pub(crate) fn enter_reentry(&mut self) -> Result<(), JsError> {
        let here = stack_address();
        if self.reentry_depth == 0 {
            self.stack_base = here;
        }
        let used = self.stack_base.abs_diff(here);
        if self.reentry_depth >= self.config.max_reentry_depth
            || used > self.config.max_native_stack_bytes
        {
            tracing::warn!(
                depth = self.reentry_depth,
                stack_bytes = used,
                "reentry limit reached, raising stack overflow"
            );
            return Err(JsError::stack_overflow());
        }
        self.reentry_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_reentry(&mut self) {
        self.reentry_depth = self.reentry_depth.saturating_sub(1);
    }

    /// Push an entry frame and run it to completion
    fn run_entry(&mut self, setup: FrameSetup) -> Result<JsValue, JsError> {
        self.enter_reentry()?;
        let outermost = self.reentry_depth == 1;
        if outermost {
            self.timeout.start();
        }
        let outer_fp = self.current_fp;
        let result = match self.push_frame(None, setup) {
            Ok(state) => {
                self.maybe_collect(&state.scope);
                self.run(state)
            }
            Err(e) => Err(e),
        };
        self.current_fp = outer_fp;
        if outermost {
            self.timeout.stop();
            self.exception = None;
        }
        self.exit_reentry();
        result
    }

    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            debug_hooks: self.config.debug_hooks,
        }
    }

    fn new_source(&mut self, text: &str, url: Option<&str>) -> Rc<SourceCode> {
        let id = self.next_source_id;
        self.next_source_id += 1;
        Rc::new(SourceCode {
            id,
            url: url.map(JsString::from),
            text: Rc::from(text),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Frame inspection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Arguments object of the frame at `fp`, created on first use
    pub(crate) fn arguments_for_frame(&mut self, fp: usize) -> Result<ObjectRef, JsError> {
        let header = CallFrameHeader::read(&self.registers, fp)?;
        if let Some(arguments) = header.arguments {
            return Ok(arguments);
        }
        let values = self
            .registers
            .values(header.argument_start + 1, header.argument_count.saturating_sub(1))?;
        let proto = self.realm.object_prototype;
        let mut object = JsObject::new(Some(proto), ExoticObject::Arguments);
        let length = values.len();
        for (i, value) in values.into_iter().enumerate() {
            object.define(PropertyKey::Index(i as u32), value, PropertyAttributes::NONE);
        }
        object.define(
            PropertyKey::from("length"),
            JsValue::number(length as f64),
            PropertyAttributes::DONT_ENUM,
        );
        object.define(
            PropertyKey::from("callee"),
            header.callee.map_or(JsValue::Undefined, JsValue::Object),
            PropertyAttributes::DONT_ENUM,
        );
        let arguments = self.alloc(object);
        CallFrameHeader::set_arguments(&mut self.registers, fp, arguments)?;
        Ok(arguments)
    }

    /// Innermost live frame running `func`
    fn find_frame_of(&self, func: ObjectRef) -> Result<Option<usize>, JsError> {
        let mut fp = self.current_fp;
        while fp != NO_FRAME {
            if CallFrameHeader::read_callee(&self.registers, fp)? == Some(func) {
                return Ok(Some(fp));
            }
            fp = CallFrameHeader::read_caller_fp(&self.registers, fp)?;
        }
        Ok(None)
    }

    /// `func.arguments`: the arguments of its innermost live invocation, or
    /// `null`
    pub fn retrieve_arguments(&mut self, func: ObjectRef) -> Result<JsValue, JsError> {
        match self.find_frame_of(func)? {
            Some(fp) => Ok(JsValue::Object(self.arguments_for_frame(fp)?)),
            None => Ok(JsValue::Null),
        }
    }

    /// `func.caller`: the function that called its innermost live
    /// invocation, or `null`
    pub fn retrieve_caller(&mut self, func: ObjectRef) -> Result<JsValue, JsError> {
        let Some(fp) = self.find_frame_of(func)? else {
            return Ok(JsValue::Null);
        };
        let mut fp = CallFrameHeader::read_caller_fp(&self.registers, fp)?;
        while fp != NO_FRAME {
            if let Some(callee) = CallFrameHeader::read_callee(&self.registers, fp)? {
                return Ok(JsValue::Object(callee));
            }
            fp = CallFrameHeader::read_caller_fp(&self.registers, fp)?;
        }
        Ok(JsValue::Null)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Globals
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn get_global(&mut self, name: &str) -> Result<JsValue, JsError> {
        let global = self.realm.global_object;
        self.get_property(global, &PropertyKey::from(name))
    }

    pub fn set_global(&mut self, name: &str, value: JsValue) -> Result<(), JsError> {
        let global = self.realm.global_object;
        self.put_property(global, PropertyKey::from(name), value)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Garbage collection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Collect at a safepoint if the allocation threshold was reached and no
    /// native frame is on the Rust stack
    #[inline]
    pub(crate) fn maybe_collect(&mut self, scope: &ScopeChain) {
        if self.native_depth == 0 && self.heap.should_collect() {
            self.collect_with(Some(scope));
        }
    }

    /// Run a collection now. Only safe between host calls.
    pub fn collect_garbage(&mut self) -> usize {
        if self.reentry_depth > 0 {
            return 0;
        }
        self.collect_with(None)
    }

    fn collect_with(&mut self, scope: Option<&ScopeChain>) -> usize {
        let mut roots: Vec<ObjectRef> = self.registers.roots().collect();
        roots.extend(self.realm.roots());
        roots.extend(self.exception.as_ref().and_then(JsValue::as_object));
        roots.extend(self.escaped.iter().copied());
        if let Some(scope) = scope {
            roots.extend(scope.objects());
        }
        self.heap.collect(roots)
    }

    /// Keep `obj` alive until [`Interpreter::unprotect`]
    pub fn protect(&mut self, obj: ObjectRef) {
        self.heap.protect(obj);
    }

    pub fn unprotect(&mut self, obj: ObjectRef) {
        self.heap.unprotect(obj);
    }

    /// Record a value handed to the host so it survives later collections
    pub fn escape(&mut self, value: &JsValue) {
        if let JsValue::Object(obj) = value {
            self.escaped.push(*obj);
        }
    }

    /// Forget every value previously handed to the host
    pub fn release_escaped(&mut self) {
        self.escaped.clear();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Diagnostics
    // ═══════════════════════════════════════════════════════════════════════════

    /// Short description of a value for error messages, without running
    /// script code
    pub fn describe_value(&self, value: &JsValue) -> String {
        match value {
            JsValue::String(s) => format!("\"{}\"", s),
            JsValue::Object(obj) => match self.heap.get(*obj) {
                Ok(object) => match object.function_name() {
                    Some(name) if !name.is_empty() => format!("function {}", name),
                    _ => format!("[object {}]", object.class_name()),
                },
                Err(_) => "[object]".to_string(),
            },
            other => other.primitive_to_string().to_string(),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of a local in the caller's frame, for measuring native stack use
#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::ptr::from_ref(std::hint::black_box(&marker)).addr()
}
