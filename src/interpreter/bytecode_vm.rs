//! The dispatch loop
//!
//! `run` drives one entry frame and every script frame called from it.
//! Errors raised by an instruction come back as `Err` and are routed to
//! [`Interpreter::unwind`], which either resumes at a handler or ends this
//! `run` invocation.

use std::rc::Rc;

use super::Interpreter;
use super::call_frame::{CallFrameHeader, HEADER_SIZE};
use super::operations::read_activation;
use super::register_file::RegisterFile;
use super::scope_chain::ScopeChain;
use crate::compiler::bytecode::{GlobalCacheEntry, JumpOffset};
use crate::compiler::{CodeBlock, CodeType, Constant, Op, Register};
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::object::{
    Activation, ActivationStorage, ExoticObject, FunctionKind, JsObject, PropertyAttributes,
    PropertyIterator,
};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

/// Registers and position of the running frame
pub(crate) struct ExecState {
    pub code: Rc<CodeBlock>,
    pub ip: usize,
    pub fp: usize,
    pub scope: ScopeChain,
}

/// Everything needed to lay out a new frame
pub(crate) struct FrameSetup {
    pub code: Rc<CodeBlock>,
    /// Chain the callee starts with, before its activation is pushed
    pub scope: ScopeChain,
    pub callee: Option<ObjectRef>,
    /// Absolute position of `this`; the arguments follow it
    pub argv: usize,
    /// Arguments including `this`
    pub argc: usize,
    pub return_register: Register,
    pub construct: bool,
    /// Chain of a suspended caller that only native code knows about
    pub suspended_scope: Option<ScopeChain>,
}

/// Integer and double fast paths. `None` means the generic operation has
/// to run.
pub mod fast {
    use crate::value::JsValue;

    #[inline]
    pub fn add(left: &JsValue, right: &JsValue) -> Option<JsValue> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) => Some(a.checked_add(*b).map_or_else(
                || JsValue::Number(f64::from(*a) + f64::from(*b)),
                JsValue::Int,
            )),
            _ => Some(JsValue::number(left.as_number()? + right.as_number()?)),
        }
    }

    #[inline]
    pub fn sub(left: &JsValue, right: &JsValue) -> Option<JsValue> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) => Some(a.checked_sub(*b).map_or_else(
                || JsValue::Number(f64::from(*a) - f64::from(*b)),
                JsValue::Int,
            )),
            _ => Some(JsValue::number(left.as_number()? - right.as_number()?)),
        }
    }

    #[inline]
    pub fn mul(left: &JsValue, right: &JsValue) -> Option<JsValue> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) => Some(match a.checked_mul(*b) {
                Some(0) if *a < 0 || *b < 0 => JsValue::Number(-0.0),
                Some(product) => JsValue::Int(product),
                None => JsValue::number(f64::from(*a) * f64::from(*b)),
            }),
            _ => Some(JsValue::number(left.as_number()? * right.as_number()?)),
        }
    }

    #[inline]
    pub fn modulo(left: &JsValue, right: &JsValue) -> Option<JsValue> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) if *b != 0 => Some(match a.checked_rem(*b) {
                Some(0) if *a < 0 => JsValue::Number(-0.0),
                Some(rem) => JsValue::Int(rem),
                None => JsValue::number(f64::from(*a) % f64::from(*b)),
            }),
            _ => Some(JsValue::number(left.as_number()? % right.as_number()?)),
        }
    }

    #[inline]
    pub fn less(left: &JsValue, right: &JsValue) -> Option<bool> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) => Some(a < b),
            _ => Some(left.as_number()? < right.as_number()?),
        }
    }

    #[inline]
    pub fn less_eq(left: &JsValue, right: &JsValue) -> Option<bool> {
        match (left, right) {
            (JsValue::Int(a), JsValue::Int(b)) => Some(a <= b),
            _ => Some(left.as_number()? <= right.as_number()?),
        }
    }

    #[inline]
    pub fn increment(value: &JsValue, delta: i32) -> Option<JsValue> {
        match value {
            JsValue::Int(i) => Some(i.checked_add(delta).map_or_else(
                || JsValue::Number(f64::from(*i) + f64::from(delta)),
                JsValue::Int,
            )),
            JsValue::Number(n) => Some(JsValue::number(n + f64::from(delta))),
            _ => None,
        }
    }
}

/// `ip` has already moved past the jump at `ip - 1`
#[inline]
fn jump_target(ip: usize, offset: JumpOffset) -> Result<usize, JsError> {
    let target = ip as i64 - 1 + i64::from(offset);
    usize::try_from(target).map_err(|_| JsError::internal_error("jump target out of range"))
}

fn string_constant(code: &CodeBlock, idx: u32) -> Result<JsString, JsError> {
    match code.get_constant(idx) {
        Some(Constant::String(s)) => Ok(s.cheap_clone()),
        _ => Err(JsError::internal_error(format!(
            "constant {} is not a string",
            idx
        ))),
    }
}

fn function_constant(code: &CodeBlock, idx: u32) -> Result<Rc<CodeBlock>, JsError> {
    match code.get_constant(idx) {
        Some(Constant::Function(f)) => Ok(f.clone()),
        _ => Err(JsError::internal_error(format!(
            "constant {} is not a function",
            idx
        ))),
    }
}

enum CallTarget {
    Script(Rc<CodeBlock>, ScopeChain),
    Native(crate::object::NativeFn),
    Invalid,
}

impl Interpreter {
    /// Lay out a frame for `setup.code` over the arguments at `setup.argv`.
    /// The register file is untouched when this fails.
    pub(crate) fn push_frame(
        &mut self,
        caller: Option<&ExecState>,
        setup: FrameSetup,
    ) -> Result<ExecState, JsError> {
        let FrameSetup {
            code,
            scope,
            callee,
            argv,
            argc,
            return_register,
            construct,
            suspended_scope,
        } = setup;
        let params = code.num_parameters as usize;
        let locals = code.num_callee_registers as usize;
        let fp = if argc > params {
            argv + argc + params + HEADER_SIZE
        } else {
            argv + params + HEADER_SIZE
        };
        self.registers.ensure(fp + locals)?;

        if argc > params {
            self.registers.copy_values(argv, argv + argc, params)?;
        } else if argc < params {
            self.registers.clear(argv + argc, argv + params)?;
        }
        self.registers.clear(fp, fp + locals)?;

        let mut scope = scope;
        let mut activation = None;
        if code.needs_full_scope_chain {
            let obj = self.alloc(JsObject::new(
                None,
                ExoticObject::Activation(Activation {
                    code: code.clone(),
                    storage: ActivationStorage::Live { fp },
                }),
            ));
            scope = scope.push(obj);
            activation = Some(obj);
        }

        let (caller_code, return_ip, caller_scope, caller_fp) = match caller {
            Some(state) => (Some(state.code.clone()), state.ip, state.scope.clone(), state.fp),
            None => (None, 0, suspended_scope.unwrap_or_default(), self.current_fp),
        };
        CallFrameHeader {
            caller_code,
            return_ip,
            caller_scope,
            caller_fp,
            return_register,
            argument_start: argv,
            argument_count: argc,
            called_as_constructor: construct,
            callee,
            activation,
            arguments: None,
            scope_base_depth: scope.depth(),
        }
        .write(&mut self.registers, fp)?;
        self.registers.set_top(fp + locals)?;
        self.current_fp = fp;

        Ok(ExecState {
            code,
            ip: 0,
            fp,
            scope,
        })
    }

    /// Read the header of the frame at `fp` and detach its activation from
    /// the register file
    pub(crate) fn pop_frame(&mut self, fp: usize) -> Result<CallFrameHeader, JsError> {
        let header = CallFrameHeader::read(&self.registers, fp)?;
        if let Some(activation) = header.activation {
            self.tear_off(activation)?;
        }
        Ok(header)
    }

    fn tear_off(&mut self, activation: ObjectRef) -> Result<(), JsError> {
        let (fp, code) = match &self.heap.get(activation)?.exotic {
            ExoticObject::Activation(Activation {
                storage: ActivationStorage::Live { fp },
                code,
            }) => (*fp, code.clone()),
            _ => return Ok(()),
        };
        let values = code
            .symbols
            .values()
            .map(|entry| self.registers.read(fp, entry.register))
            .collect::<Result<Vec<_>, _>>()?;
        if let ExoticObject::Activation(act) = &mut self.heap.get_mut(activation)?.exotic {
            act.storage = ActivationStorage::TornOff(values);
        }
        Ok(())
    }

    /// Leave the current frame with `value`. Returns the value when the frame
    /// was an entry frame, i.e. when `run` is done.
    fn return_from_frame(
        &mut self,
        state: &mut ExecState,
        mut value: JsValue,
    ) -> Result<Option<JsValue>, JsError> {
        let header = self.pop_frame(state.fp)?;
        if header.called_as_constructor && !value.is_object() {
            value = self.registers.read(state.fp, state.code.this_register())?;
        }
        match header.caller_code {
            None => {
                self.registers.set_top(header.argument_start)?;
                self.current_fp = header.caller_fp;
                Ok(Some(value))
            }
            Some(code) => {
                let caller_fp = header.caller_fp;
                self.registers
                    .set_top(caller_fp + code.num_callee_registers as usize)?;
                self.registers
                    .write(caller_fp, header.return_register, value)?;
                *state = ExecState {
                    code,
                    ip: header.return_ip,
                    fp: caller_fp,
                    scope: header.caller_scope,
                };
                self.current_fp = caller_fp;
                Ok(None)
            }
        }
    }

    pub(crate) fn run(&mut self, mut state: ExecState) -> Result<JsValue, JsError> {
        loop {
            match self.dispatch(&mut state) {
                Ok(value) => return Ok(value),
                Err(error) => self.unwind(&mut state, error)?,
            }
        }
    }

    fn dispatch(&mut self, state: &mut ExecState) -> Result<JsValue, JsError> {
        loop {
            let op = *state
                .code
                .get(state.ip)
                .ok_or_else(|| JsError::internal_error("instruction pointer out of range"))?;
            state.ip += 1;
            let fp = state.fp;

            match op {
                // ═══════════════════════════════════════════════════════════════
                // Constants & registers
                // ═══════════════════════════════════════════════════════════════
                Op::LoadConst { dst, idx } => {
                    let value = match state.code.get_constant(idx) {
                        Some(Constant::String(s)) => JsValue::String(s.cheap_clone()),
                        Some(Constant::Number(n)) => JsValue::number(*n),
                        _ => return Err(JsError::internal_error("unloadable constant")),
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::LoadInt { dst, value } => self.registers.write(fp, dst, JsValue::Int(value))?,
                Op::LoadUndefined { dst } => self.registers.write(fp, dst, JsValue::Undefined)?,
                Op::LoadNull { dst } => self.registers.write(fp, dst, JsValue::Null)?,
                Op::LoadBool { dst, value } => {
                    self.registers.write(fp, dst, JsValue::Boolean(value))?
                }
                Op::Mov { dst, src } => {
                    let value = self.registers.read(fp, src)?;
                    self.registers.write(fp, dst, value)?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Arithmetic
                // ═══════════════════════════════════════════════════════════════
                Op::Add { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = match fast::add(&l, &r) {
                        Some(v) => v,
                        None => self.add_values(&l, &r)?,
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::Sub { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = match fast::sub(&l, &r) {
                        Some(v) => v,
                        None => self.arithmetic(&l, &r, |a, b| a - b)?,
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::Mul { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = match fast::mul(&l, &r) {
                        Some(v) => v,
                        None => self.arithmetic(&l, &r, |a, b| a * b)?,
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::Div { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = match (l.as_number(), r.as_number()) {
                        (Some(a), Some(b)) => JsValue::number(a / b),
                        _ => self.arithmetic(&l, &r, |a, b| a / b)?,
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::Mod { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = match fast::modulo(&l, &r) {
                        Some(v) => v,
                        None => self.arithmetic(&l, &r, |a, b| a % b)?,
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::Negate { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    let value = match v {
                        JsValue::Int(i) if i != 0 && i != i32::MIN => JsValue::Int(-i),
                        other => JsValue::Number(-self.to_number(&other)?),
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::ToNumber { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    let value = match v {
                        JsValue::Int(_) | JsValue::Number(_) => v,
                        other => JsValue::number(self.to_number(&other)?),
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::PreInc { srcdst } => self.step_in_place(fp, srcdst, 1)?,
                Op::PreDec { srcdst } => self.step_in_place(fp, srcdst, -1)?,
                Op::PostInc { dst, srcdst } => self.step_post(fp, dst, srcdst, 1)?,
                Op::PostDec { dst, srcdst } => self.step_post(fp, dst, srcdst, -1)?,

                // ═══════════════════════════════════════════════════════════════
                // Bitwise
                // ═══════════════════════════════════════════════════════════════
                Op::BitAnd { dst, left, right } => {
                    let (a, b) = self.int32_operands(fp, left, right)?;
                    self.registers.write(fp, dst, JsValue::Int(a & b))?;
                }
                Op::BitOr { dst, left, right } => {
                    let (a, b) = self.int32_operands(fp, left, right)?;
                    self.registers.write(fp, dst, JsValue::Int(a | b))?;
                }
                Op::BitXor { dst, left, right } => {
                    let (a, b) = self.int32_operands(fp, left, right)?;
                    self.registers.write(fp, dst, JsValue::Int(a ^ b))?;
                }
                Op::LShift { dst, left, right } => {
                    let (a, b) = self.int32_operands(fp, left, right)?;
                    let value = JsValue::Int(a.wrapping_shl(b as u32 & 31));
                    self.registers.write(fp, dst, value)?;
                }
                Op::RShift { dst, left, right } => {
                    let (a, b) = self.int32_operands(fp, left, right)?;
                    let value = JsValue::Int(a >> (b as u32 & 31));
                    self.registers.write(fp, dst, value)?;
                }
                Op::URShift { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let a = self.to_uint32(&l)?;
                    let b = self.to_uint32(&r)?;
                    let value = JsValue::number(f64::from(a >> (b & 31)));
                    self.registers.write(fp, dst, value)?;
                }
                Op::BitNot { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    let a = self.to_int32(&v)?;
                    self.registers.write(fp, dst, JsValue::Int(!a))?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Comparison & logic
                // ═══════════════════════════════════════════════════════════════
                Op::Eq { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = self.loose_equals(&l, &r)?;
                    self.registers.write(fp, dst, JsValue::Boolean(value))?;
                }
                Op::NotEq { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    let value = self.loose_equals(&l, &r)?;
                    self.registers.write(fp, dst, JsValue::Boolean(!value))?;
                }
                Op::StrictEq { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    self.registers
                        .write(fp, dst, JsValue::Boolean(l.strict_equals(&r)))?;
                }
                Op::StrictNotEq { dst, left, right } => {
                    let l = self.registers.read(fp, left)?;
                    let r = self.registers.read(fp, right)?;
                    self.registers
                        .write(fp, dst, JsValue::Boolean(!l.strict_equals(&r)))?;
                }
                Op::Less { dst, left, right } => {
                    let value = self.less(fp, left, right)?;
                    self.registers.write(fp, dst, JsValue::Boolean(value))?;
                }
                Op::LessEq { dst, left, right } => {
                    let value = self.less_eq(fp, left, right)?;
                    self.registers.write(fp, dst, JsValue::Boolean(value))?;
                }
                Op::EqNull { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    self.registers
                        .write(fp, dst, JsValue::Boolean(v.is_null_or_undefined()))?;
                }
                Op::NotEqNull { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    self.registers
                        .write(fp, dst, JsValue::Boolean(!v.is_null_or_undefined()))?;
                }
                Op::Not { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    self.registers
                        .write(fp, dst, JsValue::Boolean(!v.to_boolean()))?;
                }
                Op::InstanceOf {
                    dst,
                    value,
                    constructor,
                } => {
                    let v = self.registers.read(fp, value)?;
                    let c = self.registers.read(fp, constructor)?;
                    let result = self.instance_of(&v, &c)?;
                    self.registers.write(fp, dst, JsValue::Boolean(result))?;
                }
                Op::In {
                    dst,
                    property,
                    object,
                } => {
                    let p = self.registers.read(fp, property)?;
                    let o = self.registers.read(fp, object)?;
                    let result = self.has_in(&p, &o)?;
                    self.registers.write(fp, dst, JsValue::Boolean(result))?;
                }
                Op::TypeOf { dst, src } => {
                    let v = self.registers.read(fp, src)?;
                    let name = self.type_of(&v);
                    let value = JsValue::String(self.intern(name));
                    self.registers.write(fp, dst, value)?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Jumps
                // ═══════════════════════════════════════════════════════════════
                Op::Jmp { offset } => state.ip = jump_target(state.ip, offset)?,
                Op::JTrue { cond, offset } => {
                    if self.registers.read(fp, cond)?.to_boolean() {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JFalse { cond, offset } => {
                    if !self.registers.read(fp, cond)?.to_boolean() {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JEqNull { src, offset } => {
                    if self.registers.read(fp, src)?.is_null_or_undefined() {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JNEqNull { src, offset } => {
                    if !self.registers.read(fp, src)?.is_null_or_undefined() {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JLess {
                    left,
                    right,
                    offset,
                } => {
                    if self.less(fp, left, right)? {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JLessEq {
                    left,
                    right,
                    offset,
                } => {
                    if self.less_eq(fp, left, right)? {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JNLess {
                    left,
                    right,
                    offset,
                } => {
                    if !self.less(fp, left, right)? {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::JNLessEq {
                    left,
                    right,
                    offset,
                } => {
                    if !self.less_eq(fp, left, right)? {
                        state.ip = jump_target(state.ip, offset)?;
                    }
                }
                Op::Loop { offset } => {
                    self.backward_jump(state, offset)?;
                }
                Op::LoopIfTrue { cond, offset } => {
                    if self.registers.read(fp, cond)?.to_boolean() {
                        self.backward_jump(state, offset)?;
                    }
                }
                Op::LoopIfLess {
                    left,
                    right,
                    offset,
                } => {
                    if self.less(fp, left, right)? {
                        self.backward_jump(state, offset)?;
                    }
                }
                Op::LoopIfLessEq {
                    left,
                    right,
                    offset,
                } => {
                    if self.less_eq(fp, left, right)? {
                        self.backward_jump(state, offset)?;
                    }
                }

                // ═══════════════════════════════════════════════════════════════
                // Switch tables
                // ═══════════════════════════════════════════════════════════════
                Op::SwitchImm {
                    table,
                    default_offset,
                    scrutinee,
                } => {
                    let key = match self.registers.read(fp, scrutinee)? {
                        JsValue::Int(i) => Some(i),
                        JsValue::Number(n)
                            if n.fract() == 0.0
                                && n >= f64::from(i32::MIN)
                                && n <= f64::from(i32::MAX) =>
                        {
                            Some(n as i32)
                        }
                        _ => None,
                    };
                    let offset = key
                        .and_then(|k| {
                            state
                                .code
                                .immediate_switch_tables
                                .get(table as usize)?
                                .offset_for(k)
                        })
                        .unwrap_or(default_offset);
                    state.ip = jump_target(state.ip, offset)?;
                }
                Op::SwitchChar {
                    table,
                    default_offset,
                    scrutinee,
                } => {
                    let key = match self.registers.read(fp, scrutinee)? {
                        JsValue::String(s) if s.utf16_len() == 1 => {
                            s.code_unit_at(0).map(i32::from)
                        }
                        _ => None,
                    };
                    let offset = key
                        .and_then(|k| {
                            state
                                .code
                                .character_switch_tables
                                .get(table as usize)?
                                .offset_for(k)
                        })
                        .unwrap_or(default_offset);
                    state.ip = jump_target(state.ip, offset)?;
                }
                Op::SwitchString {
                    table,
                    default_offset,
                    scrutinee,
                } => {
                    let offset = match self.registers.read(fp, scrutinee)? {
                        JsValue::String(s) => state
                            .code
                            .string_switch_tables
                            .get(table as usize)
                            .and_then(|t| t.offset_for(&s)),
                        _ => None,
                    }
                    .unwrap_or(default_offset);
                    state.ip = jump_target(state.ip, offset)?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Identifier resolution
                // ═══════════════════════════════════════════════════════════════
                Op::Resolve { dst, name } => {
                    let name = string_constant(&state.code, name)?;
                    let value = self.resolve_name(&state.scope, 0, &name)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::ResolveSkip { dst, name, skip } => {
                    let name = string_constant(&state.code, name)?;
                    let value = self.resolve_name(&state.scope, skip, &name)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::ResolveGlobal { dst, name, cache } => {
                    let value = self.resolve_global(&state.code, name, cache)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::ResolveBase { dst, name } => {
                    let name = string_constant(&state.code, name)?;
                    let base = self.resolve_base(&state.scope, &name)?;
                    self.registers.write(fp, dst, JsValue::Object(base))?;
                }
                Op::ResolveWithBase {
                    base_dst,
                    func_dst,
                    name,
                } => {
                    let name = string_constant(&state.code, name)?;
                    let (base, func) = self.resolve_with_base(&state.scope, &name)?;
                    self.registers.write(fp, base_dst, base)?;
                    self.registers.write(fp, func_dst, func)?;
                }
                Op::GetScopedVar { dst, depth, index } => {
                    let node = state
                        .scope
                        .nth(depth)
                        .ok_or_else(|| JsError::internal_error("scope depth out of range"))?;
                    let value = self.read_scoped(node, index as usize)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::PutScopedVar {
                    depth,
                    index,
                    value,
                } => {
                    let node = state
                        .scope
                        .nth(depth)
                        .ok_or_else(|| JsError::internal_error("scope depth out of range"))?;
                    let value = self.registers.read(fp, value)?;
                    self.write_scoped(node, index as usize, value)?;
                }
                Op::GetGlobalVar { dst, index } => {
                    let value = self.realm.global_slot(index)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::PutGlobalVar { index, value } => {
                    let value = self.registers.read(fp, value)?;
                    self.realm.set_global_slot(index, value)?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Property access
                // ═══════════════════════════════════════════════════════════════
                Op::GetById { dst, base, name } => {
                    let base = self.registers.read(fp, base)?;
                    let key = PropertyKey::from(string_constant(&state.code, name)?);
                    let value = self.get_value_property(&base, &key)?;
                    self.registers.write(fp, dst, value)?;
                }
                Op::PutById { base, name, value } => {
                    let base = self.registers.read(fp, base)?;
                    let key = PropertyKey::from(string_constant(&state.code, name)?);
                    let value = self.registers.read(fp, value)?;
                    self.put_value_property(&base, key, value)?;
                }
                Op::DelById { dst, base, name } => {
                    let base = self.registers.read(fp, base)?;
                    let key = PropertyKey::from(string_constant(&state.code, name)?);
                    let deleted = self.delete_value_property(&base, &key)?;
                    self.registers.write(fp, dst, JsValue::Boolean(deleted))?;
                }
                Op::GetByVal {
                    dst,
                    base,
                    property,
                } => {
                    let base = self.registers.read(fp, base)?;
                    let property = self.registers.read(fp, property)?;
                    let value = match self.get_by_index_fast(&base, &property) {
                        Some(value) => value,
                        None => {
                            let key = self.to_property_key(&property)?;
                            self.get_value_property(&base, &key)?
                        }
                    };
                    self.registers.write(fp, dst, value)?;
                }
                Op::PutByVal {
                    base,
                    property,
                    value,
                } => {
                    let base = self.registers.read(fp, base)?;
                    let property = self.registers.read(fp, property)?;
                    let value = self.registers.read(fp, value)?;
                    if let Some(value) = self.put_by_index_fast(&base, &property, value)? {
                        let key = self.to_property_key(&property)?;
                        self.put_value_property(&base, key, value)?;
                    }
                }
                Op::DelByVal {
                    dst,
                    base,
                    property,
                } => {
                    let base = self.registers.read(fp, base)?;
                    let property = self.registers.read(fp, property)?;
                    let key = self.to_property_key(&property)?;
                    let deleted = self.delete_value_property(&base, &key)?;
                    self.registers.write(fp, dst, JsValue::Boolean(deleted))?;
                }
                Op::PutByIndex { base, index, value } => {
                    let base = self.registers.read(fp, base)?;
                    let value = self.registers.read(fp, value)?;
                    let obj = base
                        .as_object()
                        .ok_or_else(|| {
                            JsError::internal_error("array literal base is not an object")
                        })?;
                    self.heap
                        .get_mut(obj)?
                        .put_own(PropertyKey::Index(index), value)?;
                }
                Op::GetPNames {
                    dst,
                    base,
                    break_offset,
                } => {
                    let base = self.registers.read(fp, base)?;
                    if base.is_null_or_undefined() {
                        state.ip = jump_target(state.ip, break_offset)?;
                        continue;
                    }
                    let obj = self.to_object(&base)?;
                    let names = self.enumerable_names(obj)?;
                    let iter = self.alloc(JsObject::new(
                        None,
                        ExoticObject::PropertyIterator(PropertyIterator {
                            object: Some(obj),
                            names,
                            position: 0,
                        }),
                    ));
                    self.registers.write(fp, dst, JsValue::Object(iter))?;
                }
                Op::NextPName { dst, iter, offset } => {
                    self.timeout.tick()?;
                    let iter = self
                        .registers
                        .read(fp, iter)?
                        .as_object()
                        .ok_or_else(|| JsError::internal_error("for-in iterator missing"))?;
                    if let Some(name) = self.next_property_name(iter)? {
                        self.registers.write(fp, dst, JsValue::String(name))?;
                        self.backward_jump(state, offset)?;
                    }
                }

                // ═══════════════════════════════════════════════════════════════
                // Object creation
                // ═══════════════════════════════════════════════════════════════
                Op::NewObject { dst } => {
                    let obj = self.create_object();
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                }
                Op::NewArray { dst, first, count } => {
                    let values = if count == 0 {
                        Vec::new()
                    } else {
                        let first = RegisterFile::position(fp, first)?;
                        self.registers.values(first, count as usize)?
                    };
                    let obj = self.create_array(values);
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                }
                Op::NewRegExp { dst, regexp } => {
                    let (pattern, flags) = match state.code.get_constant(regexp) {
                        Some(Constant::RegExp { pattern, flags }) => {
                            (pattern.cheap_clone(), flags.cheap_clone())
                        }
                        _ => return Err(JsError::internal_error("constant is not a regexp")),
                    };
                    let obj = super::builtins::regexp::create_regexp(self, &pattern, &flags)?;
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                }
                Op::NewFunction { dst, func } => {
                    let code = function_constant(&state.code, func)?;
                    let obj = self.create_script_function(code, state.scope.clone());
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                }
                Op::NewFuncExp { dst, func } => {
                    let code = function_constant(&state.code, func)?;
                    let obj = self.create_function_expression(code, &state.scope)?;
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Calls
                // ═══════════════════════════════════════════════════════════════
                Op::Call {
                    dst,
                    func,
                    first_arg,
                    argc,
                } => self.op_call(state, dst, func, first_arg, argc, false)?,
                Op::CallEval {
                    dst,
                    func,
                    first_arg,
                    argc,
                } => {
                    let callee = self.registers.read(fp, func)?;
                    let receiver_is_global = match self.registers.read(fp, first_arg)? {
                        JsValue::Undefined => true,
                        JsValue::Object(obj) => obj == self.realm.global_object,
                        _ => false,
                    };
                    match callee.as_object() {
                        Some(obj) if receiver_is_global && self.realm.is_eval_function(obj) => {
                            let arg = if argc > 1 {
                                self.registers.read(fp, first_arg + 1)?
                            } else {
                                JsValue::Undefined
                            };
                            let value = match arg {
                                JsValue::String(text) => {
                                    let this = self.registers.read(fp, state.code.this_register())?;
                                    self.execute_eval(&text, state.scope.clone(), this)?
                                }
                                other => other,
                            };
                            self.registers.write(fp, dst, value)?;
                        }
                        _ => self.op_call(state, dst, func, first_arg, argc, false)?,
                    }
                }
                Op::Construct {
                    dst,
                    func,
                    first_arg,
                    argc,
                } => self.op_call(state, dst, func, first_arg, argc, true)?,
                Op::Ret { src } => {
                    let value = self.registers.read(fp, src)?;
                    if let Some(value) = self.return_from_frame(state, value)? {
                        return Ok(value);
                    }
                }
                Op::End { src } => {
                    let value = self.registers.read(fp, src)?;
                    if let Some(value) = self.return_from_frame(state, value)? {
                        return Ok(value);
                    }
                }
                Op::ConvertThis { this } => {
                    let value = self.registers.read(fp, this)?;
                    let converted = match value {
                        JsValue::Undefined | JsValue::Null => {
                            JsValue::Object(self.realm.global_object)
                        }
                        JsValue::Object(_) => value,
                        primitive => JsValue::Object(self.to_object(&primitive)?),
                    };
                    self.registers.write(fp, this, converted)?;
                }
                Op::CreateArguments { dst } => {
                    let arguments = self.arguments_for_frame(fp)?;
                    self.registers.write(fp, dst, JsValue::Object(arguments))?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Exceptions & finally subroutines
                // ═══════════════════════════════════════════════════════════════
                Op::Throw { src } => {
                    let value = self.registers.read(fp, src)?;
                    return Err(JsError::Exception {
                        value,
                        message: String::new(),
                        location: None,
                    });
                }
                Op::Catch { dst } => {
                    let value = self.exception.take().unwrap_or(JsValue::Undefined);
                    self.registers.write(fp, dst, value)?;
                }
                Op::Jsr { ret_reg, offset } => {
                    let return_ip = i32::try_from(state.ip)
                        .map_err(|_| JsError::internal_error("code block too large"))?;
                    self.registers.write(fp, ret_reg, JsValue::Int(return_ip))?;
                    state.ip = jump_target(state.ip, offset)?;
                }
                Op::Sret { ret_reg } => match self.registers.read(fp, ret_reg)? {
                    JsValue::Int(ip) if ip >= 0 => state.ip = ip as usize,
                    _ => return Err(JsError::internal_error("corrupt finally return address")),
                },

                // ═══════════════════════════════════════════════════════════════
                // Scopes
                // ═══════════════════════════════════════════════════════════════
                Op::PushScope { src } => {
                    let value = self.registers.read(fp, src)?;
                    let obj = self.to_object(&value)?;
                    state.scope = state.scope.push(obj);
                }
                Op::PushNewScope { dst, name, value } => {
                    let name = string_constant(&state.code, name)?;
                    let value = self.registers.read(fp, value)?;
                    let mut scope = JsObject::new(None, ExoticObject::StaticScope);
                    scope.define(
                        PropertyKey::from(name),
                        value,
                        PropertyAttributes::DONT_DELETE,
                    );
                    let obj = self.alloc(scope);
                    self.registers.write(fp, dst, JsValue::Object(obj))?;
                    state.scope = state.scope.push(obj);
                }
                Op::PopScope => state.scope = state.scope.pop(),
                Op::JmpScopes { count, offset } => {
                    let depth = state.scope.depth().saturating_sub(count);
                    state.scope = state.scope.truncate(depth);
                    state.ip = jump_target(state.ip, offset)?;
                }
                Op::DeclareVar {
                    name,
                    init,
                    read_only,
                } => {
                    let name = string_constant(&state.code, name)?;
                    let init = match init {
                        Some(reg) => Some(self.registers.read(fp, reg)?),
                        None => None,
                    };
                    self.declare_var(state, name, init, read_only)?;
                }

                // ═══════════════════════════════════════════════════════════════
                // Miscellaneous
                // ═══════════════════════════════════════════════════════════════
                Op::Debug { hook, line } => {
                    #[cfg(feature = "debugger")]
                    if self.debugger.is_some() {
                        let frame = self.debugger_frame(state, line);
                        if let Some(debugger) = self.debugger.as_mut() {
                            super::debugger::dispatch_hook(debugger.as_mut(), hook, &frame);
                        }
                    }
                    #[cfg(not(feature = "debugger"))]
                    let _ = (hook, line);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Instruction helpers
    // ═══════════════════════════════════════════════════════════════════════════

    #[inline]
    fn backward_jump(&mut self, state: &mut ExecState, offset: JumpOffset) -> Result<(), JsError> {
        self.timeout.tick()?;
        state.ip = jump_target(state.ip, offset)?;
        self.maybe_collect(&state.scope);
        Ok(())
    }

    fn less(&mut self, fp: usize, left: Register, right: Register) -> Result<bool, JsError> {
        let l = self.registers.read(fp, left)?;
        let r = self.registers.read(fp, right)?;
        match fast::less(&l, &r) {
            Some(result) => Ok(result),
            None => Ok(self.less_than(&l, &r)? == Some(true)),
        }
    }

    fn less_eq(&mut self, fp: usize, left: Register, right: Register) -> Result<bool, JsError> {
        let l = self.registers.read(fp, left)?;
        let r = self.registers.read(fp, right)?;
        match fast::less_eq(&l, &r) {
            Some(result) => Ok(result),
            None => self.less_equal(&l, &r),
        }
    }

    fn int32_operands(
        &mut self,
        fp: usize,
        left: Register,
        right: Register,
    ) -> Result<(i32, i32), JsError> {
        let l = self.registers.read(fp, left)?;
        let r = self.registers.read(fp, right)?;
        let a = self.to_int32(&l)?;
        let b = self.to_int32(&r)?;
        Ok((a, b))
    }

    fn step_in_place(&mut self, fp: usize, srcdst: Register, delta: i32) -> Result<(), JsError> {
        let v = self.registers.read(fp, srcdst)?;
        let value = match fast::increment(&v, delta) {
            Some(value) => value,
            None => JsValue::number(self.to_number(&v)? + f64::from(delta)),
        };
        self.registers.write(fp, srcdst, value)
    }

    fn step_post(
        &mut self,
        fp: usize,
        dst: Register,
        srcdst: Register,
        delta: i32,
    ) -> Result<(), JsError> {
        let v = self.registers.read(fp, srcdst)?;
        let old = match v {
            JsValue::Int(_) | JsValue::Number(_) => v,
            other => JsValue::number(self.to_number(&other)?),
        };
        let new = match fast::increment(&old, delta) {
            Some(value) => value,
            None => return Err(JsError::internal_error("numeric increment failed")),
        };
        self.registers.write(fp, dst, old)?;
        self.registers.write(fp, srcdst, new)
    }

    fn get_by_index_fast(&self, base: &JsValue, property: &JsValue) -> Option<JsValue> {
        let JsValue::Int(i) = property else {
            return None;
        };
        let index = usize::try_from(*i).ok()?;
        match base {
            JsValue::Object(obj) => match &self.heap.get(*obj).ok()?.exotic {
                ExoticObject::Array(storage) => storage.elements.get(index)?.clone(),
                _ => None,
            },
            JsValue::String(s) => s.char_at(index).map(JsValue::String),
            _ => None,
        }
    }

    /// In-bounds array store. Returns the value back when the generic path
    /// has to handle it.
    fn put_by_index_fast(
        &mut self,
        base: &JsValue,
        property: &JsValue,
        value: JsValue,
    ) -> Result<Option<JsValue>, JsError> {
        let (JsValue::Object(obj), JsValue::Int(i)) = (base, property) else {
            return Ok(Some(value));
        };
        let Ok(index) = usize::try_from(*i) else {
            return Ok(Some(value));
        };
        if let ExoticObject::Array(storage) = &mut self.heap.get_mut(*obj)?.exotic {
            if let Some(slot @ Some(_)) = storage.elements.get_mut(index) {
                *slot = Some(value);
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    fn op_call(
        &mut self,
        state: &mut ExecState,
        dst: Register,
        func: Register,
        first_arg: Register,
        argc: u32,
        construct: bool,
    ) -> Result<(), JsError> {
        let fp = state.fp;
        let callee = self.registers.read(fp, func)?;
        let argv = RegisterFile::position(fp, first_arg)?;
        let argc = argc as usize;

        let target = match callee.as_object() {
            Some(obj) => match &self.heap.get(obj)?.exotic {
                ExoticObject::Function(FunctionKind::Script { code, scope }) => {
                    CallTarget::Script(code.clone(), scope.clone())
                }
                ExoticObject::Function(FunctionKind::Native {
                    call, construct: ctor, ..
                }) => match (construct, ctor) {
                    (false, _) => CallTarget::Native(*call),
                    (true, Some(ctor)) => CallTarget::Native(*ctor),
                    (true, None) => CallTarget::Invalid,
                },
                _ => CallTarget::Invalid,
            },
            None => CallTarget::Invalid,
        };

        match target {
            CallTarget::Script(code, scope) => {
                let Some(obj) = callee.as_object() else {
                    return Err(JsError::internal_error("script callee is not an object"));
                };
                if construct {
                    let this = self.allocate_this_for(obj)?;
                    self.registers.set(argv, JsValue::Object(this))?;
                }
                let next = self.push_frame(
                    Some(state),
                    FrameSetup {
                        code,
                        scope,
                        callee: Some(obj),
                        argv,
                        argc,
                        return_register: dst,
                        construct,
                        suspended_scope: None,
                    },
                )?;
                *state = next;
                self.maybe_collect(&state.scope);
                Ok(())
            }
            CallTarget::Native(native) => {
                let this = if construct {
                    JsValue::Undefined
                } else {
                    self.registers.get(argv)?.cheap_clone()
                };
                let args = self.registers.values(argv + 1, argc.saturating_sub(1))?;
                let result = self.call_native(native, this, &args)?;
                self.registers.write(fp, dst, result)
            }
            CallTarget::Invalid => {
                let what = self
                    .call_site_text(state)
                    .unwrap_or_else(|| self.describe_value(&callee));
                let message = if construct {
                    format!("{} is not a constructor", what)
                } else {
                    format!("{} is not a function", what)
                };
                Err(JsError::type_error(message))
            }
        }
    }

    /// Source text of the callee expression at the current call
    fn call_site_text(&self, state: &ExecState) -> Option<String> {
        let span = state.code.span_at(state.ip.checked_sub(1)?)?;
        let text = state.code.source.slice(span);
        let text = text.strip_prefix("new ").unwrap_or(text);
        let callee = text.split('(').next()?.trim();
        (!callee.is_empty()).then(|| callee.to_string())
    }

    fn create_function_expression(
        &mut self,
        code: Rc<CodeBlock>,
        scope: &ScopeChain,
    ) -> Result<ObjectRef, JsError> {
        let name = match (&code.name, code.has_name_scope) {
            (Some(name), true) => name.cheap_clone(),
            _ => return Ok(self.create_script_function(code, scope.clone())),
        };
        let name_scope = self.alloc(JsObject::new(None, ExoticObject::StaticScope));
        let function = self.create_script_function(code, scope.push(name_scope));
        self.heap.get_mut(name_scope)?.define(
            PropertyKey::from(name),
            JsValue::Object(function),
            PropertyAttributes::READ_ONLY.union(PropertyAttributes::DONT_DELETE),
        );
        Ok(function)
    }

    fn next_property_name(&mut self, iter: ObjectRef) -> Result<Option<JsString>, JsError> {
        loop {
            let (object, name) = match &mut self.heap.get_mut(iter)?.exotic {
                ExoticObject::PropertyIterator(it) => {
                    let name = it.names.get(it.position).cloned();
                    if name.is_some() {
                        it.position += 1;
                    }
                    (it.object, name)
                }
                _ => return Err(JsError::internal_error("for-in iterator missing")),
            };
            let (Some(object), Some(name)) = (object, name) else {
                return Ok(None);
            };
            // Skip names deleted since the loop started
            if self.has_property(object, &PropertyKey::from(name.cheap_clone()))? {
                return Ok(Some(name));
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Scope chain access
    // ═══════════════════════════════════════════════════════════════════════════

    /// Value bound to `name` directly on a scope node
    fn lookup_binding(
        &mut self,
        node: ObjectRef,
        name: &JsString,
    ) -> Result<Option<JsValue>, JsError> {
        let key = PropertyKey::from(name.cheap_clone());
        let is_static = matches!(
            self.heap.get(node)?.exotic,
            ExoticObject::Activation(_) | ExoticObject::StaticScope
        );
        if is_static {
            return self.get_own_property(node, &key);
        }
        if self.has_property(node, &key)? {
            return self.get_property(node, &key).map(Some);
        }
        Ok(None)
    }

    fn resolve_name(
        &mut self,
        scope: &ScopeChain,
        skip: u32,
        name: &JsString,
    ) -> Result<JsValue, JsError> {
        for node in scope.objects().skip(skip as usize) {
            if let Some(value) = self.lookup_binding(node, name)? {
                return Ok(value);
            }
        }
        Err(JsError::reference_error(name.as_str()))
    }

    fn resolve_base(&mut self, scope: &ScopeChain, name: &JsString) -> Result<ObjectRef, JsError> {
        let key = PropertyKey::from(name.cheap_clone());
        for node in scope.objects() {
            let is_static = matches!(
                self.heap.get(node)?.exotic,
                ExoticObject::Activation(_) | ExoticObject::StaticScope
            );
            let bound = if is_static {
                self.has_own_property(node, &key)?
            } else {
                self.has_property(node, &key)?
            };
            if bound {
                return Ok(node);
            }
        }
        Ok(self.realm.global_object)
    }

    fn resolve_with_base(
        &mut self,
        scope: &ScopeChain,
        name: &JsString,
    ) -> Result<(JsValue, JsValue), JsError> {
        for node in scope.objects() {
            if let Some(value) = self.lookup_binding(node, name)? {
                let is_with_object = !matches!(
                    self.heap.get(node)?.exotic,
                    ExoticObject::Activation(_) | ExoticObject::StaticScope | ExoticObject::Global
                );
                let base = if is_with_object {
                    JsValue::Object(node)
                } else {
                    JsValue::Undefined
                };
                return Ok((base, value));
            }
        }
        Err(JsError::reference_error(name.as_str()))
    }

    fn resolve_global(
        &mut self,
        code: &CodeBlock,
        name: u32,
        cache: u32,
    ) -> Result<JsValue, JsError> {
        let cell = code
            .global_cache
            .get(cache as usize)
            .ok_or_else(|| JsError::internal_error("global cache index out of range"))?;
        let global = self.realm.global_object;
        match cell.get() {
            Some(GlobalCacheEntry::Slot(index)) => return self.realm.global_slot(index),
            Some(GlobalCacheEntry::Property { version, index })
                if version == self.realm.global_version =>
            {
                if let Some((_, property)) = self.heap.get(global)?.properties.get_index(index) {
                    return Ok(property.value.cheap_clone());
                }
            }
            _ => {}
        }

        let name = string_constant(code, name)?;
        if let Some(symbol) = self.realm.global_symbols.get(name.as_str()) {
            cell.set(Some(GlobalCacheEntry::Slot(symbol.index)));
            return self.realm.global_slot(symbol.index);
        }
        let key = PropertyKey::from(name.cheap_clone());
        if let Some((index, _, property)) = self.heap.get(global)?.properties.get_full(&key) {
            let value = property.value.cheap_clone();
            cell.set(Some(GlobalCacheEntry::Property {
                version: self.realm.global_version,
                index,
            }));
            return Ok(value);
        }
        if self.has_property(global, &key)? {
            return self.get_property(global, &key);
        }
        Err(JsError::reference_error(name.as_str()))
    }

    fn read_scoped(&self, node: ObjectRef, index: usize) -> Result<JsValue, JsError> {
        let object = self.heap.get(node)?;
        match &object.exotic {
            ExoticObject::Activation(activation) => {
                read_activation(&self.registers, activation, index)
            }
            ExoticObject::StaticScope => object
                .properties
                .get_index(index)
                .map(|(_, p)| p.value.cheap_clone())
                .ok_or_else(|| JsError::internal_error("static scope binding out of range")),
            _ => Err(JsError::internal_error("scoped access on a dynamic scope")),
        }
    }

    fn write_scoped(
        &mut self,
        node: ObjectRef,
        index: usize,
        value: JsValue,
    ) -> Result<(), JsError> {
        if matches!(self.heap.get(node)?.exotic, ExoticObject::Activation(_)) {
            return self.write_activation(node, index, value, true);
        }
        let object = self.heap.get_mut(node)?;
        match &object.exotic {
            ExoticObject::StaticScope => match object.properties.get_index_mut(index) {
                Some((_, property)) => {
                    property.value = value;
                    Ok(())
                }
                None => Err(JsError::internal_error("static scope binding out of range")),
            },
            _ => Err(JsError::internal_error("scoped access on a dynamic scope")),
        }
    }

    /// Declare `name` on the variable object of the running code
    fn declare_var(
        &mut self,
        state: &ExecState,
        name: JsString,
        init: Option<JsValue>,
        read_only: bool,
    ) -> Result<(), JsError> {
        let mut target = self.realm.global_object;
        for node in state.scope.objects() {
            if matches!(
                self.heap.get(node)?.exotic,
                ExoticObject::Activation(_) | ExoticObject::Global
            ) {
                target = node;
                break;
            }
        }

        let symbol = match &self.heap.get(target)?.exotic {
            ExoticObject::Activation(activation) => activation
                .code
                .symbol_index(name.as_str())
                .map(|index| (true, index)),
            ExoticObject::Global => self
                .realm
                .global_symbols
                .get(name.as_str())
                .map(|symbol| (false, symbol.index as usize)),
            _ => None,
        };
        match symbol {
            Some((true, index)) => {
                if let Some(value) = init {
                    self.write_activation(target, index, value, true)?;
                }
                Ok(())
            }
            Some((false, index)) => {
                if let Some(value) = init {
                    self.realm.set_global_slot(index as u32, value)?;
                }
                Ok(())
            }
            None => {
                let key = PropertyKey::from(name);
                let object = self.heap.get_mut(target)?;
                if !object.has_own(&key) {
                    let mut attributes = if state.code.code_type == CodeType::Eval {
                        PropertyAttributes::NONE
                    } else {
                        PropertyAttributes::DONT_DELETE
                    };
                    if read_only {
                        attributes = attributes.union(PropertyAttributes::READ_ONLY);
                    }
                    object.define(key, init.unwrap_or(JsValue::Undefined), attributes);
                } else if let Some(value) = init {
                    if !object.force_set(&key, value.cheap_clone()) {
                        object.put_own(key, value)?;
                    }
                }
                Ok(())
            }
        }
    }

    #[cfg(feature = "debugger")]
    pub(crate) fn debugger_frame(
        &self,
        state: &ExecState,
        line: u32,
    ) -> super::debugger::DebuggerCallFrame {
        super::debugger::DebuggerCallFrame {
            function_name: state.code.name.clone(),
            code_type: state.code.code_type,
            source_id: state.code.source.id,
            source_url: state.code.source.url.clone(),
            line,
        }
    }
}
