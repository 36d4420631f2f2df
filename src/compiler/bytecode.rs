//! Bytecode instruction set and code block format
//!
//! Registers are signed offsets from the frame pointer. Parameters (with
//! `this` first) sit below the call frame header and have negative indices;
//! declared locals start at 0 and temporaries follow them. Jump offsets are
//! relative to the jump instruction itself.

use std::cell::Cell;
use std::rc::Rc;

use crate::lexer::Span;
use crate::prelude::{FxHashMap, IndexMap};
use crate::value::JsString;

/// Frame-relative register index
pub type Register = i32;

/// Constant pool index
pub type ConstantIndex = u32;

/// Relative jump offset (target = index of the jump + offset)
pub type JumpOffset = i32;

/// Number of register slots occupied by a call frame header
pub const CALL_FRAME_HEADER_SIZE: i32 = 12;

/// Register holding `this` for a code block with `num_parameters` slots
pub fn this_register(num_parameters: u32) -> Register {
    -(CALL_FRAME_HEADER_SIZE + num_parameters as i32)
}

/// Register holding parameter `k` (1-based, `this` is 0)
pub fn parameter_register(num_parameters: u32, k: u32) -> Register {
    this_register(num_parameters) + k as i32
}

/// Where an instruction is reported to a debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugHook {
    WillExecuteProgram,
    DidExecuteProgram,
    DidEnterCallFrame,
    WillLeaveCallFrame,
    WillExecuteStatement,
    DidReachBreakpoint,
}

/// Bytecode instruction
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // ═══════════════════════════════════════════════════════════════════════════════
    // Constants & Register Operations
    // ═══════════════════════════════════════════════════════════════════════════════
    /// r[dst] = constants[idx]
    LoadConst { dst: Register, idx: ConstantIndex },
    /// r[dst] = value, used for every int32 literal
    LoadInt { dst: Register, value: i32 },
    LoadUndefined { dst: Register },
    LoadNull { dst: Register },
    LoadBool { dst: Register, value: bool },
    /// r[dst] = r[src]
    Mov { dst: Register, src: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Arithmetic
    // ═══════════════════════════════════════════════════════════════════════════════
    Add { dst: Register, left: Register, right: Register },
    Sub { dst: Register, left: Register, right: Register },
    Mul { dst: Register, left: Register, right: Register },
    Div { dst: Register, left: Register, right: Register },
    Mod { dst: Register, left: Register, right: Register },
    /// r[dst] = -r[src]
    Negate { dst: Register, src: Register },
    /// r[dst] = +r[src]
    ToNumber { dst: Register, src: Register },
    /// r[srcdst] = r[srcdst] + 1
    PreInc { srcdst: Register },
    PreDec { srcdst: Register },
    /// r[dst] = +r[srcdst]; r[srcdst] = r[dst] + 1
    PostInc { dst: Register, srcdst: Register },
    PostDec { dst: Register, srcdst: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Bitwise
    // ═══════════════════════════════════════════════════════════════════════════════
    BitAnd { dst: Register, left: Register, right: Register },
    BitOr { dst: Register, left: Register, right: Register },
    BitXor { dst: Register, left: Register, right: Register },
    LShift { dst: Register, left: Register, right: Register },
    RShift { dst: Register, left: Register, right: Register },
    URShift { dst: Register, left: Register, right: Register },
    BitNot { dst: Register, src: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Comparison & Logic
    // ═══════════════════════════════════════════════════════════════════════════════
    Eq { dst: Register, left: Register, right: Register },
    NotEq { dst: Register, left: Register, right: Register },
    StrictEq { dst: Register, left: Register, right: Register },
    StrictNotEq { dst: Register, left: Register, right: Register },
    /// r[dst] = r[left] < r[right]; `a > b` is emitted as `Less b, a`
    Less { dst: Register, left: Register, right: Register },
    LessEq { dst: Register, left: Register, right: Register },
    /// r[dst] = r[src] == null
    EqNull { dst: Register, src: Register },
    NotEqNull { dst: Register, src: Register },
    Not { dst: Register, src: Register },
    InstanceOf { dst: Register, value: Register, constructor: Register },
    /// r[dst] = r[property] in r[object]
    In { dst: Register, property: Register, object: Register },
    TypeOf { dst: Register, src: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Jumps
    // ═══════════════════════════════════════════════════════════════════════════════
    Jmp { offset: JumpOffset },
    JTrue { cond: Register, offset: JumpOffset },
    JFalse { cond: Register, offset: JumpOffset },
    JEqNull { src: Register, offset: JumpOffset },
    JNEqNull { src: Register, offset: JumpOffset },
    JLess { left: Register, right: Register, offset: JumpOffset },
    JLessEq { left: Register, right: Register, offset: JumpOffset },
    /// Jump when `left < right` is false (including NaN operands)
    JNLess { left: Register, right: Register, offset: JumpOffset },
    JNLessEq { left: Register, right: Register, offset: JumpOffset },

    // Backward jumps; each one ticks the timeout checker
    Loop { offset: JumpOffset },
    LoopIfTrue { cond: Register, offset: JumpOffset },
    LoopIfLess { left: Register, right: Register, offset: JumpOffset },
    LoopIfLessEq { left: Register, right: Register, offset: JumpOffset },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Switch tables
    // ═══════════════════════════════════════════════════════════════════════════════
    SwitchImm { table: u32, default_offset: JumpOffset, scrutinee: Register },
    SwitchChar { table: u32, default_offset: JumpOffset, scrutinee: Register },
    SwitchString { table: u32, default_offset: JumpOffset, scrutinee: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Identifier resolution
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Named walk of the whole scope chain, ReferenceError when unbound
    Resolve { dst: Register, name: ConstantIndex },
    /// Named walk that starts `skip` nodes down the chain
    ResolveSkip { dst: Register, name: ConstantIndex, skip: u32 },
    /// Named lookup on the global object, cached in `global_cache[cache]`
    ResolveGlobal { dst: Register, name: ConstantIndex, cache: u32 },
    /// r[dst] = first chain node holding the name, else the global object
    ResolveBase { dst: Register, name: ConstantIndex },
    /// Resolve a callee and the `this` value it should be called with
    ResolveWithBase { base_dst: Register, func_dst: Register, name: ConstantIndex },
    GetScopedVar { dst: Register, depth: u32, index: u32 },
    PutScopedVar { depth: u32, index: u32, value: Register },
    GetGlobalVar { dst: Register, index: u32 },
    PutGlobalVar { index: u32, value: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Property access
    // ═══════════════════════════════════════════════════════════════════════════════
    GetById { dst: Register, base: Register, name: ConstantIndex },
    PutById { base: Register, name: ConstantIndex, value: Register },
    DelById { dst: Register, base: Register, name: ConstantIndex },
    GetByVal { dst: Register, base: Register, property: Register },
    PutByVal { base: Register, property: Register, value: Register },
    DelByVal { dst: Register, base: Register, property: Register },
    /// Array literal element store
    PutByIndex { base: Register, index: u32, value: Register },
    /// r[dst] = property name iterator over r[base]; jumps when base is null
    /// or undefined
    GetPNames { dst: Register, base: Register, break_offset: JumpOffset },
    /// Fetch the next name from r[iter] and jump, or fall through when
    /// exhausted. Ticks the timeout checker.
    NextPName { dst: Register, iter: Register, offset: JumpOffset },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Object creation
    // ═══════════════════════════════════════════════════════════════════════════════
    NewObject { dst: Register },
    /// Array from registers `first..first+count`
    NewArray { dst: Register, first: Register, count: u32 },
    NewRegExp { dst: Register, regexp: ConstantIndex },
    /// Closure over the current scope chain
    NewFunction { dst: Register, func: ConstantIndex },
    /// Function expression; a named one gets its own name scope
    NewFuncExp { dst: Register, func: ConstantIndex },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════════════
    /// Call r[func] with `argc` values starting at `first_arg`; the first one
    /// is `this`
    Call { dst: Register, func: Register, first_arg: Register, argc: u32 },
    /// Like `Call`, but evaluates in the caller's scope when r[func] is the
    /// realm's own eval function
    CallEval { dst: Register, func: Register, first_arg: Register, argc: u32 },
    Construct { dst: Register, func: Register, first_arg: Register, argc: u32 },
    Ret { src: Register },
    /// End of program or eval code
    End { src: Register },
    /// Coerce `this` for a non-strict function body
    ConvertThis { this: Register },
    CreateArguments { dst: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Exceptions & finally subroutines
    // ═══════════════════════════════════════════════════════════════════════════════
    Throw { src: Register },
    /// r[dst] = pending exception
    Catch { dst: Register },
    /// r[ret_reg] = return address; jump to the finally body
    Jsr { ret_reg: Register, offset: JumpOffset },
    Sret { ret_reg: Register },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Scopes
    // ═══════════════════════════════════════════════════════════════════════════════
    /// `with (r[src])`
    PushScope { src: Register },
    /// Push a single-binding scope (catch parameter, function name)
    PushNewScope { dst: Register, name: ConstantIndex, value: Register },
    PopScope,
    /// Pop `count` scopes, then jump
    JmpScopes { count: u32, offset: JumpOffset },
    /// Declare a variable on the variable object, overwriting it only when
    /// `init` is present
    DeclareVar { name: ConstantIndex, init: Option<Register>, read_only: bool },

    // ═══════════════════════════════════════════════════════════════════════════════
    // Miscellaneous
    // ═══════════════════════════════════════════════════════════════════════════════
    Debug { hook: DebugHook, line: u32 },
}

impl Op {
    /// Mutable access to the jump offset of a branch instruction
    pub fn jump_offset_mut(&mut self) -> Option<&mut JumpOffset> {
        match self {
            Op::Jmp { offset }
            | Op::JTrue { offset, .. }
            | Op::JFalse { offset, .. }
            | Op::JEqNull { offset, .. }
            | Op::JNEqNull { offset, .. }
            | Op::JLess { offset, .. }
            | Op::JLessEq { offset, .. }
            | Op::JNLess { offset, .. }
            | Op::JNLessEq { offset, .. }
            | Op::Loop { offset }
            | Op::LoopIfTrue { offset, .. }
            | Op::LoopIfLess { offset, .. }
            | Op::LoopIfLessEq { offset, .. }
            | Op::NextPName { offset, .. }
            | Op::Jsr { offset, .. }
            | Op::JmpScopes { offset, .. } => Some(offset),
            Op::GetPNames { break_offset, .. } => Some(break_offset),
            Op::SwitchImm { default_offset, .. }
            | Op::SwitchChar { default_offset, .. }
            | Op::SwitchString { default_offset, .. } => Some(default_offset),
            _ => None,
        }
    }

    /// Every register the instruction reads or writes. Call-like ops report
    /// the last argument slot as well as the first.
    pub fn registers(&self) -> Vec<Register> {
        match *self {
            Op::LoadConst { dst, .. }
            | Op::LoadInt { dst, .. }
            | Op::LoadUndefined { dst }
            | Op::LoadNull { dst }
            | Op::LoadBool { dst, .. }
            | Op::Resolve { dst, .. }
            | Op::ResolveSkip { dst, .. }
            | Op::ResolveGlobal { dst, .. }
            | Op::ResolveBase { dst, .. }
            | Op::GetScopedVar { dst, .. }
            | Op::GetGlobalVar { dst, .. }
            | Op::NewObject { dst }
            | Op::NewRegExp { dst, .. }
            | Op::NewFunction { dst, .. }
            | Op::NewFuncExp { dst, .. }
            | Op::CreateArguments { dst }
            | Op::Catch { dst } => vec![dst],
            Op::Mov { dst, src }
            | Op::Negate { dst, src }
            | Op::ToNumber { dst, src }
            | Op::BitNot { dst, src }
            | Op::EqNull { dst, src }
            | Op::NotEqNull { dst, src }
            | Op::Not { dst, src }
            | Op::TypeOf { dst, src }
            | Op::PostInc { dst, srcdst: src }
            | Op::PostDec { dst, srcdst: src }
            | Op::PushNewScope { dst, value: src, .. } => vec![dst, src],
            Op::PreInc { srcdst } | Op::PreDec { srcdst } => vec![srcdst],
            Op::Add { dst, left, right }
            | Op::Sub { dst, left, right }
            | Op::Mul { dst, left, right }
            | Op::Div { dst, left, right }
            | Op::Mod { dst, left, right }
            | Op::BitAnd { dst, left, right }
            | Op::BitOr { dst, left, right }
            | Op::BitXor { dst, left, right }
            | Op::LShift { dst, left, right }
            | Op::RShift { dst, left, right }
            | Op::URShift { dst, left, right }
            | Op::Eq { dst, left, right }
            | Op::NotEq { dst, left, right }
            | Op::StrictEq { dst, left, right }
            | Op::StrictNotEq { dst, left, right }
            | Op::Less { dst, left, right }
            | Op::LessEq { dst, left, right }
            | Op::InstanceOf {
                dst,
                value: left,
                constructor: right,
            }
            | Op::In {
                dst,
                property: left,
                object: right,
            }
            | Op::GetByVal {
                dst,
                base: left,
                property: right,
            }
            | Op::DelByVal {
                dst,
                base: left,
                property: right,
            } => vec![dst, left, right],
            Op::Jmp { .. }
            | Op::Loop { .. }
            | Op::PopScope
            | Op::JmpScopes { .. }
            | Op::Debug { .. } => Vec::new(),
            Op::JTrue { cond, .. } | Op::JFalse { cond, .. } | Op::LoopIfTrue { cond, .. } => {
                vec![cond]
            }
            Op::JEqNull { src, .. }
            | Op::JNEqNull { src, .. }
            | Op::Ret { src }
            | Op::End { src }
            | Op::Throw { src }
            | Op::PushScope { src }
            | Op::ConvertThis { this: src }
            | Op::PutScopedVar { value: src, .. }
            | Op::PutGlobalVar { value: src, .. }
            | Op::SwitchImm { scrutinee: src, .. }
            | Op::SwitchChar { scrutinee: src, .. }
            | Op::SwitchString { scrutinee: src, .. }
            | Op::Jsr { ret_reg: src, .. }
            | Op::Sret { ret_reg: src } => vec![src],
            Op::JLess { left, right, .. }
            | Op::JLessEq { left, right, .. }
            | Op::JNLess { left, right, .. }
            | Op::JNLessEq { left, right, .. }
            | Op::LoopIfLess { left, right, .. }
            | Op::LoopIfLessEq { left, right, .. }
            | Op::PutById {
                base: left,
                value: right,
                ..
            }
            | Op::PutByIndex {
                base: left,
                value: right,
                ..
            }
            | Op::GetById {
                dst: left,
                base: right,
                ..
            }
            | Op::DelById {
                dst: left,
                base: right,
                ..
            }
            | Op::GetPNames {
                dst: left,
                base: right,
                ..
            }
            | Op::NextPName {
                dst: left,
                iter: right,
                ..
            }
            | Op::ResolveWithBase {
                base_dst: left,
                func_dst: right,
                ..
            } => vec![left, right],
            Op::PutByVal {
                base,
                property,
                value,
            } => vec![base, property, value],
            Op::NewArray { dst, first, count } => {
                if count == 0 {
                    vec![dst]
                } else {
                    vec![dst, first, first + count as i32 - 1]
                }
            }
            Op::Call {
                dst,
                func,
                first_arg,
                argc,
            }
            | Op::CallEval {
                dst,
                func,
                first_arg,
                argc,
            }
            | Op::Construct {
                dst,
                func,
                first_arg,
                argc,
            } => vec![dst, func, first_arg, first_arg + argc as i32 - 1],
            Op::DeclareVar { init, .. } => init.into_iter().collect(),
        }
    }
}

/// Kind of code a block was compiled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    Global,
    Function,
    Eval,
}

/// Constants that can be stored in the pool
#[derive(Debug, Clone)]
pub enum Constant {
    /// String or identifier (interned)
    String(JsString),
    Number(f64),
    /// Nested function template
    Function(Rc<CodeBlock>),
    RegExp { pattern: JsString, flags: JsString },
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::String(a), Constant::String(b)) => a == b,
            (Constant::Number(a), Constant::Number(b)) => a.to_bits() == b.to_bits(),
            (Constant::Function(a), Constant::Function(b)) => {
                a.instructions == b.instructions && a.constants == b.constants
            }
            (
                Constant::RegExp { pattern, flags },
                Constant::RegExp {
                    pattern: p2,
                    flags: f2,
                },
            ) => pattern == p2 && flags == f2,
            _ => false,
        }
    }
}

/// Source map entry: position of the expression an instruction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub instruction: u32,
    pub span: Span,
}

/// Exception handler covering `start..end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerInfo {
    pub start: u32,
    pub end: u32,
    pub target: u32,
    /// Dynamic scopes pushed by this code block when the try was entered
    pub scope_depth: u32,
}

/// Dense jump table for int32 and single-character switches. An offset of 0
/// means "no case", i.e. jump to the default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleJumpTable {
    pub min: i32,
    pub offsets: Vec<JumpOffset>,
}

impl SimpleJumpTable {
    pub fn offset_for(&self, key: i32) -> Option<JumpOffset> {
        let slot = key.checked_sub(self.min)?;
        let slot = usize::try_from(slot).ok()?;
        self.offsets.get(slot).copied().filter(|offset| *offset != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringJumpTable {
    pub offsets: FxHashMap<JsString, JumpOffset>,
}

impl StringJumpTable {
    pub fn offset_for(&self, key: &JsString) -> Option<JumpOffset> {
        self.offsets.get(key).copied()
    }
}

/// A binding in a code block's activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub register: Register,
    pub read_only: bool,
}

/// Cached result of a global name lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCacheEntry {
    /// Slot-backed global, valid forever
    Slot(u32),
    /// Plain property at this index of the global object's property map,
    /// valid while the global shape version matches
    Property { version: u64, index: usize },
}

/// Origin of a piece of source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCode {
    pub id: u32,
    pub url: Option<JsString>,
    pub text: Rc<str>,
}

impl SourceCode {
    /// Text covered by `span`
    pub fn slice(&self, span: Span) -> &str {
        self.text.get(span.start..span.end).unwrap_or("")
    }
}

/// Compiled program, eval body or function
#[derive(Debug)]
pub struct CodeBlock {
    pub code_type: CodeType,
    pub name: Option<JsString>,
    pub instructions: Vec<Op>,
    pub constants: Vec<Constant>,
    pub source_map: Vec<SourceMapEntry>,
    pub handlers: Vec<HandlerInfo>,
    pub immediate_switch_tables: Vec<SimpleJumpTable>,
    pub character_switch_tables: Vec<SimpleJumpTable>,
    pub string_switch_tables: Vec<StringJumpTable>,
    /// Parameter slots including `this`
    pub num_parameters: u32,
    pub num_vars: u32,
    pub num_temporaries: u32,
    /// Registers the frame needs above the header: locals and temporaries
    pub num_callee_registers: u32,
    /// Parameters and declared locals by name, in declaration order
    pub symbols: IndexMap<JsString, SymbolEntry>,
    pub needs_full_scope_chain: bool,
    pub uses_eval: bool,
    pub uses_arguments: bool,
    /// Function expression whose name is bound in its own scope
    pub has_name_scope: bool,
    pub source: Rc<SourceCode>,
    /// Range of the function (or program) in the source text
    pub span: Span,
    pub global_cache: Vec<Cell<Option<GlobalCacheEntry>>>,
}

impl CodeBlock {
    /// Get the instruction at the given offset
    #[inline]
    pub fn get(&self, offset: usize) -> Option<&Op> {
        self.instructions.get(offset)
    }

    /// Get the source span for an instruction index
    pub fn span_at(&self, instruction: usize) -> Option<Span> {
        let idx = self
            .source_map
            .binary_search_by_key(&(instruction as u32), |e| e.instruction);

        match idx {
            Ok(i) => self.source_map.get(i).map(|e| e.span),
            Err(i) if i > 0 => self.source_map.get(i - 1).map(|e| e.span),
            _ => None,
        }
    }

    /// Innermost handler covering the instruction at `instruction`
    pub fn handler_for(&self, instruction: usize) -> Option<&HandlerInfo> {
        let instruction = instruction as u32;
        self.handlers
            .iter()
            .find(|h| h.start <= instruction && instruction < h.end)
    }

    pub fn get_constant(&self, idx: ConstantIndex) -> Option<&Constant> {
        self.constants.get(idx as usize)
    }

    pub fn this_register(&self) -> Register {
        this_register(self.num_parameters)
    }

    /// Index of `name` in the symbol table
    pub fn symbol_index(&self, name: &str) -> Option<usize> {
        self.symbols.get_index_of(name)
    }

    /// Source text of the function, used by `Function.prototype.toString`
    pub fn source_text(&self) -> &str {
        self.source.slice(self.span)
    }

    /// Human-readable listing of the instruction stream
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let name = self.name.as_ref().map(|n| n.as_str()).unwrap_or("<anonymous>");
        out.push_str(&format!(
            "{:?} {} params={} vars={} temps={}\n",
            self.code_type, name, self.num_parameters, self.num_vars, self.num_temporaries
        ));
        for (i, op) in self.instructions.iter().enumerate() {
            out.push_str(&format!("{:4} {:?}\n", i, op));
        }
        for handler in &self.handlers {
            out.push_str(&format!(
                "handler [{}, {}) -> {} depth {}\n",
                handler.start, handler.end, handler.target, handler.scope_depth
            ));
        }
        out
    }
}
