//! BytecodeBuilder - helper for emitting bytecode instructions
//!
//! Owns the instruction stream while a code block is being generated:
//! temporary register allocation, labels with jump patching, constant
//! deduplication and the compare+branch peephole.

use std::rc::Rc;

use super::bytecode::{
    CodeBlock, Constant, ConstantIndex, HandlerInfo, JumpOffset, Op, Register, SimpleJumpTable,
    SourceMapEntry, StringJumpTable,
};
use crate::error::JsError;
use crate::lexer::Span;
use crate::prelude::FxHashMap;
use crate::value::{CheapClone, JsString};

/// Temporary register allocator.
///
/// Temporaries live above the declared locals and are handed out in strict
/// LIFO order. Every slot carries a generation that is bumped on release, so
/// the builder can tell whether a register seen earlier has been released
/// since.
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    /// First temporary register (number of declared locals)
    base: Register,
    /// Number of temporaries currently allocated
    live: usize,
    /// High-water mark
    max_used: usize,
    generations: Vec<u32>,
}

impl RegisterAllocator {
    pub fn new(base: Register) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Allocate a temporary on top of the stack
    pub fn alloc(&mut self) -> Register {
        let slot = self.live;
        self.live += 1;
        if self.generations.len() < self.live {
            self.generations.push(0);
        }
        self.max_used = self.max_used.max(self.live);
        self.base + slot as Register
    }

    /// Allocate `count` consecutive temporaries, returning the first
    pub fn alloc_range(&mut self, count: usize) -> Register {
        let first = self.base + self.live as Register;
        for _ in 0..count {
            self.alloc();
        }
        first
    }

    /// Release `reg` and every temporary allocated after it. Locals and
    /// parameters are ignored.
    pub fn release(&mut self, reg: Register) {
        if !self.is_temporary(reg) {
            return;
        }
        let slot = (reg - self.base) as usize;
        while self.live > slot {
            self.live -= 1;
            if let Some(generation) = self.generations.get_mut(self.live) {
                *generation = generation.wrapping_add(1);
            }
        }
    }

    /// Current stack position, for [`RegisterAllocator::release_to`]
    pub fn mark(&self) -> usize {
        self.live
    }

    pub fn release_to(&mut self, mark: usize) {
        if mark < self.live {
            self.release(self.base + mark as Register);
        }
    }

    pub fn is_temporary(&self, reg: Register) -> bool {
        reg >= self.base
    }

    /// Whether `reg` is a temporary that is currently handed out
    pub fn is_allocated(&self, reg: Register) -> bool {
        self.is_temporary(reg) && ((reg - self.base) as usize) < self.live
    }

    /// Stack position of an allocated temporary
    pub fn position(&self, reg: Register) -> Option<usize> {
        self.is_allocated(reg).then(|| (reg - self.base) as usize)
    }

    pub fn generation(&self, reg: Register) -> Option<u32> {
        if !self.is_temporary(reg) {
            return None;
        }
        self.generations.get((reg - self.base) as usize).copied()
    }

    pub fn max_used(&self) -> usize {
        self.max_used
    }
}

/// Jump target handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug, Default)]
struct LabelState {
    position: Option<u32>,
    /// Instructions waiting for this label to be placed
    pending: Vec<u32>,
}

/// The register most recently written by a fusable comparison
#[derive(Debug, Clone, Copy)]
struct LastWrite {
    instruction: usize,
    dst: Register,
    generation: u32,
}

/// Everything the builder produced, ready to go into a [`CodeBlock`]
pub struct BuilderOutput {
    pub instructions: Vec<Op>,
    pub constants: Vec<Constant>,
    pub source_map: Vec<SourceMapEntry>,
    pub handlers: Vec<HandlerInfo>,
    pub immediate_switch_tables: Vec<SimpleJumpTable>,
    pub character_switch_tables: Vec<SimpleJumpTable>,
    pub string_switch_tables: Vec<StringJumpTable>,
    pub num_temporaries: u32,
    pub num_global_caches: u32,
}

/// Builder for constructing code blocks
pub struct BytecodeBuilder {
    code: Vec<Op>,
    constants: Vec<Constant>,

    /// Constant deduplication maps
    string_map: FxHashMap<JsString, ConstantIndex>,
    number_map: FxHashMap<u64, ConstantIndex>,
    regexp_map: FxHashMap<(JsString, JsString), ConstantIndex>,

    source_map: Vec<SourceMapEntry>,
    current_span: Option<Span>,

    registers: RegisterAllocator,

    labels: Vec<LabelState>,
    free_labels: Vec<u32>,

    handlers: Vec<HandlerInfo>,
    immediate_switch_tables: Vec<SimpleJumpTable>,
    character_switch_tables: Vec<SimpleJumpTable>,
    string_switch_tables: Vec<StringJumpTable>,
    global_caches: u32,

    last_write: Option<LastWrite>,
}

impl BytecodeBuilder {
    pub fn new(num_vars: u32) -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            string_map: FxHashMap::default(),
            number_map: FxHashMap::default(),
            regexp_map: FxHashMap::default(),
            source_map: Vec::new(),
            current_span: None,
            registers: RegisterAllocator::new(num_vars as Register),
            labels: Vec::new(),
            free_labels: Vec::new(),
            handlers: Vec::new(),
            immediate_switch_tables: Vec::new(),
            character_switch_tables: Vec::new(),
            string_switch_tables: Vec::new(),
            global_caches: 0,
            last_write: None,
        }
    }

    pub fn registers(&mut self) -> &mut RegisterAllocator {
        &mut self.registers
    }

    pub fn alloc_register(&mut self) -> Register {
        self.registers.alloc()
    }

    pub fn free_register(&mut self, reg: Register) {
        self.registers.release(reg);
    }

    /// Set the current source span for the source map
    pub fn set_span(&mut self, span: Span) {
        self.current_span = Some(span);
    }

    pub fn current_span(&self) -> Option<Span> {
        self.current_span
    }

    /// Get the current instruction offset
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit an instruction and return its index
    pub fn emit(&mut self, op: Op) -> usize {
        let index = self.code.len();

        if let Some(span) = self.current_span {
            let should_add = self
                .source_map
                .last()
                .is_none_or(|e| e.span != span);
            if should_add {
                self.source_map.push(SourceMapEntry {
                    instruction: index as u32,
                    span,
                });
            }
        }

        self.last_write = match op {
            Op::Less { dst, .. }
            | Op::LessEq { dst, .. }
            | Op::Not { dst, .. }
            | Op::EqNull { dst, .. }
            | Op::NotEqNull { dst, .. } => {
                self.registers.generation(dst).map(|generation| LastWrite {
                    instruction: index,
                    dst,
                    generation,
                })
            }
            _ => None,
        };

        self.code.push(op);
        index
    }

    // ============ LABELS ============

    pub fn new_label(&mut self) -> Label {
        if let Some(id) = self.free_labels.pop() {
            if let Some(state) = self.labels.get_mut(id as usize) {
                *state = LabelState::default();
            }
            return Label(id);
        }
        self.labels.push(LabelState::default());
        Label(self.labels.len() as u32 - 1)
    }

    /// Place `label` at the current offset and patch every pending jump
    pub fn place_label(&mut self, label: Label) -> Result<(), JsError> {
        let position = self.code.len() as u32;
        let pending = match self.labels.get_mut(label.0 as usize) {
            Some(state) => {
                state.position = Some(position);
                std::mem::take(&mut state.pending)
            }
            None => return Err(unknown_label(label)),
        };
        for instruction in pending {
            self.patch(instruction as usize, position)?;
        }
        // a jump target splits the instruction stream
        self.last_write = None;
        Ok(())
    }

    pub fn label_position(&self, label: Label) -> Option<u32> {
        self.labels.get(label.0 as usize).and_then(|s| s.position)
    }

    /// Return a placed label's id for reuse
    pub fn free_label(&mut self, label: Label) -> Result<(), JsError> {
        match self.labels.get(label.0 as usize) {
            Some(state) if state.pending.is_empty() => {
                self.free_labels.push(label.0);
                Ok(())
            }
            Some(_) => Err(JsError::internal_error(format!(
                "label {} freed with unresolved jumps",
                label.0
            ))),
            None => Err(unknown_label(label)),
        }
    }

    fn patch(&mut self, instruction: usize, target: u32) -> Result<(), JsError> {
        let offset = target as i64 - instruction as i64;
        match self
            .code
            .get_mut(instruction)
            .and_then(|op| op.jump_offset_mut())
        {
            Some(slot) => {
                *slot = offset as JumpOffset;
                Ok(())
            }
            None => Err(JsError::internal_error(format!(
                "instruction {} is not a jump",
                instruction
            ))),
        }
    }

    /// Emit a branch-like op whose offset targets `label`
    pub fn emit_with_label(&mut self, op: Op, label: Label) -> Result<usize, JsError> {
        let index = self.emit(op);
        match self.labels.get_mut(label.0 as usize) {
            Some(LabelState {
                position: Some(position),
                ..
            }) => {
                let position = *position;
                self.patch(index, position)?;
            }
            Some(state) => state.pending.push(index as u32),
            None => return Err(unknown_label(label)),
        }
        Ok(index)
    }

    fn is_backward(&self, label: Label) -> bool {
        self.label_position(label).is_some()
    }

    /// Unconditional jump; backward jumps become `Loop`
    pub fn emit_jump(&mut self, label: Label) -> Result<(), JsError> {
        let op = if self.is_backward(label) {
            Op::Loop { offset: 0 }
        } else {
            Op::Jmp { offset: 0 }
        };
        self.emit_with_label(op, label).map(|_| ())
    }

    /// The comparison that wrote `cond`, when it is the previous instruction
    /// and `cond` has been released since
    fn fusable_write(&self, cond: Register) -> Option<Op> {
        let last = self.last_write?;
        if last.dst != cond || last.instruction + 1 != self.code.len() {
            return None;
        }
        if self.registers.is_allocated(cond)
            || self.registers.generation(cond) == Some(last.generation)

        {
            return None;
        }
        self.code.get(last.instruction).copied()
    }

    fn replace_last(&mut self, op: Op, label: Label) -> Result<(), JsError> {
        self.code.pop();
        self.last_write = None;
        self.emit_with_label(op, label).map(|_| ())
    }

    pub fn emit_jump_if_true(&mut self, cond: Register, label: Label) -> Result<(), JsError> {
        let backward = self.is_backward(label);
        let fused = match self.fusable_write(cond) {
            Some(Op::Less { left, right, .. }) => Some(if backward {
                Op::LoopIfLess { left, right, offset: 0 }
            } else {
                Op::JLess { left, right, offset: 0 }
            }),
            Some(Op::LessEq { left, right, .. }) => Some(if backward {
                Op::LoopIfLessEq { left, right, offset: 0 }
            } else {
                Op::JLessEq { left, right, offset: 0 }
            }),
            Some(Op::Not { src, .. }) if !backward => Some(Op::JFalse { cond: src, offset: 0 }),
            Some(Op::EqNull { src, .. }) if !backward => Some(Op::JEqNull { src, offset: 0 }),
            Some(Op::NotEqNull { src, .. }) if !backward => Some(Op::JNEqNull { src, offset: 0 }),
            _ => None,
        };
        if let Some(op) = fused {
            return self.replace_last(op, label);
        }
        let op = if backward {
            Op::LoopIfTrue { cond, offset: 0 }
        } else {
            Op::JTrue { cond, offset: 0 }
        };
        self.emit_with_label(op, label).map(|_| ())
    }

    pub fn emit_jump_if_false(&mut self, cond: Register, label: Label) -> Result<(), JsError> {
        if self.is_backward(label) {
            // no ticking form of a backward false-branch: invert explicitly
            let inverted = self.alloc_register();
            self.emit(Op::Not {
                dst: inverted,
                src: cond,
            });
            self.free_register(inverted);
            return self.emit_jump_if_true(inverted, label);
        }
        let fused = match self.fusable_write(cond) {
            Some(Op::Less { left, right, .. }) => Some(Op::JNLess { left, right, offset: 0 }),
            Some(Op::LessEq { left, right, .. }) => Some(Op::JNLessEq { left, right, offset: 0 }),
            Some(Op::Not { src, .. }) => Some(Op::JTrue { cond: src, offset: 0 }),
            Some(Op::EqNull { src, .. }) => Some(Op::JNEqNull { src, offset: 0 }),
            Some(Op::NotEqNull { src, .. }) => Some(Op::JEqNull { src, offset: 0 }),
            _ => None,
        };
        if let Some(op) = fused {
            return self.replace_last(op, label);
        }
        self.emit_with_label(Op::JFalse { cond, offset: 0 }, label)
            .map(|_| ())
    }

    // ============ CONSTANTS ============

    /// Add a string constant to the pool (with deduplication)
    pub fn add_string(&mut self, s: &JsString) -> ConstantIndex {
        if let Some(&idx) = self.string_map.get(s) {
            return idx;
        }
        let idx = self.add_constant(Constant::String(s.cheap_clone()));
        self.string_map.insert(s.cheap_clone(), idx);
        idx
    }

    /// Add a number constant to the pool (deduplicated by bit pattern)
    pub fn add_number(&mut self, n: f64) -> ConstantIndex {
        let bits = n.to_bits();
        if let Some(&idx) = self.number_map.get(&bits) {
            return idx;
        }
        let idx = self.add_constant(Constant::Number(n));
        self.number_map.insert(bits, idx);
        idx
    }

    pub fn add_regexp(&mut self, pattern: &JsString, flags: &JsString) -> ConstantIndex {
        let key = (pattern.cheap_clone(), flags.cheap_clone());
        if let Some(&idx) = self.regexp_map.get(&key) {
            return idx;
        }
        let idx = self.add_constant(Constant::RegExp {
            pattern: pattern.cheap_clone(),
            flags: flags.cheap_clone(),
        });
        self.regexp_map.insert(key, idx);
        idx
    }

    pub fn add_function(&mut self, code: Rc<CodeBlock>) -> ConstantIndex {
        self.add_constant(Constant::Function(code))
    }

    fn add_constant(&mut self, constant: Constant) -> ConstantIndex {
        let idx = self.constants.len() as ConstantIndex;
        self.constants.push(constant);
        idx
    }

    pub fn reserve_constants(&mut self, additional: usize) {
        self.constants.reserve(additional);
    }

    /// Emit the cheapest load for a number
    pub fn emit_load_number(&mut self, dst: Register, n: f64) {
        let i = n as i32;
        if i as f64 == n && !(n == 0.0 && n.is_sign_negative()) {
            self.emit(Op::LoadInt { dst, value: i });
        } else {
            let idx = self.add_number(n);
            self.emit(Op::LoadConst { dst, idx });
        }
    }

    pub fn emit_load_string(&mut self, dst: Register, s: &JsString) {
        let idx = self.add_string(s);
        self.emit(Op::LoadConst { dst, idx });
    }

    /// Reserve a slot in the code block's global lookup cache
    pub fn add_global_cache(&mut self) -> u32 {
        self.global_caches += 1;
        self.global_caches - 1
    }

    // ============ TABLES ============

    pub fn add_handler(&mut self, start: usize, end: usize, target: usize, scope_depth: u32) {
        if start < end {
            self.handlers.push(HandlerInfo {
                start: start as u32,
                end: end as u32,
                target: target as u32,
                scope_depth,
            });
        }
    }

    pub fn add_immediate_switch_table(&mut self, table: SimpleJumpTable) -> u32 {
        self.immediate_switch_tables.push(table);
        self.immediate_switch_tables.len() as u32 - 1
    }

    pub fn add_character_switch_table(&mut self, table: SimpleJumpTable) -> u32 {
        self.character_switch_tables.push(table);
        self.character_switch_tables.len() as u32 - 1
    }

    pub fn add_string_switch_table(&mut self, table: StringJumpTable) -> u32 {
        self.string_switch_tables.push(table);
        self.string_switch_tables.len() as u32 - 1
    }

    pub fn immediate_switch_table_mut(&mut self, idx: u32) -> Option<&mut SimpleJumpTable> {
        self.immediate_switch_tables.get_mut(idx as usize)
    }

    pub fn character_switch_table_mut(&mut self, idx: u32) -> Option<&mut SimpleJumpTable> {
        self.character_switch_tables.get_mut(idx as usize)
    }

    pub fn string_switch_table_mut(&mut self, idx: u32) -> Option<&mut StringJumpTable> {
        self.string_switch_tables.get_mut(idx as usize)
    }

    /// Finish building
    pub fn finish(self) -> Result<BuilderOutput, JsError> {
        if let Some(id) = self
            .labels
            .iter()
            .position(|state| !state.pending.is_empty())
        {
            return Err(JsError::internal_error(format!(
                "label {} was never placed",
                id
            )));
        }
        Ok(BuilderOutput {
            instructions: self.code,
            constants: self.constants,
            source_map: self.source_map,
            handlers: self.handlers,
            immediate_switch_tables: self.immediate_switch_tables,
            character_switch_tables: self.character_switch_tables,
            string_switch_tables: self.string_switch_tables,
            num_temporaries: self.registers.max_used() as u32,
            num_global_caches: self.global_caches,
        })
    }
}

fn unknown_label(label: Label) -> JsError {
    JsError::internal_error(format!("unknown label {}", label.0))
}
