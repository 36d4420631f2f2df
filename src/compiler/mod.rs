//! Bytecode compiler
//!
//! Lowers the AST of a program, function or eval body into a [`CodeBlock`].
//! Parameters and declared locals get fixed registers before the first
//! statement is generated; everything else lives in LIFO temporaries.
//! Nested functions are compiled eagerly and stored in the constant pool.

mod builder;
pub mod bytecode;
mod compile_expr;
mod compile_stmt;
pub mod scope;

pub use builder::{BytecodeBuilder, Label, RegisterAllocator};
pub use bytecode::{CodeBlock, CodeType, Constant, DebugHook, Op, Register, SourceCode};
pub use scope::{CompileScope, GlobalSymbol, GlobalSymbolTable, Resolution};

use std::cell::Cell;
use std::rc::Rc;

use crate::ast::{FunctionNode, Program, ScopeInfo};
use crate::error::JsError;
use crate::lexer::Span;
use crate::prelude::{FxHashSet, IndexMap, index_map_new};
use crate::value::{CheapClone, JsString};
use bytecode::{SymbolEntry, parameter_register, this_register};
use scope::FunctionScope;

/// Knobs that change the generated code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit `Debug` instructions at entry/exit and before each statement
    pub debug_hooks: bool,
}

/// Non-local control flow the code generator has to unwind through
#[derive(Debug, Clone, Copy)]
enum ControlContext {
    /// Inside a try (or catch) block with a finally subroutine
    Finally {
        ret_reg: Register,
        value_reg: Register,
        finally_label: Label,
    },
    /// A dynamic scope pushed on the runtime chain
    Scope,
}

/// A break/continue target
#[derive(Debug, Clone)]
struct JumpContext {
    labels: Vec<JsString>,
    break_label: Label,
    /// `None` for switches and labeled blocks
    continue_label: Option<Label>,
    /// Unlabeled `break` may target it (loops and switches)
    is_breakable: bool,
    /// `control.len()` when the target was created
    control_depth: usize,
}

/// Compiler state for one code block
pub struct Compiler<'a> {
    builder: BytecodeBuilder,
    code_type: CodeType,
    globals: &'a GlobalSymbolTable,
    options: CompileOptions,
    source: Rc<SourceCode>,

    /// Static model of the runtime scope chain, innermost last
    scopes: Vec<CompileScope>,
    num_parameters: u32,
    num_vars: u32,
    /// Dynamic scopes this code block has pushed on the chain so far
    scope_depth: u32,

    control: Vec<ControlContext>,
    jump_targets: Vec<JumpContext>,
    /// Labels waiting for the next loop or switch
    pending_labels: Vec<JsString>,

    /// Completion value register of program and eval code
    completion: Option<Register>,
}

impl<'a> Compiler<'a> {
    fn new(
        code_type: CodeType,
        num_vars: u32,
        globals: &'a GlobalSymbolTable,
        options: CompileOptions,
        source: Rc<SourceCode>,
        scopes: Vec<CompileScope>,
    ) -> Self {
        Self {
            builder: BytecodeBuilder::new(num_vars),
            code_type,
            globals,
            options,
            source,
            scopes,
            num_parameters: 1,
            num_vars,
            scope_depth: 0,
            control: Vec::new(),
            jump_targets: Vec::new(),
            pending_labels: Vec::new(),
            completion: None,
        }
    }

    /// Compile global code.
    ///
    /// Declared vars and functions are added to `globals` first, except for
    /// names the global object already has as a plain property: those stay
    /// on the named path so the existing property is never clobbered.
    pub fn compile_program(
        program: &Program,
        globals: &mut GlobalSymbolTable,
        has_global_property: &dyn Fn(&str) -> bool,
        options: CompileOptions,
        source: Rc<SourceCode>,
    ) -> Result<Rc<CodeBlock>, JsError> {
        let mut named: Vec<(JsString, bool)> = Vec::new();
        for decl in &program.scope.var_declarations {
            if globals.get(decl.name.as_str()).is_none() && has_global_property(decl.name.as_str())
            {
                named.push((decl.name.cheap_clone(), decl.is_const));
            } else {
                globals.declare(&decl.name, decl.is_const);
            }
        }

        let globals: &GlobalSymbolTable = globals;
        let mut compiler = Compiler::new(
            CodeType::Global,
            1,
            globals,
            options,
            source,
            vec![CompileScope::Global],
        );
        compiler.completion = Some(0);
        compiler.builder.reserve_constants(program.scope.needed_constants);
        compiler.builder.set_span(program.span);
        compiler.emit_debug_hook(DebugHook::WillExecuteProgram, program.span);

        for (name, read_only) in &named {
            let name = compiler.builder.add_string(name);
            compiler.builder.emit(Op::DeclareVar {
                name,
                init: None,
                read_only: *read_only,
            });
        }
        compiler.emit_function_declarations(&program.scope)?;
        compiler.compile_statements(&program.body)?;

        compiler.builder.set_span(program.span);
        compiler.emit_debug_hook(DebugHook::DidExecuteProgram, program.span);
        compiler.builder.emit(Op::End { src: 0 });

        let block = compiler.finish(None, program.span, &program.scope, index_map_new(), false)?;
        tracing::debug!(
            instructions = block.instructions.len(),
            constants = block.constants.len(),
            global_slots = globals.len(),
            "compiled program"
        );
        Ok(block)
    }

    /// Compile eval code. Every identifier resolves dynamically and
    /// declarations are made at runtime on the variable object.
    pub fn compile_eval(
        program: &Program,
        globals: &GlobalSymbolTable,
        options: CompileOptions,
        source: Rc<SourceCode>,
    ) -> Result<Rc<CodeBlock>, JsError> {
        let mut compiler = Compiler::new(
            CodeType::Eval,
            1,
            globals,
            options,
            source,
            vec![CompileScope::Unknown],
        );
        compiler.completion = Some(0);
        compiler.builder.reserve_constants(program.scope.needed_constants);
        compiler.builder.set_span(program.span);

        let functions: FxHashSet<&str> = program
            .scope
            .function_declarations
            .iter()
            .filter_map(|f| f.name.as_ref().map(|n| n.name.as_str()))
            .collect();
        for decl in &program.scope.var_declarations {
            if functions.contains(decl.name.as_str()) {
                continue;
            }
            let name = compiler.builder.add_string(&decl.name);
            compiler.builder.emit(Op::DeclareVar {
                name,
                init: None,
                read_only: decl.is_const,
            });
        }
        compiler.emit_function_declarations(&program.scope)?;
        compiler.compile_statements(&program.body)?;
        compiler.builder.emit(Op::End { src: 0 });

        let block = compiler.finish(None, program.span, &program.scope, index_map_new(), false)?;
        tracing::debug!(
            instructions = block.instructions.len(),
            "compiled eval code"
        );
        Ok(block)
    }

    /// Compile a function body. `enclosing` is the static scope model the
    /// function is created in, including its name scope if it has one.
    pub fn compile_function(
        function: &FunctionNode,
        enclosing: &[CompileScope],
        globals: &GlobalSymbolTable,
        options: CompileOptions,
        source: Rc<SourceCode>,
    ) -> Result<Rc<CodeBlock>, JsError> {
        let features = function.scope.features;
        let num_parameters = function.params.len() as u32 + 1;

        let mut symbols: IndexMap<JsString, SymbolEntry> = index_map_new();
        for (k, param) in function.params.iter().enumerate() {
            // a repeated parameter name binds the last occurrence
            symbols.insert(
                param.name.cheap_clone(),
                SymbolEntry {
                    register: parameter_register(num_parameters, k as u32 + 1),
                    read_only: false,
                },
            );
        }

        let mut num_vars: u32 = 0;
        let needs_arguments = features.uses_arguments || features.uses_eval;
        if needs_arguments && !symbols.contains_key("arguments") {
            symbols.insert(
                JsString::from("arguments"),
                SymbolEntry {
                    register: 0,
                    read_only: false,
                },
            );
            num_vars += 1;
        }
        for decl in &function.scope.var_declarations {
            if symbols.contains_key(decl.name.as_str()) {
                continue;
            }
            symbols.insert(
                decl.name.cheap_clone(),
                SymbolEntry {
                    register: num_vars as Register,
                    read_only: decl.is_const,
                },
            );
            num_vars += 1;
        }

        let has_activation = features.needs_full_scope_chain();
        let symbols = Rc::new(symbols);
        let mut scopes = enclosing.to_vec();
        scopes.push(CompileScope::Function(FunctionScope {
            symbols: Rc::clone(&symbols),
            has_activation,
            uses_eval: features.uses_eval,
        }));

        let mut compiler = Compiler::new(
            CodeType::Function,
            num_vars,
            globals,
            options,
            source,
            scopes,
        );
        compiler.num_parameters = num_parameters;
        compiler.builder.reserve_constants(function.scope.needed_constants);
        compiler.builder.set_span(function.span);
        compiler.emit_debug_hook(DebugHook::DidEnterCallFrame, function.span);

        if features.uses_this || features.uses_eval {
            compiler.builder.emit(Op::ConvertThis {
                this: this_register(num_parameters),
            });
        }
        if let Some(entry) = symbols.get("arguments").filter(|_| needs_arguments) {
            // a parameter named `arguments` shadows the object
            if entry.register >= 0 {
                compiler.builder.emit(Op::CreateArguments {
                    dst: entry.register,
                });
            }
        }
        compiler.emit_function_declarations(&function.scope)?;
        compiler.compile_statements(&function.body)?;

        // implicit `return undefined`
        let end_span = Span::new(function.span.end, function.span.end, function.span.line, 0);
        compiler.builder.set_span(end_span);
        compiler.emit_debug_hook(DebugHook::WillLeaveCallFrame, end_span);
        let result = compiler.builder.alloc_register();
        compiler.builder.emit(Op::LoadUndefined { dst: result });
        compiler.builder.emit(Op::Ret { src: result });
        compiler.builder.free_register(result);

        let name = function.name.as_ref().map(|n| n.name.cheap_clone());
        let symbols = (*symbols).clone();
        let has_name_scope = function.is_expression && function.name.is_some();
        compiler.finish(name, function.span, &function.scope, symbols, has_name_scope)
    }

    fn finish(
        self,
        name: Option<JsString>,
        span: Span,
        scope: &ScopeInfo,
        symbols: IndexMap<JsString, SymbolEntry>,
        has_name_scope: bool,
    ) -> Result<Rc<CodeBlock>, JsError> {
        let num_vars = self.num_vars;
        let code_type = self.code_type;
        let num_parameters = self.num_parameters;
        let source = self.source;
        let output = self.builder.finish()?;
        let features = scope.features;

        Ok(Rc::new(CodeBlock {
            code_type,
            name,
            instructions: output.instructions,
            constants: output.constants,
            source_map: output.source_map,
            handlers: output.handlers,
            immediate_switch_tables: output.immediate_switch_tables,
            character_switch_tables: output.character_switch_tables,
            string_switch_tables: output.string_switch_tables,
            num_parameters,
            num_vars,
            num_temporaries: output.num_temporaries,
            num_callee_registers: num_vars + output.num_temporaries,
            symbols,
            needs_full_scope_chain: code_type == CodeType::Function
                && features.needs_full_scope_chain(),
            uses_eval: features.uses_eval,
            uses_arguments: features.uses_arguments || features.uses_eval,
            has_name_scope,
            source,
            span,
            global_cache: (0..output.num_global_caches)
                .map(|_| Cell::new(None))
                .collect(),
        }))
    }

    fn this_register(&self) -> Register {
        this_register(self.num_parameters)
    }

    /// Resolve an identifier from the current position
    fn resolve(&self, name: &str) -> Resolution {
        if self.code_type == CodeType::Eval {
            return Resolution::Dynamic { skip: 0 };
        }
        scope::resolve(&self.scopes, self.globals, name)
    }

    fn emit_debug_hook(&mut self, hook: DebugHook, span: Span) {
        if self.options.debug_hooks {
            self.builder.emit(Op::Debug {
                hook,
                line: span.line,
            });
        }
    }

    /// Instantiate hoisted function declarations
    fn emit_function_declarations(&mut self, scope: &ScopeInfo) -> Result<(), JsError> {
        for function in &scope.function_declarations {
            let Some(name) = function.name.as_ref().map(|n| n.name.cheap_clone()) else {
                continue;
            };
            let code = Compiler::compile_function(
                function,
                &self.scopes,
                self.globals,
                self.options,
                Rc::clone(&self.source),
            )?;
            let func = self.builder.add_function(code);
            self.builder.set_span(function.span);

            match self.code_type {
                CodeType::Eval => {
                    let tmp = self.builder.alloc_register();
                    self.builder.emit(Op::NewFunction { dst: tmp, func });
                    let name = self.builder.add_string(&name);
                    self.builder.emit(Op::DeclareVar {
                        name,
                        init: Some(tmp),
                        read_only: false,
                    });
                    self.builder.free_register(tmp);
                }
                CodeType::Global | CodeType::Function => {
                    let tmp = self.builder.alloc_register();
                    self.builder.emit(Op::NewFunction { dst: tmp, func });
                    self.emit_declaration_store(&name, tmp)?;
                    self.builder.free_register(tmp);
                }
            }
        }
        Ok(())
    }

    /// Store into a declared binding, ignoring its read-only flag. Used for
    /// hoisted functions and `const` initializers.
    fn emit_declaration_store(&mut self, name: &JsString, value: Register) -> Result<(), JsError> {
        if self.code_type == CodeType::Eval {
            let name = self.builder.add_string(name);
            self.builder.emit(Op::DeclareVar {
                name,
                init: Some(value),
                read_only: false,
            });
            return Ok(());
        }
        match self.resolve(name.as_str()) {
            Resolution::Local { register, .. } => {
                if register != value {
                    self.builder.emit(Op::Mov {
                        dst: register,
                        src: value,
                    });
                }
            }
            Resolution::GlobalSlot { index, .. } => {
                self.builder.emit(Op::PutGlobalVar { index, value });
            }
            Resolution::Scoped { depth, index, .. } => {
                self.builder.emit(Op::PutScopedVar {
                    depth,
                    index,
                    value,
                });
            }
            Resolution::GlobalNamed | Resolution::Dynamic { .. } => {
                let name = self.builder.add_string(name);
                self.builder.emit(Op::DeclareVar {
                    name,
                    init: Some(value),
                    read_only: false,
                });
            }
        }
        Ok(())
    }

    // ============ CONTROL CONTEXTS ============

    fn push_scope_context(&mut self, scope: CompileScope) {
        self.control.push(ControlContext::Scope);
        self.scopes.push(scope);
        self.scope_depth += 1;
    }

    fn pop_scope_context(&mut self) {
        self.control.pop();
        self.scopes.pop();
        self.scope_depth = self.scope_depth.saturating_sub(1);
        self.builder.emit(Op::PopScope);
    }

    /// Emit the scope pops and finally calls needed to leave every control
    /// context above `depth`, innermost first. Returns the scope pops that
    /// are still pending after the last finally call.
    fn emit_unwind_to(&mut self, depth: usize) -> Result<u32, JsError> {
        let mut pending_pops = 0u32;
        let contexts: Vec<ControlContext> = self.control.get(depth..).unwrap_or(&[]).to_vec();
        for context in contexts.iter().rev() {
            match *context {
                ControlContext::Scope => pending_pops += 1,
                ControlContext::Finally {
                    ret_reg,
                    finally_label,
                    ..
                } => {
                    for _ in 0..pending_pops {
                        self.builder.emit(Op::PopScope);
                    }
                    pending_pops = 0;
                    self.builder
                        .emit_with_label(Op::Jsr { ret_reg, offset: 0 }, finally_label)?;
                }
            }
        }
        Ok(pending_pops)
    }

    /// Jump to `label`, leaving every control context above `depth`
    fn emit_jump_out(&mut self, depth: usize, label: Label) -> Result<(), JsError> {
        let pops = self.emit_unwind_to(depth)?;
        if pops > 0 {
            self.builder.emit_with_label(
                Op::JmpScopes {
                    count: pops,
                    offset: 0,
                },
                label,
            )?;
            Ok(())
        } else {
            self.builder.emit_jump(label)
        }
    }

    /// Register that survives every finally body between here and the
    /// function exit, for holding a return value
    fn return_value_register(&self) -> Option<Register> {
        self.control.iter().find_map(|context| match context {
            ControlContext::Finally { value_reg, .. } => Some(*value_reg),
            ControlContext::Scope => None,
        })
    }

    fn push_jump_target(
        &mut self,
        break_label: Label,
        continue_label: Option<Label>,
        is_breakable: bool,
    ) {
        let labels = std::mem::take(&mut self.pending_labels);
        self.jump_targets.push(JumpContext {
            labels,
            break_label,
            continue_label,
            is_breakable,
            control_depth: self.control.len(),
        });
    }

    fn pop_jump_target(&mut self) {
        self.jump_targets.pop();
    }
}
