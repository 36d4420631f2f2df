//! Statement compilation

use super::bytecode::{DebugHook, Op, SimpleJumpTable, StringJumpTable};
use super::{CodeType, CompileScope, Compiler, ControlContext, Label};
use crate::ast::*;
use crate::error::JsError;
use crate::value::{CheapClone, JsString};

/// Dense tables are used when the case range is small and not too sparse
const MAX_SWITCH_TABLE_RANGE: i64 = 1000;

/// Shape of a switch whose case labels are all literals of one kind
enum SwitchKind {
    Immediate(Vec<i32>),
    Character(Vec<i32>),
    String(Vec<JsString>),
    Chain,
}

impl<'a> Compiler<'a> {
    pub(super) fn compile_statements(&mut self, statements: &[Statement]) -> Result<(), JsError> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub(super) fn compile_statement(&mut self, stmt: &Statement) -> Result<(), JsError> {
        let span = stmt.span();
        self.builder.set_span(span);
        if !matches!(
            stmt,
            Statement::FunctionDeclaration(_) | Statement::Empty(_) | Statement::Block(_)
        ) {
            self.emit_debug_hook(DebugHook::WillExecuteStatement, span);
        }

        match stmt {
            Statement::Var(var) => self.compile_var_statement(var),
            // hoisted to the prologue
            Statement::FunctionDeclaration(_) => Ok(()),
            Statement::Block(block) => self.compile_statements(&block.body),
            Statement::If(s) => self.compile_if(s),
            Statement::Switch(s) => self.compile_switch(s),
            Statement::For(s) => self.compile_for(s),
            Statement::ForIn(s) => self.compile_for_in(s),
            Statement::While(s) => self.compile_while(s),
            Statement::DoWhile(s) => self.compile_do_while(s),
            Statement::Try(s) => self.compile_try(s),
            Statement::With(s) => self.compile_with(s),
            Statement::Return(s) => self.compile_return(s),
            Statement::Break(s) => self.compile_break(s),
            Statement::Continue(s) => self.compile_continue(s),
            Statement::Throw(s) => {
                let mark = self.builder.registers().mark();
                let src = self.compile_expression(&s.argument, None)?;
                self.builder.set_span(s.span);
                self.builder.emit(Op::Throw { src });
                self.builder.registers().release_to(mark);
                Ok(())
            }
            Statement::Expression(s) => {
                match self.completion {
                    Some(completion) => {
                        let mark = self.builder.registers().mark();
                        self.compile_expression(&s.expression, Some(completion))?;
                        self.builder.registers().release_to(mark);
                    }
                    None => self.compile_discarded(&s.expression)?,
                }
                Ok(())
            }
            Statement::Labeled(s) => self.compile_labeled(s),
            Statement::Empty(_) => Ok(()),
            Statement::Debugger(span) => {
                self.builder.emit(Op::Debug {
                    hook: DebugHook::DidReachBreakpoint,
                    line: span.line,
                });
                Ok(())
            }
        }
    }

    fn compile_var_statement(&mut self, var: &VarStatement) -> Result<(), JsError> {
        for decl in &var.declarations {
            let Some(init) = &decl.init else { continue };
            self.builder.set_span(decl.span);
            let mark = self.builder.registers().mark();
            if var.is_const {
                let value = self.compile_expression(init, None)?;
                self.emit_declaration_store(&decl.id.name, value)?;
            } else {
                self.compile_identifier_assignment(&decl.id, init, None)?;
            }
            self.builder.registers().release_to(mark);
        }
        Ok(())
    }

    fn compile_if(&mut self, stmt: &IfStatement) -> Result<(), JsError> {
        let else_label = self.builder.new_label();
        self.compile_condition(&stmt.test, else_label, false)?;
        self.compile_statement(&stmt.consequent)?;

        match &stmt.alternate {
            Some(alternate) => {
                let end = self.builder.new_label();
                self.builder.emit_jump(end)?;
                self.builder.place_label(else_label)?;
                self.compile_statement(alternate)?;
                self.builder.place_label(end)?;
            }
            None => self.builder.place_label(else_label)?,
        }
        Ok(())
    }

    // ============ LOOPS ============

    fn compile_while(&mut self, stmt: &WhileStatement) -> Result<(), JsError> {
        let top = self.builder.new_label();
        let cont = self.builder.new_label();
        let end = self.builder.new_label();
        self.push_jump_target(end, Some(cont), true);

        self.builder.emit_jump(cont)?;
        self.builder.place_label(top)?;
        self.compile_statement(&stmt.body)?;
        self.builder.place_label(cont)?;
        self.builder.set_span(stmt.test.span());
        self.compile_condition(&stmt.test, top, true)?;
        self.builder.place_label(end)?;

        self.pop_jump_target();
        Ok(())
    }

    fn compile_do_while(&mut self, stmt: &DoWhileStatement) -> Result<(), JsError> {
        let top = self.builder.new_label();
        let cont = self.builder.new_label();
        let end = self.builder.new_label();
        self.push_jump_target(end, Some(cont), true);

        self.builder.place_label(top)?;
        self.compile_statement(&stmt.body)?;
        self.builder.place_label(cont)?;
        self.builder.set_span(stmt.test.span());
        self.compile_condition(&stmt.test, top, true)?;
        self.builder.place_label(end)?;

        self.pop_jump_target();
        Ok(())
    }

    fn compile_for(&mut self, stmt: &ForStatement) -> Result<(), JsError> {
        // labels belong to the loop, not to the init expression
        let labels = std::mem::take(&mut self.pending_labels);
        match &stmt.init {
            Some(ForInit::Var(var)) => self.compile_var_statement(var)?,
            Some(ForInit::Expression(expr)) => self.compile_discarded(expr)?,
            None => {}
        }
        self.pending_labels = labels;

        let top = self.builder.new_label();
        let cont = self.builder.new_label();
        let test = self.builder.new_label();
        let end = self.builder.new_label();
        self.push_jump_target(end, Some(cont), true);

        if stmt.test.is_some() {
            self.builder.emit_jump(test)?;
        }
        self.builder.place_label(top)?;
        self.compile_statement(&stmt.body)?;
        self.builder.place_label(cont)?;
        if let Some(update) = &stmt.update {
            self.builder.set_span(update.span());
            self.compile_discarded(update)?;
        }
        self.builder.place_label(test)?;
        match &stmt.test {
            Some(cond) => {
                self.builder.set_span(cond.span());
                self.compile_condition(cond, top, true)?;
            }
            None => self.builder.emit_jump(top)?,
        }
        self.builder.place_label(end)?;

        self.pop_jump_target();
        Ok(())
    }

    fn compile_for_in(&mut self, stmt: &ForInStatement) -> Result<(), JsError> {
        let labels = std::mem::take(&mut self.pending_labels);
        let mark = self.builder.registers().mark();

        if let ForInTarget::Var(VarDeclarator {
            id, init: Some(init), ..
        }) = &stmt.left
        {
            let init_mark = self.builder.registers().mark();
            self.compile_identifier_assignment(id, init, None)?;
            self.builder.registers().release_to(init_mark);
        }

        let base = self.builder.alloc_register();
        self.compile_expression(&stmt.right, Some(base))?;
        let iter = self.builder.alloc_register();
        let name = self.builder.alloc_register();

        let body = self.builder.new_label();
        let cont = self.builder.new_label();
        let end = self.builder.new_label();
        self.pending_labels = labels;
        self.push_jump_target(end, Some(cont), true);

        self.builder.set_span(stmt.span);
        self.builder.emit_with_label(
            Op::GetPNames {
                dst: iter,
                base,
                break_offset: 0,
            },
            end,
        )?;
        self.builder.emit_jump(cont)?;

        self.builder.place_label(body)?;
        match &stmt.left {
            ForInTarget::Var(decl) => self.emit_identifier_store(&decl.id, name)?,
            ForInTarget::Expression(target) => self.emit_assign_register(target, name)?,
        }
        self.compile_statement(&stmt.body)?;

        self.builder.place_label(cont)?;
        self.builder.set_span(stmt.span);
        self.builder.emit_with_label(
            Op::NextPName {
                dst: name,
                iter,
                offset: 0,
            },
            body,
        )?;
        self.builder.place_label(end)?;

        self.pop_jump_target();
        self.builder.registers().release_to(mark);
        Ok(())
    }

    // ============ SWITCH ============

    fn compile_switch(&mut self, stmt: &SwitchStatement) -> Result<(), JsError> {
        let labels = std::mem::take(&mut self.pending_labels);
        let mark = self.builder.registers().mark();
        let scrutinee = self.builder.alloc_register();
        self.compile_expression(&stmt.discriminant, Some(scrutinee))?;
        self.pending_labels = labels;

        let case_labels: Vec<Label> = stmt.cases.iter().map(|_| self.builder.new_label()).collect();
        let end = self.builder.new_label();
        let default_target = stmt
            .cases
            .iter()
            .zip(&case_labels)
            .find(|(case, _)| case.test.is_none())
            .map(|(_, label)| *label)
            .unwrap_or(end);

        self.builder.set_span(stmt.span);
        let table = match classify_switch(&stmt.cases) {
            SwitchKind::Immediate(keys) => {
                Some(self.emit_simple_switch(scrutinee, &keys, default_target, false)?)
            }
            SwitchKind::Character(keys) => {
                Some(self.emit_simple_switch(scrutinee, &keys, default_target, true)?)
            }
            SwitchKind::String(keys) => {
                let table = self.builder.add_string_switch_table(StringJumpTable::default());
                let index = self.builder.emit_with_label(
                    Op::SwitchString {
                        table,
                        default_offset: 0,
                        scrutinee,
                    },
                    default_target,
                )?;
                Some(PendingTable::String { table, index, keys })
            }
            SwitchKind::Chain => {
                self.emit_switch_chain(scrutinee, &stmt.cases, &case_labels, default_target)?;
                None
            }
        };

        self.push_jump_target(end, None, true);
        for (case, label) in stmt.cases.iter().zip(&case_labels) {
            self.builder.place_label(*label)?;
            self.compile_statements(&case.consequent)?;
        }
        self.builder.place_label(end)?;
        self.pop_jump_target();

        if let Some(table) = table {
            self.fill_switch_table(table, &stmt.cases, &case_labels)?;
        }
        self.builder.registers().release_to(mark);
        Ok(())
    }

    fn emit_simple_switch(
        &mut self,
        scrutinee: super::Register,
        keys: &[i32],
        default_target: Label,
        character: bool,
    ) -> Result<PendingTable, JsError> {
        let min = keys.iter().copied().min().unwrap_or(0);
        let max = keys.iter().copied().max().unwrap_or(0);
        let range = (i64::from(max) - i64::from(min) + 1) as usize;
        let table = SimpleJumpTable {
            min,
            offsets: vec![0; range],
        };
        let (table, op) = if character {
            let table = self.builder.add_character_switch_table(table);
            (
                table,
                Op::SwitchChar {
                    table,
                    default_offset: 0,
                    scrutinee,
                },
            )
        } else {
            let table = self.builder.add_immediate_switch_table(table);
            (
                table,
                Op::SwitchImm {
                    table,
                    default_offset: 0,
                    scrutinee,
                },
            )
        };
        let index = self.builder.emit_with_label(op, default_target)?;
        Ok(PendingTable::Simple {
            table,
            index,
            min,
            keys: keys.to_vec(),
            character,
        })
    }

    fn emit_switch_chain(
        &mut self,
        scrutinee: super::Register,
        cases: &[SwitchCase],
        case_labels: &[Label],
        default_target: Label,
    ) -> Result<(), JsError> {
        for (case, label) in cases.iter().zip(case_labels) {
            let Some(test) = &case.test else { continue };
            self.builder.set_span(test.span());
            let mark = self.builder.registers().mark();
            let value = self.compile_expression(test, None)?;
            let result = self.builder.alloc_register();
            self.builder.emit(Op::StrictEq {
                dst: result,
                left: scrutinee,
                right: value,
            });
            self.builder.registers().release_to(mark);
            self.builder.emit_jump_if_true(result, *label)?;
        }
        self.builder.emit_jump(default_target)
    }

    /// Write case offsets into a reserved table, first duplicate winning
    fn fill_switch_table(
        &mut self,
        table: PendingTable,
        cases: &[SwitchCase],
        case_labels: &[Label],
    ) -> Result<(), JsError> {
        let positions: Vec<u32> = cases
            .iter()
            .zip(case_labels)
            .filter(|(case, _)| case.test.is_some())
            .map(|(_, label)| {
                self.builder
                    .label_position(*label)
                    .ok_or_else(|| JsError::internal_error("switch case label not placed"))
            })
            .collect::<Result<_, _>>()?;

        match table {
            PendingTable::Simple {
                table,
                index,
                min,
                keys,
                character,
            } => {
                let slots = if character {
                    self.builder.character_switch_table_mut(table)
                } else {
                    self.builder.immediate_switch_table_mut(table)
                }
                .ok_or_else(|| JsError::internal_error("missing switch table"))?;
                for (key, position) in keys.iter().zip(positions) {
                    let slot = (i64::from(*key) - i64::from(min)) as usize;
                    if let Some(offset) = slots.offsets.get_mut(slot) {
                        if *offset == 0 {
                            *offset = position as i32 - index as i32;
                        }
                    }
                }
            }
            PendingTable::String { table, index, keys } => {
                let slots = self
                    .builder
                    .string_switch_table_mut(table)
                    .ok_or_else(|| JsError::internal_error("missing switch table"))?;
                for (key, position) in keys.into_iter().zip(positions) {
                    slots
                        .offsets
                        .entry(key)
                        .or_insert(position as i32 - index as i32);
                }
            }
        }
        Ok(())
    }

    // ============ TRY / WITH ============

    fn compile_try(&mut self, stmt: &TryStatement) -> Result<(), JsError> {
        let mark = self.builder.registers().mark();
        let finally = match &stmt.finalizer {
            Some(body) => {
                let ret_reg = self.builder.alloc_register();
                let value_reg = self.builder.alloc_register();
                let finally_label = self.builder.new_label();
                self.control.push(ControlContext::Finally {
                    ret_reg,
                    value_reg,
                    finally_label,
                });
                Some((ret_reg, finally_label, body))
            }
            None => None,
        };
        let after = self.builder.new_label();

        let try_start = self.builder.current_offset();
        self.compile_statements(&stmt.block.body)?;
        let try_end = self.builder.current_offset();
        if let Some((ret_reg, finally_label, _)) = finally {
            self.builder
                .emit_with_label(Op::Jsr { ret_reg, offset: 0 }, finally_label)?;
        }
        self.builder.emit_jump(after)?;

        let mut protected_end = try_end;
        if let Some(handler) = &stmt.handler {
            self.builder.set_span(handler.span);
            let target = self.builder.current_offset();
            self.builder
                .add_handler(try_start, try_end, target, self.scope_depth);

            let exception = self.builder.alloc_register();
            self.builder.emit(Op::Catch { dst: exception });
            let name = self.builder.add_string(&handler.param.name);
            self.builder.emit(Op::PushNewScope {
                dst: exception,
                name,
                value: exception,
            });
            self.builder.free_register(exception);

            self.push_scope_context(CompileScope::Catch {
                name: handler.param.name.cheap_clone(),
            });
            self.compile_statements(&handler.body.body)?;
            self.pop_scope_context();
            protected_end = self.builder.current_offset();

            if let Some((ret_reg, finally_label, _)) = finally {
                self.builder
                    .emit_with_label(Op::Jsr { ret_reg, offset: 0 }, finally_label)?;
            }
            self.builder.emit_jump(after)?;
        }

        if let Some((ret_reg, finally_label, body)) = finally {
            self.control.pop();
            self.builder.set_span(body.span);
            let target = self.builder.current_offset();
            self.builder
                .add_handler(try_start, protected_end, target, self.scope_depth);

            // exceptional path: run the finally body, then rethrow
            let exception = self.builder.alloc_register();
            self.builder.emit(Op::Catch { dst: exception });
            self.builder
                .emit_with_label(Op::Jsr { ret_reg, offset: 0 }, finally_label)?;
            self.builder.emit(Op::Throw { src: exception });

            self.builder.place_label(finally_label)?;
            self.compile_statements(&body.body)?;
            self.builder.emit(Op::Sret { ret_reg });
        }

        self.builder.place_label(after)?;
        self.builder.registers().release_to(mark);
        Ok(())
    }

    fn compile_with(&mut self, stmt: &WithStatement) -> Result<(), JsError> {
        let mark = self.builder.registers().mark();
        let src = self.compile_expression(&stmt.object, None)?;
        self.builder.set_span(stmt.span);
        self.builder.emit(Op::PushScope { src });
        self.builder.registers().release_to(mark);

        self.push_scope_context(CompileScope::With);
        self.compile_statement(&stmt.body)?;
        self.pop_scope_context();
        Ok(())
    }

    // ============ JUMPS ============

    fn compile_return(&mut self, stmt: &ReturnStatement) -> Result<(), JsError> {
        if self.code_type != CodeType::Function {
            return Err(JsError::syntax_error(
                "Invalid return statement",
                stmt.span.line,
                stmt.span.column,
            ));
        }
        let mark = self.builder.registers().mark();
        let target = self.return_value_register();
        let src = match &stmt.argument {
            Some(argument) => self.compile_expression(argument, target)?,
            None => {
                let dst = match target {
                    Some(reg) => reg,
                    None => self.builder.alloc_register(),
                };
                self.builder.emit(Op::LoadUndefined { dst });
                dst
            }
        };
        self.builder.set_span(stmt.span);
        // the caller's scope chain is restored by the return itself
        self.emit_unwind_to(0)?;
        self.emit_debug_hook(DebugHook::WillLeaveCallFrame, stmt.span);
        self.builder.emit(Op::Ret { src });
        self.builder.registers().release_to(mark);
        Ok(())
    }

    fn compile_break(&mut self, stmt: &JumpStatement) -> Result<(), JsError> {
        let target = match &stmt.label {
            Some(label) => self
                .jump_targets
                .iter()
                .rev()
                .find(|t| t.labels.contains(&label.name)),
            None => self.jump_targets.iter().rev().find(|t| t.is_breakable),
        };
        let Some(target) = target else {
            let message = match &stmt.label {
                Some(label) => format!("Undefined label '{}'", label.name),
                None => "Illegal break statement".to_string(),
            };
            return Err(JsError::syntax_error(
                message,
                stmt.span.line,
                stmt.span.column,
            ));
        };
        let (depth, label) = (target.control_depth, target.break_label);
        self.emit_jump_out(depth, label)
    }

    fn compile_continue(&mut self, stmt: &JumpStatement) -> Result<(), JsError> {
        let target = match &stmt.label {
            Some(label) => self
                .jump_targets
                .iter()
                .rev()
                .find(|t| t.labels.contains(&label.name)),
            None => self
                .jump_targets
                .iter()
                .rev()
                .find(|t| t.continue_label.is_some()),
        };
        let Some((depth, Some(label))) = target.map(|t| (t.control_depth, t.continue_label)) else {
            let message = match &stmt.label {
                Some(label) => format!(
                    "Illegal continue statement: '{}' does not denote an iteration statement",
                    label.name
                ),
                None => "Illegal continue statement".to_string(),
            };
            return Err(JsError::syntax_error(
                message,
                stmt.span.line,
                stmt.span.column,
            ));
        };
        self.emit_jump_out(depth, label)
    }

    fn compile_labeled(&mut self, stmt: &LabeledStatement) -> Result<(), JsError> {
        self.pending_labels.push(stmt.label.name.cheap_clone());
        match stmt.body.as_ref() {
            Statement::Labeled(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::Switch(_) => self.compile_statement(&stmt.body),
            body => {
                let end = self.builder.new_label();
                self.push_jump_target(end, None, false);
                self.compile_statement(body)?;
                self.pop_jump_target();
                self.builder.place_label(end)
            }
        }
    }
}

/// A switch table whose offsets are filled in once the cases are placed
enum PendingTable {
    Simple {
        table: u32,
        index: usize,
        min: i32,
        keys: Vec<i32>,
        character: bool,
    },
    String {
        table: u32,
        index: usize,
        keys: Vec<JsString>,
    },
}

fn classify_switch(cases: &[SwitchCase]) -> SwitchKind {
    let tests: Vec<&LiteralValue> = match cases
        .iter()
        .filter_map(|case| case.test.as_ref())
        .map(|test| match test {
            Expression::Literal(literal) => Some(&literal.value),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
    {
        Some(tests) if !tests.is_empty() => tests,
        _ => return SwitchKind::Chain,
    };

    let integers: Option<Vec<i32>> = tests
        .iter()
        .map(|value| match value {
            LiteralValue::Number(n) => {
                let i = *n as i32;
                (i as f64 == *n && !(*n == 0.0 && n.is_sign_negative())).then_some(i)
            }
            _ => None,
        })
        .collect();
    if let Some(keys) = integers {
        return if is_dense(&keys) {
            SwitchKind::Immediate(keys)
        } else {
            SwitchKind::Chain
        };
    }

    let strings: Option<Vec<JsString>> = tests
        .iter()
        .map(|value| match value {
            LiteralValue::String(s) => Some(s.cheap_clone()),
            _ => None,
        })
        .collect();
    let Some(strings) = strings else {
        return SwitchKind::Chain;
    };

    let characters: Option<Vec<i32>> = strings
        .iter()
        .map(|s| match (s.utf16_len(), s.code_unit_at(0)) {
            (1, Some(unit)) => Some(i32::from(unit)),
            _ => None,
        })
        .collect();
    match characters {
        Some(keys) if is_dense(&keys) => SwitchKind::Character(keys),
        _ => SwitchKind::String(strings),
    }
}

fn is_dense(keys: &[i32]) -> bool {
    let (Some(min), Some(max)) = (keys.iter().min(), keys.iter().max()) else {
        return false;
    };
    let range = i64::from(*max) - i64::from(*min) + 1;
    range <= MAX_SWITCH_TABLE_RANGE && range < 10 * keys.len() as i64
}
