//! Expression compilation
//!
//! `compile_expression(expr, dst)` leaves the value of `expr` in a register
//! and returns it. With `dst` set the value always ends up in `dst`; without
//! it a local variable may be returned as-is, otherwise a fresh temporary
//! holds the result. Temporaries used on the way are released before
//! returning.

use std::rc::Rc;

use super::bytecode::{ConstantIndex, Op, Register};
use super::{CompileScope, Compiler, Label, Resolution};
use crate::ast::*;
use crate::error::JsError;
use crate::value::{CheapClone, JsString};

impl<'a> Compiler<'a> {
    pub(super) fn compile_expression(
        &mut self,
        expr: &Expression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let mark = self.builder.registers().mark();
        let result = self.compile_expression_inner(expr, dst)?;
        let keep = dst.is_none()
            && self
                .builder
                .registers()
                .position(result)
                .is_some_and(|position| position >= mark);
        if keep {
            self.builder.free_register(result + 1);
        } else {
            self.builder.registers().release_to(mark);
        }
        Ok(result)
    }

    /// Evaluate for side effects only
    pub(super) fn compile_discarded(&mut self, expr: &Expression) -> Result<(), JsError> {
        let mark = self.builder.registers().mark();
        match expr {
            Expression::Update(update) => {
                self.builder.set_span(update.span);
                self.compile_update(update, None, false)?;
            }
            _ => {
                self.compile_expression(expr, None)?;
            }
        }
        self.builder.registers().release_to(mark);
        Ok(())
    }

    /// Jump to `label` when `expr` converts to `jump_if`
    pub(super) fn compile_condition(
        &mut self,
        expr: &Expression,
        label: Label,
        jump_if: bool,
    ) -> Result<(), JsError> {
        match expr {
            Expression::Unary(UnaryExpression {
                operator: UnaryOp::Not,
                argument,
                ..
            }) => self.compile_condition(argument, label, !jump_if),
            Expression::Logical(logical) => {
                let short_circuits_to_label = match logical.operator {
                    LogicalOp::And => !jump_if,
                    LogicalOp::Or => jump_if,
                };
                if short_circuits_to_label {
                    self.compile_condition(&logical.left, label, jump_if)?;
                    self.compile_condition(&logical.right, label, jump_if)
                } else {
                    let skip = self.builder.new_label();
                    self.compile_condition(&logical.left, skip, !jump_if)?;
                    self.compile_condition(&logical.right, label, jump_if)?;
                    self.builder.place_label(skip)
                }
            }
            _ => {
                let mark = self.builder.registers().mark();
                let cond = self.compile_expression(expr, None)?;
                // released first so the comparison can be fused into the branch
                self.builder.registers().release_to(mark);
                if jump_if {
                    self.builder.emit_jump_if_true(cond, label)
                } else {
                    self.builder.emit_jump_if_false(cond, label)
                }
            }
        }
    }

    fn compile_expression_inner(
        &mut self,
        expr: &Expression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        self.builder.set_span(expr.span());
        match expr {
            Expression::Literal(literal) => {
                let dst = self.final_dst(dst);
                self.emit_literal(dst, &literal.value);
                Ok(dst)
            }
            Expression::Array(array) => self.compile_array(array, dst),
            Expression::Object(object) => self.compile_object(object, dst),
            Expression::Function(function) => self.compile_function_expression(function, dst),
            Expression::Identifier(id) => self.compile_identifier(id, dst),
            Expression::This(_) => {
                let this = self.this_register();
                Ok(self.move_to(dst, this))
            }
            Expression::Unary(unary) => self.compile_unary(unary, dst),
            Expression::Update(update) => self.compile_update(update, dst, true),
            Expression::Binary(binary) => self.compile_binary(binary, dst),
            Expression::Logical(logical) => self.compile_logical(logical, dst),
            Expression::Conditional(cond) => {
                let dst = self.final_dst(dst);
                let else_label = self.builder.new_label();
                let end = self.builder.new_label();
                self.compile_condition(&cond.test, else_label, false)?;
                self.compile_expression(&cond.consequent, Some(dst))?;
                self.builder.emit_jump(end)?;
                self.builder.place_label(else_label)?;
                self.compile_expression(&cond.alternate, Some(dst))?;
                self.builder.place_label(end)?;
                Ok(dst)
            }
            Expression::Assignment(assign) => self.compile_assignment(assign, dst),
            Expression::Sequence(seq) => {
                let Some((last, rest)) = seq.expressions.split_last() else {
                    let dst = self.final_dst(dst);
                    self.builder.emit(Op::LoadUndefined { dst });
                    return Ok(dst);
                };
                for expr in rest {
                    self.compile_discarded(expr)?;
                }
                self.compile_expression(last, dst)
            }
            Expression::Member(member) => self.compile_member(member, dst),
            Expression::Call(call) => self.compile_call(call, dst),
            Expression::New(new) => self.compile_new(new, dst),
        }
    }

    // ============ REGISTER HELPERS ============

    fn final_dst(&mut self, dst: Option<Register>) -> Register {
        match dst {
            Some(dst) => dst,
            None => self.builder.alloc_register(),
        }
    }

    /// Copy `src` into `dst` if a destination was requested
    fn move_to(&mut self, dst: Option<Register>, src: Register) -> Register {
        match dst {
            Some(dst) if dst != src => {
                self.builder.emit(Op::Mov { dst, src });
                dst
            }
            Some(dst) => dst,
            None => src,
        }
    }

    /// Build a value that takes several instructions in a register nobody
    /// else can observe, then copy it into a local destination
    fn with_temp_destination(
        &mut self,
        dst: Option<Register>,
        build: impl FnOnce(&mut Self, Register) -> Result<(), JsError>,
    ) -> Result<Register, JsError> {
        match dst {
            Some(dst) if !self.builder.registers().is_temporary(dst) => {
                let tmp = self.builder.alloc_register();
                build(self, tmp)?;
                self.builder.emit(Op::Mov { dst, src: tmp });
                Ok(dst)
            }
            dst => {
                let dst = self.final_dst(dst);
                build(self, dst)?;
                Ok(dst)
            }
        }
    }

    /// Compile an operand that must still hold its value after `later` runs
    fn compile_stable_operand(
        &mut self,
        expr: &Expression,
        later: &[&Expression],
    ) -> Result<Register, JsError> {
        let reg = self.compile_expression(expr, None)?;
        if !self.builder.registers().is_temporary(reg)
            && later.iter().any(|e| has_side_effects(e))
        {
            let tmp = self.builder.alloc_register();
            self.builder.emit(Op::Mov { dst: tmp, src: reg });
            return Ok(tmp);
        }
        Ok(reg)
    }

    fn emit_literal(&mut self, dst: Register, value: &LiteralValue) {
        match value {
            LiteralValue::Null => {
                self.builder.emit(Op::LoadNull { dst });
            }
            LiteralValue::Boolean(value) => {
                self.builder.emit(Op::LoadBool { dst, value: *value });
            }
            LiteralValue::Number(n) => self.builder.emit_load_number(dst, *n),
            LiteralValue::String(s) => self.builder.emit_load_string(dst, s),
            LiteralValue::RegExp { pattern, flags } => {
                let regexp = self.builder.add_regexp(pattern, flags);
                self.builder.emit(Op::NewRegExp { dst, regexp });
            }
        }
    }

    // ============ LITERALS ============

    fn compile_array(
        &mut self,
        array: &ArrayExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let has_holes = array.elements.iter().any(|e| e.is_none());
        self.with_temp_destination(dst, |this, dst| {
            if !has_holes {
                let count = array.elements.len();
                let first = this.builder.registers().alloc_range(count);
                for (i, element) in array.elements.iter().flatten().enumerate() {
                    this.compile_expression(element, Some(first + i as Register))?;
                }
                this.builder.set_span(array.span);
                this.builder.emit(Op::NewArray {
                    dst,
                    first,
                    count: count as u32,
                });
                this.builder.free_register(first);
                return Ok(());
            }

            this.builder.emit(Op::NewArray {
                dst,
                first: 0,
                count: 0,
            });
            for (i, element) in array.elements.iter().enumerate() {
                let Some(element) = element else { continue };
                let mark = this.builder.registers().mark();
                let value = this.compile_expression(element, None)?;
                this.builder.emit(Op::PutByIndex {
                    base: dst,
                    index: i as u32,
                    value,
                });
                this.builder.registers().release_to(mark);
            }
            if matches!(array.elements.last(), Some(None)) {
                // trailing elisions only show up in the length
                let length = this.builder.alloc_register();
                this.builder
                    .emit_load_number(length, array.elements.len() as f64);
                let name = this.builder.add_string(&JsString::from("length"));
                this.builder.emit(Op::PutById {
                    base: dst,
                    name,
                    value: length,
                });
                this.builder.free_register(length);
            }
            Ok(())
        })
    }

    fn compile_object(
        &mut self,
        object: &ObjectExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        self.with_temp_destination(dst, |this, dst| {
            this.builder.emit(Op::NewObject { dst });
            for property in &object.properties {
                let mark = this.builder.registers().mark();
                let value = this.compile_expression(&property.value, None)?;
                this.builder.set_span(property.span);
                let name = this.builder.add_string(&property.key);
                this.builder.emit(Op::PutById {
                    base: dst,
                    name,
                    value,
                });
                this.builder.registers().release_to(mark);
            }
            Ok(())
        })
    }

    fn compile_function_expression(
        &mut self,
        function: &Rc<FunctionNode>,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let mut scopes = self.scopes.clone();
        if let Some(name) = &function.name {
            scopes.push(CompileScope::FunctionName {
                name: name.name.cheap_clone(),
            });
        }
        let code = Compiler::compile_function(
            function,
            &scopes,
            self.globals,
            self.options,
            Rc::clone(&self.source),
        )?;
        let func = self.builder.add_function(code);
        let dst = self.final_dst(dst);
        self.builder.set_span(function.span);
        self.builder.emit(Op::NewFuncExp { dst, func });
        Ok(dst)
    }

    // ============ IDENTIFIERS ============

    fn compile_identifier(
        &mut self,
        id: &Identifier,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        match self.resolve(id.name.as_str()) {
            Resolution::Local { register, .. } => Ok(self.move_to(dst, register)),
            resolution => {
                let dst = self.final_dst(dst);
                self.emit_identifier_read(&id.name, resolution, dst);
                Ok(dst)
            }
        }
    }

    fn emit_identifier_read(&mut self, name: &JsString, resolution: Resolution, dst: Register) {
        match resolution {
            Resolution::Local { register, .. } => {
                if register != dst {
                    self.builder.emit(Op::Mov { dst, src: register });
                }
            }
            Resolution::Scoped { depth, index, .. } => {
                self.builder.emit(Op::GetScopedVar { dst, depth, index });
            }
            Resolution::GlobalSlot { index, .. } => {
                self.builder.emit(Op::GetGlobalVar { dst, index });
            }
            Resolution::GlobalNamed => {
                let name = self.builder.add_string(name);
                let cache = self.builder.add_global_cache();
                self.builder.emit(Op::ResolveGlobal { dst, name, cache });
            }
            Resolution::Dynamic { skip: 0 } => {
                let name = self.builder.add_string(name);
                self.builder.emit(Op::Resolve { dst, name });
            }
            Resolution::Dynamic { skip } => {
                let name = self.builder.add_string(name);
                self.builder.emit(Op::ResolveSkip { dst, name, skip });
            }
        }
    }

    /// Store `value` into a binding that was already resolved. Named
    /// bindings need their base object in `base`.
    fn emit_resolved_store(
        &mut self,
        resolution: Resolution,
        base: Option<(Register, JsString)>,
        value: Register,
    ) {
        if resolution.is_read_only() {
            return;
        }
        match resolution {
            Resolution::Local { register, .. } => {
                if register != value {
                    self.builder.emit(Op::Mov {
                        dst: register,
                        src: value,
                    });
                }
            }
            Resolution::Scoped { depth, index, .. } => {
                self.builder.emit(Op::PutScopedVar {
                    depth,
                    index,
                    value,
                });
            }
            Resolution::GlobalSlot { index, .. } => {
                self.builder.emit(Op::PutGlobalVar { index, value });
            }
            Resolution::GlobalNamed | Resolution::Dynamic { .. } => {
                if let Some((base, name)) = base {
                    let name = self.builder.add_string(&name);
                    self.builder.emit(Op::PutById { base, name, value });
                }
            }
        }
    }

    /// Base object for a named binding, or `None` for static bindings
    fn emit_resolve_base(
        &mut self,
        name: &JsString,
        resolution: Resolution,
    ) -> Option<(Register, JsString)> {
        match resolution {
            Resolution::GlobalNamed | Resolution::Dynamic { .. } => {
                let base = self.builder.alloc_register();
                let idx = self.builder.add_string(name);
                self.builder.emit(Op::ResolveBase {
                    dst: base,
                    name: idx,
                });
                Some((base, name.cheap_clone()))
            }
            _ => None,
        }
    }

    /// Store a register into an identifier (for-in targets)
    pub(super) fn emit_identifier_store(
        &mut self,
        id: &Identifier,
        value: Register,
    ) -> Result<(), JsError> {
        let mark = self.builder.registers().mark();
        let resolution = self.resolve(id.name.as_str());
        let base = self.emit_resolve_base(&id.name, resolution);
        self.emit_resolved_store(resolution, base, value);
        self.builder.registers().release_to(mark);
        Ok(())
    }

    /// Store a register into an assignment target (for-in targets)
    pub(super) fn emit_assign_register(
        &mut self,
        target: &Expression,
        value: Register,
    ) -> Result<(), JsError> {
        match target {
            Expression::Identifier(id) => self.emit_identifier_store(id, value),
            Expression::Member(member) => {
                let mark = self.builder.registers().mark();
                let base = self.compile_expression(&member.object, None)?;
                let key = self.compile_member_key(&member.property)?;
                self.emit_member_put(base, key, value);
                self.builder.registers().release_to(mark);
                Ok(())
            }
            other => Err(invalid_target(other.span())),
        }
    }

    /// `name = value` and compound forms on an identifier
    pub(super) fn compile_identifier_assignment(
        &mut self,
        id: &Identifier,
        value: &Expression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        self.compile_identifier_update(id, AssignmentOp::Assign, value, dst)
    }

    fn compile_identifier_update(
        &mut self,
        id: &Identifier,
        operator: AssignmentOp,
        value: &Expression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let resolution = self.resolve(id.name.as_str());
        let binary = operator.binary_op();

        if let Resolution::Local {
            register,
            read_only,
        } = resolution
        {
            return match binary {
                None if read_only => self.compile_expression(value, dst),
                None => {
                    self.compile_expression(value, Some(register))?;
                    Ok(self.move_to(dst, register))
                }
                Some(op) => {
                    let current = if has_side_effects(value) {
                        let tmp = self.builder.alloc_register();
                        self.builder.emit(Op::Mov {
                            dst: tmp,
                            src: register,
                        });
                        tmp
                    } else {
                        register
                    };
                    let rhs = self.compile_expression(value, None)?;
                    self.builder.set_span(id.span.to(value.span()));
                    if read_only {
                        let dst = self.final_dst(dst);
                        self.emit_binary(op, dst, current, rhs);
                        Ok(dst)
                    } else {
                        self.emit_binary(op, register, current, rhs);
                        Ok(self.move_to(dst, register))
                    }
                }
            };
        }

        match binary {
            None => {
                let result = self.final_dst(dst);
                let base = self.emit_resolve_base(&id.name, resolution);
                self.compile_expression(value, Some(result))?;
                self.builder.set_span(id.span.to(value.span()));
                self.emit_resolved_store(resolution, base, result);
                Ok(result)
            }
            Some(op) => self.with_temp_destination(dst, |this, result| {
                let base = this.emit_resolve_base(&id.name, resolution);
                this.emit_identifier_read(&id.name, resolution, result);
                let rhs = this.compile_expression(value, None)?;
                this.builder.set_span(id.span.to(value.span()));
                this.emit_binary(op, result, result, rhs);
                this.emit_resolved_store(resolution, base, result);
                Ok(())
            }),
        }
    }

    // ============ OPERATORS ============

    fn compile_unary(
        &mut self,
        unary: &UnaryExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        match unary.operator {
            UnaryOp::Typeof => return self.compile_typeof(unary, dst),
            UnaryOp::Delete => return self.compile_delete(unary, dst),
            UnaryOp::Minus => {
                if let Expression::Literal(Literal {
                    value: LiteralValue::Number(n),
                    ..
                }) = unary.argument.as_ref()
                {
                    let dst = self.final_dst(dst);
                    self.builder.emit_load_number(dst, -n);
                    return Ok(dst);
                }
            }
            _ => {}
        }

        let dst = self.final_dst(dst);
        let src = self.compile_expression(&unary.argument, None)?;
        self.builder.set_span(unary.span);
        match unary.operator {
            UnaryOp::Minus => self.builder.emit(Op::Negate { dst, src }),
            UnaryOp::Plus => self.builder.emit(Op::ToNumber { dst, src }),
            UnaryOp::Not => self.builder.emit(Op::Not { dst, src }),
            UnaryOp::BitNot => self.builder.emit(Op::BitNot { dst, src }),
            UnaryOp::Void | UnaryOp::Typeof | UnaryOp::Delete => {
                self.builder.emit(Op::LoadUndefined { dst })
            }
        };
        Ok(dst)
    }

    fn compile_typeof(
        &mut self,
        unary: &UnaryExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        let src = match unary.argument.as_ref() {
            Expression::Identifier(id) => match self.resolve(id.name.as_str()) {
                Resolution::Local { register, .. } => register,
                resolution @ (Resolution::Scoped { .. } | Resolution::GlobalSlot { .. }) => {
                    let tmp = self.builder.alloc_register();
                    self.emit_identifier_read(&id.name, resolution, tmp);
                    tmp
                }
                Resolution::GlobalNamed | Resolution::Dynamic { .. } => {
                    // an unbound name is "undefined", not an error
                    let tmp = self.builder.alloc_register();
                    let name = self.builder.add_string(&id.name);
                    self.builder.emit(Op::ResolveBase { dst: tmp, name });
                    self.builder.emit(Op::GetById {
                        dst: tmp,
                        base: tmp,
                        name,
                    });
                    tmp
                }
            },
            argument => self.compile_expression(argument, None)?,
        };
        self.builder.set_span(unary.span);
        self.builder.emit(Op::TypeOf { dst, src });
        Ok(dst)
    }

    fn compile_delete(
        &mut self,
        unary: &UnaryExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        match unary.argument.as_ref() {
            Expression::Identifier(id) => match self.resolve(id.name.as_str()) {
                Resolution::GlobalNamed | Resolution::Dynamic { .. } => {
                    let base = self.builder.alloc_register();
                    let name = self.builder.add_string(&id.name);
                    self.builder.emit(Op::ResolveBase { dst: base, name });
                    self.builder.emit(Op::DelById { dst, base, name });
                }
                // declared variables cannot be deleted
                _ => {
                    self.builder.emit(Op::LoadBool { dst, value: false });
                }
            },
            Expression::Member(member) => {
                let base = self.compile_expression(&member.object, None)?;
                self.builder.set_span(unary.span);
                match &member.property {
                    MemberProperty::Identifier(name) => {
                        let name = self.builder.add_string(&name.name);
                        self.builder.emit(Op::DelById { dst, base, name });
                    }
                    MemberProperty::Computed(property) => {
                        let property = self.compile_expression(property, None)?;
                        self.builder.emit(Op::DelByVal {
                            dst,
                            base,
                            property,
                        });
                    }
                }
            }
            argument => {
                self.compile_discarded(argument)?;
                self.builder.emit(Op::LoadBool { dst, value: true });
            }
        }
        Ok(dst)
    }

    fn compile_update(
        &mut self,
        update: &UpdateExpression,
        dst: Option<Register>,
        value_needed: bool,
    ) -> Result<Register, JsError> {
        let prefix = update.prefix || !value_needed;
        let increment = update.operator == UpdateOp::Increment;

        match update.argument.as_ref() {
            Expression::Identifier(id) => {
                let resolution = self.resolve(id.name.as_str());
                if let Resolution::Local {
                    register,
                    read_only: false,
                } = resolution
                {
                    if prefix {
                        self.emit_pre_update(register, increment);
                        return Ok(self.move_to(dst, register));
                    }
                    return self.with_temp_destination(dst, |this, dst| {
                        this.emit_post_update(dst, register, increment);
                        Ok(())
                    });
                }

                self.with_temp_destination(dst, |this, dst| {
                    let base = this.emit_resolve_base(&id.name, resolution);
                    if prefix {
                        this.emit_identifier_read(&id.name, resolution, dst);
                        this.emit_pre_update(dst, increment);
                        this.emit_resolved_store(resolution, base, dst);
                    } else {
                        let tmp = this.builder.alloc_register();
                        this.emit_identifier_read(&id.name, resolution, tmp);
                        this.emit_post_update(dst, tmp, increment);
                        this.emit_resolved_store(resolution, base, tmp);
                    }
                    Ok(())
                })
            }
            Expression::Member(member) => self.with_temp_destination(dst, |this, dst| {
                let base = this.compile_expression(&member.object, None)?;
                let key = this.compile_member_key(&member.property)?;
                this.builder.set_span(update.span);
                if prefix {
                    this.emit_member_get(dst, base, key);
                    this.emit_pre_update(dst, increment);
                    this.emit_member_put(base, key, dst);
                } else {
                    let value = this.builder.alloc_register();
                    this.emit_member_get(value, base, key);
                    this.emit_post_update(dst, value, increment);
                    this.emit_member_put(base, key, value);
                }
                Ok(())
            }),
            other => Err(invalid_target(other.span())),
        }
    }

    fn emit_pre_update(&mut self, srcdst: Register, increment: bool) {
        self.builder.emit(if increment {
            Op::PreInc { srcdst }
        } else {
            Op::PreDec { srcdst }
        });
    }

    fn emit_post_update(&mut self, dst: Register, srcdst: Register, increment: bool) {
        self.builder.emit(if increment {
            Op::PostInc { dst, srcdst }
        } else {
            Op::PostDec { dst, srcdst }
        });
    }

    fn compile_binary(
        &mut self,
        binary: &BinaryExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        let left = self.compile_stable_operand(&binary.left, &[binary.right.as_ref()])?;
        let right = self.compile_expression(&binary.right, None)?;
        self.builder.set_span(binary.span);
        self.emit_binary(binary.operator, dst, left, right);
        Ok(dst)
    }

    fn emit_binary(&mut self, operator: BinaryOp, dst: Register, left: Register, right: Register) {
        let op = match operator {
            BinaryOp::Add => Op::Add { dst, left, right },
            BinaryOp::Sub => Op::Sub { dst, left, right },
            BinaryOp::Mul => Op::Mul { dst, left, right },
            BinaryOp::Div => Op::Div { dst, left, right },
            BinaryOp::Mod => Op::Mod { dst, left, right },
            BinaryOp::Eq => Op::Eq { dst, left, right },
            BinaryOp::NotEq => Op::NotEq { dst, left, right },
            BinaryOp::StrictEq => Op::StrictEq { dst, left, right },
            BinaryOp::StrictNotEq => Op::StrictNotEq { dst, left, right },
            BinaryOp::Lt => Op::Less { dst, left, right },
            BinaryOp::LtEq => Op::LessEq { dst, left, right },
            BinaryOp::Gt => Op::Less {
                dst,
                left: right,
                right: left,
            },
            BinaryOp::GtEq => Op::LessEq {
                dst,
                left: right,
                right: left,
            },
            BinaryOp::BitAnd => Op::BitAnd { dst, left, right },
            BinaryOp::BitOr => Op::BitOr { dst, left, right },
            BinaryOp::BitXor => Op::BitXor { dst, left, right },
            BinaryOp::LShift => Op::LShift { dst, left, right },
            BinaryOp::RShift => Op::RShift { dst, left, right },
            BinaryOp::URShift => Op::URShift { dst, left, right },
            BinaryOp::In => Op::In {
                dst,
                property: left,
                object: right,
            },
            BinaryOp::Instanceof => Op::InstanceOf {
                dst,
                value: left,
                constructor: right,
            },
        };
        self.builder.emit(op);
    }

    fn compile_logical(
        &mut self,
        logical: &LogicalExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        self.with_temp_destination(dst, |this, dst| {
            let end = this.builder.new_label();
            this.compile_expression(&logical.left, Some(dst))?;
            this.builder.set_span(logical.span);
            match logical.operator {
                LogicalOp::And => this.builder.emit_jump_if_false(dst, end)?,
                LogicalOp::Or => this.builder.emit_jump_if_true(dst, end)?,
            }
            this.compile_expression(&logical.right, Some(dst))?;
            this.builder.place_label(end)
        })
    }

    // ============ ASSIGNMENT & MEMBERS ============

    fn compile_assignment(
        &mut self,
        assign: &AssignmentExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        match assign.target.as_ref() {
            Expression::Identifier(id) => {
                self.compile_identifier_update(id, assign.operator, &assign.value, dst)
            }
            Expression::Member(member) => {
                let computed = match &member.property {
                    MemberProperty::Computed(property) => Some(property.as_ref()),
                    MemberProperty::Identifier(_) => None,
                };
                let mut later: Vec<&Expression> = computed.into_iter().collect();
                later.push(assign.value.as_ref());
                let base = self.compile_stable_operand(&member.object, &later)?;
                let key = match computed {
                    Some(property) => {
                        let value_only = [assign.value.as_ref()];
                        MemberKey::Value(self.compile_stable_operand(property, &value_only)?)
                    }
                    None => self.compile_member_key(&member.property)?,
                };

                let value = match assign.operator.binary_op() {
                    None => self.compile_expression(&assign.value, dst)?,
                    Some(op) => {
                        let result = self.builder.alloc_register();
                        self.emit_member_get(result, base, key);
                        let rhs = self.compile_expression(&assign.value, None)?;
                        self.builder.set_span(assign.span);
                        self.emit_binary(op, result, result, rhs);
                        result
                    }
                };
                self.builder.set_span(assign.span);
                self.emit_member_put(base, key, value);
                Ok(self.move_to(dst, value))
            }
            other => Err(invalid_target(other.span())),
        }
    }

    /// Evaluate the key of a member expression
    fn compile_member_key(&mut self, property: &MemberProperty) -> Result<MemberKey, JsError> {
        Ok(match property {
            MemberProperty::Identifier(name) => {
                MemberKey::Named(self.builder.add_string(&name.name))
            }
            MemberProperty::Computed(property) => {
                MemberKey::Value(self.compile_expression(property, None)?)
            }
        })
    }

    fn emit_member_get(&mut self, dst: Register, base: Register, key: MemberKey) {
        match key {
            MemberKey::Named(name) => self.builder.emit(Op::GetById { dst, base, name }),
            MemberKey::Value(property) => self.builder.emit(Op::GetByVal {
                dst,
                base,
                property,
            }),
        };
    }

    fn emit_member_put(&mut self, base: Register, key: MemberKey, value: Register) {
        match key {
            MemberKey::Named(name) => self.builder.emit(Op::PutById { base, name, value }),
            MemberKey::Value(property) => self.builder.emit(Op::PutByVal {
                base,
                property,
                value,
            }),
        };
    }

    fn compile_member(
        &mut self,
        member: &MemberExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        let base = match &member.property {
            MemberProperty::Computed(property) => {
                self.compile_stable_operand(&member.object, &[property.as_ref()])?
            }
            MemberProperty::Identifier(_) => self.compile_expression(&member.object, None)?,
        };
        let key = self.compile_member_key(&member.property)?;
        self.builder.set_span(member.span);
        self.emit_member_get(dst, base, key);
        Ok(dst)
    }

    // ============ CALLS ============

    fn compile_call(
        &mut self,
        call: &CallExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        let func = self.builder.alloc_register();
        let this = self.builder.alloc_register();
        let mut is_eval = false;

        match call.callee.as_ref() {
            Expression::Member(member) => {
                self.compile_expression(&member.object, Some(this))?;
                let key = self.compile_member_key(&member.property)?;
                self.builder.set_span(member.span);
                self.emit_member_get(func, this, key);
                self.builder.free_register(this + 1);
            }
            Expression::Identifier(id) => {
                is_eval = id.name.as_str() == "eval";
                match self.resolve(id.name.as_str()) {
                    Resolution::Dynamic { .. } => {
                        let name = self.builder.add_string(&id.name);
                        self.builder.emit(Op::ResolveWithBase {
                            base_dst: this,
                            func_dst: func,
                            name,
                        });
                    }
                    resolution => {
                        self.emit_identifier_read(&id.name, resolution, func);
                        self.builder.emit(Op::LoadUndefined { dst: this });
                    }
                }
            }
            callee => {
                self.compile_expression(callee, Some(func))?;
                self.builder.emit(Op::LoadUndefined { dst: this });
            }
        }

        let argc = self.compile_arguments(&call.arguments)?;
        self.builder.set_span(call.span);
        let op = if is_eval {
            Op::CallEval {
                dst,
                func,
                first_arg: this,
                argc,
            }
        } else {
            Op::Call {
                dst,
                func,
                first_arg: this,
                argc,
            }
        };
        self.builder.emit(op);
        Ok(dst)
    }

    fn compile_new(
        &mut self,
        new: &NewExpression,
        dst: Option<Register>,
    ) -> Result<Register, JsError> {
        let dst = self.final_dst(dst);
        let func = self.builder.alloc_register();
        let this = self.builder.alloc_register();
        self.compile_expression(&new.callee, Some(func))?;
        self.builder.emit(Op::LoadUndefined { dst: this });
        let argc = self.compile_arguments(&new.arguments)?;
        self.builder.set_span(new.span);
        self.builder.emit(Op::Construct {
            dst,
            func,
            first_arg: this,
            argc,
        });
        Ok(dst)
    }

    /// Arguments go into consecutive registers right above `this`. Returns
    /// the argument count including `this`.
    fn compile_arguments(&mut self, arguments: &[Expression]) -> Result<u32, JsError> {
        for argument in arguments {
            let reg = self.builder.alloc_register();
            self.compile_expression(argument, Some(reg))?;
        }
        Ok(arguments.len() as u32 + 1)
    }
}

/// Property operand of a member access
#[derive(Debug, Clone, Copy)]
enum MemberKey {
    Named(ConstantIndex),
    Value(Register),
}

fn invalid_target(span: crate::lexer::Span) -> JsError {
    JsError::syntax_error(
        "Invalid left-hand side in assignment",
        span.line,
        span.column,
    )
}

/// Whether evaluating `expr` may write a variable
fn has_side_effects(expr: &Expression) -> bool {
    match expr {
        Expression::Assignment(_)
        | Expression::Update(_)
        | Expression::Call(_)
        | Expression::New(_) => true,
        Expression::Unary(unary) => {
            unary.operator == UnaryOp::Delete || has_side_effects(&unary.argument)
        }
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This(_)
        | Expression::Function(_) => false,
        Expression::Array(array) => array.elements.iter().flatten().any(has_side_effects),
        Expression::Object(object) => object.properties.iter().any(|p| has_side_effects(&p.value)),
        Expression::Binary(binary) => {
            has_side_effects(&binary.left) || has_side_effects(&binary.right)
        }
        Expression::Logical(logical) => {
            has_side_effects(&logical.left) || has_side_effects(&logical.right)
        }
        Expression::Conditional(cond) => {
            has_side_effects(&cond.test)
                || has_side_effects(&cond.consequent)
                || has_side_effects(&cond.alternate)
        }
        Expression::Sequence(seq) => seq.expressions.iter().any(has_side_effects),
        // getters do not exist, but a computed key may still assign
        Expression::Member(member) => {
            has_side_effects(&member.object)
                || matches!(&member.property, MemberProperty::Computed(p) if has_side_effects(p))
        }
    }
}
