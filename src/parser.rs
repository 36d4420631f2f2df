//! Parser for script source code
//!
//! Recursive descent for statements, precedence climbing for binary
//! operators. While parsing, the parser keeps a stack of scope collectors so
//! every program and function node leaves with its hoisted declarations and
//! feature flags already computed.

use std::rc::Rc;

use crate::ast::*;
use crate::error::JsError;
use crate::lexer::{Lexer, Span, Token, TokenKind};
use crate::prelude::FxHashSet;
use crate::string_dict::StringDict;
use crate::value::{JsString, number_to_string};

/// Declarations and flags gathered for the unit currently being parsed
#[derive(Default)]
struct ScopeCollector {
    vars: Vec<VarDeclaration>,
    var_names: FxHashSet<JsString>,
    functions: Vec<Rc<FunctionNode>>,
    features: CodeFeatures,
    constants: FxHashSet<String>,
}

impl ScopeCollector {
    fn declare_var(&mut self, name: &JsString, is_const: bool) {
        if self.var_names.insert(name.clone()) {
            self.vars.push(VarDeclaration {
                name: name.clone(),
                is_const,
            });
        }
    }

    fn note_constant(&mut self, key: String) {
        self.constants.insert(key);
    }

    fn finish(self) -> ScopeInfo {
        ScopeInfo {
            var_declarations: self.vars,
            function_declarations: self.functions,
            features: self.features,
            needed_constants: self.constants.len(),
        }
    }
}

/// Parser for script source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    /// Collector for the innermost function (or the program)
    scope: ScopeCollector,
    enclosing_scopes: Vec<ScopeCollector>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        let mut lexer = Lexer::new(source, string_dict);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::new(TokenKind::Eof, Span::default(), false),
            scope: ScopeCollector::default(),
            enclosing_scopes: Vec::new(),
        }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program, JsError> {
        let start = self.current.span;
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        let scope = std::mem::take(&mut self.scope).finish();
        Ok(Program {
            body,
            scope,
            span: start.to(self.previous.span),
        })
    }

    fn scope(&mut self) -> &mut ScopeCollector {
        &mut self.scope
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        match &self.current.kind {
            TokenKind::Var => Ok(Statement::Var(self.parse_var_statement(false)?)),
            TokenKind::Const => Ok(Statement::Var(self.parse_var_statement(true)?)),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block()?)),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => Ok(Statement::Break(self.parse_jump_statement()?)),
            TokenKind::Continue => Ok(Statement::Continue(self.parse_jump_statement()?)),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(Statement::Empty(span))
            }
            TokenKind::Debugger => {
                let span = self.current.span;
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Debugger(span))
            }
            _ => self.parse_expression_or_labeled_statement(),
        }
    }

    fn parse_block(&mut self) -> Result<BlockStatement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(BlockStatement {
            body,
            span: self.span_from(start),
        })
    }

    fn parse_var_statement(&mut self, is_const: bool) -> Result<VarStatement, JsError> {
        let start = self.current.span;
        self.advance(); // var / const

        let mut declarations = Vec::new();
        loop {
            declarations.push(self.parse_var_declarator(is_const, true)?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_semicolon()?;

        Ok(VarStatement {
            is_const,
            declarations,
            span: self.span_from(start),
        })
    }

    /// `allow_in` is false inside a `for (...;` initializer
    fn parse_var_declarator(
        &mut self,
        is_const: bool,
        allow_in: bool,
    ) -> Result<VarDeclarator, JsError> {
        let id = self.parse_binding_identifier()?;
        self.scope().declare_var(&id.name, is_const);

        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_assignment(allow_in)?)
        } else {
            None
        };

        Ok(VarDeclarator {
            span: id.span.to(self.previous.span),
            id,
            init,
        })
    }

    fn parse_function_declaration(&mut self) -> Result<Statement, JsError> {
        let function = Rc::new(self.parse_function(false)?);
        if let Some(name) = &function.name {
            let name = name.name.clone();
            let scope = self.scope();
            // function names are declared with the vars so they get a slot
            scope.declare_var(&name, false);
            scope.functions.push(Rc::clone(&function));
        }
        Ok(Statement::FunctionDeclaration(function))
    }

    fn parse_function(&mut self, is_expression: bool) -> Result<FunctionNode, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Function)?;

        let name = if self.check_identifier() {
            Some(self.parse_binding_identifier()?)
        } else if is_expression {
            None
        } else {
            return Err(self.unexpected_token("function name"));
        };

        self.require_token(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.parse_binding_identifier()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require_token(&TokenKind::RParen)?;

        self.scope.features.has_closures = true;
        let outer = std::mem::take(&mut self.scope);
        self.enclosing_scopes.push(outer);

        let body = self.parse_function_body();

        let outer = self.enclosing_scopes.pop().unwrap_or_default();
        let scope = std::mem::replace(&mut self.scope, outer).finish();
        let body = body?;

        Ok(FunctionNode {
            name,
            params,
            body,
            scope,
            is_expression,
            span: self.span_from(start),
        })
    }

    fn parse_function_body(&mut self) -> Result<Vec<Statement>, JsError> {
        self.require_token(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.require_token(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        self.require_token(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) || self.check(&TokenKind::Const) {
            let is_const = self.check(&TokenKind::Const);
            let var_start = self.current.span;
            self.advance();
            let first = self.parse_var_declarator(is_const, false)?;

            if self.match_token(&TokenKind::In) {
                let right = self.parse_expression(true)?;
                self.require_token(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Statement::ForIn(ForInStatement {
                    left: ForInTarget::Var(first),
                    right,
                    body,
                    span: self.span_from(start),
                }));
            }

            let mut declarations = vec![first];
            while self.match_token(&TokenKind::Comma) {
                declarations.push(self.parse_var_declarator(is_const, false)?);
            }
            Some(ForInit::Var(VarStatement {
                is_const,
                declarations,
                span: self.span_from(var_start),
            }))
        } else {
            let expression = self.parse_expression(false)?;
            if self.match_token(&TokenKind::In) {
                if !is_assignment_target(&expression) {
                    return Err(self.syntax_error_at(
                        "Invalid left-hand side in for-in",
                        expression.span(),
                    ));
                }
                let right = self.parse_expression(true)?;
                self.require_token(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Statement::ForIn(ForInStatement {
                    left: ForInTarget::Expression(expression),
                    right,
                    body,
                    span: self.span_from(start),
                }));
            }
            Some(ForInit::Expression(expression))
        };

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While(WhileStatement {
            test,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        let body = Box::new(self.parse_statement()?);
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression(true)?;
        self.require_token(&TokenKind::RParen)?;
        // a semicolon after do-while is always optional
        self.match_token(&TokenKind::Semicolon);
        Ok(Statement::DoWhile(DoWhileStatement {
            body,
            test,
            span: self.span_from(start),
        }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        self.require_token(&TokenKind::LParen)?;
        let discriminant = self.parse_expression(true)?;
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression(true)?)
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(self.syntax_error_at(
                        "More than one default clause in switch statement",
                        case_start,
                    ));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected_token("case or default"));
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase {
                test,
                consequent,
                span: self.span_from(case_start),
            });
        }
        self.require_token(&TokenKind::RBrace)?;

        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span: self.span_from(start),
        }))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        let block = self.parse_block()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span;
            self.advance();
            self.require_token(&TokenKind::LParen)?;
            let param = self.parse_binding_identifier()?;
            self.require_token(&TokenKind::RParen)?;
            let body = self.parse_block()?;
            Some(CatchClause {
                param,
                body,
                span: self.span_from(catch_start),
            })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.syntax_error_at("Missing catch or finally after try", start));
        }

        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        }))
    }

    fn parse_with_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        self.require_token(&TokenKind::LParen)?;
        let object = self.parse_expression(true)?;
        self.require_token(&TokenKind::RParen)?;
        self.scope().features.uses_with = true;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::With(WithStatement {
            object,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        if self.enclosing_scopes.is_empty() {
            return Err(self.syntax_error_at(
                "Return statements are only valid inside functions",
                start,
            ));
        }
        self.advance();
        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression(true)?)
        };
        self.expect_semicolon()?;
        Ok(Statement::Return(ReturnStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn parse_jump_statement(&mut self) -> Result<JumpStatement, JsError> {
        let start = self.current.span;
        self.advance();
        let label = if self.check_identifier() && !self.current.newline_before {
            Some(self.parse_binding_identifier()?)
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok(JumpStatement {
            label,
            span: self.span_from(start),
        })
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.advance();
        if self.current.newline_before {
            return Err(self.syntax_error_at("Illegal newline after throw", start));
        }
        let argument = self.parse_expression(true)?;
        self.expect_semicolon()?;
        Ok(Statement::Throw(ThrowStatement {
            argument,
            span: self.span_from(start),
        }))
    }

    fn parse_expression_or_labeled_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        let expression = self.parse_expression(true)?;

        if let Expression::Identifier(label) = &expression {
            if self.check(&TokenKind::Colon) {
                let label = label.clone();
                self.advance();
                let body = Box::new(self.parse_statement()?);
                return Ok(Statement::Labeled(LabeledStatement {
                    label,
                    body,
                    span: self.span_from(start),
                }));
            }
        }

        self.expect_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement {
            expression,
            span: self.span_from(start),
        }))
    }

    // ============ EXPRESSIONS ============

    /// Comma-separated expression list
    fn parse_expression(&mut self, allow_in: bool) -> Result<Expression, JsError> {
        let start = self.current.span;
        let first = self.parse_assignment(allow_in)?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.parse_assignment(allow_in)?);
        }
        Ok(Expression::Sequence(SequenceExpression {
            expressions,
            span: self.span_from(start),
        }))
    }

    fn parse_assignment(&mut self, allow_in: bool) -> Result<Expression, JsError> {
        let start = self.current.span;
        let target = self.parse_conditional(allow_in)?;

        let operator = match self.current.kind {
            TokenKind::Eq => AssignmentOp::Assign,
            TokenKind::PlusEq => AssignmentOp::AddAssign,
            TokenKind::MinusEq => AssignmentOp::SubAssign,
            TokenKind::StarEq => AssignmentOp::MulAssign,
            TokenKind::SlashEq => AssignmentOp::DivAssign,
            TokenKind::PercentEq => AssignmentOp::ModAssign,
            TokenKind::LtLtEq => AssignmentOp::LShiftAssign,
            TokenKind::GtGtEq => AssignmentOp::RShiftAssign,
            TokenKind::GtGtGtEq => AssignmentOp::URShiftAssign,
            TokenKind::AmpEq => AssignmentOp::BitAndAssign,
            TokenKind::PipeEq => AssignmentOp::BitOrAssign,
            TokenKind::CaretEq => AssignmentOp::BitXorAssign,
            _ => return Ok(target),
        };

        if !is_assignment_target(&target) {
            return Err(self.syntax_error_at("Invalid left-hand side in assignment", target.span()));
        }
        self.advance();
        let value = self.parse_assignment(allow_in)?;

        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            target: Box::new(target),
            value: Box::new(value),
            span: self.span_from(start),
        }))
    }

    fn parse_conditional(&mut self, allow_in: bool) -> Result<Expression, JsError> {
        let start = self.current.span;
        let test = self.parse_binary(0, allow_in)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment(true)?;
        self.require_token(&TokenKind::Colon)?;
        let alternate = self.parse_assignment(allow_in)?;
        Ok(Expression::Conditional(ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            span: self.span_from(start),
        }))
    }

    /// Precedence of the current token as a binary operator
    fn binary_precedence(&self, allow_in: bool) -> Option<(u8, BinaryOperator)> {
        use BinaryOperator::{Binary, Logical};
        Some(match self.current.kind {
            TokenKind::PipePipe => (1, Logical(LogicalOp::Or)),
            TokenKind::AmpAmp => (2, Logical(LogicalOp::And)),
            TokenKind::Pipe => (3, Binary(BinaryOp::BitOr)),
            TokenKind::Caret => (4, Binary(BinaryOp::BitXor)),
            TokenKind::Amp => (5, Binary(BinaryOp::BitAnd)),
            TokenKind::EqEq => (6, Binary(BinaryOp::Eq)),
            TokenKind::BangEq => (6, Binary(BinaryOp::NotEq)),
            TokenKind::EqEqEq => (6, Binary(BinaryOp::StrictEq)),
            TokenKind::BangEqEq => (6, Binary(BinaryOp::StrictNotEq)),
            TokenKind::Lt => (7, Binary(BinaryOp::Lt)),
            TokenKind::LtEq => (7, Binary(BinaryOp::LtEq)),
            TokenKind::Gt => (7, Binary(BinaryOp::Gt)),
            TokenKind::GtEq => (7, Binary(BinaryOp::GtEq)),
            TokenKind::Instanceof => (7, Binary(BinaryOp::Instanceof)),
            TokenKind::In if allow_in => (7, Binary(BinaryOp::In)),
            TokenKind::LtLt => (8, Binary(BinaryOp::LShift)),
            TokenKind::GtGt => (8, Binary(BinaryOp::RShift)),
            TokenKind::GtGtGt => (8, Binary(BinaryOp::URShift)),
            TokenKind::Plus => (9, Binary(BinaryOp::Add)),
            TokenKind::Minus => (9, Binary(BinaryOp::Sub)),
            TokenKind::Star => (10, Binary(BinaryOp::Mul)),
            TokenKind::Slash => (10, Binary(BinaryOp::Div)),
            TokenKind::Percent => (10, Binary(BinaryOp::Mod)),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_precedence: u8, allow_in: bool) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut left = self.parse_unary()?;

        while let Some((precedence, operator)) = self.binary_precedence(allow_in) {
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence, allow_in)?;
            let span = self.span_from(start);
            left = match operator {
                BinaryOperator::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                }),
                BinaryOperator::Logical(operator) => Expression::Logical(LogicalExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                }),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let argument = self.parse_unary()?;
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument: Box::new(argument),
                span: self.span_from(start),
            }));
        }

        let update = match self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance();
            let argument = self.parse_unary()?;
            if !is_assignment_target(&argument) {
                return Err(self.syntax_error_at(
                    "Invalid left-hand side in prefix operation",
                    argument.span(),
                ));
            }
            return Ok(Expression::Update(UpdateExpression {
                operator,
                prefix: true,
                argument: Box::new(argument),
                span: self.span_from(start),
            }));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let expression = self.parse_left_hand_side()?;

        if self.current.newline_before {
            return Ok(expression);
        }
        let operator = match self.current.kind {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expression),
        };
        if !is_assignment_target(&expression) {
            return Err(self.syntax_error_at(
                "Invalid left-hand side in postfix operation",
                expression.span(),
            ));
        }
        self.advance();
        Ok(Expression::Update(UpdateExpression {
            operator,
            prefix: false,
            argument: Box::new(expression),
            span: self.span_from(start),
        }))
    }

    /// Member, call and `new` expressions
    fn parse_left_hand_side(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expression = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };

        loop {
            match self.current.kind {
                TokenKind::Dot | TokenKind::LBracket => {
                    expression = self.parse_member_suffix(expression, start)?;
                }
                TokenKind::LParen => {
                    let arguments = self.parse_arguments()?;
                    if matches!(&expression, Expression::Identifier(id) if id.name == "eval") {
                        self.scope().features.uses_eval = true;
                    }
                    expression = Expression::Call(CallExpression {
                        callee: Box::new(expression),
                        arguments,
                        span: self.span_from(start),
                    });
                }
                _ => return Ok(expression),
            }
        }
    }

    fn parse_new_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.advance(); // new

        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        while matches!(self.current.kind, TokenKind::Dot | TokenKind::LBracket) {
            callee = self.parse_member_suffix(callee, start)?;
        }

        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };

        Ok(Expression::New(NewExpression {
            callee: Box::new(callee),
            arguments,
            span: self.span_from(start),
        }))
    }

    fn parse_member_suffix(
        &mut self,
        object: Expression,
        start: Span,
    ) -> Result<Expression, JsError> {
        if self.match_token(&TokenKind::Dot) {
            let property = self.parse_identifier_name()?;
            Ok(Expression::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Identifier(property),
                span: self.span_from(start),
            }))
        } else {
            self.require_token(&TokenKind::LBracket)?;
            let property = self.parse_expression(true)?;
            self.require_token(&TokenKind::RBracket)?;
            Ok(Expression::Member(MemberExpression {
                object: Box::new(object),
                property: MemberProperty::Computed(Box::new(property)),
                span: self.span_from(start),
            }))
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                arguments.push(self.parse_assignment(true)?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Expression, JsError> {
        let span = self.current.span;
        let kind = self.current.kind.clone();
        match kind {
            TokenKind::Number(n) => {
                self.advance();
                self.scope().note_constant(format!("n{}", n.to_bits()));
                Ok(literal(LiteralValue::Number(n), span))
            }
            TokenKind::String(s) => {
                self.advance();
                self.scope().note_constant(format!("s{}", s));
                Ok(literal(LiteralValue::String(s), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(literal(LiteralValue::Boolean(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(literal(LiteralValue::Boolean(false), span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(literal(LiteralValue::Null, span))
            }
            TokenKind::This => {
                self.advance();
                self.scope().features.uses_this = true;
                Ok(Expression::This(span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if name == "arguments" {
                    self.scope().features.uses_arguments = true;
                }
                Ok(Expression::Identifier(Identifier { name, span }))
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                let token = self.lexer.rescan_as_regexp(span);
                self.current = token;
                match self.current.kind.clone() {
                    TokenKind::RegExp(pattern, flags) => {
                        let span = self.current.span;
                        self.advance();
                        self.scope()
                            .note_constant(format!("r/{}/{}", pattern, flags));
                        Ok(literal(LiteralValue::RegExp { pattern, flags }, span))
                    }
                    _ => Err(self.syntax_error_at("Invalid regular expression: missing /", span)),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expression = self.parse_expression(true)?;
                self.require_token(&TokenKind::RParen)?;
                Ok(expression)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => {
                let function = self.parse_function(true)?;
                Ok(Expression::Function(Rc::new(function)))
            }
            _ => Err(self.unexpected_token("expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        loop {
            if self.match_token(&TokenKind::RBracket) {
                break;
            }
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_assignment(true)?));
            if !self.check(&TokenKind::RBracket) {
                self.require_token(&TokenKind::Comma)?;
            }
        }
        Ok(Expression::Array(ArrayExpression {
            elements,
            span: self.span_from(start),
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let prop_start = self.current.span;
            let key = match self.current.kind.clone() {
                TokenKind::String(s) => {
                    self.advance();
                    s
                }
                TokenKind::Number(n) => {
                    self.advance();
                    JsString::from(number_to_string(n))
                }
                _ => self.parse_identifier_name()?.name,
            };
            self.require_token(&TokenKind::Colon)?;
            let value = self.parse_assignment(true)?;
            properties.push(ObjectProperty {
                key,
                value,
                span: self.span_from(prop_start),
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(Expression::Object(ObjectExpression {
            properties,
            span: self.span_from(start),
        }))
    }

    // ============ HELPERS ============

    fn parse_binding_identifier(&mut self) -> Result<Identifier, JsError> {
        match self.current.kind.clone() {
            TokenKind::Identifier(name) => {
                let span = self.current.span;
                self.advance();
                Ok(Identifier { name, span })
            }
            _ => Err(self.unexpected_token("identifier")),
        }
    }

    /// Identifier after `.` or as an object key, where keywords are allowed
    fn parse_identifier_name(&mut self) -> Result<Identifier, JsError> {
        let span = self.current.span;
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            other => match other.keyword_text() {
                Some(text) => self.lexer.string_dict().get_or_insert(text),
                None => return Err(self.unexpected_token("property name")),
            },
        };
        self.advance();
        Ok(Identifier { name, span })
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), JsError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&token_description(kind)))
        }
    }

    fn at_statement_end(&self) -> bool {
        self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.current.newline_before
    }

    fn expect_semicolon(&mut self) -> Result<(), JsError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }

        // ASI: accept at end of input, before }, or after a line terminator
        if self.is_at_end() || self.check(&TokenKind::RBrace) || self.current.newline_before {
            return Ok(());
        }

        Err(self.unexpected_token("';'"))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.previous.span)
    }

    fn unexpected_token(&self, expected: &str) -> JsError {
        let found = match &self.current.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::UnterminatedString => "unterminated string literal".to_string(),
            TokenKind::Invalid(c) => format!("invalid character '{}'", c),
            other => format!("token {}", token_description(other)),
        };
        JsError::syntax_error(
            format!("Unexpected {}, expected {}", found, expected),
            self.current.span.line,
            self.current.span.column,
        )
    }

    fn syntax_error_at(&self, message: &str, span: Span) -> JsError {
        JsError::syntax_error(message, span.line, span.column)
    }
}

enum BinaryOperator {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn literal(value: LiteralValue, span: Span) -> Expression {
    Expression::Literal(Literal { value, span })
}

fn is_assignment_target(expression: &Expression) -> bool {
    matches!(expression, Expression::Identifier(_) | Expression::Member(_))
}

fn token_description(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Identifier(name) => format!("'{}'", name),
        TokenKind::Number(n) => format!("'{}'", number_to_string(*n)),
        TokenKind::String(s) => format!("\"{}\"", s),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::LBrace => "'{'".to_string(),
        TokenKind::RBrace => "'}'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::Semicolon => "';'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Comma => "','".to_string(),
        other => match other.keyword_text() {
            Some(text) => format!("'{}'", text),
            None => format!("{:?}", other),
        },
    }
}

/// Parse `source` into a program using a fresh string dictionary
pub fn parse(source: &str) -> Result<Program, JsError> {
    let mut dict = StringDict::new();
    Parser::new(source, &mut dict).parse_program()
}
