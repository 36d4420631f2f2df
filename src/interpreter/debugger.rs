//! Debugger notifications
//!
//! Code compiled with debug hooks carries `Debug` instructions at program
//! boundaries, function entry and exit, and before each statement. When a
//! [`Debugger`] is installed the dispatch loop reports each of them together
//! with a snapshot of the current frame.

use crate::compiler::{CodeType, DebugHook};
use crate::value::{JsString, JsValue};

/// Where execution currently is
#[derive(Debug, Clone)]
pub struct DebuggerCallFrame {
    pub function_name: Option<JsString>,
    pub code_type: CodeType,
    pub source_id: u32,
    pub source_url: Option<JsString>,
    pub line: u32,
}

/// Receiver of execution events. Every method defaults to doing nothing.
pub trait Debugger {
    fn will_execute_program(&mut self, _frame: &DebuggerCallFrame) {}
    fn did_execute_program(&mut self, _frame: &DebuggerCallFrame) {}
    fn did_enter_call_frame(&mut self, _frame: &DebuggerCallFrame) {}
    fn will_leave_call_frame(&mut self, _frame: &DebuggerCallFrame) {}
    fn will_execute_statement(&mut self, _frame: &DebuggerCallFrame) {}
    fn did_reach_breakpoint(&mut self, _frame: &DebuggerCallFrame) {}
    /// A value was thrown at `frame`, before any handler runs
    fn exception(&mut self, _frame: &DebuggerCallFrame, _value: &JsValue) {}
}

pub(crate) fn dispatch_hook(
    debugger: &mut dyn Debugger,
    hook: DebugHook,
    frame: &DebuggerCallFrame,
) {
    match hook {
        DebugHook::WillExecuteProgram => debugger.will_execute_program(frame),
        DebugHook::DidExecuteProgram => debugger.did_execute_program(frame),
        DebugHook::DidEnterCallFrame => debugger.did_enter_call_frame(frame),
        DebugHook::WillLeaveCallFrame => debugger.will_leave_call_frame(frame),
        DebugHook::WillExecuteStatement => debugger.will_execute_statement(frame),
        DebugHook::DidReachBreakpoint => debugger.did_reach_breakpoint(frame),
    }
}
