//! Debugger event delivery

use std::cell::RefCell;
use std::rc::Rc;

use regjs::{Debugger, DebuggerCallFrame, JsValue, Runtime, VmConfig};

#[derive(Default)]
struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn push(&self, kind: &str, frame: &DebuggerCallFrame) {
        let name = frame
            .function_name
            .as_ref()
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        self.events
            .borrow_mut()
            .push(format!("{} {} {}", kind, name, frame.line));
    }
}

impl Debugger for Recorder {
    fn will_execute_program(&mut self, frame: &DebuggerCallFrame) {
        self.push("program", frame);
    }
    fn did_execute_program(&mut self, frame: &DebuggerCallFrame) {
        self.push("program-done", frame);
    }
    fn did_enter_call_frame(&mut self, frame: &DebuggerCallFrame) {
        self.push("enter", frame);
    }
    fn will_leave_call_frame(&mut self, frame: &DebuggerCallFrame) {
        self.push("leave", frame);
    }
    fn will_execute_statement(&mut self, frame: &DebuggerCallFrame) {
        self.push("stmt", frame);
    }
    fn did_reach_breakpoint(&mut self, frame: &DebuggerCallFrame) {
        self.push("break", frame);
    }
    fn exception(&mut self, frame: &DebuggerCallFrame, _value: &JsValue) {
        self.push("throw", frame);
    }
}

fn recording_runtime(debug_hooks: bool) -> (Runtime, Rc<RefCell<Vec<String>>>) {
    let mut runtime = Runtime::with_config(VmConfig {
        debug_hooks,
        ..VmConfig::default()
    });
    let recorder = Recorder::default();
    let events = Rc::clone(&recorder.events);
    runtime.set_debugger(Some(Box::new(recorder)));
    (runtime, events)
}

#[test]
fn test_debugger_statement_without_hooks() {
    let (mut runtime, events) = recording_runtime(false);
    runtime.eval("var a = 1;\ndebugger;\na").unwrap();
    assert_eq!(*events.borrow(), vec!["break - 2".to_string()]);
}

#[test]
fn test_statement_and_frame_hooks() {
    let (mut runtime, events) = recording_runtime(true);
    runtime
        .eval("function f() {\n  return 1;\n}\nf();")
        .unwrap();
    let events = events.borrow();
    assert_eq!(events.first().map(String::as_str), Some("program - 1"));
    assert!(events.contains(&"enter f 1".to_string()), "{:?}", events);
    assert!(events.contains(&"stmt f 2".to_string()), "{:?}", events);
    assert!(events.iter().any(|e| e.starts_with("leave f")), "{:?}", events);
    assert!(events.contains(&"stmt - 4".to_string()), "{:?}", events);
    assert!(events.last().is_some_and(|e| e.starts_with("program-done")), "{:?}", events);
}

#[test]
fn test_enter_and_leave_are_balanced() {
    let (mut runtime, events) = recording_runtime(true);
    runtime
        .eval("function g(n) { return n ? g(n - 1) : 0; } g(3);")
        .unwrap();
    let events = events.borrow();
    let enters = events.iter().filter(|e| e.starts_with("enter g")).count();
    let leaves = events.iter().filter(|e| e.starts_with("leave g")).count();
    assert_eq!(enters, 4);
    assert_eq!(leaves, 4);
}

#[test]
fn test_exception_events() {
    let (mut runtime, events) = recording_runtime(false);
    runtime
        .eval("try {\n  throw 'x';\n} catch (e) {}")
        .unwrap();
    assert_eq!(*events.borrow(), vec!["throw - 2".to_string()]);
}

#[test]
fn test_removing_the_debugger() {
    let (mut runtime, events) = recording_runtime(false);
    runtime.set_debugger(None);
    runtime.eval("debugger;").unwrap();
    assert!(events.borrow().is_empty());
}
