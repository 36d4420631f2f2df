//! Exception unwinding
//!
//! A thrown value is first tagged with the position of the throw, then the
//! handler tables are searched from the throwing frame outwards. Frames
//! without a handler are popped. When the entry frame of the current `run`
//! is popped the exception becomes the `Err` of that run.

use super::Interpreter;
use super::bytecode_vm::ExecState;
use super::call_frame::CallFrameHeader;
use crate::error::{JsError, SourceLocation};
use crate::object::{ExoticObject, PropertyAttributes};
use crate::value::{JsString, JsValue, PropertyKey};

impl Interpreter {
    /// Route `error` to the innermost handler. Returns `Ok` with `state`
    /// positioned at the handler, or the error that ends this `run`.
    pub(super) fn unwind(&mut self, state: &mut ExecState, error: JsError) -> Result<(), JsError> {
        if !error.is_catchable() {
            tracing::debug!(error = %error, "abandoning script frames");
            self.abandon_frames(state)?;
            return Err(error);
        }

        let value = self.error_to_value(error);
        self.note_throw(state, &value)?;

        loop {
            let throw_ip = state.ip.saturating_sub(1);
            if let Some(handler) = state.code.handler_for(throw_ip).copied() {
                let base = CallFrameHeader::read_scope_base_depth(&self.registers, state.fp)?;
                state.scope = state.scope.truncate(base + handler.scope_depth);
                state.ip = handler.target as usize;
                self.exception = Some(value);
                tracing::trace!(target = handler.target, "exception caught");
                return Ok(());
            }

            tracing::trace!(fp = state.fp, "unwinding frame");
            let header = self.pop_frame(state.fp)?;
            match header.caller_code {
                Some(code) => {
                    let caller_fp = header.caller_fp;
                    self.registers
                        .set_top(caller_fp + code.num_callee_registers as usize)?;
                    *state = ExecState {
                        code,
                        ip: header.return_ip,
                        fp: caller_fp,
                        scope: header.caller_scope,
                    };
                    self.current_fp = caller_fp;
                }
                None => {
                    self.registers.set_top(header.argument_start)?;
                    self.current_fp = header.caller_fp;
                    return Err(self.uncaught(value));
                }
            }
        }
    }

    /// Pop every frame of this run without looking for handlers
    fn abandon_frames(&mut self, state: &mut ExecState) -> Result<(), JsError> {
        loop {
            let header = self.pop_frame(state.fp)?;
            match header.caller_code {
                Some(code) => {
                    state.fp = header.caller_fp;
                    state.code = code;
                }
                None => {
                    self.registers.set_top(header.argument_start)?;
                    self.current_fp = header.caller_fp;
                    return Ok(());
                }
            }
        }
    }

    /// The script value a caught error is bound to
    pub(crate) fn error_to_value(&mut self, error: JsError) -> JsValue {
        match error {
            JsError::Exception { value, .. } => value,
            other => {
                let name = other.error_name().unwrap_or("Error");
                let message = other.script_message();
                JsValue::Object(self.create_error(name, &message))
            }
        }
    }

    /// Record where `value` was thrown. Objects get the position attached as
    /// properties the first time they are thrown; properties the object
    /// already carries are kept.
    fn note_throw(&mut self, state: &ExecState, value: &JsValue) -> Result<(), JsError> {
        let throw_ip = state.ip.saturating_sub(1);
        let span = state.code.span_at(throw_ip).unwrap_or(state.code.span);
        let source = state.code.source.clone();

        let mut fresh = true;
        if let JsValue::Object(obj) = value {
            let object = self.heap.get_mut(*obj)?;
            fresh = !object.exception_info;
            if fresh {
                object.exception_info = true;
                let url = source
                    .url
                    .clone()
                    .map_or(JsValue::Undefined, JsValue::String);
                let info = [
                    ("line", JsValue::number(f64::from(span.line))),
                    ("sourceId", JsValue::number(f64::from(source.id))),
                    ("sourceURL", url),
                    ("expressionBeginOffset", JsValue::number(span.start as f64)),
                    ("expressionCaretOffset", JsValue::number(span.start as f64)),
                    ("expressionEndOffset", JsValue::number(span.end as f64)),
                ];
                for (name, property) in info {
                    let key = PropertyKey::from(name);
                    if object.get_own_property(&key).is_none() {
                        object.define(key, property, PropertyAttributes::DONT_ENUM);
                    }
                }
            }
        }
        if fresh {
            self.last_throw_location = Some(SourceLocation {
                source_url: source.url.as_ref().map(ToString::to_string),
                line: span.line,
                column: span.column,
            });
        }

        #[cfg(feature = "debugger")]
        if self.debugger.is_some() {
            let frame = self.debugger_frame(state, span.line);
            if let Some(debugger) = self.debugger.as_mut() {
                debugger.exception(&frame, value);
            }
        }
        Ok(())
    }

    /// The host-facing error for a value nobody caught
    fn uncaught(&mut self, value: JsValue) -> JsError {
        let message = self.exception_message(&value);
        tracing::debug!(%message, "uncaught exception");
        JsError::Exception {
            value,
            message,
            location: self.last_throw_location.clone(),
        }
    }

    /// `Name: message` for error objects, the string conversion otherwise.
    /// Only data properties are read so no script runs.
    pub(crate) fn exception_message(&mut self, value: &JsValue) -> String {
        let JsValue::Object(obj) = value else {
            return value.primitive_to_string().to_string();
        };
        let is_error = matches!(
            self.heap.get(*obj).map(|o| &o.exotic),
            Ok(ExoticObject::Error)
        );
        if !is_error {
            return self.describe_value(value);
        }
        let name = self.string_property(*obj, "name").unwrap_or_else(|| JsString::from("Error"));
        match self.string_property(*obj, "message") {
            Some(message) if !message.is_empty() => format!("{}: {}", name, message),
            _ => name.to_string(),
        }
    }

    fn string_property(&mut self, obj: crate::gc::ObjectRef, name: &str) -> Option<JsString> {
        match self.get_property(obj, &PropertyKey::from(name)).ok()? {
            JsValue::Object(_) => None,
            JsValue::Undefined => None,
            other => Some(other.primitive_to_string()),
        }
    }
}
