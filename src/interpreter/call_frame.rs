//! Call frame header
//!
//! Every frame has a fixed header of `CALL_FRAME_HEADER_SIZE` slots right
//! below its locals. The call instruction writes it; return and unwind read
//! it back once.

use std::rc::Rc;

use super::register_file::{RegisterFile, Slot};
use super::scope_chain::ScopeChain;
use crate::compiler::bytecode::CALL_FRAME_HEADER_SIZE;
use crate::compiler::{CodeBlock, Register};
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::value::JsValue;

pub const HEADER_SIZE: usize = CALL_FRAME_HEADER_SIZE as usize;

/// Frame pointer value meaning "no frame below"
pub const NO_FRAME: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
enum HeaderSlot {
    CallerCodeBlock = 0,
    ReturnIp,
    CallerScopeChain,
    CallerFrame,
    ReturnValueRegister,
    ArgumentStart,
    ArgumentCount,
    CalledAsConstructor,
    Callee,
    OptionalActivation,
    OptionalArguments,
    ScopeBaseDepth,
}

#[inline]
fn slot_index(fp: usize, slot: HeaderSlot) -> Result<usize, JsError> {
    (fp + slot as usize)
        .checked_sub(HEADER_SIZE)
        .ok_or_else(|| JsError::internal_error("call frame header below file start"))
}

#[derive(Clone)]
pub struct CallFrameHeader {
    /// `None` for a frame entered from native code or the host
    pub caller_code: Option<Rc<CodeBlock>>,
    pub return_ip: usize,
    pub caller_scope: ScopeChain,
    pub caller_fp: usize,
    pub return_register: Register,
    /// Absolute position of the `this` argument as passed by the caller
    pub argument_start: usize,
    /// Arguments as passed, including `this`
    pub argument_count: usize,
    pub called_as_constructor: bool,
    pub callee: Option<ObjectRef>,
    pub activation: Option<ObjectRef>,
    pub arguments: Option<ObjectRef>,
    /// Scope chain depth when the frame's code started running
    pub scope_base_depth: u32,
}

fn object_slot(obj: Option<ObjectRef>) -> Slot {
    Slot::Value(obj.map_or(JsValue::Undefined, JsValue::Object))
}

fn corrupt(fp: usize) -> JsError {
    JsError::internal_error(format!("corrupt call frame header at {}", fp))
}

impl CallFrameHeader {
    pub fn write(self, file: &mut RegisterFile, fp: usize) -> Result<(), JsError> {
        let slots = [
            (HeaderSlot::CallerCodeBlock, Slot::Code(self.caller_code)),
            (HeaderSlot::ReturnIp, Slot::Position(self.return_ip)),
            (HeaderSlot::CallerScopeChain, Slot::Scope(self.caller_scope)),
            (HeaderSlot::CallerFrame, Slot::Position(self.caller_fp)),
            (HeaderSlot::ReturnValueRegister, Slot::Register(self.return_register)),
            (HeaderSlot::ArgumentStart, Slot::Position(self.argument_start)),
            (HeaderSlot::ArgumentCount, Slot::Position(self.argument_count)),
            (HeaderSlot::CalledAsConstructor, Slot::Flag(self.called_as_constructor)),
            (HeaderSlot::Callee, object_slot(self.callee)),
            (HeaderSlot::OptionalActivation, object_slot(self.activation)),
            (HeaderSlot::OptionalArguments, object_slot(self.arguments)),
            (
                HeaderSlot::ScopeBaseDepth,
                Slot::Position(self.scope_base_depth as usize),
            ),
        ];
        for (which, slot) in slots {
            file.set_slot(slot_index(fp, which)?, slot)?;
        }
        Ok(())
    }

    pub fn read(file: &RegisterFile, fp: usize) -> Result<Self, JsError> {
        let position = |which| -> Result<usize, JsError> {
            match file.slot(slot_index(fp, which)?)? {
                Slot::Position(p) => Ok(*p),
                _ => Err(corrupt(fp)),
            }
        };
        let object = |which| -> Result<Option<ObjectRef>, JsError> {
            match file.slot(slot_index(fp, which)?)? {
                Slot::Value(JsValue::Object(obj)) => Ok(Some(*obj)),
                Slot::Value(_) => Ok(None),
                _ => Err(corrupt(fp)),
            }
        };

        let caller_code = match file.slot(slot_index(fp, HeaderSlot::CallerCodeBlock)?)? {
            Slot::Code(code) => code.clone(),
            _ => return Err(corrupt(fp)),
        };
        let caller_scope = match file.slot(slot_index(fp, HeaderSlot::CallerScopeChain)?)? {
            Slot::Scope(chain) => chain.clone(),
            _ => return Err(corrupt(fp)),
        };
        let return_register = match file.slot(slot_index(fp, HeaderSlot::ReturnValueRegister)?)? {
            Slot::Register(reg) => *reg,
            _ => return Err(corrupt(fp)),
        };
        let called_as_constructor =
            match file.slot(slot_index(fp, HeaderSlot::CalledAsConstructor)?)? {
                Slot::Flag(flag) => *flag,
                _ => return Err(corrupt(fp)),
            };

        Ok(Self {
            caller_code,
            return_ip: position(HeaderSlot::ReturnIp)?,
            caller_scope,
            caller_fp: position(HeaderSlot::CallerFrame)?,
            return_register,
            argument_start: position(HeaderSlot::ArgumentStart)?,
            argument_count: position(HeaderSlot::ArgumentCount)?,
            called_as_constructor,
            callee: object(HeaderSlot::Callee)?,
            activation: object(HeaderSlot::OptionalActivation)?,
            arguments: object(HeaderSlot::OptionalArguments)?,
            scope_base_depth: position(HeaderSlot::ScopeBaseDepth)? as u32,
        })
    }

    pub fn read_callee(file: &RegisterFile, fp: usize) -> Result<Option<ObjectRef>, JsError> {
        match file.slot(slot_index(fp, HeaderSlot::Callee)?)? {
            Slot::Value(JsValue::Object(obj)) => Ok(Some(*obj)),
            Slot::Value(_) => Ok(None),
            _ => Err(corrupt(fp)),
        }
    }

    pub fn read_caller_fp(file: &RegisterFile, fp: usize) -> Result<usize, JsError> {
        match file.slot(slot_index(fp, HeaderSlot::CallerFrame)?)? {
            Slot::Position(p) => Ok(*p),
            _ => Err(corrupt(fp)),
        }
    }

    pub fn read_scope_base_depth(file: &RegisterFile, fp: usize) -> Result<u32, JsError> {
        match file.slot(slot_index(fp, HeaderSlot::ScopeBaseDepth)?)? {
            Slot::Position(p) => Ok(*p as u32),
            _ => Err(corrupt(fp)),
        }
    }

    pub fn set_activation(
        file: &mut RegisterFile,
        fp: usize,
        obj: ObjectRef,
    ) -> Result<(), JsError> {
        file.set_slot(
            slot_index(fp, HeaderSlot::OptionalActivation)?,
            object_slot(Some(obj)),
        )
    }

    pub fn set_arguments(
        file: &mut RegisterFile,
        fp: usize,
        obj: ObjectRef,
    ) -> Result<(), JsError> {
        file.set_slot(
            slot_index(fp, HeaderSlot::OptionalArguments)?,
            object_slot(Some(obj)),
        )
    }

    pub fn set_scope_base_depth(
        file: &mut RegisterFile,
        fp: usize,
        depth: u32,
    ) -> Result<(), JsError> {
        file.set_slot(
            slot_index(fp, HeaderSlot::ScopeBaseDepth)?,
            Slot::Position(depth as usize),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn header_survives_a_write_read_cycle() {
        let mut file = RegisterFile::new(128);
        file.set_top(64).unwrap_or_else(|e| panic!("{e}"));
        let header = CallFrameHeader {
            caller_code: None,
            return_ip: 17,
            caller_scope: ScopeChain::new(),
            caller_fp: NO_FRAME,
            return_register: -4,
            argument_start: 3,
            argument_count: 2,
            called_as_constructor: true,
            callee: None,
            activation: None,
            arguments: None,
            scope_base_depth: 5,
        };
        let fp = 3 + 2 + HEADER_SIZE;
        header.write(&mut file, fp).unwrap_or_else(|e| panic!("{e}"));

        let read = CallFrameHeader::read(&file, fp).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(read.return_ip, 17);
        assert_eq!(read.caller_fp, NO_FRAME);
        assert_eq!(read.return_register, -4);
        assert_eq!(read.argument_start, 3);
        assert_eq!(read.argument_count, 2);
        assert!(read.called_as_constructor);
        assert_eq!(read.scope_base_depth, 5);
        assert!(read.caller_code.is_none());
    }

    #[test]
    fn reading_a_value_slot_as_header_is_an_internal_error() {
        let mut file = RegisterFile::new(32);
        file.set_top(32).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            CallFrameHeader::read(&file, HEADER_SIZE),
            Err(JsError::Internal(_))
        ));
    }
}
