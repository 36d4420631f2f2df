//! The register file
//!
//! One growable array of slots shared by every frame of an interpreter.
//! Frames are windows into it addressed by an absolute frame pointer;
//! registers are signed offsets from that pointer. Most slots hold values,
//! the call frame header slots hold caller state.

use std::rc::Rc;

use super::scope_chain::ScopeChain;
use crate::compiler::{CodeBlock, Register};
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::value::{CheapClone, JsValue};

pub enum Slot {
    Value(JsValue),
    Code(Option<Rc<CodeBlock>>),
    Scope(ScopeChain),
    Position(usize),
    Register(Register),
    Flag(bool),
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Value(JsValue::Undefined)
    }
}

pub struct RegisterFile {
    slots: Vec<Slot>,
    /// End of the window of the innermost frame
    top: usize,
    max_slots: usize,
}

impl RegisterFile {
    pub fn new(max_slots: usize) -> Self {
        Self {
            slots: Vec::with_capacity(1024.min(max_slots)),
            top: 0,
            max_slots,
        }
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.top
    }

    /// Move the top, growing the file when needed. Fails with a stack
    /// overflow past the configured limit.
    pub fn set_top(&mut self, top: usize) -> Result<(), JsError> {
        self.ensure(top)?;
        self.top = top;
        Ok(())
    }

    /// Make sure slots `0..end` exist
    pub fn ensure(&mut self, end: usize) -> Result<(), JsError> {
        if end > self.max_slots {
            return Err(JsError::stack_overflow());
        }
        if end > self.slots.len() {
            self.slots.resize_with(end, Slot::default);
        }
        Ok(())
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn set_max_slots(&mut self, max_slots: usize) {
        self.max_slots = max_slots;
    }

    /// Absolute position of register `reg` of the frame at `fp`
    #[inline]
    pub fn position(fp: usize, reg: Register) -> Result<usize, JsError> {
        fp.checked_add_signed(reg as isize)
            .ok_or_else(|| JsError::internal_error(format!("register {} below file start", reg)))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Result<&JsValue, JsError> {
        match self.slots.get(index) {
            Some(Slot::Value(value)) => Ok(value),
            Some(_) => Err(JsError::internal_error(format!(
                "slot {} does not hold a value",
                index
            ))),
            None => Err(out_of_bounds(index)),
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: JsValue) -> Result<(), JsError> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Slot::Value(value);
                Ok(())
            }
            None => Err(out_of_bounds(index)),
        }
    }

    /// Read register `reg` of the frame at `fp`
    #[inline]
    pub fn read(&self, fp: usize, reg: Register) -> Result<JsValue, JsError> {
        self.get(Self::position(fp, reg)?).map(CheapClone::cheap_clone)
    }

    #[inline]
    pub fn write(&mut self, fp: usize, reg: Register, value: JsValue) -> Result<(), JsError> {
        self.set(Self::position(fp, reg)?, value)
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, JsError> {
        self.slots.get(index).ok_or_else(|| out_of_bounds(index))
    }

    pub fn set_slot(&mut self, index: usize, slot: Slot) -> Result<(), JsError> {
        match self.slots.get_mut(index) {
            Some(existing) => {
                *existing = slot;
                Ok(())
            }
            None => Err(out_of_bounds(index)),
        }
    }

    /// Copy `len` slots from `from` to `to`; the ranges may overlap
    pub fn copy_values(&mut self, from: usize, to: usize, len: usize) -> Result<(), JsError> {
        self.ensure(to + len)?;
        let values: Vec<JsValue> = (from..from + len)
            .map(|i| self.get(i).map(CheapClone::cheap_clone))
            .collect::<Result<_, _>>()?;
        for (offset, value) in values.into_iter().enumerate() {
            self.set(to + offset, value)?;
        }
        Ok(())
    }

    /// Reset `start..end` to `undefined`
    pub fn clear(&mut self, start: usize, end: usize) -> Result<(), JsError> {
        self.ensure(end)?;
        for slot in self.slots.iter_mut().take(end).skip(start) {
            *slot = Slot::default();
        }
        Ok(())
    }

    /// Values in `start..start+len`
    pub fn values(&self, start: usize, len: usize) -> Result<Vec<JsValue>, JsError> {
        (start..start + len)
            .map(|i| self.get(i).map(CheapClone::cheap_clone))
            .collect()
    }

    /// Objects referenced from the live part of the file
    pub fn roots(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.slots.iter().take(self.top).flat_map(|slot| {
            let objects: Vec<ObjectRef> = match slot {
                Slot::Value(JsValue::Object(obj)) => vec![*obj],
                Slot::Scope(chain) => chain.objects().collect(),
                _ => Vec::new(),
            };
            objects
        })
    }
}

fn out_of_bounds(index: usize) -> JsError {
    JsError::internal_error(format!("register file slot {} out of bounds", index))
}
