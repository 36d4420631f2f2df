//! Heap object model
//!
//! Every object is a [`JsObject`]: a prototype link, an ordered property map
//! and an [`ExoticObject`] payload for the kinds that need more than plain
//! properties (array elements, function code, activation storage and so
//! on). Prototype walks and anything that needs the register file live in
//! the interpreter; this module only knows about a single object.

use std::rc::Rc;

use crate::compiler::CodeBlock;
use crate::error::JsError;
use crate::gc::{ObjectRef, Trace, Tracer};
use crate::interpreter::Interpreter;
use crate::interpreter::scope_chain::ScopeChain;
use crate::prelude::{IndexMap, index_map_new};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey, to_uint32};

/// Signature of a built-in function
pub type NativeFn = fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError>;

/// Array writes further than this past the dense end go to the property map
const MAX_DENSE_GAP: usize = 1024;

/// Property attribute flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyAttributes(u8);

impl PropertyAttributes {
    pub const NONE: Self = Self(0);
    pub const READ_ONLY: Self = Self(1);
    pub const DONT_ENUM: Self = Self(2);
    pub const DONT_DELETE: Self = Self(4);
    /// Attributes of built-in methods and constants
    pub const BUILTIN: Self = Self(2);
    pub const FROZEN: Self = Self(7);

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn read_only(self) -> bool {
        self.0 & Self::READ_ONLY.0 != 0
    }

    pub fn enumerable(self) -> bool {
        self.0 & Self::DONT_ENUM.0 == 0
    }

    pub fn deletable(self) -> bool {
        self.0 & Self::DONT_DELETE.0 == 0
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub value: JsValue,
    pub attributes: PropertyAttributes,
}

impl Property {
    pub fn new(value: JsValue, attributes: PropertyAttributes) -> Self {
        Self { value, attributes }
    }
}

/// Dense element storage of an array; `None` is a hole
#[derive(Debug, Clone, Default)]
pub struct ArrayStorage {
    pub elements: Vec<Option<JsValue>>,
    pub length: u32,
}

pub enum FunctionKind {
    Script {
        code: Rc<CodeBlock>,
        scope: ScopeChain,
    },
    Native {
        call: NativeFn,
        /// `new` behavior; `None` means not a constructor
        construct: Option<NativeFn>,
        name: JsString,
    },
}

/// Variable storage of an activation
#[derive(Debug, Clone)]
pub enum ActivationStorage {
    /// Values still live in the register file of the frame at `fp`
    Live { fp: usize },
    /// Snapshot taken when the frame returned, in symbol table order
    TornOff(Vec<JsValue>),
}

pub struct Activation {
    pub code: Rc<CodeBlock>,
    pub storage: ActivationStorage,
}

/// State of a `for-in` loop
pub struct PropertyIterator {
    pub object: Option<ObjectRef>,
    pub names: Vec<JsString>,
    pub position: usize,
}

pub struct RegExpData {
    pub source: JsString,
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
    #[cfg(feature = "regex")]
    pub regex: fancy_regex::Regex,
}

pub enum ExoticObject {
    Ordinary,
    Array(ArrayStorage),
    Function(FunctionKind),
    Error,
    Boolean(bool),
    Number(f64),
    String(JsString),
    RegExp(Box<RegExpData>),
    Arguments,
    Activation(Activation),
    /// Single-binding scope for catch parameters and function names
    StaticScope,
    PropertyIterator(PropertyIterator),
    Global,
}

pub struct JsObject {
    pub prototype: Option<ObjectRef>,
    pub properties: IndexMap<PropertyKey, Property>,
    pub exotic: ExoticObject,
    /// Source position properties were attached when first thrown
    pub exception_info: bool,
}

impl JsObject {
    pub fn new(prototype: Option<ObjectRef>, exotic: ExoticObject) -> Self {
        Self {
            prototype,
            properties: index_map_new(),
            exotic,
            exception_info: false,
        }
    }

    pub fn ordinary(prototype: Option<ObjectRef>) -> Self {
        Self::new(prototype, ExoticObject::Ordinary)
    }

    /// Value of `[[Class]]`, used by `Object.prototype.toString`
    pub fn class_name(&self) -> &'static str {
        match &self.exotic {
            ExoticObject::Ordinary
            | ExoticObject::PropertyIterator(_)
            | ExoticObject::StaticScope => "Object",
            ExoticObject::Array(_) => "Array",
            ExoticObject::Function(_) => "Function",
            ExoticObject::Error => "Error",
            ExoticObject::Boolean(_) => "Boolean",
            ExoticObject::Number(_) => "Number",
            ExoticObject::String(_) => "String",
            ExoticObject::RegExp(_) => "RegExp",
            ExoticObject::Arguments => "Arguments",
            ExoticObject::Activation(_) => "Activation",
            ExoticObject::Global => "global",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    pub fn is_constructor(&self) -> bool {
        match &self.exotic {
            ExoticObject::Function(FunctionKind::Script { .. }) => true,
            ExoticObject::Function(FunctionKind::Native { construct, .. }) => construct.is_some(),
            _ => false,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.exotic, ExoticObject::Array(_))
    }

    pub fn array(&self) -> Option<&ArrayStorage> {
        match &self.exotic {
            ExoticObject::Array(storage) => Some(storage),
            _ => None,
        }
    }

    /// Own property lookup, covering array elements and string wrapper
    /// characters
    pub fn get_own(&self, key: &PropertyKey) -> Option<JsValue> {
        self.get_own_property(key).map(|(value, _)| value)
    }

    pub fn get_own_property(&self, key: &PropertyKey) -> Option<(JsValue, PropertyAttributes)> {
        match (&self.exotic, key) {
            (ExoticObject::Array(storage), PropertyKey::Index(i)) => {
                if let Some(Some(value)) = storage.elements.get(*i as usize) {
                    return Some((value.cheap_clone(), PropertyAttributes::NONE));
                }
            }
            (ExoticObject::Array(storage), PropertyKey::String(s)) if s.as_str() == "length" => {
                return Some((
                    JsValue::number(f64::from(storage.length)),
                    PropertyAttributes::DONT_ENUM.union(PropertyAttributes::DONT_DELETE),
                ));
            }
            (ExoticObject::String(s), PropertyKey::Index(i)) => {
                if let Some(ch) = s.char_at(*i as usize) {
                    return Some((JsValue::String(ch), PropertyAttributes::FROZEN));
                }
            }
            (ExoticObject::String(s), PropertyKey::String(name)) if name.as_str() == "length" => {
                return Some((
                    JsValue::number(s.utf16_len() as f64),
                    PropertyAttributes::FROZEN,
                ));
            }
            _ => {}
        }
        self.properties
            .get(key)
            .map(|p| (p.value.cheap_clone(), p.attributes))
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Store an own property, honoring read-only attributes. Returns
    /// whether the value was written.
    pub fn put_own(&mut self, key: PropertyKey, value: JsValue) -> Result<bool, JsError> {
        let string_read_only = matches!(self.exotic, ExoticObject::String(_))
            && self
                .get_own_property(&key)
                .is_some_and(|(_, attributes)| attributes.read_only());
        if string_read_only {
            return Ok(false);
        }
        match (&mut self.exotic, &key) {
            (ExoticObject::Array(storage), PropertyKey::Index(i)) => {
                let i = *i;
                let index = i as usize;
                if index < storage.elements.len() {
                    if let Some(slot) = storage.elements.get_mut(index) {
                        *slot = Some(value);
                    }
                } else if index <= storage.elements.len() + MAX_DENSE_GAP
                    && !self.properties.contains_key(&key)
                {
                    storage.elements.resize(index, None);
                    storage.elements.push(Some(value));
                } else {
                    self.properties
                        .insert(key, Property::new(value, PropertyAttributes::NONE));
                }
                if i >= storage.length {
                    storage.length = i + 1;
                }
                return Ok(true);
            }
            (ExoticObject::Array(_), PropertyKey::String(s)) if s.as_str() == "length" => {
                let length = array_length_from(&value)?;
                self.set_array_length(length);
                return Ok(true);
            }
            _ => {}
        }

        match self.properties.get_mut(&key) {
            Some(property) if property.attributes.read_only() => Ok(false),
            Some(property) => {
                property.value = value;
                Ok(true)
            }
            None => {
                self.properties
                    .insert(key, Property::new(value, PropertyAttributes::NONE));
                Ok(true)
            }
        }
    }

    /// Create or overwrite a property with explicit attributes, ignoring
    /// read-only flags
    pub fn define(&mut self, key: PropertyKey, value: JsValue, attributes: PropertyAttributes) {
        if let (ExoticObject::Array(_), PropertyKey::Index(_)) = (&self.exotic, &key) {
            if attributes == PropertyAttributes::NONE {
                let _ = self.put_own(key, value);
                return;
            }
        }
        self.properties.insert(key, Property::new(value, attributes));
    }

    /// Overwrite the value of an existing property regardless of its
    /// attributes. Returns false when the property does not exist.
    pub fn force_set(&mut self, key: &PropertyKey, value: JsValue) -> bool {
        match self.properties.get_mut(key) {
            Some(property) => {
                property.value = value;
                true
            }
            None => false,
        }
    }

    /// Delete an own property. Returns false for undeletable properties.
    pub fn delete_own(&mut self, key: &PropertyKey) -> bool {
        match (&mut self.exotic, key) {
            (ExoticObject::Array(storage), PropertyKey::Index(i)) => {
                if let Some(slot) = storage.elements.get_mut(*i as usize) {
                    *slot = None;
                    return true;
                }
            }
            (ExoticObject::Array(_), PropertyKey::String(s)) if s.as_str() == "length" => {
                return false;
            }
            (ExoticObject::String(s), PropertyKey::Index(i)) if (*i as usize) < s.utf16_len() => {
                return false;
            }
            (ExoticObject::String(_), PropertyKey::String(s)) if s.as_str() == "length" => {
                return false;
            }
            _ => {}
        }
        match self.properties.get(key) {
            Some(property) if !property.attributes.deletable() => false,
            Some(_) => {
                self.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Enumerable own keys in for-in order: indices first, then insertion
    /// order
    pub fn own_enumerable_keys(&self) -> Vec<PropertyKey> {
        let mut keys = Vec::new();
        match &self.exotic {
            ExoticObject::Array(storage) => {
                for (i, element) in storage.elements.iter().enumerate() {
                    if element.is_some() {
                        keys.push(PropertyKey::Index(i as u32));
                    }
                }
            }
            ExoticObject::String(s) => {
                for i in 0..s.utf16_len() {
                    keys.push(PropertyKey::Index(i as u32));
                }
            }
            _ => {}
        }
        let mut sparse: Vec<u32> = Vec::new();
        for (key, property) in &self.properties {
            if !property.attributes.enumerable() {
                continue;
            }
            match key {
                PropertyKey::Index(i) => sparse.push(*i),
                PropertyKey::String(_) => {}
            }
        }
        sparse.sort_unstable();
        keys.extend(sparse.into_iter().map(PropertyKey::Index));
        keys.extend(
            self.properties
                .iter()
                .filter(|(key, p)| {
                    p.attributes.enumerable() && matches!(key, PropertyKey::String(_))
                })
                .map(|(key, _)| key.clone()),
        );
        keys
    }

    fn set_array_length(&mut self, length: u32) {
        if let ExoticObject::Array(storage) = &mut self.exotic {
            if (length as usize) < storage.elements.len() {
                storage.elements.truncate(length as usize);
            }
            storage.length = length;
            self.properties
                .retain(|key, _| !matches!(key, PropertyKey::Index(i) if *i >= length));
        }
    }

    /// Name of a function object, for error messages and `toString`
    pub fn function_name(&self) -> Option<JsString> {
        match &self.exotic {
            ExoticObject::Function(FunctionKind::Script { code, .. }) => code.name.clone(),
            ExoticObject::Function(FunctionKind::Native { name, .. }) => Some(name.cheap_clone()),
            _ => None,
        }
    }
}

/// Validate a value assigned to an array's `length`
pub fn array_length_from(value: &JsValue) -> Result<u32, JsError> {
    let n = value.primitive_to_number();
    let length = to_uint32(n);
    if f64::from(length) != n {
        return Err(JsError::range_error("Invalid array length"));
    }
    Ok(length)
}

fn trace_value(value: &JsValue, tracer: &mut Tracer) {
    if let JsValue::Object(obj) = value {
        tracer.edge(*obj);
    }
}

impl Trace for JsObject {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(proto) = self.prototype {
            tracer.edge(proto);
        }
        for property in self.properties.values() {
            trace_value(&property.value, tracer);
        }
        match &self.exotic {
            ExoticObject::Array(storage) => {
                for value in storage.elements.iter().flatten() {
                    trace_value(value, tracer);
                }
            }
            ExoticObject::Function(FunctionKind::Script { scope, .. }) => {
                for obj in scope.objects() {
                    tracer.edge(obj);
                }
            }
            ExoticObject::Activation(Activation {
                storage: ActivationStorage::TornOff(values),
                ..
            }) => {
                for value in values {
                    trace_value(value, tracer);
                }
            }
            ExoticObject::PropertyIterator(iter) => {
                if let Some(obj) = iter.object {
                    tracer.edge(obj);
                }
            }
            ExoticObject::Ordinary
            | ExoticObject::Function(FunctionKind::Native { .. })
            | ExoticObject::Error
            | ExoticObject::Boolean(_)
            | ExoticObject::Number(_)
            | ExoticObject::String(_)
            | ExoticObject::RegExp(_)
            | ExoticObject::Arguments
            | ExoticObject::Activation(_)
            | ExoticObject::StaticScope
            | ExoticObject::Global => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array() -> JsObject {
        JsObject::new(None, ExoticObject::Array(ArrayStorage::default()))
    }

    #[test]
    fn array_writes_extend_length_and_leave_holes() {
        let mut arr = array();
        arr.put_own(PropertyKey::Index(2), JsValue::Int(7)).ok();
        assert_eq!(arr.array().map(|a| a.length), Some(3));
        assert_eq!(arr.get_own(&PropertyKey::Index(1)), None);
        assert_eq!(arr.get_own(&PropertyKey::Index(2)), Some(JsValue::Int(7)));
        assert_eq!(arr.own_enumerable_keys(), vec![PropertyKey::Index(2)]);
    }

    #[test]
    fn far_array_index_goes_to_sparse_storage() {
        let mut arr = array();
        arr.put_own(PropertyKey::Index(1_000_000), JsValue::Int(1)).ok();
        assert_eq!(arr.array().map(|a| a.elements.len()), Some(0));
        assert_eq!(arr.array().map(|a| a.length), Some(1_000_001));
        assert_eq!(
            arr.get_own(&PropertyKey::Index(1_000_000)),
            Some(JsValue::Int(1))
        );
    }

    #[test]
    fn shrinking_length_drops_elements() {
        let mut arr = array();
        for i in 0..4 {
            arr.put_own(PropertyKey::Index(i), JsValue::Int(i as i32)).ok();
        }
        arr.put_own(PropertyKey::from("length"), JsValue::Int(1)).ok();
        assert_eq!(arr.get_own(&PropertyKey::Index(3)), None);
        assert_eq!(arr.get_own(&PropertyKey::from("length")), Some(JsValue::Int(1)));
        assert!(arr
            .put_own(PropertyKey::from("length"), JsValue::Number(1.5))
            .is_err());
    }

    #[test]
    fn read_only_and_dont_delete_are_honored() {
        let mut obj = JsObject::ordinary(None);
        obj.define(
            PropertyKey::from("k"),
            JsValue::Int(1),
            PropertyAttributes::READ_ONLY.union(PropertyAttributes::DONT_DELETE),
        );
        assert_eq!(obj.put_own(PropertyKey::from("k"), JsValue::Int(2)).ok(), Some(false));
        assert!(!obj.delete_own(&PropertyKey::from("k")));
        assert_eq!(obj.get_own(&PropertyKey::from("k")), Some(JsValue::Int(1)));
    }

    #[test]
    fn string_wrapper_exposes_characters() {
        let obj = JsObject::new(None, ExoticObject::String(JsString::from("hi")));
        assert_eq!(obj.get_own(&PropertyKey::Index(1)), Some(JsValue::from("i")));
        assert_eq!(obj.get_own(&PropertyKey::from("length")), Some(JsValue::Int(2)));
    }

    #[test]
    fn string_wrapper_characters_are_read_only() {
        let mut obj = JsObject::new(None, ExoticObject::String(JsString::from("hi")));
        assert_eq!(obj.put_own(PropertyKey::Index(0), JsValue::from("x")).ok(), Some(false));
        assert_eq!(obj.put_own(PropertyKey::from("length"), JsValue::Int(9)).ok(), Some(false));
        assert_eq!(obj.put_own(PropertyKey::Index(5), JsValue::Int(1)).ok(), Some(true));
        assert_eq!(obj.get_own(&PropertyKey::Index(0)), Some(JsValue::from("h")));
        assert_eq!(obj.get_own(&PropertyKey::Index(5)), Some(JsValue::Int(1)));
    }

    #[test]
    fn enumeration_skips_dont_enum() {
        let mut obj = JsObject::ordinary(None);
        obj.define(PropertyKey::from("b"), JsValue::Int(1), PropertyAttributes::NONE);
        obj.define(PropertyKey::from("hidden"), JsValue::Int(1), PropertyAttributes::DONT_ENUM);
        obj.define(PropertyKey::from("a"), JsValue::Int(1), PropertyAttributes::NONE);
        assert_eq!(
            obj.own_enumerable_keys(),
            vec![PropertyKey::from("b"), PropertyKey::from("a")]
        );
    }
}
