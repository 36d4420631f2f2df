//! Generic operations behind the dispatch loop fast paths
//!
//! Type conversions, operators on arbitrary values and property access with
//! prototype walks. Everything here may call back into script (`valueOf`,
//! `toString`), so every function takes `&mut Interpreter`.

use std::cmp::Ordering;

use super::Interpreter;
use super::register_file::RegisterFile;
use crate::error::JsError;
use crate::gc::ObjectRef;
use crate::object::{
    Activation, ActivationStorage, ExoticObject, FunctionKind, JsObject, PropertyAttributes,
};
use crate::value::{
    CheapClone, JsString, JsValue, PropertyKey, number_to_string, to_int32, to_uint32,
};

/// Hint for [`Interpreter::to_primitive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Number,
    String,
}

/// Read binding `index` of an activation
pub(crate) fn read_activation(
    registers: &RegisterFile,
    activation: &Activation,
    index: usize,
) -> Result<JsValue, JsError> {
    match &activation.storage {
        ActivationStorage::Live { fp } => {
            let entry = activation
                .code
                .symbols
                .get_index(index)
                .map(|(_, entry)| *entry)
                .ok_or_else(|| JsError::internal_error("activation binding out of range"))?;
            registers.read(*fp, entry.register)
        }
        ActivationStorage::TornOff(values) => values
            .get(index)
            .map(CheapClone::cheap_clone)
            .ok_or_else(|| JsError::internal_error("activation binding out of range")),
    }
}

/// Where a named binding was found on an object
enum Binding {
    GlobalSlot { index: u32, read_only: bool },
    ActivationSymbol(usize),
}

impl Interpreter {
    // ═══════════════════════════════════════════════════════════════════════════
    // Conversions
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn to_primitive(
        &mut self,
        value: &JsValue,
        hint: PreferredType,
    ) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = value else {
            return Ok(value.cheap_clone());
        };
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            PreferredType::Number => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get_property(*obj, &PropertyKey::from(name))?;
            if self.is_callable(&method) {
                let result = self.call_function(&method, value.cheap_clone(), &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        Err(JsError::type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&mut self, value: &JsValue) -> Result<f64, JsError> {
        match value {
            JsValue::Int(i) => Ok(f64::from(*i)),
            JsValue::Number(n) => Ok(*n),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                Ok(primitive.primitive_to_number())
            }
            other => Ok(other.primitive_to_number()),
        }
    }

    pub fn to_string(&mut self, value: &JsValue) -> Result<JsString, JsError> {
        match value {
            JsValue::String(s) => Ok(s.cheap_clone()),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                Ok(primitive.primitive_to_string())
            }
            other => Ok(other.primitive_to_string()),
        }
    }

    pub fn to_int32(&mut self, value: &JsValue) -> Result<i32, JsError> {
        match value {
            JsValue::Int(i) => Ok(*i),
            other => Ok(to_int32(self.to_number(other)?)),
        }
    }

    pub fn to_uint32(&mut self, value: &JsValue) -> Result<u32, JsError> {
        match value {
            JsValue::Int(i) => Ok(*i as u32),
            other => Ok(to_uint32(self.to_number(other)?)),
        }
    }

    /// ToObject; `null` and `undefined` are a TypeError
    pub fn to_object(&mut self, value: &JsValue) -> Result<ObjectRef, JsError> {
        let (proto, exotic) = match value {
            JsValue::Object(obj) => return Ok(*obj),
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot convert {} to object",
                    value.primitive_to_string()
                )));
            }
            JsValue::Boolean(b) => (self.realm.boolean_prototype, ExoticObject::Boolean(*b)),
            JsValue::Int(i) => (self.realm.number_prototype, ExoticObject::Number(f64::from(*i))),
            JsValue::Number(n) => (self.realm.number_prototype, ExoticObject::Number(*n)),
            JsValue::String(s) => (
                self.realm.string_prototype,
                ExoticObject::String(s.cheap_clone()),
            ),
        };
        Ok(self.alloc(JsObject::new(Some(proto), exotic)))
    }

    pub fn to_property_key(&mut self, value: &JsValue) -> Result<PropertyKey, JsError> {
        match value {
            JsValue::Object(_) => Ok(PropertyKey::from(self.to_string(value)?)),
            other => Ok(PropertyKey::from_primitive(other)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════════════

    /// The `+` operator
    pub fn add_values(&mut self, left: &JsValue, right: &JsValue) -> Result<JsValue, JsError> {
        let left = self.to_primitive(left, PreferredType::Number)?;
        let right = self.to_primitive(right, PreferredType::Number)?;
        match (&left, &right) {
            (JsValue::String(l), r) => Ok(JsValue::String(l.concat(&r.primitive_to_string()))),
            (l, JsValue::String(r)) => Ok(JsValue::String(l.primitive_to_string().concat(r))),
            (l, r) => Ok(JsValue::number(l.primitive_to_number() + r.primitive_to_number())),
        }
    }

    /// Numeric binary operator on two arbitrary values
    pub fn arithmetic(
        &mut self,
        left: &JsValue,
        right: &JsValue,
        op: fn(f64, f64) -> f64,
    ) -> Result<JsValue, JsError> {
        let l = self.to_number(left)?;
        let r = self.to_number(right)?;
        Ok(JsValue::number(op(l, r)))
    }

    /// `left < right`; `None` when either side is NaN
    pub fn less_than(&mut self, left: &JsValue, right: &JsValue) -> Result<Option<bool>, JsError> {
        let l = self.to_primitive(left, PreferredType::Number)?;
        let r = self.to_primitive(right, PreferredType::Number)?;
        Ok(primitive_less_than(&l, &r))
    }

    /// `left <= right`, converting the operands left to right
    pub fn less_equal(&mut self, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        let l = self.to_primitive(left, PreferredType::Number)?;
        let r = self.to_primitive(right, PreferredType::Number)?;
        Ok(primitive_less_than(&r, &l) == Some(false))
    }

    /// The `==` operator
    pub fn loose_equals(&mut self, left: &JsValue, right: &JsValue) -> Result<bool, JsError> {
        use JsValue::*;
        match (left, right) {
            (Undefined | Null, Undefined | Null) => Ok(true),
            (Undefined | Null, _) | (_, Undefined | Null) => Ok(false),
            (Int(_) | Number(_), Int(_) | Number(_))
            | (String(_), String(_))
            | (Boolean(_), Boolean(_))
            | (Object(_), Object(_)) => Ok(left.strict_equals(right)),
            (Int(_) | Number(_), String(_)) | (String(_), Int(_) | Number(_)) => {
                Ok(left.primitive_to_number() == right.primitive_to_number())
            }
            (Boolean(b), _) => {
                let n = JsValue::number(if *b { 1.0 } else { 0.0 });
                self.loose_equals(&n, right)
            }
            (_, Boolean(b)) => {
                let n = JsValue::number(if *b { 1.0 } else { 0.0 });
                self.loose_equals(left, &n)
            }
            (Object(_), _) => {
                let primitive = self.to_primitive(left, PreferredType::Number)?;
                self.loose_equals(&primitive, right)
            }
            (_, Object(_)) => {
                let primitive = self.to_primitive(right, PreferredType::Number)?;
                self.loose_equals(left, &primitive)
            }
        }
    }

    pub fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Boolean(_) => "boolean",
            JsValue::Int(_) | JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(_) if self.is_callable(value) => "function",
            JsValue::Object(_) => "object",
        }
    }

    pub fn instance_of(&mut self, value: &JsValue, constructor: &JsValue) -> Result<bool, JsError> {
        let Some(ctor) = constructor.as_object().filter(|_| self.is_callable(constructor)) else {
            return Err(JsError::type_error(
                "Right-hand side of 'instanceof' is not callable",
            ));
        };
        let JsValue::Object(obj) = value else {
            return Ok(false);
        };
        let prototype = self.get_property(ctor, &PropertyKey::from("prototype"))?;
        let Some(prototype) = prototype.as_object() else {
            return Err(JsError::type_error(
                "Function has non-object prototype in instanceof check",
            ));
        };
        let mut current = self.heap.get(*obj)?.prototype;
        while let Some(p) = current {
            if p == prototype {
                return Ok(true);
            }
            current = self.heap.get(p)?.prototype;
        }
        Ok(false)
    }

    /// The `in` operator
    pub fn has_in(&mut self, property: &JsValue, object: &JsValue) -> Result<bool, JsError> {
        let JsValue::Object(obj) = object else {
            return Err(JsError::type_error(
                "Cannot use 'in' operator to search for a key in a non-object",
            ));
        };
        let key = self.to_property_key(property)?;
        self.has_property(*obj, &key)
    }

    pub fn is_callable(&self, value: &JsValue) -> bool {
        match value {
            JsValue::Object(obj) => self.heap.get(*obj).is_ok_and(JsObject::is_callable),
            _ => false,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Property access
    // ═══════════════════════════════════════════════════════════════════════════

    /// Binding for `key` held directly by `obj` outside its property map
    fn special_binding(&self, object: &JsObject, key: &PropertyKey) -> Option<Binding> {
        let PropertyKey::String(name) = key else {
            return None;
        };
        match &object.exotic {
            ExoticObject::Global => self
                .realm
                .global_symbols
                .get(name.as_str())
                .map(|symbol| Binding::GlobalSlot {
                    index: symbol.index,
                    read_only: symbol.read_only,
                }),
            ExoticObject::Activation(activation) => activation
                .code
                .symbol_index(name.as_str())
                .map(Binding::ActivationSymbol),
            _ => None,
        }
    }

    /// Own property lookup including slot and activation bindings
    pub fn get_own_property(
        &self,
        obj: ObjectRef,
        key: &PropertyKey,
    ) -> Result<Option<JsValue>, JsError> {
        let object = self.heap.get(obj)?;
        match self.special_binding(object, key) {
            Some(Binding::GlobalSlot { index, .. }) => {
                return self.realm.global_slot(index).map(Some);
            }
            Some(Binding::ActivationSymbol(index)) => {
                if let ExoticObject::Activation(activation) = &object.exotic {
                    return read_activation(&self.registers, activation, index).map(Some);
                }
            }
            None => {}
        }
        Ok(object.get_own(key))
    }

    /// `[[Get]]` with a prototype walk
    pub fn get_property(&mut self, obj: ObjectRef, key: &PropertyKey) -> Result<JsValue, JsError> {
        let mut current = Some(obj);
        while let Some(o) = current {
            if let Some(value) = self.get_own_property(o, key)? {
                return Ok(value);
            }
            let object = self.heap.get(o)?;
            let is_script_function = matches!(
                object.exotic,
                ExoticObject::Function(FunctionKind::Script { .. })
            );
            let prototype = object.prototype;
            if is_script_function {
                if key.eq_str("arguments") {
                    return self.retrieve_arguments(o);
                }
                if key.eq_str("caller") {
                    return self.retrieve_caller(o);
                }
            }
            current = prototype;
        }
        Ok(JsValue::Undefined)
    }

    pub fn has_own_property(&self, obj: ObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let object = self.heap.get(obj)?;
        if self.special_binding(object, key).is_some() {
            return Ok(true);
        }
        Ok(object.has_own(key))
    }

    pub fn has_property(&self, obj: ObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let mut current = Some(obj);
        while let Some(o) = current {
            if self.has_own_property(o, key)? {
                return Ok(true);
            }
            current = self.heap.get(o)?.prototype;
        }
        Ok(false)
    }

    /// `[[Put]]`. Writes to read-only properties are ignored.
    pub fn put_property(
        &mut self,
        obj: ObjectRef,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        let object = self.heap.get(obj)?;
        match self.special_binding(object, &key) {
            Some(Binding::GlobalSlot { index, read_only }) => {
                if !read_only {
                    self.realm.set_global_slot(index, value)?;
                }
                Ok(())
            }
            Some(Binding::ActivationSymbol(index)) => {
                self.write_activation(obj, index, value, false)
            }
            None => {
                self.heap.get_mut(obj)?.put_own(key, value)?;
                Ok(())
            }
        }
    }

    /// Store into binding `index` of an activation. `force` ignores
    /// read-only bindings.
    pub(crate) fn write_activation(
        &mut self,
        obj: ObjectRef,
        index: usize,
        value: JsValue,
        force: bool,
    ) -> Result<(), JsError> {
        let ExoticObject::Activation(activation) = &mut self.heap.get_mut(obj)?.exotic else {
            return Err(JsError::internal_error("scope node is not an activation"));
        };
        let entry = activation
            .code
            .symbols
            .get_index(index)
            .map(|(_, entry)| *entry)
            .ok_or_else(|| JsError::internal_error("activation binding out of range"))?;
        if entry.read_only && !force {
            return Ok(());
        }
        match &mut activation.storage {
            ActivationStorage::Live { fp } => {
                let fp = *fp;
                self.registers.write(fp, entry.register, value)
            }
            ActivationStorage::TornOff(values) => match values.get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(JsError::internal_error("activation binding out of range")),
            },
        }
    }

    /// `delete obj[key]`
    pub fn delete_property(&mut self, obj: ObjectRef, key: &PropertyKey) -> Result<bool, JsError> {
        let object = self.heap.get(obj)?;
        if self.special_binding(object, key).is_some() {
            return Ok(false);
        }
        let existed = object.has_own(key);
        let deleted = self.heap.get_mut(obj)?.delete_own(key);
        if deleted && existed && obj == self.realm.global_object {
            self.realm.global_version += 1;
        }
        Ok(deleted)
    }

    /// Property read on any value; primitives use their prototype
    pub fn get_value_property(
        &mut self,
        base: &JsValue,
        key: &PropertyKey,
    ) -> Result<JsValue, JsError> {
        let proto = match base {
            JsValue::Object(obj) => return self.get_property(*obj, key),
            JsValue::String(s) => {
                match key {
                    PropertyKey::Index(i) => {
                        if let Some(ch) = s.char_at(*i as usize) {
                            return Ok(JsValue::String(ch));
                        }
                    }
                    PropertyKey::String(name) if name.as_str() == "length" => {
                        return Ok(JsValue::number(s.utf16_len() as f64));
                    }
                    PropertyKey::String(_) => {}
                }
                self.realm.string_prototype
            }
            JsValue::Int(_) | JsValue::Number(_) => self.realm.number_prototype,
            JsValue::Boolean(_) => self.realm.boolean_prototype,
            JsValue::Undefined | JsValue::Null => {
                return Err(JsError::type_error(format!(
                    "Cannot read property '{}' of {}",
                    key,
                    base.primitive_to_string()
                )));
            }
        };
        self.get_property(proto, key)
    }

    /// Property write on any value; writes to primitives are dropped
    pub fn put_value_property(
        &mut self,
        base: &JsValue,
        key: PropertyKey,
        value: JsValue,
    ) -> Result<(), JsError> {
        match base {
            JsValue::Object(obj) => self.put_property(*obj, key, value),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot set property '{}' of {}",
                key,
                base.primitive_to_string()
            ))),
            _ => Ok(()),
        }
    }

    pub fn delete_value_property(
        &mut self,
        base: &JsValue,
        key: &PropertyKey,
    ) -> Result<bool, JsError> {
        match base {
            JsValue::Object(obj) => self.delete_property(*obj, key),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot delete property '{}' of {}",
                key,
                base.primitive_to_string()
            ))),
            _ => Ok(true),
        }
    }

    /// Define a property on `obj` with explicit attributes
    pub fn define_property(
        &mut self,
        obj: ObjectRef,
        key: impl Into<PropertyKey>,
        value: JsValue,
        attributes: PropertyAttributes,
    ) -> Result<(), JsError> {
        self.heap.get_mut(obj)?.define(key.into(), value, attributes);
        Ok(())
    }

    /// Enumerable names along the prototype chain in for-in order, with
    /// shadowed names reported once
    pub fn enumerable_names(&self, obj: ObjectRef) -> Result<Vec<JsString>, JsError> {
        let mut names: Vec<JsString> = Vec::new();
        let mut seen = crate::prelude::FxHashSet::default();
        let mut current = Some(obj);
        while let Some(o) = current {
            let object = self.heap.get(o)?;
            if let ExoticObject::Global = object.exotic {
                for (name, _) in self.realm.global_symbols.iter() {
                    if seen.insert(PropertyKey::from(name.cheap_clone())) {
                        names.push(name.cheap_clone());
                    }
                }
            }
            for key in object.own_enumerable_keys() {
                if seen.insert(key.clone()) {
                    names.push(key.to_js_string());
                }
            }
            // Non-enumerable own properties still shadow the prototype's
            for key in object.properties.keys() {
                seen.insert(key.clone());
            }
            current = object.prototype;
        }
        Ok(names)
    }

    /// Length of an array-like object
    pub fn length_of(&mut self, obj: ObjectRef) -> Result<u32, JsError> {
        if let Some(array) = self.heap.get(obj)?.array() {
            return Ok(array.length);
        }
        let length = self.get_property(obj, &PropertyKey::from("length"))?;
        self.to_uint32(&length)
    }
}

/// Abstract relational comparison on primitives
pub fn primitive_less_than(left: &JsValue, right: &JsValue) -> Option<bool> {
    if let (JsValue::String(l), JsValue::String(r)) = (left, right) {
        let ordering = if l.as_str().is_ascii() && r.as_str().is_ascii() {
            l.as_str().cmp(r.as_str())
        } else {
            l.as_str().encode_utf16().cmp(r.as_str().encode_utf16())
        };
        return Some(ordering == Ordering::Less);
    }
    let l = left.primitive_to_number();
    let r = right.primitive_to_number();
    if l.is_nan() || r.is_nan() {
        return None;
    }
    Some(l < r)
}

/// `Number.prototype.toString` for any radix
pub fn number_to_radix_string(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let mut integer = n.abs().trunc();
    let mut fraction = n.abs() - integer;
    let mut digits: Vec<char> = Vec::new();
    if integer == 0.0 {
        digits.push('0');
    }
    while integer >= 1.0 {
        let digit = (integer % f64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        integer = (integer / f64::from(radix)).trunc();
    }
    digits.reverse();
    let mut out: String = digits.into_iter().collect();
    if fraction > 0.0 {
        out.push('.');
        for _ in 0..20 {
            fraction *= f64::from(radix);
            let digit = fraction.trunc() as u32;
            out.push(std::char::from_digit(digit, radix).unwrap_or('0'));
            fraction -= fraction.trunc();
            if fraction == 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}
