//! Per-interpreter global state: the global object, the built-in
//! prototypes and the slot-backed global variables

use crate::compiler::GlobalSymbolTable;
use crate::error::JsError;
use crate::gc::{Heap, ObjectRef};
use crate::interpreter::Interpreter;
use crate::object::{ExoticObject, FunctionKind, JsObject};
use crate::prelude::FxHashMap;
use crate::value::{CheapClone, JsString, JsValue};

pub struct Realm {
    pub global_object: ObjectRef,
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    /// Prototypes of `TypeError`, `RangeError` and friends by name
    pub native_error_prototypes: FxHashMap<&'static str, ObjectRef>,
    /// The original `eval`; only a call to this object is a direct eval
    pub eval_function: Option<ObjectRef>,
    pub global_symbols: GlobalSymbolTable,
    pub global_slots: Vec<JsValue>,
    /// Bumped whenever a property of the global object is removed, which
    /// invalidates cached property indices
    pub global_version: u64,
}

fn function_prototype_call(
    _interp: &mut Interpreter,
    _this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    Ok(JsValue::Undefined)
}

impl Realm {
    /// Allocate the global object and the bare prototype objects. Builtins
    /// fill them in afterwards.
    pub fn new(heap: &mut Heap<JsObject>) -> Self {
        let object_prototype = heap.alloc(JsObject::ordinary(None));
        let function_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ExoticObject::Function(FunctionKind::Native {
                call: function_prototype_call,
                construct: None,
                name: JsString::from(""),
            }),
        ));
        let array_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ExoticObject::Array(Default::default()),
        ));
        let string_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ExoticObject::String(JsString::from("")),
        ));
        let number_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ExoticObject::Number(0.0),
        ));
        let boolean_prototype = heap.alloc(JsObject::new(
            Some(object_prototype),
            ExoticObject::Boolean(false),
        ));
        let error_prototype = heap.alloc(JsObject::ordinary(Some(object_prototype)));
        let regexp_prototype = heap.alloc(JsObject::ordinary(Some(object_prototype)));
        let global_object = heap.alloc(JsObject::new(Some(object_prototype), ExoticObject::Global));

        Self {
            global_object,
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            error_prototype,
            regexp_prototype,
            native_error_prototypes: FxHashMap::default(),
            eval_function: None,
            global_symbols: GlobalSymbolTable::new(),
            global_slots: Vec::new(),
            global_version: 0,
        }
    }

    pub fn is_eval_function(&self, obj: ObjectRef) -> bool {
        self.eval_function == Some(obj)
    }

    /// Prototype for errors of the given constructor name
    pub fn error_prototype_for(&self, name: &str) -> ObjectRef {
        self.native_error_prototypes
            .get(name)
            .copied()
            .unwrap_or(self.error_prototype)
    }

    /// Grow the slot vector after new global symbols were declared
    pub fn sync_global_slots(&mut self) {
        let len = self.global_symbols.len();
        if self.global_slots.len() < len {
            self.global_slots.resize(len, JsValue::Undefined);
        }
    }

    pub fn global_slot(&self, index: u32) -> Result<JsValue, JsError> {
        self.global_slots
            .get(index as usize)
            .map(CheapClone::cheap_clone)
            .ok_or_else(|| JsError::internal_error(format!("global slot {} out of range", index)))
    }

    pub fn set_global_slot(&mut self, index: u32, value: JsValue) -> Result<(), JsError> {
        match self.global_slots.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(JsError::internal_error(format!(
                "global slot {} out of range",
                index
            ))),
        }
    }

    pub fn roots(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        [
            self.global_object,
            self.object_prototype,
            self.function_prototype,
            self.array_prototype,
            self.string_prototype,
            self.number_prototype,
            self.boolean_prototype,
            self.error_prototype,
            self.regexp_prototype,
        ]
        .into_iter()
        .chain(self.native_error_prototypes.values().copied())
        .chain(self.eval_function)
        .chain(self.global_slots.iter().filter_map(JsValue::as_object))
    }
}
