//! String interning for identifiers and literals.
//!
//! The lexer and the runtime share one dictionary per interpreter, so the
//! same identifier text always maps to the same `Rc<str>` allocation. The
//! compiler's constant pool relies on this only for speed; equality is
//! still by content.

use rustc_hash::FxHashMap;

use crate::value::{CheapClone, JsString};

pub struct StringDict {
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Dictionary seeded with the property names the runtime uses itself
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

const COMMON_STRINGS: &[&str] = &[
    "length",
    "prototype",
    "constructor",
    "name",
    "message",
    "toString",
    "valueOf",
    "arguments",
    "callee",
    "caller",
    "eval",
    "undefined",
    "lastIndex",
    "line",
    "sourceId",
    "sourceURL",
];
