//! Compile-time scope model and identifier resolution
//!
//! The code generator keeps a stack of [`CompileScope`]s that mirrors the
//! scope chain the code will see at runtime. Each entry that materializes as
//! a chain node at runtime (activations, catch and function-name scopes,
//! `with` objects, the global object) counts towards the `depth` operand of
//! scoped accesses.

use std::rc::Rc;

use super::bytecode::{Register, SymbolEntry};
use crate::prelude::{IndexMap, index_map_new};
use crate::value::{CheapClone, JsString};

/// A variable slot of the global object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSymbol {
    pub index: u32,
    pub read_only: bool,
}

/// Names of the global object that are backed by slots instead of
/// properties. Owned by the realm, extended by every compiled program.
#[derive(Debug, Clone)]
pub struct GlobalSymbolTable {
    symbols: IndexMap<JsString, GlobalSymbol>,
}

impl GlobalSymbolTable {
    pub fn new() -> Self {
        Self {
            symbols: index_map_new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<GlobalSymbol> {
        self.symbols.get(name).copied()
    }

    /// Existing symbol for `name`, or a new slot at the end
    pub fn declare(&mut self, name: &JsString, read_only: bool) -> GlobalSymbol {
        let index = self.symbols.len() as u32;
        *self
            .symbols
            .entry(name.cheap_clone())
            .or_insert(GlobalSymbol { index, read_only })
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JsString, &GlobalSymbol)> {
        self.symbols.iter()
    }

    /// Name stored in slot `index`
    pub fn name_of(&self, index: u32) -> Option<&JsString> {
        self.symbols.get_index(index as usize).map(|(name, _)| name)
    }
}

impl Default for GlobalSymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Static view of one function's bindings
#[derive(Debug, Clone)]
pub struct FunctionScope {
    pub symbols: Rc<IndexMap<JsString, SymbolEntry>>,
    /// Materializes an activation object on the chain
    pub has_activation: bool,
    /// May gain bindings at runtime through eval
    pub uses_eval: bool,
}

#[derive(Debug, Clone)]
pub enum CompileScope {
    Function(FunctionScope),
    /// Catch parameter scope
    Catch { name: JsString },
    /// Name of a named function expression
    FunctionName { name: JsString },
    With,
    Global,
    /// The chain below this point is only known at runtime (eval code)
    Unknown,
}

/// Where an identifier lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Register of the current function
    Local { register: Register, read_only: bool },
    /// Binding `index` of the node `depth` steps down the chain
    Scoped {
        depth: u32,
        index: u32,
        read_only: bool,
    },
    GlobalSlot { index: u32, read_only: bool },
    /// Not declared anywhere; a named lookup on the global object
    GlobalNamed,
    /// Named walk of the live chain, starting `skip` nodes down
    Dynamic { skip: u32 },
}

impl Resolution {
    pub fn is_read_only(&self) -> bool {
        match self {
            Resolution::Local { read_only, .. }
            | Resolution::Scoped { read_only, .. }
            | Resolution::GlobalSlot { read_only, .. } => *read_only,
            Resolution::GlobalNamed | Resolution::Dynamic { .. } => false,
        }
    }
}

/// Resolve `name` from the innermost end of `scopes`
pub fn resolve(scopes: &[CompileScope], globals: &GlobalSymbolTable, name: &str) -> Resolution {
    let mut depth = 0u32;
    let mut in_current_function = true;

    for scope in scopes.iter().rev() {
        match scope {
            CompileScope::Function(function) => {
                if let Some((index, _, entry)) = function.symbols.get_full(name) {
                    return if in_current_function {
                        Resolution::Local {
                            register: entry.register,
                            read_only: entry.read_only,
                        }
                    } else {
                        Resolution::Scoped {
                            depth,
                            index: index as u32,
                            read_only: entry.read_only,
                        }
                    };
                }
                if function.uses_eval {
                    return Resolution::Dynamic { skip: depth };
                }
                if function.has_activation {
                    depth += 1;
                }
                in_current_function = false;
            }
            CompileScope::Catch { name: bound } => {
                if bound == name {
                    return Resolution::Scoped {
                        depth,
                        index: 0,
                        read_only: false,
                    };
                }
                depth += 1;
            }
            CompileScope::FunctionName { name: bound } => {
                if bound == name {
                    return Resolution::Scoped {
                        depth,
                        index: 0,
                        read_only: true,
                    };
                }
                depth += 1;
            }
            CompileScope::With | CompileScope::Unknown => {
                return Resolution::Dynamic { skip: depth };
            }
            CompileScope::Global => {
                return match globals.get(name) {
                    Some(symbol) => Resolution::GlobalSlot {
                        index: symbol.index,
                        read_only: symbol.read_only,
                    },
                    None => Resolution::GlobalNamed,
                };
            }
        }
    }

    Resolution::Dynamic { skip: depth }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(names: &[&str], has_activation: bool, uses_eval: bool) -> CompileScope {
        let mut symbols = index_map_new();
        for (i, name) in names.iter().enumerate() {
            symbols.insert(
                JsString::from(*name),
                SymbolEntry {
                    register: i as Register,
                    read_only: false,
                },
            );
        }
        CompileScope::Function(FunctionScope {
            symbols: Rc::new(symbols),
            has_activation,
            uses_eval,
        })
    }

    #[test]
    fn own_variable_is_a_register() {
        let scopes = [CompileScope::Global, function(&["a", "b"], false, false)];
        let globals = GlobalSymbolTable::new();
        assert_eq!(
            resolve(&scopes, &globals, "b"),
            Resolution::Local {
                register: 1,
                read_only: false
            }
        );
    }

    #[test]
    fn enclosing_variable_is_scoped_past_catch() {
        let scopes = [
            CompileScope::Global,
            function(&["outer"], true, false),
            CompileScope::Catch {
                name: JsString::from("e"),
            },
            function(&["x"], false, false),
        ];
        let globals = GlobalSymbolTable::new();
        assert_eq!(
            resolve(&scopes, &globals, "outer"),
            Resolution::Scoped {
                depth: 1,
                index: 0,
                read_only: false
            }
        );
        assert_eq!(
            resolve(&scopes, &globals, "e"),
            Resolution::Scoped {
                depth: 0,
                index: 0,
                read_only: false
            }
        );
    }

    #[test]
    fn with_forces_dynamic_lookup() {
        let scopes = [
            CompileScope::Global,
            function(&["x"], true, false),
            CompileScope::With,
        ];
        let globals = GlobalSymbolTable::new();
        assert_eq!(
            resolve(&scopes, &globals, "x"),
            Resolution::Dynamic { skip: 0 }
        );
    }

    #[test]
    fn eval_in_enclosing_function_forces_dynamic_lookup() {
        let scopes = [
            CompileScope::Global,
            function(&[], true, true),
            function(&["y"], false, false),
        ];
        let mut globals = GlobalSymbolTable::new();
        globals.declare(&JsString::from("g"), false);
        assert_eq!(
            resolve(&scopes, &globals, "g"),
            Resolution::Dynamic { skip: 0 }
        );
    }

    #[test]
    fn globals_resolve_to_slots_or_names() {
        let scopes = [CompileScope::Global, function(&[], false, false)];
        let mut globals = GlobalSymbolTable::new();
        globals.declare(&JsString::from("first"), false);
        globals.declare(&JsString::from("k"), true);
        assert_eq!(
            resolve(&scopes, &globals, "k"),
            Resolution::GlobalSlot {
                index: 1,
                read_only: true
            }
        );
        assert_eq!(resolve(&scopes, &globals, "nope"), Resolution::GlobalNamed);
    }
}
