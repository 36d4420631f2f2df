//! Mark-and-sweep garbage collection.
//!
//! Objects live in an arena of slots and are addressed by `ObjectRef`, a
//! copyable index paired with the slot's generation. Freeing a slot bumps its
//! generation, so a stale reference is detected on access instead of aliasing
//! whatever object reuses the slot.
//!
//! The heap never decides on its own what is alive. The interpreter calls
//! [`Heap::collect`] at a safepoint and hands in every root it knows about
//! (register file, scope chains, realm objects); protected objects are added
//! on top of those.

use crate::error::JsError;
use crate::prelude::FxHashMap;

/// Handle to a heap object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    index: u32,
    generation: u32,
}

impl ObjectRef {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectRef({}#{})", self.index, self.generation)
    }
}

/// Implemented by heap payloads so the collector can find outgoing edges
pub trait Trace {
    fn trace(&self, tracer: &mut Tracer);
}

/// Worklist of references discovered while marking
#[derive(Default)]
pub struct Tracer {
    pending: Vec<ObjectRef>,
}

impl Tracer {
    #[inline]
    pub fn edge(&mut self, obj: ObjectRef) {
        self.pending.push(obj);
    }
}

/// Growable mark bitmap, one bit per slot
#[derive(Default)]
struct MarkBits {
    words: Vec<u64>,
}

impl MarkBits {
    fn reset(&mut self, len: usize) {
        self.words.clear();
        self.words.resize(len.div_ceil(64), 0);
    }

    /// Set the bit, returning whether it was already set
    #[inline]
    fn test_and_set(&mut self, index: usize) -> bool {
        let bit = 1u64 << (index & 63);
        match self.words.get_mut(index >> 6) {
            Some(word) => {
                let was_set = *word & bit != 0;
                *word |= bit;
                was_set
            }
            None => true,
        }
    }

    #[inline]
    fn get(&self, index: usize) -> bool {
        self.words
            .get(index >> 6)
            .is_some_and(|word| word & (1u64 << (index & 63)) != 0)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Statistics about the heap state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Number of slots in the arena (live + free)
    pub total_slots: usize,
    /// Number of live objects
    pub live_objects: usize,
    /// Collections performed so far
    pub collections: usize,
    /// Objects reclaimed over the heap's lifetime
    pub total_freed: usize,
}

/// Arena heap with mark-and-sweep collection
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    marks: MarkBits,
    /// Host-held roots with a nesting count
    protected: FxHashMap<ObjectRef, usize>,
    allocations_since_gc: usize,
    /// Allocations between automatic collections, 0 disables them
    threshold: usize,
    live: usize,
    collections: usize,
    total_freed: usize,
}

impl<T: Trace> Heap<T> {
    pub fn new(threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            marks: MarkBits::default(),
            protected: FxHashMap::default(),
            allocations_since_gc: 0,
            threshold,
            live: 0,
            collections: 0,
            total_freed: 0,
        }
    }

    pub fn alloc(&mut self, value: T) -> ObjectRef {
        self.allocations_since_gc += 1;
        self.live += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.value = Some(value);
                return ObjectRef {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ObjectRef {
            index,
            generation: 0,
        }
    }

    #[inline]
    pub fn get(&self, obj: ObjectRef) -> Result<&T, JsError> {
        match self.slots.get(obj.index as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == obj.generation => Ok(value),
            _ => Err(stale(obj)),
        }
    }

    #[inline]
    pub fn get_mut(&mut self, obj: ObjectRef) -> Result<&mut T, JsError> {
        match self.slots.get_mut(obj.index as usize) {
            Some(Slot {
                generation,
                value: Some(value),
            }) if *generation == obj.generation => Ok(value),
            _ => Err(stale(obj)),
        }
    }

    pub fn is_live(&self, obj: ObjectRef) -> bool {
        self.get(obj).is_ok()
    }

    /// Whether enough allocations happened to warrant a collection
    #[inline]
    pub fn should_collect(&self) -> bool {
        self.threshold > 0 && self.allocations_since_gc >= self.threshold
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    /// Keep `obj` alive until a matching [`Heap::unprotect`]
    pub fn protect(&mut self, obj: ObjectRef) {
        *self.protected.entry(obj).or_insert(0) += 1;
    }

    pub fn unprotect(&mut self, obj: ObjectRef) {
        if let Some(count) = self.protected.get_mut(&obj) {
            *count -= 1;
            if *count == 0 {
                self.protected.remove(&obj);
            }
        }
    }

    /// Mark everything reachable from `roots` and the protected set, then
    /// free the rest. Returns the number of objects freed.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectRef>) -> usize {
        self.marks.reset(self.slots.len());

        let mut tracer = Tracer::default();
        tracer.pending.extend(roots);
        tracer.pending.extend(self.protected.keys().copied());

        while let Some(obj) = tracer.pending.pop() {
            let Some(slot) = self.slots.get(obj.index as usize) else {
                continue;
            };
            if slot.generation != obj.generation {
                continue;
            }
            let Some(value) = &slot.value else {
                continue;
            };
            if self.marks.test_and_set(obj.index as usize) {
                continue;
            }
            value.trace(&mut tracer);
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_some() && !self.marks.get(index) {
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }

        self.live -= freed;
        self.total_freed += freed;
        self.collections += 1;
        self.allocations_since_gc = 0;
        tracing::debug!(freed, live = self.live, "gc cycle finished");
        freed
    }

    pub fn stats(&self) -> GcStats {
        GcStats {
            total_slots: self.slots.len(),
            live_objects: self.live,
            collections: self.collections,
            total_freed: self.total_freed,
        }
    }
}

fn stale(obj: ObjectRef) -> JsError {
    JsError::internal_error(format!("stale object reference {:?}", obj))
}
