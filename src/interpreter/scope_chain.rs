//! Persistent scope chain
//!
//! A chain is a singly linked list of `Rc` nodes. Pushing allocates one node
//! and shares the tail, so closures, suspended frames and the running frame
//! can all hold the same suffix without copying. A chain is dropped when the
//! last frame or closure holding it goes away.

use std::rc::Rc;

use crate::gc::ObjectRef;

struct ScopeNode {
    object: ObjectRef,
    next: Option<Rc<ScopeNode>>,
    depth: u32,
}

#[derive(Clone, Default)]
pub struct ScopeChain {
    head: Option<Rc<ScopeNode>>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self { head: None }
    }

    /// Chain of one node
    pub fn single(object: ObjectRef) -> Self {
        Self::new().push(object)
    }

    pub fn push(&self, object: ObjectRef) -> Self {
        let depth = self.depth() + 1;
        Self {
            head: Some(Rc::new(ScopeNode {
                object,
                next: self.head.clone(),
                depth,
            })),
        }
    }

    /// Chain without its innermost node
    pub fn pop(&self) -> Self {
        Self {
            head: self.head.as_ref().and_then(|node| node.next.clone()),
        }
    }

    /// Pop until at most `depth` nodes remain
    pub fn truncate(&self, depth: u32) -> Self {
        let mut chain = self.clone();
        while chain.depth() > depth {
            chain = chain.pop();
        }
        chain
    }

    /// Number of nodes
    #[inline]
    pub fn depth(&self) -> u32 {
        self.head.as_ref().map_or(0, |node| node.depth)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Innermost object
    pub fn top(&self) -> Option<ObjectRef> {
        self.head.as_ref().map(|node| node.object)
    }

    /// Object `skip` nodes below the innermost one
    pub fn nth(&self, skip: u32) -> Option<ObjectRef> {
        self.objects().nth(skip as usize)
    }

    /// Objects from innermost to outermost
    pub fn objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let current = node?;
            node = current.next.as_deref();
            Some(current.object)
        })
    }
}

impl std::fmt::Debug for ScopeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.objects()).finish()
    }
}
