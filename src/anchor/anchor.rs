use std::fmt;
use std::sync::Arc;

/// One delivered action, tagged with the store-local sequence number it was
/// delivered under.
///
/// The same action value may be delivered more than once (two agendas can
/// emit equal actions), so rollback identifies entries by `seq` rather than
/// by comparing actions.
#[derive(Debug, Clone)]
pub struct Entry<A> {
    seq: u64,
    action: A,
}

impl<A> Entry<A> {
    /// Create an entry for `action` delivered as number `seq`.
    pub fn new(seq: u64, action: A) -> Self {
        Self { seq, action }
    }

    /// The store-local delivery number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The delivered action.
    pub fn action(&self) -> &A {
        &self.action
    }
}

/// An immutable history node: the state obtained by folding `entry` into
/// the predecessor's state.
///
/// Anchors are shared through `Arc` and never mutated after construction,
/// so a reference captured earlier (a rollback pivot, for instance) stays
/// valid while other agendas keep extending the chain past it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use agendum::{Anchor, Entry};
///
/// let add = |state: &Arc<i32>, n: &i32| Arc::new(**state + n);
///
/// let root = Anchor::root(Arc::new(0), 0);
/// let one = root.fold(Entry::new(1, 1), &add);
/// let three = one.fold(Entry::new(2, 2), &add);
/// assert_eq!(**three.state(), 3);
///
/// // Drop the first addition and recompute everything after it.
/// let rolled_back = three.exclude(&root, |entry| entry.seq() == 1, &add);
/// assert_eq!(**rolled_back.state(), 2);
/// // The original chain is untouched.
/// assert_eq!(**three.state(), 3);
/// ```
pub struct Anchor<S, A> {
    state: Arc<S>,
    entry: Entry<A>,
    predecessor: Option<Arc<Anchor<S, A>>>,
    depth: usize,
}

impl<S, A: Clone> Anchor<S, A> {
    /// Start a chain from `state`, recorded as produced by `action`.
    ///
    /// The root entry always carries sequence number `0`.
    pub fn root(state: Arc<S>, action: A) -> Arc<Self> {
        Arc::new(Self {
            state,
            entry: Entry::new(0, action),
            predecessor: None,
            depth: 0,
        })
    }

    /// Fold `entry` into this anchor's state and link the result after it.
    ///
    /// A reducer that hands back the very same `Arc` signals a no-op; the new
    /// node then shares its predecessor's state, which callers detect with
    /// [`Arc::ptr_eq`]. The entry is still recorded so a later rollback
    /// re-evaluates it against whatever state precedes it then.
    pub fn fold<R>(self: &Arc<Self>, entry: Entry<A>, reducer: &R) -> Arc<Self>
    where
        R: Fn(&Arc<S>, &A) -> Arc<S> + ?Sized,
    {
        let state = reducer(&self.state, &entry.action);
        Arc::new(Self {
            state,
            entry,
            predecessor: Some(Arc::clone(self)),
            depth: self.depth + 1,
        })
    }

    /// Recompute the chain as if every entry after `pivot` for which
    /// `excluded` returns `true` had never been delivered.
    ///
    /// Anchors older than the first excluded entry are reused as they are;
    /// every later entry that is kept is folded again, in its original
    /// order. Returns the new terminal anchor, or `self` when nothing was
    /// excluded. If `pivot` is not an ancestor of `self` the walk stops at
    /// the root, which is never excluded.
    pub fn exclude<P, R>(self: &Arc<Self>, pivot: &Arc<Self>, mut excluded: P, reducer: &R) -> Arc<Self>
    where
        P: FnMut(&Entry<A>) -> bool,
        R: Fn(&Arc<S>, &A) -> Arc<S> + ?Sized,
    {
        let mut suffix = Vec::new();
        let mut cursor = self;
        while !Arc::ptr_eq(cursor, pivot) {
            match &cursor.predecessor {
                Some(prev) => {
                    suffix.push(cursor);
                    cursor = prev;
                }
                None => break,
            }
        }
        suffix.reverse();

        let Some(first) = suffix.iter().position(|anchor| excluded(&anchor.entry)) else {
            return Arc::clone(self);
        };
        let Some(mut anchor) = suffix[first].predecessor.clone() else {
            return Arc::clone(self);
        };

        for node in &suffix[first + 1..] {
            if !excluded(&node.entry) {
                anchor = anchor.fold(node.entry.clone(), reducer);
            }
        }
        anchor
    }
}

impl<S, A> Anchor<S, A> {
    /// The state this anchor represents.
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// The entry that produced this anchor.
    pub fn entry(&self) -> &Entry<A> {
        &self.entry
    }

    /// The anchor this one was folded onto, `None` for the root.
    pub fn predecessor(&self) -> Option<&Arc<Anchor<S, A>>> {
        self.predecessor.as_ref()
    }

    /// Number of anchors between this one and the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Walk the history from this anchor back to the root, newest first.
    pub fn ancestors(&self) -> Ancestors<'_, S, A> {
        Ancestors { next: Some(self) }
    }
}

impl<S: fmt::Debug, A: fmt::Debug> fmt::Debug for Anchor<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor")
            .field("state", &self.state)
            .field("entry", &self.entry)
            .field("depth", &self.depth)
            .finish()
    }
}

// Unlink iteratively so dropping a long history cannot overflow the stack.
impl<S, A> Drop for Anchor<S, A> {
    fn drop(&mut self) {
        let mut next = self.predecessor.take();
        while let Some(anchor) = next {
            match Arc::try_unwrap(anchor) {
                Ok(mut inner) => next = inner.predecessor.take(),
                Err(_) => break,
            }
        }
    }
}

/// Iterator over an anchor and its predecessors, newest first.
pub struct Ancestors<'a, S, A> {
    next: Option<&'a Anchor<S, A>>,
}

impl<'a, S, A> Iterator for Ancestors<'a, S, A> {
    type Item = &'a Anchor<S, A>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.predecessor.as_deref();
        Some(current)
    }
}
