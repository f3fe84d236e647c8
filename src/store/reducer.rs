use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The function behind a [`Reducer`].
pub type ReduceFn<S, A> = dyn Fn(&Arc<S>, &A) -> Arc<S> + Send + Sync;

static NEXT_REDUCER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a reducer, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReducerId(u64);

impl fmt::Display for ReducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reducer#{}", self.0)
    }
}

/// A pure function `(state, action) -> state` with a stable identity.
///
/// The dispatcher keeps one store per reducer identity: every clone of a
/// `Reducer` refers to the same store, while two reducers built from the
/// same closure are distinct.
///
/// Returning the incoming `Arc` unchanged tells the store nothing happened,
/// and subscribers are not notified.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use agendum::Reducer;
///
/// let counter = Reducer::named("counter", |state: &Arc<i64>, delta: &i64| {
///     if *delta == 0 {
///         Arc::clone(state)
///     } else {
///         Arc::new(**state + delta)
///     }
/// });
///
/// let zero = Arc::new(0);
/// assert_eq!(*counter.apply(&zero, &5), 5);
/// assert!(Arc::ptr_eq(&counter.apply(&zero, &0), &zero));
/// assert_eq!(counter.id(), counter.clone().id());
/// ```
pub struct Reducer<S, A> {
    id: ReducerId,
    name: Option<Arc<str>>,
    reduce: Arc<ReduceFn<S, A>>,
}

impl<S, A> Reducer<S, A> {
    /// Wrap `reduce` under a fresh identity.
    pub fn new<F>(reduce: F) -> Self
    where
        F: Fn(&Arc<S>, &A) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            id: ReducerId(NEXT_REDUCER_ID.fetch_add(1, Ordering::Relaxed)),
            name: None,
            reduce: Arc::new(reduce),
        }
    }

    /// Like [`Reducer::new`], with a name that shows up in diagnostics.
    pub fn named<F>(name: impl Into<Arc<str>>, reduce: F) -> Self
    where
        F: Fn(&Arc<S>, &A) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(reduce)
        }
    }

    /// Build a reducer from a function that returns `None` for actions it
    /// ignores and `Some(next)` otherwise.
    pub fn optional<F>(reduce: F) -> Self
    where
        F: Fn(&S, &A) -> Option<S> + Send + Sync + 'static,
        S: 'static,
        A: 'static,
    {
        Self::new(move |state: &Arc<S>, action: &A| match reduce(&**state, action) {
            Some(next) => Arc::new(next),
            None => Arc::clone(state),
        })
    }

    /// Attach a diagnostic name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The identity stores are registered under. Clones share it.
    pub fn id(&self) -> ReducerId {
        self.id
    }

    /// The diagnostic name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or the identity when the reducer is anonymous.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => self.id.to_string(),
        }
    }

    /// Run the reducer once.
    pub fn apply(&self, state: &Arc<S>, action: &A) -> Arc<S> {
        (self.reduce)(state, action)
    }

    pub(crate) fn as_fn(&self) -> &ReduceFn<S, A> {
        &*self.reduce
    }
}

impl<S, A> Clone for Reducer<S, A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            reduce: Arc::clone(&self.reduce),
        }
    }
}

impl<S, A> fmt::Debug for Reducer<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
