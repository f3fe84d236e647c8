use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use super::{Reducer, StoreHandle};
use crate::action::Action;
use crate::agenda::{AgendaId, AgendaObserver, AgendaSink};
use crate::anchor::{Anchor, Entry};
use crate::error::{AgendaError, Error};
use crate::runtime::lock;

/// Folds every published agenda into one reducer's history.
///
/// The engine owns the anchor chain of its store. All chain updates happen
/// under `core`, so actions from concurrently delivered agendas are folded
/// one at a time in the order they reach the store.
pub(crate) struct StoreEngine<S, A> {
    reducer: Reducer<S, A>,
    handle: StoreHandle<S>,
    core: Mutex<Core<S, A>>,
    log_changes: bool,
}

struct Core<S, A> {
    anchor: Arc<Anchor<S, A>>,
    next_seq: u64,
}

impl<S, A> StoreEngine<S, A>
where
    S: Debug + Send + Sync + 'static,
    A: Action,
{
    /// Seed a store by folding the init action into `initial`.
    pub(crate) fn new(name: String, reducer: Reducer<S, A>, initial: S, log_changes: bool) -> Arc<Self> {
        let init = A::init();
        let state = reducer.apply(&Arc::new(initial), &init);
        let anchor = Anchor::root(Arc::clone(&state), init);
        if log_changes {
            tracing::info!(store = %name, ?state, "store seeded");
        }
        Arc::new(Self {
            handle: StoreHandle::new(name, state),
            reducer,
            core: Mutex::new(Core {
                anchor,
                next_seq: 1,
            }),
            log_changes,
        })
    }

    pub(crate) fn handle(&self) -> &StoreHandle<S> {
        &self.handle
    }

    fn name(&self) -> &str {
        self.handle.name()
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        lock(&self.core).anchor.depth()
    }
}

impl<S, A> AgendaSink<A> for StoreEngine<S, A>
where
    S: Debug + Send + Sync + 'static,
    A: Action,
{
    fn open(self: Arc<Self>, agenda: AgendaId) -> Box<dyn AgendaObserver<A>> {
        Box::new(StoreSubscription {
            engine: self,
            agenda,
            pivot: None,
            bucket: Vec::new(),
        })
    }
}

/// One store's subscription to one agenda.
struct StoreSubscription<S, A> {
    engine: Arc<StoreEngine<S, A>>,
    agenda: AgendaId,
    /// The anchor in effect before this agenda's first action.
    pivot: Option<Arc<Anchor<S, A>>>,
    /// Everything this agenda has contributed to the store so far.
    bucket: Vec<Entry<A>>,
}

impl<S, A> AgendaObserver<A> for StoreSubscription<S, A>
where
    S: Debug + Send + Sync + 'static,
    A: Action,
{
    fn next(&mut self, action: A) {
        let engine = &self.engine;
        let mut core = lock(&engine.core);
        if self.pivot.is_none() {
            self.pivot = Some(Arc::clone(&core.anchor));
        }

        let entry = Entry::new(core.next_seq, action);
        core.next_seq += 1;
        self.bucket.push(entry.clone());

        let candidate = core.anchor.fold(entry, engine.reducer.as_fn());
        let changed = !Arc::ptr_eq(candidate.state(), core.anchor.state());
        core.anchor = candidate;

        if changed {
            let state = Arc::clone(core.anchor.state());
            if engine.log_changes {
                tracing::info!(
                    store = engine.name(),
                    agenda = %self.agenda,
                    action = core.anchor.entry().action().name(),
                    ?state,
                    "state changed"
                );
            }
            // Emitting under the core lock keeps emissions in fold order.
            engine.handle.emit(state);
        }
    }

    fn fail(self: Box<Self>, err: AgendaError) {
        let engine = &self.engine;
        let failure = Error::from(err);
        if !engine.log_changes {
            tracing::error!(store = engine.name(), agenda = %self.agenda, error = %failure, "rolling back agenda");
        }

        let Some(pivot) = &self.pivot else {
            return;
        };
        if self.bucket.is_empty() {
            return;
        }

        let excluded: HashSet<u64> = self.bucket.iter().map(Entry::seq).collect();
        let mut core = lock(&engine.core);
        let previous = Arc::clone(core.anchor.state());
        core.anchor = core
            .anchor
            .exclude(pivot, |entry| excluded.contains(&entry.seq()), engine.reducer.as_fn());

        let current = Arc::clone(core.anchor.state());
        if Arc::ptr_eq(&previous, &current) {
            return;
        }
        if engine.log_changes {
            let reverted: Vec<&str> = self.bucket.iter().map(|e| e.action().name()).collect();
            tracing::warn!(
                store = engine.name(),
                agenda = %self.agenda,
                error = %failure,
                ?reverted,
                from = ?previous,
                to = ?current,
                "agenda failed, reverted its actions"
            );
        }
        engine.handle.emit(current);
    }

    fn complete(self: Box<Self>) {
        tracing::trace!(store = self.engine.name(), agenda = %self.agenda, "agenda completed");
    }
}
