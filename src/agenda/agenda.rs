use std::fmt;
use std::future::{self as std_future, Future};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::AgendaError;

/// Identifies one published agenda in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgendaId(pub(crate) u64);

impl AgendaId {
    /// The raw counter value, unique per dispatcher.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgendaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agenda#{}", self.0)
    }
}

/// A lazily started sequence of actions.
///
/// Nothing runs until the dispatcher delivers the agenda to its first
/// subscriber. An agenda ends either by completing or with the first
/// [`AgendaError`] it yields; items after an error are never observed.
///
/// # Examples
///
/// ```
/// use agendum::{Agenda, AgendaError};
/// use futures::{executor::block_on, StreamExt};
///
/// let first = Agenda::from_actions(vec![1, 2]);
/// let second = Agenda::of(3);
/// let items: Vec<_> = block_on(Agenda::concat(vec![first, second]).collect());
/// assert_eq!(items.len(), 3);
///
/// let failing = Agenda::concat(vec![Agenda::fail(AgendaError::msg("boom")), Agenda::of(4)]);
/// let items: Vec<_> = block_on(failing.collect());
/// assert_eq!(items.len(), 1);
/// assert!(items[0].is_err());
/// ```
pub struct Agenda<A> {
    stream: BoxStream<'static, Result<A, AgendaError>>,
}

impl<A: Send + 'static> Agenda<A> {
    /// Wrap an arbitrary stream of actions.
    pub fn from_stream<St>(stream: St) -> Self
    where
        St: Stream<Item = Result<A, AgendaError>> + Send + 'static,
    {
        Self {
            stream: until_failure(stream).boxed(),
        }
    }

    /// A single action, available immediately.
    pub fn of(action: A) -> Self {
        Self {
            stream: stream::once(std_future::ready(Ok(action))).boxed(),
        }
    }

    /// A fixed list of actions, emitted in order.
    pub fn from_actions<I>(actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        let actions: Vec<A> = actions.into_iter().collect();
        Self {
            stream: stream::iter(actions.into_iter().map(Ok)).boxed(),
        }
    }

    /// A single action produced by `future`, or its failure.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<A, AgendaError>> + Send + 'static,
    {
        Self {
            stream: stream::once(future).boxed(),
        }
    }

    /// An agenda that fails without emitting anything.
    pub fn fail(err: AgendaError) -> Self {
        Self {
            stream: stream::once(std_future::ready(Err(err))).boxed(),
        }
    }

    /// An agenda that completes without emitting anything.
    pub fn empty() -> Self {
        Self {
            stream: stream::empty().boxed(),
        }
    }

    /// Run `agendas` one after another.
    ///
    /// Each agenda starts only once the previous one has completed. The
    /// first failure ends the whole concatenation.
    pub fn concat<I>(agendas: I) -> Self
    where
        I: IntoIterator<Item = Agenda<A>>,
    {
        let agendas: Vec<Agenda<A>> = agendas.into_iter().collect();
        Self::from_stream(stream::iter(agendas).flatten())
    }

    /// Unwrap into the underlying boxed stream.
    pub fn into_stream(self) -> BoxStream<'static, Result<A, AgendaError>> {
        self.stream
    }
}

impl<A: Send + 'static> FromIterator<A> for Agenda<A> {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self::from_actions(iter)
    }
}

impl<A> Stream for Agenda<A> {
    type Item = Result<A, AgendaError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

impl<A> fmt::Debug for Agenda<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agenda").finish_non_exhaustive()
    }
}

fn until_failure<St, A>(stream: St) -> impl Stream<Item = Result<A, AgendaError>>
where
    St: Stream<Item = Result<A, AgendaError>>,
{
    stream.scan(false, |failed, item| {
        if *failed {
            return std_future::ready(None);
        }
        *failed = item.is_err();
        std_future::ready(Some(item))
    })
}
