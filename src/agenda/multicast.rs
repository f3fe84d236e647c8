use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures::stream::{BoxStream, Stream, StreamExt};

use super::Agenda;
use crate::error::AgendaError;
use crate::runtime::lock;

/// Shares one agenda between several subscribers.
///
/// The source is polled by whichever subscriber asks first; every item is
/// buffered so each subscriber, including one that attaches late, observes
/// the full sequence and the same termination. The source is dropped once
/// it terminates or the last subscriber detaches.
pub(crate) struct Multicast<A> {
    shared: Mutex<Shared<A>>,
}

struct Shared<A> {
    source: Option<BoxStream<'static, Result<A, AgendaError>>>,
    buffer: Vec<A>,
    outcome: Option<Outcome>,
    wakers: Vec<Waker>,
    subscribers: usize,
}

#[derive(Clone)]
enum Outcome {
    Completed,
    Failed(AgendaError),
}

impl<A> Shared<A> {
    fn park(&mut self, waker: &Waker) {
        if !self.wakers.iter().any(|w| w.will_wake(waker)) {
            self.wakers.push(waker.clone());
        }
    }

    fn wake_all(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake();
        }
    }
}

impl<A: Clone + Send + 'static> Multicast<A> {
    pub(crate) fn new(agenda: Agenda<A>) -> Arc<Self> {
        Arc::new(Self {
            shared: Mutex::new(Shared {
                source: Some(agenda.into_stream()),
                buffer: Vec::new(),
                outcome: None,
                wakers: Vec::new(),
                subscribers: 0,
            }),
        })
    }

    /// Attach a new subscriber that starts from the first buffered item.
    pub(crate) fn subscribe(self: &Arc<Self>) -> AgendaSubscription<A> {
        lock(&self.shared).subscribers += 1;
        AgendaSubscription {
            multicast: Arc::clone(self),
            cursor: 0,
            finished: false,
        }
    }

    #[cfg(test)]
    fn is_torn_down(&self) -> bool {
        lock(&self.shared).source.is_none()
    }
}

/// One subscriber's view of a [`Multicast`].
pub(crate) struct AgendaSubscription<A> {
    multicast: Arc<Multicast<A>>,
    cursor: usize,
    finished: bool,
}

impl<A: Clone + Send + 'static> Stream for AgendaSubscription<A> {
    type Item = Result<A, AgendaError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        let mut shared = lock(&this.multicast.shared);

        if let Some(action) = shared.buffer.get(this.cursor) {
            let action = action.clone();
            this.cursor += 1;
            return Poll::Ready(Some(Ok(action)));
        }

        if let Some(outcome) = shared.outcome.clone() {
            this.finished = true;
            return Poll::Ready(match outcome {
                Outcome::Completed => None,
                Outcome::Failed(err) => Some(Err(err)),
            });
        }

        let Some(source) = shared.source.as_mut() else {
            this.finished = true;
            return Poll::Ready(None);
        };

        match source.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(action))) => {
                shared.buffer.push(action.clone());
                this.cursor += 1;
                shared.wake_all();
                Poll::Ready(Some(Ok(action)))
            }
            Poll::Ready(Some(Err(err))) => {
                shared.outcome = Some(Outcome::Failed(err.clone()));
                let source = shared.source.take();
                shared.wake_all();
                this.finished = true;
                drop(shared);
                drop(source);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                shared.outcome = Some(Outcome::Completed);
                let source = shared.source.take();
                shared.wake_all();
                this.finished = true;
                drop(shared);
                drop(source);
                Poll::Ready(None)
            }
            Poll::Pending => {
                shared.park(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl<A> Drop for AgendaSubscription<A> {
    fn drop(&mut self) {
        let mut shared = lock(&self.multicast.shared);
        shared.subscribers -= 1;
        if shared.outcome.is_some() {
            return;
        }
        if shared.subscribers == 0 {
            // Late subscribers replay the buffer and then see a completion.
            shared.outcome = Some(Outcome::Completed);
            let source = shared.source.take();
            drop(shared);
            drop(source);
        } else {
            // The source may only know this subscriber's waker.
            shared.wake_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn counted(values: Vec<u32>, polls: Arc<AtomicUsize>) -> Agenda<u32> {
        Agenda::from_stream(futures::stream::iter(values).map(move |v| {
            polls.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        }))
    }

    #[tokio::test]
    async fn source_runs_once_for_all_subscribers() {
        let polls = Arc::new(AtomicUsize::new(0));
        let multicast = Multicast::new(counted(vec![1, 2, 3], polls.clone()));
        let first = multicast.subscribe();
        let second = multicast.subscribe();

        let a: Vec<u32> = first.map(|r| r.unwrap()).collect().await;
        let b: Vec<u32> = second.map(|r| r.unwrap()).collect().await;

        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![1, 2, 3]);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn nothing_runs_before_first_poll() {
        let polls = Arc::new(AtomicUsize::new(0));
        let multicast = Multicast::new(counted(vec![1], polls.clone()));
        let _subscription = multicast.subscribe();
        assert_eq!(polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn late_subscriber_replays_buffer_and_error() {
        let agenda = Agenda::from_stream(futures::stream::iter(vec![
            Ok(1),
            Err(AgendaError::msg("boom")),
        ]));
        let multicast = Multicast::new(agenda);
        let early = multicast.subscribe();
        let early: Vec<_> = early.collect().await;
        assert_eq!(early.len(), 2);

        let late: Vec<_> = multicast.subscribe().collect().await;
        assert_eq!(late.len(), 2);
        assert_eq!(*late[0].as_ref().unwrap(), 1);
        assert_eq!(late[1].as_ref().unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn waiting_subscribers_are_woken_by_another_poller() {
        let (tx, rx) = mpsc::unbounded_channel();
        let multicast = Multicast::new(Agenda::from_stream(UnboundedReceiverStream::new(rx)));
        let mut first = multicast.subscribe();
        let mut second = multicast.subscribe();

        let reader = tokio::spawn(async move { second.next().await.map(|r| r.unwrap()) });
        tokio::task::yield_now().await;
        assert!(futures::poll!(first.next()).is_pending());

        tx.send(Ok(42)).unwrap();
        assert_eq!(first.next().await.unwrap().unwrap(), 42);
        assert_eq!(reader.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn last_detach_tears_down_source() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let agenda = Agenda::from_stream(futures::stream::pending::<Result<u8, AgendaError>>().map(
            move |item| {
                let _keep = &flag;
                item
            },
        ));
        let multicast = Multicast::new(agenda);
        let first = multicast.subscribe();
        let second = multicast.subscribe();

        drop(first);
        assert!(!dropped.load(Ordering::SeqCst));
        drop(second);
        assert!(dropped.load(Ordering::SeqCst));
        assert!(multicast.is_torn_down());
        assert!(multicast.subscribe().collect::<Vec<_>>().await.is_empty());
    }
}
