//! Per-sink delivery.
//!
//! Every sink owns one lane. Publishing pushes the sink's subscription to the
//! new agenda onto the lane's queue, and a single driver task per lane feeds
//! the sink's observers. The driver keeps open agendas in publish order and
//! drains whatever the oldest one has ready before looking at the next, so
//! agendas that are ready right away reach the sink in the order they were
//! published.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, FutureExt};
use futures::StreamExt;
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};

use crate::agenda::{AgendaObserver, AgendaSink, AgendaSubscription};
use crate::runtime::Scheduler;

/// One sink's subscription to one agenda.
pub(super) struct Delivery<A> {
    subscription: AgendaSubscription<A>,
    observer: Option<Box<dyn AgendaObserver<A>>>,
}

impl<A: Clone + Send + 'static> Delivery<A> {
    pub(super) fn new(subscription: AgendaSubscription<A>, observer: Box<dyn AgendaObserver<A>>) -> Self {
        Self {
            subscription,
            observer: Some(observer),
        }
    }

    /// Forward everything that is ready. Returns `true` once the agenda has
    /// terminated and the observer was told so.
    fn pump(&mut self, cx: &mut Context<'_>) -> bool {
        loop {
            match self.subscription.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(action))) => {
                    if let Some(observer) = self.observer.as_mut() {
                        observer.next(action);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    if let Some(observer) = self.observer.take() {
                        observer.fail(err);
                    }
                    return true;
                }
                Poll::Ready(None) => {
                    if let Some(observer) = self.observer.take() {
                        observer.complete();
                    }
                    return true;
                }
                Poll::Pending => return false,
            }
        }
    }
}

/// A sink together with the queue of its driver.
pub(super) struct Lane<A> {
    sink: Arc<dyn AgendaSink<A>>,
    queue: Option<UnboundedSender<Delivery<A>>>,
}

impl<A: Clone + Send + 'static> Lane<A> {
    pub(super) fn new(sink: Arc<dyn AgendaSink<A>>) -> Self {
        Self { sink, queue: None }
    }

    pub(super) fn sink(&self) -> &Arc<dyn AgendaSink<A>> {
        &self.sink
    }

    /// Queue `delivery`, starting the driver on first use or after the
    /// previous one went away with its runtime.
    pub(super) fn send(&mut self, delivery: Delivery<A>, scheduler: &dyn Scheduler) {
        let delivery = match &self.queue {
            Some(queue) => match queue.send(delivery) {
                Ok(()) => return,
                Err(SendError(delivery)) => delivery,
            },
            None => delivery,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(delivery);
        scheduler.spawn(drive(rx).boxed());
        self.queue = Some(tx);
    }
}

/// Run every delivery queued for one sink until the lane is dropped and the
/// last open agenda has terminated.
async fn drive<A: Clone + Send + 'static>(mut incoming: UnboundedReceiver<Delivery<A>>) {
    let mut open: Vec<Delivery<A>> = Vec::new();
    let mut accepting = true;
    future::poll_fn(move |cx| {
        while accepting {
            match incoming.poll_recv(cx) {
                Poll::Ready(Some(delivery)) => open.push(delivery),
                Poll::Ready(None) => accepting = false,
                Poll::Pending => break,
            }
        }

        open.retain_mut(|delivery| !delivery.pump(cx));

        if accepting || !open.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::{Agenda, AgendaId, Multicast};
    use crate::error::AgendaError;
    use crate::runtime::TokioScheduler;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    /// Records every observer event as text.
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl AgendaSink<u32> for Recorder {
        fn open(self: Arc<Self>, agenda: AgendaId) -> Box<dyn AgendaObserver<u32>> {
            Box::new(Record {
                agenda,
                events: Arc::clone(&self.events),
            })
        }
    }

    struct Record {
        agenda: AgendaId,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl AgendaObserver<u32> for Record {
        fn next(&mut self, action: u32) {
            self.events.lock().unwrap().push(format!("{}:{action}", self.agenda.get()));
        }

        fn fail(self: Box<Self>, err: AgendaError) {
            self.events.lock().unwrap().push(format!("{}:fail:{err}", self.agenda.get()));
        }

        fn complete(self: Box<Self>) {
            self.events.lock().unwrap().push(format!("{}:done", self.agenda.get()));
        }
    }

    fn lane() -> (Lane<u32>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::new(Recorder {
            events: Arc::clone(&events),
        });
        (Lane::new(sink), events)
    }

    fn deliver(lane: &mut Lane<u32>, id: u64, agenda: Agenda<u32>) {
        let multicast = Multicast::new(agenda);
        let observer = Arc::clone(lane.sink()).open(AgendaId(id));
        lane.send(Delivery::new(multicast.subscribe(), observer), &TokioScheduler::new());
    }

    #[tokio::test]
    async fn ready_agendas_arrive_in_publish_order() {
        let (mut lane, events) = lane();
        deliver(&mut lane, 1, Agenda::from_actions(vec![1, 2]));
        deliver(&mut lane, 2, Agenda::of(3));
        deliver(&mut lane, 3, Agenda::fail(AgendaError::msg("boom")));

        let (tx, rx) = oneshot::channel();
        deliver(
            &mut lane,
            4,
            Agenda::from_future(async move {
                let _ = tx.send(());
                Ok(4)
            }),
        );
        rx.await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(
            *events.lock().unwrap(),
            vec!["1:1", "1:2", "1:done", "2:3", "2:done", "3:fail:boom", "4:4", "4:done"]
        );
    }

    #[tokio::test]
    async fn pending_agenda_does_not_block_later_ones() {
        let (mut lane, events) = lane();
        let (tx, rx) = mpsc::unbounded_channel();
        deliver(
            &mut lane,
            1,
            Agenda::from_stream(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)),
        );
        deliver(&mut lane, 2, Agenda::of(7));
        tokio::task::yield_now().await;
        assert_eq!(*events.lock().unwrap(), vec!["2:7", "2:done"]);

        tx.send(Ok(5)).unwrap();
        drop(tx);
        tokio::task::yield_now().await;
        assert_eq!(
            *events.lock().unwrap(),
            vec!["2:7", "2:done", "1:5", "1:done"]
        );
    }

    #[tokio::test]
    async fn one_driver_per_lane() {
        struct Counting(Arc<Mutex<usize>>);

        impl Scheduler for Counting {
            fn spawn(&self, task: futures::future::BoxFuture<'static, ()>) {
                *self.0.lock().unwrap() += 1;
                tokio::spawn(task);
            }
        }

        let spawned = Arc::new(Mutex::new(0));
        let scheduler = Counting(Arc::clone(&spawned));
        let (mut lane, events) = lane();
        for id in 0..5 {
            let multicast = Multicast::new(Agenda::of(id as u32));
            let observer = Arc::clone(lane.sink()).open(AgendaId(id));
            lane.send(Delivery::new(multicast.subscribe(), observer), &scheduler);
        }
        tokio::task::yield_now().await;

        assert_eq!(*spawned.lock().unwrap(), 1);
        assert_eq!(events.lock().unwrap().len(), 10);
    }
}
