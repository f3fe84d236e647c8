//! Built-in sinks: the combined action stream and the agenda logger.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::action::Action;
use crate::agenda::{AgendaId, AgendaObserver, AgendaSink};
use crate::error::{AgendaError, Error};

/// Fans every agenda into one channel.
pub(super) struct ForwardSink<A> {
    tx: UnboundedSender<A>,
}

impl<A> ForwardSink<A> {
    pub(super) fn new(tx: UnboundedSender<A>) -> Self {
        Self { tx }
    }
}

impl<A: Action> AgendaSink<A> for ForwardSink<A> {
    fn open(self: Arc<Self>, _agenda: AgendaId) -> Box<dyn AgendaObserver<A>> {
        Box::new(Forward {
            tx: self.tx.clone(),
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct Forward<A> {
    tx: UnboundedSender<A>,
}

impl<A: Action> AgendaObserver<A> for Forward<A> {
    fn next(&mut self, action: A) {
        // A closed receiver just means nobody listens anymore.
        let _ = self.tx.send(action);
    }

    fn fail(self: Box<Self>, _err: AgendaError) {}

    fn complete(self: Box<Self>) {}
}

/// Reports agendas and their actions when agenda logging is on.
pub(super) struct AgendaLogger;

impl<A: Action> AgendaSink<A> for AgendaLogger {
    fn open(self: Arc<Self>, agenda: AgendaId) -> Box<dyn AgendaObserver<A>> {
        tracing::debug!(%agenda, "agenda published");
        Box::new(AgendaLog { agenda, actions: 0 })
    }
}

struct AgendaLog {
    agenda: AgendaId,
    actions: usize,
}

impl<A: Action> AgendaObserver<A> for AgendaLog {
    fn next(&mut self, action: A) {
        self.actions += 1;
        tracing::debug!(agenda = %self.agenda, action = action.name(), ?action, "action");
    }

    fn fail(self: Box<Self>, err: AgendaError) {
        let failure = Error::from(err);
        tracing::warn!(agenda = %self.agenda, actions = self.actions, error = %failure, "agenda terminated");
    }

    fn complete(self: Box<Self>) {
        tracing::debug!(agenda = %self.agenda, actions = self.actions, "agenda completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn forward_sink_sends_every_action() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Arc::new(ForwardSink::new(tx));
        let mut first = Arc::clone(&sink).open(AgendaId(1));
        let mut second = sink.open(AgendaId(2));
        first.next(serde_json::json!({ "type": "A" }));
        second.next(serde_json::json!({ "type": "B" }));
        first.complete();
        second.fail(AgendaError::msg("boom"));

        assert_eq!(rx.try_recv().unwrap()["type"], "A");
        assert_eq!(rx.try_recv().unwrap()["type"], "B");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn forward_sink_closes_with_its_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let sink = ForwardSink::new(tx);
        assert!(!AgendaSink::<serde_json::Value>::is_closed(&sink));
        drop(rx);
        assert!(AgendaSink::<serde_json::Value>::is_closed(&sink));
        assert!(!AgendaSink::<serde_json::Value>::is_closed(&AgendaLogger));
    }

    #[test]
    fn forward_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<serde_json::Value>();
        drop(rx);
        let mut observer = Arc::new(ForwardSink::new(tx)).open(AgendaId(1));
        observer.next(serde_json::json!({ "type": "A" }));
        observer.complete();
    }

    #[test]
    fn agenda_log_reports_failures_as_agenda_failures() {
        let buf = Arc::new(std::sync::Mutex::new(Vec::new()));
        let writer = Arc::clone(&buf);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || Captured(Arc::clone(&writer)))
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut observer: Box<dyn AgendaObserver<serde_json::Value>> =
                Arc::new(AgendaLogger).open(AgendaId(7));
            observer.next(serde_json::json!({ "type": "A" }));
            observer.fail(AgendaError::msg("boom"));
        });

        let output = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(output.contains("agenda published"));
        assert!(output.contains("WARN"));
        assert!(output.contains("agenda failed: boom"));
    }

    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
