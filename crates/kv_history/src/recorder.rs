use {
    crate::{Completion, History, HistoryError, Timestamp},
    kv_model::{KvOp, KvRet},
    std::{
        collections::BTreeMap,
        fmt::{self, Display, Formatter},
        sync::{Mutex, MutexGuard, PoisonError},
        time::Instant,
    },
    tracing::trace,
};

/// Identifies a request in flight with a [`Recorder`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ticket(u64);

impl Display for Ticket {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Captures a [`History`] from live clients.
///
/// Wrap each request with [`Recorder::invoke`] before it is sent and [`Recorder::complete`]
/// once its response arrives. Timestamps come from a single monotonic clock, so the recorder
/// can be shared (e.g. via `Arc`) by any number of concurrent clients. Requests that are still
/// outstanding when [`Recorder::finish`] is called become pending events.
#[derive(Debug)]
pub struct Recorder {
    epoch: Instant,
    state: Mutex<RecorderState>,
}

#[derive(Debug, Default)]
struct RecorderState {
    next_ticket: u64,
    in_flight: BTreeMap<Ticket, (Timestamp, KvOp)>,
    history: History,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            epoch: Instant::now(),
            state: Mutex::new(RecorderState::default()),
        }
    }

    fn now(&self) -> Timestamp {
        // Elapsed time since a fixed instant is always finite.
        Timestamp::from_secs_f64(self.epoch.elapsed().as_secs_f64()).unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamps the start of a request.
    pub fn invoke(&self, op: KvOp) -> Ticket {
        let mut state = self.lock();
        let start = self.now();
        let ticket = Ticket(state.next_ticket);
        state.next_ticket += 1;
        trace!(%ticket, %op, %start, "Invoked.");
        state.in_flight.insert(ticket, (start, op));
        ticket
    }

    /// Stamps the end of a request and records the result its client observed.
    pub fn complete(&self, ticket: Ticket, observed: KvRet) -> Result<(), HistoryError> {
        let mut state = self.lock();
        let end = self.now();
        let (start, op) = state
            .in_flight
            .remove(&ticket)
            .ok_or(HistoryError::UnknownTicket(ticket.0))?;
        trace!(%ticket, %observed, %end, "Completed.");
        state
            .history
            .push(start, Completion::Returned(end), op, Some(observed))?;
        Ok(())
    }

    /// The number of requests invoked but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Stops recording. Every request still in flight is recorded as pending, in invocation
    /// order, after the completed ones.
    pub fn finish(self) -> History {
        let RecorderState {
            in_flight,
            mut history,
            ..
        } = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.is_empty() {
            trace!(count = in_flight.len(), "Recording outstanding requests as pending.");
        }
        for (_ticket, (start, op)) in in_flight {
            history.push_pending(start, op, None);
        }
        history
    }
}

#[cfg(test)]
mod test {
    use {super::*, std::sync::Arc, std::thread};

    #[test]
    fn outstanding_requests_become_pending() -> Result<(), HistoryError> {
        let recorder = Recorder::new();
        let put = recorder.invoke(KvOp::put("k", "v"));
        let _read = recorder.invoke(KvOp::read("k"));
        recorder.complete(put, KvRet::PutOk { prev_kv: None })?;
        assert_eq!(recorder.in_flight(), 1);

        let history = recorder.finish();
        assert_eq!(history.len(), 2);
        let (completed, pending) = (&history.events()[0], &history.events()[1]);
        assert_eq!(completed.op(), &KvOp::put("k", "v"));
        assert!(completed.end() >= Completion::Returned(completed.start()));
        assert_eq!(pending.op(), &KvOp::read("k"));
        assert!(pending.is_pending());
        assert!(pending.observed().is_none());
        assert_eq!(usize::from(pending.id()), 1);
        assert!(pending.start() >= completed.start());
        Ok(())
    }

    #[test]
    fn rejects_unknown_or_repeated_tickets() -> Result<(), HistoryError> {
        let recorder = Recorder::new();
        let ticket = recorder.invoke(KvOp::Clear);
        recorder.complete(ticket, KvRet::ClearOk)?;
        assert!(matches!(
            recorder.complete(ticket, KvRet::ClearOk),
            Err(HistoryError::UnknownTicket(0))
        ));
        Ok(())
    }

    #[test]
    fn is_shareable_across_threads() {
        let recorder = Arc::new(Recorder::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    let ticket = recorder.invoke(KvOp::put("k", i.to_string()));
                    recorder
                        .complete(ticket, KvRet::PutOk { prev_kv: None })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let history = Arc::try_unwrap(recorder).unwrap().finish();
        assert_eq!(history.len(), 4);
        assert_eq!(history.pending_count(), 0);
    }
}
