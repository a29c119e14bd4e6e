use {
    crate::{Completion, Event, EventId, HistoryError, Timestamp},
    kv_model::{KvOp, KvRet},
};

/// A collection of recorded [`Event`]s. Insertion order carries no meaning beyond assigning
/// each event its [`EventId`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct History {
    events: Vec<Event>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an operation that completed at `end` with the `observed` result.
    pub fn record(
        &mut self,
        start: f64,
        end: f64,
        op: KvOp,
        observed: KvRet,
    ) -> Result<&mut Self, HistoryError> {
        let index = self.events.len();
        let end = Completion::Returned(timestamp(index, end)?);
        self.push(timestamp(index, start)?, end, op, Some(observed))
    }

    /// Records an operation whose response was never observed. Any `observed` value is kept
    /// for diagnostics only; it never constrains a linearization.
    pub fn record_pending(
        &mut self,
        start: f64,
        op: KvOp,
        observed: Option<KvRet>,
    ) -> Result<&mut Self, HistoryError> {
        let start = timestamp(self.events.len(), start)?;
        Ok(self.push_pending(start, op, observed))
    }

    pub(crate) fn push(
        &mut self,
        start: Timestamp,
        end: Completion,
        op: KvOp,
        observed: Option<KvRet>,
    ) -> Result<&mut Self, HistoryError> {
        let index = self.events.len();
        if let Completion::Returned(end) = end {
            if end < start {
                return Err(HistoryError::InvalidInterval {
                    index,
                    start: start.as_secs_f64(),
                    end: end.as_secs_f64(),
                });
            }
            if observed.is_none() {
                return Err(HistoryError::MissingResult {
                    index,
                    op: op.name(),
                });
            }
        }
        self.events.push(Event {
            id: index.into(),
            start,
            end,
            op,
            observed,
        });
        Ok(self)
    }

    /// Pending events have no interval to violate and no result to require.
    pub(crate) fn push_pending(
        &mut self,
        start: Timestamp,
        op: KvOp,
        observed: Option<KvRet>,
    ) -> &mut Self {
        self.events.push(Event {
            id: self.events.len().into(),
            start,
            end: Completion::Pending,
            op,
            observed,
        });
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(usize::from(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The number of events that never completed.
    pub fn pending_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_pending()).count()
    }

    /// Events in ascending completion order, with pending events last. Ties are broken by
    /// start time and then by id so the order is deterministic.
    pub fn by_end(&self) -> Vec<&Event> {
        let mut sorted: Vec<&Event> = self.events.iter().collect();
        sorted.sort_by(|a, b| {
            a.end
                .cmp(&b.end)
                .then(a.start.cmp(&b.start))
                .then(a.id.cmp(&b.id))
        });
        sorted
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

pub(crate) fn timestamp(index: usize, secs: f64) -> Result<Timestamp, HistoryError> {
    Timestamp::from_secs_f64(secs).ok_or(HistoryError::NonFiniteTimestamp {
        index,
        value: secs,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn assigns_ids_in_insertion_order() -> Result<(), HistoryError> {
        let mut history = History::new();
        history
            .record(5.0, 6.0, KvOp::put("k", "v"), KvRet::PutOk { prev_kv: None })?
            .record_pending(1.0, KvOp::Clear, None)?;
        let ids: Vec<_> = history.iter().map(|e| usize::from(e.id())).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(history.pending_count(), 1);
        assert_eq!(history.get(1.into()).map(|e| e.op()), Some(&KvOp::Clear));
        Ok(())
    }

    #[test]
    fn rejects_backwards_intervals() {
        let mut history = History::new();
        let err = history
            .record(2.0, 1.0, KvOp::read("k"), KvRet::read_ok("k", None))
            .unwrap_err();
        assert!(matches!(
            err,
            HistoryError::InvalidInterval { index: 0, start, end } if start == 2.0 && end == 1.0
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn rejects_non_finite_times() {
        let mut history = History::new();
        assert!(matches!(
            history.record(0.0, f64::INFINITY, KvOp::Clear, KvRet::ClearOk),
            Err(HistoryError::NonFiniteTimestamp { index: 0, .. })
        ));
        assert!(matches!(
            history.record_pending(f64::NAN, KvOp::Clear, None),
            Err(HistoryError::NonFiniteTimestamp { index: 0, .. })
        ));
    }

    #[test]
    fn accepts_intervals_ending_at_negative_zero() -> Result<(), HistoryError> {
        let mut history = History::new();
        history.record(0.0, -0.0, KvOp::read("k"), KvRet::read_ok("k", None))?;
        let event = &history.events()[0];
        assert_eq!(event.end().returned(), Some(event.start()));
        Ok(())
    }

    #[test]
    fn orders_by_end_with_pending_last() -> Result<(), HistoryError> {
        let mut history = History::new();
        history
            .record_pending(0.0, KvOp::read("a"), None)?
            .record(3.0, 9.0, KvOp::read("b"), KvRet::read_ok("b", None))?
            .record(1.0, 4.0, KvOp::read("c"), KvRet::read_ok("c", None))?
            .record(0.5, 4.0, KvOp::read("d"), KvRet::read_ok("d", None))?;
        let order: Vec<_> = history
            .by_end()
            .into_iter()
            .map(|e| usize::from(e.id()))
            .collect();
        assert_eq!(order, vec![3, 2, 1, 0]);
        Ok(())
    }
}
