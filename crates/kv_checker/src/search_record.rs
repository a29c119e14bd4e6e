use {
    kv_history::EventId,
    kv_model::{KvOp, KvRet},
    std::fmt::{Display, Formatter},
};

/// One step of the linearizability search, as reported to a [`Visitor`](crate::Visitor).
///
/// `depth` is the number of events already linearized when the step was taken.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SearchRecord {
    /// The event was applied to the store and the search descended.
    Applied {
        depth: usize,
        event: EventId,
        op: KvOp,
        predicted: KvRet,
    },
    /// The store predicted a different result than the client observed.
    Rejected {
        depth: usize,
        event: EventId,
        op: KvOp,
        predicted: KvRet,
        observed: KvRet,
    },
    /// Applying the event led to a subproblem that was already explored without success.
    Revisited {
        depth: usize,
        event: EventId,
        op: KvOp,
    },
    /// Every continuation after the event failed, so it was taken back.
    Backtracked {
        depth: usize,
        event: EventId,
        op: KvOp,
    },
}

impl SearchRecord {
    pub fn depth(&self) -> usize {
        match self {
            SearchRecord::Applied { depth, .. }
            | SearchRecord::Rejected { depth, .. }
            | SearchRecord::Revisited { depth, .. }
            | SearchRecord::Backtracked { depth, .. } => *depth,
        }
    }

    pub fn event(&self) -> EventId {
        match self {
            SearchRecord::Applied { event, .. }
            | SearchRecord::Rejected { event, .. }
            | SearchRecord::Revisited { event, .. }
            | SearchRecord::Backtracked { event, .. } => *event,
        }
    }
}

impl Display for SearchRecord {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            SearchRecord::Applied {
                depth,
                event,
                op,
                predicted,
            } => write!(formatter, "{depth}: apply {event} {op} → {predicted}"),
            SearchRecord::Rejected {
                depth,
                event,
                op,
                predicted,
                observed,
            } => write!(
                formatter,
                "{depth}: reject {event} {op} → {predicted}, observed {observed}"
            ),
            SearchRecord::Revisited { depth, event, op } => {
                write!(formatter, "{depth}: skip {event} {op} (explored)")
            }
            SearchRecord::Backtracked { depth, event, op } => {
                write!(formatter, "{depth}: undo {event} {op}")
            }
        }
    }
}
