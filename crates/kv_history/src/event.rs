use {
    kv_model::{KvOp, KvRet},
    std::{
        cmp::Ordering,
        fmt::{self, Debug, Display, Formatter},
    },
};

/// Seconds since an arbitrary epoch shared by every client of a history. Always finite.
#[derive(Clone, Copy, Default)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Returns `None` for NaN and infinities. Negative zero becomes zero.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        secs.is_finite().then_some(Timestamp(secs + 0.0))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, rhs: &Self) -> bool {
        self.cmp(rhs) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, rhs: &Self) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, rhs: &Self) -> Ordering {
        self.0.total_cmp(&rhs.0)
    }
}

/// When an operation completed. `Pending` sorts after every returned timestamp.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Completion {
    Returned(Timestamp),
    /// No response was observed before the history was collected.
    Pending,
}

impl Completion {
    pub fn is_pending(self) -> bool {
        matches!(self, Completion::Pending)
    }

    pub fn returned(self) -> Option<Timestamp> {
        match self {
            Completion::Returned(t) => Some(t),
            Completion::Pending => None,
        }
    }
}

impl Display for Completion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Returned(t) => Display::fmt(t, f),
            Completion::Pending => f.write_str("pending"),
        }
    }
}

/// The position of an event in its [`History`](crate::History).
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EventId(usize);

impl Debug for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        Display::fmt(&self.0, f)
    }
}

impl From<EventId> for usize {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl From<usize> for EventId {
    fn from(n: usize) -> Self {
        EventId(n)
    }
}

/// One recorded client operation. Immutable once recorded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    pub(crate) id: EventId,
    pub(crate) start: Timestamp,
    pub(crate) end: Completion,
    pub(crate) op: KvOp,
    pub(crate) observed: Option<KvRet>,
}

impl Event {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Completion {
        self.end
    }

    pub fn op(&self) -> &KvOp {
        &self.op
    }

    /// The result the client received. Always present for returned events; for pending events
    /// it is whatever the collector attached, and carries no meaning.
    pub fn observed(&self) -> Option<&KvRet> {
        self.observed.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.end.is_pending()
    }

    /// The result a linearization must reproduce, or `None` if the event is unconstrained.
    pub fn required_result(&self) -> Option<&KvRet> {
        match self.end {
            Completion::Returned(_) => self.observed.as_ref(),
            Completion::Pending => None,
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} @[{}, {}]", self.id, self.op, self.start, self.end)?;
        match self.required_result() {
            Some(ret) => write!(f, " → {ret}"),
            None => f.write_str(" → ?"),
        }
    }
}
