//! Histories of timed operations recorded against a key-value store.
//!
//! Every client request becomes one [`Event`]: when it was invoked, when (or whether) it
//! completed, which [`KvOp`] it carried, and which [`KvRet`] the client observed. A [`History`]
//! is the collection of those events, in no particular order, that a linearizability checker
//! consumes.
//!
//! Histories can be built in three ways:
//!
//! - programmatically with [`History::record`] and [`History::record_pending`],
//! - live, by wrapping requests with a [`Recorder`], or
//! - from the JSON trace format with [`History::from_json`]:
//!
//! ```
//! use kv_history::{Completion, History};
//!
//! let history = History::from_json(r#"[
//!     {"start": 1.0, "end": 2.0, "op": "put",
//!      "input": {"key": "1", "value": "2"}, "result": {"prev_kv": null}},
//!     {"start": 1.5, "end": null, "op": "read", "input": {"key": "1"}, "result": null}
//! ]"#)?;
//! assert_eq!(history.len(), 2);
//! assert_eq!(history.events()[1].end(), Completion::Pending);
//! # Ok::<(), kv_history::HistoryError>(())
//! ```

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod error;
mod event;
mod history;
mod recorder;
mod wire;

pub use error::HistoryError;
pub use event::{Completion, Event, EventId, Timestamp};
pub use history::History;
pub use kv_model::{KeyValue, KvOp, KvRet};
pub use recorder::{Recorder, Ticket};
