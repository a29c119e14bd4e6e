//! KV Checker decides whether a recorded history of key-value store operations is
//! linearizable, i.e. whether the concurrent operations clients observed are explainable by
//! some serial execution against a single-node map that respects real time.
//!
//! # Example
//!
//! ```rust
//! use kv_checker::*;
//! use kv_history::{EventId, History, KeyValue, KvOp, KvRet};
//!
//! // Two clients write concurrently, then a third reads the key.
//! let mut history = History::new();
//! history
//!     .record(0.0, 2.0, KvOp::put("k", "a"), KvRet::PutOk { prev_kv: None })?
//!     .record(1.0, 3.0, KvOp::put("k", "b"), KvRet::PutOk {
//!         prev_kv: Some(KeyValue::new("k", "a")),
//!     })?
//!     .record(4.0, 5.0, KvOp::read("k"), KvRet::read_ok("k", Some("b")))?;
//!
//! let mut checker = Checker::new();
//! let result = checker.check(&history);
//! assert!(result.is_linearizable());
//!
//! // A stale read contradicts every order of the writes.
//! history.record(6.0, 7.0, KvOp::read("k"), KvRet::read_ok("k", Some("a")))?;
//! let mismatch = checker.assert_not_linearizable(&history).unwrap();
//! assert_eq!(mismatch.event, EventId::from(3));
//! # Ok::<(), kv_history::HistoryError>(())
//! ```
//!
//! The `kv-checker` binary applies the same check to a JSON history file. See `--help`.

#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod checker;
mod config;
mod report;
mod search_record;
mod visitor;

/// Asserts the [`Display`](std::fmt::Display) form of each item (e.g. each [`SearchRecord`]),
/// printing any unexpected trailing items so they can be pasted into the assertion.
#[macro_export]
macro_rules! assert_search {
    // Case 1: No expected records specified.
    [$records:expr $(,)?] => {{
        let records = $records;
        if !records.is_empty() {
            println!("Missing some records:");
            for r in records.iter() {
                println!("\"{}\",", format!("{}", r).escape_debug().to_string());
            }
            panic!("^");
        }
    }};
    // Case 2: Expected record(s) specified. Requires recursion.
    [$records:expr, $str:tt, $($rest:tt)*] => {{
        let records = $records;
        $crate::assert_search_![0 => records, $str, $($rest)*];
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! assert_search_ {
    // Base case: only one string to assert.
    ($i:expr => $records:expr, $str:tt $(,)?) => (
        assert!($i < $records.len(), "missing record [{}]: {}", $i, $str);
        assert_eq!($records[$i].to_string().as_str(), $str, "at [{}]", $i);
        if $i + 1 < $records.len() {
            println!("Missing some records:");
            for r in $records.iter().skip($i + 1) {
                println!("\"{}\",", format!("{}", r).escape_debug().to_string());
            }
            panic!("^");
        }
    );
    // Inductive case: assert and recurse.
    ($i:expr => $records:expr, $str:tt, $($rest:tt)*) => (
        assert!($i < $records.len(), "missing record [{}]: {}", $i, $str);
        assert_eq!($records[$i].to_string().as_str(), $str, "at [{}]", $i);
        $crate::assert_search_!($i + 1 => $records, $($rest)*);
    );
}

pub use checker::{is_linearizable, Checker};

pub use config::{CheckerConfig, ConfigError, MEMOIZE_VAR, STEP_BUDGET_VAR, TIME_BUDGET_VAR};

pub use report::{BudgetExceeded, CheckResult, Mismatch, SearchStats};

pub use search_record::SearchRecord;

pub use visitor::{SearchRecordingVisitor, Visitor};
