//! This library defines the sequential "reference object" that a linearizability checker
//! replays recorded key-value store operations against.
//!
//! # Defining Correctness Via A Reference Implementation
//!
//! [`SequentialSpec`] is a trait for defining correctness via a reference implementation (e.g.
//! "*this system should behave like a single-node map*"). [`KvStore`] is the implementation
//! for the operations a typical replicated key-value store exposes: read, put,
//! compare-and-swap, delete, and clear.
//!
//! A search over possible interleavings has to try an operation, observe what the reference
//! object returns, and then *take it back* if the branch fails. [`RevertibleSpec`] captures
//! that: every step yields an undo record that is the exact inverse of its effect.
//!
//! ```
//! use kv_model::{KvOp, KvRet, KvStore, RevertibleSpec, SequentialSpec};
//!
//! let mut store = KvStore::default();
//! assert_eq!(store.invoke(&KvOp::put("k", "v1")), KvRet::PutOk { prev_kv: None });
//!
//! let before = store.clone();
//! let (ret, undo) = store.invoke_revertible(&KvOp::Clear);
//! assert_eq!(ret, KvRet::ClearOk);
//! assert!(store.is_empty());
//!
//! store.revert(undo);
//! assert_eq!(store, before);
//! ```
//!
//! # Features
//!
//! - `serde`: Implement `Serialize` and `Deserialize` for operations, returns and the store.

#![cfg_attr(all(doc, CHANNEL_NIGHTLY), feature(doc_auto_cfg))]
#![deny(unused_must_use)]
#![warn(rust_2018_idioms, unreachable_pub)]

mod kv;

pub use kv::{Key, KeyValue, KvOp, KvRet, KvStore, KvUndo, Value};

/// An implementation of this trait can serve as a sequential "reference object" (in the sense
/// of an operational specification, not a Rust reference) against which to validate the
/// observed behavior of a more complex system, such as a replicated key-value store.
pub trait SequentialSpec: Sized {
    /// The type of operators. Often an enum.
    type Op;

    /// The type of values returned by the operators. Often an enum.
    type Ret: PartialEq;

    /// Invokes an operation on this reference object.
    fn invoke(&mut self, op: &Self::Op) -> Self::Ret;

    /// Indicates whether invoking a specified operation might result in a specified return
    /// value.
    fn is_valid_step(&mut self, op: &Self::Op, ret: &Self::Ret) -> bool {
        &self.invoke(op) == ret
    }

    /// Indicates whether a sequential history of operations and corresponding return values is
    /// valid for this reference object.
    fn is_valid_history(&mut self, ops: impl IntoIterator<Item = (Self::Op, Self::Ret)>) -> bool {
        ops.into_iter()
            .all(|(op, ret)| self.is_valid_step(&op, &ret))
    }
}

/// A [`SequentialSpec`] whose steps can be taken back.
///
/// Implementations must guarantee that `revert` given the undo record of the most recent
/// `invoke_revertible` restores the object exactly, so undo records are applied in strict
/// stack order (last in, first out).
pub trait RevertibleSpec: SequentialSpec {
    /// What is needed to take back one step.
    type Undo;

    /// Like [`SequentialSpec::invoke`], additionally returning the inverse of the step.
    fn invoke_revertible(&mut self, op: &Self::Op) -> (Self::Ret, Self::Undo);

    /// Takes back the most recent step that has not already been reverted.
    fn revert(&mut self, undo: Self::Undo);
}
