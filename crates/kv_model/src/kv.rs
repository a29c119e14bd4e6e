use {
    crate::{RevertibleSpec, SequentialSpec},
    std::{
        collections::BTreeMap,
        fmt::{self, Display, Formatter},
    },
};

pub type Key = String;
pub type Value = String;

/// A key paired with the value it held, as reported by `prev_kv` in write responses.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyValue {
    pub key: Key,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An operation accepted by a [`KvStore`].
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum KvOp {
    Read {
        key: Key,
    },
    Put {
        key: Key,
        value: Value,
    },
    /// Writes `new_value` only if the key currently maps to `expected_value`.
    Cas {
        key: Key,
        new_value: Value,
        expected_value: Value,
    },
    Delete {
        key: Key,
    },
    Clear,
}

impl KvOp {
    pub fn read(key: impl Into<Key>) -> Self {
        KvOp::Read { key: key.into() }
    }

    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        KvOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn cas(
        key: impl Into<Key>,
        new_value: impl Into<Value>,
        expected_value: impl Into<Value>,
    ) -> Self {
        KvOp::Cas {
            key: key.into(),
            new_value: new_value.into(),
            expected_value: expected_value.into(),
        }
    }

    pub fn delete(key: impl Into<Key>) -> Self {
        KvOp::Delete { key: key.into() }
    }

    /// The operation name as it appears in recorded traces.
    pub fn name(&self) -> &'static str {
        match self {
            KvOp::Read { .. } => "read",
            KvOp::Put { .. } => "put",
            KvOp::Cas { .. } => "cas",
            KvOp::Delete { .. } => "delete",
            KvOp::Clear => "clear",
        }
    }
}

impl Display for KvOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KvOp::Read { key } => write!(f, "read({key:?})"),
            KvOp::Put { key, value } => write!(f, "put({key:?}, {value:?})"),
            KvOp::Cas {
                key,
                new_value,
                expected_value,
            } => write!(f, "cas({key:?}, {new_value:?}, expected={expected_value:?})"),
            KvOp::Delete { key } => write!(f, "delete({key:?})"),
            KvOp::Clear => f.write_str("clear()"),
        }
    }
}

/// The value returned by a [`KvOp`]. Each operation kind has its own variant, so a response
/// shaped for one kind never equals a response for another.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "ret", rename_all = "snake_case"))]
pub enum KvRet {
    ReadOk { key: Key, value: Option<Value> },
    PutOk { prev_kv: Option<KeyValue> },
    /// The previous value is reported whether or not the swap happened.
    CasOk { prev_kv: Option<KeyValue> },
    DeleteOk { prev_kv: Option<KeyValue> },
    ClearOk,
}

impl KvRet {
    pub fn read_ok(key: impl Into<Key>, value: Option<&str>) -> Self {
        KvRet::ReadOk {
            key: key.into(),
            value: value.map(Value::from),
        }
    }
}

impl Display for KvRet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn prev(f: &mut Formatter<'_>, prev_kv: &Option<KeyValue>) -> fmt::Result {
            match prev_kv {
                None => f.write_str("prev_kv=null"),
                Some(KeyValue { key, value }) => write!(f, "prev_kv={key:?}:{value:?}"),
            }
        }
        match self {
            KvRet::ReadOk { key, value: None } => write!(f, "{key:?}=null"),
            KvRet::ReadOk {
                key,
                value: Some(value),
            } => write!(f, "{key:?}={value:?}"),
            KvRet::PutOk { prev_kv } | KvRet::CasOk { prev_kv } | KvRet::DeleteOk { prev_kv } => {
                prev(f, prev_kv)
            }
            KvRet::ClearOk => f.write_str("ok"),
        }
    }
}

/// The inverse of one [`KvStore`] step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KvUndo {
    /// The step did not change the store (reads, failed swaps, deletes of absent keys).
    Unchanged,
    /// Puts `previous` back under `key`, or removes `key` if it was absent.
    Restore { key: Key, previous: Option<Value> },
    /// The complete contents before a clear.
    Reset(BTreeMap<Key, Value>),
}

/// The sequential specification of a key-value store: a map from each key to the most recently
/// written value.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KvStore {
    entries: BTreeMap<Key, Value>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for KvStore
where
    K: Into<Key>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        KvStore {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn prev_kv(key: &Key, previous: &Option<Value>) -> Option<KeyValue> {
    previous.as_ref().map(|value| KeyValue {
        key: key.clone(),
        value: value.clone(),
    })
}

impl SequentialSpec for KvStore {
    type Op = KvOp;
    type Ret = KvRet;

    fn invoke(&mut self, op: &Self::Op) -> Self::Ret {
        self.invoke_revertible(op).0
    }
}

impl RevertibleSpec for KvStore {
    type Undo = KvUndo;

    fn invoke_revertible(&mut self, op: &Self::Op) -> (Self::Ret, Self::Undo) {
        match op {
            KvOp::Read { key } => (
                KvRet::ReadOk {
                    key: key.clone(),
                    value: self.entries.get(key).cloned(),
                },
                KvUndo::Unchanged,
            ),
            KvOp::Put { key, value } => {
                let previous = self.entries.insert(key.clone(), value.clone());
                (
                    KvRet::PutOk {
                        prev_kv: prev_kv(key, &previous),
                    },
                    KvUndo::Restore {
                        key: key.clone(),
                        previous,
                    },
                )
            }
            KvOp::Cas {
                key,
                new_value,
                expected_value,
            } => {
                let previous = self.entries.get(key).cloned();
                let ret = KvRet::CasOk {
                    prev_kv: prev_kv(key, &previous),
                };
                if previous.as_ref() != Some(expected_value) {
                    return (ret, KvUndo::Unchanged);
                }
                self.entries.insert(key.clone(), new_value.clone());
                (
                    ret,
                    KvUndo::Restore {
                        key: key.clone(),
                        previous,
                    },
                )
            }
            KvOp::Delete { key } => {
                let previous = self.entries.remove(key);
                let ret = KvRet::DeleteOk {
                    prev_kv: prev_kv(key, &previous),
                };
                match previous {
                    None => (ret, KvUndo::Unchanged),
                    Some(_) => (
                        ret,
                        KvUndo::Restore {
                            key: key.clone(),
                            previous,
                        },
                    ),
                }
            }
            KvOp::Clear => (
                KvRet::ClearOk,
                KvUndo::Reset(std::mem::take(&mut self.entries)),
            ),
        }
    }

    fn revert(&mut self, undo: Self::Undo) {
        match undo {
            KvUndo::Unchanged => {}
            KvUndo::Restore {
                key,
                previous: Some(value),
            } => {
                self.entries.insert(key, value);
            }
            KvUndo::Restore {
                key,
                previous: None,
            } => {
                self.entries.remove(&key);
            }
            KvUndo::Reset(entries) => self.entries = entries,
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, proptest::prelude::*};

    fn kv(key: &str, value: &str) -> Option<KeyValue> {
        Some(KeyValue::new(key, value))
    }

    #[test]
    fn read_reports_current_value_or_null() {
        let mut store = KvStore::from_iter([("a", "1")]);
        assert_eq!(store.invoke(&KvOp::read("a")), KvRet::read_ok("a", Some("1")));
        assert_eq!(store.invoke(&KvOp::read("b")), KvRet::read_ok("b", None));
        assert_eq!(store, KvStore::from_iter([("a", "1")]));
    }

    #[test]
    fn put_overwrites_and_reports_previous() {
        let mut store = KvStore::new();
        assert_eq!(store.invoke(&KvOp::put("a", "1")), KvRet::PutOk { prev_kv: None });
        assert_eq!(
            store.invoke(&KvOp::put("a", "2")),
            KvRet::PutOk {
                prev_kv: kv("a", "1")
            }
        );
        assert_eq!(store.get("a").map(String::as_str), Some("2"));
    }

    #[test]
    fn cas_swaps_only_on_expected_value() {
        let mut store = KvStore::from_iter([("a", "1")]);

        // Mismatch still reports the old value but leaves the store alone.
        assert_eq!(
            store.invoke(&KvOp::cas("a", "3", "2")),
            KvRet::CasOk {
                prev_kv: kv("a", "1")
            }
        );
        assert_eq!(store.get("a").map(String::as_str), Some("1"));

        assert_eq!(
            store.invoke(&KvOp::cas("a", "3", "1")),
            KvRet::CasOk {
                prev_kv: kv("a", "1")
            }
        );
        assert_eq!(store.get("a").map(String::as_str), Some("3"));

        // An absent key never matches an expected value.
        assert_eq!(
            store.invoke(&KvOp::cas("b", "3", "")),
            KvRet::CasOk { prev_kv: None }
        );
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn delete_removes_and_reports_previous() {
        let mut store = KvStore::from_iter([("a", "1")]);
        assert_eq!(
            store.invoke(&KvOp::delete("a")),
            KvRet::DeleteOk {
                prev_kv: kv("a", "1")
            }
        );
        assert_eq!(
            store.invoke(&KvOp::delete("a")),
            KvRet::DeleteOk { prev_kv: None }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn clear_empties_and_reverts_from_snapshot() {
        let mut store = KvStore::from_iter([("a", "1"), ("b", "2")]);
        let before = store.clone();
        let (ret, undo) = store.invoke_revertible(&KvOp::Clear);
        assert_eq!(ret, KvRet::ClearOk);
        assert!(store.is_empty());
        assert_eq!(undo, KvUndo::Reset(before.entries.clone()));
        store.revert(undo);
        assert_eq!(store, before);
    }

    #[test]
    fn results_of_different_kinds_never_match() {
        let put = KvRet::PutOk { prev_kv: None };
        let cas = KvRet::CasOk { prev_kv: None };
        let delete = KvRet::DeleteOk { prev_kv: None };
        assert_ne!(put, cas);
        assert_ne!(cas, delete);
        assert_ne!(put, delete);
    }

    #[test]
    fn validates_sequential_histories() {
        assert!(KvStore::new().is_valid_history([
            (KvOp::put("a", "1"), KvRet::PutOk { prev_kv: None }),
            (KvOp::cas("a", "2", "1"), KvRet::CasOk { prev_kv: kv("a", "1") }),
            (KvOp::read("a"), KvRet::read_ok("a", Some("2"))),
            (KvOp::Clear, KvRet::ClearOk),
            (KvOp::read("a"), KvRet::read_ok("a", None)),
        ]));
        assert!(!KvStore::new().is_valid_history([
            (KvOp::put("a", "1"), KvRet::PutOk { prev_kv: None }),
            (KvOp::delete("a"), KvRet::DeleteOk { prev_kv: None }),
        ]));
    }

    #[test]
    fn displays_operations_and_returns() {
        assert_eq!(KvOp::cas("k", "n", "e").to_string(), r#"cas("k", "n", expected="e")"#);
        assert_eq!(KvOp::Clear.to_string(), "clear()");
        assert_eq!(KvRet::read_ok("k", None).to_string(), r#""k"=null"#);
        assert_eq!(
            KvRet::PutOk {
                prev_kv: kv("k", "v")
            }
            .to_string(),
            r#"prev_kv="k":"v""#
        );
    }

    fn arb_op() -> impl Strategy<Value = KvOp> {
        let key = prop::sample::select(vec!["k1", "k2", "k3"]);
        let value = prop::sample::select(vec!["v1", "v2", "v3"]);
        prop_oneof![
            key.clone().prop_map(|k| KvOp::read(k)),
            (key.clone(), value.clone()).prop_map(|(k, v)| KvOp::put(k, v)),
            (key.clone(), value.clone(), value).prop_map(|(k, n, e)| KvOp::cas(k, n, e)),
            key.prop_map(|k| KvOp::delete(k)),
            Just(KvOp::Clear),
        ]
    }

    fn arb_store() -> impl Strategy<Value = KvStore> {
        prop::collection::btree_map(
            prop::sample::select(vec!["k1", "k2", "k3"]),
            prop::sample::select(vec!["v1", "v2", "v3"]),
            0..3,
        )
        .prop_map(|entries| entries.into_iter().collect::<KvStore>())
    }

    proptest! {
        #[test]
        fn revert_restores_identical_state(store in arb_store(), op in arb_op()) {
            let mut live = store.clone();
            let (ret, undo) = live.invoke_revertible(&op);
            prop_assert_eq!(&ret, &store.clone().invoke(&op));
            live.revert(undo);
            prop_assert_eq!(live, store);
        }

        #[test]
        fn reverting_in_stack_order_restores_initial_state(
            store in arb_store(),
            ops in prop::collection::vec(arb_op(), 0..12),
        ) {
            let mut live = store.clone();
            let mut undos = Vec::new();
            for op in &ops {
                undos.push(live.invoke_revertible(op).1);
            }
            while let Some(undo) = undos.pop() {
                live.revert(undo);
            }
            prop_assert_eq!(live, store);
        }
    }
}
