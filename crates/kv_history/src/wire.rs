//! The JSON trace format written by history collectors:
//!
//! ```text
//! { "start": 12.001, "end": 12.050, "op": "put",
//!   "input": {"key": "1", "value": "2"},
//!   "result": {"prev_kv": {"key": "1", "value": "1"}} }
//! ```
//!
//! `end` is `null`, absent, a sentinel string such as `"inf"`, or a bare `Infinity` token for
//! requests that never completed. The `result` of such requests is ignored.

use {
    crate::{history::timestamp, Completion, History, HistoryError},
    kv_model::{KeyValue, KvOp, KvRet},
    serde::{de::DeserializeOwned, Deserialize, Serialize},
    serde_json::{json, Value as Json},
    std::{borrow::Cow, io::Read},
    tracing::{debug, warn},
};

const PENDING_SENTINELS: &[&str] = &["inf", "+inf", "infinity", "+infinity", "pending"];

#[derive(Deserialize)]
struct WireEvent {
    start: f64,
    #[serde(default)]
    end: Option<WireEnd>,
    op: String,
    #[serde(default)]
    input: Json,
    #[serde(default)]
    result: Json,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEnd {
    Time(f64),
    Sentinel(String),
}

#[derive(Deserialize)]
struct KeyInput {
    key: String,
}

#[derive(Deserialize)]
struct PutInput {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct CasInput {
    key: String,
    new_value: String,
    expected_value: String,
}

#[derive(Deserialize)]
struct ReadResult {
    key: String,
    value: Option<String>,
}

#[derive(Deserialize)]
struct PrevKvResult {
    #[serde(default)]
    prev_kv: Option<KeyValue>,
}

#[derive(Serialize)]
struct WireEventOut {
    start: f64,
    end: Option<f64>,
    op: &'static str,
    input: Json,
    result: Json,
}

impl History {
    /// Parses a JSON array of events. Fails on the first malformed event.
    pub fn from_json(json: &str) -> Result<Self, HistoryError> {
        Self::from_values(serde_json::from_str(&quote_bare_infinity(json))?)
    }

    /// Like [`History::from_json`] but reads from any byte source.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, HistoryError> {
        let mut json = String::new();
        reader
            .read_to_string(&mut json)
            .map_err(serde_json::Error::io)?;
        Self::from_json(&json)
    }

    fn from_values(values: Vec<Json>) -> Result<Self, HistoryError> {
        let mut history = History::new();
        for (index, value) in values.into_iter().enumerate() {
            let wire: WireEvent = serde_json::from_value(value)
                .map_err(|source| HistoryError::InvalidEvent { index, source })?;
            let op = decode_op(index, &wire.op, wire.input)?;
            let start = timestamp(index, wire.start)?;
            let end = decode_end(index, wire.end)?;
            let observed = match end {
                Completion::Returned(_) => decode_result(index, &op, wire.result)?,
                Completion::Pending => {
                    if !wire.result.is_null() {
                        debug!(index, result = %wire.result, "Ignoring result of pending event.");
                    }
                    None
                }
            };
            history.push(start, end, op, observed)?;
        }
        Ok(history)
    }

    /// Encodes this history in the format accepted by [`History::from_json`]. Pending events
    /// are written with a `null` end and result.
    pub fn to_json(&self) -> Result<String, HistoryError> {
        let wire: Vec<WireEventOut> = self
            .iter()
            .map(|event| WireEventOut {
                start: event.start().as_secs_f64(),
                end: event.end().returned().map(|t| t.as_secs_f64()),
                op: event.op().name(),
                input: encode_input(event.op()),
                result: event.required_result().map_or(Json::Null, encode_result),
            })
            .collect();
        Ok(serde_json::to_string_pretty(&wire)?)
    }
}

fn field<T: DeserializeOwned>(
    index: usize,
    op: &'static str,
    field: &'static str,
    json: Json,
) -> Result<T, HistoryError> {
    serde_json::from_value(json).map_err(|source| HistoryError::InvalidField {
        index,
        op,
        field,
        source,
    })
}

fn decode_op(index: usize, name: &str, input: Json) -> Result<KvOp, HistoryError> {
    Ok(match name {
        "read" => {
            let KeyInput { key } = field(index, "read", "input", input)?;
            KvOp::Read { key }
        }
        "put" => {
            let PutInput { key, value } = field(index, "put", "input", input)?;
            KvOp::Put { key, value }
        }
        "cas" => {
            let CasInput {
                key,
                new_value,
                expected_value,
            } = field(index, "cas", "input", input)?;
            KvOp::Cas {
                key,
                new_value,
                expected_value,
            }
        }
        "delete" => {
            let KeyInput { key } = field(index, "delete", "input", input)?;
            KvOp::Delete { key }
        }
        "clear" => {
            if !is_empty(&input) {
                warn!(index, %input, "Ignoring input of clear.");
            }
            KvOp::Clear
        }
        _ => {
            return Err(HistoryError::UnknownOp {
                index,
                op: name.to_string(),
            })
        }
    })
}

/// Some collectors write the end of an unfinished request as a bare `Infinity` token, which
/// strict JSON lacks. Each one outside a string literal becomes the `"inf"` sentinel.
/// `-Infinity` is left for the parser to reject.
fn quote_bare_infinity(json: &str) -> Cow<'_, str> {
    if !json.contains("Infinity") {
        return Cow::Borrowed(json);
    }
    let mut quoted = String::with_capacity(json.len());
    let mut rest = json;
    let (mut in_string, mut escaped) = (false, false);
    while let Some(c) = rest.chars().next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '-' && rest[1..].starts_with("Infinity") {
            quoted.push_str("-Infinity");
            rest = &rest["-Infinity".len()..];
            continue;
        } else if let Some(token) = ["+Infinity", "Infinity"]
            .into_iter()
            .find(|token| rest.starts_with(token))
        {
            quoted.push_str("\"inf\"");
            rest = &rest[token.len()..];
            continue;
        }
        quoted.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(quoted)
}

fn decode_end(index: usize, end: Option<WireEnd>) -> Result<Completion, HistoryError> {
    match end {
        None => Ok(Completion::Pending),
        Some(WireEnd::Time(secs)) if secs.is_infinite() && secs > 0.0 => Ok(Completion::Pending),
        Some(WireEnd::Time(secs)) => Ok(Completion::Returned(timestamp(index, secs)?)),
        Some(WireEnd::Sentinel(s)) => {
            if PENDING_SENTINELS.contains(&s.to_ascii_lowercase().as_str()) {
                Ok(Completion::Pending)
            } else {
                Err(HistoryError::InvalidEnd { index, value: s })
            }
        }
    }
}

fn decode_result(index: usize, op: &KvOp, result: Json) -> Result<Option<KvRet>, HistoryError> {
    if let KvOp::Clear = op {
        if !is_empty(&result) {
            return Err(HistoryError::UnexpectedResult { index, result });
        }
        return Ok(Some(KvRet::ClearOk));
    }
    if result.is_null() {
        return Err(HistoryError::MissingResult {
            index,
            op: op.name(),
        });
    }
    let ret = match op {
        KvOp::Read { .. } => {
            let ReadResult { key, value } = field(index, "read", "result", result)?;
            KvRet::ReadOk { key, value }
        }
        KvOp::Put { .. } => {
            let PrevKvResult { prev_kv } = field(index, "put", "result", result)?;
            KvRet::PutOk { prev_kv }
        }
        KvOp::Cas { .. } => {
            let PrevKvResult { prev_kv } = field(index, "cas", "result", result)?;
            KvRet::CasOk { prev_kv }
        }
        KvOp::Delete { .. } => {
            let PrevKvResult { prev_kv } = field(index, "delete", "result", result)?;
            KvRet::DeleteOk { prev_kv }
        }
        KvOp::Clear => KvRet::ClearOk,
    };
    Ok(Some(ret))
}

fn is_empty(json: &Json) -> bool {
    match json {
        Json::Null => true,
        Json::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn encode_input(op: &KvOp) -> Json {
    match op {
        KvOp::Read { key } | KvOp::Delete { key } => json!({ "key": key }),
        KvOp::Put { key, value } => json!({ "key": key, "value": value }),
        KvOp::Cas {
            key,
            new_value,
            expected_value,
        } => json!({
            "key": key,
            "new_value": new_value,
            "expected_value": expected_value,
        }),
        KvOp::Clear => json!({}),
    }
}

fn encode_result(ret: &KvRet) -> Json {
    match ret {
        KvRet::ReadOk { key, value } => json!({ "key": key, "value": value }),
        KvRet::PutOk { prev_kv } | KvRet::CasOk { prev_kv } | KvRet::DeleteOk { prev_kv } => {
            json!({ "prev_kv": prev_kv })
        }
        KvRet::ClearOk => Json::Null,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recognizes_pending_sentinels() {
        for end in [None, Some(WireEnd::Sentinel("Infinity".into()))] {
            assert_eq!(decode_end(0, end).unwrap(), Completion::Pending);
        }
        for s in ["inf", "+inf", "INF", "pending"] {
            assert_eq!(
                decode_end(0, Some(WireEnd::Sentinel(s.into()))).unwrap(),
                Completion::Pending
            );
        }
        assert!(matches!(
            decode_end(4, Some(WireEnd::Sentinel("soon".into()))),
            Err(HistoryError::InvalidEnd { index: 4, .. })
        ));
    }

    #[test]
    fn quotes_bare_infinity_outside_strings() {
        assert_eq!(
            quote_bare_infinity(r#"{"end": Infinity, "x": +Infinity}"#),
            r#"{"end": "inf", "x": "inf"}"#
        );
        assert_eq!(
            quote_bare_infinity(r#"{"key": "Infinity \" Infinity", "end": -Infinity}"#),
            r#"{"key": "Infinity \" Infinity", "end": -Infinity}"#
        );
        assert!(matches!(quote_bare_infinity(r#"{"end": 1}"#), Cow::Borrowed(_)));
    }

    #[test]
    fn clear_accepts_empty_results_only() {
        for result in [Json::Null, json!({})] {
            assert_eq!(
                decode_result(0, &KvOp::Clear, result).unwrap(),
                Some(KvRet::ClearOk)
            );
        }
        assert!(matches!(
            decode_result(2, &KvOp::Clear, json!({"deleted": 3})),
            Err(HistoryError::UnexpectedResult { index: 2, .. })
        ));
    }

    #[test]
    fn prev_kv_may_be_omitted() {
        assert_eq!(
            decode_result(0, &KvOp::delete("k"), json!({})).unwrap(),
            Some(KvRet::DeleteOk { prev_kv: None })
        );
    }

    #[test]
    fn encodes_inputs_in_wire_shape() {
        assert_eq!(
            encode_input(&KvOp::cas("k", "n", "e")),
            json!({"key": "k", "new_value": "n", "expected_value": "e"})
        );
        assert_eq!(
            encode_result(&KvRet::PutOk {
                prev_kv: Some(KeyValue::new("k", "v"))
            }),
            json!({"prev_kv": {"key": "k", "value": "v"}})
        );
    }
}
