//! Best-effort normalization of `get_transaction` response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const BLOCK_TIME_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
// Some history nodes emit the same UTC instant without the trailing Z.
const BLOCK_TIME_FORMAT_BARE: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]");

/// Flat record extracted from one `get_transaction` body. Every field is
/// independently optional; the transfer-detail fields (`contract`, `from`,
/// `to`, `quantity`, `memo`) come from one matched trace, so they are either
/// populated together or all unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub tx_id: Option<String>,
    pub status: Option<String>,
    pub cpu_usage_us: Option<u64>,
    pub net_usage_words: Option<u64>,
    pub block_num: Option<u64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub block_time: Option<OffsetDateTime>,
    pub contract: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub quantity: Option<String>,
    pub memo: Option<String>,
}

/// Walk `path` through nested JSON objects. A missing key or a non-object
/// intermediate yields None.
fn value_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for key in path {
        cur = cur.as_object()?.get(*key)?;
    }
    Some(cur)
}

fn string_at(root: &Value, path: &[&str]) -> Option<String> {
    value_at(root, path)?.as_str().map(str::to_owned)
}

fn u64_at(root: &Value, path: &[&str]) -> Option<u64> {
    value_at(root, path)?.as_u64()
}

/// Parse an EOS block timestamp (`2021-05-04T12:30:00.000Z`, UTC), with or
/// without the trailing Z. Anything else is None.
pub fn parse_block_time(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    let dt = PrimitiveDateTime::parse(s, BLOCK_TIME_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(s, BLOCK_TIME_FORMAT_BARE))
        .ok()?;
    Some(dt.assume_utc())
}

/// Normalize a decoded `get_transaction` body for `account`. Total over any
/// JSON value: each extraction is best-effort and a missing or mismatched
/// path leaves the field unset instead of failing.
///
/// Transfer details come from the first trace (in array order) whose
/// `act.name` is `"transfer"` and whose `receipt.receiver` equals `account`.
/// The receiver is the match key; `act.data.to` is not cross-checked.
pub fn normalize_transaction(raw: &Value, account: &str) -> NormalizedTransaction {
    let mut tx = NormalizedTransaction {
        tx_id: string_at(raw, &["id"]),
        status: string_at(raw, &["trx", "receipt", "status"]),
        cpu_usage_us: u64_at(raw, &["trx", "receipt", "cpu_usage_us"]),
        net_usage_words: u64_at(raw, &["trx", "receipt", "net_usage_words"]),
        block_num: u64_at(raw, &["block_num"]),
        block_time: string_at(raw, &["block_time"])
            .as_deref()
            .and_then(parse_block_time),
        ..NormalizedTransaction::default()
    };

    let Some(traces) = value_at(raw, &["traces"]).and_then(Value::as_array) else {
        return tx;
    };
    let Some(trace) = traces.iter().find(|t| {
        string_at(t, &["act", "name"]).as_deref() == Some("transfer")
            && string_at(t, &["receipt", "receiver"]).as_deref() == Some(account)
    }) else {
        return tx;
    };

    tx.contract = string_at(trace, &["act", "account"]);
    tx.from = string_at(trace, &["act", "data", "from"]);
    tx.to = string_at(trace, &["act", "data", "to"]);
    tx.quantity = string_at(trace, &["act", "data", "quantity"]);
    tx.memo = string_at(trace, &["act", "data", "memo"]);
    tx
}
