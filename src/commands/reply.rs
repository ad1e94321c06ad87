//! Converts `CoreResult<T>` into a `RespValue`, the single seam every
//! command family routes through so storage errors become RESP error
//! replies without each `cmd_*` re-deriving the match.

use crate::error::CoreResult;
use crate::protocol::RespValue;
use bytes::Bytes;

pub fn from_result<T>(result: CoreResult<T>, ok: impl FnOnce(T) -> RespValue) -> RespValue {
    match result {
        Ok(value) => ok(value),
        Err(e) => e.into(),
    }
}

pub fn integer<T: Into<i64>>(result: CoreResult<T>) -> RespValue {
    from_result(result, |v| RespValue::Integer(v.into()))
}

pub fn bulk_or_null(result: CoreResult<Option<Bytes>>) -> RespValue {
    from_result(result, |v| match v {
        Some(b) => RespValue::bulk_string(b),
        None => RespValue::null(),
    })
}

pub fn bool_as_integer(result: CoreResult<bool>) -> RespValue {
    from_result(result, |v| RespValue::Integer(if v { 1 } else { 0 }))
}

pub fn array_of_bulk(items: Vec<Bytes>) -> RespValue {
    RespValue::Array(items.into_iter().map(RespValue::bulk_string).collect())
}

pub fn array_of_optional_bulk(items: Vec<Option<Bytes>>) -> RespValue {
    RespValue::Array(
        items
            .into_iter()
            .map(|v| match v {
                Some(b) => RespValue::bulk_string(b),
                None => RespValue::null(),
            })
            .collect(),
    )
}

pub fn simple_ok() -> RespValue {
    RespValue::ok()
}
