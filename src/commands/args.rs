//! Argument extraction helpers shared by every command family: pulling a
//! `Bytes`, `String`, or integer out of a RESP argument with a consistent
//! error on mismatch.

use crate::error::CoreError;
use crate::protocol::RespValue;
use bytes::Bytes;

pub fn bytes(value: &RespValue) -> Option<Bytes> {
    match value {
        RespValue::BulkString(b) => Some(b.clone()),
        RespValue::SimpleString(s) => Some(Bytes::from(s.clone())),
        _ => None,
    }
}

pub fn string(value: &RespValue) -> Option<String> {
    match value {
        RespValue::BulkString(b) => std::str::from_utf8(b).ok().map(|s| s.to_string()),
        RespValue::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn upper(value: &RespValue) -> Option<String> {
    string(value).map(|s| s.to_uppercase())
}

pub fn integer(value: &RespValue) -> Option<i64> {
    match value {
        RespValue::Integer(n) => Some(*n),
        RespValue::BulkString(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
        RespValue::SimpleString(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn float(value: &RespValue) -> Option<f64> {
    match value {
        RespValue::Integer(n) => Some(*n as f64),
        RespValue::BulkString(b) => std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()),
        RespValue::SimpleString(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn arity_err(cmd: &str) -> RespValue {
    CoreError::wrong_arity(cmd).into()
}

pub fn bytes_or_err(value: &RespValue) -> Result<Bytes, RespValue> {
    bytes(value).ok_or_else(|| RespValue::error("ERR invalid argument"))
}

pub fn int_or_err(value: &RespValue) -> Result<i64, RespValue> {
    integer(value).ok_or_else(|| CoreError::NotAnInteger.into())
}

pub fn float_or_err(value: &RespValue) -> Result<f64, RespValue> {
    float(value).ok_or_else(|| CoreError::NotAFloat.into())
}
