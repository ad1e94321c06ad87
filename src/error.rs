//! Core error types.
//!
//! `CoreError` covers failures that originate inside the keyspace engine,
//! AOF layer, or transaction controller — anything that needs to become a
//! RESP error reply with one of the standard prefixes (`ERR`, `WRONGTYPE`,
//! `NOAUTH`, `NOREPLICAS`, `READONLY`, `MISCONF`, `OOM`).
//! Protocol-framing failures stay in [`crate::protocol::ParseError`] and are
//! never converted here: those close the connection instead of replying.

use crate::protocol::RespValue;
use thiserror::Error;

/// Failures raised by the storage, transaction, AOF, and replication layers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR {0}")]
    Generic(String),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("NOAUTH Authentication required")]
    NoAuth,

    #[error("NOREPLICAS Not enough good replicas to write")]
    NoReplicas,

    #[error("READONLY You can't write against a read only replica")]
    ReadOnly,

    #[error("MISCONF {0}")]
    Misconf(String),

    #[error("OOM {0}")]
    Oom(String),

    #[error("ERR {0}")]
    ParseFailed(String),
}

impl CoreError {
    pub fn generic(msg: impl Into<String>) -> Self {
        CoreError::Generic(msg.into())
    }

    /// Standard "wrong number of arguments" reply, shared by every command
    /// handler's arity check.
    pub fn wrong_arity(cmd: &str) -> Self {
        CoreError::Generic(format!(
            "wrong number of arguments for '{}' command",
            cmd.to_lowercase()
        ))
    }

    pub fn unknown_command(cmd: &str, args: &[RespValue]) -> Self {
        let rendered: Vec<String> = args
            .iter()
            .map(|a| match a.as_bytes() {
                Some(b) => String::from_utf8_lossy(b).to_string(),
                None => String::new(),
            })
            .collect();
        CoreError::Generic(format!(
            "unknown command '{}', with args beginning with: {}",
            cmd,
            rendered.join(", ")
        ))
    }
}

impl From<CoreError> for RespValue {
    fn from(err: CoreError) -> Self {
        RespValue::Error(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_type_has_standard_prefix() {
        let resp: RespValue = CoreError::WrongType.into();
        match resp {
            RespValue::Error(msg) => assert!(msg.starts_with("WRONGTYPE")),
            _ => panic!("expected error"),
        }
    }

    #[test]
    fn generic_errors_carry_err_prefix() {
        let resp: RespValue = CoreError::generic("boom").into();
        match resp {
            RespValue::Error(msg) => assert_eq!(msg, "ERR boom"),
            _ => panic!("expected error"),
        }
    }

    #[test]
    fn wrong_arity_lowercases_command_name() {
        let err = CoreError::wrong_arity("GET");
        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'get' command"
        );
    }
}
