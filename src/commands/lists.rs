//! List command family, including the blocking pop/move variants
//!. Blocking uses the engine's per-key `Notify` waiter registry:
//! poll once, and on an empty list wait on the registered `Notify` capped
//! at 100ms so a dropped notification (another shard's push racing the
//! register) can't block forever.

use super::args;
use super::Dispatcher;
use crate::protocol::RespValue;
use crate::storage::list::Side;
use std::time::Duration;

const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl Dispatcher {
    pub(crate) fn cmd_lpush(&self, args_in: &[RespValue]) -> RespValue {
        self.push_impl(args_in, "LPUSH", Side::Left, false)
    }

    pub(crate) fn cmd_rpush(&self, args_in: &[RespValue]) -> RespValue {
        self.push_impl(args_in, "RPUSH", Side::Right, false)
    }

    pub(crate) fn cmd_lpushx(&self, args_in: &[RespValue]) -> RespValue {
        self.push_impl(args_in, "LPUSHX", Side::Left, true)
    }

    pub(crate) fn cmd_rpushx(&self, args_in: &[RespValue]) -> RespValue {
        self.push_impl(args_in, "RPUSHX", Side::Right, true)
    }

    fn push_impl(&self, args_in: &[RespValue], name: &str, side: Side, only_existing: bool) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err(name);
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let values: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        let result = if only_existing {
            self.engine().list_pushx(&key, side, &values)
        } else {
            self.engine().list_push(&key, side, &values)
        };
        match result {
            Ok(n) => {
                if n > 0 {
                    self.engine().notify_one_waiter(&key);
                }
                RespValue::Integer(n as i64)
            }
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lpop(&self, args_in: &[RespValue]) -> RespValue {
        self.pop_impl(args_in, "LPOP", Side::Left)
    }

    pub(crate) fn cmd_rpop(&self, args_in: &[RespValue]) -> RespValue {
        self.pop_impl(args_in, "RPOP", Side::Right)
    }

    fn pop_impl(&self, args_in: &[RespValue], name: &str, side: Side) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err(name);
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let has_count = args_in.len() > 1;
        let count = match args_in.get(1).and_then(args::integer) {
            Some(n) if n >= 0 => n as usize,
            Some(_) => return RespValue::error("ERR value is out of range, must be positive"),
            None if has_count => return crate::error::CoreError::NotAnInteger.into(),
            None => 1,
        };
        match self.engine().list_pop(&key, side, count) {
            Ok(values) if values.is_empty() => RespValue::null(),
            Ok(values) if !has_count => RespValue::bulk_string(values.into_iter().next().unwrap()),
            Ok(values) => RespValue::Array(values.into_iter().map(RespValue::bulk_string).collect()),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_llen(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("LLEN"),
        };
        match self.engine().list_len(&key) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lindex(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("LINDEX");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let index = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return crate::error::CoreError::NotAnInteger.into(),
        };
        match self.engine().list_index(&key, index) {
            Ok(Some(v)) => RespValue::bulk_string(v),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lrange(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("LRANGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let start = args::integer(&args_in[1]).unwrap_or(0);
        let stop = args::integer(&args_in[2]).unwrap_or(-1);
        match self.engine().list_range(&key, start, stop) {
            Ok(values) => RespValue::Array(values.into_iter().map(RespValue::bulk_string).collect()),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lset(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("LSET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let index = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return crate::error::CoreError::NotAnInteger.into(),
        };
        let value = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().list_set(&key, index, value) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lrem(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("LREM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let count = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return crate::error::CoreError::NotAnInteger.into(),
        };
        let value = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().list_rem(&key, count, &value) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_ltrim(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("LTRIM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let start = args::integer(&args_in[1]).unwrap_or(0);
        let stop = args::integer(&args_in[2]).unwrap_or(-1);
        match self.engine().list_trim(&key, start, stop) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_linsert(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 4 {
            return args::arity_err("LINSERT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let before = match args::upper(&args_in[1]).as_deref() {
            Some("BEFORE") => true,
            Some("AFTER") => false,
            _ => return crate::error::CoreError::Syntax.into(),
        };
        let pivot = args::bytes(&args_in[2]).unwrap_or_default();
        let value = args::bytes(&args_in[3]).unwrap_or_default();
        match self.engine().list_insert(&key, before, &pivot, value) {
            Ok(Some(n)) => RespValue::Integer(n as i64),
            Ok(None) => RespValue::Integer(-1),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lmove(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 4 {
            return args::arity_err("LMOVE");
        }
        let src = args::bytes(&args_in[0]).unwrap_or_default();
        let dst = args::bytes(&args_in[1]).unwrap_or_default();
        let from = match args::upper(&args_in[2]).as_deref() {
            Some("LEFT") => Side::Left,
            Some("RIGHT") => Side::Right,
            _ => return crate::error::CoreError::Syntax.into(),
        };
        let to = match args::upper(&args_in[3]).as_deref() {
            Some("LEFT") => Side::Left,
            Some("RIGHT") => Side::Right,
            _ => return crate::error::CoreError::Syntax.into(),
        };
        match self.engine().list_move(&src, &dst, from, to) {
            Ok(Some(v)) => {
                self.engine().notify_one_waiter(&dst);
                RespValue::bulk_string(v)
            }
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    /// Blocks until one of `keys` has an element to pop, or `timeout_secs`
    /// elapses (0 means block forever).
    pub(crate) async fn blocking_pop(&self, keys: &[bytes::Bytes], side: Side, timeout_secs: f64) -> RespValue {
        let deadline = if timeout_secs > 0.0 {
            Some(tokio::time::Instant::now() + Duration::from_secs_f64(timeout_secs))
        } else {
            None
        };
        loop {
            for key in keys {
                match self.engine().list_pop(key, side, 1) {
                    Ok(values) if !values.is_empty() => {
                        return RespValue::Array(vec![
                            RespValue::bulk_string(key.clone()),
                            RespValue::bulk_string(values.into_iter().next().unwrap()),
                        ]);
                    }
                    Ok(_) => {}
                    Err(e) => return e.into(),
                }
            }
            if let Some(dl) = deadline {
                if tokio::time::Instant::now() >= dl {
                    return RespValue::null_array();
                }
            }
            let notified = self.engine().register_waiter(&keys[0]);
            tokio::select! {
                _ = notified.notified() => {}
                _ = tokio::time::sleep(BLOCK_POLL_INTERVAL) => {}
            }
        }
    }

    pub(crate) async fn blocking_move(&self, src: &bytes::Bytes, dst: &bytes::Bytes, from: Side, to: Side, timeout_secs: f64) -> RespValue {
        let deadline = if timeout_secs > 0.0 {
            Some(tokio::time::Instant::now() + Duration::from_secs_f64(timeout_secs))
        } else {
            None
        };
        loop {
            match self.engine().list_move(src, dst, from, to) {
                Ok(Some(v)) => {
                    self.engine().notify_one_waiter(dst);
                    return RespValue::bulk_string(v);
                }
                Ok(None) => {}
                Err(e) => return e.into(),
            }
            if let Some(dl) = deadline {
                if tokio::time::Instant::now() >= dl {
                    return RespValue::null();
                }
            }
            let notified = self.engine().register_waiter(src);
            tokio::select! {
                _ = notified.notified() => {}
                _ = tokio::time::sleep(BLOCK_POLL_INTERVAL) => {}
            }
        }
    }
}
