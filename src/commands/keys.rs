//! Generic key commands: expiry, scanning, renaming, type introspection.
//! These operate on `Entry`/`Kind` directly rather than any one family's
//! storage module, keeping keyspace-wide handlers separate from per-type
//! ones.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::string::ttl_from_secs;
use std::time::Instant;

impl Dispatcher {
    pub(crate) fn cmd_del(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("DEL");
        }
        let keys: Vec<_> = args_in.iter().filter_map(args::bytes).collect();
        RespValue::Integer(self.engine().del(&keys) as i64)
    }

    pub(crate) fn cmd_exists(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("EXISTS");
        }
        let n = args_in
            .iter()
            .filter_map(args::bytes)
            .filter(|k| self.engine().exists(k))
            .count();
        RespValue::Integer(n as i64)
    }

    pub(crate) fn cmd_expire(&self, args_in: &[RespValue]) -> RespValue {
        self.expire_impl(args_in, "EXPIRE", |secs| ttl_from_secs(secs))
    }

    pub(crate) fn cmd_pexpire(&self, args_in: &[RespValue]) -> RespValue {
        self.expire_impl(args_in, "PEXPIRE", |ms| {
            if ms > 0 {
                Some(Instant::now() + std::time::Duration::from_millis(ms as u64))
            } else {
                None
            }
        })
    }

    pub(crate) fn cmd_expireat(&self, args_in: &[RespValue]) -> RespValue {
        self.expire_impl(args_in, "EXPIREAT", ttl_from_secs)
    }

    fn expire_impl(&self, args_in: &[RespValue], name: &str, convert: impl Fn(i64) -> Option<Instant>) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err(name);
        }
        let key = match args::bytes(&args_in[0]) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };
        let n = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        if !self.engine().exists(&key) {
            return RespValue::Integer(0);
        }
        let at = convert(n);
        if at.is_none() {
            self.engine().del(&[key]);
            return RespValue::Integer(1);
        }
        RespValue::Integer(if self.engine().expire_at(&key, at) { 1 } else { 0 })
    }

    pub(crate) fn cmd_ttl(&self, args_in: &[RespValue]) -> RespValue {
        self.ttl_impl(args_in, "TTL", 1000)
    }

    pub(crate) fn cmd_pttl(&self, args_in: &[RespValue]) -> RespValue {
        self.ttl_impl(args_in, "PTTL", 1)
    }

    fn ttl_impl(&self, args_in: &[RespValue], name: &str, divisor_ms: i64) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err(name),
        };
        match self.engine().ttl_ms(&key) {
            None => RespValue::Integer(-2),
            Some(None) => RespValue::Integer(-1),
            Some(Some(ms)) => RespValue::Integer(ms / divisor_ms),
        }
    }

    pub(crate) fn cmd_persist(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("PERSIST"),
        };
        RespValue::Integer(if self.engine().persist(&key) { 1 } else { 0 })
    }

    pub(crate) fn cmd_keys(&self, args_in: &[RespValue]) -> RespValue {
        let pattern = args_in.first().and_then(args::string).unwrap_or_else(|| "*".to_string());
        let keys = self.engine().keys_matching(&pattern);
        RespValue::Array(keys.into_iter().map(RespValue::bulk_string).collect())
    }

    pub(crate) fn cmd_scan(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("SCAN");
        }
        let cursor = match args::integer(&args_in[0]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let mut pattern = None;
        let mut count = 10usize;
        let mut i = 1;
        while i < args_in.len() {
            match args::upper(&args_in[i]).as_deref() {
                Some("MATCH") => {
                    i += 1;
                    pattern = args_in.get(i).and_then(args::string);
                }
                Some("COUNT") => {
                    i += 1;
                    count = args_in.get(i).and_then(args::integer).unwrap_or(10).max(1) as usize;
                }
                _ => return CoreError::Syntax.into(),
            }
            i += 1;
        }
        let (next, keys) = self.engine().scan(cursor, pattern.as_deref(), count);
        RespValue::Array(vec![
            RespValue::bulk_string(next.to_string()),
            RespValue::Array(keys.into_iter().map(RespValue::bulk_string).collect()),
        ])
    }

    pub(crate) fn cmd_type(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("TYPE"),
        };
        match self.engine().type_of(&key) {
            Some(name) => RespValue::simple_string(name),
            None => RespValue::simple_string("none"),
        }
    }

    pub(crate) fn cmd_rename(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("RENAME");
        }
        let src = args::bytes(&args_in[0]).unwrap_or_default();
        let dst = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().rename(&src, &dst) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_renamenx(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("RENAMENX");
        }
        let src = args::bytes(&args_in[0]).unwrap_or_default();
        let dst = args::bytes(&args_in[1]).unwrap_or_default();
        if self.engine().exists(&dst) {
            return RespValue::Integer(0);
        }
        match self.engine().rename(&src, &dst) {
            Ok(()) => RespValue::Integer(1),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_deltype(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("DELTYPE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let type_name = args::string(&args_in[1]).unwrap_or_default();
        RespValue::Integer(if self.engine().del_if_type(&key, &type_name) { 1 } else { 0 })
    }

    pub(crate) fn cmd_dbsize(&self, _args_in: &[RespValue]) -> RespValue {
        RespValue::Integer(self.engine().dbsize() as i64)
    }

    pub(crate) fn cmd_flushall(&self, _args_in: &[RespValue]) -> RespValue {
        self.engine().flush_all();
        RespValue::ok()
    }
}
