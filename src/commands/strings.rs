//! String command family: parse options manually out of the trailing args,
//! build the storage-layer option struct, call the engine, translate the
//! result.

use super::args;
use super::reply;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::string::{
    instant_from_unix_millis, instant_from_unix_secs, ttl_from_secs, ExpireUpdate, SetOptions,
};
use std::time::Instant;

impl Dispatcher {
    pub(crate) fn cmd_set(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("SET");
        }
        let key = match args::bytes(&args_in[0]) {
            Some(k) => k,
            None => return RespValue::error("ERR invalid key"),
        };
        let value = match args::bytes(&args_in[1]) {
            Some(v) => v,
            None => return RespValue::error("ERR invalid value"),
        };

        let mut opts = SetOptions::default();
        let mut want_get = false;
        let mut i = 2;
        while i < args_in.len() {
            let token = match args::upper(&args_in[i]) {
                Some(t) => t,
                None => return CoreError::Syntax.into(),
            };
            match token.as_str() {
                "NX" => opts.nx = true,
                "XX" => opts.xx = true,
                "GET" => want_get = true,
                "KEEPTTL" => opts.keep_ttl = true,
                "EX" | "PX" | "EXAT" | "PXAT" => {
                    i += 1;
                    let n = match args_in.get(i).and_then(args::integer) {
                        Some(n) => n,
                        None => return CoreError::NotAnInteger.into(),
                    };
                    if n <= 0 {
                        return CoreError::Generic(
                            "invalid expire time in 'set' command".to_string(),
                        )
                        .into();
                    }
                    opts.expires_at = Some(match token.as_str() {
                        "EX" => Instant::now() + std::time::Duration::from_secs(n as u64),
                        "PX" => Instant::now() + std::time::Duration::from_millis(n as u64),
                        "EXAT" => instant_from_unix_secs(n),
                        "PXAT" => instant_from_unix_millis(n),
                        _ => unreachable!(),
                    });
                }
                _ => return CoreError::Syntax.into(),
            }
            i += 1;
        }

        let previous = if want_get { self.engine().str_get(&key).ok().flatten() } else { None };
        match self.engine().str_set(&key, value, opts) {
            Ok(applied) => {
                if want_get {
                    match previous {
                        Some(b) => RespValue::bulk_string(b),
                        None => RespValue::null(),
                    }
                } else if applied {
                    RespValue::ok()
                } else {
                    RespValue::null()
                }
            }
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_get(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("GET"),
        };
        reply::bulk_or_null(self.engine().str_get(&key))
    }

    pub(crate) fn cmd_getset(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("GETSET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let value = args::bytes(&args_in[1]).unwrap_or_default();
        reply::bulk_or_null(self.engine().str_getset(&key, value))
    }

    pub(crate) fn cmd_getdel(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("GETDEL"),
        };
        reply::bulk_or_null(self.engine().str_getdel(&key))
    }

    pub(crate) fn cmd_getex(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("GETEX"),
        };
        let update = match args_in.get(1).map(args::upper) {
            None => None,
            Some(Some(t)) => match t.as_str() {
                "PERSIST" => Some(ExpireUpdate::Persist),
                "EX" | "PX" | "EXAT" | "PXAT" => {
                    let n = match args_in.get(2).and_then(args::integer) {
                        Some(n) => n,
                        None => return CoreError::NotAnInteger.into(),
                    };
                    ttl_from_secs(n).map(ExpireUpdate::Set)
                }
                _ => return CoreError::Syntax.into(),
            },
            Some(None) => return CoreError::Syntax.into(),
        };
        reply::bulk_or_null(self.engine().str_getex(&key, update))
    }

    pub(crate) fn cmd_append(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("APPEND");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let suffix = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().str_append(&key, &suffix) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_strlen(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("STRLEN"),
        };
        match self.engine().str_strlen(&key) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_getrange(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("GETRANGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let start = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        let end = match args::integer(&args_in[2]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        match self.engine().str_getrange(&key, start, end) {
            Ok(b) => RespValue::bulk_string(b),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_setrange(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("SETRANGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let offset = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as usize,
            _ => return CoreError::NotAnInteger.into(),
        };
        let value = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().str_setrange(&key, offset, &value) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_incr(&self, args_in: &[RespValue]) -> RespValue {
        self.incrby_impl(args_in, "INCR", 1)
    }

    pub(crate) fn cmd_decr(&self, args_in: &[RespValue]) -> RespValue {
        self.incrby_impl(args_in, "DECR", -1)
    }

    pub(crate) fn cmd_incrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("INCRBY");
        }
        let delta = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        self.incrby_impl(&args_in[..1], "INCRBY", delta)
    }

    pub(crate) fn cmd_decrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("DECRBY");
        }
        let delta = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        self.incrby_impl(&args_in[..1], "DECRBY", delta.saturating_neg())
    }

    fn incrby_impl(&self, args_in: &[RespValue], name: &str, delta: i64) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err(name),
        };
        match self.engine().str_incrby(&key, delta) {
            Ok(n) => RespValue::Integer(n),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_incrbyfloat(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("INCRBYFLOAT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let delta = match args::float(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAFloat.into(),
        };
        match self.engine().str_incrbyfloat(&key, delta) {
            Ok(n) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(n)),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_mset(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() || args_in.len() % 2 != 0 {
            return args::arity_err("MSET");
        }
        let pairs = pair_up(args_in);
        self.engine().str_mset(&pairs);
        RespValue::ok()
    }

    pub(crate) fn cmd_msetnx(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() || args_in.len() % 2 != 0 {
            return args::arity_err("MSETNX");
        }
        let pairs = pair_up(args_in);
        RespValue::Integer(if self.engine().str_msetnx(&pairs) { 1 } else { 0 })
    }

    pub(crate) fn cmd_mget(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("MGET");
        }
        let keys: Vec<_> = args_in.iter().filter_map(args::bytes).collect();
        reply::array_of_optional_bulk(self.engine().str_mget(&keys))
    }

    pub(crate) fn cmd_setnx(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("SETNX");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let value = args::bytes(&args_in[1]).unwrap_or_default();
        let opts = SetOptions { nx: true, ..Default::default() };
        match self.engine().str_set(&key, value, opts) {
            Ok(applied) => RespValue::Integer(if applied { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_setex(&self, args_in: &[RespValue]) -> RespValue {
        self.setex_impl(args_in, "SETEX", 1)
    }

    pub(crate) fn cmd_psetex(&self, args_in: &[RespValue]) -> RespValue {
        self.setex_impl(args_in, "PSETEX", 1000)
    }

    fn setex_impl(&self, args_in: &[RespValue], name: &str, unit_ms: i64) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err(name);
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let ttl = match args::integer(&args_in[1]) {
            Some(n) if n > 0 => n,
            _ => {
                return CoreError::Generic(format!(
                    "invalid expire time in '{}' command",
                    name.to_lowercase()
                ))
                .into()
            }
        };
        let value = args::bytes(&args_in[2]).unwrap_or_default();
        let opts = SetOptions {
            expires_at: Some(Instant::now() + std::time::Duration::from_millis((ttl * unit_ms) as u64)),
            ..Default::default()
        };
        match self.engine().str_set(&key, value, opts) {
            Ok(_) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_lcs(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("LCS");
        }
        let a = args::bytes(&args_in[0]).unwrap_or_default();
        let b = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().str_lcs(&a, &b) {
            Ok(b) => RespValue::bulk_string(b),
            Err(e) => e.into(),
        }
    }
}

fn pair_up(args_in: &[RespValue]) -> Vec<(bytes::Bytes, bytes::Bytes)> {
    args_in
        .chunks(2)
        .map(|c| (args::bytes(&c[0]).unwrap_or_default(), args::bytes(&c[1]).unwrap_or_default()))
        .collect()
}
