//! Hash command family.

use super::args;
use super::reply;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;

impl Dispatcher {
    pub(crate) fn cmd_hset(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 || (args_in.len() - 1) % 2 != 0 {
            return args::arity_err("HSET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let fields: Vec<_> = args_in[1..]
            .chunks(2)
            .map(|c| (args::bytes(&c[0]).unwrap_or_default(), args::bytes(&c[1]).unwrap_or_default()))
            .collect();
        match self.engine().hash_set(&key, &fields) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hsetnx(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("HSETNX");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let field = args::bytes(&args_in[1]).unwrap_or_default();
        let value = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().hash_setnx(&key, &field, value) {
            Ok(applied) => RespValue::Integer(if applied { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hget(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("HGET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let field = args::bytes(&args_in[1]).unwrap_or_default();
        reply::bulk_or_null(self.engine().hash_get(&key, &field))
    }

    pub(crate) fn cmd_hmget(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("HMGET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let fields: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().hash_mget(&key, &fields) {
            Ok(values) => reply::array_of_optional_bulk(values),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hgetall(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("HGETALL"),
        };
        match self.engine().hash_getall(&key) {
            Ok(pairs) => {
                let mut out = Vec::with_capacity(pairs.len() * 2);
                for (f, v) in pairs {
                    out.push(RespValue::bulk_string(f));
                    out.push(RespValue::bulk_string(v));
                }
                RespValue::Array(out)
            }
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hdel(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("HDEL");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let fields: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().hash_del(&key, &fields) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hexists(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("HEXISTS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let field = args::bytes(&args_in[1]).unwrap_or_default();
        reply::bool_as_integer(self.engine().hash_exists(&key, &field))
    }

    pub(crate) fn cmd_hlen(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("HLEN"),
        };
        reply::integer(self.engine().hash_len(&key).map(|n| n as i64))
    }

    pub(crate) fn cmd_hincrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("HINCRBY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let field = args::bytes(&args_in[1]).unwrap_or_default();
        let delta = match args::integer(&args_in[2]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        match self.engine().hash_incrby(&key, &field, delta) {
            Ok(n) => RespValue::Integer(n),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hincrbyfloat(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("HINCRBYFLOAT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let field = args::bytes(&args_in[1]).unwrap_or_default();
        let delta = match args::float(&args_in[2]) {
            Some(n) => n,
            None => return CoreError::NotAFloat.into(),
        };
        match self.engine().hash_incrbyfloat(&key, &field, delta) {
            Ok(n) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(n)),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hkeys(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("HKEYS"),
        };
        match self.engine().hash_keys(&key) {
            Ok(keys) => reply::array_of_bulk(keys),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hvals(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("HVALS"),
        };
        match self.engine().hash_vals(&key) {
            Ok(vals) => reply::array_of_bulk(vals),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_hscan(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("HSCAN");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let cursor = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let mut pattern = None;
        let mut count = 10usize;
        let mut i = 2;
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
        match self.engine().hash_scan(&key, cursor, pattern.as_deref(), count) {
            Ok((next, pairs)) => {
                let mut flat = Vec::with_capacity(pairs.len() * 2);
                for (f, v) in pairs {
                    flat.push(RespValue::bulk_string(f));
                    flat.push(RespValue::bulk_string(v));
                }
                RespValue::Array(vec![RespValue::bulk_string(next.to_string()), RespValue::Array(flat)])
            }
            Err(e) => e.into(),
        }
    }
}
