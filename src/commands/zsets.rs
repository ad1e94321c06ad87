//! Sorted-set command family.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::zset::{LexBound, ZAggregate};

fn score_reply(values: Vec<(bytes::Bytes, f64)>, with_scores: bool) -> RespValue {
    let mut out = Vec::new();
    for (member, score) in values {
        out.push(RespValue::bulk_string(member));
        if with_scores {
            out.push(RespValue::bulk_string(crate::storage::string::format_float_no_exponent(score)));
        }
    }
    RespValue::Array(out)
}

impl Dispatcher {
    pub(crate) fn cmd_zadd(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 || (args_in.len() - 1) % 2 != 0 {
            return args::arity_err("ZADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut members = Vec::new();
        for chunk in args_in[1..].chunks(2) {
            let score = match args::float(&chunk[0]) {
                Some(s) if !s.is_nan() => s,
                _ => return CoreError::NotAFloat.into(),
            };
            let member = args::bytes(&chunk[1]).unwrap_or_default();
            members.push((member, score));
        }
        match self.engine().zset_add(&key, &members) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zscore(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("ZSCORE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let member = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().zset_score(&key, &member) {
            Ok(Some(s)) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(s)),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zincrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("ZINCRBY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let delta = match args::float(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAFloat.into(),
        };
        let member = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().zset_incrby(&key, &member, delta) {
            Ok(n) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(n)),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zrem(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("ZREM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let members: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().zset_rem(&key, &members) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zcard(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("ZCARD"),
        };
        match self.engine().zset_card(&key) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zrank(&self, args_in: &[RespValue], reverse: bool) -> RespValue {
        let name = if reverse { "ZREVRANK" } else { "ZRANK" };
        if args_in.len() != 2 {
            return args::arity_err(name);
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let member = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().zset_rank(&key, &member, reverse) {
            Ok(Some(r)) => RespValue::Integer(r as i64),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zrange(&self, args_in: &[RespValue], reverse: bool) -> RespValue {
        let name = if reverse { "ZREVRANGE" } else { "ZRANGE" };
        if args_in.len() < 3 {
            return args::arity_err(name);
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let start = match args::integer(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        let stop = match args::integer(&args_in[2]) {
            Some(n) => n,
            None => return CoreError::NotAnInteger.into(),
        };
        let with_scores = args_in.get(3).and_then(args::upper).as_deref() == Some("WITHSCORES");
        match self.engine().zset_range(&key, start, stop, reverse) {
            Ok(values) => score_reply(values, with_scores),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zrangebyscore(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("ZRANGEBYSCORE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let (min, min_excl) = match parse_score_bound(&args_in[1]) {
            Some(v) => v,
            None => return CoreError::NotAFloat.into(),
        };
        let (max, max_excl) = match parse_score_bound(&args_in[2]) {
            Some(v) => v,
            None => return CoreError::NotAFloat.into(),
        };
        let with_scores = args_in.get(3).and_then(args::upper).as_deref() == Some("WITHSCORES");
        match self.engine().zset_range_by_score(&key, min, max, min_excl, max_excl) {
            Ok(values) => score_reply(values, with_scores),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zrangebylex(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("ZRANGEBYLEX");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let min = match args::bytes(&args_in[1]).and_then(|b| LexBound::parse(&b).ok()) {
            Some(b) => b,
            None => return CoreError::Syntax.into(),
        };
        let max = match args::bytes(&args_in[2]).and_then(|b| LexBound::parse(&b).ok()) {
            Some(b) => b,
            None => return CoreError::Syntax.into(),
        };
        match self.engine().zset_range_by_lex(&key, &min, &max) {
            Ok(members) => RespValue::Array(members.into_iter().map(RespValue::bulk_string).collect()),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_zunionstore(&self, args_in: &[RespValue]) -> RespValue {
        self.zset_store(args_in, "ZUNIONSTORE", false)
    }

    pub(crate) fn cmd_zinterstore(&self, args_in: &[RespValue]) -> RespValue {
        self.zset_store(args_in, "ZINTERSTORE", true)
    }

    fn zset_store(&self, args_in: &[RespValue], name: &str, intersect: bool) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err(name);
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let numkeys = match args::integer(&args_in[1]) {
            Some(n) if n > 0 => n as usize,
            _ => return CoreError::NotAnInteger.into(),
        };
        if args_in.len() < 2 + numkeys {
            return args::arity_err(name);
        }
        let keys: Vec<_> = args_in[2..2 + numkeys].iter().filter_map(args::bytes).collect();
        let mut weights = vec![1.0; numkeys];
        let mut aggregate = ZAggregate::Sum;
        let mut i = 2 + numkeys;
        while i < args_in.len() {
            match args::upper(&args_in[i]).as_deref() {
                Some("WEIGHTS") => {
                    for w in weights.iter_mut() {
                        i += 1;
                        *w = match args_in.get(i).and_then(args::float) {
                            Some(v) => v,
                            None => return CoreError::NotAFloat.into(),
                        };
                    }
                }
                Some("AGGREGATE") => {
                    i += 1;
                    aggregate = match args_in.get(i).and_then(args::upper).as_deref() {
                        Some("SUM") => ZAggregate::Sum,
                        Some("MIN") => ZAggregate::Min,
                        Some("MAX") => ZAggregate::Max,
                        _ => return CoreError::Syntax.into(),
                    };
                }
                _ => return CoreError::Syntax.into(),
            }
            i += 1;
        }
        match self.engine().zset_store_combine(&dest, &keys, &weights, aggregate, intersect) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }
}

fn parse_score_bound(value: &RespValue) -> Option<(f64, bool)> {
    let s = args::string(value)?;
    if let Some(rest) = s.strip_prefix('(') {
        rest.parse::<f64>().ok().map(|v| (v, true))
    } else {
        match s.as_str() {
            "-inf" => Some((f64::NEG_INFINITY, false)),
            "+inf" | "inf" => Some((f64::INFINITY, false)),
            _ => s.parse::<f64>().ok().map(|v| (v, false)),
        }
    }
}
