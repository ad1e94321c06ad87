//! Time series command family.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;

impl Dispatcher {
    pub(crate) fn cmd_ts_create(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("TS.CREATE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut retention = None;
        let mut labels = Vec::new();
        let mut i = 1;
        while i < args_in.len() {
            match args::upper(&args_in[i]).as_deref() {
                Some("RETENTION") => {
                    i += 1;
                    retention = args_in.get(i).and_then(args::integer).map(|n| n.max(0) as u64);
                }
                Some("LABELS") => {
                    i += 1;
                    while i + 1 < args_in.len() {
                        let k = args::bytes(&args_in[i]).unwrap_or_default();
                        let v = args::bytes(&args_in[i + 1]).unwrap_or_default();
                        labels.push((k, v));
                        i += 2;
                    }
                    continue;
                }
                _ => return CoreError::Syntax.into(),
            }
            i += 1;
        }
        match self.engine().ts_create(&key, retention, labels) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_ts_add(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("TS.ADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let ts = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let value = match args::float(&args_in[2]) {
            Some(v) => v,
            None => return CoreError::NotAFloat.into(),
        };
        match self.engine().ts_add(&key, ts, value) {
            Ok(stored_ts) => RespValue::Integer(stored_ts as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_ts_get(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("TS.GET"),
        };
        match self.engine().ts_get(&key) {
            Ok(Some((ts, value))) => RespValue::Array(vec![
                RespValue::Integer(ts as i64),
                RespValue::bulk_string(crate::storage::string::format_float_no_exponent(value)),
            ]),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_ts_range(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("TS.RANGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let from = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let to = match args::integer(&args_in[2]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        match self.engine().ts_range(&key, from, to) {
            Ok(points) => RespValue::Array(
                points
                    .into_iter()
                    .map(|(ts, value)| {
                        RespValue::Array(vec![
                            RespValue::Integer(ts as i64),
                            RespValue::bulk_string(crate::storage::string::format_float_no_exponent(value)),
                        ])
                    })
                    .collect(),
            ),
            Err(e) => e.into(),
        }
    }
}
