//! Probabilistic data structure command family: Bloom/Cuckoo
//! filters, Count-Min Sketch, Top-K, HyperLogLog, t-digest.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;

impl Dispatcher {
    pub(crate) fn cmd_bf_reserve(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("BF.RESERVE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let error_rate = match args::float(&args_in[1]) {
            Some(v) => v,
            None => return CoreError::NotAFloat.into(),
        };
        let capacity = match args::integer(&args_in[2]) {
            Some(n) if n > 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        match self.engine().bf_reserve(&key, error_rate, capacity) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bf_add(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("BF.ADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let item = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().bf_add(&key, &item) {
            Ok(added) => RespValue::Integer(if added { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bf_exists(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("BF.EXISTS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let item = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().bf_exists(&key, &item) {
            Ok(present) => RespValue::Integer(if present { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bf_merge(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("BF.MERGE");
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let sources: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().bf_merge(&dest, &sources) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_cf_add(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("CF.ADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let item = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().cf_add(&key, &item) {
            Ok(added) => RespValue::Integer(if added { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_cf_exists(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("CF.EXISTS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let item = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().cf_exists(&key, &item) {
            Ok(present) => RespValue::Integer(if present { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_cf_del(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("CF.DEL");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let item = args::bytes(&args_in[1]).unwrap_or_default();
        match self.engine().cf_del(&key, &item) {
            Ok(removed) => RespValue::Integer(if removed { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_cms_incrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 || (args_in.len() - 1) % 2 != 0 {
            return args::arity_err("CMS.INCRBY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut out = Vec::new();
        for chunk in args_in[1..].chunks(2) {
            let item = args::bytes(&chunk[0]).unwrap_or_default();
            let delta = match args::integer(&chunk[1]) {
                Some(n) if n >= 0 => n as u64,
                _ => return CoreError::NotAnInteger.into(),
            };
            match self.engine().cms_incrby(&key, &item, delta) {
                Ok(n) => out.push(RespValue::Integer(n as i64)),
                Err(e) => return e.into(),
            }
        }
        RespValue::Array(out)
    }

    pub(crate) fn cmd_cms_query(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("CMS.QUERY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut out = Vec::new();
        for item in args_in[1..].iter().filter_map(args::bytes) {
            match self.engine().cms_query(&key, &item) {
                Ok(n) => out.push(RespValue::Integer(n as i64)),
                Err(e) => return e.into(),
            }
        }
        RespValue::Array(out)
    }

    pub(crate) fn cmd_cms_merge(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("CMS.MERGE");
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let numkeys = match args::integer(&args_in[1]) {
            Some(n) if n > 0 => n as usize,
            _ => return CoreError::NotAnInteger.into(),
        };
        if args_in.len() < 2 + numkeys {
            return args::arity_err("CMS.MERGE");
        }
        let sources: Vec<_> = args_in[2..2 + numkeys]
            .iter()
            .filter_map(args::bytes)
            .map(|b| (b, 1u64))
            .collect();
        match self.engine().cms_merge(&dest, &sources) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_topk_add(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("TOPK.ADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let items: Vec<_> = args_in[1..].iter().filter_map(args::bytes).map(|b| (b, 1.0)).collect();
        match self.engine().topk_add(&key, &items) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_topk_query(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("TOPK.QUERY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut out = Vec::new();
        for item in args_in[1..].iter().filter_map(args::bytes) {
            match self.engine().topk_query(&key, &item) {
                Ok(present) => out.push(RespValue::Integer(if present { 1 } else { 0 })),
                Err(e) => return e.into(),
            }
        }
        RespValue::Array(out)
    }

    pub(crate) fn cmd_topk_list(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("TOPK.LIST"),
        };
        match self.engine().topk_list(&key) {
            Ok(items) => RespValue::Array(items.into_iter().map(RespValue::bulk_string).collect()),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_pfadd(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("PFADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let items: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().pfadd(&key, &items) {
            Ok(changed) => RespValue::Integer(if changed { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_pfcount(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("PFCOUNT");
        }
        let keys: Vec<_> = args_in.iter().filter_map(args::bytes).collect();
        match self.engine().pfcount(&keys) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_pfmerge(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("PFMERGE");
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let sources: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().pfmerge(&dest, &sources) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_tdigest_add(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("TDIGEST.ADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut values = Vec::new();
        for v in &args_in[1..] {
            match args::float(v) {
                Some(n) => values.push(n),
                None => return CoreError::NotAFloat.into(),
            }
        }
        match self.engine().tdigest_add(&key, &values) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_tdigest_quantile(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("TDIGEST.QUANTILE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let q = match args::float(&args_in[1]) {
            Some(n) => n,
            None => return CoreError::NotAFloat.into(),
        };
        match self.engine().tdigest_quantile(&key, q) {
            Ok(Some(v)) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(v)),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_tdigest_merge(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("TDIGEST.MERGE");
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let sources: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().tdigest_merge(&dest, &sources) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }
}
