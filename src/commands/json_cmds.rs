//! JSON command family.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;

impl Dispatcher {
    pub(crate) fn cmd_json_set(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("JSON.SET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args::string(&args_in[1]).unwrap_or_default();
        let raw = args::string(&args_in[2]).unwrap_or_default();
        let mut nx = false;
        let mut xx = false;
        for opt in &args_in[3..] {
            match args::upper(opt).as_deref() {
                Some("NX") => nx = true,
                Some("XX") => xx = true,
                _ => return CoreError::Syntax.into(),
            }
        }
        match self.engine().json_set(&key, &path, &raw, nx, xx) {
            Ok(applied) => {
                if applied {
                    RespValue::ok()
                } else {
                    RespValue::null()
                }
            }
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_get(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("JSON.GET");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args_in.get(1).and_then(args::string).unwrap_or_else(|| "$".to_string());
        match self.engine().json_get(&key, &path) {
            Ok(Some(s)) => RespValue::bulk_string(s),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_del(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("JSON.DEL");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args_in.get(1).and_then(args::string).unwrap_or_else(|| "$".to_string());
        match self.engine().json_del(&key, &path) {
            Ok(removed) => RespValue::Integer(if removed { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_type(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("JSON.TYPE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args_in.get(1).and_then(args::string).unwrap_or_else(|| "$".to_string());
        match self.engine().json_type(&key, &path) {
            Ok(Some(name)) => RespValue::bulk_string(name),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_numincrby(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("JSON.NUMINCRBY");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args::string(&args_in[1]).unwrap_or_default();
        let delta = match args::float(&args_in[2]) {
            Some(n) => n,
            None => return CoreError::NotAFloat.into(),
        };
        match self.engine().json_numincrby(&key, &path, delta) {
            Ok(n) => RespValue::bulk_string(crate::storage::string::format_float_no_exponent(n)),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_merge(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("JSON.MERGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args::string(&args_in[1]).unwrap_or_default();
        let raw = args::string(&args_in[2]).unwrap_or_default();
        match self.engine().json_merge(&key, &path, &raw) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_objkeys(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("JSON.OBJKEYS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args_in.get(1).and_then(args::string).unwrap_or_else(|| "$".to_string());
        match self.engine().json_objkeys(&key, &path) {
            Ok(Some(keys)) => RespValue::Array(keys.into_iter().map(RespValue::bulk_string).collect()),
            Ok(None) => RespValue::null(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_arrappend(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("JSON.ARRAPPEND");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let path = args::string(&args_in[1]).unwrap_or_default();
        let raws: Vec<_> = args_in[2..].iter().filter_map(args::string).collect();
        match self.engine().json_arrappend(&key, &path, &raws) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_json_debug(&self, args_in: &[RespValue]) -> RespValue {
        // JSON.DEBUG MEMORY key: no dedicated accounting, report 0 like the
        // rest of MEMORY USAGE's best-effort stance.
        let _ = args_in;
        RespValue::Integer(0)
    }
}
