//! Set command family.

use super::args;
use super::reply;
use super::Dispatcher;
use crate::protocol::RespValue;
use std::collections::HashSet;

impl Dispatcher {
    pub(crate) fn cmd_sadd(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("SADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let members: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().set_add(&key, &members) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_srem(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("SREM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let members: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match self.engine().set_rem(&key, &members) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_smembers(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("SMEMBERS"),
        };
        match self.engine().set_members(&key) {
            Ok(members) => reply::array_of_bulk(members),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_sismember(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("SISMEMBER");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let member = args::bytes(&args_in[1]).unwrap_or_default();
        reply::bool_as_integer(self.engine().set_is_member(&key, &member))
    }

    pub(crate) fn cmd_scard(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("SCARD"),
        };
        match self.engine().set_card(&key) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_sunion(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op(args_in, "SUNION", |e, keys| e.set_union(keys))
    }

    pub(crate) fn cmd_sinter(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op(args_in, "SINTER", |e, keys| e.set_inter(keys))
    }

    pub(crate) fn cmd_sdiff(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op(args_in, "SDIFF", |e, keys| e.set_diff(keys))
    }

    fn set_op(
        &self,
        args_in: &[RespValue],
        name: &str,
        op: impl Fn(&crate::storage::KeyspaceEngine, &[bytes::Bytes]) -> crate::error::CoreResult<HashSet<bytes::Bytes>>,
    ) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err(name);
        }
        let keys: Vec<_> = args_in.iter().filter_map(args::bytes).collect();
        match op(self.engine(), &keys) {
            Ok(set) => RespValue::Array(set.into_iter().map(RespValue::bulk_string).collect()),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_sunionstore(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op_store(args_in, "SUNIONSTORE", |e, keys| e.set_union(keys))
    }

    pub(crate) fn cmd_sinterstore(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op_store(args_in, "SINTERSTORE", |e, keys| e.set_inter(keys))
    }

    pub(crate) fn cmd_sdiffstore(&self, args_in: &[RespValue]) -> RespValue {
        self.set_op_store(args_in, "SDIFFSTORE", |e, keys| e.set_diff(keys))
    }

    fn set_op_store(
        &self,
        args_in: &[RespValue],
        name: &str,
        op: impl Fn(&crate::storage::KeyspaceEngine, &[bytes::Bytes]) -> crate::error::CoreResult<HashSet<bytes::Bytes>>,
    ) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err(name);
        }
        let dest = args::bytes(&args_in[0]).unwrap_or_default();
        let keys: Vec<_> = args_in[1..].iter().filter_map(args::bytes).collect();
        match op(self.engine(), &keys) {
            Ok(set) => RespValue::Integer(self.engine().set_store(&dest, set) as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_smove(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("SMOVE");
        }
        let src = args::bytes(&args_in[0]).unwrap_or_default();
        let dst = args::bytes(&args_in[1]).unwrap_or_default();
        let member = args::bytes(&args_in[2]).unwrap_or_default();
        match self.engine().set_move(&src, &dst, &member) {
            Ok(moved) => RespValue::Integer(if moved { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }
}
