//! Bitmap command family.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::bitmap::BitOp;

impl Dispatcher {
    pub(crate) fn cmd_setbit(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 3 {
            return args::arity_err("SETBIT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let offset = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::generic("bit offset is not an integer or out of range").into(),
        };
        let bit = match args::integer(&args_in[2]) {
            Some(0) => false,
            Some(1) => true,
            _ => return CoreError::generic("bit is not an integer or out of range").into(),
        };
        match self.engine().bitmap_setbit(&key, offset, bit) {
            Ok(prev) => RespValue::Integer(if prev { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_getbit(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("GETBIT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let offset = match args::integer(&args_in[1]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::generic("bit offset is not an integer or out of range").into(),
        };
        match self.engine().bitmap_getbit(&key, offset) {
            Ok(bit) => RespValue::Integer(if bit { 1 } else { 0 }),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bitcount(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("BITCOUNT");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let range = match (args_in.get(1).and_then(args::integer), args_in.get(2).and_then(args::integer)) {
            (Some(a), Some(b)) => Some((a, b)),
            (None, None) => None,
            _ => return CoreError::Syntax.into(),
        };
        match self.engine().bitmap_count(&key, range) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bitpos(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("BITPOS");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let target = match args::integer(&args_in[1]) {
            Some(0) => false,
            Some(1) => true,
            _ => return CoreError::generic("bit is not an integer or out of range").into(),
        };
        let range = match (args_in.get(2).and_then(args::integer), args_in.get(3).and_then(args::integer)) {
            (Some(a), Some(b)) => Some((a, b)),
            (Some(a), None) => Some((a, -1)),
            (None, None) => None,
            _ => return CoreError::Syntax.into(),
        };
        match self.engine().bitmap_pos(&key, target, range) {
            Ok(n) => RespValue::Integer(n),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_bitop(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("BITOP");
        }
        let op = match args::upper(&args_in[0]).as_deref() {
            Some("AND") => BitOp::And,
            Some("OR") => BitOp::Or,
            Some("XOR") => BitOp::Xor,
            Some("NOT") => BitOp::Not,
            _ => return CoreError::Syntax.into(),
        };
        let dest = args::bytes(&args_in[1]).unwrap_or_default();
        let sources: Vec<_> = args_in[2..].iter().filter_map(args::bytes).collect();
        if op == BitOp::Not && sources.len() != 1 {
            return CoreError::generic("BITOP NOT must be called with a single source key").into();
        }
        match self.engine().bitmap_op(op, &dest, &sources) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }
}
