//! Stream command family: append-only entries plus consumer-group
//! delivery tracking.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::storage::stream::StreamId;

fn entries_reply(entries: Vec<(StreamId, Vec<(bytes::Bytes, bytes::Bytes)>)>) -> RespValue {
    RespValue::Array(
        entries
            .into_iter()
            .map(|(id, fields)| {
                let mut flat = Vec::with_capacity(fields.len() * 2);
                for (f, v) in fields {
                    flat.push(RespValue::bulk_string(f));
                    flat.push(RespValue::bulk_string(v));
                }
                RespValue::Array(vec![RespValue::bulk_string(id.to_bytes()), RespValue::Array(flat)])
            })
            .collect(),
    )
}

fn parse_id(raw: &[u8]) -> Option<(u64, Option<u64>)> {
    std::str::from_utf8(raw).ok().and_then(|s| StreamId::parse(s).ok())
}

impl Dispatcher {
    pub(crate) fn cmd_xadd(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 4 {
            return args::arity_err("XADD");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let mut i = 1;
        let mut maxlen = None;
        if args::upper(&args_in[i]).as_deref() == Some("MAXLEN") {
            i += 1;
            if args_in.get(i).and_then(args::string).as_deref() == Some("~") {
                i += 1;
            }
            maxlen = match args_in.get(i).and_then(args::integer) {
                Some(n) if n >= 0 => Some(n as usize),
                _ => return CoreError::NotAnInteger.into(),
            };
            i += 1;
        }
        let id_raw = match args_in.get(i).and_then(args::bytes) {
            Some(b) => b,
            None => return args::arity_err("XADD"),
        };
        i += 1;
        let id = if id_raw.as_ref() == b"*" { None } else { parse_id(&id_raw) };
        if id.is_none() && id_raw.as_ref() != b"*" {
            return CoreError::generic("Invalid stream ID specified as stream command argument").into();
        }
        if args_in[i..].len() < 2 || args_in[i..].len() % 2 != 0 {
            return args::arity_err("XADD");
        }
        let fields: Vec<_> = args_in[i..]
            .chunks(2)
            .map(|c| (args::bytes(&c[0]).unwrap_or_default(), args::bytes(&c[1]).unwrap_or_default()))
            .collect();
        match self.engine().stream_add(&key, id, fields, maxlen) {
            Ok(id) => RespValue::bulk_string(id),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xlen(&self, args_in: &[RespValue]) -> RespValue {
        let key = match args_in.first().and_then(args::bytes) {
            Some(k) => k,
            None => return args::arity_err("XLEN"),
        };
        match self.engine().stream_len(&key) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xrange(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("XRANGE");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let start = resolve_bound(&args_in[1], StreamId::MIN);
        let end = resolve_bound(&args_in[2], StreamId { ms: u64::MAX, seq: u64::MAX });
        let count = args_in.get(4).and_then(args::integer).map(|n| n.max(0) as usize);
        match self.engine().stream_range(&key, start, end, count) {
            Ok(entries) => entries_reply(entries),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xtrim(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("XTRIM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        if args::upper(&args_in[1]).as_deref() != Some("MAXLEN") {
            return CoreError::Syntax.into();
        }
        let mut i = 2;
        if args_in.get(i).and_then(args::string).as_deref() == Some("~") {
            i += 1;
        }
        let maxlen = match args_in.get(i).and_then(args::integer) {
            Some(n) if n >= 0 => n as usize,
            _ => return CoreError::NotAnInteger.into(),
        };
        match self.engine().stream_trim_maxlen(&key, maxlen) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xdel(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 2 {
            return args::arity_err("XDEL");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let ids: Vec<StreamId> = args_in[1..]
            .iter()
            .filter_map(|v| args::bytes(v))
            .filter_map(|b| parse_id(&b))
            .map(|(ms, seq)| StreamId { ms, seq: seq.unwrap_or(0) })
            .collect();
        match self.engine().stream_del(&key, &ids) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xgroup(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 4 || args::upper(&args_in[0]).as_deref() != Some("CREATE") {
            return CoreError::Syntax.into();
        }
        let key = args::bytes(&args_in[1]).unwrap_or_default();
        let group = args::bytes(&args_in[2]).unwrap_or_default();
        let start_id = if args_in[3].as_bytes() == Some(b"$") {
            StreamId { ms: u64::MAX, seq: u64::MAX }
        } else {
            match args::bytes(&args_in[3]).and_then(|b| parse_id(&b)) {
                Some((ms, seq)) => StreamId { ms, seq: seq.unwrap_or(0) },
                None => return CoreError::generic("Invalid stream ID specified as stream command argument").into(),
            }
        };
        match self.engine().stream_group_create(&key, &group, start_id) {
            Ok(()) => RespValue::ok(),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xreadgroup(&self, args_in: &[RespValue]) -> RespValue {
        // XREADGROUP GROUP <group> <consumer> [COUNT n] STREAMS <key> <id>
        if args_in.len() < 6 || args::upper(&args_in[0]).as_deref() != Some("GROUP") {
            return CoreError::Syntax.into();
        }
        let group = args::bytes(&args_in[1]).unwrap_or_default();
        let consumer = args::bytes(&args_in[2]).unwrap_or_default();
        let mut i = 3;
        let mut count = None;
        if args::upper(&args_in[i]).as_deref() == Some("COUNT") {
            i += 1;
            count = args_in.get(i).and_then(args::integer).map(|n| n.max(0) as usize);
            i += 1;
        }
        if args_in.get(i).and_then(args::upper).as_deref() != Some("STREAMS") {
            return CoreError::Syntax.into();
        }
        i += 1;
        let remaining = &args_in[i..];
        if remaining.len() != 2 {
            return CoreError::generic("only one stream is supported per XREADGROUP call").into();
        }
        let key = args::bytes(&remaining[0]).unwrap_or_default();
        match self.engine().stream_read_group(&key, &group, &consumer, count) {
            Ok(entries) => RespValue::Array(vec![RespValue::Array(vec![
                RespValue::bulk_string(key),
                entries_reply(entries),
            ])]),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xack(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 3 {
            return args::arity_err("XACK");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let group = args::bytes(&args_in[1]).unwrap_or_default();
        let ids: Vec<StreamId> = args_in[2..]
            .iter()
            .filter_map(args::bytes)
            .filter_map(|b| parse_id(&b))
            .map(|(ms, seq)| StreamId { ms, seq: seq.unwrap_or(0) })
            .collect();
        match self.engine().stream_ack(&key, &group, &ids) {
            Ok(n) => RespValue::Integer(n as i64),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xclaim(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 5 {
            return args::arity_err("XCLAIM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let group = args::bytes(&args_in[1]).unwrap_or_default();
        let consumer = args::bytes(&args_in[2]).unwrap_or_default();
        let min_idle_ms = match args::integer(&args_in[3]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let ids: Vec<StreamId> = args_in[4..]
            .iter()
            .filter_map(args::bytes)
            .filter_map(|b| parse_id(&b))
            .map(|(ms, seq)| StreamId { ms, seq: seq.unwrap_or(0) })
            .collect();
        match self.engine().stream_claim(&key, &group, &consumer, min_idle_ms, &ids) {
            Ok(entries) => entries_reply(entries),
            Err(e) => e.into(),
        }
    }

    pub(crate) fn cmd_xautoclaim(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() < 5 {
            return args::arity_err("XAUTOCLAIM");
        }
        let key = args::bytes(&args_in[0]).unwrap_or_default();
        let group = args::bytes(&args_in[1]).unwrap_or_default();
        let consumer = args::bytes(&args_in[2]).unwrap_or_default();
        let min_idle_ms = match args::integer(&args_in[3]) {
            Some(n) if n >= 0 => n as u64,
            _ => return CoreError::NotAnInteger.into(),
        };
        let start = match args::bytes(&args_in[4]).and_then(|b| parse_id(&b)) {
            Some((ms, seq)) => StreamId { ms, seq: seq.unwrap_or(0) },
            None => StreamId::MIN,
        };
        let count = args_in.get(6).and_then(args::integer).map(|n| n.max(1) as usize).unwrap_or(100);
        match self.engine().stream_autoclaim(&key, &group, &consumer, min_idle_ms, start, count) {
            Ok((next, entries)) => RespValue::Array(vec![RespValue::bulk_string(next.to_bytes()), entries_reply(entries)]),
            Err(e) => e.into(),
        }
    }
}

fn resolve_bound(value: &RespValue, default: StreamId) -> StreamId {
    match args::bytes(value) {
        Some(b) if b.as_ref() == b"-" || b.as_ref() == b"+" => default,
        Some(b) => parse_id(&b).map(|(ms, seq)| StreamId { ms, seq: seq.unwrap_or(0) }).unwrap_or(default),
        None => default,
    }
}
