//! Command dispatcher: a static uppercase-name match routing RESP arrays to
//! handler methods grouped by family, one `impl Dispatcher` block per value
//! family — the same split the storage layer uses (`storage::zset`,
//! `storage::hash`, ...) applied one layer up.
//!
//! ```text
//! RESP array ─▶ Dispatcher::execute ─▶ txn/queueing ─▶ dispatch_single
//!                                                         │
//!                                                         ▼
//!                                              cmd_* (family modules)
//!                                                         │
//!                                            ┌────────────┴────────────┐
//!                                            ▼                         ▼
//!                                     KeyspaceEngine              AOF + replication
//! ```

pub mod args;
pub mod bitmaps;
pub mod client_cmds;
pub mod config_cmds;
pub mod geo_cmds;
pub mod hashes;
pub mod json_cmds;
pub mod keys;
pub mod lists;
pub mod prob_cmds;
pub mod replication_cmds;
pub mod reply;
pub mod server_cmds;
pub mod sets;
pub mod streams;
pub mod strings;
pub mod table;
pub mod timeseries_cmds;
pub mod zsets;

use crate::aof::AofHandle;
use crate::config::Config;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::replication::ReplicationManager;
use crate::session::{ClientRegistry, ClientSession};
use crate::storage::KeyspaceEngine;
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Everything a command needs that outlives any single connection.
pub struct Shared {
    pub engine: Arc<KeyspaceEngine>,
    pub config: Config,
    pub clients: Arc<ClientRegistry>,
    pub aof: std::sync::RwLock<Option<AofHandle>>,
    pub replication: Arc<ReplicationManager>,
    pub start_time: Instant,
}

impl Shared {
    pub fn new(
        engine: Arc<KeyspaceEngine>,
        config: Config,
        clients: Arc<ClientRegistry>,
        replication: Arc<ReplicationManager>,
    ) -> Self {
        Shared {
            engine,
            config,
            clients,
            aof: std::sync::RwLock::new(None),
            replication,
            start_time: Instant::now(),
        }
    }

    pub fn set_aof(&self, handle: AofHandle) {
        *self.aof.write().unwrap() = Some(handle);
    }
}

/// Routes one decoded command for one session. Cheap to clone (wraps an
/// `Arc<Shared>`), so each connection task owns its own `Dispatcher`.
#[derive(Clone)]
pub struct Dispatcher {
    pub shared: Arc<Shared>,
    /// `true` while replaying the AOF on startup: suppresses re-appending
    /// to the AOF and re-propagating to replicas for the commands being
    /// replayed.
    pub loading: bool,
}

impl Dispatcher {
    pub fn new(shared: Arc<Shared>) -> Self {
        Dispatcher { shared, loading: false }
    }

    pub fn loading_mode(shared: Arc<Shared>) -> Self {
        Dispatcher { shared, loading: true }
    }

    pub fn engine(&self) -> &KeyspaceEngine {
        &self.shared.engine
    }

    /// Top-level entry point: handles the transaction state machine, then
    /// executes (or queues) the command.
    pub async fn execute(&self, session: &mut ClientSession, command: RespValue) -> RespValue {
        session.touch();
        self.shared.clients.touch(session.id, session.db_index);

        let args = match command {
            RespValue::Array(ref a) if !a.is_empty() => a.clone(),
            RespValue::Array(_) => return RespValue::error("ERR empty command"),
            _ => return RespValue::error("ERR invalid command format"),
        };

        let cmd_name = match args::upper(&args[0]) {
            Some(s) => s,
            None => return RespValue::error("ERR invalid command name"),
        };
        let rest = &args[1..];

        trace!(client = session.id, cmd = %cmd_name, db = session.db_index, "dispatching command");

        match cmd_name.as_str() {
            "MULTI" => {
                if session.txn.active {
                    return RespValue::error("ERR MULTI calls can not be nested");
                }
                session.txn.active = true;
                session.txn.dirty = false;
                session.txn.queued.clear();
                RespValue::ok()
            }
            "DISCARD" => {
                if !session.txn.active {
                    return RespValue::error("ERR DISCARD without MULTI");
                }
                session.txn.reset();
                RespValue::ok()
            }
            "EXEC" => self.exec_transaction(session).await,
            "WATCH" => {
                if session.txn.active {
                    return RespValue::error("ERR WATCH inside MULTI is not allowed");
                }
                let keys: Vec<_> = rest.iter().filter_map(args::bytes).collect();
                if keys.is_empty() {
                    return args::arity_err("WATCH");
                }
                crate::txn::watch(&mut session.txn, self.engine(), &keys);
                RespValue::ok()
            }
            "UNWATCH" => {
                crate::txn::unwatch(&mut session.txn);
                RespValue::ok()
            }
            "BLPOP" | "BRPOP" | "BLMOVE" | "BLMPOP" if !session.txn.active => {
                let reply = self.dispatch_blocking(&cmd_name, rest).await;
                if !self.loading
                    && !matches!(reply, RespValue::Error(_) | RespValue::Null | RespValue::NullArray)
                {
                    self.persist_and_replicate(&args).await;
                }
                reply
            }
            _ if session.txn.active => {
                if let Some(min) = table::min_arity(&cmd_name) {
                    if rest.len() < min {
                        session.txn.dirty = true;
                        return args::arity_err(&cmd_name);
                    }
                }
                session.txn.queued.push(RespValue::Array(args.clone()));
                RespValue::simple_string("QUEUED")
            }
            _ => self.dispatch_single(session, &cmd_name, rest, &args).await,
        }
    }

    async fn exec_transaction(&self, session: &mut ClientSession) -> RespValue {
        if !session.txn.active {
            return RespValue::error("ERR EXEC without MULTI");
        }
        if session.txn.dirty {
            session.txn.reset();
            return RespValue::error("EXECABORT Transaction discarded because of previous errors");
        }
        if !crate::txn::watch_still_valid(&session.txn, self.engine()) {
            session.txn.reset();
            return RespValue::null_array();
        }

        let queued = std::mem::take(&mut session.txn.queued);
        session.txn.reset();

        let mut results = Vec::with_capacity(queued.len());
        for command in queued {
            let args = match &command {
                RespValue::Array(a) => a.clone(),
                _ => continue,
            };
            let cmd_name = args::upper(&args[0]).unwrap_or_default();
            let result = self.dispatch_single(session, &cmd_name, &args[1..], &args).await;
            results.push(result);
        }
        RespValue::Array(results)
    }

    /// Executes one non-transaction-control command and, on success,
    /// persists it to the AOF and propagates it to replicas if it is a
    /// write.
    async fn dispatch_single(
        &self,
        session: &mut ClientSession,
        cmd: &str,
        args: &[RespValue],
        full_command: &[RespValue],
    ) -> RespValue {
        let reply = self.route(session, cmd, args);

        if !self.loading && !matches!(reply, RespValue::Error(_)) && table::requires_persistence(cmd) {
            self.persist_and_replicate(full_command).await;
        }

        reply
    }

    async fn dispatch_blocking(&self, cmd: &str, args: &[RespValue]) -> RespValue {
        use crate::storage::list::Side;

        match cmd {
            "BLPOP" | "BRPOP" => {
                if args.len() < 2 {
                    return args::arity_err(cmd);
                }
                let timeout = match args::float(&args[args.len() - 1]) {
                    Some(t) => t,
                    None => return CoreError::NotAFloat.into(),
                };
                let keys: Vec<_> = args[..args.len() - 1].iter().filter_map(args::bytes).collect();
                let side = if cmd == "BLPOP" { Side::Left } else { Side::Right };
                self.blocking_pop(&keys, side, timeout).await
            }
            "BLMOVE" => {
                if args.len() != 5 {
                    return args::arity_err(cmd);
                }
                let src = args::bytes(&args[0]).unwrap_or_default();
                let dst = args::bytes(&args[1]).unwrap_or_default();
                let from = match args::upper(&args[2]).as_deref() {
                    Some("LEFT") => Side::Left,
                    Some("RIGHT") => Side::Right,
                    _ => return CoreError::Syntax.into(),
                };
                let to = match args::upper(&args[3]).as_deref() {
                    Some("LEFT") => Side::Left,
                    Some("RIGHT") => Side::Right,
                    _ => return CoreError::Syntax.into(),
                };
                let timeout = match args::float(&args[4]) {
                    Some(t) => t,
                    None => return CoreError::NotAFloat.into(),
                };
                self.blocking_move(&src, &dst, from, to, timeout).await
            }
            "BLMPOP" => {
                if args.len() < 4 {
                    return args::arity_err(cmd);
                }
                let timeout = match args::float(&args[0]) {
                    Some(t) => t,
                    None => return CoreError::NotAFloat.into(),
                };
                let numkeys = match args::integer(&args[1]) {
                    Some(n) if n > 0 => n as usize,
                    _ => return CoreError::NotAnInteger.into(),
                };
                if args.len() < 2 + numkeys + 1 {
                    return args::arity_err(cmd);
                }
                let keys: Vec<_> = args[2..2 + numkeys].iter().filter_map(args::bytes).collect();
                let side = match args::upper(&args[2 + numkeys]).as_deref() {
                    Some("LEFT") => Side::Left,
                    Some("RIGHT") => Side::Right,
                    _ => return CoreError::Syntax.into(),
                };
                self.blocking_pop(&keys, side, timeout).await
            }
            _ => unreachable!(),
        }
    }

    async fn persist_and_replicate(&self, full_command: &[RespValue]) {
        let command = RespValue::Array(full_command.to_vec());
        self.shared.replication.propagate(&command);

        let aof = self.shared.aof.read().unwrap().clone();
        if let Some(handle) = aof {
            if let Err(e) = handle.append(&command).await {
                tracing::error!(error = %e, "aof append failed");
            }
        }
    }

    fn route(&self, session: &mut ClientSession, cmd: &str, args: &[RespValue]) -> RespValue {
        match cmd {
            // Strings
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "GETSET" => self.cmd_getset(args),
            "GETDEL" => self.cmd_getdel(args),
            "GETEX" => self.cmd_getex(args),
            "APPEND" => self.cmd_append(args),
            "STRLEN" => self.cmd_strlen(args),
            "GETRANGE" => self.cmd_getrange(args),
            "SETRANGE" => self.cmd_setrange(args),
            "INCR" => self.cmd_incr(args),
            "DECR" => self.cmd_decr(args),
            "INCRBY" => self.cmd_incrby(args),
            "DECRBY" => self.cmd_decrby(args),
            "INCRBYFLOAT" => self.cmd_incrbyfloat(args),
            "MSET" => self.cmd_mset(args),
            "MSETNX" => self.cmd_msetnx(args),
            "MGET" => self.cmd_mget(args),
            "SETNX" => self.cmd_setnx(args),
            "SETEX" => self.cmd_setex(args),
            "PSETEX" => self.cmd_psetex(args),
            "LCS" => self.cmd_lcs(args),

            // Keys
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "EXPIRE" => self.cmd_expire(args),
            "PEXPIRE" => self.cmd_pexpire(args),
            "EXPIREAT" => self.cmd_expireat(args),
            "TTL" => self.cmd_ttl(args),
            "PTTL" => self.cmd_pttl(args),
            "PERSIST" => self.cmd_persist(args),
            "KEYS" => self.cmd_keys(args),
            "SCAN" => self.cmd_scan(args),
            "TYPE" => self.cmd_type(args),
            "RENAME" => self.cmd_rename(args),
            "RENAMENX" => self.cmd_renamenx(args),
            "DELTYPE" => self.cmd_deltype(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "FLUSHALL" | "FLUSHDB" => self.cmd_flushall(args),

            // Hashes
            "HSET" => self.cmd_hset(args),
            "HSETNX" => self.cmd_hsetnx(args),
            "HGET" => self.cmd_hget(args),
            "HMGET" => self.cmd_hmget(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HDEL" => self.cmd_hdel(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HLEN" => self.cmd_hlen(args),
            "HINCRBY" => self.cmd_hincrby(args),
            "HINCRBYFLOAT" => self.cmd_hincrbyfloat(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HVALS" => self.cmd_hvals(args),
            "HSCAN" => self.cmd_hscan(args),

            // Lists
            "LPUSH" => self.cmd_lpush(args),
            "RPUSH" => self.cmd_rpush(args),
            "LPUSHX" => self.cmd_lpushx(args),
            "RPUSHX" => self.cmd_rpushx(args),
            "LPOP" => self.cmd_lpop(args),
            "RPOP" => self.cmd_rpop(args),
            "LLEN" => self.cmd_llen(args),
            "LINDEX" => self.cmd_lindex(args),
            "LRANGE" => self.cmd_lrange(args),
            "LSET" => self.cmd_lset(args),
            "LREM" => self.cmd_lrem(args),
            "LTRIM" => self.cmd_ltrim(args),
            "LINSERT" => self.cmd_linsert(args),
            "LMOVE" => self.cmd_lmove(args),

            // Sets
            "SADD" => self.cmd_sadd(args),
            "SREM" => self.cmd_srem(args),
            "SMEMBERS" => self.cmd_smembers(args),
            "SISMEMBER" => self.cmd_sismember(args),
            "SCARD" => self.cmd_scard(args),
            "SUNION" => self.cmd_sunion(args),
            "SINTER" => self.cmd_sinter(args),
            "SDIFF" => self.cmd_sdiff(args),
            "SUNIONSTORE" => self.cmd_sunionstore(args),
            "SINTERSTORE" => self.cmd_sinterstore(args),
            "SDIFFSTORE" => self.cmd_sdiffstore(args),
            "SMOVE" => self.cmd_smove(args),

            // Sorted sets
            "ZADD" => self.cmd_zadd(args),
            "ZSCORE" => self.cmd_zscore(args),
            "ZINCRBY" => self.cmd_zincrby(args),
            "ZREM" => self.cmd_zrem(args),
            "ZCARD" => self.cmd_zcard(args),
            "ZRANK" => self.cmd_zrank(args, false),
            "ZREVRANK" => self.cmd_zrank(args, true),
            "ZRANGE" => self.cmd_zrange(args, false),
            "ZREVRANGE" => self.cmd_zrange(args, true),
            "ZRANGEBYSCORE" => self.cmd_zrangebyscore(args),
            "ZRANGEBYLEX" => self.cmd_zrangebylex(args),
            "ZUNIONSTORE" => self.cmd_zunionstore(args),
            "ZINTERSTORE" => self.cmd_zinterstore(args),

            // Bitmaps
            "SETBIT" => self.cmd_setbit(args),
            "GETBIT" => self.cmd_getbit(args),
            "BITCOUNT" => self.cmd_bitcount(args),
            "BITPOS" => self.cmd_bitpos(args),
            "BITOP" => self.cmd_bitop(args),

            // Streams
            "XADD" => self.cmd_xadd(args),
            "XLEN" => self.cmd_xlen(args),
            "XRANGE" => self.cmd_xrange(args),
            "XTRIM" => self.cmd_xtrim(args),
            "XDEL" => self.cmd_xdel(args),
            "XGROUP" => self.cmd_xgroup(args),
            "XREADGROUP" => self.cmd_xreadgroup(args),
            "XACK" => self.cmd_xack(args),
            "XCLAIM" => self.cmd_xclaim(args),
            "XAUTOCLAIM" => self.cmd_xautoclaim(args),

            // JSON
            "JSON.SET" => self.cmd_json_set(args),
            "JSON.GET" => self.cmd_json_get(args),
            "JSON.DEL" => self.cmd_json_del(args),
            "JSON.TYPE" => self.cmd_json_type(args),
            "JSON.NUMINCRBY" => self.cmd_json_numincrby(args),
            "JSON.MERGE" => self.cmd_json_merge(args),
            "JSON.OBJKEYS" => self.cmd_json_objkeys(args),
            "JSON.ARRAPPEND" => self.cmd_json_arrappend(args),
            "JSON.DEBUG" => self.cmd_json_debug(args),

            // Probabilistic sketches
            "BF.RESERVE" => self.cmd_bf_reserve(args),
            "BF.ADD" => self.cmd_bf_add(args),
            "BF.EXISTS" => self.cmd_bf_exists(args),
            "BF.MERGE" => self.cmd_bf_merge(args),
            "CF.ADD" => self.cmd_cf_add(args),
            "CF.EXISTS" => self.cmd_cf_exists(args),
            "CF.DEL" => self.cmd_cf_del(args),
            "CMS.INCRBY" => self.cmd_cms_incrby(args),
            "CMS.QUERY" => self.cmd_cms_query(args),
            "CMS.MERGE" => self.cmd_cms_merge(args),
            "TOPK.ADD" => self.cmd_topk_add(args),
            "TOPK.QUERY" => self.cmd_topk_query(args),
            "TOPK.LIST" => self.cmd_topk_list(args),
            "PFADD" => self.cmd_pfadd(args),
            "PFCOUNT" => self.cmd_pfcount(args),
            "PFMERGE" => self.cmd_pfmerge(args),
            "TDIGEST.ADD" => self.cmd_tdigest_add(args),
            "TDIGEST.QUANTILE" => self.cmd_tdigest_quantile(args),
            "TDIGEST.MERGE" => self.cmd_tdigest_merge(args),

            // Geo
            "GEOADD" => self.cmd_geoadd(args),
            "GEOPOS" => self.cmd_geopos(args),
            "GEODIST" => self.cmd_geodist(args),
            "GEOSEARCH" | "GEORADIUS" => self.cmd_geosearch(args),

            // Time series
            "TS.CREATE" => self.cmd_ts_create(args),
            "TS.ADD" => self.cmd_ts_add(args),
            "TS.GET" => self.cmd_ts_get(args),
            "TS.RANGE" => self.cmd_ts_range(args),

            // Server / admin
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "INFO" => self.cmd_info(args),
            "TIME" => self.cmd_time(args),
            "COMMAND" => self.cmd_command(args),
            "DEBUG" => self.cmd_debug(args),
            "SELECT" => self.cmd_select(session, args),
            "QUIT" => RespValue::ok(),
            "CONFIG" => self.cmd_config(args),
            "CLIENT" => self.cmd_client(session, args),
            "MEMORY" => self.cmd_memory(args),
            "MODULE" => self.cmd_module(args),
            "CLUSTER" => self.cmd_cluster(args),
            "REPLICAOF" | "SLAVEOF" => self.cmd_replicaof(args),

            _ => CoreError::unknown_command(cmd, args).into(),
        }
    }
}
