//! Command metadata: arity and read/write/admin classification. A static
//! match rather than a `HashMap` — cheap to construct, cheap to look up,
//! and easy to scan.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Read,
    Write,
    Admin,
}

/// Minimum argument count (not counting the command name itself). `None`
/// means "no minimum enforced here" (the handler does its own checking,
/// usually because the arity varies with a sub-option).
pub fn min_arity(cmd: &str) -> Option<usize> {
    match cmd {
        "GET" | "STRLEN" | "INCR" | "DECR" | "TYPE" | "TTL" | "PTTL" | "PERSIST" | "LLEN"
        | "SCARD" | "ZCARD" | "HGETALL" | "HKEYS" | "HVALS" | "HLEN" | "SMEMBERS" | "DUMP"
        | "XLEN" => Some(1),
        "SET" | "APPEND" | "GETSET" | "SETNX" | "INCRBY" | "DECRBY" | "INCRBYFLOAT" | "EXPIRE"
        | "PEXPIRE" | "EXPIREAT" | "RENAME" | "RENAMENX" | "SADD" | "SREM" | "SISMEMBER"
        | "ZSCORE" | "ZINCRBY" | "HGET" | "HDEL" | "HEXISTS" | "LPUSH" | "RPUSH" | "LINDEX" => {
            Some(2)
        }
        "SETRANGE" | "GETRANGE" | "LRANGE" | "ZRANGE" | "LSET" | "ZADD" | "HSET" | "SETEX" => {
            Some(3)
        }
        _ => None,
    }
}

pub fn classify(cmd: &str) -> Classification {
    match cmd {
        "GET" | "MGET" | "STRLEN" | "GETRANGE" | "EXISTS" | "TYPE" | "TTL" | "PTTL" | "KEYS"
        | "SCAN" | "DBSIZE" | "HGET" | "HMGET" | "HGETALL" | "HKEYS" | "HVALS" | "HLEN"
        | "HEXISTS" | "HSCAN" | "LLEN" | "LINDEX" | "LRANGE" | "SMEMBERS" | "SISMEMBER"
        | "SCARD" | "SINTER" | "SUNION" | "SDIFF" | "SSCAN" | "ZSCORE" | "ZRANGE"
        | "ZRANGEBYSCORE" | "ZRANGEBYLEX" | "ZCARD" | "ZRANK" | "ZREVRANK" | "ZSCAN" | "XLEN"
        | "XRANGE" | "GETBIT" | "BITCOUNT" | "BITPOS" | "JSON.GET" | "JSON.TYPE"
        | "JSON.OBJKEYS" | "BF.EXISTS" | "CF.EXISTS" | "CMS.QUERY" | "TOPK.QUERY" | "TOPK.LIST"
        | "PFCOUNT" | "TDIGEST.QUANTILE" | "GEOPOS" | "GEODIST" | "GEOSEARCH" | "GEORADIUS"
        | "TS.GET" | "TS.RANGE" | "PING" | "ECHO" | "INFO" | "TIME" | "COMMAND" | "CLIENT"
        | "CONFIG" | "MEMORY" | "MODULE" | "CLUSTER" | "LCS" => Classification::Read,

        "FLUSHALL" | "FLUSHDB" | "SHUTDOWN" | "REPLICAOF" | "DEBUG" => Classification::Admin,

        _ => Classification::Write,
    }
}

/// Commands the transaction/dispatcher state machine handles itself and
/// which must never be queued inside `MULTI`.
pub fn is_transaction_control(cmd: &str) -> bool {
    matches!(cmd, "MULTI" | "EXEC" | "DISCARD" | "WATCH" | "UNWATCH")
}

/// Whether a successfully applied command should be appended to the AOF
/// and propagated to replicas.
pub fn requires_persistence(cmd: &str) -> bool {
    classify(cmd) == Classification::Write
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_commands_are_not_persisted() {
        assert!(!requires_persistence("GET"));
        assert!(requires_persistence("SET"));
    }

    #[test]
    fn transaction_control_commands_identified() {
        assert!(is_transaction_control("MULTI"));
        assert!(!is_transaction_control("SET"));
    }
}
