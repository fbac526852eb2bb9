//! Redis-backed scratch store.

use redis::{Client, Connection};

use crate::{CodecError, ScratchStore};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_SCRATCH_DB: i64 = 15;

/// Connection settings for the scratch database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    /// Database selected for scratch keys, kept apart from live data.
    pub scratch_db: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            scratch_db: DEFAULT_SCRATCH_DB,
        }
    }
}

pub struct RedisStore {
    conn: Connection,
}

impl RedisStore {
    /// Connect, select the scratch database and verify with `PING`.
    ///
    /// Any failure here is a fatal precondition for a run.
    pub fn connect(config: &StoreConfig) -> Result<Self, CodecError> {
        let client = Client::open(config.url.as_str())?;
        let mut conn = client.get_connection()?;
        redis::cmd("SELECT")
            .arg(config.scratch_db)
            .query::<()>(&mut conn)?;
        let pong: String = redis::cmd("PING").query(&mut conn)?;
        tracing::debug!(url = %config.url, db = config.scratch_db, reply = %pong, "scratch store connected");
        Ok(Self { conn })
    }
}

impl ScratchStore for RedisStore {
    fn restore(&mut self, key: &str, payload: &[u8]) -> Result<(), CodecError> {
        redis::cmd("RESTORE")
            .arg(key)
            .arg(0)
            .arg(payload)
            .arg("REPLACE")
            .query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn hash_entries(&mut self, key: &str) -> Result<Vec<(String, String)>, CodecError> {
        let entries: Vec<(String, String)> =
            redis::cmd("HGETALL").arg(key).query(&mut self.conn)?;
        Ok(entries)
    }

    fn sorted_set_entries(&mut self, key: &str) -> Result<Vec<(String, f64)>, CodecError> {
        let entries: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query(&mut self.conn)?;
        Ok(entries)
    }

    fn write_hash(&mut self, key: &str, entries: &[(String, String)]) -> Result<(), CodecError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in entries {
            cmd.arg(field).arg(value);
        }
        cmd.query::<()>(&mut self.conn)?;
        Ok(())
    }

    fn dump(&mut self, key: &str) -> Result<Option<Vec<u8>>, CodecError> {
        let payload: Option<Vec<u8>> = redis::cmd("DUMP").arg(key).query(&mut self.conn)?;
        Ok(payload)
    }

    fn delete(&mut self, key: &str) -> Result<(), CodecError> {
        redis::cmd("DEL").arg(key).query::<()>(&mut self.conn)?;
        Ok(())
    }
}
