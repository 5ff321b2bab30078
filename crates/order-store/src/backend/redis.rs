//! # Redis Backend
//!
//! [`RedisBackend`] talks to Redis through a `deadpool-redis` connection pool. One
//! pool is created by the process host and shared by every request.
//!
//! ## Atomic plans
//!
//! A [`Plan`] is executed by a single Lua script. The script first validates every
//! command, then checks the conditions in order, and only then applies the commands.
//! Redis runs a script without interleaving other clients, so the conditions and the
//! writes form one atomic unit, and the whole commit is one request on the wire.
//!
//! Script reply: `0` when committed, otherwise the 1-based index of the condition
//! that did not hold.
//!
//! ## Page cursors
//!
//! `SSCAN ... COUNT n` treats `n` as a hint; small sets come back whole. To hand out
//! at most `n` members per step without losing the rest of a batch, the cursor given
//! to callers packs the server cursor together with the number of members of the
//! current batch already returned:
//!
//! ```text
//!  63                         20 19            0
//! +-----------------------------+---------------+
//! |        server cursor        | batch offset  |
//! +-----------------------------+---------------+
//! ```
//!
//! Resuming inside a batch re-issues the same `SSCAN` and skips the offset, so the
//! same `count` must be passed on every step of one iteration.

use super::{Backend, BackendResult, Command, Condition, Outcome, Plan, ScanBatch};
use crate::error::BackendError;
use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::{AsyncCommands, Script};
use std::time::Duration;
use tracing::{debug, info, trace};

const OFFSET_BITS: u32 = 20;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;
const MAX_SERVER_CURSOR: u64 = u64::MAX >> OFFSET_BITS;

const APPLY_PLAN_SCRIPT: &str = r#"
local conditions = tonumber(ARGV[1])
local commands = #KEYS - conditions
local base = conditions + 2

for c = 1, commands do
  local op = ARGV[base + 2 * (c - 1)]
  local key = KEYS[conditions + c]
  if op == 'sadd' or op == 'srem' then
    local kind = redis.call('TYPE', key)['ok']
    if kind ~= 'set' and kind ~= 'none' then
      return redis.error_reply('plan target is not a set: ' .. key)
    end
  elseif op ~= 'set' and op ~= 'del' then
    return redis.error_reply('unknown plan command: ' .. tostring(op))
  end
end

for i = 1, conditions do
  local exists = redis.call('EXISTS', KEYS[i]) == 1
  local required = ARGV[1 + i]
  if (required == 'absent' and exists) or (required == 'present' and not exists) then
    return i
  end
end

for c = 1, commands do
  local op = ARGV[base + 2 * (c - 1)]
  local operand = ARGV[base + 2 * (c - 1) + 1]
  local key = KEYS[conditions + c]
  if op == 'set' then
    redis.call('SET', key, operand)
  elseif op == 'del' then
    redis.call('DEL', key)
  elseif op == 'sadd' then
    redis.call('SADD', key, operand)
  else
    redis.call('SREM', key, operand)
  end
end

return 0
"#;

/// Connection settings for [`RedisBackend`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Server URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Maximum number of pooled connections.
    pub pool_size: usize,
    /// Applies to waiting for, creating and recycling pooled connections.
    pub pool_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pool_size: 16,
            pool_timeout: Duration::from_secs(5),
        }
    }
}

/// Redis-backed [`Backend`] over a shared connection pool.
pub struct RedisBackend {
    pool: Pool,
    apply_plan: Script,
}

impl RedisBackend {
    /// Builds the connection pool. Connections are opened lazily; call
    /// [`Backend::ping`] to check that the server is reachable.
    pub fn connect(config: &RedisConfig) -> BackendResult<Self> {
        info!(pool_size = config.pool_size, "Creating redis connection pool");

        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.pool_timeout);
        pool_config.timeouts.create = Some(config.pool_timeout);
        pool_config.timeouts.recycle = Some(config.pool_timeout);

        let mut redis_config = Config::from_url(config.url.clone());
        redis_config.pool = Some(pool_config);
        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;

        Ok(Self {
            pool,
            apply_plan: Script::new(APPLY_PLAN_SCRIPT),
        })
    }

    async fn connection(&self) -> BackendResult<Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(%reply, "PING");
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        trace!(key, found = value.is_some(), "GET");
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> BackendResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let values: Vec<Option<Vec<u8>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        trace!(count = keys.len(), "MGET");
        Ok(values)
    }

    async fn set_existing(&self, key: &str, value: &[u8]) -> BackendResult<bool> {
        let mut conn = self.connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        trace!(key, written = reply.is_some(), "SET XX");
        Ok(reply.is_some())
    }

    async fn scan_set(&self, set: &str, cursor: u64, count: usize) -> BackendResult<ScanBatch> {
        let (server_cursor, offset) = unpack_cursor(cursor);
        let mut conn = self.connection().await?;
        let (next, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(server_cursor)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        trace!(set, server_cursor, offset, next, batch = members.len(), "SSCAN");
        page_from_batch(server_cursor, offset, next, members, count)
    }

    async fn apply(&self, plan: &Plan) -> BackendResult<Outcome> {
        let mut invocation = self.apply_plan.prepare_invoke();
        invocation.arg(plan.conditions.len());
        for condition in &plan.conditions {
            let (key, required) = match condition {
                Condition::Absent(key) => (key, "absent"),
                Condition::Present(key) => (key, "present"),
            };
            invocation.key(key).arg(required);
        }
        for command in &plan.commands {
            match command {
                Command::Set { key, value } => {
                    invocation.key(key).arg("set").arg(value.as_slice());
                }
                Command::Delete { key } => {
                    invocation.key(key).arg("del").arg("");
                }
                Command::SetAdd { set, member } => {
                    invocation.key(set).arg("sadd").arg(member);
                }
                Command::SetRemove { set, member } => {
                    invocation.key(set).arg("srem").arg(member);
                }
            }
        }

        let mut conn = self.connection().await?;
        let reply: i64 = invocation.invoke_async(&mut conn).await?;
        debug!(
            conditions = plan.conditions.len(),
            commands = plan.commands.len(),
            reply,
            "Plan applied"
        );

        if reply == 0 {
            return Ok(Outcome::Committed);
        }
        usize::try_from(reply - 1)
            .ok()
            .and_then(|index| plan.conditions.get(index))
            .map(|condition| Outcome::Rejected(condition.clone()))
            .ok_or_else(|| BackendError::UnexpectedReply(format!("plan script returned {reply}")))
    }

    async fn close(&self) {
        info!("Closing redis connection pool");
        self.pool.close();
    }
}

fn unpack_cursor(cursor: u64) -> (u64, usize) {
    (cursor >> OFFSET_BITS, (cursor & OFFSET_MASK) as usize)
}

fn pack_cursor(server_cursor: u64, offset: usize) -> BackendResult<u64> {
    if server_cursor > MAX_SERVER_CURSOR || offset as u64 > OFFSET_MASK {
        return Err(BackendError::CursorOverflow(server_cursor));
    }
    Ok((server_cursor << OFFSET_BITS) | offset as u64)
}

/// Cuts one page of at most `count` members out of an `SSCAN` batch.
fn page_from_batch(
    server_cursor: u64,
    offset: usize,
    next: u64,
    members: Vec<String>,
    count: usize,
) -> BackendResult<ScanBatch> {
    let mut remaining: Vec<String> = members.into_iter().skip(offset).collect();
    if remaining.len() > count {
        remaining.truncate(count);
        return Ok(ScanBatch {
            members: remaining,
            cursor: pack_cursor(server_cursor, offset + count)?,
        });
    }
    Ok(ScanBatch {
        members: remaining,
        cursor: pack_cursor(next, 0)?,
    })
}
