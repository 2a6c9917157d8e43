use crate::keys;
use crate::record::PortRecord;
use crate::store::{LbComparator, Store};
use anyhow::Context;
use async_trait::async_trait;
use lb_protocol::Protocol;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Redis-backed implementation of [`Store`]. Built on a pooled async
/// connection manager so concurrent per-tenant workers don't serialize on a
/// single connection the way the original process's mutex-guarded client
/// did.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, key_prefix: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("invalid redis URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("connecting to redis")?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn add_tenant(&self, tenant: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::project_set(&self.key_prefix);
        conn.sadd(key, tenant).await.context("SADD project")?;
        Ok(())
    }

    async fn list_tenants(&self) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let key = keys::project_set(&self.key_prefix);
        let members: Vec<String> = conn.smembers(key).await.context("SMEMBERS project")?;
        Ok(members)
    }

    async fn remove_tenant(&self, tenant: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::project_set(&self.key_prefix);
        conn.srem(key, tenant).await.context("SREM project")?;
        Ok(())
    }

    async fn set_lb_capacity(
        &self,
        tenant: &str,
        lb_id: &str,
        max_ports_per_lb: u32,
        delta: i64,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::lb_amount_zset(&self.key_prefix, tenant);
        if delta == 0 {
            let initial = (max_ports_per_lb as i64) - 1;
            conn.zadd(key, lb_id, initial)
                .await
                .context("ZADD loadbalancer:amount")?;
        } else {
            conn.zincr(key, lb_id, delta)
                .await
                .context("ZINCRBY loadbalancer:amount")?;
        }
        Ok(())
    }

    async fn remove_lb_capacity(&self, tenant: &str, lb_id: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::lb_amount_zset(&self.key_prefix, tenant);
        conn.zrem(key, lb_id)
            .await
            .context("ZREM loadbalancer:amount")?;
        Ok(())
    }

    async fn find_available_lb(
        &self,
        tenant: &str,
        need: i64,
        max_ports_per_lb: u32,
        comparator: LbComparator,
    ) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let key = keys::lb_amount_zset(&self.key_prefix, tenant);
        let max_score = (max_ports_per_lb as i64) - 1;
        let raw: Vec<(String, i64)> = conn
            .zrangebyscore_withscores(key, need, max_score)
            .await
            .context("ZRANGEBYSCORE loadbalancer:amount")?;
        Ok(comparator(&raw))
    }

    async fn get_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
    ) -> anyhow::Result<Vec<u16>> {
        let mut conn = self.conn.clone();
        let key = keys::lb_ports_set(&self.key_prefix, tenant, lb_id, &proto.to_string());
        let members: Vec<u16> = conn.smembers(key).await.context("SMEMBERS lb ports")?;
        Ok(members)
    }

    async fn add_lb_ports(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        ports: &[u16],
    ) -> anyhow::Result<()> {
        if ports.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let key = keys::lb_ports_set(&self.key_prefix, tenant, lb_id, &proto.to_string());
        conn.sadd(key, ports).await.context("SADD lb ports")?;
        Ok(())
    }

    async fn remove_lb_port(
        &self,
        tenant: &str,
        lb_id: &str,
        proto: Protocol,
        port: u16,
    ) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::lb_ports_set(&self.key_prefix, tenant, lb_id, &proto.to_string());
        conn.srem(key, port).await.context("SREM lb port")?;
        Ok(())
    }

    async fn lb_has_no_ports(&self, tenant: &str, lb_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", keys::lb_ports_scan_prefix(&self.key_prefix, tenant, lb_id));
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, found): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .context("SCAN lb ports")?;
            if !found.is_empty() {
                return Ok(false);
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(true)
    }

    async fn list_lb_capacities(&self, tenant: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let mut conn = self.conn.clone();
        let key = keys::lb_amount_zset(&self.key_prefix, tenant);
        let members: Vec<(String, i64)> = conn
            .zrange_withscores(key, 0, -1)
            .await
            .context("ZRANGE loadbalancer:amount")?;
        Ok(members)
    }

    async fn list_lb_protocols(&self, tenant: &str, lb_id: &str) -> anyhow::Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", keys::lb_ports_scan_prefix(&self.key_prefix, tenant, lb_id));
        let mut cursor: u64 = 0;
        let mut protocols = Vec::new();
        loop {
            let (next_cursor, found): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut conn)
                .await
                .context("SCAN lb protocols")?;
            for key in found {
                if let Some(proto) = key.rsplit(':').next() {
                    protocols.push(proto.to_string());
                }
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        protocols.sort();
        protocols.dedup();
        Ok(protocols)
    }

    async fn get_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let key = keys::backend_hash(&self.key_prefix, tenant);
        let value: Option<String> = conn.hget(key, service).await.context("HGET backend")?;
        Ok(value)
    }

    async fn set_backend_lb(&self, tenant: &str, service: &str, lb_id: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::backend_hash(&self.key_prefix, tenant);
        conn.hset(key, service, lb_id).await.context("HSET backend")?;
        Ok(())
    }

    async fn remove_backend_lb(&self, tenant: &str, service: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::backend_hash(&self.key_prefix, tenant);
        conn.hdel(key, service).await.context("HDEL backend")?;
        Ok(())
    }

    async fn get_backend_ports(
        &self,
        tenant: &str,
        service: &str,
    ) -> anyhow::Result<Vec<PortRecord>> {
        let mut conn = self.conn.clone();
        let key = keys::backend_ports_set(&self.key_prefix, tenant, service);
        let raw: Vec<String> = conn.smembers(&key).await.context("SMEMBERS backend ports")?;
        let mut out = Vec::with_capacity(raw.len());
        for member in raw {
            match PortRecord::decode(&member) {
                Some(record) => out.push(record),
                None => {
                    log::warn!("dropping malformed backend-port record {member:?} under {key}");
                    let _: i64 = conn.srem(&key, &member).await.unwrap_or(0);
                }
            }
        }
        Ok(out)
    }

    async fn set_backend_ports(
        &self,
        tenant: &str,
        service: &str,
        ports: &[PortRecord],
    ) -> anyhow::Result<()> {
        if ports.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let key = keys::backend_ports_set(&self.key_prefix, tenant, service);
        let encoded: Vec<String> = ports.iter().map(PortRecord::encode).collect();
        conn.sadd(key, encoded).await.context("SADD backend ports")?;
        Ok(())
    }

    async fn delete_backend_ports(&self, tenant: &str, service: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let key = keys::backend_ports_set(&self.key_prefix, tenant, service);
        conn.del(key).await.context("DEL backend ports")?;
        Ok(())
    }

    async fn list_backends(&self, tenant: &str) -> anyhow::Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let key = keys::backend_hash(&self.key_prefix, tenant);
        let all: std::collections::HashMap<String, String> =
            conn.hgetall(key).await.context("HGETALL backend")?;
        Ok(all
            .into_iter()
            .filter(|(name, lb_id)| name != lb_id)
            .collect())
    }
}
