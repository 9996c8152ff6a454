use crate::core::{Persister, StoreFuture};
use crate::error::StoreError;
use anyhow::Context;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

fn child_key(prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .map_or(false, |rest| !rest.is_empty() && !rest.contains('/'))
}

#[derive(Clone, Default)]
pub(crate) struct MemoryPersister {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryPersister {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    async fn read(&self, path: &str) -> Result<Value, StoreError> {
        let entries = self.entries.read().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.get(path).cloned().ok_or_else(|| StoreError::NotFound(path.to_owned()))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(path.to_owned(), value);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.keys().filter(|k| child_key(prefix, k)).cloned().collect())
    }
}

impl Persister for MemoryPersister {
    fn get<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Value> {
        Box::pin(self.read(path))
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(self.write(path, value))
    }

    fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(self.keys(prefix))
    }
}

const STAGING_DIR: &str = ".staging";

/// One JSON file per key under `root`, so `toilets/{id}` lives at `{root}/toilets/{id}`.
#[derive(Clone)]
pub(crate) struct FsPersister {
    root: PathBuf,
}

impl FsPersister {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, path: &str) -> Result<Value, StoreError> {
        let file = self.root.join(path);
        let content = match tokio::fs::read(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path.to_owned())),
            Err(e) => return Err(anyhow::Error::from(e).context(format!("failed to read {}", file.display())).into()),
        };
        let value = serde_json::from_slice(&content).with_context(|| format!("malformed json in {}", file.display()))?;
        Ok(value)
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let file = self.root.join(path);
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let content = serde_json::to_vec(&value).context("failed to encode value")?;
        // Staged outside every key prefix and renamed into place, so readers never see a partial record.
        let staging = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("failed to create {}", staging.display()))?;
        let tmp = staging.join(Uuid::new_v4().to_string());
        tokio::fs::write(&tmp, content)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &file).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(anyhow::Error::from(e).context(format!("failed to move record into {}", file.display())).into());
        }
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // nothing has been written under this prefix yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow::Error::from(e).context(format!("failed to list {}", dir.display())).into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            if !file_type.is_file() {
                continue;
            }
            // dot-files are editor or OS litter, never records
            match entry.file_name().to_str() {
                Some(name) if !name.starts_with('.') => keys.push(format!("{}/{}", prefix, name)),
                _ => {}
            }
        }
        Ok(keys)
    }
}

impl Persister for FsPersister {
    fn get<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Value> {
        Box::pin(self.read(path))
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(self.write(path, value))
    }

    fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(self.keys(prefix))
    }
}

/// Values are stored as JSON strings under their key path.
#[derive(Clone)]
pub(crate) struct RedisPersister {
    conn: ConnectionManager,
}

impl RedisPersister {
    pub(crate) async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(url).with_context(|| format!("invalid redis url {}", url))?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to initialize redis connection manager")?;
        Ok(Self { conn })
    }

    async fn read(&self, path: &str) -> Result<Value, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(path).await.with_context(|| format!("redis GET {} failed", path))?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(path.to_owned()))?;
        let value = serde_json::from_str(&raw).with_context(|| format!("malformed json at {}", path))?;
        Ok(value)
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(path, value.to_string())
            .await
            .with_context(|| format!("redis SET {} failed", path))?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        scan_keys(&mut conn, prefix).await
    }
}

/// Walks the SCAN cursor to the end. Any failed page fails the whole listing.
async fn scan_keys<C: ConnectionLike>(conn: &mut C, prefix: &str) -> Result<Vec<String>, StoreError> {
    let pattern = format!("{}/*", prefix);
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&pattern)
            .query_async(&mut *conn)
            .await
            .with_context(|| format!("redis SCAN {} at cursor {} failed", pattern, cursor))?;
        keys.extend(page.into_iter().filter(|key| child_key(prefix, key)));
        if next == 0 {
            return Ok(keys);
        }
        cursor = next;
    }
}

impl Persister for RedisPersister {
    fn get<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Value> {
        Box::pin(self.read(path))
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(self.write(path, value))
    }

    fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(self.keys(prefix))
    }
}

/// Bounds every call to the wrapped store. Expired calls report `StoreError::Timeout`.
#[derive(Clone)]
pub(crate) struct TimeoutPersister<P> {
    inner: P,
    timeout: Duration,
}

impl<P> TimeoutPersister<P> {
    pub(crate) fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<P: Persister> Persister for TimeoutPersister<P> {
    fn get<'a>(&'a self, path: &'a str) -> StoreFuture<'a, Value> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.inner.get(path))
                .await
                .map_err(|_| StoreError::Timeout(self.timeout))?
        })
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.inner.set(path, value))
                .await
                .map_err(|_| StoreError::Timeout(self.timeout))?
        })
    }

    fn list<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<String>> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.inner.list(prefix))
                .await
                .map_err(|_| StoreError::Timeout(self.timeout))?
        })
    }
}
