//! MCP session pool.
//!
//! The initialize handshake against the remote proxy costs 2-3s; the pool
//! amortizes it by keeping pre-initialized sessions ready. The pool is the
//! sole owner of sessions: callers check one out for a single operation via
//! [`SessionPool::acquire`] and the lease returns it on drop.
//!
//! Accounting rules:
//! - idle storage is a sync mutex, never held across an `.await`
//! - growth is double-checked under an async creation lock so concurrent
//!   acquirers cannot both create the `max_size`-th session
//! - a released session is discarded (never leaked) if idle is full

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{join_all, BoxFuture};
use tokio::sync::{Mutex as TokioMutex, Notify};

use crate::config::McpSettings;

use super::client::McpClient;
use super::errors::McpError;

// ─── Factory ─────────────────────────────────────────────────────────────────

/// Creates and initializes one session. Returns `None` when the handshake
/// fails — the pool tolerates partial warmup and never admits a session
/// that did not report `initialized`.
pub type SessionFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Option<McpClient>> + Send + Sync>;

/// The production factory: build a client from settings and run the
/// handshake.
pub fn mcp_session_factory(settings: Arc<McpSettings>) -> SessionFactory {
    Arc::new(move || {
        let settings = Arc::clone(&settings);
        Box::pin(async move {
            let mut client = match McpClient::new(&settings) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to construct MCP session");
                    return None;
                }
            };
            if client.initialize().await {
                Some(client)
            } else {
                None
            }
        })
    })
}

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Point-in-time pool statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PoolStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    /// Fraction of acquires served from idle, 0.0 when no requests yet.
    pub hit_rate: f64,
    pub active: usize,
    pub idle: usize,
    pub total_created: usize,
    pub max_size: usize,
}

// ─── SessionPool ─────────────────────────────────────────────────────────────

/// Bounded pool of pre-initialized MCP sessions.
pub struct SessionPool {
    factory: SessionFactory,
    max_size: usize,
    idle: Mutex<Vec<McpClient>>,
    released: Notify,
    /// Serializes growth decisions; idle pops stay lock-free of this.
    grow_lock: TokioMutex<()>,
    total_created: AtomicUsize,
    active: AtomicUsize,
    total_requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SessionPool {
    /// Create an empty pool. Call [`warmup`](Self::warmup) at startup.
    pub fn new(max_size: usize, factory: SessionFactory) -> Arc<Self> {
        Arc::new(Self {
            factory,
            max_size,
            idle: Mutex::new(Vec::new()),
            released: Notify::new(),
            grow_lock: TokioMutex::new(()),
            total_created: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Pool wired to the production session factory.
    pub fn from_settings(settings: &McpSettings) -> Arc<Self> {
        Self::new(
            settings.pool_max_size,
            mcp_session_factory(Arc::new(settings.clone())),
        )
    }

    /// Pre-create `n` sessions concurrently.
    ///
    /// Only sessions whose handshake succeeded are admitted; partial failure
    /// is tolerated and logged. `total_created` counts admissions only.
    pub async fn warmup(&self, n: usize) {
        tracing::info!(sessions = n, "warming up MCP session pool");

        let created = join_all((0..n).map(|_| (self.factory)())).await;

        let mut admitted = 0usize;
        {
            let mut idle = self.idle.lock().expect("pool idle lock");
            for session in created.into_iter().flatten() {
                if session.is_initialized() {
                    idle.push(session);
                    admitted += 1;
                }
            }
        }
        self.total_created.fetch_add(admitted, Ordering::SeqCst);

        if admitted < n {
            tracing::warn!(
                admitted,
                requested = n,
                "pool warmup completed with failures"
            );
        } else {
            tracing::info!(admitted, "pool ready");
        }
    }

    /// Check out a session for one operation.
    ///
    /// Non-blocking when idle sessions exist; grows the pool when under
    /// `max_size`; otherwise waits for a release. Callers wanting bounded
    /// patience wrap this in `tokio::time::timeout`.
    pub async fn acquire(self: &Arc<Self>) -> Result<SessionLease, McpError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut counted_miss = false;

        loop {
            if let Some(session) = self.try_pop_idle() {
                if !counted_miss {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                }
                return Ok(self.lease(session));
            }

            if !counted_miss {
                self.misses.fetch_add(1, Ordering::Relaxed);
                counted_miss = true;
            }

            // Pool empty: create one more if we are under the cap. The lock
            // makes the check-then-create atomic against other acquirers.
            {
                let _guard = self.grow_lock.lock().await;
                if self.total_created.load(Ordering::SeqCst) < self.max_size {
                    let session = (self.factory)().await.filter(McpClient::is_initialized);
                    match session {
                        Some(session) => {
                            self.total_created.fetch_add(1, Ordering::SeqCst);
                            tracing::info!(
                                total = self.total_created.load(Ordering::SeqCst),
                                max = self.max_size,
                                "created pool session on demand"
                            );
                            return Ok(self.lease(session));
                        }
                        None => {
                            return Err(McpError::SessionCreate {
                                reason: "session initialization failed".into(),
                            })
                        }
                    }
                }
            }

            // At capacity: wait for a lease to come back, then retry.
            // Register interest before the final idle re-check so a release
            // landing in between is not missed.
            let released = self.released.notified();
            tokio::pin!(released);
            if let Some(session) = self.try_pop_idle() {
                return Ok(self.lease(session));
            }
            tracing::debug!("pool exhausted, waiting for a release");
            released.await;
        }
    }

    fn try_pop_idle(&self) -> Option<McpClient> {
        self.idle.lock().expect("pool idle lock").pop()
    }

    fn lease(self: &Arc<Self>, session: McpClient) -> SessionLease {
        self.active.fetch_add(1, Ordering::Relaxed);
        SessionLease {
            session: Some(session),
            pool: Arc::clone(self),
        }
    }

    /// Return a session to idle. Discards it when idle is unexpectedly full.
    fn release(&self, session: McpClient) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        {
            let mut idle = self.idle.lock().expect("pool idle lock");
            if idle.len() >= self.max_size {
                tracing::warn!("pool idle set full, discarding session");
            } else {
                idle.push(session);
            }
        }
        self.released.notify_one();
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        PoolStats {
            total_requests,
            hits,
            misses: self.misses.load(Ordering::Relaxed),
            hit_rate: if total_requests > 0 {
                hits as f64 / total_requests as f64
            } else {
                0.0
            },
            active: self.active.load(Ordering::Relaxed),
            idle: self.idle.lock().expect("pool idle lock").len(),
            total_created: self.total_created.load(Ordering::SeqCst),
            max_size: self.max_size,
        }
    }

    /// Drain the idle set. In-flight leased sessions are not force-closed;
    /// they return to idle when their leases drop and die with the pool.
    pub fn shutdown(&self) {
        let drained = {
            let mut idle = self.idle.lock().expect("pool idle lock");
            std::mem::take(&mut *idle).len()
        };
        tracing::info!(drained, "MCP session pool shut down");
    }
}

// ─── SessionLease ────────────────────────────────────────────────────────────

/// Scoped checkout of one session.
///
/// Deref gives access to the [`McpClient`]; dropping the lease returns the
/// session to the pool. A lease must not be retained beyond the single
/// operation it was acquired for.
pub struct SessionLease {
    session: Option<McpClient>,
    pool: Arc<SessionPool>,
}

impl std::ops::Deref for SessionLease {
    type Target = McpClient;
    fn deref(&self) -> &McpClient {
        self.session.as_ref().expect("lease holds a session")
    }
}

impl std::ops::DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut McpClient {
        self.session.as_mut().expect("lease holds a session")
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Factory producing stub sessions, optionally failing the first
    /// `fail_first` creations. Counts invocations.
    fn counting_factory(
        fail_first: usize,
        calls: Arc<AtomicUsize>,
    ) -> SessionFactory {
        let settings = Arc::new(McpSettings::default());
        Arc::new(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let settings = Arc::clone(&settings);
            Box::pin(async move {
                if n < fail_first {
                    None
                } else {
                    Some(McpClient::stub_initialized(&settings))
                }
            })
        })
    }

    #[tokio::test]
    async fn test_warmup_with_failures_admits_survivors_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(10, counting_factory(2, Arc::clone(&calls)));

        pool.warmup(5).await;

        let stats = pool.stats();
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.total_created, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_acquire_release_leaves_idle_unchanged() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(10, counting_factory(0, calls));
        pool.warmup(3).await;

        let before = pool.stats().idle;
        {
            let lease = pool.acquire().await.unwrap();
            assert!(lease.is_initialized());
            assert_eq!(pool.stats().active, 1);
        }
        assert_eq!(pool.stats().idle, before);
        assert_eq!(pool.stats().active, 0);
    }

    #[tokio::test]
    async fn test_acquire_hit_and_miss_counters() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(10, counting_factory(0, calls));
        pool.warmup(1).await;

        // Hit: one idle session available.
        drop(pool.acquire().await.unwrap());
        // Hold the only session; the second acquire is a miss that grows.
        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        drop(first);
        drop(second);

        let stats = pool.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_created, 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquirers_never_exceed_max_size() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(3, counting_factory(0, Arc::clone(&calls)));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    let lease = pool.acquire().await.unwrap();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    drop(lease);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let stats = pool.stats();
        assert!(
            stats.total_created <= 3,
            "created {} sessions with max_size 3",
            stats.total_created
        );
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_requests, 8);
    }

    #[tokio::test]
    async fn test_acquire_blocks_until_release_at_cap() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(1, counting_factory(0, calls));
        pool.warmup(1).await;

        let lease = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        // The waiter cannot complete while the lease is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(lease);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resume after release")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_acquire_fails_when_creation_fails_on_empty_pool() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Every creation fails.
        let pool = SessionPool::new(2, counting_factory(usize::MAX, calls));
        let result = pool.acquire().await;
        assert!(matches!(result, Err(McpError::SessionCreate { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_drains_idle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(10, counting_factory(0, calls));
        pool.warmup(4).await;
        assert_eq!(pool.stats().idle, 4);

        pool.shutdown();
        assert_eq!(pool.stats().idle, 0);
        // Created count is historical, not reset.
        assert_eq!(pool.stats().total_created, 4);
    }

    #[tokio::test]
    async fn test_hit_rate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pool = SessionPool::new(10, counting_factory(0, calls));
        pool.warmup(2).await;

        assert_eq!(pool.stats().hit_rate, 0.0);
        drop(pool.acquire().await.unwrap());
        drop(pool.acquire().await.unwrap());
        let stats = pool.stats();
        assert!((stats.hit_rate - 1.0).abs() < f64::EPSILON);
    }
}
