//! A blocking connection pool built on `std::sync::{Mutex, Condvar}`.
//!
//! Grounded on the teacher's `driver/pool.rs` (`PgPool`/`PoolConfig`/
//! `PooledConnection`/`PoolStats`), translated from tokio's `Mutex` +
//! `Semaphore` to a std `Mutex`-guarded ready queue with a `Condvar` standing
//! in for the semaphore's "wait for a free slot" behavior (see
//! `DESIGN.md`).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::driver::connection::PgConnection;
use crate::error::{PgError, PgResult};

#[derive(Clone)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
    pub max_connections: usize,
    pub min_connections: usize,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_lifetime: Option<Duration>,
    pub test_on_acquire: bool,
}

impl PoolConfig {
    pub fn new(host: &str, port: u16, user: &str, database: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            database: database.to_string(),
            password: None,
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_lifetime: None,
            test_on_acquire: false,
        }
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    pub fn test_on_acquire(mut self, enabled: bool) -> Self {
        self.test_on_acquire = enabled;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub active: usize,
    pub idle: usize,
    pub pending: usize,
    pub max_size: usize,
    pub total_created: usize,
}

struct PooledConn {
    conn: PgConnection,
    created_at: Instant,
    last_used: Instant,
}

/// State protected by `PgPoolInner`'s mutex: the ready queue plus the permit
/// count (how many connections are currently checked out or reserved for
/// creation, in place of the teacher's `Semaphore`).
struct PoolState {
    idle: Vec<PooledConn>,
    outstanding: usize,
    closed: bool,
}

struct PgPoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    total_created: AtomicUsize,
    active_count: AtomicUsize,
    closed: AtomicBool,
}

impl PgPoolInner {
    fn return_connection(&self, conn: PgConnection) {
        self.active_count.fetch_sub(1, Ordering::Relaxed);

        let mut state = self.state.lock().unwrap();
        state.outstanding -= 1;
        if !state.closed && state.idle.len() < self.config.max_connections {
            state.idle.push(PooledConn {
                conn,
                created_at: Instant::now(),
                last_used: Instant::now(),
            });
        }
        drop(state);
        self.available.notify_one();
    }

    /// Pop the newest still-fresh idle connection, discarding stale ones.
    fn take_healthy(&self, state: &mut PoolState) -> Option<PgConnection> {
        while let Some(pooled) = state.idle.pop() {
            if pooled.last_used.elapsed() > self.config.idle_timeout {
                continue;
            }
            if let Some(max_life) = self.config.max_lifetime {
                if pooled.created_at.elapsed() > max_life {
                    continue;
                }
            }
            return Some(pooled.conn);
        }
        None
    }
}

/// A connection on loan from a [`PgPool`]; returns to the pool's idle queue
/// when dropped.
pub struct PooledConnection {
    conn: Option<PgConnection>,
    pool: Arc<PgPoolInner>,
}

impl PooledConnection {
    pub fn get_mut(&mut self) -> &mut PgConnection {
        self.conn.as_mut().expect("connection should always be present")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(conn);
        }
    }
}

impl std::ops::Deref for PooledConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection should always be present")
    }
}

impl std::ops::DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection should always be present")
    }
}

/// A blocking pool of [`PgConnection`]s, cheaply cloneable (shares the
/// underlying state via `Arc`).
///
/// # Example
/// ```ignore
/// let config = PoolConfig::new("localhost", 5432, "user", "db")
///     .password("secret")
///     .max_connections(20);
/// let pool = PgPool::connect(config)?;
/// let mut conn = pool.acquire()?;
/// conn.execute_raw("SELECT 1")?;
/// ```
#[derive(Clone)]
pub struct PgPool {
    inner: Arc<PgPoolInner>,
}

impl PgPool {
    /// Create a pool and eagerly open `min_connections` connections.
    pub fn connect(config: PoolConfig) -> PgResult<Self> {
        let mut idle = Vec::new();
        for _ in 0..config.min_connections {
            let conn = Self::create_connection(&config)?;
            idle.push(PooledConn {
                conn,
                created_at: Instant::now(),
                last_used: Instant::now(),
            });
        }
        let initial_count = idle.len();

        let inner = Arc::new(PgPoolInner {
            config,
            state: Mutex::new(PoolState {
                idle,
                outstanding: 0,
                closed: false,
            }),
            available: Condvar::new(),
            total_created: AtomicUsize::new(initial_count),
            active_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });

        Ok(Self { inner })
    }

    /// Acquire a connection, blocking until one is free or `acquire_timeout`
    /// elapses.
    pub fn acquire(&self) -> PgResult<PooledConnection> {
        if self.inner.closed.load(Ordering::Relaxed) {
            return Err(PgError::PoolExhausted("pool is closed".to_string()));
        }

        let deadline = Instant::now() + self.inner.config.acquire_timeout;
        let mut state = self.inner.state.lock().unwrap();

        loop {
            if state.closed {
                return Err(PgError::PoolExhausted("pool is closed".to_string()));
            }
            if let Some(conn) = self.inner.take_healthy(&mut state) {
                state.outstanding += 1;
                drop(state);
                self.inner.active_count.fetch_add(1, Ordering::Relaxed);
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: self.inner.clone(),
                });
            }
            if state.outstanding + state.idle.len() < self.inner.config.max_connections {
                state.outstanding += 1;
                drop(state);
                let conn = match Self::create_connection(&self.inner.config) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let mut state = self.inner.state.lock().unwrap();
                        state.outstanding -= 1;
                        drop(state);
                        self.inner.available.notify_one();
                        return Err(err);
                    }
                };
                self.inner.total_created.fetch_add(1, Ordering::Relaxed);
                self.inner.active_count.fetch_add(1, Ordering::Relaxed);
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: self.inner.clone(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PgError::PoolExhausted(format!(
                    "timed out waiting for connection ({}s)",
                    self.inner.config.acquire_timeout.as_secs()
                )));
            }
            let (guard, timeout_result) =
                self.inner.available.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            if timeout_result.timed_out() && state.idle.is_empty() {
                return Err(PgError::PoolExhausted(format!(
                    "timed out waiting for connection ({}s)",
                    self.inner.config.acquire_timeout.as_secs()
                )));
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().unwrap().idle.len()
    }

    pub fn active_count(&self) -> usize {
        self.inner.active_count.load(Ordering::Relaxed)
    }

    pub fn max_connections(&self) -> usize {
        self.inner.config.max_connections
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().unwrap();
        PoolStats {
            active: self.inner.active_count.load(Ordering::Relaxed),
            idle: state.idle.len(),
            pending: state.outstanding.saturating_sub(self.active_count()),
            max_size: self.inner.config.max_connections,
            total_created: self.inner.total_created.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Close the pool: new `acquire` calls fail immediately and idle
    /// connections are dropped. Connections already on loan are returned to
    /// a closed pool and simply dropped instead of recycled.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
        let mut state = self.inner.state.lock().unwrap();
        state.closed = true;
        state.idle.clear();
        drop(state);
        self.inner.available.notify_all();
    }

    fn create_connection(config: &PoolConfig) -> PgResult<PgConnection> {
        match &config.password {
            Some(password) => PgConnection::connect_with_password(
                &config.host,
                config.port,
                &config.user,
                &config.database,
                Some(password),
            ),
            None => PgConnection::connect(&config.host, config.port, &config.user, &config.database),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config() {
        let config = PoolConfig::new("localhost", 5432, "user", "testdb")
            .password("secret123")
            .max_connections(20)
            .min_connections(5);

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.user, "user");
        assert_eq!(config.database, "testdb");
        assert_eq!(config.password, Some("secret123".to_string()));
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
    }
}
