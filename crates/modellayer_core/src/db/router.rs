//! Role-aware connection routing.
//!
//! # Responsibility
//! - Build SQLite connections with role-appropriate credentials.
//! - Cache built handles and reuse them while they stay healthy.
//!
//! # Invariants
//! - Requesting the role a handle was cached for returns that same handle.
//! - `SingleSwap` keeps at most one cached handle at any time.
//! - Unhealthy cached handles are dropped and rebuilt, never returned.

use super::{Credentials, DbConfig, DbError, DbResult, Role};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SQLITE_DRIVER: &str = "sqlite";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static PRAGMA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("pragma token pattern is valid"));

/// Opens raw connections for the router.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        config: &DbConfig,
        role: Role,
        credentials: &Credentials,
    ) -> DbResult<Connection>;
}

/// Opens `config.dbname` as a SQLite database file.
///
/// SQLite has no users, so credentials only appear in connect events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn connect(
        &self,
        config: &DbConfig,
        role: Role,
        credentials: &Credentials,
    ) -> DbResult<Connection> {
        if !config.driver.eq_ignore_ascii_case(SQLITE_DRIVER) {
            return Err(DbError::UnsupportedDriver(config.driver.clone()));
        }

        let started_at = Instant::now();
        let conn = match Connection::open(&config.dbname) {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_connect module=db status=error role={} user={} duration_ms={} error_code=db_open_failed error={}",
                    role,
                    credentials.name,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        bootstrap_connection(&conn, config)?;
        info!(
            "event=db_connect module=db status=ok role={} user={} duration_ms={}",
            role,
            credentials.name,
            started_at.elapsed().as_millis()
        );
        Ok(conn)
    }
}

fn bootstrap_connection(conn: &Connection, config: &DbConfig) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    for (key, value) in &config.options {
        if !PRAGMA_TOKEN.is_match(key) {
            return Err(DbError::InvalidOption(key.clone()));
        }
        if !PRAGMA_TOKEN.is_match(value) {
            return Err(DbError::InvalidOption(format!("{key}={value}")));
        }
        // journal_mode and friends report their new value as a row.
        conn.query_row(&format!("PRAGMA {key} = {value};"), [], |_| Ok(()))
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(()),
                other => Err(other),
            })?;
    }
    Ok(())
}

/// A reusable connection tagged with the role it was opened for.
pub struct ExecutableHandle {
    id: u64,
    role: Role,
    conn: Mutex<Connection>,
}

impl ExecutableHandle {
    /// Process-unique handle number; a rebuild always yields a new id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Runs `op` with exclusive access to the connection.
    pub fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        op(&conn)
    }

    fn is_healthy(&self) -> bool {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))
                .is_ok()
        })
    }
}

/// Cache strategy for built handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingPolicy {
    /// One cached handle per role; switching roles never reconnects.
    #[default]
    PerRole,
    /// One cached handle overall, rebuilt whenever the requested role changes.
    SingleSwap,
}

/// Hands out executable handles by operation role.
pub struct ConnectionRouter {
    config: DbConfig,
    connector: Box<dyn Connector>,
    policy: RoutingPolicy,
    cache: Mutex<HashMap<Role, Arc<ExecutableHandle>>>,
    next_id: AtomicU64,
}

impl ConnectionRouter {
    /// Builds a SQLite router with the default per-role policy.
    pub fn new(config: DbConfig) -> DbResult<Self> {
        Self::with_connector(config, RoutingPolicy::default(), Box::new(SqliteConnector))
    }

    pub fn with_connector(
        config: DbConfig,
        policy: RoutingPolicy,
        connector: Box<dyn Connector>,
    ) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector,
            policy,
            cache: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Returns the cached handle for `role`, building one when none is cached
    /// or the cached one fails its health check.
    pub fn acquire(&self, role: Role) -> DbResult<Arc<ExecutableHandle>> {
        let mut cache = self.cache.lock();

        if let Some(handle) = cache.get(&role) {
            if handle.is_healthy() {
                debug!(
                    "event=handle_reuse module=db status=ok role={} handle_id={}",
                    role,
                    handle.id()
                );
                return Ok(Arc::clone(handle));
            }
            warn!(
                "event=handle_unhealthy module=db status=rebuild role={} handle_id={}",
                role,
                handle.id()
            );
            cache.remove(&role);
        }

        let credentials = self.config.credentials_for(role)?;
        let conn = self.connector.connect(&self.config, role, credentials)?;
        let handle = Arc::new(ExecutableHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            role,
            conn: Mutex::new(conn),
        });

        if self.policy == RoutingPolicy::SingleSwap {
            cache.clear();
        }
        cache.insert(role, Arc::clone(&handle));
        Ok(handle)
    }

    /// Drops the cached handle for `role`, if any.
    pub fn invalidate(&self, role: Role) {
        self.cache.lock().remove(&role);
    }

    pub fn invalidate_all(&self) {
        self.cache.lock().clear();
    }

    /// Roles that currently have a cached handle, sorted.
    pub fn cached_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.cache.lock().keys().copied().collect();
        roles.sort();
        roles
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionRouter, RoutingPolicy, SqliteConnector};
    use crate::db::{DbConfig, DbError, Role};
    use std::sync::Arc;

    fn router(policy: RoutingPolicy) -> (tempfile::TempDir, ConnectionRouter) {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::sqlite(dir.path().join("router.db"));
        let router =
            ConnectionRouter::with_connector(config, policy, Box::new(SqliteConnector)).unwrap();
        (dir, router)
    }

    #[test]
    fn same_role_reuses_cached_handle() {
        let (_dir, router) = router(RoutingPolicy::PerRole);
        let first = router.acquire(Role::Select).unwrap();
        let second = router.acquire(Role::Select).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn per_role_policy_keeps_one_handle_per_role() {
        let (_dir, router) = router(RoutingPolicy::PerRole);
        let select = router.acquire(Role::Select).unwrap();
        let insert = router.acquire(Role::Insert).unwrap();
        let select_again = router.acquire(Role::Select).unwrap();

        assert_ne!(select.id(), insert.id());
        assert!(Arc::ptr_eq(&select, &select_again));
        assert_eq!(router.cached_roles(), vec![Role::Select, Role::Insert]);
    }

    #[test]
    fn single_swap_policy_rebuilds_on_role_change() {
        let (_dir, router) = router(RoutingPolicy::SingleSwap);
        let select = router.acquire(Role::Select).unwrap();
        let insert = router.acquire(Role::Insert).unwrap();
        let select_again = router.acquire(Role::Select).unwrap();

        assert_ne!(select.id(), insert.id());
        assert_ne!(select.id(), select_again.id());
        assert_eq!(router.cached_roles(), vec![Role::Select]);
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let (_dir, router) = router(RoutingPolicy::PerRole);
        let first = router.acquire(Role::Update).unwrap();
        router.invalidate(Role::Update);
        let second = router.acquire(Role::Update).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn unsupported_driver_is_rejected_on_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DbConfig::sqlite(dir.path().join("x.db"));
        config.driver = "mysql".to_string();
        let router = ConnectionRouter::new(config).unwrap();

        let err = router.acquire(Role::Select).err().unwrap();
        assert!(matches!(err, DbError::UnsupportedDriver(driver) if driver == "mysql"));
    }

    #[test]
    fn pragma_options_are_applied_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DbConfig::sqlite(dir.path().join("wal.db"));
        config
            .options
            .insert("journal_mode".to_string(), "WAL".to_string());
        let router = ConnectionRouter::new(config.clone()).unwrap();
        let handle = router.acquire(Role::Root).unwrap();
        let mode: String = handle.with_connection(|conn| {
            conn.query_row("PRAGMA journal_mode;", [], |row| row.get(0))
                .unwrap()
        });
        assert_eq!(mode.to_ascii_lowercase(), "wal");

        config
            .options
            .insert("user_version".to_string(), "1; DROP TABLE x".to_string());
        let router = ConnectionRouter::new(config).unwrap();
        let err = router.acquire(Role::Root).err().unwrap();
        assert!(matches!(err, DbError::InvalidOption(_)));
    }

    #[test]
    fn in_memory_database_cannot_back_a_router() {
        for policy in [RoutingPolicy::PerRole, RoutingPolicy::SingleSwap] {
            let err = ConnectionRouter::with_connector(
                DbConfig::sqlite(":memory:"),
                policy,
                Box::new(SqliteConnector),
            )
            .err()
            .unwrap();
            assert!(matches!(err, DbError::InvalidOption(key) if key == "dbname"));
        }
    }
}
