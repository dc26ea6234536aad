#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]
//! In-memory connection provider used by the binding tests.
//!
//! Each [`FakeConnection`] emulates a `MySQL` session: `USE <schema>` succeeds
//! for known schemas and fails like the server does for unknown ones.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use modkit_tenancy::{BoxError, ConnectionProvider, ExecutionContext, TenantConnection};
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("Error 1049 (42000): Unknown database '{0}'")]
pub struct UnknownDatabase(pub String);

#[derive(Debug, thiserror::Error)]
#[error("pool exhausted")]
pub struct PoolExhausted;

#[derive(Debug, Default)]
pub struct Stats {
    pub acquired: AtomicUsize,
    pub closed: AtomicUsize,
    pub statements: Mutex<Vec<String>>,
}

impl Stats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

pub struct FakeProvider {
    schemas: HashSet<String>,
    switch_delay: Duration,
    fail_acquire: bool,
    pub stats: Arc<Stats>,
}

impl FakeProvider {
    pub fn new(schemas: &[&str]) -> Self {
        Self {
            schemas: schemas.iter().map(|s| (*s).to_owned()).collect(),
            switch_delay: Duration::ZERO,
            fail_acquire: false,
            stats: Arc::new(Stats::default()),
        }
    }

    /// Every switch statement takes `delay` before answering.
    #[must_use]
    pub fn with_switch_delay(mut self, delay: Duration) -> Self {
        self.switch_delay = delay;
        self
    }

    #[must_use]
    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }
}

#[async_trait]
impl ConnectionProvider for FakeProvider {
    type Connection = FakeConnection;

    async fn acquire(&self, _ctx: &ExecutionContext) -> Result<FakeConnection, BoxError> {
        if self.fail_acquire {
            return Err(PoolExhausted.into());
        }
        let id = self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            id,
            schemas: self.schemas.clone(),
            switch_delay: self.switch_delay,
            database: None,
            stats: Arc::clone(&self.stats),
        })
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    pub id: usize,
    schemas: HashSet<String>,
    switch_delay: Duration,
    database: Option<String>,
    stats: Arc<Stats>,
}

impl FakeConnection {
    /// Equivalent of `SELECT DATABASE()`.
    pub fn current_database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

#[async_trait]
impl TenantConnection for FakeConnection {
    async fn execute(&mut self, statement: &str) -> Result<(), BoxError> {
        if !self.switch_delay.is_zero() {
            tokio::time::sleep(self.switch_delay).await;
        }
        self.stats.statements.lock().push(statement.to_owned());
        let Some(schema) = statement.strip_prefix("USE ") else {
            return Ok(());
        };
        if !self.schemas.contains(schema) {
            return Err(UnknownDatabase(schema.to_owned()).into());
        }
        self.database = Some(schema.to_owned());
        Ok(())
    }

    fn close(self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}
