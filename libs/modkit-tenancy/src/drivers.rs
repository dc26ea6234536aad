//! Connection capabilities for `SQLx` pools.
//!
//! The switch statement goes through `raw_sql` so it is sent over the text
//! protocol; `MySQL` refuses `USE` as a prepared statement. A closed
//! connection is detached from its pool instead of being returned to it,
//! since it still points at the tenant's schema.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;

use crate::connection::{ConnectionProvider, TenantConnection};
use crate::context::ExecutionContext;
use crate::error::BoxError;

macro_rules! impl_sqlx_driver {
    ($db:ty) => {
        #[async_trait]
        impl ConnectionProvider for sqlx::Pool<$db> {
            type Connection = PoolConnection<$db>;

            async fn acquire(&self, _ctx: &ExecutionContext) -> Result<Self::Connection, BoxError> {
                Ok(sqlx::Pool::acquire(self).await?)
            }
        }

        #[async_trait]
        impl TenantConnection for PoolConnection<$db> {
            async fn execute(&mut self, statement: &str) -> Result<(), BoxError> {
                let conn: &mut <$db as sqlx::Database>::Connection = &mut **self;
                sqlx::Executor::execute(conn, sqlx::raw_sql(statement)).await?;
                Ok(())
            }

            fn close(mut self) {
                self.close_on_drop();
            }
        }
    };
}

#[cfg(feature = "mysql")]
impl_sqlx_driver!(sqlx::MySql);
#[cfg(feature = "pg")]
impl_sqlx_driver!(sqlx::Postgres);
#[cfg(feature = "sqlite")]
impl_sqlx_driver!(sqlx::Sqlite);
