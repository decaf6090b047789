use std::collections::HashMap;
use std::hash::BuildHasher;

use async_trait::async_trait;
use postgres_types::{ToSql, Type};
use tokio_postgres::{Row, Statement};

use crate::context::DatabaseConfig;
use crate::error::DbError;
use crate::pool::{Factory, Pool};

pub struct CrcBuilder;

impl BuildHasher for CrcBuilder {
    type Hasher = crc32fast::Hasher;

    fn build_hasher(&self) -> crc32fast::Hasher {
        crc32fast::Hasher::new()
    }
}

type StatementCache = HashMap<&'static str, Statement, CrcBuilder>;

/// Anything that can run queries: a pooled connection or a transaction on one.
#[async_trait]
pub trait Querist: Send {
    async fn prepare_typed(&mut self, source: &'static str, types: &[Type]) -> Result<Statement, DbError>;

    async fn query_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DbError>;

    /// Fails unless the statement returns exactly one row.
    async fn query_one_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError>;

    async fn execute_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, DbError>;

    async fn query_typed(
        &mut self,
        source: &'static str,
        types: &[Type],
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DbError> {
        let statement = self.prepare_typed(source, types).await?;
        self.query_statement(&statement, params).await
    }

    async fn query(&mut self, source: &'static str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, DbError> {
        self.query_typed(source, &[], params).await
    }

    async fn query_one_typed(
        &mut self,
        source: &'static str,
        types: &[Type],
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, DbError> {
        let rows = self.query_typed(source, types, params).await?;
        Ok(rows.into_iter().next())
    }

    async fn query_one(&mut self, source: &'static str, params: &[&(dyn ToSql + Sync)]) -> Result<Option<Row>, DbError> {
        self.query_one_typed(source, &[], params).await
    }

    async fn query_exactly_one(
        &mut self,
        source: &'static str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError> {
        let statement = self.prepare_typed(source, &[]).await?;
        self.query_one_statement(&statement, params).await
    }

    async fn execute(&mut self, source: &'static str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, DbError> {
        let statement = self.prepare_typed(source, &[]).await?;
        self.execute_statement(&statement, params).await
    }
}

pub struct Client {
    client: tokio_postgres::Client,
    prepared: StatementCache,
}

impl Client {
    pub async fn with_config(config: &tokio_postgres::Config) -> Result<Client, DbError> {
        let (client, connection) = config.connect(tokio_postgres::NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::error!("Database connection error: {}", e);
            }
        });
        let prepared = HashMap::with_capacity_and_hasher(32, CrcBuilder);
        Ok(Client { client, prepared })
    }

    pub async fn transaction(&mut self) -> Result<Transaction<'_>, DbError> {
        let Client { client, prepared } = self;
        let inner = client.transaction().await?;
        Ok(Transaction { inner, prepared })
    }

    /// Creates the tables if they are missing. Safe to run on every start.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        self.client.batch_execute(include_str!("../schema.sql")).await
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

#[async_trait]
impl Querist for Client {
    async fn prepare_typed(&mut self, source: &'static str, types: &[Type]) -> Result<Statement, DbError> {
        if let Some(statement) = self.prepared.get(source) {
            return Ok(statement.clone());
        }
        let statement = self.client.prepare_typed(source, types).await?;
        self.prepared.insert(source, statement.clone());
        Ok(statement)
    }

    async fn query_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DbError> {
        self.client.query(statement, params).await
    }

    async fn query_one_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError> {
        self.client.query_one(statement, params).await
    }

    async fn execute_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, DbError> {
        self.client.execute(statement, params).await
    }
}

/// Rolls back when dropped without `commit`.
pub struct Transaction<'a> {
    inner: tokio_postgres::Transaction<'a>,
    prepared: &'a mut StatementCache,
}

impl<'a> Transaction<'a> {
    pub async fn commit(self) -> Result<(), DbError> {
        self.inner.commit().await
    }
}

#[async_trait]
impl<'a> Querist for Transaction<'a> {
    async fn prepare_typed(&mut self, source: &'static str, types: &[Type]) -> Result<Statement, DbError> {
        if let Some(statement) = self.prepared.get(source) {
            return Ok(statement.clone());
        }
        let statement = self.inner.prepare_typed(source, types).await?;
        self.prepared.insert(source, statement.clone());
        Ok(statement)
    }

    async fn query_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, DbError> {
        self.inner.query(statement, params).await
    }

    async fn query_one_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, DbError> {
        self.inner.query_one(statement, params).await
    }

    async fn execute_statement(
        &mut self,
        statement: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, DbError> {
        self.inner.execute(statement, params).await
    }
}

pub struct PostgresFactory {
    config: tokio_postgres::Config,
}

impl PostgresFactory {
    pub fn new(config: tokio_postgres::Config) -> PostgresFactory {
        PostgresFactory { config }
    }
}

#[async_trait]
impl Factory for PostgresFactory {
    type Output = Client;
    type Error = DbError;

    async fn make(&self) -> Result<Client, DbError> {
        Client::with_config(&self.config).await
    }

    fn is_broken(conn: &Client) -> bool {
        conn.is_closed()
    }
}

pub type DbPool = Pool<PostgresFactory>;

pub async fn pool(config: &DatabaseConfig) -> Result<DbPool, DbError> {
    let factory = PostgresFactory::new(config.postgres.clone());
    Pool::with_num(config.pool_size, config.pool_max, factory).await
}

/// `None` when no database is configured, so the tests that need one pass vacuously.
#[cfg(test)]
pub fn test_config() -> Option<DatabaseConfig> {
    dotenv::dotenv().ok();
    if std::env::var_os("DATABASE_URL").is_none() && std::env::var_os("DB_HOST").is_none() {
        log::warn!("Neither DATABASE_URL nor DB_HOST is set, skipping a database test");
        return None;
    }
    Some(DatabaseConfig::from_env().expect("invalid database configuration"))
}

#[cfg(test)]
pub async fn test_client() -> Option<Client> {
    let config = test_config()?;
    let client = Client::with_config(&config.postgres)
        .await
        .expect("failed to connect to the test database");
    client.init_schema().await.expect("failed to initialize the schema");
    Some(client)
}

#[tokio::test]
async fn schema_is_idempotent() {
    let mut client = match test_client().await {
        Some(client) => client,
        None => return,
    };
    client.init_schema().await.unwrap();
    client.init_schema().await.unwrap();
    let row = client
        .query_exactly_one(
            "SELECT count(*) FROM information_schema.tables WHERE table_name IN ('users', 'events', 'chat_messages')",
            &[],
        )
        .await
        .unwrap();
    let count: i64 = row.get(0);
    assert_eq!(count, 3);
}

#[tokio::test]
async fn pooled_connection_test() {
    let config = match test_config() {
        Some(config) => config,
        None => return,
    };
    let pool = pool(&config).await.unwrap();
    let mut conn = pool.get().await.unwrap();
    let row = conn.query_exactly_one("SELECT 1::INT4", &[]).await.unwrap();
    let one: i32 = row.get(0);
    assert_eq!(one, 1);
    drop(conn);
    assert_eq!(pool.status().idle, config.pool_size.max(1));
}
