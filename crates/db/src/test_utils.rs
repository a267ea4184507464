//! Test utilities for database operations.
//!
//! Provides helpers for setting up and tearing down test databases.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, Set, Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{bucket, bucket_access, tag, user};

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "bubbles_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "bubbles_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "bubbles_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Get URL for connecting to postgres database (for creating test DB).
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A test database context that manages the lifecycle of a test database.
pub struct TestDatabase {
    /// Database connection, shared so repositories can hold it too.
    pub conn: Arc<DatabaseConnection>,
    /// Database configuration.
    pub config: TestDbConfig,
    #[allow(dead_code)]
    cleanup_on_drop: bool,
}

impl TestDatabase {
    /// Create a new test database with a unique name.
    ///
    /// This connects to the postgres database, creates a new test database,
    /// runs migrations, and returns a connection to the test database.
    pub async fn new() -> Result<Self, DbErr> {
        let config = TestDbConfig::default();
        Self::with_config(config).await
    }

    /// Create a new test database with custom configuration.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        crate::migrations::Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self {
            conn: Arc::new(conn),
            config,
            cleanup_on_drop: false, // Set to true to clean tables on drop
        })
    }

    /// Create a unique test database (for parallel tests).
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let unique_suffix = uuid::Uuid::new_v4().to_string().replace('-', "_");
        config.database = format!("bubbles_test_{}", &unique_suffix[..8]);

        // Connect to postgres to create the database
        let postgres_conn = Database::connect(&config.postgres_url()).await?;

        let create_db = format!("CREATE DATABASE \"{}\"", config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, create_db))
            .await?;

        postgres_conn.close().await?;

        // Connect to the new database
        let conn = Database::connect(&config.database_url()).await?;
        crate::migrations::Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Created unique test database");

        Ok(Self {
            conn: Arc::new(conn),
            config,
            cleanup_on_drop: true,
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// A shared handle to the connection, for repositories and services.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Clean up all data in the test database (truncate all tables).
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        // Get all table names
        let tables = self
            .conn
            .query_all(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT tablename FROM pg_tables WHERE schemaname = 'public'".to_string(),
            ))
            .await?;

        // Truncate each table
        for row in tables {
            if let Ok(table_name) = row.try_get::<String>("", "tablename") {
                // Skip migration table
                if table_name == "seaql_migrations" {
                    continue;
                }

                let truncate = format!("TRUNCATE TABLE \"{table_name}\" CASCADE");
                self.conn
                    .execute(Statement::from_string(DatabaseBackend::Postgres, truncate))
                    .await?;
            }
        }

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop the test database (for unique databases).
    /// Note: This consumes self because it needs to close the connection.
    /// Handles still held elsewhere are cut off by `pg_terminate_backend`.
    pub async fn drop_database(self) -> Result<(), DbErr> {
        // Close the connection first
        if let Ok(conn) = Arc::try_unwrap(self.conn) {
            conn.close().await?;
        }

        // Connect to postgres to drop the database
        let postgres_conn = Database::connect(&self.config.postgres_url()).await?;

        // Terminate all connections to the database
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
            self.config.database
        );
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, terminate))
            .await
            .ok(); // Ignore errors

        let drop_db = format!("DROP DATABASE IF EXISTS \"{}\"", self.config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, drop_db))
            .await?;

        postgres_conn.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }

    /// Run a test with automatic cleanup.
    ///
    /// Example:
    /// ```ignore
    /// TestDatabase::run_test(|db| async {
    ///     let conn = db.connection();
    ///     // use connection...
    ///     Ok(())
    /// }).await?;
    /// ```
    pub async fn run_test<F, Fut, T>(f: F) -> Result<T, DbErr>
    where
        F: for<'a> FnOnce(&'a Self) -> Fut,
        Fut: std::future::Future<Output = Result<T, DbErr>>,
    {
        let db = Self::new().await?;
        let result = f(&db).await;
        db.cleanup().await?;
        result
    }
}

/// Insert a user belonging to `account_id`.
pub async fn insert_user<C: ConnectionTrait>(
    db: &C,
    id: &str,
    account_id: &str,
) -> Result<user::Model, DbErr> {
    user::ActiveModel {
        id: Set(id.to_string()),
        account_id: Set(account_id.to_string()),
        username: Set(id.to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
}

/// Insert a bucket belonging to `account_id`.
pub async fn insert_bucket<C: ConnectionTrait>(
    db: &C,
    id: &str,
    account_id: &str,
) -> Result<bucket::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    bucket::ActiveModel {
        id: Set(id.to_string()),
        account_id: Set(account_id.to_string()),
        name: Set(format!("Bucket {id}")),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Delete a bucket. Its filter join rows go with it through `ON DELETE CASCADE`.
pub async fn delete_bucket<C: ConnectionTrait>(db: &C, id: &str) -> Result<(), DbErr> {
    bucket::Entity::delete_by_id(id).exec(db).await?;
    Ok(())
}

/// Insert a tag belonging to `account_id`.
pub async fn insert_tag<C: ConnectionTrait>(
    db: &C,
    id: &str,
    account_id: &str,
) -> Result<tag::Model, DbErr> {
    tag::ActiveModel {
        id: Set(id.to_string()),
        account_id: Set(account_id.to_string()),
        title: Set(id.to_string()),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
}

/// Give a user access to a bucket.
pub async fn grant_access<C: ConnectionTrait>(
    db: &C,
    bucket_id: &str,
    user_id: &str,
) -> Result<bucket_access::Model, DbErr> {
    bucket_access::ActiveModel {
        bucket_id: Set(bucket_id.to_string()),
        user_id: Set(user_id.to_string()),
    }
    .insert(db)
    .await
}
