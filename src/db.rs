use crate::config::Config;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use tokio::sync::Mutex;

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_library_schema.sql", include_str!("migrations/001_library_schema.sql")),
    ("002_todos_schema.sql", include_str!("migrations/002_todos_schema.sql")),
];

const SEEDS: &[(&str, &str)] = &[
    ("seed/library.sql", include_str!("migrations/seed/library.sql")),
    ("seed/todos.sql", include_str!("migrations/seed/todos.sql")),
];

pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<()>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serializes multi-statement transactions on the shared connection.
    pub fn tx_lock(&self) -> &Mutex<()> {
        &self.tx_lock
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());
        tracing::info!(path = ?path, "[db] opening local database");
        Self::open(&path).await
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new_local(path.as_ref()).build().await?;
        Self::init(db).await
    }

    pub async fn in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db).await
    }

    async fn init(db: LibsqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            _db: db,
            conn,
            tx_lock: Mutex::new(()),
        })
    }

    /// Wipes the library and todo tables and reloads the demo rows.
    pub async fn seed(&self) -> Result<()> {
        let _guard = self.tx_lock.lock().await;

        for (name, sql) in SEEDS {
            tracing::info!("loading seed: {}", name);
            self.conn
                .execute_batch(sql)
                .await
                .map_err(|e| anyhow::anyhow!("failed to load seed {name}: {e}"))?;
        }

        Ok(())
    }
}
