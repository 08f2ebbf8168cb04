use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

pub mod alert;
pub mod alert_config;
pub mod communication;
pub mod directory;
pub mod dispatch_log;
pub mod notification;
pub mod subscription;
pub mod template;
pub mod user;

// ---- Public row types (re-exported from the submodules) ----
pub use alert::AlertListFilter;
pub use communication::CommunicationRow;
pub use dispatch_log::{DispatchLogFilter, DispatchLogRow};
pub use notification::NotificationRow;
pub use subscription::PushSubscriptionRow;
pub use template::{TemplateFilter, TemplateRow, TemplateUpdate};
pub use user::UserRow;

/// Unified access layer over the vigia database.
///
/// All methods are `async fn`, backed by SeaORM + SQLite (any SeaORM-supported
/// URL works; WAL mode is applied when the backend is SQLite). Schema
/// migrations run on connect.
pub struct Store {
    pub(crate) db: DatabaseConnection,
}

impl Store {
    /// Connect and initialize the database.
    ///
    /// - `db_url`: full connection URL, provided by the server config.
    ///   SQLite example: `sqlite:///data/vigia.db?mode=rwc`
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL mode only applies to SQLite
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized store (SeaORM)");

        Ok(Self { db })
    }

    /// Underlying connection handle (for the submodules).
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// True when a database error is a uniqueness-constraint violation.
///
/// Used to downgrade a lost insert race on the `alerts` partial unique index
/// to a skip, and to map duplicate template names to a conflict.
pub(crate) fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("duplicate key value")
}
