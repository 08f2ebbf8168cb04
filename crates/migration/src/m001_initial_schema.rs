use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    email TEXT,
    display_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'coordinator',
    hospital_id TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_hospital_id ON users(hospital_id);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hospitals (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 0,
    ethics_submitted_at TEXT,
    ethics_approved_at TEXT,
    missing_documents TEXT NOT NULL DEFAULT '[]',
    target_patients INTEGER NOT NULL DEFAULT 0,
    enrolled_patients INTEGER NOT NULL DEFAULT 0,
    last_activity_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hospitals_project_id ON hospitals(project_id);

CREATE TABLE IF NOT EXISTS recruitment_periods (
    id TEXT PRIMARY KEY NOT NULL,
    hospital_id TEXT NOT NULL,
    starts_at TEXT NOT NULL,
    ends_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_recruitment_periods_hospital_id
    ON recruitment_periods(hospital_id);
CREATE INDEX IF NOT EXISTS idx_recruitment_periods_starts_at
    ON recruitment_periods(starts_at);

CREATE TABLE IF NOT EXISTS alert_configs (
    id TEXT PRIMARY KEY NOT NULL,
    alert_type TEXT NOT NULL UNIQUE,
    enabled INTEGER NOT NULL DEFAULT 1,
    notify_admin INTEGER NOT NULL DEFAULT 1,
    notify_coordinator INTEGER NOT NULL DEFAULT 0,
    auto_send_email INTEGER NOT NULL DEFAULT 0,
    threshold_value INTEGER,
    email_template_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY NOT NULL,
    alert_type TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'medium',
    hospital_id TEXT,
    project_id TEXT,
    payload_json TEXT NOT NULL DEFAULT '{}',
    is_resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    resolved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_alerts_type ON alerts(alert_type);
CREATE INDEX IF NOT EXISTS idx_alerts_hospital_id ON alerts(hospital_id);
CREATE INDEX IF NOT EXISTS idx_alerts_created_at ON alerts(created_at DESC);

-- Deduplication backstop: at most one unresolved alert per
-- (type, hospital, project), including the NULL-target forms.
CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_open_dedup
    ON alerts(alert_type, COALESCE(hospital_id, ''), COALESCE(project_id, ''))
    WHERE is_resolved = 0;

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'info',
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_user_id
    ON notifications(user_id, is_read);
CREATE INDEX IF NOT EXISTS idx_notifications_created_at
    ON notifications(created_at DESC);

CREATE TABLE IF NOT EXISTS communication_templates (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    variables_json TEXT NOT NULL DEFAULT '[]',
    category TEXT NOT NULL DEFAULT 'general',
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS push_subscriptions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    endpoint TEXT NOT NULL UNIQUE,
    p256dh_key TEXT NOT NULL,
    auth_key TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_push_subscriptions_user_id
    ON push_subscriptions(user_id);

CREATE TABLE IF NOT EXISTS communications (
    id TEXT PRIMARY KEY NOT NULL,
    sender_id TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    hospital_id TEXT,
    project_id TEXT,
    read_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_communications_recipient_id
    ON communications(recipient_id, read_at);

CREATE TABLE IF NOT EXISTS dispatch_logs (
    id TEXT PRIMARY KEY NOT NULL,
    alert_id TEXT,
    communication_batch_id TEXT,
    channel TEXT NOT NULL,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dispatch_logs_alert_id
    ON dispatch_logs(alert_id);
CREATE INDEX IF NOT EXISTS idx_dispatch_logs_created_at
    ON dispatch_logs(created_at DESC);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS dispatch_logs;
DROP TABLE IF EXISTS communications;
DROP TABLE IF EXISTS push_subscriptions;
DROP TABLE IF EXISTS communication_templates;
DROP TABLE IF EXISTS notifications;
DROP TABLE IF EXISTS alerts;
DROP TABLE IF EXISTS alert_configs;
DROP TABLE IF EXISTS recruitment_periods;
DROP TABLE IF EXISTS hospitals;
DROP TABLE IF EXISTS projects;
DROP TABLE IF EXISTS users;
";
