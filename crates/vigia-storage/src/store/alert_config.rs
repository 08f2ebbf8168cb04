use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};

use vigia_common::types::{AlertConfig, AlertKind};

use crate::entities::alert_config::{self, Column, Entity};
use crate::store::Store;

fn to_config(m: alert_config::Model) -> Result<AlertConfig> {
    let alert_type: AlertKind = m
        .alert_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    Ok(AlertConfig {
        alert_type,
        enabled: m.enabled,
        notify_admin: m.notify_admin,
        notify_coordinator: m.notify_coordinator,
        auto_send_email: m.auto_send_email,
        threshold_value: m.threshold_value,
        email_template_id: m.email_template_id,
    })
}

impl Store {
    /// All alert configurations, keyed for one evaluation run.
    ///
    /// Rows whose `alert_type` is no longer known are skipped with a warning
    /// rather than failing the run.
    pub async fn list_alert_configs(&self) -> Result<Vec<AlertConfig>> {
        let rows = Entity::find()
            .order_by(Column::AlertType, Order::Asc)
            .all(self.db())
            .await?;
        let mut configs = Vec::with_capacity(rows.len());
        for m in rows {
            match to_config(m.clone()) {
                Ok(c) => configs.push(c),
                Err(e) => {
                    tracing::warn!(alert_type = %m.alert_type, error = %e, "Skipping unknown alert config row");
                }
            }
        }
        Ok(configs)
    }

    pub async fn get_alert_config(&self, kind: AlertKind) -> Result<Option<AlertConfig>> {
        let model = Entity::find()
            .filter(Column::AlertType.eq(kind.as_str()))
            .one(self.db())
            .await?;
        model.map(to_config).transpose()
    }

    /// Insert or update the configuration row for one alert type.
    pub async fn upsert_alert_config(&self, config: &AlertConfig) -> Result<AlertConfig> {
        let now = Utc::now().fixed_offset();
        let existing = Entity::find()
            .filter(Column::AlertType.eq(config.alert_type.as_str()))
            .one(self.db())
            .await?;

        let model = if let Some(m) = existing {
            let mut am: alert_config::ActiveModel = m.into();
            am.enabled = Set(config.enabled);
            am.notify_admin = Set(config.notify_admin);
            am.notify_coordinator = Set(config.notify_coordinator);
            am.auto_send_email = Set(config.auto_send_email);
            am.threshold_value = Set(config.threshold_value);
            am.email_template_id = Set(config.email_template_id.clone());
            am.updated_at = Set(now);
            am.update(self.db()).await?
        } else {
            let am = alert_config::ActiveModel {
                id: Set(vigia_common::id::next_id()),
                alert_type: Set(config.alert_type.as_str().to_string()),
                enabled: Set(config.enabled),
                notify_admin: Set(config.notify_admin),
                notify_coordinator: Set(config.notify_coordinator),
                auto_send_email: Set(config.auto_send_email),
                threshold_value: Set(config.threshold_value),
                email_template_id: Set(config.email_template_id.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            am.insert(self.db()).await?
        };
        to_config(model)
    }
}
