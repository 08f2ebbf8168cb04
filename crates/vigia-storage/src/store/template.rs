use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};

use crate::entities::communication_template::{self, Column, Entity};
use crate::error::StorageError;
use crate::store::{is_unique_violation, Store};

/// Communication template row (from the `communication_templates` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRow {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub variables: Vec<String>,
    pub category: String,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Template update request. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub variables: Option<Vec<String>>,
    pub category: Option<String>,
}

/// Template listing filter.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub name_contains: Option<String>,
    pub category_eq: Option<String>,
}

fn to_row(m: communication_template::Model) -> Result<TemplateRow> {
    let variables: Vec<String> = serde_json::from_str(&m.variables_json)?;
    Ok(TemplateRow {
        id: m.id,
        name: m.name,
        subject: m.subject,
        body: m.body,
        variables,
        category: m.category,
        usage_count: m.usage_count,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl Store {
    /// Create a template. Name uniqueness is enforced by the schema; a
    /// duplicate maps to [`StorageError::Conflict`].
    pub async fn create_template(
        &self,
        name: &str,
        subject: &str,
        body: &str,
        variables: &[String],
        category: &str,
    ) -> Result<TemplateRow> {
        let now = Utc::now().fixed_offset();
        let am = communication_template::ActiveModel {
            id: Set(vigia_common::id::next_id()),
            name: Set(name.to_string()),
            subject: Set(subject.to_string()),
            body: Set(body.to_string()),
            variables_json: Set(serde_json::to_string(variables)?),
            category: Set(category.to_string()),
            usage_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        match am.insert(self.db()).await {
            Ok(model) => to_row(model),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict {
                entity: "communication_template",
                detail: format!("name '{name}' already exists"),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_template(&self, id: &str) -> Result<Option<TemplateRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_row).transpose()
    }

    pub async fn get_template_by_name(&self, name: &str) -> Result<Option<TemplateRow>> {
        let model = Entity::find()
            .filter(Column::Name.eq(name))
            .one(self.db())
            .await?;
        model.map(to_row).transpose()
    }

    pub async fn update_template(
        &self,
        id: &str,
        update: &TemplateUpdate,
    ) -> Result<Option<TemplateRow>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else { return Ok(None) };
        let mut am: communication_template::ActiveModel = m.into();
        if let Some(name) = &update.name {
            am.name = Set(name.clone());
        }
        if let Some(subject) = &update.subject {
            am.subject = Set(subject.clone());
        }
        if let Some(body) = &update.body {
            am.body = Set(body.clone());
        }
        if let Some(variables) = &update.variables {
            am.variables_json = Set(serde_json::to_string(variables)?);
        }
        if let Some(category) = &update.category {
            am.category = Set(category.clone());
        }
        am.updated_at = Set(Utc::now().fixed_offset());
        match am.update(self.db()).await {
            Ok(updated) => Ok(Some(to_row(updated)?)),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Conflict {
                entity: "communication_template",
                detail: "template name already exists".to_string(),
            }
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_template(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn list_templates(
        &self,
        filter: &TemplateFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TemplateRow>> {
        let mut q = Entity::find();
        if let Some(name) = &filter.name_contains {
            q = q.filter(Column::Name.contains(name.clone()));
        }
        if let Some(category) = &filter.category_eq {
            q = q.filter(Column::Category.eq(category.clone()));
        }
        let rows = q
            .order_by(Column::Name, Order::Asc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_row).collect()
    }

    pub async fn count_templates(&self, filter: &TemplateFilter) -> Result<u64> {
        let mut q = Entity::find();
        if let Some(name) = &filter.name_contains {
            q = q.filter(Column::Name.contains(name.clone()));
        }
        if let Some(category) = &filter.category_eq {
            q = q.filter(Column::Category.eq(category.clone()));
        }
        Ok(q.count(self.db()).await?)
    }

    /// Bump `usage_count` after a template has been used for a send.
    pub async fn increment_template_usage(&self, id: &str) -> Result<()> {
        let res = Entity::update_many()
            .col_expr(
                Column::UsageCount,
                sea_orm::sea_query::Expr::col(Column::UsageCount).add(1),
            )
            .filter(Column::Id.eq(id))
            .exec(self.db())
            .await?;
        if res.rows_affected == 0 {
            tracing::warn!(template_id = %id, "Usage increment for missing template");
        }
        Ok(())
    }
}
