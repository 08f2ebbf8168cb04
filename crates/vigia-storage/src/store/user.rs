use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};

use crate::entities::user::{self, Column, Entity};
use crate::store::Store;

/// User data row (from the `users` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub display_name: String,
    pub role: String,
    pub hospital_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: user::Model) -> UserRow {
    UserRow {
        id: m.id,
        username: m.username,
        password_hash: m.password_hash,
        email: m.email,
        display_name: m.display_name,
        role: m.role,
        hospital_id: m.hospital_id,
        active: m.active,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl Store {
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let model = Entity::find()
            .filter(Column::Username.eq(username))
            .one(self.db())
            .await?;
        Ok(model.map(to_row))
    }

    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Entity::find()
            .filter(Column::Id.is_in(ids.iter().cloned()))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_active_admins(&self) -> Result<Vec<UserRow>> {
        let rows = Entity::find()
            .filter(Column::Role.eq("admin"))
            .filter(Column::Active.eq(true))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn list_active_coordinators_for_hospitals(
        &self,
        hospital_ids: &[String],
    ) -> Result<Vec<UserRow>> {
        if hospital_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Entity::find()
            .filter(Column::Role.eq("coordinator"))
            .filter(Column::Active.eq(true))
            .filter(Column::HospitalId.is_in(hospital_ids.iter().cloned()))
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        display_name: &str,
        role: &str,
        hospital_id: Option<&str>,
    ) -> Result<UserRow> {
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(vigia_common::id::next_id()),
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            email: Set(email.map(str::to_string)),
            display_name: Set(display_name.to_string()),
            role: Set(role.to_string()),
            hospital_id: Set(hospital_id.map(str::to_string)),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn count_users(&self) -> Result<u64> {
        Ok(Entity::find().count(self.db()).await?)
    }
}
