use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "hospitals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: Option<String>,
    pub name: String,
    pub active: bool,
    pub ethics_submitted_at: Option<DateTimeWithTimeZone>,
    pub ethics_approved_at: Option<DateTimeWithTimeZone>,
    /// JSON array of outstanding document names.
    pub missing_documents: String,
    pub target_patients: i64,
    pub enrolled_patients: i64,
    pub last_activity_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
