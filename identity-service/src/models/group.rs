//! Group model - named roles that accounts belong to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Group {
    pub group_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_utc: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, description: String) -> Self {
        Self {
            group_id: Uuid::new_v4(),
            name,
            description,
            created_utc: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct GroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Group reference embedded in account responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group_id: Uuid,
    pub name: String,
}

impl From<Group> for GroupSummary {
    fn from(g: Group) -> Self {
        Self {
            group_id: g.group_id,
            name: g.name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupResponse {
    #[serde(flatten)]
    pub group: Group,
    pub member_count: i64,
}
