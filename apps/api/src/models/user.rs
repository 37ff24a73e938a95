use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::guard::{Owned, Role};
use crate::query::{Collection, ColumnKind, FieldSpec};

/// Public view of a user. The password hash is never selected into this row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Owned for UserRow {
    fn owner_id(&self) -> Uuid {
        self.id
    }
}

/// Login lookup row.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub role: Role,
    pub password_hash: String,
}

pub const USER_COLUMNS: &str = "id, name, email, role, created_at";

pub static USERS: Collection = Collection {
    table: "users",
    select: USER_COLUMNS,
    fields: &[
        FieldSpec {
            name: "id",
            column: "id",
            kind: ColumnKind::Uuid,
        },
        FieldSpec {
            name: "name",
            column: "name",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "email",
            column: "email",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "role",
            column: "role::text",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "createdAt",
            column: "created_at",
            kind: ColumnKind::Timestamp,
        },
    ],
    text_columns: &["name", "email"],
};
