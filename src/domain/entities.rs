//! Entity records managed by the dashboard.
//!
//! The cache layer is generic over [`ListItem`]: it matches rows by `id` and
//! delegates field patches to the record itself, so it never inspects any
//! other field.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::types::{AccountStatus, ModerationStatus, PostStatus, UserRole};

/// A row that can live in a cached list.
///
/// `apply_field` applies one named field patch in place. Unknown fields and
/// unparsable values are ignored; payload validation belongs to the
/// server-side collaborator.
pub trait ListItem: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn apply_field(&mut self, field: &str, value: &Value);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub status: AccountStatus,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    pub status: PostStatus,
    pub pinned: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author: String,
    pub body: String,
    pub status: ModerationStatus,
    pub created_at: OffsetDateTime,
}

fn ignored(record: &'static str, field: &str) {
    debug!(record, field, "Ignoring patch for unknown or unparsable field");
}

impl ListItem for UserRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_field(&mut self, field: &str, value: &Value) {
        match field {
            "role" => match serde_json::from_value(value.clone()) {
                Ok(role) => self.role = role,
                Err(_) => ignored("user", field),
            },
            "status" => match serde_json::from_value(value.clone()) {
                Ok(status) => self.status = status,
                Err(_) => ignored("user", field),
            },
            _ => ignored("user", field),
        }
    }
}

impl ListItem for PostRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_field(&mut self, field: &str, value: &Value) {
        match field {
            "status" => match serde_json::from_value(value.clone()) {
                Ok(status) => self.status = status,
                Err(_) => ignored("post", field),
            },
            "pinned" => match value.as_bool() {
                Some(pinned) => self.pinned = pinned,
                None => ignored("post", field),
            },
            _ => ignored("post", field),
        }
    }
}

impl ListItem for CommentRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply_field(&mut self, field: &str, value: &Value) {
        match field {
            "status" => match serde_json::from_value(value.clone()) {
                Ok(status) => self.status = status,
                Err(_) => ignored("comment", field),
            },
            _ => ignored("comment", field),
        }
    }
}
