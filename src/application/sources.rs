//! Boundary traits describing the server-side collaborators.
//!
//! Implementations live outside this crate (HTTP client, RPC bridge, test
//! stubs). The layer does not distinguish failure causes beyond passing the
//! collaborator's message through unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cache::{ListFilter, ListPage};
use crate::domain::entities::ListItem;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The collaborator could not be reached or failed transiently.
    #[error("{0}")]
    Unavailable(String),
    /// The collaborator rejected the call for lack of permission.
    #[error("{0}")]
    Forbidden(String),
}

/// Outcome reported by a write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub success: bool,
    pub message: String,
}

impl WriteReceipt {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A single-field update request.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPatch {
    pub id: String,
    pub field: String,
    pub value: Value,
}

impl FieldPatch {
    pub fn new(id: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            value,
        }
    }
}

/// Read side of a resource collaborator.
#[async_trait]
pub trait ListSource<E: ListItem>: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> Result<ListPage<E>, SourceError>;
}

/// Write side of a resource collaborator.
#[async_trait]
pub trait WriteSource: Send + Sync {
    async fn delete(&self, id: &str) -> Result<WriteReceipt, SourceError>;

    async fn update_field(&self, patch: &FieldPatch) -> Result<WriteReceipt, SourceError>;
}
