//! Optimistic mutation controller.
//!
//! Writes are applied to every cached page of the resource kind before the
//! network call resolves; a failed write restores the pre-mutation snapshot
//! verbatim; either outcome ends by invalidating the kind so the next read
//! reconciles with the server.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cache::{ListPage, ListStore, ResourceKind};
use crate::domain::entities::ListItem;

use super::query::QueryController;
use super::sources::{FieldPatch, SourceError, WriteReceipt, WriteSource};

const METRIC_MUTATION_TOTAL: &str = "lampo_mutation_total";
const METRIC_MUTATION_ROLLBACK: &str = "lampo_mutation_rollback_total";

/// A write operation against one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Delete { id: String },
    UpdateField(FieldPatch),
}

impl WriteOp {
    pub fn target_id(&self) -> &str {
        match self {
            Self::Delete { id } => id,
            Self::UpdateField(patch) => &patch.id,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::UpdateField(_) => "update_field",
        }
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    /// The collaborator completed the call but reported failure.
    #[error("{message}")]
    Rejected { message: String },
    /// The collaborator rejected the call outright.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Mutation lifecycle exposed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct MutationState {
    pub status: MutationStatus,
    pub error: Option<String>,
    /// Input of the most recent mutation, if any.
    pub variables: Option<WriteOp>,
}

impl MutationState {
    fn idle() -> Self {
        Self {
            status: MutationStatus::Idle,
            error: None,
            variables: None,
        }
    }
}

// ============================================================================
// List mutation reducer
// ============================================================================

/// Pure reduction applied to a cached list payload during an optimistic
/// mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEdit {
    Remove { id: String },
    PatchField(FieldPatch),
}

impl From<&WriteOp> for ListEdit {
    fn from(op: &WriteOp) -> Self {
        match op {
            WriteOp::Delete { id } => Self::Remove { id: id.clone() },
            WriteOp::UpdateField(patch) => Self::PatchField(patch.clone()),
        }
    }
}

fn pages_for(total: u64, page_size: u32) -> u32 {
    total.div_ceil(u64::from(page_size.max(1))).max(1) as u32
}

/// Apply `edit` to a list payload, producing the optimistically updated copy.
///
/// Removal also decrements `total` and recomputes `total_pages`, so the
/// rendered count stays consistent with the shrunken list until settlement
/// refetches the authoritative numbers.
pub fn apply_edit<E: ListItem>(page: &ListPage<E>, edit: &ListEdit, page_size: u32) -> ListPage<E> {
    match edit {
        ListEdit::Remove { id } => {
            let items: Vec<E> = page
                .items
                .iter()
                .filter(|item| item.id() != id)
                .cloned()
                .collect();
            let total = page.total.saturating_sub(1);
            ListPage::new(items, total, page.page, pages_for(total, page_size))
        }
        ListEdit::PatchField(patch) => {
            let items: Vec<E> = page
                .items
                .iter()
                .cloned()
                .map(|mut item| {
                    if item.id() == patch.id {
                        item.apply_field(&patch.field, &patch.value);
                    }
                    item
                })
                .collect();
            ListPage::new(items, page.total, page.page, page.total_pages)
        }
    }
}

// ============================================================================
// Mutation controller
// ============================================================================

/// Write-side controller for one resource kind.
pub struct MutationController<E: ListItem> {
    kind: ResourceKind,
    store: Arc<ListStore<E>>,
    query: Arc<QueryController<E>>,
    writer: Arc<dyn WriteSource>,
    state: watch::Sender<MutationState>,
}

impl<E: ListItem> MutationController<E> {
    pub fn new(
        kind: ResourceKind,
        store: Arc<ListStore<E>>,
        query: Arc<QueryController<E>>,
        writer: Arc<dyn WriteSource>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(MutationState::idle());
        Arc::new(Self {
            kind,
            store,
            query,
            writer,
            state,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().status == MutationStatus::Pending
    }

    pub fn is_error(&self) -> bool {
        self.state.borrow().status == MutationStatus::Error
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn variables(&self) -> Option<WriteOp> {
        self.state.borrow().variables.clone()
    }

    /// Watch mutation state changes, for hosts that re-render on transitions.
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    /// Fire-and-forget variant of [`MutationController::mutate_async`]; the
    /// outcome is observable through the exposed state.
    pub fn mutate(self: &Arc<Self>, op: WriteOp) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let _ = controller.mutate_async(op).await;
        });
    }

    /// Run the optimistic write protocol for `op`.
    ///
    /// The optimistic edit is applied synchronously, before the write is
    /// awaited; a caller observing the cache right after this call starts
    /// already sees the edited lists.
    pub async fn mutate_async(&self, op: WriteOp) -> Result<WriteReceipt, MutationError> {
        counter!(
            METRIC_MUTATION_TOTAL,
            "kind" => self.kind.as_str(),
            "op" => op.label()
        )
        .increment(1);
        self.state.send_replace(MutationState {
            status: MutationStatus::Pending,
            error: None,
            variables: Some(op.clone()),
        });

        // A straggling read resolving mid-mutation would clobber the
        // optimistic write; stop them before touching the cache.
        self.query.cancel_inflight();

        let previous = self.store.snapshot();
        let edit = ListEdit::from(&op);
        self.store.set_where(
            |_| true,
            |filter, entry| entry.map_value(|page| apply_edit(page, &edit, filter.page_size)),
        );
        debug!(
            kind = self.kind.as_str(),
            op = op.label(),
            id = op.target_id(),
            snapshot_entries = previous.len(),
            "Applied optimistic edit"
        );

        let result = match &op {
            WriteOp::Delete { id } => self.writer.delete(id).await,
            WriteOp::UpdateField(patch) => self.writer.update_field(patch).await,
        };

        let outcome = match result {
            Ok(receipt) if receipt.success => Ok(receipt),
            Ok(receipt) => Err(MutationError::Rejected {
                message: receipt.message,
            }),
            Err(err) => Err(MutationError::Source(err)),
        };

        match &outcome {
            Ok(_) => {
                self.state.send_replace(MutationState {
                    status: MutationStatus::Success,
                    error: None,
                    variables: Some(op.clone()),
                });
            }
            Err(err) => {
                warn!(
                    kind = self.kind.as_str(),
                    op = op.label(),
                    id = op.target_id(),
                    error = %err,
                    "Write failed; rolling back optimistic edit"
                );
                counter!(METRIC_MUTATION_ROLLBACK, "kind" => self.kind.as_str()).increment(1);
                self.store.restore(previous);
                self.state.send_replace(MutationState {
                    status: MutationStatus::Error,
                    error: Some(err.to_string()),
                    variables: Some(op.clone()),
                });
            }
        }

        // Settlement: force the next read of every key of this kind back to
        // the server, reconciling whatever the optimistic edit did not
        // anticipate.
        self.store.invalidate_all();

        outcome
    }
}
