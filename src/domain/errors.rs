use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Product no longer exists: {0}. Refresh and try again.")]
    ProductNotFound(String),
    #[error("Product is unavailable: {0}. Refresh and try again.")]
    ProductUnavailable(String),
    #[error("Selected color not found for {0}. Refresh and try again.")]
    ColorNotFound(String),
    #[error("Insufficient stock for {product} ({color}).")]
    InsufficientStock { product: String, color: String },
    #[error("Order not found")]
    NotFound,
    /// The store kept rejecting the transaction because of concurrent writers.
    #[error("Transaction conflict: {0}")]
    Conflict(String),
    /// A collaborator (database pool, identity service) could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// True for the errors caused by the current state of the catalog, which
    /// the customer can resolve by refreshing their cart.
    pub fn is_stock_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::ProductNotFound(_)
                | DomainError::ProductUnavailable(_)
                | DomainError::ColorNotFound(_)
                | DomainError::InsufficientStock { .. }
        )
    }
}

/// Why an attempt to archive an order externally failed. Never shown to customers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("archive request timed out after {0}ms")]
    Timeout(u64),
    #[error("archive request failed: {0}")]
    Transport(String),
    #[error("archive endpoint responded with {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("archive endpoint rejected the order: {0}")]
    Rejected(String),
    #[error("archive endpoint returned an unusable response: {0}")]
    Malformed(String),
}

impl ArchiveError {
    /// Network trouble and server-side errors may clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            ArchiveError::Timeout(_) | ArchiveError::Transport(_) => true,
            ArchiveError::Status { status, .. } => *status >= 500,
            ArchiveError::Rejected(_) | ArchiveError::Malformed(_) => false,
        }
    }
}
