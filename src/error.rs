use thiserror::Error;

// ============================================================================
// Service Error Taxonomy
// ============================================================================

/// Errors surfaced by external collaborators (content service, name lookup).
///
/// The engine never inspects transport details; it only classifies errors
/// into the buckets that drive its retry/skip/abort decisions:
///
/// - transient ([`ServiceError::is_transient`]): retry locally, skip the
///   page, or report-and-continue depending on the caller
/// - data quality ([`ServiceError::Corrupt`]): affects a single record
/// - session-fatal ([`ServiceError::is_fatal`]): the session is unusable
/// - defect ([`ServiceError::is_defect`]): a programming error somewhere;
///   abort the current operation and surface loudly
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service rejected the call with a well-known error code.
    #[error("service rejected the call (code {code}): {message}")]
    Service { code: i32, message: String },

    /// Network-level failure (DNS, connection, TLS, bad HTTP status).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service asked us to back off.
    #[error("rate limited by the content service")]
    RateLimited,

    /// The payload came back unusable (truncated or corrupt media data).
    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// Every login strategy was exhausted; the session cannot recover.
    #[error("login failed: all strategies exhausted")]
    Login,

    /// The user or the runtime cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Anything the taxonomy does not know about. Treated as a defect.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ServiceError {
    /// Errors worth retrying or skipping past: the next call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Service { .. } | ServiceError::Transport(_) | ServiceError::RateLimited
        )
    }

    /// The session is unusable; nothing built on it can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServiceError::Login)
    }

    /// A programming error, not an environmental one.
    pub fn is_defect(&self) -> bool {
        matches!(self, ServiceError::Unexpected(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }
}

// ============================================================================
// Engine Error
// ============================================================================

/// Errors returned by `get_feeds_by_count` / `get_feeds_by_second`.
///
/// Per-record failures never surface here; they are isolated to the
/// record's own task and reported through the `dropped` event or absorbed.
/// A returned error means the whole fetch is over.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The session is unusable (login exhausted or cancelled mid-fetch).
    #[error("session unusable: {0}")]
    Session(#[source] ServiceError),

    /// Too many consecutive page fetches failed.
    #[error("page error budget exhausted after {} consecutive failures", .errors.len())]
    RetryExceeded { errors: Vec<ServiceError> },

    /// A defect-class error leaked out of a page fetch.
    #[error("unexpected failure while fetching pages: {0}")]
    Unexpected(#[source] ServiceError),
}

// ============================================================================
// Consecutive-Error Barrier
// ============================================================================

/// Accumulates consecutive page-fetch errors up to a budget.
///
/// The paginator skips a failing page and moves on, but a service that fails
/// every page would otherwise spin through the whole iteration bound. The
/// barrier converts the Nth consecutive failure into a fatal
/// [`FeedError::RetryExceeded`] carrying everything accumulated so far.
/// A successful page resets the streak.
pub(crate) struct ErrorBarrier {
    errors: Vec<ServiceError>,
    budget: usize,
}

impl ErrorBarrier {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            errors: Vec::new(),
            budget,
        }
    }

    /// Record one more consecutive failure.
    pub(crate) fn push(&mut self, err: ServiceError) -> Result<(), FeedError> {
        self.errors.push(err);
        if self.errors.len() >= self.budget {
            return Err(FeedError::RetryExceeded {
                errors: std::mem::take(&mut self.errors),
            });
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.errors.clear();
    }
}
