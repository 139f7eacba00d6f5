use thiserror::Error;

use crate::entity::EntityKind;

/// Result type alias using the structured error facility
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure crossing a crate boundary is classified by one of these
/// kinds. The acquisition loop branches on `OptimisticLock` to tell expected
/// cluster contention apart from real failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input / lookup
    InvalidInput,
    NotFound,
    AlreadyExists,

    // Unit of work
    IllegalState,
    IdReassigned,
    CommandFailed,

    // Concurrency
    /// A revision compare-and-set lost against a concurrent writer
    OptimisticLock,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Config,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::IllegalState => "ERR_ILLEGAL_STATE",
            ExErrorKind::IdReassigned => "ERR_ID_REASSIGNED",
            ExErrorKind::CommandFailed => "ERR_COMMAND_FAILED",
            ExErrorKind::OptimisticLock => "ERR_OPTIMISTIC_LOCK",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// `Clone` so that a context can keep the first recorded failure while the
/// same failure is handed back to the caller.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_kind: Option<EntityKind>,
    entity_id: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_kind: None,
            entity_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the kind of entity involved
    pub fn with_entity_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kind = Some(kind);
        self
    }

    /// Add entity ID context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.entity_kind
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }

    /// True when this error, or any error it wraps, is a lost
    /// compare-and-set
    pub fn is_optimistic_lock(&self) -> bool {
        self.kind == ExErrorKind::OptimisticLock
            || self
                .source
                .as_deref()
                .is_some_and(ExError::is_optimistic_lock)
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        match (&self.entity_kind, &self.entity_id) {
            (Some(kind), Some(id)) => write!(f, " ({} {})", kind, id)?,
            (None, Some(id)) => write!(f, " (entity_id: {})", id)?,
            _ => {}
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for the unit-of-work core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowXError {
    /// Entity lookup by identity found nothing
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: String },

    /// An insert was attempted for an identity the cache already tracks
    #[error("{kind} {id} is already tracked by this context")]
    EntityAlreadyTracked { kind: EntityKind, id: String },

    /// Entity ids are immutable once assigned
    #[error("Entity id already assigned: {current} (attempted {attempted})")]
    IdAlreadyAssigned { current: String, attempted: String },

    /// Insert was attempted on an entity without an id and no generator ran
    #[error("{kind} has no id")]
    MissingId { kind: EntityKind },

    /// The store reported a lost compare-and-set
    #[error("{kind} {id} was updated by another transaction (expected revision {revision})")]
    StaleRevision {
        kind: EntityKind,
        id: String,
        revision: i64,
    },

    /// A timer job is locked by a different acquirer
    #[error("Timer job {job_id} is locked by {owner:?}")]
    LockedByOther { job_id: String, owner: Option<String> },

    /// Configuration value rejected
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// Deployment input rejected
    #[error("Invalid deployment: {reason}")]
    InvalidDeployment { reason: String },

    /// Command body failed with a plain message
    #[error("Command {command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<FlowXError> for ExError {
    fn from(err: FlowXError) -> Self {
        match err {
            FlowXError::EntityNotFound { kind, id } => ExError::new(ExErrorKind::NotFound)
                .with_entity_kind(kind)
                .with_entity_id(id)
                .with_message(format!("{} not found", kind)),

            FlowXError::EntityAlreadyTracked { kind, id } => {
                ExError::new(ExErrorKind::AlreadyExists)
                    .with_entity_kind(kind)
                    .with_entity_id(id)
                    .with_message("Entity already tracked by this context")
            }

            FlowXError::IdAlreadyAssigned { current, attempted } => {
                ExError::new(ExErrorKind::IdReassigned)
                    .with_entity_id(current)
                    .with_message(format!("Attempted to reassign id to {}", attempted))
            }

            FlowXError::MissingId { kind } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_kind(kind)
                .with_message("Entity has no id"),

            FlowXError::StaleRevision { kind, id, revision } => {
                ExError::new(ExErrorKind::OptimisticLock)
                    .with_entity_kind(kind)
                    .with_entity_id(id)
                    .with_message(format!(
                        "Updated by another transaction concurrently (expected revision {})",
                        revision
                    ))
            }

            FlowXError::LockedByOther { job_id, owner } => {
                ExError::new(ExErrorKind::OptimisticLock)
                    .with_entity_kind(EntityKind::TimerJob)
                    .with_entity_id(job_id)
                    .with_message(format!(
                        "Locked by {}",
                        owner.as_deref().unwrap_or("<nobody>")
                    ))
            }

            FlowXError::InvalidConfig { field, reason } => ExError::new(ExErrorKind::Config)
                .with_message(format!("Invalid {}: {}", field, reason)),

            FlowXError::InvalidDeployment { reason } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity_kind(EntityKind::Deployment)
                .with_message(reason),

            FlowXError::CommandFailed { command, message } => {
                ExError::new(ExErrorKind::CommandFailed)
                    .with_op(command)
                    .with_message(message)
            }

            FlowXError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            FlowXError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

/// Conversion from serde_json::Error to FlowXError
impl From<serde_json::Error> for FlowXError {
    fn from(err: serde_json::Error) -> Self {
        FlowXError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        FlowXError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
            (ExErrorKind::OptimisticLock, "ERR_OPTIMISTIC_LOCK"),
            (ExErrorKind::IdReassigned, "ERR_ID_REASSIGNED"),
            (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
            (ExErrorKind::Config, "ERR_CONFIG"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_stale_revision_maps_to_optimistic_lock() {
        let err: ExError = FlowXError::StaleRevision {
            kind: EntityKind::TimerJob,
            id: "t1".into(),
            revision: 3,
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::OptimisticLock);
        assert_eq!(err.entity_id(), Some("t1"));
        assert!(err.is_optimistic_lock());
    }

    #[test]
    fn test_wrapped_optimistic_lock_is_detected() {
        let cause = ExError::new(ExErrorKind::OptimisticLock);
        let err = ExError::new(ExErrorKind::CommandFailed).with_source(cause);
        assert!(err.is_optimistic_lock());
        assert!(!ExError::new(ExErrorKind::Persistence).is_optimistic_lock());
    }

    #[test]
    fn test_display_includes_code_op_and_entity() {
        let err = ExError::new(ExErrorKind::NotFound)
            .with_op("find")
            .with_entity_kind(EntityKind::Job)
            .with_entity_id("j1")
            .with_message("gone");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_NOT_FOUND]"));
        assert!(rendered.contains("'find'"));
        assert!(rendered.contains("job j1"));
    }
}
