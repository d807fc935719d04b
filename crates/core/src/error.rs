//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock, lifecycle transitions, conflicts). Storage and gateway failures
/// belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed quantity, grade or price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Fewer units exist than were requested. `available` is the true count.
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },

    /// A lifecycle status change that the state machine does not allow.
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// A conflict occurred (stale version, lost update during allocation).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No authenticated actor for an operation that requires one.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(available: u32, requested: u32) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    pub fn invalid_transition(
        entity: &'static str,
        from: impl core::fmt::Display,
        to: impl core::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_available_count() {
        let err = DomainError::insufficient_stock(3, 5);
        assert_eq!(
            err.to_string(),
            "insufficient stock: 3 available, 5 requested"
        );
    }

    #[test]
    fn invalid_transition_message_names_both_states() {
        let err = DomainError::invalid_transition("scan", "sold", "listed");
        assert_eq!(err.to_string(), "invalid scan transition: sold -> listed");
    }
}
