use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the session store, the inventory engine and the action handlers.
#[derive(Debug, Error)]
pub enum GameError {
    /// Malformed or out-of-range action parameters.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing session, slot, item or reference record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Occupied slot, item mismatch or a container nested into the backpack.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Inventory or vault has no room left.
    #[error("no room: {0}")]
    Capacity(String),

    /// Action tag outside the supported set.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Wrapper around IO errors (save directory creation, reads, writes).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON encode/decode errors for save documents and seed files.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (poisoned locks, malformed reference data)
    #[error("internal error: {0}")]
    Internal(String),
}

pub type GameResult<T> = Result<T, GameError>;

/// Wire classification of a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    Conflict,
    Capacity,
    Internal,
    UnknownAction,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) => ErrorKind::ValidationError,
            GameError::NotFound(_) => ErrorKind::NotFound,
            GameError::Conflict(_) => ErrorKind::Conflict,
            GameError::Capacity(_) => ErrorKind::Capacity,
            GameError::UnknownAction(_) => ErrorKind::UnknownAction,
            GameError::Io(_) | GameError::Json(_) | GameError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        GameError::Internal(format!("{} lock poisoned", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_and_json_errors_classify_as_internal() {
        let io = GameError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        assert_eq!(io.kind(), ErrorKind::Internal);

        let json = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(GameError::from(json).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_kind_wire_names() {
        let s = serde_json::to_string(&ErrorKind::ValidationError).unwrap();
        assert_eq!(s, "\"validation_error\"");
        let s = serde_json::to_string(&ErrorKind::UnknownAction).unwrap();
        assert_eq!(s, "\"unknown_action\"");
    }
}
