//! Failure taxonomy for calls against the REST backend.

use thiserror::Error;

/// A failed request, classified by where it went wrong.
///
/// Cloneable so a single de-duplicated load can hand the same failure to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// The backend could not be reached (connect failure, timeout, reset).
  #[error("could not reach server: {0}")]
  Transport(String),

  /// The backend answered but refused the request: a `success: false`
  /// envelope or a non-2xx status. `message` is user-facing.
  #[error("{message}")]
  Rejected {
    status: Option<u16>,
    message: String,
  },

  /// The backend answered with a body we could not interpret.
  #[error("unexpected response: {0}")]
  UnexpectedShape(String),
}

impl ApiError {
  pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
    Self::Rejected {
      status,
      message: message.into(),
    }
  }

  pub fn shape(detail: impl Into<String>) -> Self {
    Self::UnexpectedShape(detail.into())
  }

  /// Only transport failures are worth retrying; a rejection or a bad
  /// body will come back the same way.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transport(_))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::Rejected {
        status: Some(404),
        ..
      }
    )
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      Self::UnexpectedShape(err.to_string())
    } else if let Some(status) = err.status() {
      Self::Rejected {
        status: Some(status.as_u16()),
        message: err.to_string(),
      }
    } else {
      Self::Transport(err.to_string())
    }
  }
}
