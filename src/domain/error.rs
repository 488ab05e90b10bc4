use thiserror::Error;

/// Rejections raised while interpreting page keys and stored zone settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid page key `{0}`")]
    InvalidPageKey(String),
    #[error("unknown background source kind `{0}`")]
    UnknownSourceKind(String),
}
