use thiserror::Error;

/// Token failures. The variants are for logs only; callers collapse every
/// verification failure into a single "invalid" outcome.
#[derive(Debug, Error)]
pub enum Error {
    #[error("signing secret must be at least {0} bytes")]
    WeakSecret(usize),
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("failed to generate refresh token")]
    Entropy(#[source] rand::Error),
}

impl Error {
    pub(crate) fn from_verification(err: &jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            _ => Self::Malformed,
        }
    }
}
