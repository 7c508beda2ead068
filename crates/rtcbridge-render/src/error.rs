/// Errors surfaced by renderer operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No renderer is registered under the texture id.
    #[error("video renderer not found: {0}")]
    NotFound(i64),
}

impl RenderError {
    /// Stable kind name reported to the host.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::NotFound(_) => "NotFound",
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
