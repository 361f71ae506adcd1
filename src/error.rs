use crate::lifecycle::LifecycleError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache could not subscribe to host lifecycle notifications.
    #[error("lifecycle registration failed: {0}")]
    Lifecycle(#[from] LifecycleError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
