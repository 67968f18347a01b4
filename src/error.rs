use thiserror::Error;

/// Errors raised while wiring or configuring a chart pipeline.
///
/// Both variants describe setup mistakes. Data queries never fail for
/// transient reasons since every transform runs over data that is already
/// in memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    /// An operation was overridden (or queried) before any implementation
    /// of it was installed.
    #[error("operation `{0}` has not been installed on this chart")]
    MissingOperation(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ChartError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ChartError>;
