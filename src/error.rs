use std::fmt;

/// Errors raised by the feature-engineering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    /// Invalid engineering parameters (e.g. a zero lag window).
    Configuration(String),
    /// Input table is unusable: missing columns, broken ordering, NaN odds.
    Data(String),
}

impl FeatureError {
    pub fn config(msg: impl Into<String>) -> Self {
        FeatureError::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        FeatureError::Data(msg.into())
    }
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            FeatureError::Data(msg) => write!(f, "data error: {msg}"),
        }
    }
}

impl std::error::Error for FeatureError {}
