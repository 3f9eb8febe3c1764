use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("workload of {requested} exceeds the budget of {budget}")]
    TooLarge { requested: u64, budget: u64 },

    #[error("invalid tax configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::invalid(format!("{name} must be >= 0, got {value}")));
    }
    Ok(())
}

pub(crate) fn ensure_fraction(name: &str, value: f64) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::invalid(format!(
            "{name} must be between 0 and 1, got {value}"
        )));
    }
    Ok(())
}
