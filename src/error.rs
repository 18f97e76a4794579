/// Error surfaced at the binary boundary: an exit code plus a one-line message.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures raised by the DEA engine itself.
///
/// `DataValidation` and `ModelInfeasible` abort a run. `SolverFailure` is
/// normally recorded per DMU inside the run result rather than returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeaError {
    #[error("data validation failed: {0}")]
    DataValidation(String),

    #[error("model infeasible for DMU '{dmu}': {detail}")]
    ModelInfeasible { dmu: String, detail: String },

    #[error("solver failure for DMU '{dmu}': {detail}")]
    SolverFailure { dmu: String, detail: String },
}

impl DeaError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeaError::DataValidation(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            DeaError::DataValidation(_) => 2,
            DeaError::ModelInfeasible { .. } | DeaError::SolverFailure { .. } => 4,
        }
    }
}

impl From<DeaError> for AppError {
    fn from(err: DeaError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dea_errors_map_to_exit_codes() {
        let app: AppError = DeaError::validation("row 1 (FR): zero in `x`").into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("zero in `x`"));

        let app: AppError = DeaError::ModelInfeasible {
            dmu: "FR".to_string(),
            detail: "solver reported infeasible".to_string(),
        }
        .into();
        assert_eq!(app.exit_code(), 4);
        assert!(app.to_string().contains("'FR'"));
    }
}
