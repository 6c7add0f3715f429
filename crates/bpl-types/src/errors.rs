use thiserror::Error;

/// Main error type for bpl-rs
#[derive(Error, Debug)]
pub enum BplError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for bpl-rs operations
pub type BplResult<T> = Result<T, BplError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::BplError::Validation(format!($($arg)*))
    };
}

/// Macro for creating model errors
#[macro_export]
macro_rules! model_error {
    ($($arg:tt)*) => {
        $crate::BplError::Model(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BplError::ShapeMismatch {
            name: "shapes".to_string(),
            expected: vec![3, 2],
            actual: vec![2, 2],
        };

        assert!(error.to_string().contains("Shape mismatch"));
        assert!(error.to_string().contains("shapes"));
        assert!(error.to_string().contains("[3, 2]"));
    }

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let bpl_error: BplError = io_error.into();

        match bpl_error {
            BplError::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(validation_err.to_string().contains("42"));
        let model_err = model_error!("score diverged");
        assert!(matches!(model_err, BplError::Model(_)));
    }
}
