use thiserror::Error;

/// Classified failures for the try-on request path.
///
/// Every failure a caller can observe is one of these four kinds, and each
/// kind is terminal for the request that raised it: nothing in the core
/// retries on the caller's behalf. The service boundary maps each kind to a
/// fixed status code.
#[derive(Debug, Error)]
pub enum TryOnError {
    /// A request scalar was rejected before any image or model work started.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// An image payload could not be converted into a raster.
    #[error("image decode failed: {reason}")]
    Decode { reason: String },

    /// Moving pipeline weights on or off the accelerator failed.
    #[error("residency transition failed: {reason}")]
    Residency { reason: String },

    /// The generation pipeline failed while producing a result.
    #[error("generation failed: {reason}")]
    Generation { reason: String },
}

impl TryOnError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn residency(reason: impl Into<String>) -> Self {
        Self::Residency {
            reason: reason.into(),
        }
    }

    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    /// Stable kind tag used in logs and wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Decode { .. } => "decode",
            Self::Residency { .. } => "residency",
            Self::Generation { .. } => "generation",
        }
    }

    /// The offending field for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_fields_are_stable() {
        let err = TryOnError::validation("denoise_steps", "out of range");
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.field(), Some("denoise_steps"));
        assert_eq!(err.to_string(), "invalid denoise_steps: out of range");

        assert_eq!(TryOnError::decode("x").kind(), "decode");
        assert_eq!(TryOnError::residency("x").kind(), "residency");
        assert_eq!(TryOnError::generation("x").kind(), "generation");
        assert_eq!(TryOnError::generation("x").field(), None);
    }
}
