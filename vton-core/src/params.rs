use serde::{Deserialize, Serialize};

use crate::TryOnError;

/// Inclusive bounds accepted for `denoise_steps`.
pub const DENOISE_STEPS_MIN: u32 = 20;
pub const DENOISE_STEPS_MAX: u32 = 40;

/// Applied when the caller leaves the field out.
pub const DEFAULT_DENOISE_STEPS: u32 = 30;
pub const DEFAULT_SEED: u64 = 42;

/// Per-request scalars exactly as they arrive off the wire.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TryOnParams {
    pub garment_description: String,
    pub auto_mask: Option<bool>,
    pub auto_crop: Option<bool>,
    pub denoise_steps: Option<u32>,
    pub seed: Option<u64>,
}

/// Normalized scalars: every field concrete, bounds enforced.
///
/// Echoed back verbatim in responses so callers can trace what a result was
/// produced with.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TryOnOptions {
    pub garment_description: String,
    pub auto_mask: bool,
    pub auto_crop: bool,
    pub denoise_steps: u32,
    pub seed: u64,
}

impl TryOnParams {
    /// Checks bounds and fills defaults.
    ///
    /// This is the cheapest request stage and runs before any image decoding
    /// or accelerator work, so a bad integer never pays for either.
    pub fn validate(self) -> Result<TryOnOptions, TryOnError> {
        let denoise_steps = self.denoise_steps.unwrap_or(DEFAULT_DENOISE_STEPS);
        if !(DENOISE_STEPS_MIN..=DENOISE_STEPS_MAX).contains(&denoise_steps) {
            return Err(TryOnError::validation(
                "denoise_steps",
                format!("must be between {DENOISE_STEPS_MIN} and {DENOISE_STEPS_MAX}, got {denoise_steps}"),
            ));
        }

        let garment_description = self.garment_description.trim();
        if garment_description.is_empty() {
            return Err(TryOnError::validation("garment_description", "must not be empty"));
        }

        Ok(TryOnOptions {
            garment_description: garment_description.to_owned(),
            auto_mask: self.auto_mask.unwrap_or(true),
            auto_crop: self.auto_crop.unwrap_or(false),
            denoise_steps,
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(description: &str) -> TryOnParams {
        TryOnParams {
            garment_description: description.to_owned(),
            auto_mask: None,
            auto_crop: None,
            denoise_steps: None,
            seed: None,
        }
    }

    #[test]
    fn fills_documented_defaults() {
        let options = params("red t-shirt").validate().unwrap();
        assert!(options.auto_mask);
        assert!(!options.auto_crop);
        assert_eq!(options.denoise_steps, DEFAULT_DENOISE_STEPS);
        assert_eq!(options.seed, DEFAULT_SEED);
    }

    #[test]
    fn keeps_explicit_values() {
        let mut p = params("blue denim jacket");
        p.auto_mask = Some(false);
        p.auto_crop = Some(true);
        p.denoise_steps = Some(25);
        p.seed = Some(7);

        let options = p.validate().unwrap();
        assert!(!options.auto_mask);
        assert!(options.auto_crop);
        assert_eq!(options.denoise_steps, 25);
        assert_eq!(options.seed, 7);
    }

    #[test]
    fn step_bounds_are_inclusive() {
        let mut p = params("red t-shirt");
        p.denoise_steps = Some(DENOISE_STEPS_MIN);
        assert!(p.clone().validate().is_ok());
        p.denoise_steps = Some(DENOISE_STEPS_MAX);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn rejects_steps_outside_the_range() {
        for steps in [0, 19, 41, 1000] {
            let mut p = params("red t-shirt");
            p.denoise_steps = Some(steps);
            let err = p.validate().unwrap_err();
            assert!(matches!(err, TryOnError::Validation { field: "denoise_steps", .. }), "steps={steps}");
        }
    }

    #[test]
    fn rejects_blank_descriptions() {
        for description in ["", "   ", "\t\n"] {
            let err = params(description).validate().unwrap_err();
            assert!(matches!(err, TryOnError::Validation { field: "garment_description", .. }));
        }
    }

    #[test]
    fn trims_the_description() {
        let options = params("  red t-shirt ").validate().unwrap();
        assert_eq!(options.garment_description, "red t-shirt");
    }

    #[test]
    fn deserializes_with_absent_optionals() {
        let p: TryOnParams = serde_json::from_str(r#"{"garment_description":"denim jacket"}"#).unwrap();
        assert_eq!(p.garment_description, "denim jacket");
        assert_eq!(p.denoise_steps, None);
        assert_eq!(p.seed, None);
    }
}
