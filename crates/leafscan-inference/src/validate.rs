//! Heuristic exposure checks run before any classifier.
//!
//! This is a cheap necessary-not-sufficient filter: it catches unusable
//! photos (wrong shape, nearly black, blown out). Off-domain subjects are
//! left to the pipeline's confidence gate.

use std::fmt;

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decode::DecodedImage;

/// Brightness limits on a 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Images with mean brightness strictly below this are too dark.
    pub min_brightness: f64,
    /// Images with mean brightness strictly above this are overexposed.
    pub max_brightness: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_brightness: 30.0,
            max_brightness: 240.0,
        }
    }
}

impl ValidatorConfig {
    /// Build limits from optional overrides.
    ///
    /// Non-finite values are ignored, and an inverted pair falls back to the
    /// defaults.
    pub fn from_bounds(min_brightness: Option<f64>, max_brightness: Option<f64>) -> Self {
        let defaults = Self::default();
        let config = Self {
            min_brightness: min_brightness
                .filter(|v| v.is_finite())
                .unwrap_or(defaults.min_brightness),
            max_brightness: max_brightness
                .filter(|v| v.is_finite())
                .unwrap_or(defaults.max_brightness),
        };
        if config.min_brightness > config.max_brightness {
            warn!(
                min_brightness = config.min_brightness,
                max_brightness = config.max_brightness,
                "Brightness limits are inverted, using defaults"
            );
            return defaults;
        }
        config
    }
}

/// Why an image was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectionReason {
    InvalidFormat,
    TooDark { brightness: f64 },
    TooBright { brightness: f64 },
}

impl RejectionReason {
    /// User-facing guidance, returned verbatim by the API.
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::InvalidFormat => "Invalid image format. Please upload a color image.",
            RejectionReason::TooDark { .. } => "Image is too dark. Please upload a clearer photo.",
            RejectionReason::TooBright { .. } => {
                "Image is too bright/overexposed. Please upload a clearer photo."
            }
        }
    }

    /// Short tag for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InvalidFormat => "invalid_format",
            RejectionReason::TooDark { .. } => "too_dark",
            RejectionReason::TooBright { .. } => "too_bright",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of [`LeafImageValidator::check`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationVerdict {
    Accepted { brightness: f64 },
    Rejected(RejectionReason),
}

impl ValidationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationVerdict::Accepted { .. })
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            ValidationVerdict::Accepted { .. } => None,
            ValidationVerdict::Rejected(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeafImageValidator {
    config: ValidatorConfig,
}

impl LeafImageValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn check(&self, image: &DecodedImage) -> ValidationVerdict {
        let Some(means) = channel_means(image) else {
            return ValidationVerdict::Rejected(RejectionReason::InvalidFormat);
        };

        let brightness = means.iter().sum::<f64>() / 3.0;

        if brightness < self.config.min_brightness {
            return ValidationVerdict::Rejected(RejectionReason::TooDark { brightness });
        }
        if brightness > self.config.max_brightness {
            return ValidationVerdict::Rejected(RejectionReason::TooBright { brightness });
        }

        ValidationVerdict::Accepted { brightness }
    }
}

/// Mean intensity of the R, G and B channels, or `None` when the image is
/// not a non-empty 3-channel array.
pub fn channel_means(image: &DecodedImage) -> Option<[f64; 3]> {
    if image.channels() != 3 {
        return None;
    }
    let count = image.height() * image.width();
    if count == 0 {
        return None;
    }

    let mut means = [0.0; 3];
    for (c, mean) in means.iter_mut().enumerate() {
        let sum: u64 = image
            .pixels()
            .index_axis(Axis(2), c)
            .iter()
            .map(|&v| u64::from(v))
            .sum();
        *mean = sum as f64 / count as f64;
    }
    Some(means)
}
