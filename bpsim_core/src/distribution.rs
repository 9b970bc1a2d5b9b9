//! Distribution sampler.
//!
//! Maps a distribution spec plus a [`UniformSource`] to a variate. Sampling
//! never fails: a spec that cannot be understood becomes
//! [`Distribution::Unsupported`] and samples as `0.0`, so one bad entry in a
//! configuration degrades a single duration instead of aborting the batch.
//!
//! Every variant consumes a fixed number of uniform draws (see
//! [`Distribution::draws`]). Editing one distribution's parameters therefore
//! never shifts the random stream seen by the rest of a replication.

use std::f64::consts::PI;

use bpsim_env::UniformSource;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Floor applied to uniform draws that feed a logarithm.
const LOG_EPSILON: f64 = 1e-12;

/// A sampling distribution for durations and delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Distribution {
    /// Always `value`
    Fixed { value: f64 },

    /// `min + (max - min) * u`
    Uniform { min: f64, max: f64 },

    /// Inverse-CDF exponential with the given mean
    Exponential { mean: f64 },

    /// Box–Muller normal, truncated at zero
    Normal { mean: f64, sd: f64 },

    /// Missing, unknown or malformed spec; samples as zero
    Unsupported,
}

impl Default for Distribution {
    fn default() -> Self {
        Distribution::Fixed { value: 0.0 }
    }
}

impl Distribution {
    pub fn fixed(value: f64) -> Self {
        Distribution::Fixed { value }
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Distribution::Uniform { min, max }
    }

    pub fn exponential(mean: f64) -> Self {
        Distribution::Exponential { mean }
    }

    pub fn normal(mean: f64, sd: f64) -> Self {
        Distribution::Normal { mean, sd }
    }

    /// Draws one variate.
    pub fn sample<R: UniformSource + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Fixed { value } => value,
            Distribution::Uniform { min, max } => min + (max - min) * rng.next_f64(),
            Distribution::Exponential { mean } => {
                let u = rng.next_f64().max(LOG_EPSILON);
                -u.ln() * mean
            }
            Distribution::Normal { mean, sd } => {
                let u1 = rng.next_f64().max(LOG_EPSILON);
                let u2 = rng.next_f64();
                let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
                (mean + sd * z0).max(0.0)
            }
            Distribution::Unsupported => 0.0,
        }
    }

    /// Number of uniform draws one call to [`sample`](Self::sample) consumes.
    pub fn draws(&self) -> usize {
        match self {
            Distribution::Fixed { .. } | Distribution::Unsupported => 0,
            Distribution::Uniform { .. } | Distribution::Exponential { .. } => 1,
            Distribution::Normal { .. } => 2,
        }
    }

    /// The value of a draw-free distribution.
    pub fn constant(&self) -> Option<f64> {
        match *self {
            Distribution::Fixed { value } => Some(value),
            Distribution::Unsupported => Some(0.0),
            _ => None,
        }
    }

    /// Lenient conversion from a JSON spec.
    fn from_spec(spec: &Map<String, Value>) -> Self {
        let num = |key: &str| spec.get(key).and_then(number);
        match spec.get("type").and_then(Value::as_str) {
            Some("fixed") => Distribution::Fixed {
                value: num("value").unwrap_or(0.0),
            },
            Some("uniform") => {
                let min = num("min").unwrap_or(0.0);
                Distribution::Uniform {
                    min,
                    max: num("max").unwrap_or(min),
                }
            }
            Some("exponential") => Distribution::Exponential {
                mean: num("mean").unwrap_or(1.0),
            },
            Some("normal") => Distribution::Normal {
                mean: num("mean").unwrap_or(0.0),
                sd: num("sd").unwrap_or(1.0),
            },
            _ => Distribution::Unsupported,
        }
    }
}

/// Reads a finite JSON number or numeric string.
pub(crate) fn number(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    x.filter(|x: &f64| x.is_finite())
}

impl From<Value> for Distribution {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(spec) => Distribution::from_spec(&spec),
            _ => Distribution::Unsupported,
        }
    }
}

impl From<Distribution> for Value {
    fn from(dist: Distribution) -> Self {
        match dist {
            Distribution::Fixed { value } => json!({"type": "fixed", "value": value}),
            Distribution::Uniform { min, max } => json!({"type": "uniform", "min": min, "max": max}),
            Distribution::Exponential { mean } => json!({"type": "exponential", "mean": mean}),
            Distribution::Normal { mean, sd } => json!({"type": "normal", "mean": mean, "sd": sd}),
            Distribution::Unsupported => json!({"type": "unsupported"}),
        }
    }
}
