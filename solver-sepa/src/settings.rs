//! Configuration settings for cut separation and selection.

use std::fmt;
use std::str::FromStr;

use crate::error::{SepaError, SepaResult};

/// Norm used to scale a cut's violation into its efficacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EfficacyNorm {
    /// Square root of the sum of squares.
    #[default]
    Euclidean,

    /// Largest absolute value.
    Maximum,

    /// Sum of absolute values.
    Sum,

    /// 1.0 if any entry is nonzero, 0.0 otherwise.
    Discrete,
}

impl EfficacyNorm {
    /// Parse the single-character parameter code (`e`, `m`, `s`, `d`).
    pub fn from_char(c: char) -> SepaResult<Self> {
        match c {
            'e' => Ok(Self::Euclidean),
            'm' => Ok(Self::Maximum),
            's' => Ok(Self::Sum),
            'd' => Ok(Self::Discrete),
            other => Err(SepaError::InvalidSettings(format!(
                "invalid efficacy norm '{}'",
                other
            ))),
        }
    }

    /// The parameter code for this norm.
    pub fn as_char(self) -> char {
        match self {
            Self::Euclidean => 'e',
            Self::Maximum => 'm',
            Self::Sum => 's',
            Self::Discrete => 'd',
        }
    }
}

impl FromStr for EfficacyNorm {
    type Err = SepaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => Err(SepaError::InvalidSettings(format!(
                "invalid efficacy norm '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for EfficacyNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Numerical tolerances shared by all cut computations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Absolute values below this are treated as zero.
    pub epsilon: f64,

    /// Zero tolerance for sums of products.
    pub sum_epsilon: f64,

    /// Relative feasibility tolerance.
    pub feastol: f64,

    /// Values at or above this magnitude are infinite.
    pub infinity: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            sum_epsilon: 1e-6,
            feastol: 1e-6,
            infinity: 1e20,
        }
    }
}

/// Weights of the individual criteria in the weighted cut score.
///
/// The defaults are experimental heuristics, not derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    /// Weight of the integral support.
    pub int_support: f64,

    /// Weight of the objective parallelism.
    pub obj_parallelism: f64,

    /// Weight of the efficacy.
    pub efficacy: f64,

    /// Weight of the adjusted directed cutoff distance.
    pub dir_cutoff_dist: f64,
}

impl ScoreWeights {
    /// Fixed weights used by the default score.
    pub const FIXED: ScoreWeights = ScoreWeights {
        int_support: 0.1,
        obj_parallelism: 0.1,
        efficacy: 0.6,
        dir_cutoff_dist: 0.5,
    };

    fn validate(&self) -> SepaResult<()> {
        let all = [
            ("int_support", self.int_support),
            ("obj_parallelism", self.obj_parallelism),
            ("efficacy", self.efficacy),
            ("dir_cutoff_dist", self.dir_cutoff_dist),
        ];
        for (name, w) in all {
            if !w.is_finite() || w < 0.0 {
                return Err(SepaError::InvalidSettings(format!(
                    "score weight {} must be finite and nonnegative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::FIXED
    }
}

/// Settings for the separation layer.
#[derive(Debug, Clone)]
pub struct SepaSettings {
    // === Efficacy ===
    /// Norm used for efficacy computation.
    pub efficacy_norm: EfficacyNorm,

    /// Minimal efficacy of a cut at non-root nodes.
    pub min_efficacy: f64,

    /// Minimal efficacy of a cut at the root node.
    pub min_efficacy_root: f64,

    // === Scoring ===
    /// Weights for the configurable weighted score.
    pub score_weights: ScoreWeights,

    /// Bonus added to the score of cuts stored in the global pool.
    pub pool_bonus: f64,

    /// Upper end of the tie-breaking jitter range.
    pub jitter: f64,

    /// Seed for the tie-breaking jitter (None = no jitter).
    pub random_seed: Option<u64>,

    // === Selection ===
    /// Maximum cuts applied per separation round.
    pub max_cuts_per_round: usize,

    /// Maximum cosine between two selected cuts.
    pub max_parallelism: f64,

    /// Add selected global cuts to the global pool.
    pub pool_global_cuts: bool,

    // === Pools ===
    /// Age limit of the global cut pool (negative = never evict).
    pub pool_age_limit: i32,

    /// Age limit of the delayed cut pool.
    pub delayed_pool_age_limit: i32,

    /// Age limit of the opt cut pool.
    pub opt_pool_age_limit: i32,

    // === Numerics ===
    /// Numerical tolerances.
    pub tolerances: Tolerances,
}

impl Default for SepaSettings {
    fn default() -> Self {
        Self {
            // Efficacy
            efficacy_norm: EfficacyNorm::default(),
            min_efficacy: 1e-4,
            min_efficacy_root: 1e-4,

            // Scoring
            score_weights: ScoreWeights::default(),
            pool_bonus: 1e-4,
            jitter: 1e-6,
            random_seed: None,

            // Selection
            max_cuts_per_round: 100,
            max_parallelism: 0.9999,
            pool_global_cuts: true,

            // Pools
            pool_age_limit: 100,
            delayed_pool_age_limit: 100,
            opt_pool_age_limit: 100,

            // Numerics
            tolerances: Tolerances::default(),
        }
    }
}

impl SepaSettings {
    /// Set the efficacy norm.
    pub fn with_efficacy_norm(mut self, norm: EfficacyNorm) -> Self {
        self.efficacy_norm = norm;
        self
    }

    /// Set both minimal efficacy thresholds.
    pub fn with_min_efficacy(mut self, root: f64, other: f64) -> Self {
        self.min_efficacy_root = root;
        self.min_efficacy = other;
        self
    }

    /// Enable seeded tie-breaking jitter.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the age limit of all three pools.
    pub fn with_pool_age_limit(mut self, limit: i32) -> Self {
        self.pool_age_limit = limit;
        self.delayed_pool_age_limit = limit;
        self.opt_pool_age_limit = limit;
        self
    }

    /// Set the score weights.
    pub fn with_score_weights(mut self, weights: ScoreWeights) -> Self {
        self.score_weights = weights;
        self
    }

    /// Check the settings once, before any cut is processed.
    pub fn validate(&self) -> SepaResult<()> {
        if !(self.min_efficacy.is_finite() && self.min_efficacy_root.is_finite()) {
            return Err(SepaError::InvalidSettings(
                "minimal efficacy must be finite".to_string(),
            ));
        }
        if !(self.pool_bonus >= 0.0 && self.jitter >= 0.0) {
            return Err(SepaError::InvalidSettings(
                "pool bonus and jitter must be nonnegative".to_string(),
            ));
        }
        if !(self.max_parallelism > 0.0 && self.max_parallelism <= 1.0) {
            return Err(SepaError::InvalidSettings(format!(
                "max_parallelism must be in (0, 1], got {}",
                self.max_parallelism
            )));
        }
        let tol = &self.tolerances;
        if !(tol.epsilon > 0.0 && tol.sum_epsilon > 0.0 && tol.feastol > 0.0) {
            return Err(SepaError::InvalidSettings(
                "tolerances must be positive".to_string(),
            ));
        }
        if !(tol.infinity > 1.0) {
            return Err(SepaError::InvalidSettings(
                "infinity must be larger than 1".to_string(),
            ));
        }
        self.score_weights.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_codes() {
        for norm in [
            EfficacyNorm::Euclidean,
            EfficacyNorm::Maximum,
            EfficacyNorm::Sum,
            EfficacyNorm::Discrete,
        ] {
            assert_eq!(EfficacyNorm::from_char(norm.as_char()).unwrap(), norm);
        }
        assert_eq!("m".parse::<EfficacyNorm>().unwrap(), EfficacyNorm::Maximum);
    }

    #[test]
    fn test_invalid_norm_rejected() {
        assert!(matches!(
            EfficacyNorm::from_char('x'),
            Err(SepaError::InvalidSettings(_))
        ));
        assert!("ee".parse::<EfficacyNorm>().is_err());
        assert!("".parse::<EfficacyNorm>().is_err());
    }

    #[test]
    fn test_default_settings_valid() {
        let s = SepaSettings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.score_weights, ScoreWeights::FIXED);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut s = SepaSettings::default();
        s.max_parallelism = 0.0;
        assert!(s.validate().is_err());

        let s = SepaSettings::default().with_score_weights(ScoreWeights {
            efficacy: -1.0,
            ..ScoreWeights::FIXED
        });
        assert!(s.validate().is_err());

        let mut s = SepaSettings::default();
        s.tolerances.epsilon = 0.0;
        assert!(s.validate().is_err());
    }
}
