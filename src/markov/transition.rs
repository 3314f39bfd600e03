use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{ValidationError, PROBABILITY_TOLERANCE};

use super::vocabulary::{ActionId, ActionVocabulary};

/// A validated row-stochastic matrix over an action vocabulary.
///
/// Row `i` is the distribution over the next action given current action `i`.
/// Each row carries a precomputed categorical sampler so sampling never
/// rebuilds cumulative weights.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    name: String,
    rows: Vec<Vec<f64>>,
    samplers: Vec<WeightedIndex<f64>>,
}

/// Next-action distribution for one current action.
#[derive(Debug, Clone, Copy)]
pub struct NextActionDistribution<'a> {
    probabilities: &'a [f64],
    sampler: &'a WeightedIndex<f64>,
}

impl NextActionDistribution<'_> {
    pub fn probabilities(&self) -> &[f64] {
        self.probabilities
    }

    pub fn probability_of(&self, action: ActionId) -> f64 {
        self.probabilities.get(action.0).copied().unwrap_or(0.0)
    }
}

impl Distribution<ActionId> for NextActionDistribution<'_> {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionId {
        ActionId(self.sampler.sample(rng))
    }
}

impl TransitionModel {
    /// Build a model that permits the minimal `[start, end]` session.
    pub fn new(
        name: impl Into<String>,
        matrix: Vec<Vec<f64>>,
        vocabulary: &ActionVocabulary,
    ) -> Result<Self, ValidationError> {
        Self::with_options(name, matrix, vocabulary, true)
    }

    pub fn with_options(
        name: impl Into<String>,
        matrix: Vec<Vec<f64>>,
        vocabulary: &ActionVocabulary,
        allow_empty_sessions: bool,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let size = vocabulary.len();
        let start = vocabulary.start().index();
        let end = vocabulary.end().index();

        if matrix.len() != size {
            return Err(ValidationError::RowCountMismatch {
                model: name,
                expected: size,
                actual: matrix.len(),
            });
        }

        let mut samplers = Vec::with_capacity(size);
        for (row_idx, row) in matrix.iter().enumerate() {
            if row.len() != size {
                return Err(ValidationError::DimensionMismatch {
                    model: name,
                    expected: size,
                    row: row_idx,
                    actual: row.len(),
                });
            }

            for (col, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(ValidationError::InvalidProbability {
                        model: name,
                        row: row_idx,
                        col,
                        value,
                    });
                }
            }

            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(ValidationError::RowSum {
                    model: name,
                    row: row_idx,
                    sum,
                });
            }

            // The end row is never sampled, so it may point anywhere.
            if row_idx != end && row[start] > 0.0 {
                return Err(ValidationError::StartReentered {
                    model: name,
                    row: row_idx,
                });
            }

            // Rows sum to ~1 and are non-negative, so this cannot fail.
            let sampler = WeightedIndex::new(row.iter().copied()).map_err(|_| {
                ValidationError::RowSum {
                    model: name.clone(),
                    row: row_idx,
                    sum,
                }
            })?;
            samplers.push(sampler);
        }

        if !allow_empty_sessions && matrix[start][end] > 0.0 {
            return Err(ValidationError::EmptySessionForbidden { model: name });
        }

        Ok(Self {
            name,
            rows: matrix,
            samplers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of actions the model is defined over.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Distribution over the next action given `current`.
    ///
    /// Panics if `current` lies outside the vocabulary the model was built with.
    pub fn next_action_distribution(&self, current: ActionId) -> NextActionDistribution<'_> {
        NextActionDistribution {
            probabilities: &self.rows[current.0],
            sampler: &self.samplers[current.0],
        }
    }
}
