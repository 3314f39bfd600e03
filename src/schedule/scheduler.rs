use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use crate::dataset::types::{Session, SessionFailure, SessionSource, UserBatch};
use crate::error::{GenerationError, ValidationError};
use crate::markov::{ChainSimulator, TransitionModel};
use crate::users::UserProfile;

/// A shared model of anomalous behavior, independent of user class.
#[derive(Debug, Clone)]
pub struct FraudModel {
    pub name: String,
    pub model: Arc<TransitionModel>,
    /// Relative share of the fraud mass. Normalized across all fraud models.
    pub weight: f64,
}

/// How many sessions to draw per user, and the seed their streams derive from.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub n_days: u32,
    pub sessions_per_day: u32,
    pub seed: u64,
}

/// Routes each session slot to the user's class model or a fraud model and
/// runs the chain simulator on it.
#[derive(Debug, Clone)]
pub struct SessionScheduler {
    simulator: ChainSimulator,
    fraud_models: Vec<FraudModel>,
    fraud_shares: Vec<f64>,
    schedule: ScheduleConfig,
}

impl SessionScheduler {
    pub fn new(
        simulator: ChainSimulator,
        fraud_models: Vec<FraudModel>,
        schedule: ScheduleConfig,
    ) -> Result<Self, ValidationError> {
        if schedule.n_days == 0 {
            return Err(ValidationError::ZeroCount("number of days"));
        }
        if schedule.sessions_per_day == 0 {
            return Err(ValidationError::ZeroCount("sessions per user per day"));
        }

        for fraud in &fraud_models {
            if !fraud.weight.is_finite() || fraud.weight < 0.0 {
                return Err(ValidationError::ProbabilityOutOfRange {
                    what: "fraud model weight",
                    value: fraud.weight,
                });
            }
        }
        let total: f64 = fraud_models.iter().map(|f| f.weight).sum();
        if !fraud_models.is_empty() && total <= 0.0 {
            return Err(ValidationError::DistributionSum {
                what: "fraud model weights",
                sum: total,
            });
        }
        let fraud_shares = fraud_models.iter().map(|f| f.weight / total).collect();

        Ok(Self {
            simulator,
            fraud_models,
            fraud_shares,
            schedule,
        })
    }

    /// Mixing weights over `[class model, fraud model 0, fraud model 1, ...]`.
    pub fn mixing_weights(&self, profile: &UserProfile) -> Vec<f64> {
        let p = if self.fraud_models.is_empty() {
            0.0
        } else {
            profile.effective_fraud_probability()
        };

        let mut weights = Vec::with_capacity(1 + self.fraud_shares.len());
        weights.push(1.0 - p);
        weights.extend(self.fraud_shares.iter().map(|share| p * share));
        weights
    }

    /// Generate every session for one user.
    ///
    /// Session indices restart at zero each day. A slot whose simulation
    /// exceeds the step bound is recorded in `failures` and keeps its index.
    pub fn schedule_user(
        &self,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<UserBatch, GenerationError> {
        let mut rng = StdRng::seed_from_u64(user_stream_seed(self.schedule.seed, profile.user_id));
        let mixer = if profile.effective_fraud_probability() > 0.0 && !self.fraud_models.is_empty()
        {
            Some(
                WeightedIndex::new(self.mixing_weights(profile)).map_err(|_| {
                    ValidationError::DistributionSum {
                        what: "session mixing weights",
                        sum: self.mixing_weights(profile).iter().sum(),
                    }
                })?,
            )
        } else {
            None
        };

        let slots = (self.schedule.n_days as usize) * (self.schedule.sessions_per_day as usize);
        let mut sessions = Vec::with_capacity(slots);
        let mut failures = Vec::new();

        for day in 0..self.schedule.n_days {
            for session_index in 0..self.schedule.sessions_per_day {
                if cancel.is_cancelled() {
                    return Err(GenerationError::Cancelled);
                }

                let source = match &mixer {
                    Some(mixer) => match mixer.sample(&mut rng) {
                        0 => SessionSource::Normal,
                        n => SessionSource::Fraud { model: n - 1 },
                    },
                    None => SessionSource::Normal,
                };
                let model = match source {
                    SessionSource::Normal => &profile.class.model,
                    SessionSource::Fraud { model } => &self.fraud_models[model].model,
                };

                match self.simulator.simulate(model, &mut rng) {
                    Ok(actions) => sessions.push(Session {
                        user_id: profile.user_id,
                        day,
                        session_index,
                        actions,
                        source,
                    }),
                    Err(reason) => {
                        tracing::warn!(
                            user_id = profile.user_id,
                            day,
                            session_index,
                            model = model.name(),
                            error = %reason,
                            "Session simulation failed, recording slot as failed"
                        );
                        failures.push(SessionFailure {
                            user_id: profile.user_id,
                            day,
                            session_index,
                            reason,
                        });
                    }
                }
            }
        }

        Ok(UserBatch {
            profile: profile.clone(),
            sessions,
            failures,
        })
    }

    /// Generate sessions for a run of users, in the order given.
    pub fn schedule_users(
        &self,
        profiles: &[UserProfile],
        cancel: &CancellationToken,
    ) -> Result<Vec<UserBatch>, GenerationError> {
        profiles
            .iter()
            .map(|profile| self.schedule_user(profile, cancel))
            .collect()
    }
}

/// Seed of a user's private rng stream, derived from the run seed with the
/// splitmix64 finalizer so neighbouring user ids get unrelated streams.
pub fn user_stream_seed(seed: u64, user_id: u64) -> u64 {
    let mut z = seed ^ user_id.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
