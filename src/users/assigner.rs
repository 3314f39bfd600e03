use std::sync::Arc;

use rand::distributions::{Bernoulli, Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{check_distribution, check_probability, ValidationError};

use super::types::{UserClass, UserProfile};

/// Draws a class and a fraudster flag for each synthetic user.
#[derive(Debug, Clone)]
pub struct UserProfileAssigner {
    classes: Vec<Arc<UserClass>>,
    class_sampler: WeightedIndex<f64>,
    fraudster: Bernoulli,
    fraud_commit_probability: f64,
}

impl UserProfileAssigner {
    pub fn new(
        classes: Vec<UserClass>,
        class_probabilities: Vec<f64>,
        fraudster_probability: f64,
        fraud_commit_probability: f64,
    ) -> Result<Self, ValidationError> {
        if classes.is_empty() {
            return Err(ValidationError::EmptyClasses);
        }
        if classes.len() != class_probabilities.len() {
            return Err(ValidationError::LengthMismatch {
                what: "class probabilities",
                expected: classes.len(),
                actual: class_probabilities.len(),
            });
        }
        check_distribution("class probabilities", &class_probabilities)?;
        let fraudster_probability =
            check_probability("potential fraudster probability", fraudster_probability)?;
        let fraud_commit_probability =
            check_probability("fraud commit probability", fraud_commit_probability)?;

        let class_sampler = WeightedIndex::new(class_probabilities.iter().copied()).map_err(
            |_| ValidationError::DistributionSum {
                what: "class probabilities",
                sum: class_probabilities.iter().sum(),
            },
        )?;
        let fraudster = Bernoulli::new(fraudster_probability).map_err(|_| {
            ValidationError::ProbabilityOutOfRange {
                what: "potential fraudster probability",
                value: fraudster_probability,
            }
        })?;

        Ok(Self {
            classes: classes.into_iter().map(Arc::new).collect(),
            class_sampler,
            fraudster,
            fraud_commit_probability,
        })
    }

    /// Assign profiles to users `0..n_users`. The class draw and the fraudster
    /// draw for each user both come from `rng`, in that order.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        n_users: u64,
        rng: &mut R,
    ) -> Result<Vec<UserProfile>, ValidationError> {
        if n_users == 0 {
            return Err(ValidationError::ZeroCount("number of users"));
        }

        let profiles: Vec<UserProfile> = (0..n_users)
            .map(|user_id| {
                let class = self.classes[self.class_sampler.sample(rng)].clone();
                let potential_fraudster = self.fraudster.sample(rng);
                UserProfile {
                    user_id,
                    class,
                    potential_fraudster,
                    fraud_commit_probability: self.fraud_commit_probability,
                }
            })
            .collect();

        tracing::debug!(
            users = profiles.len(),
            fraudsters = profiles.iter().filter(|p| p.potential_fraudster).count(),
            "Assigned user profiles"
        );
        Ok(profiles)
    }
}
