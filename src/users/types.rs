use std::sync::Arc;

use crate::markov::TransitionModel;

/// A behavioral archetype bound to its own transition model.
#[derive(Debug, Clone)]
pub struct UserClass {
    pub name: String,
    pub model: Arc<TransitionModel>,
}

impl UserClass {
    pub fn new(name: impl Into<String>, model: Arc<TransitionModel>) -> Self {
        Self {
            name: name.into(),
            model,
        }
    }
}

/// A synthetic user. Created once at the start of a run and never mutated.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: u64,
    pub class: Arc<UserClass>,
    pub potential_fraudster: bool,
    /// Per-session probability of drawing from a fraud model. Only applied
    /// when `potential_fraudster` is set.
    pub fraud_commit_probability: f64,
}

impl UserProfile {
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Probability that any one session of this user comes from a fraud model.
    pub fn effective_fraud_probability(&self) -> f64 {
        if self.potential_fraudster {
            self.fraud_commit_probability
        } else {
            0.0
        }
    }
}
