use serde::Serialize;

use crate::error::SimulationError;
use crate::markov::ActionId;
use crate::users::UserProfile;

/// Which model produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// The user's class model.
    Normal,
    /// A shared fraud model, by position in the scheduler's fraud model list.
    Fraud { model: usize },
}

impl SessionSource {
    pub fn is_fraud(&self) -> bool {
        matches!(self, Self::Fraud { .. })
    }
}

/// One simulated trajectory, stamped with its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    pub day: u32,
    pub session_index: u32,
    pub actions: Vec<ActionId>,
    pub source: SessionSource,
}

/// A (user, day, session) slot whose simulation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    pub user_id: u64,
    pub day: u32,
    pub session_index: u32,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: SimulationError,
}

fn serialize_reason<S: serde::Serializer>(
    reason: &SimulationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

/// Everything generated for one user, in generation order.
#[derive(Debug, Clone)]
pub struct UserBatch {
    pub profile: UserProfile,
    pub sessions: Vec<Session>,
    pub failures: Vec<SessionFailure>,
}

/// One row of the output dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub user_id: u64,
    pub day: u32,
    pub session_index: u32,
    pub session_activity: Vec<String>,
    pub user_role: String,
    pub potential_fraudster: bool,
    pub fraudulent_activity: bool,
}
