use std::collections::BTreeMap;

use serde::Serialize;

use crate::markov::ActionVocabulary;

use super::types::{LogRecord, SessionFailure, UserBatch};

/// The flat labeled dataset, in generation order.
#[derive(Debug, Clone, Default)]
pub struct GeneratedLog {
    pub records: Vec<LogRecord>,
    pub failures: Vec<SessionFailure>,
    pub users: u64,
    pub potential_fraudsters: u64,
}

/// Aggregate counts over a generated dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub records: u64,
    pub users: u64,
    pub potential_fraudsters: u64,
    pub fraudulent_sessions: u64,
    pub failed_sessions: u64,
    pub records_per_class: BTreeMap<String, u64>,
    pub mean_session_length: f64,
}

impl GeneratedLog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> LogSummary {
        let mut records_per_class = BTreeMap::new();
        let mut fraudulent_sessions = 0u64;
        let mut total_length = 0usize;

        for record in &self.records {
            *records_per_class
                .entry(record.user_role.clone())
                .or_insert(0u64) += 1;
            if record.fraudulent_activity {
                fraudulent_sessions += 1;
            }
            total_length += record.session_activity.len();
        }

        let mean_session_length = if self.records.is_empty() {
            0.0
        } else {
            total_length as f64 / self.records.len() as f64
        };

        LogSummary {
            records: self.records.len() as u64,
            users: self.users,
            potential_fraudsters: self.potential_fraudsters,
            fraudulent_sessions,
            failed_sessions: self.failures.len() as u64,
            records_per_class,
            mean_session_length,
        }
    }
}

/// Flattens per-user batches into [`LogRecord`]s.
pub struct LogAssembler<'a> {
    vocabulary: &'a ActionVocabulary,
}

impl<'a> LogAssembler<'a> {
    pub fn new(vocabulary: &'a ActionVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Concatenate batches in the order given. No reordering or aggregation.
    pub fn assemble(&self, batches: Vec<UserBatch>) -> GeneratedLog {
        let capacity = batches.iter().map(|b| b.sessions.len()).sum();
        let mut log = GeneratedLog {
            records: Vec::with_capacity(capacity),
            ..GeneratedLog::default()
        };

        for batch in batches {
            log.users += 1;
            if batch.profile.potential_fraudster {
                log.potential_fraudsters += 1;
            }

            let user_role = batch.profile.class_name().to_string();
            for session in batch.sessions {
                log.records.push(LogRecord {
                    user_id: session.user_id,
                    day: session.day,
                    session_index: session.session_index,
                    session_activity: self.vocabulary.tokens(&session.actions),
                    user_role: user_role.clone(),
                    potential_fraudster: batch.profile.potential_fraudster,
                    fraudulent_activity: session.source.is_fraud(),
                });
            }
            log.failures.extend(batch.failures);
        }

        log
    }
}
