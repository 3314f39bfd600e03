pub mod scheduler;

pub use scheduler::{user_stream_seed, FraudModel, ScheduleConfig, SessionScheduler};
