pub mod assembler;
pub mod types;

pub use assembler::{GeneratedLog, LogAssembler, LogSummary};
pub use types::{LogRecord, Session, SessionFailure, SessionSource, UserBatch};
