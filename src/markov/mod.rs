pub mod chain;
pub mod transition;
pub mod vocabulary;

pub use chain::ChainSimulator;
pub use transition::{NextActionDistribution, TransitionModel};
pub use vocabulary::{ActionId, ActionVocabulary};
