pub mod matrix_csv;
pub mod writer;

pub use matrix_csv::load_matrix_csv;
pub use writer::{write_failures, write_log, write_manifest, write_vocabulary, RunManifest};
