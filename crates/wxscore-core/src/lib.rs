pub mod align;
pub mod artifact;
pub mod config;
pub mod error;
pub mod outputs;
pub mod pipeline;
pub mod scorer;
pub mod units;

pub use artifact::{load_artifact, ClassLabel, Classifier, ClassifierArtifact};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::{run_batch, score_batch, RunSummary, ScoredBatch};
