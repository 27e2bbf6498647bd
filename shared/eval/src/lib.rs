mod classification;
mod error;
mod generation;
mod harness;
mod prompt;
mod sampler;
mod tasks;
mod traits;

pub use classification::{evaluate_classification, ClassificationScores};
pub use error::EvalError;
pub use generation::evaluate_generation;
pub use harness::{EvalConfig, EvalReport, Harness, ShotResult, Task, TaskType};
pub use prompt::{assemble_prompt, Prompt, END_OF_EXAMPLE, IMAGE_TOKEN};
pub use sampler::{
    demo_rng_for_seed, effective_shots, gather, rng_for_seed, sample_disjoint, sample_indices,
    select_demos,
};
pub use tasks::{CaptioningTask, ImageClassificationTask, VqaTask};
pub use traits::{CorpusScorer, GenerationTask, LabelSetTask};
