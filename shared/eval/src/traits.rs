use std::fmt::Display;
use std::path::Path;

use egret_data_provider::Sample;
use egret_modeling::GenerationParams;

use crate::EvalError;

/// External corpus metric: reads a materialized JSON array of prediction
/// records and the ground-truth annotations, returns one scalar. Any
/// answer/caption normalization beyond the harness's post-processing is the
/// scorer's responsibility.
pub trait CorpusScorer: Send {
    fn score(&self, results_path: &Path, annotations_path: &Path) -> anyhow::Result<f64>;
}

/// A task evaluated by free-form decoding plus an external corpus metric.
pub trait GenerationTask: Send + Display {
    /// Short identifier used for transient result files and report keys.
    fn slug(&self) -> &str;

    /// One fully formatted demonstration: template, reference text,
    /// end-of-example marker.
    fn demo_context(&self, sample: &Sample) -> Result<String, EvalError>;

    /// The query's template with the answer portion omitted.
    fn query_context(&self, sample: &Sample) -> Result<String, EvalError>;

    /// Normalizes one raw decoded string: trimming plus truncation at the
    /// task's stop pattern.
    fn postprocess(&self, raw: &str) -> String;

    fn generation_params(&self) -> GenerationParams;

    /// Stable identifier the prediction store is keyed by.
    fn prediction_key(&self, sample: &Sample) -> String;

    /// One prediction record in the shape the corpus scorer expects.
    fn prediction_record(&self, sample: &Sample, output: &str) -> serde_json::Value;

    fn scorer(&self) -> &dyn CorpusScorer;

    fn annotations_path(&self) -> &Path;
}

/// A task evaluated by ranking a fixed label vocabulary on conditional joint
/// probability.
pub trait LabelSetTask: Send + Display {
    fn slug(&self) -> &str;

    /// Shared prompt prefix, e.g. `<image>A photo of a`.
    fn prompt_prefix(&self) -> &str;

    fn label_vocabulary(&self) -> &[String];
}
