use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use rand::distr::Alphanumeric;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use egret_data_provider::Sample;
use egret_modeling::VisionLM;

use crate::prompt::assemble_prompt;
use crate::sampler::select_demos;
use crate::traits::GenerationTask;
use crate::EvalError;

/// Runs the free-form generation path for one (shot count, seed) trial:
/// batched decoding over the evaluation subset, task post-processing, and a
/// corpus-scored pass over the accumulated prediction records. Returns the
/// scorer's scalar unchanged.
pub fn evaluate_generation(
    task: &dyn GenerationTask,
    model: &mut dyn VisionLM,
    eval_subset: &[Sample],
    query_pool: &[Sample],
    requested_shots: usize,
    batch_size: usize,
    demo_rng: &mut ChaCha8Rng,
    progress: bool,
) -> Result<f64, EvalError> {
    let pbar = progress.then(|| {
        info!("Running inference {task}");
        let pbar = ProgressBar::new(eval_subset.len() as u64);
        pbar.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"));
        pbar
    });

    let params = task.generation_params();
    let mut predictions: IndexMap<String, serde_json::Value> = IndexMap::new();

    for batch in eval_subset.chunks(batch_size.max(1)) {
        let demo_indices =
            select_demos(demo_rng, query_pool.len(), requested_shots, batch.len())?;

        let mut batch_images = Vec::with_capacity(batch.len());
        let mut batch_text = Vec::with_capacity(batch.len());
        for (query, indices) in batch.iter().zip(&demo_indices) {
            let demos: Vec<Sample> = indices.iter().map(|&i| query_pool[i].clone()).collect();
            let prompt = assemble_prompt(task, &demos, query, requested_shots)?;
            batch_images.push(prompt.images);
            batch_text.push(prompt.text);
        }

        let outputs = model
            .generate(&batch_images, &batch_text, &params)
            .map_err(EvalError::Model)?;
        if outputs.len() != batch.len() {
            return Err(EvalError::Model(anyhow::anyhow!(
                "model produced {} outputs for a batch of {}",
                outputs.len(),
                batch.len()
            )));
        }

        for (query, raw) in batch.iter().zip(outputs) {
            // A later duplicate identifier silently overwrites the earlier
            // record, preserving its position in the store.
            predictions.insert(
                task.prediction_key(query),
                task.prediction_record(query, &task.postprocess(&raw)),
            );
        }

        if let Some(pbar) = &pbar {
            pbar.inc(batch.len() as u64);
        }
    }
    if let Some(pbar) = &pbar {
        pbar.finish_and_clear();
    }

    let results_path = transient_results_path(task.slug());
    let records: Vec<&serde_json::Value> = predictions.values().collect();
    serde_json::to_writer_pretty(fs::File::create(&results_path)?, &records)?;
    info!(
        path = %results_path.display(),
        records = records.len(),
        "materialized predictions"
    );

    let score = task.scorer().score(&results_path, task.annotations_path());
    fs::remove_file(&results_path)?;
    score.map_err(EvalError::Scorer)
}

/// Collision-resistant transient file name, so concurrent evaluation runs
/// never clobber each other's prediction stores.
fn transient_results_path(slug: &str) -> PathBuf {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    std::env::temp_dir().join(format!("{slug}_results_{suffix}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_paths_are_unique_per_invocation() {
        let first = transient_results_path("coco");
        let second = transient_results_path("coco");
        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("coco_results_"));
    }
}
