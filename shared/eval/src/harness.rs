use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use egret_data_provider::{EvalDataset, Sample, Split};
use egret_modeling::{PromptTokenizer, ScoringVisionLM, VisionLM};

use crate::classification::evaluate_classification;
use crate::generation::evaluate_generation;
use crate::sampler::{demo_rng_for_seed, gather, sample_indices};
use crate::traits::{GenerationTask, LabelSetTask};
use crate::EvalError;

pub struct EvalConfig {
    /// Shot counts to sweep, in the order given.
    pub shots: Vec<usize>,
    pub num_trials: usize,
    /// Seeds for the trials; extended with generated seeds when shorter than
    /// `num_trials`, extra seeds beyond it are ignored.
    pub trial_seeds: Vec<u64>,
    /// Evaluation-subset size per trial; `None` evaluates the whole split.
    pub num_samples: Option<usize>,
    pub query_set_size: usize,
    pub batch_size: usize,
    pub progress: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            shots: vec![0, 4, 8, 16, 32],
            num_trials: 1,
            trial_seeds: vec![42],
            num_samples: Some(5000),
            query_set_size: 2048,
            batch_size: 8,
            progress: true,
        }
    }
}

pub enum TaskType {
    Generation(Box<dyn GenerationTask>),
    LabelSet(Box<dyn LabelSetTask>),
}

/// One configured task: its evaluation strategy plus the dataset pair it
/// draws from (query pools from the train split, evaluation subsets from the
/// test split).
pub struct Task {
    task_type: TaskType,
    train: Box<dyn EvalDataset>,
    test: Box<dyn EvalDataset>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(
        task_type: TaskType,
        train: Box<dyn EvalDataset>,
        test: Box<dyn EvalDataset>,
    ) -> Result<Self, EvalError> {
        if train.split() != Split::Train {
            return Err(EvalError::WrongSplit {
                expected: Split::Train,
                actual: train.split(),
            });
        }
        if test.split() != Split::Test {
            return Err(EvalError::WrongSplit {
                expected: Split::Test,
                actual: test.split(),
            });
        }
        Ok(Task {
            task_type,
            train,
            test,
        })
    }

    pub fn name(&self) -> String {
        match &self.task_type {
            TaskType::Generation(task) => task.to_string(),
            TaskType::LabelSet(task) => task.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ShotResult {
    pub shots: usize,
    pub trials: Vec<f64>,
    pub mean: f64,
}

/// Aggregate over all tasks: `{task_name: [{shots, trials, mean}, ...]}`.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct EvalReport {
    results: IndexMap<String, Vec<ShotResult>>,
}

impl EvalReport {
    pub fn results(&self) -> &IndexMap<String, Vec<ShotResult>> {
        &self.results
    }

    pub fn write_json(&self, path: &Path) -> Result<(), EvalError> {
        serde_json::to_writer(File::create(path)?, self)?;
        Ok(())
    }
}

/// Sweeps shot counts × trial seeds over a set of tasks, collecting one
/// scalar per trial and the per-shot mean.
pub struct Harness {
    config: EvalConfig,
    trial_seeds: Vec<u64>,
}

impl Harness {
    pub fn new(config: EvalConfig) -> Self {
        let trial_seeds = resolve_trial_seeds(&config.trial_seeds, config.num_trials);
        Harness {
            config,
            trial_seeds,
        }
    }

    /// The seeds trials actually use, including any generated extension.
    pub fn trial_seeds(&self) -> &[u64] {
        &self.trial_seeds
    }

    pub fn run_tasks<M: ScoringVisionLM>(
        &self,
        tasks: &[Task],
        model: &mut M,
        tokenizer: &mut dyn PromptTokenizer,
    ) -> Result<EvalReport, EvalError> {
        let mut report = EvalReport::default();
        for task in tasks {
            info!(task = %task.name(), "evaluating");
            let shot_results = match &task.task_type {
                TaskType::Generation(generation) => {
                    self.sweep_generation(generation.as_ref(), task, &mut *model)?
                }
                TaskType::LabelSet(label_set) => {
                    self.sweep_label_set(label_set.as_ref(), task, &mut *model, tokenizer)?
                }
            };
            report.results.insert(task.name(), shot_results);
        }
        Ok(report)
    }

    /// Generation-only entry point: usable with models that don't implement
    /// the scoring capabilities.
    pub fn sweep_generation(
        &self,
        generation: &dyn GenerationTask,
        task: &Task,
        model: &mut dyn VisionLM,
    ) -> Result<Vec<ShotResult>, EvalError> {
        self.sweep(|shots, seed| {
            let (eval_subset, query_pool) = self.draw_subsets(task, seed)?;
            let mut demo_rng = demo_rng_for_seed(seed);
            evaluate_generation(
                generation,
                &mut *model,
                &eval_subset,
                &query_pool,
                shots,
                self.config.batch_size,
                &mut demo_rng,
                self.config.progress,
            )
        })
    }

    fn sweep_label_set(
        &self,
        label_set: &dyn LabelSetTask,
        task: &Task,
        model: &mut dyn ScoringVisionLM,
        tokenizer: &mut dyn PromptTokenizer,
    ) -> Result<Vec<ShotResult>, EvalError> {
        self.sweep(|shots, seed| {
            let (eval_subset, query_pool) = self.draw_subsets(task, seed)?;
            let sample_budget = self.config.num_samples.unwrap_or(task.test.len());
            let mut demo_rng = demo_rng_for_seed(seed);
            let scores = evaluate_classification(
                label_set,
                &mut *model,
                &mut *tokenizer,
                &eval_subset,
                &query_pool,
                shots,
                sample_budget,
                &mut demo_rng,
                self.config.progress,
            )?;
            info!(task = %label_set, shots, seed, top5 = scores.top5, "top-5 accuracy");
            Ok(scores.top1)
        })
    }

    fn sweep(
        &self,
        mut run_trial: impl FnMut(usize, u64) -> Result<f64, EvalError>,
    ) -> Result<Vec<ShotResult>, EvalError> {
        let mut shot_results = Vec::with_capacity(self.config.shots.len());
        for &shots in &self.config.shots {
            let mut trials = Vec::with_capacity(self.config.num_trials);
            for (trial, &seed) in self
                .trial_seeds
                .iter()
                .take(self.config.num_trials)
                .enumerate()
            {
                let score = run_trial(shots, seed)?;
                info!(shots, trial, seed, score, "trial complete");
                trials.push(score);
            }
            let mean = if trials.is_empty() {
                0.0
            } else {
                trials.iter().sum::<f64>() / trials.len() as f64
            };
            info!(shots, mean, "shot sweep complete");
            shot_results.push(ShotResult {
                shots,
                trials,
                mean,
            });
        }
        Ok(shot_results)
    }

    fn draw_subsets(&self, task: &Task, seed: u64) -> Result<(Vec<Sample>, Vec<Sample>), EvalError> {
        let eval_count = self.config.num_samples.unwrap_or(task.test.len());
        let eval_indices = sample_indices(task.test.len(), eval_count, seed)?;
        let query_indices = sample_indices(task.train.len(), self.config.query_set_size, seed)?;
        Ok((
            gather(task.test.as_ref(), &eval_indices)?,
            gather(task.train.as_ref(), &query_indices)?,
        ))
    }
}

fn resolve_trial_seeds(seeds: &[u64], num_trials: usize) -> Vec<u64> {
    let mut resolved = seeds.to_vec();
    if resolved.len() < num_trials {
        let mut rng = rand::rng();
        let generated: Vec<u64> = (resolved.len()..num_trials)
            .map(|_| rng.random_range(0..1_000_000u64))
            .collect();
        warn!(
            provided = seeds.len(),
            requested = num_trials,
            ?generated,
            "fewer trial seeds than trials, appending generated seeds"
        );
        resolved.extend(&generated);
        info!(seeds = ?resolved, "trial seeds");
    }
    resolved
}
