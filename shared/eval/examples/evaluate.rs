use anyhow::Result;
use clap::Parser;
use egret_data_provider::{ImageRef, MemoryDataset, Sample, SampleBody, Split};
use egret_eval::{
    EvalConfig, Harness, ImageClassificationTask, Task, TaskType, END_OF_EXAMPLE, IMAGE_TOKEN,
};
use egret_modeling::{ScriptedVisionLM, WordTokenizer};
use std::path::PathBuf;

/// Runs the shot x trial sweep on a synthetic three-class world with a
/// scripted model, to exercise the harness end to end without real weights.
#[derive(Parser, Debug, Clone)]
struct Args {
    #[arg(long, value_delimiter = ',', default_value = "0,2,4")]
    shots: Vec<usize>,

    #[arg(long, default_value_t = 1)]
    num_trials: usize,

    #[arg(long, value_delimiter = ',', default_value = "42")]
    trial_seeds: Vec<u64>,

    #[arg(long, default_value_t = 8)]
    num_samples: usize,

    #[arg(long, default_value_t = 16)]
    query_set_size: usize,

    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    /// JSON file to save results.
    #[arg(long)]
    results_file: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn class_sample(id: String, class_name: &str) -> Sample {
    Sample {
        image: ImageRef::new(id.clone(), format!("/images/{id}.jpg")),
        id,
        body: SampleBody::ClassLabel {
            class_name: class_name.to_string(),
        },
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let class_names = ["cat", "dog", "fish"];
    let train: Vec<Sample> = (0..24)
        .map(|i| class_sample(format!("train{i}"), class_names[i % 3]))
        .collect();
    let test: Vec<Sample> = (0..12)
        .map(|i| class_sample(format!("val{i}"), class_names[i % 3]))
        .collect();

    let mut tokenizer = WordTokenizer::new(&[IMAGE_TOKEN, END_OF_EXAMPLE]);
    let mut model = ScriptedVisionLM::new(256).with_background_prob(0.01);
    model.set_token_prob(tokenizer.token_id("cat"), 0.6);
    model.set_token_prob(tokenizer.token_id("dog"), 0.3);
    model.set_token_prob(tokenizer.token_id("fish"), 0.1);

    let task = Task::new(
        TaskType::LabelSet(Box::new(ImageClassificationTask::new(
            "toy-classification",
            class_names.iter().map(|name| name.to_string()).collect(),
        ))),
        Box::new(MemoryDataset::new(train, Split::Train)),
        Box::new(MemoryDataset::new(test, Split::Test)),
    )?;

    let harness = Harness::new(EvalConfig {
        shots: args.shots,
        num_trials: args.num_trials,
        trial_seeds: args.trial_seeds,
        num_samples: Some(args.num_samples),
        query_set_size: args.query_set_size,
        batch_size: args.batch_size,
        progress: !args.quiet,
    });

    let report = harness.run_tasks(&[task], &mut model, &mut tokenizer)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = &args.results_file {
        report.write_json(path)?;
    }
    Ok(())
}
