use indicatif::{ProgressBar, ProgressStyle};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use egret_core::RunningAverage;
use egret_data_provider::{ImageRef, Sample};
use egret_modeling::{PaddingSide, PromptTokenizer, ScoringVisionLM};

use crate::prompt::END_OF_EXAMPLE;
use crate::sampler::select_demos;
use crate::traits::LabelSetTask;
use crate::EvalError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassificationScores {
    pub top1: f64,
    pub top5: f64,
}

/// Runs the closed-set likelihood path for one (shot count, seed) trial:
/// every candidate label is scored by the joint conditional probability of
/// its tokens under the primed visual context, candidates are ranked, and
/// top-1/top-5 hits accumulate against the configured sample budget.
///
/// Items are processed one at a time; only the label vocabulary is swept per
/// item. The reported accuracies divide by `sample_budget` even when the
/// evaluation subset ends earlier.
pub fn evaluate_classification(
    task: &dyn LabelSetTask,
    model: &mut dyn ScoringVisionLM,
    tokenizer: &mut dyn PromptTokenizer,
    eval_subset: &[Sample],
    query_pool: &[Sample],
    requested_shots: usize,
    sample_budget: usize,
    demo_rng: &mut ChaCha8Rng,
    progress: bool,
) -> Result<ClassificationScores, EvalError> {
    // Padding tokens belong on the left so generated/scored tokens line up at
    // the end of each row.
    tokenizer.set_padding_side(PaddingSide::Left);

    let prefix = task.prompt_prefix();
    let prefix_tokens = tokenizer.encode(prefix, false).map_err(EvalError::Tokenizer)?;
    let vocabulary = task.label_vocabulary();

    let pbar = progress.then(|| {
        info!("Running inference {task}");
        let pbar = ProgressBar::new(sample_budget.min(eval_subset.len()) as u64);
        pbar.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"));
        pbar
    });

    let results = RunningAverage::new();

    for (processed, query) in eval_subset.iter().enumerate() {
        let truth = query.class_name().ok_or_else(|| EvalError::WrongSampleKind {
            task: task.to_string(),
            expected: "class-label",
            id: query.id.clone(),
        })?;

        // A fresh demonstration set per item, from the trial's demo stream.
        let demo_indices = select_demos(demo_rng, query_pool.len(), requested_shots, 1)?;
        let demos: Vec<&Sample> = demo_indices[0].iter().map(|&i| &query_pool[i]).collect();

        // Demonstration images plus the query image form one visual context,
        // primed once and reused for every candidate label.
        let mut context_images: Vec<ImageRef> =
            demos.iter().map(|demo| demo.image.clone()).collect();
        context_images.push(query.image.clone());
        model
            .prime_visual_context(&context_images)
            .map_err(EvalError::Model)?;

        let mut context_text = String::new();
        for demo in &demos {
            let class_name = demo.class_name().ok_or_else(|| EvalError::WrongSampleKind {
                task: task.to_string(),
                expected: "class-label",
                id: demo.id.clone(),
            })?;
            context_text.push_str(&format!("{prefix} {class_name}{END_OF_EXAMPLE}"));
        }

        let mut ranked: Vec<(usize, f32)> = Vec::with_capacity(vocabulary.len());
        for (label_index, label) in vocabulary.iter().enumerate() {
            let full_text = format!("{context_text}{prefix} {label}");
            let tokens = tokenizer
                .encode(&full_text, true)
                .map_err(EvalError::Tokenizer)?;
            let rows = model.score_tokens(&tokens).map_err(EvalError::Model)?;
            if rows.len() + 1 < tokens.len() {
                return Err(EvalError::Model(anyhow::anyhow!(
                    "model returned {} probability rows for {} tokens",
                    rows.len(),
                    tokens.len()
                )));
            }

            // The distribution at position t predicts the token realized at
            // t + 1, so probabilities are read off against the sequence
            // shifted by one.
            let shifted = &tokens[1..];
            let mut realized = Vec::with_capacity(shifted.len());
            for (t, &token) in shifted.iter().enumerate() {
                let prob = rows[t].get(token as usize).copied().ok_or_else(|| {
                    EvalError::Model(anyhow::anyhow!(
                        "token {token} outside the model's scored vocabulary"
                    ))
                })?;
                realized.push(prob);
            }

            // The query prefix can recur inside a demonstration, so the
            // candidate's tokens start after its *last* occurrence.
            let start = find_last_subsequence(&prefix_tokens, shifted).ok_or(
                EvalError::PrefixNotAligned {
                    prefix_len: prefix_tokens.len(),
                    sequence_len: shifted.len(),
                },
            )?;
            let joint: f32 = realized[start + prefix_tokens.len()..].iter().product();
            ranked.push((label_index, joint));
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let top5: Vec<&str> = ranked
            .iter()
            .take(5)
            .map(|&(index, _)| vocabulary[index].as_str())
            .collect();

        results.push("acc1", if top5.first() == Some(&truth) { 1.0 } else { 0.0 });
        results.push("acc5", if top5.contains(&truth) { 1.0 } else { 0.0 });

        info!(
            item = processed + 1,
            budget = sample_budget,
            acc1 = results.sample("acc1").unwrap_or_default(),
            acc5 = results.sample("acc5").unwrap_or_default(),
            "classification progress"
        );
        if let Some(pbar) = &pbar {
            pbar.set_message(format!(
                "acc@1: {:.3} acc@5: {:.3}",
                results.sample("acc1").unwrap_or_default(),
                results.sample("acc5").unwrap_or_default()
            ));
            pbar.inc(1);
        }

        if processed + 1 >= sample_budget {
            break;
        }
    }
    if let Some(pbar) = &pbar {
        pbar.finish_and_clear();
    }

    Ok(ClassificationScores {
        top1: results.sum("acc1") / sample_budget as f64,
        top5: results.sum("acc5") / sample_budget as f64,
    })
}

/// Start index of the last occurrence of `needle` as a contiguous
/// subsequence of `haystack`.
fn find_last_subsequence(needle: &[i64], haystack: &[i64]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let mut last = None;
    for start in 0..=haystack.len() - needle.len() {
        if haystack[start] == needle[0] && haystack[start..start + needle.len()] == *needle {
            last = Some(start);
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsequence_search_takes_the_last_match() {
        let haystack = [5, 6, 7, 5, 6, 7, 9];
        let needle = [5, 6, 7];
        let start = find_last_subsequence(&needle, &haystack).unwrap();
        assert_eq!(start, 3);
        // Scored tokens begin right after the match.
        assert_eq!(start + needle.len(), 6);
    }

    #[test]
    fn subsequence_search_reports_missing_needles() {
        assert_eq!(find_last_subsequence(&[1, 2], &[2, 1, 3]), None);
        assert_eq!(find_last_subsequence(&[1, 2, 3], &[1, 2]), None);
        assert_eq!(find_last_subsequence(&[], &[1, 2]), None);
    }

    #[test]
    fn single_match_at_start_is_found() {
        assert_eq!(find_last_subsequence(&[5, 6], &[5, 6, 9]), Some(0));
    }

    use crate::sampler::demo_rng_for_seed;
    use crate::tasks::ImageClassificationTask;
    use crate::prompt::IMAGE_TOKEN;
    use egret_data_provider::SampleBody;
    use egret_modeling::{ScriptedVisionLM, WordTokenizer};

    fn class_sample(id: &str, class_name: &str) -> Sample {
        Sample {
            id: id.to_string(),
            image: ImageRef::new(id, format!("/images/{id}.jpg")),
            body: SampleBody::ClassLabel {
                class_name: class_name.to_string(),
            },
        }
    }

    fn scripted_world(
        labels: &[&str],
        probs: &[(&str, f32)],
    ) -> (ImageClassificationTask, ScriptedVisionLM, WordTokenizer) {
        let task = ImageClassificationTask::new(
            "toy",
            labels.iter().map(|label| label.to_string()).collect(),
        );
        let tokenizer = WordTokenizer::new(&[IMAGE_TOKEN, END_OF_EXAMPLE]);
        let mut model = ScriptedVisionLM::new(64).with_background_prob(0.01);
        for (word, prob) in probs {
            model.set_token_prob(tokenizer.token_id(word), *prob);
        }
        (task, model, tokenizer)
    }

    #[test]
    fn joint_probability_is_the_product_of_candidate_token_probs() {
        // "alpha beta" scores 0.5 * 0.4 = 0.2, ahead of "gamma" at 0.1.
        let (task, mut model, mut tokenizer) = scripted_world(
            &["alpha beta", "gamma"],
            &[("alpha", 0.5), ("beta", 0.4), ("gamma", 0.1)],
        );
        let query_pool = vec![class_sample("t1", "gamma"), class_sample("t2", "alpha beta")];
        let eval_subset = vec![class_sample("q1", "alpha beta")];
        let mut demo_rng = demo_rng_for_seed(0);

        let scores = evaluate_classification(
            &task,
            &mut model,
            &mut tokenizer,
            &eval_subset,
            &query_pool,
            1,
            1,
            &mut demo_rng,
            false,
        )
        .unwrap();
        assert_eq!(scores.top1, 1.0);
        assert_eq!(scores.top5, 1.0);
    }

    #[test]
    fn misranked_truth_scores_zero_top1() {
        let (task, mut model, mut tokenizer) = scripted_world(
            &["alpha beta", "gamma"],
            &[("alpha", 0.5), ("beta", 0.4), ("gamma", 0.9)],
        );
        let query_pool = vec![class_sample("t1", "gamma"), class_sample("t2", "alpha beta")];
        let eval_subset = vec![class_sample("q1", "alpha beta")];
        let mut demo_rng = demo_rng_for_seed(0);

        let scores = evaluate_classification(
            &task,
            &mut model,
            &mut tokenizer,
            &eval_subset,
            &query_pool,
            1,
            1,
            &mut demo_rng,
            false,
        )
        .unwrap();
        // Both labels still fit in the top five.
        assert_eq!(scores.top1, 0.0);
        assert_eq!(scores.top5, 1.0);
    }

    #[test]
    fn zero_shot_still_primes_demo_images() {
        let (task, mut model, mut tokenizer) =
            scripted_world(&["alpha"], &[("alpha", 0.5)]);
        let query_pool = vec![class_sample("t1", "alpha"), class_sample("t2", "alpha")];
        let eval_subset = vec![class_sample("q1", "alpha")];
        let mut demo_rng = demo_rng_for_seed(0);

        evaluate_classification(
            &task,
            &mut model,
            &mut tokenizer,
            &eval_subset,
            &query_pool,
            0,
            1,
            &mut demo_rng,
            false,
        )
        .unwrap();
        // Two clamped demonstrations plus the query.
        assert_eq!(model.primed_contexts().len(), 1);
        assert_eq!(model.primed_contexts()[0].len(), 3);
        assert_eq!(model.primed_contexts()[0][2].id, "q1");
    }

    #[test]
    fn unlocatable_prefix_fails_loudly() {
        let (task, mut model, mut tokenizer) =
            scripted_world(&["alpha"], &[("alpha", 0.5)]);
        let task = task.with_prompt_prefix("");
        let query_pool = vec![class_sample("t1", "alpha"), class_sample("t2", "alpha")];
        let eval_subset = vec![class_sample("q1", "alpha")];
        let mut demo_rng = demo_rng_for_seed(0);

        let err = evaluate_classification(
            &task,
            &mut model,
            &mut tokenizer,
            &eval_subset,
            &query_pool,
            1,
            1,
            &mut demo_rng,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::PrefixNotAligned { .. }));
    }
}
