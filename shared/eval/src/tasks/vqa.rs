use regex::Regex;
use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use egret_data_provider::{Sample, SampleBody};
use egret_modeling::GenerationParams;

use crate::prompt::{END_OF_EXAMPLE, IMAGE_TOKEN};
use crate::traits::{CorpusScorer, GenerationTask};
use crate::EvalError;

/// Open-ended visual question answering (VQAv2, OK-VQA). Demonstrations show
/// the first acceptable answer; the external scorer owns answer normalization
/// and returns accuracy on its 0-100 scale.
pub struct VqaTask {
    name: &'static str,
    slug: &'static str,
    annotations: PathBuf,
    scorer: Box<dyn CorpusScorer>,
    stop: Regex,
}

impl VqaTask {
    pub fn vqav2(annotations: impl Into<PathBuf>, scorer: Box<dyn CorpusScorer>) -> Self {
        Self::with_name("VQAv2", "vqav2", annotations, scorer)
    }

    pub fn ok_vqa(annotations: impl Into<PathBuf>, scorer: Box<dyn CorpusScorer>) -> Self {
        Self::with_name("OK-VQA", "ok_vqa", annotations, scorer)
    }

    fn with_name(
        name: &'static str,
        slug: &'static str,
        annotations: impl Into<PathBuf>,
        scorer: Box<dyn CorpusScorer>,
    ) -> Self {
        VqaTask {
            name,
            slug,
            annotations: annotations.into(),
            scorer,
            stop: Regex::new("Question|Answer").unwrap(),
        }
    }

    fn question_and_answers<'a>(
        &self,
        sample: &'a Sample,
    ) -> Result<(&'a str, &'a [String]), EvalError> {
        match &sample.body {
            SampleBody::Question { question, answers } => Ok((question, answers)),
            _ => Err(EvalError::WrongSampleKind {
                task: self.name.to_string(),
                expected: "question",
                id: sample.id.clone(),
            }),
        }
    }
}

impl GenerationTask for VqaTask {
    fn slug(&self) -> &str {
        self.slug
    }

    fn demo_context(&self, sample: &Sample) -> Result<String, EvalError> {
        let (question, answers) = self.question_and_answers(sample)?;
        let answer = answers.first().ok_or_else(|| EvalError::MissingAnswers {
            id: sample.id.clone(),
        })?;
        Ok(format!(
            "{IMAGE_TOKEN}Question:{question} Short answer:{answer}{END_OF_EXAMPLE}"
        ))
    }

    fn query_context(&self, sample: &Sample) -> Result<String, EvalError> {
        let (question, _) = self.question_and_answers(sample)?;
        Ok(format!("{IMAGE_TOKEN}Question:{question} Short answer:"))
    }

    fn postprocess(&self, raw: &str) -> String {
        let truncated = self.stop.splitn(raw, 2).next().unwrap_or(raw);
        truncated.trim().to_string()
    }

    fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_new_tokens: 5,
            num_beams: 3,
            length_penalty: -2.0,
        }
    }

    fn prediction_key(&self, sample: &Sample) -> String {
        sample.id.clone()
    }

    fn prediction_record(&self, sample: &Sample, output: &str) -> serde_json::Value {
        json!({"question_id": sample.id, "answer": output})
    }

    fn scorer(&self) -> &dyn CorpusScorer {
        self.scorer.as_ref()
    }

    fn annotations_path(&self) -> &Path {
        &self.annotations
    }
}

impl Display for VqaTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
