use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use egret_data_provider::Sample;
use egret_modeling::GenerationParams;

use crate::prompt::{END_OF_EXAMPLE, IMAGE_TOKEN};
use crate::traits::{CorpusScorer, GenerationTask};
use crate::EvalError;

/// Image captioning, scored by an external corpus metric (CIDEr for COCO and
/// Flickr30k; the scorer's scalar is reported as-is).
pub struct CaptioningTask {
    name: &'static str,
    slug: &'static str,
    annotations: PathBuf,
    scorer: Box<dyn CorpusScorer>,
}

impl CaptioningTask {
    pub fn coco(annotations: impl Into<PathBuf>, scorer: Box<dyn CorpusScorer>) -> Self {
        CaptioningTask {
            name: "COCO",
            slug: "coco",
            annotations: annotations.into(),
            scorer,
        }
    }

    pub fn flickr30(annotations: impl Into<PathBuf>, scorer: Box<dyn CorpusScorer>) -> Self {
        CaptioningTask {
            name: "Flickr30k",
            slug: "flickr",
            annotations: annotations.into(),
            scorer,
        }
    }

    fn caption(&self, sample: &Sample) -> Result<String, EvalError> {
        sample
            .caption()
            .map(|caption| caption.trim().to_string())
            .ok_or_else(|| EvalError::WrongSampleKind {
                task: self.name.to_string(),
                expected: "caption",
                id: sample.id.clone(),
            })
    }
}

impl GenerationTask for CaptioningTask {
    fn slug(&self) -> &str {
        self.slug
    }

    fn demo_context(&self, sample: &Sample) -> Result<String, EvalError> {
        let caption = self.caption(sample)?;
        Ok(format!("{IMAGE_TOKEN}Output:{caption}{END_OF_EXAMPLE}"))
    }

    fn query_context(&self, _sample: &Sample) -> Result<String, EvalError> {
        Ok(format!("{IMAGE_TOKEN}Output:"))
    }

    fn postprocess(&self, raw: &str) -> String {
        // A continuation often rambles into the next example; cut at the
        // first "Output" it hallucinates.
        let truncated = match raw.find("Output") {
            Some(position) => &raw[..position],
            None => raw,
        };
        truncated.replace('"', "").trim().to_string()
    }

    fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_new_tokens: 20,
            num_beams: 3,
            length_penalty: -2.0,
        }
    }

    fn prediction_key(&self, sample: &Sample) -> String {
        sample.image.id.clone()
    }

    fn prediction_record(&self, sample: &Sample, output: &str) -> serde_json::Value {
        json!({"image_id": sample.image.id, "caption": output})
    }

    fn scorer(&self) -> &dyn CorpusScorer {
        self.scorer.as_ref()
    }

    fn annotations_path(&self) -> &Path {
        &self.annotations
    }
}

impl Display for CaptioningTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullScorer;

    impl CorpusScorer for NullScorer {
        fn score(&self, _results_path: &Path, _annotations_path: &Path) -> anyhow::Result<f64> {
            Ok(0.0)
        }
    }

    fn task() -> CaptioningTask {
        CaptioningTask::coco("/annotations/captions.json", Box::new(NullScorer))
    }

    #[test]
    fn postprocess_truncates_and_strips_quotes() {
        let task = task();
        assert_eq!(
            task.postprocess(" a \"red\" bus Output a second caption"),
            "a red bus"
        );
        assert_eq!(task.postprocess("a clean caption "), "a clean caption");
    }

    #[test]
    fn demo_context_trims_the_reference_caption() {
        let task = task();
        let sample = Sample {
            id: "img1".to_string(),
            image: egret_data_provider::ImageRef::new("img1", "/images/1.jpg"),
            body: egret_data_provider::SampleBody::Caption {
                caption: "  a cat on a mat ".to_string(),
            },
        };
        assert_eq!(
            task.demo_context(&sample).unwrap(),
            "<image>Output:a cat on a mat<|endofchunk|>"
        );
    }
}
