use anyhow::Result;
use egret_data_provider::ImageRef;

/// Beam-search decoding parameters, passed through to the model untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub length_penalty: f64,
}

/// A vision-language model that can decode free-form text from interleaved
/// image/text prompts. Image loading, preprocessing and the decoding
/// machinery itself all live behind this seam.
pub trait VisionLM: Send {
    /// Batched constrained decoding: one image sequence and one prompt string
    /// per batch item, one raw output string per item.
    fn generate(
        &mut self,
        batch_images: &[Vec<ImageRef>],
        batch_text: &[String],
        params: &GenerationParams,
    ) -> Result<Vec<String>>;
}

/// A [`VisionLM`] that additionally supports closed-set likelihood scoring:
/// priming on a fixed visual context and teacher-forced forward passes over
/// token sequences. Models without these capabilities simply don't implement
/// this trait, so handing one to the classification path is a type error
/// rather than a runtime probe.
pub trait ScoringVisionLM: VisionLM {
    /// Conditions subsequent [`ScoringVisionLM::score_tokens`] calls on this
    /// visual context. The encoded context is reused across every candidate
    /// scored against it.
    fn prime_visual_context(&mut self, images: &[ImageRef]) -> Result<()>;

    /// One forward pass (no generation): for every position of `tokens`,
    /// the model's probability distribution over its vocabulary.
    fn score_tokens(&mut self, tokens: &[i64]) -> Result<Vec<Vec<f32>>>;
}
