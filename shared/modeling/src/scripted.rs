use anyhow::{bail, Result};
use egret_data_provider::ImageRef;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::{GenerationParams, PaddingSide, PromptTokenizer, ScoringVisionLM, VisionLM};

/// Deterministic stand-in model for exercising the evaluation stack without
/// any real weights. Generation replays queued batches; scoring assigns each
/// token id a fixed probability, position-independent, so a candidate's joint
/// score is the product of its tokens' table entries.
pub struct ScriptedVisionLM {
    vocab_size: usize,
    background_prob: f32,
    token_probs: HashMap<i64, f32>,
    generations: VecDeque<Vec<String>>,
    primed_contexts: Vec<Vec<ImageRef>>,
}

impl ScriptedVisionLM {
    pub fn new(vocab_size: usize) -> Self {
        ScriptedVisionLM {
            vocab_size,
            background_prob: 1e-3,
            token_probs: HashMap::new(),
            generations: VecDeque::new(),
            primed_contexts: Vec::new(),
        }
    }

    /// Probability assigned to every token id without an explicit entry.
    pub fn with_background_prob(mut self, prob: f32) -> Self {
        self.background_prob = prob;
        self
    }

    pub fn set_token_prob(&mut self, token: i64, prob: f32) {
        self.token_probs.insert(token, prob);
    }

    /// Queues the outputs for one future `generate` call.
    pub fn queue_generation(&mut self, outputs: Vec<String>) {
        self.generations.push_back(outputs);
    }

    /// Every visual context this model has been primed with, in order.
    pub fn primed_contexts(&self) -> &[Vec<ImageRef>] {
        &self.primed_contexts
    }
}

impl VisionLM for ScriptedVisionLM {
    fn generate(
        &mut self,
        batch_images: &[Vec<ImageRef>],
        batch_text: &[String],
        _params: &GenerationParams,
    ) -> Result<Vec<String>> {
        if batch_images.len() != batch_text.len() {
            bail!(
                "mismatched batch: {} image sequences, {} prompts",
                batch_images.len(),
                batch_text.len()
            );
        }
        let Some(outputs) = self.generations.pop_front() else {
            bail!("no scripted generation queued");
        };
        if outputs.len() != batch_text.len() {
            bail!(
                "scripted batch of {} outputs, asked for {}",
                outputs.len(),
                batch_text.len()
            );
        }
        Ok(outputs)
    }
}

impl ScoringVisionLM for ScriptedVisionLM {
    fn prime_visual_context(&mut self, images: &[ImageRef]) -> Result<()> {
        self.primed_contexts.push(images.to_vec());
        Ok(())
    }

    fn score_tokens(&mut self, tokens: &[i64]) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::with_capacity(tokens.len());
        for _ in tokens {
            let mut row = vec![self.background_prob; self.vocab_size];
            for (&token, &prob) in &self.token_probs {
                if let Some(slot) = row.get_mut(token as usize) {
                    *slot = prob;
                }
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Whitespace tokenizer that interns words on first sight. Markers such as
/// the image placeholder are split off as standalone tokens so prompt
/// boundaries survive concatenation. Encoding is deterministic for a fixed
/// call sequence, which is all the harness requires.
pub struct WordTokenizer {
    markers: Vec<String>,
    vocab: Mutex<HashMap<String, i64>>,
    padding_side: PaddingSide,
}

impl WordTokenizer {
    pub fn new(markers: &[&str]) -> Self {
        WordTokenizer {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            vocab: Mutex::new(HashMap::new()),
            padding_side: PaddingSide::Right,
        }
    }

    pub fn padding_side(&self) -> PaddingSide {
        self.padding_side
    }

    /// The id `encode` would assign to `word`, interning it if new.
    pub fn token_id(&self, word: &str) -> i64 {
        let mut vocab = self.vocab.lock().unwrap();
        let next = vocab.len() as i64;
        *vocab.entry(word.to_string()).or_insert(next)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.lock().unwrap().len()
    }
}

impl PromptTokenizer for WordTokenizer {
    fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<i64>> {
        let mut spaced = text.to_string();
        for marker in &self.markers {
            spaced = spaced.replace(marker, &format!(" {marker} "));
        }
        Ok(spaced
            .split_whitespace()
            .map(|word| self.token_id(word))
            .collect())
    }

    fn set_padding_side(&mut self, side: PaddingSide) {
        self.padding_side = side;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn word_tokenizer_splits_markers_and_is_stable() {
        let tokenizer = WordTokenizer::new(&["<image>", "<|endofchunk|>"]);
        let a = tokenizer
            .encode("<image>A photo of a cat<|endofchunk|><image>A photo of a", false)
            .unwrap();
        let b = tokenizer
            .encode("<image>A photo of a cat<|endofchunk|><image>A photo of a", false)
            .unwrap();
        assert_eq!(a, b);
        // "<image> A photo of a cat <|endofchunk|> <image> A photo of a"
        assert_eq!(a.len(), 12);
        assert_eq!(a[0], a[7]);
        assert_eq!(&a[0..5], &a[7..12]);
    }

    #[test]
    fn scripted_scoring_uses_token_table() {
        let mut model = ScriptedVisionLM::new(8).with_background_prob(0.01);
        model.set_token_prob(3, 0.5);
        let rows = model.score_tokens(&[1, 3, 2]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][3], 0.5);
        assert_eq!(rows[0][2], 0.01);
    }

    #[test]
    fn scripted_generation_replays_queued_batches() {
        let mut model = ScriptedVisionLM::new(8);
        model.queue_generation(vec!["a cat".to_string(), "a dog".to_string()]);
        let images = vec![Vec::new(), Vec::new()];
        let prompts = vec!["p1".to_string(), "p2".to_string()];
        let params = GenerationParams {
            max_new_tokens: 20,
            num_beams: 3,
            length_penalty: -2.0,
        };
        let out = model.generate(&images, &prompts, &params).unwrap();
        assert_eq!(out, vec!["a cat".to_string(), "a dog".to_string()]);
        assert!(model.generate(&images, &prompts, &params).is_err());
    }
}
