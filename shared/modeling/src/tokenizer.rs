use anyhow::{anyhow, Result};
use tokenizers::{PaddingDirection, PaddingParams, Tokenizer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddingSide {
    Left,
    Right,
}

/// Deterministic text-to-token-ids encoding, as the evaluation paths consume
/// it. Token ids are widened to `i64` so they can index probability rows
/// directly.
pub trait PromptTokenizer: Send {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<i64>>;

    /// Batched generation pads on the left so the freshly decoded tokens line
    /// up at the end of each row; scoring paths set this before their loop.
    fn set_padding_side(&mut self, side: PaddingSide);
}

impl PromptTokenizer for Tokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<i64>> {
        let encoding = std::ops::Deref::deref(self)
            .encode(text, add_special_tokens)
            .map_err(|e| anyhow!("tokenizer encode failed: {e}"))?;
        Ok(encoding.get_ids().iter().map(|id| *id as i64).collect())
    }

    fn set_padding_side(&mut self, side: PaddingSide) {
        let direction = match side {
            PaddingSide::Left => PaddingDirection::Left,
            PaddingSide::Right => PaddingDirection::Right,
        };
        let mut params = self.get_padding().cloned().unwrap_or_default();
        params.direction = direction;
        self.with_padding(Some(params));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokenizers::models::wordlevel::WordLevel;
    use tokenizers::pre_tokenizers::whitespace::Whitespace;

    fn word_level_tokenizer(words: &[&str]) -> Tokenizer {
        let mut vocab: HashMap<String, u32> = HashMap::new();
        vocab.insert("<unk>".to_string(), 0);
        for (i, word) in words.iter().enumerate() {
            vocab.insert(word.to_string(), i as u32 + 1);
        }
        let model: tokenizers::models::ModelWrapper = WordLevel::builder()
            .vocab(vocab)
            .unk_token("<unk>".to_string())
            .build()
            .unwrap()
            .into();
        let mut tokenizer = Tokenizer::new(model);
        let pre_tokenizer: tokenizers::pre_tokenizers::PreTokenizerWrapper = Whitespace {}.into();
        tokenizer.with_pre_tokenizer(Some(pre_tokenizer));
        tokenizer
    }

    #[test]
    fn encode_is_deterministic_and_widened() {
        let tokenizer = word_level_tokenizer(&["a", "photo", "of"]);
        let first = PromptTokenizer::encode(&tokenizer, "a photo of a", false).unwrap();
        let second = PromptTokenizer::encode(&tokenizer, "a photo of a", false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![1, 2, 3, 1]);
    }

    #[test]
    fn padding_side_is_configurable() {
        let mut tokenizer = word_level_tokenizer(&["a"]);
        tokenizer.set_padding_side(PaddingSide::Left);
        assert_eq!(
            tokenizer.get_padding().unwrap().direction,
            PaddingDirection::Left
        );
        tokenizer.set_padding_side(PaddingSide::Right);
        assert_eq!(
            tokenizer.get_padding().unwrap().direction,
            PaddingDirection::Right
        );
    }
}
