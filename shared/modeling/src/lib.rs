mod scripted;
mod tokenizer;
mod vision_lm;

pub use scripted::{ScriptedVisionLM, WordTokenizer};
pub use tokenizer::{PaddingSide, PromptTokenizer};
pub use vision_lm::{GenerationParams, ScoringVisionLM, VisionLM};
