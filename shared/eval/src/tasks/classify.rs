use std::fmt::Display;

use crate::prompt::IMAGE_TOKEN;
use crate::traits::LabelSetTask;

/// Closed-set image classification over a fixed label vocabulary, scored by
/// joint conditional probability rather than decoding.
pub struct ImageClassificationTask {
    name: String,
    slug: String,
    prompt_prefix: String,
    labels: Vec<String>,
}

impl ImageClassificationTask {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        let name = name.into();
        let slug = name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        ImageClassificationTask {
            name,
            slug,
            prompt_prefix: format!("{IMAGE_TOKEN}A photo of a"),
            labels,
        }
    }

    pub fn imagenet(labels: Vec<String>) -> Self {
        Self::new("ImageNet", labels)
    }

    pub fn with_prompt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prompt_prefix = prefix.into();
        self
    }
}

impl LabelSetTask for ImageClassificationTask {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn prompt_prefix(&self) -> &str {
        &self.prompt_prefix
    }

    fn label_vocabulary(&self) -> &[String] {
        &self.labels
    }
}

impl Display for ImageClassificationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
