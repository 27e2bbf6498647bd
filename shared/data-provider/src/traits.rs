use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::DataProviderError;

/// Which partition a dataset was constructed for. Resolved once at
/// construction; the harness draws demonstration pools from `Train` and
/// evaluation subsets from `Test`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Split {
    Train,
    Test,
}

/// Handle to an image on disk. The harness only routes these; opening and
/// preprocessing the pixels is the model's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
    pub path: PathBuf,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        ImageRef {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Task-specific payload of one dataset record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleBody {
    Question {
        question: String,
        answers: Vec<String>,
    },
    Caption {
        caption: String,
    },
    ClassLabel {
        class_name: String,
    },
}

/// One dataset record: an image reference, a task-specific text payload and a
/// stable identifier (image id, question id or class name). Immutable once
/// loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub image: ImageRef,
    #[serde(flatten)]
    pub body: SampleBody,
}

impl Sample {
    pub fn caption(&self) -> Option<&str> {
        match &self.body {
            SampleBody::Caption { caption } => Some(caption),
            _ => None,
        }
    }

    pub fn question(&self) -> Option<&str> {
        match &self.body {
            SampleBody::Question { question, .. } => Some(question),
            _ => None,
        }
    }

    pub fn answers(&self) -> Option<&[String]> {
        match &self.body {
            SampleBody::Question { answers, .. } => Some(answers),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match &self.body {
            SampleBody::ClassLabel { class_name } => Some(class_name),
            _ => None,
        }
    }
}

/// Random-access view over one split of a labeled dataset.
pub trait EvalDataset: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Sample, DataProviderError>;

    fn split(&self) -> Split;
}
