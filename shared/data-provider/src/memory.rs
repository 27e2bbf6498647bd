use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{DataProviderError, EvalDataset, Sample, Split};

/// In-memory dataset over an already-materialized list of samples. Datasets
/// with their own on-disk layouts are expected to parse themselves into this
/// form (or implement [`EvalDataset`] directly).
pub struct MemoryDataset {
    samples: Vec<Sample>,
    split: Split,
}

impl MemoryDataset {
    pub fn new(samples: Vec<Sample>, split: Split) -> Self {
        MemoryDataset { samples, split }
    }

    /// Loads a JSON manifest: an array of sample records.
    pub fn from_json_file(
        path: impl AsRef<Path>,
        split: Split,
    ) -> Result<Self, DataProviderError> {
        let reader = BufReader::new(File::open(path)?);
        let samples: Vec<Sample> = serde_json::from_reader(reader)?;
        Ok(MemoryDataset { samples, split })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl EvalDataset for MemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Result<Sample, DataProviderError> {
        self.samples
            .get(index)
            .cloned()
            .ok_or(DataProviderError::OutOfBounds {
                index,
                len: self.samples.len(),
            })
    }

    fn split(&self) -> Split {
        self.split
    }
}
