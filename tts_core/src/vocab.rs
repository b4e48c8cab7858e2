use std::fs;
use std::path::Path;

use ndarray::{Array2, Array3};

use crate::error::{Result, TtsError};
use crate::normalize::NormalizedText;

/// Id written to padded positions of a token row.
pub const PAD_ID: i64 = 0;
/// Id for code points beyond the end of the lookup table.
pub const UNKNOWN_ID: i64 = -1;

/// Maps code points to model token ids through a flat lookup table.
#[derive(Debug, Clone)]
pub struct VocabIndexer {
    table: Vec<i64>,
}

impl VocabIndexer {
    pub fn new(table: Vec<i64>) -> Self {
        Self { table }
    }

    /// Load the `unicode_indexer.json` asset (a JSON array of integers).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref()).map_err(|e| {
            TtsError::asset(format!("failed to read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let table: Vec<i64> = serde_json::from_slice(bytes)
            .map_err(|e| TtsError::asset(format!("vocabulary is not a JSON integer array: {e}")))?;
        if table.is_empty() {
            return Err(TtsError::asset("vocabulary table is empty"));
        }
        Ok(Self::new(table))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Token id for a single character.
    pub fn id_for(&self, c: char) -> i64 {
        self.table.get(c as usize).copied().unwrap_or(UNKNOWN_ID)
    }

    /// Encode a batch of texts into a zero-padded id matrix and its mask.
    ///
    /// Ids are `(batch, max_len)`, the mask `(batch, 1, max_len)`.
    pub fn encode(&self, texts: &[NormalizedText]) -> (Array2<i64>, Array3<f32>) {
        let lengths: Vec<usize> = texts.iter().map(|t| t.char_len()).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);

        let mut ids = Array2::<i64>::from_elem((texts.len(), max_len), PAD_ID);
        for (row, text) in texts.iter().enumerate() {
            for (col, c) in text.chars().enumerate() {
                ids[[row, col]] = self.id_for(c);
            }
        }

        (ids, length_to_mask(&lengths, max_len))
    }
}

/// `(batch, 1, max_len)` mask with ones over the first `lengths[i]` positions of row `i`.
pub fn length_to_mask(lengths: &[usize], max_len: usize) -> Array3<f32> {
    let mut mask = Array3::<f32>::zeros((lengths.len(), 1, max_len));
    for (i, &len) in lengths.iter().enumerate() {
        for j in 0..len.min(max_len) {
            mask[[i, 0, j]] = 1.0;
        }
    }
    mask
}
