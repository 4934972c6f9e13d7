use crate::error::IndexError;
use crate::models::Metric;
use crate::traits::VectorIndex;
use serde::{Deserialize, Serialize};

/// Exhaustive-scan index. Cosine mode stores unit vectors and scores by
/// inner product; L2 mode stores raw vectors and scores by squared distance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    metric: Metric,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(metric: Metric, dimension: usize) -> Self {
        Self {
            metric,
            dimension,
            vectors: Vec::new(),
        }
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &Vec<f32>> + '_ {
        self.vectors.iter()
    }

    pub(crate) fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn prepare(&self, vector: &[f32]) -> Vec<f32> {
        let mut prepared = vector.to_vec();
        if self.metric.normalizes() {
            l2_normalize(&mut prepared);
        }
        prepared
    }

    fn score(&self, stored: &[f32], query: &[f32]) -> f32 {
        match self.metric {
            Metric::L2 => stored
                .iter()
                .zip(query)
                .map(|(left, right)| (left - right) * (left - right))
                .sum(),
            Metric::Cosine => stored.iter().zip(query).map(|(left, right)| left * right).sum(),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn metric(&self) -> Metric {
        self.metric
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        for vector in vectors {
            self.check_dimension(vector)?;
        }
        let prepared = vectors
            .iter()
            .map(|vector| self.prepare(vector))
            .collect::<Vec<_>>();
        self.vectors.extend(prepared);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        self.check_dimension(query)?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.prepare(query);
        let mut scored = self
            .vectors
            .iter()
            .enumerate()
            .map(|(row, stored)| (row, self.score(stored, &query)))
            .collect::<Vec<_>>();

        match self.metric {
            Metric::L2 => scored.sort_by(|left, right| left.1.total_cmp(&right.1)),
            Metric::Cosine => scored.sort_by(|left, right| right.1.total_cmp(&left.1)),
        }
        scored.truncate(k);
        Ok(scored)
    }
}

/// Scales `vector` to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}
