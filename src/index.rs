//! Exact nearest-neighbour index over fixed-dimension vectors.
//!
//! [`VectorIndex`] stores N vectors of dimension D as one contiguous
//! row-major `Vec<f32>`. Row *i* belongs to chunk *i* of the snapshot's chunk
//! sequence; the index never reorders rows.
//!
//! # Search
//!
//! Every query is compared against all N rows by squared Euclidean distance
//! (no square root, same ordering). A bounded max-heap keeps the best `k`
//! candidates, so a query costs O(N·D + N·log k). Results are ordered by
//! ascending distance; equal distances are ordered by row, so the row that
//! was inserted first wins.
//!
//! Exhaustive search is the intended design for corpora up to roughly a
//! million vectors. Past that an approximate structure would be needed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorIndex {
    dims: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index over all `vectors` at once.
    ///
    /// An empty input yields an empty index with dimension 0. Vectors of
    /// differing lengths are rejected with [`RagError::IndexCorrupt`].
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::default());
        };
        let dims = first.len();
        if dims == 0 {
            return Err(RagError::IndexCorrupt(
                "cannot index zero-dimension vectors".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dims * vectors.len());
        for (row, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(RagError::IndexCorrupt(format!(
                    "vector {} has dimension {}, expected {}",
                    row,
                    v.len(),
                    dims
                )));
            }
            data.extend_from_slice(v);
        }

        Ok(Self { dims, data })
    }

    /// Rebuild from a flat row-major buffer (used when loading snapshots).
    pub fn from_flat(dims: usize, data: Vec<f32>) -> Result<Self> {
        if dims == 0 {
            if !data.is_empty() {
                return Err(RagError::IndexCorrupt(
                    "zero dimension with non-empty vector data".to_string(),
                ));
            }
            return Ok(Self::default());
        }
        if data.len() % dims != 0 {
            return Err(RagError::IndexCorrupt(format!(
                "{} floats is not a whole number of {}-d rows",
                data.len(),
                dims
            )));
        }
        Ok(Self { dims, data })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.len() {
            return None;
        }
        let start = row * self.dims;
        Some(&self.data[start..start + self.dims])
    }

    pub(crate) fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Return the `k` nearest rows to `query` as `(row, squared_distance)`,
    /// closest first.
    ///
    /// Asking for more rows than stored returns every row. An empty index or
    /// `k == 0` returns an empty list.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let k = k.min(self.len());
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);

        for (row, vector) in self.data.chunks_exact(self.dims).enumerate() {
            let candidate = Candidate {
                distance: squared_l2(query, vector),
                row,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.row, c.distance))
            .collect())
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Heap entry ordered by distance, then row.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    row: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.row.cmp(&other.row))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}
