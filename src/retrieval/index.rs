//! In-memory flat vector index with exact L2 nearest-neighbor search.
//!
//! Vectors are stored positionally in a row-major matrix; row position is
//! the link to the metadata list persisted alongside. Squared row norms are
//! precomputed so search only needs one dot product per row.

/// A single search hit: matrix row position and its L2 distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    /// Row position, aligned with the metadata list
    pub position: usize,
    /// Euclidean distance (smaller is more similar)
    pub distance: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Misaligned index data: {vectors} vector values for {norms} norms at dimension {dimensions}")]
    Misaligned {
        vectors: usize,
        norms: usize,
        dimensions: usize,
    },
}

/// Exact L2 nearest-neighbor index over a fixed set of vectors.
pub struct VectorIndex {
    dimensions: usize,
    /// Row-major N x D matrix
    vectors: Vec<f32>,
    /// Precomputed squared L2 norm per row
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Build an index from per-row vectors.
    pub fn from_rows(dimensions: usize, rows: &[Vec<f32>]) -> Result<Self, IndexError> {
        let mut vectors = Vec::with_capacity(rows.len() * dimensions);
        let mut norms = Vec::with_capacity(rows.len());

        for row in rows {
            if row.len() != dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: dimensions,
                    got: row.len(),
                });
            }
            norms.push(row.iter().map(|x| x * x).sum());
            vectors.extend_from_slice(row);
        }

        Ok(Self {
            dimensions,
            vectors,
            norms,
        })
    }

    /// Reassemble an index from its persisted parts.
    pub fn from_parts(
        dimensions: usize,
        vectors: Vec<f32>,
        norms: Vec<f32>,
    ) -> Result<Self, IndexError> {
        if dimensions == 0 || vectors.len() != norms.len() * dimensions {
            return Err(IndexError::Misaligned {
                vectors: vectors.len(),
                norms: norms.len(),
                dimensions,
            });
        }

        Ok(Self {
            dimensions,
            vectors,
            norms,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    /// Matrix row at the given position.
    pub fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimensions;
        &self.vectors[start..start + self.dimensions]
    }

    /// Precomputed squared norms, one per row.
    pub fn norms(&self) -> &[f32] {
        &self.norms
    }

    /// Return the `k` nearest rows to `query` by L2 distance, ascending.
    ///
    /// Ties keep their insertion order, so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm: f32 = query.iter().map(|x| x * x).sum();

        let mut hits: Vec<ScoredHit> = (0..self.len())
            .map(|position| {
                let row = self.row(position);
                let dot: f32 = row.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                // ||x - q||^2 = ||x||^2 - 2 x.q + ||q||^2, clamped against
                // floating point cancellation
                let squared = (self.norms[position] - 2.0 * dot + query_norm).max(0.0);
                ScoredHit {
                    position,
                    distance: squared.sqrt(),
                }
            })
            .collect();

        // Stable sort preserves insertion order among equal distances
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}
