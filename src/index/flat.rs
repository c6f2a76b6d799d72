//! Exhaustive squared-Euclidean (L2) vector index
//!
//! Vectors are stored contiguously in insertion order; a vector's position is
//! its identity. On disk the index is:
//!
//! ```text
//! magic "DMFLAT01" | dimension: u32 LE | count: u64 LE | count * dimension f32 LE
//! ```

use crate::error::{Error, Result};
use std::path::Path;

const MAGIC: &[u8; 8] = b"DMFLAT01";
const HEADER_LEN: usize = MAGIC.len() + 4 + 8;

/// A search result: vector position and its squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Flat index scanned in full for every query
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatL2Index {
    /// Create an empty index for vectors of the given width
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector and return its position
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector)?;
        let position = self.len();
        self.vectors.extend_from_slice(vector);
        Ok(position)
    }

    /// The `top_k` nearest vectors, closest first
    ///
    /// Equal distances are ordered by position so results are stable.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;

        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(top_k);

        Ok(neighbors)
    }

    /// Serialize to the binary layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Parse the binary layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::CorruptIndex("missing index header".to_string()));
        }

        let mut dim_bytes = [0u8; 4];
        dim_bytes.copy_from_slice(&bytes[8..12]);
        let dimension = u32::from_le_bytes(dim_bytes) as usize;

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        if dimension == 0 {
            return Err(Error::CorruptIndex("zero vector dimension".to_string()));
        }

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::CorruptIndex("vector count overflows".to_string()))?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(Error::CorruptIndex(format!(
                "expected {} bytes of vector data for {} x {}, found {}",
                expected,
                count,
                dimension,
                body.len()
            )));
        }

        let vectors = body
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, vectors })
    }

    /// Read an index written from [`FlatL2Index::to_bytes`]
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if self.dimension == 0 || vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Squared Euclidean distance between two equal-length vectors
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
