//! Flat vector index over unit-length rows with exact top-k search.

use docqa_core::error::{Error, Result};
use std::cmp::Ordering;

const UNIT_TOLERANCE: f64 = 1e-3;

/// A vector of L2 norm 1. The only way to build one is [`UnitVector::normalize`],
/// so every row and query in the index has been normalized exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitVector(Vec<f32>);

impl UnitVector {
    pub fn normalize(mut raw: Vec<f32>) -> Result<Self> {
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(Error::Operation("embedding contains non-finite values".into()));
        }
        // f64 accumulation: squares of large f32 components overflow f32.
        let norm = raw.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(Error::Operation("cannot normalize a zero-length embedding".into()));
        }
        for x in &mut raw {
            *x = (f64::from(*x) / norm) as f32;
        }
        let check = raw.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
        if (check - 1.0).abs() > UNIT_TOLERANCE {
            return Err(Error::Operation(format!("embedding does not normalize to unit length (norm {check})")));
        }
        Ok(Self(raw))
    }

    pub fn dim(&self) -> usize { self.0.len() }

    pub fn as_slice(&self) -> &[f32] { &self.0 }
}

/// Dimensionality lifecycle of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexState {
    #[default]
    Uninitialized,
    Ready(usize),
}

impl IndexState {
    /// Transition to `Ready(dim)`. A populated index never changes dimensionality.
    pub fn ensure(self, dim: usize, rows: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("index dimensionality must be greater than zero".into()));
        }
        match self {
            Self::Uninitialized => Ok(Self::Ready(dim)),
            Self::Ready(d) if d == dim => Ok(self),
            Self::Ready(_) if rows == 0 => Ok(Self::Ready(dim)),
            Self::Ready(d) => Err(Error::DimensionalityMismatch { expected: d, actual: dim }),
        }
    }

    pub fn dim(self) -> Option<usize> {
        match self {
            Self::Uninitialized => None,
            Self::Ready(d) => Some(d),
        }
    }
}

/// Append-only, row-major storage of unit vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    state: IndexState,
    data: Vec<f32>,
    rows: usize,
}

impl VectorIndex {
    pub fn new() -> Self { Self::default() }

    pub fn create(&mut self, dim: usize) -> Result<()> {
        self.state = self.state.ensure(dim, self.rows)?;
        Ok(())
    }

    pub(crate) fn from_parts(dim: usize, data: Vec<f32>) -> Result<Self> {
        let state = IndexState::Uninitialized.ensure(dim, 0)?;
        if data.len() % dim != 0 {
            return Err(Error::PersistenceCorruption(format!(
                "index data length {} is not a multiple of dimensionality {dim}",
                data.len()
            )));
        }
        let rows = data.len() / dim;
        Ok(Self { state, data, rows })
    }

    pub fn state(&self) -> IndexState { self.state }

    pub fn dim(&self) -> Option<usize> { self.state.dim() }

    pub fn len(&self) -> usize { self.rows }

    pub fn is_empty(&self) -> bool { self.rows == 0 }

    pub(crate) fn raw(&self) -> &[f32] { &self.data }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let dim = self.dim()?;
        (row < self.rows).then(|| &self.data[row * dim..(row + 1) * dim])
    }

    /// Append rows in input order. All-or-nothing: a single bad vector rejects the batch.
    pub fn add(&mut self, vectors: &[UnitVector]) -> Result<()> {
        let Some(first) = vectors.first() else { return Ok(()) };
        let state = self.state.ensure(first.dim(), self.rows)?;
        let dim = first.dim();
        if let Some(bad) = vectors.iter().find(|v| v.dim() != dim) {
            return Err(Error::DimensionalityMismatch { expected: dim, actual: bad.dim() });
        }
        self.state = state;
        self.data.reserve(vectors.len() * dim);
        for v in vectors {
            self.data.extend_from_slice(v.as_slice());
        }
        self.rows += vectors.len();
        Ok(())
    }

    /// Top-k rows by descending inner product; equal scores keep insertion order.
    pub fn search(&self, query: &UnitVector, k: usize) -> Result<Vec<(usize, f32)>> {
        let Some(dim) = self.dim().filter(|_| self.rows > 0) else { return Err(Error::EmptyIndex) };
        if query.dim() != dim {
            return Err(Error::DimensionalityMismatch { expected: dim, actual: query.dim() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let q = query.as_slice();
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dim)
            .map(|row| row.iter().zip(q).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();
        scored.sort_by(|a, b| rank(a, b));
        scored.truncate(k);
        Ok(scored)
    }

    /// Drop every row at or after `rows`.
    pub(crate) fn truncate(&mut self, rows: usize) {
        if rows >= self.rows {
            return;
        }
        if let Some(dim) = self.dim() {
            self.data.truncate(rows * dim);
        }
        self.rows = rows;
    }
}

fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(raw: &[f32]) -> UnitVector { UnitVector::normalize(raw.to_vec()).expect("normalize") }

    #[test]
    fn normalize_yields_unit_length() {
        let v = unit(&[3.0, 4.0]);
        assert!((v.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((v.as_slice()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_and_nan() {
        assert!(UnitVector::normalize(vec![0.0, 0.0]).is_err());
        assert!(UnitVector::normalize(vec![f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn normalize_handles_extreme_magnitudes() {
        for raw in [vec![1e20_f32, 1e20], vec![f32::MAX, f32::MAX], vec![1e-40_f32, 0.0]] {
            let v = UnitVector::normalize(raw.clone()).expect("normalize");
            let norm = v.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "norm {norm} for {raw:?}");
        }
        let v = unit(&[1e20, 1e20]);
        assert!((v.as_slice()[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn ensure_transitions() {
        let s = IndexState::Uninitialized.ensure(4, 0).unwrap();
        assert_eq!(s, IndexState::Ready(4));
        assert_eq!(s.ensure(4, 10).unwrap(), IndexState::Ready(4));
        assert_eq!(s.ensure(8, 0).unwrap(), IndexState::Ready(8));
        assert!(matches!(
            s.ensure(8, 1),
            Err(Error::DimensionalityMismatch { expected: 4, actual: 8 })
        ));
        assert!(IndexState::Uninitialized.ensure(0, 0).is_err());
    }

    #[test]
    fn create_fails_on_populated_index_of_other_dim() {
        let mut idx = VectorIndex::new();
        idx.add(&[unit(&[1.0, 0.0])]).unwrap();
        assert!(idx.create(2).is_ok());
        assert!(matches!(idx.create(3), Err(Error::DimensionalityMismatch { .. })));
    }

    #[test]
    fn add_empty_is_noop() {
        let mut idx = VectorIndex::new();
        idx.add(&[]).unwrap();
        assert_eq!(idx.state(), IndexState::Uninitialized);
        assert!(idx.is_empty());
    }

    #[test]
    fn add_rejects_mixed_dims_without_mutating() {
        let mut idx = VectorIndex::new();
        idx.add(&[unit(&[1.0, 0.0])]).unwrap();
        let err = idx.add(&[unit(&[0.0, 1.0]), unit(&[1.0, 1.0, 1.0])]).unwrap_err();
        assert!(matches!(err, Error::DimensionalityMismatch { expected: 2, actual: 3 }));
        assert_eq!(idx.len(), 1);
        assert!(matches!(idx.add(&[unit(&[1.0, 1.0, 1.0])]), Err(Error::DimensionalityMismatch { .. })));
    }

    #[test]
    fn search_ranks_and_breaks_ties_by_row() {
        let mut idx = VectorIndex::new();
        idx.add(&[unit(&[0.0, 1.0]), unit(&[1.0, 0.0]), unit(&[1.0, 1.0]), unit(&[1.0, 0.0])]).unwrap();
        let hits = idx.search(&unit(&[1.0, 0.0]), 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(rows, vec![1, 3, 2]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_returns_all_rows_when_k_exceeds_len() {
        let mut idx = VectorIndex::new();
        idx.add(&[unit(&[1.0, 0.0]), unit(&[0.0, 1.0])]).unwrap();
        let hits = idx.search(&unit(&[0.0, 1.0]), 10).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 0]);
        assert!(idx.search(&unit(&[0.0, 1.0]), 0).unwrap().is_empty());
    }

    #[test]
    fn search_on_empty_index_is_an_error() {
        let mut idx = VectorIndex::new();
        assert!(matches!(idx.search(&unit(&[1.0]), 1), Err(Error::EmptyIndex)));
        idx.create(1).unwrap();
        assert!(matches!(idx.search(&unit(&[1.0]), 1), Err(Error::EmptyIndex)));
    }

    #[test]
    fn truncate_drops_tail_rows() {
        let mut idx = VectorIndex::new();
        idx.add(&[unit(&[1.0, 0.0]), unit(&[0.0, 1.0])]).unwrap();
        idx.truncate(1);
        assert_eq!(idx.len(), 1);
        assert!(idx.row(1).is_none());
        assert_eq!(idx.row(0).unwrap(), &[1.0, 0.0]);
    }
}
