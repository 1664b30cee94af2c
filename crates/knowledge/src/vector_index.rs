//! Vector index abstraction and the flat squared-L2 implementation.
//!
//! The index is append-only. Entry `i` holds the embedding of the chunk at
//! position `i` in the chunk store.

use ragbasics_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAGIC: &[u8; 4] = b"RBIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;
const CHECKSUM_LEN: usize = 32;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Appending vectors, all-or-nothing, durable on return
/// - Exact top-k search by ascending distance
pub trait VectorIndex: Send + Sync {
    /// Append `vectors` in order. Nothing changes on error.
    fn add(&mut self, vectors: &[Vec<f32>]) -> AppResult<()>;

    /// The `top_k` nearest entries as `(position, distance)`, closest first.
    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(usize, f32)>>;

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bound dimension, `None` until the first vector is added.
    fn dimension(&self) -> Option<usize>;
}

/// Brute-force index persisted as a single checksummed file.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    path: PathBuf,
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Load the index at `path`, or start an empty one if the file is absent.
    pub fn create_or_open(path: &Path) -> AppResult<Self> {
        if path.exists() {
            return Self::open_existing(path);
        }

        tracing::debug!("No index at {:?}, starting empty", path);
        Ok(Self {
            path: path.to_path_buf(),
            dimension: None,
            data: Vec::new(),
        })
    }

    /// Load the index at `path`, failing if it does not exist.
    pub fn open_existing(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::IndexUnavailable(format!("Cannot read index {:?}: {}", path, e))
        })?;

        let (dimension, data) = decode(&bytes)
            .map_err(|reason| AppError::IndexUnavailable(format!("{:?}: {}", path, reason)))?;

        tracing::debug!(
            "Loaded index {:?} ({} entries, dimension {:?})",
            path,
            dimension.map_or(0, |d| data.len() / d),
            dimension
        );

        Ok(Self {
            path: path.to_path_buf(),
            dimension,
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check a batch against the bound dimension without changing anything.
    ///
    /// Returns the dimension the index will have after the batch is added.
    pub fn check(&self, vectors: &[Vec<f32>]) -> AppResult<Option<usize>> {
        let mut expected = self.dimension;

        for vector in vectors {
            match expected {
                Some(dim) if vector.len() != dim => {
                    return Err(AppError::DimensionMismatch {
                        expected: dim,
                        actual: vector.len(),
                    });
                }
                Some(_) => {}
                None => {
                    if vector.is_empty() {
                        return Err(AppError::DimensionMismatch {
                            expected: 1,
                            actual: 0,
                        });
                    }
                    expected = Some(vector.len());
                }
            }
        }

        Ok(expected)
    }

    fn entry(&self, position: usize, dim: usize) -> &[f32] {
        &self.data[position * dim..(position + 1) * dim]
    }
}

impl VectorIndex for FlatL2Index {
    fn add(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        let dimension = self.check(vectors)?;

        let added: usize = vectors.iter().map(Vec::len).sum();
        let mut data = Vec::with_capacity(self.data.len() + added);
        data.extend_from_slice(&self.data);
        for vector in vectors {
            data.extend_from_slice(vector);
        }

        write_atomic(&self.path, &encode(dimension, &data))?;

        self.dimension = dimension;
        self.data = data;

        tracing::debug!(
            "Appended {} vectors to {:?} ({} entries)",
            vectors.len(),
            self.path,
            self.len()
        );

        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<(usize, f32)>> {
        let dim = match self.dimension {
            Some(dim) if !self.data.is_empty() => dim,
            _ => return Err(AppError::EmptyIndex),
        };

        if query.len() != dim {
            return Err(AppError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|position| (position, squared_l2(query, self.entry(position, dim))))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k);

        Ok(scored)
    }

    fn len(&self) -> usize {
        match self.dimension {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn encode(dimension: Option<usize>, data: &[f32]) -> Vec<u8> {
    let dim = dimension.unwrap_or(0);
    let count = if dim == 0 { 0 } else { data.len() / dim };

    let mut bytes = Vec::with_capacity(HEADER_LEN + data.len() * 4 + CHECKSUM_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(dim as u32).to_le_bytes());
    bytes.extend_from_slice(&(count as u64).to_le_bytes());
    for &value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    let checksum = Sha256::digest(&bytes);
    bytes.extend_from_slice(&checksum);
    bytes
}

fn decode(bytes: &[u8]) -> Result<(Option<usize>, Vec<f32>), String> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(format!("file too short ({} bytes)", bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err("not an index file (bad magic)".to_string());
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", version));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if Sha256::digest(body).as_slice() != trailer {
        return Err("checksum mismatch".to_string());
    }

    let dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&bytes[12..20]);
    let count = u64::from_le_bytes(count_bytes);

    if count > 0 && dim == 0 {
        return Err(format!("{} entries with zero dimension", count));
    }

    let expected_len = usize::try_from(count)
        .ok()
        .and_then(|c| c.checked_mul(dim))
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| "entry count overflows".to_string())?;

    let payload = &body[HEADER_LEN..];
    if payload.len() != expected_len {
        return Err(format!(
            "expected {} payload bytes, found {}",
            expected_len,
            payload.len()
        ));
    }

    let data = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let dimension = if dim == 0 { None } else { Some(dim) };
    Ok((dimension, data))
}

/// Replace `path` with `bytes` via a synced temp file in the same directory
/// and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::Io(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn three_vectors() -> Vec<Vec<f32>> {
        vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]]
    }

    #[test]
    fn test_lookup_by_identity() {
        let temp = TempDir::new().unwrap();
        let mut index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        let vectors = vec![
            vec![0.3, -1.2, 4.0],
            vec![2.0, 2.0, 2.0],
            vec![-5.0, 0.5, 0.25],
            vec![0.3, -1.2, 4.5],
        ];
        index.add(&vectors).unwrap();

        for (i, v) in vectors.iter().enumerate() {
            let hits = index.search(v, 1).unwrap();
            assert_eq!(hits, vec![(i, 0.0)]);
        }
    }

    #[test]
    fn test_search_returns_all_when_k_exceeds_len() {
        let temp = TempDir::new().unwrap();
        let mut index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        index.add(&three_vectors()).unwrap();

        let hits = index.search(&[0.9, 0.1], 5).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 1);
        assert!(hits.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!((hits[0].1 - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_ties_prefer_lower_position() {
        let temp = TempDir::new().unwrap();
        let mut index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        index
            .add(&[vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]])
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.0).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_search_fails() {
        let temp = TempDir::new().unwrap();
        let index = FlatL2Index::create_or_open(&temp.path().join("index.bin")).unwrap();
        assert!(matches!(index.search(&[1.0], 3), Err(AppError::EmptyIndex)));
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");
        let mut index = FlatL2Index::create_or_open(&path).unwrap();
        index.add(&three_vectors()).unwrap();
        let before = std::fs::read(&path).unwrap();

        let result = index.add(&[vec![1.0, 1.0], vec![1.0, 1.0, 1.0]]);
        assert!(matches!(
            result,
            Err(AppError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(index.len(), 3);
        assert_eq!(std::fs::read(&path).unwrap(), before);

        let query = index.search(&[1.0, 1.0, 1.0], 1);
        assert!(matches!(query, Err(AppError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_mixed_dimensions_in_first_batch_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");
        let mut index = FlatL2Index::create_or_open(&path).unwrap();

        assert!(index.add(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert_eq!(index.dimension(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_persisted_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");
        let mut index = FlatL2Index::create_or_open(&path).unwrap();
        index.add(&three_vectors()).unwrap();
        index.add(&[vec![f32::MIN_POSITIVE, -0.0]]).unwrap();

        let reopened = FlatL2Index::open_existing(&path).unwrap();
        assert_eq!(reopened.len(), 4);
        assert_eq!(reopened.dimension(), Some(2));
        let bits = |data: &[f32]| data.iter().map(|f| f.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&reopened.data), bits(&index.data));
    }

    #[test]
    fn test_corruption_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.bin");
        let mut index = FlatL2Index::create_or_open(&path).unwrap();
        index.add(&three_vectors()).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[HEADER_LEN + 2] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            FlatL2Index::open_existing(&path),
            Err(AppError::IndexUnavailable(_))
        ));

        std::fs::write(&path, b"RBIX").unwrap();
        assert!(matches!(
            FlatL2Index::create_or_open(&path),
            Err(AppError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_open_existing_requires_file() {
        let temp = TempDir::new().unwrap();
        let result = FlatL2Index::open_existing(&temp.path().join("missing.bin"));
        assert!(matches!(result, Err(AppError::IndexUnavailable(_))));
    }
}
