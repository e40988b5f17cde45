//! Three-artifact persistence for the attraction index.
//!
//! One logical snapshot is stored as three files in the data directory:
//! - `attraction_vectors.bin`: the N x D matrix, row-major f32
//! - `attraction_meta.json`: N attraction records aligned with the rows
//! - `attraction_index.bin`: the search structure (per-row squared norms)
//!
//! Binary headers:
//! - vectors: version u8, model_id `[u8; 32]`, dimensions u16, count u64,
//!   CRC32 of the preceding fields (47 bytes total)
//! - index: version u8, dimensions u16, count u64, CRC32 (15 bytes total)
//!
//! Writes stage all three artifacts as temp files, fsync them, then rename.
//! A failure before the renames leaves the previous complete set loadable.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::attractions::AttractionRecord;
use crate::retrieval::index::VectorIndex;

/// Current artifact format version
const FORMAT_VERSION: u8 = 1;

/// version(1) + model_id(32) + dimensions(2) + count(8) + checksum(4)
const VECTORS_HEADER_SIZE: usize = 47;

/// version(1) + dimensions(2) + count(8) + checksum(4)
const INDEX_HEADER_SIZE: usize = 15;

const VECTORS_FILE: &str = "attraction_vectors.bin";
const META_FILE: &str = "attraction_meta.json";
const INDEX_FILE: &str = "attraction_index.bin";

/// Errors that can occur during artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid artifact format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: file version {0}, supported version {1}")]
    VersionMismatch(u8, u8),

    #[error("Model mismatch: artifacts were built with a different model")]
    ModelMismatch,

    #[error("Checksum mismatch: artifact may be corrupted")]
    ChecksumMismatch,

    #[error("Dimension mismatch: expected {expected}, artifact has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Misaligned artifacts: {vectors} vectors but {metadata} metadata records")]
    Misaligned { vectors: usize, metadata: usize },
}

#[derive(Debug)]
struct VectorsHeader {
    model_id: [u8; 32],
    dimensions: u16,
    count: u64,
}

#[derive(Debug)]
struct IndexHeader {
    dimensions: u16,
    count: u64,
}

/// Storage manager for the three index artifacts.
pub struct IndexStorage {
    dir: PathBuf,
}

impl IndexStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Persist a snapshot: matrix, metadata and index structure together.
    ///
    /// All three artifacts are staged as temp files first; the previous set
    /// stays loadable until every stage succeeded and the renames run.
    pub fn save(
        &self,
        index: &VectorIndex,
        meta: &[AttractionRecord],
        model_id: &[u8; 32],
    ) -> Result<(), IndexStorageError> {
        if meta.len() != index.len() {
            return Err(IndexStorageError::Misaligned {
                vectors: index.len(),
                metadata: meta.len(),
            });
        }

        std::fs::create_dir_all(&self.dir)?;

        let vectors_tmp = self.vectors_path().with_extension("tmp");
        let meta_tmp = self.meta_path().with_extension("tmp");
        let index_tmp = self.index_path().with_extension("tmp");

        let staged = self.stage_all(&vectors_tmp, &meta_tmp, &index_tmp, index, meta, model_id);
        if let Err(e) = staged {
            let _ = std::fs::remove_file(&vectors_tmp);
            let _ = std::fs::remove_file(&meta_tmp);
            let _ = std::fs::remove_file(&index_tmp);
            return Err(e);
        }

        // The vectors file renames last. It is the only artifact carrying
        // the model tag, so until it lands a reader still fails model
        // validation instead of pairing fresh meta with stale vectors when
        // counts and dimensions happen to coincide.
        std::fs::rename(&meta_tmp, self.meta_path())?;
        std::fs::rename(&index_tmp, self.index_path())?;
        std::fs::rename(&vectors_tmp, self.vectors_path())?;

        Ok(())
    }

    /// Load a snapshot, validating all three artifacts against each other.
    pub fn load(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(VectorIndex, Vec<AttractionRecord>), IndexStorageError> {
        let file = File::open(self.vectors_path())?;
        let mut reader = BufReader::new(file);
        let header = Self::read_vectors_header(&mut reader)?;
        Self::validate_vectors_header(&header, expected_model_id, expected_dimensions)?;

        let value_count = header.count as usize * header.dimensions as usize;
        let vectors = Self::read_f32s(&mut reader, value_count)?;

        let norms = self.load_norms(&header)?;
        let meta = self.load_meta()?;

        if meta.len() != header.count as usize {
            return Err(IndexStorageError::Misaligned {
                vectors: header.count as usize,
                metadata: meta.len(),
            });
        }

        let index = VectorIndex::from_parts(header.dimensions as usize, vectors, norms)
            .map_err(|e| IndexStorageError::InvalidFormat(e.to_string()))?;

        Ok((index, meta))
    }

    /// Number of persisted vectors, from headers only.
    ///
    /// Cheap staleness probe: validates headers and artifact presence
    /// without reading the matrix or parsing the metadata.
    pub fn stored_count(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<usize, IndexStorageError> {
        let file = File::open(self.vectors_path())?;
        let mut reader = BufReader::new(file);
        let header = Self::read_vectors_header(&mut reader)?;
        Self::validate_vectors_header(&header, expected_model_id, expected_dimensions)?;

        let file = File::open(self.index_path())?;
        let mut reader = BufReader::new(file);
        let index_header = Self::read_index_header(&mut reader)?;
        if index_header.count != header.count || index_header.dimensions != header.dimensions {
            return Err(IndexStorageError::InvalidFormat(
                "vector and index artifacts disagree".to_string(),
            ));
        }

        if !self.meta_path().exists() {
            return Err(IndexStorageError::InvalidFormat(
                "metadata artifact missing".to_string(),
            ));
        }

        Ok(header.count as usize)
    }

    /// True iff a snapshot is loadable and holds exactly `current_entry_count`
    /// vectors. Staleness is structural, not time-based.
    pub fn is_complete(
        &self,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
        current_entry_count: usize,
    ) -> bool {
        match self.stored_count(expected_model_id, expected_dimensions) {
            Ok(count) => count == current_entry_count,
            Err(e) => {
                log::debug!("index not loadable: {}", e);
                false
            }
        }
    }

    fn stage_all(
        &self,
        vectors_tmp: &Path,
        meta_tmp: &Path,
        index_tmp: &Path,
        index: &VectorIndex,
        meta: &[AttractionRecord],
        model_id: &[u8; 32],
    ) -> Result<(), IndexStorageError> {
        self.write_vectors(vectors_tmp, index, model_id)?;
        self.write_meta(meta_tmp, meta)?;
        self.write_index(index_tmp, index)?;
        Ok(())
    }

    fn write_vectors(
        &self,
        path: &Path,
        index: &VectorIndex,
        model_id: &[u8; 32],
    ) -> Result<(), IndexStorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header = [0u8; VECTORS_HEADER_SIZE];
        header[0] = FORMAT_VERSION;
        header[1..33].copy_from_slice(model_id);
        header[33..35].copy_from_slice(&(index.dimensions() as u16).to_le_bytes());
        header[35..43].copy_from_slice(&(index.len() as u64).to_le_bytes());
        let checksum = crc32fast::hash(&header[0..43]);
        header[43..47].copy_from_slice(&checksum.to_le_bytes());
        writer.write_all(&header)?;

        for position in 0..index.len() {
            for &value in index.row(position) {
                writer.write_all(&value.to_le_bytes())?;
            }
        }

        Self::flush_and_sync(writer)
    }

    fn write_meta(&self, path: &Path, meta: &[AttractionRecord]) -> Result<(), IndexStorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, meta)
            .map_err(|e| IndexStorageError::InvalidFormat(e.to_string()))?;
        Self::flush_and_sync(writer)
    }

    fn write_index(&self, path: &Path, index: &VectorIndex) -> Result<(), IndexStorageError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut header = [0u8; INDEX_HEADER_SIZE];
        header[0] = FORMAT_VERSION;
        header[1..3].copy_from_slice(&(index.dimensions() as u16).to_le_bytes());
        header[3..11].copy_from_slice(&(index.len() as u64).to_le_bytes());
        let checksum = crc32fast::hash(&header[0..11]);
        header[11..15].copy_from_slice(&checksum.to_le_bytes());
        writer.write_all(&header)?;

        for &norm in index.norms() {
            writer.write_all(&norm.to_le_bytes())?;
        }

        Self::flush_and_sync(writer)
    }

    fn flush_and_sync(mut writer: BufWriter<File>) -> Result<(), IndexStorageError> {
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        file.sync_all()?;
        Ok(())
    }

    fn load_norms(&self, vectors_header: &VectorsHeader) -> Result<Vec<f32>, IndexStorageError> {
        let file = File::open(self.index_path())?;
        let mut reader = BufReader::new(file);
        let header = Self::read_index_header(&mut reader)?;

        if header.dimensions != vectors_header.dimensions || header.count != vectors_header.count {
            return Err(IndexStorageError::InvalidFormat(
                "vector and index artifacts disagree".to_string(),
            ));
        }

        Self::read_f32s(&mut reader, header.count as usize)
    }

    fn load_meta(&self) -> Result<Vec<AttractionRecord>, IndexStorageError> {
        let file = File::open(self.meta_path())?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| IndexStorageError::InvalidFormat(e.to_string()))
    }

    fn read_vectors_header(
        reader: &mut BufReader<File>,
    ) -> Result<VectorsHeader, IndexStorageError> {
        let mut bytes = [0u8; VECTORS_HEADER_SIZE];
        reader.read_exact(&mut bytes)?;

        let version = bytes[0];
        if version > FORMAT_VERSION {
            return Err(IndexStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32::from_le_bytes([bytes[43], bytes[44], bytes[45], bytes[46]]);
        if stored_checksum != crc32fast::hash(&bytes[0..43]) {
            return Err(IndexStorageError::ChecksumMismatch);
        }

        let mut model_id = [0u8; 32];
        model_id.copy_from_slice(&bytes[1..33]);
        let dimensions = u16::from_le_bytes([bytes[33], bytes[34]]);
        let count = u64::from_le_bytes(bytes[35..43].try_into().unwrap_or_default());

        Ok(VectorsHeader {
            model_id,
            dimensions,
            count,
        })
    }

    fn read_index_header(reader: &mut BufReader<File>) -> Result<IndexHeader, IndexStorageError> {
        let mut bytes = [0u8; INDEX_HEADER_SIZE];
        reader.read_exact(&mut bytes)?;

        let version = bytes[0];
        if version > FORMAT_VERSION {
            return Err(IndexStorageError::VersionMismatch(version, FORMAT_VERSION));
        }

        let stored_checksum = u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);
        if stored_checksum != crc32fast::hash(&bytes[0..11]) {
            return Err(IndexStorageError::ChecksumMismatch);
        }

        let dimensions = u16::from_le_bytes([bytes[1], bytes[2]]);
        let count = u64::from_le_bytes(bytes[3..11].try_into().unwrap_or_default());

        Ok(IndexHeader { dimensions, count })
    }

    fn validate_vectors_header(
        header: &VectorsHeader,
        expected_model_id: &[u8; 32],
        expected_dimensions: usize,
    ) -> Result<(), IndexStorageError> {
        if header.model_id != *expected_model_id {
            return Err(IndexStorageError::ModelMismatch);
        }
        if header.dimensions as usize != expected_dimensions {
            return Err(IndexStorageError::DimensionMismatch {
                expected: expected_dimensions,
                got: header.dimensions as usize,
            });
        }
        Ok(())
    }

    fn read_f32s(
        reader: &mut BufReader<File>,
        count: usize,
    ) -> Result<Vec<f32>, IndexStorageError> {
        let mut values = Vec::with_capacity(count);
        let mut bytes = [0u8; 4];
        for _ in 0..count {
            reader.read_exact(&mut bytes)?;
            values.push(f32::from_le_bytes(bytes));
        }
        Ok(values)
    }
}
