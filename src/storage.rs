//! The binary state file.
//!
//! A state file holds one 32-byte little-endian record:
//!
//! | Offset | Size | Field                                   |
//! | ------ | ---- | --------------------------------------- |
//! | 0      | 4    | format tag, always `4122`               |
//! | 4      | 4    | field flags                             |
//! | 8      | 8    | timestamp (ticks since the Unix epoch)  |
//! | 16     | 4    | clock sequence(s)                       |
//! | 20     | 6    | physical node id                        |
//! | 26     | 6    | random node id                          |
//!
//! Flag `0x02` marks a single clock sequence shared by both clock domains. Flags `0x1_0000` and
//! `0x2_0000` mark independent sequences for the physical (low 16 bits) and random (high 16
//! bits) domains and take precedence over `0x02`.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageErrorKind};

const FORMAT_TAG: i32 = 4122;
const RECORD_LEN: usize = 32;

const HAS_TIMESTAMP: i32 = 0x01;
const HAS_JOINT_SEQUENCE: i32 = 0x02;
const HAS_PHYSICAL_NODE: i32 = 0x04;
const HAS_RANDOM_NODE: i32 = 0x08;
const HAS_PHYSICAL_SEQUENCE: i32 = 0x01 << 16;
const HAS_RANDOM_SEQUENCE: i32 = 0x02 << 16;

/// Whether a storage failure happened while reading or writing.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StorageOperation {
    /// Loading the state file.
    Read,
    /// Saving the state file.
    Write,
}

/// A storage failure as delivered to the error listener.
#[derive(Debug)]
pub struct StorageEvent<'a> {
    /// The operation that failed.
    pub operation: StorageOperation,
    /// The state file involved.
    pub path: &'a Path,
    /// The underlying error.
    pub error: &'a StorageError,
}

/// The last storage failure, retrievable after the fact.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StorageFailure {
    /// The operation that failed.
    pub operation: StorageOperation,
    /// The state file involved.
    pub path: PathBuf,
    /// The classification of the error.
    pub kind: StorageErrorKind,
    /// The rendered error message.
    pub message: String,
}

/// Decoded contents of a state file. Absent fields are `None`.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct StateRecord {
    pub timestamp: Option<i64>,
    pub physical_sequence: Option<u16>,
    pub random_sequence: Option<u16>,
    pub physical_node_id: Option<[u8; 6]>,
    pub random_node_id: Option<[u8; 6]>,
}

impl StateRecord {
    pub(crate) fn load(path: &Path) -> Result<Self, StorageError> {
        let file = fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::FileNotFound(path.to_path_buf()),
            _ => StorageError::Io(e),
        })?;
        Self::decode(io::BufReader::new(file))
    }

    /// Writes the record to a temporary file next to `path` and renames it into place.
    pub(crate) fn store(&self, path: &Path) -> Result<(), StorageError> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&self.encode())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub(crate) fn decode<R: Read>(mut reader: R) -> Result<Self, StorageError> {
        let mut head = [0u8; 4];
        read_exact(&mut reader, &mut head)?;
        let tag = i32::from_le_bytes(head);
        if tag != FORMAT_TAG {
            return Err(StorageError::InvalidData(format!("unknown format tag {tag}")));
        }
        let mut body = [0u8; RECORD_LEN - 4];
        read_exact(&mut reader, &mut body)?;

        let flags = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&body[4..12]);
        let sequence = u32::from_le_bytes([body[12], body[13], body[14], body[15]]);
        let mut physical = [0u8; 6];
        physical.copy_from_slice(&body[16..22]);
        let mut random = [0u8; 6];
        random.copy_from_slice(&body[22..28]);

        let has = |flag: i32| flags & flag != 0;
        let (physical_sequence, random_sequence) = if flags >> 16 != 0 {
            (
                has(HAS_PHYSICAL_SEQUENCE).then_some(sequence as u16 & 0x3fff),
                has(HAS_RANDOM_SEQUENCE).then_some((sequence >> 16) as u16 & 0x3fff),
            )
        } else {
            let joint = has(HAS_JOINT_SEQUENCE).then_some(sequence as u16 & 0x3fff);
            (joint, joint)
        };

        Ok(Self {
            timestamp: has(HAS_TIMESTAMP).then_some(i64::from_le_bytes(timestamp)),
            physical_sequence,
            random_sequence,
            physical_node_id: has(HAS_PHYSICAL_NODE).then_some(physical),
            random_node_id: has(HAS_RANDOM_NODE).then_some(random),
        })
    }

    pub(crate) fn encode(&self) -> [u8; RECORD_LEN] {
        let mut flags = 0;
        let mut sequence = 0u32;
        if self.timestamp.is_some() {
            flags |= HAS_TIMESTAMP;
        }
        if let Some(seq) = self.physical_sequence {
            flags |= HAS_PHYSICAL_SEQUENCE;
            sequence |= seq as u32;
        }
        if let Some(seq) = self.random_sequence {
            flags |= HAS_RANDOM_SEQUENCE;
            sequence |= (seq as u32) << 16;
        }
        if self.physical_node_id.is_some() {
            flags |= HAS_PHYSICAL_NODE;
        }
        if self.random_node_id.is_some() {
            flags |= HAS_RANDOM_NODE;
        }

        let mut out = [0u8; RECORD_LEN];
        out[0..4].copy_from_slice(&FORMAT_TAG.to_le_bytes());
        out[4..8].copy_from_slice(&flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.timestamp.unwrap_or(0).to_le_bytes());
        out[16..20].copy_from_slice(&sequence.to_le_bytes());
        out[20..26].copy_from_slice(&self.physical_node_id.unwrap_or_default());
        out[26..32].copy_from_slice(&self.random_node_id.unwrap_or_default());
        out
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), StorageError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => StorageError::UnexpectedEndOfData,
        _ => StorageError::Io(e),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a raw record the way another writer might lay it out.
    pub(crate) fn raw_record(
        tag: i32,
        flags: i32,
        timestamp: i64,
        sequence: u32,
        random_node: [u8; 6],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&timestamp.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&random_node);
        out
    }

    /// Reports missing, empty and foreign files
    #[test]
    fn reports_missing_empty_and_foreign_files() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.bin");
        assert!(matches!(
            StateRecord::load(&path),
            Err(StorageError::FileNotFound(p)) if p == path
        ));

        fs::write(&path, [])?;
        assert!(matches!(
            StateRecord::load(&path),
            Err(StorageError::UnexpectedEndOfData)
        ));

        fs::write(&path, raw_record(1234, 0x0f, 0, 0, [0; 6]))?;
        assert!(matches!(
            StateRecord::load(&path),
            Err(StorageError::InvalidData(_))
        ));

        fs::write(&path, &raw_record(FORMAT_TAG, 0x0f, 0, 0, [0; 6])[..20])?;
        assert!(matches!(
            StateRecord::load(&path),
            Err(StorageError::UnexpectedEndOfData)
        ));
        Ok(())
    }

    /// Decodes joint and independent clock sequences
    #[test]
    fn decodes_joint_and_independent_clock_sequences() {
        let joint = raw_record(FORMAT_TAG, HAS_JOINT_SEQUENCE, 0, 42, [0; 6]);
        let record = StateRecord::decode(&joint[..]).unwrap();
        assert_eq!(record.physical_sequence, Some(42));
        assert_eq!(record.random_sequence, Some(42));
        assert_eq!(record.timestamp, None);

        let split = raw_record(
            FORMAT_TAG,
            HAS_JOINT_SEQUENCE | HAS_PHYSICAL_SEQUENCE | HAS_RANDOM_SEQUENCE,
            0,
            (44 << 16) | 42,
            [0; 6],
        );
        let record = StateRecord::decode(&split[..]).unwrap();
        assert_eq!(record.physical_sequence, Some(42));
        assert_eq!(record.random_sequence, Some(44));

        let none = raw_record(FORMAT_TAG, 0, i64::MAX, 42, [0xff; 6]);
        assert_eq!(StateRecord::decode(&none[..]).unwrap(), StateRecord::default());
    }

    /// Stores records atomically and reads them back
    #[test]
    fn stores_records_atomically_and_reads_them_back() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("state.bin");
        let record = StateRecord {
            timestamp: Some(0x0123_4567_89ab_cdef),
            physical_sequence: Some(0x3fff),
            random_sequence: Some(7),
            physical_node_id: Some([1, 2, 3, 4, 5, 6]),
            random_node_id: None,
        };
        record.store(&path)?;
        assert_eq!(fs::read(&path)?.len(), RECORD_LEN);
        assert_eq!(StateRecord::load(&path)?, record);
        assert_eq!(fs::read_dir(path.parent().unwrap_or(dir.path()))?.count(), 1);
        Ok(())
    }
}
