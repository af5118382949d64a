//! RecordIO-protobuf sparse records
//!
//! Each row becomes one `aialgs.data.Record` whose `features["values"]` is a
//! sparse Float32Tensor (values, keys, shape) and whose `label["values"]`
//! holds the target. Records are framed as:
//!
//! ```text
//! u32 LE magic 0xced7230a | u32 LE (flag << 29 | len) | payload | pad to 4 bytes
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use prost::Message;

use crate::encoder::SparseMatrix;
use crate::errors::{PipelineError, Result};

use super::write_atomic;

pub const MAGIC: u32 = 0xced7_230a;
const LENGTH_MASK: u32 = (1 << 29) - 1;
const VALUES_KEY: &str = "values";

#[derive(Clone, PartialEq, Message)]
pub struct Float32Tensor {
    #[prost(float, repeated, packed = "true", tag = "1")]
    pub values: Vec<f32>,
    #[prost(uint64, repeated, packed = "true", tag = "2")]
    pub keys: Vec<u64>,
    #[prost(uint64, repeated, packed = "true", tag = "3")]
    pub shape: Vec<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Value {
    #[prost(oneof = "value::Kind", tags = "2")]
    pub kind: Option<value::Kind>,
}

pub mod value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "2")]
        Float32Tensor(super::Float32Tensor),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Record {
    #[prost(btree_map = "string, message", tag = "1")]
    pub features: BTreeMap<String, Value>,
    #[prost(btree_map = "string, message", tag = "2")]
    pub label: BTreeMap<String, Value>,
    #[prost(string, optional, tag = "3")]
    pub uid: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub metadata: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub configuration: Option<String>,
}

impl Record {
    fn tensor(map: &BTreeMap<String, Value>) -> Option<&Float32Tensor> {
        match map.get(VALUES_KEY)?.kind.as_ref()? {
            value::Kind::Float32Tensor(t) => Some(t),
        }
    }

    /// Sparse feature tensor of this record.
    pub fn features(&self) -> Option<&Float32Tensor> {
        Self::tensor(&self.features)
    }

    /// First label value of this record.
    pub fn label(&self) -> Option<f32> {
        Self::tensor(&self.label)?.values.first().copied()
    }
}

fn tensor_value(tensor: Float32Tensor) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    map.insert(
        VALUES_KEY.to_string(),
        Value {
            kind: Some(value::Kind::Float32Tensor(tensor)),
        },
    );
    map
}

/// Build the record for row `i` of `features`.
fn row_record(features: &SparseMatrix, i: usize, label: f32) -> Record {
    let (cols, values) = features.row(i);
    Record {
        features: tensor_value(Float32Tensor {
            values: values.to_vec(),
            keys: cols.iter().map(|&c| c as u64).collect(),
            shape: vec![features.cols as u64],
        }),
        label: tensor_value(Float32Tensor {
            values: vec![label],
            keys: Vec::new(),
            shape: Vec::new(),
        }),
        uid: None,
        metadata: None,
        configuration: None,
    }
}

fn write_frame(out: &mut dyn Write, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= LENGTH_MASK)
        .ok_or_else(|| PipelineError::Encoding(format!("record of {} bytes is too large", payload.len())))?;

    out.write_all(&MAGIC.to_le_bytes())?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(payload)?;
    let pad = (4 - payload.len() % 4) % 4;
    out.write_all(&[0u8; 3][..pad])?;
    Ok(())
}

/// Serialize every row of `features` with its target into `path`.
pub fn write(features: &SparseMatrix, targets: &[f32], path: &Path) -> Result<()> {
    if features.rows() != targets.len() {
        return Err(PipelineError::Encoding(format!(
            "{} feature rows but {} targets",
            features.rows(),
            targets.len()
        )));
    }

    write_atomic(path, |out| {
        let mut payload = Vec::new();
        for (i, &target) in targets.iter().enumerate() {
            payload.clear();
            row_record(features, i, target)
                .encode(&mut payload)
                .map_err(|err| PipelineError::Encoding(err.to_string()))?;
            write_frame(out, &payload)?;
        }
        Ok(())
    })
}

/// Decode every record of a RecordIO-protobuf file.
pub fn read(path: &Path) -> Result<Vec<Record>> {
    let bytes = std::fs::read(path)?;
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let header = bytes
            .get(pos..pos + 8)
            .ok_or_else(|| frame_error(path, pos, "truncated header"))?;
        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != MAGIC {
            return Err(frame_error(path, pos, "bad magic"));
        }
        let len_field = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len_field >> 29 != 0 {
            return Err(frame_error(path, pos, "split records are not supported"));
        }
        let len = (len_field & LENGTH_MASK) as usize;
        pos += 8;

        let payload = bytes
            .get(pos..pos + len)
            .ok_or_else(|| frame_error(path, pos, "truncated payload"))?;
        let record = Record::decode(payload)
            .map_err(|err| frame_error(path, pos, &err.to_string()))?;
        records.push(record);

        pos += len + (4 - len % 4) % 4;
    }

    Ok(records)
}

fn frame_error(path: &Path, offset: usize, what: &str) -> PipelineError {
    PipelineError::Load(format!("{} at byte {}: {}", path.display(), offset, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> SparseMatrix {
        let mut m = SparseMatrix::new(5);
        m.push_row(&[(0, 1.0), (3, 1.0)]);
        m.push_row(&[(1, 1.0), (4, 1.0)]);
        m
    }

    #[test]
    fn test_frames_are_aligned() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("train.protobuf");
        write(&sample(), &[8.0, 6.0], &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(&bytes[0..4], &MAGIC.to_le_bytes());
    }

    #[test]
    fn test_records_carry_sparse_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.protobuf");
        write(&sample(), &[8.0, 6.0], &path).unwrap();

        let records = read(&path).unwrap();
        assert_eq!(records.len(), 2);

        let features = records[1].features().unwrap();
        assert_eq!(features.keys, vec![1, 4]);
        assert_eq!(features.values, vec![1.0, 1.0]);
        assert_eq!(features.shape, vec![5]);
        assert_eq!(records[1].label(), Some(6.0));
    }

    #[test]
    fn test_empty_slice_writes_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.protobuf");
        write(&SparseMatrix::new(5), &[], &path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert!(read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.protobuf");
        fs::write(&path, [0u8; 8]).unwrap();
        assert!(matches!(read(&path), Err(PipelineError::Load(_))));
    }
}
