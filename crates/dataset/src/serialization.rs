//! JSON documents written by the pipeline (manifest, job requests, config view)
//!
//! Values pass through `serde_json::Value` first. Its object map is ordered,
//! so map-typed fields come out key-sorted whatever their in-memory type, and
//! two identical runs produce identical bytes.

use std::io::Write;

use serde::Serialize;

use crate::errors::{PipelineError, Result};

fn to_sorted_value<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| PipelineError::Encoding(err.to_string()))
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json_document<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let document = to_sorted_value(value)?;
    serde_json::to_writer_pretty(&mut *out, &document)
        .map_err(|err| PipelineError::Encoding(err.to_string()))?;
    writeln!(out)?;
    Ok(())
}

/// Render `value` as the same document [`write_json_document`] writes.
pub fn json_document<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buffer = Vec::new();
    write_json_document(&mut buffer, value)?;
    String::from_utf8(buffer).map_err(|err| PipelineError::Encoding(err.to_string()))
}
