// SPDX-License-Identifier: GPL-3.0-only

//! Calibration embedded in recorded RGB-D videos
//!
//! Recorded files carry their intrinsics as a JSON object appended after the
//! media data. The object starts at the last `{"intrinsic` in the file and is
//! followed by a single trailing byte. The matrix is already expressed at the
//! recording's resolution, so it is transposed but never rescaled.

use crate::calibration::IntrinsicMatrix;
use crate::constants::EMBEDDED_METADATA_MARKER;
use crate::errors::MetadataError;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Metadata recovered from a recorded video
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMetadata {
    /// Row-major intrinsics, used as-is
    pub intrinsics: IntrinsicMatrix,
    /// Remaining JSON fields, kept for display
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RawRecordingMetadata {
    #[serde(rename = "intrinsicMatrix")]
    intrinsic_matrix: Vec<f32>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Locate and parse the trailing metadata object of a recorded file
pub fn parse_embedded_metadata(bytes: &[u8]) -> Result<RecordingMetadata, MetadataError> {
    let start = bytes
        .windows(EMBEDDED_METADATA_MARKER.len())
        .rposition(|window| window == EMBEDDED_METADATA_MARKER)
        .ok_or_else(|| MetadataError::Malformed("no embedded metadata found".into()))?;

    // Drop the single trailing byte after the object
    let end = bytes.len().saturating_sub(1).max(start);
    let raw: RawRecordingMetadata = serde_json::from_slice(&bytes[start..end])?;

    let elements: [f32; 9] = raw.intrinsic_matrix.as_slice().try_into().map_err(|_| {
        MetadataError::Malformed(format!(
            "intrinsicMatrix holds {} values, expected 9",
            raw.intrinsic_matrix.len()
        ))
    })?;

    debug!(offset = start, "Found embedded recording metadata");

    Ok(RecordingMetadata {
        intrinsics: IntrinsicMatrix::from_column_major(&elements),
        extra: raw.extra,
    })
}

/// Read a recorded file and parse its embedded metadata
pub fn read_embedded_metadata(path: &Path) -> Result<RecordingMetadata, MetadataError> {
    let bytes = std::fs::read(path)
        .map_err(|e| MetadataError::Unavailable(format!("{}: {}", path.display(), e)))?;
    parse_embedded_metadata(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(trailer: &str) -> Vec<u8> {
        let mut bytes = vec![0u8, 1, 2, 3, 0xff, 0x7b];
        bytes.extend_from_slice(trailer.as_bytes());
        bytes.push(b'\n');
        bytes
    }

    #[test]
    fn test_transposes_without_scaling() {
        let bytes = recording(
            r#"{"intrinsicMatrix":[700,0,0,0,710,0,360,480,1],"dw":720,"dh":960}"#,
        );
        let meta = parse_embedded_metadata(&bytes).unwrap();
        assert_eq!(meta.intrinsics.fx(), 700.0);
        assert_eq!(meta.intrinsics.fy(), 710.0);
        assert_eq!(meta.intrinsics.cx(), 360.0);
        assert_eq!(meta.intrinsics.cy(), 480.0);
        assert_eq!(meta.extra.get("dw"), Some(&serde_json::json!(720)));
    }

    #[test]
    fn test_uses_last_marker() {
        let mut bytes = br#"{"intrinsicMatrix":[1,0,0,0,1,0,0,0,1]} garbage "#.to_vec();
        bytes.extend(recording(r#"{"intrinsicMatrix":[2,0,0,0,2,0,5,6,1]}"#));
        let meta = parse_embedded_metadata(&bytes).unwrap();
        assert_eq!(meta.intrinsics.fx(), 2.0);
        assert_eq!(meta.intrinsics.cx(), 5.0);
    }

    #[test]
    fn test_missing_marker_is_malformed() {
        let err = parse_embedded_metadata(b"plain video bytes").unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
    }

    #[test]
    fn test_wrong_matrix_length_is_malformed() {
        let bytes = recording(r#"{"intrinsicMatrix":[1,2,3]}"#);
        assert!(matches!(
            parse_embedded_metadata(&bytes),
            Err(MetadataError::Malformed(_))
        ));
    }
}
