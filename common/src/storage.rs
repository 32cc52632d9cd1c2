//! Persistence of the [`CalibrationState`] as a fixed-size binary record.
//!
//! The record is encoded with postcard, which writes `f32` values as 4
//! little-endian bytes and fixed-size arrays without a length prefix, so the
//! layout is fully determined by the field order:
//!
//! | offset | size | field                          |
//! |-------:|-----:|--------------------------------|
//! | 0      | 1    | format version                 |
//! | 1      | 16   | idle conjugate `[w, x, y, z]`  |
//! | 17     | 12   | neutral gravity `[x, y, z]`    |
//! | 29     | 12   | down gravity `[x, y, z]`       |
//! | 41     | 16   | left correction `[w, x, y, z]` |
//! | 57     | 16   | right correction `[w, x, y, z]`|
//!
//! Older headerless records of only the first three quaternion/vector fields
//! are still accepted when loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_ne;

use crate::calibration::CalibrationState;
use crate::errors::StoreError;
use crate::utils::rotation::{quat_from_wxyz, quat_to_wxyz};

pub const RECORD_VERSION: u8 = 1;

/// Size of a current record in bytes.
pub const RECORD_LEN: usize = 1 + 16 + 12 + 12 + 16 + 16;

/// Size of a legacy (headerless) record in bytes.
pub const LEGACY_RECORD_LEN: usize = 16 + 12 + 12;

// Records are told apart by their length alone
const_assert_ne!(RECORD_LEN, LEGACY_RECORD_LEN);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CalibrationRecord {
    version: u8,
    idle_conj: [f32; 4],
    gravity_neutral: [f32; 3],
    gravity_down: [f32; 3],
    cal_left: [f32; 4],
    cal_right: [f32; 4],
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LegacyRecord {
    idle_conj: [f32; 4],
    gravity_neutral: [f32; 3],
    gravity_down: [f32; 3],
}

impl From<&CalibrationState> for CalibrationRecord {
    fn from(state: &CalibrationState) -> Self {
        Self {
            version: RECORD_VERSION,
            idle_conj: quat_to_wxyz(&state.idle_conj),
            gravity_neutral: state.gravity_neutral.into(),
            gravity_down: state.gravity_down.into(),
            cal_left: quat_to_wxyz(&state.cal_left),
            cal_right: quat_to_wxyz(&state.cal_right),
        }
    }
}

impl From<CalibrationRecord> for CalibrationState {
    fn from(record: CalibrationRecord) -> Self {
        Self {
            idle_conj: quat_from_wxyz(record.idle_conj),
            gravity_neutral: Vector3::from(record.gravity_neutral),
            gravity_down: Vector3::from(record.gravity_down),
            cal_left: quat_from_wxyz(record.cal_left),
            cal_right: quat_from_wxyz(record.cal_right),
        }
    }
}

impl From<LegacyRecord> for CalibrationState {
    fn from(record: LegacyRecord) -> Self {
        // The correction pair is recomputed from the gravities on restore
        Self {
            idle_conj: quat_from_wxyz(record.idle_conj),
            gravity_neutral: Vector3::from(record.gravity_neutral),
            gravity_down: Vector3::from(record.gravity_down),
            cal_left: Quaternion::identity(),
            cal_right: Quaternion::identity(),
        }
    }
}

/// Encode a calibration into its binary record.
pub fn encode(state: &CalibrationState) -> Result<Vec<u8>, StoreError> {
    Ok(postcard::to_stdvec(&CalibrationRecord::from(state))?)
}

/// Decode a binary record, current or legacy.
pub fn decode(bytes: &[u8]) -> Result<CalibrationState, StoreError> {
    let corrupt = StoreError::Corrupt { len: bytes.len() };

    let state: CalibrationState = match bytes.len() {
        RECORD_LEN => {
            let record: CalibrationRecord = postcard::from_bytes(bytes)?;
            if record.version != RECORD_VERSION {
                return Err(corrupt);
            }
            record.into()
        }
        LEGACY_RECORD_LEN => postcard::from_bytes::<LegacyRecord>(bytes)?.into(),
        _ => return Err(corrupt),
    };

    if !state.is_sane() {
        return Err(corrupt);
    }

    Ok(state)
}

/// Write the calibration to `path`.
///
/// The record is written to a sibling temporary file first, and then moved
/// in place, such that a failed write never leaves a truncated record behind.
pub fn save(path: &Path, state: &CalibrationState) -> Result<(), StoreError> {
    let bytes = encode(state)?;
    let temp = temp_path(path);

    let result = std::fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })
        .and_then(|_| std::fs::rename(&temp, path));

    if let Err(error) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(StoreError::Io(error.kind()));
    }

    Ok(())
}

/// Read the calibration stored at `path`.
pub fn load(path: &Path) -> Result<CalibrationState, StoreError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn some_state() -> CalibrationState {
        let cal = UnitQuaternion::from_euler_angles(0.3, -0.1, 1.1).into_inner();
        CalibrationState {
            idle_conj: UnitQuaternion::from_euler_angles(0.0, 0.2, -0.5)
                .into_inner()
                .conjugate(),
            gravity_neutral: Vector3::new(0.0, 0.0, -1.0),
            gravity_down: Vector3::new(0.0, -1.0, 0.0),
            cal_left: cal.conjugate(),
            cal_right: cal,
        }
    }

    #[test]
    fn test_record_layout() {
        let state = some_state();
        let bytes = encode(&state).unwrap();
        assert_eq!(bytes.len(), RECORD_LEN);
        assert_eq!(bytes[0], RECORD_VERSION);

        // Neutral gravity z component, little-endian at offset 25
        assert_eq!(bytes[25..29], (-1.0f32).to_le_bytes());
        // Left correction w component at offset 41
        assert_eq!(bytes[41..45], state.cal_left.w.to_le_bytes());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration");
        let state = some_state();

        save(&path, &state).unwrap();
        assert_eq!(load(&path), Ok(state));
        assert!(!temp_path(&path).exists());

        // Overwriting an existing record
        let state = CalibrationState::default();
        save(&path, &state).unwrap();
        assert_eq!(load(&path), Ok(state));
    }

    #[test]
    fn test_load_legacy_record() {
        let state = some_state();
        let mut bytes = Vec::new();
        for value in quat_to_wxyz(&state.idle_conj)
            .iter()
            .chain(state.gravity_neutral.iter())
            .chain(state.gravity_down.iter())
        {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        assert_eq!(bytes.len(), LEGACY_RECORD_LEN);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy");
        std::fs::write(&path, &bytes).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.idle_conj, state.idle_conj);
        assert_eq!(loaded.gravity_neutral, state.gravity_neutral);
        assert_eq!(loaded.gravity_down, state.gravity_down);
        assert_eq!(loaded.cal_left, Quaternion::identity());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("absent")), Err(StoreError::NotFound));
    }

    #[test]
    fn test_short_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        let bytes = encode(&some_state()).unwrap();
        std::fs::write(&path, &bytes[..20]).unwrap();
        assert_eq!(load(&path), Err(StoreError::Corrupt { len: 20 }));
    }

    #[test]
    fn test_bad_content_is_corrupt() {
        let mut bytes = encode(&some_state()).unwrap();
        bytes[0] = RECORD_VERSION + 1;
        assert_eq!(decode(&bytes), Err(StoreError::Corrupt { len: RECORD_LEN }));

        let mut bytes = encode(&some_state()).unwrap();
        bytes[1..5].copy_from_slice(&f32::NAN.to_le_bytes());
        assert_eq!(decode(&bytes), Err(StoreError::Corrupt { len: RECORD_LEN }));
    }

    #[test]
    fn test_save_to_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("calibration");
        assert_eq!(
            save(&path, &some_state()),
            Err(StoreError::Io(std::io::ErrorKind::NotFound))
        );
    }
}
