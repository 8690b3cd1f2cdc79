//! Protocol-version word: `major << 16 | minor << 8 | patch`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemverError {
    #[error("invalid semver {0:?}: expected MAJOR.MINOR.PATCH")]
    Malformed(String),
    #[error("invalid semver {input:?}: {component} component {value} exceeds {max}")]
    OutOfRange {
        input: String,
        component: &'static str,
        value: u64,
        max: u64,
    },
}

pub const fn pack_version(major: u16, minor: u8, patch: u8) -> u32 {
    (major as u32) << 16 | (minor as u32) << 8 | patch as u32
}

pub const fn unpack_version(word: u32) -> (u16, u8, u8) {
    ((word >> 16) as u16, (word >> 8) as u8, word as u8)
}

/// Strict `MAJOR.MINOR.PATCH`. Signs, whitespace and suffixes are rejected,
/// so `1.3.0-beta` is an error rather than `1.3.0`.
pub fn pack_semver(input: &str) -> Result<u32, SemverError> {
    let malformed = || SemverError::Malformed(input.to_string());
    let mut parts = input.split('.');
    let (Some(major), Some(minor), Some(patch), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let component = |raw: &str, name: &'static str, max: u64| -> Result<u64, SemverError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let value: u64 = raw.parse().map_err(|_| SemverError::OutOfRange {
            input: input.to_string(),
            component: name,
            value: u64::MAX,
            max,
        })?;
        if value > max {
            return Err(SemverError::OutOfRange {
                input: input.to_string(),
                component: name,
                value,
                max,
            });
        }
        Ok(value)
    };

    let major = component(major, "major", 0xFFFF)?;
    let minor = component(minor, "minor", 0xFF)?;
    let patch = component(patch, "patch", 0xFF)?;
    Ok(pack_version(major as u16, minor as u8, patch as u8))
}
