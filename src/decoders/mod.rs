//! Per-type payload decoders and the registries that hold them.
//!
//! [`iso`] covers boxes defined by ISO/IEC 14496-12; [`vendor`] covers
//! codec-specific sample entries and their configuration boxes.

pub mod iso;
pub mod vendor;

use crate::boxes::FullBoxHeader;
use crate::error::Result;
use crate::reader::Reader;

/// Version byte + 24-bit flags at the start of a full box payload.
pub fn read_full_header(r: &mut Reader<'_>) -> Result<FullBoxHeader> {
    let version = r.read_u8()?;
    let flags = r.read_u24()?;
    Ok(FullBoxHeader { version, flags })
}

/// A 64-bit field in version 1 boxes, 32-bit otherwise.
pub(crate) fn read_versioned(r: &mut Reader<'_>, version: u8) -> Result<u64> {
    if version == 1 {
        r.read_u64()
    } else {
        Ok(r.read_u32()? as u64)
    }
}

/// Null-terminated string, or everything up to the window end.
pub(crate) fn read_cstring(r: &mut Reader<'_>) -> Result<String> {
    let mut bytes = Vec::new();
    while r.remaining() > 0 {
        match r.read_u8()? {
            0 => break,
            b => bytes.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
