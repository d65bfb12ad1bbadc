//! Codec-specific boxes: sample entries and their configuration records.

use super::read_full_header;
use crate::boxes::{Body, BoxHeader};
use crate::error::{ParseError, Result};
use crate::fields::{FieldValue, Fields};
use crate::parser::TreeBuilder;
use crate::reader::Reader;
use crate::registry::{Registry, Scope};
use tracing::{debug, warn};

// ---------- Visual sample entries ----------

/// `avc1`-style visual sample entry.
///
/// The fixed part is read up to the first four bytes of the compressor name.
/// From there the entry is scanned two bytes at a time for the `0xffff`
/// `pre_defined` word that closes the fixed fields; `depth` sits right before
/// it and child boxes start right after it. If the marker never shows up the
/// rest of the box is left unread and the entry has no children.
fn visual_sample_entry(tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    r.skip(6)?; // reserved
    let mut f = Fields::new().with("data_reference_index", r.read_u16()?);
    r.skip(16)?; // pre_defined + reserved
    f.push("width", r.read_u16()?);
    f.push("height", r.read_u16()?);
    f.push("horizresolution", r.read_fixed16_16()?);
    f.push("vertresolution", r.read_fixed16_16()?);
    r.skip(4)?; // reserved
    f.push("frame_count", r.read_u16()?);

    let name_start = r.tell();
    r.skip(4)?;
    let mut found = false;
    while r.remaining() >= 2 {
        if r.read_i16()? == -1 {
            found = true;
            break;
        }
    }
    if !found {
        warn!(
            "{} at {:#x}: no 0xffff marker before end of entry, children skipped",
            hdr.typ, hdr.start
        );
        return Ok(Body::new(f));
    }

    r.seek_relative(-4)?;
    let depth_pos = r.tell();
    r.seek_absolute(name_start)?;
    let name = r.read_bytes(depth_pos - name_start)?;
    f.push("compressorname", pascal_string(&name));
    f.push("depth", FieldValue::hex16(r.read_u16()?));
    f.push("pre_defined", r.read_i16()?);

    let children = tb.children(Scope::SampleEntry)?;
    Ok(Body::new(f).with_children(children))
}

// Length-prefixed, zero padded.
fn pascal_string(raw: &[u8]) -> String {
    let Some((&len, rest)) = raw.split_first() else {
        return String::new();
    };
    let text = &rest[..(len as usize).min(rest.len())];
    String::from_utf8_lossy(text)
        .trim_end_matches('\0')
        .to_string()
}

// ---------- Audio sample entries ----------

/// `mp4a`-style audio sample entry, including the QuickTime v1/v2 sound
/// description extensions. Children are read with one header per child.
fn audio_sample_entry(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    r.skip(6)?; // reserved
    let mut f = Fields::new().with("data_reference_index", r.read_u16()?);
    let version = r.read_u16()?;
    f.push("version", FieldValue::hex16(version));
    f.push("revision", FieldValue::hex16(r.read_u16()?));
    f.push("vendor", FieldValue::hex32(r.read_u32()?));
    f.push("channel_count", r.read_u16()?);
    f.push("sample_size", r.read_u16()?);
    f.push("compression_id", r.read_i16()?);
    f.push("packet_size", r.read_u16()?);
    f.push("sample_rate", r.read_fixed16_16()?);

    match version {
        1 => {
            f.push("samples_per_packet", r.read_u32()?);
            f.push("bytes_per_packet", r.read_u32()?);
            f.push("bytes_per_frame", r.read_u32()?);
            f.push("bytes_per_sample", r.read_u32()?);
        }
        2 => {
            f.push("size_of_struct_only", r.read_u32()?);
            f.push("audio_sample_rate", f64::from_bits(r.read_u64()?));
            f.push("num_audio_channels", r.read_u32()?);
            r.skip(4)?; // always 0x7f000000
            f.push("const_bits_per_channel", r.read_u32()?);
            f.push("format_specific_flags", FieldValue::hex32(r.read_u32()?));
            f.push("const_bytes_per_audio_packet", r.read_u32()?);
            f.push("const_lpcm_frames_per_audio_packet", r.read_u32()?);
        }
        _ => {}
    }

    let children = tb.children(Scope::SampleEntry)?;
    Ok(Body::new(f).with_children(children))
}

// ---------- avcC ----------

fn avcc(tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let mut f = Fields::new()
        .with("configuration_version", r.read_u8()?)
        .with("avc_profile_indication", r.read_u8()?)
        .with("profile_compatibility", FieldValue::hex8(r.read_u8()?))
        .with("avc_level_indication", r.read_u8()?);
    if r.remaining() > 0 {
        merge_optional(&mut f, parameter_sets(r), hdr)?;
    }
    Ok(Body::new(f))
}

fn parameter_sets(r: &mut Reader<'_>) -> Result<Fields> {
    let nal_length_size = (r.read_u8()? & 0x03) + 1;
    let sps_count = r.read_u8()? & 0x1F;
    let sps = read_nal_units(r, sps_count as usize)?;
    let pps_count = r.read_u8()?;
    let pps = read_nal_units(r, pps_count as usize)?;
    Ok(Fields::new()
        .with("nal_length_size", nal_length_size)
        .with("sequence_parameter_sets", FieldValue::List(sps))
        .with("picture_parameter_sets", FieldValue::List(pps)))
}

fn read_nal_units(r: &mut Reader<'_>, count: usize) -> Result<Vec<FieldValue>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = r.read_u16()?;
        out.push(FieldValue::Bytes(r.read_bytes(len as u64)?));
    }
    Ok(out)
}

// ---------- esds ----------

const ES_DESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;

fn esds(tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    if r.remaining() > 0 {
        merge_optional(&mut f, es_descriptor(r), hdr)?;
    }
    Ok(Body::full(fb, f))
}

// Tag byte + 7-bit-per-byte length (at most four bytes).
fn descriptor_header(r: &mut Reader<'_>) -> Result<(u8, u64)> {
    let tag = r.read_u8()?;
    let mut len = 0u64;
    for _ in 0..4 {
        let b = r.read_u8()?;
        len = (len << 7) | (b & 0x7F) as u64;
        if b & 0x80 == 0 {
            break;
        }
    }
    Ok((tag, len))
}

fn expect_tag(r: &Reader<'_>, got: u8, want: u8) -> Result<()> {
    if got != want {
        return Err(ParseError::InvalidData {
            offset: r.tell(),
            reason: format!("expected descriptor tag {want:#04x}, found {got:#04x}"),
        });
    }
    Ok(())
}

fn es_descriptor(r: &mut Reader<'_>) -> Result<Fields> {
    let (tag, len) = descriptor_header(r)?;
    expect_tag(r, tag, ES_DESCRIPTOR_TAG)?;
    let es_end = r.tell() + len;

    let mut f = Fields::new().with("es_id", r.read_u16()?);
    let flags = r.read_u8()?;
    f.push("stream_priority", flags & 0x1F);
    if flags & 0x80 != 0 {
        f.push("depends_on_es_id", r.read_u16()?);
    }
    if flags & 0x40 != 0 {
        let url_len = r.read_u8()?;
        f.push(
            "url",
            String::from_utf8_lossy(&r.read_bytes(url_len as u64)?).into_owned(),
        );
    }
    if flags & 0x20 != 0 {
        f.push("ocr_es_id", r.read_u16()?);
    }

    let (tag, len) = descriptor_header(r)?;
    expect_tag(r, tag, DECODER_CONFIG_DESCRIPTOR_TAG)?;
    let config_end = r.tell() + len;
    f.push("object_type_indication", FieldValue::hex8(r.read_u8()?));
    let stream = r.read_u8()?;
    f.push("stream_type", stream >> 2);
    f.push("buffer_size_db", r.read_u24()?);
    f.push("max_bitrate", r.read_u32()?);
    f.push("avg_bitrate", r.read_u32()?);

    if config_end.min(es_end) > r.tell() + 1 {
        let (tag, len) = descriptor_header(r)?;
        if tag == DECODER_SPECIFIC_INFO_TAG {
            f.push("decoder_specific_info", FieldValue::Bytes(r.read_bytes(len)?));
        }
    }
    Ok(f)
}

/// Fold an optional extension into the guaranteed fields; a malformed
/// extension is dropped as a whole.
fn merge_optional(f: &mut Fields, extra: Result<Fields>, hdr: &BoxHeader) -> Result<()> {
    match extra {
        Ok(extra) => f.extend(extra),
        Err(e) if e.is_recoverable() => {
            debug!("{} at {:#x}: ignoring trailing data: {}", hdr.typ, hdr.start, e);
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

// ---------- Vendor registry ----------

/// Decoders for sample entries and codec configuration boxes.
pub fn vendor_registry() -> Registry {
    Registry::new()
        .with_decoder(b"avc1", "AVC Sample Entry", visual_sample_entry)
        .with_decoder(b"avc3", "AVC Sample Entry", visual_sample_entry)
        .with_decoder(b"hvc1", "HEVC Sample Entry", visual_sample_entry)
        .with_decoder(b"hev1", "HEVC Sample Entry", visual_sample_entry)
        .with_decoder(b"mp4v", "MPEG-4 Visual Sample Entry", visual_sample_entry)
        .with_decoder(b"encv", "Encrypted Video Sample Entry", visual_sample_entry)
        .with_decoder(b"avcC", "AVC Configuration Box", avcc)
        .with_decoder(b"mp4a", "MPEG-4 Audio Sample Entry", audio_sample_entry)
        .with_decoder(b"enca", "Encrypted Audio Sample Entry", audio_sample_entry)
        .with_decoder(b"esds", "Elementary Stream Descriptor Box", esds)
}
