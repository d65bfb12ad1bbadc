use super::{read_cstring, read_full_header, read_versioned};
use crate::boxes::{Body, BoxHeader, FourCC};
use crate::error::Result;
use crate::fields::{FieldValue, Fields};
use crate::parser::TreeBuilder;
use crate::reader::Reader;
use crate::registry::{Registry, Scope};

// ---------- Helpers ----------

fn lang_from_u16(code: u16) -> String {
    if code == 0 {
        return "und".to_string();
    }
    let c1 = ((code >> 10) & 0x1F) as u8 + 0x60;
    let c2 = ((code >> 5) & 0x1F) as u8 + 0x60;
    let c3 = (code & 0x1F) as u8 + 0x60;
    format!("{}{}{}", c1 as char, c2 as char, c3 as char)
}

fn fourcc_text(cc: FourCC) -> FieldValue {
    FieldValue::Text(cc.to_string())
}

// 3x3 transformation matrix, kept as raw words.
fn read_matrix(r: &mut Reader<'_>) -> Result<FieldValue> {
    let mut m = Vec::with_capacity(9);
    for _ in 0..9 {
        m.push(FieldValue::hex32(r.read_u32()?));
    }
    Ok(FieldValue::List(m))
}

fn read_u32_list(r: &mut Reader<'_>, count: u32) -> Result<FieldValue> {
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(FieldValue::from(r.read_u32()?));
    }
    Ok(FieldValue::List(out))
}

// ---------- Structural boxes ----------

fn container(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    Ok(Body::default().with_children(tb.children(Scope::Generic)?))
}

// mdat, free, skip, wide: recognised, payload left alone
fn payload_only(_tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    Ok(Body::default())
}

// ISO meta is a full box; QuickTime writes it as a plain container whose
// first child (hdlr) starts right after the header.
fn meta(tb: &mut TreeBuilder<'_>, hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let payload = r.tell();
    let mut plain = false;
    if r.remaining() >= 8 {
        r.skip(4)?;
        plain = r.read_fourcc()? == b"hdlr";
        r.seek_absolute(payload)?;
    }
    if plain {
        return container(tb, hdr);
    }
    let fb = read_full_header(tb.reader())?;
    let children = tb.children(Scope::Generic)?;
    Ok(Body::full(fb, Fields::new()).with_children(children))
}

// ---------- File level ----------

// ftyp / styp: major + minor + compatible brands
fn ftyp(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let major = r.read_fourcc()?;
    let minor = r.read_u32()?;
    let mut brands = Vec::new();
    while r.remaining() >= 4 {
        brands.push(fourcc_text(r.read_fourcc()?));
    }
    Ok(Body::new(
        Fields::new()
            .with("major_brand", fourcc_text(major))
            .with("minor_version", minor)
            .with("compatible_brands", FieldValue::List(brands)),
    ))
}

// ---------- moov / trak / mdia ----------

fn mvhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    f.push("creation_time", read_versioned(r, fb.version)?);
    f.push("modification_time", read_versioned(r, fb.version)?);
    f.push("timescale", r.read_u32()?);
    f.push("duration", read_versioned(r, fb.version)?);
    f.push("rate", r.read_sfixed16_16()?);
    f.push("volume", r.read_fixed8_8()?);
    r.skip(10)?; // reserved
    f.push("matrix", read_matrix(r)?);
    r.skip(24)?; // pre_defined
    f.push("next_track_id", r.read_u32()?);
    Ok(Body::full(fb, f))
}

fn tkhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    f.push("creation_time", read_versioned(r, fb.version)?);
    f.push("modification_time", read_versioned(r, fb.version)?);
    f.push("track_id", r.read_u32()?);
    r.skip(4)?;
    f.push("duration", read_versioned(r, fb.version)?);
    r.skip(8)?;
    f.push("layer", r.read_i16()?);
    f.push("alternate_group", r.read_i16()?);
    f.push("volume", r.read_fixed8_8()?);
    r.skip(2)?;
    f.push("matrix", read_matrix(r)?);
    f.push("width", r.read_fixed16_16()?);
    f.push("height", r.read_fixed16_16()?);
    Ok(Body::full(fb, f))
}

fn mdhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    f.push("creation_time", read_versioned(r, fb.version)?);
    f.push("modification_time", read_versioned(r, fb.version)?);
    f.push("timescale", r.read_u32()?);
    f.push("duration", read_versioned(r, fb.version)?);
    f.push("language", lang_from_u16(r.read_u16()? & 0x7FFF));
    r.skip(2)?; // pre_defined
    Ok(Body::full(fb, f))
}

fn hdlr(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    r.skip(4)?; // pre_defined
    let handler_type = r.read_fourcc()?;
    r.skip(12)?;
    let mut name_bytes = r.read_to_limit()?;
    while name_bytes.last() == Some(&0) {
        name_bytes.pop();
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("handler_type", fourcc_text(handler_type))
            .with("name", String::from_utf8_lossy(&name_bytes).into_owned()),
    ))
}

fn elst(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        let (duration, media_time) = if fb.version == 1 {
            (r.read_u64()?, r.read_i64()?)
        } else {
            (r.read_u32()? as u64, r.read_i32()? as i64)
        };
        entries.push(
            Fields::new()
                .with("segment_duration", duration)
                .with("media_time", media_time)
                .with("media_rate_integer", r.read_i16()?)
                .with("media_rate_fraction", r.read_i16()?),
        );
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("entries", FieldValue::Entries(entries)),
    ))
}

// ---------- minf ----------

fn vmhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let graphicsmode = r.read_u16()?;
    let opcolor = vec![
        FieldValue::from(r.read_u16()?),
        FieldValue::from(r.read_u16()?),
        FieldValue::from(r.read_u16()?),
    ];
    Ok(Body::full(
        fb,
        Fields::new()
            .with("graphicsmode", graphicsmode)
            .with("opcolor", FieldValue::List(opcolor)),
    ))
}

fn smhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let balance = r.read_fixed8_8()?;
    r.skip(2)?;
    Ok(Body::full(fb, Fields::new().with("balance", balance)))
}

fn dref(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let children = tb.children(Scope::Generic)?;
    Ok(Body::full(fb, Fields::new().with("entry_count", entry_count)).with_children(children))
}

// Flag 0x1 means "media is in this file" and the location is absent.
fn url(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    if fb.flags & 1 == 0 && r.remaining() > 0 {
        f.push("location", read_cstring(r)?);
    }
    Ok(Body::full(fb, f))
}

fn urn(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new();
    f.push("name", read_cstring(r)?);
    if r.remaining() > 0 {
        f.push("location", read_cstring(r)?);
    }
    Ok(Body::full(fb, f))
}

// ---------- stbl ----------

fn stsd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let entries = tb.children(Scope::SampleEntry)?;
    Ok(Body::full(fb, Fields::new().with("entry_count", entry_count)).with_children(entries))
}

fn stts(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        entries.push(
            Fields::new()
                .with("sample_count", r.read_u32()?)
                .with("sample_delta", r.read_u32()?),
        );
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("entries", FieldValue::Entries(entries)),
    ))
}

// Version 1 offsets are signed.
fn ctts(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        let sample_count = r.read_u32()?;
        let offset = if fb.version == 1 {
            FieldValue::from(r.read_i32()?)
        } else {
            FieldValue::from(r.read_u32()?)
        };
        entries.push(
            Fields::new()
                .with("sample_count", sample_count)
                .with("sample_offset", offset),
        );
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("entries", FieldValue::Entries(entries)),
    ))
}

fn stss(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let samples = read_u32_list(r, entry_count)?;
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("sample_numbers", samples),
    ))
}

fn stsc(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let mut entries = Vec::new();
    for _ in 0..entry_count {
        entries.push(
            Fields::new()
                .with("first_chunk", r.read_u32()?)
                .with("samples_per_chunk", r.read_u32()?)
                .with("sample_description_index", r.read_u32()?),
        );
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("entries", FieldValue::Entries(entries)),
    ))
}

// A non-zero sample_size means every sample has that size and no table follows.
fn stsz(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let sample_size = r.read_u32()?;
    let sample_count = r.read_u32()?;
    let mut f = Fields::new()
        .with("sample_size", sample_size)
        .with("sample_count", sample_count);
    if sample_size == 0 {
        f.push("entry_sizes", read_u32_list(r, sample_count)?);
    }
    Ok(Body::full(fb, f))
}

fn stco(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let offsets = read_u32_list(r, entry_count)?;
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("chunk_offsets", offsets),
    ))
}

fn co64(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let entry_count = r.read_u32()?;
    let mut offsets = Vec::new();
    for _ in 0..entry_count {
        offsets.push(FieldValue::from(r.read_u64()?));
    }
    Ok(Body::full(
        fb,
        Fields::new()
            .with("entry_count", entry_count)
            .with("chunk_offsets", FieldValue::List(offsets)),
    ))
}

// ---------- Fragments ----------

fn mehd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let duration = read_versioned(r, fb.version)?;
    Ok(Body::full(fb, Fields::new().with("fragment_duration", duration)))
}

fn trex(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    Ok(Body::full(
        fb,
        Fields::new()
            .with("track_id", r.read_u32()?)
            .with("default_sample_description_index", r.read_u32()?)
            .with("default_sample_duration", r.read_u32()?)
            .with("default_sample_size", r.read_u32()?)
            .with("default_sample_flags", FieldValue::hex32(r.read_u32()?)),
    ))
}

fn mfhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    Ok(Body::full(
        fb,
        Fields::new().with("sequence_number", r.read_u32()?),
    ))
}

const TFHD_BASE_DATA_OFFSET: u32 = 0x000001;
const TFHD_SAMPLE_DESCRIPTION_INDEX: u32 = 0x000002;
const TFHD_DEFAULT_SAMPLE_DURATION: u32 = 0x000008;
const TFHD_DEFAULT_SAMPLE_SIZE: u32 = 0x000010;
const TFHD_DEFAULT_SAMPLE_FLAGS: u32 = 0x000020;

fn tfhd(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new().with("track_id", r.read_u32()?);
    if fb.flags & TFHD_BASE_DATA_OFFSET != 0 {
        f.push("base_data_offset", r.read_u64()?);
    }
    if fb.flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 {
        f.push("sample_description_index", r.read_u32()?);
    }
    if fb.flags & TFHD_DEFAULT_SAMPLE_DURATION != 0 {
        f.push("default_sample_duration", r.read_u32()?);
    }
    if fb.flags & TFHD_DEFAULT_SAMPLE_SIZE != 0 {
        f.push("default_sample_size", r.read_u32()?);
    }
    if fb.flags & TFHD_DEFAULT_SAMPLE_FLAGS != 0 {
        f.push("default_sample_flags", FieldValue::hex32(r.read_u32()?));
    }
    Ok(Body::full(fb, f))
}

fn tfdt(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let t = read_versioned(r, fb.version)?;
    Ok(Body::full(fb, Fields::new().with("base_media_decode_time", t)))
}

const TRUN_DATA_OFFSET: u32 = 0x000001;
const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
const TRUN_SAMPLE_DURATION: u32 = 0x000100;
const TRUN_SAMPLE_SIZE: u32 = 0x000200;
const TRUN_SAMPLE_FLAGS: u32 = 0x000400;
const TRUN_SAMPLE_CTO: u32 = 0x000800;

fn trun(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let sample_count = r.read_u32()?;
    let mut f = Fields::new().with("sample_count", sample_count);
    if fb.flags & TRUN_DATA_OFFSET != 0 {
        f.push("data_offset", r.read_i32()?);
    }
    if fb.flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
        f.push("first_sample_flags", FieldValue::hex32(r.read_u32()?));
    }

    let per_sample =
        TRUN_SAMPLE_DURATION | TRUN_SAMPLE_SIZE | TRUN_SAMPLE_FLAGS | TRUN_SAMPLE_CTO;
    if fb.flags & per_sample != 0 {
        let mut samples = Vec::new();
        for _ in 0..sample_count {
            let mut s = Fields::new();
            if fb.flags & TRUN_SAMPLE_DURATION != 0 {
                s.push("duration", r.read_u32()?);
            }
            if fb.flags & TRUN_SAMPLE_SIZE != 0 {
                s.push("size", r.read_u32()?);
            }
            if fb.flags & TRUN_SAMPLE_FLAGS != 0 {
                s.push("flags", FieldValue::hex32(r.read_u32()?));
            }
            if fb.flags & TRUN_SAMPLE_CTO != 0 {
                if fb.version == 0 {
                    s.push("composition_time_offset", r.read_u32()?);
                } else {
                    s.push("composition_time_offset", r.read_i32()?);
                }
            }
            samples.push(s);
        }
        f.push("samples", FieldValue::Entries(samples));
    }
    Ok(Body::full(fb, f))
}

// sidx: segment index
fn sidx(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    let fb = read_full_header(r)?;
    let mut f = Fields::new()
        .with("reference_id", r.read_u32()?)
        .with("timescale", r.read_u32()?);
    f.push("earliest_presentation_time", read_versioned(r, fb.version)?);
    f.push("first_offset", read_versioned(r, fb.version)?);
    r.skip(2)?;
    let reference_count = r.read_u16()?;
    f.push("reference_count", reference_count);

    let mut refs = Vec::new();
    for _ in 0..reference_count {
        let a = r.read_u32()?;
        let duration = r.read_u32()?;
        let b = r.read_u32()?;
        refs.push(
            Fields::new()
                .with("reference_type", a >> 31)
                .with("referenced_size", a & 0x7FFF_FFFF)
                .with("subsegment_duration", duration)
                .with("starts_with_sap", b >> 31)
                .with("sap_type", (b >> 28) & 0x7)
                .with("sap_delta_time", b & 0x0FFF_FFFF),
        );
    }
    f.push("references", FieldValue::Entries(refs));
    Ok(Body::full(fb, f))
}

// ---------- Sample entry extensions ----------

fn pasp(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    Ok(Body::new(
        Fields::new()
            .with("h_spacing", r.read_u32()?)
            .with("v_spacing", r.read_u32()?),
    ))
}

fn btrt(tb: &mut TreeBuilder<'_>, _hdr: &BoxHeader) -> Result<Body> {
    let r = tb.reader();
    Ok(Body::new(
        Fields::new()
            .with("buffer_size_db", r.read_u32()?)
            .with("max_bitrate", r.read_u32()?)
            .with("avg_bitrate", r.read_u32()?),
    ))
}

// ---------- Standard registry ----------

/// Decoders for boxes defined by ISO/IEC 14496-12.
pub fn standard_registry() -> Registry {
    Registry::new()
        .with_decoder(b"ftyp", "File Type Box", ftyp)
        .with_decoder(b"styp", "Segment Type Box", ftyp)
        .with_decoder(b"mdat", "Media Data Box", payload_only)
        .with_decoder(b"free", "Free Space Box", payload_only)
        .with_decoder(b"skip", "Free Space Box", payload_only)
        .with_decoder(b"wide", "Wide Box", payload_only)
        .with_decoder(b"moov", "Movie Box", container)
        .with_decoder(b"mvhd", "Movie Header Box", mvhd)
        .with_decoder(b"trak", "Track Box", container)
        .with_decoder(b"tkhd", "Track Header Box", tkhd)
        .with_decoder(b"edts", "Edit Box", container)
        .with_decoder(b"elst", "Edit List Box", elst)
        .with_decoder(b"mdia", "Media Box", container)
        .with_decoder(b"mdhd", "Media Header Box", mdhd)
        .with_decoder(b"hdlr", "Handler Reference Box", hdlr)
        .with_decoder(b"minf", "Media Information Box", container)
        .with_decoder(b"vmhd", "Video Media Header Box", vmhd)
        .with_decoder(b"smhd", "Sound Media Header Box", smhd)
        .with_decoder(b"dinf", "Data Information Box", container)
        .with_decoder(b"dref", "Data Reference Box", dref)
        .with_decoder(b"url ", "Data Entry URL Box", url)
        .with_decoder(b"urn ", "Data Entry URN Box", urn)
        .with_decoder(b"stbl", "Sample Table Box", container)
        .with_decoder(b"stsd", "Sample Description Box", stsd)
        .with_decoder(b"stts", "Decoding Time to Sample Box", stts)
        .with_decoder(b"ctts", "Composition Time to Sample Box", ctts)
        .with_decoder(b"stss", "Sync Sample Box", stss)
        .with_decoder(b"stsc", "Sample To Chunk Box", stsc)
        .with_decoder(b"stsz", "Sample Size Box", stsz)
        .with_decoder(b"stco", "Chunk Offset Box", stco)
        .with_decoder(b"co64", "Chunk Large Offset Box", co64)
        .with_decoder(b"udta", "User Data Box", container)
        .with_decoder(b"meta", "Meta Box", meta)
        .with_decoder(b"mvex", "Movie Extends Box", container)
        .with_decoder(b"mehd", "Movie Extends Header Box", mehd)
        .with_decoder(b"trex", "Track Extends Box", trex)
        .with_decoder(b"moof", "Movie Fragment Box", container)
        .with_decoder(b"mfhd", "Movie Fragment Header Box", mfhd)
        .with_decoder(b"traf", "Track Fragment Box", container)
        .with_decoder(b"tfhd", "Track Fragment Header Box", tfhd)
        .with_decoder(b"tfdt", "Track Fragment Decode Time Box", tfdt)
        .with_decoder(b"trun", "Track Run Box", trun)
        .with_decoder(b"mfra", "Movie Fragment Random Access Box", container)
        .with_decoder(b"sidx", "Segment Index Box", sidx)
        .with_decoder(b"sinf", "Protection Scheme Information Box", container)
        .with_decoder(b"schi", "Scheme Information Box", container)
        .with_decoder(b"pasp", "Pixel Aspect Ratio Box", pasp)
        .with_decoder(b"btrt", "Bit Rate Box", btrt)
}
