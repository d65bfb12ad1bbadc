mod common;

use common::*;
use mp4tree::{BoxRef, FieldValue, Fields, NodeKind};

fn get<'a>(b: &'a BoxRef, name: &str) -> &'a FieldValue {
    b.fields
        .get(name)
        .unwrap_or_else(|| panic!("{} has no field {name}", b.typ()))
}

fn rows(v: &FieldValue) -> &[Fields] {
    match v {
        FieldValue::Entries(rows) => rows,
        other => panic!("expected table rows, got {other:?}"),
    }
}

#[test]
fn ftyp_brands() {
    let top = parse(ftyp());
    let b = &top[0];
    assert_eq!(b.name(), Some("File Type Box"));
    assert!(b.full.is_none());
    assert_eq!(get(b, "major_brand").as_str(), Some("isom"));
    assert_eq!(get(b, "minor_version").as_u64(), Some(512));
    assert_eq!(get(b, "compatible_brands").to_string(), "[isom, avc1]");
}

#[test]
fn mvhd_version_0() {
    let top = parse(mvhd_v0(1000, 5000));
    let b = &top[0];
    assert_eq!(get(b, "creation_time").as_u64(), Some(1));
    assert_eq!(get(b, "modification_time").as_u64(), Some(2));
    assert_eq!(get(b, "timescale").as_u64(), Some(1000));
    assert_eq!(get(b, "duration").as_u64(), Some(5000));
    assert_eq!(get(b, "rate").as_f64(), Some(1.0));
    assert_eq!(get(b, "volume").as_f64(), Some(1.0));
    assert_eq!(get(b, "next_track_id").as_u64(), Some(2));
    match get(b, "matrix") {
        FieldValue::List(m) => {
            assert_eq!(m.len(), 9);
            assert_eq!(m[0].to_string(), "0x00010000");
            assert_eq!(m[8].to_string(), "0x40000000");
        }
        other => panic!("matrix is {other:?}"),
    }
}

#[test]
fn mvhd_version_1_uses_64_bit_times() {
    let mut p = Vec::new();
    p.extend_from_slice(&0x1_0000_0000u64.to_be_bytes()); // creation
    p.extend_from_slice(&3u64.to_be_bytes()); // modification
    p.extend_from_slice(&90000u32.to_be_bytes());
    p.extend_from_slice(&0x2_0000_0000u64.to_be_bytes()); // duration
    p.extend_from_slice(&0x0002_0000u32.to_be_bytes()); // rate 2.0
    p.extend_from_slice(&0x0080u16.to_be_bytes()); // volume 0.5
    p.extend_from_slice(&[0u8; 10]);
    p.extend_from_slice(&identity_matrix());
    p.extend_from_slice(&[0u8; 24]);
    p.extend_from_slice(&7u32.to_be_bytes());
    let top = parse(full_bx(b"mvhd", 1, 0, &p));
    let b = &top[0];

    assert_eq!(b.full.map(|f| f.version), Some(1));
    assert_eq!(get(b, "creation_time").as_u64(), Some(0x1_0000_0000));
    assert_eq!(get(b, "duration").as_u64(), Some(0x2_0000_0000));
    assert_eq!(get(b, "rate").as_f64(), Some(2.0));
    assert_eq!(get(b, "volume").as_f64(), Some(0.5));
    assert_eq!(get(b, "next_track_id").as_u64(), Some(7));
}

#[test]
fn mvhd_negative_rate() {
    let mut data = mvhd_v0(1000, 5000);
    // header, version/flags, then four 32-bit fields
    let at = 8 + 4 + 16;
    data[at..at + 4].copy_from_slice(&0xFFFF_0000u32.to_be_bytes());
    let top = parse(data);
    assert_eq!(get(&top[0], "rate").as_f64(), Some(-1.0));
}

#[test]
fn tkhd_dimensions_and_flags() {
    let top = parse(tkhd_v0(3, 1280, 720));
    let b = &top[0];
    assert_eq!(b.full.map(|f| f.flags), Some(3));
    assert_eq!(get(b, "track_id").as_u64(), Some(3));
    assert_eq!(get(b, "duration").as_u64(), Some(1000));
    assert_eq!(get(b, "width").as_f64(), Some(1280.0));
    assert_eq!(get(b, "height").as_f64(), Some(720.0));
    assert_eq!(get(b, "layer").as_i64(), Some(0));
}

#[test]
fn mdhd_unpacks_language() {
    let top = parse(mdhd_v0(48000, 96000, b"eng"));
    let b = &top[0];
    assert_eq!(get(b, "timescale").as_u64(), Some(48000));
    assert_eq!(get(b, "language").as_str(), Some("eng"));

    // All-zero language code reads as "und".
    let mut p = vec![0u8; 16];
    p.extend_from_slice(&[0, 0, 0, 0]);
    let top = parse(full_bx(b"mdhd", 0, 0, &p));
    assert_eq!(get(&top[0], "language").as_str(), Some("und"));
}

#[test]
fn hdlr_name_drops_trailing_nul() {
    let top = parse(hdlr(b"soun", "SoundHandler"));
    let b = &top[0];
    assert_eq!(get(b, "handler_type").as_str(), Some("soun"));
    assert_eq!(get(b, "name").as_str(), Some("SoundHandler"));
}

#[test]
fn sample_tables() {
    let top = parse(sample_movie());
    let stbl = mp4tree::find_path(&top, "moov.trak.mdia.minf.stbl").unwrap();

    let stts = stbl.child(b"stts").unwrap();
    let r = rows(get(stts, "entries"));
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].get("sample_count").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(r[0].get("sample_delta").and_then(|v| v.as_u64()), Some(1000));

    let stsc = stbl.child(b"stsc").unwrap();
    assert_eq!(
        get(stsc, "entries").to_string(),
        "[{first_chunk=1, samples_per_chunk=3, sample_description_index=1}]"
    );

    let stsz = stbl.child(b"stsz").unwrap();
    assert_eq!(get(stsz, "sample_size").as_u64(), Some(0));
    assert_eq!(get(stsz, "entry_sizes").to_string(), "[4, 4, 4]");

    let stco = stbl.child(b"stco").unwrap();
    assert_eq!(get(stco, "chunk_offsets").to_string(), "[512]");
}

#[test]
fn stsz_with_constant_size_has_no_table() {
    let top = parse(full_bx(b"stsz", 0, 0, &[0, 0, 0x10, 0, 0, 0, 0, 50]));
    let b = &top[0];
    assert_eq!(get(b, "sample_size").as_u64(), Some(4096));
    assert_eq!(get(b, "sample_count").as_u64(), Some(50));
    assert!(b.fields.get("entry_sizes").is_none());
}

#[test]
fn ctts_version_1_offsets_are_signed() {
    let mut p = 2u32.to_be_bytes().to_vec();
    p.extend_from_slice(&1u32.to_be_bytes());
    p.extend_from_slice(&(-512i32).to_be_bytes());
    p.extend_from_slice(&4u32.to_be_bytes());
    p.extend_from_slice(&1024i32.to_be_bytes());
    let top = parse(full_bx(b"ctts", 1, 0, &p));
    let r = rows(get(&top[0], "entries"));

    assert_eq!(r[0].get("sample_offset").and_then(|v| v.as_i64()), Some(-512));
    assert_eq!(r[1].get("sample_count").and_then(|v| v.as_u64()), Some(4));
    assert_eq!(r[1].get("sample_offset").and_then(|v| v.as_i64()), Some(1024));
}

#[test]
fn co64_offsets() {
    let mut p = 1u32.to_be_bytes().to_vec();
    p.extend_from_slice(&0x1_0000_0010u64.to_be_bytes());
    let top = parse(full_bx(b"co64", 0, 0, &p));
    assert_eq!(get(&top[0], "chunk_offsets").to_string(), "[4294967312]");
}

#[test]
fn table_shorter_than_its_count_is_damaged() {
    // stco promises 10 offsets but carries one.
    let p = [0, 0, 0, 10, 0, 0, 0, 1];
    let top = parse(bx(b"moov", &full_bx(b"stco", 0, 0, &p)));
    let stco = &top[0].children()[0];
    assert!(matches!(stco.kind, NodeKind::Damaged { .. }));
    assert!(stco.fields.is_empty());
}

#[test]
fn elst_version_1() {
    let mut p = 1u32.to_be_bytes().to_vec();
    p.extend_from_slice(&10_000u64.to_be_bytes());
    p.extend_from_slice(&(-1i64).to_be_bytes());
    p.extend_from_slice(&1i16.to_be_bytes());
    p.extend_from_slice(&0i16.to_be_bytes());
    let top = parse(bx(b"edts", &full_bx(b"elst", 1, 0, &p)));
    let elst = &top[0].children()[0];
    let r = rows(get(elst, "entries"));

    assert_eq!(r[0].get("segment_duration").and_then(|v| v.as_u64()), Some(10_000));
    assert_eq!(r[0].get("media_time").and_then(|v| v.as_i64()), Some(-1));
    assert_eq!(r[0].get("media_rate_integer").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn tfhd_optional_fields_follow_flags() {
    // default-base-is-moof plus duration and flags present
    let flags = 0x020000 | 0x000008 | 0x000020;
    let mut p = 1u32.to_be_bytes().to_vec();
    p.extend_from_slice(&1001u32.to_be_bytes());
    p.extend_from_slice(&0x0101_0000u32.to_be_bytes());
    let top = parse(full_bx(b"tfhd", 0, flags, &p));
    let b = &top[0];

    assert_eq!(b.fields.names(), ["track_id", "default_sample_duration", "default_sample_flags"]);
    assert_eq!(get(b, "default_sample_duration").as_u64(), Some(1001));
    assert_eq!(get(b, "default_sample_flags").to_string(), "0x01010000");
    assert_eq!(b.header_summary()[4].1, "0x020028");
}

#[test]
fn trun_per_sample_rows() {
    // data offset + sample size + composition offset, version 1
    let flags = 0x000001 | 0x000200 | 0x000800;
    let mut p = 2u32.to_be_bytes().to_vec();
    p.extend_from_slice(&96i32.to_be_bytes());
    for (size, cto) in [(1000u32, 0i32), (500, -2002)] {
        p.extend_from_slice(&size.to_be_bytes());
        p.extend_from_slice(&cto.to_be_bytes());
    }
    let top = parse(full_bx(b"trun", 1, flags, &p));
    let b = &top[0];

    assert_eq!(get(b, "sample_count").as_u64(), Some(2));
    assert_eq!(get(b, "data_offset").as_i64(), Some(96));
    let samples = rows(get(b, "samples"));
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].names(), ["size", "composition_time_offset"]);
    assert_eq!(
        samples[1].get("composition_time_offset").and_then(|v| v.as_i64()),
        Some(-2002)
    );
}

#[test]
fn fragment_tree() {
    let mfhd = full_bx(b"mfhd", 0, 0, &9u32.to_be_bytes());
    let tfdt = full_bx(b"tfdt", 1, 0, &0x1_0000_0000u64.to_be_bytes());
    let traf = bx(b"traf", &cat(&[full_bx(b"tfhd", 0, 0, &1u32.to_be_bytes()), tfdt]));
    let moof = bx(b"moof", &cat(&[mfhd, traf]));
    let top = parse(moof);

    let moof = &top[0];
    assert_eq!(get(moof.child(b"mfhd").unwrap(), "sequence_number").as_u64(), Some(9));
    let tfdt = moof.find_path("traf.tfdt").unwrap();
    assert_eq!(get(tfdt, "base_media_decode_time").as_u64(), Some(0x1_0000_0000));
}

#[test]
fn sidx_references() {
    let mut p = 1u32.to_be_bytes().to_vec(); // reference_id
    p.extend_from_slice(&1000u32.to_be_bytes()); // timescale
    p.extend_from_slice(&0u32.to_be_bytes()); // earliest_presentation_time
    p.extend_from_slice(&0u32.to_be_bytes()); // first_offset
    p.extend_from_slice(&[0, 0]);
    p.extend_from_slice(&1u16.to_be_bytes());
    p.extend_from_slice(&5000u32.to_be_bytes()); // type 0, size 5000
    p.extend_from_slice(&2000u32.to_be_bytes());
    p.extend_from_slice(&0x9000_0000u32.to_be_bytes()); // SAP, type 1
    let top = parse(full_bx(b"sidx", 0, 0, &p));
    let refs = rows(get(&top[0], "references"));

    assert_eq!(refs.len(), 1);
    assert_eq!(
        refs[0].to_string(),
        "{reference_type=0, referenced_size=5000, subsegment_duration=2000, \
         starts_with_sap=1, sap_type=1, sap_delta_time=0}"
    );
}

#[test]
fn meta_full_box_and_quicktime_variant() {
    let hdlr = hdlr(b"mdir", "");
    let iso = full_bx(b"meta", 0, 0, &hdlr);
    let qt = bx(b"meta", &hdlr);
    let top = parse(cat(&[iso, qt]));

    assert_eq!(top[0].full.map(|f| f.version), Some(0));
    assert_eq!(top[0].children()[0].typ().to_string(), "hdlr");
    assert_eq!(top[0].children()[0].start_offset(), 12);

    assert!(top[1].full.is_none());
    assert_eq!(top[1].children()[0].typ().to_string(), "hdlr");
    assert_eq!(top[1].children()[0].start_offset(), top[1].start_offset() + 8);
}

#[test]
fn url_self_contained_has_no_location() {
    let top = parse(full_bx(b"url ", 0, 1, &[]));
    assert!(top[0].fields.is_empty());

    let top = parse(full_bx(b"url ", 0, 0, b"http://x\0"));
    assert_eq!(get(&top[0], "location").as_str(), Some("http://x"));
}

#[test]
fn pasp_inside_sample_entry_uses_standard_decoder() {
    let pasp = bx(b"pasp", &[0, 0, 0, 4, 0, 0, 0, 3]);
    let top = parse(avc1(&cat(&[avcc_min(), pasp])));
    let kids = top[0].children();
    assert_eq!(kids.len(), 2);
    assert_eq!(get(&kids[1], "h_spacing").as_u64(), Some(4));
    assert_eq!(get(&kids[1], "v_spacing").as_u64(), Some(3));
}
