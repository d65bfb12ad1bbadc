#![allow(dead_code)]

use mp4tree::{BoxRef, parse_boxes};
use std::io::Cursor;

/// Plain box: 32-bit size + type + payload.
pub fn bx(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&(8 + payload.len() as u32).to_be_bytes());
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

/// Full box: version + 24-bit flags ahead of the payload.
pub fn full_bx(typ: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![version];
    p.extend_from_slice(&flags.to_be_bytes()[1..]);
    p.extend_from_slice(payload);
    bx(typ, &p)
}

pub fn cat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn parse(data: Vec<u8>) -> Vec<BoxRef> {
    parse_boxes(&mut Cursor::new(data)).expect("parse_boxes failed")
}

pub fn ftyp() -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(b"isom");
    p.extend_from_slice(&512u32.to_be_bytes());
    p.extend_from_slice(b"isom");
    p.extend_from_slice(b"avc1");
    bx(b"ftyp", &p)
}

pub fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&1u32.to_be_bytes()); // creation
    p.extend_from_slice(&2u32.to_be_bytes()); // modification
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    p.extend_from_slice(&0x0100u16.to_be_bytes()); // volume 1.0
    p.extend_from_slice(&[0u8; 10]);
    p.extend_from_slice(&identity_matrix());
    p.extend_from_slice(&[0u8; 24]);
    p.extend_from_slice(&2u32.to_be_bytes()); // next_track_id
    full_bx(b"mvhd", 0, 0, &p)
}

pub fn identity_matrix() -> Vec<u8> {
    let words: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

pub fn tkhd_v0(track_id: u32, width: u16, height: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&track_id.to_be_bytes());
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(&1000u32.to_be_bytes()); // duration
    p.extend_from_slice(&[0u8; 8]);
    p.extend_from_slice(&0i16.to_be_bytes()); // layer
    p.extend_from_slice(&0i16.to_be_bytes()); // alternate_group
    p.extend_from_slice(&0u16.to_be_bytes()); // volume
    p.extend_from_slice(&[0u8; 2]);
    p.extend_from_slice(&identity_matrix());
    p.extend_from_slice(&((width as u32) << 16).to_be_bytes());
    p.extend_from_slice(&((height as u32) << 16).to_be_bytes());
    full_bx(b"tkhd", 0, 0x000003, &p)
}

pub fn mdhd_v0(timescale: u32, duration: u32, lang: &[u8; 3]) -> Vec<u8> {
    let code = lang
        .iter()
        .fold(0u16, |acc, c| (acc << 5) | (*c - 0x60) as u16);
    let mut p = Vec::new();
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&0u32.to_be_bytes());
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.extend_from_slice(&code.to_be_bytes());
    p.extend_from_slice(&[0u8; 2]);
    full_bx(b"mdhd", 0, 0, &p)
}

pub fn hdlr(handler: &[u8; 4], name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(handler);
    p.extend_from_slice(&[0u8; 12]);
    p.extend_from_slice(name.as_bytes());
    p.push(0);
    full_bx(b"hdlr", 0, 0, &p)
}

/// Minimal avcC: version, profile, compatibility, level. 12 bytes total.
pub fn avcc_min() -> Vec<u8> {
    bx(b"avcC", &[1, 0x64, 0x00, 0x1f])
}

/// The 78-byte visual sample entry payload, ending in the 0xffff marker.
pub fn visual_fields(width: u16, height: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 6]);
    p.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    p.extend_from_slice(&[0u8; 16]);
    p.extend_from_slice(&width.to_be_bytes());
    p.extend_from_slice(&height.to_be_bytes());
    p.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    p.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    p.extend_from_slice(&[0u8; 4]);
    p.extend_from_slice(&1u16.to_be_bytes()); // frame_count
    let mut name = [0u8; 32];
    name[0] = 4;
    name[1..5].copy_from_slice(b"x264");
    p.extend_from_slice(&name);
    p.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    p.extend_from_slice(&(-1i16).to_be_bytes()); // pre_defined
    assert_eq!(p.len(), 78);
    p
}

pub fn avc1(children: &[u8]) -> Vec<u8> {
    let mut p = visual_fields(1920, 1080);
    p.extend_from_slice(children);
    bx(b"avc1", &p)
}

/// 28-byte version 0 audio sample entry payload.
pub fn audio_fields(channels: u16, rate: u16) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&[0u8; 6]);
    p.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    p.extend_from_slice(&[0u8; 8]); // version, revision, vendor
    p.extend_from_slice(&channels.to_be_bytes());
    p.extend_from_slice(&16u16.to_be_bytes()); // sample_size
    p.extend_from_slice(&[0u8; 4]); // compression_id, packet_size
    p.extend_from_slice(&((rate as u32) << 16).to_be_bytes());
    assert_eq!(p.len(), 28);
    p
}

pub fn mp4a(children: &[u8]) -> Vec<u8> {
    let mut p = audio_fields(2, 44100);
    p.extend_from_slice(children);
    bx(b"mp4a", &p)
}

/// esds carrying an AAC-LC ES_Descriptor.
pub fn esds_aac() -> Vec<u8> {
    let asc = [0x12, 0x10]; // AAC LC, 44.1 kHz, stereo
    let mut dsi = vec![0x05, asc.len() as u8];
    dsi.extend_from_slice(&asc);

    let mut dcd_body = vec![0x40, (0x05 << 2) | 1];
    dcd_body.extend_from_slice(&[0x00, 0x18, 0x00]); // buffer_size_db
    dcd_body.extend_from_slice(&128_000u32.to_be_bytes());
    dcd_body.extend_from_slice(&96_000u32.to_be_bytes());
    dcd_body.extend_from_slice(&dsi);
    let mut dcd = vec![0x04, dcd_body.len() as u8];
    dcd.extend_from_slice(&dcd_body);

    let mut es_body = vec![0x00, 0x01, 0x00]; // es_id 1, no flags
    es_body.extend_from_slice(&dcd);
    es_body.extend_from_slice(&[0x06, 0x01, 0x02]); // SLConfigDescriptor
    let mut es = vec![0x03, 0x80, 0x80, 0x80, es_body.len() as u8];
    es.extend_from_slice(&es_body);

    full_bx(b"esds", 0, 0, &es)
}

pub fn stsd(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut p = (entries.len() as u32).to_be_bytes().to_vec();
    for e in entries {
        p.extend_from_slice(e);
    }
    full_bx(b"stsd", 0, 0, &p)
}

/// ftyp + moov (one video track) + mdat.
pub fn sample_movie() -> Vec<u8> {
    let stts = full_bx(b"stts", 0, 0, &[0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0x03, 0xe8]);
    let stsc = full_bx(b"stsc", 0, 0, &[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 1]);
    let stsz = full_bx(
        b"stsz",
        0,
        0,
        &[0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 4, 0, 0, 0, 4, 0, 0, 0, 4],
    );
    let stco = full_bx(b"stco", 0, 0, &[0, 0, 0, 1, 0, 0, 0x02, 0x00]);
    let stbl = bx(
        b"stbl",
        &cat(&[stsd(&[avc1(&avcc_min())]), stts, stsc, stsz, stco]),
    );
    let url = full_bx(b"url ", 0, 1, &[]);
    let dref = full_bx(b"dref", 0, 0, &cat(&[vec![0, 0, 0, 1], url]));
    let dinf = bx(b"dinf", &dref);
    let vmhd = full_bx(b"vmhd", 0, 1, &[0u8; 8]);
    let minf = bx(b"minf", &cat(&[vmhd, dinf, stbl]));
    let mdia = bx(
        b"mdia",
        &cat(&[mdhd_v0(90000, 3000, b"eng"), hdlr(b"vide", "VideoHandler"), minf]),
    );
    let trak = bx(b"trak", &cat(&[tkhd_v0(1, 1920, 1080), mdia]));
    let moov = bx(b"moov", &cat(&[mvhd_v0(1000, 1000), trak]));
    let mdat = bx(b"mdat", &[0xAA; 12]);
    cat(&[ftyp(), moov, mdat])
}
