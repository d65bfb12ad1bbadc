use crate::{
    boxes::BoxRef,
    error::Result,
    parser::{ParseOptions, TreeBuilder},
    reader::Reader,
    registry::BoxFactory,
};
use anyhow::Context;
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};
use tracing::debug;

/// Decode the complete box tree of an MP4/ISOBMFF source.
///
/// Uses the default standard + vendor registries. Malformed or truncated
/// boxes never fail the call; they show up as shortened child lists or
/// damaged boxes. Only I/O errors from the source itself are returned.
///
/// # Example
/// ```no_run
/// use mp4tree::parse_boxes;
/// use std::fs::File;
///
/// let mut file = File::open("video.mp4")?;
/// for b in parse_boxes(&mut file)? {
///     println!("{} at {:#x}", b.typ(), b.start_offset());
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_boxes<R: Read + Seek>(r: &mut R) -> Result<Vec<BoxRef>> {
    let factory = BoxFactory::default();
    parse_boxes_with(r, &factory, ParseOptions::default())
}

/// Like [`parse_boxes`], with an explicit factory and options.
pub fn parse_boxes_with<R: Read + Seek>(
    r: &mut R,
    factory: &BoxFactory,
    options: ParseOptions,
) -> Result<Vec<BoxRef>> {
    let reader = Reader::new(r)?;
    debug!("decoding {} bytes", reader.len());
    TreeBuilder::new(reader, factory, options).parse_file()
}

/// Open a file and decode its box tree.
pub fn parse_file(path: impl AsRef<Path>) -> anyhow::Result<Vec<BoxRef>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut r = BufReader::new(file);
    parse_boxes(&mut r).with_context(|| format!("decoding {}", path.display()))
}
