use crate::boxes::{BoxHeader, BoxRef, BoxSize, NodeKind};
use crate::error::{ParseError, Result};
use crate::reader::Reader;
use crate::registry::{BoxFactory, Scope};
use tracing::{debug, trace, warn};

/// Smallest possible box header: 32-bit size + 4CC.
pub const MIN_HEADER_SIZE: u64 = 8;

/// Read a box header at the current position.
///
/// On success the reader sits on the first payload byte. A size of 0 is
/// returned as [`BoxSize::ToEnd`]; only the caller knows where the enclosing
/// range ends.
pub fn read_box_header(r: &mut Reader<'_>) -> Result<BoxHeader> {
    let start = r.tell();
    let size32 = r.read_u32()?;
    let typ = r.read_fourcc()?;

    let mut size = match size32 {
        0 => BoxSize::ToEnd,
        n => BoxSize::Exact(n as u64),
    };
    let mut header_size = 8;

    if size32 == 1 {
        size = BoxSize::Exact(r.read_u64()?);
        header_size += 8;
    }

    let mut uuid = None;
    if typ == b"uuid" {
        uuid = Some(r.read_array::<16>()?);
        header_size += 16;
    }

    if let BoxSize::Exact(n) = size {
        if n < header_size {
            return Err(ParseError::MalformedHeader {
                offset: start,
                reason: format!("{typ}: size {n} smaller than its {header_size}-byte header"),
            });
        }
    }

    trace!("header {} at {:#x}: {:?}, {} header bytes", typ, start, size, header_size);
    Ok(BoxHeader {
        size,
        typ,
        uuid,
        header_size,
        start,
    })
}

/// Knobs for a decode pass.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Containers nested deeper than this are kept but not expanded.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

/// Recursive-descent driver: header → factory → decoder → children.
///
/// Decoders receive the builder itself so they can read their fields through
/// [`TreeBuilder::reader`] and recurse through [`TreeBuilder::children`].
pub struct TreeBuilder<'a> {
    reader: Reader<'a>,
    factory: &'a BoxFactory,
    options: ParseOptions,
    depth: usize,
    // Declared end of the box whose children are being read.
    parent_end: u64,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(reader: Reader<'a>, factory: &'a BoxFactory, options: ParseOptions) -> Self {
        Self {
            reader,
            factory,
            options,
            depth: 0,
            parent_end: u64::MAX,
        }
    }

    pub fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    /// Decode every top-level box of the source.
    pub fn parse_file(&mut self) -> Result<Vec<BoxRef>> {
        self.reader.seek_absolute(0)?;
        let end = self.reader.len();
        self.parse_children(end, Scope::Generic)
    }

    /// Decode children from the current position to the end of the box being decoded.
    pub fn children(&mut self, scope: Scope) -> Result<Vec<BoxRef>> {
        let end = self.reader.limit();
        self.parse_children(end, scope)
    }

    /// Decode sibling boxes from the current position up to `end`.
    ///
    /// Stops quietly once fewer than [`MIN_HEADER_SIZE`] bytes remain. A
    /// truncated or malformed header, or a child reaching past `end`, ends
    /// the list early; everything collected before it is returned. A child
    /// cut short by the end of the source is still decoded over the bytes
    /// that exist and flagged as truncated. Only source I/O errors propagate.
    pub fn parse_children(&mut self, end: u64, scope: Scope) -> Result<Vec<BoxRef>> {
        if self.depth >= self.options.max_depth {
            warn!(
                "max depth {} reached at {:#x}, not expanding",
                self.options.max_depth,
                self.reader.tell()
            );
            return Ok(Vec::new());
        }

        let end = end.min(self.reader.limit());
        let prev = self.reader.set_limit(end);
        let res = self.collect_children(end, scope);
        self.reader.set_limit(prev);
        res
    }

    fn collect_children(&mut self, end: u64, scope: Scope) -> Result<Vec<BoxRef>> {
        let mut kids = Vec::new();
        loop {
            let pos = self.reader.tell();
            if end.saturating_sub(pos) < MIN_HEADER_SIZE {
                break;
            }

            let hdr = match read_box_header(&mut self.reader) {
                Ok(h) => h,
                Err(e) if e.is_recoverable() => {
                    warn!("child list cut short at {:#x}: {}", pos, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let size = hdr.resolve_size(end);
            let Some(box_end) = pos.checked_add(size) else {
                warn!(
                    "{} at {:#x} declares {} bytes, past any offset, dropping it",
                    hdr.typ, pos, size
                );
                break;
            };
            if box_end > end {
                // Cut off by the end of the source: keep what can be read.
                if end == self.reader.len() && box_end <= self.parent_end {
                    warn!(
                        "{} at {:#x} declares {} bytes but the source ends after {}",
                        hdr.typ,
                        pos,
                        size,
                        end - pos
                    );
                    kids.push(self.parse_box(hdr, size, scope)?);
                } else {
                    warn!(
                        "{} at {:#x} declares {} bytes but only {} remain, dropping it",
                        hdr.typ,
                        pos,
                        size,
                        end - pos
                    );
                }
                break;
            }

            let child = self.parse_box(hdr, size, scope)?;
            // Advance by declared size only, whatever the decoder did.
            self.reader.seek_absolute(box_end)?;
            kids.push(child);
        }
        Ok(kids)
    }

    /// Dispatch one box whose header has already been read.
    ///
    /// The decoder runs with the read window narrowed to the box and the
    /// cursor on its first payload byte. Afterwards the cursor is put back
    /// on the box start, whether the decoder succeeded or not.
    pub fn parse_box(&mut self, hdr: BoxHeader, size: u64, scope: Scope) -> Result<BoxRef> {
        let factory = self.factory;
        let Some(entry) = factory.lookup(scope, &hdr.key()) else {
            debug!("{} at {:#x} ({} bytes): no decoder, opaque", hdr.typ, hdr.start, size);
            self.reader.seek_absolute(hdr.start)?;
            let truncated = hdr.start.saturating_add(size) > self.reader.len();
            let mut b = BoxRef::opaque(hdr, size, NodeKind::Unknown);
            b.truncated = truncated;
            return Ok(b);
        };

        debug!("{} at {:#x} ({} bytes): {}", hdr.typ, hdr.start, size, entry.name());
        let declared_end = hdr.start.saturating_add(size);
        let truncated = declared_end > self.reader.len();
        let prev = self.reader.set_limit(declared_end);
        let prev_parent = std::mem::replace(&mut self.parent_end, declared_end);
        self.depth += 1;
        let res = match self.reader.seek_absolute(hdr.payload_start()) {
            Ok(()) => entry.decode(self, &hdr),
            Err(e) => Err(e),
        };
        self.depth -= 1;
        self.parent_end = prev_parent;
        self.reader.set_limit(prev);
        self.reader.seek_absolute(hdr.start)?;

        match res {
            Ok(body) => Ok(BoxRef {
                hdr,
                size,
                kind: NodeKind::Decoded { name: entry.name() },
                truncated,
                full: body.full,
                fields: body.fields,
                children: body.children,
            }),
            Err(e) if e.is_recoverable() => {
                warn!("{} at {:#x} could not be decoded: {}", hdr.typ, hdr.start, e);
                let mut b = BoxRef::opaque(
                    hdr,
                    size,
                    NodeKind::Damaged {
                        reason: e.to_string(),
                    },
                );
                b.truncated = truncated;
                Ok(b)
            }
            Err(e) => Err(e),
        }
    }
}
