use crate::fields::Fields;
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn from_str(s: &str) -> Option<Self> {
        let b = s.as_bytes();
        if b.len() == 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }
    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}
impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}
impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

/// Registry key: a plain 4CC, or the extended type of a `uuid` box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKey {
    FourCC(FourCC),
    Uuid([u8; 16]),
}

impl From<FourCC> for BoxKey {
    fn from(cc: FourCC) -> Self {
        BoxKey::FourCC(cc)
    }
}

impl From<&[u8; 4]> for BoxKey {
    fn from(cc: &[u8; 4]) -> Self {
        BoxKey::FourCC(FourCC(*cc))
    }
}

/// Size as written in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSize {
    /// Total size including the header.
    Exact(u64),
    /// Size field 0: the box runs to the end of the enclosing range.
    ToEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    pub size: BoxSize,
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    pub header_size: u64, // 8, 16, 24 or 32
    pub start: u64,       // file offset of header start
}

impl BoxHeader {
    pub fn key(&self) -> BoxKey {
        match self.uuid {
            Some(u) => BoxKey::Uuid(u),
            None => BoxKey::FourCC(self.typ),
        }
    }

    /// Declared size, with `ToEnd` resolved against the enclosing range end.
    pub fn resolve_size(&self, range_end: u64) -> u64 {
        match self.size {
            BoxSize::Exact(n) => n,
            BoxSize::ToEnd => range_end.saturating_sub(self.start),
        }
    }

    pub fn payload_start(&self) -> u64 {
        self.start + self.header_size
    }
}

/// Version and flags that open every "full box" payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullBoxHeader {
    pub version: u8,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A registered decoder interpreted the payload.
    Decoded { name: &'static str },
    /// No decoder is registered for this type; header and range only.
    Unknown,
    /// A decoder is registered but the payload couldn't be read.
    Damaged { reason: String },
}

/// What a decoder produces for a box; the tree builder wraps it into a [`BoxRef`].
#[derive(Debug, Default)]
pub struct Body {
    pub full: Option<FullBoxHeader>,
    pub fields: Fields,
    pub children: Vec<BoxRef>,
}

impl Body {
    pub fn new(fields: Fields) -> Self {
        Body {
            full: None,
            fields,
            children: Vec::new(),
        }
    }

    pub fn full(full: FullBoxHeader, fields: Fields) -> Self {
        Body {
            full: Some(full),
            fields,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<BoxRef>) -> Self {
        self.children = children;
        self
    }
}

/// One decoded box and, recursively, its children.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxRef {
    pub hdr: BoxHeader,
    /// Resolved declared size (`ToEnd` already expanded).
    pub size: u64,
    pub kind: NodeKind,
    /// The source ends before `start + size`; only the bytes present were decoded.
    pub truncated: bool,
    pub full: Option<FullBoxHeader>,
    pub fields: Fields,
    pub children: Vec<BoxRef>,
}

impl BoxRef {
    /// An opaque box: header and range only.
    pub fn opaque(hdr: BoxHeader, size: u64, kind: NodeKind) -> Self {
        BoxRef {
            hdr,
            size,
            kind,
            truncated: false,
            full: None,
            fields: Fields::new(),
            children: Vec::new(),
        }
    }

    pub fn typ(&self) -> FourCC {
        self.hdr.typ
    }

    pub fn start_offset(&self) -> u64 {
        self.hdr.start
    }

    pub fn end_offset(&self) -> u64 {
        self.hdr.start + self.size
    }

    pub fn children(&self) -> &[BoxRef] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_opaque(&self) -> bool {
        !matches!(self.kind, NodeKind::Decoded { .. })
    }

    pub fn name(&self) -> Option<&'static str> {
        match self.kind {
            NodeKind::Decoded { name } => Some(name),
            _ => None,
        }
    }

    /// Header fields as ordered key/value text.
    pub fn header_summary(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("size".to_string(), self.size.to_string()),
            ("type".to_string(), self.hdr.typ.to_string()),
            ("header_size".to_string(), self.hdr.header_size.to_string()),
        ];
        if self.hdr.size == BoxSize::ToEnd {
            out.push(("extends_to_end".to_string(), "true".to_string()));
        }
        if self.truncated {
            out.push(("truncated".to_string(), "true".to_string()));
        }
        if let Some(u) = self.hdr.uuid {
            out.push(("uuid".to_string(), hex::encode(u)));
        }
        if let Some(fb) = self.full {
            out.push(("version".to_string(), fb.version.to_string()));
            out.push(("flags".to_string(), format!("{:#08x}", fb.flags)));
        }
        out
    }

    /// Decoded fields as ordered key/value text (empty for opaque boxes).
    pub fn field_summary(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// First direct child of the given type.
    pub fn child(&self, typ: &[u8; 4]) -> Option<&BoxRef> {
        self.children.iter().find(|c| c.hdr.typ == typ)
    }

    /// Walk a dotted path below this box, e.g. `mdia.minf.stbl` or `trak[1]`.
    pub fn find_path(&self, path: &str) -> Option<&BoxRef> {
        find_path(&self.children, path)
    }

    /// This box and all descendants, depth first.
    pub fn descendants(&self) -> Vec<&BoxRef> {
        let mut out = vec![self];
        for c in &self.children {
            out.extend(c.descendants());
        }
        out
    }
}

/// Resolve a dotted path like `moov.trak[0].mdia` against a list of sibling boxes.
pub fn find_path<'a>(roots: &'a [BoxRef], path: &str) -> Option<&'a BoxRef> {
    let mut level = roots;
    let mut found = None;
    for seg in path.split('.') {
        let (name, idx) = parse_segment(seg);
        let cc = FourCC::from_str(name)?;
        let hit = level
            .iter()
            .filter(|b| b.hdr.typ == cc)
            .nth(idx.unwrap_or(0))?;
        level = &hit.children;
        found = Some(hit);
    }
    found
}

pub(crate) fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}
