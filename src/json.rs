use crate::boxes::{BoxRef, NodeKind};
use crate::fields::Fields;
use serde::Serialize;

/// A JSON-serializable representation of a single decoded box.
///
/// This is what `mp4tree --json` prints and what a UI front end would consume.
#[derive(Serialize)]
pub struct JsonBox {
    /// Absolute byte offset of this box in the file
    pub offset: u64,
    /// Total size including header (size-0 boxes resolved)
    pub size: u64,
    pub header_size: u64,
    #[serde(rename = "type")]
    pub typ: String,
    /// Extended type of `uuid` boxes, hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Registry name, e.g. "Movie Header Box"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'static str>,
    /// "decoded", "unknown" or "damaged"
    pub kind: &'static str,
    /// Present and true when the source ends inside this box
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    pub fields: Fields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<JsonBox>,
}

impl From<&BoxRef> for JsonBox {
    fn from(b: &BoxRef) -> Self {
        let (kind, error) = match &b.kind {
            NodeKind::Decoded { .. } => ("decoded", None),
            NodeKind::Unknown => ("unknown", None),
            NodeKind::Damaged { reason } => ("damaged", Some(reason.clone())),
        };
        JsonBox {
            offset: b.start_offset(),
            size: b.size,
            header_size: b.hdr.header_size,
            typ: b.typ().to_string(),
            uuid: b.hdr.uuid.map(hex::encode),
            name: b.name(),
            kind,
            truncated: b.truncated,
            error,
            version: b.full.map(|fb| fb.version),
            flags: b.full.map(|fb| fb.flags),
            fields: b.fields.clone(),
            children: b.children.iter().map(JsonBox::from).collect(),
        }
    }
}

pub fn to_json_tree(boxes: &[BoxRef]) -> Vec<JsonBox> {
    boxes.iter().map(JsonBox::from).collect()
}

pub fn to_json_string(boxes: &[BoxRef]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_json_tree(boxes))
}
