pub mod api;
pub mod boxes;
pub mod decoders;
pub mod error;
pub mod fields;
pub mod json;
pub mod parser;
pub mod reader;
pub mod registry;

pub use api::{parse_boxes, parse_boxes_with, parse_file};
pub use boxes::{Body, BoxHeader, BoxKey, BoxRef, BoxSize, FourCC, FullBoxHeader, NodeKind, find_path};
pub use error::{ParseError, Result};
pub use fields::{FieldValue, Fields};
pub use parser::{ParseOptions, TreeBuilder, read_box_header};
pub use reader::Reader;
pub use registry::{BoxDecoder, BoxFactory, Registry, Scope};
