//! Detection annotation model and conversion.
//!
//! Raw annotations arrive as polygon JSON records in pixel space. The
//! converter turns each in-catalog rectangle into a normalized
//! `class_id cx cy w h` row; the pixel/normalized distinction is carried in
//! the type of [`CornerBox`] so the two spaces cannot be mixed.

mod bbox;
pub mod convert;
pub mod polygon;

pub use bbox::{CornerBox, Normalized, Pixel};
pub use convert::{
    convert_detection_annotation, to_label_string, write_label_file, NormalizedAnnotation,
};
pub use polygon::{read_polygon_file, PolygonRecord, Shape};
