//! Polygon annotation files written by the annotation editor.
//!
//! Only the fields the converter needs are modelled; everything else in the
//! editor's JSON (version, flags, embedded image data) is ignored.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::TrainerError;

/// One annotation record: the image size and its labeled shapes.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolygonRecord {
    #[serde(default)]
    pub image_path: Option<String>,
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

/// A labeled shape. Rectangles carry exactly two opposite corners.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Shape {
    pub label: String,
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub shape_type: Option<String>,
}

impl Shape {
    pub fn new(label: impl Into<String>, a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            label: label.into(),
            points: vec![a, b],
            shape_type: Some("rectangle".to_string()),
        }
    }

    /// The two box corners, if the shape has at least two points.
    pub fn corners(&self) -> Option<((f64, f64), (f64, f64))> {
        match self.points.as_slice() {
            [a, b, ..] => Some(((a[0], a[1]), (b[0], b[1]))),
            _ => None,
        }
    }
}

/// Read a polygon annotation file.
pub fn read_polygon_file(path: &Path) -> Result<PolygonRecord, TrainerError> {
    let data = fs::read(path)?;
    from_polygon_slice(&data).map_err(|source| TrainerError::PolygonJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a polygon annotation record from raw bytes.
pub fn from_polygon_slice(data: &[u8]) -> Result<PolygonRecord, serde_json::Error> {
    serde_json::from_slice(data)
}
