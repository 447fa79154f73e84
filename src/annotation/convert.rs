//! Polygon shapes to normalized `class_id cx cy w h` label rows.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::bbox::{CornerBox, Pixel};
use super::polygon::Shape;
use crate::catalog::ClassCatalog;
use crate::error::TrainerError;

/// One normalized detection label row.
///
/// `cx`/`cy` are the box midpoint and `w`/`h` its absolute span, all as
/// fractions of the image width/height. Rendering uses 6 decimal digits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedAnnotation {
    pub class_id: usize,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl fmt::Display for NormalizedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.cx, self.cy, self.w, self.h
        )
    }
}

/// Convert the shapes of one image into normalized label rows.
///
/// Shapes whose label is not in `catalog` are skipped, as are shapes without
/// two corner points. Output order follows input order. An image with no
/// matching shapes yields an empty vector.
pub fn convert_detection_annotation(
    image_width: u32,
    image_height: u32,
    shapes: &[Shape],
    catalog: &ClassCatalog,
) -> Vec<NormalizedAnnotation> {
    let (img_w, img_h) = (image_width as f64, image_height as f64);

    shapes
        .iter()
        .filter_map(|shape| {
            let class_id = catalog.index_of(&shape.label)?;
            let (a, b) = shape.corners()?;
            let (cx, cy, w, h) = CornerBox::<Pixel>::from_corners(a, b)
                .to_normalized(img_w, img_h)
                .to_cxcywh();
            Some(NormalizedAnnotation {
                class_id,
                cx,
                cy,
                w,
                h,
            })
        })
        .collect()
}

/// Render label rows as file content, one newline-terminated row each.
pub fn to_label_string(rows: &[NormalizedAnnotation]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.to_string());
        out.push('\n');
    }
    out
}

/// Write label rows to `path`. An empty slice produces an empty file.
pub fn write_label_file(path: &Path, rows: &[NormalizedAnnotation]) -> Result<(), TrainerError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for row in rows {
        writeln!(writer, "{row}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Fuzz-only entrypoint: parse a polygon record and convert its shapes.
#[cfg(feature = "fuzzing")]
pub fn fuzz_convert_polygon(data: &[u8]) -> Result<(), serde_json::Error> {
    let record = super::polygon::from_polygon_slice(data)?;
    if record.image_width == 0 || record.image_height == 0 {
        return Ok(());
    }
    let catalog = ClassCatalog::from_labels(record.shapes.iter().map(|s| s.label.as_str()));
    let _ = convert_detection_annotation(
        record.image_width,
        record.image_height,
        &record.shapes,
        &catalog,
    );
    Ok(())
}
