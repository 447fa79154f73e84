#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Write an editor-style polygon record with rectangle shapes `(label, a, b)`.
pub fn write_polygon_json(
    path: &Path,
    width: u32,
    height: u32,
    shapes: &[(&str, [f64; 2], [f64; 2])],
) {
    let shapes: Vec<serde_json::Value> = shapes
        .iter()
        .map(|(label, a, b)| {
            serde_json::json!({
                "label": label,
                "points": [a, b],
                "group_id": null,
                "shape_type": "rectangle",
                "flags": {}
            })
        })
        .collect();
    let image_name = path
        .with_extension("bmp")
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let record = serde_json::json!({
        "version": "5.4.1",
        "flags": {},
        "shapes": shapes,
        "imagePath": image_name,
        "imageData": null,
        "imageHeight": height,
        "imageWidth": width
    });
    fs::write(path, serde_json::to_vec_pretty(&record).expect("serialize record"))
        .expect("write polygon json");
}

pub fn write_manifest(path: &Path, lines: &[&str]) {
    fs::write(path, lines.join("\n") + "\n").expect("write manifest");
}

/// `count` labeled 100x50 BMP samples named `sample_00.bmp`.. in `dir`, each
/// with one `dent` box spanning the left half of the image.
pub fn detection_source(dir: &Path, count: usize) -> Vec<PathBuf> {
    fs::create_dir_all(dir).expect("create source dir");
    (0..count)
        .map(|i| {
            let json = dir.join(format!("sample_{i:02}.json"));
            write_bmp(&json.with_extension("bmp"), 100, 50);
            write_polygon_json(&json, 100, 50, &[("dent", [0.0, 0.0], [50.0, 50.0])]);
            json
        })
        .collect()
}

/// Sorted classification tree: one directory per `(class, image count)`.
pub fn classification_source(dir: &Path, classes: &[(&str, usize)]) {
    for (class, count) in classes {
        for i in 0..*count {
            write_bmp(&dir.join(class).join(format!("{class}_{i}.bmp")), 8, 8);
        }
    }
}

/// Names of the files directly inside `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
