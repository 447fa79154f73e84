mod common;

use std::fs;

use dltrainer::catalog::ClassCatalog;
use dltrainer::dataset::classification::convert_and_split_classification;
use dltrainer::dataset::{DatasetDescriptor, SplitOptions};
use dltrainer::TrainerError;

#[test]
fn each_class_is_split_independently() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let source = temp.path().join("sorted");
    common::classification_source(&source, &[("ok", 10), ("ng", 5)]);
    let out = temp.path().join("dataset");
    let catalog = ClassCatalog::from_labels(["ok", "ng"]);

    let report =
        convert_and_split_classification(&source, &out, &catalog, &SplitOptions::new(0.8))
            .expect("split dataset");

    assert_eq!((report.total, report.train, report.val), (15, 12, 3));
    assert_eq!(common::file_names(&out.join("train/ok")).len(), 8);
    assert_eq!(common::file_names(&out.join("val/ok")).len(), 2);
    assert_eq!(common::file_names(&out.join("train/ng")).len(), 4);
    assert_eq!(common::file_names(&out.join("val/ng")).len(), 1);

    let mut ok: Vec<String> = common::file_names(&out.join("train/ok"));
    ok.extend(common::file_names(&out.join("val/ok")));
    ok.sort();
    assert_eq!(ok, common::file_names(&source.join("ok")));

    assert!(!out.join("labels").exists());
    assert_eq!(report.training_input(), report.root.as_path());
}

#[test]
fn descriptor_uses_subset_directories() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let source = temp.path().join("sorted");
    common::classification_source(&source, &[("cat", 3), ("dog", 3)]);
    let catalog = ClassCatalog::from_labels(["dog", "cat"]);

    let report = convert_and_split_classification(
        &source,
        &temp.path().join("dataset"),
        &catalog,
        &SplitOptions::new(0.5),
    )
    .expect("split dataset");

    let descriptor = DatasetDescriptor::read(&report.descriptor).expect("read descriptor");
    assert_eq!(descriptor.train, "train");
    assert_eq!(descriptor.val, "val");
    assert_eq!(descriptor.names.get(&0).map(String::as_str), Some("dog"));
}

#[test]
fn stray_top_level_file_names_the_offending_path() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let source = temp.path().join("sorted");
    common::classification_source(&source, &[("ok", 2), ("ng", 2)]);
    fs::write(source.join("loose.bmp"), common::bmp_bytes(4, 4)).expect("write stray image");
    let out = temp.path().join("dataset");

    let err = convert_and_split_classification(
        &source,
        &out,
        &ClassCatalog::from_labels(["ok", "ng"]),
        &SplitOptions::new(0.8),
    )
    .unwrap_err();

    assert!(matches!(err, TrainerError::Validation { .. }));
    assert!(err.to_string().contains("loose.bmp"));
    assert!(!out.exists());
}

#[test]
fn catalog_order_does_not_matter_for_validation() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let source = temp.path().join("sorted");
    common::classification_source(&source, &[("a", 2), ("b", 2), ("c", 2)]);

    let result = convert_and_split_classification(
        &source,
        &temp.path().join("dataset"),
        &ClassCatalog::from_labels(["c", "a", "b"]),
        &SplitOptions::new(0.5),
    );
    assert!(result.is_ok());
}

#[test]
fn nested_images_sharing_a_file_name_are_skipped_not_overwritten() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let source = temp.path().join("sorted");
    common::write_bmp(&source.join("ok/a/img.bmp"), 8, 8);
    common::write_bmp(&source.join("ok/b/img.bmp"), 8, 8);
    common::write_bmp(&source.join("ng/x.bmp"), 8, 8);
    let out = temp.path().join("dataset");

    let report = convert_and_split_classification(
        &source,
        &out,
        &ClassCatalog::from_labels(["ok", "ng"]),
        &SplitOptions::new(1.0),
    )
    .expect("split dataset");

    assert_eq!((report.total, report.train, report.val), (3, 2, 0));
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("ok/b/img.bmp"));
    assert!(report.skipped[0].reason.contains("duplicate file name"));
    assert_eq!(report.written(), 2);
    assert_eq!(common::file_names(&out.join("train/ok")), ["img.bmp"]);
    assert_eq!(common::file_names(&out.join("train/ng")), ["x.bmp"]);
}
