use std::collections::BTreeSet;

use dltrainer::annotation::{convert_detection_annotation, to_label_string, Shape};
use dltrainer::catalog::ClassCatalog;
use dltrainer::dataset::split::{split_samples, train_count};
use dltrainer::dataset::SplitOptions;
use proptest::prelude::*;

mod proptest_helpers;

fn catalog() -> ClassCatalog {
    ClassCatalog::from_labels(["dent", "scratch"])
}

fn image_and_corners() -> impl Strategy<Value = ((u32, u32), ([f64; 2], [f64; 2]))> {
    proptest_helpers::arb_image_size()
        .prop_flat_map(|(w, h)| (Just((w, h)), proptest_helpers::arb_corners(w, h)))
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn corner_order_does_not_change_output(
        ((w, h), (a, b)) in image_and_corners(),
        label in proptest_helpers::arb_label(),
    ) {
        let catalog = catalog();
        let forward = convert_detection_annotation(w, h, &[Shape::new(label.clone(), a, b)], &catalog);
        let backward = convert_detection_annotation(w, h, &[Shape::new(label.clone(), b, a)], &catalog);
        let mixed = convert_detection_annotation(
            w,
            h,
            &[Shape::new(label, [a[0], b[1]], [b[0], a[1]])],
            &catalog,
        );

        prop_assert_eq!(to_label_string(&forward), to_label_string(&backward));
        prop_assert_eq!(to_label_string(&forward), to_label_string(&mixed));
    }

    #[test]
    fn normalized_rows_stay_in_unit_range(
        ((w, h), (a, b)) in image_and_corners(),
    ) {
        let rows = convert_detection_annotation(w, h, &[Shape::new("dent", a, b)], &catalog());
        prop_assert_eq!(rows.len(), 1);
        let row = &rows[0];
        for value in [row.cx, row.cy, row.w, row.h] {
            prop_assert!((-proptest_helpers::EPS_LABEL..=1.0 + proptest_helpers::EPS_LABEL).contains(&value));
        }
        prop_assert!((row.cx - (a[0] + b[0]) / 2.0 / w as f64).abs() < proptest_helpers::EPS_LABEL);
        prop_assert!((row.w - (a[0] - b[0]).abs() / w as f64).abs() < proptest_helpers::EPS_LABEL);
    }

    #[test]
    fn only_catalog_labels_survive_in_input_order(
        labels in prop::collection::vec(proptest_helpers::arb_label(), 0..12),
    ) {
        let catalog = catalog();
        let shapes: Vec<Shape> = labels
            .iter()
            .map(|label| Shape::new(label.clone(), [1.0, 1.0], [5.0, 5.0]))
            .collect();
        let rows = convert_detection_annotation(10, 10, &shapes, &catalog);

        let expected: Vec<usize> = labels
            .iter()
            .filter_map(|label| catalog.index_of(label))
            .collect();
        let got: Vec<usize> = rows.iter().map(|row| row.class_id).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn split_is_a_partition_with_floor_train_count(
        total in 0usize..200,
        percent in 1u32..=100,
        seed in any::<u64>(),
    ) {
        let train_percent = percent as f64 / 100.0;
        let items: Vec<usize> = (0..total).collect();
        let plan = split_samples(items, &SplitOptions::new(train_percent).with_seed(seed));

        prop_assert_eq!(plan.train.len(), train_count(total, train_percent));
        prop_assert_eq!(plan.train.len() + plan.val.len(), total);

        let train: BTreeSet<usize> = plan.train.iter().copied().collect();
        let val: BTreeSet<usize> = plan.val.iter().copied().collect();
        prop_assert!(train.is_disjoint(&val));
        prop_assert_eq!(train.len() + val.len(), total);
    }
}
