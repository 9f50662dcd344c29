//! Pipeline tests: material directories on disk through the store builder,
//! store reader and pair dataset.

mod fixtures;

use std::path::Path;

use tempfile::tempdir;

use ambientproc_core::{
    BuildOptions, DatasetOptions, FittingMethod, PackConfig, PackError, PairDataset, Resolution,
    StoreReader, build_store,
};

fn build_options(dataset: &Path, store: &Path, samples: usize) -> BuildOptions {
    let mut options = BuildOptions::new(dataset, store, "RANDOM_CROP", Resolution::new(8, 8));
    options.rendered_channels = vec!["canonical_render".to_string()];
    options.samples_per_material = samples;
    options.commit_interval = 2;
    options
}

fn dataset_config(root: &Path) -> PackConfig {
    let mut config = PackConfig::new("canonical", [8, 8], "RANDOM_CROP");
    config.root_dir = root.to_path_buf();
    config.use_rendered_types = vec!["canonical_render".to_string()];
    config.use_data_types = vec![
        "base_color".to_string(),
        "roughness".to_string(),
        "metallic".to_string(),
    ];
    config.fetch_pairs = vec![
        ("canonical_render".to_string(), "base_color".to_string()),
        ("canonical_render".to_string(), "metallic".to_string()),
    ];
    config.seed = Some(11);
    config
}

// ============================================================================
// Store builder
// ============================================================================

#[test]
fn test_failed_material_is_skipped() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    for name in ["Bricks001", "Gravel033", "Wood012"] {
        fixtures::write_material(&dataset, name, 16, true);
    }
    fixtures::write_material(&dataset, "Marble004", 16, false);
    let store = dir.path().join("lmdb").join("canonical");

    let report = build_store(&build_options(&dataset, &store, 2)).unwrap();

    assert_eq!(report.materials_packed, 3);
    assert_eq!(report.records_written, 6);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].material, "Marble004");
    assert!(report.skipped[0].reason.contains("canonical_render"));

    let reader = StoreReader::open(&store).unwrap();
    assert_eq!(reader.len(), 6);
    assert!(reader.keys().iter().all(|k| !k.starts_with("Marble004")));
}

#[test]
fn test_samples_per_material_keys() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    fixtures::write_material(&dataset, "Gravel033", 16, true);
    let store = dir.path().join("store");

    build_store(&build_options(&dataset, &store, 3)).unwrap();

    let reader = StoreReader::open(&store).unwrap();
    assert_eq!(reader.keys(), &["Gravel033_0", "Gravel033_1", "Gravel033_2"]);
    for key in reader.keys() {
        let record = reader.fetch_record(key).unwrap();
        let color = record.get("base_color").unwrap();
        let render = record.get("canonical_render").unwrap();
        assert_eq!(color.shape(), (3, 8, 8));
        assert_eq!(render.shape(), (3, 8, 8));
        assert_eq!(record.get("roughness").unwrap().shape(), (1, 8, 8));
    }
}

#[test]
fn test_random_crop_keeps_channels_aligned() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    fixtures::write_material(&dataset, "Tiles101", 32, true);
    let store = dir.path().join("store");

    build_store(&build_options(&dataset, &store, 4)).unwrap();

    let reader = StoreReader::open(&store).unwrap();
    for key in reader.keys() {
        let color = reader.fetch_record(key).unwrap().get("base_color").unwrap();
        // Red encodes x and green encodes y in the fixture, so a crop keeps
        // a unit step between neighbours in both planes
        let red = color.plane(0);
        let green = color.plane(1);
        assert_eq!(red[1], red[0] + 1);
        assert_eq!(green[8], green[0] + 1);
    }
}

#[test]
fn test_invalid_fitting_method_is_fatal() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    fixtures::write_material(&dataset, "Gravel033", 16, true);
    let store = dir.path().join("store");

    let mut options = build_options(&dataset, &store, 1);
    options.fitting_method = "BOGUS".to_string();
    let err = build_store(&options).unwrap_err();

    assert!(matches!(err, PackError::InvalidFittingMethod(ref m) if m == "BOGUS"));
    assert!(!store.exists());
}

#[test]
fn test_rebuild_replaces_store() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("dataset");
    fixtures::write_material(&dataset, "Bricks001", 16, true);
    fixtures::write_material(&dataset, "Gravel033", 16, true);
    let store = dir.path().join("store");

    build_store(&build_options(&dataset, &store, 1)).unwrap();
    std::fs::remove_dir_all(dataset.join("Gravel033")).unwrap();

    // Without rebuild the old keys stay
    build_store(&build_options(&dataset, &store, 1)).unwrap();
    assert_eq!(StoreReader::open(&store).unwrap().len(), 2);

    let mut options = build_options(&dataset, &store, 1);
    options.rebuild = true;
    build_store(&options).unwrap();

    assert_eq!(StoreReader::open(&store).unwrap().keys(), &["Bricks001_0"]);
    assert!(!dir.path().join("store.building").exists());
    assert!(!dir.path().join("store.old").exists());
}

#[test]
fn test_resize_method_alias() {
    let method: FittingMethod = "RANDOM_RESIZE".parse().unwrap();
    assert_eq!(method, FittingMethod::RandomResizedCrop);
}

// ============================================================================
// Pair dataset
// ============================================================================

#[test]
fn test_dataset_builds_and_zero_fills() {
    let dir = tempdir().unwrap();
    fixtures::write_material(&dir.path().join("dataset"), "Gravel033", 16, true);
    let config = dataset_config(dir.path());

    let dataset = PairDataset::open(&config, DatasetOptions::default()).unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.keys(), &["Gravel033_0"]);

    let sample = dataset.get(0).unwrap();
    assert_eq!(sample.len(), 2);

    let (render, color) = &sample[&("canonical_render".to_string(), "base_color".to_string())];
    assert_eq!(render.shape(), (3, 8, 8));
    assert_eq!(color.shape(), (3, 8, 8));
    assert!(render.as_slice().iter().all(|&v| v == 60.0 || v == 70.0 || v == 80.0));

    // The fixture has no metalness map
    let (_, metallic) = &sample[&("canonical_render".to_string(), "metallic".to_string())];
    assert_eq!(metallic.shape(), (1, 8, 8));
    assert!(metallic.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_dataset_post_transform_and_bounds() {
    let dir = tempdir().unwrap();
    fixtures::write_material(&dir.path().join("dataset"), "Gravel033", 16, true);
    let config = dataset_config(dir.path());

    let dataset = PairDataset::open(&config, DatasetOptions::default())
        .unwrap()
        .with_post_transform(|mut a| {
            a.as_mut_slice().iter_mut().for_each(|v| *v /= 255.0);
            a
        });

    let sample = dataset.get(0).unwrap();
    for (a, b) in sample.values() {
        assert!(a.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(b.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    let err = dataset.get(1).unwrap_err();
    assert!(matches!(err, PackError::IndexOutOfRange { index: 1, len: 1 }));
}

#[test]
fn test_dataset_without_auto_build() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("dataset")).unwrap();
    let config = dataset_config(dir.path());

    let options = DatasetOptions {
        rebuild: false,
        auto_build: false,
    };
    let err = PairDataset::open(&config, options).err().unwrap();
    assert!(matches!(err, PackError::StoreNotFound(_)));
}

#[test]
fn test_dataset_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let mut config = dataset_config(dir.path());
    config.fitting_method = "BOGUS".to_string();
    let err = PairDataset::open(&config, DatasetOptions::default()).err().unwrap();
    assert!(err.is_fatal());
    assert!(!config.store_path().exists());
}

#[test]
fn test_dataset_skips_disabled_pairs_and_unknown_types() {
    let dir = tempdir().unwrap();
    fixtures::write_material(&dir.path().join("dataset"), "Gravel033", 16, true);
    let mut config = dataset_config(dir.path());
    config.use_data_types = vec!["base_color".to_string(), "specular".to_string()];
    config.fetch_pairs = vec![
        ("canonical_render".to_string(), "base_color".to_string()),
        ("canonical_render".to_string(), "normal".to_string()),
        ("canonical_render".to_string(), "specular".to_string()),
    ];

    let dataset = PairDataset::open(&config, DatasetOptions::default()).unwrap();
    assert_eq!(
        dataset.pairs(),
        &[("canonical_render".to_string(), "base_color".to_string())]
    );

    let sample = dataset.get(0).unwrap();
    assert_eq!(sample.len(), 1);

    // Only the known data type is packed next to the render
    let record = dataset.reader().fetch_record("Gravel033_0").unwrap();
    let names: Vec<&str> = record.channel_names().collect();
    assert_eq!(names, vec!["base_color", "canonical_render"]);
}
