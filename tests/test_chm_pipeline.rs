use chm_prep::core::{build_nodata_mask, ChmPreprocessor};
use chm_prep::io::{read_chm, write_chm};
use chm_prep::{GeoReference, NoDataPolicy, PassParameters, PipelineConfig};
use ndarray::Array2;
use std::path::Path;
use tempfile::TempDir;

const GEO_TRANSFORM: [f64; 6] = [300000.0, 0.5, 0.0, 5050000.0, 0.0, -0.5];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn georef() -> GeoReference {
    GeoReference {
        geo_transform: Some(GEO_TRANSFORM),
        projection: String::new(),
        metadata: vec![("AREA_OR_POINT".to_string(), "Area".to_string())],
    }
}

fn config(dest_dir: &Path, policy: NoDataPolicy, pass: PassParameters) -> PipelineConfig {
    PipelineConfig {
        source_dir: dest_dir.to_path_buf(),
        dest_dir: dest_dir.join("prep"),
        passes: vec![pass],
        nodata_policy: policy,
        output_nodata_val: -9999.0,
        min_clamp: None,
        max_clamp: None,
    }
}

#[test]
fn test_nan_nodata_transfer_end_to_end() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("tile.tif");

    let mut grid = Array2::<f32>::from_shape_fn((4, 4), |(i, j)| 10.0 + (i * 4 + j) as f32 * 0.25);
    grid[[2, 1]] = f32::NAN;
    write_chm(&input, &grid, &georef(), f64::NAN).expect("Failed to write input CHM");

    let unreachable = PassParameters {
        lap_size: 3,
        thr_lap: 1.0e30,
        thr_spk: 1.0e30,
        med_size: 3,
        dil_radius: 1,
    };
    let processor = ChmPreprocessor::new(config(temp_dir.path(), NoDataPolicy::Transfer, unreachable));
    let output = processor.process_file(&input).expect("Processing failed");

    assert_eq!(output, temp_dir.path().join("prep").join("tile_prep.tif"));

    let result = read_chm(&output).expect("Failed to read output CHM");
    assert_eq!(result.nodata, Some(-9999.0));
    assert_eq!(result.georef.geo_transform, Some(GEO_TRANSFORM));
    assert_eq!(result.data.dim(), (4, 4));
    for ((i, j), &v) in result.data.indexed_iter() {
        if (i, j) == (2, 1) {
            assert_eq!(v, -9999.0);
        } else {
            assert_eq!(v, grid[[i, j]]);
        }
    }
}

#[test]
fn test_output_declares_nodata_without_input_nodata() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("plain.tif");

    // Written straight through GDAL so band 1 carries no no-data value
    {
        let driver = gdal::DriverManager::get_driver_by_name("GTiff").expect("Missing GTiff driver");
        let dataset = driver
            .create_with_band_type::<f32, _>(&input, 5, 5, 1)
            .expect("Failed to create input");
        let mut band = dataset.rasterband(1).expect("Missing band");
        let buffer = gdal::raster::Buffer::new((5, 5), vec![3.0f32; 25]);
        band.write((0, 0), (5, 5), &buffer).expect("Failed to write input");
    }
    assert_eq!(read_chm(&input).expect("Failed to read input").nodata, None);

    let pass = PassParameters {
        lap_size: 3,
        thr_lap: 1.0,
        thr_spk: 1.0,
        med_size: 3,
        dil_radius: 0,
    };
    let processor = ChmPreprocessor::new(config(temp_dir.path(), NoDataPolicy::Transfer, pass));
    let output = processor.process_file(&input).expect("Processing failed");

    let result = read_chm(&output).expect("Failed to read output CHM");
    assert_eq!(result.nodata, Some(-9999.0));
    assert!(result.data.iter().all(|&v| v == 3.0));
}

fn holed_grid() -> Array2<f32> {
    let mut grid = Array2::<f32>::from_elem((8, 8), 20.0);
    for i in 3..5 {
        for j in 3..5 {
            grid[[i, j]] = -1.0;
        }
    }
    grid
}

#[test]
fn test_remove_small_holes_threshold_above_region_size() {
    init_logging();
    let masked = build_nodata_mask(
        holed_grid(),
        Some(-1.0),
        NoDataPolicy::RemoveSmallHoles { hole_size_thr: 5 },
    );
    assert!(masked.mask.iter().all(|&m| !m));

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("holes.tif");
    write_chm(&input, &holed_grid(), &georef(), -1.0).expect("Failed to write input CHM");

    let pass = PassParameters {
        lap_size: 3,
        thr_lap: 10.0,
        thr_spk: 10.0,
        med_size: 3,
        dil_radius: 0,
    };
    let processor = ChmPreprocessor::new(config(
        temp_dir.path(),
        NoDataPolicy::RemoveSmallHoles { hole_size_thr: 5 },
        pass,
    ));
    let output = processor.process_file(&input).expect("Processing failed");

    // The hole is filled by the kernel and not re-stamped
    let result = read_chm(&output).expect("Failed to read output CHM");
    assert!(result.data.iter().all(|&v| v == 20.0));
}

#[test]
fn test_remove_small_holes_threshold_below_region_size() {
    init_logging();
    let masked = build_nodata_mask(
        holed_grid(),
        Some(-1.0),
        NoDataPolicy::RemoveSmallHoles { hole_size_thr: 3 },
    );
    assert_eq!(masked.mask.iter().filter(|&&m| m).count(), 4);
    assert!(masked.mask[[3, 3]] && masked.mask[[4, 4]]);

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("holes.tif");
    write_chm(&input, &holed_grid(), &georef(), -1.0).expect("Failed to write input CHM");

    let pass = PassParameters {
        lap_size: 3,
        thr_lap: 10.0,
        thr_spk: 10.0,
        med_size: 3,
        dil_radius: 0,
    };
    let processor = ChmPreprocessor::new(config(
        temp_dir.path(),
        NoDataPolicy::RemoveSmallHoles { hole_size_thr: 3 },
        pass,
    ));
    let output = processor.process_file(&input).expect("Processing failed");

    let result = read_chm(&output).expect("Failed to read output CHM");
    for ((i, j), &v) in result.data.indexed_iter() {
        if (3..5).contains(&i) && (3..5).contains(&j) {
            assert_eq!(v, -9999.0);
        } else {
            assert_eq!(v, 20.0);
        }
    }
}

#[test]
fn test_existing_output_is_overwritten() {
    init_logging();
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input = temp_dir.path().join("tile.tif");
    write_chm(&input, &Array2::from_elem((3, 3), 7.0), &georef(), -1.0)
        .expect("Failed to write input CHM");

    let pass = PassParameters {
        lap_size: 3,
        thr_lap: 1.0,
        thr_spk: 1.0,
        med_size: 3,
        dil_radius: 0,
    };
    let processor = ChmPreprocessor::new(config(temp_dir.path(), NoDataPolicy::SetToZero, pass));
    let first = processor.process_file(&input).expect("First run failed");
    let second = processor.process_file(&input).expect("Second run failed");

    assert_eq!(first, second);
    let result = read_chm(&second).expect("Failed to read output CHM");
    assert!(result.data.iter().all(|&v| v == 7.0));
}
