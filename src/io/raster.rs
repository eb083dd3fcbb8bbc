use crate::types::{ChmError, ChmGrid, ChmRaster, ChmResult, GeoReference};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Suffix inserted before the extension of every output file
pub const OUTPUT_SUFFIX: &str = "_prep";

/// Read band 1 of a CHM raster as f32, with its no-data value and georeferencing
pub fn read_chm<P: AsRef<Path>>(path: P) -> ChmResult<ChmRaster> {
    let path = path.as_ref();
    log::debug!("Opening CHM: {}", path.display());

    let dataset = Dataset::open(path).map_err(|source| ChmError::RasterOpenFailure {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = dataset.raster_size();
    let rasterband = dataset.rasterband(1)?;
    let nodata = rasterband.no_data_value();
    let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    let data = Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| ChmError::Processing(format!("Failed to reshape CHM data: {}", e)))?;

    log::debug!("CHM size: {}x{}, no-data value: {:?}", width, height, nodata);

    let georef = GeoReference {
        geo_transform: dataset.geo_transform().ok(),
        projection: dataset.projection(),
        metadata: read_metadata(&dataset),
    };

    Ok(ChmRaster { data, nodata, georef })
}

fn read_metadata(dataset: &Dataset) -> Vec<(String, String)> {
    dataset
        .metadata_domain("")
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Write a single-band Float32 GeoTIFF carrying the source georeferencing.
///
/// An existing file at `path` is replaced.
pub fn write_chm<P: AsRef<Path>>(
    path: P,
    grid: &ChmGrid,
    georef: &GeoReference,
    nodata: f64,
) -> ChmResult<()> {
    let path = path.as_ref();
    if path.exists() {
        log::warn!("Overwriting existing output file: {}", path.display());
    }

    let (height, width) = grid.dim();
    let create_failure = |source| ChmError::RasterCreateFailure {
        path: path.to_path_buf(),
        source,
    };

    let driver = DriverManager::get_driver_by_name("GTiff").map_err(create_failure)?;
    let mut dataset = driver
        .create_with_band_type::<f32, _>(path, width as isize, height as isize, 1)
        .map_err(create_failure)?;

    if let Some(transform) = georef.geo_transform {
        dataset.set_geo_transform(&transform)?;
    }
    if !georef.projection.is_empty() {
        dataset.set_projection(&georef.projection)?;
    }
    for (key, value) in &georef.metadata {
        dataset.set_metadata_item(key, value, "")?;
    }

    let mut rasterband = dataset.rasterband(1)?;
    rasterband.set_no_data_value(Some(nodata))?;

    let flat_data: Vec<f32> = grid.iter().cloned().collect();
    let buffer = gdal::raster::Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    log::debug!("Wrote {}x{} CHM to {}", width, height, path.display());
    Ok(())
}

/// `<dest_dir>/<stem>_prep.<ext>` for an input file
pub fn output_path_for(input: &Path, dest_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, OUTPUT_SUFFIX),
    };
    dest_dir.join(file_name)
}
