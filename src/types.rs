use ndarray::Array2;
use std::path::PathBuf;

/// Elevation sample type used throughout the pipeline
pub type ChmValue = f32;

/// 2D canopy height grid (rows x cols)
pub type ChmGrid = Array2<ChmValue>;

/// Missing-data mask, `true` where the source pixel has no valid measurement
pub type NoDataMask = Array2<bool>;

/// Affine geotransform as stored by GDAL
pub type GeoTransform = [f64; 6];

/// Georeferencing carried from the input raster to the output raster
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoReference {
    pub geo_transform: Option<GeoTransform>,
    /// Projection as WKT, empty when the source has none
    pub projection: String,
    /// Default-domain dataset metadata as key/value pairs
    pub metadata: Vec<(String, String)>,
}

/// A single-band CHM read from disk
#[derive(Debug, Clone)]
pub struct ChmRaster {
    pub data: ChmGrid,
    /// No-data value declared on band 1, may be NaN
    pub nodata: Option<f64>,
    pub georef: GeoReference,
}

/// Error types for CHM preparation
#[derive(Debug, thiserror::Error)]
pub enum ChmError {
    #[error("{} configuration file not found. This file should be in the same folder as the application: {source}", .path.display())]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter value for {field}{}: '{value}'. {expected}", pass_label(.pass))]
    InvalidParameterValue {
        field: String,
        pass: Option<usize>,
        value: String,
        expected: String,
    },

    #[error("Missing parameter '{0}' in configuration file")]
    MissingParameter(String),

    #[error("No .tif files found in {}", .0.display())]
    EmptyInputSet(PathBuf),

    #[error("Could not open {}: {source}", .path.display())]
    RasterOpenFailure {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("Cannot create output file {}: {source}", .path.display())]
    RasterCreateFailure {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("Unsupported host platform '{0}' (supported: linux, windows)")]
    UnsupportedPlatform(String),

    #[error("Failed to launch worker for {}: {source}", .path.display())]
    WorkerSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Processing error: {0}")]
    Processing(String),
}

fn pass_label(pass: &Option<usize>) -> String {
    match pass {
        Some(n) => format!(" in pass{}_params", n),
        None => String::new(),
    }
}

/// Result type for CHM operations
pub type ChmResult<T> = Result<T, ChmError>;

impl ChmError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        pass: Option<usize>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        ChmError::InvalidParameterValue {
            field: field.into(),
            pass,
            value: value.into(),
            expected: expected.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message_names_field_and_pass() {
        let err = ChmError::invalid(
            "median filter size (med_size)",
            Some(2),
            "3.5",
            "This value must be an integer.",
        );
        let msg = err.to_string();
        assert!(msg.contains("med_size"));
        assert!(msg.contains("pass2_params"));
        assert!(msg.contains("3.5"));
    }

    #[test]
    fn test_invalid_parameter_message_without_pass() {
        let err = ChmError::invalid("min_val", None, "abc", "This value must be a float.");
        assert_eq!(
            err.to_string(),
            "Invalid parameter value for min_val: 'abc'. This value must be a float."
        );
    }
}
