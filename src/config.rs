//! Processing parameters read from the `chm_prep.ini` configuration file
//!
//! The file is INI-style. Every parameter lives in the `[PROCESSING_PARAMETERS]`
//! section:
//!
//! ```ini
//! [PROCESSING_PARAMETERS]
//! source_dir = /data/chm
//! dest_dir = /data/chm_prep
//! # lap_size, thr_lap, thr_spk, med_size, dil_radius
//! pass1_params = 3, 0.5, 1.0, 3, 1
//! pass2_params = 5, 1.0, 2.0, 5, 0
//! force_min_val = true
//! min_val = 0
//! force_max_val = false
//! nodata_processing = remove_small_holes
//! hole_size_thr = 50
//! output_nodata_val = -9999
//! ```

use crate::types::{ChmError, ChmResult, ChmValue};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "chm_prep.ini";

/// Section holding every processing parameter
pub const PARAMETERS_SECTION: &str = "PROCESSING_PARAMETERS";

/// Parameters for a single repair pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassParameters {
    /// Extent of the Laplacian anomaly detector in pixels
    pub lap_size: usize,
    /// Cavity threshold, compared with the negative Laplacian response
    pub thr_lap: f32,
    /// Spike threshold, compared with the positive Laplacian response
    pub thr_spk: f32,
    /// Extent of the median filter that synthesizes replacement values
    pub med_size: usize,
    /// Radius by which detected regions are grown before replacement
    pub dil_radius: usize,
}

impl PassParameters {
    /// Parse the five comma-separated values of a `passN_params` entry
    pub fn parse(raw: &str, pass: usize) -> ChmResult<Self> {
        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        if fields.len() != 5 {
            return Err(ChmError::invalid(
                format!("pass{}_params", pass),
                None,
                raw,
                format!(
                    "Expected 5 comma-separated values (lap_size,thr_lap,thr_spk,med_size,dil_radius), found {}.",
                    fields.len()
                ),
            ));
        }

        let lap_size = parse_int(fields[0], "Laplacian filter size in pixels (lap_size)", pass)?;
        let thr_lap = parse_float(fields[1], "Laplacian filter cavity threshold (thr_lap)", pass)?;
        let thr_spk = parse_float(fields[2], "Laplacian filter spike threshold (thr_spk)", pass)?;
        let med_size = parse_int(fields[3], "median filter size in pixels (med_size)", pass)?;
        let dil_radius = parse_int(fields[4], "dilation filter radius in pixels (dil_radius)", pass)?;

        if lap_size < 1 {
            return Err(ChmError::invalid(
                "Laplacian filter size in pixels (lap_size)",
                Some(pass),
                fields[0],
                "This value must be an integer >= 1.",
            ));
        }
        if med_size < 1 {
            return Err(ChmError::invalid(
                "median filter size in pixels (med_size)",
                Some(pass),
                fields[3],
                "This value must be an integer >= 1.",
            ));
        }
        if dil_radius < 0 {
            return Err(ChmError::invalid(
                "dilation filter radius in pixels (dil_radius)",
                Some(pass),
                fields[4],
                "This value must be an integer >= 0.",
            ));
        }

        Ok(Self {
            lap_size: lap_size as usize,
            thr_lap,
            thr_spk,
            med_size: med_size as usize,
            dil_radius: dil_radius as usize,
        })
    }
}

fn parse_int(value: &str, field: &str, pass: usize) -> ChmResult<i64> {
    value.parse::<i64>().map_err(|_| {
        ChmError::invalid(field, Some(pass), value, "This value must be an integer.")
    })
}

fn parse_float(value: &str, field: &str, pass: usize) -> ChmResult<f32> {
    value.parse::<f32>().map_err(|_| {
        ChmError::invalid(
            field,
            Some(pass),
            value,
            "This value must be a float or an integer.",
        )
    })
}

/// How cells flagged as no-data in the input are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataPolicy {
    /// Zero the cells for repair, then re-stamp them with the output no-data value
    Transfer,
    /// Zero the cells and keep whatever the repair kernel puts there
    SetToZero,
    /// Like `Transfer`, but masked regions smaller than the threshold are
    /// left filled by the kernel instead of being re-stamped
    RemoveSmallHoles { hole_size_thr: usize },
}

impl NoDataPolicy {
    /// Whether masked cells get the output no-data value after repair
    pub fn restamps_nodata(&self) -> bool {
        !matches!(self, NoDataPolicy::SetToZero)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NoDataPolicy::Transfer => "transfer",
            NoDataPolicy::SetToZero => "set_to_zero",
            NoDataPolicy::RemoveSmallHoles { .. } => "remove_small_holes",
        }
    }
}

/// Process-wide configuration, resolved once and never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// One or two passes, applied in order
    pub passes: Vec<PassParameters>,
    pub nodata_policy: NoDataPolicy,
    /// No-data value declared on every output raster
    pub output_nodata_val: f64,
    /// Lower clamp, present only when `force_min_val` is on
    pub min_clamp: Option<ChmValue>,
    /// Upper clamp, present only when `force_max_val` is on
    pub max_clamp: Option<ChmValue>,
}

impl PipelineConfig {
    /// Read and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ChmResult<Self> {
        let path = path.as_ref();
        log::debug!("Reading configuration file: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ChmError::ConfigNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_ini_str(&content)
    }

    /// Resolve the configuration from INI text
    pub fn from_ini_str(content: &str) -> ChmResult<Self> {
        let mut sections = parse_ini(content)?;
        let section = sections
            .remove(PARAMETERS_SECTION)
            .ok_or_else(|| ChmError::MissingParameter(format!("[{}]", PARAMETERS_SECTION)))?;

        Self::from_section(&section)
    }

    fn from_section(section: &IniSection) -> ChmResult<Self> {
        let source_dir = PathBuf::from(section.required("source_dir")?);
        let dest_dir = PathBuf::from(section.required("dest_dir")?);

        let mut passes = vec![PassParameters::parse(section.required("pass1_params")?, 1)?];
        // No second pass requested
        if let Some(raw) = section.get("pass2_params") {
            passes.push(PassParameters::parse(raw, 2)?);
        }

        let min_clamp = if section.boolean("force_min_val")? {
            Some(section.float("min_val")?)
        } else {
            None
        };
        let max_clamp = if section.boolean("force_max_val")? {
            Some(section.float("max_val")?)
        } else {
            None
        };

        let nodata_policy = match section.required("nodata_processing")? {
            "transfer" => NoDataPolicy::Transfer,
            "set_to_zero" => NoDataPolicy::SetToZero,
            "remove_small_holes" => {
                let raw = section.required("hole_size_thr")?;
                let hole_size_thr = raw.parse::<usize>().map_err(|_| {
                    ChmError::invalid(
                        "hole_size_thr",
                        None,
                        raw,
                        "This value must be a non-negative integer.",
                    )
                })?;
                NoDataPolicy::RemoveSmallHoles { hole_size_thr }
            }
            other => {
                return Err(ChmError::invalid(
                    "nodata_processing",
                    None,
                    other,
                    "Expected one of: transfer, set_to_zero, remove_small_holes.",
                ))
            }
        };

        let raw = section.required("output_nodata_val")?;
        let output_nodata_val = raw.parse::<f64>().map_err(|_| {
            ChmError::invalid(
                "output_nodata_val",
                None,
                raw,
                "This value must be a float or an integer.",
            )
        })?;

        let config = Self {
            source_dir,
            dest_dir,
            passes,
            nodata_policy,
            output_nodata_val,
            min_clamp,
            max_clamp,
        };
        log::debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

/// Key/value pairs of one INI section, keys lowercased
#[derive(Debug, Default)]
struct IniSection {
    values: HashMap<String, String>,
}

impl IniSection {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn required(&self, key: &str) -> ChmResult<&str> {
        self.get(key)
            .ok_or_else(|| ChmError::MissingParameter(key.to_string()))
    }

    fn float(&self, key: &str) -> ChmResult<f32> {
        let raw = self.required(key)?;
        raw.parse::<f32>().map_err(|_| {
            ChmError::invalid(key, None, raw, "This value must be a float or an integer.")
        })
    }

    /// Absent keys read as `false`
    fn boolean(&self, key: &str) -> ChmResult<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Ok(true),
                "0" | "no" | "false" | "off" => Ok(false),
                _ => Err(ChmError::invalid(
                    key,
                    None,
                    raw,
                    "This value must be a boolean (true/false, yes/no, on/off, 1/0).",
                )),
            },
        }
    }
}

fn parse_ini(content: &str) -> ChmResult<HashMap<String, IniSection>> {
    let section_re = Regex::new(r"^\[([^\]]+)\]$")
        .map_err(|e| ChmError::Processing(format!("Invalid section pattern: {}", e)))?;
    let entry_re = Regex::new(r"^([^=:]+?)\s*[=:]\s*(.*)$")
        .map_err(|e| ChmError::Processing(format!("Invalid entry pattern: {}", e)))?;

    let mut sections: HashMap<String, IniSection> = HashMap::new();
    let mut current: Option<String> = None;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(captures) = section_re.captures(line) {
            let name = captures[1].trim().to_string();
            if sections.contains_key(&name) {
                return Err(ChmError::invalid(
                    format!("configuration line {}", index + 1),
                    None,
                    line,
                    "Each section may only appear once.",
                ));
            }
            sections.insert(name.clone(), IniSection::default());
            current = Some(name);
            continue;
        }

        let entry = entry_re.captures(line);
        match (entry, current.as_ref()) {
            (Some(captures), Some(name)) => {
                let key = captures[1].trim().to_lowercase();
                let value = captures[2].trim().to_string();
                if let Some(section) = sections.get_mut(name) {
                    if section.values.contains_key(&key) {
                        return Err(ChmError::invalid(
                            key,
                            None,
                            value,
                            format!("Option already set earlier in section [{}].", name),
                        ));
                    }
                    section.values.insert(key, value);
                }
            }
            _ => {
                return Err(ChmError::invalid(
                    format!("configuration line {}", index + 1),
                    None,
                    line,
                    "Expected a [section] header or a 'key = value' entry inside a section.",
                ))
            }
        }
    }

    Ok(sections)
}
