//! Sample datasets and the fixed-point scale factor
//!
//! Samples are stored as `i32` scaled by a [`Scale`] so that one decimal digit
//! of fractional source data survives integer kernels. The scale is an explicit
//! value threaded through every component that scales or unscales; there is no
//! process-wide multiplier.
//!
//! Two sources exist:
//! - a whitespace-delimited record file, whose sixth field is scaled
//! - the built-in test vector, which is used **unscaled**
//!
//! The second path does not apply the scale even though reporting later
//! divides by it. That behaviour is kept as-is and pinned by tests.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Literal sample sequence used by the test-vector source
pub const TEST_VECTOR: [i32; 10] = [9, 63, 16, 22, 45, 18, 100, 1, 4, 7];

/// Number of whitespace-delimited fields in one record
const RECORD_FIELDS: usize = 6;

/// Zero-based index of the field carrying the sample value
const VALUE_FIELD: usize = 5;

// ============================================================================
// Scale
// ============================================================================

/// Fixed-point multiplier applied to fractional source values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scale(i32);

impl Scale {
    /// Nominal multiplier (one decimal digit)
    pub const DEFAULT: Scale = Scale(10);

    /// Create a scale, rejecting non-positive multipliers.
    pub fn new(multiplier: i32) -> Result<Self> {
        if multiplier < 1 {
            return Err(Error::config(
                "scale",
                format!("multiplier must be at least 1, got {multiplier}"),
            ));
        }
        Ok(Self(multiplier))
    }

    /// The raw multiplier
    #[inline]
    pub fn multiplier(self) -> i32 {
        self.0
    }

    /// Scale a source value, truncating toward zero.
    #[inline]
    pub fn apply(self, value: f64) -> i32 {
        (value * self.0 as f64) as i32
    }

    /// Recover original units from a scaled value.
    #[inline]
    pub fn unscale(self, value: f64) -> f64 {
        value / self.0 as f64
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    /// Whitespace-delimited record file; the sixth field is scaled
    File(PathBuf),
    /// The built-in [`TEST_VECTOR`], unscaled
    TestVector,
}

impl DatasetSource {
    /// Produce the dataset for this source.
    pub fn load(&self, scale: Scale) -> Result<Dataset> {
        match self {
            DatasetSource::File(path) => Dataset::from_file(path, scale),
            DatasetSource::TestVector => Ok(Dataset::from_values(TEST_VECTOR.to_vec())),
        }
    }
}

/// An ordered sequence of (possibly scaled) integer samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    values: Vec<i32>,
    scaled: bool,
}

impl Dataset {
    /// Wrap literal values. No scale is applied.
    pub fn from_values(values: Vec<i32>) -> Self {
        Self {
            values,
            scaled: false,
        }
    }

    /// Load a record file, scaling the value field of every record.
    pub fn from_file(path: impl AsRef<Path>, scale: Scale) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Dataset {
            path: path.to_path_buf(),
            source,
        })?;
        let mut text = String::new();
        BufReader::new(file)
            .read_to_string(&mut text)
            .map_err(|source| Error::Dataset {
                path: path.to_path_buf(),
                source,
            })?;

        let values = parse_records(&text, scale);
        log::info!("Loaded {} samples from {}", values.len(), path.display());
        Ok(Self {
            values,
            scaled: true,
        })
    }

    /// Parse record text that is already in memory.
    pub fn from_records(text: &str, scale: Scale) -> Self {
        Self {
            values: parse_records(text, scale),
            scaled: true,
        }
    }

    /// The samples
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the scale factor was applied when the dataset was produced
    pub fn is_scaled(&self) -> bool {
        self.scaled
    }
}

/// Read records of six tokens and keep the scaled sixth field.
///
/// Extraction stops at the first record that is incomplete or whose numeric
/// fields do not parse, keeping everything read so far.
fn parse_records(text: &str, scale: Scale) -> Vec<i32> {
    let mut values = Vec::new();
    let mut tokens = text.split_whitespace();

    loop {
        let record: Vec<&str> = tokens.by_ref().take(RECORD_FIELDS).collect();
        if record.is_empty() {
            break;
        }
        if record.len() < RECORD_FIELDS {
            log::warn!(
                "Stopping at incomplete record after {} samples ({} of {} fields)",
                values.len(),
                record.len(),
                RECORD_FIELDS
            );
            break;
        }

        let ints_ok = record[1..VALUE_FIELD]
            .iter()
            .all(|t| t.parse::<i32>().is_ok());
        match record[VALUE_FIELD].parse::<f64>() {
            Ok(v) if ints_ok => values.push(scale.apply(v)),
            _ => {
                log::warn!(
                    "Stopping at malformed record after {} samples: {:?}",
                    values.len(),
                    record
                );
                break;
            }
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDS: &str = "\
CRANWELL 2011 1 1 0000 8.5
CRANWELL 2011 1 1 0100 -1.25
CRANWELL 2011 1 1 0200 12
";

    #[test]
    fn test_scale_truncates_toward_zero() {
        let scale = Scale::DEFAULT;
        assert_eq!(scale.apply(8.5), 85);
        assert_eq!(scale.apply(-1.25), -12);
        assert_eq!(scale.apply(0.05), 0);
    }

    #[test]
    fn test_scale_round_trip_within_one_unit() {
        let scale = Scale::new(10).unwrap();
        for &v in &[8.76, -3.14, 0.0, 100.09, -0.01] {
            let back = scale.unscale(scale.apply(v) as f64);
            assert!(
                (back - v).abs() <= 1.0 / scale.multiplier() as f64,
                "{v} -> {back}"
            );
        }
    }

    #[test]
    fn test_scale_rejects_non_positive() {
        assert!(Scale::new(0).is_err());
        assert!(Scale::new(-10).is_err());
        assert_eq!(Scale::new(100).unwrap().multiplier(), 100);
    }

    #[test]
    fn test_records_take_sixth_field_scaled() {
        let ds = Dataset::from_records(RECORDS, Scale::DEFAULT);
        assert_eq!(ds.values(), &[85, -12, 120]);
        assert!(ds.is_scaled());
    }

    #[test]
    fn test_records_stop_at_malformed() {
        let text = "A 2011 1 1 0000 1.5\nB 2011 x 1 0000 2.5\nC 2011 1 1 0000 3.5\n";
        let ds = Dataset::from_records(text, Scale::DEFAULT);
        assert_eq!(ds.values(), &[15]);
    }

    #[test]
    fn test_records_stop_at_incomplete() {
        let text = "A 2011 1 1 0000 1.5\nB 2011 1 1\n";
        let ds = Dataset::from_records(text, Scale::DEFAULT);
        assert_eq!(ds.values(), &[15]);
    }

    #[test]
    fn test_test_vector_is_unscaled() {
        let ds = DatasetSource::TestVector.load(Scale::DEFAULT).unwrap();
        assert_eq!(ds.values(), &TEST_VECTOR);
        assert!(!ds.is_scaled());
    }

    #[test]
    fn test_missing_file_is_dataset_error() {
        let err = Dataset::from_file("/nonexistent/ordstat/data.txt", Scale::DEFAULT)
            .expect_err("missing file must fail");
        assert!(matches!(err, Error::Dataset { .. }));
        assert!(!err.is_device_error());
    }
}
