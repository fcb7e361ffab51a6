//! Work-group sizing and dataset padding
//!
//! Every kernel is launched over a padded length that divides evenly into
//! work-groups of the chosen size. Padding values must be neutral for the
//! kernel that consumes them, which is why the neutral element depends on
//! the [`ReductionKind`] and why the [`PaddingPolicy`] decides whether one
//! shared zero-padded copy or per-consumer copies are produced.

use crate::error::{Error, Result};

/// Size in bytes of one dataset element on the device
pub const ELEMENT_SIZE: usize = std::mem::size_of::<i32>();

/// Largest group size the kernels' local scratch can hold
pub const MAX_GROUP_SIZE: usize = 256;

// ============================================================================
// Geometry
// ============================================================================

/// Launch geometry derived once per pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroupGeometry {
    /// Work items per group
    pub group_size: usize,
    /// Unpadded sample count
    pub original_len: usize,
    /// Sample count after padding (multiple of `group_size`)
    pub padded_len: usize,
    /// Number of work-groups
    pub group_count: usize,
    /// Bytes per element
    pub element_size: usize,
    /// Bytes of every output buffer
    pub output_bytes: usize,
}

impl WorkGroupGeometry {
    /// Derive the geometry for `len` samples in groups of `group_size`.
    ///
    /// Fails with a configuration error for a zero group size or an empty
    /// dataset rather than dividing by zero.
    pub fn new(len: usize, group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(Error::config("group_size", "must be at least 1"));
        }
        if len == 0 {
            return Err(Error::config("dataset", "dataset is empty"));
        }

        let remainder = len % group_size;
        let padding = if remainder == 0 {
            0
        } else {
            group_size - remainder
        };
        let padded_len = len + padding;

        Ok(Self {
            group_size,
            original_len: len,
            padded_len,
            group_count: padded_len / group_size,
            element_size: ELEMENT_SIZE,
            output_bytes: padded_len * ELEMENT_SIZE,
        })
    }

    /// Number of neutral elements appended
    #[inline]
    pub fn padding(&self) -> usize {
        self.padded_len - self.original_len
    }

    /// Bytes of the input buffer
    #[inline]
    pub fn input_bytes(&self) -> usize {
        self.padded_len * self.element_size
    }

    /// Bytes of per-group local scratch
    #[inline]
    pub fn local_bytes(&self) -> usize {
        self.group_size * self.element_size
    }
}

// ============================================================================
// Neutral elements
// ============================================================================

/// The combining operation a padded copy will be consumed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    /// Minimum reduction
    Min,
    /// Maximum reduction
    Max,
    /// Sum reduction (also used by mean and variance)
    Sum,
}

impl ReductionKind {
    /// Value that leaves the reduction's result unchanged
    pub fn neutral(self) -> i32 {
        match self {
            ReductionKind::Min => i32::MAX,
            ReductionKind::Max => i32::MIN,
            ReductionKind::Sum => 0,
        }
    }
}

/// How padding values are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaddingPolicy {
    /// One zero-padded copy shared by every kernel.
    ///
    /// Zero is not neutral for min/max, so a dataset without zero or negative
    /// values reports a minimum of 0 when padding was needed. Positional
    /// statistics index the padded sorted array.
    SharedZero,
    /// A private copy per consumer padded with that consumer's neutral value.
    ///
    /// The sort consumes the `Min` copy, so padding sorts to the tail and
    /// positional statistics index only the original-length prefix.
    #[default]
    PerReduction,
}

impl PaddingPolicy {
    /// Parse a policy name as used on the command line
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "shared-zero" => Ok(PaddingPolicy::SharedZero),
            "per-reduction" => Ok(PaddingPolicy::PerReduction),
            _ => Err(Error::config(
                "padding",
                format!("unknown policy '{s}', expected shared-zero or per-reduction"),
            )),
        }
    }

    /// Padding value for a copy consumed by `kind`
    pub fn neutral_for(self, kind: ReductionKind) -> i32 {
        match self {
            PaddingPolicy::SharedZero => 0,
            PaddingPolicy::PerReduction => kind.neutral(),
        }
    }
}

/// Append `geometry.padding()` copies of `neutral` to `data` in place.
pub fn pad_in_place(data: &mut Vec<i32>, geometry: &WorkGroupGeometry, neutral: i32) {
    data.resize(geometry.padded_len, neutral);
}

/// Host-side padded copies of a dataset, one per distinct neutral element.
///
/// The caller's samples are never modified.
#[derive(Debug, Clone)]
pub struct PaddedInputs {
    /// Copy consumed by sum, variance (and everything under `SharedZero`)
    pub sum: Vec<i32>,
    /// Copy consumed by the minimum reduction and the sort, if distinct
    pub min: Option<Vec<i32>>,
    /// Copy consumed by the maximum reduction, if distinct
    pub max: Option<Vec<i32>>,
}

impl PaddedInputs {
    /// Build the copies required by `policy`.
    ///
    /// Separate min/max copies exist only when padding is actually appended
    /// and the policy asks for per-reduction neutrals.
    pub fn prepare(samples: &[i32], geometry: &WorkGroupGeometry, policy: PaddingPolicy) -> Self {
        let padded = |kind: ReductionKind| {
            let mut copy = samples.to_vec();
            pad_in_place(&mut copy, geometry, policy.neutral_for(kind));
            copy
        };

        let private = geometry.padding() > 0 && policy == PaddingPolicy::PerReduction;
        Self {
            sum: padded(ReductionKind::Sum),
            min: private.then(|| padded(ReductionKind::Min)),
            max: private.then(|| padded(ReductionKind::Max)),
        }
    }

    /// Copy that will be consumed by `kind`
    pub fn for_kind(&self, kind: ReductionKind) -> &[i32] {
        match kind {
            ReductionKind::Min => self.min.as_deref().unwrap_or(&self.sum),
            ReductionKind::Max => self.max.as_deref().unwrap_or(&self.sum),
            ReductionKind::Sum => &self.sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_even_split() {
        let g = WorkGroupGeometry::new(10, 5).unwrap();
        assert_eq!(g.padded_len, 10);
        assert_eq!(g.group_count, 2);
        assert_eq!(g.padding(), 0);
        assert_eq!(g.output_bytes, 40);
        assert_eq!(g.local_bytes(), 20);
    }

    #[test]
    fn test_geometry_pads_to_next_multiple() {
        let g = WorkGroupGeometry::new(10, 3).unwrap();
        assert_eq!(g.padding(), 2);
        assert_eq!(g.padded_len, 12);
        assert_eq!(g.group_count, 4);
    }

    #[test]
    fn test_geometry_invariant_holds() {
        for len in 1..200 {
            for group in 1..40 {
                let g = WorkGroupGeometry::new(len, group).unwrap();
                assert_eq!(g.padded_len % group, 0, "len={len} group={group}");
                assert!(g.padded_len >= len);
                assert!(g.padding() < group);
                assert_eq!(g.group_count * group, g.padded_len);
            }
        }
    }

    #[test]
    fn test_geometry_rejects_zero_group() {
        let err = WorkGroupGeometry::new(10, 0).unwrap_err();
        assert!(matches!(err, Error::Configuration { field: "group_size", .. }));
    }

    #[test]
    fn test_geometry_rejects_empty_dataset() {
        let err = WorkGroupGeometry::new(0, 4).unwrap_err();
        assert!(matches!(err, Error::Configuration { field: "dataset", .. }));
    }

    #[test]
    fn test_shared_zero_uses_one_copy() {
        let g = WorkGroupGeometry::new(3, 4).unwrap();
        let inputs = PaddedInputs::prepare(&[5, 6, 7], &g, PaddingPolicy::SharedZero);
        assert_eq!(inputs.sum, vec![5, 6, 7, 0]);
        assert!(inputs.min.is_none());
        assert_eq!(inputs.for_kind(ReductionKind::Min), &[5, 6, 7, 0]);
    }

    #[test]
    fn test_per_reduction_neutrals() {
        let g = WorkGroupGeometry::new(3, 4).unwrap();
        let inputs = PaddedInputs::prepare(&[5, 6, 7], &g, PaddingPolicy::PerReduction);
        assert_eq!(inputs.for_kind(ReductionKind::Sum), &[5, 6, 7, 0]);
        assert_eq!(inputs.for_kind(ReductionKind::Min), &[5, 6, 7, i32::MAX]);
        assert_eq!(inputs.for_kind(ReductionKind::Max), &[5, 6, 7, i32::MIN]);
    }

    #[test]
    fn test_per_reduction_without_padding_shares_copy() {
        let g = WorkGroupGeometry::new(4, 2).unwrap();
        let inputs = PaddedInputs::prepare(&[1, 2, 3, 4], &g, PaddingPolicy::PerReduction);
        assert!(inputs.min.is_none());
        assert!(inputs.max.is_none());
    }

    #[test]
    fn test_padding_policy_parse() {
        assert_eq!(
            PaddingPolicy::parse("shared-zero").unwrap(),
            PaddingPolicy::SharedZero
        );
        assert!(PaddingPolicy::parse("zero").is_err());
    }
}
