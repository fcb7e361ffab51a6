//! Median and quartiles from a sorted array

/// Positional statistics taken by fixed index into an ascending array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalStats {
    /// `len / 2`
    pub median_index: usize,
    /// `len / 4`
    pub q1_index: usize,
    /// `median_index + q1_index`
    pub q3_index: usize,
    /// Value at `median_index`
    pub median: i32,
    /// Value at `q1_index`
    pub q1: i32,
    /// Value at `q3_index`
    pub q3: i32,
}

impl PositionalStats {
    /// Index `sorted` at the median and quartile positions.
    ///
    /// Returns `None` for an empty slice. For any non-empty slice
    /// `q3_index <= 3 * len / 4 < len`, so all indices are in bounds.
    pub fn from_sorted(sorted: &[i32]) -> Option<Self> {
        let len = sorted.len();
        if len == 0 {
            return None;
        }
        let median_index = len / 2;
        let q1_index = len / 4;
        let q3_index = median_index + q1_index;
        Some(Self {
            median_index,
            q1_index,
            q3_index,
            median: sorted[median_index],
            q1: sorted[q1_index],
            q3: sorted[q3_index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_indices() {
        let sorted = [1, 4, 7, 9, 16, 18, 22, 45, 63, 100];
        let p = PositionalStats::from_sorted(&sorted).unwrap();
        assert_eq!((p.q1_index, p.median_index, p.q3_index), (2, 5, 7));
        assert_eq!((p.q1, p.median, p.q3), (7, 18, 45));
    }

    #[test]
    fn test_indices_strictly_ordered_from_four() {
        for len in 4..500 {
            let sorted: Vec<i32> = (0..len as i32).collect();
            let p = PositionalStats::from_sorted(&sorted).unwrap();
            assert!(p.q1_index < p.median_index, "len={len}");
            assert!(p.median_index < p.q3_index, "len={len}");
            assert!(p.q3_index < len);
            assert_eq!(p.median_index, len / 2);
        }
    }

    #[test]
    fn test_short_arrays() {
        assert!(PositionalStats::from_sorted(&[]).is_none());
        let p = PositionalStats::from_sorted(&[5]).unwrap();
        assert_eq!((p.q1, p.median, p.q3), (5, 5, 5));
    }
}
