//! Rating distribution for a single film

use super::rating::{HalfStars, SCALE_STEPS};

/// Column holding the sum of all buckets
pub const TOTAL_RATINGS_FIELD: &str = "Total_ratings";

/// Ten rating buckets, index 0 = ½ through index 9 = ★★★★★
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingHistogram {
    buckets: [u64; SCALE_STEPS],
}

impl RatingHistogram {
    /// Histogram with every bucket at zero (film without ratings)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from bar counts in ascending rating order; extra bars are ignored
    /// and missing bars count as zero.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let mut buckets = [0; SCALE_STEPS];
        for (slot, count) in buckets.iter_mut().zip(counts) {
            *slot = count;
        }
        Self { buckets }
    }

    pub fn count(&self, rating: HalfStars) -> u64 {
        self.buckets[usize::from(rating.units()) - 1]
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HalfStars, u64)> + '_ {
        HalfStars::all().zip(self.buckets.iter().copied())
    }

    /// Column names in bucket order (`½`, `★`, `★½`, ...)
    pub fn column_names() -> Vec<String> {
        HalfStars::all().map(HalfStars::glyphs).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_is_sum_of_buckets() {
        let histogram = RatingHistogram::from_counts([1, 0, 2, 0, 3, 0, 4, 0, 5, 0]);
        assert_eq!(histogram.total(), 15);
        assert_eq!(histogram.count(HalfStars::MIN), 1);
        assert_eq!(histogram.count(HalfStars::new(9).unwrap()), 5);
    }

    #[test]
    fn test_short_and_empty_inputs() {
        assert_eq!(RatingHistogram::empty().total(), 0);
        let partial = RatingHistogram::from_counts([7, 3]);
        assert_eq!(partial.total(), 10);
        assert_eq!(partial.count(HalfStars::MAX), 0);
    }

    #[test]
    fn test_column_names() {
        let names = RatingHistogram::column_names();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "½");
        assert_eq!(names[1], "★");
        assert_eq!(names[9], "★★★★★");
    }
}
