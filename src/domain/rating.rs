//! Star-rating scale
//!
//! Letterboxd ratings are half-star increments between 0.5 and 5.0, rendered
//! as a run of full-star glyphs optionally followed by one half-star glyph.
//! `HalfStars` is the integer form (1..=10) and the two free functions convert
//! between glyph text and numeric values.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const FULL_STAR: char = '★';
pub const HALF_STAR: char = '½';

/// Number of distinct ratings on the scale
pub const SCALE_STEPS: usize = 10;

/// Raised when a numeric rating has no glyph representation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("rating {value} is not a half-star increment between 0.5 and 5.0")]
pub struct InvalidRating {
    pub value: f64,
}

/// A rating expressed in half-star units (1 = ½, 10 = ★★★★★)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HalfStars(u8);

impl HalfStars {
    pub const MIN: HalfStars = HalfStars(1);
    pub const MAX: HalfStars = HalfStars(10);

    pub fn new(half_stars: u8) -> Option<Self> {
        (1..=10).contains(&half_stars).then_some(Self(half_stars))
    }

    /// Every step of the scale in ascending order
    pub fn all() -> impl Iterator<Item = HalfStars> {
        (1..=10).map(HalfStars)
    }

    pub fn from_value(value: f64) -> Result<Self, InvalidRating> {
        let doubled = value * 2.0;
        if !doubled.is_finite() || doubled.fract() != 0.0 || !(1.0..=10.0).contains(&doubled) {
            return Err(InvalidRating { value });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Self(doubled as u8))
    }

    /// Parse glyph text such as `★★★½`; surrounding whitespace is ignored
    pub fn from_glyphs(text: &str) -> Option<Self> {
        let text = text.trim();
        let mut full: u8 = 0;
        let mut half = false;

        for ch in text.chars() {
            match ch {
                FULL_STAR if !half => full = full.checked_add(1)?,
                HALF_STAR if !half => half = true,
                _ => return None,
            }
        }

        let units = full.checked_mul(2)?.checked_add(u8::from(half))?;
        Self::new(units)
    }

    pub fn units(self) -> u8 {
        self.0
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) / 2.0
    }

    pub fn glyphs(self) -> String {
        let mut out = String::with_capacity(6 * FULL_STAR.len_utf8());
        for _ in 0..self.0 / 2 {
            out.push(FULL_STAR);
        }
        if self.0 % 2 == 1 {
            out.push(HALF_STAR);
        }
        out
    }
}

impl fmt::Display for HalfStars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glyphs())
    }
}

/// Convert glyph text to its numeric value, `None` when the text is not a valid rating
pub fn stars_to_value(text: &str) -> Option<f64> {
    HalfStars::from_glyphs(text).map(HalfStars::value)
}

/// Convert a numeric rating to glyph text
pub fn value_to_stars(value: f64) -> Result<String, InvalidRating> {
    HalfStars::from_value(value).map(HalfStars::glyphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("½", 0.5)]
    #[case("★", 1.0)]
    #[case("★½", 1.5)]
    #[case("★★★", 3.0)]
    #[case("★★★★½", 4.5)]
    #[case("★★★★★", 5.0)]
    #[case("  ★★½ ", 2.5)]
    fn test_stars_to_value(#[case] glyphs: &str, #[case] expected: f64) {
        assert_eq!(stars_to_value(glyphs), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("½★")]
    #[case("★★★★★★")]
    #[case("★★★★★½")]
    #[case("3 stars")]
    #[case("★½½")]
    fn test_stars_to_value_rejects_malformed(#[case] glyphs: &str) {
        assert_eq!(stars_to_value(glyphs), None);
    }

    #[test]
    fn test_scale_round_trips() {
        for step in HalfStars::all() {
            let glyphs = value_to_stars(step.value()).unwrap();
            assert_eq!(stars_to_value(&glyphs), Some(step.value()));
        }
    }

    #[test]
    fn test_value_to_stars_rejects_off_scale() {
        assert!(value_to_stars(0.0).is_err());
        assert!(value_to_stars(3.3).is_err());
        assert!(value_to_stars(5.5).is_err());
        assert!(value_to_stars(f64::NAN).is_err());
    }
}
