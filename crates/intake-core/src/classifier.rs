//! Hue → alliance classification.
//!
//! Hues live on a circle (`[0, 360)`); a band whose `start` is greater than its
//! `end` wraps through 0, which is how the red band straddles the seam.

use crate::types::{Alliance, AllianceColor};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// HueBand
// ---------------------------------------------------------------------------

/// Inclusive angular range on the hue circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueBand {
    pub start: f64,
    pub end: f64,
}

impl HueBand {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=360.0).contains(&self.start) && (0.0..=360.0).contains(&self.end)
    }

    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// `hue` must already be normalised into `[0, 360)`.
    pub fn contains(&self, hue: f64) -> bool {
        if self.wraps() {
            hue >= self.start || hue <= self.end
        } else {
            hue >= self.start && hue <= self.end
        }
    }

    /// Midpoint of the band, following the wrap.
    pub fn center(&self) -> f64 {
        let width = if self.wraps() {
            self.end + 360.0 - self.start
        } else {
            self.end - self.start
        };
        (self.start + width / 2.0).rem_euclid(360.0)
    }

    fn segments(&self) -> Vec<(f64, f64)> {
        if self.wraps() {
            vec![(self.start, 360.0), (0.0, self.end)]
        } else {
            vec![(self.start, self.end)]
        }
    }

    pub fn overlaps(&self, other: &HueBand) -> bool {
        self.segments().iter().any(|&(lo, hi)| {
            other
                .segments()
                .iter()
                .any(|&(olo, ohi)| lo <= ohi && olo <= hi)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorBands {
    #[serde(default = "default_red")]
    pub red: HueBand,
    #[serde(default = "default_blue")]
    pub blue: HueBand,
}

fn default_red() -> HueBand {
    HueBand::new(330.0, 30.0)
}

fn default_blue() -> HueBand {
    HueBand::new(210.0, 270.0)
}

impl Default for ColorBands {
    fn default() -> Self {
        Self {
            red: default_red(),
            blue: default_blue(),
        }
    }
}

// ---------------------------------------------------------------------------
// ColorClassifier
// ---------------------------------------------------------------------------

/// Stateless mapping from a hue reading to a band and then to an
/// [`AllianceColor`].
#[derive(Debug, Clone, Default)]
pub struct ColorClassifier {
    bands: ColorBands,
}

impl ColorClassifier {
    pub fn new(bands: ColorBands) -> Self {
        Self { bands }
    }

    /// Which band a raw hue falls in. Non-finite readings match nothing.
    pub fn detect(&self, hue: f64) -> Option<Alliance> {
        if !hue.is_finite() {
            return None;
        }
        let hue = hue.rem_euclid(360.0);
        if self.bands.red.contains(hue) {
            Some(Alliance::Red)
        } else if self.bands.blue.contains(hue) {
            Some(Alliance::Blue)
        } else {
            None
        }
    }

    /// Classify a sensor reading for the given alliance. `None` means the
    /// sensor saw no object, which is always `Unknown`.
    pub fn classify(&self, hue: Option<f64>, alliance: Alliance) -> AllianceColor {
        match hue.and_then(|h| self.detect(h)) {
            Some(color) if color == alliance => AllianceColor::Ally,
            Some(_) => AllianceColor::Opposing,
            None => AllianceColor::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ColorClassifier {
        ColorClassifier::default()
    }

    #[test]
    fn band_centers_follow_wrap() {
        let bands = ColorBands::default();
        assert_eq!(bands.red.center(), 0.0);
        assert_eq!(bands.blue.center(), 240.0);
        assert_eq!(HueBand::new(350.0, 20.0).center(), 5.0);
    }

    #[test]
    fn red_alliance_table() {
        let c = classifier();
        let table = [
            (0.0, AllianceColor::Ally),
            (15.0, AllianceColor::Ally),
            (345.0, AllianceColor::Ally),
            (240.0, AllianceColor::Opposing),
            (90.0, AllianceColor::Unknown),
            (180.0, AllianceColor::Unknown),
        ];
        for (hue, expected) in table {
            assert_eq!(c.classify(Some(hue), Alliance::Red), expected, "hue {hue}");
        }
    }

    #[test]
    fn blue_alliance_flips_ally_and_opposing() {
        let c = classifier();
        assert_eq!(c.classify(Some(240.0), Alliance::Blue), AllianceColor::Ally);
        assert_eq!(c.classify(Some(15.0), Alliance::Blue), AllianceColor::Opposing);
        assert_eq!(c.classify(Some(90.0), Alliance::Blue), AllianceColor::Unknown);
    }

    #[test]
    fn band_edges_are_inclusive() {
        let c = classifier();
        assert_eq!(c.detect(330.0), Some(Alliance::Red));
        assert_eq!(c.detect(30.0), Some(Alliance::Red));
        assert_eq!(c.detect(210.0), Some(Alliance::Blue));
        assert_eq!(c.detect(270.0), Some(Alliance::Blue));

        assert_eq!(c.detect(329.9), None);
        assert_eq!(c.detect(30.1), None);
        assert_eq!(c.detect(209.9), None);
        assert_eq!(c.detect(270.1), None);
    }

    #[test]
    fn no_object_is_unknown_not_red() {
        let c = classifier();
        assert_eq!(c.classify(None, Alliance::Red), AllianceColor::Unknown);
        assert_eq!(c.classify(None, Alliance::Blue), AllianceColor::Unknown);
        // a real reading of 0 is still red
        assert_eq!(c.classify(Some(0.0), Alliance::Blue), AllianceColor::Opposing);
    }

    #[test]
    fn out_of_range_hues_wrap() {
        let c = classifier();
        assert_eq!(c.detect(360.0), Some(Alliance::Red));
        assert_eq!(c.detect(-10.0), Some(Alliance::Red));
        assert_eq!(c.detect(600.0), Some(Alliance::Blue));
    }

    #[test]
    fn non_finite_hue_is_unknown() {
        let c = classifier();
        assert_eq!(c.classify(Some(f64::NAN), Alliance::Red), AllianceColor::Unknown);
        assert_eq!(
            c.classify(Some(f64::INFINITY), Alliance::Red),
            AllianceColor::Unknown
        );
    }

    #[test]
    fn overlap_handles_wraparound() {
        let red = default_red();
        assert!(!red.overlaps(&default_blue()));
        assert!(red.overlaps(&HueBand::new(20.0, 40.0)));
        assert!(red.overlaps(&HueBand::new(300.0, 331.0)));
        assert!(!red.overlaps(&HueBand::new(31.0, 329.0)));
    }
}
