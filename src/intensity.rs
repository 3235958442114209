/// Phenophase intensity bins and their numeric midpoints.
///
/// Observers report leaf cover as one of six percentage ranges. Fitting
/// needs a number in [0, 1], so each range is represented by a fixed
/// midpoint. The values below are constants of the analysis, not a formula
/// to be recomputed: the 25-49% and 75-94% bins use 0.20 and 0.85 as their
/// lower edges.

use std::collections::HashMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Bin registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntensityBin {
    Under5,
    From5To24,
    From25To49,
    From50To74,
    From75To94,
    AtLeast95,
}

/// One reported intensity range.
pub struct BinDefinition {
    pub bin: IntensityBin,
    /// Label exactly as it appears in the observation data.
    pub label: &'static str,
    pub midpoint: f64,
}

/// All intensity bins, in ascending order of cover.
pub static BIN_REGISTRY: &[BinDefinition] = &[
    BinDefinition {
        bin: IntensityBin::Under5,
        label: "< 5%",
        midpoint: 0.05 / 2.0,
    },
    BinDefinition {
        bin: IntensityBin::From5To24,
        label: "5-24%",
        midpoint: (0.05 + 0.24) / 2.0,
    },
    BinDefinition {
        bin: IntensityBin::From25To49,
        label: "25-49%",
        midpoint: (0.20 + 0.49) / 2.0,
    },
    BinDefinition {
        bin: IntensityBin::From50To74,
        label: "50-74%",
        midpoint: (0.5 + 0.74) / 2.0,
    },
    BinDefinition {
        bin: IntensityBin::From75To94,
        label: "75-94%",
        midpoint: (0.85 + 0.94) / 2.0,
    },
    BinDefinition {
        bin: IntensityBin::AtLeast95,
        label: ">= 95%",
        midpoint: (1.0 + 0.95) / 2.0,
    },
];

fn label_index() -> &'static HashMap<&'static str, &'static BinDefinition> {
    static INDEX: OnceLock<HashMap<&'static str, &'static BinDefinition>> = OnceLock::new();
    INDEX.get_or_init(|| BIN_REGISTRY.iter().map(|def| (def.label, def)).collect())
}

impl IntensityBin {
    /// Looks up a bin by its reported label. Surrounding whitespace is ignored.
    pub fn from_label(label: &str) -> Option<IntensityBin> {
        label_index().get(label.trim()).map(|def| def.bin)
    }

    pub fn definition(self) -> &'static BinDefinition {
        // Every variant has exactly one registry entry (see tests).
        BIN_REGISTRY
            .iter()
            .find(|def| def.bin == self)
            .unwrap_or(&BIN_REGISTRY[0])
    }

    pub fn label(self) -> &'static str {
        self.definition().label
    }

    pub fn midpoint(self) -> f64 {
        self.definition().midpoint
    }
}

/// Midpoint for a possibly-missing label. Unknown or missing labels yield
/// `None`; this never fails.
pub fn midpoint_for_label(label: Option<&str>) -> Option<f64> {
    label.and_then(IntensityBin::from_label).map(IntensityBin::midpoint)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    /// Independent branch-per-label mapping used to cross-check the registry.
    fn midpoint_by_branching(label: &str) -> Option<f64> {
        if label == "< 5%" {
            Some(0.025)
        } else if label == "5-24%" {
            Some(0.145)
        } else if label == "25-49%" {
            Some(0.345)
        } else if label == "50-74%" {
            Some(0.62)
        } else if label == "75-94%" {
            Some(0.895)
        } else if label == ">= 95%" {
            Some(0.975)
        } else {
            None
        }
    }

    #[test]
    fn test_all_six_labels_match_published_midpoints() {
        let expected = [
            ("< 5%", 0.025),
            ("5-24%", 0.145),
            ("25-49%", 0.345),
            ("50-74%", 0.62),
            ("75-94%", 0.895),
            (">= 95%", 0.975),
        ];
        for (label, value) in expected {
            let got = midpoint_for_label(Some(label)).expect("known label should map");
            assert!(
                (got - value).abs() < TOLERANCE,
                "{} mapped to {}, expected {}",
                label,
                got,
                value
            );
        }
    }

    #[test]
    fn test_registry_agrees_with_branching_mapping() {
        let labels = [
            "< 5%", "5-24%", "25-49%", "50-74%", "75-94%", ">= 95%", "Less than 5%", "", "95%",
        ];
        for label in labels {
            let table = midpoint_for_label(Some(label));
            let branched = midpoint_by_branching(label);
            match (table, branched) {
                (Some(a), Some(b)) => assert!((a - b).abs() < TOLERANCE, "{}: {} vs {}", label, a, b),
                (None, None) => {}
                other => panic!("mappings disagree for {:?}: {:?}", label, other),
            }
        }
    }

    #[test]
    fn test_unknown_and_missing_labels_map_to_missing() {
        assert_eq!(midpoint_for_label(None), None);
        assert_eq!(midpoint_for_label(Some("-9999")), None);
        assert_eq!(midpoint_for_label(Some("Little")), None);
    }

    #[test]
    fn test_label_lookup_ignores_surrounding_whitespace() {
        assert_eq!(IntensityBin::from_label("  50-74% "), Some(IntensityBin::From50To74));
    }

    #[test]
    fn test_every_bin_round_trips_through_its_label() {
        assert_eq!(BIN_REGISTRY.len(), 6);
        for def in BIN_REGISTRY {
            assert_eq!(IntensityBin::from_label(def.label), Some(def.bin));
            assert_eq!(def.bin.label(), def.label);
        }
    }

    #[test]
    fn test_midpoints_lie_in_unit_interval_and_ascend() {
        let midpoints: Vec<f64> = BIN_REGISTRY.iter().map(|d| d.midpoint).collect();
        assert!(midpoints.iter().all(|&m| (0.0..=1.0).contains(&m)));
        assert!(midpoints.windows(2).all(|w| w[0] < w[1]));
    }
}
