/// Per-species averaging of midpoint intensity.
///
/// Individuals of the same species observed on the same date are collapsed
/// into one mean value before species-level fitting. Day offsets are filled
/// in by the caller, which owns the date reference policy.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::logging::{self, Stage};
use crate::model::{LeafObservation, PhenoError, SpeciesDailyMean};

/// Averages midpoints per (species, date), skipping missing midpoints.
///
/// Each individual counts once per date: an individual with several usable
/// rows on one date contributes the mean of those rows. Observations without
/// a scientific name cannot be assigned to a species and are ignored. Output
/// is ordered by species, then date. `day_offset` is left at 0.
pub fn species_daily_means(observations: &[LeafObservation]) -> Vec<SpeciesDailyMean> {
    // (sum, count) of usable midpoints per individual within each pair
    let mut buckets: BTreeMap<(&str, NaiveDate), BTreeMap<&str, (f64, usize)>> = BTreeMap::new();
    let mut unnamed = 0usize;

    for obs in observations {
        let Some(species) = obs.scientific_name.as_deref() else {
            unnamed += 1;
            continue;
        };
        let individuals = buckets.entry((species, obs.date)).or_default();
        if let Some(midpoint) = obs.midpoint {
            let entry = individuals.entry(obs.individual_id.as_str()).or_insert((0.0, 0));
            entry.0 += midpoint;
            entry.1 += 1;
        }
    }

    if unnamed > 0 {
        logging::warn(
            Stage::Aggregate,
            None,
            &format!("{} observations have no scientific name and are left out of species means", unnamed),
        );
    }

    buckets
        .into_iter()
        .map(|((species, date), individuals)| {
            let n_individuals = individuals.len();
            let total: f64 = individuals
                .values()
                .map(|&(sum, count)| sum / count as f64)
                .sum();
            SpeciesDailyMean {
                species: species.to_string(),
                date,
                day_offset: 0,
                mean_intensity: if n_individuals > 0 {
                    Some(total / n_individuals as f64)
                } else {
                    None
                },
                n_individuals,
            }
        })
        .collect()
}

/// Checks that every (species, date) pair occurs at most once.
pub fn verify_unique_pairs(series: &[SpeciesDailyMean]) -> Result<(), PhenoError> {
    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::with_capacity(series.len());
    for point in series {
        if !seen.insert((point.species.as_str(), point.date)) {
            return Err(PhenoError::DuplicateAggregate {
                species: point.species.clone(),
                date: point.date,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(individual: &str, species: Option<&str>, date: NaiveDate, midpoint: Option<f64>) -> LeafObservation {
        LeafObservation {
            individual_id: individual.to_string(),
            scientific_name: species.map(String::from),
            growth_form: Some("Deciduous broadleaf".to_string()),
            date,
            intensity_label: None,
            midpoint,
            day_offset: 0,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 5, d).unwrap()
    }

    #[test]
    fn test_two_individuals_average_to_midpoint() {
        let observations = vec![
            obs("1", Some("Acer rubrum"), day(1), Some(0.2)),
            obs("2", Some("Acer rubrum"), day(1), Some(0.8)),
        ];
        let series = species_daily_means(&observations);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].mean_intensity, Some(0.5));
        assert_eq!(series[0].n_individuals, 2);
    }

    #[test]
    fn test_missing_midpoints_are_excluded_from_mean() {
        let observations = vec![
            obs("1", Some("Acer rubrum"), day(1), Some(0.62)),
            obs("2", Some("Acer rubrum"), day(1), None),
        ];
        let series = species_daily_means(&observations);
        assert_eq!(series[0].mean_intensity, Some(0.62));
        assert_eq!(series[0].n_individuals, 1);
    }

    #[test]
    fn test_individual_with_several_rows_counts_once() {
        let observations = vec![
            obs("1", Some("Acer rubrum"), day(1), Some(0.62)),
            obs("1", Some("Acer rubrum"), day(1), Some(0.845)),
            obs("2", Some("Acer rubrum"), day(1), Some(0.145)),
        ];
        let series = species_daily_means(&observations);
        assert_eq!(series[0].n_individuals, 2);
        // individual 1 averages to 0.7325 before joining individual 2
        let mean = series[0].mean_intensity.unwrap();
        assert!((mean - 0.43875).abs() < 1e-12, "mean {}", mean);
    }

    #[test]
    fn test_date_with_only_missing_midpoints_has_missing_mean() {
        let observations = vec![obs("1", Some("Quercus alba"), day(3), None)];
        let series = species_daily_means(&observations);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].mean_intensity, None);
        assert_eq!(series[0].n_individuals, 0);
    }

    #[test]
    fn test_output_is_ordered_and_unique() {
        let observations = vec![
            obs("3", Some("Quercus alba"), day(2), Some(0.145)),
            obs("1", Some("Acer rubrum"), day(9), Some(0.345)),
            obs("2", Some("Acer rubrum"), day(4), Some(0.025)),
            obs("4", Some("Acer rubrum"), day(9), Some(0.345)),
            obs("5", None, day(4), Some(0.975)),
        ];
        let series = species_daily_means(&observations);
        let keys: Vec<(&str, NaiveDate)> =
            series.iter().map(|p| (p.species.as_str(), p.date)).collect();
        assert_eq!(
            keys,
            vec![
                ("Acer rubrum", day(4)),
                ("Acer rubrum", day(9)),
                ("Quercus alba", day(2)),
            ]
        );
        assert!(verify_unique_pairs(&series).is_ok());
    }

    #[test]
    fn test_duplicate_pairs_are_reported() {
        let point = SpeciesDailyMean {
            species: "Acer rubrum".to_string(),
            date: day(1),
            day_offset: 0,
            mean_intensity: Some(0.5),
            n_individuals: 2,
        };
        let err = verify_unique_pairs(&[point.clone(), point]).unwrap_err();
        assert_eq!(
            err,
            PhenoError::DuplicateAggregate {
                species: "Acer rubrum".to_string(),
                date: day(1),
            }
        );
    }
}
