//! Run-level aggregation of score records into summary rows.

use crate::score::StandardizedPrediction;
use dxbench_core::model::{CoverageMode, ScoreRecord, SummaryRow, RANK_CUTOFFS};
use std::collections::BTreeMap;

#[derive(Default)]
struct ModelCounts {
    n_all: usize,
    valid: usize,
    standardized: usize,
}

/// Collapse per-case records into one [`SummaryRow`] per (model, k, mode),
/// in that stable order. Accuracies are means over every evaluated case,
/// counting failed and invalid cases as zeros; `avg_accuracy` is recomputed
/// from the two means so the halving invariant holds exactly.
pub fn summarize(
    records: &[ScoreRecord],
    predictions: &[StandardizedPrediction],
) -> Vec<SummaryRow> {
    let mut counts: BTreeMap<String, ModelCounts> = BTreeMap::new();
    for prediction in predictions {
        let entry = counts.entry(prediction.job.model.clone()).or_default();
        entry.n_all += 1;
        if prediction.valid {
            entry.valid += 1;
            if prediction.any_resolved() {
                entry.standardized += 1;
            }
        }
    }
    for record in records {
        counts.entry(record.model.clone()).or_default();
    }

    let mut rows = Vec::with_capacity(counts.len() * RANK_CUTOFFS.len() * CoverageMode::ALL.len());
    for (model, model_counts) in &counts {
        for &k in &RANK_CUTOFFS {
            for mode in CoverageMode::ALL {
                let group: Vec<&ScoreRecord> = records
                    .iter()
                    .filter(|r| r.model == *model && r.k == k && r.mode == mode)
                    .collect();
                let (icd_accuracy, sim_accuracy) = if group.is_empty() {
                    (0.0, 0.0)
                } else {
                    let n = group.len() as f64;
                    (
                        group.iter().map(|r| r.icd_score).sum::<f64>() / n,
                        group.iter().map(|r| r.sim_score).sum::<f64>() / n,
                    )
                };
                rows.push(SummaryRow {
                    model: model.clone(),
                    k,
                    mode,
                    icd_accuracy,
                    sim_accuracy,
                    avg_accuracy: (icd_accuracy + sim_accuracy) / 2.0,
                    n_all: model_counts.n_all,
                    valid_preds_count: model_counts.valid,
                    valid_standardized_preds_count: model_counts.standardized,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::StandardizedGuess;
    use dxbench_core::model::{IcdMatch, InferenceJob};

    fn prediction(model: &str, case_id: &str, valid: bool, resolved: bool) -> StandardizedPrediction {
        let guesses = if valid {
            vec![StandardizedGuess {
                text: "Cholera".into(),
                icd: resolved.then(|| IcdMatch {
                    code: "1A00".into(),
                    title: "Cholera".into(),
                }),
            }]
        } else {
            vec![]
        };
        StandardizedPrediction {
            job: InferenceJob {
                case_id: case_id.into(),
                model: model.into(),
            },
            guesses,
            valid,
        }
    }

    fn full_case_records(model: &str, case_id: &str, icd: f64, sim: f64) -> Vec<ScoreRecord> {
        let mut out = Vec::new();
        for &k in &RANK_CUTOFFS {
            for mode in CoverageMode::ALL {
                out.push(ScoreRecord {
                    case_id: case_id.into(),
                    model: model.into(),
                    k,
                    mode,
                    icd_score: icd,
                    sim_score: sim,
                    avg_score: (icd + sim) / 2.0,
                });
            }
        }
        out
    }

    #[test]
    fn counts_track_validity_and_standardization() {
        let predictions = vec![
            prediction("m1", "c1", true, true),
            prediction("m1", "c2", true, false),
            prediction("m1", "c3", false, false),
        ];
        let mut records = Vec::new();
        records.extend(full_case_records("m1", "c1", 1.0, 0.9));
        records.extend(full_case_records("m1", "c2", 0.0, 0.3));
        records.extend(full_case_records("m1", "c3", 0.0, 0.0));

        let rows = summarize(&records, &predictions);

        assert_eq!(rows.len(), 4);
        for row in &rows {
            assert_eq!(row.n_all, 3);
            assert_eq!(row.valid_preds_count, 2);
            assert_eq!(row.valid_standardized_preds_count, 1);
            assert!(row.valid_standardized_preds_count <= row.valid_preds_count);
            assert!(row.valid_preds_count <= row.n_all);
            assert!(
                (row.avg_accuracy - (row.icd_accuracy + row.sim_accuracy) / 2.0).abs() < 1e-12
            );
        }
    }

    #[test]
    fn accuracies_are_means_over_all_cases() {
        let predictions = vec![
            prediction("m1", "c1", true, true),
            prediction("m1", "c2", true, true),
        ];
        let mut records = Vec::new();
        records.extend(full_case_records("m1", "c1", 1.0, 0.8));
        records.extend(full_case_records("m1", "c2", 0.0, 0.4));

        let rows = summarize(&records, &predictions);
        let row = rows
            .iter()
            .find(|r| r.k == 5 && r.mode == CoverageMode::Primary)
            .unwrap();

        assert!((row.icd_accuracy - 0.5).abs() < 1e-12);
        assert!((row.sim_accuracy - 0.6).abs() < 1e-12);
        assert!((row.avg_accuracy - 0.55).abs() < 1e-12);
    }

    #[test]
    fn rows_come_out_in_model_cutoff_mode_order() {
        let predictions = vec![
            prediction("zeta", "c1", true, true),
            prediction("alpha", "c1", true, true),
        ];
        let mut records = Vec::new();
        records.extend(full_case_records("zeta", "c1", 1.0, 1.0));
        records.extend(full_case_records("alpha", "c1", 1.0, 1.0));

        let rows = summarize(&records, &predictions);

        let shape: Vec<(String, usize, CoverageMode)> = rows
            .iter()
            .map(|r| (r.model.clone(), r.k, r.mode))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("alpha".into(), 5, CoverageMode::Primary),
                ("alpha".into(), 5, CoverageMode::Complete),
                ("alpha".into(), 10, CoverageMode::Primary),
                ("alpha".into(), 10, CoverageMode::Complete),
                ("zeta".into(), 5, CoverageMode::Primary),
                ("zeta".into(), 5, CoverageMode::Complete),
                ("zeta".into(), 10, CoverageMode::Primary),
                ("zeta".into(), 10, CoverageMode::Complete),
            ]
        );
    }

    #[test]
    fn empty_run_summarizes_to_nothing() {
        assert!(summarize(&[], &[]).is_empty());
    }
}
