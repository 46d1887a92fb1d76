//! Per-case scoring of standardized predictions.
//!
//! Every (case, model) pair yields one [`ScoreRecord`] per rank cutoff and
//! coverage mode. `icd_score` is exact-code accuracy over the top-k window;
//! `sim_score` is semantic closeness against the required ground truths. The
//! two metrics are independent: a guess can be semantically close without
//! carrying the right code, and vice versa.

use dxbench_core::model::{
    Case, CoverageMode, GroundTruth, IcdMatch, ParsedPrediction, ScoreRecord, RANK_CUTOFFS,
};
use dxbench_core::normalize::DiagnosisNormalizer;
use dxbench_core::similarity::SimilarityEstimator;
use std::sync::Arc;

/// One guess after code standardization.
#[derive(Debug, Clone)]
pub struct StandardizedGuess {
    pub text: String,
    pub icd: Option<IcdMatch>,
}

/// A prediction with every guess run through the normalizer.
#[derive(Debug, Clone)]
pub struct StandardizedPrediction {
    pub job: dxbench_core::model::InferenceJob,
    pub guesses: Vec<StandardizedGuess>,
    pub valid: bool,
}

impl StandardizedPrediction {
    /// True when at least one guess carries a resolved code.
    pub fn any_resolved(&self) -> bool {
        self.guesses.iter().any(|g| g.icd.is_some())
    }
}

pub struct Scorer {
    normalizer: Arc<DiagnosisNormalizer>,
    estimator: Arc<dyn SimilarityEstimator>,
}

impl Scorer {
    pub fn new(
        normalizer: Arc<DiagnosisNormalizer>,
        estimator: Arc<dyn SimilarityEstimator>,
    ) -> Self {
        Self {
            normalizer,
            estimator,
        }
    }

    /// Resolve every guess to its ICD-11 code. Resolver failures leave the
    /// guess unresolved rather than failing the case; unresolved guesses
    /// still participate in similarity scoring.
    pub async fn standardize(&self, prediction: &ParsedPrediction) -> StandardizedPrediction {
        let mut guesses = Vec::with_capacity(prediction.guesses.len());
        for text in &prediction.guesses {
            let icd = match self.normalizer.resolve(text).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(
                        term = %text,
                        error = %e,
                        "code resolution failed, treating guess as unresolved"
                    );
                    None
                }
            };
            guesses.push(StandardizedGuess {
                text: text.clone(),
                icd,
            });
        }
        StandardizedPrediction {
            job: prediction.job.clone(),
            guesses,
            valid: prediction.valid,
        }
    }

    /// Score one case at every rank cutoff and coverage mode. Invalid
    /// predictions score zero across the board but still produce records.
    pub async fn score_case(
        &self,
        case: &Case,
        prediction: &StandardizedPrediction,
    ) -> anyhow::Result<Vec<ScoreRecord>> {
        let mut records = Vec::with_capacity(RANK_CUTOFFS.len() * CoverageMode::ALL.len());
        for &k in &RANK_CUTOFFS {
            let window = &prediction.guesses[..prediction.guesses.len().min(k)];
            for mode in CoverageMode::ALL {
                let (icd_score, sim_score) = if prediction.valid {
                    (
                        code_accuracy(&case.ground_truth, window, mode),
                        self.similarity(&case.ground_truth, window, mode).await?,
                    )
                } else {
                    (0.0, 0.0)
                };
                records.push(ScoreRecord {
                    case_id: case.id.clone(),
                    model: prediction.job.model.clone(),
                    k,
                    mode,
                    icd_score,
                    sim_score,
                    avg_score: (icd_score + sim_score) / 2.0,
                });
            }
        }
        Ok(records)
    }

    async fn similarity(
        &self,
        truths: &[GroundTruth],
        window: &[StandardizedGuess],
        mode: CoverageMode,
    ) -> anyhow::Result<f64> {
        if truths.is_empty() || window.is_empty() {
            return Ok(0.0);
        }
        match mode {
            CoverageMode::Primary => {
                let primary = &truths[primary_index(truths)];
                self.best_similarity(window, &primary.label).await
            }
            CoverageMode::Complete => {
                let mut sum = 0.0;
                for truth in truths {
                    sum += self.best_similarity(window, &truth.label).await?;
                }
                Ok(sum / truths.len() as f64)
            }
        }
    }

    async fn best_similarity(
        &self,
        window: &[StandardizedGuess],
        label: &str,
    ) -> anyhow::Result<f64> {
        let mut best = 0.0f64;
        for guess in window {
            best = best.max(self.estimator.score(&guess.text, label).await?);
        }
        Ok(best)
    }
}

/// Exact-code accuracy for one window. Primary mode is all-or-nothing on
/// the primary diagnosis; complete mode gives proportional credit for the
/// fraction of ground truths matched one-to-one.
fn code_accuracy(
    truths: &[GroundTruth],
    window: &[StandardizedGuess],
    mode: CoverageMode,
) -> f64 {
    if truths.is_empty() {
        return 0.0;
    }
    match mode {
        CoverageMode::Primary => {
            let primary = &truths[primary_index(truths)];
            let hit = window.iter().any(|g| {
                g.icd
                    .as_ref()
                    .is_some_and(|m| codes_equal(&m.code, &primary.code))
            });
            if hit {
                1.0
            } else {
                0.0
            }
        }
        CoverageMode::Complete => {
            matched_one_to_one(truths, window) as f64 / truths.len() as f64
        }
    }
}

/// Walk guesses in rank order; each resolved guess claims the first
/// still-unclaimed ground truth with an equal code. A guess satisfies at
/// most one ground truth.
fn matched_one_to_one(truths: &[GroundTruth], window: &[StandardizedGuess]) -> usize {
    let mut claimed = vec![false; truths.len()];
    let mut matched = 0;
    for guess in window {
        let Some(icd) = &guess.icd else { continue };
        let slot = truths
            .iter()
            .enumerate()
            .find(|(i, t)| !claimed[*i] && codes_equal(&t.code, &icd.code))
            .map(|(i, _)| i);
        if let Some(i) = slot {
            claimed[i] = true;
            matched += 1;
        }
    }
    matched
}

/// Index of the primary ground truth; cases without an explicit flag fall
/// back to the first listed diagnosis.
fn primary_index(truths: &[GroundTruth]) -> usize {
    truths.iter().position(|t| t.primary).unwrap_or(0)
}

fn codes_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
