use serde::{Deserialize, Serialize};

/// Rank cutoffs every prediction window is evaluated at.
pub const RANK_CUTOFFS: [usize; 2] = [5, 10];

/// Reference to one clinical figure: where the image lives and the caption
/// shown to the model alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: String,
    #[serde(default)]
    pub caption: String,
}

/// One ground-truth diagnosis for a case. `primary` marks the single most
/// clinically significant diagnosis; a case carries exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTruth {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub primary: bool,
}

/// A clinical case: narrative, figures, and the coded diagnosis list it is
/// scored against. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub narrative: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    pub ground_truth: Vec<GroundTruth>,
}

/// One unit of inference work: a case evaluated under one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InferenceJob {
    pub case_id: String,
    pub model: String,
}

/// Terminal state of an inference job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The provider answered and the reply parsed into at least one guess.
    Ok,
    /// The provider answered but no guesses could be extracted.
    ParseFailed,
    /// The provider failed fatally or exhausted its retry budget.
    ProviderError,
}

/// What came back for one job. Written once by the worker pool; the
/// pipeline downgrades `Ok` to `ParseFailed` after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResponse {
    pub job: InferenceJob,
    /// Raw completion text; empty when the job failed outright.
    pub text: String,
    pub status: ResponseStatus,
    /// Attempts spent, including the final one.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Ranked diagnosis guesses extracted from a completion. `valid` is false
/// when nothing well-formed could be extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPrediction {
    pub job: InferenceJob,
    pub guesses: Vec<String>,
    pub valid: bool,
}

/// A resolved ICD-11 entity: canonical code plus its display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcdMatch {
    pub code: String,
    pub title: String,
}

/// Which ground truths a prediction window must cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Only the primary diagnosis must be matched.
    Primary,
    /// Every ground-truth diagnosis must be matched one-to-one.
    Complete,
}

impl CoverageMode {
    pub const ALL: [CoverageMode; 2] = [CoverageMode::Primary, CoverageMode::Complete];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageMode::Primary => "primary",
            CoverageMode::Complete => "complete",
        }
    }
}

/// Scores for one (case, model, cutoff, mode) window.
/// `avg_score` is always `(icd_score + sim_score) / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub case_id: String,
    pub model: String,
    pub k: usize,
    pub mode: CoverageMode,
    pub icd_score: f64,
    pub sim_score: f64,
    pub avg_score: f64,
}

/// Aggregate over all cases for one (model, cutoff, mode).
///
/// Count fields satisfy
/// `valid_standardized_preds_count <= valid_preds_count <= n_all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub model: String,
    pub k: usize,
    pub mode: CoverageMode,
    pub icd_accuracy: f64,
    pub sim_accuracy: f64,
    pub avg_accuracy: f64,
    /// Cases evaluated, including provider failures and parse failures.
    pub n_all: usize,
    /// Cases with at least one extracted guess.
    pub valid_preds_count: usize,
    /// Cases with at least one guess that resolved to an ICD-11 code.
    pub valid_standardized_preds_count: usize,
}
