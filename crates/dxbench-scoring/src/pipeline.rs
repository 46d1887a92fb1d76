//! End-to-end evaluation: dispatch inference, parse completions,
//! standardize guesses, score, and summarize.

use crate::aggregate::summarize;
use crate::score::Scorer;
use dxbench_core::engine::Dispatcher;
use dxbench_core::model::{Case, RawResponse, ResponseStatus, ScoreRecord, SummaryRow};
use dxbench_core::parser::parse_response;
use dxbench_core::report::progress::ProgressSink;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything one run produces, in deterministic (model, case) order.
#[derive(Debug)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub responses: Vec<RawResponse>,
    pub records: Vec<ScoreRecord>,
    pub summary: Vec<SummaryRow>,
}

pub struct Pipeline {
    dispatcher: Dispatcher,
    scorer: Scorer,
}

impl Pipeline {
    pub fn new(dispatcher: Dispatcher, scorer: Scorer) -> Self {
        Self { dispatcher, scorer }
    }

    /// Evaluate every case against every configured model. Per-job failures
    /// become data in the report; only an empty case set or invalid
    /// configuration fail the run itself.
    pub async fn run(
        &self,
        cases: &[Case],
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<EvaluationReport> {
        if cases.is_empty() {
            anyhow::bail!("no cases to evaluate");
        }
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, cases = cases.len(), "starting evaluation run");

        let case_index: HashMap<&str, &Case> =
            cases.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut responses = self.dispatcher.run(cases, progress).await?;

        let mut predictions = Vec::with_capacity(responses.len());
        let mut records = Vec::new();
        for response in &mut responses {
            let Some(case) = case_index.get(response.job.case_id.as_str()) else {
                tracing::error!(
                    case_id = %response.job.case_id,
                    "response references an unknown case, skipping"
                );
                continue;
            };

            let parsed = parse_response(&response.job, &response.text);
            if response.status == ResponseStatus::Ok && !parsed.valid {
                response.status = ResponseStatus::ParseFailed;
                tracing::warn!(
                    case_id = %response.job.case_id,
                    model = %response.job.model,
                    "completion yielded no diagnosis guesses"
                );
            }

            let standardized = self.scorer.standardize(&parsed).await;
            records.extend(self.scorer.score_case(case, &standardized).await?);
            predictions.push(standardized);
        }

        let summary = summarize(&records, &predictions);
        tracing::info!(
            run_id = %run_id,
            responses = responses.len(),
            records = records.len(),
            summary_rows = summary.len(),
            "evaluation run complete"
        );
        Ok(EvaluationReport {
            run_id,
            responses,
            records,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxbench_core::config::{BackoffConfig, RunConfig};
    use dxbench_core::model::GroundTruth;
    use dxbench_core::normalize::DiagnosisNormalizer;
    use dxbench_core::providers::inference::FakeProvider;
    use dxbench_core::providers::resolver::FakeResolver;
    use dxbench_core::similarity::LexicalSimilarity;
    use std::sync::Arc;

    fn case(id: &str) -> Case {
        Case {
            id: id.into(),
            narrative: format!("narrative for {id}"),
            images: vec![],
            ground_truth: vec![GroundTruth {
                code: "1A00".into(),
                label: "Cholera".into(),
                primary: true,
            }],
        }
    }

    fn config() -> RunConfig {
        RunConfig {
            models: vec!["m1".into()],
            max_workers: 2,
            max_retries: 3,
            timeout_seconds: 5,
            backoff: BackoffConfig { base_ms: 1, cap_ms: 4 },
        }
    }

    fn pipeline(provider: FakeProvider) -> Pipeline {
        let dispatcher = Dispatcher::new(Arc::new(provider), config());
        let scorer = Scorer::new(
            Arc::new(DiagnosisNormalizer::new(Arc::new(
                FakeResolver::new().with_entry("cholera", "1A00", "Cholera"),
            ))),
            Arc::new(LexicalSimilarity::new()),
        );
        Pipeline::new(dispatcher, scorer)
    }

    #[tokio::test]
    async fn empty_case_set_fails_the_run() {
        let p = pipeline(FakeProvider::respond_with("[\"Cholera\"]"));
        let err = p.run(&[], None).await.unwrap_err();
        assert!(err.to_string().contains("no cases to evaluate"));
    }

    #[tokio::test]
    async fn unparseable_completion_is_downgraded_to_parse_failed() {
        let p = pipeline(FakeProvider::respond_with(
            "I am sorry, I cannot provide a diagnosis list.",
        ));

        let report = p.run(&[case("c1")], None).await.unwrap();

        assert_eq!(report.responses.len(), 1);
        assert_eq!(report.responses[0].status, ResponseStatus::ParseFailed);
        assert_eq!(report.records.len(), 4);
        assert!(report.records.iter().all(|r| r.avg_score == 0.0));
        let row = &report.summary[0];
        assert_eq!(row.n_all, 1);
        assert_eq!(row.valid_preds_count, 0);
        assert_eq!(row.valid_standardized_preds_count, 0);
    }

    #[tokio::test]
    async fn successful_completion_keeps_ok_status() {
        let p = pipeline(FakeProvider::respond_with(
            "### Output ###\n[\"Cholera\", \"Giardiasis\"]",
        ));

        let report = p.run(&[case("c1")], None).await.unwrap();

        assert_eq!(report.responses[0].status, ResponseStatus::Ok);
        let row = &report.summary[0];
        assert_eq!(row.valid_preds_count, 1);
        assert_eq!(row.valid_standardized_preds_count, 1);
    }
}
