//! Summary output. The sink trait keeps rendering concerns out of the
//! pipeline; the shipped implementation writes pretty-printed JSON.

use anyhow::Context;
use dxbench_core::model::SummaryRow;
use std::path::PathBuf;

pub trait SummarySink: Send + Sync {
    fn write(&self, rows: &[SummaryRow]) -> anyhow::Result<()>;
}

pub struct JsonSummaryWriter {
    path: PathBuf,
}

impl JsonSummaryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SummarySink for JsonSummaryWriter {
    fn write(&self, rows: &[SummaryRow]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(rows).context("serializing summary rows")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing summary to {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), rows = rows.len(), "wrote run summary");
        Ok(())
    }
}
