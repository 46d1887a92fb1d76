//! Chat message assembly for differential-diagnosis requests.
//!
//! One case becomes a system message plus a single multimodal user message:
//! the clinical narrative, one captioned image part per figure, then the
//! output-format instruction the parser keys on.

use crate::model::Case;
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

pub const SYSTEM_PROMPT: &str = "You are a medical expert. Given the patient's demographic information, chief complaint, medical history, and results from various examinations, your task is to identify possible diagnoses. Please enumerate the top 10 most likely diagnoses in order, with the most likely disease listed first. Each item in the list must represent a **single, independent disease**. If the patient has multiple diseases or complications, please list them separately. Output only under the heading '### Output ###'.";

pub const OUTPUT_INSTRUCTION: &str = "Please output your final answer in the following format:\n\n### Output ###\n[\"Diagnosis A\", \"Diagnosis B\"]";

/// Build the chat messages for one case. Fails when a referenced image
/// cannot be read.
pub fn build_messages(case: &Case) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut parts = vec![json!({
        "type": "text",
        "text": format!(
            "[Chief Complaint and Medical History]\n{}",
            case.narrative
        ),
    })];

    for (index, image) in case.images.iter().enumerate() {
        parts.push(json!({
            "type": "text",
            "text": format!("Figure {}: {}", index + 1, image.caption),
        }));
        parts.push(json!({
            "type": "image_url",
            "image_url": {
                "url": image_data_url(&image.path)?,
                "detail": "high",
            },
        }));
    }

    parts.push(json!({
        "type": "text",
        "text": OUTPUT_INSTRUCTION,
    }));

    Ok(vec![
        json!({ "role": "system", "content": SYSTEM_PROMPT }),
        json!({ "role": "user", "content": parts }),
    ])
}

fn image_data_url(path: &str) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading image {path}"))?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}
