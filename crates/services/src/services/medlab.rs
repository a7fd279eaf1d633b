//! Lab-result advice: normalize lab payloads, build a prompt, ask the model.
//!
//! Two request shapes are accepted: an explicit `items[]` list, or a raw
//! `data[]` export from a lab system. Both normalize into [`LabReport`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;

use super::chat_api::{ChatApiClient, ChatApiError};

#[derive(Debug, Error)]
pub enum MedLabError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("chat api error: {0}")]
    ChatApi(#[from] ChatApiError),
}

/// Canonical lab item after normalization
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LabItem {
    pub name: String,
    pub sample_type: Option<String>,
    pub method: Option<String>,
    pub instrument: Option<String>,
    pub result: String,
    pub unit: Option<String>,
    pub ref_range: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub id: Option<String>,
}

impl PatientInfo {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.gender.is_none() && self.age.is_none() && self.id.is_none()
    }
}

/// Tuning knobs the caller may pass through
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AdviceConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Raw row as exported by the lab system. Field names follow the
/// export format; everything is optional.
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RawLabRow {
    pub item_name: Option<String>,
    pub item_code: Option<String>,
    pub sample_type: Option<String>,
    pub method_name: Option<String>,
    pub instrument_name: Option<String>,
    pub result_value1: Option<String>,
    pub result_origin_value: Option<String>,
    pub result_prompt: Option<String>,
    pub unit: Option<String>,
    pub reference_value: Option<String>,
}

/// Request body for `/api/ai/medlab/advice`
#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MedLabAdviceRequest {
    pub patient: Option<PatientInfo>,
    #[serde(default)]
    pub items: Vec<LabItem>,
    #[serde(default)]
    pub data: Vec<RawLabRow>,
    pub context: Option<String>,
    pub config: Option<AdviceConfig>,
}

/// Canonical internal structure fed to prompt construction
#[derive(Debug, Clone)]
pub struct LabReport {
    pub patient: Option<PatientInfo>,
    pub items: Vec<LabItem>,
    pub context: Option<String>,
    pub config: AdviceConfig,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MedLabAdviceResponse {
    pub advice: String,
    pub model: String,
    pub item_count: usize,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Map a raw export row onto a canonical item. The result value prefers
/// `resultValue1`, falls back to `resultOriginValue`; `resultPrompt` is
/// appended as a suffix annotation. Rows with no name or no result map
/// to `None`.
fn normalize_row(row: RawLabRow) -> Option<LabItem> {
    let name = non_blank(row.item_name)?;
    let base = non_blank(row.result_value1).or_else(|| non_blank(row.result_origin_value))?;

    let result = match non_blank(row.result_prompt) {
        Some(prompt) => format!("{base} {prompt}"),
        None => base,
    };

    Some(LabItem {
        name,
        sample_type: non_blank(row.sample_type),
        method: non_blank(row.method_name),
        instrument: non_blank(row.instrument_name),
        result,
        unit: non_blank(row.unit),
        ref_range: non_blank(row.reference_value),
    })
}

/// Reduce the multi-shape request to the canonical report. An explicit
/// `items` list wins outright over the raw `data` rows.
pub fn normalize(request: MedLabAdviceRequest) -> Result<LabReport, MedLabError> {
    let items: Vec<LabItem> = if !request.items.is_empty() {
        request
            .items
            .into_iter()
            .filter(|item| !item.name.trim().is_empty() && !item.result.trim().is_empty())
            .collect()
    } else {
        request.data.into_iter().filter_map(normalize_row).collect()
    };

    if items.is_empty() {
        return Err(MedLabError::Validation(
            "no usable lab items in request".to_string(),
        ));
    }

    Ok(LabReport {
        patient: request.patient.filter(|p| !p.is_empty()),
        items,
        context: non_blank(request.context),
        config: request.config.unwrap_or_default(),
    })
}

/// Deterministic prompt text for the chat model.
pub fn build_prompt(report: &LabReport) -> String {
    let mut prompt = String::from("Lab report:\n");

    if let Some(patient) = &report.patient {
        let mut parts = Vec::new();
        if let Some(name) = &patient.name {
            parts.push(format!("name {name}"));
        }
        if let Some(gender) = &patient.gender {
            parts.push(format!("gender {gender}"));
        }
        if let Some(age) = &patient.age {
            parts.push(format!("age {age}"));
        }
        prompt.push_str(&format!("Patient: {}\n", parts.join(", ")));
    }

    prompt.push_str("Results:\n");
    for item in &report.items {
        let mut line = format!("- {}: {}", item.name, item.result);
        if let Some(unit) = &item.unit {
            line.push_str(&format!(" {unit}"));
        }
        if let Some(ref_range) = &item.ref_range {
            line.push_str(&format!(" (ref: {ref_range})"));
        }
        if let Some(sample_type) = &item.sample_type {
            line.push_str(&format!(" [sample: {sample_type}]"));
        }
        if let Some(method) = &item.method {
            line.push_str(&format!(" [method: {method}]"));
        }
        prompt.push('\n');
        prompt.push_str(&line);
    }
    prompt.push('\n');

    if let Some(context) = &report.context {
        prompt.push_str(&format!("\nAdditional context: {context}\n"));
    }

    prompt.push_str(
        "\nExplain which values are outside their reference ranges, what they may \
         indicate, and what follow-up is sensible. Remind the reader this is not \
         a diagnosis and a physician should interpret the results.",
    );

    prompt
}

const SYSTEM_PROMPT: &str = "You are a clinical laboratory assistant. You explain lab results \
in plain language for patients. You never give a diagnosis and always advise consulting a \
physician for interpretation.";

const DEFAULT_MAX_TOKENS: u32 = 2048;

pub struct MedLabService;

impl MedLabService {
    pub async fn advice(
        chat: &ChatApiClient,
        request: MedLabAdviceRequest,
    ) -> Result<MedLabAdviceResponse, MedLabError> {
        let report = normalize(request)?;
        let prompt = build_prompt(&report);

        info!(item_count = report.items.len(), "requesting medlab advice");

        let completion = chat
            .ask(
                &prompt,
                Some(SYSTEM_PROMPT.to_string()),
                report.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                report.config.temperature,
            )
            .await?;

        Ok(MedLabAdviceResponse {
            advice: completion.content,
            model: completion.model,
            item_count: report.items.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, result: &str) -> LabItem {
        LabItem {
            name: name.to_string(),
            sample_type: None,
            method: None,
            instrument: None,
            result: result.to_string(),
            unit: None,
            ref_range: None,
        }
    }

    fn row(name: &str) -> RawLabRow {
        RawLabRow {
            item_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn items_win_over_data_when_both_present() {
        let mut raw = row("WBC");
        raw.result_value1 = Some("9.1".to_string());

        let report = normalize(MedLabAdviceRequest {
            items: vec![item("HGB", "140")],
            data: vec![raw],
            ..Default::default()
        })
        .unwrap();

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].name, "HGB");
    }

    #[test]
    fn result_prefers_value1_over_origin_value() {
        let mut raw = row("GLU");
        raw.result_value1 = Some("5.2".to_string());
        raw.result_origin_value = Some("5.239".to_string());

        let normalized = normalize_row(raw).unwrap();
        assert_eq!(normalized.result, "5.2");
    }

    #[test]
    fn result_falls_back_to_origin_value() {
        let mut raw = row("GLU");
        raw.result_origin_value = Some("5.239".to_string());

        let normalized = normalize_row(raw).unwrap();
        assert_eq!(normalized.result, "5.239");
    }

    #[test]
    fn blank_value1_counts_as_absent() {
        let mut raw = row("GLU");
        raw.result_value1 = Some("  ".to_string());
        raw.result_origin_value = Some("5.239".to_string());

        let normalized = normalize_row(raw).unwrap();
        assert_eq!(normalized.result, "5.239");
    }

    #[test]
    fn result_prompt_is_appended_as_suffix() {
        let mut raw = row("ALT");
        raw.result_value1 = Some("72".to_string());
        raw.result_prompt = Some("↑".to_string());

        let normalized = normalize_row(raw).unwrap();
        assert_eq!(normalized.result, "72 ↑");
    }

    #[test]
    fn field_mapping_covers_annotations() {
        let raw = RawLabRow {
            item_name: Some("CRP".to_string()),
            sample_type: Some("serum".to_string()),
            method_name: Some("immunoturbidimetry".to_string()),
            instrument_name: Some("AU5800".to_string()),
            result_value1: Some("3.1".to_string()),
            unit: Some("mg/L".to_string()),
            reference_value: Some("0-5".to_string()),
            ..Default::default()
        };

        let normalized = normalize_row(raw).unwrap();
        assert_eq!(normalized.method.as_deref(), Some("immunoturbidimetry"));
        assert_eq!(normalized.instrument.as_deref(), Some("AU5800"));
        assert_eq!(normalized.ref_range.as_deref(), Some("0-5"));
        assert_eq!(normalized.unit.as_deref(), Some("mg/L"));
    }

    #[test]
    fn rows_without_name_or_result_are_dropped() {
        let mut no_result = row("TSH");
        no_result.result_prompt = Some("↑".to_string());

        let mut no_name = RawLabRow::default();
        no_name.result_value1 = Some("1.0".to_string());

        assert!(normalize_row(no_result).is_none());
        assert!(normalize_row(no_name).is_none());
    }

    #[test]
    fn empty_request_is_a_validation_error() {
        let err = normalize(MedLabAdviceRequest::default()).unwrap_err();
        assert!(matches!(err, MedLabError::Validation(_)));
    }

    #[test]
    fn prompt_contains_patient_items_and_context() {
        let report = normalize(MedLabAdviceRequest {
            patient: Some(PatientInfo {
                name: Some("J. Doe".to_string()),
                gender: Some("F".to_string()),
                age: Some("34".to_string()),
                id: None,
            }),
            items: vec![LabItem {
                unit: Some("mmol/L".to_string()),
                ref_range: Some("3.9-6.1".to_string()),
                ..item("GLU", "7.4 ↑")
            }],
            context: Some("fasting sample".to_string()),
            ..Default::default()
        })
        .unwrap();

        let prompt = build_prompt(&report);
        assert!(prompt.contains("Patient: name J. Doe, gender F, age 34"));
        assert!(prompt.contains("- GLU: 7.4 ↑ mmol/L (ref: 3.9-6.1)"));
        assert!(prompt.contains("Additional context: fasting sample"));
    }
}
