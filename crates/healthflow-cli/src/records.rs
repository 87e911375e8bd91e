//! Health records and the context text built from them.
//!
//! Records come from a `{ "records": [...] }` JSON file. Measurement fields
//! are loosely typed in the wild (numbers or strings), so they are kept as
//! JSON values and rendered only when they carry something.

use std::path::Path;

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Records used for the chat context.
pub const CHAT_CONTEXT_RECORDS: usize = 3;
/// Records used for indicator trend analysis.
pub const ANALYSIS_RECORDS: usize = 10;
pub const MIN_ANALYSIS_RECORDS: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub blood_pressure_high: Option<Value>,
    #[serde(default)]
    pub blood_pressure_low: Option<Value>,
    #[serde(default)]
    pub blood_sugar: Option<Value>,
    #[serde(default)]
    pub heart_rate: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub note: Option<String>,
}

impl HealthRecord {
    fn created(&self) -> Option<DateTime<Local>> {
        self.created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Local))
    }

    fn belongs_to(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<HealthRecord>,
}

/// Load records; a missing or unreadable file yields no records.
pub fn load_records(path: &Path) -> Vec<HealthRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read records {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<RecordsFile>(&content) {
        Ok(file) => file.records,
        Err(e) => {
            warn!("Cannot parse records {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Render a measurement the way a form would show it; empty, zero and null
/// values are skipped.
fn measurement(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Context from the user's most recent records, or empty when there are none.
pub fn build_health_context(records: &[HealthRecord], username: Option<&str>) -> String {
    let Some(username) = username else {
        return String::new();
    };
    let mine: Vec<&HealthRecord> = records.iter().filter(|r| r.belongs_to(username)).collect();
    if mine.is_empty() {
        return String::new();
    }

    let recent = &mine[mine.len().saturating_sub(CHAT_CONTEXT_RECORDS)..];
    let blocks: Vec<String> = recent.iter().map(|record| describe(record)).collect();
    format!("用户最近的健康数据：\n{}", blocks.join("\n"))
}

fn describe(record: &HealthRecord) -> String {
    let time = record
        .created()
        .map(|dt| dt.format("%Y/%m/%d %H:%M:%S").to_string())
        .or_else(|| record.created_at.clone())
        .unwrap_or_else(|| "未知".to_string());
    let mut text = format!("记录时间: {time}\n");

    let fields = [
        ("血压(高)", record.blood_pressure_high.as_ref(), ""),
        ("血压(低)", record.blood_pressure_low.as_ref(), ""),
        ("血糖", record.blood_sugar.as_ref(), ""),
        ("心率", record.heart_rate.as_ref(), ""),
        ("体重", record.weight.as_ref(), "kg"),
    ];
    for (label, value, unit) in fields {
        if let Some(value) = measurement(value) {
            text.push_str(&format!("{label}: {value}{unit}\n"));
        }
    }
    if let Some(note) = record.note.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(&format!("备注: {note}\n"));
    }
    text
}

/// Display metadata for a tracked indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub id: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
}

pub const INDICATORS: &[Indicator] = &[
    Indicator { id: "heart-rate", name: "心率", unit: "BPM" },
    Indicator { id: "weight", name: "体重", unit: "kg" },
    Indicator { id: "bmi", name: "BMI", unit: "" },
    Indicator { id: "body-fat", name: "体脂率", unit: "%" },
    Indicator { id: "calorie", name: "卡路里", unit: "kcal" },
    Indicator { id: "sleep", name: "睡眠", unit: "h" },
    Indicator { id: "running", name: "跑步", unit: "km" },
    Indicator { id: "exercise-heart-rate", name: "运动心率", unit: "BPM" },
];

pub fn indicator(id: &str) -> Option<&'static Indicator> {
    INDICATORS.iter().find(|i| i.id == id)
}

/// Result of preparing an indicator analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisPlan {
    /// Too few records; the notice is the whole answer.
    Insufficient(String),
    /// Prompt to send to the model.
    Prompt(String),
}

/// Select the records of `indicator_id` and build the analysis prompt.
///
/// Falls back to everyone's records when the user has none at all.
pub fn plan_indicator_analysis(
    records: &[HealthRecord],
    indicator_id: &str,
    username: Option<&str>,
) -> AnalysisPlan {
    let meta = indicator(indicator_id);
    let name = meta.map_or(indicator_id, |m| m.name);

    let owned: Vec<&HealthRecord> = match username {
        Some(user) => records.iter().filter(|r| r.belongs_to(user)).collect(),
        None => Vec::new(),
    };
    let pool: Vec<&HealthRecord> = if owned.is_empty() {
        records.iter().collect()
    } else {
        owned
    };

    let mut selected: Vec<&HealthRecord> = pool
        .into_iter()
        .filter(|r| r.kind.as_deref() == Some(indicator_id))
        .collect();
    selected.sort_by_key(|r| r.created());
    let selected = &selected[selected.len().saturating_sub(ANALYSIS_RECORDS)..];

    if selected.len() < MIN_ANALYSIS_RECORDS {
        return AnalysisPlan::Insufficient(format!(
            "需要至少{MIN_ANALYSIS_RECORDS}条{name}记录才能进行AI分析。当前仅有{}条记录，请继续记录更多数据。",
            selected.len()
        ));
    }

    let mut context = format!("用户{name}指标的最近{}条记录:\n", selected.len());
    for (index, record) in selected.iter().enumerate() {
        let date = record
            .created()
            .map(|dt| dt.format("%Y/%m/%d").to_string())
            .unwrap_or_else(|| "未知日期".to_string());
        let value = measurement(record.value.as_ref()).unwrap_or_else(|| "0".to_string());
        let unit = record
            .unit
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(meta.map(|m| m.unit))
            .unwrap_or_default();
        context.push_str(&format!("{}. {date}: {value}{unit}\n", index + 1));
    }

    AnalysisPlan::Prompt(format!(
        "作为健康专家，请根据以下{name}指标数据进行分析:\n{context}\n请提供:\n1. 这些数据的整体趋势分析\n2. 目前状况评估(是否在健康范围内)\n3. 个性化的改善建议\n\n回答要简洁专业，不超过200字。"
    ))
}
