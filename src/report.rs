use std::cmp::Ordering;

use crate::{
    catalog::{self, CRITERIA},
    error::BakeoffError,
    persistence::ResultRecord,
    scoring::CriterionScores,
};

const STRENGTH_THRESHOLD: u32 = 85;
const WEAKNESS_THRESHOLD: u32 = 75;
const HIGHLIGHT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

/// Above 80 is high, 50 and up is medium.
pub fn score_band(score: f64) -> ScoreBand {
    if score > 80.0 {
        ScoreBand::High
    } else if score >= 50.0 {
        ScoreBand::Medium
    } else {
        ScoreBand::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedResult<'a> {
    /// 1-based.
    pub rank: usize,
    pub record: &'a ResultRecord,
}

fn by_score_desc(a: &ResultRecord, b: &ResultRecord) -> Ordering {
    b.overall_score.total_cmp(&a.overall_score)
}

/// Best overall score first; ties keep their input order.
pub fn rank_results(results: &[ResultRecord]) -> Vec<RankedResult<'_>> {
    let mut sorted: Vec<&ResultRecord> = results.iter().collect();
    sorted.sort_by(|a, b| by_score_desc(a, b));
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, record)| RankedResult {
            rank: index + 1,
            record,
        })
        .collect()
}

pub fn winner(results: &[ResultRecord]) -> Option<&ResultRecord> {
    results.iter().reduce(|best, candidate| {
        if by_score_desc(best, candidate) == Ordering::Greater {
            candidate
        } else {
            best
        }
    })
}

pub fn rank_badge(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        _ => format!("#{rank}"),
    }
}

/// Labels of up to three criteria scoring 85 or more, highest first.
pub fn strengths(scores: &CriterionScores) -> Vec<String> {
    let mut picked: Vec<(&String, u32)> = scores
        .iter()
        .filter(|(_, score)| **score >= STRENGTH_THRESHOLD)
        .map(|(id, score)| (id, *score))
        .collect();
    picked.sort_by(|a, b| b.1.cmp(&a.1));
    labels(picked)
}

/// Labels of up to three criteria scoring below 75, lowest first.
pub fn weaknesses(scores: &CriterionScores) -> Vec<String> {
    let mut picked: Vec<(&String, u32)> = scores
        .iter()
        .filter(|(_, score)| **score < WEAKNESS_THRESHOLD)
        .map(|(id, score)| (id, *score))
        .collect();
    picked.sort_by(|a, b| a.1.cmp(&b.1));
    labels(picked)
}

fn labels(picked: Vec<(&String, u32)>) -> Vec<String> {
    picked
        .into_iter()
        .take(HIGHLIGHT_LIMIT)
        .map(|(id, _)| catalog::criterion_label(id).to_string())
        .collect()
}

/// One row per result, criterion columns in catalog order. Missing scores are empty cells.
pub fn to_csv(results: &[ResultRecord]) -> String {
    let mut header: Vec<String> = ["Agent", "Provider", "Overall Score", "Execution Time (ms)"]
        .iter()
        .map(|column| column.to_string())
        .collect();
    header.extend(CRITERIA.iter().map(|criterion| criterion.label.to_string()));

    let mut lines = vec![header.join(",")];
    for record in results {
        let mut row = vec![
            csv_field(&record.agent_name),
            csv_field(&record.provider),
            record.overall_score.to_string(),
            record.execution_time_ms.to_string(),
        ];
        row.extend(CRITERIA.iter().map(|criterion| {
            record
                .criteria_scores
                .get(criterion.id)
                .map(u32::to_string)
                .unwrap_or_default()
        }));
        lines.push(row.join(","));
    }
    lines.join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_json(results: &[ResultRecord]) -> Result<String, BakeoffError> {
    Ok(serde_json::to_string_pretty(results)?)
}
