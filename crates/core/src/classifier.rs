use crate::rules::{Rule, RuleTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// One point per keyword occurrence.
    #[default]
    Count,
    /// Each occurrence weighs the keyword's character count.
    LengthWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOptions {
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default = "default_min_score")]
    pub min_score: u64,
    #[serde(default = "default_include_filename")]
    pub include_filename: bool,
}

fn default_min_score() -> u64 {
    1
}

fn default_include_filename() -> bool {
    true
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            scoring: Scoring::default(),
            min_score: default_min_score(),
            include_filename: default_include_filename(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassificationResult {
    pub matched_rule: Option<Rule>,
    pub score: u64,
    /// Set when two or more rules tie on both score and priority.
    pub ambiguous: bool,
    pub matched_keywords: Vec<String>,
    /// Codes of the tied rules when `ambiguous`.
    pub candidates: Vec<String>,
}

impl ClassificationResult {
    pub fn is_unclassified(&self) -> bool {
        self.matched_rule.is_none() && !self.ambiguous
    }
}

struct Scored<'a> {
    rule: &'a Rule,
    score: u64,
    hits: Vec<String>,
}

/// Lowercases and collapses every whitespace run into a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn classify(text: &str, table: &RuleTable, opts: &ScoringOptions) -> ClassificationResult {
    let content = normalize(text);
    if content.is_empty() {
        return ClassificationResult::default();
    }

    let scored: Vec<Scored<'_>> = table
        .rules()
        .iter()
        .filter_map(|rule| score_rule(&content, rule, opts.scoring))
        .filter(|s| s.score >= opts.min_score.max(1))
        .collect();

    let Some(top_score) = scored.iter().map(|s| s.score).max() else {
        debug!("no rule matched");
        return ClassificationResult::default();
    };
    let top_priority = scored
        .iter()
        .filter(|s| s.score == top_score)
        .map(|s| s.rule.priority)
        .max()
        .unwrap_or_default();
    let mut winners: Vec<Scored<'_>> = scored
        .into_iter()
        .filter(|s| s.score == top_score && s.rule.priority == top_priority)
        .collect();

    if winners.len() > 1 {
        let candidates: Vec<String> = winners.iter().map(|s| s.rule.code.clone()).collect();
        debug!(score = top_score, ?candidates, "ambiguous classification");
        return ClassificationResult {
            matched_rule: None,
            score: top_score,
            ambiguous: true,
            matched_keywords: Vec::new(),
            candidates,
        };
    }

    let winner = winners.remove(0);
    debug!(code = %winner.rule.code, score = winner.score, "classified");
    ClassificationResult {
        matched_rule: Some(winner.rule.clone()),
        score: winner.score,
        ambiguous: false,
        matched_keywords: winner.hits,
        candidates: Vec::new(),
    }
}

/// Scores the file stem alongside the text, separators read as spaces.
pub fn classify_with_filename(
    text: &str,
    filename: &str,
    table: &RuleTable,
    opts: &ScoringOptions,
) -> ClassificationResult {
    if !opts.include_filename {
        return classify(text, table, opts);
    }
    let stem = std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .replace(['_', '-'], " ");
    classify(&format!("{stem}\n{text}"), table, opts)
}

fn score_rule<'a>(content: &str, rule: &'a Rule, scoring: Scoring) -> Option<Scored<'a>> {
    let mut score = 0u64;
    let mut hits = Vec::new();
    for keyword in &rule.keywords {
        let needle = normalize(keyword);
        if needle.is_empty() {
            continue;
        }
        let count = content.matches(needle.as_str()).count() as u64;
        if count == 0 {
            continue;
        }
        let weight = match scoring {
            Scoring::Count => 1,
            Scoring::LengthWeighted => needle.chars().count() as u64,
        };
        score += count * weight;
        hits.push(keyword.clone());
    }
    (score > 0).then_some(Scored { rule, score, hits })
}
