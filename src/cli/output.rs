//! Output rendering for CLI commands

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{HybrankError, Result};
use crate::search::{CacheStats, EvalReport, SearchResult};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Tab-separated values (for shell scripting)
    Tsv,
}

impl OutputFormat {
    #[must_use]
    pub const fn is_machine_readable(&self) -> bool {
        matches!(self, Self::Json | Self::Tsv)
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| HybrankError::Json(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

/// Line-oriented text builder with aligned key/value rows.
pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.to_string());
        self.lines.push("=".repeat(text.chars().count().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines
            .push(format!("{key:width$} {value}", width = self.key_width));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}

fn fmt_opt(score: Option<f32>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"))
}

/// Ranked results followed by a short summary and the cache counters.
pub fn render_search_human(result: &SearchResult, stats: &CacheStats) -> String {
    let mut layout = HumanLayout::new();
    layout.title(&format!("Results for \"{}\"", result.query));

    if result.is_empty() {
        layout.push_line("No matching documents.");
    }
    for (rank, c) in result.candidates.iter().enumerate() {
        layout.push_line(format!("{:>2}. [{}] {}", rank + 1, c.document_id, c.title));
        layout.push_line(format!("    {}", c.url));
        layout.push_line(format!(
            "    final {:.4}  fused {:.4}  dense {}  sparse {}  rerank {}",
            c.final_score,
            c.fused_score,
            fmt_opt(c.dense_score),
            fmt_opt(c.sparse_score),
            fmt_opt(c.rerank_score),
        ));
        if !c.snippet.is_empty() {
            layout.push_line(format!("    {}", c.snippet));
        }
        layout.blank();
    }

    layout
        .kv("mode", result.mode.as_str())
        .kv("strategy", result.strategy_used.as_str())
        .kv("rerank applied", &result.rerank_applied.to_string())
        .kv("cache hit", &result.cache_hit.to_string())
        .kv("candidates", &result.total_candidates.to_string())
        .kv(
            "cache",
            &format!(
                "{} hits / {} misses ({:.0}%), {} entries",
                stats.hits,
                stats.misses,
                stats.hit_rate * 100.0,
                stats.entries
            ),
        );
    layout.build()
}

/// `rank, id, final, fused, rerank, title, url` per row, with a header.
pub fn render_search_tsv(result: &SearchResult) -> String {
    let mut out = String::from("rank\tid\tfinal\tfused\trerank\ttitle\turl");
    for (rank, c) in result.candidates.iter().enumerate() {
        out.push('\n');
        out.push_str(&format!(
            "{}\t{}\t{:.6}\t{:.6}\t{}\t{}\t{}",
            rank + 1,
            c.document_id,
            c.final_score,
            c.fused_score,
            fmt_opt(c.rerank_score),
            c.title.replace('\t', " "),
            c.url
        ));
    }
    out
}

/// One summary line per mode, then the per-query breakdown of each.
pub fn render_eval_human(reports: &[EvalReport]) -> String {
    let mut layout = HumanLayout::new();
    layout.title("Retrieval evaluation");
    for report in reports {
        layout.push_line(report.to_string());
    }
    for report in reports {
        layout.blank().push_line(format!("[{}]", report.mode));
        for q in &report.per_query {
            layout.push_line(format!(
                "  rr {:.3}  ndcg {:.3}  {}/{} relevant  {}",
                q.reciprocal_rank, q.ndcg, q.relevant, q.retrieved, q.query
            ));
        }
    }
    layout.build()
}

/// `mode, k, n, recall, mrr, ndcg` per report, with a header.
pub fn render_eval_tsv(reports: &[EvalReport]) -> String {
    let mut out = String::from("mode\tk\tn\trecall\tmrr\tndcg");
    for r in reports {
        out.push_str(&format!(
            "\n{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}",
            r.mode, r.k, r.queries, r.recall, r.mrr, r.ndcg
        ));
    }
    out
}
