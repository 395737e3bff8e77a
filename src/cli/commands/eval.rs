//! hybrank eval - Score retrieval quality against a labelled query set

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cli::output::{emit_json, render_eval_human, render_eval_tsv};
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::corpus;
use crate::error::{HybrankError, Result};
use crate::search::{
    EvalOptions, EvalReport, EvalSet, HybridSearchEngine, ScoringStrategy, SearchMode,
    TermOverlapScorer, evaluate,
};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Corpus snapshot (JSON)
    #[arg(long, env = "HYBRANK_CORPUS")]
    pub corpus: PathBuf,

    /// Eval set: JSON Lines of {"q", "gold_urls"}, or a JSON array
    #[arg(long = "set", value_name = "PATH")]
    pub eval_set: PathBuf,

    /// Cutoff for recall@k and nDCG@k
    #[arg(long, short = 'k', default_value_t = 5)]
    pub topk: usize,

    /// Retrieval mode to score; repeat the flag or pass "all"
    #[arg(long, short, default_value = "hybrid")]
    pub mode: Vec<String>,

    /// Rerank the fused pool with the term-overlap scorer
    #[arg(long)]
    pub rerank: bool,

    /// Scoring strategy: balanced, rerank_heavy, fused_only
    #[arg(long, default_value = "balanced")]
    pub strategy: String,

    /// Enable MMR diversification with this lambda (1.0 = relevance only)
    #[arg(long, value_name = "LAMBDA")]
    pub mmr: Option<f32>,
}

/// Expand `all` and parse the rest, keeping first-seen order.
fn parse_modes(names: &[String]) -> Result<Vec<SearchMode>> {
    let mut modes = Vec::new();
    for name in names {
        let expanded = if name.trim().eq_ignore_ascii_case("all") {
            SearchMode::ALL.to_vec()
        } else {
            vec![name.parse()?]
        };
        for mode in expanded {
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }
    }
    Ok(modes)
}

pub fn run(cli: &Cli, mut config: Config, args: &EvalArgs) -> Result<()> {
    let modes = parse_modes(&args.mode)?;
    let strategy: ScoringStrategy = args.strategy.parse()?;
    if let Some(lambda) = args.mmr {
        config.diversity.enabled = true;
        config.diversity.mmr_lambda = lambda;
    }

    let set = EvalSet::from_path(&args.eval_set)?;
    let engine = HybridSearchEngine::builder(config)
        .corpus(corpus::load(&args.corpus)?)
        .scorer(Arc::new(TermOverlapScorer))
        .build()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| HybrankError::Internal(format!("start runtime: {err}")))?;

    let reports = runtime.block_on(async {
        let mut reports: Vec<EvalReport> = Vec::with_capacity(modes.len());
        for mode in &modes {
            let options = EvalOptions {
                k: args.topk,
                mode: *mode,
                rerank: args.rerank,
                strategy,
            };
            reports.push(evaluate(&engine, &set, options).await?);
        }
        Ok::<_, HybrankError>(reports)
    })?;

    match cli.output_format {
        OutputFormat::Json => emit_json(&reports),
        OutputFormat::Tsv => {
            println!("{}", render_eval_tsv(&reports));
            Ok(())
        }
        OutputFormat::Human => {
            println!("{}", render_eval_human(&reports));
            Ok(())
        }
    }
}
