//! hybrank search - Run a query against a corpus snapshot

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use crate::cli::output::{emit_json, render_search_human, render_search_tsv};
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::corpus;
use crate::error::{HybrankError, Result};
use crate::search::{
    CacheStats, HybridSearchEngine, PercentageGate, SearchRequest, SearchResult,
    TermOverlapScorer,
};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Corpus snapshot (JSON)
    #[arg(long, env = "HYBRANK_CORPUS")]
    pub corpus: PathBuf,

    /// Number of results (default: search.topk_default)
    #[arg(long, short = 'k')]
    pub topk: Option<i64>,

    /// Retrieval mode: dense, lexical, hybrid
    #[arg(long, short, default_value = "hybrid")]
    pub mode: String,

    /// Rerank the fused pool with the term-overlap scorer
    #[arg(long)]
    pub rerank: bool,

    /// Scoring strategy: balanced, rerank_heavy, fused_only
    #[arg(long, default_value = "balanced")]
    pub strategy: String,

    /// Override search.alpha for this invocation
    #[arg(long)]
    pub alpha: Option<f32>,

    /// Only rerank this percentage of queries (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub rerank_percent: Option<u8>,

    /// Run the query this many times (repeat runs are served from the cache)
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,
}

#[derive(Serialize)]
struct SearchReport<'a> {
    result: &'a SearchResult,
    cache: CacheStats,
}

pub fn run(cli: &Cli, mut config: Config, args: &SearchArgs) -> Result<()> {
    if let Some(alpha) = args.alpha {
        config.search.alpha = alpha;
    }
    let topk = args
        .topk
        .unwrap_or_else(|| i64::try_from(config.search.topk_default).unwrap_or(i64::MAX));
    let request = SearchRequest::parse(
        args.query.clone(),
        topk,
        &args.mode,
        args.rerank,
        &args.strategy,
    )?;

    let loaded = corpus::load(&args.corpus)?;
    let mut builder = HybridSearchEngine::builder(config)
        .corpus(loaded)
        .scorer(Arc::new(TermOverlapScorer));
    if let Some(percent) = args.rerank_percent {
        builder = builder.gate(Arc::new(PercentageGate::new(percent)));
    }
    let engine = builder.build()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| HybrankError::Internal(format!("start runtime: {err}")))?;

    let result = runtime.block_on(async {
        let mut last = engine.search(request.clone()).await?;
        for _ in 1..args.repeat {
            last = engine.search(request.clone()).await?;
        }
        Ok::<_, HybrankError>(last)
    })?;
    let stats = engine.cache_stats();

    match cli.output_format {
        OutputFormat::Json => emit_json(&SearchReport {
            result: &result,
            cache: stats,
        }),
        OutputFormat::Tsv => {
            println!("{}", render_search_tsv(&result));
            Ok(())
        }
        OutputFormat::Human => {
            println!("{}", render_search_human(&result, &stats));
            Ok(())
        }
    }
}
