//! Checks candidate entries against an existing corpus and admits the plausible ones.
//!
//! Both inputs use the corpus text form (`product_name amount price` per line). Accepted
//! candidates can be written back out together with the original history.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use chebyshev_ledger::corpus_text;
use chebyshev_ledger::observation::Observation;
use chebyshev_ledger::shared_validator::SharedValidator;
use chebyshev_ledger::validator::{Decision, Sensitivity};

#[derive(Parser, Debug)]
#[clap(name = "validate_entries")]
struct Opts {
    #[clap(long)]
    corpus: PathBuf,

    #[clap(long)]
    candidates: PathBuf,

    #[clap(short, long, default_value = "0.99")]
    sensitivity: f64,

    /// Emit a JSON report instead of one line per candidate.
    #[clap(long)]
    json: bool,

    /// Where to save the corpus including every accepted candidate.
    #[clap(long)]
    corpus_out: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    candidate: &'a Observation,
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let sensitivity = Sensitivity::new(opts.sensitivity)?;
    let corpus = corpus_text::load_from_file(&opts.corpus)?;
    info!("Loaded {} observations for {} products", corpus.len(), corpus.products().count());
    let validator = SharedValidator::new(corpus, sensitivity)?;

    let candidates = corpus_text::read_observations(std::fs::File::open(&opts.candidates)?)?;
    let results = validator.try_insert_all(candidates.clone()).await;

    let mut reports = Vec::with_capacity(results.len());
    for (candidate, result) in candidates.iter().zip(results) {
        let report = match result {
            Ok(Decision::Accepted) => {
                Report { candidate, accepted: true, reason: None, error: None }
            }
            Ok(Decision::Rejected(reason)) => {
                Report { candidate, accepted: false, reason: Some(reason.message()), error: None }
            }
            Err(e) => {
                warn!("Skipping candidate: {e}");
                Report { candidate, accepted: false, reason: None, error: Some(e.to_string()) }
            }
        };
        reports.push(report);
    }

    let accepted = reports.iter().filter(|r| r.accepted).count();
    info!("Accepted {accepted} of {} candidates", reports.len());

    if opts.json {
        serde_json::to_writer_pretty(io::stdout().lock(), &reports)?;
        println!();
    } else {
        for report in &reports {
            let c = report.candidate;
            let verdict = match (&report.reason, &report.error) {
                (_, Some(error)) => error.as_str(),
                (Some(reason), None) => *reason,
                (None, None) => "accepted",
            };
            println!("{} {} {}: {}", c.product_name, c.amount, c.price, verdict);
        }
    }

    if let Some(path) = &opts.corpus_out {
        corpus_text::save_to_file(&validator.corpus().await, path)?;
    }
    Ok(())
}
