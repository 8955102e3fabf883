use std::io;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::info;

use chebyshev_ledger::config::LedgerConfig;
use chebyshev_ledger::corpus_text;
use chebyshev_ledger::sample_generator::generate_corpus;

#[derive(Parser, Debug)]
#[clap(name = "generate_corpus")]
struct Opts {
  /// JSON config; the built-in Parasol/Lornetka setup is used when omitted.
  #[clap(short, long)]
  config: Option<PathBuf>,

  /// Overrides the config seed. Without either, the current time is used.
  #[clap(short, long)]
  seed: Option<u64>,

  /// Overrides the configured anomaly probability for every product.
  #[clap(short, long)]
  anomaly_probability: Option<f64>,

  /// Corpus text destination; stdout when omitted.
  #[clap(short, long)]
  out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
  env_logger::init();
  let opts: Opts = Opts::parse();

  let mut config = match &opts.config {
    Some(path) => LedgerConfig::load(path)?,
    None => LedgerConfig::default(),
  };
  if let Some(probability) = opts.anomaly_probability {
    config.anomaly_probability = probability;
    for product in &mut config.products {
      product.anomaly_probability = None;
    }
    config.validate()?;
  }

  let seed = match opts.seed.or(config.seed) {
    Some(seed) => seed,
    None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos() as u64,
  };
  info!("Generating {} products with seed {seed}", config.products.len());

  let corpus = generate_corpus(&config.product_specs(), seed)?;
  match &opts.out {
    Some(path) => corpus_text::save_to_file(&corpus, path)?,
    None => corpus_text::write_corpus(&corpus, io::stdout().lock())?,
  }
  Ok(())
}
