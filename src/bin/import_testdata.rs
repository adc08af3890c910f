use anyhow::{Context, Result};
use clap::Parser;
use spectral_fingerprint::store::{import_reference_set, FingerprintStore};

/// Seed the fingerprint library from a reference measurement set.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ImportArgs {
    /// Reference set: [{"type": <label>, "spectral_values": {"410nm": .., ...}}, ...]
    #[arg(default_value = "testdata.json")]
    input: String,

    /// Fingerprint library to update
    #[arg(short, long, default_value = "spectral_fingerprints.json")]
    store: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args = ImportArgs::parse();
    let mut store = FingerprintStore::load(&args.store);
    let before = store.len();

    let imported = import_reference_set(&args.input, &mut store)
        .with_context(|| format!("Failed to import {}", args.input))?;

    println!(
        "Imported {} reference fingerprints into {} ({} -> {} labels)",
        imported,
        args.store,
        before,
        store.len()
    );
    Ok(())
}
