use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use varia_core::{Artifact, VariaConfig};
use varia_storage::create_storage;
use varia_versions::Uploader;

use varia_cli::{
    collect_report, content_type_for, init_tracing, truncate_string, CliHost, Manifest,
    VersionReport,
};

#[derive(Parser, Debug)]
#[command(name = "derive_versions")]
#[command(about = "Cache and store every version of a file described by a manifest")]
struct Args {
    /// JSON manifest declaring the uploader type and its versions
    #[arg(long, value_name = "FILE")]
    manifest: PathBuf,

    /// File to derive versions from
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Attribute the file is mounted on (e.g. avatar)
    #[arg(long)]
    mounted_as: Option<String>,

    /// Owning model name (e.g. user)
    #[arg(long)]
    model_name: Option<String>,

    /// Owning record identifier
    #[arg(long)]
    model_id: Option<String>,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = VariaConfig::from_env()?;

    let manifest = Manifest::load(&args.manifest)?;
    let registry = manifest.build_registry()?.freeze();
    let storage = create_storage(&config).await?;

    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let filename = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no file name")?;
    let artifact = Artifact::new(data, filename).with_content_type(content_type_for(filename));

    let host = CliHost {
        model_name: args.model_name,
        model_id: args.model_id,
        mounted_as: args.mounted_as,
    };
    let mut uploader = Uploader::new(registry, storage, Arc::new(host), Arc::new(config));
    uploader.cache(artifact).await?;
    uploader.store(None).await?;

    let rows = collect_report(&mut uploader)?;
    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            print_table(&rows);
        }
    }

    Ok(())
}

fn print_table(rows: &[VersionReport]) {
    println!("\n=== Versions ===\n");
    println!("{:<24} {:<10} {:>10}  Location", "Version", "State", "Size");
    println!("{}", "-".repeat(80));
    for row in rows {
        let size = row
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<10} {:>10}  {}",
            truncate_string(&row.version, 24),
            row.state,
            size,
            row.location.as_deref().unwrap_or("-")
        );
    }
    println!();
}
