use anyhow::Result;
use std::env;
use std::path::Path;

use fb2wp::pipeline::{run, PipelineConfig};

fn help() {
    println!("fb2wp <fb export directory> <wp output path>");
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    // wrong arity or missing source directory: print usage and exit
    // cleanly, without touching the filesystem
    if args.len() != 3 || !Path::new(&args[1]).is_dir() {
        help();
        return Ok(());
    }

    let source = Path::new(&args[1]);
    let target = Path::new(&args[2]);

    println!("📦 fb2wp: Freeblog export → WordPress WXR");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = PipelineConfig::default();
    let summary = run(source, target, &config).await?;

    println!(
        "✓ Converted {} entries, {} comments ({} categories)",
        summary.entries, summary.comments, summary.categories
    );
    if summary.lookups > 0 {
        println!("✓ Resolved {} author names", summary.lookups);
    }
    println!("✓ Wrote {}", target.display());

    Ok(())
}
