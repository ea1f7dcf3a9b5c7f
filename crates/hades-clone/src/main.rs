//! Copy every registered Hades table from a source database into a
//! destination database, creating the destination schema first.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hades::db::create_pool_from_url;
use hades::migrate;

#[derive(Parser)]
#[command(name = "hades-clone")]
#[command(version, about = "Clone the Hades tables into another database", long_about = None)]
struct Cli {
    /// Source database URI (prompted for when absent)
    #[arg(long)]
    source: Option<String>,

    /// Destination database URI (prompted for when absent)
    #[arg(long)]
    destination: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,hades=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();
    if input.is_empty() {
        anyhow::bail!("no database URI given");
    }
    Ok(input)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let source_url = match cli.source {
        Some(url) => url,
        None => prompt("Enter source DB URI: ")?,
    };
    let destination_url = match cli.destination {
        Some(url) => url,
        None => prompt("Enter destination DB URI: ")?,
    };

    let source = create_pool_from_url(&source_url)
        .await
        .context("connecting to the source database")?;
    let destination = create_pool_from_url(&destination_url)
        .await
        .context("connecting to the destination database")?;

    let source_tables = migrate::list_tables(&source).await?;
    println!("Source tables: ");
    println!("{:?}", source_tables);

    println!("Creating registered tables on the destination");
    migrate::create_schema(&destination).await?;
    println!("{:?}", migrate::list_tables(&destination).await?);

    let plan = migrate::plan(&source_tables);
    for message in plan.skip_messages() {
        println!("{}", message);
    }
    tracing::info!(
        tables = plan.tables.len(),
        skipped = plan.skipped.len(),
        "Clone plan ready"
    );

    let mut total = 0;
    for kind in &plan.tables {
        println!("Checking entries in {}", kind);
        let copied = migrate::copy_table(*kind, &source, &destination).await?;
        println!("Copied {} rows into {}", copied, kind);
        tracing::info!(table = %kind, rows = copied, "Clone progress");
        total += copied;
    }

    println!(
        "Done: {} rows across {} tables, {} skipped",
        total,
        plan.tables.len(),
        plan.skipped.len()
    );

    Ok(())
}
