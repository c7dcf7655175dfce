use anyhow::Context;
use chrono::{Local, Utc};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zealty_scout::config::{Args, Config, Credentials};
use zealty_scout::orchestrator::{CategoryOrchestrator, CategorySummary};
use zealty_scout::output::RunDirectory;
use zealty_scout::scrapers::{BrowserSessionProvider, FetchExecutor, Md5TokenDeriver, SessionProvider, TokenProbe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_args(Args::parse()).context("Invalid configuration")?;

    // Checked before anything touches the network.
    let credentials = Credentials::from_env()?;

    info!("🏠 Zealty Scout - grid collector");
    info!("==========================================");
    info!(
        "Area lat [{}, {}] lon [{}, {}], {}x{} grid, {} categories",
        config.area.lat_min,
        config.area.lat_max,
        config.area.lon_min,
        config.area.lon_max,
        config.divisions,
        config.divisions,
        config.categories.len()
    );

    let deriver = Md5TokenDeriver;
    if let Some(probe) = TokenProbe::from_env() {
        probe.check(&deriver);
    }

    let run_dir = RunDirectory::create(&config.output_dir, Local::now())?;

    let login = config.login.clone();
    let screenshot = config.screenshot.then(|| run_dir.path().join("map_page.png"));
    let session = tokio::task::spawn_blocking(move || {
        let mut provider = BrowserSessionProvider::launch(login)?;
        if let Some(path) = screenshot {
            provider = provider.with_screenshot(path);
        }
        provider.authenticate(&credentials)
    })
    .await
    .context("Login task panicked")?
    .context("Login failed")?;

    let executor = FetchExecutor::new(session, config.fetch.clone());
    let today = Utc::now().date_naive();
    let orchestrator = CategoryOrchestrator::new(&executor, &deriver, config.area, config.divisions, today)
        .with_concurrency(config.concurrency);

    let mut summaries: Vec<CategorySummary> = Vec::new();
    for &category in &config.categories {
        info!("");
        info!("{}", "=".repeat(60));
        info!("COLLECTING {} [direct API]", category.to_string().to_uppercase());
        info!("{}", "=".repeat(60));

        let run = orchestrator.run(category).await?;
        if let Err(e) = run_dir.write_category(category, &run.results) {
            warn!("Could not write {}: {}", category.file_name(), e);
        }
        summaries.push(run.summary);
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    for summary in &summaries {
        println!("{}", summary);
        if summary.all_cells_empty() {
            println!("   ⚠️  every grid box was empty; verify the token derivation");
        }
    }
    println!("Output: {}", run_dir.path().display());

    Ok(())
}
