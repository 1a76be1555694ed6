use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use climrisk::config::{AnalysisConfig, canonical_portfolio};
use climrisk::engine::{AnalysisReport, RiskEngine};
use climrisk::portfolio::{PortfolioSummary, randomize_impacts};
use climrisk::records::{LocationRecord, PortfolioInput};
use climrisk::types::{LocationRole, RiskCategory};

#[derive(Parser)]
#[command(name = "climrisk", version, about = "Climate risk scoring and Monte Carlo yield-loss simulation")]
struct Cli {
    /// Portfolio JSON (`{"locations": [...]}`). Defaults to the built-in demo portfolio.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Analysis config JSON; unspecified fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Monte Carlo draws per location.
    #[arg(long)]
    simulations: Option<usize>,

    /// Yield-loss standard deviation (percentage points).
    #[arg(long)]
    std_dev: Option<f64>,

    /// Uniform cross-location correlation; enables the joint-draw portfolio.
    #[arg(long, allow_negative_numbers = true)]
    correlation: Option<f64>,

    /// Impact multiplier for the sensitivity analysis.
    #[arg(long)]
    stress_factor: Option<f64>,

    /// Re-draw client impact shares (Dirichlet), keeping their total.
    #[arg(long)]
    random_impacts: bool,

    /// NDJSON output: one location report per line, then the portfolio summary.
    #[arg(long, default_value = "locations.ndjson")]
    output: PathBuf,

    /// Disable rayon.
    #[arg(long)]
    sequential: bool,

    /// Skip the summary tables.
    #[arg(short, long)]
    quiet: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config: AnalysisConfig = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(n) = cli.simulations {
        config.monte_carlo.n_simulations = n;
    }
    if let Some(sd) = cli.std_dev {
        config.monte_carlo.std_dev_pct = sd;
    }
    if cli.correlation.is_some() {
        config.correlation = cli.correlation;
    }
    if cli.stress_factor.is_some() {
        config.stress_factor = cli.stress_factor;
    }
    if cli.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn load_records(path: Option<&Path>) -> Result<Vec<LocationRecord>> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading portfolio {}", path.display()))?;
            let input: PortfolioInput =
                serde_json::from_str(&text).with_context(|| format!("parsing portfolio {}", path.display()))?;
            Ok(input.locations)
        }
        None => Ok(canonical_portfolio()),
    }
}

/// Spread the clients' combined impact over a fresh Dirichlet draw.
fn randomize_client_impacts(records: &mut [LocationRecord], seed: u64) -> Result<()> {
    let clients: Vec<usize> = (0..records.len()).filter(|&i| records[i].role == LocationRole::Client).collect();
    let total: f64 = clients.iter().map(|&i| records[i].impact_percent).sum();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let shares = randomize_impacts(clients.len(), &mut rng)?;
    for (&i, share) in clients.iter().zip(shares) {
        records[i].impact_percent = share / 100.0 * total;
    }
    info!(clients = clients.len(), total_impact = total, "randomized client impacts");
    Ok(())
}

fn write_ndjson(report: &AnalysisReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for location in &report.locations {
        serde_json::to_writer(&mut writer, location)?;
        writeln!(writer)?;
    }
    serde_json::to_writer(&mut writer, &report.portfolio)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let mut records = load_records(cli.input.as_deref())?;
    if cli.random_impacts {
        randomize_client_impacts(&mut records, config.seed)?;
    }

    let engine = RiskEngine::new(config)?;
    let report = engine.run(&records)?;

    write_ndjson(&report, &cli.output)?;
    info!(path = %cli.output.display(), locations = report.locations.len(), "wrote report");

    if !cli.quiet {
        print_locations(&report);
        print_portfolio(&report.portfolio, report.correlated.as_ref());
        print_sensitivity(&report);
    }
    Ok(())
}

fn category(c: RiskCategory) -> &'static str {
    match c {
        RiskCategory::VeryLow => "VeryLow",
        RiskCategory::Low => "Low",
        RiskCategory::Medium => "Medium",
        RiskCategory::High => "High",
    }
}

fn role(r: LocationRole) -> &'static str {
    match r {
        LocationRole::Client => "client",
        LocationRole::Supplier => "supplier",
    }
}

fn print_locations(report: &AnalysisReport) {
    println!("\n=== Location risk ({} scored, {} excluded) ===", report.locations.len(), report.excluded.len());
    println!(
        "{:<20} | {:>8} | {:>7} | {:>7} | {:>6} | {:>5} | {:>7} | {:>5} | {:>6} | {:>6} | {:>6} | {:>6}",
        "Location", "Role", "Impact%", "Climate", "Hazard", "Agg", "Cat", "Conf%", "Mean%", "VaR95", "VaR99", "ES95"
    );
    println!("{}", "-".repeat(20 + 3 + 8 + 3 + 7 + 3 + 7 + 3 + 6 + 3 + 5 + 3 + 7 + 3 + 5 + 3 + 6 + 3 + 6 + 3 + 6 + 3 + 6));
    for l in &report.locations {
        let s = &l.simulation;
        println!(
            "{:<20} | {:>8} | {:>7.2} | {:>7.2} | {:>6.2} | {:>5.2} | {:>7} | {:>5.0} | {:>6.1} | {:>6.1} | {:>6.1} | {:>6.1}",
            l.location_id.as_str(),
            role(l.role),
            l.impact_percent,
            l.climate_likelihood,
            l.hazard_severity,
            l.aggregate_risk,
            category(l.risk_category),
            l.confidence_percent,
            s.mean_loss,
            s.var_95,
            s.var_99,
            s.expected_shortfall_95,
        );
    }
    for ex in &report.excluded {
        println!("  excluded {}: {}", ex.location_id, ex.reason);
    }
}

fn print_portfolio(independent: &PortfolioSummary, correlated: Option<&PortfolioSummary>) {
    println!("\n=== Portfolio (% of total business value) ===");
    println!("{:<24} | {:>12} | {:>12}", "", "Independent", "Correlated");
    let row = |label: &str, f: fn(&PortfolioSummary) -> f64| {
        let joint = correlated.map_or_else(|| "-".to_string(), |c| format!("{:.3}", f(c)));
        println!("{label:<24} | {:>12.3} | {joint:>12}", f(independent));
    };
    row("Expected loss", |p| p.expected_loss);
    row("VaR 90", |p| p.var_90);
    row("VaR 95", |p| p.var_95);
    row("VaR 99", |p| p.var_99);
    row("ES 95", |p| p.expected_shortfall_95);

    let p = independent;
    println!("\n  Locations: {} ({} clients, {} suppliers), total impact {:.2}%", p.n_locations, p.clients, p.suppliers, p.total_impact_percent);
    println!("  Herfindahl: {:.4}  diversification: {:.4}", p.herfindahl, p.diversification_score);
    println!("  High-risk (aggregate >= 4): {}", p.high_risk_count);
    for c in RiskCategory::ALL.iter().rev() {
        println!("  {:<8} {:>3}", category(*c), p.category_counts.get(*c));
    }
    println!("  Location VaR95: max {:.1}%  mean {:.1}%", p.max_location_var_95, p.mean_location_var_95);

    println!("\n--- Top risks (weighted VaR95) ---");
    for (rank, c) in p.top_risks.iter().enumerate() {
        println!(
            "  {}. {:<20} {:>7.3}%  (impact {:.2}%, {:.0}% of expected loss)",
            rank + 1,
            c.location_id.as_str(),
            c.weighted_var_95,
            c.impact_percent,
            c.share_of_expected_loss * 100.0
        );
    }
}

fn print_sensitivity(report: &AnalysisReport) {
    let Some(s) = &report.sensitivity else {
        return;
    };
    println!("\n=== Sensitivity: {} impact x{:.2} ===", s.location_id, s.factor);
    println!("  Impact:        {:.2}% -> {:.2}%", s.baseline_impact_percent, s.stressed_impact_percent);
    println!("  Weighted risk: {:.2} -> {:.2}", s.baseline_weighted_risk, s.stressed_weighted_risk);
    println!("  Rank:          {} -> {}  (top: {})", s.baseline_rank, s.stressed_rank, s.stressed_top);
    if let Some(loss) = &s.loss {
        println!(
            "  Weighted VaR95: {:.3}% -> {:.3}%",
            loss.baseline.var_95, loss.stressed.var_95
        );
    }
    println!("  Ranking changed: {}", if s.ranking_changed { "yes" } else { "no" });
}
