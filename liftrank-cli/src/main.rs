//! LiftRank CLI — build statistics snapshots and query them.
//!
//! Commands:
//! - `synth` — write deterministic synthetic records as CSV
//! - `aggregate` — build a statistics snapshot from a CSV (or synthetic records)
//! - `rank` — percentile of submitted lifts within a filtered population
//! - `stats` — distribution of a filtered population
//! - `options` — selectable values of an extended dimension
//! - `info` — snapshot metadata summary
//!
//! Logs go to stderr; set `RUST_LOG` or `--log-level` to change verbosity.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use liftrank_core::domain::{ExtendedDimension, Lift, Sex, TestedStatus};
use liftrank_core::rank::LiftValues;
use liftrank_core::resolver::{FilterSelection, Selection};
use liftrank_core::store::StatisticsStore;
use liftrank_runner::{
    generate_synthetic_records, load_records_csv, read_snapshot, run_aggregation, write_records_csv, write_snapshot,
    AggregateProgress, AggregatorConfig, RankingService,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "liftrank", about = "LiftRank CLI — powerlifting percentile rankings")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "liftrank_runner=debug").
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write deterministic synthetic records as CSV.
    Synth {
        /// Number of records.
        #[arg(long, default_value_t = 10_000)]
        count: usize,

        /// RNG seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Aggregator config (TOML) for the age division table.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output CSV path.
        #[arg(long, default_value = "records.csv")]
        out: PathBuf,
    },
    /// Build a statistics snapshot.
    Aggregate {
        /// Input CSV of records (own headers or OpenPowerlifting headers).
        #[arg(long, conflicts_with = "synthetic")]
        input: Option<PathBuf>,

        /// Use this many synthetic records instead of an input file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Aggregator config (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker thread cap, overriding the config.
        #[arg(long)]
        threads: Option<usize>,

        /// Snapshot output path.
        #[arg(long, default_value = "snapshot.json")]
        out: PathBuf,
    },
    /// Percentile of submitted lifts within a filtered population.
    Rank {
        #[command(flatten)]
        query: QueryArgs,

        #[arg(long)]
        squat: Option<f64>,

        #[arg(long)]
        bench: Option<f64>,

        #[arg(long)]
        deadlift: Option<f64>,

        #[arg(long)]
        total: Option<f64>,
    },
    /// Distribution of a filtered population.
    Stats {
        #[command(flatten)]
        query: QueryArgs,

        /// Only print this lift (squat, bench, deadlift, total).
        #[arg(long)]
        lift: Option<Lift>,
    },
    /// Selectable values of an extended dimension.
    Options {
        #[command(flatten)]
        query: QueryArgs,

        /// country, state, federation, year or meetName.
        #[arg(long)]
        dimension: ExtendedDimension,
    },
    /// Snapshot metadata summary.
    Info {
        /// Snapshot path.
        #[arg(long, default_value = "snapshot.json")]
        snapshot: PathBuf,

        /// Print the full metadata as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Snapshot and population filters shared by the query commands.
#[derive(Args)]
struct QueryArgs {
    /// Snapshot path.
    #[arg(long, default_value = "snapshot.json")]
    snapshot: PathBuf,

    /// M or F.
    #[arg(long)]
    sex: Sex,

    /// Equipment class (e.g. Raw, Wraps, Single-ply).
    #[arg(long)]
    equipment: String,

    /// Bodyweight in kg; picks the weight class when --weight-class is not given.
    #[arg(long)]
    bodyweight: Option<f64>,

    /// Weight class label (e.g. 83, 120+), or "All".
    #[arg(long, default_value = "All")]
    weight_class: String,

    /// Age division, or "All".
    #[arg(long, default_value = "All")]
    age: String,

    /// Tested, Untested, or "All".
    #[arg(long, default_value = "All")]
    tested: String,

    /// Extended filter as dimension=value (repeatable), e.g. --where country=USA.
    #[arg(long = "where", value_name = "DIM=VALUE")]
    extended: Vec<String>,

    /// Print the result as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl QueryArgs {
    fn selection(&self) -> Result<FilterSelection> {
        let mut selection = FilterSelection::new(self.sex, self.equipment.trim());
        selection.weight_class = Selection::<String>::parse(&self.weight_class);
        selection.age_division = Selection::<String>::parse(&self.age);
        selection.tested = Selection::<TestedStatus>::parse(&self.tested)?;
        for pair in &self.extended {
            let Some((dim, value)) = pair.split_once('=') else {
                bail!("--where expects dimension=value, got '{pair}'");
            };
            let dimension: ExtendedDimension = dim.parse()?;
            selection = selection.with_extended(dimension, value)?;
        }
        Ok(selection)
    }

    fn service(&self) -> Result<RankingService> {
        Ok(RankingService::from_store(load_snapshot(&self.snapshot)?))
    }
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Synth { count, seed, config, out } => run_synth(count, seed, config.as_deref(), &out),
        Commands::Aggregate {
            input,
            synthetic,
            seed,
            config,
            threads,
            out,
        } => run_aggregate(input.as_deref(), synthetic, seed, config.as_deref(), threads, &out),
        Commands::Rank {
            query,
            squat,
            bench,
            deadlift,
            total,
        } => run_rank(
            &query,
            LiftValues {
                squat,
                bench,
                deadlift,
                total,
            },
        ),
        Commands::Stats { query, lift } => run_stats(&query, lift),
        Commands::Options { query, dimension } => run_options(&query, dimension),
        Commands::Info { snapshot, json } => run_info(&snapshot, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<AggregatorConfig> {
    match path {
        Some(p) => AggregatorConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(AggregatorConfig::default()),
    }
}

fn load_snapshot(path: &Path) -> Result<StatisticsStore> {
    read_snapshot(path).with_context(|| format!("loading snapshot {}", path.display()))
}

fn run_synth(count: usize, seed: u64, config_path: Option<&Path>, out: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let records = generate_synthetic_records(count, seed, &config);
    write_records_csv(out, &records)?;
    println!("Wrote {} synthetic records to {}", records.len(), out.display());
    Ok(())
}

fn run_aggregate(
    input: Option<&Path>,
    synthetic: Option<usize>,
    seed: u64,
    config_path: Option<&Path>,
    threads: Option<usize>,
    out: &Path,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if threads.is_some() {
        config.threads = threads;
    }

    let records = match (input, synthetic) {
        (Some(path), _) => {
            let loaded = load_records_csv(path, &config.age_divisions)?;
            let report = &loaded.report;
            println!(
                "Loaded {} of {} rows from {} ({} skipped)",
                report.rows_loaded,
                report.rows_read,
                path.display(),
                report.rows_skipped
            );
            for skipped in &report.examples {
                tracing::warn!(event = "row_skipped", row = skipped.row, reason = %skipped.reason, "skipped input row");
            }
            loaded.records
        }
        (None, Some(count)) => generate_synthetic_records(count, seed, &config),
        (None, None) => bail!("one of --input or --synthetic is required"),
    };

    let on_progress = |p: &AggregateProgress| {
        eprintln!(
            "  [{:?}] groups {}/{}, buckets {} ({:.1}s)",
            p.phase, p.groups_done, p.groups_total, p.buckets_written, p.elapsed_secs
        );
    };
    let outcome = run_aggregation(&records, &config, Some(&on_progress), None)?;
    write_snapshot(&outcome.store, out)?;

    let report = &outcome.report;
    println!();
    println!("=== Aggregation ===");
    println!("Records:        {} in, {} accepted", report.records_in, report.records_accepted);
    for (reason, count) in &report.discarded {
        println!("  discarded {reason}: {count}");
    }
    println!("Base buckets:   {}", report.base_buckets);
    println!(
        "Extended:       {} (skipped {} below minimum sample)",
        report.extended_buckets, report.extended_groups_skipped
    );
    println!("Version:        {}", outcome.store.version);
    println!("Elapsed:        {:.2}s", report.elapsed_secs);
    println!("Snapshot:       {}", out.display());
    Ok(())
}

fn run_rank(query: &QueryArgs, lifts: LiftValues) -> Result<()> {
    if Lift::ALL.iter().all(|l| lifts.get(*l).is_none()) {
        bail!("give at least one of --squat, --bench, --deadlift, --total");
    }
    let service = query.service()?;
    let result = service.resolve_percentiles(&query.selection()?, query.bodyweight, &lifts)?;

    if query.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!("Population: {} ({} lifters, rule {})", result.key, result.sample_size, result.rule);
    for lift in Lift::ALL {
        if let Some(value) = lifts.get(lift) {
            println!("  {:<9} {:>7.1} kg → {:>5.1}", lift.as_str(), value, result.percentiles.get(lift));
        }
    }
    Ok(())
}

fn run_stats(query: &QueryArgs, only: Option<Lift>) -> Result<()> {
    let service = query.service()?;
    let result = service.resolve_statistics(&query.selection()?, query.bodyweight)?;

    if query.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!(
        "Population: {} ({} lifters, rule {})",
        result.key, result.bucket.sample_size, result.rule
    );
    let lifts: Vec<Lift> = only.map_or_else(|| Lift::ALL.to_vec(), |l| vec![l]);
    for lift in lifts {
        let Some(stats) = result.bucket.lift(lift) else {
            println!("  {:<9} no data", lift.as_str());
            continue;
        };
        let s = &stats.summary;
        println!(
            "  {:<9} n={:<6} mean {:>6.1}  sd {:>5.1}  min {:>6.1}  p25 {:>6.1}  median {:>6.1}  p75 {:>6.1}  p90 {:>6.1}  max {:>6.1}",
            lift.as_str(),
            s.count,
            s.mean,
            s.std_dev,
            s.min,
            s.p25,
            s.median,
            s.p75,
            s.p90,
            s.max
        );
    }
    Ok(())
}

fn run_options(query: &QueryArgs, dimension: ExtendedDimension) -> Result<()> {
    let service = query.service()?;
    let values = service.distinct_values(dimension, &query.selection()?, query.bodyweight)?;
    if query.json {
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else {
        for value in values {
            println!("{value}");
        }
    }
    Ok(())
}

fn run_info(path: &Path, json: bool) -> Result<()> {
    let store = load_snapshot(path)?;
    let md = &store.metadata;
    if json {
        println!("{}", serde_json::to_string_pretty(md)?);
        return Ok(());
    }

    println!("Snapshot:       {}", path.display());
    println!("Version:        {}", store.version);
    println!("Generated:      {}", store.generated_at.to_rfc3339());
    println!(
        "Records:        {} in, {} accepted, {} discarded",
        md.records.input,
        md.records.accepted,
        md.records.discarded_total()
    );
    println!("Buckets:        {} base, {} extended", md.buckets.base, md.buckets.extended);
    println!("Equipment:      {}", md.equipment_types.join(", "));
    println!("Age divisions:  {}", md.age_divisions.join(", "));
    for (sex, classes) in &md.weight_classes {
        println!("Classes ({sex}):    {}", classes.join(", "));
    }
    if let Some(range) = md.year_range {
        println!("Years:          {}–{}", range.min, range.max);
    }
    println!("Countries:      {}", md.countries.len());
    println!("Federations:    {}", md.federations.len());
    println!();
    println!("{:<16} {:>8} {:>10}", "Sex", "Count", "Mean total");
    for (sex, summary) in &md.by_sex {
        println!("{:<16} {:>8} {:>10.1}", sex, summary.count, summary.mean_total);
    }
    println!();
    println!("{:<16} {:>8} {:>10}", "Equipment", "Count", "Mean total");
    for (equipment, summary) in &md.by_equipment {
        println!("{:<16} {:>8} {:>10.1}", equipment, summary.count, summary.mean_total);
    }
    Ok(())
}
