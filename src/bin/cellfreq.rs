//! cellfreq - immune cell population frequency CLI
//!
//! Loads cell count CSVs into SQLite, builds the per-sample frequency table,
//! and reports responder vs non-responder differences for a cohort.

use cellfreq::compare::{compare_cohort, ComparatorConfig};
use cellfreq::data::{frequencies_to_tsv, members_to_tsv};
use cellfreq::error::Result;
use cellfreq::pipeline::{Pipeline, ReportConfig};
use cellfreq::store::{
    build_frequency_summary, clear, create_schema, load_file, read_frequency_summary,
    rebuild_frequency_summary, CohortFilter, Store, ZeroTotalPolicy,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for printed results
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

/// Immune cell population frequency reporting
#[derive(Parser)]
#[command(name = "cellfreq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Cohort selection shared by the cohort-level commands
#[derive(Args, Debug, Clone)]
struct CohortArgs {
    /// Subject condition
    #[arg(long, default_value = "melanoma")]
    condition: String,

    /// Subject treatment
    #[arg(long, default_value = "miraclib")]
    treatment: String,

    /// Sample type
    #[arg(long, default_value = "PBMC")]
    sample_type: String,
}

impl From<&CohortArgs> for CohortFilter {
    fn from(args: &CohortArgs) -> Self {
        CohortFilter::new(&args.condition, &args.treatment, &args.sample_type)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables
    Init {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,
    },

    /// Load a cell count CSV into the database
    Load {
        /// Path to the cell count CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,
    },

    /// Build (or rebuild) and list the frequency summary table
    Frequencies {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,

        /// Drop and recreate the table
        #[arg(long)]
        rebuild: bool,

        /// Fail instead of storing NA when a sample's counts sum to zero
        #[arg(long)]
        strict_zero: bool,

        /// Write the table to this TSV instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: text, json, or yaml
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Compare responders and non-responders in a cohort
    Compare {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,

        #[command(flatten)]
        cohort: CohortArgs,

        /// Significance threshold for adjusted p-values
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Keep Bonferroni-adjusted p-values above 1.0
        #[arg(long)]
        no_clip: bool,

        /// Write results to this TSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: text, json, or yaml
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Summarize a cohort (members, samples per project, subjects per response and sex)
    Cohort {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,

        #[command(flatten)]
        cohort: CohortArgs,

        /// Restrict to samples at treatment start
        #[arg(long)]
        baseline: bool,

        /// Also print average percentage by response
        #[arg(long)]
        averages: bool,

        /// Write the member listing to this TSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: text, json, or yaml
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Run the full report and write all tables and the box plot
    Report {
        /// Path to report configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cell count CSV (overrides the config)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// SQLite database (overrides the config)
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Output directory for TSVs and the SVG plot
        #[arg(short, long, default_value = "report")]
        output: PathBuf,

        /// Output format: text, json, or yaml
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Drop all tables
    Clear {
        /// Path to the SQLite database
        #[arg(short, long, default_value = "cell_counts.db")]
        database: PathBuf,
    },

    /// Generate an example report configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "report.yaml")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cellfreq=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { database } => cmd_init(&database),

        Commands::Load { input, database } => cmd_load(&input, &database),

        Commands::Frequencies {
            database,
            rebuild,
            strict_zero,
            output,
            format,
        } => cmd_frequencies(&database, rebuild, strict_zero, output.as_ref(), format),

        Commands::Compare {
            database,
            cohort,
            alpha,
            no_clip,
            output,
            format,
        } => {
            let config = ComparatorConfig {
                alpha,
                clip_adjusted: !no_clip,
                ..Default::default()
            };
            cmd_compare(&database, (&cohort).into(), &config, output.as_ref(), format)
        }

        Commands::Cohort {
            database,
            cohort,
            baseline,
            averages,
            output,
            format,
        } => {
            let mut filter = CohortFilter::from(&cohort);
            if baseline {
                filter = filter.baseline();
            }
            cmd_cohort(&database, &filter, averages, output.as_ref(), format)
        }

        Commands::Report {
            config,
            input,
            database,
            output,
            format,
        } => cmd_report(config.as_ref(), input, database, &output, format),

        Commands::Clear { database } => cmd_clear(&database),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print a serializable value as JSON or YAML
fn print_structured<T: Serialize>(value: &T, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Yaml => println!("{}", serde_yaml::to_string(value)?),
        Format::Text => {}
    }
    Ok(())
}

/// Create tables
fn cmd_init(database: &PathBuf) -> Result<()> {
    let store = Store::open(database)?;
    create_schema(&store)?;
    store.close()?;
    eprintln!("Initialized {:?}", database);
    Ok(())
}

/// Load a CSV
fn cmd_load(input: &PathBuf, database: &PathBuf) -> Result<()> {
    eprintln!("Loading {:?} into {:?}...", input, database);
    let mut store = Store::open(database)?;
    create_schema(&store)?;
    let summary = load_file(&mut store, input)?;
    store.close()?;

    eprint!("{}", summary);
    Ok(())
}

/// Build and list the frequency table
fn cmd_frequencies(
    database: &PathBuf,
    rebuild: bool,
    strict_zero: bool,
    output: Option<&PathBuf>,
    format: Format,
) -> Result<()> {
    let policy = if strict_zero {
        ZeroTotalPolicy::Error
    } else {
        ZeroTotalPolicy::Null
    };

    let mut store = Store::open(database)?;
    let build = if rebuild {
        rebuild_frequency_summary(&mut store, policy)?
    } else {
        build_frequency_summary(&mut store, policy)?
    };
    let rows = read_frequency_summary(&store)?;
    store.close()?;

    if build.created {
        eprintln!("Built frequency summary: {} rows", build.rows);
    }
    if !build.zero_total_samples.is_empty() {
        eprintln!(
            "  {} samples with zero total: {}",
            build.zero_total_samples.len(),
            build.zero_total_samples.join(", ")
        );
    }

    if let Some(path) = output {
        frequencies_to_tsv(&rows, path)?;
        eprintln!("Wrote {} rows to {:?}", rows.len(), path);
        return Ok(());
    }

    match format {
        Format::Text => {
            println!(
                "{:<12} {:>11} {:<12} {:>8} {:>10}",
                "sample", "total_count", "population", "count", "percentage"
            );
            for r in &rows {
                let pct = r
                    .percentage
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "NA".to_string());
                println!(
                    "{:<12} {:>11} {:<12} {:>8} {:>10}",
                    r.sample, r.total_count, r.population, r.count, pct
                );
            }
        }
        _ => print_structured(&rows, format)?,
    }
    Ok(())
}

/// Compare responders and non-responders
fn cmd_compare(
    database: &PathBuf,
    cohort: CohortFilter,
    config: &ComparatorConfig,
    output: Option<&PathBuf>,
    format: Format,
) -> Result<()> {
    eprintln!(
        "Comparing {} vs {} in {} / {} / {}...",
        config.responder, config.non_responder, cohort.condition, cohort.treatment, cohort.sample_type
    );

    let store = Store::open(database)?;
    let results = compare_cohort(&store, &cohort, config)?;
    store.close()?;

    if let Some(path) = output {
        results.to_tsv(path)?;
        eprintln!("Wrote results to {:?}", path);
    }

    match format {
        Format::Text => {
            print!("{}", results);
            println!();
            println!("{}", results.conclusion());
        }
        _ => print_structured(&results, format)?,
    }
    Ok(())
}

/// Summarize a cohort
fn cmd_cohort(
    database: &PathBuf,
    filter: &CohortFilter,
    averages: bool,
    output: Option<&PathBuf>,
    format: Format,
) -> Result<()> {
    let store = Store::open(database)?;
    let summary = filter.summary(&store)?;
    let response_averages = if averages {
        Some(filter.response_averages(&store)?)
    } else {
        None
    };
    store.close()?;

    if let Some(path) = output {
        members_to_tsv(&summary.members, path)?;
        eprintln!("Wrote {} members to {:?}", summary.members.len(), path);
    }

    match format {
        Format::Text => {
            println!(
                "Cohort: {} / {} / {}{}",
                filter.condition,
                filter.treatment,
                filter.sample_type,
                if filter.baseline_only { " (baseline)" } else { "" }
            );
            println!("  Samples: {}", summary.members.len());
            println!();
            println!("Samples per project:");
            for g in &summary.samples_per_project {
                println!("  {:<12} {}", g.group, g.count);
            }
            println!("Subjects per response:");
            for g in &summary.subjects_per_response {
                println!("  {:<12} {}", g.group, g.count);
            }
            println!("Subjects per sex:");
            for g in &summary.subjects_per_sex {
                println!("  {:<12} {}", g.group, g.count);
            }
            if let Some(rows) = &response_averages {
                println!();
                println!("Average percentage by response:");
                for a in rows {
                    println!(
                        "  {:<12} {:<8} {:>8.2}",
                        a.population, a.response, a.avg_percentage
                    );
                }
            }
        }
        _ => {
            print_structured(&summary, format)?;
            if let Some(rows) = &response_averages {
                print_structured(rows, format)?;
            }
        }
    }
    Ok(())
}

/// Run the full report
fn cmd_report(
    config_path: Option<&PathBuf>,
    input: Option<PathBuf>,
    database: Option<PathBuf>,
    output: &PathBuf,
    format: Format,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            eprintln!("Loading report configuration from {:?}...", path);
            ReportConfig::from_file(path)?
        }
        None => ReportConfig::default(),
    };
    if input.is_some() {
        config.input = input;
    }
    if let Some(database) = database {
        config.database = database;
    }

    eprintln!("Running report '{}'...", config.name);
    let report = Pipeline::from_config(&config).run()?;

    eprintln!("Writing report to {:?}...", output);
    let written = report.write_dir(output)?;
    eprintln!("Done! {} files written", written.len());

    match format {
        Format::Text => print!("{}", report),
        _ => print_structured(&report, format)?,
    }
    Ok(())
}

/// Drop all tables
fn cmd_clear(database: &PathBuf) -> Result<()> {
    let store = Store::open(database)?;
    clear(&store)?;
    store.close()?;
    eprintln!("Cleared {:?}", database);
    Ok(())
}

/// Write an example report configuration
fn cmd_example(output_path: &PathBuf) -> Result<()> {
    let config = ReportConfig::default();
    std::fs::write(output_path, config.to_yaml()?)?;
    eprintln!("Wrote example report configuration to {:?}", output_path);
    Ok(())
}
