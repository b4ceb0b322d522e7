//! Tabclean CLI - Clean, filter and export CSV tables
//!
//! # Main Commands
//!
//! ```bash
//! tabclean serve                         # Start HTTP server (port 3000)
//! tabclean clean input.csv --auto        # Apply suggested transforms, print CSV
//! tabclean clean input.csv --spec s.json # Apply a transform spec
//! tabclean filter input.csv --exclude-nulls --columns a,b
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! tabclean parse input.csv               # Parse CSV to JSON
//! tabclean stats input.csv               # Column statistics
//! tabclean suggest input.csv             # Print the suggested transform spec
//! tabclean catalog datasets.json --query stocks
//! ```
//!
//! CSV and JSON output goes to stdout; progress goes to stderr.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tabclean::{
    apply_filter, auto_suggest, clean_csv_file, format_delimiter, parse_csv_file, table_stats,
    to_csv_string, Catalog, CatalogQuery, CleanOptions, Config, FilterSpec, IngestOptions,
    SpecSource, TransformSpec, LOG_BROADCASTER,
};

#[derive(Parser)]
#[command(name = "tabclean")]
#[command(about = "Upload, clean, filter and export CSV tables", long_about = None)]
struct Cli {
    /// Silence pipeline logs on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Keep every field as text (no number/boolean detection)
    #[arg(long, global = true)]
    no_typing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show per-column statistics as JSON
    Stats {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Print the auto-suggested transform spec
    Suggest {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Save the spec to a file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: CSV → transform spec → cleaned CSV
    Clean {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Transform spec JSON file
        #[arg(short, long, conflicts_with = "auto")]
        spec: Option<PathBuf>,

        /// Use the auto-suggested spec
        #[arg(short, long)]
        auto: bool,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Filter rows and project columns
    Filter {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Column for the substring filter
        #[arg(long, requires = "value")]
        column: Option<String>,

        /// Substring to look for (case-insensitive)
        #[arg(long, requires = "column")]
        value: Option<String>,

        /// Drop rows with any empty or null cell
        #[arg(long)]
        exclude_nulls: bool,

        /// Columns to keep, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search a dataset catalog
    Catalog {
        /// Catalog JSON file (array of datasets)
        input: PathBuf,

        /// Free-text search over title, description and tags
        #[arg(long, default_value = "")]
        query: String,

        /// Category tag (repeatable)
        #[arg(short, long)]
        category: Vec<String>,

        /// Payment type tag, e.g. free or paid (repeatable)
        #[arg(short, long)]
        payment: Vec<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: TABCLEAN_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.quiet {
        LOG_BROADCASTER.set_echo(false);
    }

    let mut config = Config::from_env();
    if cli.no_typing {
        config.dynamic_typing = false;
    }

    let result = match cli.command {
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, &ingest_options(&config, delimiter), output.as_deref()),

        Commands::Stats { input, delimiter } => cmd_stats(&input, &ingest_options(&config, delimiter)),

        Commands::Suggest {
            input,
            delimiter,
            output,
        } => cmd_suggest(&input, &ingest_options(&config, delimiter), output.as_deref()),

        Commands::Clean {
            input,
            delimiter,
            spec,
            auto,
            output,
        } => cmd_clean(
            &input,
            ingest_options(&config, delimiter),
            spec.as_deref(),
            auto,
            output.as_deref(),
        ),

        Commands::Filter {
            input,
            delimiter,
            column,
            value,
            exclude_nulls,
            columns,
            output,
        } => {
            let mut filter = FilterSpec::new();
            if let (Some(column), Some(value)) = (column, value) {
                filter = filter.with_column_filter(column, value);
            }
            if exclude_nulls {
                filter = filter.excluding_nulls();
            }
            if let Some(columns) = columns {
                filter = filter.with_columns(columns);
            }
            cmd_filter(&input, &ingest_options(&config, delimiter), &filter, output.as_deref())
        }

        Commands::Catalog {
            input,
            query,
            category,
            payment,
        } => {
            let query = CatalogQuery {
                text: query,
                categories: category,
                payment_types: payment,
            };
            cmd_catalog(&input, &query)
        }

        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            tabclean::server::start_server(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn ingest_options(config: &Config, delimiter: Option<char>) -> IngestOptions {
    IngestOptions {
        delimiter,
        dynamic_typing: config.dynamic_typing,
        max_bytes: Some(config.max_upload_bytes),
    }
}

fn cmd_parse(input: &Path, options: &IngestOptions, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file(input, options)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if options.delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers().join(", "));
    eprintln!("✅ Parsed {} rows", result.row_count());

    let json = serde_json::to_string_pretty(&result.table)?;
    write_output(&json, output)
}

fn cmd_stats(input: &Path, options: &IngestOptions) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📊 Statistics: {}", input.display());

    let result = parse_csv_file(input, options)?;
    let stats = table_stats(&result.table);

    let flagged = stats.iter().filter(|s| s.has_outliers).count();
    eprintln!("   {} rows, {} columns", result.row_count(), stats.len());
    if flagged > 0 {
        eprintln!("   ⚠️  {} column(s) with outliers", flagged);
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_suggest(input: &Path, options: &IngestOptions, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("💡 Suggesting transforms: {}", input.display());

    let result = parse_csv_file(input, options)?;
    let spec = auto_suggest(&result.table);

    if spec.is_empty() {
        eprintln!("   Nothing to clean.");
    } else {
        eprintln!("   {} column(s) with suggestions", spec.transforms.len());
    }

    write_output(&spec.to_json()?, output)
}

fn cmd_clean(
    input: &Path,
    ingest: IngestOptions,
    spec_path: Option<&Path>,
    auto: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = match spec_path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            SpecSource::Explicit(TransformSpec::from_json(&json)?)
        }
        None if auto => SpecSource::Auto,
        None => SpecSource::None,
    };

    let options = CleanOptions { ingest, spec };
    let result = clean_csv_file(input, &options)?;

    eprintln!("\n⚙️  {}", result.outcome.summary());

    let csv = to_csv_string(&result.outcome.table)?;
    write_csv(&csv, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_filter(
    input: &Path,
    options: &IngestOptions,
    filter: &FilterSpec,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔎 Filtering: {}", input.display());

    let result = parse_csv_file(input, options)?;
    let filtered = apply_filter(&result.table, filter)?;

    eprintln!(
        "   Kept {} of {} rows, {} columns",
        filtered.row_count(),
        result.row_count(),
        filtered.column_count()
    );

    let csv = to_csv_string(&filtered)?;
    write_csv(&csv, output)
}

fn cmd_catalog(input: &Path, query: &CatalogQuery) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::from_file(input)?;
    let matches = catalog.search(query);

    eprintln!("📚 {} of {} datasets match", matches.len(), catalog.len());

    for d in matches {
        println!("  📄 {} ({})", d.title, d.id);
        if !d.description.is_empty() {
            println!("     {}", d.description);
        }
        println!("     Tags: {}", d.tags.join(", "));
        println!("     {} rows, {} columns, {}", d.rows, d.columns, d.file_size);
        println!();
    }

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

/// Like [`write_output`] but without the extra newline (CSV already ends with one).
fn write_csv(csv: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, csv)?;
            eprintln!("💾 CSV written to: {}", p.display());
        }
        None => {
            print!("{}", csv);
        }
    }
    Ok(())
}
