//! Tempscore CLI - map portfolio spreadsheets and score them
//!
//! # Main Commands
//!
//! ```bash
//! tempscore serve                          # Start HTTP server (port 3000)
//! tempscore score portfolio.csv -d out/    # Map, score, write both exports
//! tempscore map portfolio.csv              # Show the proposed mapping
//! ```
//!
//! # Other Commands
//!
//! ```bash
//! tempscore parse portfolio.csv            # Just parse CSV to JSON
//! tempscore map holdings.xlsx              # Workbooks go through the backend parser
//! tempscore export result.json data_dump   # Export a saved result
//! tempscore targets                        # Show target fields
//! tempscore providers                      # List backend data providers
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

use tempscore::api::logs::{log_warning, LOG_BROADCASTER};
use tempscore::transform::pipeline::{prepare_path, score_session};
use tempscore::{
    is_spreadsheet, parse_file, write_export, AggregationMethod, Config, EngagementType, ExportKind, Mapping,
    ParseOptions, PortfolioSession, Scenario, ScenarioNumber, ScopeCategory, ScoringClient, ScoringResponse,
    ScoringSettings, TimeFrame,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "tempscore")]
#[command(about = "Map portfolio spreadsheets onto a temperature-scoring backend", long_about = None)]
struct Cli {
    /// Do not echo progress to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Input CSV file, or an Excel workbook parsed by the backend
    input: PathBuf,

    /// Lines before the header row (default: TEMPSCORE_SKIP_ROWS or 0)
    #[arg(short, long)]
    skip_rows: Option<usize>,
}

#[derive(clap::Args)]
struct MappingArgs {
    /// Accept a proposal when the edit distance is below this
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Start from a saved mapping (JSON object column -> target|null)
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Override one column: `column=target`, or `column=` to unmap
    #[arg(long = "set", value_parser = parse_override)]
    overrides: Vec<(String, Option<String>)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output JSON
    Parse {
        #[command(flatten)]
        input: InputArgs,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Propose a column mapping and print it as JSON
    Map {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Also list ranked candidates for every column
        #[arg(long)]
        candidates: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Map the portfolio, send it to the backend and save the result
    Score {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        mapping: MappingArgs,

        /// Aggregation method (WATS, TETS, MOTS, EOTS, ECOTS, AOTS, ROTS)
        #[arg(long, default_value = "WATS")]
        method: AggregationMethod,

        /// Time frames to keep (repeatable)
        #[arg(long = "time-frame")]
        time_frames: Vec<TimeFrame>,

        /// Scope categories to keep (repeatable)
        #[arg(long = "scope")]
        scopes: Vec<ScopeCategory>,

        /// Columns to group by (repeatable)
        #[arg(long = "group")]
        grouping_columns: Vec<String>,

        /// Extra columns to include in the company output (repeatable)
        #[arg(long = "include")]
        include_columns: Vec<String>,

        /// Data providers to use (repeatable)
        #[arg(long = "provider")]
        data_providers: Vec<String>,

        /// Score for companies without targets
        #[arg(long)]
        default_score: Option<f64>,

        /// What-if scenario number (1-4)
        #[arg(long)]
        scenario: Option<ScenarioNumber>,

        /// Scenario engagement type (SET_TARGETS, SET_SBTI_TARGETS)
        #[arg(long, requires = "scenario")]
        engagement_type: Option<EngagementType>,

        /// Scenario score cap
        #[arg(long, requires = "scenario")]
        score_cap: Option<f64>,

        /// Write temperature_scores.csv and data_dump.csv here
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,

        /// Output file for the raw JSON result (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a saved scoring result as CSV
    Export {
        /// Scoring result JSON (as written by `score`)
        input: PathBuf,

        /// temperature_scores or data_dump
        kind: ExportKind,

        /// Directory to write into (default: stdout)
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Show the target fields
    Targets,

    /// List the data providers offered by the backend
    Providers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    let result = match Config::from_env() {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, mut config: Config) -> CliResult {
    match command {
        Commands::Parse { input, delimiter, output } => {
            let skip_rows = input.skip_rows.unwrap_or(config.skip_rows);
            let file_name = input.input.file_name().and_then(|name| name.to_str());
            if is_spreadsheet(file_name, &[]) {
                let client = ScoringClient::from_config(&config);
                cmd_parse_remote(&client, &input.input, skip_rows, output.as_deref()).await
            } else {
                cmd_parse(&input.input, skip_rows, delimiter, output.as_deref())
            }
        }

        Commands::Map {
            input,
            mapping,
            candidates,
            output,
        } => {
            apply_input_args(&mut config, &input, &mapping);
            let client = ScoringClient::from_config(&config);
            let (session, _) = prepare_path(&client, &input.input, &config).await?;
            let session = apply_mapping_args(session, &mapping)?;
            cmd_map(&session, candidates, output.as_deref())
        }

        Commands::Score {
            input,
            mapping,
            method,
            time_frames,
            scopes,
            grouping_columns,
            include_columns,
            data_providers,
            default_score,
            scenario,
            engagement_type,
            score_cap,
            out_dir,
            output,
        } => {
            apply_input_args(&mut config, &input, &mapping);
            let settings = ScoringSettings {
                aggregation_method: method,
                data_providers,
                filter_scope_category: scopes,
                filter_time_frame: time_frames,
                include_columns,
                grouping_columns,
                default_score: default_score.unwrap_or(config.default_score),
                scenario: scenario.map(|number| Scenario {
                    engagement_type,
                    score_cap,
                    ..Scenario::new(number)
                }),
            };
            let client = ScoringClient::from_config(&config);
            let (session, _) = prepare_path(&client, &input.input, &config).await?;
            let session = apply_mapping_args(session, &mapping)?;
            cmd_score(session, &settings, &client, out_dir.as_deref(), output.as_deref()).await
        }

        Commands::Export { input, kind, out_dir } => cmd_export(&input, kind, out_dir.as_deref()),

        Commands::Serve { port } => tempscore::server::start_server(config, port).await,

        Commands::Targets => {
            for field in config.target_schema.fields() {
                println!("{}", field);
            }
            Ok(())
        }

        Commands::Providers => {
            let providers = ScoringClient::from_config(&config).data_providers().await?;
            for provider in providers {
                match provider.kind {
                    Some(kind) => println!("{} ({})", provider.name, kind),
                    None => println!("{}", provider.name),
                }
            }
            Ok(())
        }
    }
}

/// `column=target` or `column=`.
fn parse_override(raw: &str) -> Result<(String, Option<String>), String> {
    let (column, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected column=target, got '{}'", raw))?;
    if column.is_empty() {
        return Err(format!("missing column name in '{}'", raw));
    }
    let target = Some(target.trim()).filter(|t| !t.is_empty()).map(str::to_string);
    Ok((column.to_string(), target))
}

fn apply_input_args(config: &mut Config, input: &InputArgs, mapping: &MappingArgs) {
    if let Some(skip_rows) = input.skip_rows {
        config.skip_rows = skip_rows;
    }
    if let Some(threshold) = mapping.threshold {
        config.similarity_threshold = threshold;
    }
}

fn apply_mapping_args(mut session: PortfolioSession, args: &MappingArgs) -> Result<PortfolioSession, Box<dyn std::error::Error>> {
    if let Some(path) = &args.mapping {
        let saved: Mapping = serde_json::from_str(&fs::read_to_string(path)?)?;
        session.replace_mapping(&saved)?;
    }
    for (column, target) in &args.overrides {
        session.override_target(column, target.as_deref())?;
    }
    Ok(session)
}

fn cmd_parse(input: &Path, skip_rows: usize, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    let result = parse_file(input, &ParseOptions { skip_rows, delimiter })?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("   Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)
}

async fn cmd_parse_remote(client: &ScoringClient, input: &Path, skip_rows: usize, output: Option<&Path>) -> CliResult {
    let file_name = input.file_name().and_then(|name| name.to_str()).unwrap_or("portfolio.xlsx");
    let rows = client.parse_portfolio(file_name, fs::read(input)?, skip_rows).await?;

    eprintln!("   Parsed by: {}", client.base_url());
    eprintln!("   Columns: {}", tempscore::columns_of(&rows).join(", "));
    eprintln!("   Parsed {} records", rows.len());

    let json = serde_json::to_string_pretty(&rows)?;
    write_output(&json, output)
}

fn cmd_map(session: &PortfolioSession, candidates: bool, output: Option<&Path>) -> CliResult {
    let json = if candidates {
        let ranked: serde_json::Map<String, serde_json::Value> = session
            .columns()
            .iter()
            .map(|column| Ok((column.clone(), serde_json::to_value(session.suggestions(column))?)))
            .collect::<Result<_, serde_json::Error>>()?;
        serde_json::to_string_pretty(&json!({
            "mapping": session.mapping(),
            "candidates": ranked,
        }))?
    } else {
        serde_json::to_string_pretty(session.mapping())?
    };
    write_output(&json, output)
}

async fn cmd_score(
    mut session: PortfolioSession,
    settings: &ScoringSettings,
    client: &ScoringClient,
    out_dir: Option<&Path>,
    output: Option<&Path>,
) -> CliResult {
    let outcome = score_session(&mut session, settings, client).await?;

    if let Some(alert) = &outcome.alert {
        log_warning(&alert.message);
    }

    if let Some(dir) = out_dir {
        fs::create_dir_all(dir)?;
        for kind in [ExportKind::TemperatureScores, ExportKind::DataDump] {
            let path = write_export(dir, kind, &outcome.response)?;
            eprintln!("   Saved {}", path.display());
        }
    }

    let json = serde_json::to_string_pretty(&outcome.response)?;
    write_output(&json, output)?;

    if outcome.alert.is_some() {
        return Err("scoring backend call failed".into());
    }
    Ok(())
}

fn cmd_export(input: &Path, kind: ExportKind, out_dir: Option<&Path>) -> CliResult {
    let response: ScoringResponse = serde_json::from_str(&fs::read_to_string(input)?)?;

    match out_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = write_export(dir, kind, &response)?;
            eprintln!("   Saved {}", path.display());
        }
        None => print!("{}", tempscore::export_csv(&response, kind)),
    }
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("   Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
