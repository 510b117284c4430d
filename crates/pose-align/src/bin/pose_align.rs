use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pose_align::core::load_keypoints_json;
use pose_align::{AffineModel, MatchConfig, MatchReport};

#[derive(Parser, Debug)]
#[command(
    name = "pose-align",
    version,
    about = "Classify keypoint poses against a template catalog"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); `RUST_LOG` overrides it
    /// in tracing builds.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match a pose against a template catalog.
    Match(MatchArgs),
    /// Run a match described by a JSON config file.
    Run {
        /// Path to a `MatchConfig` JSON file.
        config: PathBuf,
    },
    /// Fit the transform mapping one keypoint set onto another.
    Fit(FitArgs),
}

#[derive(Args, Debug)]
struct MatchArgs {
    /// Template catalog JSON.
    #[arg(long)]
    catalog: String,
    /// Observed pose JSON.
    #[arg(long)]
    pose: String,
    /// Allow templates that do not cover every visible landmark.
    #[arg(long)]
    soft: bool,
    /// Fit a general affine instead of a similarity.
    #[arg(long)]
    full: bool,
    /// Override the catalog's default reference area.
    #[arg(long)]
    area: Option<f64>,
    /// Output frame width for the reported transform.
    #[arg(long, default_value_t = 1.0)]
    width: f64,
    /// Output frame height for the reported transform.
    #[arg(long, default_value_t = 1.0)]
    height: f64,
    /// Write the full JSON report here.
    #[arg(long)]
    output: Option<String>,
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Source keypoints JSON.
    #[arg(long)]
    src: String,
    /// Destination keypoints JSON.
    #[arg(long)]
    dst: String,
    /// Fit a general affine instead of a similarity.
    #[arg(long)]
    full: bool,
    /// Reference area used for the score.
    #[arg(long, default_value_t = 1.0)]
    area: f64,
}

fn model(full: bool) -> AffineModel {
    if full {
        AffineModel::Full
    } else {
        AffineModel::Similarity
    }
}

fn init_logging(verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = pose_align::core::level_from_verbosity(verbose);
    // `log` records are bridged by the subscriber
    #[cfg(feature = "tracing")]
    pose_align::core::init_tracing(false, level);
    #[cfg(not(feature = "tracing"))]
    pose_align::core::init_with_level(level)?;
    Ok(())
}

fn print_report(report: &MatchReport) -> Result<(), Box<dyn std::error::Error>> {
    match report.template {
        Some(index) => println!(
            "category {} (template {}{}) score {:.4} scale {:.4}",
            report.category,
            index,
            report
                .template_name
                .as_deref()
                .map(|n| format!(" \"{n}\""))
                .unwrap_or_default(),
            report.score,
            report.scale
        ),
        None => println!("no match (category {})", report.category),
    }
    println!("matrix {}", serde_json::to_string(&report.matrix)?);
    Ok(())
}

fn run_config(cfg: &MatchConfig, write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let report = pose_align::run(cfg)?;
    print_report(&report)?;
    if write {
        let path = cfg.output_path();
        report.write_json(&path)?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Match(args) => {
            let mut cfg = MatchConfig::new(args.catalog, args.pose);
            cfg.hard = !args.soft;
            cfg.model = model(args.full);
            cfg.default_area = args.area;
            cfg.output_size = [args.width, args.height];
            let write = args.output.is_some();
            cfg.output_path = args.output;
            run_config(&cfg, write)
        }
        Command::Run { config } => {
            let cfg = MatchConfig::load_json(&config)?;
            run_config(&cfg, true)
        }
        Command::Fit(args) => {
            let src = load_keypoints_json(&args.src)?;
            let dst = load_keypoints_json(&args.dst)?;
            let matcher = pose_align::PoseMatcher::new(pose_align::MatchParams {
                hard: false,
                model: model(args.full),
            });
            let res = matcher.match_pair(&src, &dst, args.area)?;
            println!("{}", serde_json::to_string_pretty(&res)?);
            Ok(())
        }
    }
}
