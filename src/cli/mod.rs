//! Command-line interface
//!
//! Training, batch prediction, dataset inspection, and the server runner.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::ModelArtifact;
use crate::data::DataLoader;
use crate::error::Result;
use crate::explain::Explainer;
use crate::inference::InferenceService;
use crate::schema::Schema;
use crate::server::{run_server, AppState, ServerConfig};
use crate::training::{ModelTrainer, TrainerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {} {}", dim(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "transitml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transit-candidate disposition classifier")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on a mission CSV export
    Train {
        /// Input dataset (CSV; # comment lines are skipped)
        #[arg(short, long)]
        data: PathBuf,

        /// Output model bundle
        #[arg(short, long)]
        output: PathBuf,

        /// Schema preset (kepler, k2, toi)
        #[arg(short, long, default_value = "kepler")]
        mission: String,

        /// Training seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output ranking table (defaults next to the bundle)
        #[arg(long)]
        ranking: Option<PathBuf>,
    },

    /// Classify a batch of records with a trained bundle
    Predict {
        /// Model bundle
        #[arg(short, long)]
        model: PathBuf,

        /// Input records (CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Output JSON file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Bundle to preload into the service
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Summarize a dataset
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn cmd_train(
    data: &Path,
    output: &Path,
    mission: &str,
    seed: u64,
    ranking: Option<&Path>,
) -> Result<()> {
    section("train");
    kv("data", &data.display().to_string());
    kv("mission", mission);
    kv("seed", &seed.to_string());

    let start = Instant::now();
    step_run("loading dataset");
    let rows = DataLoader::read_records(&data.display().to_string())?;
    step_ok(&format!("{} rows", rows.len()));

    let schema = Schema::for_mission(mission)?;
    let trainer = ModelTrainer::with_config(schema, TrainerConfig::default().with_seed(seed));

    step_run("fitting model");
    let (artifact, report) = trainer.train(&rows)?;
    step_ok(&format!("done in {:.2}s", start.elapsed().as_secs_f64()));

    artifact.save_to(output)?;
    step_ok(&format!("bundle written to {}", output.display()));

    let full_ranking =
        Explainer::rank(artifact.model(), &artifact.preprocessor().retained_features())?;
    let focus_ranking =
        Explainer::focus_rank(&full_ranking, artifact.schema().focus_features())?;
    let ranking_path = ranking
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output.with_extension("importance.csv"));
    std::fs::write(&ranking_path, Explainer::ranking_table(&full_ranking))?;
    step_ok(&format!("ranking table written to {}", ranking_path.display()));

    section("evaluation");
    kv("accuracy", &format!("{:.4}", report.accuracy));
    kv("test rows", &report.n_test_rows.to_string());
    println!();
    println!("  {}", dim("confusion matrix (rows = true, cols = predicted)"));
    println!("  {:>16} {:>12} {:>12} {:>14}", "", "confirmed", "candidate", "false_positive");
    for (label, row) in report.labels.iter().zip(report.confusion_matrix.iter()) {
        println!(
            "  {:>16} {:>12} {:>12} {:>14}",
            label, row[0], row[1], row[2]
        );
    }

    section("focus features");
    for entry in &focus_ranking {
        kv(&entry.feature, &format!("{:.6}", entry.importance));
    }

    Ok(())
}

pub fn cmd_predict(model: &Path, data: &Path, output: Option<&Path>) -> Result<()> {
    section("predict");
    let artifact = ModelArtifact::load_from(model)?;
    step_ok(&format!("loaded bundle {}", model.display()));

    let service = InferenceService::new();
    service.load_artifact(artifact)?;

    let records = DataLoader::read_records(&data.display().to_string())?;
    step_run(&format!("classifying {} records", records.len()));
    let results = service.predict(&records)?;

    let json = serde_json::to_string_pretty(&results)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            step_ok(&format!("results written to {}", path.display()));
        }
        None => println!("{json}"),
    }

    Ok(())
}

pub async fn cmd_serve(host: &str, port: u16, model: Option<&Path>) -> anyhow::Result<()> {
    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::new(config));

    if let Some(path) = model {
        let artifact = ModelArtifact::load_from(path)?;
        state.service.load_artifact(artifact)?;
        step_ok(&format!("preloaded bundle {}", path.display()));
    }

    run_server(state).await
}

pub fn cmd_info(data: &Path) -> Result<()> {
    let df = DataLoader::load_csv(&data.display().to_string())?;

    section("dataset");
    kv("path", &data.display().to_string());
    kv("rows", &df.height().to_string());
    kv("columns", &df.width().to_string());

    println!();
    for (name, dtype) in df.get_column_names().iter().zip(df.dtypes().iter()) {
        println!("  {} {}", dim(&format!("{dtype:?}")), name);
    }

    Ok(())
}
