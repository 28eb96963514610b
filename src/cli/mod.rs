//! crtc-ml CLI Module
//!
//! Command-line interface for training and testing track classifiers.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::evaluation::{format_class, ConfusionMatrix, EvaluationReport};
use crate::pipeline::{Pipeline, PipelineConfig, TrainRequest};
use crate::training::ModelRegistry;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn row(key: &str, val: String) {
    println!("  {:<22} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "crtc-ml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and evaluate CLAS12 track classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model, evaluate it and save it
    Train(TrainArgs),

    /// Evaluate a saved model on a testing directory
    Test(TestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Directory containing the training SVM files
    #[arg(short = 't', long = "training-dir")]
    pub training_dir: PathBuf,

    /// Directory containing the testing SVM files
    #[arg(short = 'e', long = "testing-dir")]
    pub testing_dir: PathBuf,

    /// File in which to save the model
    #[arg(short = 'm', long = "out-model")]
    pub out_model: PathBuf,

    /// Model type to train (et, mlp)
    #[arg(long = "model-type")]
    pub model_type: String,

    /// Fixed feature width; defaults to the largest index seen
    #[arg(short = 'f', long = "num-features")]
    pub num_features: Option<usize>,

    /// Training epochs (mlp)
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Training batch size (mlp)
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// JSON pipeline configuration; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// Directory containing the testing SVM files
    #[arg(short = 'e', long = "testing-dir")]
    pub testing_dir: PathBuf,

    /// Model file to evaluate
    #[arg(short = 'm', long = "model")]
    pub model: PathBuf,

    /// Fixed feature width; defaults to the largest index seen
    #[arg(short = 'f', long = "num-features")]
    pub num_features: Option<usize>,
}

impl TrainArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(n) = self.num_features {
            config.loader.num_features = Some(n);
        }
        if let Some(epochs) = self.epochs {
            config.backends.mlp.max_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.backends.mlp.batch_size = batch_size;
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let config = args.pipeline_config()?;
    let registry = Arc::new(ModelRegistry::builtin(&config.backends));
    let request = TrainRequest::new(
        args.model_type.clone(),
        &args.training_dir,
        &args.testing_dir,
        &args.out_model,
    );

    step_run(&format!("Training {}", args.model_type.cyan()));
    let mut pipeline = Pipeline::new(registry, config);
    let outcome = match pipeline.run(&request) {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("{}", "failed".red());
            return Err(e.into());
        }
    };
    step_done(&format!("{:.2?}", outcome.training.duration + outcome.prediction_time));

    section("Training report");
    row("Samples", outcome.training.n_samples.to_string());
    row("Features", outcome.training.n_features.to_string());
    row("Accuracy", format!("{:.4}", outcome.training.accuracy));
    row("Time", format!("{:.3}s", outcome.training.duration.as_secs_f64()));

    print_evaluation(&outcome.evaluation, outcome.prediction_time);

    println!();
    println!("  {} saved {}", ok("✓"), outcome.artifact_path.display().to_string().white());
    println!();
    Ok(())
}

pub fn cmd_test(args: &TestArgs) -> anyhow::Result<()> {
    section("Test");

    let mut config = PipelineConfig::default();
    config.loader.num_features = args.num_features;
    config.validate()?;
    let registry = Arc::new(ModelRegistry::builtin(&config.backends));

    step_run(&format!("Evaluating {}", args.model.display()));
    let mut pipeline = Pipeline::new(registry, config);
    let outcome = match pipeline.evaluate_artifact(&args.model, &args.testing_dir) {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("{}", "failed".red());
            return Err(e.into());
        }
    };
    step_done(&format!("{} rows in {:.2?}", outcome.n_samples, outcome.prediction_time));

    section("Model");
    row("Type", outcome.metadata.model_type.clone());
    row("Trained", outcome.metadata.trained_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    row("Training data", outcome.metadata.training_dir.clone());
    row("Features", outcome.metadata.n_features.to_string());

    print_evaluation(&outcome.evaluation, outcome.prediction_time);
    println!();
    Ok(())
}

fn print_evaluation(report: &EvaluationReport, prediction_time: std::time::Duration) {
    section("Testing report");
    row("Accuracy", format!("{:.4}", report.accuracy()).bold().to_string());
    if let Some(f1) = report.get("macro_f1") {
        row("Macro F1", format!("{:.4}", f1));
    }
    for class in report.confusion_matrix().classes() {
        let label = format_class(*class);
        let precision = report.get(&format!("precision[{}]", label)).unwrap_or(0.0);
        let recall = report.get(&format!("recall[{}]", label)).unwrap_or(0.0);
        row(
            &format!("Class {}", label),
            format!("precision {:.4}  recall {:.4}", precision, recall),
        );
    }
    row("Prediction time", format!("{:.3}s", prediction_time.as_secs_f64()));

    print_confusion(report.confusion_matrix());

    if let Some(segments) = report.get("n_segments") {
        section("Track finding");
        row("Segments", format!("{}", segments as usize));
        for (key, name) in [
            ("accuracy_a1", "A1 (true track on top)"),
            ("accuracy_ac", "Ac (true track found)"),
            ("accuracy_ah", "Ah (false track found)"),
            ("accuracy_af", "Af (true track missed)"),
        ] {
            if let Some(value) = report.get(key) {
                row(name, format!("{:.4}", value));
            }
        }
    }
}

fn print_confusion(matrix: &ConfusionMatrix) {
    section("Confusion matrix");
    let labels: Vec<String> = matrix.classes().iter().map(|c| format_class(*c)).collect();
    let header: String = labels.iter().map(|l| format!("{:>10}", l)).collect();
    println!("  {:<12}{}", muted("true \\ pred"), muted(&header));
    for (label, counts) in labels.iter().zip(matrix.rows()) {
        let cells: String = counts.iter().map(|n| format!("{:>10}", n)).collect();
        println!("  {:<12}{}", muted(label), cells);
    }
}
