// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands off to Layer 2.
// The only layer that prints to stdout.

pub mod commands;

use anyhow::Result;
use burn::backend::{Autodiff, NdArray, Wgpu};
use clap::Parser;
use commands::{BackendKind, Commands, ConfigArgs, TrainArgs};

use crate::application::{
    config::{ConfigDiagnostic, HarnessConfig},
    train_use_case::{TrainSummary, TrainUseCase},
};

#[derive(Parser, Debug)]
#[command(
    name = "trainloop",
    version,
    about = "Iteration-indexed training harness with best-checkpointing and plateau LR decay."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Config(args) => run_config(args),
        }
    }
}

fn resolve(args: &ConfigArgs) -> Result<HarnessConfig> {
    let (cfg, diagnostics) = args.resolve()?;
    report(&diagnostics);
    Ok(cfg)
}

fn report(diagnostics: &[ConfigDiagnostic]) {
    for diagnostic in diagnostics {
        tracing::warn!("{diagnostic}");
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = resolve(&args.config)?;
    tracing::info!(
        "Serialization directory: '{}' (backend {:?})",
        args.serialization_dir.display(),
        args.backend
    );

    let use_case = TrainUseCase::new(cfg, &args.serialization_dir)
        .with_start_iteration(args.start_iteration)
        .with_num_samples(args.num_samples);

    let summary = match args.backend {
        BackendKind::Cpu  => use_case.execute::<Autodiff<NdArray>>(Default::default())?,
        BackendKind::Wgpu => use_case.execute::<Autodiff<Wgpu>>(Default::default())?,
    };

    print_summary(&summary);
    Ok(())
}

fn run_config(args: ConfigArgs) -> Result<()> {
    let cfg = resolve(&args)?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

fn print_summary(summary: &TrainSummary) {
    println!("Training stopped at iteration {}.", summary.final_iteration);
    println!("Validations run:  {}", summary.validations);
    println!("Learning rate:    {:.3e}", summary.final_lr);
    match &summary.best {
        Some(best) => println!("Best checkpoint:  iteration {} (metric {:.6})", best.iteration, best.metric),
        None       => println!("Best checkpoint:  none saved"),
    }
}
