use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mut_kit::codon_usage::CodonUsage;
use mut_kit::pas::{pas_solve, PasInput};
use mut_kit::qclm::{qclm_solve, QclmInput};
use mut_kit::revtrans::Translator;
use mut_kit::ssm::{ssm_solve, types::SsmInput};

#[derive(Parser)]
#[command(
    name = "mutkit",
    author,
    version,
    about = "oligo design for mutagenesis and gene synthesis"
)]
struct Cli {
    /// Write log messages to this file as well as stderr.
    #[arg(long, global = true)]
    log_filepath: Option<PathBuf>,
    /// Only log warnings and errors.
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Design one forward/reverse primer pair per saturation site.
    Ssm(WorkflowArgs),
    /// Design a minimal primer set covering multi-site substitutions.
    Qclm(WorkflowArgs),
    /// Split a gene into overlapping fragments with oligo mixtures.
    Pas(WorkflowArgs),
    /// Reverse-translate an amino acid sequence into DNA.
    ReverseTranslate(ReverseTranslateArgs),
    /// List the built-in codon-usage organisms.
    Organisms,
}

#[derive(clap::Args)]
struct WorkflowArgs {
    /// Input request as a JSON file.
    #[arg(short = 'i', long)]
    input: PathBuf,
    /// Output JSON file, stdout if omitted.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Random seed; defaults to a hash of the input path.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(clap::Args)]
struct ReverseTranslateArgs {
    /// Amino acid sequence, IUPAC one-letter codes.
    #[arg(short = 's', long)]
    sequence: String,
    #[arg(long, default_value = "e-coli")]
    organism: String,
    #[arg(long, default_value_t = 40.0)]
    min_gc: f64,
    #[arg(long, default_value_t = 60.0)]
    max_gc: f64,
    /// Codon usage threshold below which codons are not sampled.
    #[arg(long, default_value_t = 0.1)]
    usage_threshold: f64,
    /// Motif names or IUPAC patterns to avoid, may repeat.
    #[arg(long = "avoid")]
    avoided_motifs: Vec<String>,
    #[arg(long)]
    seed: Option<u64>,
}

fn setup_logging(
    quiet: bool,
    log_filepath: Option<&PathBuf>,
) -> anyhow::Result<()> {
    let level =
        if quiet { LevelFilter::Warn } else { LevelFilter::Info };
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("> {m}{n}")))
        .build();
    let mut config_builder = Config::builder().appender(
        Appender::builder().build("stderr", Box::new(console)),
    );
    let mut root_builder = Root::builder().appender("stderr");
    if let Some(fp) = log_filepath {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(
                "[{d(%Y-%m-%d %H:%M:%S)}] [{l}] {m}{n}",
            )))
            .build(fp)
            .with_context(|| {
                format!("failed to open log file {fp:?}")
            })?;
        config_builder = config_builder.appender(
            Appender::builder().build("logfile", Box::new(logfile)),
        );
        root_builder = root_builder.appender("logfile");
    }
    let config = config_builder.build(root_builder.build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn task_rng(seed: Option<u64>, input: &PathBuf) -> StdRng {
    let seed = seed.unwrap_or_else(|| {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        hasher.finish()
    });
    info!("random seed {seed}");
    StdRng::seed_from_u64(seed)
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed}")
            .unwrap(),
    );
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

fn read_input<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input {path:?}"))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse input {path:?}"))
}

fn write_output<T: serde::Serialize>(
    output: Option<&PathBuf>,
    value: &T,
) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("failed to write {path:?}"))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.quiet, cli.log_filepath.as_ref())?;

    match cli.command {
        Commands::Ssm(args) => {
            let input: SsmInput = read_input(&args.input)?;
            let bar = spinner("designing SSM primers");
            let output = ssm_solve(&input)?;
            bar.finish_and_clear();
            info!("designed primers for {} mutations", output.results.len());
            write_output(args.output.as_ref(), &output)?;
        }
        Commands::Qclm(args) => {
            let input: QclmInput = read_input(&args.input)?;
            let mut rng = task_rng(args.seed, &args.input);
            let bar = spinner("designing QCLM primers");
            let output = qclm_solve(&input, &mut rng)?;
            bar.finish_and_clear();
            info!(
                "mutation coverage {:.1}%",
                output.mutation_coverage * 100.0
            );
            write_output(args.output.as_ref(), &output)?;
        }
        Commands::Pas(args) => {
            let input: PasInput = read_input(&args.input)?;
            let mut rng = task_rng(args.seed, &args.input);
            let bar = spinner("optimising PAS fragments");
            let output = pas_solve(&input, &mut rng)?;
            bar.finish_and_clear();
            match &output.message {
                Some(message) => log::error!("{message}"),
                None => info!(
                    "split the gene into {} fragments",
                    output.results.len()
                ),
            }
            write_output(args.output.as_ref(), &output)?;
        }
        Commands::ReverseTranslate(args) => {
            let translator = Translator::new(
                args.usage_threshold,
                (args.min_gc, args.max_gc),
                &args.avoided_motifs,
                0.05,
                600,
                &args.organism,
            )?;
            let mut rng = StdRng::seed_from_u64(args.seed.unwrap_or(42));
            let dna = translator.translate(&args.sequence, &mut rng)?;
            println!("{dna}");
        }
        Commands::Organisms => {
            let organisms = CodonUsage::organisms();
            println!("{}", serde_json::to_string_pretty(&organisms)?);
        }
    }
    Ok(())
}
