use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use basecaller::config::ConfigFile;
use basecaller::emit::{write_fasta, write_summary_json, write_tsv};
use basecaller::genomics::{write_statistics, BamAlignmentSource, StatisticsSettings};
use basecaller::{
    position_statistics, CallerConfig, ConsensusEngine, ConsensusError, ConsensusRun,
    ExecutionOptions, RegionSpec,
};
use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "basecaller", about = "Bias-weighted consensus base calling from BAM pileups")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call a consensus base at every position of a region.
    Call(CallArgs),
    /// Report per-base statistics at a region of a BAM file.
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Coordinate-sorted, indexed BAM file.
    bam: PathBuf,
    /// Region as REFERENCE[:START[-STOP]] (default: every reference).
    #[arg(long, short)]
    region: Option<RegionSpec>,
    /// JSON config file with a `base_caller` section.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Minimum base quality.
    #[arg(long)]
    minbq: Option<u8>,
    /// Maximum depth considered per position.
    #[arg(long)]
    maxd: Option<u32>,
    /// Depth below which a position is called N.
    #[arg(long)]
    mind: Option<u32>,
    /// Fraction of weighted evidence for an unambiguous call.
    #[arg(long)]
    minth: Option<f64>,
    /// Base quality at which bias weighting applies.
    #[arg(long)]
    biasth: Option<u8>,
    /// Weight of a base at or above the bias threshold.
    #[arg(long)]
    bias: Option<u32>,
    /// Minimum mapping quality of contributing reads.
    #[arg(long)]
    minmq: Option<u8>,
    /// Worker threads (1 evaluates serially).
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Columns per parallel batch.
    #[arg(long, default_value_t = 4096)]
    batch_size: usize,
    /// Per-position TSV report (default: stdout).
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Consensus FASTA output.
    #[arg(long)]
    fasta: Option<PathBuf>,
    /// Sample name for FASTA headers.
    #[arg(long)]
    sample: Option<String>,
    /// JSON run summary output.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Coordinate-sorted, indexed BAM file.
    bam: PathBuf,
    /// Region as REFERENCE:START-STOP, e.g. Den1Reference:1046-1046.
    region: RegionSpec,
    /// Minimum mapping quality of contributing reads.
    #[arg(long = "min-mapping-qual", visible_alias = "mmq", default_value_t = 25)]
    minmq: u8,
    /// Minimum base quality of contributing bases.
    #[arg(long = "min-base-qual", visible_alias = "mbq", default_value_t = 25)]
    minbq: u8,
    /// Maximum depth counted per position.
    #[arg(long = "max-depth", short = 'm', default_value_t = 100_000)]
    maxd: u32,
    /// Emit one JSON object per position instead of the text report.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Call(args) => run_call(args)?,
        Commands::Stats(args) => run_stats(args)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn build_config(args: &CallArgs) -> Result<CallerConfig> {
    let mut builder = CallerConfig::builder();
    if let Some(path) = &args.config {
        let file = ConfigFile::load(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        builder = builder.apply_section(&file.base_caller)?;
    }
    if let Some(region) = &args.region {
        builder = builder.region(Some(region.clone()));
    }
    if let Some(value) = args.minbq {
        builder = builder.min_base_quality(value);
    }
    if let Some(value) = args.maxd {
        builder = builder.max_depth(value);
    }
    if let Some(value) = args.mind {
        builder = builder.min_depth(value);
    }
    if let Some(value) = args.minth {
        builder = builder.min_consensus_fraction(value);
    }
    if let Some(value) = args.biasth {
        builder = builder.bias_quality_threshold(value);
    }
    if let Some(value) = args.bias {
        builder = builder.bias_factor(value);
    }
    if let Some(value) = args.minmq {
        builder = builder.min_mapping_quality(value);
    }
    builder.build().context("invalid caller configuration")
}

fn run_call(args: CallArgs) -> Result<()> {
    let config = build_config(&args)?;
    let options = ExecutionOptions::parallel(args.threads).with_batch_size(args.batch_size);
    let mut source = BamAlignmentSource::open(&args.bam)
        .with_context(|| format!("failed to open BAM file {}", args.bam.display()))?;

    let engine = ConsensusEngine::new(config).with_execution(options);
    match engine.run(&mut source) {
        Ok(run) => write_outputs(&args, &run),
        Err(ConsensusError::Stream { source, partial }) => {
            warn!(positions = partial.summary.positions, "writing partial output");
            write_outputs(&args, &partial)?;
            Err(source).context("alignment stream failed; output is incomplete")
        }
        Err(err) => Err(err).context("consensus run failed"),
    }
}

fn write_outputs(args: &CallArgs, run: &ConsensusRun) -> Result<()> {
    match &args.output {
        Some(path) => {
            let mut writer = create(path)?;
            write_tsv(&mut writer, run)
                .with_context(|| format!("failed to write report {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_tsv(&mut writer, run).context("failed to write report to stdout")?;
        }
    }

    if let Some(path) = &args.fasta {
        let mut writer = create(path)?;
        write_fasta(&mut writer, run, args.sample.as_deref())
            .with_context(|| format!("failed to write consensus {}", path.display()))?;
    }

    if let Some(path) = &args.summary {
        let mut writer = create(path)?;
        write_summary_json(&mut writer, &run.summary)
            .with_context(|| format!("failed to write summary {}", path.display()))?;
    }

    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn run_stats(args: StatsArgs) -> Result<()> {
    let settings = StatisticsSettings {
        min_mapping_quality: args.minmq,
        min_base_quality: args.minbq,
        max_depth: args.maxd,
    };
    let mut source = BamAlignmentSource::open(&args.bam)
        .with_context(|| format!("failed to open BAM file {}", args.bam.display()))?;
    let columns = position_statistics(&mut source, &args.region, settings)
        .with_context(|| format!("failed to gather statistics for {}", args.bam.display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut report = String::new();
    for column in columns {
        let column = column
            .with_context(|| format!("failed to gather statistics for {}", args.bam.display()))?;
        if args.json {
            serde_json::to_writer(&mut out, &column).context("failed to write statistics")?;
            writeln!(out)?;
        } else {
            report.clear();
            write_statistics(&mut report, &settings, &column)?;
            out.write_all(report.as_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}
