pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::sweep::SweepPhases;
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use self::toml_config::{LogFormat, PortalsConfig};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "astro-portals")]
#[command(about = "Relocate portal content into outlets across built documents")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Relocate portals across every built document under a directory
    Sweep(SweepArgs),
    /// Print the portal and outlet markers found in one file
    Scan(ScanArgs),
    /// Run one streaming session over source files, in the order given
    Transform(TransformArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct SweepArgs {
    /// Output directory, as a path or a file:// URL
    pub dir: String,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum)]
    pub phases: Option<PhasesArg>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Extensions to sweep, comma separated
    #[arg(long, value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Print the sweep report to stdout
    #[arg(long, value_enum)]
    pub report: Option<ReportFormat>,

    #[arg(long, help = "Log memory and timing per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    pub file: String,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct TransformArgs {
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Where rewritten files are written
    #[arg(long)]
    pub out_dir: String,

    /// Run as a dev session and write the live fallback script next to the output
    #[arg(long)]
    pub dev: bool,

    /// Outlets only see portals from files transformed earlier
    #[arg(long)]
    pub prior_only: bool,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhasesArg {
    TwoPhase,
    FileOrder,
}

#[cfg(feature = "cli")]
impl From<PhasesArg> for SweepPhases {
    fn from(value: PhasesArg) -> Self {
        match value {
            PhasesArg::TwoPhase => SweepPhases::TwoPhase,
            PhasesArg::FileOrder => SweepPhases::FileOrder,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Command line flags win over the configuration file.
    pub fn apply_overrides(&self, config: &mut PortalsConfig) {
        if self.verbose {
            config.logging.verbose = true;
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }

        match &self.command {
            Command::Sweep(args) => {
                if args.dry_run {
                    config.sweep.dry_run = true;
                }
                if let Some(phases) = args.phases {
                    config.sweep.phases = phases.into();
                }
                if let Some(concurrency) = args.concurrency {
                    config.sweep.concurrency = concurrency;
                }
                if !args.extensions.is_empty() {
                    config.sweep.extensions = args.extensions.clone();
                }
                if args.monitor {
                    config.monitoring.enabled = true;
                }
            }
            Command::Transform(args) => {
                if args.prior_only {
                    config.transform.own_fragments =
                        crate::core::relocator::RelocateMode::PriorOnly;
                }
            }
            Command::Scan(_) => {}
        }
    }
}
