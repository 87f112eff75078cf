use astro_portals::config::{Command, ReportFormat, ScanArgs, SweepArgs, TransformArgs};
use astro_portals::config::toml_config::LogFormat;
use astro_portals::core::{grammar, walker};
use astro_portals::domain::model::{InjectStage, SessionKind};
use astro_portals::domain::ports::{ScriptInjector, Storage};
use astro_portals::utils::error::ErrorSeverity;
use astro_portals::utils::validation::{resolve_output_dir, Validate};
use astro_portals::utils::logger;
use astro_portals::{
    CliConfig, LocalStorage, PortalError, PortalsConfig, SweepOptions, SweepProcessor,
    TransformHook,
};
use clap::Parser;
use std::path::{Path, PathBuf};

const FALLBACK_SCRIPT_NAME: &str = "portal-fallback.js";

/// Collects injected scripts so they can be written next to the transformed files.
#[derive(Default)]
struct FileInjector {
    scripts: Vec<String>,
}

impl ScriptInjector for FileInjector {
    fn inject_script(&mut self, _stage: InjectStage, content: &str) {
        self.scripts.push(content.to_string());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    let mut config = match &cli.config {
        Some(path) => match PortalsConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => PortalsConfig::default(),
    };
    cli.apply_overrides(&mut config);

    match config.logging.format {
        LogFormat::Compact => logger::init_cli_logger(config.logging.verbose),
        LogFormat::Json => logger::init_json_logger(config.logging.verbose),
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let outcome = match &cli.command {
        Command::Sweep(args) => run_sweep(args, &config).await,
        Command::Scan(args) => run_scan(args).await,
        Command::Transform(args) => run_transform(args, &config).await,
    };

    if let Err(e) = outcome {
        match e.downcast_ref::<PortalError>() {
            Some(portal_error) => {
                tracing::error!(
                    "❌ {} (Category: {:?}, Severity: {:?})",
                    portal_error,
                    portal_error.category(),
                    portal_error.severity()
                );
                eprintln!("❌ {}", portal_error.user_friendly_message());
                eprintln!("💡 Suggestion: {}", portal_error.recovery_suggestion());

                let exit_code = match portal_error.severity() {
                    ErrorSeverity::Low => 0,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                };
                if exit_code > 0 {
                    std::process::exit(exit_code);
                }
            }
            None => {
                tracing::error!("❌ {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_sweep(args: &SweepArgs, config: &PortalsConfig) -> anyhow::Result<()> {
    let root = resolve_output_dir(&args.dir)?;
    let processor = SweepProcessor::new(LocalStorage::default(), SweepOptions::from_config(config));

    let report = processor.sweep(&root).await?;

    match args.report {
        Some(ReportFormat::Json) => println!("{}", report.to_json()?),
        None => {
            let verb = if report.dry_run { "would change" } else { "changed" };
            println!(
                "✅ {} file(s) scanned, {} {}, {} failed",
                report.files_scanned,
                report.changed.len(),
                verb,
                report.failures.len()
            );
        }
    }

    // Per-file failures never fail the build, but a CLI caller should see them.
    if !report.is_clean() {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_scan(args: &ScanArgs) -> anyhow::Result<()> {
    let text = LocalStorage::default().read_text(Path::new(&args.file)).await?;
    let result = grammar::scan(&text);
    let json = serde_json::to_string_pretty(&result).map_err(PortalError::from)?;
    println!("{}", json);
    Ok(())
}

async fn run_transform(args: &TransformArgs, config: &PortalsConfig) -> anyhow::Result<()> {
    let storage = LocalStorage::default();
    let out_dir = PathBuf::from(&args.out_dir);
    let mut hook = TransformHook::from_config(&config.transform, &config.live);
    let mut injector = FileInjector::default();

    let session = if args.dev { SessionKind::Dev } else { SessionKind::Build };
    hook.begin_session(session, &mut injector);

    let sources: Vec<PathBuf> = args.files.iter().map(PathBuf::from).collect();
    // Sources keep their layout under the output directory, so same-named files never collide.
    let targets = walker::output_paths(&sources, &out_dir)?;

    for ((file, path), target) in args.files.iter().zip(&sources).zip(&targets) {
        let code = storage.read_text(path).await?;

        let output = match hook.transform(file, &code) {
            Some(output) => {
                tracing::info!("Rewrote {}", file);
                output.code
            }
            None => code,
        };
        storage.write_text(target, &output).await?;
    }

    if let Some(script) = injector.scripts.first() {
        storage
            .write_text(&out_dir.join(FALLBACK_SCRIPT_NAME), script)
            .await?;
    }

    let summary = hook.end_session();
    println!("{}", summary.to_json()?);
    Ok(())
}
