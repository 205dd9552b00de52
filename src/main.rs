use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nuaa_audit::cli::{self, Cli, Commands};
use nuaa_audit::config::audit_config::AuditConfig;
use nuaa_audit::core::errors::Result;

fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let result = load_config(&args).and_then(|config| run(&args, &config));

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "nuaa_audit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Cli) -> Result<AuditConfig> {
    let mut config = AuditConfig::load(args.config.as_deref().map(Path::new))?;
    if let Some(dir) = &args.dir {
        config.audit_dir = PathBuf::from(dir);
    }
    Ok(config)
}

fn run(args: &Cli, config: &AuditConfig) -> Result<()> {
    match &args.command {
        Commands::Record(record) => cli::commands::record::execute(config, record),
        Commands::Query(query) => cli::commands::query::execute(config, query),
        Commands::Report { since, until } => {
            cli::commands::report::execute(config, since.as_deref(), until.as_deref())
        }
        Commands::Verify { file, all } => {
            cli::commands::verify::execute(config, file.as_deref(), *all)
        }
        Commands::Export {
            format,
            output,
            all,
        } => cli::commands::export::execute(config, *format, output, *all),
        Commands::Config => cli::commands::config::execute(config),
    }
}
