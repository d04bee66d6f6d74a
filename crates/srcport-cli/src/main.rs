//! srcport CLI - entrypoint for the import worker
//!
//! Runs the worker heartbeat server, provisions worker credentials and
//! stages package imports.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ImportCommand, RegisterWorkerCommand, ServeCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "SRCPORT_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "SRCPORT_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the worker heartbeat server
    Serve(ServeCommand),
    /// Create a worker or rotate its secret
    RegisterWorker(RegisterWorkerCommand),
    /// Verify a source package and prepare its forge repository
    Import(ImportCommand),
}

fn build_filter(log_level: &str) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    // RUST_LOG wins when set
    if std::env::var("RUST_LOG").is_ok() {
        return tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e));
    }

    Ok(tracing_subscriber::EnvFilter::new(format!(
        "srcport={level},\
         srcport_cli={level},\
         srcport_core={level},\
         srcport_database={level},\
         srcport_entities={level},\
         srcport_migrations={level},\
         srcport_forge={level},\
         srcport_rpm={level},\
         srcport_worker={level},\
         sqlx=warn,\
         sea_orm=warn,\
         sea_orm_migration=warn,\
         h2=warn,\
         tower=warn,\
         hyper=warn,\
         reqwest=warn,\
         rustls=warn",
        level = log_level
    )))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = build_filter(&cli.log_level)?;
    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;

    match cli.command {
        Commands::Serve(serve_cmd) => serve_cmd.execute(),
        Commands::RegisterWorker(register_cmd) => register_cmd.execute(),
        Commands::Import(import_cmd) => import_cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_register_worker() {
        let cli = Cli::try_parse_from([
            "srcport",
            "--log-level",
            "debug",
            "register-worker",
            "--database-url",
            "sqlite::memory:",
            "--worker-id",
            "test-worker",
            "--secret",
            "hunter2",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::RegisterWorker(_)));
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "srcport",
            "import",
            "--database-url",
            "sqlite::memory:",
            "--uri",
            "https://dl.rockylinux.org/vault/rocky/8.8/BaseOS/source/tree/Packages/e/efi-rpm-macros-3-3.el8.src.rpm",
            "--os-release",
            "Rocky Linux release 8.8 (Green Obsidian)",
            "--repository",
            "BaseOS",
            "--worker-id",
            "test-worker",
            "--trusted-key-file",
            "/etc/pki/rpm-gpg/RPM-GPG-KEY-Rocky-8,/etc/pki/rpm-gpg/RPM-GPG-KEY-extra",
            "--forge",
            "memory",
        ])
        .unwrap();
        match cli.command {
            Commands::Import(cmd) => {
                assert_eq!(cmd.trusted_key_files.len(), 2);
                assert_eq!(cmd.checksum, "");
                assert!(matches!(
                    cmd.forge.forge,
                    commands::forge_args::ForgeKindArg::Memory
                ));
            }
            _ => panic!("expected import"),
        }
    }

    #[test]
    fn test_import_requires_trusted_keys() {
        let result = Cli::try_parse_from([
            "srcport",
            "import",
            "--database-url",
            "sqlite::memory:",
            "--uri",
            "memory://a.src.rpm",
            "--os-release",
            "Rocky Linux release 8.8 (Green Obsidian)",
            "--repository",
            "BaseOS",
            "--worker-id",
            "test-worker",
        ]);
        assert!(result.is_err());
    }
}
