use clap::Args;
use srcport_core::{
    DatabaseConfig, ImportConfig, ServiceError, ServiceResult, UuidNameGenerator,
    DEFAULT_FETCH_TIMEOUT_SECS,
};
use srcport_entities::entries;
use srcport_entities::types::EntryState;
use srcport_rpm::{SchemeFetcher, TrustedKeys};
use srcport_worker::{CreateEntryRequest, EntryService, ImportActivities, PreparedRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::forge_args::ForgeArgs;

/// Record an import, verify and identify its package, and prepare the
/// forge repository it will be pushed to
#[derive(Args)]
pub struct ImportCommand {
    /// Database connection URL
    #[arg(long, env = "SRCPORT_DATABASE_URL")]
    pub database_url: String,

    /// Location of the source package (`https://`, `file://` or `memory://`)
    #[arg(long)]
    pub uri: String,

    /// Expected SHA-256 of the package, hex encoded; empty skips the check
    #[arg(long, default_value = "")]
    pub checksum: String,

    /// Release the package belongs to, e.g. `Rocky Linux release 8.8 (Green Obsidian)`
    #[arg(long)]
    pub os_release: String,

    /// Repository the package was taken from
    #[arg(long)]
    pub repository: String,

    /// Worker recorded as having performed the import
    #[arg(long, env = "SRCPORT_WORKER_ID")]
    pub worker_id: String,

    /// Armored OpenPGP public key files packages must be signed with
    #[arg(
        long = "trusted-key-file",
        required = true,
        env = "SRCPORT_TRUSTED_KEY_FILES",
        value_delimiter = ','
    )]
    pub trusted_key_files: Vec<PathBuf>,

    /// Per-request timeout for package downloads, in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "SRCPORT_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    #[command(flatten)]
    pub forge: ForgeArgs,
}

impl ImportCommand {
    fn config(&self) -> anyhow::Result<ImportConfig> {
        Ok(ImportConfig {
            database: DatabaseConfig::new(self.database_url.clone()),
            forge: self.forge.settings()?,
            fetch_timeout_secs: self.fetch_timeout_secs,
            trusted_key_files: self.trusted_key_files.clone(),
        })
    }

    fn request(&self) -> CreateEntryRequest {
        CreateEntryRequest {
            rpm_uri: self.uri.clone(),
            os_release: self.os_release.clone(),
            checksum: self.checksum.clone(),
            repository: self.repository.clone(),
            worker_id: self.worker_id.clone(),
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.config()?;
        debug!("Starting with {:?}", config);
        let request = self.request();

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(run(config, request))
    }
}

fn load_trusted_keys(files: &[PathBuf]) -> anyhow::Result<TrustedKeys> {
    let mut armored = String::new();
    for file in files {
        let text = std::fs::read_to_string(file)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
        armored.push_str(&text);
        armored.push('\n');
    }
    TrustedKeys::from_armored(&armored)
        .map_err(|e| anyhow::anyhow!("Failed to load trusted keys: {}", e))
}

async fn run(config: ImportConfig, request: CreateEntryRequest) -> anyhow::Result<()> {
    let trusted_keys = load_trusted_keys(&config.trusted_key_files)?;
    info!("Loaded {} trusted signing keys", trusted_keys.key_count());

    let db = srcport_database::establish_connection(&config.database).await?;
    let forge = srcport_forge::build_forge(&config.forge)?;
    let fetcher = SchemeFetcher::with_defaults(Duration::from_secs(config.fetch_timeout_secs))?;

    let entries = EntryService::new(
        db,
        Arc::new(fetcher),
        Arc::new(trusted_keys),
        Arc::new(UuidNameGenerator),
    );
    let activities = ImportActivities::new(Arc::new(entries), forge);

    let (entry, prepared) = stage_import(&activities, request).await?;
    println!(
        "{} {} {}",
        entry.name,
        entry.entry_id.as_deref().unwrap_or_default(),
        prepared.remote_url
    );
    Ok(())
}

/// Run the activities that precede the push. An entry whose import can
/// never succeed is moved to `failed` before the error is returned.
async fn stage_import(
    activities: &ImportActivities,
    request: CreateEntryRequest,
) -> ServiceResult<(entries::Model, PreparedRepository)> {
    let uri = request.rpm_uri.clone();
    let checksum = request.checksum.clone();
    let entry = activities.create_entry(request).await?;

    match prepare(activities, &entry.name, &uri, &checksum).await {
        Ok(staged) => Ok(staged),
        Err(e) if !e.is_retryable() => {
            warn!("import {} failed: {}", entry.name, e);
            activities
                .set_entry_state(&entry.name, EntryState::Failed, None)
                .await?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn prepare(
    activities: &ImportActivities,
    name: &str,
    uri: &str,
    checksum: &str,
) -> ServiceResult<(entries::Model, PreparedRepository)> {
    let entry = activities.set_entry_id_from_rpm(name, uri, checksum).await?;
    let pkg = entry.package_name().ok_or_else(|| {
        ServiceError::InvalidPackage(format!("{:?} has no package name", entry.entry_id))
    })?;
    let prepared = activities.prepare_repository(pkg).await?;
    Ok((entry, prepared))
}
