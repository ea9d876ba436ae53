use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dbx_access_sync::assignments::list_workspace_assignments;
use dbx_access_sync::databricks::{AccountClient, AuthConfig, WorkspaceClient};
use dbx_access_sync::ip_access::{ip_access_enabled, set_ip_access_enabled, IP_ACCESS_LISTS_KEY};
use dbx_access_sync::utils::CONFIG_FILE;
use dbx_access_sync::{
    read_config, run_export, run_sync, run_validate, AccessDomain, EntitlementsDomain,
    GroupsDomain, IpAccessDomain, SyncOptions, Validation,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Reconcile Databricks groups, entitlements and IP access lists with CSV files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "DBX_SYNC_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Plan and export without changing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Report validation mismatches without failing
    #[arg(long, global = true)]
    non_strict: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    /// Workspace URL
    #[arg(long, global = true, env = "DATABRICKS_HOST")]
    host: Option<String>,

    /// Account console URL
    #[arg(long, global = true, env = "DATABRICKS_ACCOUNT_HOST")]
    account_host: Option<String>,

    #[arg(long, global = true, env = "DATABRICKS_ACCOUNT_ID")]
    account_id: Option<String>,

    /// OAuth client id of the service principal
    #[arg(long, global = true, env = "DATABRICKS_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, global = true, env = "DATABRICKS_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Secret used against the account console; defaults to the client secret
    #[arg(long, global = true, env = "DATABRICKS_ACCOUNT_SECRET", hide_env_values = true)]
    account_secret: Option<String>,

    /// Static bearer token instead of OAuth client credentials
    #[arg(long, global = true, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip workspace id discovery
    #[arg(long, global = true, env = "DATABRICKS_WORKSPACE_ID")]
    workspace_id: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Workspace group assignment
    Groups {
        #[command(subcommand)]
        action: Action,
    },
    /// Group entitlements and workspace admin
    Entitlements {
        #[command(subcommand)]
        action: Action,
    },
    /// IP access lists
    IpLists {
        #[command(subcommand)]
        action: Action,
    },
    /// IP access list enforcement switch
    IpAccessFeature {
        #[command(subcommand)]
        action: FeatureAction,
    },
    /// List the workspace's permission assignments
    Assignments,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Action {
    /// Apply the CSV, export the result and validate
    Sync,
    /// Export the remote state to CSV
    Export,
    /// Compare the CSV with the remote state
    Validate,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum FeatureAction {
    Status,
    Enable,
    Disable,
}

impl ConnectionArgs {
    fn workspace_client(&self, timeout: Duration) -> anyhow::Result<Arc<WorkspaceClient>> {
        let Some(host) = self.host.as_deref() else {
            bail!("DATABRICKS_HOST is not set");
        };

        let auth = match (&self.token, &self.client_id, &self.client_secret) {
            (Some(token), _, _) => AuthConfig::Token(token.clone()),
            (None, Some(client_id), Some(client_secret)) => AuthConfig::OAuth {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                token_url: WorkspaceClient::token_url(host),
            },
            _ => bail!("Set DATABRICKS_CLIENT_ID and DATABRICKS_CLIENT_SECRET, or DATABRICKS_TOKEN"),
        };

        let client = WorkspaceClient::new(host, auth, timeout)
            .context("Failed to create workspace client")?
            .with_workspace_id(self.workspace_id);
        Ok(Arc::new(client))
    }

    fn account_client(&self, timeout: Duration) -> anyhow::Result<Arc<AccountClient>> {
        let (Some(host), Some(account_id)) = (self.account_host.as_deref(), self.account_id.as_deref())
        else {
            bail!("DATABRICKS_ACCOUNT_HOST and DATABRICKS_ACCOUNT_ID must be set");
        };

        let secret = self.account_secret.as_ref().or(self.client_secret.as_ref());
        let auth = match (&self.client_id, secret, &self.token) {
            (Some(client_id), Some(secret), _) => AuthConfig::OAuth {
                client_id: client_id.clone(),
                client_secret: secret.clone(),
                token_url: AccountClient::token_url(host, account_id),
            },
            (_, _, Some(token)) => AuthConfig::Token(token.clone()),
            _ => bail!("Set DATABRICKS_CLIENT_ID and DATABRICKS_ACCOUNT_SECRET for the account console"),
        };

        let client = AccountClient::new(host, account_id, auth, timeout)
            .context("Failed to create account client")?;
        Ok(Arc::new(client))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` means a strict validation failure
async fn run(args: Args) -> anyhow::Result<bool> {
    let config = read_config(&args.config)
        .await
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let strict = config.strict_run(args.non_strict);
    let timeout = Duration::from_secs(config.timeout_secs);
    let options = SyncOptions {
        dry_run: args.dry_run,
    };
    let connection = &args.connection;

    match args.command {
        Command::Groups { action } => {
            let domain = GroupsDomain::new(
                connection.workspace_client(timeout)?,
                connection.account_client(timeout)?,
                config.groups,
                config.excluded_groups,
            );
            run_action(&domain, action, options, strict).await
        }
        Command::Entitlements { action } => {
            let domain = EntitlementsDomain::new(
                connection.workspace_client(timeout)?,
                connection.account_client(timeout)?,
                config.entitlements,
                config.excluded_groups,
            );
            run_action(&domain, action, options, strict).await
        }
        Command::IpLists { action } => {
            let domain = IpAccessDomain::new(
                connection.workspace_client(timeout)?,
                config.ip_lists,
                config.ip_list_type,
            );
            run_action(&domain, action, options, strict).await
        }
        Command::IpAccessFeature { action } => {
            let workspace = connection.workspace_client(timeout)?;
            match action {
                FeatureAction::Status => {
                    let enabled = ip_access_enabled(workspace.as_ref()).await?;
                    println!("{}={}", IP_ACCESS_LISTS_KEY, enabled);
                }
                FeatureAction::Enable | FeatureAction::Disable if args.dry_run => {
                    info!(?action, "Dry run; workspace setting left unchanged");
                }
                FeatureAction::Enable => set_ip_access_enabled(workspace.as_ref(), true).await?,
                FeatureAction::Disable => set_ip_access_enabled(workspace.as_ref(), false).await?,
            }
            Ok(true)
        }
        Command::Assignments => {
            let workspace = connection.workspace_client(timeout)?;
            let account = connection.account_client(timeout)?;
            for entry in list_workspace_assignments(workspace.as_ref(), account.as_ref()).await? {
                let permissions: Vec<String> = entry.permissions.iter().map(|p| p.to_string()).collect();
                println!("{}\t{}\t{}", entry.principal_id, entry.name, permissions.join(","));
            }
            Ok(true)
        }
    }
}

async fn run_action(
    domain: &dyn AccessDomain,
    action: Action,
    options: SyncOptions,
    strict: bool,
) -> anyhow::Result<bool> {
    match action {
        Action::Sync => {
            let outcome = run_sync(domain, options).await?;
            info!(
                domain = domain.name(),
                created = outcome.result.created.len(),
                updated = outcome.result.updated.len(),
                skipped = outcome.result.skipped.len(),
                report = %outcome.report_path.display(),
                "Sync finished"
            );
            Ok(accept(domain.name(), &outcome.validation, strict, options.dry_run))
        }
        Action::Export => {
            let outcome = run_export(domain).await?;
            info!(
                domain = domain.name(),
                path = %outcome.export.path.display(),
                rows = outcome.export.rows,
                sha256 = %outcome.export.sha256,
                "Export finished"
            );
            Ok(true)
        }
        Action::Validate => {
            let validation = run_validate(domain).await?;
            Ok(accept(domain.name(), &validation, strict, false))
        }
    }
}

fn accept(domain: &str, validation: &Validation, strict: bool, dry_run: bool) -> bool {
    let passes = validation.passes(strict, dry_run);
    if validation.matched {
        return passes;
    }
    if passes {
        warn!(domain, strict, dry_run, "Validation failed; not failing the run");
    } else {
        error!(domain, "Validation failed");
    }
    passes
}
