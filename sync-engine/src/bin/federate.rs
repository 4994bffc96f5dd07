//! Perform one federated social action from the command line.
//!
//! Settings come from `FEDSYNC_*` environment variables and config files,
//! with flags taking precedence. The action report is printed as JSON on
//! stdout; structured logs go to stderr.

use std::ffi::OsString;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use reqwest::Url;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use sync_engine::config::SyncSettings;
use sync_engine::domain::cache::{CacheRegistry, OptimisticCacheController};
use sync_engine::domain::ports::PassthroughFeedFilter;
use sync_engine::domain::{
    ActionIntent, ActionKind, FederatedWriteAgent, LoginCredentials, OwnerId, RecordKeyGenerator,
    RemoteRepositoryClient, SessionManager, SocialActionService, SubjectDraft,
};
use sync_engine::outbound::persistence::{
    DbPool, DieselMirrorStore, DieselSessionStore, PoolConfig, apply_migrations,
};
use sync_engine::outbound::xrpc::XrpcRemoteRepository;

const PASSWORD_ENV: &str = "FEDSYNC_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "federate", about = "Write one social action to a remote repository", version)]
struct CliArgs {
    /// Local user performing the action.
    #[arg(long, value_name = "uuid")]
    owner: String,
    /// Personal data server URL. Overrides `FEDSYNC_PDS_URL`.
    #[arg(long, value_name = "url")]
    pds_url: Option<String>,
    /// Mirror database URL. Overrides `FEDSYNC_DATABASE_URL`.
    #[arg(long, value_name = "url")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a session; the password is read from `FEDSYNC_PASSWORD`.
    Login { identifier: String },
    /// Destroy the stored session.
    Logout,
    Like { uri: String, cid: String },
    Unlike { uri: String },
    Repost { uri: String, cid: String },
    Unrepost { uri: String },
    Follow { did: String },
    Unfollow { did: String },
    Post { text: String },
    Reply {
        text: String,
        #[arg(long)]
        parent_uri: String,
        #[arg(long)]
        parent_cid: String,
        /// Thread root; defaults to the parent.
        #[arg(long, requires = "root_cid")]
        root_uri: Option<String>,
        #[arg(long, requires = "root_uri")]
        root_cid: Option<String>,
    },
    Quote {
        text: String,
        #[arg(long)]
        uri: String,
        #[arg(long)]
        cid: String,
    },
    /// Delete one of the owner's own posts.
    Delete { uri: String },
}

impl Command {
    fn into_intent(self, owner_id: OwnerId) -> Option<ActionIntent> {
        let intent = match self {
            Self::Login { .. } | Self::Logout => return None,
            Self::Like { uri, cid } => ActionIntent::new(owner_id, ActionKind::Like)
                .with_subject(SubjectDraft::strong(uri, cid)),
            Self::Unlike { uri } => {
                ActionIntent::new(owner_id, ActionKind::Unlike).with_subject(SubjectDraft::uri(uri))
            }
            Self::Repost { uri, cid } => ActionIntent::new(owner_id, ActionKind::Repost)
                .with_subject(SubjectDraft::strong(uri, cid)),
            Self::Unrepost { uri } => ActionIntent::new(owner_id, ActionKind::Unrepost)
                .with_subject(SubjectDraft::uri(uri)),
            Self::Follow { did } => ActionIntent::new(owner_id, ActionKind::Follow).with_actor(did),
            Self::Unfollow { did } => {
                ActionIntent::new(owner_id, ActionKind::Unfollow).with_actor(did)
            }
            Self::Post { text } => ActionIntent::new(owner_id, ActionKind::Post).with_text(text),
            Self::Reply {
                text,
                parent_uri,
                parent_cid,
                root_uri,
                root_cid,
            } => {
                let parent = SubjectDraft::strong(parent_uri, parent_cid);
                let root = match (root_uri, root_cid) {
                    (Some(uri), Some(cid)) => SubjectDraft::strong(uri, cid),
                    _ => parent.clone(),
                };
                ActionIntent::new(owner_id, ActionKind::Reply)
                    .with_text(text)
                    .with_reply(parent, root)
            }
            Self::Quote { text, uri, cid } => ActionIntent::new(owner_id, ActionKind::Quote)
                .with_text(text)
                .with_quote(SubjectDraft::strong(uri, cid)),
            Self::Delete { uri } => {
                ActionIntent::new(owner_id, ActionKind::Delete).with_subject(SubjectDraft::uri(uri))
            }
        };
        Some(intent)
    }
}

fn init_tracing() {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let args = CliArgs::parse();
    let settings = SyncSettings::load_from_iter([OsString::from("federate")])
        .wrap_err("failed to load FEDSYNC settings")?;
    let owner_id = OwnerId::new(&args.owner).wrap_err("--owner must be a UUID")?;

    let database_url = args
        .database_url
        .or_else(|| settings.database_url().map(str::to_owned))
        .ok_or_else(|| eyre!("a database URL is required (--database-url or FEDSYNC_DATABASE_URL)"))?;
    let pds_url = args
        .pds_url
        .unwrap_or_else(|| settings.pds_url().to_owned());
    let service = Url::parse(&pds_url).wrap_err_with(|| format!("invalid PDS URL {pds_url}"))?;

    let migration_url = database_url.clone();
    tokio::task::spawn_blocking(move || apply_migrations(&migration_url))
        .await
        .wrap_err("migration task panicked")??;
    let pool = DbPool::new(
        PoolConfig::new(&database_url).with_max_size(settings.pool_max_size()),
    )
    .await?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let remote = Arc::new(XrpcRemoteRepository::new(&service, settings.request_timeout())?);
    let sessions = Arc::new(SessionManager::new(
        remote.clone(),
        Arc::new(DieselSessionStore::new(pool.clone())),
        clock.clone(),
        settings.session_manager(),
    ));

    match &args.command {
        Command::Login { identifier } => {
            let password = std::env::var(PASSWORD_ENV)
                .wrap_err_with(|| format!("{PASSWORD_ENV} must hold the account password"))?;
            let credentials = LoginCredentials::try_from_parts(identifier, &password)?;
            let session = sessions.login(&owner_id, &credentials).await?;
            info!(owner_id = %owner_id, repository = %session.repository, "logged in");
            return Ok(());
        }
        Command::Logout => {
            sessions.logout(&owner_id).await?;
            info!(owner_id = %owner_id, "logged out");
            return Ok(());
        }
        _ => {}
    }

    let client = Arc::new(RemoteRepositoryClient::new(
        remote,
        sessions.clone(),
        settings.request_timeout(),
    ));
    let agent = Arc::new(FederatedWriteAgent::new(
        sessions,
        client,
        Arc::new(DieselMirrorStore::new(pool)),
        Arc::new(RecordKeyGenerator::new(clock.clone())),
        clock,
    ));
    let registry = Arc::new(CacheRegistry::new(Arc::new(PassthroughFeedFilter)));
    let actions = SocialActionService::new(agent, Arc::new(OptimisticCacheController::new(registry)));

    let intent = args
        .command
        .into_intent(owner_id)
        .ok_or_else(|| eyre!("command does not describe an action"))?;
    let report = actions.perform(&intent).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_success() {
        Ok(())
    } else {
        Err(eyre!("action did not complete"))
    }
}
