//! Publish orchestrator.
//!
//! Sequences one pass:
//! `Idle -> FetchingCredentials -> ResolvingScope -> Diffing -> Applying -> TriggeringBuild -> Done`.
//! Any failure after leaving `Idle` moves the pass to `Failed`. A dry run
//! stops after `Diffing`.
//!
//! The orchestrator does not serialize passes. Callers must not run two
//! passes against the same destination at the same time.

use std::fmt;
use std::sync::Arc;

use mixa_publish_core::{
    path, DiffResult, FileTree, PublishError, SiteApi, StoreConnector, SyncConfig,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::apply::{ApplyReport, SyncApplier};
use crate::diff::DiffEngine;
use crate::scope::ScopeResolver;

pub const INVALID_TOKEN_MESSAGE: &str =
    "Please add a valid Secret Token. You can find it in your Mixa Dashboard";
pub const EMPTY_CREDENTIALS_MESSAGE: &str =
    "Could not upload the files due to an unknown error, please contact support@mixa.site";

/// Where a pass currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    FetchingCredentials,
    ResolvingScope,
    Diffing,
    Applying,
    TriggeringBuild,
    Done,
    Failed,
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishState::Idle => "idle",
            PublishState::FetchingCredentials => "fetching credentials",
            PublishState::ResolvingScope => "resolving scope",
            PublishState::Diffing => "diffing",
            PublishState::Applying => "applying",
            PublishState::TriggeringBuild => "triggering build",
            PublishState::Done => "done",
            PublishState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Concurrency knobs for a pass.
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    pub scan_concurrency: usize,
    pub apply_concurrency: usize,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            scan_concurrency: 16,
            apply_concurrency: 8,
        }
    }
}

/// Outcome of a successful pass.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub diff: DiffResult,
    pub dry_run: bool,
    /// What was applied; `None` for a dry run.
    pub applied: Option<ApplyReport>,
}

/// Runs publish passes against injected collaborators.
pub struct Publisher {
    api: Arc<dyn SiteApi>,
    tree: Arc<dyn FileTree>,
    connector: Arc<dyn StoreConnector>,
    options: PublishOptions,
    state: watch::Sender<PublishState>,
}

impl Publisher {
    pub fn new(
        api: Arc<dyn SiteApi>,
        tree: Arc<dyn FileTree>,
        connector: Arc<dyn StoreConnector>,
    ) -> Self {
        let (state, _) = watch::channel(PublishState::Idle);
        Self {
            api,
            tree,
            connector,
            options: PublishOptions::default(),
            state,
        }
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> PublishState {
        *self.state.borrow()
    }

    /// Watch state transitions of this publisher's passes.
    pub fn subscribe(&self) -> watch::Receiver<PublishState> {
        self.state.subscribe()
    }

    /// Compute the diff without applying it or triggering a build.
    pub async fn preview(
        &self,
        secret_token: &str,
        config: &SyncConfig,
    ) -> Result<PublishReport, PublishError> {
        self.run(secret_token, config, true).await
    }

    /// Sync the site and trigger a remote build.
    pub async fn publish(
        &self,
        secret_token: &str,
        config: &SyncConfig,
    ) -> Result<PublishReport, PublishError> {
        self.run(secret_token, config, false).await
    }

    async fn run(
        &self,
        secret_token: &str,
        config: &SyncConfig,
        dry_run: bool,
    ) -> Result<PublishReport, PublishError> {
        self.transition(PublishState::Idle);
        self.check_ready(secret_token, config).await?;

        match self.run_pass(secret_token, config, dry_run).await {
            Ok(report) => {
                self.transition(PublishState::Done);
                Ok(report)
            }
            Err(e) => {
                warn!("Publish pass failed in state {}: {}", self.state(), e);
                self.transition(PublishState::Failed);
                Err(e)
            }
        }
    }

    /// Guards for leaving `Idle`. Nothing remote is contacted when they fail.
    async fn check_ready(&self, secret_token: &str, config: &SyncConfig) -> Result<(), PublishError> {
        if secret_token.trim().is_empty() || config.destination_prefix.is_empty() {
            return Err(PublishError::Configuration(INVALID_TOKEN_MESSAGE.to_string()));
        }
        self.check_site_root(config).await
    }

    /// The tree must be rooted at the configured root, and both the root and
    /// the site folder must exist in it.
    async fn check_site_root(&self, config: &SyncConfig) -> Result<(), PublishError> {
        if self.tree.root() != config.root() {
            return Err(PublishError::Configuration(format!(
                "Local root {} is not the tree being published ({})",
                config.root().display(),
                self.tree.root().display()
            )));
        }
        if !self.tree.exists("").await || !self.tree.exists(&config.site_folder).await {
            return Err(PublishError::Configuration(format!(
                "Site folder you specified does not exist: {}",
                config.site_folder
            )));
        }
        Ok(())
    }

    async fn run_pass(
        &self,
        secret_token: &str,
        config: &SyncConfig,
        dry_run: bool,
    ) -> Result<PublishReport, PublishError> {
        self.transition(PublishState::FetchingCredentials);
        let credentials = self.api.fetch_credentials(secret_token).await?;
        if credentials.is_empty() {
            return Err(PublishError::Credential(EMPTY_CREDENTIALS_MESSAGE.to_string()));
        }
        let store = self.connector.connect(&credentials).await?;

        self.transition(PublishState::ResolvingScope);
        let files = self.tree.list_files().await?;
        let eligible = ScopeResolver::new(self.tree.as_ref())
            .with_scan_concurrency(self.options.scan_concurrency)
            .resolve(files, config)
            .await;

        self.transition(PublishState::Diffing);
        let remote = store
            .list_objects(&path::listing_prefix(&config.destination_prefix))
            .await?;
        let plan = DiffEngine::new().plan(config, &eligible, &remote);

        if dry_run {
            info!(
                uploads = plan.diff.uploads.len(),
                deletions = plan.diff.deletions.len(),
                ignored = plan.diff.ignored.len(),
                "Dry run for {} complete",
                config.destination_prefix
            );
            return Ok(PublishReport {
                diff: plan.diff,
                dry_run: true,
                applied: None,
            });
        }

        self.check_site_root(config).await?;
        self.transition(PublishState::Applying);
        let applied = SyncApplier::new()
            .with_concurrency(self.options.apply_concurrency)
            .apply(&plan, self.tree.as_ref(), store.as_ref())
            .await?;

        self.transition(PublishState::TriggeringBuild);
        self.api.trigger_build(secret_token).await?;

        Ok(PublishReport {
            diff: plan.diff,
            dry_run: false,
            applied: Some(applied),
        })
    }

    fn transition(&self, next: PublishState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("Publish state {} -> {}", previous, next);
        }
    }
}
