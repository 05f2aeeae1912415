mod config;
mod report;
mod settings;

use std::sync::Arc;

use clap::Parser;
use mixa_publish_api::MixaApiClient;
use mixa_publish_core::SiteApi;
use mixa_publish_local::LocalFileTree;
use mixa_publish_s3::S3Connector;
use mixa_publish_sync::orchestrator::INVALID_TOKEN_MESSAGE;
use mixa_publish_sync::{PublishOptions, PublishReport, Publisher};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Command, Config};
use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize logging
    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(&config.vault).await?;

    match config.command.clone() {
        Command::Login { token } => login(&config, &mut settings, token).await,
        Command::Config {
            site_folder,
            publish_external,
        } => configure(&config, &mut settings, site_folder, publish_external).await,
        Command::Diff => {
            let report = run_pass(&config, &settings, true).await?;
            println!("{}", report::render_report(&report));
            Ok(())
        }
        Command::Publish => {
            match settings.site_host() {
                Some(host) => println!("Publishing to {}, hang tight...", host),
                None => println!("Publishing your site, hang tight..."),
            }
            let report = run_pass(&config, &settings, false).await?;
            println!("{}", report::render_report(&report));
            Ok(())
        }
        Command::Info => {
            if !settings.is_linked() {
                anyhow::bail!(INVALID_TOKEN_MESSAGE);
            }
            println!("Subdomain: {}", settings.subdomain);
            println!("Site:      {}", settings.site_url);
            println!("Edit:      {}", settings.site_edit_url);
            Ok(())
        }
    }
}

async fn login(
    config: &Config,
    settings: &mut Settings,
    token: Option<String>,
) -> anyhow::Result<()> {
    let token = token
        .or_else(|| config.token.clone())
        .unwrap_or_default()
        .trim()
        .to_string();
    settings.secret_token = token.clone();

    let api = MixaApiClient::with_base_url(&config.api_base);
    let site = match api.fetch_site_info(&token).await {
        Ok(site) => site,
        Err(e) => {
            warn!("Site lookup failed: {}", e);
            eprintln!("{}", e);
            None
        }
    };

    settings.link_site(site.as_ref());
    settings.save(&config.vault).await?;

    match site {
        Some(site) => {
            info!(subdomain = %site.subdomain, "Linked vault to site");
            println!("Linked to {}", site.site_url);
            Ok(())
        }
        None => anyhow::bail!(INVALID_TOKEN_MESSAGE),
    }
}

async fn configure(
    config: &Config,
    settings: &mut Settings,
    site_folder: Option<String>,
    publish_external: Option<bool>,
) -> anyhow::Result<()> {
    let changed = site_folder.is_some() || publish_external.is_some();
    if let Some(site_folder) = site_folder {
        settings.site_folder = site_folder;
    }
    if let Some(publish_external) = publish_external {
        settings.publish_external = publish_external;
    }
    if changed {
        settings.save(&config.vault).await?;
    }

    println!(
        "Site folder:      {}",
        if settings.site_folder.is_empty() {
            "(whole vault)"
        } else {
            settings.site_folder.as_str()
        }
    );
    println!("Publish external: {}", settings.publish_external);
    println!(
        "Linked site:      {}",
        settings.site_host().unwrap_or("(none)")
    );
    Ok(())
}

async fn run_pass(
    config: &Config,
    settings: &Settings,
    dry_run: bool,
) -> anyhow::Result<PublishReport> {
    if !settings.is_linked() {
        anyhow::bail!(INVALID_TOKEN_MESSAGE);
    }
    let token = config
        .token
        .clone()
        .unwrap_or_else(|| settings.secret_token.clone());

    let publisher = Publisher::new(
        Arc::new(MixaApiClient::with_base_url(&config.api_base)),
        Arc::new(LocalFileTree::new(&config.vault)),
        Arc::new(S3Connector::new(
            &config.bucket,
            &config.s3_region,
            &config.s3_endpoint,
        )),
    )
    .with_options(PublishOptions {
        scan_concurrency: config.scan_concurrency.max(1),
        apply_concurrency: config.apply_concurrency.max(1),
    });

    let mut states = publisher.subscribe();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!("Publish {}", state);
        }
    });

    let sync_config = settings.sync_config(&config.vault);
    let result = if dry_run {
        publisher.preview(&token, &sync_config).await
    } else {
        publisher.publish(&token, &sync_config).await
    };
    progress.abort();

    Ok(result?)
}
