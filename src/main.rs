use anyhow::{Context, Result, bail};
use clap::Parser;
use env_logger::{Builder, Env, Target};
use feeder_setup::{
    cli::{Args, Commands, ConfigCommand, TailscaleCommand},
    config::{ApiConfig, AppConfig},
    feeder_api_client::{FeederApi, FeederApiClient},
    geocoding::NominatimClient,
    render::{
        TerminalRenderer, print_config, print_install_outcome, print_setup_outcome,
        print_snapshot,
    },
    services::{
        dashboard::{DashboardService, RESTART_SETTLE},
        install::{CancellationToken, InstallPoller, TailscaleService},
        setup::SetupService,
        validation::plausible_auth_key,
    },
};
use log::{debug, error, info};
use std::{
    collections::BTreeMap,
    io::{self, Write},
    time::Duration,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    initialize();

    let config = AppConfig::get();
    let api_config = ApiConfig {
        base_url: args.api_url.clone().unwrap_or(config.api.base_url.clone()),
        ..config.api.clone()
    };
    let service_client =
        FeederApiClient::new(&api_config).context("failed to create feeder api client")?;

    let mut stdout = io::stdout();

    match args.command {
        Commands::Status(status) if status.watch => {
            let cancel = CancellationToken::new();
            spawn_ctrl_c_handler(cancel.clone());

            let mut first = true;
            DashboardService::watch(
                &service_client,
                Duration::from_secs(status.interval),
                &cancel,
                |snapshot| {
                    if !first {
                        writeln!(stdout)?;
                    }
                    first = false;
                    print_snapshot(&mut stdout, snapshot)?;
                    Ok(())
                },
            )
            .await?;
        }
        Commands::Status(_) => {
            let snapshot = DashboardService::snapshot(&service_client).await;
            print_snapshot(&mut stdout, &snapshot)?;
        }
        Commands::Setup(setup) => {
            let lookup = NominatimClient::new(&config.geocoder)
                .context("failed to create geocoding client")?;
            let mode = SetupService::resolve_connectivity(&service_client).await;
            info!("connectivity: {mode:?}");

            let outcome = SetupService::save_and_start(
                &service_client,
                &lookup,
                &setup.to_form(),
                mode,
                config.geocoder.timeout,
            )
            .await?;
            print_setup_outcome(&mut stdout, &outcome)?;
        }
        Commands::Tailscale(TailscaleCommand::Install { auth_key }) => {
            let Some(auth_key) = plausible_auth_key(&auth_key) else {
                bail!("invalid auth key: expected a key starting with tskey-");
            };

            let cancel = CancellationToken::new();
            spawn_ctrl_c_handler(cancel.clone());

            let mut renderer = TerminalRenderer::new(io::stdout());
            let mut poller = InstallPoller::new(
                &service_client,
                &mut renderer,
                config.install.clone(),
                cancel,
            );
            let outcome = poller.run(auth_key).await;
            let choices = poller.view().choices().to_vec();

            print_install_outcome(&mut stdout, &outcome, &choices)?;
            if outcome.needs_user_choice() {
                bail!("tailscale installation did not complete");
            }
        }
        Commands::Tailscale(TailscaleCommand::Skip) => {
            TailscaleService::skip(&service_client).await;
            writeln!(stdout, "Continuing without VPN.")?;
        }
        Commands::Restart => {
            let snapshot =
                DashboardService::restart_and_refresh(&service_client, RESTART_SETTLE).await?;
            writeln!(stdout, "Service restarted.")?;
            print_snapshot(&mut stdout, &snapshot)?;
        }
        Commands::Config(ConfigCommand::Show) => {
            let stored = service_client
                .config()
                .await
                .context("failed to load configuration")?;
            print_config(&mut stdout, &stored)?;
        }
        Commands::Config(ConfigCommand::Set { pairs }) => {
            let patch: BTreeMap<String, String> = pairs.into_iter().collect();
            let keys = patch.keys().cloned().collect::<Vec<_>>().join(", ");
            service_client
                .update_config(patch)
                .await
                .context("failed to update configuration")?;
            writeln!(stdout, "Updated {keys}.")?;
        }
    }

    Ok(())
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    // stdout carries command output; keep log lines off it
    builder.target(Target::Stderr).init();

    debug!("module version: {}", env!("CARGO_PKG_VERSION"));
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("ctrl-c received");
                cancel.cancel();
            }
            Err(e) => error!("failed to listen for ctrl-c: {e}"),
        }
    });
}
