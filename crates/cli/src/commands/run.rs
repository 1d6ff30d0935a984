//! `run` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{SceneSelector, StreamerConfig};
use dispatcher::{LogTransport, SessionLink, WebSocketServer};
use scene_loop::{build_publisher, RunSummary, SceneLoop};
use tracing::{info, warn};

use super::source::{load_config, open_store};
use crate::cli::{Mode, RunArgs};

/// Upper bound on waiting for the viewer endpoint to close
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute the `run` command
pub async fn run_streamer(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config().map(|p| p.as_path()))?;
    apply_overrides(args, &mut config);
    ConfigLoader::validate(&config).context("Invalid configuration after overrides")?;

    if let Some(port) = config.observability.metrics_port {
        observability::init_metrics_only(port)?;
        info!("Metrics endpoint available on port {}", port);
    }

    let store = open_store(&args.source, &config)?;
    let selector = initial_selector(&config);
    let scene = store
        .load_scene(&selector)
        .with_context(|| format!("Failed to load initial scene {selector}"))?;

    info!(
        scene = %scene.id,
        name = %scene.name,
        channels = scene.channels.len(),
        keyframes = scene.keyframes.len(),
        annotations = scene.annotations.len(),
        "Initial scene loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration and scene are valid, exiting");
        print_run_summary(&config, args.mode, &scene.summary());
        return Ok(());
    }

    let publisher = build_publisher(store.as_ref(), &config.server)
        .context("Failed to build stream publisher")?;
    let connector = publisher.connector();

    let output = match args.mode {
        Mode::Stream => {
            let server =
                dispatcher::serve(&config.server.host, config.server.port, connector).await?;
            info!(
                address = %server.local_addr(),
                "Open ws://{} in a foxglove-compatible viewer",
                server.local_addr()
            );
            Output::Server(server)
        }
        Mode::Render => {
            let link = connector
                .connect(LogTransport::new("render"))
                .context("Failed to attach render session")?;
            link.subscribe_all();
            Output::Render(link)
        }
    };

    let (scene_loop, handle) = SceneLoop::new(store, scene, &config, publisher)?;
    let mut task = tokio::spawn(scene_loop.run());

    info!(mode = ?args.mode, "Streaming started");

    let timeout = (args.timeout > 0).then(|| Duration::from_secs(args.timeout));
    let summary: RunSummary = tokio::select! {
        joined = &mut task => joined.context("Scene loop task failed")?,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping scene loop...");
            handle.stop();
            task.await.context("Scene loop task failed")?
        }
        _ = deadline(timeout) => {
            info!(timeout_secs = args.timeout, "Timeout reached, stopping scene loop...");
            handle.stop();
            task.await.context("Scene loop task failed")?
        }
    };

    output.close().await;

    println!("\n{}", summary.metrics);
    println!("Scenes loaded: {}", summary.scenes_loaded);
    println!("Sessions admitted: {}", summary.publisher.admitted);
    println!("Tick overruns: {}", summary.tick_overruns);

    info!("Scene streamer finished");
    Ok(())
}

/// Where streamed messages end up
enum Output {
    Server(WebSocketServer),
    Render(SessionLink),
}

impl Output {
    async fn close(self) {
        match self {
            Output::Server(server) => {
                if tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, server.shutdown())
                    .await
                    .is_err()
                {
                    warn!("Viewer endpoint did not shut down in time");
                }
            }
            Output::Render(link) => link.disconnect(),
        }
    }
}

/// CLI and environment values take precedence over the config file
fn apply_overrides(args: &RunArgs, config: &mut StreamerConfig) {
    if let Some(root) = &args.source.dataroot {
        config.dataset.root = Some(root.clone());
    }
    if let Some(index) = args.scene {
        config.scene.index = index;
        config.scene.id = None;
    }
    if let Some(id) = &args.scene_id {
        config.scene.id = Some(id.clone());
    }
    if let Some(host) = &args.host {
        info!(host = %host, "Overriding server host from CLI");
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port, "Overriding server port from CLI");
        config.server.port = port;
    }
    if let Some(end_of_scene) = args.end_of_scene {
        config.scene.end_of_scene = end_of_scene.into();
    }
    if let Some(speed) = args.speed {
        config.sync.speed = speed;
    }
    if let Some(port) = args.metrics_port {
        config.observability.metrics_port = Some(port);
    }
}

fn initial_selector(config: &StreamerConfig) -> SceneSelector {
    match &config.scene.id {
        Some(id) => SceneSelector::Id(id.clone()),
        None => SceneSelector::Index(config.scene.index),
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print resolved settings for dry-run mode
fn print_run_summary(config: &StreamerConfig, mode: Mode, scene: &contracts::SceneSummary) {
    println!("\n=== Run Summary ===\n");
    println!("Mode: {:?}", mode);
    println!("Initial scene: {} ({}) #{}", scene.name, scene.id, scene.index);
    println!("  Keyframes: {}", scene.keyframe_count);
    println!("  End of scene: {:?}", config.scene.end_of_scene);
    println!("\nSync:");
    println!("  Policy: {:?}", config.sync.policy);
    println!("  Max staleness: {} ms", config.sync.max_staleness_ms);
    match config.sync.publish_rate_hz {
        Some(hz) => println!("  Publish rate: {hz} Hz"),
        None => println!("  Publish rate: keyframe spacing"),
    }
    println!("  Speed: {}x", config.sync.speed);
    if mode == Mode::Stream {
        println!("\nServer:");
        println!("  Endpoint: ws://{}:{}", config.server.host, config.server.port);
        println!("  Session queue: {}", config.server.session_queue_capacity);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use contracts::EndOfScene;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["scene-streamer", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_overrides_take_precedence() {
        let args = run_args(&[
            "--port",
            "9999",
            "--scene",
            "3",
            "--end-of-scene",
            "loop",
            "--speed",
            "2.0",
        ]);
        let mut config = StreamerConfig::default();
        config.scene.id = Some("from-file".into());

        apply_overrides(&args, &mut config);

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.scene.index, 3);
        assert_eq!(config.scene.id, None);
        assert_eq!(config.scene.end_of_scene, EndOfScene::Loop);
        assert_eq!(config.sync.speed, 2.0);
    }

    #[test]
    fn test_scene_id_wins_over_index() {
        let args = run_args(&["--scene", "1", "--scene-id", "abc"]);
        let mut config = StreamerConfig::default();
        apply_overrides(&args, &mut config);

        assert_eq!(initial_selector(&config), SceneSelector::Id("abc".into()));
    }

    #[test]
    fn test_render_mode_parses() {
        let args = run_args(&["--mode", "render", "--synthetic"]);
        assert_eq!(args.mode, Mode::Render);
        assert!(args.source.synthetic);
        assert_eq!(initial_selector(&StreamerConfig::default()), SceneSelector::Index(0));
    }
}
