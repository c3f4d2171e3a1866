use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use creative_canvas::config::Configuration;
use creative_canvas::credentials::CredentialStore;
use creative_canvas::editor::Editor;
use creative_canvas::events::{Command, Notice};
use creative_canvas::render::text::FontBook;
use creative_canvas::tasks::dispatcher::{self, Services};

const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(
    name = "creative-canvas",
    version,
    about = "headless social-media image editor"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// YAML list of editor commands to run, in order
    #[arg(long, value_name = "FILE")]
    script: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("creative_canvas={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        script,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::debug!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let commands = match script.as_deref() {
        Some(path) => read_script(path)?,
        None => Vec::new(),
    };

    let credentials = CredentialStore::open(&cfg.credentials.path)
        .context("failed to open credential slot")?;
    let services = Services::from_config(&cfg).context("failed to build http clients")?;
    let fonts = tokio::task::spawn_blocking(FontBook::system)
        .await
        .context("font discovery failed")?;
    let editor = Editor::new(Arc::new(cfg), credentials, fonts);

    let (command_tx, command_rx) = mpsc::channel::<Command>(16); // Script -> Dispatcher
    let (notice_tx, mut notice_rx) = mpsc::channel::<Notice>(64); // Dispatcher -> log

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // Dispatcher
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            let editor = dispatcher::run(editor, services, command_rx, notice_tx, cancel)
                .await
                .context("dispatcher task failed")?;
            let summary = editor.summary();
            tracing::info!(
                objects = summary.objects.len(),
                revision = summary.revision,
                "session finished"
            );
            Ok(())
        }
    });

    // Script feeder
    tasks.spawn(async move { feed(commands, command_tx).await.context("script feeder failed") });

    // Notices (toasts)
    tasks.spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            let detail = notice.detail.as_deref().unwrap_or("");
            if notice.kind.is_error() {
                tracing::warn!(kind = ?notice.kind, detail, "{notice}");
            } else {
                tracing::info!(kind = ?notice.kind, "{notice}");
            }
        }
        Ok(())
    });

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}

fn read_script(path: &Path) -> Result<Vec<Command>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script at {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse script at {}", path.display()))
}

/// Sends each command in turn. After an upload or generation it waits until
/// the editor is idle again so later commands see the placed image.
async fn feed(commands: Vec<Command>, tx: mpsc::Sender<Command>) -> Result<()> {
    for command in commands {
        let waits = matches!(command, Command::Upload { .. } | Command::Generate { .. });
        if tx.send(command).await.is_err() {
            tracing::debug!("dispatcher gone; remaining script dropped");
            return Ok(());
        }
        if waits {
            wait_idle(&tx).await?;
        }
    }
    Ok(())
}

async fn wait_idle(tx: &mpsc::Sender<Command>) -> Result<()> {
    loop {
        let (reply, answer) = oneshot::channel();
        tx.send(Command::Inspect(reply))
            .await
            .map_err(|_| anyhow!("dispatcher stopped"))?;
        let summary = answer.await.context("dispatcher stopped")?;
        if summary.generate_enabled && summary.upload_enabled {
            return Ok(());
        }
        sleep(IDLE_POLL).await;
    }
}
