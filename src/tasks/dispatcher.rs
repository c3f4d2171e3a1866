use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::editor::{Editor, Job, Outcome, PendingJob};
use crate::error::EditorError;
use crate::events::{Command, Notice, NoticeKind};
use crate::scene::Bitmap;
use crate::tasks::busy::BusyGuard;
use crate::tasks::generate::{Generator, needs_translation};
use crate::tasks::loader::{ImageSource, LoadError, Loader};

/// Network-facing services shared by every job.
#[derive(Debug, Clone)]
pub struct Services {
    pub loader: Loader,
    pub generator: Generator,
}

impl Services {
    pub fn from_config(cfg: &Configuration) -> Result<Self> {
        Ok(Self {
            loader: Loader::new(cfg.loader.clone())?,
            generator: Generator::new(cfg.generation.clone())?,
        })
    }
}

struct JobOutcome {
    guard: BusyGuard,
    result: Result<Bitmap, EditorError>,
    notices: Vec<Notice>,
}

/// Owns the editor for the lifetime of the session.
///
/// Commands are applied in arrival order. Uploads and generations run as
/// background jobs; their bitmaps come back here to be placed, so the scene
/// only ever has one writer. Returns the editor once commands are exhausted
/// and no job is left, or as soon as `cancel` fires.
pub async fn run(
    mut editor: Editor,
    services: Services,
    mut commands: Receiver<Command>,
    notices: Sender<Notice>,
    cancel: CancellationToken,
) -> Result<Editor> {
    let mut jobs: JoinSet<JobOutcome> = JoinSet::new();
    let mut commands_open = true;

    loop {
        select! {
            _ = cancel.cancelled() => {
                debug!(in_flight = jobs.len(), "dispatcher cancelled");
                break;
            }

            received = commands.recv(), if commands_open => match received {
                Some(command) => match editor.apply(command) {
                    Outcome::Done(Some(notice)) => emit(&notices, notice).await,
                    Outcome::Done(None) => {}
                    Outcome::Spawn(pending) => {
                        debug!(control = ?pending.guard.control(), "job started");
                        jobs.spawn(run_job(services.clone(), pending));
                    }
                },
                None => {
                    debug!("command channel closed");
                    commands_open = false;
                }
            },

            Some(joined) = jobs.join_next() => match joined {
                Ok(outcome) => {
                    for notice in outcome.notices {
                        emit(&notices, notice).await;
                    }
                    let notice = editor.complete_job(outcome.guard.control(), outcome.result);
                    // Re-enabled only once the result is on the canvas.
                    drop(outcome.guard);
                    emit(&notices, notice).await;
                }
                Err(err) => {
                    warn!(error = %err, "job task failed");
                    emit(&notices, job_failure_notice(&err)).await;
                }
            },
        }

        if !commands_open && jobs.is_empty() {
            break;
        }
    }

    jobs.abort_all();
    info!(objects = editor.scene().len(), "dispatcher stopped");
    Ok(editor)
}

async fn emit(notices: &Sender<Notice>, notice: Notice) {
    if let Err(err) = notices.send(notice).await {
        debug!(notice = %err.0, "notice receiver gone");
    }
}

/// A job that panicked or was aborted still owes the user a notice. Its busy
/// guard was dropped with the task, so the control is already re-enabled.
fn job_failure_notice(err: &JoinError) -> Notice {
    let message = if err.is_cancelled() {
        "The task was cancelled"
    } else {
        "The task stopped unexpectedly"
    };
    Notice::new(NoticeKind::JobFailed, message).with_detail(err.to_string())
}

async fn run_job(services: Services, pending: PendingJob) -> JobOutcome {
    let PendingJob { job, guard } = pending;
    let mut notices = Vec::new();
    let result = match job {
        Job::Upload { path } => services
            .loader
            .load(ImageSource::File(path))
            .await
            .map_err(EditorError::from),
        Job::Generate {
            prompt,
            seed,
            api_key,
        } => generate(&services, prompt, seed, api_key.as_deref(), &mut notices).await,
    };
    JobOutcome {
        guard,
        result,
        notices,
    }
}

async fn generate(
    services: &Services,
    prompt: String,
    seed: Option<u64>,
    api_key: Option<&str>,
    notices: &mut Vec<Notice>,
) -> Result<Bitmap, EditorError> {
    let generator = &services.generator;
    let prompt = match api_key {
        Some(key) if generator.translation_enabled() && needs_translation(&prompt) => {
            match generator.translate(&prompt, key).await {
                Ok(translated) => {
                    debug!(original = %prompt, %translated, "prompt translated");
                    translated
                }
                Err(err) => {
                    warn!(error = %err, "prompt translation failed; using it as written");
                    notices.push(
                        Notice::new(
                            NoticeKind::TranslationSkipped,
                            "Translation failed, using the prompt as written",
                        )
                        .with_detail(err.to_string()),
                    );
                    prompt
                }
            }
        }
        _ => prompt,
    };

    debug!(provider = ?generator.provider(), "requesting image");
    let source = generator.generate(&prompt, api_key, seed).await?;
    let by_url = matches!(source, ImageSource::Url(_));
    services.loader.load(source).await.map_err(|err| match err {
        // The image URL is the provider itself; its refusals are provider refusals.
        LoadError::Status { status } if by_url => EditorError::ProviderRejection {
            status,
            body: format!("image endpoint answered {status}"),
        },
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicked_job_reports_failure() {
        let err = tokio::spawn(async { panic!("decoder crashed") })
            .await
            .unwrap_err();
        let notice = job_failure_notice(&err);
        assert_eq!(notice.kind, NoticeKind::JobFailed);
        assert!(notice.kind.is_error());
        assert_eq!(notice.message, "The task stopped unexpectedly");
        assert!(notice.detail.unwrap().contains("panic"));
    }

    #[tokio::test]
    async fn aborted_job_reports_cancellation() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();
        assert_eq!(job_failure_notice(&err).message, "The task was cancelled");
    }
}
