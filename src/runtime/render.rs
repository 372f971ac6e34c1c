//! Render rendezvous
//!
//! Display actors hand their token to a presentation surface that runs on its
//! own thread, then block until the surface reports completion. The surface
//! side is a single-slot channel of [`RenderJob`]s; each job carries a
//! one-shot completion sender. A per-actor [`RenderRendezvous`] refuses to
//! issue a second job while one is outstanding.
//!
//! All blocking calls here must run outside an async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

use super::error::RenderError;
use super::token::Token;

/// A token waiting to be rendered
#[derive(Debug)]
pub struct RenderJob {
    actor: String,
    token: Token,
    done: oneshot::Sender<Result<(), String>>,
}

impl RenderJob {
    /// Full name of the display actor
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Token to render
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Raise the completion signal
    pub fn complete(self, outcome: Result<(), String>) {
        // the receiver is gone only if the execution thread stopped waiting
        let _ = self.done.send(outcome);
    }
}

/// Presentation-side rendering
pub trait Renderer: Send + 'static {
    /// Render one token; an error message fails the display actor
    fn render(&mut self, actor: &str, token: &Token) -> Result<(), String>;
}

/// Execution-side end of a presentation surface
#[derive(Debug, Clone)]
pub struct SurfaceHandle {
    slot: mpsc::Sender<RenderJob>,
}

impl SurfaceHandle {
    /// Whether the surface stopped taking jobs
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }
}

/// Presentation-side end of a surface, for surfaces that own their loop
#[derive(Debug)]
pub struct JobQueue {
    jobs: mpsc::Receiver<RenderJob>,
}

impl JobQueue {
    /// Wait for the next job; `None` once every handle is dropped
    pub fn next_blocking(&mut self) -> Option<RenderJob> {
        self.jobs.blocking_recv()
    }

    /// Take a job if one is waiting
    pub fn try_next(&mut self) -> Option<RenderJob> {
        self.jobs.try_recv().ok()
    }

    /// Stop taking jobs; queued and future handoffs fail
    pub fn close(&mut self) {
        self.jobs.close();
    }
}

/// A presentation surface running a [`Renderer`] on a dedicated thread
pub struct PresentationSurface {
    handle: SurfaceHandle,
    thread: JoinHandle<()>,
}

impl PresentationSurface {
    /// Create a surface whose loop the caller drives
    pub fn channel() -> (SurfaceHandle, JobQueue) {
        let (slot, jobs) = mpsc::channel(1);
        (SurfaceHandle { slot }, JobQueue { jobs })
    }

    /// Start a presentation thread around a renderer
    pub fn spawn<R: Renderer>(mut renderer: R) -> std::io::Result<Self> {
        let (handle, mut queue) = Self::channel();
        let thread = std::thread::Builder::new()
            .name("flowcore-presentation".into())
            .spawn(move || {
                while let Some(job) = queue.next_blocking() {
                    let outcome = renderer.render(job.actor(), job.token());
                    job.complete(outcome);
                }
                tracing::debug!("presentation surface stopped");
            })?;

        Ok(Self { handle, thread })
    }

    /// Handle for the execution side
    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    /// Wait for the presentation thread; it exits once every handle is dropped
    pub fn join(self) {
        let Self { handle, thread } = self;
        drop(handle);
        if thread.join().is_err() {
            tracing::warn!("presentation thread panicked");
        }
    }
}

/// Single-flight render handoff for one actor instance
#[derive(Debug, Default)]
pub struct RenderRendezvous {
    updating: AtomicBool,
}

struct Updating<'a>(&'a AtomicBool);

impl Drop for Updating<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RenderRendezvous {
    /// Create an idle rendezvous
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a job is outstanding
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Hand the token to the surface and block until it has been rendered
    pub fn render(
        &self,
        surface: &SurfaceHandle,
        actor: &str,
        token: Token,
    ) -> Result<(), RenderError> {
        if self.updating.swap(true, Ordering::AcqRel) {
            return Err(RenderError::Busy(actor.to_string()));
        }
        let _updating = Updating(&self.updating);

        let (done, completion) = oneshot::channel();
        let job = RenderJob {
            actor: actor.to_string(),
            token,
            done,
        };

        surface.slot.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => RenderError::SlotOccupied,
            mpsc::error::TrySendError::Closed(_) => RenderError::SurfaceClosed,
        })?;

        match completion.blocking_recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(RenderError::Failed(msg)),
            Err(_) => Err(RenderError::Abandoned),
        }
    }
}
