//! Runs a [`Dashboard`] on its own tokio task.
//!
//! The task owns the engine outright. User events come in through a
//! [`DashboardHandle`]; aggregate fetches run as separate tasks and post
//! their results back to the same channel, so the engine only ever sees
//! one message at a time.

use std::sync::Arc;

use geo_dashboard_backend::{BackendError, DashboardBackend};
use geo_dashboard_models::config::DashboardConfig;
use geo_dashboard_models::{AggregateRequest, CategoryCount, CircleSelection, GeometryEdit, ViewId};
use geojson::FeatureCollection;
use tokio::sync::{mpsc, oneshot};

use crate::engine::Dashboard;
use crate::sink::RenderSink;
use crate::{DashboardError, DashboardSnapshot};

const CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Edit(GeometryEdit),
    Commit {
        circle: CircleSelection,
        reply: Reply<Result<u64, DashboardError>>,
    },
    SelectCategory {
        key: String,
        reply: Reply<Result<u64, DashboardError>>,
    },
    Delivered {
        view: ViewId,
        generation: u64,
        result: Result<Vec<CategoryCount>, BackendError>,
    },
    Snapshot(Reply<DashboardSnapshot>),
    Regions(Reply<FeatureCollection>),
}

/// Cloneable handle to a running dashboard.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    tx: mpsc::Sender<Command>,
}

impl DashboardHandle {
    /// Forwards an edit-move or edit-resize event.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Closed`] if the dashboard task stopped.
    pub async fn edit(&self, edit: GeometryEdit) -> Result<(), DashboardError> {
        self.send(Command::Edit(edit)).await
    }

    /// Forwards a commit gesture and waits until it has been applied.
    /// Returns the data-source generation afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Query`] if the circle is invalid, or
    /// [`DashboardError::Closed`] if the dashboard task stopped.
    pub async fn commit(&self, circle: CircleSelection) -> Result<u64, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Commit { circle, reply }).await?;
        rx.await.unwrap_or(Err(DashboardError::Closed))
    }

    /// Forwards a category bar click and waits until it has been applied.
    /// Returns the data-source generation afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Query`] if the key cannot be used, or
    /// [`DashboardError::Closed`] if the dashboard task stopped.
    pub async fn select_category(&self, key: impl Into<String>) -> Result<u64, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SelectCategory {
            key: key.into(),
            reply,
        })
        .await?;
        rx.await.unwrap_or(Err(DashboardError::Closed))
    }

    /// Current state of the session.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Closed`] if the dashboard task stopped.
    pub async fn snapshot(&self) -> Result<DashboardSnapshot, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| DashboardError::Closed)
    }

    /// The loaded region shapes as `GeoJSON`; empty until startup is done.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Closed`] if the dashboard task stopped.
    pub async fn regions(&self) -> Result<FeatureCollection, DashboardError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Regions(reply)).await?;
        rx.await.map_err(|_| DashboardError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), DashboardError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DashboardError::Closed)
    }
}

/// Starts a dashboard session on a new tokio task.
///
/// The task first fetches the region shapes; events sent before that
/// completes are queued. If the fetch fails the sink shows a placeholder
/// and every later event is ignored.
///
/// # Errors
///
/// Returns [`DashboardError::Config`] if the definition is invalid.
pub fn spawn_dashboard<S: RenderSink>(
    config: DashboardConfig,
    backend: Arc<dyn DashboardBackend>,
    sink: S,
) -> Result<DashboardHandle, DashboardError> {
    let engine = Dashboard::new(config, sink)?;
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let results = tx.downgrade();

    tokio::spawn(run(engine, backend, rx, results));

    Ok(DashboardHandle { tx })
}

async fn run<S: RenderSink>(
    mut engine: Dashboard<S>,
    backend: Arc<dyn DashboardBackend>,
    mut rx: mpsc::Receiver<Command>,
    results: mpsc::WeakSender<Command>,
) {
    match backend.region_shapes().await {
        Ok(shapes) => match engine.start(shapes) {
            Ok(requests) => dispatch(&backend, &results, requests),
            Err(e) => engine.fail(format!("Initial query failed: {e}")),
        },
        Err(e) => engine.fail(format!("Failed to load region shapes: {e}")),
    }

    while let Some(command) = rx.recv().await {
        match command {
            Command::Edit(edit) => engine.edit(&edit),
            Command::Commit { circle, reply } => {
                let result = engine.commit(circle).map(|requests| {
                    dispatch(&backend, &results, requests);
                    engine.generation()
                });
                let _ = reply.send(result);
            }
            Command::SelectCategory { key, reply } => {
                let result = engine.select_category(&key).map(|requests| {
                    dispatch(&backend, &results, requests);
                    engine.generation()
                });
                let _ = reply.send(result);
            }
            Command::Delivered {
                view,
                generation,
                result,
            } => match result {
                Ok(counts) => engine.deliver(view, generation, counts),
                Err(e) => engine.reject(view, generation, &e),
            },
            Command::Snapshot(reply) => {
                let _ = reply.send(engine.snapshot());
            }
            Command::Regions(reply) => {
                let _ = reply.send(engine.shapes().to_collection());
            }
        }
    }

    log::info!("Dashboard task stopped");
}

/// Runs each request on its own task and posts the result back.
fn dispatch(
    backend: &Arc<dyn DashboardBackend>,
    results: &mpsc::WeakSender<Command>,
    requests: Vec<AggregateRequest>,
) {
    for request in requests {
        let Some(tx) = results.upgrade() else {
            log::debug!("Dashboard closed, dropping {} request", request.view);
            return;
        };
        let backend = Arc::clone(backend);

        tokio::spawn(async move {
            let result = backend.aggregate(&request).await;
            let delivered = Command::Delivered {
                view: request.view,
                generation: request.generation,
                result,
            };
            if tx.send(delivered).await.is_err() {
                log::debug!("Dashboard closed before {} result arrived", request.view);
            }
        });
    }
}
