//! # Fare Pipeline
//!
//! Concurrent fetch, price and diff pipeline over the Wingo availability
//! APIs.
//!
//! A run expands routes × date window into monthly tasks, resolves the
//! availability of each task (Stage 1), quotes the fees of every offered
//! flight (Stage 2), archives the priced flights, and finally compares the
//! resulting snapshot with the previous one to produce [`ChangeEvent`]s.
//!
//! ## Example
//!
//! ```rust,ignore
//! let ctx = RunContext::new(source, store.clone(), PipelineConfig::default(), token);
//! let previous = load_snapshot(store.as_ref(), Some(&window)).await?;
//! let outcome = run_pipeline(&ctx, &routes, window, &previous).await?;
//! notify_all(&LogNotifier, &outcome.events).await;
//! ```

pub mod archiver;
pub mod availability;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod price_resolver;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod window;
pub mod worker_pool;

pub use config::PipelineConfig;
pub use context::{Coverage, FeeCache, RunContext, RunSummary};
pub use diff::{ChangeEvent, PriceDirection, diff};
pub use error::{PipelineError, Result, StorageError};
pub use notify::{LogNotifier, Notifier, NotifyError, format_money, notify_all};
pub use orchestrator::{RunOutcome, run_pipeline};
pub use snapshot::{ArchivedFlight, FlightKey, ResolvedFlight, Snapshot};
pub use source::FareSource;
pub use store::{FsSnapshotStore, MemorySnapshotStore, SnapshotStore, load_snapshot};
pub use window::{DateWindow, WindowTask, window_tasks};
