//! A Tokio-based worker pool that dispatches tasks over a bounded queue,
//! tracks completion with a counting barrier, drains gracefully on shutdown,
//! and reads results fairly from several channels at once.

mod channel;
mod config;
mod error;
mod pool;
mod select;
mod task;
mod tracker;
mod worker;

pub use channel::Channel;
pub use config::PoolConfig;
pub use error::{PoolError, SendError, TaskError, TryRecvError, TrySendError};
pub use pool::{PoolState, WorkerPool};
pub use select::{MultiplexedReader, Selected};
pub use task::{Task, TaskFuture, TaskResult};
pub use tracker::CompletionTracker;
pub use worker::WorkerState;
