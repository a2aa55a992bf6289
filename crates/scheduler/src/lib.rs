//! Concurrency primitives shared across the background workers (spec §5
//! "CONCURRENCY & RESOURCE MODEL"): a non-blocking per-key lock for
//! at-most-once-concurrently processing, a capped pool for CPU-bound work,
//! and the two worker-loop shapes (fixed-interval pass, queue-draining
//! poll) every background worker in this gateway is built from.

pub mod cpu_pool;
pub mod keyed_lock;
pub mod periodic;

pub use cpu_pool::{CpuPool, CpuPoolError};
pub use keyed_lock::{KeyedGuard, KeyedLock};
pub use periodic::{spawn_periodic, spawn_polling};
