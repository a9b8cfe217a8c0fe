//! Concrete probes.
//!
//! - **Database**: one round-trip query over a single-connection pool
//! - **Filesystem**: write, read back and delete a scratch file
//! - **Memory** / **CPU**: OS introspection against percentage bands
//! - **External**: reachability of optional third-party integrations

pub mod database;
pub mod external;
pub mod filesystem;
pub mod system;

pub use database::{DatabaseHandle, DatabaseProbe, PgDatabase, PoolState, DEFAULT_SLOW_THRESHOLD};
pub use external::{AuthScheme, HttpReachabilityProbe, MAX_REACHABILITY_TIMEOUT};
pub use filesystem::FilesystemProbe;
pub use system::{
    CpuProbe, CpuThresholds, LoadStats, MemoryProbe, MemoryStats, MemoryThresholds, OsIntrospect,
    SystemIntrospect,
};
