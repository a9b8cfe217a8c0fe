//! Process memory and CPU load probes.
//!
//! Both read through [`SystemIntrospect`] so thresholds can be exercised
//! without depending on the host.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::error::{ErrorCode, PreflightError, Result};
use crate::health::check::{ProbeResult, ProbeStatus};
use crate::health::probe::Probe;

// ═══════════════════════════════════════════════════════════════════════════════
// Introspection
// ═══════════════════════════════════════════════════════════════════════════════

/// Memory figures for the process and the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStats {
    /// Resident set size of this process
    pub process_used_bytes: u64,
    /// Ceiling the process is measured against
    pub process_limit_bytes: u64,
    pub system_total_bytes: u64,
    pub system_used_bytes: u64,
}

impl MemoryStats {
    pub fn process_usage_pct(&self) -> f64 {
        percentage(self.process_used_bytes, self.process_limit_bytes)
    }

    pub fn system_usage_pct(&self) -> f64 {
        percentage(self.system_used_bytes, self.system_total_bytes)
    }
}

/// Load average and core count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadStats {
    pub one_minute: f64,
    pub cores: usize,
}

impl LoadStats {
    /// One-minute load divided by core count, as a percentage.
    pub fn load_pct(&self) -> f64 {
        if self.cores == 0 {
            return 0.0;
        }
        (self.one_minute / self.cores as f64) * 100.0
    }
}

fn percentage(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64) * 100.0
}

/// OS-level memory and CPU introspection.
pub trait SystemIntrospect: Send + Sync {
    fn memory(&self) -> Result<MemoryStats>;
    fn load(&self) -> Result<LoadStats>;
}

/// Introspection backed by the running kernel.
#[derive(Debug, Clone, Default)]
pub struct OsIntrospect {
    /// Overrides the process memory ceiling
    process_limit_bytes: Option<u64>,
}

impl OsIntrospect {
    pub fn new(process_limit_bytes: Option<u64>) -> Self {
        Self { process_limit_bytes }
    }
}

#[cfg(target_os = "linux")]
impl SystemIntrospect for OsIntrospect {
    fn memory(&self) -> Result<MemoryStats> {
        // SAFETY: sysinfo only writes into the zeroed struct we pass.
        let mut info: libc::sysinfo = unsafe { std::mem::zeroed() };
        if unsafe { libc::sysinfo(&mut info) } != 0 {
            return Err(PreflightError::from(std::io::Error::last_os_error()));
        }
        let unit = info.mem_unit.max(1) as u64;
        let total = info.totalram as u64 * unit;
        let free = (info.freeram as u64 + info.bufferram as u64) * unit;
        let system_used = total.saturating_sub(free);

        let statm = std::fs::read_to_string("/proc/self/statm")?;
        let resident_pages: u64 = statm
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                PreflightError::new(
                    ErrorCode::IntrospectionUnavailable,
                    "Could not parse /proc/self/statm",
                )
            })?;
        // SAFETY: sysconf has no preconditions.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let process_used = resident_pages * page_size.max(1) as u64;

        let limit = self
            .process_limit_bytes
            .or_else(address_space_limit)
            .unwrap_or(total);

        Ok(MemoryStats {
            process_used_bytes: process_used,
            process_limit_bytes: limit,
            system_total_bytes: total,
            system_used_bytes: system_used,
        })
    }

    fn load(&self) -> Result<LoadStats> {
        load_average()
    }
}

#[cfg(not(target_os = "linux"))]
impl SystemIntrospect for OsIntrospect {
    fn memory(&self) -> Result<MemoryStats> {
        Err(PreflightError::new(
            ErrorCode::IntrospectionUnavailable,
            "Memory introspection is only supported on Linux",
        ))
    }

    fn load(&self) -> Result<LoadStats> {
        load_average()
    }
}

#[cfg(target_os = "linux")]
fn address_space_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit only writes into `limit`.
    if unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut limit) } != 0 {
        return None;
    }
    if limit.rlim_cur == libc::RLIM_INFINITY {
        None
    } else {
        Some(limit.rlim_cur as u64)
    }
}

#[cfg(unix)]
fn load_average() -> Result<LoadStats> {
    let mut loads = [0f64; 3];
    // SAFETY: the buffer holds the three samples requested.
    let n = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if n < 1 {
        return Err(PreflightError::new(
            ErrorCode::IntrospectionUnavailable,
            "getloadavg returned no samples",
        ));
    }
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Ok(LoadStats {
        one_minute: loads[0],
        cores,
    })
}

#[cfg(not(unix))]
fn load_average() -> Result<LoadStats> {
    Err(PreflightError::new(
        ErrorCode::IntrospectionUnavailable,
        "Load average is not available on this platform",
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Thresholds
// ═══════════════════════════════════════════════════════════════════════════════

/// Percentage bands for the memory probe.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MemoryThresholds {
    #[serde(default = "default_process_warning")]
    pub process_warning_pct: f64,
    #[serde(default = "default_process_critical")]
    pub process_critical_pct: f64,
    #[serde(default = "default_system_warning")]
    pub system_warning_pct: f64,
    #[serde(default = "default_system_critical")]
    pub system_critical_pct: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            process_warning_pct: default_process_warning(),
            process_critical_pct: default_process_critical(),
            system_warning_pct: default_system_warning(),
            system_critical_pct: default_system_critical(),
        }
    }
}

/// Percentage bands for the CPU probe.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CpuThresholds {
    #[serde(default = "default_cpu_warning")]
    pub warning_pct: f64,
    #[serde(default = "default_cpu_critical")]
    pub critical_pct: f64,
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            warning_pct: default_cpu_warning(),
            critical_pct: default_cpu_critical(),
        }
    }
}

fn default_process_warning() -> f64 { 80.0 }
fn default_process_critical() -> f64 { 95.0 }
fn default_system_warning() -> f64 { 85.0 }
fn default_system_critical() -> f64 { 95.0 }
fn default_cpu_warning() -> f64 { 70.0 }
fn default_cpu_critical() -> f64 { 90.0 }

// ═══════════════════════════════════════════════════════════════════════════════
// Memory Probe
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MemoryProbe {
    introspect: Arc<dyn SystemIntrospect>,
    thresholds: MemoryThresholds,
}

impl MemoryProbe {
    pub fn new(introspect: Arc<dyn SystemIntrospect>) -> Self {
        Self {
            introspect,
            thresholds: MemoryThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: MemoryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    fn classify(&self, process_pct: f64, system_pct: f64) -> (ProbeStatus, Option<String>) {
        let t = &self.thresholds;
        if process_pct > t.process_critical_pct || system_pct > t.system_critical_pct {
            (
                ProbeStatus::Unhealthy,
                Some(format!(
                    "Memory critically high: process {:.1}%, system {:.1}%",
                    process_pct, system_pct
                )),
            )
        } else if process_pct > t.process_warning_pct || system_pct > t.system_warning_pct {
            (
                ProbeStatus::Warning,
                Some(format!(
                    "Memory usage high: process {:.1}%, system {:.1}%",
                    process_pct, system_pct
                )),
            )
        } else {
            (ProbeStatus::Healthy, None)
        }
    }
}

#[async_trait]
impl Probe for MemoryProbe {
    fn name(&self) -> &str {
        "memory"
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();
        let stats = match self.introspect.memory() {
            Ok(stats) => stats,
            Err(e) => {
                return ProbeResult::unhealthy(self.name())
                    .with_message(format!("Could not read memory usage: {}", e.user_message()))
                    .with_latency(start.elapsed());
            }
        };

        let process_pct = stats.process_usage_pct();
        let system_pct = stats.system_usage_pct();
        debug!(process_pct, system_pct, "Memory usage sampled");

        let (status, message) = self.classify(process_pct, system_pct);
        let mut result = ProbeResult::new(self.name(), status)
            .with_latency(start.elapsed())
            .with_detail("process_used_bytes", stats.process_used_bytes)
            .with_detail("process_limit_bytes", stats.process_limit_bytes)
            .with_detail("process_usage_pct", round1(process_pct))
            .with_detail("system_total_bytes", stats.system_total_bytes)
            .with_detail("system_used_bytes", stats.system_used_bytes)
            .with_detail("system_usage_pct", round1(system_pct));
        if let Some(message) = message {
            result = result.with_message(message);
        }
        result
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CPU Probe
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CpuProbe {
    introspect: Arc<dyn SystemIntrospect>,
    thresholds: CpuThresholds,
}

impl CpuProbe {
    pub fn new(introspect: Arc<dyn SystemIntrospect>) -> Self {
        Self {
            introspect,
            thresholds: CpuThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: CpuThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[async_trait]
impl Probe for CpuProbe {
    fn name(&self) -> &str {
        "cpu"
    }

    async fn run(&self) -> ProbeResult {
        let start = Instant::now();
        let stats = match self.introspect.load() {
            Ok(stats) => stats,
            Err(e) => {
                return ProbeResult::unhealthy(self.name())
                    .with_message(format!("Could not read load average: {}", e.user_message()))
                    .with_latency(start.elapsed());
            }
        };

        let load_pct = stats.load_pct();
        let result = ProbeResult::healthy(self.name())
            .with_latency(start.elapsed())
            .with_detail("load_1m", stats.one_minute)
            .with_detail("cores", stats.cores)
            .with_detail("load_pct", round1(load_pct));

        if load_pct > self.thresholds.critical_pct {
            result
                .with_status(ProbeStatus::Unhealthy)
                .with_message(format!("CPU load critically high: {:.1}%", load_pct))
        } else if load_pct > self.thresholds.warning_pct {
            result
                .with_status(ProbeStatus::Warning)
                .with_message(format!("CPU load high: {:.1}%", load_pct))
        } else {
            result
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Introspection returning fixed numbers.
    pub(crate) struct FixedIntrospect {
        pub memory: Option<MemoryStats>,
        pub load: Option<LoadStats>,
    }

    impl FixedIntrospect {
        pub(crate) fn memory_pct(process_pct: u64, system_pct: u64) -> Self {
            Self {
                memory: Some(MemoryStats {
                    process_used_bytes: process_pct,
                    process_limit_bytes: 100,
                    system_total_bytes: 100,
                    system_used_bytes: system_pct,
                }),
                load: None,
            }
        }

        pub(crate) fn load(one_minute: f64, cores: usize) -> Self {
            Self {
                memory: None,
                load: Some(LoadStats { one_minute, cores }),
            }
        }
    }

    impl SystemIntrospect for FixedIntrospect {
        fn memory(&self) -> Result<MemoryStats> {
            self.memory.ok_or_else(|| {
                PreflightError::new(ErrorCode::IntrospectionUnavailable, "no memory stats")
            })
        }

        fn load(&self) -> Result<LoadStats> {
            self.load.ok_or_else(|| {
                PreflightError::new(ErrorCode::IntrospectionUnavailable, "no load stats")
            })
        }
    }

    async fn memory_status(process_pct: u64, system_pct: u64) -> ProbeStatus {
        let probe = MemoryProbe::new(Arc::new(FixedIntrospect::memory_pct(process_pct, system_pct)));
        probe.run().await.status
    }

    async fn cpu_status(load: f64, cores: usize) -> ProbeStatus {
        CpuProbe::new(Arc::new(FixedIntrospect::load(load, cores)))
            .run()
            .await
            .status
    }

    #[tokio::test]
    async fn test_memory_bands() {
        assert_eq!(memory_status(50, 50).await, ProbeStatus::Healthy);
        assert_eq!(memory_status(80, 85).await, ProbeStatus::Healthy);
        assert_eq!(memory_status(82, 50).await, ProbeStatus::Warning);
        assert_eq!(memory_status(50, 86).await, ProbeStatus::Warning);
        assert_eq!(memory_status(96, 50).await, ProbeStatus::Unhealthy);
        assert_eq!(memory_status(50, 96).await, ProbeStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_memory_warning_carries_message_and_detail() {
        let probe = MemoryProbe::new(Arc::new(FixedIntrospect::memory_pct(82, 40)));
        let result = probe.run().await;
        assert_eq!(result.status, ProbeStatus::Warning);
        assert!(result.message.unwrap().contains("82.0%"));
        assert_eq!(result.detail["process_usage_pct"], 82.0);
    }

    #[tokio::test]
    async fn test_memory_introspection_failure_is_unhealthy() {
        let probe = MemoryProbe::new(Arc::new(FixedIntrospect::load(0.1, 1)));
        let result = probe.run().await;
        assert_eq!(result.status, ProbeStatus::Unhealthy);
        assert!(result.message.is_some());
    }

    #[tokio::test]
    async fn test_custom_memory_thresholds() {
        let probe = MemoryProbe::new(Arc::new(FixedIntrospect::memory_pct(60, 10)))
            .with_thresholds(MemoryThresholds {
                process_warning_pct: 50.0,
                ..Default::default()
            });
        assert_eq!(probe.run().await.status, ProbeStatus::Warning);
    }

    #[tokio::test]
    async fn test_cpu_bands() {
        assert_eq!(cpu_status(1.0, 4).await, ProbeStatus::Healthy);
        assert_eq!(cpu_status(2.8, 4).await, ProbeStatus::Healthy);
        assert_eq!(cpu_status(3.0, 4).await, ProbeStatus::Warning);
        assert_eq!(cpu_status(3.8, 4).await, ProbeStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_cpu_introspection_failure_is_unhealthy() {
        let probe = CpuProbe::new(Arc::new(FixedIntrospect::memory_pct(1, 1)));
        assert_eq!(probe.run().await.status, ProbeStatus::Unhealthy);
    }

    #[test]
    fn test_zero_denominators() {
        let stats = MemoryStats {
            process_used_bytes: 10,
            process_limit_bytes: 0,
            system_total_bytes: 0,
            system_used_bytes: 10,
        };
        assert_eq!(stats.process_usage_pct(), 0.0);
        assert_eq!(stats.system_usage_pct(), 0.0);
        assert_eq!(LoadStats { one_minute: 2.0, cores: 0 }.load_pct(), 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_os_introspect_reads_host() {
        let os = OsIntrospect::default();
        let memory = os.memory().unwrap();
        assert!(memory.system_total_bytes > 0);
        assert!(memory.process_used_bytes > 0);
        let load = os.load().unwrap();
        assert!(load.cores >= 1);
    }
}
