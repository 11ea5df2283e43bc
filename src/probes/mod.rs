pub mod hardware;
pub mod net;
pub mod system;

use thiserror::Error;
use tokio::process::Command;

pub type ProbeResult<T> = Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe exceeded the snapshot deadline")]
    Timeout,
    #[error("not supported on this platform")]
    Unsupported,
    #[error("{0} not available")]
    Unavailable(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {what}: {detail}")]
    Parse {
        what: &'static str,
        detail: String,
    },
    #[error("{command} failed: {detail}")]
    Command {
        command: &'static str,
        detail: String,
    },
    #[error("probe task failed to run")]
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Bios,
    CpuInfo,
    Memory,
    DiskLayout,
    Graphics,
    CurrentLoad,
    Temperature,
    NetworkStats,
    DiskIo,
    Battery,
    FsSize,
    NetworkInterfaces,
    NetworkConnections,
    Gateway,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Bios => "bios",
            ProbeKind::CpuInfo => "cpu_info",
            ProbeKind::Memory => "memory",
            ProbeKind::DiskLayout => "disk_layout",
            ProbeKind::Graphics => "graphics",
            ProbeKind::CurrentLoad => "current_load",
            ProbeKind::Temperature => "temperature",
            ProbeKind::NetworkStats => "network_stats",
            ProbeKind::DiskIo => "disk_io",
            ProbeKind::Battery => "battery",
            ProbeKind::FsSize => "fs_size",
            ProbeKind::NetworkInterfaces => "network_interfaces",
            ProbeKind::NetworkConnections => "network_connections",
            ProbeKind::Gateway => "gateway",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BiosInfo {
    pub version: String,
    pub boot_mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CpuInfo {
    pub brand: String,
    pub vendor_id: String,
}

#[derive(Debug, Clone)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DiskDevice {
    pub name: String,
    pub size_bytes: u64,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct GraphicsController {
    pub model: String,
    pub utilization_percent: Option<f64>,
    pub memory_used_mb: Option<u64>,
    pub memory_total_mb: Option<u64>,
    pub temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CurrentLoad {
    pub average_percent: f64,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
}

#[derive(Debug, Clone)]
pub struct TempReading {
    pub sensor: String,
    pub celsius: f64,
}

#[derive(Debug, Clone)]
pub struct NetRate {
    pub iface: String,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct DiskIoRate {
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
}

#[derive(Debug, Clone)]
pub struct BatteryReading {
    pub percent: Option<f64>,
    pub charging: bool,
    pub ac_connected: bool,
    pub time_remaining_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FsUsage {
    pub fs: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub fs_type: String,
}

#[derive(Debug, Clone)]
pub struct IfaceInfo {
    pub name: String,
    pub link_type: Option<String>,
    pub mac: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub speed_mbps: Option<u64>,
    pub dhcp: bool,
    pub operstate: String,
    pub internal: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionCounts {
    pub total: usize,
    pub established: usize,
    pub listening: usize,
}

#[derive(Debug, Clone)]
pub struct GatewayInfo {
    pub iface: String,
    pub address: String,
}

pub(crate) async fn run_cmd(command: &'static str, args: &[&str]) -> ProbeResult<String> {
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|err| ProbeError::Command {
            command,
            detail: err.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProbeError::Command {
            command,
            detail: format!("exit status {}", output.status),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub(crate) async fn blocking<T, F>(probe: F) -> ProbeResult<T>
where
    F: FnOnce() -> ProbeResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(probe)
        .await
        .map_err(|_| ProbeError::Task)?
}
