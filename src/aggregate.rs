use crate::metrics::Metrics;
use crate::normalize;
use crate::probes::{
    self, BatteryReading, BiosInfo, ConnectionCounts, CpuInfo, CurrentLoad, DiskDevice,
    DiskIoRate, FsUsage, GatewayInfo, GraphicsController, IfaceInfo, MemoryInfo, NetRate,
    ProbeError, ProbeKind, ProbeResult, TempReading,
};
use crate::snapshot::Snapshot;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

const PROBE_COUNT: usize = 14;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("every telemetry probe failed")]
    AllProbesFailed,
}

#[derive(Debug)]
pub struct ProbeReport {
    pub bios: ProbeResult<BiosInfo>,
    pub cpu_info: ProbeResult<CpuInfo>,
    pub memory: ProbeResult<MemoryInfo>,
    pub disk_layout: ProbeResult<Vec<DiskDevice>>,
    pub graphics: ProbeResult<Vec<GraphicsController>>,
    pub current_load: ProbeResult<CurrentLoad>,
    pub temperatures: ProbeResult<Vec<TempReading>>,
    pub network_stats: ProbeResult<Vec<NetRate>>,
    pub disk_io: ProbeResult<DiskIoRate>,
    pub battery: ProbeResult<Option<BatteryReading>>,
    pub fs_sizes: ProbeResult<Vec<FsUsage>>,
    pub interfaces: ProbeResult<Vec<IfaceInfo>>,
    pub connections: ProbeResult<ConnectionCounts>,
    pub gateway: ProbeResult<GatewayInfo>,
}

impl ProbeReport {
    pub fn failures(&self) -> Vec<(ProbeKind, &ProbeError)> {
        let mut out = Vec::new();
        if let Err(err) = &self.bios {
            out.push((ProbeKind::Bios, err));
        }
        if let Err(err) = &self.cpu_info {
            out.push((ProbeKind::CpuInfo, err));
        }
        if let Err(err) = &self.memory {
            out.push((ProbeKind::Memory, err));
        }
        if let Err(err) = &self.disk_layout {
            out.push((ProbeKind::DiskLayout, err));
        }
        if let Err(err) = &self.graphics {
            out.push((ProbeKind::Graphics, err));
        }
        if let Err(err) = &self.current_load {
            out.push((ProbeKind::CurrentLoad, err));
        }
        if let Err(err) = &self.temperatures {
            out.push((ProbeKind::Temperature, err));
        }
        if let Err(err) = &self.network_stats {
            out.push((ProbeKind::NetworkStats, err));
        }
        if let Err(err) = &self.disk_io {
            out.push((ProbeKind::DiskIo, err));
        }
        if let Err(err) = &self.battery {
            out.push((ProbeKind::Battery, err));
        }
        if let Err(err) = &self.fs_sizes {
            out.push((ProbeKind::FsSize, err));
        }
        if let Err(err) = &self.interfaces {
            out.push((ProbeKind::NetworkInterfaces, err));
        }
        if let Err(err) = &self.connections {
            out.push((ProbeKind::NetworkConnections, err));
        }
        if let Err(err) = &self.gateway {
            out.push((ProbeKind::Gateway, err));
        }
        out
    }

    pub fn all_failed(&self) -> bool {
        self.failures().len() == PROBE_COUNT
    }

    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self {
            bios: Err(ProbeError::Unsupported),
            cpu_info: Err(ProbeError::Unsupported),
            memory: Err(ProbeError::Unsupported),
            disk_layout: Err(ProbeError::Unsupported),
            graphics: Err(ProbeError::Unsupported),
            current_load: Err(ProbeError::Unsupported),
            temperatures: Err(ProbeError::Unsupported),
            network_stats: Err(ProbeError::Unsupported),
            disk_io: Err(ProbeError::Unsupported),
            battery: Err(ProbeError::Unsupported),
            fs_sizes: Err(ProbeError::Unsupported),
            interfaces: Err(ProbeError::Unsupported),
            connections: Err(ProbeError::Unsupported),
            gateway: Err(ProbeError::Unsupported),
        }
    }
}

pub struct Aggregator {
    probe_deadline: Duration,
}

impl Aggregator {
    pub fn new(probe_deadline: Duration) -> Self {
        Self { probe_deadline }
    }

    pub async fn snapshot(&self, metrics: &Metrics) -> Result<Snapshot, AggregateError> {
        let report = self.collect().await;

        for (kind, err) in report.failures() {
            metrics.inc_probe_error(kind.as_str());
            warn!(probe = kind.as_str(), error = %err, "probe failed");
        }
        if let Ok(counts) = &report.connections {
            debug!(
                total = counts.total,
                established = counts.established,
                listening = counts.listening,
                "network connection counts"
            );
        }
        if let Ok(load) = &report.current_load {
            debug!(
                one = load.load_one,
                five = load.load_five,
                fifteen = load.load_fifteen,
                "load averages"
            );
        }

        if report.all_failed() {
            return Err(AggregateError::AllProbesFailed);
        }
        Ok(normalize::build_snapshot(&report, Utc::now()))
    }

    // One shared deadline across the whole fan-out: a slow probe never
    // holds the request past the configured timeout, and a probe that
    // misses the deadline settles as Timeout instead of aborting siblings.
    async fn collect(&self) -> ProbeReport {
        let deadline = Instant::now() + self.probe_deadline;
        let (
            bios,
            cpu_info,
            memory,
            disk_layout,
            graphics,
            current_load,
            temperatures,
            network_stats,
            disk_io,
            battery,
            fs_sizes,
            interfaces,
            connections,
            gateway,
        ) = tokio::join!(
            with_deadline(deadline, probes::hardware::bios()),
            with_deadline(deadline, probes::system::cpu_info()),
            with_deadline(deadline, probes::system::memory()),
            with_deadline(deadline, probes::hardware::disk_layout()),
            with_deadline(deadline, probes::hardware::graphics()),
            with_deadline(deadline, probes::system::current_load()),
            with_deadline(deadline, probes::system::temperatures()),
            with_deadline(deadline, probes::system::network_stats()),
            with_deadline(deadline, probes::hardware::disk_io()),
            with_deadline(deadline, probes::hardware::battery()),
            with_deadline(deadline, probes::system::fs_sizes()),
            with_deadline(deadline, probes::net::interfaces()),
            with_deadline(deadline, probes::net::connections()),
            with_deadline(deadline, probes::net::gateway()),
        );

        ProbeReport {
            bios,
            cpu_info,
            memory,
            disk_layout,
            graphics,
            current_load,
            temperatures,
            network_stats,
            disk_io,
            battery,
            fs_sizes,
            interfaces,
            connections,
            gateway,
        }
    }
}

async fn with_deadline<T>(
    deadline: Instant,
    probe: impl Future<Output = ProbeResult<T>>,
) -> ProbeResult<T> {
    match timeout_at(deadline, probe).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout),
    }
}
