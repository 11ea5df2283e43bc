use crate::probes::{
    blocking, CpuInfo, CurrentLoad, FsUsage, MemoryInfo, NetRate, ProbeError, ProbeResult,
    TempReading,
};
use std::thread;
use std::time::Duration;
use sysinfo::{ComponentExt, CpuExt, DiskExt, NetworkExt, NetworksExt, System, SystemExt};

// sysinfo needs two refreshes with a gap before usage/rate figures are
// meaningful; the first refresh only seeds the counters.
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);
const NET_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

pub async fn cpu_info() -> ProbeResult<CpuInfo> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_cpu();
        let first = system
            .cpus()
            .first()
            .ok_or(ProbeError::Unavailable("cpu information"))?;
        Ok(CpuInfo {
            brand: first.brand().trim().to_string(),
            vendor_id: first.vendor_id().to_string(),
        })
    })
    .await
}

pub async fn memory() -> ProbeResult<MemoryInfo> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_memory();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(ProbeError::Unavailable("memory totals"));
        }
        Ok(MemoryInfo {
            total_bytes,
            used_bytes: system.used_memory(),
        })
    })
    .await
}

pub async fn current_load() -> ProbeResult<CurrentLoad> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_cpu();
        thread::sleep(CPU_SAMPLE_INTERVAL);
        system.refresh_cpu();

        if system.cpus().is_empty() {
            return Err(ProbeError::Unavailable("cpu load"));
        }
        let sum: f32 = system.cpus().iter().map(|c| c.cpu_usage()).sum();
        let average_percent = (sum / system.cpus().len() as f32) as f64;

        let load = system.load_average();
        Ok(CurrentLoad {
            average_percent,
            load_one: load.one,
            load_five: load.five,
            load_fifteen: load.fifteen,
        })
    })
    .await
}

pub async fn temperatures() -> ProbeResult<Vec<TempReading>> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_components_list();
        system.refresh_components();
        let temps = system
            .components()
            .iter()
            .map(|c| TempReading {
                sensor: c.label().to_string(),
                celsius: c.temperature() as f64,
            })
            .filter(|t| t.celsius > 0.0)
            .collect();
        Ok(temps)
    })
    .await
}

pub async fn fs_sizes() -> ProbeResult<Vec<FsUsage>> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_disks_list();
        system.refresh_disks();
        let sizes = system
            .disks()
            .iter()
            .map(|d| {
                let total = d.total_space();
                FsUsage {
                    fs: d.mount_point().to_string_lossy().to_string(),
                    total_bytes: total,
                    used_bytes: total.saturating_sub(d.available_space()),
                    fs_type: String::from_utf8_lossy(d.file_system()).to_string(),
                }
            })
            .collect();
        Ok(sizes)
    })
    .await
}

pub async fn network_stats() -> ProbeResult<Vec<NetRate>> {
    blocking(|| {
        let mut system = System::new();
        system.refresh_networks_list();
        system.refresh_networks();
        thread::sleep(NET_SAMPLE_INTERVAL);
        system.refresh_networks();

        let elapsed = NET_SAMPLE_INTERVAL.as_secs_f64();
        let rates = system
            .networks()
            .iter()
            .map(|(iface, data)| NetRate {
                iface: iface.to_string(),
                rx_bytes_per_sec: (data.received() as f64 / elapsed) as u64,
                tx_bytes_per_sec: (data.transmitted() as f64 / elapsed) as u64,
            })
            .collect();
        Ok(rates)
    })
    .await
}
