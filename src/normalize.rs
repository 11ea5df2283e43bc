use crate::aggregate::ProbeReport;
use crate::probes::{DiskDevice, GatewayInfo, GraphicsController, IfaceInfo, NetRate, TempReading};
use crate::snapshot::{
    CpuMetrics, DiskMetrics, GpuMetrics, MemoryMetrics, MetricsBlock, NetworkInterfaceInfo,
    NetworkMetrics, PowerMetrics, Snapshot, StorageDeviceInfo, TemperatureMetrics,
};
use chrono::{DateTime, SecondsFormat, Utc};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const STANDARD_RAM_SIZES_GB: [u64; 6] = [4, 8, 16, 32, 64, 128];

// Every field below degrades to None/empty when its probe failed; the
// output shape never changes with probe availability.
pub fn build_snapshot(report: &ProbeReport, now: DateTime<Utc>) -> Snapshot {
    let bios = report.bios.as_ref().ok();
    let cpu_info = report.cpu_info.as_ref().ok();
    let memory = report.memory.as_ref().ok();
    let disk_layout: &[DiskDevice] = ok_slice(&report.disk_layout);
    let controllers: &[GraphicsController] = ok_slice(&report.graphics);
    let load = report.current_load.as_ref().ok();
    let temps: &[TempReading] = ok_slice(&report.temperatures);
    let rates: &[NetRate] = ok_slice(&report.network_stats);
    let disk_io = report.disk_io.as_ref().ok();
    let battery = report.battery.as_ref().ok().and_then(|b| b.as_ref());
    let ifaces: &[IfaceInfo] = ok_slice(&report.interfaces);
    let gateway = report.gateway.as_ref().ok();

    let gpu = controllers.first();
    let active = pick_active_interface(ifaces, rates);

    Snapshot {
        bios_version: bios.map(|b| b.version.clone()),
        cpu: cpu_info.map(|c| {
            if c.brand.is_empty() {
                c.vendor_id.clone()
            } else {
                c.brand.clone()
            }
        }),
        memory: memory.map(|m| format!("{}GB", snap_to_standard_ram_gb(m.total_bytes))),
        storage: primary_storage_descriptor(disk_layout),
        boot_mode: bios.and_then(|b| b.boot_mode.clone()),
        graphics: gpu.map(|g| g.model.clone()),
        network: active_interfaces(ifaces, rates, gateway),
        system_time: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        gateway: gateway.map(|g| g.address.clone()),
        metrics: MetricsBlock {
            cpu: CpuMetrics {
                usage: load.map(|l| l.average_percent.round() as u64),
                temperature: pick_cpu_temperature(temps),
            },
            memory: MemoryMetrics {
                usage: memory.and_then(|m| usage_percent(m.used_bytes, m.total_bytes)),
                used: memory.map(|m| format!("{:.1}", m.used_bytes as f64 / GIB)),
                total: memory.map(|m| format!("{}", (m.total_bytes as f64 / GIB).round() as u64)),
            },
            gpu: GpuMetrics {
                usage: gpu.and_then(|g| g.utilization_percent),
                memory_used: gpu
                    .and_then(|g| g.memory_used_mb)
                    .map(|mb| round1(mb as f64 / 1024.0)),
                memory_total: gpu
                    .and_then(|g| g.memory_total_mb)
                    .map(|mb| (mb as f64 / 1024.0).round() as u64),
            },
            network: NetworkMetrics {
                download_speed: active.and_then(|(_, r)| bytes_per_sec_to_kbps(r.rx_bytes_per_sec)),
                upload_speed: active.and_then(|(_, r)| bytes_per_sec_to_kbps(r.tx_bytes_per_sec)),
                active_interface_name: active.map(|(iface, _)| iface.name.clone()),
            },
            disk: DiskMetrics {
                read_speed: disk_io.and_then(|d| bytes_per_sec_to_mb(d.read_bytes_per_sec)),
                write_speed: disk_io.and_then(|d| bytes_per_sec_to_mb(d.write_bytes_per_sec)),
            },
            power: battery.map(|b| PowerMetrics {
                percent: b.percent,
                is_charging: b.charging,
                ac_connected: b.ac_connected,
                time_remaining_minutes: b.time_remaining_minutes,
            }),
            temperatures: TemperatureMetrics {
                cpu: pick_cpu_temperature(temps),
                gpu: pick_gpu_temperature(controllers, temps),
            },
            storage: ok_slice(&report.fs_sizes)
                .iter()
                .map(|fs| StorageDeviceInfo {
                    fs: fs.fs.clone(),
                    size: fs.total_bytes,
                    used: fs.used_bytes,
                    usage_percent: usage_percent(fs.used_bytes, fs.total_bytes),
                    fs_type: fs.fs_type.clone(),
                })
                .collect(),
        },
    }
}

fn ok_slice<T, E>(result: &Result<Vec<T>, E>) -> &[T] {
    result.as_ref().map(|v| v.as_slice()).unwrap_or(&[])
}

// Ascending scan with strict improvement: equidistant candidates resolve
// to the smaller size (6 GiB reads as 4GB, not 8GB).
pub fn snap_to_standard_ram_gb(total_bytes: u64) -> u64 {
    let gib = total_bytes as f64 / GIB;
    let mut best = STANDARD_RAM_SIZES_GB[0];
    for candidate in STANDARD_RAM_SIZES_GB {
        if (candidate as f64 - gib).abs() < (best as f64 - gib).abs() {
            best = candidate;
        }
    }
    best
}

pub fn usage_percent(used: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    Some(((used as f64 / total as f64) * 100.0).round() as u64)
}

pub fn bytes_per_sec_to_kbps(bytes_per_sec: u64) -> Option<u64> {
    if bytes_per_sec == 0 {
        return None;
    }
    Some(((bytes_per_sec as f64) / 125_000.0).round() as u64)
}

pub fn bytes_per_sec_to_mb(bytes_per_sec: u64) -> Option<u64> {
    if bytes_per_sec == 0 {
        return None;
    }
    Some(((bytes_per_sec as f64) / (1024.0 * 1024.0)).round() as u64)
}

pub fn primary_storage_descriptor(devices: &[DiskDevice]) -> Option<String> {
    devices
        .first()
        .map(|d| format!("{:.1}TB {}", d.size_bytes as f64 / 1e12, d.kind))
}

pub fn active_interfaces(
    ifaces: &[IfaceInfo],
    rates: &[NetRate],
    gateway: Option<&GatewayInfo>,
) -> Vec<NetworkInterfaceInfo> {
    ifaces
        .iter()
        .filter(|iface| iface.operstate == "up" && !iface.internal)
        .map(|iface| {
            let rate = rates.iter().find(|r| r.iface == iface.name);
            NetworkInterfaceInfo {
                name: iface.name.clone(),
                link_type: iface.link_type.clone(),
                mac: iface.mac.clone(),
                ipv4: iface.ipv4.clone(),
                ipv6: iface.ipv6.clone(),
                speed: iface.speed_mbps,
                dhcp: iface.dhcp,
                rx_sec: rate.map(|r| r.rx_bytes_per_sec).unwrap_or(0),
                tx_sec: rate.map(|r| r.tx_bytes_per_sec).unwrap_or(0),
                operstate: iface.operstate.clone(),
                gateway: gateway
                    .filter(|gw| gw.iface == iface.name)
                    .map(|gw| gw.address.clone()),
            }
        })
        .collect()
}

// First non-internal interface with a stats entry of the same name, in
// list order. Not highest-throughput: list order is the compatibility
// contract with the previous behavior.
pub fn pick_active_interface<'a>(
    ifaces: &'a [IfaceInfo],
    rates: &'a [NetRate],
) -> Option<(&'a IfaceInfo, &'a NetRate)> {
    ifaces.iter().filter(|iface| !iface.internal).find_map(|iface| {
        rates
            .iter()
            .find(|r| r.iface == iface.name)
            .map(|rate| (iface, rate))
    })
}

pub fn pick_cpu_temperature(temps: &[TempReading]) -> Option<f64> {
    let primary_markers = ["cpu", "package", "tctl", "tdie", "coretemp", "k10temp"];
    let plausible = |t: &&TempReading| (0.0..=130.0).contains(&t.celsius);

    let primary = temps
        .iter()
        .filter(plausible)
        .filter(|t| {
            let s = t.sensor.to_lowercase();
            primary_markers.iter().any(|m| s.contains(m)) && !has_gpu_marker(&s)
        })
        .map(|t| t.celsius)
        .max_by(|a, b| a.total_cmp(b));
    if primary.is_some() {
        return primary;
    }

    temps
        .iter()
        .filter(plausible)
        .filter(|t| !has_gpu_marker(&t.sensor.to_lowercase()))
        .map(|t| t.celsius)
        .max_by(|a, b| a.total_cmp(b))
}

pub fn pick_gpu_temperature(
    controllers: &[GraphicsController],
    temps: &[TempReading],
) -> Option<f64> {
    if let Some(temp) = controllers.iter().find_map(|g| g.temperature_celsius) {
        return Some(temp);
    }
    temps
        .iter()
        .filter(|t| (0.0..=130.0).contains(&t.celsius))
        .filter(|t| has_gpu_marker(&t.sensor.to_lowercase()))
        .map(|t| t.celsius)
        .max_by(|a, b| a.total_cmp(b))
}

fn has_gpu_marker(sensor: &str) -> bool {
    ["gpu", "nvidia", "amdgpu", "radeon"]
        .iter()
        .any(|m| sensor.contains(m))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ProbeReport;
    use crate::probes::{FsUsage, MemoryInfo};
    use chrono::TimeZone;

    const GIB_U64: u64 = 1024 * 1024 * 1024;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn iface(name: &str, operstate: &str, internal: bool) -> IfaceInfo {
        IfaceInfo {
            name: name.to_string(),
            link_type: Some("ether".to_string()),
            mac: Some("52:54:00:12:34:56".to_string()),
            ipv4: Some("192.168.1.20".to_string()),
            ipv6: None,
            speed_mbps: Some(1000),
            dhcp: false,
            operstate: operstate.to_string(),
            internal,
        }
    }

    fn rate(iface: &str, rx: u64, tx: u64) -> NetRate {
        NetRate {
            iface: iface.to_string(),
            rx_bytes_per_sec: rx,
            tx_bytes_per_sec: tx,
        }
    }

    #[test]
    fn ram_snapping_minimizes_distance() {
        assert_eq!(snap_to_standard_ram_gb(4 * GIB_U64), 4);
        assert_eq!(snap_to_standard_ram_gb(5 * GIB_U64), 4);
        assert_eq!(snap_to_standard_ram_gb(17 * GIB_U64), 16);
        assert_eq!(snap_to_standard_ram_gb(200 * GIB_U64), 128);
    }

    #[test]
    fn ram_snapping_ties_resolve_to_smaller() {
        // 6 is equidistant to 4 and 8; 12 to 8 and 16; 96 to 64 and 128.
        assert_eq!(snap_to_standard_ram_gb(6 * GIB_U64), 4);
        assert_eq!(snap_to_standard_ram_gb(12 * GIB_U64), 8);
        assert_eq!(snap_to_standard_ram_gb(96 * GIB_U64), 64);
    }

    #[test]
    fn usage_percent_rounds_and_guards_zero() {
        assert_eq!(usage_percent(8 * GIB_U64, 16 * GIB_U64), Some(50));
        assert_eq!(usage_percent(1, 3), Some(33));
        assert_eq!(usage_percent(2, 3), Some(67));
        assert_eq!(usage_percent(5, 0), None);
    }

    #[test]
    fn kbps_conversion_matches_contract() {
        assert_eq!(bytes_per_sec_to_kbps(1_000_000), Some(8));
        assert_eq!(bytes_per_sec_to_kbps(437_500), Some(4));
        assert_eq!(bytes_per_sec_to_kbps(0), None);
    }

    #[test]
    fn mb_conversion_matches_contract() {
        assert_eq!(bytes_per_sec_to_mb(2 * 1024 * 1024), Some(2));
        assert_eq!(bytes_per_sec_to_mb(0), None);
    }

    #[test]
    fn storage_descriptor_uses_first_device() {
        let devices = vec![
            DiskDevice {
                name: "nvme0n1".to_string(),
                size_bytes: 1_000_204_886_016,
                kind: "SSD".to_string(),
            },
            DiskDevice {
                name: "sda".to_string(),
                size_bytes: 4_000_787_030_016,
                kind: "HDD".to_string(),
            },
        ];
        assert_eq!(
            primary_storage_descriptor(&devices).as_deref(),
            Some("1.0TB SSD")
        );
        assert_eq!(primary_storage_descriptor(&[]), None);
    }

    #[test]
    fn active_interfaces_filters_and_joins_rates() {
        let ifaces = vec![
            iface("lo", "unknown", true),
            iface("eth0", "up", false),
            iface("wlan0", "down", false),
            iface("eth1", "up", false),
        ];
        let rates = vec![rate("eth0", 5000, 2000)];
        let gateway = GatewayInfo {
            iface: "eth0".to_string(),
            address: "192.168.1.1".to_string(),
        };

        let out = active_interfaces(&ifaces, &rates, Some(&gateway));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "eth0");
        assert_eq!(out[0].rx_sec, 5000);
        assert_eq!(out[0].tx_sec, 2000);
        assert_eq!(out[0].gateway.as_deref(), Some("192.168.1.1"));
        // No stats entry: rates default to 0 instead of dropping the interface.
        assert_eq!(out[1].name, "eth1");
        assert_eq!(out[1].rx_sec, 0);
        assert_eq!(out[1].tx_sec, 0);
        assert_eq!(out[1].gateway, None);
    }

    #[test]
    fn active_pick_is_first_match_not_highest_throughput() {
        let ifaces = vec![
            iface("lo", "unknown", true),
            iface("eth0", "up", false),
            iface("eth1", "up", false),
        ];
        let rates = vec![rate("eth1", 9_999_999, 9_999_999), rate("eth0", 10, 10)];
        let (picked, picked_rate) =
            pick_active_interface(&ifaces, &rates).expect("eth0 should match");
        assert_eq!(picked.name, "eth0");
        assert_eq!(picked_rate.rx_bytes_per_sec, 10);
    }

    #[test]
    fn active_pick_skips_interfaces_without_stats() {
        let ifaces = vec![iface("eth0", "up", false), iface("eth1", "up", false)];
        let rates = vec![rate("eth1", 100, 100)];
        let (picked, _) = pick_active_interface(&ifaces, &rates).expect("eth1 should match");
        assert_eq!(picked.name, "eth1");
    }

    #[test]
    fn cpu_temperature_prefers_package_sensors() {
        let temps = vec![
            TempReading {
                sensor: "acpitz temp1".to_string(),
                celsius: 40.0,
            },
            TempReading {
                sensor: "coretemp Package id 0".to_string(),
                celsius: 55.0,
            },
            TempReading {
                sensor: "nvidia gpu".to_string(),
                celsius: 70.0,
            },
        ];
        assert_eq!(pick_cpu_temperature(&temps), Some(55.0));
        assert_eq!(pick_gpu_temperature(&[], &temps), Some(70.0));
    }

    #[test]
    fn memory_scenario_eight_of_sixteen_gib() {
        let mut report = ProbeReport::unavailable();
        report.memory = Ok(MemoryInfo {
            total_bytes: 17_179_869_184,
            used_bytes: 8_589_934_592,
        });

        let snapshot = build_snapshot(&report, fixed_now());
        assert_eq!(snapshot.memory.as_deref(), Some("16GB"));
        assert_eq!(snapshot.metrics.memory.used.as_deref(), Some("8.0"));
        assert_eq!(snapshot.metrics.memory.total.as_deref(), Some("16"));
        assert_eq!(snapshot.metrics.memory.usage, Some(50));
    }

    #[test]
    fn download_speed_scenario_one_megabyte_per_sec() {
        let mut report = ProbeReport::unavailable();
        report.interfaces = Ok(vec![iface("eth0", "up", false)]);
        report.network_stats = Ok(vec![rate("eth0", 1_000_000, 0)]);

        let snapshot = build_snapshot(&report, fixed_now());
        assert_eq!(snapshot.metrics.network.download_speed, Some(8));
        // tx counter is zero: null, not 0.
        assert_eq!(snapshot.metrics.network.upload_speed, None);
        assert_eq!(
            snapshot.metrics.network.active_interface_name.as_deref(),
            Some("eth0")
        );
    }

    #[test]
    fn empty_disk_layout_keeps_fs_storage_list() {
        let mut report = ProbeReport::unavailable();
        report.disk_layout = Ok(Vec::new());
        report.fs_sizes = Ok(vec![
            FsUsage {
                fs: "/".to_string(),
                total_bytes: 100,
                used_bytes: 25,
                fs_type: "ext4".to_string(),
            },
            FsUsage {
                fs: "/empty".to_string(),
                total_bytes: 0,
                used_bytes: 0,
                fs_type: "ext4".to_string(),
            },
        ]);

        let snapshot = build_snapshot(&report, fixed_now());
        assert_eq!(snapshot.storage, None);
        assert_eq!(snapshot.metrics.storage.len(), 2);
        assert_eq!(snapshot.metrics.storage[0].usage_percent, Some(25));
        assert_eq!(snapshot.metrics.storage[1].usage_percent, None);
    }

    #[test]
    fn all_failed_report_degrades_every_field_to_null() {
        let report = ProbeReport::unavailable();
        let snapshot = build_snapshot(&report, fixed_now());
        let value = serde_json::to_value(&snapshot).expect("snapshot serializes");

        for key in [
            "biosVersion", "cpu", "memory", "storage", "bootMode", "graphics", "gateway",
        ] {
            assert!(value[key].is_null(), "{key} should be null");
        }
        assert_eq!(value["network"], serde_json::json!([]));
        assert_eq!(value["systemTime"], "2025-06-01T12:00:00Z");
        let metrics = &value["metrics"];
        assert!(metrics["cpu"]["usage"].is_null());
        assert!(metrics["memory"]["used"].is_null());
        assert!(metrics["gpu"]["memoryTotal"].is_null());
        assert!(metrics["network"]["downloadSpeed"].is_null());
        assert!(metrics["disk"]["readSpeed"].is_null());
        assert!(metrics["power"].is_null());
        assert!(metrics["temperatures"]["cpu"].is_null());
        assert_eq!(metrics["storage"], serde_json::json!([]));
    }

    #[test]
    fn gpu_memory_converts_mb_to_gb() {
        let mut report = ProbeReport::unavailable();
        report.graphics = Ok(vec![GraphicsController {
            model: "NVIDIA GeForce RTX 3080".to_string(),
            utilization_percent: Some(17.0),
            memory_used_mb: Some(1536),
            memory_total_mb: Some(10240),
            temperature_celsius: Some(54.0),
        }]);

        let snapshot = build_snapshot(&report, fixed_now());
        assert_eq!(snapshot.graphics.as_deref(), Some("NVIDIA GeForce RTX 3080"));
        assert_eq!(snapshot.metrics.gpu.usage, Some(17.0));
        assert_eq!(snapshot.metrics.gpu.memory_used, Some(1.5));
        assert_eq!(snapshot.metrics.gpu.memory_total, Some(10));
        assert_eq!(snapshot.metrics.temperatures.gpu, Some(54.0));
    }
}
