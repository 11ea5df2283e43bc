#[cfg(not(target_os = "linux"))]
use crate::probes::ProbeError;
use crate::probes::{
    run_cmd, BatteryReading, BiosInfo, DiskDevice, DiskIoRate, GraphicsController, ProbeResult,
};
use std::time::Duration;

const DISK_IO_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
const SECTOR_SIZE: u64 = 512;

#[cfg(target_os = "linux")]
pub async fn bios() -> ProbeResult<BiosInfo> {
    let version = tokio::fs::read_to_string("/sys/class/dmi/id/bios_version").await?;
    let boot_mode = if tokio::fs::try_exists("/sys/firmware/efi")
        .await
        .unwrap_or(false)
    {
        "UEFI"
    } else {
        "Legacy"
    };
    Ok(BiosInfo {
        version: version.trim().to_string(),
        boot_mode: Some(boot_mode.to_string()),
    })
}

#[cfg(not(target_os = "linux"))]
pub async fn bios() -> ProbeResult<BiosInfo> {
    Err(ProbeError::Unsupported)
}

#[cfg(target_os = "linux")]
pub async fn disk_layout() -> ProbeResult<Vec<DiskDevice>> {
    let mut entries = tokio::fs::read_dir("/sys/block").await?;
    let mut devices = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_physical_disk(&name) {
            continue;
        }
        let base = entry.path();
        let Ok(sectors) = tokio::fs::read_to_string(base.join("size")).await else {
            continue;
        };
        let Ok(sectors) = sectors.trim().parse::<u64>() else {
            continue;
        };
        if sectors == 0 {
            continue;
        }
        let rotational = tokio::fs::read_to_string(base.join("queue/rotational"))
            .await
            .map(|v| v.trim() == "1")
            .unwrap_or(false);
        devices.push(DiskDevice {
            name,
            size_bytes: sectors * SECTOR_SIZE,
            kind: if rotational { "HDD" } else { "SSD" }.to_string(),
        });
    }
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

#[cfg(not(target_os = "linux"))]
pub async fn disk_layout() -> ProbeResult<Vec<DiskDevice>> {
    Err(ProbeError::Unsupported)
}

pub async fn graphics() -> ProbeResult<Vec<GraphicsController>> {
    if let Ok(text) = run_cmd(
        "nvidia-smi",
        &[
            "--query-gpu=name,utilization.gpu,memory.used,memory.total,temperature.gpu",
            "--format=csv,noheader,nounits",
        ],
    )
    .await
    {
        let controllers = parse_nvidia_smi_csv(&text);
        if !controllers.is_empty() {
            return Ok(controllers);
        }
    }

    let text = run_cmd("lspci", &["-mm"]).await?;
    Ok(parse_lspci_mm(&text))
}

#[cfg(target_os = "linux")]
pub async fn disk_io() -> ProbeResult<DiskIoRate> {
    let before = tokio::fs::read_to_string("/proc/diskstats").await?;
    tokio::time::sleep(DISK_IO_SAMPLE_INTERVAL).await;
    let after = tokio::fs::read_to_string("/proc/diskstats").await?;

    let (read_before, written_before) = parse_diskstats_sectors(&before);
    let (read_after, written_after) = parse_diskstats_sectors(&after);
    let elapsed = DISK_IO_SAMPLE_INTERVAL.as_secs_f64();

    Ok(DiskIoRate {
        read_bytes_per_sec: (read_after.saturating_sub(read_before) as f64 * SECTOR_SIZE as f64
            / elapsed) as u64,
        write_bytes_per_sec: (written_after.saturating_sub(written_before) as f64
            * SECTOR_SIZE as f64
            / elapsed) as u64,
    })
}

#[cfg(not(target_os = "linux"))]
pub async fn disk_io() -> ProbeResult<DiskIoRate> {
    Err(ProbeError::Unsupported)
}

#[cfg(target_os = "linux")]
pub async fn battery() -> ProbeResult<Option<BatteryReading>> {
    let mut entries = tokio::fs::read_dir("/sys/class/power_supply").await?;
    let mut battery: Option<BatteryReading> = None;
    let mut ac_connected = false;

    while let Some(entry) = entries.next_entry().await? {
        let base = entry.path();
        let Ok(kind) = tokio::fs::read_to_string(base.join("type")).await else {
            continue;
        };
        match kind.trim() {
            "Battery" => {
                let status = tokio::fs::read_to_string(base.join("status"))
                    .await
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default();
                let capacity = tokio::fs::read_to_string(base.join("capacity"))
                    .await
                    .ok()
                    .and_then(|v| v.trim().parse::<f64>().ok());
                let energy_now = tokio::fs::read_to_string(base.join("energy_now"))
                    .await
                    .ok()
                    .and_then(|v| v.trim().parse::<f64>().ok());
                let power_now = tokio::fs::read_to_string(base.join("power_now"))
                    .await
                    .ok()
                    .and_then(|v| v.trim().parse::<f64>().ok());
                battery = Some(battery_reading(&status, capacity, energy_now, power_now));
            }
            "Mains" => {
                ac_connected = tokio::fs::read_to_string(base.join("online"))
                    .await
                    .map(|v| v.trim() == "1")
                    .unwrap_or(false);
            }
            _ => {}
        }
    }

    Ok(battery.map(|mut b| {
        b.ac_connected = b.ac_connected || ac_connected;
        b
    }))
}

#[cfg(not(target_os = "linux"))]
pub async fn battery() -> ProbeResult<Option<BatteryReading>> {
    Err(ProbeError::Unsupported)
}

fn battery_reading(
    status: &str,
    capacity: Option<f64>,
    energy_now: Option<f64>,
    power_now: Option<f64>,
) -> BatteryReading {
    let charging = status.eq_ignore_ascii_case("charging");
    let discharging = status.eq_ignore_ascii_case("discharging");
    let time_remaining_minutes = match (discharging, energy_now, power_now) {
        (true, Some(energy), Some(power)) if power > 0.0 => Some((energy / power * 60.0) as u64),
        _ => None,
    };
    BatteryReading {
        percent: capacity,
        charging,
        // "Full" and "Not charging" both mean the charger is plugged in.
        ac_connected: !discharging && !status.is_empty(),
        time_remaining_minutes,
    }
}

fn parse_nvidia_smi_csv(text: &str) -> Vec<GraphicsController> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 5 || parts[0].is_empty() {
                return None;
            }
            Some(GraphicsController {
                model: parts[0].to_string(),
                utilization_percent: parse_f64_loose(parts[1]),
                memory_used_mb: parse_u64_loose(parts[2]),
                memory_total_mb: parse_u64_loose(parts[3]),
                temperature_celsius: parse_f64_loose(parts[4]),
            })
        })
        .collect()
}

// lspci -mm format: Slot "Class" "Vendor" "Device" ...
fn parse_lspci_mm(text: &str) -> Vec<GraphicsController> {
    text.lines()
        .filter_map(|line| {
            let lower = line.to_lowercase();
            if !lower.contains("vga") && !lower.contains("3d") && !lower.contains("display") {
                return None;
            }
            let parts: Vec<&str> = line.split('"').collect();
            if parts.len() < 6 {
                return None;
            }
            Some(GraphicsController {
                model: parts[5].to_string(),
                utilization_percent: None,
                memory_used_mb: None,
                memory_total_mb: None,
                temperature_celsius: None,
            })
        })
        .collect()
}

fn parse_diskstats_sectors(text: &str) -> (u64, u64) {
    let mut sectors_read = 0_u64;
    let mut sectors_written = 0_u64;
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        if !is_physical_disk(name) || is_partition(name) {
            continue;
        }
        if let Ok(read) = fields[5].parse::<u64>() {
            sectors_read += read;
        }
        if let Ok(written) = fields[9].parse::<u64>() {
            sectors_written += written;
        }
    }
    (sectors_read, sectors_written)
}

fn is_physical_disk(name: &str) -> bool {
    !["loop", "ram", "zram", "dm-", "md", "sr", "fd"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn is_partition(name: &str) -> bool {
    if let Some(rest) = name
        .strip_prefix("nvme")
        .or_else(|| name.strip_prefix("mmcblk"))
    {
        return rest.contains('p');
    }
    name.ends_with(|c: char| c.is_ascii_digit())
}

fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

fn parse_u64_loose(input: &str) -> Option<u64> {
    parse_f64_loose(input).map(|v| if v < 0.0 { 0 } else { v as u64 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nvidia_csv_parses_full_line() {
        let text = "NVIDIA GeForce RTX 3080, 17, 1024, 10240, 54\n";
        let gpus = parse_nvidia_smi_csv(text);
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].model, "NVIDIA GeForce RTX 3080");
        assert_eq!(gpus[0].utilization_percent, Some(17.0));
        assert_eq!(gpus[0].memory_used_mb, Some(1024));
        assert_eq!(gpus[0].memory_total_mb, Some(10240));
        assert_eq!(gpus[0].temperature_celsius, Some(54.0));
    }

    #[test]
    fn nvidia_csv_skips_malformed_lines() {
        assert!(parse_nvidia_smi_csv("garbage\n").is_empty());
        assert!(parse_nvidia_smi_csv("").is_empty());
    }

    #[test]
    fn lspci_picks_display_controllers_only() {
        let text = concat!(
            "00:02.0 \"VGA compatible controller\" \"Intel Corporation\" \"UHD Graphics 630\" -r02 \"Dell\" \"Device 0869\"\n",
            "00:14.0 \"USB controller\" \"Intel Corporation\" \"Cannon Lake PCH USB 3.1\" -r10 \"Dell\" \"Device 0869\"\n",
        );
        let gpus = parse_lspci_mm(text);
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].model, "UHD Graphics 630");
        assert!(gpus[0].memory_total_mb.is_none());
    }

    #[test]
    fn diskstats_sums_whole_disks_and_skips_partitions() {
        let text = concat!(
            "   8       0 sda 1000 0 2048 500 900 0 4096 400 0 600 900\n",
            "   8       1 sda1 900 0 1024 450 800 0 2048 350 0 500 800\n",
            " 259       0 nvme0n1 2000 0 8192 700 1500 0 1024 600 0 900 1300\n",
            " 259       1 nvme0n1p1 1900 0 4096 650 1400 0 512 550 0 800 1200\n",
            "   7       0 loop0 10 0 80 1 0 0 0 0 0 1 1\n",
        );
        let (read, written) = parse_diskstats_sectors(text);
        assert_eq!(read, 2048 + 8192);
        assert_eq!(written, 4096 + 1024);
    }

    #[test]
    fn partition_name_heuristics() {
        assert!(!is_partition("sda"));
        assert!(is_partition("sda1"));
        assert!(!is_partition("nvme0n1"));
        assert!(is_partition("nvme0n1p2"));
        assert!(!is_partition("mmcblk0"));
        assert!(is_partition("mmcblk0p1"));
        assert!(!is_physical_disk("loop3"));
        assert!(!is_physical_disk("dm-0"));
        assert!(is_physical_disk("vda"));
    }

    #[test]
    fn battery_reading_discharging_with_estimate() {
        let reading = battery_reading("Discharging", Some(72.0), Some(30_000_000.0), Some(12_000_000.0));
        assert_eq!(reading.percent, Some(72.0));
        assert!(!reading.charging);
        assert!(!reading.ac_connected);
        assert_eq!(reading.time_remaining_minutes, Some(150));
    }

    #[test]
    fn battery_reading_full_counts_as_ac() {
        let reading = battery_reading("Full", Some(100.0), None, None);
        assert!(!reading.charging);
        assert!(reading.ac_connected);
        assert_eq!(reading.time_remaining_minutes, None);
    }
}
