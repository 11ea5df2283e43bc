use serde::Serialize;

// Field names and nesting are a compatibility contract with existing
// dashboard consumers; renaming anything here is a breaking change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub bios_version: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
    pub boot_mode: Option<String>,
    pub graphics: Option<String>,
    pub network: Vec<NetworkInterfaceInfo>,
    pub system_time: String,
    pub gateway: Option<String>,
    pub metrics: MetricsBlock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub link_type: Option<String>,
    pub mac: Option<String>,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    pub speed: Option<u64>,
    pub dhcp: bool,
    pub rx_sec: u64,
    pub tx_sec: u64,
    pub operstate: String,
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDeviceInfo {
    pub fs: String,
    pub size: u64,
    pub used: u64,
    pub usage_percent: Option<u64>,
    #[serde(rename = "type")]
    pub fs_type: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBlock {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub gpu: GpuMetrics,
    pub network: NetworkMetrics,
    pub disk: DiskMetrics,
    pub power: Option<PowerMetrics>,
    pub temperatures: TemperatureMetrics,
    pub storage: Vec<StorageDeviceInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuMetrics {
    pub usage: Option<u64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    pub usage: Option<u64>,
    pub used: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuMetrics {
    pub usage: Option<f64>,
    pub memory_used: Option<f64>,
    pub memory_total: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub download_speed: Option<u64>,
    pub upload_speed: Option<u64>,
    pub active_interface_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskMetrics {
    pub read_speed: Option<u64>,
    pub write_speed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerMetrics {
    pub percent: Option<f64>,
    pub is_charging: bool,
    pub ac_connected: bool,
    pub time_remaining_minutes: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureMetrics {
    pub cpu: Option<f64>,
    pub gpu: Option<f64>,
}
