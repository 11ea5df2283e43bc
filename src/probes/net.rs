use crate::probes::{ConnectionCounts, GatewayInfo, IfaceInfo, ProbeError, ProbeResult};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::Ipv4Addr;

#[cfg(target_os = "linux")]
use crate::probes::run_cmd;

const RTF_GATEWAY: u16 = 0x2;

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    link_type: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    operstate: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    family: String,
    local: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpRoute {
    #[serde(default)]
    dev: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
}

#[cfg(target_os = "linux")]
pub async fn interfaces() -> ProbeResult<Vec<IfaceInfo>> {
    let addr_json = run_cmd("ip", &["-j", "addr"]).await?;
    let dhcp_devs = match run_cmd("ip", &["-j", "route"]).await {
        Ok(route_json) => parse_route_dhcp_devs(&route_json),
        // Route table is auxiliary here; without it every dhcp flag is false.
        Err(_) => HashSet::new(),
    };

    let mut ifaces = parse_ip_addr_json(&addr_json, &dhcp_devs)?;
    for iface in &mut ifaces {
        iface.speed_mbps = read_link_speed(&iface.name).await;
    }
    Ok(ifaces)
}

#[cfg(not(target_os = "linux"))]
pub async fn interfaces() -> ProbeResult<Vec<IfaceInfo>> {
    Err(ProbeError::Unsupported)
}

#[cfg(target_os = "linux")]
async fn read_link_speed(name: &str) -> Option<u64> {
    let path = format!("/sys/class/net/{name}/speed");
    tokio::fs::read_to_string(path)
        .await
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u64)
}

#[cfg(target_os = "linux")]
pub async fn gateway() -> ProbeResult<GatewayInfo> {
    let text = tokio::fs::read_to_string("/proc/net/route").await?;
    parse_default_gateway(&text).ok_or(ProbeError::Unavailable("default route"))
}

#[cfg(not(target_os = "linux"))]
pub async fn gateway() -> ProbeResult<GatewayInfo> {
    Err(ProbeError::Unsupported)
}

#[cfg(target_os = "linux")]
pub async fn connections() -> ProbeResult<ConnectionCounts> {
    let tcp4 = tokio::fs::read_to_string("/proc/net/tcp").await?;
    let mut counts = parse_proc_net_tcp(&tcp4);
    if let Ok(tcp6) = tokio::fs::read_to_string("/proc/net/tcp6").await {
        let v6 = parse_proc_net_tcp(&tcp6);
        counts.total += v6.total;
        counts.established += v6.established;
        counts.listening += v6.listening;
    }
    Ok(counts)
}

#[cfg(not(target_os = "linux"))]
pub async fn connections() -> ProbeResult<ConnectionCounts> {
    Err(ProbeError::Unsupported)
}

fn parse_ip_addr_json(
    text: &str,
    dhcp_devs: &HashSet<String>,
) -> Result<Vec<IfaceInfo>, ProbeError> {
    let links: Vec<IpLink> = serde_json::from_str(text).map_err(|err| ProbeError::Parse {
        what: "ip addr json",
        detail: err.to_string(),
    })?;

    Ok(links
        .into_iter()
        .map(|link| {
            let internal = link.link_type.as_deref() == Some("loopback")
                || link.flags.iter().any(|f| f == "LOOPBACK");
            let ipv4 = link
                .addr_info
                .iter()
                .find(|a| a.family == "inet")
                .and_then(|a| a.local.clone());
            let ipv6 = link
                .addr_info
                .iter()
                .find(|a| a.family == "inet6")
                .and_then(|a| a.local.clone());
            IfaceInfo {
                dhcp: dhcp_devs.contains(&link.ifname),
                name: link.ifname,
                link_type: link.link_type,
                mac: link.address,
                ipv4,
                ipv6,
                speed_mbps: None,
                operstate: link
                    .operstate
                    .map(|s| s.to_lowercase())
                    .unwrap_or_else(|| "unknown".to_string()),
                internal,
            }
        })
        .collect())
}

fn parse_route_dhcp_devs(text: &str) -> HashSet<String> {
    let routes: Vec<IpRoute> = serde_json::from_str(text).unwrap_or_default();
    routes
        .into_iter()
        .filter(|r| r.protocol.as_deref() == Some("dhcp"))
        .filter_map(|r| r.dev)
        .collect()
}

// /proc/net/route stores destination and gateway as little-endian hex.
fn parse_default_gateway(text: &str) -> Option<GatewayInfo> {
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[1] != "00000000" {
            continue;
        }
        let Ok(flags) = u16::from_str_radix(fields[3], 16) else {
            continue;
        };
        if flags & RTF_GATEWAY == 0 {
            continue;
        }
        let Ok(raw) = u32::from_str_radix(fields[2], 16) else {
            continue;
        };
        return Some(GatewayInfo {
            iface: fields[0].to_string(),
            address: Ipv4Addr::from(raw.swap_bytes()).to_string(),
        });
    }
    None
}

fn parse_proc_net_tcp(text: &str) -> ConnectionCounts {
    let mut counts = ConnectionCounts {
        total: 0,
        established: 0,
        listening: 0,
    };
    for line in text.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        counts.total += 1;
        match fields[3] {
            "01" => counts.established += 1,
            "0A" => counts.listening += 1,
            _ => {}
        }
    }
    counts
}
