//! SSDP discovery and Roku External Control Protocol client.
//!
//! Rokus announce themselves over SSDP with the `roku:ecp` search target
//! and expose a plain HTTP API on port 8060 whose query endpoints return
//! flat XML. This module adapts that protocol to the [`DeviceProvider`] /
//! [`DeviceHandle`] seam; the merge core never depends on it directly.

use crate::discovery::{AppEntry, DeviceHandle, DeviceProvider};
use crate::error::DiscoveryError;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
const SSDP_SEARCH_TARGET: &str = "roku:ecp";
const SSDP_SEARCH_WINDOW: Duration = Duration::from_secs(10);

const ECP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ECP_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

fn build_ecp_http_client() -> Result<Client, DiscoveryError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(ECP_CONNECT_TIMEOUT)
        .timeout(ECP_REQUEST_TIMEOUT)
        .build()
        .map_err(DiscoveryError::Transport)
}

/// Finds the first Roku that answers an SSDP `M-SEARCH`.
pub struct SsdpDeviceProvider {
    search_window: Duration,
}

impl SsdpDeviceProvider {
    pub fn new() -> Self {
        Self {
            search_window: SSDP_SEARCH_WINDOW,
        }
    }

    pub fn with_search_window(search_window: Duration) -> Self {
        Self { search_window }
    }
}

impl Default for SsdpDeviceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProvider for SsdpDeviceProvider {
    async fn discover(&self) -> Result<Box<dyn DeviceHandle>, DiscoveryError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST_ADDR}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             ST: {SSDP_SEARCH_TARGET}\r\n\
             MX: 3\r\n\r\n"
        );
        socket
            .send_to(request.as_bytes(), SSDP_MULTICAST_ADDR)
            .await?;

        let mut buf = [0u8; 2048];
        let location = tokio::time::timeout(self.search_window, async {
            // Non-Roku SSDP traffic can arrive on the same socket; keep
            // reading until a response carries a LOCATION header.
            loop {
                let (len, peer) = socket.recv_from(&mut buf).await?;
                let response = String::from_utf8_lossy(&buf[..len]);
                if let Some(location) = parse_location(&response) {
                    debug!("Roku responded from {peer}: {location}");
                    return Ok::<_, DiscoveryError>(location);
                }
            }
        })
        .await
        .map_err(|_| DiscoveryError::NoDeviceFound)??;

        Ok(Box::new(EcpDevice::new(&location)?))
    }
}

/// Extract the LOCATION header from an SSDP response.
fn parse_location(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case("location") {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

fn host_from_location(location: &str) -> String {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))
        .unwrap_or(location);
    let host_port = rest.split('/').next().unwrap_or(rest);
    host_port.split(':').next().unwrap_or(host_port).to_string()
}

/// One Roku reached over ECP.
pub struct EcpDevice {
    client: Client,
    base_url: String,
    ip: String,
}

impl EcpDevice {
    /// Build a handle from an SSDP LOCATION URL.
    pub fn new(location: &str) -> Result<Self, DiscoveryError> {
        let base_url = location.trim_end_matches('/').to_string();
        let ip = host_from_location(&base_url);
        Ok(Self {
            client: build_ecp_http_client()?,
            base_url,
            ip,
        })
    }

    /// Build a handle for a known address, skipping discovery.
    pub fn from_ip(ip: &str) -> Result<Self, DiscoveryError> {
        Self::new(&format!("http://{ip}:8060"))
    }

    async fn query(&self, endpoint: &str) -> Result<String, DiscoveryError> {
        let url = format!("{}/query/{}", self.base_url, endpoint);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DeviceHandle for EcpDevice {
    fn ip(&self) -> &str {
        &self.ip
    }

    async fn fetch_info(&self) -> Result<Map<String, Value>, DiscoveryError> {
        let xml = self.query("device-info").await?;
        parse_device_info(&xml)
    }

    async fn fetch_apps(&self) -> Result<Vec<AppEntry>, DiscoveryError> {
        let xml = self.query("apps").await?;
        parse_apps(&xml)
    }
}

/// Parse `/query/device-info`: one element per metadata field.
/// Kebab-case element names become camelCase keys, boolean text becomes
/// JSON booleans, everything else stays a string.
fn parse_device_info(xml: &str) -> Result<Map<String, Value>, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut info = Map::new();
    let mut depth = 0usize;
    let mut current: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                if depth == 2 {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                    current = Some(camel_case(&name));
                }
            }
            Ok(Event::Text(text)) => {
                // Only text directly under a depth-2 field counts; text
                // inside a nested child is not that field's value.
                if depth == 2 {
                    if let Some(key) = current.take() {
                        let value = text
                            .unescape()
                            .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;
                        info.insert(key, coerce_scalar(value.as_ref()));
                    }
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                current = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::InvalidResponse(e.to_string())),
            Ok(_) => {}
        }
    }
    Ok(info)
}

/// Parse `/query/apps`: `<app id="...">Name</app>` entries in document order.
fn parse_apps(xml: &str) -> Result<Vec<AppEntry>, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut apps = Vec::new();
    let mut current_id: Option<String> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) if start.name().as_ref() == b"app" => {
                let mut id = String::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;
                    if attr.key.as_ref() == b"id" {
                        id = String::from_utf8_lossy(&attr.value).into_owned();
                    }
                }
                current_id = Some(id);
            }
            Ok(Event::Text(text)) => {
                if let Some(id) = current_id.take() {
                    let name = text
                        .unescape()
                        .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?
                        .into_owned();
                    apps.push(AppEntry { id, name });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DiscoveryError::InvalidResponse(e.to_string())),
            Ok(_) => {}
        }
    }
    Ok(apps)
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn coerce_scalar(text: &str) -> Value {
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::from(other),
    }
}
