//! Descriptor Builder
//!
//! Queries a discovery provider for a Roku device's metadata and installed
//! channels and shapes them into an `accessories` fragment ready to be
//! merged into a Homebridge config. The provider is a trait seam: the SSDP
//! + ECP implementation lives in [`ecp`], tests supply their own.

use crate::error::DiscoveryError;
use async_trait::async_trait;
use futures::future::try_join;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub mod ecp;

/// One installed channel, as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub id: String,
    pub name: String,
}

/// A discovered device. Metadata and app-list requests are independent
/// and may be issued concurrently.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    /// IP address the device was discovered at.
    fn ip(&self) -> &str;

    /// Fetch the device metadata map (model, serial, and so on).
    async fn fetch_info(&self) -> Result<Map<String, Value>, DiscoveryError>;

    /// Fetch the installed apps, in the device's reported order.
    async fn fetch_apps(&self) -> Result<Vec<AppEntry>, DiscoveryError>;
}

/// Discovery seam. `discover` resolves to the first responding device;
/// the provider owns its own search and timeout policy.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    async fn discover(&self) -> Result<Box<dyn DeviceHandle>, DiscoveryError>;
}

/// Discover a device and build its configuration fragment.
///
/// The info and apps sub-requests run concurrently; if either fails the
/// whole operation fails and no partial fragment is returned.
pub async fn build_descriptor_fragment(
    provider: &dyn DeviceProvider,
) -> Result<Value, DiscoveryError> {
    let handle = provider.discover().await?;
    let (info, apps) = try_join(handle.fetch_info(), handle.fetch_apps()).await?;

    let inputs: Vec<Value> = apps
        .into_iter()
        .map(|app| json!({ "id": app.id, "name": app.name }))
        .collect();

    Ok(json!({
        "accessories": [{
            "name": "Roku",
            "accessory": "Roku",
            "ip": handle.ip(),
            "inputs": inputs,
            "info": info,
        }]
    }))
}

#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MockDeviceHandle {
    pub ip: String,
    pub info: Map<String, Value>,
    pub apps: Vec<AppEntry>,
    pub fail_info: bool,
    pub fail_apps: bool,
}

#[cfg(test)]
impl MockDeviceHandle {
    pub fn healthy(ip: &str, info: Map<String, Value>, apps: Vec<AppEntry>) -> Self {
        Self {
            ip: ip.to_string(),
            info,
            apps,
            fail_info: false,
            fail_apps: false,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DeviceHandle for MockDeviceHandle {
    fn ip(&self) -> &str {
        &self.ip
    }

    async fn fetch_info(&self) -> Result<Map<String, Value>, DiscoveryError> {
        if self.fail_info {
            return Err(DiscoveryError::InvalidResponse("info unavailable".into()));
        }
        Ok(self.info.clone())
    }

    async fn fetch_apps(&self) -> Result<Vec<AppEntry>, DiscoveryError> {
        if self.fail_apps {
            return Err(DiscoveryError::InvalidResponse("apps unavailable".into()));
        }
        Ok(self.apps.clone())
    }
}

#[cfg(test)]
pub(crate) struct MockDeviceProvider {
    handle: Option<MockDeviceHandle>,
}

#[cfg(test)]
impl MockDeviceProvider {
    pub fn with_handle(handle: MockDeviceHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn empty() -> Self {
        Self { handle: None }
    }
}

#[cfg(test)]
#[async_trait]
impl DeviceProvider for MockDeviceProvider {
    async fn discover(&self) -> Result<Box<dyn DeviceHandle>, DiscoveryError> {
        match &self.handle {
            Some(handle) => Ok(Box::new(handle.clone())),
            None => Err(DiscoveryError::NoDeviceFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("modelName".to_string(), Value::from("Roku 3"));
        info.insert("serialNumber".to_string(), Value::from("1GU48T017973"));
        info
    }

    fn sample_apps() -> Vec<AppEntry> {
        vec![
            AppEntry {
                id: "12".to_string(),
                name: "Netflix".to_string(),
            },
            AppEntry {
                id: "2285".to_string(),
                name: "Hulu".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_fragment_shape() {
        let provider = MockDeviceProvider::with_handle(MockDeviceHandle::healthy(
            "192.168.1.17",
            sample_info(),
            sample_apps(),
        ));

        let fragment = build_descriptor_fragment(&provider).await.unwrap();
        assert_eq!(
            fragment,
            serde_json::json!({
                "accessories": [{
                    "name": "Roku",
                    "accessory": "Roku",
                    "ip": "192.168.1.17",
                    "inputs": [
                        { "id": "12", "name": "Netflix" },
                        { "id": "2285", "name": "Hulu" },
                    ],
                    "info": {
                        "modelName": "Roku 3",
                        "serialNumber": "1GU48T017973",
                    },
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_app_order_is_preserved() {
        let mut apps = sample_apps();
        apps.reverse();
        let provider = MockDeviceProvider::with_handle(MockDeviceHandle::healthy(
            "192.168.1.17",
            sample_info(),
            apps,
        ));

        let fragment = build_descriptor_fragment(&provider).await.unwrap();
        let inputs = fragment["accessories"][0]["inputs"].as_array().unwrap();
        assert_eq!(inputs[0]["name"], "Hulu");
        assert_eq!(inputs[1]["name"], "Netflix");
    }

    #[tokio::test]
    async fn test_no_device_found() {
        let err = build_descriptor_fragment(&MockDeviceProvider::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::NoDeviceFound));
    }

    #[tokio::test]
    async fn test_failed_sub_request_fails_the_whole_build() {
        let mut handle = MockDeviceHandle::healthy("192.168.1.17", sample_info(), sample_apps());
        handle.fail_apps = true;
        let provider = MockDeviceProvider::with_handle(handle);

        let err = build_descriptor_fragment(&provider).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidResponse(_)));
    }
}
