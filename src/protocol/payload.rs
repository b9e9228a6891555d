//! Outgoing message payload and the device record embedded in it.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Device/geo record sent alongside each message.
///
/// The `Default` values describe a desktop client in Washington, D.C. and can
/// be replaced wholesale through the dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub country_code: String,
    pub country_name: String,
    pub city: String,
    pub postal: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "IPv4")]
    pub ipv4: String,
    pub state: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
}

impl DeviceInfo {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            country_code: "US".into(),
            country_name: "United States".into(),
            city: "Washington, D.C.".into(),
            postal: "20001".into(),
            latitude: 38.895111,
            longitude: -77.036369,
            ipv4: "173.166.164.121".into(),
            state: "District Of Columbia".into(),
            user_agent: String::new(),
        }
    }
}

/// Body of the message POST: `{slug, content, device, tips}`.
///
/// `device` travels as a JSON-encoded string, not a nested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    #[serde(rename = "slug")]
    target_slug: String,
    content: String,
    device: String,
    #[serde(rename = "tips")]
    annotations: Vec<String>,
}

impl DispatchPayload {
    pub fn new(
        target_slug: impl Into<String>,
        content: impl Into<String>,
        device: &DeviceInfo,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            target_slug: target_slug.into(),
            content: content.into(),
            device: serde_json::to_string(device)?,
            annotations: Vec::new(),
        })
    }

    pub fn target_slug(&self) -> &str {
        &self.target_slug
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Serialized device record as it goes on the wire.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Replaces the device field with the serialized form of `device`.
    pub fn set_device<T: Serialize + ?Sized>(&mut self, device: &T) -> Result<(), serde_json::Error> {
        self.device = serde_json::to_string(device)?;
        Ok(())
    }

    pub fn add_annotation(&mut self, text: impl Into<String>) {
        self.annotations.push(text.into());
    }

    pub fn clear_annotations(&mut self) {
        self.annotations.clear();
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Key identifying this exact payload in the response cache.
    pub fn cache_key(&self) -> String {
        json!([self.target_slug, self.content, self.device, self.annotations]).to_string()
    }
}
