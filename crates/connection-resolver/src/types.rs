use crate::error::{ConnectionError, ConnectionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

/// Declared camera type, as recorded by the camera registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    Ip,
    Rtsp,
    Onvif,
    Usb,
    Analog,
    Webcam,
}

impl CameraType {
    pub const ALL: [CameraType; 6] = [
        CameraType::Ip,
        CameraType::Rtsp,
        CameraType::Onvif,
        CameraType::Usb,
        CameraType::Analog,
        CameraType::Webcam,
    ];

    /// Stable lowercase tag
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraType::Ip => "ip",
            CameraType::Rtsp => "rtsp",
            CameraType::Onvif => "onvif",
            CameraType::Usb => "usb",
            CameraType::Analog => "analog",
            CameraType::Webcam => "webcam",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CameraType::Ip => "IP Camera",
            CameraType::Rtsp => "RTSP Stream",
            CameraType::Onvif => "ONVIF Camera",
            CameraType::Usb => "USB Camera",
            CameraType::Analog => "Analog Camera",
            CameraType::Webcam => "Webcam",
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CameraType {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        CameraType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(needle) || t.display_name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ConnectionError::Validation(vec![format!("unknown camera type '{}'", s)]))
    }
}

/// Requested stream quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamQuality {
    #[default]
    High,
    Medium,
    Low,
}

impl StreamQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamQuality::High => "high",
            StreamQuality::Medium => "medium",
            StreamQuality::Low => "low",
        }
    }

    /// 1-based channel index used by templated stream paths
    pub fn channel(&self) -> u8 {
        match self {
            StreamQuality::High => 1,
            StreamQuality::Medium => 2,
            StreamQuality::Low => 3,
        }
    }
}

/// Host and port of a networked camera
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub host: String,
    pub port: u16,
}

impl NetworkAddress {
    /// Brackets around an IPv6 literal are dropped; `authority` re-adds them
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let trimmed = host.trim();
        let host = trimmed
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .filter(|h| h.parse::<Ipv6Addr>().is_ok())
            .unwrap_or(trimmed);
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn authority(&self) -> String {
        self.authority_with_port(self.port)
    }

    /// Same host with a different port
    pub fn authority_with_port(&self, port: u16) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, port)
        } else {
            format!("{}:{}", self.host, port)
        }
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields non-blank
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Raw camera record as supplied by the external camera registry.
///
/// Converted into [`Camera`] through `TryFrom`, which enforces the
/// construction invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub camera_type: CameraType,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub snapshot_url: Option<String>,
}

/// Connection-relevant attributes of a single camera.
///
/// Immutable once built; an ONVIF camera always carries complete credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CameraRecord", into = "CameraRecord")]
pub struct Camera {
    id: String,
    name: String,
    address: NetworkAddress,
    camera_type: CameraType,
    credentials: Option<Credentials>,
    brand: Option<String>,
    stream_url: Option<String>,
    snapshot_url: Option<String>,
}

impl Camera {
    pub fn builder(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        camera_type: CameraType,
    ) -> CameraBuilder {
        CameraBuilder {
            id: None,
            name: name.into(),
            address: NetworkAddress::new(host, port),
            camera_type,
            credentials: None,
            brand: None,
            stream_url: None,
            snapshot_url: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &NetworkAddress {
        &self.address
    }

    pub fn host(&self) -> &str {
        &self.address.host
    }

    pub fn port(&self) -> u16 {
        self.address.port
    }

    pub fn camera_type(&self) -> CameraType {
        self.camera_type
    }

    /// Credentials, only when both username and password are non-blank
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref().filter(|c| c.is_complete())
    }

    /// Raw credential fields, even when incomplete
    pub fn raw_credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    /// Stored stream URL override
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Stored snapshot URL override
    pub fn snapshot_url(&self) -> Option<&str> {
        self.snapshot_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

impl TryFrom<CameraRecord> for Camera {
    type Error = ConnectionError;

    fn try_from(record: CameraRecord) -> Result<Self, Self::Error> {
        let mut builder = Camera::builder(record.name, record.host, record.port, record.camera_type);
        if let Some(id) = record.id {
            builder = builder.id(id);
        }
        if record.username.is_some() || record.password.is_some() {
            builder = builder.credentials(
                record.username.unwrap_or_default(),
                record.password.unwrap_or_default(),
            );
        }
        if let Some(brand) = record.brand {
            builder = builder.brand(brand);
        }
        if let Some(url) = record.stream_url {
            builder = builder.stream_url(url);
        }
        if let Some(url) = record.snapshot_url {
            builder = builder.snapshot_url(url);
        }
        builder.build()
    }
}

impl From<Camera> for CameraRecord {
    fn from(camera: Camera) -> Self {
        let (username, password) = match camera.credentials {
            Some(c) => (Some(c.username), Some(c.password)),
            None => (None, None),
        };
        CameraRecord {
            id: Some(camera.id),
            name: camera.name,
            host: camera.address.host,
            port: camera.address.port,
            camera_type: camera.camera_type,
            username,
            password,
            brand: camera.brand,
            stream_url: camera.stream_url,
            snapshot_url: camera.snapshot_url,
        }
    }
}

pub struct CameraBuilder {
    id: Option<String>,
    name: String,
    address: NetworkAddress,
    camera_type: CameraType,
    credentials: Option<Credentials>,
    brand: Option<String>,
    stream_url: Option<String>,
    snapshot_url: Option<String>,
}

impl CameraBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    pub fn snapshot_url(mut self, url: impl Into<String>) -> Self {
        self.snapshot_url = Some(url.into());
        self
    }

    pub fn build(self) -> ConnectionResult<Camera> {
        if self.camera_type == CameraType::Onvif {
            let mut errors = Vec::new();
            let creds = self.credentials.as_ref();
            if creds.map_or(true, |c| c.username.trim().is_empty()) {
                errors.push("ONVIF cameras require a username".to_string());
            }
            if creds.map_or(true, |c| c.password.trim().is_empty()) {
                errors.push("ONVIF cameras require a password".to_string());
            }
            if !errors.is_empty() {
                return Err(ConnectionError::Validation(errors));
            }
        }

        Ok(Camera {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: self.name,
            address: self.address,
            camera_type: self.camera_type,
            credentials: self.credentials,
            brand: self.brand,
            stream_url: self.stream_url,
            snapshot_url: self.snapshot_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onvif_requires_both_credentials() {
        let missing = Camera::builder("Lobby", "10.0.0.5", 80, CameraType::Onvif).build();
        assert!(matches!(missing, Err(ConnectionError::Validation(ref e)) if e.len() == 2));

        let blank_password = Camera::builder("Lobby", "10.0.0.5", 80, CameraType::Onvif)
            .credentials("admin", "  ")
            .build();
        assert!(matches!(blank_password, Err(ConnectionError::Validation(ref e)) if e.len() == 1));

        let blank_user = Camera::builder("Lobby", "10.0.0.5", 80, CameraType::Onvif)
            .credentials("", "secret")
            .build();
        assert!(blank_user.is_err());

        let ok = Camera::builder("Lobby", "10.0.0.5", 80, CameraType::Onvif)
            .credentials("admin", "secret")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_has_credentials_requires_both_fields() {
        let camera = Camera::builder("Gate", "10.0.0.6", 80, CameraType::Ip)
            .credentials("admin", "")
            .build()
            .unwrap();
        assert!(!camera.has_credentials());
        assert!(camera.raw_credentials().is_some());

        let camera = Camera::builder("Gate", "10.0.0.6", 80, CameraType::Ip)
            .credentials("admin", "pw")
            .build()
            .unwrap();
        assert!(camera.has_credentials());
    }

    #[test]
    fn test_builder_assigns_id() {
        let camera = Camera::builder("Gate", "10.0.0.6", 80, CameraType::Ip)
            .build()
            .unwrap();
        assert!(!camera.id().is_empty());

        let camera = Camera::builder("Gate", "10.0.0.6", 80, CameraType::Ip)
            .id("cam-1")
            .build()
            .unwrap();
        assert_eq!(camera.id(), "cam-1");
    }

    #[test]
    fn test_camera_type_parsing() {
        assert_eq!("onvif".parse::<CameraType>().unwrap(), CameraType::Onvif);
        assert_eq!("IP".parse::<CameraType>().unwrap(), CameraType::Ip);
        assert_eq!("RTSP Stream".parse::<CameraType>().unwrap(), CameraType::Rtsp);
        assert!("thermal".parse::<CameraType>().is_err());
        assert_eq!(CameraType::Webcam.to_string(), "Webcam");
    }

    #[test]
    fn test_authority_brackets_ipv6() {
        assert_eq!(NetworkAddress::new("10.0.0.1", 554).authority(), "10.0.0.1:554");
        assert_eq!(NetworkAddress::new("fe80::1", 80).authority(), "[fe80::1]:80");
        assert_eq!(NetworkAddress::new(" cam.local ", 80).authority(), "cam.local:80");
    }

    #[test]
    fn test_bracketed_ipv6_host_is_stored_bare() {
        let address = NetworkAddress::new("[fe80::1]", 554);
        assert_eq!(address.host, "fe80::1");
        assert_eq!(address.authority(), "[fe80::1]:554");

        let camera = Camera::builder("Gate", " [::1] ", 554, CameraType::Rtsp)
            .build()
            .unwrap();
        assert_eq!(camera.host(), "::1");

        // Not an IPv6 literal, left for validation to reject
        assert_eq!(NetworkAddress::new("[cam.local]", 80).host, "[cam.local]");
    }

    #[test]
    fn test_deserialize_enforces_onvif_invariant() {
        let json = r#"{"name":"Dock","host":"10.0.0.9","port":80,"camera_type":"onvif"}"#;
        assert!(serde_json::from_str::<Camera>(json).is_err());

        let json = r#"{"name":"Dock","host":"10.0.0.9","port":80,"camera_type":"onvif",
                       "username":"admin","password":"pw","brand":"Hikvision"}"#;
        let camera: Camera = serde_json::from_str(json).unwrap();
        assert_eq!(camera.brand(), Some("Hikvision"));
        assert!(camera.has_credentials());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
