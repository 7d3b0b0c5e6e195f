pub mod config;
pub mod connection_info;
pub mod error;
pub mod health_monitor;
pub mod registry;
pub mod resolver;
pub mod strategy;
pub mod types;

pub use config::{FallbackMode, ResolverConfig};
pub use connection_info::ConnectionInfo;
pub use error::{ConnectionError, ConnectionResult};
pub use health_monitor::{CameraSource, ConnectionMonitor, MonitorOutcome};
pub use registry::StrategyRegistry;
pub use resolver::{url_keys, validate_camera, ConnectionResolver};
pub use strategy::{ConnectionStrategy, HttpStrategy, OnvifStrategy, RtspStrategy, VendorProfile};
pub use types::*;
