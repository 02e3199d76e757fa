//! Network Connectivity Notifications
//!
//! Turns raw link events into a [`NetworkStatus`] and fans it out to
//! registered [`NetworkObserver`]s through an [`ObserverRegistry`].

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DroidKitError, Result};
use crate::observer::{ObserverRegistry, Subsystem};

/// Kind of network currently providing reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    None,
    Wifi,
    Mobile,
    Ethernet,
    Bluetooth,
    Vpn,
}

impl NetworkKind {
    /// Classify an interface name such as `wlan0` or `rmnet_data1`.
    ///
    /// An empty name means no active interface.
    pub fn from_interface(interface: &str) -> Result<Self> {
        let name = interface.trim().to_lowercase();
        if name.is_empty() {
            return Ok(NetworkKind::None);
        }

        const PREFIXES: &[(&str, NetworkKind)] = &[
            ("wlan", NetworkKind::Wifi),
            ("wifi", NetworkKind::Wifi),
            ("rmnet", NetworkKind::Mobile),
            ("ccmni", NetworkKind::Mobile),
            ("mobile", NetworkKind::Mobile),
            ("eth", NetworkKind::Ethernet),
            ("bt", NetworkKind::Bluetooth),
            ("tun", NetworkKind::Vpn),
            ("ppp", NetworkKind::Vpn),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| DroidKitError::UnknownInterface(interface.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            NetworkKind::None => "none",
            NetworkKind::Wifi => "wifi",
            NetworkKind::Mobile => "mobile",
            NetworkKind::Ethernet => "ethernet",
            NetworkKind::Bluetooth => "bluetooth",
            NetworkKind::Vpn => "vpn",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of a link as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Connecting,
    Disconnected,
    Suspended,
}

impl LinkState {
    /// Parse a state name, case-insensitive
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "connected" | "up" => Ok(LinkState::Connected),
            "connecting" => Ok(LinkState::Connecting),
            "disconnected" | "down" => Ok(LinkState::Disconnected),
            "suspended" => Ok(LinkState::Suspended),
            other => Err(DroidKitError::InvalidValue(format!("unknown link state '{}'", other))),
        }
    }
}

/// Raw link change event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEvent {
    /// Interface name, empty when no interface is active
    pub interface: String,
    pub state: LinkState,
}

impl LinkEvent {
    pub fn new(interface: impl Into<String>, state: LinkState) -> Self {
        Self {
            interface: interface.into(),
            state,
        }
    }
}

/// Notification payload delivered to network observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub kind: NetworkKind,
    pub connected: bool,
}

impl NetworkStatus {
    /// Build the status for a raw link event
    pub fn from_event(event: &LinkEvent) -> Result<Self> {
        let kind = NetworkKind::from_interface(&event.interface)?;
        let connected = kind != NetworkKind::None && event.state == LinkState::Connected;
        Ok(Self { kind, connected })
    }

    /// True when connected over a network that is usually metered
    pub fn is_metered(&self) -> bool {
        self.connected && matches!(self.kind, NetworkKind::Mobile | NetworkKind::Bluetooth)
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.connected { "connected" } else { "disconnected" };
        write!(f, "{} ({})", self.kind, state)
    }
}

/// Receives network status changes
pub trait NetworkObserver: Send + Sync {
    fn on_network_changed(&self, status: &NetworkStatus) -> Result<()>;
}

/// Connectivity event category
#[derive(Debug, Default)]
pub struct NetworkSubsystem;

impl Subsystem for NetworkSubsystem {
    type Raw = LinkEvent;
    type Payload = NetworkStatus;
    type Observer = dyn NetworkObserver;

    fn name(&self) -> &str {
        "network"
    }

    fn derive(&self, raw: &LinkEvent) -> Result<NetworkStatus> {
        let status = NetworkStatus::from_event(raw)?;
        debug!("Link {:?} {:?} -> {}", raw.interface, raw.state, status);
        Ok(status)
    }

    fn deliver(&self, observer: &dyn NetworkObserver, payload: &NetworkStatus) -> Result<()> {
        observer.on_network_changed(payload)
    }
}

/// Registry for network observers
pub type NetworkRegistry = ObserverRegistry<NetworkSubsystem>;

/// Observer that logs every status change
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl NetworkObserver for LoggingObserver {
    fn on_network_changed(&self, status: &NetworkStatus) -> Result<()> {
        info!("Network is now {}", status);
        Ok(())
    }
}

/// Observer that forwards statuses into a channel
pub struct ChannelObserver {
    sender: Sender<NetworkStatus>,
}

impl ChannelObserver {
    /// Create an observer and the subscription that reads from it
    pub fn new() -> (Arc<Self>, StatusSubscription) {
        let (sender, receiver) = unbounded();
        (Arc::new(Self { sender }), StatusSubscription { receiver })
    }
}

impl NetworkObserver for ChannelObserver {
    fn on_network_changed(&self, status: &NetworkStatus) -> Result<()> {
        self.sender.send(*status).map_err(|_| DroidKitError::Disconnected)
    }
}

/// Receiving side of a [`ChannelObserver`]
#[derive(Clone)]
pub struct StatusSubscription {
    receiver: Receiver<NetworkStatus>,
}

impl StatusSubscription {
    /// Receive the next status (blocking)
    pub fn recv(&self) -> std::result::Result<NetworkStatus, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a status (non-blocking)
    pub fn try_recv(&self) -> std::result::Result<NetworkStatus, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Get an iterator over statuses
    pub fn iter(&self) -> impl Iterator<Item = NetworkStatus> + '_ {
        self.receiver.iter()
    }

    /// Drain everything received so far
    pub fn drain(&self) -> Vec<NetworkStatus> {
        self.receiver.try_iter().collect()
    }
}
