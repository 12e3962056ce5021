//! # Wi-Fi Device Manager
//!
//! Wrapper over the platform Wi-Fi service: local device activation,
//! scanning, and connection-state signals. Every operation is a synchronous
//! hand-off; the radio work happens in the native service.
//!
//! The Wi-Fi service is not tied to the UI loop, so the wrapper attaches
//! with [`Affinity::AnyThread`].

use std::sync::Arc;

use serde_json::{json, Value};

use crate::context::UiContext;
use crate::error::{Error, Result};
use crate::event::EventPayload;
use crate::handle::Ownership;
use crate::native::{NativeInterface, RawId};
use crate::proxy::{Affinity, Proxy};
use crate::registry::WrapperRegistry;
use crate::signal::SubscriptionId;

// ============================================================================
// SIGNALS
// ============================================================================

/// Signal names exposed by the native Wi-Fi service
pub mod signals {
    /// Device powered on or off
    pub const DEVICE_STATE_CHANGED: &str = "DeviceStateChanged";
    /// Connection to an access point changed
    pub const CONNECTION_STATE_CHANGED: &str = "ConnectionStateChanged";
    /// Signal strength of the connected network changed
    pub const RSSI_LEVEL_CHANGED: &str = "RssiLevelChanged";
    /// Periodic background scan completed
    pub const BACKGROUND_SCAN_FINISHED: &str = "BackgroundScanFinished";
}

// ============================================================================
// EVENT ARGUMENTS
// ============================================================================

/// Power state of the local Wi-Fi device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Radio off
    Deactivated,
    /// Radio on
    Activated,
}

impl DeviceState {
    fn from_code(code: i64) -> Self {
        if code == 1 {
            DeviceState::Activated
        } else {
            DeviceState::Deactivated
        }
    }
}

/// Connection state of the local Wi-Fi device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection attempt failed
    Failure,
    /// Not connected
    Disconnected,
    /// Associating with an access point
    Association,
    /// Obtaining configuration
    Configuration,
    /// Connected
    Connected,
}

impl ConnectionState {
    fn from_code(code: i64) -> Self {
        match code {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Association,
            2 => ConnectionState::Configuration,
            3 => ConnectionState::Connected,
            _ => ConnectionState::Failure,
        }
    }
}

/// Arguments for [`signals::DEVICE_STATE_CHANGED`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStateChangedArgs {
    /// New power state
    pub state: DeviceState,
}

impl DeviceStateChangedArgs {
    fn from_payload(payload: &EventPayload) -> Self {
        DeviceStateChangedArgs {
            state: DeviceState::from_code(payload.int("state").unwrap_or(0)),
        }
    }
}

/// Arguments for [`signals::CONNECTION_STATE_CHANGED`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStateChangedArgs {
    /// New connection state
    pub state: ConnectionState,
    /// ESSID of the access point involved, when the native layer reports one
    pub essid: Option<String>,
}

impl ConnectionStateChangedArgs {
    fn from_payload(payload: &EventPayload) -> Self {
        ConnectionStateChangedArgs {
            state: ConnectionState::from_code(payload.int("state").unwrap_or(-1)),
            essid: payload.text("essid").map(str::to_owned),
        }
    }
}

/// Arguments for [`signals::RSSI_LEVEL_CHANGED`]
#[derive(Debug, Clone, PartialEq)]
pub struct RssiLevelChangedArgs {
    /// Signal strength bucket reported by the native layer (0 = weakest)
    pub level: i64,
}

// ============================================================================
// MANAGER
// ============================================================================

/// Managed wrapper over the native Wi-Fi manager object
pub struct WifiManager {
    proxy: Arc<Proxy>,
}

impl WifiManager {
    /// Attach to the Wi-Fi manager object the native layer handed back
    ///
    /// The manager object is created by the native initialization call, so
    /// this side owns it and must destroy it on dispose.
    pub fn attach(
        native: Arc<dyn NativeInterface>,
        ctx: Arc<UiContext>,
        registry: Arc<WrapperRegistry>,
        id: RawId,
    ) -> Result<Self> {
        let proxy = Proxy::attach(
            native,
            ctx,
            registry,
            id,
            Ownership::Owned,
            Affinity::AnyThread,
        )?;
        Ok(WifiManager { proxy })
    }

    /// The underlying proxy
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    /// Local MAC address
    pub fn mac_address(&self) -> Result<String> {
        expect_string(self.proxy.invoke("wifi_mac_address", &[])?, "wifi_mac_address")
    }

    /// Name of the network interface
    pub fn interface_name(&self) -> Result<String> {
        expect_string(
            self.proxy.invoke("wifi_interface_name", &[])?,
            "wifi_interface_name",
        )
    }

    /// Current connection state
    pub fn connection_state(&self) -> Result<ConnectionState> {
        let value = self.proxy.invoke("wifi_connection_state", &[])?;
        Ok(ConnectionState::from_code(value.as_i64().unwrap_or(-1)))
    }

    /// Whether the local device is activated
    pub fn is_active(&self) -> Result<bool> {
        let value = self.proxy.invoke("wifi_is_active", &[])?;
        Ok(value.as_bool().unwrap_or(false))
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Activate the local Wi-Fi device
    pub fn activate(&self) -> Result<()> {
        self.proxy.invoke("wifi_activate", &[]).map(drop)
    }

    /// Activate and show the platform Wi-Fi picker when nothing connects
    /// automatically
    pub fn activate_with_picker(&self) -> Result<()> {
        self.proxy.invoke("wifi_activate_with_picker", &[]).map(drop)
    }

    /// Deactivate the local Wi-Fi device
    pub fn deactivate(&self) -> Result<()> {
        self.proxy.invoke("wifi_deactivate", &[]).map(drop)
    }

    /// Start a scan
    pub fn scan(&self) -> Result<()> {
        self.proxy.invoke("wifi_scan", &[]).map(drop)
    }

    /// Start a scan for a specific hidden access point
    pub fn scan_specific(&self, essid: &str) -> Result<()> {
        self.proxy
            .invoke("wifi_scan_specific_ap", &[json!(essid)])
            .map(drop)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Subscribe to device power-state changes
    pub fn on_device_state_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(DeviceStateChangedArgs) + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::DEVICE_STATE_CHANGED, move |payload| {
            handler(DeviceStateChangedArgs::from_payload(payload));
            None
        })
    }

    /// Subscribe to connection-state changes
    pub fn on_connection_state_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(ConnectionStateChangedArgs) + Send + Sync + 'static,
    {
        self.proxy
            .subscribe(signals::CONNECTION_STATE_CHANGED, move |payload| {
                handler(ConnectionStateChangedArgs::from_payload(payload));
                None
            })
    }

    /// Subscribe to signal-strength changes
    pub fn on_rssi_level_changed<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(RssiLevelChangedArgs) + Send + Sync + 'static,
    {
        self.proxy.subscribe(signals::RSSI_LEVEL_CHANGED, move |payload| {
            handler(RssiLevelChangedArgs {
                level: payload.int("level").unwrap_or(0),
            });
            None
        })
    }

    /// Subscribe to background-scan completion
    pub fn on_background_scan_finished<F>(&self, handler: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.proxy
            .subscribe(signals::BACKGROUND_SCAN_FINISHED, move |_| {
                handler();
                None
            })
    }

    /// Detach a previously registered subscriber
    pub fn unsubscribe(&self, signal: &str, subscription: SubscriptionId) -> Result<()> {
        self.proxy.unsubscribe(signal, subscription)
    }

    /// Dispose the wrapper and release the native manager object
    pub fn dispose(&self) -> Result<()> {
        self.proxy.dispose()
    }
}

fn expect_string(value: Value, method: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::NativeCall {
            method: method.to_string(),
            reason: "expected a string value".to_string(),
        })
}

// ============================================================================
// TESTS
// ============================================================================
