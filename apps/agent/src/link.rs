//! Link detection by polling interface addresses.
//!
//! The link counts as up while some interface (or the configured one) holds
//! a routable IPv4 address, which is what a station gets after associating
//! and completing DHCP.

use std::net::IpAddr;
use std::time::Duration;

use thermolink_session::LinkHandle;
use tokio_util::sync::CancellationToken;

/// Publishes interface state into a [`LinkHandle`] until cancelled.
pub struct InterfacePoller {
    interface: Option<String>,
    interval: Duration,
    handle: LinkHandle,
}

impl InterfacePoller {
    pub fn new(interface: Option<String>, interval: Duration, handle: LinkHandle) -> Self {
        Self {
            interface,
            interval,
            handle,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let up = link_up(self.interface.as_deref());
                    if self.handle.set_up(up) {
                        tracing::info!(
                            up,
                            interface = self.interface.as_deref().unwrap_or("any"),
                            "link state changed"
                        );
                    }
                }
            }
        }
    }
}

/// Returns `true` if a matching interface has a usable address.
pub fn link_up(interface: Option<&str>) -> bool {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return false;
    };

    interfaces
        .iter()
        .filter(|iface| interface.is_none_or(|name| iface.name == name))
        .filter(|iface| !iface.is_loopback())
        .any(|iface| is_routable(iface.ip()))
}

fn is_routable(ip: IpAddr) -> bool {
    match ip {
        // Link-local (169.254.x.x / APIPA) means DHCP has not completed.
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local() && !v4.is_unspecified(),
        IpAddr::V6(_) => false,
    }
}
