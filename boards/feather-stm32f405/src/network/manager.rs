#![deny(unsafe_code)]
#![deny(warnings)]
//! Network stack manager
//!
//! DHCP bring-up and the name lookup shared by every client.

use defmt::{debug, info, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, IpEndpoint, Ipv4Address, Stack};

use super::error::NetworkError;

/// Wait for network configuration (DHCP) and log IP address
pub async fn wait_for_config(stack: &Stack<'_>) {
    info!("Waiting for DHCP...");
    stack.wait_config_up().await;
    info!("Network is UP!");

    if let Some(config) = stack.config_v4() {
        let ip = config.address.address();
        let octets = ip.octets();
        info!(
            "IP: {}.{}.{}.{}",
            octets[0], octets[1], octets[2], octets[3]
        );

        if let Some(gateway) = config.gateway {
            let gw_octets = gateway.octets();
            info!(
                "Gateway: {}.{}.{}.{}",
                gw_octets[0], gw_octets[1], gw_octets[2], gw_octets[3]
            );
        }
    }
}

/// Resolve `host` to an endpoint
///
/// Dotted IPv4 literals skip DNS.
pub async fn resolve(stack: &Stack<'_>, host: &str, port: u16) -> Result<IpEndpoint, NetworkError> {
    if let Ok(addr) = host.parse::<Ipv4Address>() {
        return Ok(IpEndpoint::new(IpAddress::Ipv4(addr), port));
    }

    let addr = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|_| NetworkError::DnsError)?
        .first()
        .copied()
        .ok_or(NetworkError::DnsError)?;
    debug!("Resolved {} to {}", host, Debug2Format(&addr));
    Ok(IpEndpoint::new(addr, port))
}
