// Copyright 2025 Bucketdb Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Network scalar types for bucketdb
//!
//! MAC addresses, CIDR subnets, and the 128-bit normalization used to give
//! IPv4 and IPv6 addresses one consistent ordering (IPv4 is mapped into the
//! `::ffff:0:0/96` range).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Map an address to its 128-bit comparison key
///
/// IPv4 addresses land in the IPv4-in-IPv6 range so a mixed-family index
/// still has a total order.
pub fn ip_order_key(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => 0xffff_0000_0000u128 | u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Parse an IP literal, rejecting anything with a prefix length
pub fn parse_ip(text: &str) -> Option<IpAddr> {
    // IpAddr::from_str already rejects "1.2.3.4/24" and zone suffixes
    IpAddr::from_str(text).ok()
}

/// A 48-bit MAC address
///
/// Only the canonical six colon-separated two-hex-digit octet form is
/// accepted; ordering is by the 48-bit integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr(u64);

impl MacAddr {
    /// The 48-bit integer value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Parse `aa:bb:cc:dd:ee:ff`; each octet must be exactly two hex digits
    pub fn parse(text: &str) -> Option<Self> {
        let mut value = 0u64;
        let mut octets = 0;
        for part in text.split(':') {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            value = (value << 8) | u64::from_str_radix(part, 16).ok()?;
            octets += 1;
        }
        if octets != 6 {
            return None;
        }
        Some(Self(value))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// A CIDR subnet (address family + network bits + prefix length)
///
/// The stored network address is masked down to the prefix, so
/// `10.1.3.7/24` normalizes to `10.1.3.0/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: IpAddr,
    prefix: u8,
}

impl Subnet {
    /// Parse a CIDR literal (`10.1.3.0/24`, `fd00::/8`)
    ///
    /// The prefix length is bounded by the address family's bit width.
    pub fn parse(text: &str) -> Option<Self> {
        let (addr_text, prefix_text) = text.split_once('/')?;
        let addr = IpAddr::from_str(addr_text).ok()?;
        // reject "+8", " 8", "08" is fine
        if prefix_text.is_empty() || !prefix_text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let prefix: u8 = prefix_text.parse().ok()?;
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return None;
        }
        Some(Self::new(addr, prefix))
    }

    fn new(addr: IpAddr, prefix: u8) -> Self {
        let network = match addr {
            IpAddr::V4(v4) => {
                let masked = u32::from(v4) & mask32(prefix);
                IpAddr::V4(Ipv4Addr::from(masked))
            }
            IpAddr::V6(v6) => {
                let masked = u128::from(v6) & mask128(prefix);
                IpAddr::V6(Ipv6Addr::from(masked))
            }
        };
        Self { network, prefix }
    }

    /// Prefix length
    pub fn prefix(self) -> u8 {
        self.prefix
    }

    /// Network address (host bits zeroed)
    pub fn network(self) -> IpAddr {
        self.network
    }

    /// Whether a supplied address falls inside this subnet
    ///
    /// Cross-family membership is always false.
    pub fn contains(self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                u32::from(a) & mask32(self.prefix) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                u128::from(a) & mask128(self.prefix) == u128::from(net)
            }
            _ => false,
        }
    }

    /// Whether this subnet is entirely contained in `other`
    pub fn is_subset_of(self, other: Subnet) -> bool {
        if self.prefix < other.prefix {
            return false;
        }
        other.contains(self.network)
    }

    /// Comparison key: (family-normalized network, prefix)
    pub fn order_key(self) -> (u128, u8) {
        (ip_order_key(self.network), self.prefix)
    }
}

impl PartialOrd for Subnet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Subnet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

fn mask32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}
