//! Probe address parsing.
//!
//! Addresses are accepted either bare (`10.0.0.1`, `fd00::1`) or with a
//! prefix length (`10.0.0.1/24`, `fd00::1/64`). The prefix is validated and
//! then discarded; only the host address is probed.

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;

use tracing::warn;

use crate::error::{Error, Result};

// ============================================================================
// Parsing
// ============================================================================

/// Parses one probe address.
///
/// # Errors
///
/// Returns [`Error::AddressParseFailed`] if the host part is not an IP
/// address or the prefix length is out of range for its family.
pub fn parse_address(input: &str) -> Result<IpAddr> {
    let trimmed = input.trim();
    let (host, prefix) = match trimmed.split_once('/') {
        Some((host, prefix)) => (host, Some(prefix)),
        None => (trimmed, None),
    };

    let address: IpAddr = host
        .parse()
        .map_err(|e: std::net::AddrParseError| Error::address_parse_failed(input, e.to_string()))?;

    if let Some(prefix) = prefix {
        let len: u8 = prefix
            .parse()
            .map_err(|_| Error::address_parse_failed(input, "invalid prefix length"))?;
        let max = if address.is_ipv4() { 32 } else { 128 };
        if len > max {
            return Err(Error::address_parse_failed(
                input,
                format!("prefix length {len} exceeds {max}"),
            ));
        }
    }

    Ok(address)
}

/// Parses every input, logging and skipping the ones that fail.
///
/// Order and duplicates are preserved.
pub(crate) fn parse_all<S: AsRef<str>>(inputs: &[S], side: &str) -> Vec<IpAddr> {
    inputs
        .iter()
        .filter_map(|input| match parse_address(input.as_ref()) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(side, error = %e, "Skipping probe address");
                None
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, Ipv6Addr};

    use proptest::prelude::*;

    #[test]
    fn test_bare_addresses() {
        assert_eq!(
            parse_address("10.0.0.1").expect("v4"),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(
            parse_address("fd00::1").expect("v6"),
            IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))
        );
    }

    #[test]
    fn test_prefixed_addresses() {
        assert_eq!(
            parse_address("192.168.1.7/24").expect("v4"),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7))
        );
        assert!(parse_address("fd00::1/128").is_ok());
        assert!(parse_address(" 10.0.0.1/32 ").is_ok());
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["", "garbage", "10.0.0.256", "10.0.0.1/33", "fd00::1/129", "10.0.0.1/x"] {
            let err = parse_address(input).unwrap_err();
            assert!(
                matches!(err, Error::AddressParseFailed { .. }),
                "{input}: {err}"
            );
        }
    }

    #[test]
    fn test_parse_all_skips_and_keeps_order() {
        let parsed = parse_all(&["10.0.0.2", "bogus", "10.0.0.1", "10.0.0.2/8"], "destination");
        assert_eq!(
            parsed,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_ipv4_with_valid_prefix_parses(
            octets in any::<[u8; 4]>(),
            len in 0u8..=32,
        ) {
            let address = Ipv4Addr::from(octets);
            let input = format!("{address}/{len}");
            let parsed = parse_address(&input).expect("valid");
            prop_assert_eq!(parsed, IpAddr::V4(address));
        }

        #[test]
        fn prop_ipv4_with_oversized_prefix_fails(
            octets in any::<[u8; 4]>(),
            len in 33u8..=255,
        ) {
            let input = format!("{}/{}", Ipv4Addr::from(octets), len);
            prop_assert!(parse_address(&input).is_err());
        }
    }
}
