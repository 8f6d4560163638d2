//! IPv6 address extraction and classification
//!
//! Works on the line-oriented output of `ifconfig` or `ip -6 addr`:
//!
//! ```text
//! igb0: flags=8843<UP,BROADCAST,RUNNING,SIMPLEX,MULTICAST> metric 0 mtu 1500
//!         inet6 fe80::2e0:67ff:fe12:3456%igb0 prefixlen 64 scopeid 0x1
//!         inet6 2001:db8:1:2::5 prefixlen 64 autoconf pltime 3600 vltime 7200
//! ```
//!
//! Each `inet6` line yields one raw entry (`2001:db8:1:2::5 prefixlen 64
//! autoconf ...`). [`select_current`] drops link-local, unique-local and
//! deprecated entries and keeps the first remaining one; [`normalize`] turns
//! it into the bare canonical address that is compared and persisted.

use std::net::Ipv6Addr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::traits::AddressSource;

static INET6_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^.*inet6(.*)$").expect("valid inet6 pattern"));

// fc00::/7 covers fc00.. through fdff..
static UNIQUE_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^f[cd][0-9a-f]{2}:").expect("valid unique-local pattern"));

// fe80::/10 covers fe80.. through febf..
static LINK_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^fe[89ab][0-9a-f]:").expect("valid link-local pattern"));

static DEPRECATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\sdeprecated(\s|$)").expect("valid deprecated pattern"));

// Non-greedy: everything up to the first whitespace run.
static LEADING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s").expect("valid token pattern"));

/// Read the interface status and extract every `inet6` entry
///
/// A failing source is logged and reported as an empty list; the caller
/// decides what an empty list means.
pub async fn list_addresses(source: &dyn AddressSource) -> Vec<String> {
    match source.interface_status().await {
        Ok(text) => {
            let addresses = extract_inet6(&text);
            debug!(
                interface = source.interface(),
                count = addresses.len(),
                "Extracted inet6 entries"
            );
            addresses
        }
        Err(e) => {
            warn!(
                interface = source.interface(),
                "Failed to read interface status: {}", e
            );
            Vec::new()
        }
    }
}

/// Extract the text following `inet6` on every line that contains it
pub fn extract_inet6(text: &str) -> Vec<String> {
    INET6_LINE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Whether an entry starts with a unique-local (`fc00::/7`) address
pub fn is_unique_local(entry: &str) -> bool {
    UNIQUE_LOCAL.is_match(entry.trim_start())
}

/// Whether an entry starts with a link-local (`fe80::/10`) address
pub fn is_link_local(entry: &str) -> bool {
    LINK_LOCAL.is_match(entry.trim_start())
}

/// Whether an entry carries the `deprecated` flag
pub fn is_deprecated(entry: &str) -> bool {
    DEPRECATED.is_match(entry)
}

/// Pick the current global address
///
/// Returns the first entry, trimmed, that is neither unique-local nor
/// link-local nor deprecated. Ties are broken purely by input order, which
/// assumes the listing tool puts the preferred address first.
pub fn select_current<S: AsRef<str>>(addresses: &[S]) -> Option<String> {
    addresses
        .iter()
        .map(|entry| entry.as_ref().trim())
        .find(|entry| {
            let skip = is_unique_local(entry) || is_link_local(entry) || is_deprecated(entry);
            debug!(entry, qualifies = !skip, "Classified inet6 entry");
            !skip
        })
        .map(str::to_string)
}

/// Reduce a candidate entry to its canonical address
///
/// Strips everything from the first whitespace run on, then any `/len`
/// prefix length and `%zone` suffix, and re-renders the address in
/// canonical form. Returns an empty string when there is no
/// whitespace-delimited suffix to strip or when the leading token is not an
/// IPv6 address; callers treat that as a parse failure.
pub fn normalize(candidate: &str) -> String {
    let Some(token) = LEADING_TOKEN
        .captures(candidate)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return String::new();
    };

    let bare = token
        .split(['/', '%'])
        .next()
        .unwrap_or_default();

    match bare.parse::<Ipv6Addr>() {
        Ok(addr) => addr.to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const IFCONFIG_OUTPUT: &str = "\
igb0: flags=8843<UP,BROADCAST,RUNNING,SIMPLEX,MULTICAST> metric 0 mtu 1500
\toptions=8120b8<VLAN_MTU,VLAN_HWTAGGING,JUMBO_MTU,VLAN_HWCSUM,WOL_MAGIC,VLAN_HWFILTER>
\tether 00:e0:67:12:34:56
\tinet6 fe80::2e0:67ff:fe12:3456%igb0 prefixlen 64 scopeid 0x1
\tinet6 fd12:3456:789a::1 prefixlen 64
\tinet6 2001:db8:1:2::4 prefixlen 64 deprecated autoconf pltime 0 vltime 5000
\tinet6 2001:db8:1:3::5 prefixlen 64 autoconf pltime 3600 vltime 7200
\tinet 192.0.2.10 netmask 0xffffff00 broadcast 192.0.2.255
\tmedia: Ethernet autoselect (1000baseT <full-duplex>)
\tstatus: active
\tnd6 options=23<PERFORMNUD,ACCEPT_RTADV,AUTO_LINKLOCAL>
";

    const IP_OUTPUT: &str = "\
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 state UP qlen 1000
    inet6 2001:db8:1:3::5/64 scope global dynamic mngtmpaddr noprefixroute
       valid_lft 7200sec preferred_lft 3600sec
    inet6 fe80::2e0:67ff:fe12:3456/64 scope link
       valid_lft forever preferred_lft forever
";

    #[test]
    fn test_extract_inet6_from_ifconfig() {
        let addresses = extract_inet6(IFCONFIG_OUTPUT);
        assert_eq!(addresses.len(), 4);
        assert_eq!(addresses[0], "fe80::2e0:67ff:fe12:3456%igb0 prefixlen 64 scopeid 0x1");
        assert_eq!(addresses[3], "2001:db8:1:3::5 prefixlen 64 autoconf pltime 3600 vltime 7200");
    }

    #[test]
    fn test_extract_inet6_ignores_other_lines() {
        assert!(extract_inet6("").is_empty());
        assert!(extract_inet6("\tinet 192.0.2.10 netmask 0xffffff00\n\tstatus: active\n").is_empty());
    }

    #[test]
    fn test_select_current_from_ifconfig() {
        let addresses = extract_inet6(IFCONFIG_OUTPUT);
        let current = select_current(addresses.as_slice()).unwrap();
        assert_eq!(current, "2001:db8:1:3::5 prefixlen 64 autoconf pltime 3600 vltime 7200");
        assert_eq!(normalize(&current), "2001:db8:1:3::5");
    }

    #[test]
    fn test_select_current_from_ip() {
        let addresses = extract_inet6(IP_OUTPUT);
        let current = select_current(addresses.as_slice()).unwrap();
        assert_eq!(normalize(&current), "2001:db8:1:3::5");
    }

    #[test]
    fn test_select_current_first_qualifying_wins() {
        let addresses = ["2001:db8::9 autoconf", "2001:db8::5 autoconf"];
        assert_eq!(select_current(addresses.as_slice()).unwrap(), "2001:db8::9 autoconf");
    }

    #[test]
    fn test_select_current_none_qualifies() {
        let addresses = ["fe80::1 prefixlen 64", "fd00::2 prefixlen 64"];
        assert_eq!(select_current(addresses.as_slice()), None);

        let empty: [&str; 0] = [];
        assert_eq!(select_current(empty.as_slice()), None);
    }

    #[test]
    fn test_classification_rules() {
        for ula in ["fc00::1", "fd00::2 prefixlen 64", "FD12:3456::1", "fdff:ffff::1"] {
            assert!(is_unique_local(ula), "{} is unique-local", ula);
        }
        for not_ula in ["fe80::1", "fb00::1", "2001:db8::1", "fc::1"] {
            assert!(!is_unique_local(not_ula), "{} is not unique-local", not_ula);
        }

        for ll in ["fe80::1", "fe80::1%igb0 prefixlen 64", "FEBF::1", "fe90::1"] {
            assert!(is_link_local(ll), "{} is link-local", ll);
        }
        for not_ll in ["fec0::1", "fe00::1", "2001:db8::fe80", "fe8::1"] {
            assert!(!is_link_local(not_ll), "{} is not link-local", not_ll);
        }

        assert!(is_deprecated("2001:db8::4 prefixlen 64 deprecated autoconf"));
        assert!(is_deprecated("2001:db8::4 prefixlen 64 deprecated"));
        assert!(!is_deprecated("2001:db8::4 prefixlen 64 autoconf"));
        assert!(!is_deprecated("2001:db8::4 prefixlen 64 notdeprecated"));
    }

    #[test]
    fn test_selected_address_never_filtered_class() {
        let pool = [
            "fe80::1 prefixlen 64",
            "fd00::2 prefixlen 64",
            "fc01::3 prefixlen 64",
            "2001:db8::4 prefixlen 64 deprecated autoconf",
            "febf::5 prefixlen 64",
            "2001:db8::6 prefixlen 64 autoconf",
            "2001:db8::7 prefixlen 64",
        ];

        // Every rotation of the pool must still select a qualifying entry
        for shift in 0..pool.len() {
            let mut rotated = pool.to_vec();
            rotated.rotate_left(shift);
            let selected = select_current(rotated.as_slice()).unwrap();
            assert!(!is_unique_local(&selected));
            assert!(!is_link_local(&selected));
            assert!(!is_deprecated(&selected));
        }
    }

    #[test]
    fn test_normalize_strips_suffix() {
        assert_eq!(normalize("2001:db8::5/64 autoconf"), "2001:db8::5");
        assert_eq!(normalize("2001:db8::9 autoconf"), "2001:db8::9");
        assert_eq!(normalize("2001:db8::9 prefixlen 64"), "2001:db8::9");
        assert_eq!(normalize("2001:DB8:0:0::9  prefixlen 64"), "2001:db8::9");
        assert_eq!(normalize("2001:db8::9\tprefixlen 64"), "2001:db8::9");
    }

    #[test]
    fn test_normalize_bare_address_is_unrecognized() {
        assert_eq!(normalize("2001:db8::5"), "");
        assert_eq!(normalize("2001:db8::5/64"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_rejects_non_addresses() {
        assert_eq!(normalize("not-an-address prefixlen 64"), "");
        assert_eq!(normalize("192.0.2.1 netmask 0xffffff00"), "");
    }

    #[test]
    fn test_normalize_is_stable() {
        let inputs = [
            "2001:db8::5/64 autoconf",
            "2001:0db8:0000::0005 prefixlen 64",
            "2001:db8:1:3::5 prefixlen 64 autoconf pltime 3600 vltime 7200",
        ];
        for input in inputs {
            let once = normalize(input);
            assert!(!once.is_empty());
            for suffix in [" prefixlen 64", "/64 scope global", "\tautoconf"] {
                assert_eq!(normalize(&format!("{}{}", once, suffix)), once);
            }
        }
    }

    struct CannedSource(Result<String, String>);

    #[async_trait]
    impl AddressSource for CannedSource {
        async fn interface_status(&self) -> Result<String, crate::Error> {
            self.0.clone().map_err(crate::Error::address_source)
        }

        fn interface(&self) -> &str {
            "igb0"
        }
    }

    #[tokio::test]
    async fn test_list_addresses_from_source() {
        let source = CannedSource(Ok(IFCONFIG_OUTPUT.to_string()));
        assert_eq!(list_addresses(&source).await.len(), 4);
    }

    #[tokio::test]
    async fn test_list_addresses_source_failure_is_empty() {
        let source = CannedSource(Err("ifconfig: interface igb9 does not exist".to_string()));
        assert!(list_addresses(&source).await.is_empty());
    }
}
