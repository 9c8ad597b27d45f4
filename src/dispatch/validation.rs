use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use super::SubmitError;
use super::resolver::HostResolver;

/// Trim, parse and require an `http`/`https` URL with a host
pub fn parse_url(raw: &str) -> Result<Url, SubmitError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SubmitError::MissingUrl);
    }

    let url = Url::parse(trimmed).map_err(|_| SubmitError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SubmitError::InvalidUrl);
    }

    match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => Ok(url),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Ok(url),
        _ => Err(SubmitError::InvalidUrl),
    }
}

/// Reject the URL unless every address its host maps to is public
///
/// IP literals are checked directly. Names go through `resolver`; a failed
/// lookup or an empty answer counts as forbidden.
pub async fn check_host(url: &Url, resolver: &dyn HostResolver) -> Result<(), SubmitError> {
    let addrs = match url.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            match resolver.resolve(domain, port).await {
                Ok(addrs) => addrs,
                Err(err) => {
                    tracing::debug!(host = domain, error = %err, "Host lookup failed");
                    return Err(SubmitError::ForbiddenHost);
                }
            }
        }
        None => return Err(SubmitError::InvalidUrl),
    };

    if addrs.is_empty() {
        return Err(SubmitError::ForbiddenHost);
    }
    if let Some(ip) = addrs.iter().find(|ip| is_forbidden_ip(**ip)) {
        tracing::debug!(host = ?url.host_str(), address = %ip, "Host maps to a non-public address");
        return Err(SubmitError::ForbiddenHost);
    }
    Ok(())
}

/// Addresses a download must never be pointed at
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_forbidden_v4(ip),
        IpAddr::V6(ip) => is_forbidden_v6(ip),
    }
}

fn is_forbidden_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || a == 0
        // 100.64.0.0/10 shared address space
        || (a == 100 && (b & 0xc0) == 64)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_forbidden_v6(ip: Ipv6Addr) -> bool {
    if let Some(embedded) = embedded_v4(ip) {
        return is_forbidden_v4(embedded);
    }

    let [first, second, third, fourth, ..] = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
        // fec0::/10 site local
        || (first & 0xffc0) == 0xfec0
        // 2001::/23 IETF protocol assignments, Teredo included
        || (first == 0x2001 && (second & 0xfe00) == 0)
        // 2001:db8::/32 documentation
        || (first == 0x2001 && second == 0x0db8)
        // 100::/64 discard only
        || (first == 0x0100 && second == 0 && third == 0 && fourth == 0)
}

/// IPv4 address carried inside an IPv6 one: mapped `::ffff:a.b.c.d`,
/// compatible `::a.b.c.d`, NAT64 `64:ff9b::/96` and 6to4 `2002::/16`.
fn embedded_v4(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return Some(mapped);
    }

    let segments = ip.segments();
    let low = Ipv4Addr::from(((segments[6] as u32) << 16) | segments[7] as u32);
    match segments {
        [0, 0, 0, 0, 0, 0, ..] => Some(low),
        [0x64, 0xff9b, 0, 0, 0, 0, ..] => Some(low),
        [0x2002, high, low_half, ..] => Some(Ipv4Addr::from(
            ((high as u32) << 16) | low_half as u32,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StaticResolver;

    fn ip(value: &str) -> IpAddr {
        value.parse().unwrap()
    }

    #[test]
    fn test_parse_url_accepts_http_and_https() {
        let url = parse_url("  https://example.com/watch?v=abc  ").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert!(parse_url("http://93.184.216.34/file.mp4").is_ok());
        assert!(parse_url("http://[2606:2800:220:1::1]/").is_ok());
    }

    #[test]
    fn test_parse_url_rejections() {
        assert_eq!(parse_url("").unwrap_err(), SubmitError::MissingUrl);
        assert_eq!(parse_url("   \n").unwrap_err(), SubmitError::MissingUrl);
        assert_eq!(parse_url("ftp://x").unwrap_err(), SubmitError::InvalidUrl);
        assert_eq!(parse_url("example.com").unwrap_err(), SubmitError::InvalidUrl);
        assert_eq!(parse_url("file:///etc/passwd").unwrap_err(), SubmitError::InvalidUrl);
        assert_eq!(parse_url("http://").unwrap_err(), SubmitError::InvalidUrl);
    }

    #[test]
    fn test_forbidden_v4() {
        for addr in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "224.0.0.1",
            "0.0.0.0",
            "0.1.2.3",
            "255.255.255.255",
            "100.64.0.1",
            "198.18.0.1",
            "192.0.2.10",
            "240.0.0.1",
        ] {
            assert!(is_forbidden_ip(ip(addr)), "{addr} should be forbidden");
        }
    }

    #[test]
    fn test_public_v4() {
        for addr in ["93.184.216.34", "8.8.8.8", "100.128.0.1", "198.20.0.1"] {
            assert!(!is_forbidden_ip(ip(addr)), "{addr} should be public");
        }
    }

    #[test]
    fn test_forbidden_v6() {
        for addr in [
            "::1",
            "::",
            "ff02::1",
            "fc00::1",
            "fd12:3456::1",
            "fe80::1",
            "2001:db8::1",
            "::ffff:127.0.0.1",
            "::ffff:10.0.0.1",
            "64:ff9b::7f00:1",
            "64:ff9b::a00:1",
            "2002:7f00:1::1",
            "2002:a00:1::1",
            "::127.0.0.1",
            "::10.0.0.1",
            "fec0::1",
            "100::1",
            "2001::1",
            "2001:0:4136:e378:8000:63bf:3fff:fdd2",
        ] {
            assert!(is_forbidden_ip(ip(addr)), "{addr} should be forbidden");
        }
        assert!(!is_forbidden_ip(ip("2606:2800:220:1:248:1893:25c8:1946")));
        assert!(!is_forbidden_ip(ip("::ffff:93.184.216.34")));
        assert!(!is_forbidden_ip(ip("64:ff9b::5db8:d822")));
        assert!(!is_forbidden_ip(ip("2002:5db8:d822::1")));
        assert!(!is_forbidden_ip(ip("2001:4860:4860::8888")));
        assert!(!is_forbidden_ip(ip("100:0:0:1::1")));
    }

    #[tokio::test]
    async fn test_check_host_literal_ips() {
        let resolver = StaticResolver::new();
        let url = parse_url("http://127.0.0.1/x").unwrap();
        assert_eq!(
            check_host(&url, &resolver).await.unwrap_err(),
            SubmitError::ForbiddenHost
        );

        let url = parse_url("http://93.184.216.34/x").unwrap();
        assert!(check_host(&url, &resolver).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_host_resolved_names() {
        let resolver = StaticResolver::new()
            .with_host("public.example", vec![ip("93.184.216.34")])
            .with_host("mixed.example", vec![ip("93.184.216.34"), ip("10.0.0.5")])
            .with_host("empty.example", vec![]);

        let check = |raw: &str| {
            let url = parse_url(raw).unwrap();
            let resolver = resolver.clone();
            async move { check_host(&url, &resolver).await }
        };

        assert!(check("https://public.example/v").await.is_ok());
        assert_eq!(
            check("https://mixed.example/v").await.unwrap_err(),
            SubmitError::ForbiddenHost
        );
        assert_eq!(
            check("https://empty.example/v").await.unwrap_err(),
            SubmitError::ForbiddenHost
        );
        assert_eq!(
            check("https://unknown.example/v").await.unwrap_err(),
            SubmitError::ForbiddenHost
        );
    }
}
