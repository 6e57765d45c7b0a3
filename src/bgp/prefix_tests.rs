use crate::error::RouteError;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr};

#[test]
fn test_prefix_from_cidr_valid() {
    let prefix: Prefix = "10.1.0.0/16".parse().unwrap();

    assert_eq!(prefix.net.prefix_len(), 16);
    assert_eq!(prefix.net.addr(), IpAddr::V4(Ipv4Addr::new(10, 1, 0, 0)));
}

#[test]
fn test_prefix_from_dotted_mask_valid() {
    let prefix: Prefix = "10.1.0.0/255.255.0.0".parse().unwrap();
    let expected: Prefix = "10.1.0.0/16".parse().unwrap();

    assert_eq!(prefix, expected);
}

#[test]
fn test_prefix_with_mask_valid() {
    let prefix = Prefix::with_mask(
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 0)),
        IpAddr::V4(Ipv4Addr::new(255, 255, 255, 0)),
    )
    .unwrap();

    assert_eq!(prefix.net.prefix_len(), 24);
}

#[test]
fn test_prefix_from_ipnet() {
    let net: IpNet = "192.0.2.0/24".parse().unwrap();

    assert_eq!(Prefix::from(net), "192.0.2.0/24".parse::<Prefix>().unwrap());
}

#[test]
fn test_prefix_ipv6_valid() {
    let prefix: Prefix = "2001:db8::/32".parse().unwrap();

    assert_eq!(prefix.net.prefix_len(), 32);
    assert_eq!(prefix.to_string(), "2001:db8::/32");
}

#[test]
fn test_prefix_host_bits_kept() {
    let a: Prefix = "10.1.0.1/16".parse().unwrap();
    let b: Prefix = "10.1.0.0/16".parse().unwrap();

    // no canonicalization: differing host bits are different prefixes
    assert_ne!(a, b);
    assert_eq!(a.to_string(), "10.1.0.1/16");
}

#[test]
fn test_prefix_ordering() {
    let mut prefixes: Vec<Prefix> = ["10.2.0.0/16", "10.1.0.0/24", "10.1.0.0/16"]
        .iter()
        .map(|p| p.parse().unwrap())
        .collect();
    prefixes.sort();

    let rendered: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
    assert_eq!(rendered, vec!["10.1.0.0/16", "10.1.0.0/24", "10.2.0.0/16"]);
}

// Invalid input tests
#[test]
fn test_prefix_length_too_long_invalid() {
    let result = "10.0.0.0/33".parse::<Prefix>();

    assert!(matches!(result, Err(RouteError::InvalidPrefix(_))));
}

#[test]
fn test_prefix_non_contiguous_mask_invalid() {
    let result = "10.0.0.0/255.0.255.0".parse::<Prefix>();

    assert!(matches!(result, Err(RouteError::InvalidPrefix(_))));
}

#[test]
fn test_prefix_missing_length_invalid() {
    assert!("10.0.0.0".parse::<Prefix>().is_err());
    assert!("not-an-address/8".parse::<Prefix>().is_err());
}

#[test]
fn test_prefix_mixed_family_mask_invalid() {
    let result = Prefix::with_mask(
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)),
        "ffff::".parse().unwrap(),
    );

    assert!(result.is_err());
}
