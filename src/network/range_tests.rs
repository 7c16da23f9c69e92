//! Tests for network range validation and description

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_validate_cidr_notation() {
        assert_eq!(
            validate_network_range("192.168.1.0/24").unwrap(),
            "192.168.1.0/24"
        );
    }

    #[test]
    fn test_validate_masks_host_bits() {
        // An arbitrary host inside the range normalizes to the network address
        assert_eq!(
            validate_network_range("192.168.1.57/24").unwrap(),
            "192.168.1.0/24"
        );
        assert_eq!(
            validate_network_range("10.1.2.3/8").unwrap(),
            "10.0.0.0/8"
        );
    }

    #[test]
    fn test_validate_dotted_mask() {
        assert_eq!(
            validate_network_range("192.168.1.0/255.255.255.0").unwrap(),
            "192.168.1.0/24"
        );
        assert_eq!(
            validate_network_range("10.0.0.0/255.255.0.0").unwrap(),
            "10.0.0.0/16"
        );
    }

    #[test]
    fn test_validate_bare_ip_becomes_slash_32() {
        assert_eq!(
            validate_network_range("192.168.1.100").unwrap(),
            "192.168.1.100/32"
        );
    }

    #[test]
    fn test_validate_trims_whitespace() {
        assert_eq!(
            validate_network_range("  192.168.1.0/24  ").unwrap(),
            "192.168.1.0/24"
        );
    }

    #[test]
    fn test_validate_is_idempotent() {
        let normalized = validate_network_range("192.168.1.57/255.255.255.0").unwrap();
        assert_eq!(validate_network_range(&normalized).unwrap(), normalized);
    }

    #[test]
    fn test_validate_rejects_bad_octets() {
        assert!(validate_network_range("192.168.1.300/24").is_err());
        assert!(validate_network_range("not-an-ip").is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_prefix() {
        assert!(validate_network_range("192.168.1.0/33").is_err());
        assert!(validate_network_range("192.168.1.0/-1").is_err());
    }

    #[test]
    fn test_validate_rejects_non_canonical_mask() {
        assert!(validate_network_range("192.168.1.0/255.0.255.0").is_err());
        assert!(validate_network_range("192.168.1.0/255.255.255.3").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_input() {
        assert!(validate_network_range("").is_err());
        assert!(validate_network_range("   ").is_err());
    }

    #[test]
    fn test_validate_rejects_extra_slashes() {
        assert!(validate_network_range("192.168.1.0/24/8").is_err());
    }

    #[test]
    fn test_describe_class_c() {
        let info = describe_range("192.168.1.0/24").unwrap();
        assert_eq!(info.host_count, 254);
        assert_eq!(info.first_host.unwrap(), "192.168.1.1".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(info.last_host.unwrap(), "192.168.1.254".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(info.broadcast_address, "192.168.1.255".parse::<std::net::Ipv4Addr>().unwrap());
        assert!(!info.is_single_host);
    }

    #[test]
    fn test_describe_single_host() {
        let info = describe_range("10.0.0.5/32").unwrap();
        assert_eq!(info.host_count, 1);
        assert!(info.is_single_host);
        assert_eq!(info.first_host, info.last_host);
        assert_eq!(info.estimated_scan_seconds, 1.0);
    }

    #[test]
    fn test_describe_scan_estimate_floor() {
        // 254 hosts at 0.1s/host
        let info = describe_range("192.168.1.0/24").unwrap();
        assert!((info.estimated_scan_seconds - 25.4).abs() < 1e-9);
        assert_eq!(info.estimated_scan_time, "25.4s");
    }

    #[test]
    fn test_describe_class_a_without_enumeration() {
        let info = describe_range("10.0.0.0/8").unwrap();
        assert_eq!(info.host_count, 16_777_214);
        assert_eq!(info.first_host.unwrap(), "10.0.0.1".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(info.last_host.unwrap(), "10.255.255.254".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(info.broadcast_address, "10.255.255.255".parse::<std::net::Ipv4Addr>().unwrap());
    }

    #[test]
    fn test_describe_whole_v4_space_stays_cheap() {
        // Worst case for the description path: four billion hosts
        let info = describe_range("0.0.0.0/0").unwrap();
        assert_eq!(info.host_count, 4_294_967_294);
        assert_eq!(info.first_host.unwrap(), "0.0.0.1".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(info.last_host.unwrap(), "255.255.255.254".parse::<std::net::Ipv4Addr>().unwrap());
        assert!(!info.is_single_host);
    }

    #[test]
    fn test_host_addresses_excludes_network_and_broadcast() {
        let network: ipnetwork::Ipv4Network = "192.168.1.0/24".parse().unwrap();
        let hosts = host_addresses(network);
        assert_eq!(hosts.len(), 254);
        assert!(!hosts.contains(&"192.168.1.0".parse().unwrap()));
        assert!(!hosts.contains(&"192.168.1.255".parse().unwrap()));
        assert!(hosts.contains(&"192.168.1.1".parse().unwrap()));
        assert!(hosts.contains(&"192.168.1.254".parse().unwrap()));
    }

    #[test]
    fn test_host_addresses_slash_30() {
        let network: ipnetwork::Ipv4Network = "192.168.1.0/30".parse().unwrap();
        assert_eq!(host_addresses(network).len(), 2);
    }

    #[test]
    fn test_host_addresses_slash_31_and_32() {
        let p31: ipnetwork::Ipv4Network = "192.168.1.0/31".parse().unwrap();
        assert_eq!(host_addresses(p31).len(), 2);

        let p32: ipnetwork::Ipv4Network = "192.168.1.7/32".parse().unwrap();
        let hosts = host_addresses(p32);
        assert_eq!(hosts, vec!["192.168.1.7".parse::<std::net::Ipv4Addr>().unwrap()]);
    }
}
