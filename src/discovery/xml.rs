//! AutoIP reply payload parsing
//!
//! ```xml
//! <NetScanResult MACAddr="00:06:77:01:02:03">
//!   <Item key="IPAddress" value="192.168.1.10"/>
//!   <Item key="IPMask" value="255.255.255.0"/>
//!   <Item key="HostPortNo" value="2122"/>
//!   <Item key="DeviceType" value="Visionary-T Mini"/>
//! </NetScanResult>
//! ```
//!
//! Unknown keys are ignored. A child without `key`/`value` attributes makes
//! the whole reply invalid.

use super::DeviceInfo;
use crate::error::{Error, Result};

const ROOT_ELEMENT: &str = "NetScanResult";

pub fn parse_device_info(payload: &[u8]) -> Result<DeviceInfo> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::Discovery(format!("payload is not UTF-8: {}", e)))?
        .trim_end_matches('\0');

    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(Error::Discovery(format!(
            "unexpected root element <{}>",
            root.tag_name().name()
        )));
    }

    let mut info = DeviceInfo {
        mac_address: root
            .attribute("MACAddr")
            .ok_or_else(|| Error::Discovery("missing MACAddr attribute".into()))?
            .to_string(),
        ..DeviceInfo::default()
    };

    for item in root.children().filter(|n| n.is_element()) {
        let (Some(key), Some(value)) = (item.attribute("key"), item.attribute("value")) else {
            return Err(Error::Discovery(format!(
                "<{}> without key/value",
                item.tag_name().name()
            )));
        };
        match key {
            "IPAddress" => info.ip_address = value.to_string(),
            "IPMask" => info.subnet = value.to_string(),
            "HostPortNo" => info.port = value.to_string(),
            "DeviceType" => info.device_name = value.to_string(),
            _ => {}
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<NetScanResult MACAddr="00:06:77:01:02:03">
  <Item key="IPAddress" value="192.168.1.10"/>
  <Item key="IPMask" value="255.255.255.0"/>
  <Item key="IPGateway" value="0.0.0.0"/>
  <Item key="HostPortNo" value="2122"/>
  <Item key="DeviceType" value="Visionary-T Mini"/>
</NetScanResult>"#;

    #[test]
    fn test_parse_full_reply() {
        let info = parse_device_info(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            info,
            DeviceInfo {
                device_name: "Visionary-T Mini".into(),
                ip_address: "192.168.1.10".into(),
                mac_address: "00:06:77:01:02:03".into(),
                port: "2122".into(),
                subnet: "255.255.255.0".into(),
            }
        );
    }

    #[test]
    fn test_missing_keys_stay_empty() {
        let info =
            parse_device_info(br#"<NetScanResult MACAddr="aa"><Item key="IPAddress" value="1.2.3.4"/></NetScanResult>"#)
                .unwrap();
        assert_eq!(info.ip_address, "1.2.3.4");
        assert!(info.port.is_empty());
        assert!(info.device_name.is_empty());
    }

    #[test]
    fn test_trailing_nul_tolerated() {
        let mut payload = br#"<NetScanResult MACAddr="aa"/>"#.to_vec();
        payload.extend_from_slice(&[0, 0]);
        assert_eq!(parse_device_info(&payload).unwrap().mac_address, "aa");
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(parse_device_info(b"<NetScanResult MACAddr=").is_err());
        assert!(parse_device_info(b"<Other MACAddr=\"aa\"/>").is_err());
        assert!(parse_device_info(b"<NetScanResult/>").is_err());
        assert!(parse_device_info(br#"<NetScanResult MACAddr="aa"><Item key="IPAddress"/></NetScanResult>"#).is_err());
        assert!(parse_device_info(&[0xFF, 0xFE]).is_err());
    }
}
