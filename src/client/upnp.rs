//! Production device client: description fetches, SSDP discovery, and
//! SOAP-style BasicEvent control calls

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::UdpSocket;

use crate::client::{ClientFuture, DeviceControl};
use crate::config::DEVICE_PORT;
use crate::models::{Capability, Device, PowerState};

const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";
const SSDP_SEARCH_TARGET: &str = "urn:Belkin:service:basicevent:1";
const BASICEVENT_SERVICE: &str = "urn:Belkin:service:basicevent:1";
const BASICEVENT_CONTROL_PATH: &str = "/upnp/control/basicevent1";

/// Reqwest-backed client speaking the device's description and control
/// protocol. Holds no device-state caches: every state query is a fresh
/// protocol-level read, which is what makes `force_refresh` trustworthy.
#[derive(Debug, Clone)]
pub struct UpnpClient {
    http: reqwest::Client,
}

impl UpnpClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_description(&self, url: &str) -> Result<Device> {
        let body = self
            .http
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .with_context(|| format!("description fetch failed: {}", url))?
            .text()
            .await
            .context("description body read failed")?;

        let name = extract_tag(&body, "friendlyName")
            .ok_or_else(|| anyhow!("description at {} has no friendlyName", url))?;
        let udn = extract_tag(&body, "UDN")
            .ok_or_else(|| anyhow!("description at {} has no UDN", url))?;

        let mut device = Device::new(udn, name);
        device.model = extract_tag(&body, "modelName");
        device.serial_number = extract_tag(&body, "serialNumber");
        device.host = host_from_url(url);

        if body.to_lowercase().contains(&BASICEVENT_SERVICE.to_lowercase()) {
            device.capabilities = vec![
                Capability::PowerOn,
                Capability::PowerOff,
                Capability::Toggle,
                Capability::QueryState,
                Capability::QueryFriendlyName,
            ];
        }

        Ok(device)
    }

    /// One BasicEvent SOAP round trip, returning the response body.
    async fn soap_call(
        &self,
        device: &Device,
        action: &str,
        arguments: &str,
        force_fresh: bool,
        timeout: Duration,
    ) -> Result<String> {
        let host = device
            .host
            .ok_or_else(|| anyhow!("device {} has no known address", device.udn))?;
        let url = format!("http://{}:{}{}", host, DEVICE_PORT, BASICEVENT_CONTROL_PATH);

        let envelope = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
             <s:Body><u:{action} xmlns:u=\"{service}\">{arguments}</u:{action}></s:Body>\
             </s:Envelope>",
            action = action,
            service = BASICEVENT_SERVICE,
            arguments = arguments,
        );

        let mut request = self
            .http
            .post(&url)
            .timeout(timeout)
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header(
                "SOAPACTION",
                format!("\"{}#{}\"", BASICEVENT_SERVICE, action),
            )
            .body(envelope);

        if force_fresh {
            request = request.header("Cache-Control", "no-cache");
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("{} call to {} failed", action, host))?;

        let status = response.status();
        let body = response.text().await.context("SOAP response read failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} returned HTTP {}", action, status));
        }
        Ok(body)
    }

    async fn binary_state(
        &self,
        device: &Device,
        force_refresh: bool,
        timeout: Duration,
    ) -> Result<PowerState> {
        let body = self
            .soap_call(device, "GetBinaryState", "", force_refresh, timeout)
            .await?;
        let raw = extract_tag(&body, "BinaryState")
            .ok_or_else(|| anyhow!("GetBinaryState response has no BinaryState"))?;
        Ok(parse_binary_state(&raw))
    }
}

impl Default for UpnpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for UpnpClient {
    fn describe<'a>(&'a self, url: &'a str) -> ClientFuture<'a, Device> {
        Box::pin(async move { self.fetch_description(url).await })
    }

    fn broadcast_discover<'a>(&'a self, timeout: Duration) -> ClientFuture<'a, Vec<Device>> {
        Box::pin(async move {
            let locations = ssdp_search(timeout).await?;
            let mut devices = Vec::new();
            for location in locations {
                match self.fetch_description(&location).await {
                    Ok(device) => devices.push(device),
                    Err(e) => tracing::debug!("Skipping SSDP responder {}: {}", location, e),
                }
            }
            Ok(devices)
        })
    }

    fn query_state<'a>(
        &'a self,
        device: &'a Device,
        force_refresh: bool,
        timeout: Duration,
    ) -> ClientFuture<'a, PowerState> {
        Box::pin(async move { self.binary_state(device, force_refresh, timeout).await })
    }

    fn set_power<'a>(
        &'a self,
        device: &'a Device,
        on: bool,
        timeout: Duration,
    ) -> ClientFuture<'a, PowerState> {
        Box::pin(async move {
            let arguments = format!("<BinaryState>{}</BinaryState>", u8::from(on));
            let body = self
                .soap_call(device, "SetBinaryState", &arguments, true, timeout)
                .await?;
            // Devices answer SetBinaryState with the resulting state, or
            // "Error" when the state was already set.
            match extract_tag(&body, "BinaryState").as_deref() {
                Some(raw) if raw != "Error" => Ok(parse_binary_state(raw)),
                _ => Ok(if on { PowerState::On } else { PowerState::Off }),
            }
        })
    }

    fn query_friendly_name<'a>(
        &'a self,
        device: &'a Device,
        timeout: Duration,
    ) -> ClientFuture<'a, String> {
        Box::pin(async move {
            let body = self
                .soap_call(device, "GetFriendlyName", "", true, timeout)
                .await?;
            extract_tag(&body, "FriendlyName")
                .ok_or_else(|| anyhow!("GetFriendlyName response has no FriendlyName"))
        })
    }
}

/// M-SEARCH the local network and collect unique LOCATION headers until
/// the deadline passes.
async fn ssdp_search(timeout: Duration) -> Result<Vec<String>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("SSDP socket bind failed")?;

    let mx = timeout.as_secs().clamp(1, 5);
    let request = format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {host}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {mx}\r\n\
         ST: {st}\r\n\r\n",
        host = SSDP_MULTICAST_ADDR,
        mx = mx,
        st = SSDP_SEARCH_TARGET,
    );
    socket
        .send_to(request.as_bytes(), SSDP_MULTICAST_ADDR)
        .await
        .context("SSDP search send failed")?;

    let deadline = tokio::time::Instant::now() + timeout;
    let mut locations = Vec::new();
    let mut seen = HashSet::new();
    let mut buffer = [0u8; 2048];

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, peer))) => {
                let response = String::from_utf8_lossy(&buffer[..len]);
                if let Some(location) = parse_ssdp_location(&response) {
                    if seen.insert(location.clone()) {
                        tracing::debug!("SSDP responder {} at {}", location, peer);
                        locations.push(location);
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::debug!("SSDP receive error: {}", e);
                break;
            }
            Err(_) => break,
        }
    }

    Ok(locations)
}

/// LOCATION header of an SSDP response, case-insensitively.
fn parse_ssdp_location(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (header, value) = line.split_once(':')?;
        if header.trim().eq_ignore_ascii_case("location") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// First `<tag>...</tag>` text content. The description documents are
/// small, flat, vendor-generated XML; a full parser buys nothing here.
fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    let value = body[start..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_binary_state(raw: &str) -> PowerState {
    // Insight-class devices report "8" for standby; anything nonzero is on.
    match raw.trim() {
        "0" => PowerState::Off,
        "1" | "8" => PowerState::On,
        other => match other.parse::<i64>() {
            Ok(n) if n > 0 => PowerState::On,
            _ => PowerState::Unknown,
        },
    }
}

fn host_from_url(url: &str) -> Option<Ipv4Addr> {
    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://"))?;
    let host = rest.split(['/', ':']).next()?;
    host.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DESCRIPTION: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:Belkin:device-1-0">
  <device>
    <deviceType>urn:Belkin:device:controllee:1</deviceType>
    <friendlyName>Desk Lamp</friendlyName>
    <modelName>Socket</modelName>
    <serialNumber>221517K0101769</serialNumber>
    <UDN>uuid:Socket-1_0-221517K0101769</UDN>
    <serviceList>
      <service>
        <serviceType>urn:Belkin:service:basicevent:1</serviceType>
        <controlURL>/upnp/control/basicevent1</controlURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn extract_tag_reads_flat_xml() {
        assert_eq!(
            extract_tag(SAMPLE_DESCRIPTION, "friendlyName").as_deref(),
            Some("Desk Lamp")
        );
        assert_eq!(
            extract_tag(SAMPLE_DESCRIPTION, "UDN").as_deref(),
            Some("uuid:Socket-1_0-221517K0101769")
        );
        assert_eq!(extract_tag(SAMPLE_DESCRIPTION, "missing"), None);
    }

    #[test]
    fn parse_binary_state_variants() {
        assert_eq!(parse_binary_state("0"), PowerState::Off);
        assert_eq!(parse_binary_state("1"), PowerState::On);
        assert_eq!(parse_binary_state("8"), PowerState::On);
        assert_eq!(parse_binary_state("Error"), PowerState::Unknown);
    }

    #[test]
    fn parse_ssdp_location_is_case_insensitive() {
        let response = "HTTP/1.1 200 OK\r\n\
                        CACHE-CONTROL: max-age=86400\r\n\
                        Location: http://192.168.1.169:49153/setup.xml\r\n\
                        ST: urn:Belkin:service:basicevent:1\r\n\r\n";
        assert_eq!(
            parse_ssdp_location(response).as_deref(),
            Some("http://192.168.1.169:49153/setup.xml")
        );
        assert_eq!(parse_ssdp_location("HTTP/1.1 200 OK\r\n\r\n"), None);
    }

    #[test]
    fn host_from_url_parses_device_urls() {
        assert_eq!(
            host_from_url("http://192.168.1.169:49153/setup.xml"),
            Some("192.168.1.169".parse().unwrap())
        );
        assert_eq!(host_from_url("not a url"), None);
    }

    #[tokio::test]
    async fn describe_parses_served_description() {
        use std::convert::Infallible;

        // Minimal one-shot HTTP server on loopback
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/xml\r\n\r\n{}",
                SAMPLE_DESCRIPTION.len(),
                SAMPLE_DESCRIPTION
            );
            let _ = stream.write_all(response.as_bytes()).await;
            Ok::<_, Infallible>(())
        });

        let client = UpnpClient::new();
        let url = format!("http://127.0.0.1:{}/setup.xml", port);
        let device = client.describe(&url).await.unwrap();

        assert_eq!(device.name, "Desk Lamp");
        assert_eq!(device.udn, "uuid:Socket-1_0-221517K0101769");
        assert_eq!(device.model.as_deref(), Some("Socket"));
        assert_eq!(device.host, Some("127.0.0.1".parse().unwrap()));
        assert!(device.supports(Capability::PowerOn));
        assert!(device.supports(Capability::QueryState));
    }
}
