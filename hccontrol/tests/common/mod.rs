//! In-memory transports shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;

use hccontrol::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use hcupnp::ssdp::{Datagram, SsdpTransport};

/// Replays canned SSDP datagrams, then times out.
#[derive(Default)]
pub struct FakeSsdp {
    pub sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    replies: Mutex<VecDeque<Datagram>>,
}

impl FakeSsdp {
    pub fn with_replies(replies: &[String]) -> Self {
        let from: SocketAddr = "10.0.0.5:1900".parse().unwrap();
        let fake = Self::default();
        fake.replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Datagram {
                data: r.as_bytes().to_vec(),
                from,
            }));
        fake
    }
}

impl SsdpTransport for FakeSsdp {
    fn send(&self, datagram: &[u8], to: SocketAddr) -> io::Result<()> {
        self.sent.lock().unwrap().push((datagram.to_vec(), to));
        Ok(())
    }

    fn recv(&self) -> io::Result<Option<Datagram>> {
        Ok(self.replies.lock().unwrap().pop_front())
    }
}

pub fn search_response(location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=1800\r\n\
         EXT:\r\n\
         LOCATION: {}\r\n\
         SERVER: Linux UPnP/1.0 Test/1.0\r\n\
         ST: upnp:rootdevice\r\n\
         USN: uuid:test::upnp:rootdevice\r\n\
         \r\n",
        location
    )
}

/// Serves fixed pages by URL and records every request.
#[derive(Default)]
pub struct FakeHttp {
    pages: HashMap<String, (u16, String)>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }
}

impl HttpTransport for FakeHttp {
    fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let page = self.pages.get(&request.url).cloned();
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        match page {
            Some((status, body)) => Ok(HttpResponse {
                status,
                body: body.into_bytes(),
            }),
            None => Err(TransportError::new(
                url,
                io::Error::from(io::ErrorKind::ConnectionRefused),
            )),
        }
    }
}

pub const DEVICE_DESC: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:BinaryLight:1</deviceType>
    <friendlyName>Kitchen Light</friendlyName>
    <manufacturer>Acme</manufacturer>
    <modelName>L-100</modelName>
    <UDN>uuid:light-0001</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:SwitchPower:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:SwitchPower.0001</serviceId>
        <SCPDURL>/scpd.xml</SCPDURL>
        <controlURL>/control</controlURL>
        <eventSubURL>/event</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#;

pub const SWITCH_POWER_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetStatus</name>
      <argumentList>
        <argument>
          <name>CurrentStatus</name>
          <direction>out</direction>
          <relatedStateVariable>Status</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
    <action>
      <name>SetTarget</name>
      <argumentList>
        <argument>
          <name>NewTargetValue</name>
          <direction>in</direction>
          <relatedStateVariable>Target</relatedStateVariable>
        </argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes">
      <name>Status</name>
      <dataType>string</dataType>
    </stateVariable>
    <stateVariable sendEvents="no">
      <name>Target</name>
      <dataType>boolean</dataType>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;
