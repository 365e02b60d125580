use crate::config::UpstreamConfig;
use crate::parse::clash::ClashProxy;
use crate::parse::singbox::NativeOutbound;
use crate::proxy::ProxyOutbound;
use crate::source::{DocumentSource, FetchError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub const CLASH_DOCUMENT: &str = r#"
mixed-port: 7890
proxies:
  - name: HK-01
    type: ss
    server: hk.example.com
    port: 8388
    cipher: aes-128-gcm
    password: hk-secret
    udp: true
  - name: US-02
    type: trojan
    server: us.example.com
    port: 443
    password: us-secret
    sni: us.example.com
  - name: SG-03
    type: vmess
    server: sg.example.com
    port: 443
    uuid: 3b6a3c4e-0000-4000-8000-000000000003
    tls: true
proxy-groups:
  - name: Proxy
    type: select
    proxies: [HK-01, US-02, SG-03]
"#;

pub const SINGBOX_DOCUMENT: &str = r#"{
  "outbounds": [
    {"tag": "direct", "type": "direct"},
    {"tag": "select", "type": "selector", "outbounds": ["JP-Relay", "US-Edge"]},
    {"tag": "auto", "type": "urltest", "outbounds": ["JP-Relay", "US-Edge"]},
    {
      "tag": "JP-Relay",
      "type": "shadowsocks",
      "server": "jp.example.com",
      "server_port": 8388,
      "method": "2022-blake3-aes-128-gcm",
      "password": "jp-secret"
    },
    {
      "tag": "US-Edge",
      "type": "trojan",
      "server": "edge.example.com",
      "server_port": 443,
      "password": "edge-secret",
      "tls": {"enabled": true, "server_name": "edge.example.com"},
      "transport": {"type": "ws", "path": "/edge"}
    }
  ]
}"#;

pub fn clash_proxy(name: &str) -> ProxyOutbound {
    let yaml = format!(
        "{{name: {name}, type: trojan, server: {name}.example.com, port: 443, password: pw}}"
    );
    serde_yaml::from_str::<ClashProxy>(&yaml).unwrap().into()
}

pub fn native_outbound(name: &str) -> ProxyOutbound {
    let json = serde_json::json!({
        "tag": name,
        "type": "vless",
        "server": "native.example.com",
        "server_port": 443,
        "uuid": "3b6a3c4e-0000-4000-8000-00000000000a",
    });
    serde_json::from_value::<NativeOutbound>(json).unwrap().into()
}

/// A `DocumentSource` serving fixed documents keyed by upstream URL, with an
/// optional artificial delay per URL. Records every request it sees.
#[derive(Default)]
pub struct StaticSource {
    documents: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, document: &str) {
        self.serve_slow(url, document, Duration::ZERO);
    }

    pub fn serve_slow(&self, url: &str, document: &str, delay: Duration) {
        self.documents
            .lock()
            .insert(url.to_string(), (document.as_bytes().to_vec(), delay));
    }

    /// `(url, user_agent)` of every fetch so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(
        &self,
        upstream: &UpstreamConfig,
        user_agent: &str,
    ) -> Result<Vec<u8>, FetchError> {
        self.requests
            .lock()
            .push((upstream.url.clone(), user_agent.to_string()));

        let entry = self.documents.lock().get(&upstream.url).cloned();
        let Some((document, delay)) = entry else {
            return Err(FetchError::Status(reqwest::StatusCode::NOT_FOUND));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if document.is_empty() {
            return Err(FetchError::EmptyDocument);
        }
        Ok(document)
    }
}
