//! Outbound descriptors in the proxy engine's schema.
//!
//! An `Outbound` serializes to the flat JSON object the engine expects:
//! `{"tag": "...", "type": "...", <kind specific options>}`. Typed kinds keep
//! any field this crate does not model in an `extra` map. Descriptors taken
//! verbatim from a native subscription are carried as `Passthrough` and
//! serialize back exactly as they were received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ExtraFields = Map<String, Value>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConversionError {
    #[error("unsupported proxy type: {0}")]
    UnsupportedType(String),
    #[error("missing required field `{field}` on {name:?}")]
    MissingField { name: String, field: &'static str },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    pub tag: String,
    #[serde(flatten)]
    pub options: OutboundOptions,
}

impl Outbound {
    pub fn new(tag: impl Into<String>, options: OutboundOptions) -> Self {
        Outbound {
            tag: tag.into(),
            options,
        }
    }

    pub fn direct(tag: impl Into<String>) -> Self {
        Outbound::new(tag, OutboundOptions::Direct(DirectOptions::default()))
    }

    pub fn kind(&self) -> &str {
        self.options.kind()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundOptions {
    Direct(DirectOptions),
    Selector(SelectorOptions),
    #[serde(rename = "urltest")]
    UrlTest(UrlTestOptions),
    Shadowsocks(ShadowsocksOptions),
    Trojan(TrojanOptions),
    Vmess(VmessOptions),
    Vless(VlessOptions),
    Hysteria2(Hysteria2Options),
    /// Any other kind, kept as the raw JSON object. Must stay last.
    #[serde(untagged)]
    Passthrough(PassthroughOptions),
}

impl OutboundOptions {
    pub fn kind(&self) -> &str {
        match self {
            OutboundOptions::Direct(_) => "direct",
            OutboundOptions::Selector(_) => "selector",
            OutboundOptions::UrlTest(_) => "urltest",
            OutboundOptions::Shadowsocks(_) => "shadowsocks",
            OutboundOptions::Trojan(_) => "trojan",
            OutboundOptions::Vmess(_) => "vmess",
            OutboundOptions::Vless(_) => "vless",
            OutboundOptions::Hysteria2(_) => "hysteria2",
            OutboundOptions::Passthrough(opts) => &opts.kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassthroughOptions {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: ExtraFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectOptions {
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorOptions {
    pub outbounds: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UrlTestOptions {
    pub outbounds: Vec<String>,
    pub url: String,
    pub interval: String,
    pub tolerance: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksOptions {
    pub server: String,
    pub server_port: u16,
    pub method: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrojanOptions {
    pub server: String,
    pub server_port: u16,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VmessOptions {
    pub server: String,
    pub server_port: u16,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VlessOptions {
    pub server: String,
    pub server_port: u16,
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hysteria2Options {
    pub server: String,
    pub server_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsOptions>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_shape() {
        let outbound = Outbound::new(
            "HK-01",
            OutboundOptions::Trojan(TrojanOptions {
                server: "hk.example.com".into(),
                server_port: 443,
                password: "secret".into(),
                tls: Some(TlsOptions {
                    enabled: true,
                    server_name: Some("hk.example.com".into()),
                    ..Default::default()
                }),
                extra: ExtraFields::new(),
            }),
        );

        assert_eq!(
            serde_json::to_value(&outbound).unwrap(),
            json!({
                "tag": "HK-01",
                "type": "trojan",
                "server": "hk.example.com",
                "server_port": 443,
                "password": "secret",
                "tls": {"enabled": true, "server_name": "hk.example.com"},
            })
        );
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let raw = json!({
            "tag": "JP-Relay",
            "type": "vless",
            "server": "jp.example.com",
            "server_port": 8443,
            "uuid": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "flow": "xtls-rprx-vision",
            "transport": {"type": "grpc", "service_name": "relay"},
        });

        let outbound: Outbound = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(outbound.kind(), "vless");
        assert!(matches!(outbound.options, OutboundOptions::Vless(_)));
        assert_eq!(serde_json::to_value(&outbound).unwrap(), raw);
    }

    #[test]
    fn test_tls_enabled_defaults_to_false() {
        let raw = json!({
            "tag": "SG-Trojan",
            "type": "trojan",
            "server": "sg.example.com",
            "server_port": 443,
            "password": "pw",
            "tls": {"server_name": "sg.example.com"},
        });

        let outbound: Outbound = serde_json::from_value(raw).unwrap();
        let OutboundOptions::Trojan(trojan) = outbound.options else {
            panic!("expected trojan options");
        };
        let tls = trojan.tls.unwrap();
        assert!(!tls.enabled);
        assert_eq!(tls.server_name.as_deref(), Some("sg.example.com"));
    }

    #[test]
    fn test_unmodelled_kinds_pass_through() {
        let raw = json!({
            "tag": "JP-Tuic",
            "type": "tuic",
            "server": "jp.example.com",
            "server_port": 443,
            "uuid": "2dd61d93-75d8-4da4-ac0e-6aece7eac365",
            "congestion_control": "bbr",
            "tls": {"enabled": true, "alpn": ["h3"]},
        });

        let outbound: Outbound = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(outbound.kind(), "tuic");
        assert!(matches!(outbound.options, OutboundOptions::Passthrough(_)));
        assert_eq!(serde_json::to_value(&outbound).unwrap(), raw);
    }

    #[test]
    fn test_group_kinds() {
        let direct = Outbound::direct("direct-out");
        assert_eq!(
            serde_json::to_value(&direct).unwrap(),
            json!({"tag": "direct-out", "type": "direct"})
        );

        let urltest = Outbound::new(
            "auto-out",
            OutboundOptions::UrlTest(UrlTestOptions {
                outbounds: vec!["a".into()],
                url: "https://www.google.com/generate_204".into(),
                interval: "300s".into(),
                tolerance: 50,
            }),
        );
        assert_eq!(serde_json::to_value(&urltest).unwrap()["type"], "urltest");
    }
}
