//! Native subscriptions: a sing-box JSON document with an `outbounds` list.
//!
//! Entries are already in the engine's schema and are passed through as
//! received, whatever their kind. Groups and administrative outbounds are
//! dropped because they are not proxy endpoints and would feed back into
//! selector synthesis.

use super::{ParseError, SubscriptionParser};
use crate::outbound::{ConversionError, Outbound, OutboundOptions, PassthroughOptions};
use crate::proxy::{ProxyOutbound, SubscriptionFormat};
use serde::Deserialize;
use serde_json::{Map, Value};

const USER_AGENT: &str = "sing-box/v1.12.9";

const ADMINISTRATIVE_KINDS: &[&str] = &["direct", "block", "dns", "selector", "urltest"];

pub struct SingBoxParser;

impl SubscriptionParser for SingBoxParser {
    fn format(&self) -> SubscriptionFormat {
        SubscriptionFormat::SingBox
    }

    fn user_agent(&self) -> &'static str {
        USER_AGENT
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<ProxyOutbound>, ParseError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }

        let document: SingBoxDocument =
            serde_json::from_slice(raw).map_err(|e| ParseError::Decode {
                format: SubscriptionFormat::SingBox,
                reason: e.to_string(),
            })?;

        let outbounds: Vec<ProxyOutbound> = document
            .outbounds
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<NativeOutbound>(value) {
                Ok(outbound) => Some(outbound),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping undecodable native outbound");
                    None
                }
            })
            .filter(|outbound| {
                !outbound.kind.is_empty() && !ADMINISTRATIVE_KINDS.contains(&outbound.kind.as_str())
            })
            .map(ProxyOutbound::from)
            .collect();

        if outbounds.is_empty() {
            return Err(ParseError::NoEntries {
                format: SubscriptionFormat::SingBox,
            });
        }
        Ok(outbounds)
    }
}

#[derive(Deserialize)]
struct SingBoxDocument {
    #[serde(default)]
    outbounds: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NativeOutbound {
    #[serde(default)]
    tag: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl NativeOutbound {
    pub fn name(&self) -> &str {
        &self.tag
    }

    pub fn to_outbound(&self) -> Result<Outbound, ConversionError> {
        if self.tag.is_empty() {
            return Err(ConversionError::MissingField {
                name: self.tag.clone(),
                field: "tag",
            });
        }
        if self.kind.is_empty() {
            return Err(ConversionError::MissingField {
                name: self.tag.clone(),
                field: "type",
            });
        }

        Ok(Outbound::new(
            self.tag.clone(),
            OutboundOptions::Passthrough(PassthroughOptions {
                kind: self.kind.clone(),
                fields: self.fields.clone(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::SINGBOX_DOCUMENT;
    use serde_json::json;

    #[test]
    fn test_parse_skips_administrative_kinds() {
        let outbounds = SingBoxParser.parse(SINGBOX_DOCUMENT.as_bytes()).unwrap();
        let names: Vec<&str> = outbounds.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["JP-Relay", "US-Edge"]);
        assert!(
            outbounds
                .iter()
                .all(|o| o.format() == SubscriptionFormat::SingBox)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SingBoxParser.parse(b""), Err(ParseError::Empty)));
        assert!(matches!(
            SingBoxParser.parse(b"proxies:\n  - name: a\n"),
            Err(ParseError::Decode { .. })
        ));
        assert!(matches!(
            SingBoxParser.parse(br#"{"outbounds": [{"tag": "direct", "type": "direct"}]}"#),
            Err(ParseError::NoEntries { .. })
        ));
    }

    #[test]
    fn test_unmodelled_kinds_are_kept_verbatim() {
        let tuic = json!({
            "tag": "JP-Tuic",
            "type": "tuic",
            "server": "jp.example.com",
            "server_port": 443,
            "uuid": "2dd61d93-75d8-4da4-ac0e-6aece7eac365",
            "password": "pw",
            "tls": {"enabled": true, "server_name": "jp.example.com"},
        });
        let socks = json!({
            "tag": "US-Socks",
            "type": "socks",
            "server": "us.example.com",
            "server_port": 1080,
            "version": "5",
        });
        let trojan = json!({
            "tag": "SG-Trojan",
            "type": "trojan",
            "server": "sg.example.com",
            "server_port": 443,
            "password": "pw",
            "tls": {"server_name": "sg.example.com"},
        });
        let document = json!({"outbounds": [tuic, socks, trojan]}).to_string();

        let outbounds = SingBoxParser.parse(document.as_bytes()).unwrap();
        let converted: Vec<Value> = outbounds
            .iter()
            .map(|o| serde_json::to_value(o.to_outbound().unwrap()).unwrap())
            .collect();
        assert_eq!(converted, vec![tuic, socks, trojan]);
    }

    #[test]
    fn test_passthrough_conversion() {
        let native: NativeOutbound = serde_json::from_value(json!({
            "tag": "JP-Relay",
            "type": "shadowsocks",
            "server": "jp.example.com",
            "server_port": 8388,
            "method": "2022-blake3-aes-128-gcm",
            "password": "pw",
            "multiplex": {"enabled": true},
        }))
        .unwrap();

        let outbound = native.to_outbound().unwrap();
        assert_eq!(outbound.tag, "JP-Relay");
        assert_eq!(
            serde_json::to_value(&outbound).unwrap()["multiplex"],
            json!({"enabled": true})
        );
    }

    #[test]
    fn test_conversion_errors() {
        let untyped: NativeOutbound =
            serde_json::from_value(json!({"tag": "wg", "type": ""})).unwrap();
        assert!(matches!(
            untyped.to_outbound(),
            Err(ConversionError::MissingField { field: "type", .. })
        ));

        let untagged: NativeOutbound =
            serde_json::from_value(json!({"type": "trojan", "server": "a", "server_port": 1}))
                .unwrap();
        assert!(matches!(
            untagged.to_outbound(),
            Err(ConversionError::MissingField { field: "tag", .. })
        ));
    }
}
