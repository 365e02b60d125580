//! Clash style subscriptions: a YAML document with a `proxies` list.

use super::{ParseError, SubscriptionParser};
use crate::outbound::{
    ConversionError, ExtraFields, Hysteria2Options, Outbound, OutboundOptions, ShadowsocksOptions,
    TlsOptions, TrojanOptions, VlessOptions, VmessOptions,
};
use crate::proxy::{ProxyOutbound, SubscriptionFormat};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

const USER_AGENT: &str = "clash-verge/v2.4.2";

pub struct ClashParser;

impl SubscriptionParser for ClashParser {
    fn format(&self) -> SubscriptionFormat {
        SubscriptionFormat::Clash
    }

    fn user_agent(&self) -> &'static str {
        USER_AGENT
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<ProxyOutbound>, ParseError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::Empty);
        }

        let document: ClashDocument =
            serde_yaml::from_slice(raw).map_err(|e| ParseError::Decode {
                format: SubscriptionFormat::Clash,
                reason: e.to_string(),
            })?;

        // Records are decoded one by one so a single malformed entry does not
        // take the rest of the subscription down with it.
        let proxies: Vec<ProxyOutbound> = document
            .proxies
            .into_iter()
            .filter_map(|value| match serde_yaml::from_value::<ClashProxy>(value) {
                Ok(proxy) => Some(proxy.into()),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping undecodable clash proxy");
                    None
                }
            })
            .collect();

        if proxies.is_empty() {
            return Err(ParseError::NoEntries {
                format: SubscriptionFormat::Clash,
            });
        }
        Ok(proxies)
    }
}

#[derive(Deserialize)]
struct ClashDocument {
    #[serde(default)]
    proxies: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashProxy {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    server: String,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    cipher: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    plugin: Option<String>,
    #[serde(default)]
    plugin_opts: IndexMap<String, Value>,
    #[serde(default)]
    tfo: bool,
    #[serde(default)]
    tls: bool,
    #[serde(default)]
    sni: Option<String>,
    #[serde(default)]
    servername: Option<String>,
    #[serde(default)]
    skip_cert_verify: bool,
}

impl ClashProxy {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_outbound(&self) -> Result<Outbound, ConversionError> {
        if self.name.is_empty() {
            return Err(self.missing("name"));
        }

        let options = match self.kind.as_str() {
            "ss" | "shadowsocks" => OutboundOptions::Shadowsocks(ShadowsocksOptions {
                server: self.server()?,
                server_port: self.port()?,
                method: self.required(&self.cipher, "cipher")?,
                password: self.required(&self.password, "password")?,
                plugin: self.plugin.as_deref().map(plugin_name),
                plugin_opts: self
                    .plugin
                    .as_deref()
                    .and_then(|p| plugin_options(p, &self.plugin_opts)),
                extra: self.extra(),
            }),
            "trojan" => OutboundOptions::Trojan(TrojanOptions {
                server: self.server()?,
                server_port: self.port()?,
                password: self.required(&self.password, "password")?,
                tls: Some(self.tls_options()),
                extra: self.extra(),
            }),
            "vmess" => OutboundOptions::Vmess(VmessOptions {
                server: self.server()?,
                server_port: self.port()?,
                uuid: self.uuid()?,
                tls: self.tls.then(|| self.tls_options()),
                extra: self.extra(),
            }),
            "vless" => OutboundOptions::Vless(VlessOptions {
                server: self.server()?,
                server_port: self.port()?,
                uuid: self.uuid()?,
                tls: self.tls.then(|| self.tls_options()),
                extra: self.extra(),
            }),
            "hysteria2" => OutboundOptions::Hysteria2(Hysteria2Options {
                server: self.server()?,
                server_port: self.port()?,
                password: self.password.clone().unwrap_or_default(),
                tls: Some(self.tls_options()),
                extra: self.extra(),
            }),
            other => return Err(ConversionError::UnsupportedType(other.to_string())),
        };

        Ok(Outbound::new(self.name.clone(), options))
    }

    fn server(&self) -> Result<String, ConversionError> {
        if self.server.is_empty() {
            return Err(self.missing("server"));
        }
        Ok(self.server.clone())
    }

    fn port(&self) -> Result<u16, ConversionError> {
        if self.port == 0 {
            return Err(self.missing("port"));
        }
        Ok(self.port)
    }

    // vmess/vless subscriptions in the wild put the id in either field.
    fn uuid(&self) -> Result<String, ConversionError> {
        self.uuid
            .as_ref()
            .or(self.password.as_ref())
            .filter(|id| !id.is_empty())
            .cloned()
            .ok_or_else(|| self.missing("uuid"))
    }

    fn required(
        &self,
        value: &Option<String>,
        field: &'static str,
    ) -> Result<String, ConversionError> {
        value
            .as_ref()
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| self.missing(field))
    }

    fn missing(&self, field: &'static str) -> ConversionError {
        ConversionError::MissingField {
            name: self.name.clone(),
            field,
        }
    }

    fn tls_options(&self) -> TlsOptions {
        TlsOptions {
            enabled: true,
            server_name: self
                .sni
                .as_ref()
                .or(self.servername.as_ref())
                .filter(|s| !s.is_empty())
                .cloned(),
            insecure: self.skip_cert_verify,
            extra: ExtraFields::new(),
        }
    }

    fn extra(&self) -> ExtraFields {
        let mut extra = ExtraFields::new();
        if self.tfo {
            extra.insert("tcp_fast_open".into(), true.into());
        }
        extra
    }
}

/// The obfs plugin is known as `obfs` to clash and `obfs-local` to the
/// engine, with differently named options.
const OBFS_PLUGIN: &str = "obfs";
const OBFS_LOCAL_PLUGIN: &str = "obfs-local";
const OBFS_KEY_RENAMES: &[(&str, &str)] = &[("mode", "obfs"), ("host", "obfs-host")];

fn plugin_name(plugin: &str) -> String {
    if plugin == OBFS_PLUGIN {
        OBFS_LOCAL_PLUGIN.to_string()
    } else {
        plugin.to_string()
    }
}

/// Folds the plugin option mapping into a `key=value;key=value` string.
/// Sequence values are joined with `,`; null and nested mapping values are
/// dropped. Returns `None` when nothing is left.
fn plugin_options(plugin: &str, opts: &IndexMap<String, Value>) -> Option<String> {
    let parts: Vec<String> = opts
        .iter()
        .filter_map(|(key, value)| {
            let key = if plugin == OBFS_PLUGIN {
                OBFS_KEY_RENAMES
                    .iter()
                    .find(|(from, _)| *from == key.as_str())
                    .map(|(_, to)| *to)
                    .unwrap_or(key.as_str())
            } else {
                key.as_str()
            };
            let rendered = match value {
                Value::Sequence(items) => {
                    let items: Vec<String> = items.iter().filter_map(scalar).collect();
                    Some(items.join(","))
                }
                other => scalar(other),
            }?;
            Some(format!("{key}={rendered}"))
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::CLASH_DOCUMENT;

    fn proxy(yaml: &str) -> ClashProxy {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_document() {
        let proxies = ClashParser.parse(CLASH_DOCUMENT.as_bytes()).unwrap();
        assert_eq!(proxies.len(), 3);
        assert!(
            proxies
                .iter()
                .all(|p| p.format() == SubscriptionFormat::Clash)
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(ClashParser.parse(b"  \n"), Err(ParseError::Empty)));
        assert!(matches!(
            ClashParser.parse(b"proxies: []"),
            Err(ParseError::NoEntries { .. })
        ));
        assert!(matches!(
            ClashParser.parse(br#"{"outbounds": [{"tag": "a", "type": "vless"}]}"#),
            Err(ParseError::NoEntries { .. })
        ));
        assert!(matches!(
            ClashParser.parse(b"proxies: [unterminated"),
            Err(ParseError::Decode { .. })
        ));
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let yaml = r#"
proxies:
  - name: broken
    type: ss
    port: not-a-port
  - name: ok
    type: trojan
    server: ok.example.com
    port: 443
    password: pw
"#;
        let proxies = ClashParser.parse(yaml.as_bytes()).unwrap();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].name(), "ok");
    }

    #[test]
    fn test_shadowsocks_with_obfs_plugin() {
        let p = proxy(
            r#"
name: HK-01
type: ss
server: hk.example.com
port: 8388
cipher: aes-128-gcm
password: pw
plugin: obfs
plugin-opts:
  mode: http
  host: bing.com
"#,
        );
        let outbound = p.to_outbound().unwrap();
        let OutboundOptions::Shadowsocks(ss) = outbound.options else {
            panic!("expected shadowsocks");
        };
        assert_eq!(ss.method, "aes-128-gcm");
        assert_eq!(ss.plugin.as_deref(), Some("obfs-local"));
        assert_eq!(ss.plugin_opts.as_deref(), Some("obfs=http;obfs-host=bing.com"));
    }

    #[test]
    fn test_plugin_options_keep_other_plugins_verbatim() {
        let p = proxy(
            r#"
name: v2
type: shadowsocks
server: v2.example.com
port: 443
cipher: chacha20-ietf-poly1305
password: pw
plugin: v2ray-plugin
plugin-opts:
  mode: websocket
  host: cdn.example.com
  tls: true
  path: [/a, /b]
  headers: {x: y}
  empty: ~
"#,
        );
        let OutboundOptions::Shadowsocks(ss) = p.to_outbound().unwrap().options else {
            panic!("expected shadowsocks");
        };
        assert_eq!(ss.plugin.as_deref(), Some("v2ray-plugin"));
        assert_eq!(
            ss.plugin_opts.as_deref(),
            Some("mode=websocket;host=cdn.example.com;tls=true;path=/a,/b")
        );
    }

    #[test]
    fn test_tls_and_credentials() {
        let vmess = proxy(
            r#"
name: vm
type: vmess
server: vm.example.com
port: 443
uuid: 3b6a3c4e-0000-4000-8000-000000000000
tls: true
servername: vm.example.com
skip-cert-verify: true
"#,
        );
        let OutboundOptions::Vmess(opts) = vmess.to_outbound().unwrap().options else {
            panic!("expected vmess");
        };
        let tls = opts.tls.unwrap();
        assert_eq!(tls.server_name.as_deref(), Some("vm.example.com"));
        assert!(tls.insecure);

        let vless = proxy(
            r#"
name: vl
type: vless
server: vl.example.com
port: 443
password: 3b6a3c4e-0000-4000-8000-000000000001
"#,
        );
        let OutboundOptions::Vless(opts) = vless.to_outbound().unwrap().options else {
            panic!("expected vless");
        };
        assert_eq!(opts.uuid, "3b6a3c4e-0000-4000-8000-000000000001");
        assert!(opts.tls.is_none());

        let hy2 = proxy("{name: hy, type: hysteria2, server: hy.example.com, port: 443, tfo: true}");
        let outbound = hy2.to_outbound().unwrap();
        let json = serde_json::to_value(&outbound).unwrap();
        assert_eq!(json["type"], "hysteria2");
        assert_eq!(json["tls"]["enabled"], true);
        assert_eq!(json["tcp_fast_open"], true);
    }

    #[test]
    fn test_conversion_errors() {
        let unsupported = proxy("{name: s5, type: socks5, server: a, port: 1080}");
        assert_eq!(
            unsupported.to_outbound(),
            Err(ConversionError::UnsupportedType("socks5".into()))
        );

        let no_password = proxy("{name: tj, type: trojan, server: a, port: 443}");
        assert_eq!(
            no_password.to_outbound(),
            Err(ConversionError::MissingField {
                name: "tj".into(),
                field: "password"
            })
        );

        let no_server = proxy("{name: ss, type: ss, port: 1, cipher: c, password: p}");
        assert!(matches!(
            no_server.to_outbound(),
            Err(ConversionError::MissingField { field: "server", .. })
        ));
    }
}
