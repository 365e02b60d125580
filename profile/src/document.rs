//! The profile document consumed by the proxy engine.
//!
//! Only the parts of the engine's configuration schema that synthesis emits
//! are modelled here. Empty lists and unset options are left out of the
//! serialized output.

use serde::Serialize;
use subscription::Outbound;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profile {
    pub log: LogOptions,
    pub dns: DnsOptions,
    pub inbounds: Vec<Inbound>,
    pub route: RouteOptions,
    pub outbounds: Vec<Outbound>,
}

impl Profile {
    pub fn outbound(&self, tag: &str) -> Option<&Outbound> {
        self.outbounds.iter().find(|o| o.tag == tag)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogOptions {
    pub level: String,
    pub timestamp: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DnsOptions {
    pub servers: Vec<DnsServer>,
    pub rules: Vec<DnsRule>,
    #[serde(rename = "final")]
    pub final_server: String,
}

/// A DNS-over-HTTPS server.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DnsServer {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tag: String,
    pub server: String,
    pub server_port: u16,
    pub path: String,
    pub detour: String,
    pub tls: ServerName,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServerName {
    pub server_name: String,
}

/// Conditions shared by DNS and route rules. All set conditions must match.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuleMatch {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_suffix: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_set: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub package_name: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ip_is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clash_mode: Option<String>,
}

impl RuleMatch {
    pub fn references_rule_set(&self, tag: &str) -> bool {
        self.rule_set.iter().any(|r| r == tag)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum DnsAction {
    Route { server: String },
    Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DnsRule {
    #[serde(flatten)]
    pub matcher: RuleMatch,
    #[serde(flatten)]
    pub action: DnsAction,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RouteAction {
    Route { outbound: String },
    Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteRule {
    #[serde(flatten)]
    pub matcher: RuleMatch,
    #[serde(flatten)]
    pub action: RouteAction,
}

impl RouteRule {
    pub fn outbound(&self) -> Option<&str> {
        match &self.action {
            RouteAction::Route { outbound } => Some(outbound),
            RouteAction::Reject => None,
        }
    }
}

/// A remote binary rule set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleSet {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tag: String,
    pub format: &'static str,
    pub url: String,
    pub download_detour: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Inbound {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tag: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub auto_route: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict_route: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteOptions {
    pub rule_set: Vec<RuleSet>,
    pub rules: Vec<RouteRule>,
    #[serde(rename = "final")]
    pub final_outbound: String,
    pub auto_detect_interface: bool,
}
