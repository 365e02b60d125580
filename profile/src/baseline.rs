//! Fixed parts of every profile: DNS servers, inbounds, rule sets and the
//! rules that do not depend on which groups exist.

use crate::document::{
    DnsAction, DnsRule, DnsServer, Inbound, LogOptions, RouteAction, RouteRule, RuleMatch,
    RuleSet, ServerName,
};

pub const LOCAL_DNS: &str = "alidns";
pub const GOOGLE_DNS: &str = "google-doh";
pub const CLOUDFLARE_DNS: &str = "cloudflare-doh";

pub const GEOSITE_CN: &str = "geosite-cn";
pub const GEOIP_CN: &str = "geoip-cn";
pub const ADBLOCK: &str = "adblock";
pub const OPENAI: &str = "openai";
pub const GEMINI: &str = "gemini";

const RULE_SET_MIRROR: &str = "https://jsd.onmicrosoft.cn/gh/SagerNet";

// Resolved through the local resolver so rule set downloads and common
// developer hosts work before any proxy is reachable.
const LOCAL_DOMAIN_SUFFIXES: &[&str] = &[
    "onmicrosoft.cn",
    "s4b4.com",
    "github.com",
    "raw.githubusercontent.com",
];

const AI_DOMAIN_SUFFIXES: &[&str] = &["openai.com", "oaistatic.com", "oaiusercontent.com"];
const AI_PACKAGES: &[&str] = &[
    "com.openai.chatgpt",
    "com.google.android.apps.bard",
    "com.google.bard",
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn log() -> LogOptions {
    LogOptions {
        level: "info".into(),
        timestamp: true,
    }
}

fn doh(tag: &str, server: &str, server_name: &str, detour: &str) -> DnsServer {
    DnsServer {
        kind: "https",
        tag: tag.into(),
        server: server.into(),
        server_port: 443,
        path: "/dns-query".into(),
        detour: detour.into(),
        tls: ServerName {
            server_name: server_name.into(),
        },
    }
}

/// The DoH servers. Foreign resolvers are reached through `proxy_detour`.
pub fn dns_servers(proxy_detour: &str, direct_detour: &str) -> Vec<DnsServer> {
    vec![
        doh(GOOGLE_DNS, "8.8.8.8", "dns.google", proxy_detour),
        doh(LOCAL_DNS, "223.5.5.5", "dns.alidns.com", direct_detour),
        doh(CLOUDFLARE_DNS, "1.1.1.1", "cloudflare-dns.com", proxy_detour),
    ]
}

/// DNS rules, with the AI resolver rule only when `with_ai` is set.
pub fn dns_rules(with_ai: bool) -> Vec<DnsRule> {
    let route = |server: &str| DnsAction::Route {
        server: server.into(),
    };

    let mut rules = vec![
        DnsRule {
            matcher: RuleMatch {
                domain_suffix: strings(LOCAL_DOMAIN_SUFFIXES),
                ..Default::default()
            },
            action: route(LOCAL_DNS),
        },
        DnsRule {
            matcher: RuleMatch {
                rule_set: strings(&[ADBLOCK]),
                ..Default::default()
            },
            action: DnsAction::Reject,
        },
        DnsRule {
            matcher: RuleMatch {
                rule_set: strings(&[GEOSITE_CN, GEOIP_CN]),
                clash_mode: Some("direct".into()),
                ..Default::default()
            },
            action: route(LOCAL_DNS),
        },
    ];

    if with_ai {
        rules.push(DnsRule {
            matcher: RuleMatch {
                rule_set: strings(&[OPENAI, GEMINI]),
                ..Default::default()
            },
            action: route(CLOUDFLARE_DNS),
        });
    }

    rules.push(DnsRule {
        matcher: RuleMatch {
            clash_mode: Some("global".into()),
            ..Default::default()
        },
        action: route(LOCAL_DNS),
    });
    rules
}

pub fn inbounds() -> Vec<Inbound> {
    let listener = |kind: &'static str, tag: &str, port: u16| Inbound {
        kind,
        tag: tag.into(),
        address: Vec::new(),
        mtu: None,
        auto_route: false,
        strict_route: false,
        listen: Some("127.0.0.1".into()),
        listen_port: Some(port),
    };

    vec![
        Inbound {
            kind: "tun",
            tag: "tun-in".into(),
            address: strings(&["172.19.0.1/30", "2001:0470:f9da:fdfa::1/64"]),
            mtu: Some(9000),
            auto_route: true,
            strict_route: true,
            listen: None,
            listen_port: None,
        },
        listener("socks", "socks-in", 2333),
        listener("mixed", "mixed-in", 2334),
    ]
}

fn remote_rule_set(tag: &str, path: &str, download_detour: &str) -> RuleSet {
    RuleSet {
        kind: "remote",
        tag: tag.into(),
        format: "binary",
        url: format!("{RULE_SET_MIRROR}/{path}"),
        download_detour: download_detour.into(),
    }
}

/// Remote rule sets, with the AI sets only when `with_ai` is set.
pub fn rule_sets(with_ai: bool, download_detour: &str) -> Vec<RuleSet> {
    let mut sets = vec![
        remote_rule_set(
            GEOSITE_CN,
            "sing-geosite@rule-set/geosite-cn.srs",
            download_detour,
        ),
        remote_rule_set(
            GEOIP_CN,
            "sing-geoip@rule-set/geoip-cn.srs",
            download_detour,
        ),
    ];
    if with_ai {
        sets.push(remote_rule_set(
            OPENAI,
            "sing-geosite@rule-set/geosite-openai.srs",
            download_detour,
        ));
        sets.push(remote_rule_set(
            GEMINI,
            "sing-geosite@rule-set/geosite-google-gemini.srs",
            download_detour,
        ));
    }
    sets.push(remote_rule_set(
        ADBLOCK,
        "sing-geosite@rule-set/geosite-adblock.srs",
        download_detour,
    ));
    sets
}

/// Routes AI service traffic to `outbound`.
pub fn ai_route_rule(outbound: &str) -> RouteRule {
    RouteRule {
        matcher: RuleMatch {
            domain_suffix: strings(AI_DOMAIN_SUFFIXES),
            rule_set: strings(&[OPENAI, GEMINI]),
            package_name: strings(AI_PACKAGES),
            ..Default::default()
        },
        action: RouteAction::Route {
            outbound: outbound.into(),
        },
    }
}

/// Rules that every profile carries: ad blocking, direct routing for private
/// and mainland destinations in direct mode, and everything through
/// `global_outbound` in global mode.
pub fn route_rules(direct_outbound: &str, global_outbound: &str) -> Vec<RouteRule> {
    vec![
        RouteRule {
            matcher: RuleMatch {
                rule_set: strings(&[ADBLOCK]),
                ..Default::default()
            },
            action: RouteAction::Reject,
        },
        RouteRule {
            matcher: RuleMatch {
                rule_set: strings(&[GEOSITE_CN, GEOIP_CN]),
                ip_is_private: true,
                clash_mode: Some("direct".into()),
                ..Default::default()
            },
            action: RouteAction::Route {
                outbound: direct_outbound.into(),
            },
        },
        RouteRule {
            matcher: RuleMatch {
                clash_mode: Some("global".into()),
                ..Default::default()
            },
            action: RouteAction::Route {
                outbound: global_outbound.into(),
            },
        },
    ]
}
