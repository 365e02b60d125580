use crate::outbound::{ConversionError, Outbound};
use crate::parse::clash::ClashProxy;
use crate::parse::singbox::NativeOutbound;
use std::fmt;

/// The subscription schema a proxy record was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubscriptionFormat {
    /// Clash style YAML document with a `proxies` list.
    Clash,
    /// sing-box style JSON document with an `outbounds` list.
    SingBox,
}

impl fmt::Display for SubscriptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionFormat::Clash => write!(f, "clash"),
            SubscriptionFormat::SingBox => write!(f, "sing-box"),
        }
    }
}

/// A proxy record as decoded from one upstream.
///
/// Each variant keeps the raw fields of its source format private; the only
/// shared operations are `name` and `to_outbound`.
#[derive(Clone, Debug, PartialEq)]
pub enum ProxyOutbound {
    Clash(ClashProxy),
    Native(NativeOutbound),
}

impl ProxyOutbound {
    pub fn name(&self) -> &str {
        match self {
            ProxyOutbound::Clash(p) => p.name(),
            ProxyOutbound::Native(p) => p.name(),
        }
    }

    pub fn to_outbound(&self) -> Result<Outbound, ConversionError> {
        match self {
            ProxyOutbound::Clash(p) => p.to_outbound(),
            ProxyOutbound::Native(p) => p.to_outbound(),
        }
    }

    pub fn format(&self) -> SubscriptionFormat {
        match self {
            ProxyOutbound::Clash(_) => SubscriptionFormat::Clash,
            ProxyOutbound::Native(_) => SubscriptionFormat::SingBox,
        }
    }
}

impl From<ClashProxy> for ProxyOutbound {
    fn from(proxy: ClashProxy) -> Self {
        ProxyOutbound::Clash(proxy)
    }
}

impl From<NativeOutbound> for ProxyOutbound {
    fn from(outbound: NativeOutbound) -> Self {
        ProxyOutbound::Native(outbound)
    }
}

/// Case-sensitive substring match against any of `keywords`.
/// An empty keyword list matches everything.
pub fn matches_any_keyword(name: &str, keywords: &[String]) -> bool {
    keywords.is_empty() || keywords.iter().any(|k| name.contains(k.as_str()))
}
