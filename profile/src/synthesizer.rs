//! Profile synthesis.
//!
//! Outbounds are converted once, then grouped:
//!
//! 1. `direct-out` is always emitted first.
//! 2. Every `auto` selector becomes a `urltest` group, even when empty. The
//!    first one is the profile's primary proxy.
//! 3. Every `keyword-group` selector with at least one match becomes a
//!    `selector` group; groups without matches are left out entirely.
//! 4. All converted outbounds follow, in snapshot order and without
//!    deduplication.
//!
//! Rules and rule sets that point at a group are only emitted when that
//! group exists, so the document never references a missing tag.

use crate::baseline;
use crate::config::{SelectorKind, SelectorSpec, Service};
use crate::document::{DnsOptions, Profile, RouteOptions};
use crate::metrics_defs::{PROFILES_SYNTHESIZED, SKIPPED_GROUPS, UNCONVERTIBLE_OUTBOUNDS};
use indexmap::IndexSet;
use shared::counter;
use subscription::outbound::{SelectorOptions, UrlTestOptions};
use subscription::{AggregateSnapshot, Outbound, OutboundOptions, ProxyOutbound};

pub const DIRECT_TAG: &str = "direct-out";

const URLTEST_URL: &str = "https://www.google.com/generate_204";
const URLTEST_INTERVAL: &str = "300s";
const URLTEST_TOLERANCE: u16 = 50;

/// A converted outbound and the upstream it came from, when known.
struct Candidate<'a> {
    upstream: Option<&'a str>,
    outbound: Outbound,
}

/// Synthesizes a profile from a flat outbound list. Member upstreams on
/// selectors are ignored since the list carries no provenance.
pub fn synthesize(outbounds: &[ProxyOutbound], selectors: &[SelectorSpec]) -> Profile {
    let candidates = convert(outbounds.iter().map(|p| (None, p)));
    assemble(candidates, selectors)
}

/// Synthesizes a profile from a store snapshot, restricting selectors with
/// member upstreams to the outbounds of those upstreams.
pub fn synthesize_snapshot(snapshot: &AggregateSnapshot, selectors: &[SelectorSpec]) -> Profile {
    let candidates = convert(
        snapshot
            .upstreams()
            .flat_map(|(url, list)| list.iter().map(move |p| (Some(url), p))),
    );
    assemble(candidates, selectors)
}

fn convert<'a>(
    items: impl Iterator<Item = (Option<&'a str>, &'a ProxyOutbound)>,
) -> Vec<Candidate<'a>> {
    items
        .filter_map(|(upstream, proxy)| match proxy.to_outbound() {
            Ok(outbound) => Some(Candidate { upstream, outbound }),
            Err(e) => {
                counter!(UNCONVERTIBLE_OUTBOUNDS).increment(1);
                tracing::debug!(name = proxy.name(), error = %e, "leaving outbound out of profile");
                None
            }
        })
        .collect()
}

/// Case-insensitive substring match. No keywords matches everything.
fn matches_keywords(tag: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let tag = tag.to_lowercase();
    keywords.iter().any(|k| tag.contains(&k.to_lowercase()))
}

fn admits(spec: &SelectorSpec, candidate: &Candidate<'_>) -> bool {
    let from_member_upstream = match candidate.upstream {
        Some(url) if !spec.upstreams.is_empty() => spec.upstreams.iter().any(|u| u == url),
        _ => true,
    };
    from_member_upstream && matches_keywords(&candidate.outbound.tag, &spec.keywords)
}

fn member_tags(spec: &SelectorSpec, candidates: &[Candidate<'_>]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| admits(spec, c))
        .map(|c| c.outbound.tag.clone())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

fn assemble(candidates: Vec<Candidate<'_>>, selectors: &[SelectorSpec]) -> Profile {
    let mut outbounds = vec![Outbound::direct(DIRECT_TAG)];

    let mut primary: Option<&str> = None;
    for spec in selectors.iter().filter(|s| s.kind == SelectorKind::Auto) {
        let members = member_tags(spec, &candidates);
        outbounds.push(Outbound::new(
            spec.name.clone(),
            OutboundOptions::UrlTest(UrlTestOptions {
                outbounds: members,
                url: URLTEST_URL.into(),
                interval: URLTEST_INTERVAL.into(),
                tolerance: URLTEST_TOLERANCE,
            }),
        ));
        primary.get_or_insert(spec.name.as_str());
    }

    let mut ai_group: Option<&str> = None;
    for spec in selectors
        .iter()
        .filter(|s| s.kind == SelectorKind::KeywordGroup)
    {
        let members = if spec.keywords.is_empty() {
            Vec::new()
        } else {
            member_tags(spec, &candidates)
        };
        if members.is_empty() {
            counter!(SKIPPED_GROUPS).increment(1);
            tracing::debug!(group = %spec.name, "no outbound matched keyword group, skipping");
            continue;
        }

        outbounds.push(Outbound::new(
            spec.name.clone(),
            OutboundOptions::Selector(SelectorOptions {
                outbounds: members,
                default: None,
            }),
        ));
        if spec.services.contains(&Service::Ai) {
            ai_group.get_or_insert(spec.name.as_str());
        }
    }

    outbounds.extend(candidates.into_iter().map(|c| c.outbound));

    let proxy = primary.unwrap_or(DIRECT_TAG);
    let with_ai = ai_group.is_some();

    let mut rules = Vec::new();
    if let Some(group) = ai_group {
        rules.push(baseline::ai_route_rule(group));
    }
    rules.extend(baseline::route_rules(DIRECT_TAG, proxy));

    counter!(PROFILES_SYNTHESIZED).increment(1);
    tracing::debug!(
        outbounds = outbounds.len(),
        primary = proxy,
        ai_group = ai_group.unwrap_or("none"),
        "profile synthesized"
    );

    Profile {
        log: baseline::log(),
        dns: DnsOptions {
            servers: baseline::dns_servers(proxy, DIRECT_TAG),
            rules: baseline::dns_rules(with_ai),
            final_server: baseline::LOCAL_DNS.into(),
        },
        inbounds: baseline::inbounds(),
        route: RouteOptions {
            rule_set: baseline::rule_sets(with_ai, DIRECT_TAG),
            rules,
            final_outbound: proxy.into(),
            auto_detect_interface: true,
        },
        outbounds,
    }
}
