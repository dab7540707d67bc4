// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Packet-filter rule set model.
//!
//! A filter is a named, ordered list of rules plus weak references to other
//! filters. References are resolved by name at traversal time: the referent
//! may not exist yet or may live in a different lifecycle scope, so forward
//! references are legal and no create-before-reference ordering applies.
//!
//! Rules are addressed positionally as `"<filter-name>:<index>"`. The index
//! is the rule's position for the filter's lifetime; resolving an id after
//! reordering the rules yields a different rule on purpose.

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacRule {
    pub src_mac_addr: Option<String>,
    pub src_mac_mask: Option<String>,
    pub dst_mac_addr: Option<String>,
    pub dst_mac_mask: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpRule {
    pub src_mac_addr: Option<String>,
    pub src_mac_mask: Option<String>,
    pub dst_mac_addr: Option<String>,
    pub dst_mac_mask: Option<String>,
    pub hw_type: Option<String>,
    pub protocol_type: Option<String>,
    pub opcode: Option<String>,
    pub arp_src_mac_addr: Option<String>,
    pub arp_dst_mac_addr: Option<String>,
    pub arp_src_ip_addr: Option<String>,
    pub arp_dst_ip_addr: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRule {
    pub src_mac_addr: Option<String>,
    pub src_mac_mask: Option<String>,
    pub dst_mac_addr: Option<String>,
    pub dst_mac_mask: Option<String>,
    pub src_ip_addr: Option<String>,
    pub src_ip_mask: Option<String>,
    pub dst_ip_addr: Option<String>,
    pub dst_ip_mask: Option<String>,
    pub protocol: Option<String>,
    pub src_port_start: Option<String>,
    pub src_port_end: Option<String>,
    pub dst_port_start: Option<String>,
    pub dst_port_end: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRule {
    pub src_mac_addr: Option<String>,
    pub src_ip_addr: Option<String>,
    pub src_ip_mask: Option<String>,
    pub dst_ip_addr: Option<String>,
    pub dst_ip_mask: Option<String>,
    pub src_ip_from: Option<String>,
    pub src_ip_to: Option<String>,
    pub dst_ip_from: Option<String>,
    pub dst_ip_to: Option<String>,
    pub src_port_start: Option<String>,
    pub src_port_end: Option<String>,
    pub dst_port_start: Option<String>,
    pub dst_port_end: Option<String>,
    pub comment: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpIgmpRule {
    pub src_mac_addr: Option<String>,
    pub src_mac_mask: Option<String>,
    pub dst_mac_addr: Option<String>,
    pub dst_mac_mask: Option<String>,
    pub src_ip_addr: Option<String>,
    pub src_ip_mask: Option<String>,
    pub dst_ip_addr: Option<String>,
    pub dst_ip_mask: Option<String>,
    pub src_ip_from: Option<String>,
    pub src_ip_to: Option<String>,
    pub dst_ip_from: Option<String>,
    pub dst_ip_to: Option<String>,
    pub icmp_type: Option<String>,
    pub code: Option<String>,
    pub comment: Option<String>,
    pub state: Option<String>,
}

/// Protocol-specific half of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclRuleKind {
    /// Unrecognized protocol; carried but never rendered.
    #[default]
    Unknown,
    Mac(MacRule),
    Arp(ArpRule),
    Ip(IpRule),
    Tcp(TcpRule),
    IcmpIgmp(IcmpIgmpRule),
}

/// One packet-filter rule: common action/direction fields plus a
/// protocol-specific variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRule {
    /// Positional identifier, assigned by [`AclFilter::append_rule`].
    pub name: Option<String>,
    pub protocol_id: Option<String>,
    pub action: Option<String>,
    pub direction: Option<String>,
    pub priority: Option<String>,
    pub statematch: Option<String>,
    pub kind: AclRuleKind,
}

/// A named, ordered packet-filter rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclFilter {
    pub uuid: Option<String>,
    pub name: String,
    pub chain: Option<String>,
    pub priority: Option<String>,
    pub rules: Vec<AclRule>,
    /// Names of referenced filters. Weak references, not ownership edges.
    pub refs: Vec<String>,
}

impl AclFilter {
    pub fn new(name: impl Into<String>) -> Self {
        AclFilter {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a rule, assigning it the next positional identifier.
    pub fn append_rule(&mut self, mut rule: AclRule) {
        rule.name = Some(make_rule_id(&self.name, self.rules.len()));
        self.rules.push(rule);
    }

    /// Record a reference to another filter by name.
    pub fn append_ref(&mut self, name: impl Into<String>) {
        self.refs.push(name.into());
    }

    /// Drop the first reference to the named filter, if any.
    pub fn remove_ref(&mut self, name: &str) -> bool {
        match self.refs.iter().position(|r| r == name) {
            Some(pos) => {
                self.refs.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Format a positional rule identifier, `"<filter-name>:<index>"`.
pub fn make_rule_id(filter: &str, index: usize) -> String {
    format!("{}:{}", filter, index)
}

/// Split a rule identifier back into filter name and index.
pub fn parse_rule_id(rule_id: &str) -> Option<(&str, usize)> {
    let (filter, index) = rule_id.split_once(':')?;
    if filter.is_empty() {
        return None;
    }
    Some((filter, index.parse().ok()?))
}
