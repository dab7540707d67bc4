// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Packet-filter rendering.
//!
//! The filter document is flat: name, chain, uuid, and references to other
//! filters. The filter's own rules are associated with it by a separate
//! layer and are not part of this render.

use crate::filter::AclFilter;
use crate::xml::Result;
use crate::xml::XmlNode;

/// Render a filter definition document.
pub fn filter_to_xml(filter: &AclFilter) -> Result<String> {
    let mut root = XmlNode::new("filter");
    root.set_attr("name", &filter.name);
    if let Some(chain) = &filter.chain {
        root.set_attr("chain", chain);
    }
    if let Some(uuid) = &filter.uuid {
        root.text_child("uuid", uuid);
    }
    for reference in &filter.refs {
        root.child("filterref").set_attr("filter", reference);
    }
    root.render()
}
