// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Configuration-compilation layer for a virtualization management provider.
//!
//! Three pieces, bottom up: a typed model of the capabilities a libvirt host
//! advertises (guest OS types, architectures, hypervisor domain variants and
//! their default emulator/loader/machine choices), a tagged-union model of a
//! guest's hardware and boot configuration (plus resource pools, storage
//! volumes and packet-filter rule sets), and a compiler that renders a
//! populated model into the XML dialect libvirt consumes, for Xen PV/FV,
//! KVM/QEMU and Linux container guests.
//!
//! Everything here is synchronous and side-effect free: model in, text or
//! error out. The provider layer that talks to the management protocol and
//! submits generated XML to libvirt lives elsewhere.

pub mod capabilities;
pub mod domain;
pub mod filter;
pub mod pool;
pub mod xml;

pub use crate::capabilities::parse_and_merge;
pub use crate::capabilities::parse_capabilities;
pub use crate::capabilities::HostCapabilities;
pub use crate::capabilities::ParseError;
pub use crate::domain::Domain;
pub use crate::domain::DomainType;
pub use crate::domain::VirtDevice;
pub use crate::filter::AclFilter;
pub use crate::pool::StorageVol;
pub use crate::pool::VirtPool;
pub use crate::xml::device_to_xml;
pub use crate::xml::domain_to_xml;
pub use crate::xml::domain_to_xml_with_version;
pub use crate::xml::filter_to_xml;
pub use crate::xml::pool_to_xml;
pub use crate::xml::vol_to_xml;
