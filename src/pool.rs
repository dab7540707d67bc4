// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource pool and storage volume model.
//!
//! Pools are identified across the model boundary by a string of the form
//! `"<PoolKind>/<name>"` (for example `DiskPool/default`); that string is
//! the only representation of pool identity callers ever see.

use serde::Deserialize;
use serde::Serialize;

/// Kind tag used in pool identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    Network,
    Disk,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Network => "NetworkPool",
            PoolKind::Disk => "DiskPool",
        }
    }
}

/// A virtual network pool: an IP subnet with an optional DHCP range and
/// forwarding setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPoolConfig {
    pub addr: Option<String>,
    pub netmask: Option<String>,
    pub ip_start: Option<String>,
    pub ip_end: Option<String>,
    pub forward_mode: Option<String>,
    pub forward_dev: Option<String>,
}

/// Storage pool backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskPoolType {
    /// Unrecognized backend; rendering it is an error.
    #[default]
    Unknown,
    Dir,
    Fs,
    Netfs,
    Disk,
    Iscsi,
    Logical,
    Scsi,
}

impl DiskPoolType {
    /// Value of the `pool` element's `type` attribute; None for Unknown.
    pub fn as_attr(&self) -> Option<&'static str> {
        match self {
            DiskPoolType::Unknown => None,
            DiskPoolType::Dir => Some("dir"),
            DiskPoolType::Fs => Some("fs"),
            DiskPoolType::Netfs => Some("netfs"),
            DiskPoolType::Disk => Some("disk"),
            DiskPoolType::Iscsi => Some("iscsi"),
            DiskPoolType::Logical => Some("logical"),
            DiskPoolType::Scsi => Some("scsi"),
        }
    }
}

/// A storage pool. Which source fields matter depends on `pool_type`:
/// device paths for fs/disk/logical/iscsi, host + export dir for netfs,
/// an adapter (plus port/node WWNs) for scsi.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskPoolConfig {
    pub pool_type: DiskPoolType,
    pub device_paths: Vec<String>,
    pub host: Option<String>,
    pub src_dir: Option<String>,
    pub adapter: Option<String>,
    pub port_name: Option<String>,
    pub node_name: Option<String>,
    /// Target path the pool is mounted/mapped at.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolConfig {
    Network(NetworkPoolConfig),
    Disk(DiskPoolConfig),
}

/// A named resource pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtPool {
    pub name: String,
    pub config: PoolConfig,
}

impl VirtPool {
    pub fn kind(&self) -> PoolKind {
        match self.config {
            PoolConfig::Network(_) => PoolKind::Network,
            PoolConfig::Disk(_) => PoolKind::Disk,
        }
    }

    /// The pool's external identifier, `"<PoolKind>/<name>"`.
    pub fn pool_id(&self) -> String {
        format!("{}/{}", self.kind().as_str(), self.name)
    }
}

/// Parse a pool identifier back into kind and name.
pub fn parse_pool_id(id: &str) -> Option<(PoolKind, &str)> {
    let (kind, name) = id.split_once('/')?;
    if name.is_empty() {
        return None;
    }
    let kind = match kind {
        "NetworkPool" => PoolKind::Network,
        "DiskPool" => PoolKind::Disk,
        _ => return None,
    };
    Some((kind, name))
}

/// On-disk format of a storage volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolFormat {
    /// Unrecognized format; rendering it is an error.
    #[default]
    Unknown,
    Raw,
    Qcow2,
}

impl VolFormat {
    pub fn as_attr(&self) -> Option<&'static str> {
        match self {
            VolFormat::Unknown => None,
            VolFormat::Raw => Some("raw"),
            VolFormat::Qcow2 => Some("qcow2"),
        }
    }
}

/// A storage volume to be created inside a storage pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVol {
    pub name: String,
    pub path: String,
    pub allocation: u64,
    pub capacity: u64,
    /// Unit for both allocation and capacity ("G", "MiB", ...). Omitted
    /// attribute when None, which libvirt reads as bytes.
    pub cap_units: Option<String>,
    pub format: VolFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk_pool(name: &str) -> VirtPool {
        VirtPool {
            name: name.to_string(),
            config: PoolConfig::Disk(DiskPoolConfig {
                pool_type: DiskPoolType::Dir,
                path: "/var/lib/images".to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn pool_id_format() {
        let pool = disk_pool("default");
        assert_eq!(pool.pool_id(), "DiskPool/default");

        let net = VirtPool {
            name: "default".to_string(),
            config: PoolConfig::Network(NetworkPoolConfig::default()),
        };
        assert_eq!(net.pool_id(), "NetworkPool/default");
    }

    #[test]
    fn pool_id_round_trip() {
        let pool = disk_pool("images");
        assert_eq!(
            parse_pool_id(&pool.pool_id()),
            Some((PoolKind::Disk, "images"))
        );
        assert_eq!(
            parse_pool_id("NetworkPool/default"),
            Some((PoolKind::Network, "default"))
        );
    }

    #[test]
    fn parse_pool_id_rejects_garbage() {
        assert_eq!(parse_pool_id("nothing"), None);
        assert_eq!(parse_pool_id("DiskPool/"), None);
        assert_eq!(parse_pool_id("ProcessorPool/0"), None);
    }
}
