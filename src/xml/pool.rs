// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Resource pool and storage volume rendering.

use crate::pool::DiskPoolConfig;
use crate::pool::DiskPoolType;
use crate::pool::NetworkPoolConfig;
use crate::pool::PoolConfig;
use crate::pool::StorageVol;
use crate::pool::VirtPool;
use crate::xml::Error;
use crate::xml::Result;
use crate::xml::XmlNode;

/// Render a pool definition document.
pub fn pool_to_xml(pool: &VirtPool) -> Result<String> {
    match &pool.config {
        PoolConfig::Network(net) => net_pool_xml(&pool.name, net),
        PoolConfig::Disk(disk) => disk_pool_xml(&pool.name, disk),
    }
}

fn net_pool_xml(name: &str, pool: &NetworkPoolConfig) -> Result<String> {
    let mut root = XmlNode::new("network");
    root.text_child("name", name);
    // Let libvirt pick the bridge device name.
    root.child("bridge");

    if let Some(mode) = &pool.forward_mode {
        let forward = root.child("forward");
        forward.set_attr("mode", mode);
        if let Some(dev) = &pool.forward_dev {
            forward.set_attr("dev", dev);
        }
    }

    if pool.addr.is_some() || pool.netmask.is_some() {
        let ip = root.child("ip");
        if let Some(addr) = &pool.addr {
            ip.set_attr("address", addr);
        }
        if let Some(netmask) = &pool.netmask {
            ip.set_attr("netmask", netmask);
        }
        if let (Some(start), Some(end)) = (&pool.ip_start, &pool.ip_end) {
            let range = ip.child("dhcp").child("range");
            range.set_attr("start", start);
            range.set_attr("end", end);
        }
    }

    root.render()
}

fn disk_pool_xml(name: &str, pool: &DiskPoolConfig) -> Result<String> {
    let pool_type = pool
        .pool_type
        .as_attr()
        .ok_or(Error::UnsupportedType("pool"))?;

    let mut root = XmlNode::new("pool");
    root.set_attr("type", pool_type);
    root.text_child("name", name);

    match pool.pool_type {
        DiskPoolType::Dir => {}
        DiskPoolType::Fs | DiskPoolType::Disk | DiskPoolType::Logical => {
            let source = root.child("source");
            for path in &pool.device_paths {
                source.child("device").set_attr("path", path);
            }
        }
        DiskPoolType::Netfs => {
            let source = root.child("source");
            if let Some(host) = &pool.host {
                source.child("host").set_attr("name", host);
            }
            if let Some(dir) = &pool.src_dir {
                source.child("dir").set_attr("path", dir);
            }
        }
        DiskPoolType::Iscsi => {
            let source = root.child("source");
            if let Some(host) = &pool.host {
                source.child("host").set_attr("name", host);
            }
            for path in &pool.device_paths {
                source.child("device").set_attr("path", path);
            }
        }
        DiskPoolType::Scsi => {
            let source = root.child("source");
            let adapter = source.child("adapter");
            if let Some(name) = &pool.adapter {
                adapter.set_attr("name", name);
            }
            if let Some(wwpn) = &pool.port_name {
                adapter.set_attr("wwpn", wwpn);
            }
            if let Some(wwnn) = &pool.node_name {
                adapter.set_attr("wwnn", wwnn);
            }
        }
        // as_attr() already screened this out.
        DiskPoolType::Unknown => unreachable!(),
    }

    root.child("target").text_child("path", &pool.path);

    root.render()
}

/// Render a storage volume document for creation inside a pool.
pub fn vol_to_xml(vol: &StorageVol) -> Result<String> {
    let format = vol
        .format
        .as_attr()
        .ok_or(Error::UnsupportedType("volume format"))?;

    let mut root = XmlNode::new("volume");
    root.text_child("name", &vol.name);

    let allocation = root.text_child("allocation", &vol.allocation.to_string());
    if let Some(units) = &vol.cap_units {
        allocation.set_attr("unit", units);
    }
    let capacity = root.text_child("capacity", &vol.capacity.to_string());
    if let Some(units) = &vol.cap_units {
        capacity.set_attr("unit", units);
    }

    let target = root.child("target");
    target.text_child("path", &vol.path);
    target.child("format").set_attr("type", format);

    root.render()
}
