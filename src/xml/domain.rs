// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Domain and device rendering.

use log::debug;
use uuid::Uuid;

use crate::domain::ConsoleDevice;
use crate::domain::ConsoleSource;
use crate::domain::ControllerDevice;
use crate::domain::DeviceAddress;
use crate::domain::DiskDevice;
use crate::domain::DiskType;
use crate::domain::Domain;
use crate::domain::DomainType;
use crate::domain::Features;
use crate::domain::GraphicsDevice;
use crate::domain::InputDevice;
use crate::domain::MemDevice;
use crate::domain::NetDevice;
use crate::domain::NetType;
use crate::domain::OsConfig;
use crate::domain::VcpuDevice;
use crate::domain::VirtDevice;
use crate::domain::VsiProfile;
use crate::xml::Error;
use crate::xml::Result;
use crate::xml::XmlNode;

/// libvirt version assumed when the caller does not supply one: any modern
/// host. Version numbers are `major * 1_000_000 + minor * 1_000 + micro`.
pub const DEFAULT_LIBVIRT_VERSION: u64 = 1_002_000;

// `<cputune>` and interface `<bandwidth>` first appeared in libvirt 0.9.0.
const CPUTUNE_MIN_VERSION: u64 = 9_000;
const BANDWIDTH_MIN_VERSION: u64 = 9_000;

const DEFAULT_HVM_LOADER: &str = "/usr/lib/xen/boot/hvmloader";
const XEN_BRIDGE_SCRIPT: &str = "vif-bridge";

/// Render a complete domain document, assuming a modern libvirt host.
pub fn domain_to_xml(dominfo: &Domain) -> Result<String> {
    domain_to_xml_with_version(dominfo, DEFAULT_LIBVIRT_VERSION)
}

/// Render a complete domain document for a host running the given libvirt
/// version. Elements newer than that version are suppressed.
pub fn domain_to_xml_with_version(dominfo: &Domain, libvirt_version: u64) -> Result<String> {
    let mut root = XmlNode::new("domain");
    root.set_attr("type", dominfo.domain_type.as_attr());

    root.text_child("name", &dominfo.name);

    if let OsConfig::Pv(pv) = &dominfo.os {
        if let Some(bootloader) = &pv.bootloader {
            root.text_child("bootloader", bootloader);
        }
        if let Some(args) = &pv.bootloader_args {
            root.text_child("bootloader_args", args);
        }
    }

    root.text_child("on_poweroff", dominfo.on_poweroff.as_str());
    root.text_child("on_crash", dominfo.on_crash.as_str());

    match &dominfo.uuid {
        Some(uuid) => {
            root.text_child("uuid", uuid);
        }
        None => {
            let uuid = Uuid::new_v4().to_string();
            debug!("domain {} has no UUID, generated {}", dominfo.name, uuid);
            root.text_child("uuid", &uuid);
        }
    }

    if let Some(offset) = &dominfo.clock {
        root.child("clock").set_attr("offset", offset);
    }

    os_xml(&mut root, dominfo)?;
    features_xml(&mut root, &dominfo.features);

    if let Some(mem) = first_mem(dominfo) {
        mem_xml(&mut root, mem);
    }
    if let Some(vcpu) = first_vcpu(dominfo) {
        vcpu_xml(&mut root, vcpu, libvirt_version);
    }

    // Logically deleted (Unknown) and mismatched slots are skipped without
    // disturbing the positions of the remaining devices.
    let devices = root.child("devices");
    for dev in &dominfo.disks {
        if let VirtDevice::Disk(disk) = dev {
            disk_xml(devices, disk);
        }
    }
    for dev in &dominfo.nets {
        if let VirtDevice::Net(net) = dev {
            net_xml(devices, net, dominfo.domain_type, libvirt_version);
        }
    }
    for dev in &dominfo.inputs {
        if let VirtDevice::Input(input) = dev {
            input_xml(devices, input);
        }
    }
    for dev in &dominfo.consoles {
        if let VirtDevice::Console(console) = dev {
            console_xml(devices, console);
        }
    }
    for dev in &dominfo.graphics {
        if let VirtDevice::Graphics(graphics) = dev {
            graphics_xml(devices, graphics);
        }
    }
    for dev in &dominfo.emus {
        if let VirtDevice::Emu(emu) = dev {
            devices.text_child("emulator", &emu.path);
        }
    }
    for dev in &dominfo.controllers {
        if let VirtDevice::Controller(controller) = dev {
            controller_xml(devices, controller);
        }
    }

    // Container guests always get a pty console, whatever else is defined.
    if dominfo.domain_type == DomainType::Lxc {
        devices.child("console").set_attr("type", "pty");
    }

    root.render()
}

/// Render a single device as a standalone fragment, for attach/detach
/// style operations. The target domain type decides hypervisor-conditional
/// details (the Xen bridge script).
pub fn device_to_xml(dev: &VirtDevice, domain_type: DomainType) -> Result<String> {
    let mut scratch = XmlNode::new("devices");
    match dev {
        VirtDevice::Unknown => return Err(Error::UnsupportedType("device")),
        VirtDevice::Disk(disk) => disk_xml(&mut scratch, disk),
        VirtDevice::Net(net) => net_xml(&mut scratch, net, domain_type, DEFAULT_LIBVIRT_VERSION),
        VirtDevice::Mem(mem) => mem_xml(&mut scratch, mem),
        VirtDevice::Vcpu(vcpu) => {
            scratch.text_child("vcpu", &vcpu.quantity.to_string());
        }
        VirtDevice::Graphics(graphics) => graphics_xml(&mut scratch, graphics),
        VirtDevice::Console(console) => console_xml(&mut scratch, console),
        VirtDevice::Input(input) => input_xml(&mut scratch, input),
        VirtDevice::Controller(controller) => controller_xml(&mut scratch, controller),
        VirtDevice::Emu(emu) => {
            scratch.text_child("emulator", &emu.path);
        }
    }
    scratch.render_children()
}

fn first_mem(dominfo: &Domain) -> Option<&MemDevice> {
    dominfo.mems.iter().find_map(|d| match d {
        VirtDevice::Mem(mem) => Some(mem),
        _ => None,
    })
}

fn first_vcpu(dominfo: &Domain) -> Option<&VcpuDevice> {
    dominfo.vcpus.iter().find_map(|d| match d {
        VirtDevice::Vcpu(vcpu) => Some(vcpu),
        _ => None,
    })
}

fn os_xml(root: &mut XmlNode, dominfo: &Domain) -> Result<()> {
    match (dominfo.domain_type, &dominfo.os) {
        (DomainType::XenPv, OsConfig::Pv(pv)) => {
            let os = root.child("os");
            os.text_child("type", pv.os_type.as_deref().unwrap_or("linux"));
            os.text_child("kernel", pv.kernel.as_deref().unwrap_or("/dev/null"));
            if let Some(initrd) = &pv.initrd {
                os.text_child("initrd", initrd);
            }
            if let Some(cmdline) = &pv.cmdline {
                os.text_child("cmdline", cmdline);
            }
        }
        (DomainType::XenFv, OsConfig::Fv(fv)) => {
            let os = root.child("os");
            os.text_child("type", fv.os_type.as_deref().unwrap_or("hvm"));
            os.text_child("loader", fv.loader.as_deref().unwrap_or(DEFAULT_HVM_LOADER));
            boot_xml(os, &fv.boot_devices);
        }
        (DomainType::Kvm | DomainType::Qemu, OsConfig::Fv(fv)) => {
            let os = root.child("os");
            let os_type = os.text_child("type", fv.os_type.as_deref().unwrap_or("hvm"));
            if let Some(arch) = &fv.arch {
                os_type.set_attr("arch", arch);
            }
            if let Some(machine) = &fv.machine {
                os_type.set_attr("machine", machine);
            }
            if let Some(loader) = &fv.loader {
                os.text_child("loader", loader);
            }
            boot_xml(os, &fv.boot_devices);
        }
        (DomainType::Lxc, OsConfig::Container(container)) => {
            let os = root.child("os");
            os.text_child("type", container.os_type.as_deref().unwrap_or("exe"));
            if let Some(init) = &container.init {
                os.text_child("init", init);
            }
        }
        _ => return Err(Error::BootConfigMismatch(dominfo.domain_type)),
    }
    Ok(())
}

fn boot_xml(os: &mut XmlNode, boot_devices: &[String]) {
    if boot_devices.is_empty() {
        os.child("boot").set_attr("dev", "hd");
        return;
    }
    for dev in boot_devices {
        os.child("boot").set_attr("dev", dev);
    }
}

fn features_xml(root: &mut XmlNode, features: &Features) {
    if !(features.acpi || features.apic || features.pae) {
        return;
    }
    let node = root.child("features");
    if features.acpi {
        node.child("acpi");
    }
    if features.apic {
        node.child("apic");
    }
    if features.pae {
        node.child("pae");
    }
}

fn mem_xml(root: &mut XmlNode, mem: &MemDevice) {
    root.text_child("currentMemory", &mem.size.to_string());
    let memory = root.text_child("memory", &mem.maxsize.to_string());
    if let Some(dump_core) = mem.dump_core {
        memory.set_attr("dumpCore", if dump_core { "on" } else { "off" });
    }
}

fn vcpu_xml(root: &mut XmlNode, vcpu: &VcpuDevice, libvirt_version: u64) {
    root.text_child("vcpu", &vcpu.quantity.to_string());
    if libvirt_version >= CPUTUNE_MIN_VERSION && vcpu.weight > 0 {
        root.child("cputune")
            .text_child("shares", &vcpu.weight.to_string());
    }
}

fn disk_xml(parent: &mut XmlNode, dev: &DiskDevice) {
    match dev.disk_type {
        DiskType::Block => block_disk_xml(parent, dev),
        DiskType::File => file_disk_xml(parent, dev),
        DiskType::Filesystem => filesystem_xml(parent, dev),
    }
}

fn block_disk_xml(parent: &mut XmlNode, dev: &DiskDevice) {
    let disk = parent.child("disk");
    disk.set_attr("type", "block");
    disk_common_attrs(disk, dev);
    if let Some(driver) = &dev.driver {
        let node = disk.child("driver");
        node.set_attr("name", driver);
        if let Some(driver_type) = &dev.driver_type {
            node.set_attr("type", driver_type);
        }
        if let Some(cache) = &dev.cache {
            node.set_attr("cache", cache);
        }
    }
    // The null device stands for an empty drive; it gets no source at all.
    if dev.source != "/dev/null" {
        disk.child("source").set_attr("dev", &dev.source);
    }
    disk_target_xml(disk, dev);
    disk_common_children(disk, dev);
}

fn file_disk_xml(parent: &mut XmlNode, dev: &DiskDevice) {
    let disk = parent.child("disk");
    disk.set_attr("type", "file");
    disk_common_attrs(disk, dev);
    // An empty-source cdrom is a placeholder for an empty drive.
    let empty_cdrom = dev.device.as_deref() == Some("cdrom") && dev.source.is_empty();
    if !empty_cdrom {
        disk.child("source").set_attr("file", &dev.source);
    }
    disk_target_xml(disk, dev);
    disk_common_children(disk, dev);
}

fn filesystem_xml(parent: &mut XmlNode, dev: &DiskDevice) {
    let fs = parent.child("filesystem");
    fs.set_attr("type", "mount");
    if let Some(access_mode) = &dev.access_mode {
        fs.set_attr("accessmode", access_mode);
    }
    fs.child("source").set_attr("dir", &dev.source);
    fs.child("target").set_attr("dir", &dev.virtual_dev);
    disk_common_children(fs, dev);
}

fn disk_common_attrs(disk: &mut XmlNode, dev: &DiskDevice) {
    if let Some(device) = &dev.device {
        disk.set_attr("device", device);
    }
    if let Some(rawio) = &dev.rawio {
        disk.set_attr("rawio", rawio);
    }
    if let Some(sgio) = &dev.sgio {
        disk.set_attr("sgio", sgio);
    }
}

fn disk_target_xml(disk: &mut XmlNode, dev: &DiskDevice) {
    let target = disk.child("target");
    target.set_attr("dev", &dev.virtual_dev);
    if let Some(bus) = &dev.bus_type {
        target.set_attr("bus", bus);
    }
}

fn disk_common_children(disk: &mut XmlNode, dev: &DiskDevice) {
    if dev.readonly {
        disk.child("readonly");
    }
    if dev.shareable {
        disk.child("shareable");
    }
    address_xml(disk, &dev.address);
}

fn address_xml(parent: &mut XmlNode, address: &DeviceAddress) {
    if address.is_empty() {
        return;
    }
    let node = parent.child("address");
    for (key, value) in &address.attrs {
        node.set_attr(key, value);
    }
}

fn net_xml(parent: &mut XmlNode, dev: &NetDevice, domain_type: DomainType, libvirt_version: u64) {
    let nic = parent.child("interface");
    nic.set_attr("type", dev.net_type.as_str());
    nic.child("mac").set_attr("address", &dev.mac);

    match dev.net_type {
        NetType::Bridge => {
            if let Some(bridge) = &dev.source {
                nic.child("source").set_attr("bridge", bridge);
            }
            // Xen runs a host script to plug the vif into the bridge.
            if domain_type.is_xen() {
                nic.child("script").set_attr("path", XEN_BRIDGE_SCRIPT);
            }
        }
        NetType::Network => {
            if let Some(network) = &dev.source {
                nic.child("source").set_attr("network", network);
            }
        }
        NetType::User => {}
        NetType::Direct => {
            let source = nic.child("source");
            if let Some(dev_name) = &dev.source {
                source.set_attr("dev", dev_name);
            }
            if let Some(mode) = &dev.net_mode {
                source.set_attr("mode", mode);
            }
            if let Some(vsi) = &dev.vsi {
                virtualport_xml(nic, vsi);
            }
        }
    }

    if let Some(target) = &dev.device {
        nic.child("target").set_attr("dev", target);
    }
    if let Some(model) = &dev.model {
        nic.child("model").set_attr("type", model);
    }
    if let Some(filter_ref) = &dev.filter_ref {
        nic.child("filterref").set_attr("filter", filter_ref);
    }
    if libvirt_version >= BANDWIDTH_MIN_VERSION && dev.bandwidth.is_set() {
        let inbound = nic.child("bandwidth").child("inbound");
        inbound.set_attr("average", &dev.bandwidth.reservation.to_string());
        if dev.bandwidth.limit > 0 {
            inbound.set_attr("peak", &dev.bandwidth.limit.to_string());
        }
    }
}

fn virtualport_xml(nic: &mut XmlNode, vsi: &VsiProfile) {
    let port = nic.child("virtualport");
    port.set_attr("type", &vsi.vsi_type);
    let params = port.child("parameters");
    if vsi.vsi_type == "802.1Qbh" {
        if let Some(profile_id) = &vsi.profile_id {
            params.set_attr("profileid", profile_id);
        }
    } else {
        if let Some(manager_id) = &vsi.manager_id {
            params.set_attr("managerid", manager_id);
        }
        if let Some(type_id) = &vsi.type_id {
            params.set_attr("typeid", type_id);
        }
        if let Some(version) = &vsi.type_id_version {
            params.set_attr("typeidversion", version);
        }
        if let Some(instance_id) = &vsi.instance_id {
            params.set_attr("instanceid", instance_id);
        }
    }
}

fn console_xml(parent: &mut XmlNode, dev: &ConsoleDevice) {
    let console = parent.child("console");
    console.set_attr("type", dev.source.type_str());

    match &dev.source {
        ConsoleSource::Pty { path } => {
            if let Some(path) = path {
                console.child("source").set_attr("path", path);
            }
        }
        ConsoleSource::Dev { path }
        | ConsoleSource::File { path }
        | ConsoleSource::Pipe { path } => {
            console.child("source").set_attr("path", path);
        }
        ConsoleSource::UnixSocket { mode, path } => {
            let source = console.child("source");
            source.set_attr("mode", mode.as_str());
            source.set_attr("path", path);
        }
        ConsoleSource::Udp {
            bind_host,
            bind_service,
            connect_host,
            connect_service,
        } => {
            // UDP consoles always carry both endpoints.
            let bind = console.child("source");
            bind.set_attr("mode", "bind");
            bind.set_attr("host", bind_host);
            if let Some(service) = bind_service {
                bind.set_attr("service", service);
            }
            let connect = console.child("source");
            connect.set_attr("mode", "connect");
            if let Some(host) = connect_host {
                connect.set_attr("host", host);
            }
            if let Some(service) = connect_service {
                connect.set_attr("service", service);
            }
        }
        ConsoleSource::Tcp {
            mode,
            host,
            service,
        } => {
            let source = console.child("source");
            source.set_attr("mode", mode.as_str());
            source.set_attr("host", host);
            if let Some(service) = service {
                source.set_attr("service", service);
            }
        }
        ConsoleSource::Stdio
        | ConsoleSource::Null
        | ConsoleSource::Vc
        | ConsoleSource::Spicevmc => {}
    }

    if let Some(target_type) = &dev.target_type {
        console.child("target").set_attr("type", target_type);
    }
}

fn graphics_xml(parent: &mut XmlNode, dev: &GraphicsDevice) {
    let graphics = parent.child("graphics");
    match dev {
        GraphicsDevice::Vnc {
            port,
            host,
            passwd,
            keymap,
        } => {
            graphics.set_attr("type", "vnc");
            if let Some(port) = port {
                graphics.set_attr("port", port);
            }
            if let Some(host) = host {
                graphics.set_attr("listen", host);
            }
            if let Some(passwd) = passwd {
                graphics.set_attr("passwd", passwd);
            }
            if let Some(keymap) = keymap {
                graphics.set_attr("keymap", keymap);
            }
        }
        GraphicsDevice::Sdl {
            display,
            xauth,
            fullscreen,
        } => {
            graphics.set_attr("type", "sdl");
            if let Some(display) = display {
                graphics.set_attr("display", display);
            }
            if let Some(xauth) = xauth {
                graphics.set_attr("xauth", xauth);
            }
            if let Some(fullscreen) = fullscreen {
                graphics.set_attr("fullscreen", fullscreen);
            }
        }
    }
}

fn input_xml(parent: &mut XmlNode, dev: &InputDevice) {
    let input = parent.child("input");
    input.set_attr("type", dev.input_type.as_str());
    input.set_attr("bus", dev.bus.as_str());
}

fn controller_xml(parent: &mut XmlNode, dev: &ControllerDevice) {
    let controller = parent.child("controller");
    controller.set_attr("type", &dev.controller_type);
    // Index left unset: omit the attribute and let the consumer assign one.
    if let Some(index) = dev.index {
        controller.set_attr("index", &index.to_string());
    }
    if let Some(model) = &dev.model {
        controller.set_attr("model", model);
    }
    if let Some(ports) = &dev.ports {
        controller.set_attr("ports", ports);
    }
    if let Some(vectors) = &dev.vectors {
        controller.set_attr("vectors", vectors);
    }
    if let Some(queues) = &dev.queues {
        controller.child("driver").set_attr("queues", queues);
    }
    address_xml(controller, &dev.address);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bandwidth;
    use crate::domain::ContainerOsConfig;
    use crate::domain::EmuDevice;
    use crate::domain::FvOsConfig;
    use crate::domain::InputBus;
    use crate::domain::InputType;
    use crate::domain::PvOsConfig;
    use crate::domain::SocketMode;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    fn minimal_kvm_domain() -> Domain {
        let mut dom = Domain::new("guest1", DomainType::Kvm);
        dom.uuid = Some("996b2f29-04b2-4ed6-85e5-34cd7a33c343".to_string());
        dom.disks.push(VirtDevice::Disk(DiskDevice::new(
            DiskType::File,
            "/var/lib/images/guest1.img",
            "vda",
        )));
        dom.nets.push(VirtDevice::Net(NetDevice::new(
            NetType::Bridge,
            "00:16:3e:3a:9f:01",
        )));
        dom.vcpus.push(VirtDevice::Vcpu(VcpuDevice {
            quantity: 2,
            weight: 0,
            limit: 0,
        }));
        dom
    }

    #[test]
    fn minimal_domain_shape() {
        let dom = minimal_kvm_domain();
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.starts_with("<domain type='kvm'>"));
        assert_eq!(count(&xml, "<disk "), 1);
        assert_eq!(count(&xml, "<interface "), 1);
        assert!(xml.contains("<name>guest1</name>"));
        assert!(xml.contains("<uuid>996b2f29-04b2-4ed6-85e5-34cd7a33c343</uuid>"));
        assert!(xml.contains("<vcpu>2</vcpu>"));
        assert!(xml.contains("<on_poweroff>destroy</on_poweroff>"));
        assert!(xml.contains("<on_crash>destroy</on_crash>"));
        // Fv boot defaults.
        assert!(xml.contains("<type>hvm</type>"));
        assert!(xml.contains("<boot dev='hd'/>"));
        assert!(xml.ends_with("</domain>\n"));
    }

    #[test]
    fn uuid_is_generated_when_missing() {
        let mut dom = minimal_kvm_domain();
        dom.uuid = None;
        let xml = domain_to_xml(&dom).unwrap();
        assert_eq!(count(&xml, "<uuid>"), 1);
    }

    #[test]
    fn xen_pv_os_section_defaults() {
        let mut dom = Domain::new("pvguest", DomainType::XenPv);
        dom.os = OsConfig::Pv(PvOsConfig {
            bootloader: Some("/usr/bin/pygrub".to_string()),
            ..Default::default()
        });
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.starts_with("<domain type='xen'>"));
        // Bootloader renders before the actions, right after the name.
        let bootloader_at = xml.find("<bootloader>").unwrap();
        assert!(bootloader_at < xml.find("<on_poweroff>").unwrap());
        assert!(xml.contains("<type>linux</type>"));
        assert!(xml.contains("<kernel>/dev/null</kernel>"));
        assert!(!xml.contains("<initrd>"));
    }

    #[test]
    fn xen_fv_os_section_gets_loader_default() {
        let dom = Domain::new("fvguest", DomainType::XenFv);
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<loader>/usr/lib/xen/boot/hvmloader</loader>"));
        assert!(xml.contains("<boot dev='hd'/>"));
    }

    #[test]
    fn kvm_os_section_carries_arch_and_machine() {
        let mut dom = minimal_kvm_domain();
        dom.os = OsConfig::Fv(FvOsConfig {
            arch: Some("x86_64".to_string()),
            machine: Some("pc-i440fx-2.9".to_string()),
            boot_devices: vec!["cdrom".to_string(), "hd".to_string()],
            ..Default::default()
        });
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<type arch='x86_64' machine='pc-i440fx-2.9'>hvm</type>"));
        // No loader default outside Xen.
        assert!(!xml.contains("<loader>"));
        let cdrom_at = xml.find("<boot dev='cdrom'/>").unwrap();
        assert!(cdrom_at < xml.find("<boot dev='hd'/>").unwrap());
    }

    #[test]
    fn container_domain_shape() {
        let mut dom = Domain::new("ct1", DomainType::Lxc);
        dom.os = OsConfig::Container(ContainerOsConfig {
            init: Some("/sbin/init".to_string()),
            ..Default::default()
        });
        dom.disks.push(VirtDevice::Disk(DiskDevice::new(
            DiskType::Filesystem,
            "/data",
            "/mnt",
        )));
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.starts_with("<domain type='lxc'>"));
        assert!(xml.contains("<type>exe</type>"));
        assert!(xml.contains("<init>/sbin/init</init>"));
        assert!(xml.contains("<filesystem type='mount'>"));
        assert!(!xml.contains("<disk "));
        assert!(xml.contains("<source dir='/data'/>"));
        assert!(xml.contains("<target dir='/mnt'/>"));
        // The implicit pty console comes after every other device.
        let console_at = xml.rfind("<console type='pty'/>").unwrap();
        assert!(console_at > xml.rfind("<filesystem").unwrap());
    }

    #[test]
    fn mismatched_boot_config_is_rejected() {
        let mut dom = Domain::new("broken", DomainType::Lxc);
        dom.os = OsConfig::Fv(FvOsConfig::default());
        assert_eq!(
            domain_to_xml(&dom),
            Err(Error::BootConfigMismatch(DomainType::Lxc))
        );
    }

    #[test]
    fn features_render_only_when_set() {
        let mut dom = minimal_kvm_domain();
        let xml = domain_to_xml(&dom).unwrap();
        assert!(!xml.contains("<features>"));

        dom.features.acpi = true;
        dom.features.pae = true;
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<acpi/>"));
        assert!(xml.contains("<pae/>"));
        assert!(!xml.contains("<apic/>"));
    }

    #[test]
    fn memory_renders_current_and_max() {
        let mut dom = minimal_kvm_domain();
        dom.mems.push(VirtDevice::Mem(MemDevice {
            size: 262144,
            maxsize: 524288,
            dump_core: Some(false),
        }));
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<currentMemory>262144</currentMemory>"));
        assert!(xml.contains("<memory dumpCore='off'>524288</memory>"));
    }

    #[test]
    fn cputune_is_version_gated() {
        let mut dom = minimal_kvm_domain();
        dom.vcpus.clear();
        dom.vcpus.push(VirtDevice::Vcpu(VcpuDevice {
            quantity: 4,
            weight: 1024,
            limit: 0,
        }));
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<cputune>"));
        assert!(xml.contains("<shares>1024</shares>"));

        let old = domain_to_xml_with_version(&dom, 8_000).unwrap();
        assert!(!old.contains("<cputune>"));
        assert!(old.contains("<vcpu>4</vcpu>"));
    }

    #[test]
    fn cdrom_with_empty_source_has_no_source_element() {
        let mut cdrom = DiskDevice::new(DiskType::File, "", "hdc");
        cdrom.device = Some("cdrom".to_string());
        let xml = device_to_xml(&VirtDevice::Disk(cdrom), DomainType::Kvm).unwrap();
        assert!(xml.contains("device='cdrom'"));
        assert!(!xml.contains("<source"));

        let disk = DiskDevice::new(DiskType::File, "/var/lib/images/a.img", "vda");
        let xml = device_to_xml(&VirtDevice::Disk(disk), DomainType::Kvm).unwrap();
        assert_eq!(count(&xml, "<source"), 1);
        assert!(xml.contains("<source file='/var/lib/images/a.img'/>"));
    }

    #[test]
    fn block_disk_skips_null_device_source() {
        let mut disk = DiskDevice::new(DiskType::Block, "/dev/null", "hda");
        disk.driver = Some("qemu".to_string());
        disk.driver_type = Some("raw".to_string());
        disk.cache = Some("none".to_string());
        let xml = device_to_xml(&VirtDevice::Disk(disk), DomainType::Kvm).unwrap();
        assert!(xml.contains("<disk type='block'>"));
        assert!(xml.contains("<driver name='qemu' type='raw' cache='none'/>"));
        assert!(!xml.contains("<source"));

        let block = DiskDevice::new(DiskType::Block, "/dev/sdb", "vdb");
        let xml = device_to_xml(&VirtDevice::Disk(block), DomainType::Kvm).unwrap();
        assert!(xml.contains("<source dev='/dev/sdb'/>"));
    }

    #[test]
    fn disk_markers_and_address() {
        let mut disk = DiskDevice::new(DiskType::File, "/img", "vda");
        disk.readonly = true;
        disk.shareable = true;
        disk.bus_type = Some("virtio".to_string());
        disk.address.push("type", "pci");
        disk.address.push("bus", "0x00");
        disk.address.push("slot", "0x04");
        let xml = device_to_xml(&VirtDevice::Disk(disk), DomainType::Kvm).unwrap();
        assert!(xml.contains("<target dev='vda' bus='virtio'/>"));
        assert!(xml.contains("<readonly/>"));
        assert!(xml.contains("<shareable/>"));
        assert!(xml.contains("<address type='pci' bus='0x00' slot='0x04'/>"));
    }

    #[test]
    fn bridge_nic_script_is_xen_only() {
        let mut net = NetDevice::new(NetType::Bridge, "00:16:3e:00:00:01");
        net.source = Some("br0".to_string());
        let dev = VirtDevice::Net(net);
        let xen = device_to_xml(&dev, DomainType::XenPv).unwrap();
        assert!(xen.contains("<script path='vif-bridge'/>"));
        assert!(xen.contains("<source bridge='br0'/>"));
        let kvm = device_to_xml(&dev, DomainType::Kvm).unwrap();
        assert!(!kvm.contains("<script"));
    }

    #[test]
    fn user_nic_has_no_source() {
        let net = NetDevice::new(NetType::User, "00:16:3e:00:00:02");
        let xml = device_to_xml(&VirtDevice::Net(net), DomainType::Kvm).unwrap();
        assert!(xml.contains("<interface type='user'>"));
        assert!(!xml.contains("<source"));
    }

    #[test]
    fn direct_nic_vsi_8021qbh_uses_profile_id() {
        let mut net = NetDevice::new(NetType::Direct, "00:16:3e:00:00:03");
        net.source = Some("eth1".to_string());
        net.net_mode = Some("vepa".to_string());
        net.vsi = Some(VsiProfile {
            vsi_type: "802.1Qbh".to_string(),
            profile_id: Some("profile-a".to_string()),
            manager_id: Some("12".to_string()),
            ..Default::default()
        });
        let xml = device_to_xml(&VirtDevice::Net(net), DomainType::Kvm).unwrap();
        assert!(xml.contains("<source dev='eth1' mode='vepa'/>"));
        assert!(xml.contains("<virtualport type='802.1Qbh'>"));
        assert!(xml.contains("<parameters profileid='profile-a'/>"));
        assert!(!xml.contains("managerid"));
    }

    #[test]
    fn direct_nic_vsi_8021qbg_uses_ids() {
        let mut net = NetDevice::new(NetType::Direct, "00:16:3e:00:00:04");
        net.vsi = Some(VsiProfile {
            vsi_type: "802.1Qbg".to_string(),
            manager_id: Some("1".to_string()),
            type_id: Some("2".to_string()),
            type_id_version: Some("3".to_string()),
            instance_id: Some("id-4".to_string()),
            profile_id: Some("ignored".to_string()),
            ..Default::default()
        });
        let xml = device_to_xml(&VirtDevice::Net(net), DomainType::Kvm).unwrap();
        assert!(xml.contains(
            "<parameters managerid='1' typeid='2' typeidversion='3' instanceid='id-4'/>"
        ));
        assert!(!xml.contains("profileid"));
    }

    #[test]
    fn nic_bandwidth_is_version_gated() {
        let mut net = NetDevice::new(NetType::Bridge, "00:16:3e:00:00:05");
        net.bandwidth = Bandwidth {
            reservation: 1000,
            limit: 2000,
        };
        let mut dom = Domain::new("g", DomainType::Kvm);
        dom.nets.push(VirtDevice::Net(net));
        let xml = domain_to_xml(&dom).unwrap();
        assert!(xml.contains("<inbound average='1000' peak='2000'/>"));
        let old = domain_to_xml_with_version(&dom, 8_000).unwrap();
        assert!(!old.contains("<bandwidth>"));
    }

    #[test]
    fn unset_bandwidth_is_not_rendered() {
        let net = NetDevice::new(NetType::Bridge, "00:16:3e:00:00:06");
        let xml = device_to_xml(&VirtDevice::Net(net), DomainType::Kvm).unwrap();
        assert!(!xml.contains("<bandwidth>"));
    }

    #[test]
    fn console_sources() {
        let unix = ConsoleDevice {
            source: ConsoleSource::UnixSocket {
                mode: SocketMode::Bind,
                path: "/tmp/console.sock".to_string(),
            },
            target_type: Some("virtio".to_string()),
        };
        let xml = device_to_xml(&VirtDevice::Console(unix), DomainType::Kvm).unwrap();
        assert!(xml.contains("<console type='unix'>"));
        assert!(xml.contains("<source mode='bind' path='/tmp/console.sock'/>"));
        assert!(xml.contains("<target type='virtio'/>"));

        let udp = ConsoleDevice {
            source: ConsoleSource::Udp {
                bind_host: "0.0.0.0".to_string(),
                bind_service: Some("2445".to_string()),
                connect_host: Some("10.0.0.1".to_string()),
                connect_service: Some("2445".to_string()),
            },
            target_type: None,
        };
        let xml = device_to_xml(&VirtDevice::Console(udp), DomainType::Kvm).unwrap();
        // Both endpoints, always.
        assert!(xml.contains("<source mode='bind' host='0.0.0.0' service='2445'/>"));
        assert!(xml.contains("<source mode='connect' host='10.0.0.1' service='2445'/>"));

        let null = ConsoleDevice {
            source: ConsoleSource::Null,
            target_type: None,
        };
        let xml = device_to_xml(&VirtDevice::Console(null), DomainType::Kvm).unwrap();
        assert!(xml.contains("<console type='null'/>"));
        assert!(!xml.contains("<source"));
    }

    #[test]
    fn graphics_devices() {
        let vnc = GraphicsDevice::Vnc {
            port: Some("5900".to_string()),
            host: Some("127.0.0.1".to_string()),
            passwd: None,
            keymap: Some("en-us".to_string()),
        };
        let xml = device_to_xml(&VirtDevice::Graphics(vnc), DomainType::Kvm).unwrap();
        assert!(xml
            .contains("<graphics type='vnc' port='5900' listen='127.0.0.1' keymap='en-us'/>"));

        let sdl = GraphicsDevice::Sdl {
            display: Some(":0".to_string()),
            xauth: None,
            fullscreen: None,
        };
        let xml = device_to_xml(&VirtDevice::Graphics(sdl), DomainType::Kvm).unwrap();
        assert!(xml.contains("<graphics type='sdl' display=':0'/>"));
    }

    #[test]
    fn input_device() {
        let input = InputDevice {
            input_type: InputType::Tablet,
            bus: InputBus::Usb,
        };
        let xml = device_to_xml(&VirtDevice::Input(input), DomainType::Kvm).unwrap();
        assert_eq!(xml, "<input type='tablet' bus='usb'/>\n");
    }

    #[test]
    fn controller_index_sentinel_is_omitted() {
        let mut controller = ControllerDevice::new("scsi");
        controller.model = Some("virtio-scsi".to_string());
        let xml =
            device_to_xml(&VirtDevice::Controller(controller.clone()), DomainType::Kvm).unwrap();
        assert!(xml.contains("<controller type='scsi' model='virtio-scsi'/>"));
        assert!(!xml.contains("index"));

        controller.index = Some(0);
        controller.queues = Some("4".to_string());
        let xml = device_to_xml(&VirtDevice::Controller(controller), DomainType::Kvm).unwrap();
        assert!(xml.contains("<controller type='scsi' index='0' model='virtio-scsi'>"));
        assert!(xml.contains("<driver queues='4'/>"));
    }

    #[test]
    fn unknown_device_is_rejected_standalone() {
        assert_eq!(
            device_to_xml(&VirtDevice::Unknown, DomainType::Kvm),
            Err(Error::UnsupportedType("device"))
        );
    }

    #[test]
    fn unknown_devices_are_skipped_in_domains() {
        let mut dom = minimal_kvm_domain();
        dom.disks.insert(0, VirtDevice::Unknown);
        dom.nets.push(VirtDevice::Unknown);
        let xml = domain_to_xml(&dom).unwrap();
        assert_eq!(count(&xml, "<disk "), 1);
        assert_eq!(count(&xml, "<interface "), 1);
    }

    #[test]
    fn device_order_within_devices_element() {
        let mut dom = minimal_kvm_domain();
        dom.inputs.push(VirtDevice::Input(InputDevice {
            input_type: InputType::Mouse,
            bus: InputBus::Ps2,
        }));
        dom.consoles.push(VirtDevice::Console(ConsoleDevice {
            source: ConsoleSource::Pty { path: None },
            target_type: None,
        }));
        dom.graphics.push(VirtDevice::Graphics(GraphicsDevice::Vnc {
            port: None,
            host: None,
            passwd: None,
            keymap: None,
        }));
        dom.emus.push(VirtDevice::Emu(EmuDevice {
            path: "/usr/bin/qemu-system-x86_64".to_string(),
        }));
        dom.controllers
            .push(VirtDevice::Controller(ControllerDevice::new("usb")));
        let xml = domain_to_xml(&dom).unwrap();
        let positions = [
            xml.find("<disk ").unwrap(),
            xml.find("<interface ").unwrap(),
            xml.find("<input ").unwrap(),
            xml.find("<console ").unwrap(),
            xml.find("<graphics ").unwrap(),
            xml.find("<emulator>").unwrap(),
            xml.find("<controller ").unwrap(),
        ];
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "device order violated: {}", xml);
        }
    }
}
