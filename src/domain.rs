// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! In-memory model of a guest domain: boot configuration plus devices.
//!
//! Devices are a sealed sum type, [`VirtDevice`]; a slot holding
//! [`VirtDevice::Unknown`] is logically deleted and skipped by the XML
//! compiler without its container being reindexed, so positions of the
//! remaining devices stay stable.

use std::str::FromStr;

use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Hypervisor family a domain is defined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainType {
    XenPv,
    XenFv,
    Kvm,
    Qemu,
    Lxc,
}

impl DomainType {
    /// Value of the `domain` element's `type` attribute. Both Xen flavors
    /// share one attribute value; the OS section tells them apart.
    pub fn as_attr(&self) -> &'static str {
        match self {
            DomainType::XenPv | DomainType::XenFv => "xen",
            DomainType::Kvm => "kvm",
            DomainType::Qemu => "qemu",
            DomainType::Lxc => "lxc",
        }
    }

    pub fn is_xen(&self) -> bool {
        matches!(self, DomainType::XenPv | DomainType::XenFv)
    }
}

/// What to do with the guest on poweroff/reboot/crash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    #[default]
    Destroy,
    Restart,
    Preserve,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Destroy => "destroy",
            RecoveryAction::Restart => "restart",
            RecoveryAction::Preserve => "preserve",
        }
    }
}

impl FromStr for RecoveryAction {
    type Err = &'static str;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "destroy" => Ok(RecoveryAction::Destroy),
            "restart" => Ok(RecoveryAction::Restart),
            "preserve" => Ok(RecoveryAction::Preserve),
            _ => Err("invalid recovery action"),
        }
    }
}

/// Boot configuration, variant by hypervisor family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsConfig {
    /// Paravirtualized Xen: direct kernel boot, optionally via a bootloader.
    Pv(PvOsConfig),
    /// Fully virtualized guests (Xen FV, KVM, QEMU): BIOS-style boot.
    Fv(FvOsConfig),
    /// Linux container: an init program instead of a kernel.
    Container(ContainerOsConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvOsConfig {
    pub os_type: Option<String>,
    pub kernel: Option<String>,
    pub initrd: Option<String>,
    pub cmdline: Option<String>,
    pub bootloader: Option<String>,
    pub bootloader_args: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FvOsConfig {
    pub os_type: Option<String>,
    pub loader: Option<String>,
    pub arch: Option<String>,
    pub machine: Option<String>,
    /// Ordered boot device list ("hd", "cdrom", ...); empty means `["hd"]`.
    pub boot_devices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOsConfig {
    pub os_type: Option<String>,
    pub init: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub acpi: bool,
    pub apic: bool,
    pub pae: bool,
}

/// Ordered key/value attribute list of a device `<address>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub attrs: Vec<(String, String)>,
}

impl DeviceAddress {
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskType {
    Block,
    File,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDevice {
    pub disk_type: DiskType,
    /// Disk function: "disk", "cdrom", "floppy". Omitted attribute when None.
    pub device: Option<String>,
    pub driver: Option<String>,
    pub driver_type: Option<String>,
    pub cache: Option<String>,
    pub source: String,
    pub virtual_dev: String,
    pub bus_type: Option<String>,
    /// Filesystem access mode ("passthrough", "mapped", "squash").
    pub access_mode: Option<String>,
    pub rawio: Option<String>,
    pub sgio: Option<String>,
    pub readonly: bool,
    pub shareable: bool,
    pub address: DeviceAddress,
}

impl DiskDevice {
    pub fn new(disk_type: DiskType, source: impl Into<String>, virtual_dev: impl Into<String>) -> Self {
        DiskDevice {
            disk_type,
            device: None,
            driver: None,
            driver_type: None,
            cache: None,
            source: source.into(),
            virtual_dev: virtual_dev.into(),
            bus_type: None,
            access_mode: None,
            rawio: None,
            sgio: None,
            readonly: false,
            shareable: false,
            address: DeviceAddress::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetType {
    Bridge,
    Network,
    User,
    Direct,
}

impl NetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetType::Bridge => "bridge",
            NetType::Network => "network",
            NetType::User => "user",
            NetType::Direct => "direct",
        }
    }
}

/// Inbound traffic shaping. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    pub reservation: u64,
    pub limit: u64,
}

impl Bandwidth {
    pub fn is_set(&self) -> bool {
        self.reservation != 0 || self.limit != 0
    }
}

/// Virtual-switch-interface port-profile data for "direct" NICs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VsiProfile {
    pub vsi_type: String,
    pub manager_id: Option<String>,
    pub type_id: Option<String>,
    pub type_id_version: Option<String>,
    pub instance_id: Option<String>,
    pub profile_id: Option<String>,
    pub filter_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDevice {
    pub net_type: NetType,
    pub mac: String,
    /// Bridge name, network name, or physical device, by `net_type`.
    pub source: Option<String>,
    /// Host-side target device name (vnetX).
    pub device: Option<String>,
    pub model: Option<String>,
    /// "direct" source mode: "vepa", "bridge", "private", "passthrough".
    pub net_mode: Option<String>,
    pub filter_ref: Option<String>,
    pub bandwidth: Bandwidth,
    pub vsi: Option<VsiProfile>,
}

impl NetDevice {
    pub fn new(net_type: NetType, mac: impl Into<String>) -> Self {
        NetDevice {
            net_type,
            mac: mac.into(),
            source: None,
            device: None,
            model: None,
            net_mode: None,
            filter_ref: None,
            bandwidth: Bandwidth::default(),
            vsi: None,
        }
    }
}

/// Memory allocation in KiB: current and maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemDevice {
    pub size: u64,
    pub maxsize: u64,
    /// Whether guest memory is included in core dumps. None leaves the
    /// hypervisor default.
    pub dump_core: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpuDevice {
    pub quantity: u64,
    /// CPU time weight (`<cputune>` shares). Zero means unset.
    pub weight: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphicsDevice {
    Vnc {
        port: Option<String>,
        host: Option<String>,
        passwd: Option<String>,
        keymap: Option<String>,
    },
    Sdl {
        display: Option<String>,
        xauth: Option<String>,
        fullscreen: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketMode {
    Bind,
    Connect,
}

impl SocketMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketMode::Bind => "bind",
            SocketMode::Connect => "connect",
        }
    }
}

/// Character source backing a console device, with its type-specific
/// address fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsoleSource {
    Pty {
        path: Option<String>,
    },
    Dev {
        path: String,
    },
    File {
        path: String,
    },
    Pipe {
        path: String,
    },
    UnixSocket {
        mode: SocketMode,
        path: String,
    },
    Udp {
        bind_host: String,
        bind_service: Option<String>,
        connect_host: Option<String>,
        connect_service: Option<String>,
    },
    Tcp {
        mode: SocketMode,
        host: String,
        service: Option<String>,
    },
    Stdio,
    Null,
    Vc,
    Spicevmc,
}

impl ConsoleSource {
    /// Value of the `console` element's `type` attribute.
    pub fn type_str(&self) -> &'static str {
        match self {
            ConsoleSource::Pty { .. } => "pty",
            ConsoleSource::Dev { .. } => "dev",
            ConsoleSource::File { .. } => "file",
            ConsoleSource::Pipe { .. } => "pipe",
            ConsoleSource::UnixSocket { .. } => "unix",
            ConsoleSource::Udp { .. } => "udp",
            ConsoleSource::Tcp { .. } => "tcp",
            ConsoleSource::Stdio => "stdio",
            ConsoleSource::Null => "null",
            ConsoleSource::Vc => "vc",
            ConsoleSource::Spicevmc => "spicevmc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleDevice {
    pub source: ConsoleSource,
    pub target_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    Mouse,
    Tablet,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Mouse => "mouse",
            InputType::Tablet => "tablet",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputBus {
    Ps2,
    Usb,
    Xen,
}

impl InputBus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputBus::Ps2 => "ps2",
            InputBus::Usb => "usb",
            InputBus::Xen => "xen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub input_type: InputType,
    pub bus: InputBus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerDevice {
    pub controller_type: String,
    /// None is the "not set" sentinel: the index attribute is omitted and
    /// the consumer assigns one.
    pub index: Option<u64>,
    pub model: Option<String>,
    pub ports: Option<String>,
    pub vectors: Option<String>,
    pub queues: Option<String>,
    pub address: DeviceAddress,
}

impl ControllerDevice {
    pub fn new(controller_type: impl Into<String>) -> Self {
        ControllerDevice {
            controller_type: controller_type.into(),
            index: None,
            model: None,
            ports: None,
            vectors: None,
            queues: None,
            address: DeviceAddress::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmuDevice {
    pub path: String,
}

/// One virtual device, keyed by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtDevice {
    /// A logically deleted device slot. Compilers skip it; rendering it on
    /// its own is an error.
    Unknown,
    Disk(DiskDevice),
    Net(NetDevice),
    Mem(MemDevice),
    Vcpu(VcpuDevice),
    Graphics(GraphicsDevice),
    Console(ConsoleDevice),
    Input(InputDevice),
    Controller(ControllerDevice),
    Emu(EmuDevice),
}

impl VirtDevice {
    /// Device-local identifier: the target device name for disks, the MAC
    /// for NICs, and fixed names for the singleton memory/vcpu devices.
    pub fn id(&self) -> Option<&str> {
        match self {
            VirtDevice::Disk(disk) => Some(&disk.virtual_dev),
            VirtDevice::Net(net) => Some(&net.mac),
            VirtDevice::Mem(_) => Some("mem"),
            VirtDevice::Vcpu(_) => Some("proc"),
            _ => None,
        }
    }
}

/// Fully qualified device identifier: `"<vm>/<device>"`.
pub fn make_device_id(vm: &str, device: &str) -> String {
    format!("{}/{}", vm, device)
}

/// Split a fully qualified device identifier back into VM and device names.
pub fn parse_device_id(id: &str) -> Option<(&str, &str)> {
    let (vm, device) = id.split_once('/')?;
    if vm.is_empty() || device.is_empty() {
        return None;
    }
    Some((vm, device))
}

#[sorted]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidateError {
    #[error("boot configuration does not match domain type {0:?}")]
    BootMismatch(DomainType),
    #[error("domain name is empty")]
    EmptyName,
}

/// Complete configuration of one guest domain.
///
/// Device collections are per kind; a slot may hold [`VirtDevice::Unknown`]
/// (logically deleted) or, defensively, a device of another kind — the
/// compiler renders only the matching entries of each collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    /// Generated during rendering when None.
    pub uuid: Option<String>,
    pub domain_type: DomainType,
    pub os: OsConfig,
    pub on_poweroff: RecoveryAction,
    pub on_reboot: RecoveryAction,
    pub on_crash: RecoveryAction,
    /// Clock offset ("utc", "localtime"). Omitted when None.
    pub clock: Option<String>,
    pub features: Features,
    pub disks: Vec<VirtDevice>,
    pub nets: Vec<VirtDevice>,
    pub mems: Vec<VirtDevice>,
    pub vcpus: Vec<VirtDevice>,
    pub graphics: Vec<VirtDevice>,
    pub consoles: Vec<VirtDevice>,
    pub inputs: Vec<VirtDevice>,
    pub controllers: Vec<VirtDevice>,
    pub emus: Vec<VirtDevice>,
}

impl Domain {
    /// A domain with the default boot configuration for its type and no
    /// devices.
    pub fn new(name: impl Into<String>, domain_type: DomainType) -> Self {
        let os = match domain_type {
            DomainType::XenPv => OsConfig::Pv(PvOsConfig::default()),
            DomainType::XenFv | DomainType::Kvm | DomainType::Qemu => {
                OsConfig::Fv(FvOsConfig::default())
            }
            DomainType::Lxc => OsConfig::Container(ContainerOsConfig::default()),
        };
        Domain {
            name: name.into(),
            uuid: None,
            domain_type,
            os,
            on_poweroff: RecoveryAction::Destroy,
            on_reboot: RecoveryAction::Destroy,
            on_crash: RecoveryAction::Destroy,
            clock: None,
            features: Features::default(),
            disks: Vec::new(),
            nets: Vec::new(),
            mems: Vec::new(),
            vcpus: Vec::new(),
            graphics: Vec::new(),
            consoles: Vec::new(),
            inputs: Vec::new(),
            controllers: Vec::new(),
            emus: Vec::new(),
        }
    }

    /// Whether the boot configuration variant is legal for the domain type.
    pub fn os_matches_type(&self) -> bool {
        matches!(
            (&self.domain_type, &self.os),
            (DomainType::XenPv, OsConfig::Pv(_))
                | (DomainType::XenFv, OsConfig::Fv(_))
                | (DomainType::Kvm, OsConfig::Fv(_))
                | (DomainType::Qemu, OsConfig::Fv(_))
                | (DomainType::Lxc, OsConfig::Container(_))
        )
    }

    pub fn validate(&self) -> std::result::Result<(), ValidateError> {
        if self.name.is_empty() {
            return Err(ValidateError::EmptyName);
        }
        if !self.os_matches_type() {
            return Err(ValidateError::BootMismatch(self.domain_type));
        }
        Ok(())
    }
}
