// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Typed model of a libvirt host capability document.
//!
//! A capability document describes, per guest OS type and CPU architecture,
//! which hypervisor domain variants the host can run and which emulator,
//! loader and machine types each variant uses by default. Arch-level
//! defaults apply to every domain variant that does not override them;
//! [`HostCapabilities::merge_defaults`] folds them down so that queries only
//! ever look at a variant's own `DomainInfo`.

use log::debug;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[sorted]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed capabilities document: {0}")]
    InvalidDocument(String),
    #[error("capabilities document has no guest element")]
    MissingGuests,
    #[error("capabilities document has no host CPU architecture")]
    MissingHostArch,
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A machine type (hardware-platform preset) a domain variant offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineType {
    pub name: String,
    pub canonical_name: Option<String>,
}

/// Default emulator/loader/machine choices for one domain variant, or the
/// arch-level defaults shared by all variants of an architecture.
///
/// Machine order matters: index 0 is "the" default machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub emulator: Option<String>,
    pub loader: Option<String>,
    pub machines: Vec<MachineType>,
}

/// One hypervisor domain variant (`<domain type='kvm'>`, ...) of an
/// architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainVariant {
    pub hypervisor_type: String,
    pub domain_info: DomainInfo,
}

/// One architecture a guest OS type can run on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchCapability {
    pub name: String,
    /// Word size in bits. 0 when the document omits it or carries garbage.
    pub wordsize: u32,
    pub default_domain_info: DomainInfo,
    pub domains: Vec<DomainVariant>,
}

/// One `<guest>` entry: an OS type plus the architecture it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCapability {
    pub os_type: String,
    pub arch: ArchCapability,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub cpu_arch: String,
}

/// Everything a host advertises about the guests it can run.
///
/// Built once per capability query and read-only afterwards; a merged
/// snapshot can be shared freely between concurrent readers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub host: HostInfo,
    pub guests: Vec<GuestCapability>,
}

impl HostCapabilities {
    /// Fold arch-level defaults down into every domain variant, returning
    /// the merged tree. The receiver is left untouched, so callers holding
    /// a pre-merge view never observe the merge. Idempotent.
    ///
    /// A variant inherits the default emulator and loader only where it has
    /// none of its own; default machines missing from the variant's list
    /// (compared by name, ignoring ASCII case) are value-copied after the
    /// variant's own entries. No duplicate names result.
    pub fn merge_defaults(&self) -> HostCapabilities {
        let mut merged = self.clone();
        for guest in &mut merged.guests {
            let defaults = guest.arch.default_domain_info.clone();
            for variant in &mut guest.arch.domains {
                let info = &mut variant.domain_info;
                if info.emulator.is_none() {
                    info.emulator = defaults.emulator.clone();
                }
                if info.loader.is_none() {
                    info.loader = defaults.loader.clone();
                }
                for machine in &defaults.machines {
                    let present = info
                        .machines
                        .iter()
                        .any(|m| m.name.eq_ignore_ascii_case(&machine.name));
                    if !present {
                        info.machines.push(machine.clone());
                    }
                }
            }
        }
        merged
    }

    /// Find the first domain variant matching the given filters, in document
    /// order. An omitted filter matches any value; all comparisons ignore
    /// ASCII case. An architecture that lists no concrete domain variants
    /// answers with its arch-level defaults when no specific hypervisor type
    /// is requested.
    pub fn find_domain_info(
        &self,
        os_type: Option<&str>,
        arch: Option<&str>,
        domain_type: Option<&str>,
    ) -> Option<&DomainInfo> {
        for guest in &self.guests {
            if !matches_filter(os_type, &guest.os_type) {
                continue;
            }
            if !matches_filter(arch, &guest.arch.name) {
                continue;
            }
            for variant in &guest.arch.domains {
                if matches_filter(domain_type, &variant.hypervisor_type) {
                    return Some(&variant.domain_info);
                }
            }
            if domain_type.is_none() && guest.arch.domains.is_empty() {
                return Some(&guest.arch.default_domain_info);
            }
        }
        None
    }

    /// Default architecture for a guest OS type: the first guest matching
    /// both the OS type and the host's own CPU architecture, else the first
    /// guest matching the OS type alone.
    pub fn default_arch(&self, os_type: &str) -> Option<&str> {
        self.find_arch(os_type, Some(&self.host.cpu_arch))
            .or_else(|| self.find_arch(os_type, None))
    }

    fn find_arch(&self, os_type: &str, host_arch: Option<&str>) -> Option<&str> {
        self.guests
            .iter()
            .find(|g| {
                g.os_type.eq_ignore_ascii_case(os_type)
                    && matches_filter(host_arch, &g.arch.name)
            })
            .map(|g| g.arch.name.as_str())
    }

    /// Default machine for the first matching domain variant: the canonical
    /// name of its first machine if it has one, else the plain name. `None`
    /// when no variant matches or the variant has no machines.
    pub fn default_machine(
        &self,
        os_type: Option<&str>,
        arch: Option<&str>,
        domain_type: Option<&str>,
    ) -> Option<&str> {
        let info = self.find_domain_info(os_type, arch, domain_type)?;
        let machine = info.machines.first()?;
        Some(machine.canonical_name.as_deref().unwrap_or(&machine.name))
    }

    /// Default emulator for the first matching domain variant.
    pub fn default_emulator(
        &self,
        os_type: Option<&str>,
        arch: Option<&str>,
        domain_type: Option<&str>,
    ) -> Option<&str> {
        self.find_domain_info(os_type, arch, domain_type)?
            .emulator
            .as_deref()
    }

    /// True when any domain variant on the host is of type "kvm".
    pub fn supports_kvm(&self) -> bool {
        self.find_domain_info(None, None, Some("kvm")).is_some()
    }

    /// True when the host supports KVM and the caller has not disabled it.
    pub fn use_kvm(&self, disable_kvm: bool) -> bool {
        self.supports_kvm() && !disable_kvm
    }
}

fn matches_filter(filter: Option<&str>, value: &str) -> bool {
    match filter {
        Some(f) => f.eq_ignore_ascii_case(value),
        None => true,
    }
}

/// Which element's text content the parser is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    HostArch,
    OsType,
    Wordsize,
    Emulator,
    Loader,
    Machine,
}

impl TextTarget {
    fn tag(&self) -> &'static [u8] {
        match self {
            TextTarget::HostArch => b"arch",
            TextTarget::OsType => b"os_type",
            TextTarget::Wordsize => b"wordsize",
            TextTarget::Emulator => b"emulator",
            TextTarget::Loader => b"loader",
            TextTarget::Machine => b"machine",
        }
    }
}

#[derive(Default)]
struct CapsParser {
    host_arch: Option<String>,
    guests: Vec<GuestCapability>,
    in_host: bool,
    in_cpu: bool,
    in_guest: bool,
    in_arch: bool,
    in_domain: bool,
    target: Option<TextTarget>,
    text: String,
}

impl CapsParser {
    /// The `DomainInfo` that arch-child elements currently apply to: the
    /// open domain variant's, or the arch defaults outside any `<domain>`.
    fn current_info(&mut self) -> Option<&mut DomainInfo> {
        let arch = &mut self.guests.last_mut()?.arch;
        if self.in_domain {
            Some(&mut arch.domains.last_mut()?.domain_info)
        } else {
            Some(&mut arch.default_domain_info)
        }
    }

    fn begin_text(&mut self, target: TextTarget) {
        self.target = Some(target);
        self.text.clear();
    }

    fn handle_start(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"host" if !self.in_guest => self.in_host = true,
            b"cpu" if self.in_host => self.in_cpu = true,
            b"guest" => {
                self.in_guest = true;
                self.guests.push(GuestCapability::default());
            }
            b"arch" if self.in_cpu => self.begin_text(TextTarget::HostArch),
            b"arch" if self.in_guest => {
                self.in_arch = true;
                if let Some(guest) = self.guests.last_mut() {
                    guest.arch.name = attr_value(e, b"name").unwrap_or_default();
                }
            }
            b"os_type" if self.in_guest && !self.in_arch => {
                self.begin_text(TextTarget::OsType)
            }
            b"wordsize" if self.in_arch => self.begin_text(TextTarget::Wordsize),
            b"domain" if self.in_arch => {
                self.in_domain = true;
                self.push_domain(e);
            }
            b"emulator" if self.in_arch => self.begin_text(TextTarget::Emulator),
            b"loader" if self.in_arch => self.begin_text(TextTarget::Loader),
            b"machine" if self.in_arch => {
                self.push_machine(e);
                self.begin_text(TextTarget::Machine);
            }
            _ => {}
        }
    }

    /// Self-closing elements commit immediately with empty content.
    fn handle_empty(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"guest" => self.guests.push(GuestCapability::default()),
            b"arch" if self.in_guest && !self.in_cpu => {
                if let Some(guest) = self.guests.last_mut() {
                    guest.arch.name = attr_value(e, b"name").unwrap_or_default();
                }
            }
            b"domain" if self.in_arch && !self.in_domain => self.push_domain(e),
            b"machine" if self.in_arch => self.push_machine(e),
            b"emulator" if self.in_arch => {
                if let Some(info) = self.current_info() {
                    info.emulator = Some(String::new());
                }
            }
            b"loader" if self.in_arch => {
                if let Some(info) = self.current_info() {
                    info.loader = Some(String::new());
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.target.is_some() {
            self.text.push_str(text);
        }
    }

    fn handle_end(&mut self, name: &[u8]) {
        if let Some(target) = self.target {
            if name == target.tag() {
                self.commit_text(target);
                self.target = None;
                return;
            }
        }
        match name {
            b"host" => self.in_host = false,
            b"cpu" => self.in_cpu = false,
            b"guest" => self.in_guest = false,
            b"arch" => self.in_arch = false,
            b"domain" => self.in_domain = false,
            _ => {}
        }
    }

    fn commit_text(&mut self, target: TextTarget) {
        let text = self.text.trim().to_string();
        match target {
            TextTarget::HostArch => self.host_arch = Some(text),
            TextTarget::OsType => {
                if let Some(guest) = self.guests.last_mut() {
                    guest.os_type = text;
                }
            }
            TextTarget::Wordsize => {
                if let Some(guest) = self.guests.last_mut() {
                    // Default to 0 wordsize if missing or garbage.
                    guest.arch.wordsize = text.parse().unwrap_or(0);
                }
            }
            TextTarget::Emulator => {
                if let Some(info) = self.current_info() {
                    info.emulator = Some(text);
                }
            }
            TextTarget::Loader => {
                if let Some(info) = self.current_info() {
                    info.loader = Some(text);
                }
            }
            TextTarget::Machine => {
                if let Some(info) = self.current_info() {
                    if let Some(machine) = info.machines.last_mut() {
                        machine.name = text;
                    }
                }
            }
        }
    }

    fn push_domain(&mut self, e: &BytesStart) {
        if let Some(guest) = self.guests.last_mut() {
            guest.arch.domains.push(DomainVariant {
                hypervisor_type: attr_value(e, b"type").unwrap_or_default(),
                domain_info: DomainInfo::default(),
            });
        }
    }

    fn push_machine(&mut self, e: &BytesStart) {
        let canonical = attr_value(e, b"canonical");
        if let Some(info) = self.current_info() {
            info.machines.push(MachineType {
                name: String::new(),
                canonical_name: canonical,
            });
        }
    }

    fn finish(self) -> Result<HostCapabilities> {
        let cpu_arch = match self.host_arch {
            Some(arch) if !arch.is_empty() => arch,
            _ => {
                debug!("capability document has no host CPU architecture");
                return Err(ParseError::MissingHostArch);
            }
        };
        if self.guests.is_empty() {
            debug!("capability document has no guest nodes");
            return Err(ParseError::MissingGuests);
        }
        Ok(HostCapabilities {
            host: HostInfo { cpu_arch },
            guests: self.guests,
        })
    }
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parse a host capability document.
///
/// Fails with no partial result when the document is malformed, has no
/// `host/cpu/arch`, or has no `guest` entries. Arch-level defaults are left
/// unmerged; see [`HostCapabilities::merge_defaults`] and [`parse_and_merge`].
pub fn parse_capabilities(xml: &str) -> Result<HostCapabilities> {
    let mut reader = Reader::from_str(xml);
    let mut parser = CapsParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Empty(ref e)) => parser.handle_empty(e),
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;
                parser.handle_text(&text);
            }
            Ok(Event::End(ref e)) => parser.handle_end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ParseError::InvalidDocument(e.to_string())),
        }
    }

    parser.finish()
}

/// Parse a capability document and merge defaults in one step.
pub fn parse_and_merge(xml: &str) -> Result<HostCapabilities> {
    Ok(parse_capabilities(xml)?.merge_defaults())
}
