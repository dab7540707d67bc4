// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Compiler from configuration model to libvirt XML.
//!
//! Every renderer builds an in-memory element tree and serializes it in one
//! step; nothing is emitted for a document that fails part-way through. The
//! consuming hypervisor parses strictly, so element and attribute names
//! here match its schema exactly. Semantic validation of the model is the
//! caller's job.

use std::fmt;
use std::fmt::Write;

use quick_xml::escape::escape;
use remain::sorted;
use thiserror::Error;

use crate::domain::DomainType;

mod domain;
mod filter;
mod pool;

pub use crate::xml::domain::device_to_xml;
pub use crate::xml::domain::domain_to_xml;
pub use crate::xml::domain::domain_to_xml_with_version;
pub use crate::xml::domain::DEFAULT_LIBVIRT_VERSION;
pub use crate::xml::filter::filter_to_xml;
pub use crate::xml::pool::pool_to_xml;
pub use crate::xml::pool::vol_to_xml;

#[sorted]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("boot configuration does not match domain type {0:?}")]
    BootConfigMismatch(DomainType),
    #[error("failed to serialize XML document: {0}")]
    Serialize(String),
    #[error("unsupported {0} type")]
    UnsupportedType(&'static str),
}

impl From<fmt::Error> for Error {
    fn from(e: fmt::Error) -> Self {
        Error::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// One element of the document tree the renderers build.
///
/// Mirrors how the renderers use it: an element gets attributes, text
/// content or children appended in order, and the finished root serializes
/// to an indented document.
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_attr(&mut self, name: &str, value: &str) -> &mut Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn set_text(&mut self, text: &str) -> &mut Self {
        self.text = Some(text.to_string());
        self
    }

    /// Append an empty child element and return it for further building.
    pub fn child(&mut self, name: &str) -> &mut XmlNode {
        self.children.push(XmlNode::new(name));
        // Just pushed, so the list is non-empty.
        self.children.last_mut().unwrap()
    }

    /// Append a child element with text content.
    pub fn text_child(&mut self, name: &str, text: &str) -> &mut XmlNode {
        let node = self.child(name);
        node.set_text(text);
        node
    }

    /// Serialize this element as a document.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        self.write_into(&mut out, 0)?;
        Ok(out)
    }

    /// Serialize only the children, each as a top-level fragment. Used for
    /// single-device documents whose scratch root is not part of the
    /// output.
    pub fn render_children(&self) -> Result<String> {
        let mut out = String::new();
        for child in &self.children {
            child.write_into(&mut out, 0)?;
        }
        Ok(out)
    }

    fn write_into(&self, out: &mut String, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            out.push_str("  ");
        }
        write!(out, "<{}", self.name)?;
        for (name, value) in &self.attrs {
            write!(out, " {}='{}'", name, escape(value.as_str()))?;
        }
        match (&self.text, self.children.is_empty()) {
            (None, true) => writeln!(out, "/>")?,
            (Some(text), true) => {
                writeln!(out, ">{}</{}>", escape(text.as_str()), self.name)?
            }
            (text, false) => {
                writeln!(out, ">")?;
                if let Some(text) = text {
                    for _ in 0..=depth {
                        out.push_str("  ");
                    }
                    writeln!(out, "{}", escape(text.as_str()))?;
                }
                for child in &self.children {
                    child.write_into(out, depth + 1)?;
                }
                for _ in 0..depth {
                    out.push_str("  ");
                }
                writeln!(out, "</{}>", self.name)?;
            }
        }
        Ok(())
    }
}
