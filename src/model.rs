//! Registry records.

use std::net::IpAddr;

use serde::Serialize;

use crate::addr::{Address, CidrBlock};

/// A registry (RIR or other feed) whose records are imported together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registrar {
    pub id: i64,
    pub name: String,
    /// Serial of the last successful import.
    pub serial: u32,
    /// Unix time of the last successful import, 0 if never.
    pub last_import: i64,
}

/// Organization record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Org {
    pub registrar_id: i64,
    pub serial: u32,
    pub handle: String,
    pub name: String,
    pub description: String,
}

impl Org {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One raw netblock of family `A`.
///
/// `start..=end` is always exactly the CIDR block `start/prefix_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetBlock<A> {
    pub registrar_id: i64,
    pub serial: u32,
    /// Handle of the owning org within the same registrar.
    pub org_reference: Option<String>,
    pub start: A,
    pub end: A,
    pub prefix_len: u8,
    pub name: String,
    pub description: String,
}

impl<A: Address> NetBlock<A> {
    pub fn new(block: CidrBlock<A>) -> Self {
        Self {
            registrar_id: 0,
            serial: 0,
            org_reference: None,
            start: block.addr,
            end: block.end(),
            prefix_len: block.prefix_len,
            name: String::new(),
            description: String::new(),
        }
    }

    pub fn org(mut self, handle: impl Into<String>) -> Self {
        self.org_reference = Some(handle.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn block(&self) -> CidrBlock<A> {
        CidrBlock {
            addr: self.start,
            prefix_len: self.prefix_len,
        }
    }
}

/// Result of an address lookup against raw netblocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetBlockInfo {
    pub id: i64,
    pub registrar: String,
    pub org_handle: Option<String>,
    pub org_name: Option<String>,
    pub start: IpAddr,
    pub end: IpAddr,
    pub prefix_len: u8,
    pub netname: String,
    pub descr: String,
}
