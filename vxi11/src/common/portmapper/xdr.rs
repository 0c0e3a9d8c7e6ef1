//! Portmapper XDR types

use std::io::{Read, Result, Write};

use crate::common::xdr::prelude::*;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mapping {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
    pub port: u32,
}

impl Mapping {
    pub fn new(prog: u32, vers: u32, prot: u32, port: u32) -> Self {
        Self {
            prog,
            vers,
            prot,
            port,
        }
    }
}

impl XdrEncode for Mapping {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        self.prog.write_xdr(writer)?;
        self.vers.write_xdr(writer)?;
        self.prot.write_xdr(writer)?;
        self.port.write_xdr(writer)
    }
}

impl XdrDecode for Mapping {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.prog.read_xdr(reader)?;
        self.vers.read_xdr(reader)?;
        self.prot.read_xdr(reader)?;
        self.port.read_xdr(reader)
    }
}

/// Reply to `PMAPPROC_DUMP`, a linked list flattened into a vector
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MappingList(pub Vec<Mapping>);

impl XdrEncode for MappingList {
    fn write_xdr<WR>(&self, writer: &mut WR) -> Result<()>
    where
        WR: Write,
    {
        for mapping in &self.0 {
            true.write_xdr(writer)?;
            mapping.write_xdr(writer)?;
        }
        false.write_xdr(writer)
    }
}

impl XdrDecode for MappingList {
    fn read_xdr<RD>(&mut self, reader: &mut RD) -> Result<()>
    where
        RD: Read,
    {
        self.0.clear();
        loop {
            let mut next: Option<Mapping> = None;
            next.read_xdr(reader)?;
            match next {
                Some(mapping) => self.0.push(mapping),
                None => break Ok(()),
            }
        }
    }
}
