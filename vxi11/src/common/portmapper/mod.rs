//! Portmapper (rpcbind version 2) constants, see [RFC1833](https://datatracker.ietf.org/doc/html/rfc1833).

use super::onc_rpc::Procedure;

pub mod xdr;

/// TCP port to use for portmapper/rpcbind
pub const PORTMAPPER_PORT: u16 = 111;

// Program constants
/// Portmapper program number
pub const PORTMAPPER_PROG: u32 = 100000;
/// Portmapper program version
pub const PORTMAPPER_VERS: u32 = 2;

pub const PORTMAPPER_PROT_TCP: u32 = 6;

// Procedures
pub const PMAPPROC_NULL: Procedure = Procedure::new("pmap_null", 0);
pub const PMAPPROC_GETPORT: Procedure = Procedure::new("pmap_getport", 3);
pub const PMAPPROC_DUMP: Procedure = Procedure::new("pmap_dump", 4);

/// Procedures used by the portmapper client
pub const PORTMAPPER_PROCEDURES: &[Procedure] = &[PMAPPROC_NULL, PMAPPROC_GETPORT, PMAPPROC_DUMP];
