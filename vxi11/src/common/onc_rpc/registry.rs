use std::{
    collections::{hash_map::Entry, HashMap},
    fmt,
};

use super::RpcError;

/// A named remote procedure, bound to a program and version when registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Procedure {
    pub name: &'static str,
    pub proc: u32,
}

impl Procedure {
    pub const fn new(name: &'static str, proc: u32) -> Self {
        Self { name, proc }
    }
}

/// Fully qualified procedure as it appears in a call header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcedureId {
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.prog, self.vers, self.proc)
    }
}

/// Maps procedure names to call headers for one connection
#[derive(Debug, Default, Clone)]
pub struct ProcedureRegistry {
    procedures: HashMap<&'static str, ProcedureId>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Bind every procedure in `procedures` to `prog`/`vers`.
    ///
    /// Registering a name again with the same id is a no-op. A name already bound
    /// to another id fails with [RpcError::ConflictingProcedure] and keeps the old
    /// binding; procedures earlier in the slice stay registered.
    pub fn register(
        &mut self,
        prog: u32,
        vers: u32,
        procedures: &[Procedure],
    ) -> Result<(), RpcError> {
        for procedure in procedures {
            let id = ProcedureId {
                prog,
                vers,
                proc: procedure.proc,
            };
            match self.procedures.entry(procedure.name) {
                Entry::Occupied(entry) if *entry.get() == id => {
                    log::trace!("{} already registered as {}", procedure.name, id);
                }
                Entry::Occupied(entry) => {
                    return Err(RpcError::ConflictingProcedure {
                        name: procedure.name,
                        registered: *entry.get(),
                        requested: id,
                    });
                }
                Entry::Vacant(entry) => {
                    log::trace!("Registered {} as {}", procedure.name, id);
                    entry.insert(id);
                }
            }
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<ProcedureId, RpcError> {
        self.procedures
            .get(name)
            .copied()
            .ok_or_else(|| RpcError::ProcedureNotRegistered(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
