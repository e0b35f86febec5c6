//! x86_64 Linux syscall-number table (spec §4.2).
//!
//! Modeled as a small capability trait rather than a concrete struct
//! (spec §9) so tests can substitute an `EmptySyscallTable` that treats
//! every number as unknown, without touching the real table.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// Read-only syscall-number lookup.
pub trait SyscallTable: Send + Sync {
    /// Empty string if `number` is not in the table.
    fn name_of(&self, number: i64) -> String;
    fn is_network(&self, number: i64) -> bool;
    /// Independent copy — mutating it never affects the table (spec §8
    /// property 7 applies here by the same reasoning as the registry).
    fn network_syscalls(&self) -> HashSet<i64>;
}

struct Entry {
    name: &'static str,
    network: bool,
}

static TABLE: Lazy<HashMap<i64, Entry>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(0, Entry { name: "read", network: false });
    m.insert(1, Entry { name: "write", network: false });
    m.insert(41, Entry { name: "socket", network: true });
    m.insert(42, Entry { name: "connect", network: true });
    m.insert(43, Entry { name: "accept", network: true });
    m.insert(44, Entry { name: "sendto", network: true });
    m.insert(45, Entry { name: "recvfrom", network: true });
    m.insert(46, Entry { name: "sendmsg", network: true });
    m.insert(47, Entry { name: "recvmsg", network: true });
    m.insert(49, Entry { name: "bind", network: true });
    m.insert(50, Entry { name: "listen", network: true });
    m.insert(53, Entry { name: "socketpair", network: true });
    m.insert(60, Entry { name: "exit", network: false });
    m.insert(288, Entry { name: "accept4", network: true });
    m.insert(299, Entry { name: "recvmmsg", network: true });
    m.insert(307, Entry { name: "sendmmsg", network: true });
    m
});

/// The built-in x86_64 Linux syscall table.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxX86_64SyscallTable;

impl SyscallTable for LinuxX86_64SyscallTable {
    fn name_of(&self, number: i64) -> String {
        TABLE.get(&number).map(|e| e.name.to_string()).unwrap_or_default()
    }

    fn is_network(&self, number: i64) -> bool {
        TABLE.get(&number).map(|e| e.network).unwrap_or(false)
    }

    fn network_syscalls(&self) -> HashSet<i64> {
        TABLE
            .iter()
            .filter(|(_, e)| e.network)
            .map(|(n, _)| *n)
            .collect()
    }
}

/// A table that knows no syscalls at all, for tests that need to force
/// every recovered number down the "not in table" path.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySyscallTable;

impl SyscallTable for EmptySyscallTable {
    fn name_of(&self, _number: i64) -> String {
        String::new()
    }

    fn is_network(&self, _number: i64) -> bool {
        false
    }

    fn network_syscalls(&self) -> HashSet<i64> {
        HashSet::new()
    }
}
