use nix::unistd::Pid;
use tracing::trace;

/// Ordered set of background process ids the interpreter considers live.
///
/// Ids are kept in insertion order, newest at the tail. The registry is owned by
/// the interpreter's [`Environment`](crate::env::Environment) and handed to every
/// supervisor operation by mutable reference, so there is exactly one writer.
///
/// An entry may outlive its process: background children are never reaped
/// behind the interpreter's back, so an id stays listed until a terminate pass
/// finds out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessRegistry {
    pids: Vec<Pid>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `pid` at the tail.
    pub fn insert(&mut self, pid: Pid) {
        trace!(%pid, "registry insert");
        self.pids.push(pid);
    }

    /// Remove the first entry equal to `pid`.
    ///
    /// Returns whether anything was removed. Removing an absent id is a no-op.
    pub fn remove(&mut self, pid: Pid) -> bool {
        match self.pids.iter().position(|p| *p == pid) {
            Some(index) => {
                self.pids.remove(index);
                trace!(%pid, "registry remove");
                true
            }
            None => false,
        }
    }

    /// Empty the registry and hand back everything it held, oldest first.
    pub fn clear(&mut self) -> Vec<Pid> {
        trace!(count = self.pids.len(), "registry clear");
        std::mem::take(&mut self.pids)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    /// Iterate ids in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pids.iter().copied()
    }

    pub fn snapshot(&self) -> Vec<Pid> {
        self.pids.clone()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }
}
