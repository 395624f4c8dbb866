//! Module handles state access observers,
//! which store which accesses occur at a given machine location.
//!
//! You would typically access an observer via the [`Simulator::observer`] field,
//! or read the accesses of a single instruction through [`Snapshot::accesses`].
//! This [`ChangeObserver`] can be used to read or update accesses via its [`get_accesses`]
//! and [`update_accesses`] methods.
//!
//! [`Simulator::observer`]: crate::sim::Simulator::observer
//! [`Snapshot::accesses`]: crate::sim::Snapshot::accesses
//! [`get_accesses`]: ChangeObserver::get_accesses
//! [`update_accesses`]: ChangeObserver::update_accesses

use std::collections::BTreeMap;

/// The set of accesses which have occurred at this location.
///
/// ## Example
///
/// ```
/// # use tho::sim::observer::AccessSet;
///
/// let accesses = AccessSet::READ;
/// assert!(accesses.accessed());
/// assert!(accesses.read());
/// assert!(!accesses.written());
/// assert!(!accesses.modified());
/// ```
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessSet(u8);
impl AccessSet {
    /// Set with only the read flag enabled.
    pub const READ: Self = Self(1 << 0);
    /// Set with only the write flag enabled.
    pub const WRITTEN: Self = Self(1 << 1);
    /// Set with only the modify flag enabled.
    pub const MODIFIED: Self = Self(1 << 2);

    /// True if any access has occurred.
    pub fn accessed(&self) -> bool {
        self.0 != 0
    }

    /// True if a read has occurred.
    pub fn read(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }
    /// True if a write has occurred (does not necessarily have to change data).
    pub fn written(&self) -> bool {
        self.0 & Self::WRITTEN.0 != 0
    }
    /// True if a write has occurred (data must change).
    pub fn modified(&self) -> bool {
        self.0 & Self::MODIFIED.0 != 0
    }
}
impl std::ops::BitOr for AccessSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl std::ops::BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl std::fmt::Debug for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessSet")
            .field("read", &self.read())
            .field("written", &self.written())
            .field("modified", &self.modified())
            .finish()
    }
}

/// A piece of machine state that an instruction can touch.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub enum Location {
    /// The accumulator.
    Acc,
    /// A memory cell.
    Mem(u8),
    /// The program counter (only recorded when a jump is taken).
    PC,
    /// The zero flag.
    Zero,
    /// The carry flag.
    Carry,
    /// The output channel.
    Output,
}

/// A struct that tracks accesses to machine state.
#[derive(Debug, Default, Clone)]
pub struct ChangeObserver {
    accesses: BTreeMap<Location, AccessSet>
}
impl ChangeObserver {
    /// Creates a new access observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all accesses.
    pub fn clear(&mut self) {
        self.accesses.clear();
    }

    /// Gets the access set for the given location.
    pub fn get_accesses(&self, loc: Location) -> AccessSet {
        self.accesses.get(&loc).copied().unwrap_or_default()
    }

    /// Adds new flags to the access set for the given location.
    pub fn update_accesses(&mut self, loc: Location, set: AccessSet) {
        *self.accesses.entry(loc).or_default() |= set;
    }

    /// Records a write to the given location,
    /// marking it modified if the value changed.
    pub fn record_write<T: PartialEq>(&mut self, loc: Location, old: T, new: T) {
        let set = match old == new {
            true  => AccessSet::WRITTEN,
            false => AccessSet::WRITTEN | AccessSet::MODIFIED,
        };
        self.update_accesses(loc, set);
    }

    /// Takes all accesses which have occurred since last clear,
    /// as well as clearing accesses.
    ///
    /// This iterator is sorted in location order.
    pub fn take_accesses(&mut self) -> impl Iterator<Item=(Location, AccessSet)> {
        std::mem::take(&mut self.accesses).into_iter()
    }
}
