use std::fmt;
use std::ops::Deref;

/// ColIndex wraps u32 to be the query-wide index of a column.
/// Indexes start from 1, 0 is reserved as invalid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColIndex(u32);

impl ColIndex {
    /// Returns next index.
    #[inline]
    pub fn next(self) -> Self {
        ColIndex(self.0 + 1)
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ColIndex {
    fn from(src: u32) -> Self {
        ColIndex(src)
    }
}

impl fmt::Display for ColIndex {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// GroupID wraps u32 to be the identifier of a memo group.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupID(u32);

impl GroupID {
    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl From<u32> for GroupID {
    fn from(src: u32) -> Self {
        GroupID(src)
    }
}

impl Deref for GroupID {
    type Target = u32;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for GroupID {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const INVALID_GROUP_ID: GroupID = GroupID(0);

/// Location of an alternative inside the memo: group id and
/// ordinal of the alternative within the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoLoc {
    pub group: GroupID,
    pub expr: u32,
}

impl MemoLoc {
    #[inline]
    pub fn new(group: GroupID, expr: u32) -> Self {
        MemoLoc { group, expr }
    }
}

impl fmt::Display for MemoLoc {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.expr)
    }
}
