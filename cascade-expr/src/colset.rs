use crate::id::ColIndex;
use smallvec::SmallVec;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Sub};

/// Bitmap of column indexes.
///
/// Trailing zero words are always trimmed so that equal sets
/// have equal representation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct ColSet {
    words: SmallVec<[u64; 2]>,
}

impl ColSet {
    #[inline]
    pub fn new() -> Self {
        ColSet::default()
    }

    #[inline]
    pub fn single(col: ColIndex) -> Self {
        let mut s = ColSet::new();
        s.insert(col);
        s
    }

    #[inline]
    pub fn insert(&mut self, col: ColIndex) {
        let (w, b) = pos(col);
        if self.words.len() <= w {
            self.words.resize(w + 1, 0);
        }
        self.words[w] |= 1 << b;
    }

    #[inline]
    pub fn remove(&mut self, col: ColIndex) {
        let (w, b) = pos(col);
        if let Some(word) = self.words.get_mut(w) {
            *word &= !(1 << b);
            self.trim();
        }
    }

    #[inline]
    pub fn contains(&self, col: ColIndex) -> bool {
        let (w, b) = pos(col);
        self.words.get(w).map_or(false, |word| word & (1 << b) != 0)
    }

    /// Returns true if all columns of other are in this set.
    #[inline]
    pub fn includes(&self, other: &ColSet) -> bool {
        other.words.iter().enumerate().all(|(i, w)| {
            let mine = self.words.get(i).copied().unwrap_or_default();
            mine & w == *w
        })
    }

    #[inline]
    pub fn is_subset_of(&self, other: &ColSet) -> bool {
        other.includes(self)
    }

    #[inline]
    pub fn intersects(&self, other: &ColSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn min(&self) -> Option<ColIndex> {
        self.iter().next()
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: &self.words,
            idx: 0,
            curr: self.words.first().copied().unwrap_or_default(),
        }
    }

    #[inline]
    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

#[inline]
fn pos(col: ColIndex) -> (usize, u32) {
    let v = col.value();
    ((v / 64) as usize, v % 64)
}

pub struct Iter<'a> {
    words: &'a [u64],
    idx: usize,
    curr: u64,
}

impl Iterator for Iter<'_> {
    type Item = ColIndex;
    #[inline]
    fn next(&mut self) -> Option<ColIndex> {
        loop {
            if self.curr != 0 {
                let b = self.curr.trailing_zeros();
                self.curr &= self.curr - 1;
                return Some(ColIndex::from(self.idx as u32 * 64 + b));
            }
            self.idx += 1;
            match self.words.get(self.idx) {
                Some(w) => self.curr = *w,
                None => return None,
            }
        }
    }
}

impl FromIterator<ColIndex> for ColSet {
    #[inline]
    fn from_iter<I: IntoIterator<Item = ColIndex>>(iter: I) -> Self {
        let mut s = ColSet::new();
        for c in iter {
            s.insert(c);
        }
        s
    }
}

impl<'a> IntoIterator for &'a ColSet {
    type Item = ColIndex;
    type IntoIter = Iter<'a>;
    #[inline]
    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl BitOrAssign<&ColSet> for ColSet {
    #[inline]
    fn bitor_assign(&mut self, rhs: &ColSet) {
        if self.words.len() < rhs.words.len() {
            self.words.resize(rhs.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(rhs.words.iter()) {
            *a |= b;
        }
    }
}

impl BitOr for &ColSet {
    type Output = ColSet;
    #[inline]
    fn bitor(self, rhs: &ColSet) -> ColSet {
        let mut res = self.clone();
        res |= rhs;
        res
    }
}

impl BitAnd for &ColSet {
    type Output = ColSet;
    #[inline]
    fn bitand(self, rhs: &ColSet) -> ColSet {
        let mut res = ColSet {
            words: self
                .words
                .iter()
                .zip(rhs.words.iter())
                .map(|(a, b)| a & b)
                .collect(),
        };
        res.trim();
        res
    }
}

impl Sub for &ColSet {
    type Output = ColSet;
    #[inline]
    fn sub(self, rhs: &ColSet) -> ColSet {
        let mut res = ColSet {
            words: self
                .words
                .iter()
                .enumerate()
                .map(|(i, a)| a & !rhs.words.get(i).copied().unwrap_or_default())
                .collect(),
        };
        res.trim();
        res
    }
}

impl fmt::Display for ColSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, c) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", c.value())?;
        }
        f.write_str(")")
    }
}
