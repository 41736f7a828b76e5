//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use smallbitvec::{sbvec, SmallBitVec};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Intended to be a dense representation for a set of keys from a primary map.
///
/// This is implemented as just a bitvector with no additional slot storage,
/// which makes it the natural "visited" set for graph walks over blocks.
///
/// ```
/// # use spinel::arena_key;
/// # use spinel::arena::*;
/// arena_key! { struct Key; }
/// let mut map = ArenaMap::default();
/// let k1: Key = map.insert(15);
/// let k2 = map.insert(20);
/// let mut set = SecondarySet::with_capacity(map.len());
///
/// assert_eq!(set.insert(k2), false);
/// assert_eq!(set.contains(k1), false);
/// assert_eq!(set.contains(k2), true);
/// ```
#[derive(Clone)]
pub struct SecondarySet<K: ArenaKey> {
    bits: SmallBitVec,
    cardinality: usize,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey> SecondarySet<K> {
    /// Creates an empty set that is pre-allocated for a specific number of keys.
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            bits: sbvec![false; cap],
            cardinality: 0,
            _unused: PhantomData,
        }
    }

    /// Returns the number of keys that are currently in the set.
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Returns if the set is completely empty.
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Returns whether or not a key is present in the set.
    pub fn contains(&self, key: K) -> bool {
        // if the key is outside range, it isn't present
        self.bits.get(key.key_index()).unwrap_or(false)
    }

    /// Inserts a key into the set, returns whether the key was in the set
    /// prior to insertion.
    pub fn insert(&mut self, key: K) -> bool {
        let idx = key.key_index();

        if idx >= self.bits.len() {
            self.bits.resize(idx + 1, false);
        }

        let old = self.bits[idx];

        self.cardinality += !old as usize;
        self.bits.set(idx, true);

        old
    }

    /// Returns an iterator over the keys present in the set, in increasing order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, present)| *present)
            .map(|(i, _)| K::key_new(i))
    }
}

impl<K: ArenaKey> Debug for SecondarySet<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SecondarySet ")?;

        f.debug_list().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena_key;

    arena_key! { struct Key; }

    #[test]
    fn insert_past_end_grows() {
        let mut set = SecondarySet::<Key>::with_capacity(0);

        assert!(!set.insert(Key::key_new(40)));
        assert!(set.insert(Key::key_new(40)));
        assert!(!set.contains(Key::key_new(39)));
        assert_eq!(set.cardinality(), 1);
    }

    #[test]
    fn keys_are_in_increasing_order() {
        let mut set = SecondarySet::<Key>::with_capacity(4);

        assert!(set.is_empty());

        set.insert(Key::key_new(3));
        set.insert(Key::key_new(0));

        assert!(!set.contains(Key::key_new(100)));
        assert_eq!(set.cardinality(), 2);
        assert!(set.keys().eq([Key::key_new(0), Key::key_new(3)]));
    }
}
