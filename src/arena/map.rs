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
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// This is meant to act as a primary mapping of `K -> V`, where `K` is some key
/// type and `V` is the value being stored.
///
/// This is effectively a typed wrapper around `Vec<T>`, the main advantage is
/// that it does not implicitly convert into array types (i.e. it actually acts like
/// a map instead of a sequence) and it only allows indexing with the correct type.
///
/// ```
/// # use spinel::arena_key;
/// # use spinel::arena::ArenaMap;
/// arena_key! {
///     struct Name;
/// }
///
/// let mut blocks = ArenaMap::new();
/// let bb: Name = blocks.insert("Hello!");
///
/// assert_eq!(blocks[bb], "Hello!");
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArenaMap<K: ArenaKey, V> {
    slots: Vec<V>,
    _unused: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates a new, empty arena.
    #[inline]
    pub fn new() -> Self {
        Self {
            slots: Vec::default(),
            _unused: PhantomData,
        }
    }

    /// Adds an item into the arena, and returns a key that can be used to
    /// access that data later.
    #[inline]
    pub fn insert(&mut self, value: V) -> K {
        self.slots.push(value);

        K::key_new(self.slots.len() - 1)
    }

    /// Gets the value associated with a key, if the key was handed out by
    /// this arena.
    #[inline]
    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key.key_index())
    }

    /// Gets the number of elements that have been pushed into the arena.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Checks if the arena has had any elements pushed into it.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns an iterator over every key that has been handed out, in
    /// increasing order.
    pub fn keys(&self) -> impl Iterator<Item = K> + DoubleEndedIterator + ExactSizeIterator {
        (0..self.slots.len()).map(K::key_new)
    }

    /// Returns an iterator over the values in the arena, and the keys that
    /// map to those values.
    ///
    /// ```
    /// # use spinel::arena_key;
    /// # use spinel::arena::*;
    /// arena_key! { struct Key; }
    /// let mut map = ArenaMap::default();
    /// let k1: Key = map.insert(15);
    /// let mut it = map.iter();
    /// assert_eq!(it.next(), Some((k1, &15)));
    /// ```
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> + DoubleEndedIterator + ExactSizeIterator {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, v)| (K::key_new(i), v))
    }
}

impl<K: ArenaKey, V> Index<K> for ArenaMap<K, V> {
    type Output = V;

    #[inline]
    fn index(&self, key: K) -> &Self::Output {
        &self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V> IndexMut<K> for ArenaMap<K, V> {
    #[inline]
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        &mut self.slots[key.key_index()]
    }
}

impl<K: ArenaKey, V> Default for ArenaMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: Debug> Debug for ArenaMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaMap ")?;

        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena_key;

    arena_key! { struct Key; }

    #[test]
    fn keys_are_stable_across_inserts() {
        let mut map = ArenaMap::new();
        let k1: Key = map.insert("a");
        let k2 = map.insert("b");

        for i in 0..64 {
            map.insert(if i % 2 == 0 { "x" } else { "y" });
        }

        assert_eq!(map[k1], "a");
        assert_eq!(map[k2], "b");
        assert_eq!(map.len(), 66);
    }

    #[test]
    fn get_out_of_range_is_none() {
        let mut map = ArenaMap::new();
        let k1: Key = map.insert(1);

        assert_eq!(map.get(k1), Some(&1));
        assert_eq!(map.get(Key::key_new(1)), None);
        assert!(!map.is_empty());
    }

    #[test]
    fn iteration_yields_keys_in_insertion_order() {
        let mut map = ArenaMap::new();
        let k1: Key = map.insert(1);
        let k2 = map.insert(2);
        let k3 = map.insert(3);

        assert!(map.keys().eq([k1, k2, k3]));
        assert!(map.iter().map(|(_, v)| *v).eq([1, 2, 3]));
    }

    #[cfg(feature = "enable-serde")]
    use serde_test::{assert_tokens, Token};

    #[test]
    #[cfg(feature = "enable-serde")]
    fn serialize_map() {
        let mut map = ArenaMap::<Key, u32>::new();

        map.insert(3);
        map.insert(4);

        assert_tokens(
            &map,
            &[
                Token::Struct {
                    name: "ArenaMap",
                    len: 2,
                },
                Token::Str("slots"),
                Token::Seq { len: Some(2) },
                Token::U32(3),
                Token::U32(4),
                Token::SeqEnd,
                Token::Str("_unused"),
                Token::UnitStruct {
                    name: "PhantomData",
                },
                Token::StructEnd,
            ],
        );
    }
}
