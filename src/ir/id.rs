//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt;
use std::fmt::{Display, Formatter};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A module-wide identifier. Every result (types, constants, values, functions
/// and block labels) is named by one of these.
///
/// Ids are never `0`, and every id used in a module is strictly less than the
/// module's id bound.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Id(u32);

impl Id {
    /// Wraps a raw id word.
    #[inline]
    pub fn new(word: u32) -> Self {
        debug_assert_ne!(word, 0, "0 is never a valid id");

        Self(word)
    }

    /// Gets the raw id word.
    #[inline]
    pub fn word(self) -> u32 {
        self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Hands out fresh ids above a module's id bound.
///
/// The allocator is an explicit value: a pass takes one out of the module with
/// [`Module::id_allocator`](crate::ir::Module::id_allocator), threads it by `&mut`
/// through whatever needs new ids, and gives it back with
/// [`Module::finalize_ids`](crate::ir::Module::finalize_ids) once it's done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Creates an allocator whose first id is `bound`.
    pub fn starting_at(bound: u32) -> Self {
        Self {
            next: bound.max(1),
        }
    }

    /// Returns the next available id and bumps the bound.
    pub fn take_next_id(&mut self) -> Id {
        let id = Id::new(self.next);

        self.next = self
            .next
            .checked_add(1)
            .expect("ran out of ids for the module");

        id
    }

    /// The bound the module should be given after all allocations are done.
    pub fn bound(&self) -> u32 {
        self.next
    }
}
