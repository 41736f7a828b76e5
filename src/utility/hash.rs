//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::collections::{HashMap, HashSet};

/// Alias for `std::collections::HashMap<K, V, ahash::RandomState>`. Almost every
/// key in the crate is an [`Id`](crate::ir::Id) or an arena key, and `ahash` is
/// significantly faster than SipHash for those.
pub type SaHashMap<K, V> = HashMap<K, V, ahash::RandomState>;

/// Alias for `std::collections::HashSet<V, ahash::RandomState>`. See [`SaHashMap`].
pub type SaHashSet<V> = HashSet<V, ahash::RandomState>;

/// Creates an empty [`SaHashMap`] that can hold `capacity` entries without
/// reallocating.
pub fn map_with_capacity<K, V>(capacity: usize) -> SaHashMap<K, V> {
    HashMap::with_capacity_and_hasher(capacity, ahash::RandomState::default())
}
