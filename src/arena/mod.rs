//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module.
//!
//! These arenas do not allow deletion, a key handed out by an [`ArenaMap`] stays
//! valid (and keeps referring to the same slot) for as long as the arena lives.
//! The IR uses this to hold basic blocks: removing a block from a function only
//! removes it from the function's layout, so any block key held by an analysis
//! can never end up pointing at a different block.
//!
//! ```
//! # use spinel::arena_key;
//! # use spinel::arena::*;
//! arena_key! {
//!     pub struct Node;
//! }
//!
//! enum AstNode {
//!     Immediate(u64),
//!     Add(Node, Node),
//!     Mul(Node, Node)
//! }
//!
//! let mut arena = ArenaMap::new();
//!
//! // (16 + 3) * 3
//! let e1: Node = arena.insert(AstNode::Immediate(16)); // => 16
//! let e2 = arena.insert(AstNode::Immediate(3)); // => 3
//! let e3 = arena.insert(AstNode::Add(e1, e2)); // => (16 + 3)
//! let e4 = arena.insert(AstNode::Mul(e2, e3)); // => (16 + 3) * 3
//! ```

mod key;
mod map;
mod secondary_set;

pub use key::ArenaKey;
pub use map::ArenaMap;
pub use secondary_set::SecondarySet;
