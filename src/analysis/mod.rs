//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains the analyses that transforms are built on top of.
//!
//! These are all pure: they borrow a [`Function`](crate::ir::Function) or a
//! [`Module`](crate::ir::Module) and compute some derived structure, keyed by
//! [`Block`](crate::ir::Block)s. Any transform that mutates the IR needs to
//! recompute whatever it was using afterwards.

mod dominators;
mod flowgraph;
mod structured;
mod writer;

pub use dominators::*;
pub use flowgraph::*;
pub use structured::*;
pub use writer::*;
