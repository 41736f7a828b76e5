//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the pass infrastructure used to run transforms over the IR.
//!
//! Passes at their core are just objects that take in IR and report what
//! they did to it:
//!
//! ```
//! # use spinel::ir::Module;
//! # use spinel::pass::Status;
//! struct Pass { /* ... */ }
//!
//! impl Pass {
//!     fn run(&mut self, ir: &mut Module) -> Status { Status::SuccessWithoutChange }
//! }
//! ```
//!
//! # Transform Passes
//! Logically, transform passes are pure functions that map input IR -> output IR.
//! They are allowed to take a `&mut self` to manipulate internal state
//! during the run, but they should always act as-if they were pure functions.
//! Multiple runs of the same pass over the same IR should produce the same
//! output, regardless of how many times the pass is ran.
//!
//! Every run reports a [`Status`]: whether the pass refused to run
//! ([`Status::Failure`], with the module left exactly as it was), ran without
//! changing anything, or ran and changed the module.
//!
//! The main trait used here is [`ModuleTransformPass`], and pipelines of them
//! are run with a [`ModulePassManager`].

mod error;
mod manager;
mod transform;

pub use error::*;
pub use manager::*;
pub use transform::*;
