//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Defines the transform passes over the IR.
//!
//! These are the passes that can (potentially) modify a module. Some of
//! them are not actually transformations (the verify pass never touches the
//! IR), but they all run through [`ModuleTransformPass`](crate::pass::ModuleTransformPass)
//! and report a [`Status`](crate::pass::Status).

pub mod common;

mod dbe;
mod extensions;
mod printers;
mod unreachable;
mod verify;

pub use dbe::*;
pub use extensions::*;
pub use printers::*;
pub use unreachable::*;
pub use verify::*;
