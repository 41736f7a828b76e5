//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Provides the interfaces and the types required to properly
//! manipulate the IR.
//!
//! The IR is a direct in-memory model of a structured shader module: module
//! sections, functions, basic blocks and instructions named by [`Id`]s. This
//! only contains the code for representing and building the IR itself, the
//! transforms done over it are defined in other places.

mod block;
mod builders;
mod function;
mod id;
mod instruction;
mod module;

pub use block::*;
pub use builders::*;
pub use function::*;
pub use id::*;
pub use instruction::*;
pub use module::*;
