//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # Spinel
//!
//! Dead-branch elimination for shader modules with structured control flow.
//!
//! The IR is an in-memory form of a SPIR-V style module: every selection and
//! loop construct names its merge block, and loops name their continue
//! target. [`transforms::DeadBranchElimPass`] removes the branches whose
//! condition is a literal constant, along with the blocks that become dead,
//! while keeping the structured control flow legal.
//!
//! ```
//! # use spinel::ir::ModuleBuilder;
//! # use spinel::pass::{ModuleTransformPass, Status};
//! # use spinel::transforms::{DeadBranchElimPass, ExtensionWhitelist};
//! let mut mb = ModuleBuilder::shader();
//! // ... build a module ...
//! let mut module = mb.finish();
//! let whitelist = ExtensionWhitelist::default();
//! let mut pass = DeadBranchElimPass::new(&whitelist);
//!
//! assert_eq!(pass.run(&mut module), Status::SuccessWithoutChange);
//! ```

pub mod analysis;
pub mod arena;
pub mod ir;
pub mod pass;
pub mod transforms;
pub mod utility;

use crate::pass::{ModulePassManager, ModuleTransformPass, PassError, Status};
use crate::transforms::{
    DeadBranchElimPass, ExtensionWhitelist, ModuleWriterPass, StructuredOrderWriterPass,
    VerifyModulePass,
};

/// A helper function that handles "run these passes specified by the user" in a way that multiple
/// tools can use.
///
/// This is not intended to be used for pre-determined pass pipelines, but is useful for tools
/// that take a list of pass names from the user.
///
/// - `verify` is whether to insert verify passes before and between all passes
/// - `passes` is the user-specified list of passes
/// - `whitelist` is the set of extensions the dead-branch pass accepts
///
/// Known pass names are `eliminate-dead-branches`, `verify`, `module-stdout`,
/// `module-stderr`, `order-stdout` and `order-stderr`. Nothing is run if any
/// name is unknown.
pub fn run_passes(
    module: &mut ir::Module,
    verify: bool,
    passes: &[String],
    whitelist: &ExtensionWhitelist,
) -> Result<Status, PassError> {
    let mut mpm = ModulePassManager::new();

    if verify {
        mpm.add_pass(VerifyModulePass);
    }

    for pass in passes {
        mpm.add_pass(pass_by_name(pass, whitelist)?);

        if verify {
            mpm.add_pass(VerifyModulePass);
        }
    }

    Ok(mpm.run(module))
}

fn pass_by_name<'w>(
    name: &str,
    whitelist: &'w ExtensionWhitelist,
) -> Result<Box<dyn ModuleTransformPass + 'w>, PassError> {
    let pass: Box<dyn ModuleTransformPass + 'w> = match name {
        "eliminate-dead-branches" => Box::new(DeadBranchElimPass::new(whitelist)),
        "verify" => Box::new(VerifyModulePass),
        "module-stdout" => Box::new(ModuleWriterPass::stdout()),
        "module-stderr" => Box::new(ModuleWriterPass::stderr()),
        "order-stdout" => Box::new(StructuredOrderWriterPass::stdout()),
        "order-stderr" => Box::new(StructuredOrderWriterPass::stderr()),
        other => return Err(PassError::UnknownPass(other.to_owned())),
    };

    Ok(pass)
}
