//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Module;

/// The outcome of running a transform pass over a module.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum Status {
    /// The pass refused to process the module. The module is unchanged.
    Failure,
    /// The pass ran, but the module is unchanged.
    SuccessWithoutChange,
    /// The pass ran and modified the module.
    SuccessWithChange,
}

impl Status {
    /// Maps "did anything change" into a successful status.
    #[inline]
    pub fn changed(changed: bool) -> Self {
        if changed {
            Status::SuccessWithChange
        } else {
            Status::SuccessWithoutChange
        }
    }

    /// Combines the statuses of two runs, as if they were a single run.
    ///
    /// A failure anywhere is a failure, otherwise any change is a change.
    pub fn combine(self, other: Status) -> Status {
        match (self, other) {
            (Status::Failure, _) | (_, Status::Failure) => Status::Failure,
            (Status::SuccessWithChange, _) | (_, Status::SuccessWithChange) => {
                Status::SuccessWithChange
            }
            _ => Status::SuccessWithoutChange,
        }
    }

    /// Checks if the status is [`Status::Failure`].
    #[inline]
    pub fn is_failure(self) -> bool {
        self == Status::Failure
    }

    /// Checks if the module was modified.
    #[inline]
    pub fn has_changed(self) -> bool {
        self == Status::SuccessWithChange
    }
}

/// Models a pass that possibly performs a transformation over an entire module.
pub trait ModuleTransformPass {
    /// A short, stable, kebab-case name for the pass. Used for logging and
    /// for selecting passes by name.
    fn name(&self) -> &'static str;

    /// Performs the transformation over a given module.
    ///
    /// This function is expected to act as-if it was pure, i.e. calling the same
    /// pass multiple times on the same IR should produce equivalent IR each time.
    /// If [`Status::Failure`] is returned, the module must not have been modified.
    fn run(&mut self, module: &mut Module) -> Status;
}

impl<T: ModuleTransformPass + ?Sized> ModuleTransformPass for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run(&mut self, module: &mut Module) -> Status {
        (**self).run(module)
    }
}
