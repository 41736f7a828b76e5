//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Module;
use crate::pass::*;
use tracing::{debug, debug_span, warn};

/// Manages running a set of passes over IR.
///
/// An important note is that this is actually a module pass itself, it's a pass
/// that simply runs other passes. The pipeline stops at the first pass that
/// reports [`Status::Failure`].
#[derive(Default)]
pub struct ModulePassManager<'p> {
    passes: Vec<Box<dyn ModuleTransformPass + 'p>>,
}

impl<'p> ModulePassManager<'p> {
    /// Creates a new, empty, module pass manager.
    pub fn new() -> Self {
        Self {
            passes: Vec::default(),
        }
    }

    /// Adds a transformation pass to the pass manager. This pass's order is defined
    /// relative to other calls to [`Self::add_pass`].
    pub fn add_pass<T: ModuleTransformPass + 'p>(&mut self, pass: T) {
        self.passes.push(Box::new(pass));
    }

    /// Gets the number of passes in the pipeline.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Checks if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl<'p> ModuleTransformPass for ModulePassManager<'p> {
    fn name(&self) -> &'static str {
        "module-pass-manager"
    }

    fn run(&mut self, module: &mut Module) -> Status {
        let mut status = Status::SuccessWithoutChange;

        for pass in self.passes.iter_mut() {
            let _span = debug_span!("pass", name = pass.name()).entered();
            let result = pass.run(module);

            debug!(?result, "finished pass");

            status = status.combine(result);

            if result.is_failure() {
                warn!(pass = pass.name(), "pass failed, stopping pipeline");

                break;
            }
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder<'a> {
        name: &'static str,
        result: Status,
        log: &'a RefCell<Vec<&'static str>>,
    }

    impl<'a> ModuleTransformPass for Recorder<'a> {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run(&mut self, _: &mut Module) -> Status {
            self.log.borrow_mut().push(self.name);

            self.result
        }
    }

    #[test]
    fn failure_stops_the_pipeline() {
        let log = RefCell::new(Vec::new());
        let mut mpm = ModulePassManager::new();

        mpm.add_pass(Recorder {
            name: "a",
            result: Status::SuccessWithChange,
            log: &log,
        });
        mpm.add_pass(Recorder {
            name: "b",
            result: Status::Failure,
            log: &log,
        });
        mpm.add_pass(Recorder {
            name: "c",
            result: Status::SuccessWithoutChange,
            log: &log,
        });

        let status = mpm.run(&mut Module::new());

        assert_eq!(status, Status::Failure);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn changes_are_combined() {
        let log = RefCell::new(Vec::new());
        let mut mpm = ModulePassManager::new();

        mpm.add_pass(Recorder {
            name: "a",
            result: Status::SuccessWithoutChange,
            log: &log,
        });
        mpm.add_pass(Recorder {
            name: "b",
            result: Status::SuccessWithChange,
            log: &log,
        });

        assert_eq!(mpm.len(), 2);
        assert_eq!(mpm.run(&mut Module::new()), Status::SuccessWithChange);
    }
}
