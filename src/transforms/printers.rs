//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{ModuleWriter, StructuredOrder, StructuredSuccessors};
use crate::ir::Module;
use crate::pass::{ModuleTransformPass, Status};
use std::io::{self, Write};
use tracing::error;

/// Wrapper pass that prints out the structured order of every function
/// in a module, one function per line.
///
/// ```none
/// %4: %5 %6 %8 %7
/// ```
pub struct StructuredOrderWriterPass {
    name: &'static str,
    out: Box<dyn io::Write>,
}

impl StructuredOrderWriterPass {
    /// Shorthand for a writer that prints to [`std::io::stdout`]. The pass is
    /// named `order-stdout`.
    pub fn stdout() -> Self {
        Self::named("order-stdout", io::stdout())
    }

    /// Shorthand for a writer that prints to [`std::io::stderr`]. The pass is
    /// named `order-stderr`.
    pub fn stderr() -> Self {
        Self::named("order-stderr", io::stderr())
    }

    /// Creates an instance of the pass with a given writer.
    pub fn with_writer<T: io::Write + 'static>(writer: T) -> Self {
        Self::named("print-structured-order", writer)
    }

    fn named<T: io::Write + 'static>(name: &'static str, writer: T) -> Self {
        Self {
            name,
            out: Box::new(writer),
        }
    }

    fn write_orders(&mut self, module: &Module) -> io::Result<()> {
        for func in module.functions() {
            let func = module.function(func);
            let order = StructuredOrder::compute(func, &StructuredSuccessors::compute(func));

            write!(self.out, "{}:", func.id())?;

            for &bb in order.blocks() {
                write!(self.out, " {}", func.block(bb).label())?;
            }

            writeln!(self.out)?;
        }

        Ok(())
    }
}

impl ModuleTransformPass for StructuredOrderWriterPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, module: &mut Module) -> Status {
        match self.write_orders(module) {
            Ok(()) => Status::SuccessWithoutChange,
            Err(err) => {
                error!(%err, "unable to write structured order");

                Status::Failure
            }
        }
    }
}

/// This is a pass that writes out a textual representation of a module
/// to a given stream.
pub struct ModuleWriterPass {
    name: &'static str,
    out: Box<dyn io::Write>,
}

impl ModuleWriterPass {
    /// Shorthand for a writer that prints to [`std::io::stdout`]. The pass is
    /// named `module-stdout`.
    pub fn stdout() -> Self {
        Self::named("module-stdout", io::stdout())
    }

    /// Shorthand for a writer that prints to [`std::io::stderr`]. The pass is
    /// named `module-stderr`.
    pub fn stderr() -> Self {
        Self::named("module-stderr", io::stderr())
    }

    /// Creates an instance of the pass with a given writer.
    ///
    /// This writer will be where the module is printed out when the pass
    /// is run over the IR.
    pub fn with_writer<T: io::Write + 'static>(writer: T) -> Self {
        Self::named("print-module", writer)
    }

    fn named<T: io::Write + 'static>(name: &'static str, writer: T) -> Self {
        Self {
            name,
            out: Box::new(writer),
        }
    }
}

impl ModuleTransformPass for ModuleWriterPass {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&mut self, module: &mut Module) -> Status {
        let writer = ModuleWriter::from(module);

        match self.out.write_all(writer.module().as_bytes()) {
            Ok(()) => Status::SuccessWithoutChange,
            Err(err) => {
                error!(%err, "unable to write module");

                Status::Failure
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    struct Failing;

    impl io::Write for Failing {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn diamond() -> Module {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        let a = b.create_block();
        let t = b.create_block();
        let m = b.create_block();

        b.switch_to(a);
        b.selection_merge(m);
        b.branch_conditional(cond, t, m);

        b.switch_to(t);
        b.branch(m);

        b.switch_to(m);
        b.ret();

        b.define();

        mb.finish()
    }

    #[test]
    fn writes_structured_order() {
        let mut module = diamond();
        let func = module.function(module.functions().next().unwrap());
        let labels: Vec<String> = func
            .blocks()
            .map(|bb| func.block(bb).label().to_string())
            .collect();
        let expected = format!("{}: {} {} {}\n", func.id(), labels[0], labels[1], labels[2]);
        let buf = SharedBuf::default();
        let mut pass = StructuredOrderWriterPass::with_writer(buf.clone());

        assert_eq!(pass.run(&mut module), Status::SuccessWithoutChange);
        assert_eq!(buf.contents(), expected);
    }

    #[test]
    fn writes_module() {
        let mut module = diamond();
        let buf = SharedBuf::default();
        let mut pass = ModuleWriterPass::with_writer(buf.clone());

        assert_eq!(pass.run(&mut module), Status::SuccessWithoutChange);
        assert_eq!(buf.contents(), module.to_string());
    }

    #[test]
    fn write_errors_are_failures() {
        let mut module = diamond();

        assert_eq!(
            ModuleWriterPass::with_writer(Failing).run(&mut module),
            Status::Failure
        );
        assert_eq!(
            StructuredOrderWriterPass::with_writer(Failing).run(&mut module),
            Status::Failure
        );
    }
}
