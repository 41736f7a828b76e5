//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::*;
use crate::utility::SaHashMap;
use std::fmt;
use std::fmt::{Display, Formatter, Write};
use std::ops::Range;

/// A simple IR -> text pass that takes in an entire module, turns it into
/// assembly-style text, and then maps functions and blocks to the range of
/// text referring to them.
///
/// This is used for debug output and for tests that need to produce
/// human-readable IR.
///
/// ```other
///        OpCapability 1
///   %1 = OpTypeVoid
///   %2 = OpTypeFunction %1
///   %3 = OpFunction %1 0 %2
///   %4 = OpLabel
///        OpReturn
///        OpFunctionEnd
/// ```
#[derive(Debug, Clone)]
pub struct ModuleWriter {
    whole: String,
    block_ranges: SaHashMap<(Func, Block), Range<usize>>,
    func_ranges: SaHashMap<Func, Range<usize>>,
}

impl ModuleWriter {
    /// Stringifies an entire module.
    pub fn from(module: &Module) -> Self {
        let mut writer = Self {
            whole: String::default(),
            block_ranges: SaHashMap::default(),
            func_ranges: SaHashMap::default(),
        };

        writer.walk(module);
        writer
    }

    /// Stringifies a whole block. This includes the block label and every
    /// instruction in the block.
    pub fn block(&self, func: Func, bb: Block) -> &str {
        &self.whole[self.block_ranges[&(func, bb)].clone()]
    }

    /// Stringifies a whole function. This includes every block, and the
    /// `OpFunction`/`OpFunctionEnd` pair.
    pub fn func(&self, func: Func) -> &str {
        &self.whole[self.func_ranges[&func].clone()]
    }

    /// Returns the entire module as a string.
    pub fn module(&self) -> &str {
        &self.whole
    }

    fn walk(&mut self, module: &Module) {
        let sections = [
            module.capabilities(),
            module.extension_insts(),
            module.ext_inst_imports(),
            module.memory_model().map(std::slice::from_ref).unwrap_or(&[]),
            module.entry_points(),
            module.execution_modes(),
            module.debug(),
            module.annotations(),
            module.types_values(),
        ];

        for inst in sections.into_iter().flatten() {
            self.line(inst);
        }

        for func in module.functions() {
            self.visit_func(func, module.function(func));
        }
    }

    fn visit_func(&mut self, func: Func, f: &Function) {
        let begin = self.whole.len();

        self.line(f.def());

        for param in f.params() {
            self.line(param);
        }

        for bb in f.blocks() {
            self.visit_block(func, bb, f.block(bb));
        }

        self.whole += "        OpFunctionEnd\n";

        let end = self.whole.len();

        self.func_ranges.insert(func, begin..end);
    }

    fn visit_block(&mut self, func: Func, block: Block, bb: &BasicBlock) {
        let begin = self.whole.len();

        // infallible, writing into a `String`
        let _ = writeln!(self.whole, "{:>5} = OpLabel", bb.label().to_string());

        for inst in bb.insts() {
            self.line(inst);
        }

        let end = self.whole.len();

        self.block_ranges.insert((func, block), begin..end);
    }

    fn line(&mut self, inst: &Instruction) {
        let _ = writeln!(self.whole, "{inst}");
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.result_id() {
            Some(result) => write!(f, "{:>5} = ", result.to_string())?,
            None => write!(f, "        ")?,
        }

        write!(f, "Op{:?}", self.opcode())?;

        if let Some(ty) = self.type_id() {
            write!(f, " {ty}")?;
        }

        for operand in self.operands() {
            match operand {
                Operand::Id(id) => write!(f, " {id}")?,
                Operand::Literal(word) => write!(f, " {word}")?,
                Operand::String(s) => write!(f, " {s:?}")?,
            }
        }

        Ok(())
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(ModuleWriter::from(self).module())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_assembly_style() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let mut b = mb.define_function(void, fn_ty);
        let entry = b.create_block();

        b.switch_to(entry);
        b.ret();

        let main = b.func_id();
        let f = b.define();

        mb.name(main, "main");

        let module = mb.finish();
        let writer = ModuleWriter::from(&module);
        let text = writer.module();

        assert!(text.starts_with("        OpCapability 1\n"));
        assert!(text.contains("   %1 = OpTypeVoid\n"));
        assert!(text.contains("        OpName %3 \"main\"\n"));
        assert_eq!(writer.block(f, entry), "   %4 = OpLabel\n        OpReturn\n");
        assert!(writer.func(f).ends_with("OpFunctionEnd\n"));
        assert_eq!(module.to_string(), text);
    }

    #[test]
    fn instruction_display() {
        let inst = Instruction::branch_conditional(Id::new(7), Id::new(8), Id::new(9));

        assert_eq!(inst.to_string(), "        OpBranchConditional %7 %8 %9");
    }
}
