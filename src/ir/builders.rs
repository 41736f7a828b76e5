//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::*;
use smallvec::SmallVec;

/// Helper type for building a [`Module`] from scratch.
///
/// Every helper that defines something allocates the result id for it and
/// returns it, so callers never have to manage the id bound themselves.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    /// Creates a builder for an empty module.
    pub fn new() -> Self {
        Self {
            module: Module::new(),
        }
    }

    /// Creates a builder for a module that declares the `Shader` capability
    /// and a logical GLSL450 memory model, i.e. the usual header of a
    /// graphics module.
    pub fn shader() -> Self {
        let mut builder = Self::new();

        builder.capability(Capability::Shader);
        builder.module.set_memory_model(Instruction::new(
            Opcode::MemoryModel,
            None,
            None,
            [Operand::Literal(0), Operand::Literal(1)],
        ));

        builder
    }

    /// Gets the module being built.
    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Finishes building, returning the module.
    pub fn finish(self) -> Module {
        self.module
    }

    /// Allocates a fresh id.
    pub fn id(&mut self) -> Id {
        self.module.allocate_id()
    }

    /// Declares a capability.
    pub fn capability(&mut self, cap: Capability) {
        self.module.push_capability(Instruction::new(
            Opcode::Capability,
            None,
            None,
            [Operand::Literal(cap as u32)],
        ));
    }

    /// Declares an extension by name.
    pub fn extension(&mut self, name: &str) {
        self.module.push_extension(Instruction::new(
            Opcode::Extension,
            None,
            None,
            [Operand::String(name.to_owned())],
        ));
    }

    /// `OpTypeVoid`
    pub fn type_void(&mut self) -> Id {
        self.global(Opcode::TypeVoid, None, [])
    }

    /// `OpTypeBool`
    pub fn type_bool(&mut self) -> Id {
        self.global(Opcode::TypeBool, None, [])
    }

    /// `OpTypeInt <width> <signedness>`
    pub fn type_int(&mut self, width: u32, signed: bool) -> Id {
        self.global(
            Opcode::TypeInt,
            None,
            [Operand::Literal(width), Operand::Literal(signed as u32)],
        )
    }

    /// `OpTypeFunction %ret %params...`
    pub fn type_function(&mut self, ret: Id, params: &[Id]) -> Id {
        let operands: SmallVec<[Operand; 3]> = std::iter::once(ret)
            .chain(params.iter().copied())
            .map(Operand::Id)
            .collect();

        self.global(Opcode::TypeFunction, None, operands)
    }

    /// `OpConstantTrue %ty`
    pub fn constant_true(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantTrue, Some(ty), [])
    }

    /// `OpConstantFalse %ty`
    pub fn constant_false(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantFalse, Some(ty), [])
    }

    /// `OpConstant %ty <value>` for a single-word integer type.
    pub fn constant_u32(&mut self, ty: Id, value: u32) -> Id {
        self.global(Opcode::Constant, Some(ty), [Operand::Literal(value)])
    }

    /// `OpConstantNull %ty`
    pub fn constant_null(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantNull, Some(ty), [])
    }

    /// `OpSpecConstantTrue %ty`
    pub fn spec_constant_true(&mut self, ty: Id) -> Id {
        self.global(Opcode::SpecConstantTrue, Some(ty), [])
    }

    /// `OpUndef %ty`
    pub fn undef(&mut self, ty: Id) -> Id {
        self.global(Opcode::Undef, Some(ty), [])
    }

    /// `OpName %target "name"`
    pub fn name(&mut self, target: Id, name: &str) {
        self.module.push_debug(Instruction::new(
            Opcode::Name,
            None,
            None,
            [Operand::Id(target), Operand::String(name.to_owned())],
        ));
    }

    /// `OpDecorate %target <decoration>`
    pub fn decorate(&mut self, target: Id, decoration: u32) {
        self.module.push_annotation(Instruction::new(
            Opcode::Decorate,
            None,
            None,
            [Operand::Id(target), Operand::Literal(decoration)],
        ));
    }

    /// Creates an `OpDecorationGroup` decorated with `decoration`, and applies
    /// it to every target with `OpGroupDecorate`. Returns the group.
    pub fn group_decorate(&mut self, decoration: u32, targets: &[Id]) -> Id {
        let group = self.id();

        self.decorate(group, decoration);
        self.module.push_annotation(Instruction::new(
            Opcode::DecorationGroup,
            None,
            Some(group),
            [],
        ));
        self.module.push_annotation(Instruction::new(
            Opcode::GroupDecorate,
            None,
            None,
            std::iter::once(group).chain(targets.iter().copied()).map(Operand::Id),
        ));

        group
    }

    /// `OpEntryPoint Fragment %func "name"`
    pub fn entry_point(&mut self, func: Id, name: &str) {
        self.module.push_entry_point(Instruction::new(
            Opcode::EntryPoint,
            None,
            None,
            [
                Operand::Literal(4),
                Operand::Id(func),
                Operand::String(name.to_owned()),
            ],
        ));
    }

    /// Returns a [`FuncBuilder`] for a new function. The function is not part
    /// of the module until [`FuncBuilder::define`] is called.
    pub fn define_function(&mut self, ret: Id, fn_ty: Id) -> FuncBuilder<'_> {
        FuncBuilder::new(&mut self.module, ret, fn_ty)
    }

    fn global<I>(&mut self, opcode: Opcode, ty: Option<Id>, operands: I) -> Id
    where
        I: IntoIterator<Item = Operand>,
    {
        let id = self.id();

        self.module
            .push_global(Instruction::new(opcode, ty, Some(id), operands));

        id
    }
}

/// Helper type for building a single function.
#[derive(Debug)]
pub struct FuncBuilder<'m> {
    module: &'m mut Module,
    func: Function,
    current: Option<Block>,
}

impl<'m> FuncBuilder<'m> {
    fn new(module: &'m mut Module, ret: Id, fn_ty: Id) -> Self {
        let id = module.allocate_id();

        Self {
            module,
            func: Function::new(id, ret, fn_ty),
            current: None,
        }
    }

    /// Finishes defining the function and inserts it into the module.
    pub fn define(self) -> Func {
        self.module.push_function(self.func)
    }

    /// Gets the id of the function being built.
    pub fn func_id(&self) -> Id {
        self.func.id()
    }

    /// Gets the function as it is right now.
    pub fn func(&self) -> &Function {
        &self.func
    }

    /// Allocates a fresh id.
    pub fn id(&mut self) -> Id {
        self.module.allocate_id()
    }

    /// Adds a parameter of type `ty` and returns its id.
    pub fn param(&mut self, ty: Id) -> Id {
        let id = self.id();

        self.func.push_param(Instruction::new(
            Opcode::FunctionParameter,
            Some(ty),
            Some(id),
            [],
        ));

        id
    }

    /// Creates a single basic block with a fresh label and appends it to
    /// the block list.
    ///
    /// Note that this does not switch the builder to operate on that block,
    /// you still need to call [`Self::switch_to`].
    pub fn create_block(&mut self) -> Block {
        let label = self.id();

        self.func.append_block(label)
    }

    /// Gets the label of a block created by this builder.
    pub fn label(&self, block: Block) -> Id {
        self.func.block(block).label()
    }

    /// Switches to inserting at a specific block.
    pub fn switch_to(&mut self, block: Block) {
        debug_assert!(self.func.is_block_inserted(block));

        self.current = Some(block);
    }

    /// Appends an instruction without a result to the current block.
    ///
    /// If there is no current block, this will panic.
    pub fn inst<I>(&mut self, opcode: Opcode, operands: I)
    where
        I: IntoIterator<Item = Operand>,
    {
        self.append(Instruction::new(opcode, None, None, operands));
    }

    /// Appends an instruction that yields a value of type `ty` to the current
    /// block, and returns the id of the value.
    pub fn value<I>(&mut self, opcode: Opcode, ty: Id, operands: I) -> Id
    where
        I: IntoIterator<Item = Operand>,
    {
        let id = self.id();

        self.append(Instruction::new(opcode, Some(ty), Some(id), operands));

        id
    }

    /// `%r = OpFunctionCall %ret %callee %args...`
    pub fn call(&mut self, ret: Id, callee: Id, args: &[Id]) -> Id {
        self.value(
            Opcode::FunctionCall,
            ret,
            std::iter::once(callee)
                .chain(args.iter().copied())
                .map(Operand::Id),
        )
    }

    /// `%r = OpPhi %ty [%value %parent]*`
    pub fn phi(&mut self, ty: Id, incoming: &[(Id, Block)]) -> Id {
        let id = self.id();
        let pairs: SmallVec<[(Id, Id); 2]> = incoming
            .iter()
            .map(|&(value, parent)| (value, self.label(parent)))
            .collect();

        self.append(Instruction::phi(ty, id, &pairs));

        id
    }

    /// `OpSelectionMerge %merge None`
    pub fn selection_merge(&mut self, merge: Block) {
        let merge = self.label(merge);

        self.append(Instruction::selection_merge(merge));
    }

    /// `OpLoopMerge %merge %continue None`
    pub fn loop_merge(&mut self, merge: Block, continue_target: Block) {
        let (merge, continue_target) = (self.label(merge), self.label(continue_target));

        self.append(Instruction::loop_merge(merge, continue_target));
    }

    /// `OpBranch %target`
    pub fn branch(&mut self, target: Block) {
        let target = self.label(target);

        self.append(Instruction::branch(target));
    }

    /// `OpBranchConditional %cond %if_true %if_false`
    pub fn branch_conditional(&mut self, cond: Id, if_true: Block, if_false: Block) {
        let (if_true, if_false) = (self.label(if_true), self.label(if_false));

        self.append(Instruction::branch_conditional(cond, if_true, if_false));
    }

    /// `OpSwitch %selector %default [literal %label]*`
    pub fn switch(&mut self, selector: Id, default: Block, cases: &[(u32, Block)]) {
        let default = self.label(default);
        let cases: SmallVec<[(u32, Id); 4]> = cases
            .iter()
            .map(|&(value, target)| (value, self.label(target)))
            .collect();

        self.append(Instruction::switch(selector, default, &cases));
    }

    /// `OpReturn`
    pub fn ret(&mut self) {
        self.append(Instruction::ret());
    }

    /// `OpKill`
    pub fn kill(&mut self) {
        self.inst(Opcode::Kill, []);
    }

    /// `OpUnreachable`
    pub fn unreachable(&mut self) {
        self.append(Instruction::unreachable());
    }

    fn append(&mut self, inst: Instruction) {
        let block = self.current.expect("cannot append without a current block");

        self.func.block_mut(block).push(inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_diamond() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let bool_ty = mb.type_bool();
        let t = mb.constant_true(bool_ty);
        let fn_ty = mb.type_function(void, &[]);
        let mut fb = mb.define_function(void, fn_ty);

        let entry = fb.create_block();
        let then = fb.create_block();
        let merge = fb.create_block();

        fb.switch_to(entry);
        fb.selection_merge(merge);
        fb.branch_conditional(t, then, merge);

        fb.switch_to(then);
        fb.branch(merge);

        fb.switch_to(merge);
        fb.ret();

        let main = fb.func_id();
        let func = fb.define();

        mb.entry_point(main, "main");

        let module = mb.finish();
        let f = module.function(func);
        let entry_bb = f.block(entry);

        assert_eq!(f.entry_block(), Some(entry));
        assert_eq!(entry_bb.merge_and_continue(), Some((f.block(merge).label(), None)));
        assert!(entry_bb
            .successor_labels()
            .iter()
            .eq([f.block(then).label(), f.block(merge).label()].iter()));
        assert!(module.entry_point_functions().eq([main]));
        assert!(module.has_capability(Capability::Shader));

        // every id handed out is below the bound
        assert!(f.insts().all(|(_, inst)| inst
            .uses()
            .all(|id| id.word() < module.id_bound())));
    }
}
