//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaMap;
use crate::dense_arena_key;
use crate::ir::{BasicBlock, Block, Id, Instruction, Opcode, Operand};
use crate::utility::SaHashMap;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// The reference type for a [`Function`]. These can be looked up
    /// at the [`Module`](crate::ir::Module) level.
    pub struct Func;
}

/// Models a single function in the IR.
///
/// Blocks are owned by an arena inside of the function and are referred to
/// with [`Block`] keys. The *layout* is the ordered list of blocks that are
/// actually part of the function, the first one being the entry block.
/// Removing a block takes it out of the layout but never invalidates or
/// reuses its key, so analyses can hold keys across mutation safely.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Function {
    id: Id,
    def: Instruction,
    params: Vec<Instruction>,
    blocks: ArenaMap<Block, BasicBlock>,
    layout: Vec<Block>,
    labels: SaHashMap<Id, Block>,
}

impl Function {
    /// Creates an empty function named `id`, returning `return_ty` with the
    /// function type `fn_ty`.
    pub fn new(id: Id, return_ty: Id, fn_ty: Id) -> Self {
        Self {
            id,
            def: Instruction::new(
                Opcode::Function,
                Some(return_ty),
                Some(id),
                [Operand::Literal(0), Operand::Id(fn_ty)],
            ),
            params: Vec::default(),
            blocks: ArenaMap::default(),
            layout: Vec::default(),
            labels: SaHashMap::default(),
        }
    }

    /// Gets the result id of the function.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Gets the `OpFunction` instruction that declares the function.
    #[inline]
    pub fn def(&self) -> &Instruction {
        &self.def
    }

    /// Gets the `OpFunctionParameter`s of the function.
    #[inline]
    pub fn params(&self) -> &[Instruction] {
        &self.params
    }

    /// Adds a parameter to the end of the parameter list.
    pub fn push_param(&mut self, param: Instruction) {
        debug_assert_eq!(param.opcode(), Opcode::FunctionParameter);

        self.params.push(param);
    }

    /// Gets the entry block of the function. Unless no blocks have been
    /// appended to the function, this will be `Some`.
    #[inline]
    pub fn entry_block(&self) -> Option<Block> {
        self.layout.first().copied()
    }

    /// Returns the blocks of the function in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + DoubleEndedIterator + '_ {
        self.layout.iter().copied()
    }

    /// Returns the number of blocks still in the layout.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.layout.len()
    }

    /// Returns one past the largest block key ever handed out by this
    /// function. Dense per-block tables should be sized with this.
    #[inline]
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Resolves a [`Block`] into the real block.
    #[inline]
    pub fn block(&self, block: Block) -> &BasicBlock {
        &self.blocks[block]
    }

    /// Mutable version of [`Self::block`].
    #[inline]
    pub fn block_mut(&mut self, block: Block) -> &mut BasicBlock {
        &mut self.blocks[block]
    }

    /// Finds the block with a given label, if it's in the layout.
    #[inline]
    pub fn block_by_label(&self, label: Id) -> Option<Block> {
        self.labels.get(&label).copied()
    }

    /// Checks whether a block is still part of the function.
    pub fn is_block_inserted(&self, block: Block) -> bool {
        self.blocks
            .get(block)
            .map_or(false, |bb| self.labels.get(&bb.label()) == Some(&block))
    }

    /// Creates an empty block named `label` and appends it to the layout.
    pub fn append_block(&mut self, label: Id) -> Block {
        debug_assert!(
            !self.labels.contains_key(&label),
            "label {label} is already used in this function"
        );

        let block = self.blocks.insert(BasicBlock::new(label));

        self.layout.push(block);
        self.labels.insert(label, block);

        block
    }

    /// Removes a block from the function, returning the instructions it
    /// still had. The key stays valid (the block is just empty and detached).
    pub fn remove_block(&mut self, block: Block) -> Vec<Instruction> {
        debug_assert!(self.is_block_inserted(block));

        let label = self.blocks[block].label();

        self.layout.retain(|&bb| bb != block);
        self.labels.remove(&label);
        self.blocks[block].take_insts()
    }

    /// Replaces every use of `old` inside the function body with `new`.
    /// Returns whether anything changed.
    pub fn replace_all_uses(&mut self, old: Id, new: Id) -> bool {
        let mut changed = false;

        for &block in self.layout.iter() {
            for inst in self.blocks[block].insts_mut() {
                changed |= inst.replace_uses(old, new);
            }
        }

        changed
    }

    /// Returns every instruction in the body along with the block it's in,
    /// in layout order.
    pub fn insts(&self) -> impl Iterator<Item = (Block, &Instruction)> + '_ {
        self.layout
            .iter()
            .flat_map(move |&bb| self.blocks[bb].insts().iter().map(move |inst| (bb, inst)))
    }

    /// Returns the ids of every function called by this function, in the
    /// order the calls appear.
    pub fn callees(&self) -> impl Iterator<Item = Id> + '_ {
        self.insts()
            .filter(|(_, inst)| inst.opcode() == Opcode::FunctionCall)
            .filter_map(|(_, inst)| inst.id_operand(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> Id {
        Id::new(n)
    }

    #[test]
    fn removed_blocks_keep_their_keys() {
        let mut func = Function::new(id(1), id(2), id(3));
        let b0 = func.append_block(id(10));
        let b1 = func.append_block(id(11));
        let b2 = func.append_block(id(12));

        func.block_mut(b1).push(Instruction::ret());

        let old = func.remove_block(b1);

        assert_eq!(old, vec![Instruction::ret()]);
        assert!(func.blocks().eq([b0, b2]));
        assert!(!func.is_block_inserted(b1));
        assert_eq!(func.block_by_label(id(11)), None);
        assert_eq!(func.block_by_label(id(12)), Some(b2));
        assert_eq!(func.block_capacity(), 3);

        let b3 = func.append_block(id(13));

        assert_ne!(b3, b1);
        assert_eq!(func.entry_block(), Some(b0));
    }

    #[test]
    fn replace_all_uses_rewrites_body() {
        let mut func = Function::new(id(1), id(2), id(3));
        let b0 = func.append_block(id(10));

        func.block_mut(b0).push(Instruction::new(
            Opcode::FunctionCall,
            Some(id(2)),
            Some(id(20)),
            [Operand::Id(id(30)), Operand::Id(id(5))],
        ));
        func.block_mut(b0).push(Instruction::ret());

        assert!(func.replace_all_uses(id(5), id(6)));
        assert!(func.callees().eq([id(30)]));
        assert!(func.insts().any(|(_, inst)| inst.references(id(6))));
    }
}
