//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;
use crate::ir::{Id, Instruction};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// References a single basic block inside of a [`Function`](crate::ir::Function).
    ///
    /// Block keys are stable: removing a block from a function never causes
    /// its key to be handed out again.
    pub struct Block;
}

/// Models a single basic block in a function within the IR.
///
/// These are made up of a label id and a linear sequence of instructions:
///
///   1. Zero or more phis, always first.
///   2. The body of the block.
///   3. An optional merge declaration (`OpSelectionMerge` / `OpLoopMerge`).
///   4. Exactly one terminator.
///
/// ```other
/// %12 = OpLabel
/// %13 = OpPhi %int %5 %10 %6 %11
///       OpSelectionMerge %15 None
///       OpBranchConditional %cond %14 %15
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    label: Id,
    insts: Vec<Instruction>,
}

impl BasicBlock {
    pub(in crate::ir) fn new(label: Id) -> Self {
        Self {
            label,
            insts: Vec::default(),
        }
    }

    /// Gets the label id that names this block.
    #[inline]
    pub fn label(&self) -> Id {
        self.label
    }

    /// Gets every instruction in the block, in order.
    #[inline]
    pub fn insts(&self) -> &[Instruction] {
        &self.insts
    }

    /// Mutable access to the instructions of the block.
    ///
    /// Callers are responsible for keeping the phi / merge / terminator
    /// ordering intact.
    #[inline]
    pub fn insts_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.insts
    }

    /// Checks if the block has no instructions at all (not even a terminator).
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Gets the terminator of the block, if it has one.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.insts.last().filter(|inst| inst.opcode().is_terminator())
    }

    /// Gets the merge declaration that immediately precedes the terminator,
    /// if the block is a header.
    pub fn merge_inst(&self) -> Option<&Instruction> {
        self.terminator()?;

        let len = self.insts.len();

        if len < 2 {
            return None;
        }

        Some(&self.insts[len - 2]).filter(|inst| inst.opcode().is_merge())
    }

    /// Returns the merge block id declared by this block and, if it's a loop
    /// header, its continue target.
    pub fn merge_and_continue(&self) -> Option<(Id, Option<Id>)> {
        self.merge_inst().and_then(Instruction::merge_targets)
    }

    /// Returns the labels the terminator of this block can branch to.
    pub fn successor_labels(&self) -> SmallVec<[Id; 2]> {
        self.terminator()
            .map(Instruction::branch_targets)
            .unwrap_or_default()
    }

    /// Returns the phis at the start of the block.
    pub fn phis(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.insts
            .iter()
            .take_while(|inst| inst.opcode().is_phi())
    }

    /// Appends an instruction to the end of the block.
    pub fn push(&mut self, inst: Instruction) {
        debug_assert!(
            self.terminator().is_none(),
            "cannot append to a block that already has a terminator"
        );

        self.insts.push(inst);
    }

    /// Removes and returns the last instruction of the block.
    pub fn pop(&mut self) -> Option<Instruction> {
        self.insts.pop()
    }

    /// Removes every instruction from the block and returns them.
    pub fn take_insts(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.insts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> Id {
        Id::new(n)
    }

    #[test]
    fn header_exposes_merge_and_successors() {
        let mut bb = BasicBlock::new(id(1));

        bb.push(Instruction::selection_merge(id(4)));
        bb.push(Instruction::branch_conditional(id(9), id(2), id(3)));

        assert_eq!(bb.merge_and_continue(), Some((id(4), None)));
        assert_eq!(bb.successor_labels().as_slice(), &[id(2), id(3)]);
    }

    #[test]
    fn merge_must_precede_terminator() {
        let mut bb = BasicBlock::new(id(1));

        bb.push(Instruction::selection_merge(id(4)));

        // no terminator yet, so this isn't a header
        assert_eq!(bb.merge_inst(), None);
        assert!(bb.successor_labels().is_empty());
    }

    #[test]
    fn phis_stop_at_first_non_phi() {
        let mut bb = BasicBlock::new(id(1));

        bb.push(Instruction::phi(id(2), id(3), &[(id(4), id(5))]));
        bb.push(Instruction::phi(id(2), id(6), &[(id(4), id(5))]));
        bb.push(Instruction::ret());

        assert_eq!(bb.phis().count(), 2);
        assert_eq!(bb.take_insts().len(), 3);
        assert!(bb.is_empty());
    }
}
