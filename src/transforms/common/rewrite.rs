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

/// A selection construct's header branch: a conditional branch or switch
/// that is immediately preceded by an `OpSelectionMerge`.
///
/// ```none
///   OpSelectionMerge %merge None
///   OpBranchConditional %cond %a %b   ; or `OpSwitch %cond %default ...`
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionBranch {
    /// The terminator of the header.
    pub branch: Instruction,
    /// The merge block declared by the header.
    pub merge: Id,
    /// The condition of the conditional branch, or the selector of the switch.
    pub condition: Id,
}

/// Finds the selection branch that ends `bb`, if it has one.
///
/// Loop headers are excluded: a conditional branch preceded by an
/// `OpLoopMerge` is not a selection construct.
pub fn get_selection_branch(bb: &BasicBlock) -> Option<SelectionBranch> {
    let branch = bb.terminator()?;
    let merge = bb.merge_inst()?;

    if merge.opcode() != Opcode::SelectionMerge {
        return None;
    }

    if !matches!(
        branch.opcode(),
        Opcode::BranchConditional | Opcode::Switch
    ) {
        return None;
    }

    Some(SelectionBranch {
        branch: branch.clone(),
        merge: merge.id_operand(0)?,
        condition: branch.id_operand(0)?,
    })
}

/// Removes the terminator of `bb` and the `OpSelectionMerge` right before it.
///
/// Effectively, it transforms this:
/// ```none
///   %x = OpIAdd %int %a %b
///        OpSelectionMerge %merge None
///        OpBranchConditional %cond %a %b
/// ```
/// into this, which is ready for a new terminator to be added:
/// ```none
///   %x = OpIAdd %int %a %b
/// ```
pub fn remove_selection_branch(bb: &mut BasicBlock) {
    debug_assert!(get_selection_branch(bb).is_some());

    bb.pop();
    bb.pop();
}

/// Appends `OpBranch %target` to a block that doesn't have a terminator yet.
pub fn add_branch(bb: &mut BasicBlock, target: Id) {
    bb.push(Instruction::branch(target));
}

/// Appends `OpSelectionMerge %merge None` to a block that doesn't have a
/// terminator yet. The terminator must be added right after this.
pub fn add_selection_merge(bb: &mut BasicBlock, merge: Id) {
    bb.push(Instruction::selection_merge(merge));
}

/// Appends `OpBranchConditional %cond %if_true %if_false` to a block that
/// doesn't have a terminator yet.
pub fn add_branch_conditional(bb: &mut BasicBlock, cond: Id, if_true: Id, if_false: Id) {
    bb.push(Instruction::branch_conditional(cond, if_true, if_false));
}
