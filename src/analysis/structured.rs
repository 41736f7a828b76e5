//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondarySet;
use crate::ir::{Block, Function};
use crate::utility::{map_with_capacity, SaHashMap};
use smallvec::SmallVec;

/// The structured successors of every block in a function.
///
/// For a block `B`, this is `B`'s merge block (if it's a header), then its
/// continue target (if it's a loop header), then every branch target of its
/// terminator in operand order. Duplicates are kept.
///
/// Visiting the merge block of a construct *first* during a depth-first walk
/// is what makes the reverse post-order place the merge after everything
/// nested inside of the construct.
#[derive(Debug, Clone)]
pub struct StructuredSuccessors {
    succs: SaHashMap<Block, SmallVec<[Block; 4]>>,
}

impl StructuredSuccessors {
    /// Computes the structured successors of every block in `func`.
    pub fn compute(func: &Function) -> Self {
        let mut succs = map_with_capacity(func.block_count());

        for block in func.blocks() {
            let bb = func.block(block);
            let mut list = SmallVec::new();

            if let Some((merge, cont)) = bb.merge_and_continue() {
                list.extend(func.block_by_label(merge));
                list.extend(cont.and_then(|cont| func.block_by_label(cont)));
            }

            list.extend(
                bb.successor_labels()
                    .into_iter()
                    .filter_map(|label| func.block_by_label(label)),
            );

            succs.insert(block, list);
        }

        Self { succs }
    }

    /// Gets the structured successors of `block`, or an empty list if the
    /// block was not part of the function when this was computed.
    pub fn of(&self, block: Block) -> &[Block] {
        self.succs
            .get(&block)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }
}

/// An ordering of the reachable blocks of a function in which every block
/// comes before the blocks it dominates, and the merge block of every
/// construct comes after every block nested inside of that construct.
///
/// This is the reverse post-order of a depth-first walk over the structured
/// successors, starting at the entry block. Blocks that cannot be reached
/// through structured successors are not part of the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredOrder {
    order: Vec<Block>,
}

impl StructuredOrder {
    /// Computes the order for `func` given its structured successors.
    pub fn compute(func: &Function, succs: &StructuredSuccessors) -> Self {
        let mut po = Vec::with_capacity(func.block_count());
        let mut seen = SecondarySet::with_capacity(func.block_capacity());

        // if there are no blocks, the order is empty anyway
        if let Some(entry) = func.entry_block() {
            compute_po(entry, succs, &mut seen, &mut po);
        }

        po.reverse();

        Self { order: po }
    }

    /// Gets the blocks in structured order.
    pub fn blocks(&self) -> &[Block] {
        &self.order
    }

    /// Returns how many blocks are in the order.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Checks if the order has no blocks.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Gets the position of `block` inside of the order, if it's present.
    pub fn position(&self, block: Block) -> Option<usize> {
        self.order.iter().position(|&bb| bb == block)
    }
}

// iterative dfs: each frame is a block and the index of the next successor
// of that block to look at
fn compute_po(
    entry: Block,
    succs: &StructuredSuccessors,
    seen: &mut SecondarySet<Block>,
    order: &mut Vec<Block>,
) {
    let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];

    // we need to mark it as seen **before** going to any targets, just in case
    // there's any recursive blocks or recursive chains of blocks
    seen.insert(entry);

    while let Some(frame) = stack.last_mut() {
        let (curr, next) = *frame;

        match succs.of(curr).get(next) {
            Some(&target) => {
                frame.1 += 1;

                if !seen.insert(target) {
                    stack.push((target, 0));
                }
            }
            None => {
                order.push(curr);
                stack.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    #[test]
    fn merge_first_then_continue_then_targets() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        let header = b.create_block();
        let body = b.create_block();
        let cont = b.create_block();
        let merge = b.create_block();

        b.switch_to(header);
        b.loop_merge(merge, cont);
        b.branch_conditional(cond, body, merge);

        b.switch_to(body);
        b.branch(cont);

        b.switch_to(cont);
        b.branch(header);

        b.switch_to(merge);
        b.ret();

        let f = b.define();
        let m = mb.finish();
        let succs = StructuredSuccessors::compute(m.function(f));

        // duplicates are tolerated
        assert_eq!(succs.of(header), &[merge, cont, body, merge]);
        assert_eq!(succs.of(body), &[cont]);
        assert_eq!(succs.of(cont), &[header]);
        assert!(succs.of(merge).is_empty());
    }

    #[test]
    fn loop_merge_comes_after_body_and_continue() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        // %entry  -> %header
        // %header: OpLoopMerge %merge %cont, OpBranchConditional %c %body %merge
        // %body   -> %cont
        // %cont   -> %header
        // %merge:  OpReturn
        let entry = b.create_block();
        let header = b.create_block();
        let body = b.create_block();
        let cont = b.create_block();
        let merge = b.create_block();

        b.switch_to(entry);
        b.branch(header);

        b.switch_to(header);
        b.loop_merge(merge, cont);
        b.branch_conditional(cond, body, merge);

        b.switch_to(body);
        b.branch(cont);

        b.switch_to(cont);
        b.branch(header);

        b.switch_to(merge);
        b.ret();

        let f = b.define();
        let m = mb.finish();
        let func = m.function(f);
        let succs = StructuredSuccessors::compute(func);
        let order = StructuredOrder::compute(func, &succs);

        assert_eq!(order.blocks(), &[entry, header, body, cont, merge]);
    }

    #[test]
    fn selection_merge_after_both_arms() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        // layout deliberately puts the merge before the arms
        let entry = b.create_block();
        let merge = b.create_block();
        let then = b.create_block();
        let otherwise = b.create_block();

        b.switch_to(entry);
        b.selection_merge(merge);
        b.branch_conditional(cond, then, otherwise);

        b.switch_to(merge);
        b.ret();

        b.switch_to(then);
        b.branch(merge);

        b.switch_to(otherwise);
        b.branch(merge);

        let f = b.define();
        let m = mb.finish();
        let func = m.function(f);
        let order = StructuredOrder::compute(func, &StructuredSuccessors::compute(func));
        let pos = |bb| order.position(bb).unwrap();

        assert_eq!(order.len(), 4);
        assert_eq!(pos(entry), 0);
        assert!(pos(merge) > pos(then));
        assert!(pos(merge) > pos(otherwise));
    }

    #[test]
    fn deep_chains_do_not_recurse() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let mut b = mb.define_function(void, fn_ty);

        let blocks: Vec<Block> = (0..20_000).map(|_| b.create_block()).collect();

        for pair in blocks.windows(2) {
            b.switch_to(pair[0]);
            b.branch(pair[1]);
        }

        b.switch_to(*blocks.last().unwrap());
        b.ret();

        let f = b.define();
        let m = mb.finish();
        let func = m.function(f);
        let order = StructuredOrder::compute(func, &StructuredSuccessors::compute(func));

        assert_eq!(order.blocks(), blocks.as_slice());
    }

    #[test]
    fn unreachable_blocks_are_not_ordered() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let mut b = mb.define_function(void, fn_ty);

        let entry = b.create_block();
        let orphan = b.create_block();

        b.switch_to(entry);
        b.ret();

        b.switch_to(orphan);
        b.ret();

        let f = b.define();
        let m = mb.finish();
        let func = m.function(f);
        let order = StructuredOrder::compute(func, &StructuredSuccessors::compute(func));

        assert_eq!(order.blocks(), &[entry]);
        assert_eq!(order.position(orphan), None);
    }
}
