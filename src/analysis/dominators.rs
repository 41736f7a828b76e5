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
use crate::ir::{Block, Function, Id};
use crate::utility::{map_with_capacity, SaHashMap};
use smallvec::{smallvec, SmallVec};

/// Models the dominator tree for the blocks reachable from the entry of a
/// function.
///
/// # Implementation
/// The algorithm used is described in "A Simple, Fast Dominance Algorithm"
/// by Cooper et. al. The tree is stored as a map of `B -> idom(B)`, going
/// farther up the tree is just repeated lookups.
#[derive(Debug, Clone, Default)]
pub struct DominatorTree {
    // the entry block is not in here, it has no idom
    idoms: SaHashMap<Block, Block>,
    postorder: Vec<Block>,
    root: Option<Block>,
}

impl DominatorTree {
    /// Computes dominance information for `func` over its actual branch edges.
    pub fn compute(func: &Function) -> Self {
        Self::compute_by(func, |bb| func.block(bb).successor_labels())
    }

    /// Equivalent to [`Self::compute`], except the branch targets of each block
    /// are given by `successors`. This is how "would this value still dominate
    /// its uses if these edges were different" gets answered.
    pub fn compute_by<F>(func: &Function, mut successors: F) -> Self
    where
        F: FnMut(Block) -> SmallVec<[Id; 2]>,
    {
        let root = match func.entry_block() {
            Some(bb) => bb,
            None => return Self::default(),
        };

        let mut targets = |bb: Block| -> SmallVec<[Block; 4]> {
            successors(bb)
                .into_iter()
                .filter_map(|label| func.block_by_label(label))
                .collect()
        };

        let mut succs: SaHashMap<Block, SmallVec<[Block; 4]>> = map_with_capacity(func.block_count());
        let mut seen = SecondarySet::with_capacity(func.block_capacity());
        let mut stack: SmallVec<[(Block, usize); 16]> = smallvec![(root, 0)];
        let mut postorder = Vec::new();

        seen.insert(root);
        succs.insert(root, targets(root));

        while let Some(&(curr, i)) = stack.last() {
            match succs[&curr].get(i).copied() {
                Some(succ) => {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }

                    if !seen.insert(succ) {
                        succs.insert(succ, targets(succ));
                        stack.push((succ, 0));
                    }
                }
                None => {
                    postorder.push(curr);
                    stack.pop();
                }
            }
        }

        let mut preds: SaHashMap<Block, SmallVec<[Block; 4]>> = map_with_capacity(succs.len());

        for (&bb, targets) in succs.iter() {
            for &target in targets {
                preds.entry(target).or_default().push(bb);
            }
        }

        Self {
            idoms: compute_idoms(&postorder, &preds),
            postorder,
            root: Some(root),
        }
    }

    /// Gets the immediate dominator of `block`, if one exists. The entry block
    /// and unreachable blocks have none.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.idoms.get(&block).copied()
    }

    /// Checks if `possible_dominator` dominates `block`. A reachable block
    /// dominates itself, an unreachable block dominates nothing.
    pub fn dominates(&self, block: Block, possible_dominator: Block) -> bool {
        (block == possible_dominator && self.is_reachable(block))
            || self.strictly_dominates(block, possible_dominator)
    }

    /// Checks if `possible_dominator` strictly dominates `block`.
    pub fn strictly_dominates(&self, block: Block, possible_dominator: Block) -> bool {
        let mut curr = block;

        while let Some(idom) = self.idom(curr) {
            if idom == possible_dominator {
                return true;
            }

            curr = idom;
        }

        false
    }

    /// Checks if a block is reachable from the entry block.
    pub fn is_reachable(&self, block: Block) -> bool {
        self.root == Some(block) || self.idoms.contains_key(&block)
    }

    /// Returns the reachable blocks in a valid postorder.
    pub fn postorder(&self) -> &[Block] {
        &self.postorder
    }
}

fn intersect(
    po_numbers: &SaHashMap<Block, usize>,
    idoms: &SaHashMap<Block, Block>,
    bb1: Block,
    bb2: Block,
) -> Block {
    let mut f1 = bb1;
    let mut f2 = bb2;

    while f1 != f2 {
        while po_numbers[&f1] < po_numbers[&f2] {
            f1 = idoms[&f1];
        }

        while po_numbers[&f2] < po_numbers[&f1] {
            f2 = idoms[&f2];
        }
    }

    f1
}

fn compute_idoms(
    po: &[Block],
    preds: &SaHashMap<Block, SmallVec<[Block; 4]>>,
) -> SaHashMap<Block, Block> {
    let mut idoms = map_with_capacity(po.len());
    let root = match po.last() {
        Some(&root) => root,
        None => return idoms,
    };

    let po_numbers: SaHashMap<Block, usize> =
        po.iter().enumerate().map(|(i, &bb)| (bb, i)).collect();
    let mut changed = true;

    // for the purposes of the algorithm, the entry node is its own idom
    idoms.insert(root, root);

    while changed {
        changed = false;

        for &block in po.iter().rev().skip(1) {
            let mut processed = preds
                .get(&block)
                .into_iter()
                .flatten()
                .copied()
                .filter(|pred| idoms.contains_key(pred));

            // in reverse postorder there's always a processed pred
            let first = match processed.next() {
                Some(pred) => pred,
                None => continue,
            };

            let idom = processed.fold(first, |idom, pred| intersect(&po_numbers, &idoms, pred, idom));

            if idoms.insert(block, idom) != Some(idom) {
                changed = true;
            }
        }
    }

    idoms.remove(&root);

    idoms
}
