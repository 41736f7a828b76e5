//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaMap, SecondarySet};
use crate::dense_arena_key;
use crate::ir::{Block, Function, Id};
use crate::utility::SaHashMap;
use smallvec::SmallVec;
use std::collections::hash_map::Entry;

dense_arena_key! {
    struct CFGNode;
}

#[derive(Default)]
struct CFGNodeData {
    predecessors: SmallVec<[Block; 4]>,
    successors: SmallVec<[Block; 4]>,
}

struct CFGComputer<'f> {
    nodes: ArenaMap<CFGNode, CFGNodeData>,
    lookup: SaHashMap<Block, CFGNode>,
    func: &'f Function,
}

impl<'f> CFGComputer<'f> {
    fn new(func: &'f Function) -> Self {
        Self {
            nodes: ArenaMap::default(),
            lookup: SaHashMap::default(),
            func,
        }
    }

    fn compute(mut self) -> (ArenaMap<CFGNode, CFGNodeData>, SaHashMap<Block, CFGNode>) {
        for block in self.func.blocks() {
            self.compute_block(block);
        }

        (self.nodes, self.lookup)
    }

    fn compute_block(&mut self, block: Block) {
        {
            // make sure that any block we compute at least gets
            // an empty node, even if we don't do anything else
            let _ = self.node_of(block);
        }

        let func = self.func;
        let successors: SmallVec<[Block; 4]> = func
            .block(block)
            .successor_labels()
            .into_iter()
            .filter_map(|label| func.block_by_label(label))
            .collect();

        for successor in successors {
            self.add_edge(block, successor);
        }
    }

    fn add_edge(&mut self, from: Block, to: Block) {
        {
            let succs = &mut self.node_of(from).successors;

            if !succs.contains(&to) {
                succs.push(to);
            }
        }

        let preds = &mut self.node_of(to).predecessors;

        if !preds.contains(&from) {
            preds.push(from);
        }
    }

    fn node_of(&mut self, block: Block) -> &mut CFGNodeData {
        match self.lookup.entry(block) {
            Entry::Occupied(slot) => &mut self.nodes[*slot.get()],
            Entry::Vacant(slot) => {
                let node = self.nodes.insert(CFGNodeData::default());

                slot.insert(node);

                &mut self.nodes[node]
            }
        }
    }
}

/// Models successor/predecessor information about the ordinary control-flow
/// graph of a given function.
///
/// Only terminators create edges here. Merge declarations and phis name
/// blocks without branching to them, so they are invisible to this graph.
/// Branches to labels that aren't blocks of the function are ignored.
/// Both successors and predecessors are deduplicated and kept in the order
/// they were first seen (layout order for predecessors).
pub struct ControlFlowGraph {
    nodes: ArenaMap<CFGNode, CFGNodeData>,
    lookup: SaHashMap<Block, CFGNode>,
}

impl ControlFlowGraph {
    /// Directly computes flowgraph information for a given function.
    pub fn compute(func: &Function) -> Self {
        let computer = CFGComputer::new(func);
        let (nodes, lookup) = computer.compute();

        Self { nodes, lookup }
    }

    /// Returns an iterator over the predecessors for a given block.
    pub fn predecessors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data_of(block)
            .into_iter()
            .flat_map(|node| node.predecessors.iter().copied())
    }

    /// Returns an iterator over the successors for a given block.
    pub fn successors(&self, block: Block) -> impl Iterator<Item = Block> + '_ {
        self.data_of(block)
            .into_iter()
            .flat_map(|node| node.successors.iter().copied())
    }

    /// Checks if a given block `pred` is a predecessor of `block`
    pub fn is_pred_of(&self, block: Block, pred: Block) -> bool {
        self.data_of(block)
            .map_or(false, |node| node.predecessors.contains(&pred))
    }

    fn data_of(&self, block: Block) -> Option<&CFGNodeData> {
        self.lookup.get(&block).map(|&node| &self.nodes[node])
    }
}

/// Computes the set of blocks that can be reached from the entry block of
/// `func` by following ordinary branch edges.
///
/// The walk is iterative, so arbitrarily deep graphs are fine.
pub fn compute_reachable(func: &Function) -> SecondarySet<Block> {
    compute_reachable_by(func, |bb| func.block(bb).successor_labels())
}

/// Equivalent to [`compute_reachable`], except the branch targets of each
/// block are given by `successors` instead of being read from the block's
/// terminator. This allows asking "what would be reachable if these edges
/// were different" without actually mutating the function.
pub fn compute_reachable_by<F>(func: &Function, mut successors: F) -> SecondarySet<Block>
where
    F: FnMut(Block) -> SmallVec<[Id; 2]>,
{
    let mut seen = SecondarySet::with_capacity(func.block_capacity());

    // if there are no blocks, nothing is reachable anyway
    let entry = match func.entry_block() {
        Some(bb) => bb,
        None => return seen,
    };

    let mut worklist: SmallVec<[Block; 16]> = SmallVec::default();

    seen.insert(entry);
    worklist.push(entry);

    while let Some(curr) = worklist.pop() {
        for label in successors(curr) {
            if let Some(target) = func.block_by_label(label) {
                if !seen.insert(target) {
                    worklist.push(target);
                }
            }
        }
    }

    seen
}
