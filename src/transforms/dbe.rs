//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{
    compute_reachable, compute_reachable_by, ControlFlowGraph, DominatorTree, StructuredOrder,
    StructuredSuccessors,
};
use crate::arena::SecondarySet;
use crate::ir::*;
use crate::pass::{ModuleTransformPass, PassError, Status};
use crate::transforms::common::*;
use crate::transforms::{eliminate_unreachable_blocks, has_non_phi_ref, ExtensionWhitelist};
use crate::utility::{SaHashMap, SaHashSet};
use smallvec::{smallvec, SmallVec};
use std::collections::VecDeque;
use tracing::{debug, debug_span, trace, warn};

/// Removes branches whose condition is a compile-time constant, along with
/// the blocks that become dead because of it.
///
/// A selection header like this:
///
/// ```none
///   %a = OpLabel
///        OpSelectionMerge %m None
///        OpBranchConditional %true %t %f
/// ```
///
/// becomes `OpBranch %t`, and `%f` is removed if nothing else needs it. The
/// rewrite is only performed when it keeps the structured control flow legal,
/// i.e. when no block still named by a surviving merge or continue
/// declaration would become unreachable. When that isn't the case but keeping
/// the merge block reachable would be enough, the header is rewritten into
/// `OpSelectionMerge %m` + `OpBranchConditional <true> %t %m` instead.
///
/// Only literal `OpConstantTrue`/`OpConstantFalse` conditions and 32-bit
/// integer `OpConstant`/`OpConstantNull` selectors are understood. Nothing
/// else is folded, not even `OpLogicalNot %true`.
pub struct DeadBranchElimPass<'w> {
    whitelist: &'w ExtensionWhitelist,
}

impl<'w> DeadBranchElimPass<'w> {
    /// Creates the pass. Modules declaring any extension outside of
    /// `whitelist` are refused.
    pub fn new(whitelist: &'w ExtensionWhitelist) -> Self {
        Self { whitelist }
    }

    /// Runs the pass over `module`.
    ///
    /// The functions in the call trees of the entry points are processed, in
    /// call-tree order and each one once. Functions that no entry point can
    /// call are left alone.
    pub fn process(&self, module: &mut Module) -> Status {
        if let Err(err) = self.check_module(module) {
            match err.status() {
                Status::Failure => warn!(%err, "refusing to process module"),
                _ => debug!(%err, "skipping module"),
            }

            return err.status();
        }

        let mut consts = ConstantTable::from_module(module);
        let mut ids = module.id_allocator();
        let mut killed = SaHashSet::default();
        let mut changed = false;

        for func in call_tree_order(module) {
            changed |= eliminate_dead_branches(
                module.function_mut(func),
                &mut consts,
                &mut ids,
                &mut killed,
            );
        }

        for global in consts.take_new_globals() {
            module.push_global(global);
        }

        module.finalize_ids(ids);

        if !killed.is_empty() {
            let removed = module.remove_debug_info_for(&killed);

            debug!(killed = killed.len(), removed, "cleaned up debug info");
        }

        Status::changed(changed)
    }

    fn check_module(&self, module: &Module) -> Result<(), PassError> {
        if let Some(ext) = self.whitelist.first_unsupported(module) {
            return Err(PassError::UnsupportedExtension(ext.to_owned()));
        }

        if !module.has_capability(Capability::Shader) {
            return Err(PassError::MissingShaderCapability);
        }

        if module.has_annotation(Opcode::GroupDecorate) {
            return Err(PassError::GroupDecorations);
        }

        Ok(())
    }
}

impl<'w> ModuleTransformPass for DeadBranchElimPass<'w> {
    fn name(&self) -> &'static str {
        "eliminate-dead-branches"
    }

    fn run(&mut self, module: &mut Module) -> Status {
        self.process(module)
    }
}

// breadth-first over OpFunctionCall, starting from the entry points
fn call_tree_order(module: &Module) -> Vec<Func> {
    let mut queue: VecDeque<Id> = module.entry_point_functions().collect();
    let mut seen = SaHashSet::default();
    let mut order = Vec::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }

        if let Some(func) = module.function_by_id(id) {
            order.push(func);
            queue.extend(module.function(func).callees());
        }
    }

    order
}

/// What to do with a selection header whose live target is known.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Decision {
    /// Replace the merge and terminator with `OpBranch live`.
    Fold,
    /// Keep the merge reachable with `OpBranchConditional <const> live merge`.
    KeepMerge,
    /// Leave the header alone.
    Reject,
}

/// Checks whether a header in `func` may branch only to `edges` without
/// making a block unreachable while a reachable block still names it, and
/// without a value losing dominance over one of its uses.
///
/// Phis don't count as references, the only non-phi instructions that name
/// blocks are merge declarations and terminators. The header itself is
/// ignored since its merge and terminator are what's being replaced.
fn is_legal_proposal(
    func: &Function,
    reachable: &SecondarySet<Block>,
    header: Block,
    edges: &[Id],
) -> bool {
    let successors = |bb: Block| -> SmallVec<[Id; 2]> {
        if bb == header {
            edges.iter().copied().collect()
        } else {
            func.block(bb).successor_labels()
        }
    };

    let proposed = compute_reachable_by(func, successors);
    let orphans_nothing = reachable
        .keys()
        .filter(|&bb| !proposed.contains(bb))
        .all(|dead| !has_non_phi_ref(func, func.block(dead).label(), &proposed, Some(header)));

    orphans_nothing && preserves_dominance(func, &DominatorTree::compute_by(func, successors))
}

/// Checks that every value used in a block of `domtree` is defined in a block
/// that dominates the use. A phi operand is used at the end of its parent, so
/// it's checked against the parent instead (and only if the parent is
/// reachable, the pair gets dropped or retained otherwise).
fn preserves_dominance(func: &Function, domtree: &DominatorTree) -> bool {
    let defs: SaHashMap<Id, Block> = func
        .insts()
        .filter_map(|(bb, inst)| Some((inst.result_id()?, bb)))
        .collect();

    // globals and parameters dominate everything
    let dominated = |value: Id, user: Block| match defs.get(&value) {
        Some(&def) => domtree.dominates(user, def),
        None => true,
    };

    func.blocks()
        .filter(|&bb| domtree.is_reachable(bb))
        .all(|bb| {
            func.block(bb).insts().iter().all(|inst| {
                if !inst.opcode().is_phi() {
                    return inst.uses().all(|value| dominated(value, bb));
                }

                inst.phi_incoming()
                    .all(|(value, parent)| match func.block_by_label(parent) {
                        Some(parent) if domtree.is_reachable(parent) => dominated(value, parent),
                        _ => true,
                    })
            })
        })
}

fn decide(
    func: &Function,
    reachable: &SecondarySet<Block>,
    header: Block,
    live: Id,
    merge: Id,
) -> Decision {
    if is_legal_proposal(func, reachable, header, &[live]) {
        Decision::Fold
    } else if live != merge && is_legal_proposal(func, reachable, header, &[live, merge]) {
        Decision::KeepMerge
    } else {
        Decision::Reject
    }
}

/// Folds every constant selection in `func` that can be folded legally, then
/// repairs phis and removes the blocks that became dead.
///
/// Headers are visited in structured order, so an outer construct is always
/// decided before anything nested inside of it. Headers that became
/// unreachable because of an earlier fold are skipped.
///
/// `consts` and `ids` are shared between every function in the module, new
/// constants and ids are taken from them. Ids that stop existing are added to
/// `killed`. Returns whether the function was modified.
pub fn eliminate_dead_branches(
    func: &mut Function,
    consts: &mut ConstantTable,
    ids: &mut IdAllocator,
    killed: &mut SaHashSet<Id>,
) -> bool {
    let _span = debug_span!("function", id = %func.id()).entered();
    let succs = StructuredSuccessors::compute(func);
    let order = StructuredOrder::compute(func, &succs);
    let mut reachable = compute_reachable(func);
    let mut changed = false;

    for &header in order.blocks() {
        if !reachable.contains(header) {
            continue;
        }

        let sel = match get_selection_branch(func.block(header)) {
            Some(sel) => sel,
            None => continue,
        };

        let live = match consts.taken_target(&sel.branch) {
            Some(live) => live,
            None => {
                trace!(header = %func.block(header).label(), "condition is not a constant");

                continue;
            }
        };

        let label = func.block(header).label();

        match decide(func, &reachable, header, live, sel.merge) {
            Decision::Fold => {
                debug!(header = %label, %live, "folding selection");

                let bb = func.block_mut(header);

                remove_selection_branch(bb);
                add_branch(bb, live);
            }
            Decision::KeepMerge => {
                // a switch selector isn't a boolean, it needs a real `true`
                let (cond, value) = match consts.resolve_bool_condition(sel.condition) {
                    Some(value) => (sel.condition, value),
                    None => (consts.true_constant(ids), true),
                };

                let (if_true, if_false) = if value {
                    (live, sel.merge)
                } else {
                    (sel.merge, live)
                };

                if sel.branch == Instruction::branch_conditional(cond, if_true, if_false) {
                    trace!(header = %label, "selection is already folded");

                    continue;
                }

                debug!(header = %label, %live, merge = %sel.merge, "folding selection, keeping merge");

                let bb = func.block_mut(header);

                remove_selection_branch(bb);
                add_selection_merge(bb, sel.merge);
                add_branch_conditional(bb, cond, if_true, if_false);
            }
            Decision::Reject => {
                debug!(header = %label, "folding would orphan a structured block, leaving it");

                continue;
            }
        }

        changed = true;
        reachable = compute_reachable(func);
    }

    changed |= repair_phis(func, consts, ids, killed);
    changed |= eliminate_unreachable_blocks(func, killed);

    changed
}

/// Drops phi operands whose parent no longer branches to the phi's block,
/// gives every reachable parent without an operand (the header of a
/// selection that now branches straight to its merge) an `OpUndef`, and
/// replaces phis that were pruned down to a single operand from a reachable
/// parent with that operand. Only phis in reachable blocks are touched.
fn repair_phis(
    func: &mut Function,
    consts: &mut ConstantTable,
    ids: &mut IdAllocator,
    killed: &mut SaHashSet<Id>,
) -> bool {
    let cfg = ControlFlowGraph::compute(func);
    let reachable = compute_reachable(func);
    let blocks: SmallVec<[Block; 16]> = func.blocks().filter(|&bb| reachable.contains(bb)).collect();
    let mut replacements: Vec<(Id, Id)> = Vec::new();
    let mut pruned: SmallVec<[Id; 4]> = smallvec![];
    let mut changed = false;

    for bb in blocks {
        let mut preds: SmallVec<[Id; 4]> = smallvec![];
        let mut live_preds: SmallVec<[Id; 4]> = smallvec![];

        for pred in cfg.predecessors(bb) {
            let label = func.block(pred).label();

            preds.push(label);

            if reachable.contains(pred) {
                live_preds.push(label);
            }
        }

        let insts = func.block_mut(bb).insts_mut();
        let phis = insts.iter().take_while(|inst| inst.opcode().is_phi()).count();

        for phi in insts[..phis].iter_mut() {
            let dropped = phi.retain_phi_incoming(|_, parent| preds.contains(&parent));

            if dropped > 0 {
                trace!(phi = ?phi.result_id(), dropped, "dropped stale phi operands");

                pruned.extend(phi.result_id());
                changed = true;
            }

            let ty = match phi.type_id() {
                Some(ty) => ty,
                None => continue,
            };

            for &pred in live_preds.iter() {
                if phi.phi_incoming().any(|(_, parent)| parent == pred) {
                    continue;
                }

                let undef = consts.undef(ty, ids);

                trace!(phi = ?phi.result_id(), %pred, "new predecessor gets an undef");

                phi.push_phi_incoming(undef, pred);
                changed = true;
            }
        }

        let mut i = 0;

        insts.retain(|inst| {
            let is_phi = i < phis;

            i += 1;

            if !is_phi {
                return true;
            }

            let mut incoming = inst.phi_incoming();

            match (inst.result_id(), incoming.next(), incoming.next()) {
                (Some(result), Some((value, parent)), None)
                    if value != result
                        && pruned.contains(&result)
                        && live_preds.contains(&parent) =>
                {
                    replacements.push((result, value));

                    false
                }
                _ => true,
            }
        });
    }

    for i in 0..replacements.len() {
        let (old, new) = replacements[i];

        trace!(%old, %new, "replacing single-operand phi");

        func.replace_all_uses(old, new);
        killed.insert(old);
        changed = true;

        // a later replacement may target a phi that was just removed
        for later in replacements[i + 1..].iter_mut() {
            if later.1 == old {
                later.1 = new;
            }
        }
    }

    changed
}
