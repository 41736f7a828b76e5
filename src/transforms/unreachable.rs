//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::compute_reachable;
use crate::arena::SecondarySet;
use crate::ir::{BasicBlock, Block, Function, Id};
use crate::utility::{SaHashMap, SaHashSet};
use smallvec::SmallVec;
use tracing::trace;

/// Deletes every instruction in `bb`, terminator included, recording the
/// result ids that stop existing in `killed`.
pub fn kill_all_insts(bb: &mut BasicBlock, killed: &mut SaHashSet<Id>) {
    killed.extend(bb.take_insts().into_iter().filter_map(|inst| inst.result_id()));
}

/// Checks if any non-phi instruction in a block of `live` references `label`.
///
/// `skip` excludes a single block from the search, this is used when that
/// block's merge and terminator are about to be replaced anyway.
pub fn has_non_phi_ref(
    func: &Function,
    label: Id,
    live: &SecondarySet<Block>,
    skip: Option<Block>,
) -> bool {
    func.blocks()
        .filter(|&bb| live.contains(bb) && Some(bb) != skip)
        .flat_map(|bb| func.block(bb).insts())
        .filter(|inst| !inst.opcode().is_phi())
        .any(|inst| inst.references(label))
}

/// Tracks what has to survive inside of the unreachable blocks.
struct Retention<'f> {
    func: &'f Function,
    reachable: SecondarySet<Block>,
    // result id -> (block, index) for everything defined in a dead block
    defs: SaHashMap<Id, (Block, usize)>,
    retained: SecondarySet<Block>,
    marked: SaHashSet<(Block, usize)>,
    worklist: SmallVec<[Id; 16]>,
}

impl<'f> Retention<'f> {
    fn new(func: &'f Function, reachable: SecondarySet<Block>, dead: &[Block]) -> Self {
        let mut defs = SaHashMap::default();

        for &bb in dead {
            for (i, inst) in func.block(bb).insts().iter().enumerate() {
                if let Some(result) = inst.result_id() {
                    defs.insert(result, (bb, i));
                }
            }
        }

        Self {
            func,
            reachable,
            defs,
            retained: SecondarySet::with_capacity(func.block_capacity()),
            marked: SaHashSet::default(),
            worklist: SmallVec::default(),
        }
    }

    fn compute(mut self) -> (SecondarySet<Block>, SaHashSet<(Block, usize)>) {
        let func = self.func;

        // everything a live block uses must continue to exist
        for bb in func.blocks().filter(|&bb| self.reachable.contains(bb)) {
            for inst in func.block(bb).insts() {
                self.worklist.extend(inst.uses());
            }
        }

        while let Some(id) = self.worklist.pop() {
            if let Some(bb) = func.block_by_label(id) {
                if !self.reachable.contains(bb) {
                    self.retain_block(bb);
                }

                continue;
            }

            if let Some(&(bb, i)) = self.defs.get(&id) {
                self.mark(bb, i);
                self.retain_block(bb);
            }
        }

        (self.retained, self.marked)
    }

    fn retain_block(&mut self, bb: Block) {
        if self.retained.insert(bb) {
            return;
        }

        let func = self.func;
        let block = func.block(bb);
        let len = block.insts().len();

        trace!(label = %block.label(), "retaining unreachable block");

        // a retained block still needs to be a well-formed block
        if block.terminator().is_some() {
            self.mark(bb, len - 1);
        }

        if block.merge_inst().is_some() {
            self.mark(bb, len - 2);
        }
    }

    fn mark(&mut self, bb: Block, i: usize) {
        let func = self.func;

        if self.marked.insert((bb, i)) {
            self.worklist.extend(func.block(bb).insts()[i].uses());
        }
    }
}

/// Removes the blocks of `func` that can't be reached from the entry block.
///
/// A dead block that is still referenced by something that survives (a phi
/// in a live block, a merge or continue declaration, or an instruction that
/// is itself retained) is kept, but stripped down to its label, merge,
/// terminator and whichever instructions define values that are still
/// needed. Every other dead block is deleted outright.
///
/// Result ids and labels that no longer exist afterwards are added to
/// `killed`. Returns whether the function was modified.
pub fn eliminate_unreachable_blocks(func: &mut Function, killed: &mut SaHashSet<Id>) -> bool {
    let reachable = compute_reachable(func);
    let dead: SmallVec<[Block; 8]> = func.blocks().filter(|&bb| !reachable.contains(bb)).collect();

    if dead.is_empty() {
        return false;
    }

    let (retained, marked) = Retention::new(func, reachable, &dead).compute();
    let mut changed = false;

    for bb in dead {
        if !retained.contains(bb) {
            trace!(label = %func.block(bb).label(), "removing unreachable block");

            killed.insert(func.block(bb).label());
            kill_all_insts(func.block_mut(bb), killed);
            func.remove_block(bb);
            changed = true;

            continue;
        }

        let block = func.block_mut(bb);
        let before = block.insts().len();
        let mut i = 0;

        block.insts_mut().retain(|inst| {
            let keep = marked.contains(&(bb, i));

            if !keep {
                killed.extend(inst.result_id());
            }

            i += 1;

            keep
        });

        changed |= block.insts().len() != before;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    struct Diamond {
        module: Module,
        f: Func,
        entry: Block,
        dead: Block,
        merge: Block,
        dead_value: Id,
    }

    // %entry: OpBranch %merge
    // %dead:  %v = OpIAdd ...; OpBranch %merge
    // %merge: [optional phi]; OpReturn
    fn diamond(with_phi: bool) -> Diamond {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let int = mb.type_int(32, false);
        let one = mb.constant_u32(int, 1);
        let mut b = mb.define_function(void, fn_ty);

        let entry = b.create_block();
        let dead = b.create_block();
        let merge = b.create_block();

        b.switch_to(entry);
        b.branch(merge);

        b.switch_to(dead);
        let dead_value = b.value(Opcode::IAdd, int, [Operand::Id(one), Operand::Id(one)]);
        b.value(Opcode::IMul, int, [Operand::Id(one), Operand::Id(one)]);
        b.branch(merge);

        b.switch_to(merge);

        if with_phi {
            b.phi(int, &[(one, entry), (dead_value, dead)]);
        }

        b.ret();

        let f = b.define();

        Diamond {
            module: mb.finish(),
            f,
            entry,
            dead,
            merge,
            dead_value,
        }
    }

    #[test]
    fn unreferenced_dead_blocks_are_removed() {
        let Diamond {
            mut module,
            f,
            entry,
            dead,
            merge,
            dead_value,
        } = diamond(false);
        let func = module.function_mut(f);
        let dead_label = func.block(dead).label();
        let mut killed = SaHashSet::default();

        assert!(eliminate_unreachable_blocks(func, &mut killed));
        assert!(func.blocks().eq([entry, merge]));
        assert!(!func.is_block_inserted(dead));
        assert!(killed.contains(&dead_label));
        assert!(killed.contains(&dead_value));
        assert_eq!(killed.len(), 3);

        // nothing left to do
        assert!(!eliminate_unreachable_blocks(func, &mut killed));
    }

    #[test]
    fn phi_references_retain_blocks_and_values() {
        let Diamond {
            mut module,
            f,
            dead,
            dead_value,
            ..
        } = diamond(true);
        let func = module.function_mut(f);
        let mut killed = SaHashSet::default();

        assert!(eliminate_unreachable_blocks(func, &mut killed));
        assert!(func.is_block_inserted(dead));

        let insts = func.block(dead).insts();

        // the unused `OpIMul` is gone, the phi's value and the branch stay
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].result_id(), Some(dead_value));
        assert_eq!(insts[1].opcode(), Opcode::Branch);
        assert_eq!(killed.len(), 1);
        assert!(!killed.contains(&dead_value));

        assert!(!eliminate_unreachable_blocks(func, &mut killed));
    }

    #[test]
    fn merge_declarations_retain_blocks() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        // the merge of the selection in %entry is never branched to, but it's
        // still named by a live merge declaration so it has to stay
        let entry = b.create_block();
        let a = b.create_block();
        let c = b.create_block();
        let merge = b.create_block();

        b.switch_to(entry);
        b.selection_merge(merge);
        b.branch_conditional(cond, a, c);

        b.switch_to(a);
        b.ret();

        b.switch_to(c);
        b.ret();

        b.switch_to(merge);
        b.unreachable();

        let f = b.define();
        let mut module = mb.finish();
        let func = module.function_mut(f);
        let mut killed = SaHashSet::default();

        assert!(!eliminate_unreachable_blocks(func, &mut killed));
        assert!(func.is_block_inserted(merge));
        assert_eq!(func.block(merge).insts(), &[Instruction::unreachable()]);
        assert!(killed.is_empty());
    }

    #[test]
    fn references_between_dead_blocks_do_not_retain() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let mut b = mb.define_function(void, fn_ty);

        let entry = b.create_block();
        let d1 = b.create_block();
        let d2 = b.create_block();

        b.switch_to(entry);
        b.ret();

        b.switch_to(d1);
        b.branch(d2);

        b.switch_to(d2);
        b.branch(d1);

        let f = b.define();
        let mut module = mb.finish();
        let func = module.function_mut(f);
        let mut killed = SaHashSet::default();

        assert!(eliminate_unreachable_blocks(func, &mut killed));
        assert!(func.blocks().eq([entry]));
    }

    #[test]
    fn non_phi_references() {
        let Diamond {
            module,
            f,
            entry,
            dead,
            merge,
            ..
        } = diamond(true);
        let func = module.function(f);
        let reachable = compute_reachable(func);
        let merge_label = func.block(merge).label();
        let dead_label = func.block(dead).label();

        // only the phi in %merge names %dead
        assert!(!has_non_phi_ref(func, dead_label, &reachable, None));
        assert!(has_non_phi_ref(func, merge_label, &reachable, None));
        assert!(!has_non_phi_ref(func, merge_label, &reachable, Some(entry)));
    }

    #[test]
    fn kill_records_results() {
        let Diamond {
            mut module,
            f,
            dead,
            dead_value,
            ..
        } = diamond(false);
        let mut killed = SaHashSet::default();
        let bb = module.function_mut(f).block_mut(dead);

        kill_all_insts(bb, &mut killed);

        assert!(bb.is_empty());
        assert!(killed.contains(&dead_value));
        assert_eq!(killed.len(), 2);
    }
}
