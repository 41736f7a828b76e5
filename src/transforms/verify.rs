//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{compute_reachable, ControlFlowGraph};
use crate::ir::*;
use crate::pass::*;
use crate::utility::SaHashSet;
use thiserror::Error;
use tracing::error;

/// A single structural problem found in a module.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Error)]
pub enum VerifyError {
    /// A block doesn't end in a terminator.
    #[error("block {block} does not end in a terminator")]
    MissingTerminator {
        /// The label of the block.
        block: Id,
    },
    /// A terminator appears somewhere other than the end of a block.
    #[error("block {block} has a terminator before its last instruction")]
    MisplacedTerminator {
        /// The label of the block.
        block: Id,
    },
    /// A merge declaration isn't immediately before the terminator.
    #[error("block {block} has a merge declaration that isn't right before its terminator")]
    MisplacedMerge {
        /// The label of the block.
        block: Id,
    },
    /// An `OpSelectionMerge` is followed by something other than a
    /// conditional branch or a switch.
    #[error("selection merge in {block} must be followed by `OpBranchConditional` or `OpSwitch`")]
    SelectionMergeWithoutBranch {
        /// The label of the block.
        block: Id,
    },
    /// An `OpLoopMerge` is followed by something other than a branch or a
    /// conditional branch.
    #[error("loop merge in {block} must be followed by `OpBranch` or `OpBranchConditional`")]
    LoopMergeWithoutBranch {
        /// The label of the block.
        block: Id,
    },
    /// A branch, merge declaration or phi names a label that isn't a block of
    /// the function.
    #[error("{block} refers to {label}, which is not a block in the function")]
    UnknownLabel {
        /// The label of the block containing the reference.
        block: Id,
        /// The label that was referenced.
        label: Id,
    },
    /// The entry block of a function is the target of a branch.
    #[error("entry block {block} is the target of a branch")]
    EntryIsBranchTarget {
        /// The label of the entry block.
        block: Id,
    },
    /// An id is not below the id bound of the module.
    #[error("{id} is not below the id bound {bound}")]
    IdOutOfBounds {
        /// The offending id.
        id: Id,
        /// The bound of the module.
        bound: u32,
    },
    /// The same result id is defined more than once.
    #[error("{id} is defined more than once")]
    DuplicateResult {
        /// The offending id.
        id: Id,
    },
    /// A phi comes after a non-phi instruction in its block.
    #[error("phi {phi} in {block} is not at the start of its block")]
    MisplacedPhi {
        /// The label of the block.
        block: Id,
        /// The result of the phi.
        phi: Id,
    },
    /// A phi in a reachable block names a parent that doesn't branch to it.
    #[error("phi {phi} in {block} names {parent}, which is not a predecessor")]
    PhiParentNotPredecessor {
        /// The label of the block.
        block: Id,
        /// The result of the phi.
        phi: Id,
        /// The parent that isn't a predecessor.
        parent: Id,
    },
    /// A predecessor of a reachable block has no operand in one of its phis.
    #[error("phi {phi} in {block} has no operand for predecessor {pred}")]
    PhiMissingPredecessor {
        /// The label of the block.
        block: Id,
        /// The result of the phi.
        phi: Id,
        /// The predecessor without an operand.
        pred: Id,
    },
    /// An id is used, but nothing in the module defines it.
    #[error("{id} is used but never defined")]
    UndefinedId {
        /// The id.
        id: Id,
    },
}

/// A pass that checks the structural rules of the IR, and fails if any of
/// them are broken. It never modifies the module.
pub struct VerifyModulePass;

impl ModuleTransformPass for VerifyModulePass {
    fn name(&self) -> &'static str {
        "verify"
    }

    fn run(&mut self, module: &mut Module) -> Status {
        match verify_module(module) {
            Ok(()) => Status::SuccessWithoutChange,
            Err(errors) => {
                for err in errors.iter() {
                    error!(%err, "module failed verification");
                }

                Status::Failure
            }
        }
    }
}

/// Verifies the structural rules of an entire module.
///
/// This checks that every block is made up of phis, a body, an optional merge
/// declaration and exactly one terminator in that order, that every label
/// that is referenced is actually a block, that result ids are unique and
/// below the bound, that every used id is defined somewhere, and that the
/// phis of reachable blocks have exactly one operand per predecessor.
///
/// The phis of unreachable blocks are not checked against the predecessors.
pub fn verify_module(module: &Module) -> Result<(), Vec<VerifyError>> {
    let mut verifier = Verifier {
        module,
        errors: Vec::default(),
        defined: SaHashSet::default(),
        used: Vec::default(),
        unknown_labels: SaHashSet::default(),
    };

    verifier.walk();

    if verifier.errors.is_empty() {
        Ok(())
    } else {
        Err(verifier.errors)
    }
}

macro_rules! verify_assert {
    ($self:expr, $cond:expr, $error:expr) => {
        if !($cond) {
            $self.errors.push($error);
        }
    };
}

struct Verifier<'m> {
    module: &'m Module,
    errors: Vec<VerifyError>,
    defined: SaHashSet<Id>,
    // in order of first use, forward references are legal
    used: Vec<Id>,
    unknown_labels: SaHashSet<Id>,
}

impl<'m> Verifier<'m> {
    fn walk(&mut self) {
        let module = self.module;
        let globals = module
            .capabilities()
            .iter()
            .chain(module.extension_insts())
            .chain(module.ext_inst_imports())
            .chain(module.memory_model())
            .chain(module.entry_points())
            .chain(module.execution_modes())
            .chain(module.debug())
            .chain(module.annotations())
            .chain(module.types_values());

        for inst in globals {
            self.visit_inst(inst);
        }

        for func in module.functions() {
            self.visit_func(module.function(func));
        }

        self.check_uses_defined();
    }

    fn check_uses_defined(&mut self) {
        let mut reported = SaHashSet::default();

        for id in std::mem::take(&mut self.used) {
            // labels that aren't blocks were already reported
            if self.defined.contains(&id) || self.unknown_labels.contains(&id) {
                continue;
            }

            if reported.insert(id) {
                self.errors.push(VerifyError::UndefinedId { id });
            }
        }
    }

    fn visit_func(&mut self, func: &Function) {
        self.visit_inst(func.def());

        for param in func.params() {
            self.visit_inst(param);
        }

        let entry = match func.entry_block() {
            Some(bb) => bb,
            None => return,
        };

        let cfg = ControlFlowGraph::compute(func);
        let reachable = compute_reachable(func);

        verify_assert!(
            self,
            cfg.predecessors(entry).next().is_none(),
            VerifyError::EntryIsBranchTarget {
                block: func.block(entry).label()
            }
        );

        for block in func.blocks() {
            self.visit_block(func, block);

            if reachable.contains(block) {
                self.visit_phis(func, &cfg, block);
            }
        }
    }

    fn visit_block(&mut self, func: &Function, block: Block) {
        let bb = func.block(block);
        let label = bb.label();
        let insts = bb.insts();

        self.define(label);

        for (i, inst) in insts.iter().enumerate() {
            self.visit_inst(inst);

            let is_last = i + 1 == insts.len();
            let before_last = i + 2 == insts.len();

            verify_assert!(
                self,
                !inst.opcode().is_terminator() || is_last,
                VerifyError::MisplacedTerminator { block: label }
            );

            verify_assert!(
                self,
                !inst.opcode().is_merge() || before_last,
                VerifyError::MisplacedMerge { block: label }
            );

            if let Some(phi) = inst.result_id().filter(|_| inst.opcode().is_phi()) {
                let after_body = insts[..i].iter().any(|prev| !prev.opcode().is_phi());

                verify_assert!(
                    self,
                    !after_body,
                    VerifyError::MisplacedPhi { block: label, phi }
                );
            }

            for target in self.block_refs(inst) {
                if func.block_by_label(target).is_none() {
                    self.unknown_labels.insert(target);
                    self.errors.push(VerifyError::UnknownLabel {
                        block: label,
                        label: target,
                    });
                }
            }
        }

        let term = match bb.terminator() {
            Some(term) => term,
            None => {
                self.errors
                    .push(VerifyError::MissingTerminator { block: label });

                return;
            }
        };

        match bb.merge_inst().map(Instruction::opcode) {
            Some(Opcode::SelectionMerge) => verify_assert!(
                self,
                matches!(term.opcode(), Opcode::BranchConditional | Opcode::Switch),
                VerifyError::SelectionMergeWithoutBranch { block: label }
            ),
            Some(Opcode::LoopMerge) => verify_assert!(
                self,
                matches!(term.opcode(), Opcode::Branch | Opcode::BranchConditional),
                VerifyError::LoopMergeWithoutBranch { block: label }
            ),
            _ => {}
        }
    }

    fn visit_phis(&mut self, func: &Function, cfg: &ControlFlowGraph, block: Block) {
        let bb = func.block(block);

        for phi in bb.phis() {
            let result = match phi.result_id() {
                Some(id) => id,
                None => continue,
            };

            for (_, parent) in phi.phi_incoming() {
                // unknown labels are reported by `visit_block`
                let is_pred = func
                    .block_by_label(parent)
                    .map_or(true, |pred| cfg.is_pred_of(block, pred));

                verify_assert!(
                    self,
                    is_pred,
                    VerifyError::PhiParentNotPredecessor {
                        block: bb.label(),
                        phi: result,
                        parent
                    }
                );
            }

            for pred in cfg.predecessors(block) {
                let pred = func.block(pred).label();

                verify_assert!(
                    self,
                    phi.phi_incoming().any(|(_, parent)| parent == pred),
                    VerifyError::PhiMissingPredecessor {
                        block: bb.label(),
                        phi: result,
                        pred
                    }
                );
            }
        }
    }

    fn visit_inst(&mut self, inst: &Instruction) {
        if let Some(result) = inst.result_id() {
            self.define(result);
        }

        for id in inst.uses() {
            self.check_bound(id);
            self.used.push(id);
        }
    }

    fn define(&mut self, id: Id) {
        self.check_bound(id);

        verify_assert!(
            self,
            self.defined.insert(id),
            VerifyError::DuplicateResult { id }
        );
    }

    fn check_bound(&mut self, id: Id) {
        let bound = self.module.id_bound();

        verify_assert!(
            self,
            id.word() < bound,
            VerifyError::IdOutOfBounds { id, bound }
        );
    }

    // every label an instruction names: branch targets, merge targets and
    // phi parents
    fn block_refs(&self, inst: &Instruction) -> Vec<Id> {
        let mut refs: Vec<Id> = inst.branch_targets().into_iter().collect();

        if let Some((merge, cont)) = inst.merge_targets() {
            refs.push(merge);
            refs.extend(cont);
        }

        if inst.opcode().is_phi() {
            refs.extend(inst.phi_incoming().map(|(_, parent)| parent));
        }

        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn if_else() -> (Module, Func, [Block; 4]) {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let bool_ty = mb.type_bool();
        let cond = mb.undef(bool_ty);
        let mut b = mb.define_function(void, fn_ty);

        let a = b.create_block();
        let t = b.create_block();
        let f = b.create_block();
        let m = b.create_block();

        b.switch_to(a);
        b.selection_merge(m);
        b.branch_conditional(cond, t, f);

        b.switch_to(t);
        b.branch(m);

        b.switch_to(f);
        b.branch(m);

        b.switch_to(m);
        b.ret();

        let func = b.define();

        (mb.finish(), func, [a, t, f, m])
    }

    #[test]
    fn well_formed_module() {
        let (module, _, _) = if_else();
        let mut pass = VerifyModulePass;
        let mut copy = module.clone();

        assert_eq!(verify_module(&module), Ok(()));
        assert_eq!(pass.run(&mut copy), Status::SuccessWithoutChange);
    }

    #[test]
    fn missing_terminator() {
        let (mut module, f, [_, t, _, _]) = if_else();
        let bb = module.function_mut(f).block_mut(t);
        let label = bb.label();

        bb.pop();

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::MissingTerminator { block: label }])
        );
        assert_eq!(VerifyModulePass.run(&mut module), Status::Failure);
    }

    #[test]
    fn selection_merge_needs_conditional() {
        let (mut module, f, [a, t, _, _]) = if_else();
        let func = module.function_mut(f);
        let t_label = func.block(t).label();
        let bb = func.block_mut(a);
        let label = bb.label();

        bb.pop();
        bb.push(Instruction::branch(t_label));

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::SelectionMergeWithoutBranch { block: label }])
        );
    }

    #[test]
    fn removed_blocks_are_unknown_labels() {
        let (mut module, f, [a, _, fb, _]) = if_else();
        let func = module.function_mut(f);
        let (a_label, f_label) = (func.block(a).label(), func.block(fb).label());

        func.remove_block(fb);

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::UnknownLabel {
                block: a_label,
                label: f_label
            }])
        );
    }

    #[test]
    fn ids_must_be_unique_and_bounded() {
        let (mut module, f, [_, t, _, _]) = if_else();
        let bound = module.id_bound();
        let bb = module.function_mut(f).block_mut(t);
        let label = bb.label();
        let branch = bb.pop().unwrap();

        bb.push(Instruction::new(Opcode::Undef, Some(Id::new(bound)), Some(label), []));
        bb.push(branch);

        assert_eq!(
            verify_module(&module),
            Err(vec![
                VerifyError::DuplicateResult { id: label },
                VerifyError::IdOutOfBounds {
                    id: Id::new(bound),
                    bound
                },
                VerifyError::UndefinedId { id: Id::new(bound) },
            ])
        );
    }

    #[test]
    fn phis_must_name_predecessors() {
        let (mut module, f, [a, t, fb, m]) = if_else();
        let bound = module.id_bound();
        let func = module.function_mut(f);
        let (a_label, m_label) = (func.block(a).label(), func.block(m).label());
        let (t_label, f_label) = (func.block(t).label(), func.block(fb).label());
        let phi = Id::new(bound);
        let ty = Id::new(1);

        func.block_mut(m).insts_mut().insert(
            0,
            Instruction::phi(ty, phi, &[(ty, a_label), (ty, t_label), (ty, f_label)]),
        );
        module.set_id_bound(bound + 1);

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::PhiParentNotPredecessor {
                block: m_label,
                phi,
                parent: a_label
            }])
        );
    }

    #[test]
    fn phis_must_cover_every_predecessor() {
        let (mut module, f, [_, t, fb, m]) = if_else();
        let bound = module.id_bound();
        let func = module.function_mut(f);
        let (t_label, f_label, m_label) = (
            func.block(t).label(),
            func.block(fb).label(),
            func.block(m).label(),
        );
        let phi = Id::new(bound);
        let ty = Id::new(1);

        func.block_mut(m)
            .insts_mut()
            .insert(0, Instruction::phi(ty, phi, &[(ty, t_label)]));
        module.set_id_bound(bound + 1);

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::PhiMissingPredecessor {
                block: m_label,
                phi,
                pred: f_label
            }])
        );
    }

    #[test]
    fn uses_must_be_defined() {
        let (mut module, f, [_, t, _, _]) = if_else();
        let bound = module.id_bound();
        let ty = Id::new(1);
        let (missing, result) = (Id::new(bound), Id::new(bound + 1));
        let bb = module.function_mut(f).block_mut(t);
        let branch = bb.pop().unwrap();

        bb.push(Instruction::new(
            Opcode::IAdd,
            Some(ty),
            Some(result),
            [Operand::Id(missing), Operand::Id(missing)],
        ));
        bb.push(branch);
        module.set_id_bound(bound + 2);

        assert_eq!(
            verify_module(&module),
            Err(vec![VerifyError::UndefinedId { id: missing }])
        );
    }

    #[test]
    fn forward_references_are_defined() {
        let mut mb = ModuleBuilder::shader();
        let void = mb.type_void();
        let fn_ty = mb.type_function(void, &[]);
        let int = mb.type_int(32, false);
        let one = mb.constant_u32(int, 1);
        let mut b = mb.define_function(void, fn_ty);

        // the loop header's phi uses a value defined later in the layout
        let entry = b.create_block();
        let h = b.create_block();
        let c = b.create_block();
        let x = b.create_block();

        b.switch_to(entry);
        b.branch(h);

        b.switch_to(c);
        let next = b.value(Opcode::IAdd, int, [Operand::Id(one), Operand::Id(one)]);
        b.branch(h);

        b.switch_to(h);
        b.phi(int, &[(one, entry), (next, c)]);
        b.loop_merge(x, c);
        b.branch(c);

        b.switch_to(x);
        b.ret();

        b.define();

        assert_eq!(verify_module(&mb.finish()), Ok(()));
    }
}
