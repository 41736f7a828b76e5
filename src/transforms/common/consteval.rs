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
use crate::utility::{SaHashMap, SaHashSet};

/// Resolves branch conditions into compile-time values.
///
/// This is a snapshot of the literal boolean and 32-bit integer constants of
/// a module, taken once before any function is processed. It deliberately
/// knows nothing about computed values: specialization constants, undefs and
/// anything computed by an instruction (even `OpLogicalNot %true`) are all
/// unresolved.
///
/// ```none
/// %bool = OpTypeBool
/// %int  = OpTypeInt 32 0
/// %1    = OpConstantTrue %bool   ; resolves to `true`
/// %2    = OpConstant %int 7      ; resolves to `7`
/// %3    = OpConstantNull %int    ; resolves to `0`
/// %4    = OpSpecConstantTrue %bool ; unresolved
/// ```
///
/// The table is also the place where new constants (and undefs) are created
/// when a rewrite needs one. Those are queued, and must be moved into the module with
/// [`Self::take_new_globals`] once the functions are done.
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    bools: SaHashMap<Id, bool>,
    ints: SaHashMap<Id, u32>,
    bool_ty: Option<Id>,
    true_const: Option<Id>,
    // type -> `OpUndef` of that type
    undefs: SaHashMap<Id, Id>,
    new_globals: Vec<Instruction>,
}

impl ConstantTable {
    /// Snapshots the constants of `module`.
    pub fn from_module(module: &Module) -> Self {
        let mut table = Self::default();
        let mut int32_tys = SaHashSet::default();

        for inst in module.types_values() {
            let result = match inst.result_id() {
                Some(id) => id,
                None => continue,
            };

            match inst.opcode() {
                Opcode::TypeBool => {
                    table.bool_ty.get_or_insert(result);
                }
                Opcode::TypeInt => {
                    if inst.literal_operand(0) == Some(32) {
                        int32_tys.insert(result);
                    }
                }
                Opcode::ConstantTrue => {
                    table.bools.insert(result, true);
                    table.true_const.get_or_insert(result);
                }
                Opcode::ConstantFalse => {
                    table.bools.insert(result, false);
                }
                Opcode::Constant | Opcode::ConstantNull => {
                    let is_i32 = inst
                        .type_id()
                        .map_or(false, |ty| int32_tys.contains(&ty));

                    if !is_i32 {
                        continue;
                    }

                    // `OpConstantNull` has no operands and is defined as zero
                    let value = match inst.opcode() {
                        Opcode::Constant => inst.literal_operand(0),
                        _ => Some(0),
                    };

                    if let Some(value) = value {
                        table.ints.insert(result, value);
                    }
                }
                Opcode::Undef => {
                    if let Some(ty) = inst.type_id() {
                        table.undefs.entry(ty).or_insert(result);
                    }
                }
                _ => {}
            }
        }

        table
    }

    /// Resolves `id` to a boolean if it names `OpConstantTrue`/`OpConstantFalse`.
    pub fn resolve_bool_condition(&self, id: Id) -> Option<bool> {
        self.bools.get(&id).copied()
    }

    /// Resolves `id` to an integer if it names an `OpConstant` or
    /// `OpConstantNull` of a 32-bit integer type.
    pub fn resolve_i32_constant(&self, id: Id) -> Option<u32> {
        self.ints.get(&id).copied()
    }

    /// Given a conditional branch or switch, returns the label that control
    /// will always go to, if the condition or selector is a known constant.
    pub fn taken_target(&self, branch: &Instruction) -> Option<Id> {
        match branch.opcode() {
            Opcode::BranchConditional => {
                let taken = if self.resolve_bool_condition(branch.id_operand(0)?)? {
                    1
                } else {
                    2
                };

                branch.id_operand(taken)
            }
            Opcode::Switch => {
                let value = self.resolve_i32_constant(branch.id_operand(0)?)?;
                let cases = branch.operands().get(2..).unwrap_or(&[]);

                // first matching case wins, otherwise it goes to the default
                cases
                    .chunks_exact(2)
                    .find(|case| case[0].as_literal() == Some(value))
                    .and_then(|case| case[1].as_id())
                    .or_else(|| branch.id_operand(1))
            }
            _ => None,
        }
    }

    /// Gets an `OpConstantTrue`, creating one (and an `OpTypeBool`, if the
    /// module has none) with ids from `ids` if it doesn't exist yet.
    pub fn true_constant(&mut self, ids: &mut IdAllocator) -> Id {
        if let Some(id) = self.true_const {
            return id;
        }

        let ty = match self.bool_ty {
            Some(ty) => ty,
            None => {
                let ty = ids.take_next_id();

                self.new_globals
                    .push(Instruction::new(Opcode::TypeBool, None, Some(ty), []));
                self.bool_ty = Some(ty);

                ty
            }
        };

        let id = ids.take_next_id();

        self.new_globals
            .push(Instruction::new(Opcode::ConstantTrue, Some(ty), Some(id), []));
        self.bools.insert(id, true);
        self.true_const = Some(id);

        id
    }

    /// Gets an `OpUndef` of type `ty`, creating one with an id from `ids` if
    /// the module doesn't have one yet.
    pub fn undef(&mut self, ty: Id, ids: &mut IdAllocator) -> Id {
        if let Some(&id) = self.undefs.get(&ty) {
            return id;
        }

        let id = ids.take_next_id();

        self.new_globals
            .push(Instruction::new(Opcode::Undef, Some(ty), Some(id), []));
        self.undefs.insert(ty, id);

        id
    }

    /// Takes every global created by the table so far, in definition order.
    pub fn take_new_globals(&mut self) -> Vec<Instruction> {
        std::mem::take(&mut self.new_globals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_only_literal_constants() {
        let mut mb = ModuleBuilder::shader();
        let bool_ty = mb.type_bool();
        let int = mb.type_int(32, true);
        let long = mb.type_int(64, false);
        let t = mb.constant_true(bool_ty);
        let f = mb.constant_false(bool_ty);
        let seven = mb.constant_u32(int, 7);
        let zero = mb.constant_null(int);
        let wide = mb.constant_u32(long, 3);
        let spec = mb.spec_constant_true(bool_ty);
        let undef = mb.undef(bool_ty);
        let table = ConstantTable::from_module(mb.module());

        assert_eq!(table.resolve_bool_condition(t), Some(true));
        assert_eq!(table.resolve_bool_condition(f), Some(false));
        assert_eq!(table.resolve_bool_condition(spec), None);
        assert_eq!(table.resolve_bool_condition(undef), None);
        assert_eq!(table.resolve_i32_constant(seven), Some(7));
        assert_eq!(table.resolve_i32_constant(zero), Some(0));
        assert_eq!(table.resolve_i32_constant(wide), None);
        assert_eq!(table.resolve_i32_constant(t), None);
    }

    #[test]
    fn switch_picks_matching_case_or_default() {
        let mut mb = ModuleBuilder::shader();
        let int = mb.type_int(32, false);
        let two = mb.constant_u32(int, 2);
        let nine = mb.constant_u32(int, 9);
        let table = ConstantTable::from_module(mb.module());
        let (default, a, b) = (Id::new(100), Id::new(101), Id::new(102));

        let on_two = Instruction::switch(two, default, &[(1, a), (2, b), (2, a)]);
        let on_nine = Instruction::switch(nine, default, &[(1, a), (2, b)]);

        assert_eq!(table.taken_target(&on_two), Some(b));
        assert_eq!(table.taken_target(&on_nine), Some(default));
    }

    #[test]
    fn conditional_picks_arm() {
        let mut mb = ModuleBuilder::shader();
        let bool_ty = mb.type_bool();
        let t = mb.constant_true(bool_ty);
        let f = mb.constant_false(bool_ty);
        let table = ConstantTable::from_module(mb.module());
        let (yes, no) = (Id::new(100), Id::new(101));

        assert_eq!(
            table.taken_target(&Instruction::branch_conditional(t, yes, no)),
            Some(yes)
        );
        assert_eq!(
            table.taken_target(&Instruction::branch_conditional(f, yes, no)),
            Some(no)
        );
        assert_eq!(table.taken_target(&Instruction::branch(yes)), None);
    }

    #[test]
    fn true_constant_is_synthesized_once() {
        let module = Module::new();
        let mut table = ConstantTable::from_module(&module);
        let mut ids = module.id_allocator();

        let t1 = table.true_constant(&mut ids);
        let t2 = table.true_constant(&mut ids);
        let globals = table.take_new_globals();

        assert_eq!(t1, t2);
        assert_eq!(globals.len(), 2);
        assert_eq!(globals[0].opcode(), Opcode::TypeBool);
        assert_eq!(globals[1].opcode(), Opcode::ConstantTrue);
        assert_eq!(globals[1].type_id(), globals[0].result_id());
        assert_eq!(table.resolve_bool_condition(t1), Some(true));
        assert_eq!(ids.bound(), 3);
    }

    #[test]
    fn undefs_are_reused_per_type() {
        let mut mb = ModuleBuilder::shader();
        let bool_ty = mb.type_bool();
        let int = mb.type_int(32, false);
        let existing = mb.undef(bool_ty);
        let module = mb.finish();
        let mut table = ConstantTable::from_module(&module);
        let mut ids = module.id_allocator();
        let bound = ids.bound();

        assert_eq!(table.undef(bool_ty, &mut ids), existing);

        let int_undef = table.undef(int, &mut ids);

        assert_eq!(int_undef, Id::new(bound));
        assert_eq!(table.undef(int, &mut ids), int_undef);
        assert_eq!(
            table.take_new_globals(),
            vec![Instruction::new(Opcode::Undef, Some(int), Some(int_undef), [])]
        );
        assert_eq!(ids.bound(), bound + 1);
    }
}
