//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::Id;
use smallvec::{smallvec, SmallVec};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The operation performed by an [`Instruction`].
///
/// The discriminants are the opcode numbers of the binary format, the set
/// of opcodes is the subset that the IR layer and the passes in this crate
/// actually need to tell apart.
#[allow(missing_docs)]
#[repr(u16)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    Nop = 0,
    Undef = 1,
    Source = 3,
    Name = 5,
    MemberName = 6,
    String = 7,
    Line = 8,
    Extension = 10,
    ExtInstImport = 11,
    ExtInst = 12,
    MemoryModel = 14,
    EntryPoint = 15,
    ExecutionMode = 16,
    Capability = 17,
    TypeVoid = 19,
    TypeBool = 20,
    TypeInt = 21,
    TypeFloat = 22,
    TypeVector = 23,
    TypeStruct = 30,
    TypePointer = 32,
    TypeFunction = 33,
    ConstantTrue = 41,
    ConstantFalse = 42,
    Constant = 43,
    ConstantComposite = 44,
    ConstantNull = 46,
    SpecConstantTrue = 48,
    SpecConstantFalse = 49,
    SpecConstant = 50,
    Function = 54,
    FunctionParameter = 55,
    FunctionEnd = 56,
    FunctionCall = 57,
    Variable = 59,
    Load = 61,
    Store = 62,
    AccessChain = 65,
    Decorate = 71,
    MemberDecorate = 72,
    DecorationGroup = 73,
    GroupDecorate = 74,
    GroupMemberDecorate = 75,
    CompositeExtract = 81,
    IAdd = 128,
    FAdd = 129,
    ISub = 130,
    IMul = 132,
    LogicalOr = 166,
    LogicalAnd = 167,
    LogicalNot = 168,
    Select = 169,
    IEqual = 170,
    INotEqual = 171,
    SLessThan = 177,
    FOrdLessThan = 184,
    Phi = 245,
    LoopMerge = 246,
    SelectionMerge = 247,
    Label = 248,
    Branch = 249,
    BranchConditional = 250,
    Switch = 251,
    Kill = 252,
    Return = 253,
    ReturnValue = 254,
    Unreachable = 255,
}

impl Opcode {
    /// Checks if the opcode ends a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Branch
                | Opcode::BranchConditional
                | Opcode::Switch
                | Opcode::Kill
                | Opcode::Return
                | Opcode::ReturnValue
                | Opcode::Unreachable
        )
    }

    /// Checks if the opcode is a structured merge declaration.
    pub fn is_merge(self) -> bool {
        matches!(self, Opcode::SelectionMerge | Opcode::LoopMerge)
    }

    /// Checks if the opcode is phi-like, i.e. it names blocks without
    /// creating an edge to them.
    pub fn is_phi(self) -> bool {
        self == Opcode::Phi
    }

    /// Checks if the opcode lives in the annotation section.
    pub fn is_decoration(self) -> bool {
        matches!(
            self,
            Opcode::Decorate
                | Opcode::MemberDecorate
                | Opcode::DecorationGroup
                | Opcode::GroupDecorate
                | Opcode::GroupMemberDecorate
        )
    }

    /// Checks if the opcode lives in the debug section.
    pub fn is_debug(self) -> bool {
        matches!(
            self,
            Opcode::Source | Opcode::Name | Opcode::MemberName | Opcode::String
        )
    }

    /// Checks if the opcode declares a type.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Opcode::TypeVoid
                | Opcode::TypeBool
                | Opcode::TypeInt
                | Opcode::TypeFloat
                | Opcode::TypeVector
                | Opcode::TypeStruct
                | Opcode::TypePointer
                | Opcode::TypeFunction
        )
    }

    /// Checks if the opcode declares a constant, including specialization
    /// constants (whose value is not known until specialization).
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            Opcode::ConstantTrue
                | Opcode::ConstantFalse
                | Opcode::Constant
                | Opcode::ConstantComposite
                | Opcode::ConstantNull
                | Opcode::SpecConstantTrue
                | Opcode::SpecConstantFalse
                | Opcode::SpecConstant
        )
    }
}

/// A single operand of an [`Instruction`].
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// A reference to some other result in the module.
    Id(Id),
    /// A single-word literal number (or enumerant).
    Literal(u32),
    /// A literal string.
    String(String),
}

impl Operand {
    /// Gets the id if the operand is an id.
    pub fn as_id(&self) -> Option<Id> {
        match self {
            Operand::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Gets the literal word if the operand is a literal.
    pub fn as_literal(&self) -> Option<u32> {
        match self {
            Operand::Literal(word) => Some(*word),
            _ => None,
        }
    }

    /// Gets the string if the operand is a literal string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Id> for Operand {
    fn from(id: Id) -> Self {
        Operand::Id(id)
    }
}

/// Models one instruction of the IR.
///
/// Instructions have an opcode, an optional result type, an optional result
/// id, and an ordered list of operands. Block labels are not instructions
/// here, they are the identity of a [`BasicBlock`](crate::ir::BasicBlock).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    opcode: Opcode,
    type_id: Option<Id>,
    result_id: Option<Id>,
    operands: SmallVec<[Operand; 3]>,
}

impl Instruction {
    /// Creates an arbitrary instruction.
    pub fn new<I>(opcode: Opcode, type_id: Option<Id>, result_id: Option<Id>, operands: I) -> Self
    where
        I: IntoIterator<Item = Operand>,
    {
        Self {
            opcode,
            type_id,
            result_id,
            operands: operands.into_iter().collect(),
        }
    }

    /// `OpBranch %target`
    pub fn branch(target: Id) -> Self {
        Self::new(Opcode::Branch, None, None, [Operand::Id(target)])
    }

    /// `OpBranchConditional %cond %if_true %if_false`
    pub fn branch_conditional(cond: Id, if_true: Id, if_false: Id) -> Self {
        Self::new(
            Opcode::BranchConditional,
            None,
            None,
            [
                Operand::Id(cond),
                Operand::Id(if_true),
                Operand::Id(if_false),
            ],
        )
    }

    /// `OpSwitch %selector %default [literal %label]*`
    pub fn switch(selector: Id, default: Id, cases: &[(u32, Id)]) -> Self {
        let mut operands: SmallVec<[Operand; 3]> =
            smallvec![Operand::Id(selector), Operand::Id(default)];

        for &(value, label) in cases {
            operands.push(Operand::Literal(value));
            operands.push(Operand::Id(label));
        }

        Self {
            opcode: Opcode::Switch,
            type_id: None,
            result_id: None,
            operands,
        }
    }

    /// `OpSelectionMerge %merge None`
    pub fn selection_merge(merge: Id) -> Self {
        Self::new(
            Opcode::SelectionMerge,
            None,
            None,
            [Operand::Id(merge), Operand::Literal(0)],
        )
    }

    /// `OpLoopMerge %merge %continue None`
    pub fn loop_merge(merge: Id, continue_target: Id) -> Self {
        Self::new(
            Opcode::LoopMerge,
            None,
            None,
            [
                Operand::Id(merge),
                Operand::Id(continue_target),
                Operand::Literal(0),
            ],
        )
    }

    /// `%result = OpPhi %ty [%value %parent]*`
    pub fn phi(ty: Id, result: Id, incoming: &[(Id, Id)]) -> Self {
        Self::new(
            Opcode::Phi,
            Some(ty),
            Some(result),
            incoming
                .iter()
                .flat_map(|&(value, parent)| [Operand::Id(value), Operand::Id(parent)]),
        )
    }

    /// `OpReturn`
    pub fn ret() -> Self {
        Self::new(Opcode::Return, None, None, [])
    }

    /// `OpUnreachable`
    pub fn unreachable() -> Self {
        Self::new(Opcode::Unreachable, None, None, [])
    }

    /// Gets the opcode of the instruction.
    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Gets the result type, if the instruction has one.
    #[inline]
    pub fn type_id(&self) -> Option<Id> {
        self.type_id
    }

    /// Gets the result id, if the instruction has one.
    #[inline]
    pub fn result_id(&self) -> Option<Id> {
        self.result_id
    }

    /// Gets the operands of the instruction.
    #[inline]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Gets the operand at `index` if it's an id.
    pub fn id_operand(&self, index: usize) -> Option<Id> {
        self.operands.get(index).and_then(Operand::as_id)
    }

    /// Gets the operand at `index` if it's a literal word.
    pub fn literal_operand(&self, index: usize) -> Option<u32> {
        self.operands.get(index).and_then(Operand::as_literal)
    }

    /// Gets the operand at `index` if it's a literal string.
    pub fn string_operand(&self, index: usize) -> Option<&str> {
        self.operands.get(index).and_then(Operand::as_str)
    }

    /// Returns every id the instruction references, the result type included.
    pub fn uses(&self) -> impl Iterator<Item = Id> + '_ {
        self.type_id
            .into_iter()
            .chain(self.operands.iter().filter_map(Operand::as_id))
    }

    /// Checks if `id` is referenced anywhere by the instruction.
    pub fn references(&self, id: Id) -> bool {
        self.uses().any(|used| used == id)
    }

    /// Replaces every id operand equal to `old` with `new`. Returns whether
    /// anything was replaced.
    pub fn replace_uses(&mut self, old: Id, new: Id) -> bool {
        let mut replaced = false;

        for operand in self.operands.iter_mut() {
            if let Operand::Id(id) = operand {
                if *id == old {
                    *id = new;
                    replaced = true;
                }
            }
        }

        replaced
    }

    /// Returns the labels this instruction can transfer control to. This
    /// is empty for anything that isn't a branching terminator.
    pub fn branch_targets(&self) -> SmallVec<[Id; 2]> {
        match self.opcode {
            Opcode::Branch => self.id_operand(0).into_iter().collect(),
            Opcode::BranchConditional => self.operands[1..]
                .iter()
                .take(2)
                .filter_map(Operand::as_id)
                .collect(),
            // selector, default, then (literal, label) pairs
            Opcode::Switch => self
                .id_operand(1)
                .into_iter()
                .chain(self.operands.iter().skip(3).step_by(2).filter_map(Operand::as_id))
                .collect(),
            _ => SmallVec::new(),
        }
    }

    /// For a merge declaration, returns the merge block and (for a loop merge)
    /// the continue target.
    pub fn merge_targets(&self) -> Option<(Id, Option<Id>)> {
        match self.opcode {
            Opcode::SelectionMerge => Some((self.id_operand(0)?, None)),
            Opcode::LoopMerge => Some((self.id_operand(0)?, Some(self.id_operand(1)?))),
            _ => None,
        }
    }

    /// For a phi, returns the `(value, parent)` pairs in order.
    pub fn phi_incoming(&self) -> impl Iterator<Item = (Id, Id)> + '_ {
        debug_assert!(self.opcode.is_phi());

        self.operands
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_id()?, pair[1].as_id()?)))
    }

    /// Keeps only the `(value, parent)` pairs of a phi for which `keep` returns
    /// true. Returns how many pairs were dropped.
    pub fn retain_phi_incoming<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(Id, Id) -> bool,
    {
        debug_assert!(self.opcode.is_phi());

        let before = self.operands.len() / 2;
        let kept: SmallVec<[Operand; 3]> = self
            .operands
            .chunks_exact(2)
            .filter(|pair| match (pair[0].as_id(), pair[1].as_id()) {
                (Some(value), Some(parent)) => keep(value, parent),
                _ => true,
            })
            .flat_map(|pair| pair.iter().cloned())
            .collect();

        self.operands = kept;

        before - self.operands.len() / 2
    }

    /// Appends a `(value, parent)` pair to a phi.
    pub fn push_phi_incoming(&mut self, value: Id, parent: Id) {
        debug_assert!(self.opcode.is_phi());

        self.operands.push(Operand::Id(value));
        self.operands.push(Operand::Id(parent));
    }
}
