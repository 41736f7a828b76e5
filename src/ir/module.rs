//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaMap;
use crate::ir::{Func, Function, Id, IdAllocator, Instruction, Opcode};
use crate::utility::SaHashSet;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The capabilities the passes in this crate need to be able to recognize.
///
/// Discriminants are the enumerant values of the binary format.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Capability {
    /// Matrix types.
    Matrix = 0,
    /// Graphics shaders. Control flow in these modules must be structured.
    Shader = 1,
    /// Geometry stage.
    Geometry = 2,
    /// Tessellation stages.
    Tessellation = 3,
    /// Physical addressing.
    Addresses = 4,
    /// Partially linked modules.
    Linkage = 5,
    /// OpenCL-style compute kernels.
    Kernel = 6,
    /// 64-bit floats.
    Float64 = 10,
    /// 64-bit integers.
    Int64 = 11,
    /// 16-bit integers.
    Int16 = 22,
}

/// Contains all the data necessary for a single module.
///
/// The module-level instructions are kept in the sections of the logical
/// layout, followed by the functions:
///
///   1. `OpCapability`
///   2. `OpExtension`
///   3. `OpExtInstImport`
///   4. `OpMemoryModel`
///   5. `OpEntryPoint`
///   6. `OpExecutionMode`
///   7. debug instructions (`OpName` and friends)
///   8. annotations (`OpDecorate` and friends)
///   9. types, constants and global variables
///
/// Every id referenced anywhere in the module is below [`Self::id_bound`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Module {
    capabilities: Vec<Instruction>,
    extensions: Vec<Instruction>,
    ext_inst_imports: Vec<Instruction>,
    memory_model: Option<Instruction>,
    entry_points: Vec<Instruction>,
    execution_modes: Vec<Instruction>,
    debug: Vec<Instruction>,
    annotations: Vec<Instruction>,
    types_values: Vec<Instruction>,
    functions: ArenaMap<Func, Function>,
    id_bound: u32,
}

impl Module {
    /// Creates a new, empty module with an id bound of `1`.
    pub fn new() -> Self {
        Self {
            capabilities: Vec::default(),
            extensions: Vec::default(),
            ext_inst_imports: Vec::default(),
            memory_model: None,
            entry_points: Vec::default(),
            execution_modes: Vec::default(),
            debug: Vec::default(),
            annotations: Vec::default(),
            types_values: Vec::default(),
            functions: ArenaMap::default(),
            id_bound: 1,
        }
    }

    /// Gets the `OpCapability` section.
    pub fn capabilities(&self) -> &[Instruction] {
        &self.capabilities
    }

    /// Checks if the module declares a given capability.
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities
            .iter()
            .any(|inst| inst.literal_operand(0) == Some(cap as u32))
    }

    /// Returns the names of every extension declared with `OpExtension`.
    pub fn extensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.extensions
            .iter()
            .filter_map(|inst| inst.string_operand(0))
    }

    /// Gets the `OpExtension` section.
    pub fn extension_insts(&self) -> &[Instruction] {
        &self.extensions
    }

    /// Gets the `OpExtInstImport` section.
    pub fn ext_inst_imports(&self) -> &[Instruction] {
        &self.ext_inst_imports
    }

    /// Gets the `OpMemoryModel`, if the module has one.
    pub fn memory_model(&self) -> Option<&Instruction> {
        self.memory_model.as_ref()
    }

    /// Gets the `OpEntryPoint` section.
    pub fn entry_points(&self) -> &[Instruction] {
        &self.entry_points
    }

    /// Returns the ids of the functions named by `OpEntryPoint`s, in order.
    pub fn entry_point_functions(&self) -> impl Iterator<Item = Id> + '_ {
        self.entry_points
            .iter()
            .filter_map(|inst| inst.id_operand(1))
    }

    /// Gets the `OpExecutionMode` section.
    pub fn execution_modes(&self) -> &[Instruction] {
        &self.execution_modes
    }

    /// Gets the debug section (names, strings, sources).
    pub fn debug(&self) -> &[Instruction] {
        &self.debug
    }

    /// Gets the annotation section (decorations).
    pub fn annotations(&self) -> &[Instruction] {
        &self.annotations
    }

    /// Gets the types, constants and global variables of the module.
    pub fn types_values(&self) -> &[Instruction] {
        &self.types_values
    }

    /// Finds the module-level instruction (type, constant or global) that
    /// defines `id`.
    pub fn def(&self, id: Id) -> Option<&Instruction> {
        self.types_values
            .iter()
            .find(|inst| inst.result_id() == Some(id))
    }

    /// Checks if any annotation uses a given opcode.
    pub fn has_annotation(&self, opcode: Opcode) -> bool {
        self.annotations.iter().any(|inst| inst.opcode() == opcode)
    }

    /// Appends an `OpCapability`.
    pub fn push_capability(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::Capability);

        self.capabilities.push(inst);
    }

    /// Appends an `OpExtension`.
    pub fn push_extension(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::Extension);

        self.extensions.push(inst);
    }

    /// Appends an `OpExtInstImport`.
    pub fn push_ext_inst_import(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::ExtInstImport);

        self.ext_inst_imports.push(inst);
    }

    /// Replaces the `OpMemoryModel`.
    pub fn set_memory_model(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::MemoryModel);

        self.memory_model = Some(inst);
    }

    /// Appends an `OpEntryPoint`.
    pub fn push_entry_point(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::EntryPoint);

        self.entry_points.push(inst);
    }

    /// Appends an `OpExecutionMode`.
    pub fn push_execution_mode(&mut self, inst: Instruction) {
        debug_assert_eq!(inst.opcode(), Opcode::ExecutionMode);

        self.execution_modes.push(inst);
    }

    /// Appends a debug instruction.
    pub fn push_debug(&mut self, inst: Instruction) {
        debug_assert!(inst.opcode().is_debug());

        self.debug.push(inst);
    }

    /// Appends an annotation.
    pub fn push_annotation(&mut self, inst: Instruction) {
        debug_assert!(inst.opcode().is_decoration());

        self.annotations.push(inst);
    }

    /// Appends a type, constant or global variable to the end of the
    /// types/values section.
    pub fn push_global(&mut self, inst: Instruction) {
        self.types_values.push(inst);
    }

    /// Removes every `OpName`/`OpMemberName` and decoration whose target is
    /// one of `ids`. Returns how many instructions were removed.
    pub fn remove_debug_info_for(&mut self, ids: &SaHashSet<Id>) -> usize {
        let targeted = |inst: &Instruction| inst.id_operand(0).map_or(false, |id| ids.contains(&id));
        let before = self.debug.len() + self.annotations.len();

        self.debug.retain(|inst| {
            !matches!(inst.opcode(), Opcode::Name | Opcode::MemberName) || !targeted(inst)
        });
        self.annotations.retain(|inst| !targeted(inst));

        before - (self.debug.len() + self.annotations.len())
    }

    /// Adds a function to the module.
    pub fn push_function(&mut self, func: Function) -> Func {
        debug_assert!(self.function_by_id(func.id()).is_none());

        self.functions.insert(func)
    }

    /// Returns an iterator over all of the functions in the module.
    pub fn functions(&self) -> impl Iterator<Item = Func> {
        self.functions.keys()
    }

    /// Resolves a [`Func`] into a real function object.
    pub fn function(&self, func: Func) -> &Function {
        &self.functions[func]
    }

    /// Resolves a [`Func`] into a real function object.
    pub fn function_mut(&mut self, func: Func) -> &mut Function {
        &mut self.functions[func]
    }

    /// Finds the function whose result id is `id`.
    pub fn function_by_id(&self, id: Id) -> Option<Func> {
        self.functions
            .iter()
            .find(|(_, func)| func.id() == id)
            .map(|(func, _)| func)
    }

    /// Gets the id bound of the module, i.e. one past the largest id in use.
    #[inline]
    pub fn id_bound(&self) -> u32 {
        self.id_bound
    }

    /// Overrides the id bound. Any id at or above `bound` must not be in use.
    pub fn set_id_bound(&mut self, bound: u32) {
        self.id_bound = bound;
    }

    /// Allocates a single fresh id, bumping the bound.
    pub fn allocate_id(&mut self) -> Id {
        let mut ids = self.id_allocator();
        let id = ids.take_next_id();

        self.finalize_ids(ids);

        id
    }

    /// Takes an allocator that hands out ids starting at the current bound.
    /// Give it back with [`Self::finalize_ids`] once done.
    pub fn id_allocator(&self) -> IdAllocator {
        IdAllocator::starting_at(self.id_bound)
    }

    /// Writes the bound of an allocator obtained from [`Self::id_allocator`]
    /// back into the module.
    pub fn finalize_ids(&mut self, ids: IdAllocator) {
        debug_assert!(ids.bound() >= self.id_bound);

        self.id_bound = ids.bound();
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Operand;

    #[test]
    fn capabilities_and_extensions() {
        let mut module = Module::new();

        module.push_capability(Instruction::new(
            Opcode::Capability,
            None,
            None,
            [Operand::Literal(Capability::Shader as u32)],
        ));
        module.push_extension(Instruction::new(
            Opcode::Extension,
            None,
            None,
            [Operand::String("SPV_KHR_multiview".to_owned())],
        ));

        assert!(module.has_capability(Capability::Shader));
        assert!(!module.has_capability(Capability::Kernel));
        assert!(module.extensions().eq(["SPV_KHR_multiview"]));
    }

    #[test]
    fn ids_come_from_the_bound() {
        let mut module = Module::new();

        module.set_id_bound(20);

        let mut ids = module.id_allocator();

        assert_eq!(ids.take_next_id(), Id::new(20));
        assert_eq!(ids.take_next_id(), Id::new(21));

        module.finalize_ids(ids);

        assert_eq!(module.allocate_id(), Id::new(22));
        assert_eq!(module.id_bound(), 23);
    }

    #[test]
    fn debug_info_for_dead_ids_is_removed() {
        let mut module = Module::new();
        let (a, b) = (Id::new(3), Id::new(4));

        module.push_debug(Instruction::new(
            Opcode::Name,
            None,
            None,
            [Operand::Id(a), Operand::String("a".to_owned())],
        ));
        module.push_debug(Instruction::new(
            Opcode::Name,
            None,
            None,
            [Operand::Id(b), Operand::String("b".to_owned())],
        ));
        module.push_annotation(Instruction::new(
            Opcode::Decorate,
            None,
            None,
            [Operand::Id(a), Operand::Literal(0)],
        ));

        let dead = [a].into_iter().collect();

        assert_eq!(module.remove_debug_info_for(&dead), 2);
        assert_eq!(module.debug().len(), 1);
        assert!(module.annotations().is_empty());
    }
}
