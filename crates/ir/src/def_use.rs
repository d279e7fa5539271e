//! The bidirectional def-use index.
//!
//! An auxiliary adjacency structure keyed by identifier: `defs` maps each
//! defined id to its defining instruction, `users` maps it to the ordered
//! set of instructions referencing it. Every graph mutation must either
//! update the index or invalidate it; staleness is tracked by the owning
//! context, never ambient.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{Id, InstId, Instruction, Module};

/// Looking up an identifier with no defining instruction. The module is
/// assumed well-formed once parsing succeeded, so this is an engine error,
/// not a user-input diagnostic.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("undefined identifier {0}")]
pub struct UndefinedId(pub Id);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefUseIndex {
    defs: FxHashMap<Id, InstId>,
    users: FxHashMap<Id, BTreeSet<InstId>>,
}

impl DefUseIndex {
    /// Builds the index from scratch for the whole module.
    pub fn analyze(module: &Module) -> Self {
        let mut index = Self::default();
        for (inst_id, _) in module.iter_all_insts() {
            index.track_inst(inst_id, module.inst(inst_id));
        }
        index
    }

    /// Records an instruction's definition and uses.
    pub fn track_inst(&mut self, inst_id: InstId, inst: &Instruction) {
        if let Some(result) = inst.result_id {
            let previous = self.defs.insert(result, inst_id);
            debug_assert!(
                previous.is_none() || previous == Some(inst_id),
                "{result} defined twice"
            );
        }
        inst.for_each_ref(|id| {
            self.users.entry(id).or_default().insert(inst_id);
        });
    }

    /// Erases an instruction's definition and uses. Emptied user sets are
    /// dropped entirely so the index stays equal to a from-scratch rebuild.
    pub fn untrack_inst(&mut self, inst_id: InstId, inst: &Instruction) {
        if let Some(result) = inst.result_id {
            self.defs.remove(&result);
        }
        inst.for_each_ref(|id| {
            if let Some(users) = self.users.get_mut(&id) {
                users.remove(&inst_id);
                if users.is_empty() {
                    self.users.remove(&id);
                }
            }
        });
    }

    /// The unique defining instruction of an identifier.
    pub fn get_def(&self, id: Id) -> Result<InstId, UndefinedId> {
        self.defs.get(&id).copied().ok_or(UndefinedId(id))
    }

    pub fn has_def(&self, id: Id) -> bool {
        self.defs.contains_key(&id)
    }

    /// Instructions that reference `id`, in arena order.
    pub fn users(&self, id: Id) -> impl Iterator<Item = InstId> + '_ {
        self.users.get(&id).into_iter().flatten().copied()
    }

    pub fn num_users(&self, id: Id) -> usize {
        self.users.get(&id).map_or(0, BTreeSet::len)
    }

    /// Applies `predicate` to each user of `id`, stopping at the first
    /// `false`. Returns whether every visited user satisfied the predicate,
    /// so "no use outside a region" checks run in O(uses).
    pub fn while_each_user(&self, id: Id, mut predicate: impl FnMut(InstId) -> bool) -> bool {
        for user in self.users(id) {
            if !predicate(user) {
                return false;
            }
        }
        true
    }

    /// Moves every use of `old` over to `new`. The caller rewrites the
    /// instructions themselves; this maintains only the index.
    pub fn replace_uses(&mut self, old: Id, new: Id) {
        let Some(mut moved) = self.users.remove(&old) else {
            return;
        };
        if moved.is_empty() {
            return;
        }
        self.users.entry(new).or_default().append(&mut moved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Opcode, Operand};

    fn fadd(module: &mut Module, ty: Id, result: Id, lhs: Id, rhs: Id) -> InstId {
        let inst = Instruction::new(
            Opcode::FAdd,
            Some(ty),
            Some(result),
            [Operand::Id(lhs), Operand::Id(rhs)],
        );
        let id = module.alloc_inst(inst);
        module.types_global_values.push(id);
        id
    }

    #[test]
    fn def_and_users_are_indexed() {
        let mut module = Module::new();
        let a = fadd(&mut module, Id(1), Id(10), Id(2), Id(3));
        let b = fadd(&mut module, Id(1), Id(11), Id(10), Id(10));

        let index = DefUseIndex::analyze(&module);
        assert_eq!(index.get_def(Id(10)), Ok(a));
        assert_eq!(index.get_def(Id(11)), Ok(b));
        assert_eq!(index.get_def(Id(99)), Err(UndefinedId(Id(99))));
        assert_eq!(index.num_users(Id(10)), 1);
        assert_eq!(index.users(Id(10)).collect::<Vec<_>>(), vec![b]);
        // The type id is a use too.
        assert_eq!(index.num_users(Id(1)), 2);
    }

    #[test]
    fn while_each_user_short_circuits() {
        let mut module = Module::new();
        fadd(&mut module, Id(1), Id(10), Id(2), Id(3));
        fadd(&mut module, Id(1), Id(11), Id(10), Id(10));
        fadd(&mut module, Id(1), Id(12), Id(10), Id(10));

        let index = DefUseIndex::analyze(&module);
        let mut visited = 0;
        let all = index.while_each_user(Id(10), |_| {
            visited += 1;
            false
        });
        assert!(!all);
        assert_eq!(visited, 1);

        let mut visited = 0;
        let all = index.while_each_user(Id(10), |_| {
            visited += 1;
            true
        });
        assert!(all);
        assert_eq!(visited, 2);
    }

    #[test]
    fn untrack_removes_def_and_uses() {
        let mut module = Module::new();
        let a = fadd(&mut module, Id(1), Id(10), Id(2), Id(3));
        let b = fadd(&mut module, Id(1), Id(11), Id(10), Id(10));

        let mut index = DefUseIndex::analyze(&module);
        let inst = module.inst(b).clone();
        index.untrack_inst(b, &inst);
        assert!(!index.has_def(Id(11)));
        assert_eq!(index.num_users(Id(10)), 0);
        assert_eq!(index.get_def(Id(10)), Ok(a));
    }
}
