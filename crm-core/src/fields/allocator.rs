//! First-fit slot allocation
//!
//! The lowest free slot is always chosen so that freed slots are reused before
//! anything else and the set of live slot numbers stays dense within `1..=SLOT_COUNT`.

use std::collections::BTreeSet;

use crate::error::{CrmError, Result};
use crate::models::{Module, SlotNumber, SLOT_COUNT};

/// Returns the smallest slot of `module` that is not in `occupied`
pub fn next_available_slot(module: Module, occupied: &BTreeSet<SlotNumber>) -> Result<SlotNumber> {
    SlotNumber::all()
        .find(|slot| !occupied.contains(slot))
        .ok_or(CrmError::AllocationExhausted {
            module,
            capacity: SLOT_COUNT,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ns: &[u8]) -> BTreeSet<SlotNumber> {
        ns.iter().map(|n| SlotNumber::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_empty_module_gets_first_slot() {
        let slot = next_available_slot(Module::Contact, &BTreeSet::new()).unwrap();
        assert_eq!(slot.get(), 1);
    }

    #[test]
    fn test_lowest_gap_is_reused() {
        let slot = next_available_slot(Module::Deal, &slots(&[1, 2, 4])).unwrap();
        assert_eq!(slot.get(), 3);

        let slot = next_available_slot(Module::Deal, &slots(&[2, 3, 20])).unwrap();
        assert_eq!(slot.get(), 1);
    }

    #[test]
    fn test_same_input_same_answer() {
        let occupied = slots(&[1, 5, 6]);
        let first = next_available_slot(Module::Lead, &occupied).unwrap();
        for _ in 0..10 {
            assert_eq!(next_available_slot(Module::Lead, &occupied).unwrap(), first);
        }
    }

    #[test]
    fn test_full_module_is_exhausted() {
        let occupied: BTreeSet<SlotNumber> = SlotNumber::all().collect();
        let err = next_available_slot(Module::Lead, &occupied).unwrap_err();
        assert!(matches!(
            err,
            CrmError::AllocationExhausted {
                module: Module::Lead,
                capacity: SLOT_COUNT
            }
        ));
    }

    #[test]
    fn test_last_free_slot_is_found() {
        let occupied: BTreeSet<SlotNumber> = SlotNumber::all().filter(|s| s.get() != 20).collect();
        assert_eq!(next_available_slot(Module::FollowUp, &occupied).unwrap().get(), 20);
    }
}
