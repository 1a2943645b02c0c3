//! Filling storage containers with random loot.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::ItemEntry;
use crate::entity::{EntityId, Inventory, ItemStack};

/// Slots to fill for a container at `percent` fullness, rounded up
pub fn slots_to_fill(capacity: usize, percent: u32) -> usize {
    let raw = (capacity as f64 * f64::from(percent) / 100.0).ceil();
    (raw.max(0.0) as usize).min(capacity)
}

/// Counts from one fill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Stacks created and offered to the container
    pub attempted: usize,
    pub inserted: usize,
    /// Stacks the container refused, thrown away
    pub discarded: usize,
    /// Entries skipped because the item template is unknown
    pub unresolved: usize,
}

/// Draw a uniform amount from an entry's inclusive range
pub fn roll_amount<R: Rng + ?Sized>(rng: &mut R, entry: &ItemEntry) -> u32 {
    if entry.max_amount <= entry.min_amount {
        return entry.min_amount;
    }
    rng.gen_range(entry.min_amount..=entry.max_amount)
}

/// Fill `container` from `items`.
///
/// The candidate list is shuffled and the first `slots_to_fill` entries are
/// used, so no entry appears twice in one pass. Unknown templates still use
/// up their slot. A refused stack is discarded, never retried.
pub fn fill_container<R: Rng + ?Sized>(
    rng: &mut R,
    inventory: &dyn Inventory,
    container: EntityId,
    capacity: usize,
    items: &[ItemEntry],
    percent: u32,
) -> FillReport {
    let mut report = FillReport::default();
    let slots = slots_to_fill(capacity, percent);
    if slots == 0 {
        return report;
    }

    let mut order: Vec<&ItemEntry> = items.iter().collect();
    order.shuffle(rng);

    for entry in order.into_iter().take(slots) {
        if !inventory.item_exists(&entry.template) {
            debug!("Unknown item '{}', skipping", entry.template);
            report.unresolved += 1;
            continue;
        }

        let amount = roll_amount(rng, entry);
        report.attempted += 1;
        if inventory.insert(container, ItemStack::new(&entry.template, amount, entry.skin)) {
            report.inserted += 1;
        } else {
            debug!("Container {} refused {}x{}", container, amount, entry.template);
            report.discarded += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Recorder {
        unknown: Vec<&'static str>,
        accept: bool,
        stacks: Mutex<Vec<ItemStack>>,
    }

    impl Recorder {
        fn accepting() -> Self {
            Self {
                unknown: Vec::new(),
                accept: true,
                stacks: Mutex::new(Vec::new()),
            }
        }

        fn take(&self) -> Vec<ItemStack> {
            std::mem::take(&mut *self.stacks.lock().unwrap())
        }
    }

    impl Inventory for Recorder {
        fn item_exists(&self, template: &str) -> bool {
            !self.unknown.contains(&template)
        }
        fn capacity(&self, _container: EntityId) -> Option<usize> {
            Some(12)
        }
        fn free_slots(&self, _container: EntityId) -> usize {
            12
        }
        fn insert(&self, _container: EntityId, stack: ItemStack) -> bool {
            self.stacks.lock().unwrap().push(stack);
            self.accept
        }
        fn load_weapon(&self, _holder: EntityId, _weapon: &str, _ammo: ItemStack) -> bool {
            false
        }
    }

    fn items(n: usize) -> Vec<ItemEntry> {
        (0..n).map(|i| ItemEntry::new(&format!("item{i}"), 1, 5)).collect()
    }

    #[test]
    fn test_slots_to_fill_rounds_up_and_clamps() {
        assert_eq!(slots_to_fill(12, 0), 0);
        assert_eq!(slots_to_fill(12, 20), 3);
        assert_eq!(slots_to_fill(12, 100), 12);
        assert_eq!(slots_to_fill(12, 250), 12);
        assert_eq!(slots_to_fill(0, 50), 0);
        assert_eq!(slots_to_fill(10, 1), 1);
    }

    #[test]
    fn test_zero_percent_makes_no_attempts() {
        let inv = Recorder::accepting();
        let mut rng = StdRng::seed_from_u64(1);
        let report = fill_container(&mut rng, &inv, EntityId(1), 12, &items(5), 0);
        assert_eq!(report, FillReport::default());
        assert!(inv.take().is_empty());
    }

    #[test]
    fn test_full_percent_attempts_min_of_capacity_and_entries() {
        let inv = Recorder::accepting();
        let mut rng = StdRng::seed_from_u64(2);

        let report = fill_container(&mut rng, &inv, EntityId(1), 12, &items(5), 100);
        assert_eq!(report.attempted, 5);

        let report = fill_container(&mut rng, &inv, EntityId(1), 3, &items(5), 100);
        assert_eq!(report.attempted, 3);
    }

    #[test]
    fn test_no_entry_used_twice() {
        let inv = Recorder::accepting();
        let mut rng = StdRng::seed_from_u64(3);
        fill_container(&mut rng, &inv, EntityId(1), 12, &items(8), 100);
        let mut names: Vec<String> = inv.take().into_iter().map(|s| s.template).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn test_amounts_within_range() {
        let inv = Recorder::accepting();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            fill_container(&mut rng, &inv, EntityId(1), 12, &items(6), 100);
        }
        assert!(inv.take().iter().all(|s| (1..=5).contains(&s.amount)));
    }

    #[test]
    fn test_unknown_templates_skipped() {
        let mut inv = Recorder::accepting();
        inv.unknown = vec!["item0", "item1"];
        let mut rng = StdRng::seed_from_u64(5);
        let report = fill_container(&mut rng, &inv, EntityId(1), 12, &items(4), 100);
        assert_eq!(report.unresolved, 2);
        assert_eq!(report.attempted, 2);
    }

    #[test]
    fn test_refused_stacks_discarded() {
        let mut inv = Recorder::accepting();
        inv.accept = false;
        let mut rng = StdRng::seed_from_u64(6);
        let report = fill_container(&mut rng, &inv, EntityId(1), 12, &items(4), 100);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.discarded, 4);
    }

    #[test]
    fn test_selection_is_uniform_over_subsets() {
        // 5 entries, 2 slots: each of the 10 unordered pairs should be equally likely
        let inv = Recorder::accepting();
        let entries = items(5);
        let mut rng = StdRng::seed_from_u64(2024);
        let trials = 20_000;
        let mut counts: HashMap<(String, String), u32> = HashMap::new();

        for _ in 0..trials {
            fill_container(&mut rng, &inv, EntityId(1), 10, &entries, 20);
            let mut picked: Vec<String> = inv.take().into_iter().map(|s| s.template).collect();
            assert_eq!(picked.len(), 2);
            picked.sort();
            *counts
                .entry((picked[0].clone(), picked[1].clone()))
                .or_default() += 1;
        }

        assert_eq!(counts.len(), 10);
        let expected = trials as f64 / 10.0;
        let chi_square: f64 = counts
            .values()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        // 9 degrees of freedom, p = 0.001
        assert!(chi_square < 27.88, "chi-square {chi_square}");
    }
}
