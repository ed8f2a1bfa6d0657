//! # Dedup Module
//!
//! Near-duplicate resolution over the complete set of scanned items.
//!
//! ## How It Works
//! 1. Sort items by name
//! 2. Walk them in order, comparing each hash against the confirmed-unique
//!    hashes seen so far (in insertion order)
//! 3. The first confirmed hash within tolerance makes the item a DUPLICATE of
//!    that entry; otherwise the item becomes confirmed-unique itself
//! 4. In a separate pass, pick one keeper per group
//!
//! This is incremental greedy clustering, O(n*k) for k unique images. It is
//! order sensitive and does not merge chains: with A~B and B~C but A too far
//! from C, C can end up in its own group. The name sort pins the order so
//! runs are reproducible.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::item::{ScanItem, ScanStatus};

/// Mark near-duplicates in place. Returns the number of items marked.
///
/// Items end up sorted by name.
pub fn resolve(items: &mut [ScanItem], tolerance: u32) -> usize {
    items.sort_by(|a, b| a.name.cmp(&b.name));

    let mut unique: Vec<usize> = Vec::new();
    let mut marked = 0;

    for i in 0..items.len() {
        let mut root = None;
        for &j in &unique {
            match items[i].hash.try_distance(&items[j].hash) {
                Ok(distance) if distance <= tolerance => {
                    root = Some(j);
                    break;
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping comparison {} / {}: {}", items[i].name, items[j].name, e),
            }
        }

        match root {
            Some(j) => {
                let root_name = items[j].name.clone();
                debug!("{} duplicates {}", items[i].name, root_name);
                items[i].status = ScanStatus::Duplicate;
                items[i].duplicate_of = Some(root_name);
                marked += 1;
            }
            None => unique.push(i),
        }
    }

    marked
}

/// A root item plus everything resolved as its duplicate
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub root: String,
    /// Root first, then members in name order
    pub members: Vec<String>,
    pub keeper: String,
}

/// Keeper lookup built once before export starts
#[derive(Debug, Clone, Default)]
pub struct Keepers {
    groups: Vec<DuplicateGroup>,
    member_group: HashMap<String, usize>,
}

impl Keepers {
    /// Group resolved items and pick each group's keeper.
    ///
    /// The keeper has the largest `(megapixels, final score)`; resolution
    /// decides before quality. Equal tuples go to the earliest name.
    pub fn compute(items: &[ScanItem]) -> Self {
        let mut by_name: HashMap<&str, &ScanItem> = HashMap::new();
        for item in items {
            by_name.insert(item.name.as_str(), item);
        }

        let mut members: HashMap<&str, Vec<&ScanItem>> = HashMap::new();
        for item in items {
            if let Some(root) = item.duplicate_of.as_deref() {
                members.entry(root).or_default().push(item);
            }
        }

        let mut roots: Vec<&str> = members.keys().copied().collect();
        roots.sort_unstable();

        let mut groups = Vec::with_capacity(roots.len());
        let mut member_group = HashMap::new();
        for root in roots {
            let Some(root_item) = by_name.get(root).copied() else {
                warn!("Duplicate group root {} is missing from the scan", root);
                continue;
            };

            let mut group: Vec<&ScanItem> = vec![root_item];
            let mut rest = members.remove(root).unwrap_or_default();
            rest.sort_by(|a, b| a.name.cmp(&b.name));
            group.extend(rest);

            let keeper = pick_keeper(&group);
            let index = groups.len();
            for member in &group {
                member_group.insert(member.name.clone(), index);
            }
            groups.push(DuplicateGroup {
                root: root.to_string(),
                members: group.iter().map(|m| m.name.clone()).collect(),
                keeper,
            });
        }

        Self {
            groups,
            member_group,
        }
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Group containing `name`, if it belongs to one
    pub fn group_of(&self, name: &str) -> Option<&DuplicateGroup> {
        self.member_group.get(name).map(|&i| &self.groups[i])
    }

    pub fn is_keeper(&self, name: &str) -> bool {
        self.group_of(name).is_some_and(|g| g.keeper == name)
    }

    /// True for group members that lost the keeper selection
    pub fn is_redundant(&self, name: &str) -> bool {
        self.group_of(name).is_some_and(|g| g.keeper != name)
    }
}

fn pick_keeper(group: &[&ScanItem]) -> String {
    let mut best = group[0];
    for &candidate in &group[1..] {
        if compare_rank(candidate, best) == Ordering::Greater {
            best = candidate;
        }
    }
    best.name.clone()
}

fn compare_rank(a: &ScanItem, b: &ScanItem) -> Ordering {
    a.megapixels
        .total_cmp(&b.megapixels)
        .then(a.score.final_score.total_cmp(&b.score.final_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::ImageHashValue;
    use crate::core::quality::QualityScore;
    use std::path::PathBuf;

    fn score(final_score: f64) -> QualityScore {
        QualityScore {
            sharpness: final_score,
            contrast: final_score,
            noise: final_score,
            final_score,
            laplacian_variance: 0.0,
            noise_std: 0.0,
        }
    }

    /// Hash whose first byte has `ones` low bits set
    fn hash(ones: u32) -> ImageHashValue {
        let mut bytes = vec![0u8; 32];
        let mut remaining = ones;
        for byte in bytes.iter_mut() {
            let take = remaining.min(8);
            *byte = if take == 8 { 0xFF } else { (1u8 << take) - 1 };
            remaining -= take;
        }
        ImageHashValue::new(bytes, 256)
    }

    fn item(name: &str, ones: u32, megapixels: f64, final_score: f64) -> ScanItem {
        ScanItem {
            name: name.to_string(),
            path: PathBuf::from(name),
            width: 100,
            height: 100,
            megapixels,
            score: score(final_score),
            hash: hash(ones),
            status: ScanStatus::Pass,
            duplicate_of: None,
            fail_reason: None,
        }
    }

    #[test]
    fn later_item_in_name_order_is_duplicate() {
        let mut items = vec![item("b.jpg", 3, 1.0, 90.0), item("a.jpg", 0, 1.0, 90.0)];
        assert_eq!(resolve(&mut items, 8), 1);

        assert_eq!(items[0].name, "a.jpg");
        assert_eq!(items[0].status, ScanStatus::Pass);
        assert_eq!(items[1].status, ScanStatus::Duplicate);
        assert_eq!(items[1].duplicate_of.as_deref(), Some("a.jpg"));
    }

    #[test]
    fn outside_tolerance_stays_unique() {
        let mut items = vec![item("a.jpg", 0, 1.0, 90.0), item("b.jpg", 9, 1.0, 90.0)];
        assert_eq!(resolve(&mut items, 8), 0);
        assert!(items.iter().all(|i| i.duplicate_of.is_none()));
    }

    #[test]
    fn chains_are_not_merged() {
        // a~b (6), b~c (6), a/c too far (12)
        let mut items = vec![
            item("a.jpg", 0, 1.0, 90.0),
            item("b.jpg", 6, 1.0, 90.0),
            item("c.jpg", 12, 1.0, 90.0),
        ];
        resolve(&mut items, 8);
        assert_eq!(items[1].duplicate_of.as_deref(), Some("a.jpg"));
        assert_eq!(items[2].status, ScanStatus::Pass);
    }

    #[test]
    fn first_in_sort_order_is_never_duplicate() {
        let mut items = vec![
            item("z.jpg", 0, 1.0, 90.0),
            item("m.jpg", 0, 1.0, 90.0),
            item("c.jpg", 0, 1.0, 90.0),
        ];
        resolve(&mut items, 8);
        assert_eq!(items[0].name, "c.jpg");
        assert_eq!(items[0].status, ScanStatus::Pass);
        assert!(items[1..].iter().all(|i| i.status == ScanStatus::Duplicate));
    }

    #[test]
    fn duplicate_keeps_fail_reason() {
        let mut fail = item("b.jpg", 1, 0.5, 40.0);
        fail.status = ScanStatus::Fail;
        fail.fail_reason = Some("short side 800 < 1024".to_string());
        let mut items = vec![item("a.jpg", 0, 1.0, 90.0), fail];
        resolve(&mut items, 8);
        assert_eq!(items[1].status, ScanStatus::Duplicate);
        assert!(items[1].fail_reason.is_some());
    }

    #[test]
    fn keeper_prefers_resolution_over_score() {
        let mut items = vec![
            item("a.jpg", 0, 2.0, 99.0),
            item("b.jpg", 1, 4.0, 50.0),
            item("c.jpg", 2, 4.0, 60.0),
        ];
        resolve(&mut items, 8);
        let keepers = Keepers::compute(&items);

        let group = keepers.group_of("a.jpg").unwrap();
        assert_eq!(group.members, vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(group.keeper, "c.jpg");
        assert!(keepers.is_keeper("c.jpg"));
        assert!(keepers.is_redundant("a.jpg"));
        assert!(keepers.is_redundant("b.jpg"));
    }

    #[test]
    fn keeper_independent_of_input_order() {
        let build = |order: &[usize]| {
            let all = [
                item("a.jpg", 0, 1.0, 95.0),
                item("b.jpg", 3, 3.0, 80.0),
            ];
            let mut items: Vec<ScanItem> = order.iter().map(|&i| all[i].clone()).collect();
            resolve(&mut items, 8);
            Keepers::compute(&items).group_of("a.jpg").unwrap().keeper.clone()
        };
        assert_eq!(build(&[0, 1]), "b.jpg");
        assert_eq!(build(&[1, 0]), "b.jpg");
    }

    #[test]
    fn equal_rank_goes_to_earliest_name() {
        let mut items = vec![item("b.jpg", 1, 2.0, 90.0), item("a.jpg", 0, 2.0, 90.0)];
        resolve(&mut items, 8);
        assert_eq!(Keepers::compute(&items).groups()[0].keeper, "a.jpg");
    }

    #[test]
    fn singletons_have_no_group() {
        let mut items = vec![item("a.jpg", 0, 1.0, 90.0), item("b.jpg", 40, 1.0, 90.0)];
        resolve(&mut items, 8);
        let keepers = Keepers::compute(&items);
        assert!(keepers.groups().is_empty());
        assert!(!keepers.is_redundant("a.jpg"));
        assert!(!keepers.is_keeper("a.jpg"));
    }
}
