//! Grouping of normalized records into logical pick orders.
//!
//! One [`OrderGroup`] corresponds to exactly one `pick_orders` header row;
//! the grouping key is the order header's natural key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::records::NormalizedRecord;

/// The natural key identifying one pick-order header.
///
/// Line-level fields (`item`, `product`, `location_text`) are deliberately
/// not part of the key: a group carries every line of the same logical
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub order_ref: String,
    pub store: String,
    pub client: String,
    pub depot: String,
}

impl GroupKey {
    /// Derives the key from a normalized record.
    #[must_use]
    pub fn of(record: &NormalizedRecord) -> Self {
        Self {
            order_ref: record.order_ref.clone(),
            store: record.store.clone(),
            client: record.client.clone(),
            depot: record.depot.clone(),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order={} store={} client={} depot={}",
            self.order_ref, self.store, self.client, self.depot
        )
    }
}

/// All records of one logical order, plus the header fields taken from the
/// first record seen for the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderGroup {
    pub key: GroupKey,
    /// Display name of the first record in input order; later records in
    /// the same group never override it.
    pub display_name: String,
    pub records: Vec<NormalizedRecord>,
}

/// Groups records by [`GroupKey`], preserving first-seen group order.
#[must_use]
pub fn group_records(records: Vec<NormalizedRecord>) -> Vec<OrderGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<OrderGroup> = Vec::new();

    for record in records {
        let key = GroupKey::of(&record);
        if let Some(&slot) = index.get(&key) {
            groups[slot].records.push(record);
        } else {
            index.insert(key.clone(), groups.len());
            groups.push(OrderGroup {
                key,
                display_name: record.display_name.clone(),
                records: vec![record],
            });
        }
    }

    groups
}
