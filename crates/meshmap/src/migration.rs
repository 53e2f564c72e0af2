//! Key migration on join and leave.
//!
//! A joining node claims, from its successor, the keys that now fall into
//! its arc. A leaving node pushes everything it holds to its successor.
//! Neither direction is atomic: keys move one at a time and a failure midway
//! is returned to the caller without rolling anything back.

use crate::map::MeshMap;
use crate::store::{MapKey, MapValue};
use corelib::{Result, Ring};
use std::collections::HashMap;
use streaming::PayloadCodec;
use tracing::{debug, info};

impl<K: MapKey, V: MapValue, C: PayloadCodec> MeshMap<K, V, C> {
    /// Pulls the keys this node now owns from its ring successor.
    ///
    /// Must run after this node is registered in the ring. Each claimed key is
    /// stored locally before it is removed from the successor, so a failure
    /// leaves a duplicate rather than losing the entry. Returns the number of
    /// keys moved.
    pub async fn open(&self) -> Result<usize> {
        let successor = match self.ring().successor(self.self_node())? {
            Some(successor) => successor,
            None => {
                debug!("{} is alone in the ring, nothing to claim", self.self_node());
                return Ok(0);
            }
        };

        let arc_start = successor.placement();
        let arc_end = self.self_node().placement();
        let mut claimed = Vec::new();
        for key in self.key_set_of(&successor).await? {
            if self.placement_of(&key)?.in_arc(arc_start, arc_end) {
                claimed.push(key);
            }
        }

        for key in &claimed {
            if let Some(value) = self.get_from(&successor, key).await? {
                self.local_store().insert(key.clone(), value);
            }
            self.remove_from(&successor, key).await?;
        }

        info!(
            "Claimed {} keys in ({}, {}] from {}",
            claimed.len(),
            arc_start,
            arc_end,
            successor
        );
        Ok(claimed.len())
    }

    /// Pushes every local entry to this node's ring successor.
    ///
    /// Must run before this node deregisters. Local entries are left in
    /// place. Returns the number of entries pushed.
    pub async fn close(&self) -> Result<usize> {
        let entries = self.local_store().entries();
        let count = entries.len();
        self.hand_over(entries).await?;
        Ok(count)
    }

    /// Pushes `entries` to this node's ring successor; a no-op when no other
    /// node is registered.
    pub(crate) async fn hand_over(&self, entries: Vec<(K, V)>) -> Result<()> {
        let successor = match self.ring().successor(self.self_node())? {
            Some(successor) => successor,
            None => {
                debug!("{} is alone in the ring, nothing to hand over", self.self_node());
                return Ok(());
            }
        };

        let count = entries.len();
        for (key, value) in entries {
            self.put_to(&successor, key, value).await?;
        }

        info!("Handed {} entries over to {}", count, successor);
        Ok(())
    }
}

/// Entries in `current` that are missing from, or differ from, `handed_over`.
pub(crate) fn written_since<K: MapKey, V: MapValue>(
    handed_over: &[(K, V)],
    current: Vec<(K, V)>,
) -> Vec<(K, V)> {
    let handed: HashMap<&K, &V> = handed_over.iter().map(|(k, v)| (k, v)).collect();
    current
        .into_iter()
        .filter(|(key, value)| handed.get(key) != Some(&value))
        .collect()
}
