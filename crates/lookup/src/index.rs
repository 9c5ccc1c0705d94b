use crate::OwnerId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;

/// Outcome of [`SignatureIndex::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The signature was not indexed yet and now belongs to the new owner.
    Inserted,
    /// The signature already belonged to the same owner.
    Unchanged,
    /// The signature already belongs to `existing`; the index is unchanged.
    Conflict { existing: OwnerId },
}

/// Concurrent `signature → owner` map.
///
/// The first owner stored for a signature is never replaced.
#[derive(Debug, Default)]
pub struct SignatureIndex {
    entries: DashMap<String, OwnerId>,
}

impl SignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `owner` for `signature` unless the signature is already
    /// indexed. The lookup and the store happen under the same shard lock,
    /// so concurrent inserts of one pair never report a conflict.
    pub fn insert(&self, signature: &str, owner: OwnerId) -> Insertion {
        match self.entries.entry(signature.to_string()) {
            Entry::Occupied(entry) if *entry.get() == owner => Insertion::Unchanged,
            Entry::Occupied(entry) => Insertion::Conflict { existing: *entry.get() },
            Entry::Vacant(entry) => {
                entry.insert(owner);
                Insertion::Inserted
            },
        }
    }

    pub fn get(&self, signature: &str) -> Option<OwnerId> {
        self.entries.get(signature).map(|owner| *owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the current contents out.
    pub fn snapshot(&self) -> HashMap<String, OwnerId> {
        self.entries.iter().map(|entry| (entry.key().clone(), *entry.value())).collect()
    }

    pub fn into_map(self) -> HashMap<String, OwnerId> {
        self.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_owner_wins() {
        let index = SignatureIndex::new();
        assert_eq!(index.insert("abc", 1), Insertion::Inserted);
        assert_eq!(index.insert("abc", 1), Insertion::Unchanged);
        assert_eq!(index.insert("abc", 2), Insertion::Conflict { existing: 1 });
        assert_eq!(index.get("abc"), Some(1));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_inserts_never_conflict() {
        let index = Arc::new(SignatureIndex::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                (0..500).map(|i| index.insert(&format!("sig-{i}"), i)).collect::<Vec<_>>()
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            for outcome in handle.await.unwrap() {
                assert!(!matches!(outcome, Insertion::Conflict { .. }));
                if outcome == Insertion::Inserted {
                    inserted += 1;
                }
            }
        }
        assert_eq!(inserted, 500);
        assert_eq!(index.len(), 500);
        assert!(index.snapshot().iter().all(|(sig, owner)| *sig == format!("sig-{owner}")));
    }
}
