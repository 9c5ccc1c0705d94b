use crate::OwnerId;
use crate::builder::Conflict;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A signature that is already owned by a record in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub signature: String,
    pub owner: OwnerId,
}

/// The finished, read-only result of a [`LookupBuilder`](crate::LookupBuilder).
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    entries: HashMap<String, OwnerId>,
    conflicts: Vec<Conflict>,
    complete: bool,
}

impl Lookup {
    pub(crate) fn new(entries: HashMap<String, OwnerId>, conflicts: Vec<Conflict>, complete: bool) -> Self {
        Self { entries, conflicts, complete }
    }

    pub fn owner(&self, signature: &str) -> Option<OwnerId> {
        self.entries.get(signature).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, OwnerId)> {
        self.entries.iter().map(|(signature, owner)| (signature.as_str(), *owner))
    }

    /// Conflicts recorded while building (always empty for strict builds).
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// `false` if the build was cancelled before every source was read.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Which of `signatures` are already owned, in the order given.
    ///
    /// ```
    /// # use media_lookup::{Lookup, Match};
    /// # fn example(lookup: &Lookup) {
    /// for Match { signature, owner } in lookup.matches(["abc", "a:ffd8c0c0e0f0f8fc"]) {
    ///     println!("{signature} already belongs to {owner}");
    /// }
    /// # }
    /// ```
    pub fn matches<'a>(&self, signatures: impl IntoIterator<Item = &'a str>) -> Vec<Match> {
        signatures
            .into_iter()
            .filter_map(|signature| {
                self.owner(signature).map(|owner| Match { signature: signature.to_string(), owner })
            })
            .collect()
    }

    /// All pairs sorted by signature, for deterministic output and
    /// comparisons between builds.
    pub fn to_sorted(&self) -> BTreeMap<String, OwnerId> {
        self.iter().map(|(signature, owner)| (signature.to_string(), owner)).collect()
    }
}
