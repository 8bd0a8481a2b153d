//! Outbound sync requests, one per principal kind.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::spec::{PrincipalType, SyncSpec, SyncType};

/// What the synchronizer should do for one principal kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    sync_type: SyncType,
    principal_names: BTreeSet<String>,
}

impl SyncRequest {
    pub fn new(sync_type: SyncType) -> Self {
        Self {
            sync_type,
            principal_names: BTreeSet::new(),
        }
    }

    pub fn specific<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sync_type: SyncType::Specific,
            principal_names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn principal_names(&self) -> &BTreeSet<String> {
        &self.principal_names
    }

    pub fn add_principal_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.principal_names.extend(names.into_iter().map(Into::into));
    }

    /// Fold one spec into the request built so far for its principal kind.
    ///
    /// `All` and `Existing` replace whatever was there. `Specific` unions its
    /// names into the existing request, or starts a specific request.
    pub fn fold(request: Option<SyncRequest>, spec: &SyncSpec) -> SyncRequest {
        match spec.sync_type() {
            SyncType::All | SyncType::Existing => SyncRequest::new(spec.sync_type()),
            SyncType::Specific => match request {
                Some(mut request) => {
                    request.add_principal_names(spec.names().iter().cloned());
                    request
                }
                None => SyncRequest::specific(spec.names().iter().cloned()),
            },
        }
    }
}

/// The user and group requests a job's specs aggregate into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequests {
    pub users: Option<SyncRequest>,
    pub groups: Option<SyncRequest>,
}

impl SyncRequests {
    /// Aggregate specs per principal kind, in order.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a SyncSpec>) -> Self {
        let mut requests = Self::default();
        for spec in specs {
            let slot = match spec.principal_type() {
                PrincipalType::Users => &mut requests.users,
                PrincipalType::Groups => &mut requests.groups,
            };
            *slot = Some(SyncRequest::fold(slot.take(), spec));
        }
        requests
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_none() && self.groups.is_none()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn specific_users_and_all_groups_produce_one_request_each() {
        let specs = vec![
            SyncSpec::specific(PrincipalType::Users, ["alice", "bob"]),
            SyncSpec::all(PrincipalType::Groups),
        ];

        let requests = SyncRequests::from_specs(&specs);

        assert_eq!(requests.users, Some(SyncRequest::specific(["alice", "bob"])));
        assert_eq!(requests.groups, Some(SyncRequest::new(SyncType::All)));
    }

    #[test]
    fn no_specs_produce_no_requests() {
        let requests = SyncRequests::from_specs(&Vec::<SyncSpec>::new());
        assert!(requests.is_empty());
    }

    #[test]
    fn later_all_or_existing_replaces_earlier_request() {
        let specs = vec![
            SyncSpec::specific(PrincipalType::Users, ["alice"]),
            SyncSpec::existing(PrincipalType::Users),
        ];
        let requests = SyncRequests::from_specs(&specs);
        assert_eq!(requests.users, Some(SyncRequest::new(SyncType::Existing)));

        let specs = vec![
            SyncSpec::existing(PrincipalType::Groups),
            SyncSpec::all(PrincipalType::Groups),
        ];
        let requests = SyncRequests::from_specs(&specs);
        assert_eq!(requests.groups, Some(SyncRequest::new(SyncType::All)));
        assert!(requests.users.is_none());
    }

    #[test]
    fn specific_after_all_adds_names_but_keeps_mode() {
        let specs = vec![
            SyncSpec::all(PrincipalType::Users),
            SyncSpec::specific(PrincipalType::Users, ["carol"]),
        ];
        let users = SyncRequests::from_specs(&specs).users.unwrap();

        assert_eq!(users.sync_type(), SyncType::All);
        assert!(users.principal_names().contains("carol"));
    }

    proptest! {
        /// Any sequence of specific specs for one kind folds into a single
        /// specific request holding the union of their names.
        #[test]
        fn specific_specs_union_names(
            batches in prop::collection::vec(
                prop::collection::vec("[a-z]{1,6}", 0..5),
                1..6,
            )
        ) {
            let specs: Vec<SyncSpec> = batches
                .iter()
                .map(|names| SyncSpec::specific(PrincipalType::Groups, names.clone()))
                .collect();

            let requests = SyncRequests::from_specs(&specs);
            let groups = requests.groups.expect("group request");
            let expected: BTreeSet<String> = batches.into_iter().flatten().collect();

            prop_assert!(requests.users.is_none());
            prop_assert_eq!(groups.sync_type(), SyncType::Specific);
            prop_assert_eq!(groups.principal_names(), &expected);
        }
    }
}
