//! View-column membership tracking.
//!
//! Hosts report which editors are visible in increments: a document may show
//! up once without a column and only get one on a later notification. Each
//! document gets a small state machine so `Group`/`Ungroup` fire exactly when
//! a column is gained or lost.

use std::collections::{BTreeMap, BTreeSet};

use retrace_core::{DocPath, ViewColumn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupState {
    /// Visible, no column assigned yet.
    Init,
    /// Gained a column on the latest notification.
    Create,
    /// Still showing in its known columns.
    Live,
    /// Lost a column on the latest notification.
    Destroy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupTransition {
    Group(DocPath, ViewColumn),
    Ungroup(DocPath, ViewColumn),
}

#[derive(Debug)]
struct Group {
    state: GroupState,
    columns: BTreeSet<ViewColumn>,
}

#[derive(Debug, Default)]
pub struct GroupTracker {
    groups: BTreeMap<DocPath, Group>,
}

impl GroupTracker {
    /// Feed one visible-editors notification. Returns the transitions in
    /// document order: gained columns first, then lost ones.
    pub fn observe(&mut self, visible: &[(DocPath, Option<ViewColumn>)]) -> Vec<GroupTransition> {
        let mut seen: BTreeMap<&DocPath, BTreeSet<ViewColumn>> = BTreeMap::new();
        for (path, column) in visible {
            let columns = seen.entry(path).or_default();
            if let Some(c) = column {
                columns.insert(*c);
            }
        }

        let mut out = Vec::new();

        for (path, columns) in &seen {
            let group = self.groups.entry((*path).clone()).or_insert(Group {
                state: GroupState::Init,
                columns: BTreeSet::new(),
            });
            let gained: Vec<ViewColumn> = columns.difference(&group.columns).copied().collect();
            if gained.is_empty() {
                if !group.columns.is_empty() {
                    group.state = GroupState::Live;
                }
            } else {
                for c in gained {
                    group.columns.insert(c);
                    out.push(GroupTransition::Group((*path).clone(), c));
                }
                group.state = GroupState::Create;
            }
        }

        let empty = BTreeSet::new();
        for (path, group) in self.groups.iter_mut() {
            let current = seen.get(path).unwrap_or(&empty);
            let lost: Vec<ViewColumn> = group.columns.difference(current).copied().collect();
            for c in lost {
                group.columns.remove(&c);
                out.push(GroupTransition::Ungroup(path.clone(), c));
                group.state = GroupState::Destroy;
            }
        }

        self.groups.retain(|path, group| {
            let destroyed = group.state == GroupState::Destroy && group.columns.is_empty();
            !destroyed && (seen.contains_key(path) || !group.columns.is_empty())
        });

        out
    }

    pub fn state(&self, path: &DocPath) -> Option<GroupState> {
        self.groups.get(path).map(|g| g.state)
    }

    pub fn columns(&self, path: &DocPath) -> Vec<ViewColumn> {
        self.groups
            .get(path)
            .map(|g| g.columns.iter().copied().collect())
            .unwrap_or_default()
    }
}
