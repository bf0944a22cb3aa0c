//! Navigation of the group/dataset hierarchy described by a [Header].
//!
//! The header stores a flat list of paths. Children of a group are the paths exactly one `/`
//! segment below it.

use crate::models::{Dataset, DatasetRecord, Group, GroupRecord, Header, Subgroup};

use hashbrown::HashMap;

/// Returns the final `/`-delimited segment of a path.
fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the prefix shared by all descendants of `path`.
fn child_prefix(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Returns true if `candidate` is exactly one level below the group whose child prefix is
/// `prefix`.
fn is_child(prefix: &str, candidate: &str) -> bool {
    candidate
        .strip_prefix(prefix)
        .map_or(false, |rest| !rest.is_empty() && !rest.contains('/'))
}

impl From<&DatasetRecord> for Dataset {
    fn from(record: &DatasetRecord) -> Self {
        Dataset {
            name: name_of(&record.path).to_string(),
            path: record.path.clone(),
            shape: record.shape.clone(),
            dtype: record.dtype,
            attrs: record.attrs.clone(),
        }
    }
}

impl From<&GroupRecord> for Subgroup {
    fn from(record: &GroupRecord) -> Self {
        Subgroup {
            name: name_of(&record.path).to_string(),
            path: record.path.clone(),
            attrs: record.attrs.clone(),
        }
    }
}

/// An immutable, indexed view over a [Header].
#[derive(Debug)]
pub struct Hierarchy {
    header: Header,
    /// Index into `header.groups` by path
    groups: HashMap<String, usize>,
    /// Index into `header.datasets` by path
    datasets: HashMap<String, usize>,
}

impl Hierarchy {
    /// Build the path indices for a header.
    ///
    /// If a path occurs more than once, the first record wins.
    pub fn new(header: Header) -> Self {
        let mut groups = HashMap::with_capacity(header.groups.len());
        for (index, group) in header.groups.iter().enumerate() {
            groups.entry(group.path.clone()).or_insert(index);
        }
        let mut datasets = HashMap::with_capacity(header.datasets.len());
        for (index, dataset) in header.datasets.iter().enumerate() {
            datasets.entry(dataset.path.clone()).or_insert(index);
        }
        Self {
            header,
            groups,
            datasets,
        }
    }

    /// The underlying header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Return the header record of the dataset at `path`.
    pub fn dataset_record(&self, path: &str) -> Option<&DatasetRecord> {
        self.datasets
            .get(path)
            .map(|index| &self.header.datasets[*index])
    }

    /// Return the dataset at `path`, if any.
    pub fn get_dataset(&self, path: &str) -> Option<Dataset> {
        self.dataset_record(path).map(Dataset::from)
    }

    /// Return the group at `path` together with its immediate children, if any.
    ///
    /// Children are ordered by name.
    pub fn get_group(&self, path: &str) -> Option<Group> {
        let record = &self.header.groups[*self.groups.get(path)?];
        let prefix = child_prefix(path);
        let mut subgroups: Vec<Subgroup> = self
            .header
            .groups
            .iter()
            .filter(|group| is_child(&prefix, &group.path))
            .map(Subgroup::from)
            .collect();
        subgroups.sort_by(|a, b| a.name.cmp(&b.name));
        let mut datasets: Vec<Dataset> = self
            .header
            .datasets
            .iter()
            .filter(|dataset| is_child(&prefix, &dataset.path))
            .map(Dataset::from)
            .collect();
        datasets.sort_by(|a, b| a.name.cmp(&b.name));
        Some(Group {
            path: record.path.clone(),
            subgroups,
            datasets,
            attrs: record.attrs.clone(),
        })
    }
}
