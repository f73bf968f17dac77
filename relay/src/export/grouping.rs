//! Group items by metric name
//!
//! Observer export registers one instrument per name, so a batch is first
//! split into per-name groups. Groups are built in an arena indexed by
//! first-seen order; each group is then moved into its own callback.

use std::collections::HashMap;

/// Items sharing one metric name
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    pub name: String,
    pub members: Vec<T>,
}

/// Partition `items` by name, keeping first-seen order of names and the
/// original order of members within each group.
pub fn group_by_name<T, F>(items: impl IntoIterator<Item = T>, name_of: F) -> Vec<Group<T>>
where
    F: Fn(&T) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group<T>> = Vec::new();

    for item in items {
        let name = name_of(&item);
        match index.get(name) {
            Some(&i) => groups[i].members.push(item),
            None => {
                let name = name.to_string();
                index.insert(name.clone(), groups.len());
                groups.push(Group {
                    name,
                    members: vec![item],
                });
            }
        }
    }

    groups
}
