//! Generic ordering over any [`ObjectExt`] slice.
use std::cmp::Ordering;

use crate::metadata::ObjectExt;

/// The field a [`sort_by`] comparison is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortScope {
    /// Ascending by GUID.
    Guid,
    /// Ascending by name.
    Name,
    /// Ascending by namespace.
    Namespace,
    /// Descending by creation time.
    CreatedAt,
    /// Descending by update time; objects never updated sort last.
    UpdatedAt,
}

/// Sort `items` in place according to `scope`.
pub fn sort_by<T: ObjectExt>(items: &mut [T], scope: SortScope) {
    match scope {
        SortScope::Guid => items.sort_by(|a, b| a.guid().cmp(b.guid())),
        SortScope::Name => items.sort_by(|a, b| a.name().cmp(b.name())),
        SortScope::Namespace => items.sort_by(|a, b| a.namespace().cmp(b.namespace())),
        SortScope::CreatedAt => items.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortScope::UpdatedAt => items.sort_by(|a, b| cmp_updated_desc_none_last(a.updated_at(), b.updated_at())),
    }
}

fn cmp_updated_desc_none_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Host;

    #[test]
    fn sorts_by_name_ascending() {
        let mut hosts = vec![Host::new(), Host::new(), Host::new()];
        hosts[0].metadata.name = "c".into();
        hosts[1].metadata.name = "a".into();
        hosts[2].metadata.name = "b".into();
        sort_by(&mut hosts, SortScope::Name);
        let names: Vec<_> = hosts.iter().map(|h| h.metadata.name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn none_updated_at_sorts_last() {
        use chrono::Utc;
        let mut hosts = vec![Host::new(), Host::new()];
        hosts[0].metadata.updated_at = Some(Utc::now());
        hosts[1].metadata.updated_at = None;
        sort_by(&mut hosts, SortScope::UpdatedAt);
        assert!(hosts[0].metadata.updated_at.is_some());
        assert!(hosts[1].metadata.updated_at.is_none());
    }
}
