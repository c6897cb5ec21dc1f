// ── Group identities ──
//
// Canonical group ids are `table/name` (`ip/web-in`). Older state files keyed
// IPv4 groups by the bare name. Lookups accept both; anything found under a
// bare name is re-keyed to the canonical form on the next write.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::FilterTable;

/// Canonical identity of a named group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId {
    pub table: FilterTable,
    pub name: String,
}

impl GroupId {
    pub fn new(table: FilterTable, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }

    /// Key under which historical state stored this group, if any.
    pub fn legacy_key(&self) -> Option<&str> {
        (self.table == FilterTable::Ip).then_some(self.name.as_str())
    }

    fn validate_name(input: &str, name: &str) -> Result<(), CoreError> {
        if name.is_empty() {
            return Err(CoreError::InvalidIdentity {
                input: input.to_owned(),
                reason: "group name is empty".into(),
            });
        }
        if name.contains(['/', ':']) || name.contains(char::is_whitespace) {
            return Err(CoreError::InvalidIdentity {
                input: input.to_owned(),
                reason: "group names may not contain `/`, `:`, or whitespace".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.name)
    }
}

/// Accepts `table/name` and the legacy bare `name` (an IPv4 group).
impl FromStr for GroupId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, name) = match s.split_once('/') {
            Some((table, name)) => {
                let table = table.parse::<FilterTable>().map_err(|_| {
                    CoreError::InvalidIdentity {
                        input: s.to_owned(),
                        reason: format!("unknown filter table `{table}`"),
                    }
                })?;
                (table, name)
            }
            None => (FilterTable::Ip, s),
        };
        Self::validate_name(s, name)?;
        Ok(Self::new(table, name))
    }
}

/// Parse an import id of the form `table/name:5,6,7`.
pub fn parse_import_id(input: &str) -> Result<(GroupId, Vec<u32>), CoreError> {
    let invalid = |reason: &str| CoreError::InvalidIdentity {
        input: input.to_owned(),
        reason: reason.to_owned(),
    };
    let (group, numbers) = input
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected `table/name:n1,n2,...`"))?;
    let id = group.parse::<GroupId>()?;
    let numbers = numbers
        .split(',')
        .map(|n| n.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("filter numbers must be comma-separated integers"))?;
    Ok((id, numbers))
}

/// A stored value found by [`LegacyIdentityResolver::resolve`].
#[derive(Debug)]
pub struct Resolved<'a, V> {
    pub key: &'a str,
    pub value: &'a V,
    /// Found under the legacy key; the next write re-keys it.
    pub needs_migration: bool,
}

/// Resolves group ids against maps that may still hold legacy keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyIdentityResolver;

impl LegacyIdentityResolver {
    /// Look up `id`, trying the canonical key first, then the legacy key.
    pub fn resolve<'a, V>(self, map: &'a BTreeMap<String, V>, id: &GroupId) -> Option<Resolved<'a, V>> {
        if let Some((key, value)) = map.get_key_value(&id.to_string()) {
            return Some(Resolved {
                key,
                value,
                needs_migration: false,
            });
        }
        let legacy = id.legacy_key()?;
        map.get_key_value(legacy).map(|(key, value)| {
            debug!(group = %id, legacy_key = %key, "resolved group through legacy key");
            Resolved {
                key,
                value,
                needs_migration: true,
            }
        })
    }

    /// Re-key every legacy entry to its canonical id.
    ///
    /// When both keys exist the canonical entry wins and the legacy one is
    /// dropped. Returns the `(legacy, canonical)` pairs that changed.
    pub fn migrate<V>(self, map: &mut BTreeMap<String, V>) -> Vec<(String, GroupId)> {
        let legacy_keys: Vec<String> = map.keys().filter(|k| !k.contains('/')).cloned().collect();
        let mut migrated = Vec::new();
        for key in legacy_keys {
            let Ok(id) = key.parse::<GroupId>() else {
                warn!(key = %key, "skipping unparseable state key");
                continue;
            };
            let Some(value) = map.remove(&key) else {
                continue;
            };
            let canonical = id.to_string();
            if map.contains_key(&canonical) {
                warn!(legacy_key = %key, group = %canonical, "dropping legacy entry shadowed by canonical key");
            } else {
                debug!(legacy_key = %key, group = %canonical, "migrating legacy state key");
                map.insert(canonical, value);
            }
            migrated.push((key, id));
        }
        migrated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_canonical_and_legacy_forms() {
        let canonical: GroupId = "ipv6/edge".parse().unwrap();
        assert_eq!(canonical, GroupId::new(FilterTable::Ipv6, "edge"));

        let legacy: GroupId = "edge".parse().unwrap();
        assert_eq!(legacy, GroupId::new(FilterTable::Ip, "edge"));
        assert_eq!(legacy.to_string(), "ip/edge");
    }

    #[test]
    fn rejects_bad_identities() {
        assert!("mpls/g1".parse::<GroupId>().is_err());
        assert!("ip/".parse::<GroupId>().is_err());
        assert!("ip/a b".parse::<GroupId>().is_err());
    }

    #[test]
    fn import_id_with_numbers() {
        let (id, numbers) = parse_import_id("ip/g2:5,6,7").unwrap();
        assert_eq!(id, GroupId::new(FilterTable::Ip, "g2"));
        assert_eq!(numbers, vec![5, 6, 7]);

        let (id, numbers) = parse_import_id("ethernet/macs:1").unwrap();
        assert_eq!(id.table, FilterTable::Ethernet);
        assert_eq!(numbers, vec![1]);

        assert!(parse_import_id("ip/g2").is_err());
        assert!(parse_import_id("ip/g2:5,x").is_err());
        assert!(matches!(
            parse_import_id("ip/g2:"),
            Err(CoreError::InvalidIdentity { reason, .. }) if reason.contains("comma-separated")
        ));
    }

    #[test]
    fn canonical_key_wins_over_legacy() {
        let mut map = BTreeMap::new();
        map.insert("g1".to_owned(), 1);
        map.insert("ip/g1".to_owned(), 2);
        let id = GroupId::new(FilterTable::Ip, "g1");

        let found = LegacyIdentityResolver.resolve(&map, &id).unwrap();
        assert_eq!(*found.value, 2);
        assert!(!found.needs_migration);
    }

    #[test]
    fn legacy_hit_is_marked_for_migration() {
        let mut map = BTreeMap::new();
        map.insert("g1".to_owned(), 1);
        let id = GroupId::new(FilterTable::Ip, "g1");

        let found = LegacyIdentityResolver.resolve(&map, &id).unwrap();
        assert_eq!(found.key, "g1");
        assert!(found.needs_migration);

        // Legacy keys only ever describe IPv4 groups.
        let v6 = GroupId::new(FilterTable::Ipv6, "g1");
        assert!(LegacyIdentityResolver.resolve(&map, &v6).is_none());
    }

    #[test]
    fn migrate_rekeys_and_never_keeps_legacy() {
        let mut map = BTreeMap::new();
        map.insert("g1".to_owned(), 1);
        map.insert("g2".to_owned(), 2);
        map.insert("ip/g2".to_owned(), 20);

        let migrated = LegacyIdentityResolver.migrate(&mut map);
        assert_eq!(migrated.len(), 2);
        assert_eq!(
            map.into_iter().collect::<Vec<_>>(),
            vec![("ip/g1".to_owned(), 1), ("ip/g2".to_owned(), 20)]
        );
    }
}
