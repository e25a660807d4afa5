//! SQL rendering of the visibility predicate.
//!
//! Mirrors [`crate::models::is_visible`] over the JSON metadata column, plus
//! the required-field checks that make a row decodable. Every value,
//! including the JSON paths, is bound as a parameter.

use libsql::Value;

use crate::models::ResolvedIdentity;

/// A boolean SQL expression over `<alias>.metadata` and its parameters.
#[derive(Debug, Clone)]
pub struct AclFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

fn path(key: &str, suffix: &str) -> String {
    format!("$.\"{key}\".{suffix}")
}

impl AclFilter {
    /// Build the filter for `identity`. Placeholders are numbered from
    /// `start_idx`; `key` must already have passed
    /// [`crate::config::validate_metadata_key`].
    pub fn for_identity(
        identity: &ResolvedIdentity,
        key: &str,
        column_prefix: &str,
        start_idx: usize,
    ) -> Self {
        let column = format!("{column_prefix}.metadata");
        let mut params = Vec::new();
        let mut next = start_idx;
        let mut bind = |value: Value, params: &mut Vec<Value>| {
            params.push(value);
            let placeholder = format!("?{next}");
            next += 1;
            placeholder
        };

        let mut required = Vec::new();
        for field in ["metadata.title", "metadata.url", "metadata.date"] {
            let p = bind(Value::from(path(key, field)), &mut params);
            required.push(format!("json_type({column}, {p}) = 'text'"));
        }

        let users_path = bind(Value::from(path(key, "auth.users")), &mut params);
        let user_id = bind(Value::from(identity.user_id.clone()), &mut params);
        let mut grants = vec![format!(
            "EXISTS (SELECT 1 FROM json_each({column}, {users_path}) WHERE json_each.value = {user_id})"
        )];

        if !identity.groups.is_empty() {
            let groups_path = bind(Value::from(path(key, "auth.groups")), &mut params);
            let placeholders: Vec<String> = identity
                .groups
                .iter()
                .map(|g| bind(Value::from(g.clone()), &mut params))
                .collect();
            grants.push(format!(
                "EXISTS (SELECT 1 FROM json_each({column}, {groups_path}) WHERE json_each.value IN ({}))",
                placeholders.join(", ")
            ));
        }

        let clause = format!(
            "(CASE WHEN json_valid({column}) THEN ({} AND ({})) ELSE 0 END)",
            required.join(" AND "),
            grants.join(" OR ")
        );

        Self { clause, params }
    }

    /// Index of the first placeholder after this filter's parameters.
    pub fn next_index(&self, start_idx: usize) -> usize {
        start_idx + self.params.len()
    }
}

/// `<column> IN (?n, ...)` for a non-empty id list.
pub fn in_clause(column: &str, ids: &[String], start_idx: usize) -> (String, Vec<Value>) {
    let placeholders: Vec<String> = (0..ids.len())
        .map(|i| format!("?{}", start_idx + i))
        .collect();
    let values = ids.iter().map(|id| Value::from(id.clone())).collect();
    (
        format!("{column} IN ({})", placeholders.join(", ")),
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &Value) -> &str {
        match value {
            Value::Text(s) => s,
            other => panic!("Expected Text value, got {other:?}"),
        }
    }

    #[test]
    fn test_user_only_filter_has_no_group_clause() {
        let identity = ResolvedIdentity::new("alice@x.com", Vec::<String>::new());
        let filter = AclFilter::for_identity(&identity, "extra_middleware_metadata", "c", 3);

        assert!(!filter.clause.contains("auth.groups"));
        assert!(!filter.clause.contains("IN ("));
        // three required-field paths, users path, user id
        assert_eq!(filter.params.len(), 5);
        assert_eq!(
            text(&filter.params[3]),
            "$.\"extra_middleware_metadata\".auth.users"
        );
        assert_eq!(text(&filter.params[4]), "alice@x.com");
        assert!(filter.clause.contains("?3"));
        assert!(filter.clause.contains("?7"));
        assert!(!filter.clause.contains("?8"));
        assert_eq!(filter.next_index(3), 8);
    }

    #[test]
    fn test_group_filter_binds_each_group() {
        let identity = ResolvedIdentity::new("bob@x.com", ["-team1", "-team2"]);
        let filter = AclFilter::for_identity(&identity, "kb", "c", 1);

        assert!(filter.clause.contains("IN (?7, ?8)"));
        assert_eq!(filter.params.len(), 8);
        assert_eq!(text(&filter.params[5]), "$.\"kb\".auth.groups");
    }

    #[test]
    fn test_identity_values_never_reach_sql_text() {
        let identity = ResolvedIdentity::new("x' OR 1=1 --", ["'; DROP TABLE chunks; --"]);
        let filter = AclFilter::for_identity(&identity, "kb", "c", 1);

        assert!(!filter.clause.contains("DROP"));
        assert!(!filter.clause.contains("1=1"));
        assert!(filter
            .params
            .iter()
            .any(|v| matches!(v, Value::Text(s) if s.contains("DROP TABLE"))));
    }

    #[test]
    fn test_in_clause() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let (clause, values) = in_clause("c.knowledge_id", &ids, 4);
        assert_eq!(clause, "c.knowledge_id IN (?4, ?5)");
        assert_eq!(values.len(), 2);
    }
}
