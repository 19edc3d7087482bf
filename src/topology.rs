//! Topology builder.
//!
//! Converts declarative table definitions into a [`SchemaTopology`]: the
//! tables with their columns plus every foreign-key edge that resolves to a
//! primary-key column of a table in the same snapshot.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::datatype::semantic_type;
use crate::schema::{SchemaDefinition, TableDefinition};

pub use crate::schema::ColumnRef;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }
}

/// A directed foreign-key reference `from` → `to`. `to` is always a
/// primary-key column of a table in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Relationship {
    pub from: ColumnRef,
    pub to: ColumnRef,
}

impl Relationship {
    pub fn is_self_reference(&self) -> bool {
        self.from.table == self.to.table
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaTopology {
    tables: Vec<Table>,
    relationships: Vec<Relationship>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SchemaTopology {
    /// Build the topology for one schema snapshot.
    ///
    /// Never fails: dangling foreign keys are dropped, duplicate tables are
    /// skipped and column-less tables are kept as they are.
    pub fn build(schema: &SchemaDefinition) -> Self {
        let mut tables = Vec::with_capacity(schema.tables.len());
        let mut index = HashMap::new();

        for def in &schema.tables {
            if index.contains_key(&def.name) {
                warn!(table = %def.name, "duplicate table definition skipped");
                continue;
            }
            index.insert(def.name.clone(), tables.len());
            tables.push(build_table(def));
        }

        let mut topology = Self {
            tables,
            relationships: Vec::new(),
            index,
        };
        topology.relationships = topology.resolve_relationships();

        debug!(
            tables = topology.tables.len(),
            relationships = topology.relationships.len(),
            "built schema topology"
        );
        topology
    }

    fn resolve_relationships(&self) -> Vec<Relationship> {
        let mut relationships = Vec::new();

        for table in &self.tables {
            for column in &table.columns {
                let Some(target) = &column.foreign_key else {
                    continue;
                };
                let resolved = self
                    .column(target)
                    .is_some_and(|c| c.is_primary_key);
                if resolved {
                    relationships.push(Relationship {
                        from: ColumnRef::new(&table.name, &column.name),
                        to: target.clone(),
                    });
                } else {
                    debug!(
                        table = %table.name,
                        column = %column.name,
                        target = %target,
                        "dropping unresolved foreign key"
                    );
                }
            }
        }

        relationships
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.index.get(name).map(|&i| &self.tables[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, column: &ColumnRef) -> Option<&Column> {
        self.table(&column.table)
            .and_then(|t| t.column(&column.column))
    }

    /// Position of the table in declaration order.
    pub fn declaration_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn relationships_from<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| r.from.table == table)
    }

    pub fn relationships_to<'a>(
        &'a self,
        target: &'a ColumnRef,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.iter().filter(move |r| &r.to == target)
    }

    /// Schema namespaces in order of first appearance.
    pub fn schemas(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tables
            .iter()
            .map(|t| t.schema.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }

    /// Domain tags in order of first appearance.
    pub fn domains(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tables
            .iter()
            .filter_map(|t| t.domain.as_deref())
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

fn build_table(def: &TableDefinition) -> Table {
    let mut seen = HashSet::new();
    let columns = def
        .columns
        .iter()
        .filter(|c| {
            let fresh = seen.insert(c.name.as_str());
            if !fresh {
                warn!(table = %def.name, column = %c.name, "duplicate column skipped");
            }
            fresh
        })
        .map(|c| {
            let is_primary_key = c.primary_key || def.primary_key.iter().any(|k| *k == c.name);
            Column {
                name: c.name.clone(),
                data_type: semantic_type(&c.data_type),
                is_nullable: !(c.not_null || is_primary_key),
                is_primary_key,
                foreign_key: c.foreign_key.clone(),
            }
        })
        .collect();

    let domain = def
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .or_else(|| def.comment.as_deref().and_then(domain_from_comment));

    Table {
        name: def.name.clone(),
        schema: def.schema.clone(),
        domain,
        comment: def.comment.clone(),
        columns,
    }
}

/// Extract the `@domain` tag from a table comment.
///
/// Accepts `@domain auth`, `@domain: auth` and `@domain = auth`.
pub fn domain_from_comment(comment: &str) -> Option<String> {
    let start = comment.find("@domain")? + "@domain".len();
    let rest = comment[start..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('='))
        .unwrap_or(rest)
        .trim_start();

    let tag: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ',' && *c != ';')
        .collect();

    if tag.is_empty() { None } else { Some(tag) }
}

/// Memoizes the topology of the most recent schema snapshot.
#[derive(Debug, Default)]
pub struct TopologyCache {
    entry: Option<(u64, Arc<SchemaTopology>)>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, schema: &SchemaDefinition) -> Arc<SchemaTopology> {
        let fingerprint = schema.fingerprint();
        if let Some((cached, topology)) = &self.entry {
            if *cached == fingerprint {
                return Arc::clone(topology);
            }
        }

        let topology = Arc::new(SchemaTopology::build(schema));
        self.entry = Some((fingerprint, Arc::clone(&topology)));
        topology
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::ColumnDefinition;

    /// users <- posts <- comments, the canonical three-table blog schema.
    pub(crate) fn blog_schema() -> SchemaDefinition {
        SchemaDefinition::new(vec![
            TableDefinition::new("users")
                .comment("Registered accounts. @domain auth")
                .column(ColumnDefinition::new("id", "serial").primary_key())
                .column(ColumnDefinition::new("email", "varchar(255)").not_null()),
            TableDefinition::new("posts")
                .domain("content")
                .column(ColumnDefinition::new("id", "serial").primary_key())
                .column(ColumnDefinition::new("author_id", "int").references("users", "id")),
            TableDefinition::new("comments")
                .domain("content")
                .column(ColumnDefinition::new("id", "serial").primary_key())
                .column(ColumnDefinition::new("post_id", "int").references("posts", "id")),
        ])
    }

    #[test]
    fn test_build_blog_topology() {
        let topology = SchemaTopology::build(&blog_schema());

        assert_eq!(topology.tables().len(), 3);
        assert_eq!(topology.relationships().len(), 2);
        assert_eq!(
            topology.relationships()[0],
            Relationship {
                from: ColumnRef::new("posts", "author_id"),
                to: ColumnRef::new("users", "id"),
            }
        );

        let users = topology.table("users").unwrap();
        assert_eq!(users.domain.as_deref(), Some("auth"));
        assert_eq!(users.columns[0].data_type, "int");
        assert!(!users.columns[0].is_nullable);
        assert_eq!(users.columns[1].data_type, "varchar");
    }

    #[test]
    fn test_dangling_reference_dropped() {
        let schema = SchemaDefinition::new(vec![
            TableDefinition::new("orders")
                .column(ColumnDefinition::new("id", "int").primary_key())
                .column(ColumnDefinition::new("customer_id", "int").references("customers", "id")),
        ]);
        let topology = SchemaTopology::build(&schema);

        assert!(topology.relationships().is_empty());
        // The annotation itself is kept on the column.
        let column = topology.column(&ColumnRef::new("orders", "customer_id")).unwrap();
        assert!(column.foreign_key.is_some());
    }

    #[test]
    fn test_reference_to_non_key_column_dropped() {
        let schema = SchemaDefinition::new(vec![
            TableDefinition::new("users")
                .column(ColumnDefinition::new("id", "int").primary_key())
                .column(ColumnDefinition::new("email", "text")),
            TableDefinition::new("invites")
                .column(ColumnDefinition::new("email", "text").references("users", "email")),
        ]);
        let topology = SchemaTopology::build(&schema);

        assert!(topology.relationships().is_empty());
    }

    #[test]
    fn test_table_level_composite_key() {
        let mut membership = TableDefinition::new("memberships")
            .column(ColumnDefinition::new("user_id", "int"))
            .column(ColumnDefinition::new("group_id", "int"))
            .column(ColumnDefinition::new("role", "text"));
        membership.primary_key = vec!["user_id".to_string(), "group_id".to_string()];

        let topology = SchemaTopology::build(&SchemaDefinition::new(vec![membership]));
        let table = topology.table("memberships").unwrap();
        let keys: Vec<&str> = table.primary_key_columns().map(|c| c.name.as_str()).collect();

        assert_eq!(keys, vec!["user_id", "group_id"]);
        assert!(table.column("role").unwrap().is_nullable);
    }

    #[test]
    fn test_zero_column_table_kept() {
        let schema = SchemaDefinition::new(vec![TableDefinition::new("placeholder")]);
        let topology = SchemaTopology::build(&schema);

        assert_eq!(topology.tables().len(), 1);
        assert!(topology.table("placeholder").unwrap().columns.is_empty());
    }

    #[test]
    fn test_duplicate_table_keeps_first() {
        let schema = SchemaDefinition::new(vec![
            TableDefinition::new("users").in_schema("auth"),
            TableDefinition::new("users").in_schema("public"),
        ]);
        let topology = SchemaTopology::build(&schema);

        assert_eq!(topology.tables().len(), 1);
        assert_eq!(topology.table("users").unwrap().schema, "auth");
    }

    #[test]
    fn test_self_reference_is_relationship() {
        let schema = SchemaDefinition::new(vec![
            TableDefinition::new("categories")
                .column(ColumnDefinition::new("id", "int").primary_key())
                .column(ColumnDefinition::new("parent_id", "int").references("categories", "id")),
        ]);
        let topology = SchemaTopology::build(&schema);

        assert_eq!(topology.relationships().len(), 1);
        assert!(topology.relationships()[0].is_self_reference());
    }

    #[test]
    fn test_domain_from_comment_forms() {
        assert_eq!(domain_from_comment("@domain auth"), Some("auth".to_string()));
        assert_eq!(domain_from_comment("Users. @domain: auth, core"), Some("auth".to_string()));
        assert_eq!(domain_from_comment("@domain = billing"), Some("billing".to_string()));
        assert_eq!(domain_from_comment("@domain"), None);
        assert_eq!(domain_from_comment("no tag here"), None);
    }

    #[test]
    fn test_schemas_and_domains() {
        let topology = SchemaTopology::build(&blog_schema());

        assert_eq!(topology.schemas(), vec!["public"]);
        assert_eq!(topology.domains(), vec!["auth", "content"]);
    }

    #[test]
    fn test_cache_reuses_snapshot() {
        let mut cache = TopologyCache::new();
        let schema = blog_schema();

        let first = cache.get_or_build(&schema);
        let second = cache.get_or_build(&schema);
        assert!(Arc::ptr_eq(&first, &second));

        let mut changed = schema.clone();
        changed.tables.pop();
        let third = cache.get_or_build(&changed);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.tables().len(), 2);
    }

    #[test]
    fn test_lookups_by_table_and_column() {
        let mut schema = blog_schema();
        schema.tables.push(
            TableDefinition::new("likes")
                .column(ColumnDefinition::new("post_id", "int").references("posts", "id"))
                .column(ColumnDefinition::new("user_id", "int").references("users", "id")),
        );
        let topology = SchemaTopology::build(&schema);

        assert_eq!(topology.declaration_index("users"), Some(0));
        assert_eq!(topology.declaration_index("likes"), Some(3));
        assert_eq!(topology.declaration_index("ghost"), None);

        let from_likes: Vec<&str> = topology
            .relationships_from("likes")
            .map(|r| r.to.table.as_str())
            .collect();
        assert_eq!(from_likes, vec!["posts", "users"]);

        let post_id = ColumnRef::new("posts", "id");
        let into_posts: Vec<&str> = topology
            .relationships_to(&post_id)
            .map(|r| r.from.table.as_str())
            .collect();
        assert_eq!(into_posts, vec!["comments", "likes"]);
        assert_eq!(topology.relationships_from("users").count(), 0);
    }

    #[test]
    fn test_cache_invalidate_rebuilds() {
        let mut cache = TopologyCache::new();
        let schema = blog_schema();

        let first = cache.get_or_build(&schema);
        cache.invalidate();
        let second = cache.get_or_build(&schema);

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.tables(), second.tables());
    }
}
