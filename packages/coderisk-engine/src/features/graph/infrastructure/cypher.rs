//! Cypher statement rendering.
//!
//! One function per mutation/read shape; all values travel as bound
//! parameters, never spliced into statement text. Node batches are
//! UNWIND-style bulk MERGEs per label.

use serde_json::{json, Value};

use crate::features::graph::domain::{
    EdgeFilter, EdgeKind, GraphEdge, GraphFlavor, GraphNode, NodeLabel, ReadQuery,
};

/// A statement plus its bound parameters.
pub type Statement = (String, Value);

/// Bulk node MERGE for one label.
pub fn merge_nodes_statement(label: NodeLabel, nodes: &[&GraphNode]) -> Statement {
    let rows: Vec<Value> = nodes
        .iter()
        .map(|node| {
            let mut props = node.props.clone();
            props.insert("id".into(), json!(node.id()));
            props.insert("repo_id".into(), json!(node.repo_id));
            json!({ "id": node.id(), "props": Value::Object(props) })
        })
        .collect();

    (
        format!(
            "UNWIND $rows AS row MERGE (n:{} {{id: row.id}}) SET n += row.props",
            label.as_str()
        ),
        json!({ "rows": rows }),
    )
}

/// Bulk edge MERGE for one `(kind, from-label, to-label)` group.
///
/// Endpoints are MATCHed, not MERGEd, so an edge whose endpoint is
/// missing silently creates nothing rather than fabricating a node.
pub fn merge_edges_statement(
    kind: EdgeKind,
    from_label: NodeLabel,
    to_label: NodeLabel,
    edges: &[&GraphEdge],
) -> Statement {
    let rows: Vec<Value> = edges
        .iter()
        .map(|edge| {
            json!({
                "from_id": edge.from_id(),
                "to_id": edge.to_id(),
                "props": Value::Object(edge.props.clone()),
            })
        })
        .collect();

    (
        format!(
            "UNWIND $rows AS row \
             MATCH (a:{} {{id: row.from_id}}) \
             MATCH (b:{} {{id: row.to_id}}) \
             MERGE (a)-[r:{}]->(b) SET r += row.props",
            from_label.as_str(),
            to_label.as_str(),
            kind.as_str()
        ),
        json!({ "rows": rows }),
    )
}

pub fn delete_edges_statement(filter: &EdgeFilter) -> Statement {
    let kinds = filter
        .kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join("|");

    (
        format!(
            "MATCH (a)-[r:{}]->() WHERE a.repo_id = $repo_id DELETE r",
            kinds
        ),
        json!({ "repo_id": filter.repo_id }),
    )
}

pub fn delete_repo_statement(repo_id: i64) -> Statement {
    (
        "MATCH (n) WHERE n.repo_id = $repo_id DETACH DELETE n".to_string(),
        json!({ "repo_id": repo_id }),
    )
}

/// Uniqueness constraints plus the lookup indexes, per flavor.
pub fn schema_statements(flavor: GraphFlavor) -> Vec<Statement> {
    let mut statements = Vec::new();

    for label in NodeLabel::ALL {
        let ddl = match flavor {
            GraphFlavor::Neo4j => format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                label.as_str()
            ),
            GraphFlavor::Memgraph => format!(
                "CREATE CONSTRAINT ON (n:{}) ASSERT n.id IS UNIQUE",
                label.as_str()
            ),
        };
        statements.push((ddl, json!({})));
    }

    let indexes = [
        (NodeLabel::File, "canonical_path"),
        (NodeLabel::Commit, "sha"),
        (NodeLabel::Developer, "email"),
        (NodeLabel::PullRequest, "number"),
        (NodeLabel::Issue, "number"),
    ];
    for (label, property) in indexes {
        let ddl = match flavor {
            GraphFlavor::Neo4j => format!(
                "CREATE INDEX IF NOT EXISTS FOR (n:{}) ON (n.repo_id, n.{})",
                label.as_str(),
                property
            ),
            GraphFlavor::Memgraph => {
                format!("CREATE INDEX ON :{}({})", label.as_str(), property)
            }
        };
        statements.push((ddl, json!({})));
    }

    statements
}

pub fn read_statement(query: &ReadQuery) -> Statement {
    match query {
        ReadQuery::StructuralCoupling {
            repo_id,
            canonical_path,
        } => (
            "MATCH (f:File {id: $file_id})-[:IMPORTS|CALLS]-(n) \
             RETURN count(DISTINCT n) AS count"
                .to_string(),
            json!({ "file_id": file_id(*repo_id, canonical_path) }),
        ),

        ReadQuery::CoChangeRows {
            repo_id,
            canonical_path,
            since_epoch,
        } => (
            "MATCH (f:File {id: $file_id})<-[:MODIFIED]-(c:Commit) \
             WHERE c.on_default_branch AND c.committed_at >= $since \
             WITH f, collect(c) AS cs, count(c) AS total \
             UNWIND cs AS c \
             MATCH (c)-[:MODIFIED]->(o:File) WHERE o <> f \
             RETURN o.canonical_path AS other_path, count(DISTINCT c) AS together, total"
                .to_string(),
            json!({
                "file_id": file_id(*repo_id, canonical_path),
                "since": since_epoch,
            }),
        ),

        ReadQuery::IncidentRows {
            repo_id,
            canonical_paths,
            since_epoch,
        } => (
            "MATCH (f:File) WHERE f.repo_id = $repo_id AND f.canonical_path IN $paths \
             MATCH (f)<-[:MODIFIED]-(c:Commit) \
             MATCH (i:Issue) \
             WHERE i.repo_id = $repo_id AND i.state = 'closed' AND i.closed_at >= $since \
               AND ((i)-[:CLOSED_BY|FIXED_BY]->(c) \
                    OR (i)-[:REFERENCES|FIXED_BY]->(:PullRequest)-[:MERGED_AS]->(c)) \
             RETURN DISTINCT i.number AS issue_number, i.title AS title, \
                    i.closed_at AS closed_at"
                .to_string(),
            json!({
                "repo_id": repo_id,
                "paths": canonical_paths,
                "since": since_epoch,
            }),
        ),

        ReadQuery::OwnershipRows {
            repo_id,
            canonical_paths,
        } => (
            "MATCH (f:File) WHERE f.repo_id = $repo_id AND f.canonical_path IN $paths \
             MATCH (f)<-[:MODIFIED]-(c:Commit)<-[:AUTHORED]-(d:Developer) \
             RETURN d.email AS developer, count(DISTINCT c) AS commits, \
                    min(c.committed_at) AS first_at, max(c.committed_at) AS last_at \
             ORDER BY commits DESC"
                .to_string(),
            json!({ "repo_id": repo_id, "paths": canonical_paths }),
        ),

        ReadQuery::BlastRadius {
            repo_id,
            canonical_path,
            since_epoch,
        } => (
            "MATCH (f:File {id: $file_id})<-[:IMPORTS|CALLS]-(dep:File) \
             OPTIONAL MATCH (dep)<-[:MODIFIED]-(:Commit)<-[:CLOSED_BY|FIXED_BY]-(i:Issue) \
             WHERE i.state = 'closed' AND i.closed_at >= $since \
             WITH dep, collect(DISTINCT i) AS direct \
             OPTIONAL MATCH (dep)<-[:MODIFIED]-(:Commit)<-[:MERGED_AS]-(p:PullRequest)\
             <-[:REFERENCES|FIXED_BY]-(j:Issue) \
             WHERE j.state = 'closed' AND j.closed_at >= $since \
             WITH dep, direct, collect(DISTINCT j) AS via_pr \
             RETURN dep.canonical_path AS dependent_path, \
                    size(direct) + size(via_pr) AS incident_count \
             ORDER BY dependent_path"
                .to_string(),
            json!({
                "file_id": file_id(*repo_id, canonical_path),
                "since": since_epoch,
            }),
        ),

        ReadQuery::EdgesOfKind { repo_id, kind } => (
            format!(
                "MATCH (a)-[r:{}]->(b) WHERE a.repo_id = $repo_id \
                 RETURN a.id AS from_id, b.id AS to_id, properties(r) AS props \
                 ORDER BY from_id, to_id",
                kind.as_str()
            ),
            json!({ "repo_id": repo_id }),
        ),

        ReadQuery::NodesByLabel { repo_id, label } => (
            format!(
                "MATCH (n:{}) WHERE n.repo_id = $repo_id \
                 RETURN n.id AS id, properties(n) AS props ORDER BY id",
                label.as_str()
            ),
            json!({ "repo_id": repo_id }),
        ),

        ReadQuery::CountsByLabel { repo_id } => (
            "MATCH (n) WHERE n.repo_id = $repo_id \
             UNWIND labels(n) AS label \
             RETURN label, count(*) AS count"
                .to_string(),
            json!({ "repo_id": repo_id }),
        ),

        ReadQuery::LinkQualitySummary { repo_id } => (
            "MATCH (i:Issue) WHERE i.repo_id = $repo_id AND i.state = 'closed' \
             WITH count(i) AS closed_issues \
             OPTIONAL MATCH (j:Issue)-[:FIXED_BY]->() WHERE j.repo_id = $repo_id \
             RETURN closed_issues, count(DISTINCT j) AS fixed_links"
                .to_string(),
            json!({ "repo_id": repo_id }),
        ),
    }
}

fn file_id(repo_id: i64, canonical_path: &str) -> String {
    crate::shared::models::composite_id(repo_id, NodeLabel::File.type_tag(), canonical_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_statement_merges_on_composite_id() {
        let node = GraphNode::new(1, NodeLabel::File, "a.rs");
        let (statement, params) = merge_nodes_statement(NodeLabel::File, &[&node]);

        assert!(statement.contains("MERGE (n:File {id: row.id})"));
        assert_eq!(params["rows"][0]["id"], json!("1:file:a.rs"));
        assert_eq!(params["rows"][0]["props"]["repo_id"], json!(1));
    }

    #[test]
    fn test_edge_statement_matches_endpoints() {
        let edge = GraphEdge::new(
            1,
            EdgeKind::FixedBy,
            crate::features::graph::domain::NodeRef::new(NodeLabel::Issue, "7"),
            crate::features::graph::domain::NodeRef::new(NodeLabel::PullRequest, "9"),
        );
        let (statement, _) =
            merge_edges_statement(EdgeKind::FixedBy, NodeLabel::Issue, NodeLabel::PullRequest, &[&edge]);

        assert!(statement.contains("MATCH (a:Issue {id: row.from_id})"));
        assert!(statement.contains("MATCH (b:PullRequest {id: row.to_id})"));
        assert!(statement.contains("MERGE (a)-[r:FIXED_BY]->(b)"));
    }

    #[test]
    fn test_schema_ddl_differs_by_flavor() {
        let neo4j = schema_statements(GraphFlavor::Neo4j);
        let memgraph = schema_statements(GraphFlavor::Memgraph);

        assert!(neo4j[0].0.contains("IF NOT EXISTS"));
        assert!(memgraph[0].0.contains("ASSERT"));
        assert_eq!(neo4j.len(), memgraph.len());
    }

    #[test]
    fn test_read_statements_bind_parameters_only() {
        let (statement, params) = read_statement(&ReadQuery::IncidentRows {
            repo_id: 3,
            canonical_paths: vec!["core/auth.go".into()],
            since_epoch: 1_700_000_000,
        });

        assert!(statement.contains("$paths"));
        assert!(!statement.contains("core/auth.go"));
        assert_eq!(params["paths"], json!(["core/auth.go"]));
    }
}
