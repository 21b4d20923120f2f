//! Project dependency network: projects linked by the tables they share.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::index::decode_tables;
use crate::store::MetadataStore;
use crate::types::CatalogEntry;

/// Tables two projects have in common.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedLink {
    pub tables: Vec<String>,
}

impl SharedLink {
    pub fn weight(&self) -> usize {
        self.tables.len()
    }
}

/// One edge of the network, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkLink {
    pub source: String,
    pub target: String,
    pub weight: usize,
    pub tables: Vec<String>,
}

/// Undirected graph with one node per project and one edge per pair of
/// projects sharing at least one table.
#[derive(Debug)]
pub struct DependencyNetwork {
    pub graph: UnGraph<String, SharedLink>,
    pub project_to_index: HashMap<String, NodeIndex>,
}

impl DependencyNetwork {
    /// Build from catalog entries. Every project becomes a node, including
    /// projects that share nothing.
    pub fn from_catalog(catalog: &[CatalogEntry]) -> Self {
        let mut graph = UnGraph::<String, SharedLink>::new_undirected();
        let mut project_to_index: HashMap<String, NodeIndex> = HashMap::new();
        let mut owners: BTreeMap<String, BTreeSet<NodeIndex>> = BTreeMap::new();

        for entry in catalog {
            let idx = *project_to_index
                .entry(entry.project.clone())
                .or_insert_with(|| graph.add_node(entry.project.clone()));
            for table in decode_tables(entry) {
                owners.entry(table.name).or_default().insert(idx);
            }
        }

        // Table names arrive in ascending order, so each link's list is sorted.
        let mut links: BTreeMap<(NodeIndex, NodeIndex), SharedLink> = BTreeMap::new();
        for (table, projects) in owners {
            let projects: Vec<NodeIndex> = projects.into_iter().collect();
            for (i, &a) in projects.iter().enumerate() {
                for &b in &projects[i + 1..] {
                    links.entry((a, b)).or_default().tables.push(table.clone());
                }
            }
        }
        for ((a, b), link) in links {
            graph.add_edge(a, b, link);
        }

        Self {
            graph,
            project_to_index,
        }
    }

    pub async fn from_store(store: &dyn MetadataStore) -> crate::error::Result<Self> {
        let catalog = store.load_catalog().await?;
        Ok(Self::from_catalog(&catalog))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// `2E / (N(N-1))`; 0 for fewer than two projects.
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        (2 * self.edge_count()) as f64 / (n * (n - 1)) as f64
    }

    /// Number of projects `project` shares a table with, `None` if unknown.
    pub fn degree(&self, project: &str) -> Option<usize> {
        self.project_to_index
            .get(project)
            .map(|&idx| self.graph.neighbors(idx).count())
    }

    /// All edges, heaviest first, then by project names.
    pub fn links(&self) -> Vec<NetworkLink> {
        let mut links: Vec<NetworkLink> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let link = &self.graph[e];
                let (source, target) = {
                    let (a, b) = (&self.graph[a], &self.graph[b]);
                    if a <= b { (a, b) } else { (b, a) }
                };
                Some(NetworkLink {
                    source: source.clone(),
                    target: target.clone(),
                    weight: link.weight(),
                    tables: link.tables.clone(),
                })
            })
            .collect();
        links.sort_by(|x, y| {
            y.weight
                .cmp(&x.weight)
                .then_with(|| x.source.cmp(&y.source))
                .then_with(|| x.target.cmp(&y.target))
        });
        links
    }
}
