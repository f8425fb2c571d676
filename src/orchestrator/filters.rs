use tracing::debug;

use crate::rag::types::ScoredRecord;

/// Substrings of lower-cased paths that mark deployment and infrastructure files.
pub const DEPLOYMENT_FILE_PATTERNS: &[&str] = &[
    // docker
    "dockerfile",
    "docker-compose",
    ".dockerignore",
    // kubernetes manifests
    "deployment.yaml",
    "deployment.yml",
    "service.yaml",
    "service.yml",
    "configmap.yaml",
    "configmap.yml",
    "ingress.yaml",
    "ingress.yml",
    "statefulset.yaml",
    "statefulset.yml",
    "daemonset.yaml",
    "daemonset.yml",
    // kubernetes directories
    ".k8s/",
    "/k8s/",
    "k8sdeploy/",
    "/k8sdeploy/",
    "k8sdeployments/",
    "k8sservices/",
    "k8sconfigmaps/",
    "k8singresses/",
    "k8sstatefulsets/",
    "k8sdaemonsets/",
    "k8sjobs/",
    "k8scronjobs/",
    "k8spods/",
    "k8snodes/",
    "k8snamespaces/",
    // helm
    "helm",
    "/charts/",
    "chart.yaml",
    "chart.yml",
    "values.yaml",
    "values.yml",
    "templates/",
];

pub fn is_deployment_file(file_path: &str) -> bool {
    let lower = file_path.to_lowercase();
    DEPLOYMENT_FILE_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Drops deployment files from retrieved results, keeping the order of the rest.
pub fn exclude_deployment_files(nodes: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
    let before = nodes.len();
    let kept: Vec<ScoredRecord> = nodes
        .into_iter()
        .filter(|node| !is_deployment_file(node.file_path()))
        .collect();
    if kept.len() != before {
        debug!(dropped = before - kept.len(), "Filtered deployment files");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::language::Language;
    use crate::rag::types::{ChunkMetadata, StoredRecord};

    fn node(path: &str, score: f32) -> ScoredRecord {
        ScoredRecord {
            record: StoredRecord {
                id: format!("{path}#chunk-0"),
                text: String::new(),
                metadata: ChunkMetadata {
                    file_path: path.to_string(),
                    file_name: String::new(),
                    language: Language::Unknown,
                    file_extension: String::new(),
                    chunk_index: 0,
                    file_summary: None,
                },
            },
            score,
        }
    }

    #[test]
    fn infrastructure_paths_are_recognized() {
        assert!(is_deployment_file("/repo/Dockerfile"));
        assert!(is_deployment_file("/repo/deploy/docker-compose.prod.yml"));
        assert!(is_deployment_file("/repo/k8s/api/Deployment.yaml"));
        assert!(is_deployment_file("/repo/ops/.k8s/job.yaml"));
        assert!(is_deployment_file("/repo/charts/api/values.yaml"));
        assert!(is_deployment_file("/repo/src/email/templates/welcome.md"));
        assert!(!is_deployment_file("/repo/src/app.py"));
        assert!(!is_deployment_file("/repo/docs/DOCUMENTATION.md"));
    }

    #[test]
    fn filter_preserves_order_of_remaining_nodes() {
        let nodes = vec![
            node("/repo/src/a.py", 0.9),
            node("/repo/Dockerfile", 0.8),
            node("/repo/src/b.py", 0.7),
            node("/repo/helm/values.yaml", 0.6),
        ];
        let kept = exclude_deployment_files(nodes);
        let paths: Vec<&str> = kept.iter().map(|n| n.file_path()).collect();
        assert_eq!(paths, vec!["/repo/src/a.py", "/repo/src/b.py"]);
    }
}
