//! Assertions over downloaded artifacts

use fetch_pipeline::ResultItem;
use std::collections::HashSet;
use std::path::Path;

/// Every success points at a distinct, readable file inside `dir`
pub fn assert_artifacts_on_disk(results: &[ResultItem], dir: &Path) {
    let mut paths = HashSet::new();
    for artifact in results.iter().filter_map(ResultItem::artifact) {
        assert!(
            artifact.path.starts_with(dir),
            "artifact {} outside {}",
            artifact.path.display(),
            dir.display()
        );
        let bytes = std::fs::read(&artifact.path)
            .unwrap_or_else(|e| panic!("artifact {} unreadable: {e}", artifact.path.display()));
        assert_eq!(bytes.len() as u64, artifact.size_bytes);
        assert!(paths.insert(artifact.path.clone()), "artifact path reused");
    }
}

/// Number of files directly inside `dir`; zero when it does not exist
pub fn count_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(Result::ok).count(),
        Err(_) => 0,
    }
}

/// Contents of every artifact among `results`, sorted
pub fn sorted_contents(results: &[ResultItem]) -> Vec<Vec<u8>> {
    let mut contents: Vec<Vec<u8>> = results
        .iter()
        .filter_map(ResultItem::artifact)
        .map(|artifact| {
            std::fs::read(&artifact.path)
                .unwrap_or_else(|e| panic!("artifact {} unreadable: {e}", artifact.path.display()))
        })
        .collect();
    contents.sort();
    contents
}
