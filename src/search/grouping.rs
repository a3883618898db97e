//! File-level aggregation of chunk hits.

use crate::document::{FileHit, SearchResult};
use std::collections::HashMap;

/// Keep the best chunk per file, ordered by descending score and capped at `top_files`.
///
/// A later chunk replaces the current best only with a strictly greater score, so equal
/// scores keep the chunk seen first. Files with equal scores keep first-seen order.
pub fn group_by_file(results: Vec<SearchResult>, top_files: usize) -> Vec<FileHit> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut best: Vec<FileHit> = Vec::new();

    for result in results {
        match slots.get(&result.file_id) {
            Some(&slot) => {
                if result.score > best[slot].score {
                    best[slot].score = result.score;
                    best[slot].content = result.content;
                }
            }
            None => {
                slots.insert(result.file_id.clone(), best.len());
                best.push(FileHit {
                    file_id: result.file_id,
                    score: result.score,
                    content: result.content,
                });
            }
        }
    }

    best.sort_by(|a, b| b.score.total_cmp(&a.score));
    best.truncate(top_files);
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn hit(file_id: &str, score: f32, content: &str) -> SearchResult {
        SearchResult {
            file_id: file_id.into(),
            score,
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn keeps_best_chunk_per_file() {
        let grouped = group_by_file(
            vec![
                hit("a", 0.9, "a-best"),
                hit("b", 0.8, "b-best"),
                hit("a", 0.7, "a-worse"),
                hit("c", 0.6, "c-only"),
            ],
            5,
        );

        let summary: Vec<_> = grouped
            .iter()
            .map(|file| (file.file_id.as_str(), file.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("a", "a-best"), ("b", "b-best"), ("c", "c-only")]
        );
    }

    #[test]
    fn ties_keep_first_seen_chunk() {
        let grouped = group_by_file(vec![hit("a", 0.5, "first"), hit("a", 0.5, "second")], 5);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].content, "first");
    }

    #[test]
    fn negative_scores_are_kept() {
        let grouped = group_by_file(vec![hit("a", -0.2, "only")], 5);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].content, "only");
        assert!((grouped[0].score + 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn truncates_to_top_files() {
        let grouped = group_by_file(
            vec![hit("a", 0.1, ""), hit("b", 0.3, ""), hit("c", 0.2, "")],
            2,
        );
        let ids: Vec<_> = grouped.iter().map(|file| file.file_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(group_by_file(Vec::new(), 5).is_empty());
    }

    fn arb_hits() -> impl Strategy<Value = Vec<SearchResult>> {
        proptest::collection::vec(("[a-e]", -1.0f32..1.0f32), 0..40).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(idx, (file_id, score))| hit(&file_id, score, &format!("chunk-{idx}")))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn grouping_is_unique_sorted_and_maximal(hits in arb_hits(), top_files in 0usize..8) {
            let grouped = group_by_file(hits.clone(), top_files);

            prop_assert!(grouped.len() <= top_files);
            let ids: HashSet<_> = grouped.iter().map(|file| file.file_id.clone()).collect();
            prop_assert_eq!(ids.len(), grouped.len());
            for pair in grouped.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for file in &grouped {
                let max = hits
                    .iter()
                    .filter(|chunk| chunk.file_id == file.file_id)
                    .map(|chunk| chunk.score)
                    .fold(f32::NEG_INFINITY, f32::max);
                prop_assert_eq!(file.score, max);
            }
        }
    }
}
