//! Merge per-target predictions into one ranked list per molecule.

use std::cmp::Ordering;
use std::collections::HashMap;

use bindora_common::Prediction;

/// Collapse predictions for the same molecule across targets.
///
/// Each molecule keeps its best-scoring prediction, with `num_targets_tested`
/// set to the number of predictions seen for it. Equal best scores resolve to
/// the lowest target digest so the result does not depend on input order.
/// Output is filtered by `min_score`, sorted by score descending then
/// molecule id, and truncated to `max_results`.
pub fn aggregate(predictions: Vec<Prediction>, min_score: f64, max_results: usize) -> Vec<Prediction> {
    let mut groups: HashMap<String, (Prediction, usize)> = HashMap::new();

    for prediction in predictions {
        match groups.get_mut(&prediction.molecule_id) {
            Some((best, count)) => {
                *count += 1;
                if beats(&prediction, best) {
                    *best = prediction;
                }
            }
            None => {
                groups.insert(prediction.molecule_id.clone(), (prediction, 1));
            }
        }
    }

    let mut merged: Vec<Prediction> = groups
        .into_values()
        .map(|(mut best, count)| {
            best.num_targets_tested = count;
            best
        })
        .filter(|p| p.score >= min_score)
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.molecule_id.cmp(&b.molecule_id))
    });
    merged.truncate(max_results);
    merged
}

fn beats(candidate: &Prediction, current: &Prediction) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.target_digest < current.target_digest,
    }
}
