//! Free-text selection against option lists.
//!
//! The deterministic scorer here is the fallback; flows try the AI
//! selector first and fall back to this when the model is unavailable
//! or answers out of range.

use ai_client::ConversationAi;

use crate::text::normalize;

/// Token-overlap scorer. Score for an option is
/// `hits / max(3, label_token_count)`; highest strictly-positive score
/// wins, first occurrence breaks ties. `None` when nothing overlaps.
pub fn choose_index_by_text(query: &str, labels: &[String]) -> Option<usize> {
    let q = normalize(query);
    if q.is_empty() {
        return None;
    }
    let q_tokens: Vec<&str> = q.split(' ').collect();

    let mut best: Option<usize> = None;
    let mut best_score = 0.0_f64;
    for (i, label) in labels.iter().enumerate() {
        let l = normalize(label);
        let l_tokens: Vec<&str> = l.split(' ').collect();
        let hits = q_tokens.iter().filter(|t| l_tokens.contains(*t)).count();
        let score = hits as f64 / l_tokens.len().max(3) as f64;
        if score > best_score {
            best_score = score;
            best = Some(i);
        }
    }
    best
}

/// AI-first selection with the token scorer as fallback.
pub async fn select_from_list(
    ai: &dyn ConversationAi,
    query: &str,
    labels: &[String],
) -> Option<usize> {
    match ai.select_index(query, labels).await {
        Ok(Some(i)) if i < labels.len() => return Some(i),
        Ok(_) => {}
        Err(err) => tracing::debug!(error = %err, "AI selection unavailable, using scorer"),
    }
    choose_index_by_text(query, labels)
}

/// All query tokens appear as substrings of the haystack. Used as the
/// last matching layer for categories and shirt sizes, where people
/// type fragments ("infantil g", "quadri").
pub fn tokens_all_contained(query: &str, haystack_norm: &str) -> bool {
    let q = normalize(query);
    if q.is_empty() {
        return false;
    }
    q.split(' ').all(|t| haystack_norm.contains(t))
}

/// Expanded search text for a shirt size option: label and code plus
/// the babylook spelling variants people actually type.
pub fn tshirt_search_text(label: &str, code: &str) -> String {
    let base = normalize(&format!("{label} {code}"));
    let mut variants = vec![base.clone()];
    if base.contains("baby look") {
        variants.push(base.replace("baby look", "babylook"));
        variants.push(base.replace("baby look", "bl"));
    }
    if base.contains("babylook") {
        variants.push(base.replace("babylook", "baby look"));
        variants.push(base.replace("babylook", "bl"));
    }
    variants.join(" ")
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scorer_is_deterministic_on_ties() {
        let ls = labels(&["Corrida 5K", "Caminhada 5K"]);
        // "5k" hits both with equal score; first wins, every time
        for _ in 0..10 {
            assert_eq!(choose_index_by_text("5k", &ls), Some(0));
        }
    }

    #[test]
    fn short_labels_use_the_floor_of_three() {
        let ls = labels(&["Corrida 10K", "Corrida 5K noturna especial"]);
        // one hit on a 2-token label scores 1/3, beating 1/4
        assert_eq!(choose_index_by_text("10k", &ls), Some(0));
    }

    #[test]
    fn zero_overlap_yields_none() {
        let ls = labels(&["Corrida 5K", "Caminhada"]);
        assert_eq!(choose_index_by_text("xyz", &ls), None);
        assert_eq!(choose_index_by_text("", &ls), None);
    }

    #[test]
    fn babylook_variants_are_searchable() {
        let hay = tshirt_search_text("Babylook", "BLP");
        assert!(tokens_all_contained("baby look p", &hay));
        assert!(tokens_all_contained("babylook", &hay));
        assert!(tokens_all_contained("bl", &hay));
    }

    #[test]
    fn fragments_match_by_containment() {
        let hay = normalize("Quadriatlo Individual — R$ 180,00");
        assert!(tokens_all_contained("quadri", &hay));
        assert!(!tokens_all_contained("duatlo", &hay));
    }
}
