use std::collections::{BTreeMap, HashSet};

use url::Url;

use crate::types::{ItemCategory, ITEM_CATEGORY_ORDER};

/// Video/streaming quality tokens, highest to lowest. Grounded in
/// `original_source/webscraper/postprocessing.py`'s `COMMON_RESOLUTIONS`.
const COMMON_RESOLUTIONS: [&str; 4] = ["hd_720", "sd_480", "sd_360", "sd_240"];

/// Normalises, collapses resolution variants, deduplicates across
/// categories and prunes empty categories, in that fixed order (spec.md
/// §4.3).
pub fn postprocess(
    items: BTreeMap<ItemCategory, Vec<String>>,
    base_url: &str,
) -> BTreeMap<ItemCategory, Vec<String>> {
    let items = normalize(items, base_url);
    let items = collapse_resolutions_per_category(items);
    let items = dedup_across_categories(items);
    prune_empty(items)
}

/// Resolves every URL against `base_url` and drops exact duplicates within a
/// category, keeping first occurrence.
fn normalize(
    items: BTreeMap<ItemCategory, Vec<String>>,
    base_url: &str,
) -> BTreeMap<ItemCategory, Vec<String>> {
    let base = Url::parse(base_url).ok();

    items
        .into_iter()
        .map(|(category, urls)| {
            let mut seen = HashSet::new();
            let absolute = urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .map(|u| absolutize(&u, base.as_ref()))
                .filter(|u| seen.insert(u.clone()))
                .collect();
            (category, absolute)
        })
        .collect()
}

fn absolutize(url: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base.join(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string()),
        None => url.to_string(),
    }
}

/// For URLs that differ only by a resolution token sharing the same prefix
/// and suffix, keeps only the highest-quality representative. URLs that
/// don't carry a known resolution token, or whose resolution group has no
/// sibling, pass through unchanged. Applies to `streaming` only (spec.md
/// §4.3 step 2) — images and videos pass through untouched even if their
/// URLs happen to contain a resolution-shaped substring.
fn collapse_resolutions_per_category(
    items: BTreeMap<ItemCategory, Vec<String>>,
) -> BTreeMap<ItemCategory, Vec<String>> {
    items
        .into_iter()
        .map(|(category, urls)| {
            if category == ItemCategory::Streaming {
                (category, collapse_resolutions(urls))
            } else {
                (category, urls)
            }
        })
        .collect()
}

fn collapse_resolutions(urls: Vec<String>) -> Vec<String> {
    let mut groups: BTreeMap<(String, String), Vec<(usize, String)>> = BTreeMap::new();
    let mut group_order = Vec::new();
    let mut passthrough_order = Vec::new();
    let mut passthrough = BTreeMap::new();
    let mut seq = 0usize;

    for url in urls {
        let position = seq;
        seq += 1;
        match resolution_key(&url) {
            Some((prefix, suffix, rank)) => {
                let key = (prefix, suffix);
                if !groups.contains_key(&key) {
                    group_order.push((position, key.clone()));
                }
                groups.entry(key).or_default().push((rank, url));
            }
            None => {
                passthrough_order.push(position);
                passthrough.insert(position, url);
            }
        }
    }

    let mut slots: BTreeMap<usize, String> = passthrough;

    for (position, key) in group_order {
        let mut variants = groups.remove(&key).unwrap_or_default();
        variants.sort_by_key(|(rank, _)| *rank);
        if let Some((_, winner)) = variants.into_iter().next() {
            slots.insert(position, winner);
        }
    }

    slots.into_values().collect()
}

fn resolution_key(url: &str) -> Option<(String, String, usize)> {
    for (rank, token) in COMMON_RESOLUTIONS.iter().enumerate() {
        if let Some(idx) = url.find(token) {
            let prefix = url[..idx].to_string();
            let suffix = url[idx + token.len()..].to_string();
            return Some((prefix, suffix, rank));
        }
    }
    None
}

/// A URL that already appears in an earlier category (iterated in the fixed
/// `ITEM_CATEGORY_ORDER`) is dropped from every later category.
fn dedup_across_categories(
    mut items: BTreeMap<ItemCategory, Vec<String>>,
) -> BTreeMap<ItemCategory, Vec<String>> {
    let mut seen = HashSet::new();
    for category in ITEM_CATEGORY_ORDER {
        if let Some(urls) = items.get_mut(&category) {
            urls.retain(|u| seen.insert(u.clone()));
        }
    }
    items
}

fn prune_empty(items: BTreeMap<ItemCategory, Vec<String>>) -> BTreeMap<ItemCategory, Vec<String>> {
    items.into_iter().filter(|(_, urls)| !urls.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: Vec<(ItemCategory, Vec<&str>)>) -> BTreeMap<ItemCategory, Vec<String>> {
        pairs
            .into_iter()
            .map(|(c, urls)| (c, urls.into_iter().map(str::to_string).collect()))
            .collect()
    }

    #[test]
    fn relative_urls_become_absolute() {
        let input = items(vec![(ItemCategory::Images, vec!["/a.jpg"])]);
        let out = postprocess(input, "https://example.com/page");
        assert_eq!(out[&ItemCategory::Images], vec!["https://example.com/a.jpg"]);
    }

    #[test]
    fn duplicate_urls_within_a_category_are_collapsed() {
        let input = items(vec![(ItemCategory::Images, vec!["/a.jpg", "/a.jpg"])]);
        let out = postprocess(input, "https://example.com/");
        assert_eq!(out[&ItemCategory::Images].len(), 1);
    }

    #[test]
    fn highest_resolution_variant_wins_in_its_group() {
        let input = items(vec![(
            ItemCategory::Streaming,
            vec![
                "https://cdn.example.com/v/sd_360/clip.mp4",
                "https://cdn.example.com/v/hd_720/clip.mp4",
                "https://cdn.example.com/v/sd_240/clip.mp4",
            ],
        )]);
        let out = postprocess(input, "https://example.com/");
        assert_eq!(
            out[&ItemCategory::Streaming],
            vec!["https://cdn.example.com/v/hd_720/clip.mp4".to_string()]
        );
    }

    #[test]
    fn singleton_resolution_group_passes_through_unchanged() {
        let input = items(vec![(
            ItemCategory::Streaming,
            vec!["https://cdn.example.com/v/sd_480/only.mp4"],
        )]);
        let out = postprocess(input, "https://example.com/");
        assert_eq!(
            out[&ItemCategory::Streaming],
            vec!["https://cdn.example.com/v/sd_480/only.mp4".to_string()]
        );
    }

    #[test]
    fn resolution_collapse_does_not_apply_outside_streaming() {
        let input = items(vec![(
            ItemCategory::Videos,
            vec![
                "https://cdn.example.com/v/sd_360/clip.mp4",
                "https://cdn.example.com/v/hd_720/clip.mp4",
            ],
        )]);
        let out = postprocess(input, "https://example.com/");
        assert_eq!(out[&ItemCategory::Videos].len(), 2);
    }

    #[test]
    fn url_in_earlier_category_is_dropped_from_later_category() {
        let input = items(vec![
            (ItemCategory::Images, vec!["https://example.com/shared.jpg"]),
            (ItemCategory::Videos, vec!["https://example.com/shared.jpg"]),
        ]);
        let out = postprocess(input, "https://example.com/");
        assert_eq!(out[&ItemCategory::Images], vec!["https://example.com/shared.jpg"]);
        assert!(!out.contains_key(&ItemCategory::Videos));
    }

    #[test]
    fn empty_categories_are_pruned() {
        let input = items(vec![(ItemCategory::Images, vec![]), (ItemCategory::Videos, vec!["/v.mp4"])]);
        let out = postprocess(input, "https://example.com/");
        assert!(!out.contains_key(&ItemCategory::Images));
        assert!(out.contains_key(&ItemCategory::Videos));
    }

    #[test]
    fn postprocess_is_idempotent() {
        let input = items(vec![
            (ItemCategory::Images, vec!["/a.jpg", "/a.jpg"]),
            (
                ItemCategory::Streaming,
                vec![
                    "https://cdn.example.com/v/sd_360/clip.mp4",
                    "https://cdn.example.com/v/hd_720/clip.mp4",
                ],
            ),
        ]);
        let once = postprocess(input, "https://example.com/");
        let twice = postprocess(once.clone(), "https://example.com/");
        assert_eq!(once, twice);
    }
}
