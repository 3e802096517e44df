use crate::engine::FacetDistribution;
use indexmap::IndexMap;

/// Sum per-index facet distributions, highest count first. Equal counts
/// order by facet value so the result is stable.
pub fn merge_facets<I>(distributions: I) -> IndexMap<String, u64>
where
    I: IntoIterator<Item = FacetDistribution>,
{
    let mut merged: IndexMap<String, u64> = IndexMap::new();
    for distribution in distributions {
        for (value, count) in distribution {
            *merged.entry(value).or_insert(0) += count;
        }
    }
    merged.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));
    merged
}
