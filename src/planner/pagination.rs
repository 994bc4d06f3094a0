//! Contiguous chunking of a dimension's items.

/// Number of chunks `n` items split into at `page_size` per chunk
pub fn page_count(n: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    n.div_ceil(page_size)
}

/// Split items into contiguous chunks of `page_size`; the last chunk may be shorter.
///
/// The chunks partition the input: concatenated in order they reproduce it exactly.
pub fn chunk_items(items: &[String], page_size: usize) -> Vec<Vec<String>> {
    if page_size == 0 {
        return Vec::new();
    }
    items.chunks(page_size).map(<[String]>::to_vec).collect()
}
