//! Article-range parsing for OVER, XOVER and LISTGROUP arguments.

/// Parse a range spec of the form `N`, `N-` or `N-M` into `[low, high]`.
///
/// An empty spec means everything. A single number is read as an upper bound
/// (`OVER 5` means "up to 5"), not as `[N, N]`. Unparsable fields resolve to
/// `0` for the lower bound and `u64::MAX` for the upper, so `3-` reads as
/// `[3, MAX]`. Callers that need a positive lower bound validate afterwards.
pub fn parse_range(spec: &str) -> (u64, u64) {
    if spec.is_empty() {
        return (0, u64::MAX);
    }
    // Only the first two dash-separated fields count; anything after a
    // second dash is discarded.
    let mut parts = spec.split('-');
    let first = parts.next().unwrap_or("");
    match parts.next() {
        None => (0, first.parse().unwrap_or(u64::MAX)),
        Some(second) => (first.parse().unwrap_or(0), second.parse().unwrap_or(u64::MAX)),
    }
}
