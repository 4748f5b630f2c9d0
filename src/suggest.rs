//! Edit-distance based suggestions for unrecognized argument tokens.

/// Levenshtein distance with unit cost for insert, delete and substitute.
///
/// Argument names are short, so the full dynamic-programming matrix is
/// computed without any early exit.
pub(crate) fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = (matrix[i - 1][j - 1] + cost)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j] + 1);
        }
    }
    matrix[a.len()][b.len()]
}

/// Pick the candidates closest to `target` as correction hints.
///
/// Every candidate at the minimum distance is returned, shortest first and
/// otherwise in input order. When even the best distance is at least the
/// length of `target` the input is too dissimilar for a useful hint and the
/// result is empty.
pub(crate) fn suggest<'a>(target: &str, candidates: &[&'a str]) -> Vec<&'a str> {
    let distances: Vec<usize> = candidates.iter().map(|c| distance(target, c)).collect();
    let best = match distances.iter().min() {
        Some(best) => *best,
        None => return Vec::new(),
    };
    if best >= target.chars().count() {
        return Vec::new();
    }
    let mut matched: Vec<&str> = candidates
        .iter()
        .zip(&distances)
        .filter(|(_, d)| **d == best)
        .map(|(c, _)| *c)
        .collect();
    matched.sort_by_key(|c| c.chars().count());
    matched
}
