//! Bounding the number of folding ranges sent to the client.

use tower_lsp::lsp_types::FoldingRange;

/// Reduce `ranges` to at most `limit` entries, dropping the deepest nesting first.
///
/// Ranges are sorted by start line then end line and given a nesting level.
/// Ranges that cross the enclosing range, or start on the same line as it, get
/// no level and are dropped. Every level that fits entirely is kept; the first
/// level that does not fit is filled in sorted order up to the remaining quota.
/// Input within the limit is returned unchanged.
pub fn limit_folding_ranges(mut ranges: Vec<FoldingRange>, limit: usize) -> Vec<FoldingRange> {
    if ranges.len() <= limit {
        return ranges;
    }

    ranges.sort_by_key(|r| (r.start_line, r.end_line));

    let levels = nesting_levels(&ranges);
    let mut counts: Vec<usize> = Vec::new();
    for level in levels.iter().flatten() {
        if counts.len() <= *level {
            counts.resize(level + 1, 0);
        }
        counts[*level] += 1;
    }

    let mut kept = 0;
    let mut cutoff = usize::MAX;
    for (level, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        if kept + count > limit {
            cutoff = level;
            break;
        }
        kept += count;
    }

    ranges
        .into_iter()
        .zip(levels)
        .filter_map(|(range, level)| {
            let level = level?;
            if level < cutoff {
                return Some(range);
            }
            if level == cutoff && kept < limit {
                kept += 1;
                return Some(range);
            }
            None
        })
        .collect()
}

/// Nesting level of each sorted range, `None` for ranges that do not nest.
fn nesting_levels(ranges: &[FoldingRange]) -> Vec<Option<usize>> {
    let mut levels = vec![None; ranges.len()];
    let mut stack: Vec<&FoldingRange> = Vec::new();
    let mut top: Option<&FoldingRange> = None;

    for (i, range) in ranges.iter().enumerate() {
        let Some(current) = top else {
            top = Some(range);
            levels[i] = Some(0);
            continue;
        };
        if range.start_line <= current.start_line {
            continue;
        }
        if range.end_line <= current.end_line {
            stack.push(current);
            top = Some(range);
            levels[i] = Some(stack.len());
        } else if range.start_line > current.end_line {
            let mut enclosing = stack.pop();
            while let Some(candidate) = enclosing {
                if range.start_line <= candidate.end_line {
                    break;
                }
                enclosing = stack.pop();
            }
            if let Some(enclosing) = enclosing {
                stack.push(enclosing);
            }
            top = Some(range);
            levels[i] = Some(stack.len());
        }
    }

    levels
}
