//! Three-way content merge using diff hunks.
//!
//! Takes base, ours, and theirs versions of a file and produces a merged result,
//! inserting conflict markers where changes overlap.

use crate::{ConflictStyle, ContentMergeResult, MergeOptions};
use git_diff::algorithm::{diff_edits, split_lines, Edit, EditOp};

/// Labels for conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels<'a> {
    pub base: &'a str,
    pub ours: &'a str,
    pub theirs: &'a str,
}

impl<'a> Default for MergeLabels<'a> {
    fn default() -> Self {
        Self {
            base: "base",
            ours: "ours",
            theirs: "theirs",
        }
    }
}

/// Perform a three-way content merge.
///
/// Diffs base→ours and base→theirs, then interleaves non-overlapping changes
/// and reports conflicts for overlapping regions.
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    options: &MergeOptions,
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    // If ours == theirs, no merge needed — take either side.
    if ours == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }

    // If base == ours, theirs wins cleanly.
    if base == ours {
        return ContentMergeResult::Clean(theirs.to_vec());
    }

    // If base == theirs, ours wins cleanly.
    if base == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }

    // Check strategy options for forced resolution.
    let favor_ours = options.strategy_options.iter().any(|o| o == "ours");
    let favor_theirs = options.strategy_options.iter().any(|o| o == "theirs");

    if favor_ours {
        return ContentMergeResult::Clean(ours.to_vec());
    }
    if favor_theirs {
        return ContentMergeResult::Clean(theirs.to_vec());
    }

    // Perform line-level three-way merge.
    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let edits_ours = diff_edits(base, ours, options.diff_algorithm);
    let edits_theirs = diff_edits(base, theirs, options.diff_algorithm);

    // Convert edits into change regions relative to the base.
    let hunks_ours = collect_change_regions(&edits_ours);
    let hunks_theirs = collect_change_regions(&edits_theirs);

    merge_regions(
        &base_lines,
        &ours_lines,
        &theirs_lines,
        &hunks_ours,
        &hunks_theirs,
        options.conflict_style,
        labels,
    )
}

/// A contiguous region of changes relative to the base.
#[derive(Debug, Clone)]
struct ChangeRegion {
    /// Start line in base (0-indexed).
    base_start: usize,
    /// Number of lines removed from base.
    base_len: usize,
    /// Start line in the modified file (0-indexed).
    new_start: usize,
    /// Number of lines added.
    new_len: usize,
}

/// Collect contiguous change regions from a sequence of edit operations.
fn collect_change_regions(edits: &[Edit]) -> Vec<ChangeRegion> {
    let mut regions = Vec::new();
    let mut i = 0;

    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }

        // Start of a change region.
        let base_start = edits[i].old_index;
        let new_start = edits[i].new_index;
        let mut base_end = base_start;
        let mut new_end = new_start;

        while i < edits.len() && edits[i].op != EditOp::Equal {
            match edits[i].op {
                EditOp::Delete => {
                    base_end = edits[i].old_index + 1;
                }
                EditOp::Insert => {
                    new_end = edits[i].new_index + 1;
                }
                EditOp::Equal => unreachable!(),
            }
            i += 1;
        }

        regions.push(ChangeRegion {
            base_start,
            base_len: base_end - base_start,
            new_start,
            new_len: new_end - new_start,
        });
    }

    regions
}

/// Merge change regions from ours and theirs against the base.
fn merge_regions(
    base_lines: &[&[u8]],
    ours_lines: &[&[u8]],
    theirs_lines: &[&[u8]],
    hunks_ours: &[ChangeRegion],
    hunks_theirs: &[ChangeRegion],
    conflict_style: ConflictStyle,
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    let mut output: Vec<u8> = Vec::new();
    let mut conflict_count = 0;

    let mut base_pos = 0;
    let mut oi = 0; // index into hunks_ours
    let mut ti = 0; // index into hunks_theirs

    while oi < hunks_ours.len() || ti < hunks_theirs.len() {
        let o_region = hunks_ours.get(oi);
        let t_region = hunks_theirs.get(ti);

        match (o_region, t_region) {
            (Some(o), Some(t)) => {
                let o_end = o.base_start + o.base_len;
                let t_end = t.base_start + t.base_len;

                if o_end < t.base_start || (o_end == t.base_start && o.base_start < t.base_start) {
                    // Ours comes strictly first, no overlap.
                    emit_base_lines(&mut output, base_lines, base_pos, o.base_start);
                    emit_lines(&mut output, ours_lines, o.new_start, o.new_len);
                    base_pos = o_end;
                    oi += 1;
                } else if t_end < o.base_start || (t_end == o.base_start && t.base_start < o.base_start) {
                    // Theirs comes strictly first, no overlap.
                    emit_base_lines(&mut output, base_lines, base_pos, t.base_start);
                    emit_lines(&mut output, theirs_lines, t.new_start, t.new_len);
                    base_pos = t_end;
                    ti += 1;
                } else {
                    // Overlapping regions — check if the changes are identical.
                    let ours_slice = line_slice(ours_lines, o.new_start, o.new_len);
                    let theirs_slice = line_slice(theirs_lines, t.new_start, t.new_len);

                    let overlap_base_start = o.base_start.min(t.base_start);
                    let overlap_base_end = o_end.max(t_end);

                    emit_base_lines(&mut output, base_lines, base_pos, overlap_base_start);

                    if ours_slice == theirs_slice {
                        // Identical changes — accept cleanly.
                        emit_line_slice(&mut output, &ours_slice);
                    } else {
                        // Zealous reduction: pull the common leading/trailing
                        // lines (compared alphanumeric-only) out of the
                        // conflict before deciding whether what's left still
                        // disagrees.
                        let (prefix, suffix) = zealous_common_edges(&ours_slice, &theirs_slice);
                        let ours_core = &ours_slice[prefix..ours_slice.len() - suffix];
                        let theirs_core = &theirs_slice[prefix..theirs_slice.len() - suffix];

                        emit_line_slice(&mut output, &ours_slice[..prefix]);

                        if ours_core == theirs_core {
                            emit_line_slice(&mut output, ours_core);
                        } else {
                            conflict_count += 1;
                            let base_content = collect_lines(
                                base_lines,
                                overlap_base_start,
                                overlap_base_end - overlap_base_start,
                            );
                            emit_conflict(
                                &mut output,
                                &join_lines(ours_core),
                                &join_lines(theirs_core),
                                &base_content,
                                conflict_style,
                                labels,
                            );
                        }

                        emit_line_slice(&mut output, &ours_slice[ours_slice.len() - suffix..]);
                    }

                    base_pos = overlap_base_end;
                    oi += 1;
                    ti += 1;
                }
            }
            (Some(o), None) => {
                let o_end = o.base_start + o.base_len;
                emit_base_lines(&mut output, base_lines, base_pos, o.base_start);
                emit_lines(&mut output, ours_lines, o.new_start, o.new_len);
                base_pos = o_end;
                oi += 1;
            }
            (None, Some(t)) => {
                let t_end = t.base_start + t.base_len;
                emit_base_lines(&mut output, base_lines, base_pos, t.base_start);
                emit_lines(&mut output, theirs_lines, t.new_start, t.new_len);
                base_pos = t_end;
                ti += 1;
            }
            (None, None) => unreachable!(),
        }
    }

    // Emit remaining base lines.
    emit_base_lines(&mut output, base_lines, base_pos, base_lines.len());

    if conflict_count > 0 {
        ContentMergeResult::Conflict {
            content: output,
            conflict_count,
        }
    } else {
        ContentMergeResult::Clean(output)
    }
}

/// Emit unchanged base lines from `from` to `to` (exclusive).
fn emit_base_lines(output: &mut Vec<u8>, base_lines: &[&[u8]], from: usize, to: usize) {
    for i in from..to {
        if i < base_lines.len() {
            output.extend_from_slice(base_lines[i]);
            output.push(b'\n');
        }
    }
}

/// Emit lines from a side.
fn emit_lines(output: &mut Vec<u8>, lines: &[&[u8]], start: usize, count: usize) {
    for i in start..start + count {
        if i < lines.len() {
            output.extend_from_slice(lines[i]);
            output.push(b'\n');
        }
    }
}

/// Collect lines into a single byte buffer.
fn collect_lines(lines: &[&[u8]], start: usize, count: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in start..start + count {
        if i < lines.len() {
            buf.extend_from_slice(lines[i]);
            buf.push(b'\n');
        }
    }
    buf
}

/// Collect a run of lines as borrowed references, for slice-level comparison.
fn line_slice<'a>(lines: &[&'a [u8]], start: usize, count: usize) -> Vec<&'a [u8]> {
    let mut out = Vec::with_capacity(count);
    for i in start..start + count {
        if i < lines.len() {
            out.push(lines[i]);
        }
    }
    out
}

/// Emit a run of borrowed lines, one per output line.
fn emit_line_slice(output: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        output.extend_from_slice(line);
        output.push(b'\n');
    }
}

/// Join borrowed lines into a single byte buffer.
fn join_lines(lines: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    emit_line_slice(&mut buf, lines);
    buf
}

/// Find how many leading and trailing lines `ours` and `theirs` share, using
/// a whitespace-insensitive, alphanumeric-only comparison ("zealous" diff3
/// reduction). Narrows a conflict hunk down to the lines that actually
/// disagree.
fn zealous_common_edges(ours: &[&[u8]], theirs: &[&[u8]]) -> (usize, usize) {
    let max_common = ours.len().min(theirs.len());

    let mut prefix = 0;
    while prefix < max_common && lines_equal_zealous(ours[prefix], theirs[prefix]) {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < max_common - prefix
        && lines_equal_zealous(ours[ours.len() - 1 - suffix], theirs[theirs.len() - 1 - suffix])
    {
        suffix += 1;
    }

    (prefix, suffix)
}

/// Compare two lines ignoring everything but ASCII alphanumeric characters.
fn lines_equal_zealous(a: &[u8], b: &[u8]) -> bool {
    alnum_only(a) == alnum_only(b)
}

fn alnum_only(line: &[u8]) -> Vec<u8> {
    line.iter().copied().filter(|b| b.is_ascii_alphanumeric()).collect()
}

/// Emit conflict markers.
fn emit_conflict(
    output: &mut Vec<u8>,
    ours_content: &[u8],
    theirs_content: &[u8],
    base_content: &[u8],
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) {
    // <<<<<<< ours-label
    output.extend_from_slice(b"<<<<<<< ");
    output.extend_from_slice(labels.ours.as_bytes());
    output.push(b'\n');

    output.extend_from_slice(ours_content);

    match style {
        ConflictStyle::Diff3 | ConflictStyle::ZDiff3 => {
            // ||||||| base-label
            output.extend_from_slice(b"||||||| ");
            output.extend_from_slice(labels.base.as_bytes());
            output.push(b'\n');
            output.extend_from_slice(base_content);
        }
        ConflictStyle::Merge => {}
    }

    // =======
    output.extend_from_slice(b"=======\n");

    output.extend_from_slice(theirs_content);

    // >>>>>>> theirs-label
    output.extend_from_slice(b">>>>>>> ");
    output.extend_from_slice(labels.theirs.as_bytes());
    output.push(b'\n');
}
