use crate::types::diff::{DiffFile, DiffHunk, DiffLine, DiffLineKind};

/// Splits `git diff` output into files and hunks. File headers (`---`/`+++`,
/// `index`, mode lines) are skipped; only lines inside a hunk are kept.
pub fn parse_unified_diff(unified: &str) -> Vec<DiffFile> {
    let mut files: Vec<DiffFile> = Vec::new();
    let mut in_hunk = false;

    for line in unified.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.push(DiffFile {
                path: target_path(rest).unwrap_or_else(|| "unknown".to_string()),
                hunks: Vec::new(),
            });
            in_hunk = false;
            continue;
        }
        let Some(file) = files.last_mut() else {
            continue;
        };
        if line.starts_with("@@ ") {
            in_hunk = match parse_hunk_header(line) {
                Some(hunk) => {
                    file.hunks.push(hunk);
                    true
                }
                None => false,
            };
            continue;
        }
        if !in_hunk {
            continue;
        }
        if let (Some(hunk), Some(parsed)) = (file.hunks.last_mut(), parse_diff_line(line)) {
            hunk.lines.push(parsed);
        }
    }

    files
}

/// Text introduced by a diff: every added line, in order, newline-joined.
pub fn added_text(files: &[DiffFile]) -> String {
    files
        .iter()
        .flat_map(|file| file.hunks.iter())
        .flat_map(|hunk| hunk.lines.iter())
        .filter(|line| line.kind == DiffLineKind::Add)
        .map(|line| line.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn target_path(header: &str) -> Option<String> {
    header
        .rsplit_once(" b/")
        .map(|(_, path)| path.to_string())
}

/// `@@ -a,b +c,d @@ context`; a missing count means one line.
fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let body = line.strip_prefix("@@ ")?;
    let (ranges, header) = body.split_once(" @@").unwrap_or((body, ""));
    let mut ranges = ranges.split_whitespace();
    let (old_start, old_lines) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_lines) = parse_range(ranges.next()?.strip_prefix('+')?)?;
    Some(DiffHunk {
        old_start,
        old_lines,
        new_start,
        new_lines,
        header: header.trim().to_string(),
        lines: Vec::new(),
    })
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn parse_diff_line(line: &str) -> Option<DiffLine> {
    let kind = match line.as_bytes().first()? {
        b'+' => DiffLineKind::Add,
        b'-' => DiffLineKind::Remove,
        b' ' => DiffLineKind::Context,
        _ => return None,
    };
    Some(DiffLine {
        kind,
        content: line[1..].to_string(),
    })
}
