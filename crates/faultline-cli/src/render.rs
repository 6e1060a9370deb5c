//! Text rendering of the change summary.
//!
//! Plain string builders with no global console state; the caller decides
//! where the output goes.

use faultline_core::ChangeSummary;

/// Aligned summary-of-changes table with a totals row.
pub fn stat_table(summary: &ChangeSummary) -> String {
    let mut rows: Vec<[String; 4]> = summary
        .files
        .iter()
        .map(|f| {
            [
                f.path.display().to_string(),
                f.insertions.to_string(),
                f.deletions.to_string(),
                f.lines.to_string(),
            ]
        })
        .collect();
    let total_lines = summary.total_insertions() + summary.total_deletions();
    rows.push([
        "Total".to_string(),
        summary.total_insertions().to_string(),
        summary.total_deletions().to_string(),
        total_lines.to_string(),
    ]);

    let headers = ["File", "Insertions", "Deletions", "Lines"];
    let mut widths: [usize; 4] = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<file$}  {:>ins$}  {:>del$}  {:>lin$}\n",
        headers[0],
        headers[1],
        headers[2],
        headers[3],
        file = widths[0],
        ins = widths[1],
        del = widths[2],
        lin = widths[3],
    ));
    for row in &rows {
        out.push_str(&format!(
            "{:<file$}  {:>ins$}  {:>del$}  {:>lin$}\n",
            row[0],
            row[1],
            row[2],
            row[3],
            file = widths[0],
            ins = widths[1],
            del = widths[2],
            lin = widths[3],
        ));
    }
    out
}

/// Changed paths grouped as an indented directory tree.
pub fn file_tree(summary: &ChangeSummary) -> String {
    let mut out = String::new();
    let mut previous_dirs: Vec<String> = Vec::new();

    for change in &summary.files {
        let components: Vec<String> = change
            .path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if components.is_empty() {
            continue;
        }
        let (dirs, file) = components.split_at(components.len() - 1);

        let mut shared = 0;
        while shared < dirs.len()
            && shared < previous_dirs.len()
            && dirs[shared] == previous_dirs[shared]
        {
            shared += 1;
        }
        for (depth, dir) in dirs.iter().enumerate().skip(shared) {
            out.push_str(&"  ".repeat(depth));
            out.push_str(dir);
            out.push_str("/\n");
        }
        out.push_str(&"  ".repeat(dirs.len()));
        out.push_str(&file[0]);
        out.push('\n');

        previous_dirs = dirs.to_vec();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::{FileChange, RevisionId};
    use std::path::PathBuf;

    fn summary(files: Vec<(&str, u64, u64)>) -> ChangeSummary {
        ChangeSummary {
            revision: RevisionId::new("abc"),
            files: files
                .into_iter()
                .map(|(path, insertions, deletions)| FileChange {
                    path: PathBuf::from(path),
                    insertions,
                    deletions,
                    lines: insertions + deletions,
                })
                .collect(),
            diff_text: String::new(),
        }
    }

    #[test]
    fn test_stat_table_alignment_and_totals() {
        let table = stat_table(&summary(vec![
            ("src/engine.rs", 10, 2),
            ("README.md", 0, 5),
        ]));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("File"));
        assert!(lines[0].contains("Insertions"));
        assert!(lines[1].starts_with("src/engine.rs"));
        assert!(lines[3].starts_with("Total"));
        assert!(lines[3].contains("10"));
        assert!(lines[3].contains('7'));
        assert!(lines[3].trim_end().ends_with("17"));
        // All rows share the same rendered width.
        let width = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == width));
    }

    #[test]
    fn test_file_tree_groups_directories() {
        let tree = file_tree(&summary(vec![
            ("src/domain/error.rs", 1, 0),
            ("src/domain/revision.rs", 1, 0),
            ("src/lib.rs", 1, 0),
            ("README.md", 1, 0),
        ]));
        let expected = "\
src/
  domain/
    error.rs
    revision.rs
  lib.rs
README.md
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_file_tree_empty_summary() {
        assert!(file_tree(&summary(vec![])).is_empty());
    }
}
