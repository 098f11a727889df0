use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::error::ToolError;
use crate::validation::has_extension;

/// Read the ordered class names from a `.txt` or `.csv` file.
///
/// Text files hold one class per line. CSV files contribute the first field of
/// each line. Blank lines are skipped in both.
pub fn read_classes(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read classes file {:?}", path))?;

    if has_extension(path, &["txt"]) {
        Ok(parse_lines(&contents, |line| line))
    } else if has_extension(path, &["csv"]) {
        Ok(parse_lines(&contents, first_csv_field))
    } else {
        Err(ToolError::ClassFileFormat.into())
    }
}

fn parse_lines<'a>(contents: &'a str, field: impl Fn(&'a str) -> &'a str) -> Vec<String> {
    contents
        .lines()
        .map(|line| field(line).trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_csv_field(line: &str) -> &str {
    let field = line.split(',').next().unwrap_or("").trim();
    field.trim_matches('"')
}
