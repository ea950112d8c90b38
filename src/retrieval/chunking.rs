/// Heading prefixes that open a new section. Only level-2 and level-3
/// headings split the document; `#` and `####` lines stay in the current
/// section.
const SECTION_PREFIXES: [&str; 2] = ["## ", "### "];

fn is_section_boundary(line: &str) -> bool {
    let trimmed = line.trim();
    SECTION_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Split a markdown document into sections on `## ` / `### ` headings.
///
/// Each section starts with its heading line and runs until the next
/// boundary. Sections are trimmed and blank sections are discarded, so the
/// output preserves document order and never contains an empty string.
pub fn split_markdown_sections(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_section_boundary(line) && !current.is_empty() {
            chunks.push(current.join("\n").trim().to_string());
            current.clear();
        }
        current.push(line);
    }

    if !current.is_empty() {
        chunks.push(current.join("\n").trim().to_string());
    }

    chunks.retain(|chunk| !chunk.is_empty());
    chunks
}
