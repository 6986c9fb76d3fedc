use sociogram_core::model::AliasHint;
use sociogram_core::proposal::MappingProposal;
use sociogram_core::table::RawTable;

const MAPPING_INSTRUCTIONS: &str = "\
You analyse classroom relationship surveys. Each row is one student's answers.
Identify every relational question (e.g. \"who would you like to work with?\").
For each one report the column holding the respondent's own name (from_column),
the column(s) holding the peers they named (to_columns), an optional numeric
strength column (weight_column) and a short relation type label.
Reply with JSON only, in this shape:
{\"relations\": [{\"from_column\": \"...\", \"to_columns\": [\"...\"],
  \"weight_column\": null, \"relation_type_label\": \"friendship\"}],
 \"aliases\": {\"Canonical Name\": [\"variant spelling\"]},
 \"students\": [\"every student name you can see\"]}
Use column labels exactly as written. Leave out anything you are unsure of.";

const ALIAS_INSTRUCTIONS: &str = "\
The following strings are student names typed by classmates. Group spellings
that certainly refer to the same student (typos, spacing, nicknames).
Reply with JSON only: {\"aliases\": {\"Canonical Name\": [\"variant\", ...]}}.
Do not group names that might be different people.";

pub fn build_mapping_prompt(table: &RawTable, sample_rows: usize) -> String {
    let mut prompt = String::from(MAPPING_INSTRUCTIONS);
    prompt.push_str("\n\n# Columns\n");
    for column in table.columns() {
        prompt.push_str("- ");
        prompt.push_str(column);
        prompt.push('\n');
    }

    prompt.push_str("\n# Sample rows\n");
    prompt.push_str(&table.columns().join("\t"));
    prompt.push('\n');
    for row in table.rows().take(sample_rows) {
        let cells: Vec<String> = row.iter().map(|cell| cell.replace('\n', " ")).collect();
        prompt.push_str(&cells.join("\t"));
        prompt.push('\n');
    }
    prompt
}

pub fn build_alias_prompt(names: &[String]) -> String {
    let mut prompt = String::from(ALIAS_INSTRUCTIONS);
    prompt.push_str("\n\n# Names\n");
    for name in names {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push('\n');
    }
    prompt
}

/// Returns the first balanced `{...}` object in free text, skipping braces
/// inside JSON strings. Models like to wrap JSON in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_mapping_reply(reply: &str) -> Option<MappingProposal> {
    let json = extract_json_object(reply)?;
    MappingProposal::parse_json(json).ok()
}

pub fn parse_alias_reply(reply: &str) -> Option<Vec<AliasHint>> {
    let json = extract_json_object(reply)?;
    MappingProposal::parse_json(json)
        .ok()
        .map(|proposal| proposal.alias_hints())
}
