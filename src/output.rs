//! Table and JSON rendering for the CLI.

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use quotientai::resources::{Dataset, Job, JobResults, Model, Prompt, Recipe, Reference, Task};
use serde::Serialize;
use serde_json::Value;

/// Rows shown in the results table.
pub const RESULTS_TABLE_ROWS: usize = 20;
/// Character limit for result cells.
pub const RESULT_CELL_CHARS: usize = 25;
/// Character limit for other long cells.
pub const CELL_CHARS: usize = 50;

const NA: &str = "N/A";

pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn or_na(value: Option<&str>) -> String {
    value.unwrap_or(NA).to_string()
}

fn reference_id(reference: &Option<Reference>) -> String {
    or_na(reference.as_ref().and_then(|r| r.id.as_deref()))
}

fn reference_name(reference: &Option<Reference>) -> String {
    or_na(reference.as_ref().and_then(|r| r.name.as_deref()))
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => NA.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn models_table(models: &[Model]) -> Table {
    let mut t = table(&["ID", "Name", "Provider", "Model Type", "Description", "Owner"]);
    for m in models {
        t.add_row(vec![
            m.id.clone(),
            m.name.clone(),
            or_na(m.provider.as_ref().map(|p| p.name.as_str())),
            or_na(m.model_type.as_deref()),
            truncate(m.description.as_deref().unwrap_or(NA), CELL_CHARS),
            or_na(m.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn prompts_table(prompts: &[Prompt]) -> Table {
    let mut t = table(&["ID", "Name", "Version", "Template String", "Owner"]);
    for p in prompts {
        t.add_row(vec![
            p.id.clone(),
            p.name.clone(),
            p.version.to_string(),
            truncate(&p.user_prompt.replace("\\n", "\n"), CELL_CHARS),
            or_na(p.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn datasets_table(datasets: &[Dataset]) -> Table {
    let mut t = table(&["ID", "Name", "File", "File Format", "Owner"]);
    for d in datasets {
        let file = d
            .url
            .as_deref()
            .and_then(|url| url.rsplit('/').next())
            .map(|name| truncate(name, CELL_CHARS));
        t.add_row(vec![
            d.id.clone(),
            d.name.clone(),
            file.unwrap_or_else(|| NA.to_string()),
            or_na(d.file_format.as_deref()),
            or_na(d.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn recipes_table(recipes: &[Recipe]) -> Table {
    let mut t = table(&[
        "Recipe ID",
        "Recipe Name",
        "Model ID",
        "Model Name",
        "Prompt Template ID",
        "Prompt Template Name",
        "Owner",
    ]);
    for r in recipes {
        t.add_row(vec![
            r.id.clone(),
            r.name.clone(),
            reference_id(&r.model),
            reference_name(&r.model),
            reference_id(&r.prompt_template),
            reference_name(&r.prompt_template),
            or_na(r.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn tasks_table(tasks: &[Task]) -> Table {
    let mut t = table(&[
        "ID",
        "Task Name",
        "Dataset ID",
        "Dataset Name",
        "Task Type",
        "Metrics",
        "Owner",
    ]);
    for task in tasks {
        t.add_row(vec![
            task.id.clone(),
            task.name.clone(),
            or_na(task.dataset_id.as_deref()),
            or_na(task.dataset_name.as_deref()),
            or_na(task.task_type.as_deref()),
            task.metrics.join(", "),
            or_na(task.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn jobs_table(jobs: &[Job]) -> Table {
    let mut t = table(&[
        "ID",
        "Task ID",
        "Task Name",
        "Recipe ID",
        "Recipe Name",
        "Status",
        "Limit",
        "Owner",
    ]);
    for j in jobs {
        t.add_row(vec![
            j.id.clone(),
            j.task_id.to_string(),
            reference_name(&j.task),
            j.recipe_id.to_string(),
            reference_name(&j.recipe),
            j.status.to_string(),
            j.limit.map(|l| l.to_string()).unwrap_or_else(|| NA.to_string()),
            or_na(j.owner_profile_id.as_deref()),
        ]);
    }
    t
}

pub fn results_summary_table(results: &JobResults) -> Table {
    let mut t = table(&["ID", "Model Name", "Task Name", "Metrics", "Task Type", "# Samples", "Seed"]);
    t.add_row(vec![
        results.id.clone(),
        or_na(results.model_name.as_deref()),
        or_na(results.task_name.as_deref()),
        results.metrics.join(", "),
        or_na(results.task_type.as_deref()),
        results.results.len().to_string(),
        results.seed.map(|s| s.to_string()).unwrap_or_else(|| NA.to_string()),
    ]);
    t
}

/// The first [`RESULTS_TABLE_ROWS`] results, and whether more were left out.
pub fn results_table(results: &JobResults) -> (Table, bool) {
    let mut t = table(&["Model Input", "Model Output", "Expected Answer", "Metric Score"]);
    for row in results.results.iter().take(RESULTS_TABLE_ROWS) {
        let cell = |v: &Value| match v {
            Value::String(s) => truncate(s, RESULT_CELL_CHARS),
            other => plain(other),
        };
        t.add_row(vec![
            cell(&row.content.input_text),
            cell(&row.content.completion),
            cell(&row.content.answer),
            plain(&row.value),
        ]);
    }
    (t, results.results.len() > RESULTS_TABLE_ROWS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 25), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_results_table_caps_rows() {
        let rows: Vec<Value> = (0..25)
            .map(|i| {
                json!({
                    "content": {
                        "input_text": format!("question {i} with a rather long body of text"),
                        "completion": "answer",
                        "answer": "answer"
                    },
                    "value": 1.0
                })
            })
            .collect();
        let results: JobResults =
            serde_json::from_value(json!({"id": 3, "metrics": ["exact_match"], "results": rows}))
                .unwrap();

        let (table, has_more) = results_table(&results);

        assert!(has_more);
        assert_eq!(table.row_iter().count(), RESULTS_TABLE_ROWS);
    }

    #[test]
    fn test_jobs_table_fills_missing_values() {
        let job: Job = serde_json::from_value(json!({
            "id": 1, "task_id": 2, "recipe_id": 3, "status": "Running"
        }))
        .unwrap();

        let rendered = jobs_table(&[job]).to_string();

        assert!(rendered.contains("Running"));
        assert!(rendered.contains(NA));
    }
}
