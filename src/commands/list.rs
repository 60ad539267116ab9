//! `quotient list ...`

use crate::cli::ListCommands;
use crate::output;
use anyhow::Result;
use comfy_table::Table;
use quotientai::QuotientAi;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

pub async fn execute(client: &QuotientAi, resource: ListCommands, json: bool) -> Result<()> {
    match resource {
        ListCommands::Models(f) => {
            let models = client.models.filter(&f.pairs()).await?;
            show(&models, json, output::models_table)
        }
        ListCommands::Datasets(f) => {
            let datasets = client.datasets.filter(&f.pairs()).await?;
            show(&datasets, json, output::datasets_table)
        }
        ListCommands::PromptTemplates(f) => {
            // The prompts endpoint takes no query filters.
            let prompts = retain_matching(client.prompts.list().await?, &f.pairs());
            show(&prompts, json, output::prompts_table)
        }
        ListCommands::Recipes(f) => {
            let recipes = client.recipes.list(&f.pairs()).await?;
            show(&recipes, json, output::recipes_table)
        }
        ListCommands::Tasks(f) => {
            let tasks = client.tasks.list(&f.pairs()).await?;
            show(&tasks, json, output::tasks_table)
        }
        ListCommands::Jobs(f) => {
            let jobs = client.jobs.list(&f.pairs()).await?;
            show(&jobs, json, output::jobs_table)
        }
        ListCommands::Results { job_id, csv } => results(client, &job_id, csv, json).await,
    }
}

fn show<T: Serialize>(items: &[T], json: bool, render: fn(&[T]) -> Table) -> Result<()> {
    if json {
        return output::json(items);
    }
    if items.is_empty() {
        println!("No results found");
        return Ok(());
    }
    println!("{}", render(items));
    Ok(())
}

async fn results(
    client: &QuotientAi,
    job_id: &str,
    csv: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let results = client.results.get(job_id).await?;

    if let Some(dir) = csv {
        let path = results.to_csv(dir)?;
        eprintln!("Results saved to {}", path.display());
    }
    if json {
        return output::json(&results);
    }

    println!("{}", output::results_summary_table(&results));
    let (table, has_more) = output::results_table(&results);
    println!("{table}");
    if has_more {
        println!(
            "Showing the first {} of {} results. Use --json or --csv for the full set.",
            output::RESULTS_TABLE_ROWS,
            results.results.len()
        );
    }
    Ok(())
}

/// Keep items whose serialized fields equal every filter value.
fn retain_matching<T: Serialize>(items: Vec<T>, filters: &[(String, String)]) -> Vec<T> {
    if filters.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            let Ok(value) = serde_json::to_value(item) else {
                return false;
            };
            filters.iter().all(|(key, expected)| match &value[key.as_str()] {
                Value::String(s) => s == expected,
                Value::Null => false,
                other => other.to_string() == *expected,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retain_matching() {
        let items = vec![
            json!({"name": "qa", "prompt_version": 2}),
            json!({"name": "summarize", "prompt_version": 1}),
        ];

        let kept = retain_matching(items.clone(), &[("name".to_string(), "qa".to_string())]);
        assert_eq!(kept, vec![items[0].clone()]);

        let kept = retain_matching(items.clone(), &[("prompt_version".to_string(), "1".to_string())]);
        assert_eq!(kept, vec![items[1].clone()]);

        assert_eq!(retain_matching(items.clone(), &[]).len(), 2);
        assert!(retain_matching(items, &[("owner".to_string(), "x".to_string())]).is_empty());
    }
}
