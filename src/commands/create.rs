//! `quotient create ...`

use crate::cli::CreateCommands;
use crate::output;
use anyhow::{Context, Result};
use quotientai::resources::{NewDatasetRow, NewJob, NewRecipe, NewTask};
use quotientai::QuotientAi;
use serde::Serialize;
use std::path::Path;

pub async fn execute(client: &QuotientAi, resource: CreateCommands, json: bool) -> Result<()> {
    match resource {
        CreateCommands::Job {
            task_id,
            recipe_id,
            num_fewshot_examples,
            limit,
        } => {
            let mut job = NewJob::new(task_id, recipe_id).with_fewshot_examples(num_fewshot_examples);
            if let Some(limit) = limit {
                job = job.with_limit(limit);
            }
            let created = client.jobs.create(&job).await?;
            report("job", &created.id, &created, json, || {
                output::jobs_table(std::slice::from_ref(&created))
            })
        }
        CreateCommands::Dataset {
            name,
            description,
            rows,
        } => {
            let rows = match rows {
                Some(path) => read_rows(&path)?,
                None => Vec::new(),
            };
            let created = client
                .datasets
                .create(&name, description.as_deref(), &rows)
                .await?;
            report("dataset", &created.id, &created, json, || {
                output::datasets_table(std::slice::from_ref(&created))
            })
        }
        CreateCommands::PromptTemplate { name, system, user } => {
            let created = client
                .prompts
                .create(&name, system.as_deref(), user.as_deref())
                .await?;
            report("prompt template", &created.id, &created, json, || {
                output::prompts_table(std::slice::from_ref(&created))
            })
        }
        CreateCommands::Recipe {
            name,
            model_id,
            prompt_template_id,
            description,
        } => {
            let recipe = NewRecipe {
                name,
                description,
                model_id,
                prompt_template_id,
            };
            let created = client.recipes.create(&recipe).await?;
            report("recipe", &created.id, &created, json, || {
                output::recipes_table(std::slice::from_ref(&created))
            })
        }
        CreateCommands::Task {
            name,
            dataset_id,
            task_type,
            metrics,
        } => {
            let task = NewTask {
                name,
                dataset_id,
                task_type,
                metrics,
            };
            let created = client.tasks.create(&task).await?;
            report("task", &created.id, &created, json, || {
                output::tasks_table(std::slice::from_ref(&created))
            })
        }
    }
}

fn report<T: Serialize>(
    kind: &str,
    id: &str,
    created: &T,
    json: bool,
    table: impl FnOnce() -> comfy_table::Table,
) -> Result<()> {
    if json {
        return output::json(created);
    }
    println!("Created {kind} {id}");
    println!("{}", table());
    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<NewDatasetRow>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rows from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} must contain a JSON array of rows", path.display()))
}
