use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "quotient", version, about = "Quotient AI command line")]
pub struct Cli {
    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// API base URL
    #[arg(long, env = "QUOTIENT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List resources
    List {
        #[command(subcommand)]
        resource: ListCommands,
    },

    /// Create resources
    Create {
        #[command(subcommand)]
        resource: CreateCommands,
    },
}

/// Equality filters sent with list requests
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Filter as a key-value pair, e.g. `--filter status Completed` (repeatable)
    #[arg(
        short,
        long = "filter",
        num_args = 2,
        value_names = ["KEY", "VALUE"],
        action = ArgAction::Append
    )]
    pub filter: Vec<String>,
}

impl FilterArgs {
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.filter
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ListCommands {
    /// List available models
    Models(FilterArgs),

    /// List datasets
    Datasets(FilterArgs),

    /// List prompt templates
    PromptTemplates(FilterArgs),

    /// List recipes
    Recipes(FilterArgs),

    /// List tasks
    Tasks(FilterArgs),

    /// List jobs
    Jobs(FilterArgs),

    /// Show the results of a job
    Results {
        /// Job whose results to show
        #[arg(long)]
        job_id: String,

        /// Also write the results to quotient-results-<id>.csv in this directory
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CreateCommands {
    /// Schedule an evaluation job
    Job {
        /// Task ID for the job
        #[arg(long)]
        task_id: i64,

        /// Recipe ID for the job
        #[arg(long)]
        recipe_id: i64,

        /// Number of few-shot examples
        #[arg(long, default_value = "0")]
        num_fewshot_examples: i64,

        /// Maximum number of dataset rows to evaluate
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Create a dataset
    Dataset {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// JSON file with an array of rows: `[{"input": ..., "context": ..., "expected": ...}]`
        #[arg(long)]
        rows: Option<PathBuf>,
    },

    /// Create a prompt template
    PromptTemplate {
        #[arg(long)]
        name: String,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// User prompt template, e.g. "Answer: {{input}}"
        #[arg(long)]
        user: Option<String>,
    },

    /// Create a recipe pairing a model with a prompt template
    Recipe {
        #[arg(long)]
        name: String,

        #[arg(long)]
        model_id: i64,

        #[arg(long)]
        prompt_template_id: i64,

        #[arg(long)]
        description: Option<String>,
    },

    /// Create a task over a dataset
    Task {
        #[arg(long)]
        name: String,

        #[arg(long)]
        dataset_id: i64,

        /// Task type, e.g. question_answering
        #[arg(long)]
        task_type: String,

        /// Metric to compute (repeatable)
        #[arg(long = "metric", action = ArgAction::Append)]
        metrics: Vec<String>,
    },
}
