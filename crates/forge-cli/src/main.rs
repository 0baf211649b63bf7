//! Forge CLI - Command-line interface
//!
//! Usage:
//!   forge idea <prize text>
//!   forge collection init
//!   forge collection seed <records.json>
//!   forge collection delete <id>...
//!
//! Author: hephaex@gmail.com

use clap::{Parser, Subcommand};
use forge_agent::{create_llm_client, IdeaAgent, IdeaAgentConfig};
use forge_core::{AppConfig, ProjectRecord};
use forge_vector::{build_search_stack, RecordPoint, VectorSearch};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Retrieval-grounded idea synthesis CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project idea from a prize description
    Idea {
        /// Free-text prize or topic description
        prize: String,

        /// Override the number of grounding neighbors
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Manage the showcase collection
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create the collection if it does not exist
    Init,
    /// Embed and upsert records from a JSON file
    Seed {
        /// Path to a JSON array of project records
        path: PathBuf,
    },
    /// Delete records by id
    Delete { ids: Vec<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().unwrap_or_default();

    match cli.command {
        Commands::Idea { prize, top_k } => {
            let stack = build_search_stack(&config).await?;
            let llm = create_llm_client(&config.llm)?;

            let mut agent_config = IdeaAgentConfig::from_app_config(&config);
            if let Some(k) = top_k {
                agent_config.top_k = k;
            }

            let agent = IdeaAgent::new(stack.embedder, stack.search, llm, agent_config);
            let result = agent.generate_idea_from_prize(&prize).await?;

            println!("{}", result.content);
            if !result.similar_projects.is_empty() {
                println!("\nGrounded on:");
                for project in &result.similar_projects {
                    println!("  - {} ({})", project.title, project.link);
                }
            }
        }
        Commands::Collection { action } => {
            let stack = build_search_stack(&config).await?;
            let Some(admin) = stack.search.admin() else {
                anyhow::bail!("the configured vector backend has no admin capability");
            };

            match action {
                CollectionAction::Init => {
                    admin
                        .create_collection(&config.vector.collection, config.vector.dimension)
                        .await?;
                    println!(
                        "collection `{}` ready ({} dimensions, cosine)",
                        config.vector.collection, config.vector.dimension
                    );
                }
                CollectionAction::Seed { path } => {
                    let text = std::fs::read_to_string(&path)?;
                    let records: Vec<ProjectRecord> = serde_json::from_str(&text)?;

                    let texts: Vec<String> = records
                        .iter()
                        .map(|r| format!("{}\n{}", r.title, r.description))
                        .collect();
                    let vectors = stack.embedder.embed_batch(&texts).await?;

                    let points: Vec<RecordPoint> = records
                        .into_iter()
                        .zip(vectors)
                        .map(|(payload, vector)| RecordPoint {
                            id: Uuid::new_v4().to_string(),
                            vector,
                            payload,
                        })
                        .collect();

                    let count = points.len();
                    admin.upsert(&config.vector.collection, points).await?;
                    println!("seeded {count} records into `{}`", config.vector.collection);
                }
                CollectionAction::Delete { ids } => {
                    admin.delete(&config.vector.collection, &ids).await?;
                    println!("deleted {} records", ids.len());
                }
            }
        }
    }

    Ok(())
}
