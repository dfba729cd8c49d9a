use anyhow::Result;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use std::path::PathBuf;

use hcc_extractor::config::Config;
use hcc_extractor::external::{ConditionExtractor, OpenAIModel, VertexModel};
use hcc_extractor::workflow::NoteWorkflow;

#[derive(ValueEnum, Clone, Debug)]
enum Provider {
    Openai,
    Vertex,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing progress note .txt files
    #[arg(short = 'n', long)]
    notes_dir: Option<PathBuf>,

    /// Path to the HCC relevant codes CSV
    #[arg(short = 'c', long)]
    hcc_codes: Option<PathBuf>,

    /// Hosted model backing the extraction
    #[arg(short = 'p', long, value_enum, default_value = "vertex")]
    provider: Provider,

    /// Override the extraction model name
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// OpenAI API endpoint
    #[arg(short = 'e', long)]
    openai_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    let level = config
        .pipeline
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let extractor: Box<dyn ConditionExtractor> = match args.provider {
        Provider::Openai => {
            let mut openai = config.openai.clone();
            if let Some(model) = args.model {
                openai.model = model;
            }
            if let Some(endpoint) = args.openai_endpoint {
                openai.endpoint = endpoint;
            }
            Box::new(OpenAIModel::new(openai)?)
        }
        Provider::Vertex => {
            let mut vertex = config.vertex.clone();
            if let Some(model) = args.model {
                vertex.model = model;
            }
            Box::new(VertexModel::new(vertex)?)
        }
    };

    let notes_dir = args
        .notes_dir
        .unwrap_or_else(|| PathBuf::from(&config.pipeline.progress_note_path));
    let hcc_codes = args
        .hcc_codes
        .unwrap_or_else(|| PathBuf::from(&config.pipeline.hcc_codes_path));

    let workflow = NoteWorkflow::new(extractor, hcc_codes);
    let relevant_conditions = workflow.run_directory(&notes_dir).await?;

    println!("Relevant HCC Conditions:");
    for condition in &relevant_conditions {
        println!(
            "Condition: {}, HCC Codes: {}",
            condition.condition,
            condition.hcc_codes.join(", ")
        );
    }

    Ok(())
}
