use anyhow::Result;
use clap::{Parser, Subcommand};
use food_client::{FoodClient, FoodRecord, config};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Submit and list food records")]
struct Cli {
    /// Config file, defaults to settings.yml. FOOD_API_* env variables win over it
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// POST one record to <base>/food
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        calories: u32,
        /// Extra backend fields as a JSON object, e.g. '{"price":1.5}'
        #[arg(long, value_parser = parse_extra)]
        extra: Option<Map<String, Value>>,
    },
    /// GET <base>/food
    List,
}

fn parse_extra(raw: &str) -> Result<Map<String, Value>, serde_json::Error> {
    serde_json::from_str(raw)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    let client = FoodClient::from_settings(&settings)?;

    match cli.command {
        Command::Submit {
            name,
            calories,
            extra,
        } => {
            let mut record = FoodRecord::new(name, calories);
            if let Some(extra) = extra {
                record.extra = extra;
            }

            let response = client.submit_mutation().submit(&record).await?;
            println!("{}", response.status);
            println!("{}", String::from_utf8_lossy(&response.body));
        }
        Command::List => {
            let records = client.food_data().fetch().await?;
            for record in records.iter() {
                println!("{}\t{}", record.name, record.calories);
            }
        }
    }

    Ok(())
}
