use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use specmint_core::parse_schema_str;
use specmint_generate::{GenerateOptions, GenerationEngine};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut options = GenerateOptions {
        count: 5,
        ..GenerateOptions::default()
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--count" => options.count = args.next().ok_or("missing --count value")?.parse()?,
            "--seed" => options.seed = args.next().ok_or("missing --seed value")?.parse()?,
            "--domain" => options.domain = args.next(),
            _ if schema_path.is_none() => schema_path = Some(PathBuf::from(arg)),
            _ => return Err("unexpected argument".into()),
        }
    }

    let schema_path = schema_path.ok_or("missing schema path")?;
    let schema = parse_schema_str(&std::fs::read_to_string(&schema_path)?)?;

    let engine = GenerationEngine::new(options);
    let result = engine.generate(Arc::new(schema)).await?;

    for record in &result.records {
        println!("{}", serde_json::to_string(&record.data)?);
    }
    eprintln!("{}", serde_json::to_string_pretty(&result.report)?);
    Ok(())
}
