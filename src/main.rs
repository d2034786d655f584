use clap::Parser;
use data_pipeline::runner::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUCKET, DEFAULT_DATABASE_URL, DEFAULT_LOG_DIR, DEFAULT_LOG_FILTER,
    DEFAULT_S3_ACCESS_KEY, DEFAULT_S3_ENDPOINT, DEFAULT_S3_REGION, DEFAULT_S3_SECRET_KEY,
    LogConfig, PipelineArgsBuilder, S3Settings, SourceObject, StoreConfig, default_sources,
    run_pipeline,
};
use std::path::PathBuf;

/// Load customers.csv, products.json and sales.parquet from an S3-compatible
/// bucket into PostgreSQL, replacing the tables on every run
#[derive(Parser, Clone)]
#[command(version, about)]
struct Args {
    /// S3-compatible endpoint URL
    #[arg(long, env = "PIPELINE_S3_ENDPOINT", default_value = DEFAULT_S3_ENDPOINT)]
    s3_endpoint: String,

    /// S3 access key
    #[arg(long, env = "PIPELINE_S3_ACCESS_KEY", default_value = DEFAULT_S3_ACCESS_KEY)]
    s3_access_key: String,

    /// S3 secret key
    #[arg(
        long,
        env = "PIPELINE_S3_SECRET_KEY",
        default_value = DEFAULT_S3_SECRET_KEY,
        hide_env_values = true
    )]
    s3_secret_key: String,

    /// S3 region
    #[arg(long, env = "PIPELINE_S3_REGION", default_value = DEFAULT_S3_REGION)]
    s3_region: String,

    /// Bucket holding the raw objects
    #[arg(short, long, env = "PIPELINE_BUCKET", default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Object to load as KEY[:TABLE[:FORMAT]] (repeatable); defaults to
    /// customers.csv, products.json and sales.parquet
    #[arg(short, long = "source", value_name = "SOURCE")]
    sources: Vec<String>,

    /// Read objects from <DIR>/<bucket>/<key> instead of S3
    #[arg(long, env = "PIPELINE_LOCAL_DIR")]
    local_dir: Option<PathBuf>,

    /// Database connection string
    #[arg(
        short,
        long,
        env = "PIPELINE_DATABASE_URL",
        default_value = DEFAULT_DATABASE_URL,
        hide_env_values = true
    )]
    database_url: String,

    /// Rows per INSERT statement
    #[arg(long, env = "PIPELINE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Directory for the daily log files
    #[arg(long, env = "PIPELINE_LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Log to the console only
    #[arg(long)]
    no_log_file: bool,

    /// Log filter directives (overrides RUST_LOG)
    #[arg(long, env = "RUST_LOG", default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let sources = if args.sources.is_empty() {
        default_sources(&args.bucket)
    } else {
        args.sources
            .iter()
            .map(|source| SourceObject::parse(&args.bucket, source))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let store = match args.local_dir {
        Some(dir) => StoreConfig::Local(dir),
        None => StoreConfig::S3(S3Settings {
            endpoint: args.s3_endpoint,
            access_key: args.s3_access_key,
            secret_key: args.s3_secret_key,
            region: args.s3_region,
        }),
    };

    let logging = LogConfig {
        directory: (!args.no_log_file).then_some(args.log_dir),
        filter: args.log_filter,
    };

    let pipeline_args = PipelineArgsBuilder::default()
        .store(store)
        .sources(sources)
        .database_url(args.database_url)
        .batch_size(args.batch_size)
        .logging(logging)
        .build()?;

    let result = run_pipeline(pipeline_args).await?;

    println!();
    println!("Pipeline Summary");
    println!("================");
    for load in &result.tables {
        println!("{:<12} {:>10} rows  (from {})", load.table, load.rows_written, load.source);
    }
    println!("Total rows: {}", result.total_rows());
    println!("Duration: {:.2}s", result.duration.as_secs_f64());

    Ok(())
}
