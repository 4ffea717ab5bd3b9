use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "factcheck")]
#[command(about = "Claim-to-evidence fact-checking pipeline driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fact-check a video transcript by URL.
    Video(VideoCmd),
    /// Fact-check an article by URL.
    Article(ArticleCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct VideoCmd {
    /// Stable identifier for the video (used as the output's `video_id`).
    #[arg(long)]
    video_id: String,
    /// Video URL to fetch a transcript for.
    #[arg(long)]
    video_url: String,
}

#[derive(clap::Args, Debug)]
struct ArticleCmd {
    /// Article URL to fetch and fact-check.
    #[arg(long)]
    article_url: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

async fn build_app_context() -> Result<factcheck_pipeline::AppContext> {
    factcheck_pipeline::AppContext::from_env(
        factcheck_cli::cache_dir_from_env(),
        factcheck_cli::partitions_dir_from_env(),
    )
    .await
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Video(args) => {
            let ctx = build_app_context().await?;
            let result = ctx
                .pipeline_driver
                .run_video(&args.video_id, &args.video_url)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Article(args) => {
            let ctx = build_app_context().await?;
            let result = ctx.pipeline_driver.run_article(&args.article_url).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();

            let brave_configured =
                has_env("FACTCHECK_BRAVE_API_KEY") || has_env("BRAVE_SEARCH_API_KEY");
            let tavily_configured =
                has_env("FACTCHECK_TAVILY_API_KEY") || has_env("TAVILY_API_KEY");
            let searxng_configured = has_env("FACTCHECK_SEARXNG_ENDPOINT");
            let llm_configured = has_env("FACTCHECK_OPENAI_COMPAT_BASE_URL");
            let s3_configured = has_env("S3_BUCKET_NAME");

            let cache_dir = factcheck_cli::cache_dir_from_env();
            let partitions_dir = factcheck_cli::partitions_dir_from_env();

            let mut checks: Vec<serde_json::Value> = Vec::new();

            let cache_ok = (|| -> anyhow::Result<()> {
                std::fs::create_dir_all(&cache_dir)?;
                let probe = cache_dir.join(format!(
                    "factcheck-doctor-{}.probe",
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis()
                ));
                std::fs::write(&probe, b"ok")?;
                let _ = std::fs::remove_file(&probe);
                Ok(())
            })()
            .is_ok();
            checks.push(serde_json::json!({
                "name": "cache_dir_writable",
                "ok": cache_ok,
                "message": if cache_ok { "cache dir is writable" } else { "cache dir is not writable" },
                "hint": if cache_ok { "" } else { "Set FACTCHECK_CACHE_DIR to a writable directory." },
            }));

            let partitions_ok = partitions_dir.exists();
            checks.push(serde_json::json!({
                "name": "partitions_dir_present",
                "ok": partitions_ok,
                "message": if partitions_ok { "partitions dir is present" } else { "partitions dir is missing" },
                "hint": if partitions_ok { "" } else { "Set FACTCHECK_PARTITIONS_DIR to a directory populated by the title-index builder." },
            }));

            let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "factcheck",
                "version": env!("CARGO_PKG_VERSION"),
                "platform": {
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
                "elapsed_ms": t0.elapsed().as_millis(),
                "configured": {
                    "providers": {
                        "brave": brave_configured,
                        "tavily": tavily_configured,
                        "searxng": searxng_configured,
                    },
                    "llm": {
                        "openai_compat": llm_configured,
                    },
                    "object_store": {
                        "s3": s3_configured,
                    },
                    "cache_dir": cache_dir.to_string_lossy().to_string(),
                    "partitions_dir": partitions_dir.to_string_lossy().to_string(),
                },
                "checks": checks,
            });

            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("factcheck {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
                    println!(
                        "cache_dir: {}",
                        payload["configured"]["cache_dir"].as_str().unwrap_or("")
                    );
                    println!(
                        "providers: brave={} tavily={} searxng={}",
                        brave_configured, tavily_configured, searxng_configured,
                    );
                    println!("llm: openai_compat={llm_configured}");
                    println!("checks:");
                    if let Some(arr) = payload["checks"].as_array() {
                        for c in arr {
                            let name = c["name"].as_str().unwrap_or("?");
                            let ok = c["ok"].as_bool().unwrap_or(false);
                            println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                        }
                    }
                }
                _ => println!("{payload}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "factcheck",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("factcheck {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }

    Ok(())
}
