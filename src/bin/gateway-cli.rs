use clap::{Parser, Subcommand};
use futures_util::{stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Client and operator CLI for the payment gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9999")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one payment
    Pay {
        #[arg(long)]
        correlation_id: Option<String>,
        #[arg(long, default_value_t = 19.90)]
        amount: f64,
    },
    /// Show the payments summary
    Summary {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Check gateway status
    Status,
    /// List circuit breaker states
    Breakers,
    /// Show cached downstream health
    Health,
    /// Fire many payments with unique correlation ids
    Stress {
        #[arg(long, default_value_t = 1000)]
        total: usize,
        #[arg(long, default_value_t = 50)]
        concurrency: usize,
        #[arg(long, default_value_t = 19.90)]
        amount: f64,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Pay {
            correlation_id,
            amount,
        } => {
            let correlation_id = correlation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let res = client
                .post(format!("{}/payments", cli.url))
                .json(&json!({ "correlationId": correlation_id, "amount": amount }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Summary { from, to } => {
            let mut query = Vec::new();
            if let Some(from) = from {
                query.push(("from", from));
            }
            if let Some(to) = to {
                query.push(("to", to));
            }
            let res = client
                .get(format!("{}/payments-summary", cli.url))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Breakers => {
            let res = client
                .get(format!("{}/admin/circuit-breakers", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client
                .get(format!("{}/admin/health-cache", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Stress {
            total,
            concurrency,
            amount,
            timeout_secs,
        } => {
            stress(&client, &cli.url, total, concurrency.max(1), amount, Duration::from_secs(timeout_secs)).await;
        }
    }

    Ok(())
}

enum Outcome {
    Success,
    Timeout,
    Error,
}

async fn stress(
    client: &reqwest::Client,
    url: &str,
    total: usize,
    concurrency: usize,
    amount: f64,
    timeout: Duration,
) {
    let endpoint = format!("{url}/payments");
    let start = Instant::now();

    let outcomes: Vec<Outcome> = stream::iter(0..total)
        .map(|_| {
            let request = client
                .post(&endpoint)
                .timeout(timeout)
                .json(&json!({
                    "correlationId": uuid::Uuid::new_v4().to_string(),
                    "amount": amount,
                }));
            async move {
                // Small jitter so requests do not arrive in lockstep.
                tokio::time::sleep(Duration::from_millis(fastrand::u64(0..5))).await;
                match request.send().await {
                    Ok(res) if res.status().is_success() => Outcome::Success,
                    Ok(_) => Outcome::Error,
                    Err(e) if e.is_timeout() => Outcome::Timeout,
                    Err(_) => Outcome::Error,
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let elapsed = start.elapsed();
    let count = |wanted: fn(&Outcome) -> bool| outcomes.iter().filter(|o| wanted(o)).count();
    let success = count(|o| matches!(o, Outcome::Success));
    let timeouts = count(|o| matches!(o, Outcome::Timeout));
    let errors = count(|o| matches!(o, Outcome::Error));

    println!("Requests:    {total}");
    println!("Concurrency: {concurrency}");
    println!("Success:     {success}");
    println!("Timeouts:    {timeouts}");
    println!("Errors:      {errors}");
    println!("Elapsed:     {:.2}s", elapsed.as_secs_f64());
    println!(
        "Throughput:  {:.1} req/s",
        total as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
