use agentcore_stream::client::{AgentCoreClient, runtime_endpoint};
use agentcore_stream::config::ClientConfig;
use agentcore_stream::render::EventRenderer;
use agentcore_stream::streaming::{ThinkingMode, decode_iter};
use anyhow::{Context, bail};
use clap::Parser;
use futures::StreamExt;
use std::convert::Infallible;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Stream and display AgentCore agent responses")]
struct Args {
    /// Full invocation URL of the agent runtime
    #[arg(long, env = "AGENTCORE_ENDPOINT")]
    endpoint: Option<String>,

    /// Agent runtime ARN, used with --region to build the endpoint
    #[arg(long, env = "BEDROCK_AGENT_ARN")]
    agent_arn: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    #[arg(long, env = "BEDROCK_AGENT_ID")]
    agent_id: Option<String>,

    #[arg(long, env = "AGENTCORE_TOKEN")]
    auth_token: Option<String>,

    #[arg(long, env = "AWS_BEARER_TOKEN_BEDROCK")]
    api_key: Option<String>,

    /// Session id for conversation continuity (random when omitted)
    #[arg(long)]
    session_id: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// How thinking content is delivered: structured or inline_tags
    #[arg(long)]
    thinking_mode: Option<ThinkingMode>,

    /// Hide thinking/reasoning output
    #[arg(long)]
    no_thinking: bool,

    /// Print every event as JSON
    #[arg(short, long)]
    verbose: bool,

    /// Decode a recorded response body instead of calling the agent
    #[arg(long)]
    replay: Option<String>,

    /// Chunk size used to feed the replayed body
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Prompt to send; interactive mode when omitted
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let show_thinking = !args.no_thinking;

    if let Some(path) = &args.replay {
        return replay(path, &args);
    }

    let config = build_config(&args)?;
    let client = AgentCoreClient::new(config)?;
    let session_id = client
        .config()
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    eprintln!("Endpoint: {}", client.config().endpoint_url);
    eprintln!("Session: {}", session_id);

    if let Some(prompt) = &args.prompt {
        return run_prompt(&client, prompt, &session_id, args.verbose, show_thinking).await;
    }

    eprintln!("Interactive mode - type 'exit' to quit\n");
    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if matches!(prompt.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            eprintln!("Goodbye!");
            break;
        }
        if prompt.is_empty() {
            continue;
        }

        if let Err(e) = run_prompt(&client, prompt, &session_id, args.verbose, show_thinking).await {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}

fn build_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => {
            let endpoint = match (&args.endpoint, &args.agent_arn) {
                (Some(endpoint), _) => endpoint.clone(),
                (None, Some(arn)) => runtime_endpoint(&args.region, arn)?,
                (None, None) => bail!("either --endpoint or --agent-arn must be given"),
            };
            ClientConfig::new(endpoint)
        }
    };

    if args.agent_id.is_some() {
        config.agent_id = args.agent_id.clone();
    }
    if args.auth_token.is_some() {
        config.auth_token = args.auth_token.clone();
    }
    if args.api_key.is_some() {
        config.api_key = args.api_key.clone();
    }
    if args.session_id.is_some() {
        config.session_id = args.session_id.clone();
    }
    if let Some(mode) = args.thinking_mode {
        config.thinking = mode;
    }

    config.validate()?;
    Ok(config)
}

async fn run_prompt(
    client: &AgentCoreClient,
    prompt: &str,
    session_id: &str,
    verbose: bool,
    show_thinking: bool,
) -> anyhow::Result<()> {
    let mut renderer = EventRenderer::new(io::stdout(), verbose, show_thinking);
    let mut events = client.invoke_stream(prompt, Some(session_id), None).await;

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => renderer.render(&event)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                // Dropping the stream closes the connection
                eprintln!("\nInterrupted");
                break;
            }
        }
    }

    Ok(())
}

fn replay(path: &str, args: &Args) -> anyhow::Result<()> {
    let body = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
    let chunk_size = args.chunk_size.max(1);
    let mode = args.thinking_mode.unwrap_or_default();

    let mut renderer = EventRenderer::new(io::stdout(), args.verbose, !args.no_thinking);
    let mut events = decode_iter(body.chunks(chunk_size).map(Ok::<_, Infallible>), mode);
    for event in events.by_ref() {
        renderer.render(&event)?;
    }

    match events.into_message() {
        Some(message) => println!("\n{}", serde_json::to_string_pretty(&message)?),
        None => eprintln!("Stream ended without a complete message"),
    }
    Ok(())
}
