use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use journal_gateway::api::ApiServerBuilder;
use journal_gateway::db::{self, ConversationRepo};
use journal_gateway::voice::truncate_input;
use journal_gateway::{
    Config, ContextAssembler, JournalService, OpenAiCompletion, OpenAiSpeech, SpeechProvider,
    SpeechToText,
};

/// Provider requests that hang longer than this are abandoned
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Journal Gateway - backend for a voice and text journaling assistant
#[derive(Parser)]
#[command(name = "journal-gateway", version, about)]
struct Cli {
    /// Port to listen on (overrides JOURNAL_PORT and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a conversation for a user
    CreateConversation {
        /// Owning user ID
        #[arg(short, long)]
        user: String,
        /// Conversation title
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List a user's conversations, newest first
    ListConversations {
        /// Owning user ID
        #[arg(short, long)]
        user: String,
    },
    /// Synthesize text and write the audio to a file
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the journal voice.")]
        text: String,
        /// Output file (defaults to tts-test.<format>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info,journal_gateway=info",
        1 => "info,journal_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.port).await,
        Command::CreateConversation { user, title } => create_conversation(&user, title.as_deref()),
        Command::ListConversations { user } => list_conversations(&user),
        Command::TestTts { text, out } => test_tts(&text, out).await,
        Command::ConfigPath => {
            match journal_gateway::config::file::config_file_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("no config directory available on this platform"),
            }
            Ok(())
        }
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

/// Run the HTTP server until interrupted
async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let port = port_override.unwrap_or(config.api_server.port);
    let pool = db::init(config.database_path())?;
    let client = http_client()?;
    let base_url = &config.openai.base_url;

    let completion = OpenAiCompletion::new(
        client.clone(),
        base_url.as_str(),
        config.openai.require_api_key()?,
    )?;
    let speech = OpenAiSpeech::new(
        client.clone(),
        base_url.as_str(),
        config.openai.require_api_key()?,
    )?;
    let transcriber = SpeechToText::new(
        client,
        base_url.as_str(),
        config.openai.require_api_key()?,
        config.stt_model.clone(),
    )?;

    tracing::info!(
        port,
        model = %config.completion.model,
        scope = %config.context.scope,
        max_history = config.context.max_history,
        voice = %config.speech.voice,
        "starting journal gateway"
    );

    let journal = JournalService::new(
        pool.clone(),
        ContextAssembler::new(config.context),
        Arc::new(completion),
        Arc::new(speech),
    )
    .with_completion_params(config.completion)
    .with_speech_params(config.speech);

    let server = ApiServerBuilder::new(pool, Arc::new(journal))
        .transcriber(Arc::new(transcriber))
        .api_key(config.api_server.api_key)
        .rate_limit(config.api_server.rate_limit_per_minute)
        .port(port)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Create a conversation from the command line
fn create_conversation(user: &str, title: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let repo = ConversationRepo::new(db::init(config.database_path())?);

    let conversation = repo.create(user, title)?;
    println!("{}\t{}", conversation.id, conversation.title);
    Ok(())
}

/// Print a user's conversations
fn list_conversations(user: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let repo = ConversationRepo::new(db::init(config.database_path())?);

    let conversations = repo.list_for_user(user)?;
    if conversations.is_empty() {
        println!("No conversations for {user}");
        return Ok(());
    }

    for c in conversations {
        println!(
            "{}\t{}\t{}",
            c.id,
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.title
        );
    }
    Ok(())
}

/// Synthesize text with the configured voice and save the audio
async fn test_tts(text: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let speech = OpenAiSpeech::new(
        http_client()?,
        config.openai.base_url.as_str(),
        config.openai.require_api_key()?,
    )?;

    let params = config.speech;
    let input = truncate_input(text, params.max_input_chars);
    println!(
        "Synthesizing with {} / {} at {}x...",
        params.model, params.voice, params.speed
    );

    let audio = speech.synthesize(&input, &params).await?;
    let path = out.unwrap_or_else(|| PathBuf::from(format!("tts-test.{}", params.format)));
    tokio::fs::write(&path, &audio).await?;

    println!("Wrote {} bytes to {}", audio.len(), path.display());
    Ok(())
}
