use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use lingua_relay::config::RelayConfig;
use lingua_relay::conversation::{
    Collaborators, ConversationParticipant, LanguageTag, SessionCoordinator,
};
use lingua_relay::logging;

/// Multi-party conversation translation relay
#[derive(Parser, Debug)]
#[command(name = "lingua-relay", author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scripted conversation and print each message as JSON
    Run {
        /// Participant as `id:name:language`, e.g. `a:Alice:en` (repeatable)
        #[arg(short, long = "participant", value_parser = parse_participant, required = true)]
        participants: Vec<ConversationParticipant>,

        /// Script file with one `speaker_id: text` line per utterance
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Print the JSON schema of config.toml
    Schema,

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_participant(raw: &str) -> std::result::Result<ConversationParticipant, String> {
    let mut parts = raw.splitn(3, ':');
    let (Some(id), Some(name), Some(lang)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected id:name:language, got {raw:?}"));
    };
    if id.trim().is_empty() {
        return Err("participant id must not be empty".into());
    }
    let language: LanguageTag = lang.parse()?;
    Ok(ConversationParticipant::new(id.trim(), name.trim(), language))
}

/// Parse `speaker: text` lines. Blank lines and `#` comments are skipped.
fn parse_script(contents: &str) -> Result<Vec<(String, String)>> {
    let mut turns = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((speaker, text)) = line.split_once(':') else {
            bail!("Script line {} is not `speaker: text`", idx + 1);
        };
        turns.push((speaker.trim().to_string(), text.trim().to_string()));
    }
    Ok(turns)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            println!("{}", RelayConfig::json_schema()?);
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            clap_complete::generate(shell, &mut Cli::command(), "lingua-relay", &mut stdout);
            stdout.flush()?;
            Ok(())
        }
        Commands::Run {
            participants,
            script,
        } => {
            let relay = RelayConfig::load_or_default(cli.config.as_deref())?;
            logging::init(&relay.logging);

            let contents = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("Failed to read script {}", script.display()))?;
            let turns = parse_script(&contents)?;

            let coordinator = SessionCoordinator::new(relay.conversation, Collaborators::stubbed());
            coordinator.start_session(participants, relay.session)?;

            let mut stdout = std::io::stdout().lock();
            for (speaker, text) in turns {
                match coordinator.submit_input(text, &speaker).await {
                    Ok(message) => writeln!(stdout, "{}", serde_json::to_string(&message)?)?,
                    Err(e) => tracing::error!(speaker = %speaker, error = %e, "Utterance dropped"),
                }
            }

            let summary = coordinator.end_session().await?;
            writeln!(stdout, "{}", serde_json::to_string_pretty(&summary)?)?;
            Ok(())
        }
    }
}
