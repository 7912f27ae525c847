use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use video_qa_rust::assistant::failure_message;
use video_qa_rust::{
    AnswerClient, Config, FileTranscriptSource, ManualPlaybackHost, PlaybackTracker, Reply,
    VideoAssistant,
};
use vqa_core::format_timestamp;
use vqa_llm::{EnvKeyStore, KeyStore, OpenAIEndpoint};

const DEFAULT_FILTER: &str = "video_qa_rust=info,vqa_llm=info,warn";

fn log_filter(config: &Config, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = if verbose {
        "video_qa_rust=debug,vqa_llm=debug,vqa_core=debug,warn".to_string()
    } else if config.output.log_level != "info" {
        format!(
            "video_qa_rust={level},vqa_llm={level},warn",
            level = config.output.log_level
        )
    } else {
        DEFAULT_FILTER.to_string()
    };

    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Video QA (Rust)")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Ask questions about a video from its transcript")
        .arg(
            Arg::new("question")
                .value_name("QUESTION")
                .help("Question about the video")
                .required_unless_present("check-key")
        )
        .arg(
            Arg::new("video-id")
                .short('i')
                .long("video-id")
                .value_name("ID")
                .help("Video id; the transcript is read from <dir>/<id>.json or <id>.srt")
                .required_unless_present("check-key")
        )
        .arg(
            Arg::new("title")
                .short('t')
                .long("title")
                .value_name("TITLE")
                .help("Video title")
                .default_value("")
        )
        .arg(
            Arg::new("at")
                .short('a')
                .long("at")
                .value_name("SECONDS")
                .help("Playback position in seconds")
                .value_parser(clap::value_parser!(f64))
                .default_value("0")
        )
        .arg(
            Arg::new("transcript-dir")
                .short('d')
                .long("transcript-dir")
                .value_name("DIR")
                .help("Directory containing transcripts")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the selected context without calling the model")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("check-key")
                .long("check-key")
                .help("Verify the configured API key with the provider and exit")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config, matches.get_flag("verbose")))
        .init();

    config.validate()?;

    let endpoint = OpenAIEndpoint::new(&config.llm)?;
    let client = AnswerClient::new(Arc::new(endpoint), config.llm.clone());
    let keys = Arc::new(EnvKeyStore::new(config.llm.api_key_env()));

    if matches.get_flag("check-key") {
        let key = keys.get_credential();
        return match client.verify_credential(key.as_deref()).await {
            Ok(()) => {
                println!("✅ API key accepted");
                Ok(())
            }
            Err(e) => {
                println!("{}", failure_message(&e));
                Err(e.into())
            }
        };
    }

    let question = matches
        .get_one::<String>("question")
        .context("question is required")?;
    let video_id = matches
        .get_one::<String>("video-id")
        .context("video id is required")?;
    let title = matches.get_one::<String>("title").cloned().unwrap_or_default();
    let at = matches.get_one::<f64>("at").copied().unwrap_or(0.0);
    let transcript_dir = matches
        .get_one::<String>("transcript-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| config.assistant.transcript_dir.clone());

    info!("🚀 Video QA (Rust) starting...");
    info!("📁 Transcript directory: {}", transcript_dir.display());
    info!("{}", config.summary());

    let host = Arc::new(ManualPlaybackHost::new(at));
    let tracker = PlaybackTracker::new(host);

    let assistant = VideoAssistant::new(
        &config,
        Arc::new(FileTranscriptSource::new(transcript_dir)),
        client,
        keys,
        tracker,
    );

    let session = assistant.load_video(video_id, &title).await;
    assistant.tracker().sample();
    if session.transcript.is_empty() {
        warn!("No transcript segments for {}", video_id);
    }

    if matches.get_flag("dry-run") {
        let now = assistant.tracker().current_time();
        let (intent, selection) = assistant.select_context(&session, question, now);
        println!("Intent:   {}", intent);
        println!("Strategy: {}", selection.strategy);
        println!("Position: {}", format_timestamp(now));
        println!("\n{}", selection.text);
        return Ok(());
    }

    let outcome = assistant.ask(question).await?;
    info!(
        "Answered {} question with {} context",
        outcome.intent, outcome.selection.strategy
    );

    if let Reply::Answer {
        model,
        usage: Some(usage),
        ..
    } = &outcome.reply
    {
        info!("📊 {} used {} tokens", model, usage.total_tokens);
    }

    println!("{}", outcome.reply.text());
    Ok(())
}
