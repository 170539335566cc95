//! `avatar-voice realtime`: an interactive realtime session.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::RealtimeArgs;
use crate::audio::realtime::{RealtimeSession, SessionEvent, SessionEventHandler};
use crate::audio::types::Voice;
use crate::config::VoiceConfig;
use crate::error::VoiceError;
use crate::tools::{FunctionTool, ToolParameters, ToolRegistry};

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(2);

/// Prints transcripts and appends audio to an optional file.
struct ConsoleHandler {
    output: Mutex<Option<File>>,
}

#[async_trait]
impl SessionEventHandler for ConsoleHandler {
    async fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Transcript(transcript) => {
                println!("{}: {}", transcript.role, transcript.text);
            }
            SessionEvent::Audio { buffer } => {
                let mut output = self.output.lock().await;
                if let Some(file) = output.as_mut() {
                    if let Err(error) = file.write_all(&buffer).await {
                        tracing::warn!(%error, "Failed to write audio");
                    }
                }
            }
        }
    }
}

/// Built-in tool answering with the local time.
pub fn current_time_tool() -> FunctionTool {
    FunctionTool::new(
        "get_current_time",
        "Get the current local date and time",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            let now = chrono::Local::now();
            Ok(serde_json::json!({
                "datetime": now.to_rfc3339(),
                "timezone": now.format("%:z").to_string(),
            }))
        },
    )
}

async fn open_output(path: Option<&Path>) -> Result<Option<File>, VoiceError> {
    match path {
        Some(path) => Ok(Some(File::create(path).await?)),
        None => Ok(None),
    }
}

pub async fn handle_realtime(args: RealtimeArgs) -> Result<(), VoiceError> {
    let config = VoiceConfig::from_env();
    let mut realtime = config.realtime_configuration()?;
    if let Some(system) = args.system {
        realtime.instructions = system;
    }
    if let Some(voice) = args.voice {
        realtime.voice = Voice::new(voice);
    }
    realtime.turn_detection |= args.turn_detection;
    if !realtime.is_enabled() {
        return Err(VoiceError::Configuration(format!(
            "No credentials configured for realtime provider '{}'",
            realtime.provider
        )));
    }

    let handler = Arc::new(ConsoleHandler {
        output: Mutex::new(open_output(args.output.as_deref()).await?),
    });
    let tools = ToolRegistry::new().register(current_time_tool());
    let mut session = RealtimeSession::new(realtime, handler).with_tools(tools);
    session.connect()?;

    eprintln!("Type a message and press Enter. Ctrl-C to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = watchdog.tick() => {
                session.ensure_connected();
            }
            line = lines.next_line() => match line {
                Ok(Some(text)) if text.trim().is_empty() => {}
                Ok(Some(text)) => {
                    if let Err(error) = session.send_user_text(text.trim()) {
                        eprintln!("Not sent: {error}");
                    }
                }
                Ok(None) => break,
                Err(error) => return Err(error.into()),
            }
        }
    }

    session.disconnect();
    Ok(())
}
