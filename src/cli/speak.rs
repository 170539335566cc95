//! `avatar-voice speak`: streaming synthesis with latency metrics.

use std::sync::Arc;
use std::time::Duration;

use super::SpeakArgs;
use crate::audio::playback::{
    MemoryPlaybackSink, PlaybackTarget, SpeakerStyle, StreamingSpeaker, StreamingStatus,
    SynthesisRequest,
};
use crate::config::VoiceConfig;
use crate::error::VoiceError;

pub async fn handle_speak(args: SpeakArgs) -> Result<(), VoiceError> {
    let config = VoiceConfig::from_env();
    let provider = config.aivis_provider()?;
    let style = match args.style_name {
        Some(name) => SpeakerStyle::StyleName(name),
        None => SpeakerStyle::StyleId(args.style_id),
    };
    let request = SynthesisRequest::builder()
        .model_uuid(args.model_uuid)
        .text(args.text)
        .style(style)
        .speaking_rate(args.speed)
        .build();

    let sink = Arc::new(MemoryPlaybackSink::default());
    let speaker = StreamingSpeaker::new(Arc::new(provider)).with_config(config.playback_config());
    let session = speaker.speak(&request, PlaybackTarget::new(sink)).await;

    let status = tokio::select! {
        status = session.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            session.stop();
            eprintln!("Stopped.");
            return Ok(());
        }
    };

    print_metrics(&status);
    if let Some(error) = status.error {
        return Err(VoiceError::Playback(error));
    }
    if let (Some(path), Some(blob)) = (args.output, status.audio_blob) {
        tokio::fs::write(&path, &blob).await?;
        println!("Wrote {} bytes to {}", blob.len(), path.display());
    }
    Ok(())
}

fn print_metrics(status: &StreamingStatus) {
    let progress = &status.progress;
    let rows = [
        ("request sent", progress.time_to_request_sent),
        ("first chunk", progress.time_to_first_chunk_arrived),
        ("first playback", progress.time_to_first_playback),
        ("last chunk", progress.time_to_last_chunk_arrived),
    ];
    for (label, value) in rows {
        println!("{label:>15}: {}", format_duration(value));
    }
    if let Some(seconds) = progress.total_audio_duration {
        println!("{:>15}: {seconds:.2}s", "audio length");
    }
}

fn format_duration(value: Option<Duration>) -> String {
    value.map_or_else(|| "-".to_string(), |d| format!("{}ms", d.as_millis()))
}
