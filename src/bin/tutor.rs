//! Shadowing practice demo
//!
//! Wires the duplex engine to the default microphone and speakers with
//! the offline loopback agent standing in for the remote tutor: speak,
//! pause, and hear yourself echoed back at the tutor's playback rate;
//! talk over the echo to exercise barge-in. Stop with Ctrl+C.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verb_shadowing::{
    audio::{CpalMicrophone, CpalSpeaker},
    channel::loopback::EchoAgent,
    config::AppConfig,
    content::Lesson,
    session::Session,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;

    let mut args = std::env::args().skip(1);
    let verb = args.next().unwrap_or_else(|| config.default_verb.clone());
    let tense = args.next().unwrap_or_else(|| config.default_tense.clone());
    let lesson = Lesson::new(tense, verb);

    tracing::info!(
        verb = %lesson.verb,
        tense = %lesson.tense,
        voice = %config.voice_name,
        "starting shadowing practice"
    );

    let (mut session, control) = Session::new(
        lesson.session_config(&config.voice_name),
        Box::new(EchoAgent::new()),
        Box::new(CpalMicrophone::new()),
        Box::new(CpalSpeaker::new()),
        Box::new(|state, message| {
            tracing::info!(?state, "{message}");
        }),
    );

    session.start()?;
    let loop_handle = tokio::task::spawn_blocking(move || session.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("stop requested");
    control.stop();

    let final_state = loop_handle.await?;
    tracing::info!(?final_state, "session finished");
    Ok(())
}
