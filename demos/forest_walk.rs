/// Forest Walk example — a scripted run through the bundled forest story.
///
/// Start → climb the oak → hear the owl's story → ride home.
///
/// Shows the typewriter reveal, refused early choices, progress and audio
/// cues along the way.
///
/// Run with: cargo run --example forest_walk

use std::sync::Arc;
use story_engine::core::catalog::StoryCatalog;
use story_engine::core::config::EngineConfig;
use story_engine::core::session::{NarrativeSession, SessionError, SessionPhase};
use story_engine::schema::scene::ChoiceId;
use story_engine::schema::theme::ThemeKey;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let catalog = Arc::new(StoryCatalog::bundled()?);
    // Faster than the default so the demo does not drag.
    let config = EngineConfig::parse_ron("(char_delay_ms: 8)")?;
    let mut session = NarrativeSession::with_config(catalog, config);

    println!("Available stories:");
    for theme in session.catalog().themes() {
        println!("  {:<8} {}", theme.key, theme.display_name);
    }

    session.select_theme(ThemeKey::new("forest"))?;
    session.start()?;

    // Choices are refused until the text has been revealed.
    match session.choose(&ChoiceId::new("climb_oak")) {
        Err(SessionError::InvalidChoice(reason)) => println!("\n(too early: {})", reason),
        other => println!("\nunexpected: {:?}", other),
    }

    for step in ["climb_oak", "listen", "fly_home"] {
        read_scene(&session).await;
        println!("> {}", step);
        session.choose(&ChoiceId::new(step))?;
    }
    read_scene(&session).await;

    if let SessionPhase::Ended { scene } = session.phase() {
        println!("Reached ending '{}'.", scene);
    }
    println!(
        "Visited {} scenes, progress {:.0}%",
        session.visited().len(),
        session.progress_fraction() * 100.0
    );

    session.restart()?;
    println!("Restarted at '{}'.", session.current_scene_id().map_or("?", |s| s.as_str()));
    session.exit_run();

    Ok(())
}

async fn read_scene(session: &NarrativeSession) {
    if let Some(scene) = session.current_scene() {
        let cues = session.audio_cues();
        println!(
            "\n== {} ==  [music: {}] [ambient: {}]",
            scene.title,
            cues.background_music.unwrap_or("-"),
            cues.ambient_sound.unwrap_or("-")
        );
    }

    let mut rx = session.subscribe();
    let mut shown = 0;
    while session.is_revealing() {
        if rx.changed().await.is_err() {
            break;
        }
        let frame = rx.borrow_and_update().clone();
        if frame.text().len() - shown >= 40 || frame.is_complete() {
            println!("  ...{}", &frame.text()[shown..]);
            shown = frame.text().len();
        }
    }
}
