/// Story Player — terminal front end for reading stories.
///
/// Usage: story_player [--stories <dir>] [--config <path>] [--theme <key>]
///                     [--auto] [--seed <n>]
///
/// Commands while reading:
///   <n>      — take choice number n
///   skip     — show the rest of the scene at once
///   restart  — go back to the start of the story
///   mute     — toggle sound cues
///   back     — return to the theme menu
///   quit     — exit
///
/// With `--auto` the player picks choices at random (seeded) until it
/// reaches an ending.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::Path;
use std::process;
use std::sync::Arc;
use story_engine::core::catalog::StoryCatalog;
use story_engine::core::config::EngineConfig;
use story_engine::core::session::{NarrativeSession, SessionPhase};
use story_engine::schema::theme::ThemeKey;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

struct Options {
    stories_dir: Option<String>,
    config_path: Option<String>,
    theme: Option<String>,
    auto: bool,
    seed: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args();

    let mut builder = StoryCatalog::builder().bundled();
    if let Some(ref dir) = options.stories_dir {
        builder = builder.stories_dir(dir);
    }
    let catalog = match builder.build() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("ERROR: failed to load stories: {}", e);
            process::exit(1);
        }
    };

    let config = match options.config_path {
        Some(ref path) => EngineConfig::load_from_ron(Path::new(path))
            .and_then(EngineConfig::with_env_overrides),
        None => EngineConfig::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let mut session = NarrativeSession::with_config(catalog, config);

    if options.auto {
        let Some(theme) = options.theme.clone().or_else(|| {
            session.catalog().themes().next().map(|t| t.key.to_string())
        }) else {
            eprintln!("ERROR: no themes available");
            process::exit(1);
        };
        auto_play(&mut session, ThemeKey::new(theme), options.seed).await;
        return;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    if let Some(ref theme) = options.theme {
        if let Err(e) = session.select_theme(ThemeKey::new(theme.as_str())) {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }

    let mut show_menu = session.selected_theme().is_none();
    loop {
        if show_menu && theme_menu(&mut session, &mut lines).await.is_none() {
            break;
        }
        if let Err(e) = session.start() {
            println!("ERROR: {}", e);
            break;
        }
        match read_story(&mut session, &mut lines).await {
            Flow::Menu => {
                session.exit_run();
                show_menu = true;
            }
            Flow::Quit => break,
        }
    }
    println!("Goodnight.");
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        stories_dir: None,
        config_path: None,
        theme: None,
        auto: false,
        seed: 42,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--stories" if i + 1 < args.len() => {
                i += 1;
                options.stories_dir = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                options.config_path = Some(args[i].clone());
            }
            "--theme" if i + 1 < args.len() => {
                i += 1;
                options.theme = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                options.seed = args[i].parse().unwrap_or(42);
            }
            "--auto" => options.auto = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }
    options
}

fn print_usage() {
    println!("Usage: story_player [--stories <dir>] [--config <path>] [--theme <key>] [--auto] [--seed <n>]");
}

enum Flow {
    Menu,
    Quit,
}

async fn theme_menu(
    session: &mut NarrativeSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Option<()> {
    let themes: Vec<_> = session.catalog().themes().cloned().collect();
    println!("\nChoose a story:");
    for (i, theme) in themes.iter().enumerate() {
        println!("  {}. {} — {}", i + 1, theme.display_name, theme.description);
    }

    loop {
        prompt("story> ");
        let line = lines.next_line().await.ok()??;
        let line = line.trim();
        if matches!(line, "quit" | "exit" | "q") {
            return None;
        }
        let picked = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| themes.get(n))
            .map(|t| t.key.clone())
            .or_else(|| themes.iter().find(|t| t.key.as_str() == line).map(|t| t.key.clone()));

        match picked {
            Some(key) => match session.select_theme(key) {
                Ok(()) => return Some(()),
                Err(e) => println!("{}", e),
            },
            None => println!("Pick a number from 1 to {}.", themes.len()),
        }
    }
}

async fn read_story(
    session: &mut NarrativeSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Flow {
    loop {
        show_scene_header(session);
        let mut rx = session.subscribe();
        let mut printed = 0usize;

        // Type the scene out while still listening for commands.
        while session.is_revealing() {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let text = rx.borrow_and_update().text().to_string();
                    print_delta(&text, &mut printed);
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) if line.trim() == "quit" => return Flow::Quit,
                        Ok(Some(line)) if line.trim() == "back" => return Flow::Menu,
                        Ok(Some(_)) => {
                            let _ = session.skip_reveal();
                        }
                        _ => return Flow::Quit,
                    }
                }
            }
        }
        print_delta(&session.revealed_text(), &mut printed);
        println!("\n");

        if let SessionPhase::Ended { .. } = session.phase() {
            println!("~ The End ~  (restart, back, quit)");
        } else if let Some(scene) = session.current_scene() {
            for (i, choice) in scene.choices.iter().enumerate() {
                println!("  {}. {}", i + 1, choice.text);
            }
        }
        println!(
            "  progress: {:.0}%",
            session.progress_fraction() * 100.0
        );

        loop {
            prompt("> ");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                _ => return Flow::Quit,
            };
            match line.trim() {
                "quit" | "exit" | "q" => return Flow::Quit,
                "back" => return Flow::Menu,
                "restart" => match session.restart() {
                    Ok(()) => break,
                    Err(e) => println!("{}", e),
                },
                "mute" => {
                    let muted = session.toggle_mute();
                    println!("sound {}", if muted { "off" } else { "on" });
                }
                "skip" => {}
                other => {
                    let choice = other
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|n| session.current_scene()?.choices.get(n))
                        .map(|c| c.id.clone());
                    match choice {
                        Some(id) => match session.choose(&id) {
                            Ok(()) => break,
                            Err(e) => println!("{}", e),
                        },
                        None => println!("Type a choice number, or restart, mute, back, quit."),
                    }
                }
            }
        }
    }
}

fn show_scene_header(session: &NarrativeSession) {
    let Some(scene) = session.current_scene() else {
        return;
    };
    println!("\n== {} ==", scene.title);
    let cues = session.audio_cues();
    if !cues.muted {
        if let Some(music) = cues.background_music {
            println!("   [music: {}]", music);
        }
        if let Some(ambient) = cues.ambient_sound {
            println!("   [ambient: {}]", ambient);
        }
    }
    println!();
}

fn print_delta(text: &str, printed: &mut usize) {
    if text.len() < *printed {
        *printed = 0;
    }
    if let Some(rest) = text.get(*printed..) {
        print!("{}", rest);
        std::io::stdout().flush().ok();
    }
    *printed = text.len();
}

fn prompt(label: &str) {
    print!("{}", label);
    std::io::stdout().flush().ok();
}

async fn auto_play(session: &mut NarrativeSession, theme: ThemeKey, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);

    if let Err(e) = session.select_theme(theme).and_then(|()| session.start()) {
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }

    loop {
        let mut rx = session.subscribe();
        show_scene_header(session);
        let mut printed = 0usize;
        while session.is_revealing() {
            if rx.changed().await.is_err() {
                break;
            }
            let text = rx.borrow_and_update().text().to_string();
            print_delta(&text, &mut printed);
        }
        print_delta(&session.revealed_text(), &mut printed);
        println!("\n");

        let Some(scene) = session.current_scene() else {
            break;
        };
        if scene.choices.is_empty() {
            break;
        }
        let choice = &scene.choices[rng.gen_range(0..scene.choices.len())];
        println!("> {}", choice.text);
        let id = choice.id.clone();
        if let Err(e) = session.choose(&id) {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }

    let path: Vec<&str> = session.visited().iter().map(|s| s.as_str()).collect();
    println!("~ The End ~");
    println!("path: {}", path.join(" -> "));
    println!("progress: {:.0}%", session.progress_fraction() * 100.0);
}
