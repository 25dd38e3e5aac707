mod config;

use std::{path::Path, sync::Arc};

use anyhow::Result;
use clap::Parser;
use flow::{FlowController, FlowEvent, ModalManager};
use particles::{ParticleEngine, Viewport};
use prediction::{HttpPredictionClient, ImageUpload};
use shared::domain::ModalId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Parser, Debug)]
struct Args {
    /// Prediction server base URL; overrides ageflow.toml and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Image to select on startup.
    #[arg(long)]
    image: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }

    let provider = Arc::new(HttpPredictionClient::new(settings.server_url.clone()));
    let controller = FlowController::new(
        provider,
        ModalManager::new(),
        ParticleEngine::headless(Viewport {
            width: settings.viewport_width,
            height: settings.viewport_height,
        }),
    );

    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("age-guess flow against {}", settings.server_url);
    println!("type 'help' for commands");

    if let Some(path) = args.image {
        controller.select_image(load_image(&path)).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.trim().splitn(2, ' ');
        let command = parts.next().unwrap_or_default();
        let argument = parts.next().unwrap_or_default().trim();

        match command {
            "" => {}
            "select" => controller.select_image(load_image(argument)).await,
            "predict" => controller.request_prediction().await,
            "yes" => controller.answer_feedback(true).await,
            "no" => controller.answer_feedback(false).await,
            "retry" => controller.choose_retry().await,
            "tell" => controller.choose_tell_age().await,
            "range" => controller.submit_range(argument).await,
            "age" => match argument.parse::<u32>() {
                Ok(age) => controller.submit_actual_age(age).await,
                Err(_) => println!("usage: age <1-100>"),
            },
            "remove" => controller.remove_image().await,
            "reset" => controller.reset().await,
            "dismiss" => {
                for id in ModalId::ALL {
                    if controller.modals().visible(id).await {
                        controller.dismiss_modal(id).await;
                    }
                }
            }
            "session" => println!("{:?}", controller.session().await),
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("unknown command '{other}'; type 'help'"),
        }
    }

    Ok(())
}

fn load_image(path: &str) -> Option<ImageUpload> {
    if path.is_empty() {
        println!("usage: select <path>");
        return None;
    }
    let path = Path::new(path);
    match std::fs::read(path) {
        Ok(bytes) => {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            Some(ImageUpload {
                mime_type: guess_mime(&filename).map(str::to_string),
                filename,
                bytes,
            })
        }
        Err(err) => {
            println!("could not read {}: {err}", path.display());
            None
        }
    }
}

fn guess_mime(filename: &str) -> Option<&'static str> {
    let extension = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn print_event(event: &FlowEvent) {
    match event {
        FlowEvent::StateChanged(state) => println!("-> {state:?}"),
        FlowEvent::PredictionReady {
            predicted_age,
            confidence,
            second_attempt,
        } => {
            let round = if *second_attempt { "second" } else { "first" };
            println!("{round} guess: {predicted_age} ({confidence:.0}% confident). yes / no?");
        }
        FlowEvent::Error(err) => println!("error: {err}"),
        FlowEvent::SessionReset => println!("session reset"),
    }
}

fn print_help() {
    println!("  select <path>   choose an image");
    println!("  predict         request an age estimate");
    println!("  yes | no        answer the current guess");
    println!("  retry           second attempt with a range hint");
    println!("  tell            skip to entering your real age");
    println!("  range <a-b>     submit the range hint, e.g. 25-34");
    println!("  age <n>         submit your actual age");
    println!("  remove          discard the selected image");
    println!("  dismiss         close any open overlay");
    println!("  reset           start over");
    println!("  session         dump the session state");
    println!("  quit            exit");
}
