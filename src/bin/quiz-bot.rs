//! Headless player: joins a room over HTTP and answers every question on its own.
//!
//! Usage: cargo run --bin quiz-bot -- --room ABC234 --name Robo [--strategy correct] [--start]

use std::{sync::Arc, time::Duration};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_room_back::{
    client::{ClientHandle, ClientOptions, ClientPhase, HttpRoomApi, RoomApi},
    dao::models::QuestionEntity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Pick any choice.
    Random,
    /// Always pick the right answer.
    Correct,
}

/// Join a quiz room and play it automatically
#[derive(Parser, Debug)]
#[command(name = "quiz-bot")]
#[command(about = "Headless quiz room player", long_about = None)]
struct Args {
    /// Base URL of the quiz room server
    #[arg(long, default_value = "http://localhost:8080")]
    server: String,

    /// Room code to join
    #[arg(long)]
    room: String,

    /// Display name (reusing a name resumes that player)
    #[arg(long, default_value = "quiz-bot")]
    name: String,

    /// How answers are chosen
    #[arg(long, value_enum, default_value_t = Strategy::Random)]
    strategy: Strategy,

    /// Upper bound of the random thinking time before answering, in milliseconds
    #[arg(long, default_value_t = 4_000)]
    think_ms: u64,

    /// Start the game once joined (only works when the name is the host's)
    #[arg(long)]
    start: bool,
}

fn pick_choice(strategy: Strategy, question: &QuestionEntity) -> usize {
    match strategy {
        Strategy::Correct => question.correct_index,
        Strategy::Random => rng().random_range(0..question.choices.len().max(1)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let api = HttpRoomApi::new(&args.server).context("building HTTP client")?;
    let joined = api
        .join_room(&args.room, &args.name)
        .await
        .with_context(|| format!("joining room {}", args.room))?;
    info!(
        room = %args.room,
        player_id = %joined.player_id,
        resumed = joined.resumed,
        "joined room"
    );

    let client = ClientHandle::spawn(
        Arc::new(api),
        ClientOptions::new(joined.snapshot.code.clone(), joined.player_id),
    );

    if args.start {
        let ready = client
            .wait_for(|view| view.player_count > 0 || view.error.is_some())
            .await;
        if !ready.is_some_and(|view| view.is_host) {
            bail!("--start requires joining with the host's name");
        }
        client.start_game().await;
    }

    let mut views = client.watch();
    let mut answered: Option<usize> = None;
    loop {
        let view = views.borrow_and_update().clone();
        if let Some(error) = &view.error {
            bail!("{error}");
        }
        if view.phase == ClientPhase::Finished {
            println!("Final standings:");
            for (rank, standing) in view.standings.iter().enumerate() {
                println!("  {}. {} - {}", rank + 1, standing.name, standing.score);
            }
            break;
        }

        if view.phase == ClientPhase::Question
            && !view.has_answered
            && answered != Some(view.question_index)
        {
            if let Some(question) = &view.question {
                let choice = pick_choice(args.strategy, question);
                let think = rng().random_range(0..=args.think_ms);
                answered = Some(view.question_index);
                sleep(Duration::from_millis(think)).await;
                info!(question = view.question_index, choice, think_ms = think, "answering");
                if !client.answer(choice).await {
                    warn!("client task stopped before answering");
                }
            }
        }

        if views.changed().await.is_err() {
            break;
        }
    }

    client.join().await;
    Ok(())
}
