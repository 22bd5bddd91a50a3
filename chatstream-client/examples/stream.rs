//! Stream a chat completion to stdout.
//!
//! Start a chat server (default `http://127.0.0.1:5000`, override with
//! CHATSTREAM_BASE_URL) and run:
//!   cargo run --example stream -p chatstream-client -- "Say hello in one sentence."
//!
//! Press Ctrl-C to cancel the stream.

use std::io::Write;

use chatstream_client::{Callbacks, CancellationToken, ChatClient, ChatRequest, ErrorClass};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Say hello in one sentence.".into());

    let client = ChatClient::from_env()?;
    let health = client.health().await?;
    if !health.key_present {
        eprintln!("warning: server reports no API key configured");
    }

    let handler = Callbacks::new()
        .with_start(|metadata| {
            if let Some(model) = metadata.get("model").and_then(|m| m.as_str()) {
                eprintln!("[model: {model}]");
            }
        })
        .with_delta(|text| {
            print!("{text}");
            let _ = std::io::stdout().flush();
        })
        .with_error(|message| {
            eprintln!("\nerror: {message}");
            eprintln!("hint: {}", ErrorClass::classify(message).guidance());
        })
        .with_done(|| println!());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = client
        .stream_chat(&ChatRequest::prompt(prompt), handler, cancel)
        .await;
    if outcome.is_cancelled() {
        eprintln!("[cancelled]");
    }

    Ok(())
}
