use heapscope::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_heap(server: &str, heap: &Heap) {
    println!("connected to {server}");
    if !heap.general_info.is_empty() {
        println!("{}", heap.general_info);
    }
    for space in heap.spaces() {
        println!(
            "space {}: {} ({} tiles of {})",
            space.id(),
            space.full_name(),
            space.tile_count(),
            space.block_info()
        );
        for stream in space.streams() {
            println!("  stream {}: {} [{}]", stream.id(), stream.name(), stream.data_type());
        }
    }
    let events: Vec<_> = heap.events.names().iter().map(String::as_str).collect();
    println!("events: {}", events.join(", "));
}

fn print_event(event: u8, elapsed: i32, compensation: i32, state: &HeapState) {
    let heap = state.heap();
    let name = heap.events.name(usize::from(event)).unwrap_or("?");
    println!("-- {name}: {elapsed}ms (compensation {compensation}ms)");
    for (id, count) in state.event_counts().iter().enumerate() {
        println!("   {}: {count}", heap.events.name(id).unwrap_or("?"));
    }
    for space in heap.spaces() {
        println!("{}", space.full_name());
        println!("{}", space.present_summary("  ", "    "));
        if let Some(info) = space.space_info() {
            println!("  {}", info.replace('\n', "\n  "));
        }
    }
}

fn print_help() {
    println!("commands: p(ause) r(estart) o(ne) q(uit) d <event> (disable) e <event> (enable)");
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn handle_line(controller: &mut ClientController, line: &str) -> Result<(), HeapscopeError> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next().map(str::parse::<usize>)) {
        (Some("p"), _) => controller.pause_request().await,
        (Some("r"), _) => controller.restart().await,
        (Some("o"), _) => controller.play_one().await,
        (Some("q"), _) => controller.shutdown_request().await,
        (Some(cmd @ ("d" | "e")), Some(Ok(event))) => {
            controller
                .event_filters_mut()
                .set_enabled(event, cmd == "e")?;
            controller.send_event_filters().await
        }
        _ => {
            print_help();
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), HeapscopeError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HEAPSCOPE_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1:3000".to_string());
    let config = ClientConfig {
        pause_at_start: std::env::var_os("HEAPSCOPE_PAUSE_AT_START").is_some(),
        ..ClientConfig::default()
    };

    let client = ClientInterpreter::connect(addr.as_str(), config).await?;
    print_heap(client.server_name(), client.heap());
    print_help();

    let (mut controller, receiver, mut notifications) = client.split();
    let receive = tokio::spawn(receiver.run());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Some(Notification::Event { event, elapsed, compensation, state }) => {
                    print_event(event, elapsed, compensation, &state);
                }
                Some(Notification::SpaceReplaced(space)) => {
                    println!("space {} resized to {} tiles", space.name(), space.tile_count());
                }
                Some(Notification::Paused) => println!("-- paused"),
                Some(Notification::Shutdown) => println!("-- server acknowledged shutdown"),
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Err(e) = handle_line(&mut controller, &line).await {
                        tracing::warn!(error = %e, "request failed");
                    }
                }
                Ok(None) => {
                    stdin_open = false;
                    controller.shutdown_request().await?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin closed");
                    stdin_open = false;
                    controller.shutdown_request().await?;
                }
            },
        }
    }

    match receive.await {
        Ok(Ok(exit)) => tracing::info!(?exit, "session ended"),
        Ok(Err(e)) => tracing::error!(error = %e, "session failed"),
        Err(e) => tracing::error!(error = %e, "receive task failed"),
    }
    Ok(())
}
