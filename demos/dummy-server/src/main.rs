use std::time::Duration;

use heapscope::prelude::*;

// ---------------------------------------------------------------------------
// Synthetic heap
// ---------------------------------------------------------------------------

const TILES: usize = 32;
const TILE_SIZE: i32 = 32 * 1024;

const START_GC: u8 = 0;
const END_GC: u8 = 1;

const USED: usize = 0;
const OBJECTS: usize = 1;
const ROOTS: usize = 2;

fn semispace() -> Result<Space, HeapscopeError> {
    let mut space = Space::new("Semispace", "dummy", TILES, "Block ", "32K", None, true);
    space.add_stream(
        StreamSpec::new("Used Space", DataType::Int)
            .range(0, TILE_SIZE)
            .presentation(Presentation::Percent)
            .suffix(" bytes")
            .color(Rgb::new(255, 0, 0)),
    )?;
    space.add_stream(
        StreamSpec::new("Objects", DataType::Short)
            .range(0, 1000)
            .presentation(Presentation::MaxVar)
            .suffix(" objects")
            .color(Rgb::new(0, 0, 255)),
    )?;
    space.add_stream(
        StreamSpec::new("Roots", DataType::Byte)
            .range(0, 10)
            .paint_style(PaintStyle::Zero)
            .suffix(" roots")
            .color(Rgb::new(0, 255, 0)),
    )?;
    for tile in 0..TILES {
        space.set_tile_name(tile, format!("Block {tile}"))?;
    }
    Ok(space)
}

/// Fills the space for one of three allocation phases.
fn pulse(space: &mut Space, phase: usize) -> Result<(), HeapscopeError> {
    let end = [8, 20, 28][phase % 3];
    space.reset_data();
    space.start_control();

    let mut used_total = 0;
    let mut objects_total = 0;
    for tile in 0..end {
        let slack = i32::try_from((tile * 37 + phase * 11) % 7).unwrap_or(0) * 1024;
        let used = TILE_SIZE - slack;
        let objects = used / (48 + i32::try_from(tile % 5).unwrap_or(0) * 16);
        set(space, USED, tile, used)?;
        set(space, OBJECTS, tile, objects)?;
        used_total += used;
        objects_total += objects;
    }

    let roots: &[usize] = if phase % 2 == 0 { &[0, 0, 2, 3, 3, 3] } else { &[0, 2, 2] };
    for &tile in roots {
        let current = space
            .stream(ROOTS)
            .and_then(|s| s.data().get(tile))
            .unwrap_or(0);
        set(space, ROOTS, tile, current + 1)?;
    }

    if end < TILES {
        space.set_control_range(Control::UNUSED, end, TILES - end)?;
    }
    space.set_control(Control::SEPARATOR, TILES / 2)?;

    let capacity = TILE_SIZE * i32::try_from(TILES).unwrap_or(i32::MAX);
    summarise(space, USED, vec![used_total, capacity]);
    summarise(space, OBJECTS, vec![objects_total]);
    summarise(space, ROOTS, vec![i32::try_from(roots.len()).unwrap_or(0)]);
    space.set_space_info(format!("Allocated: {used_total} / {capacity} bytes\n{end} blocks in use"));
    Ok(())
}

fn set(space: &mut Space, stream: usize, tile: usize, value: i32) -> Result<(), HeapscopeError> {
    if let Some(stream) = space.stream_mut(stream) {
        stream.set_value(tile, value)?;
    }
    Ok(())
}

fn summarise(space: &mut Space, stream: usize, summary: Vec<i32>) {
    if let Some(stream) = space.stream_mut(stream) {
        stream.set_summary(summary);
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

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

    let config = ServerConfig {
        name: "HEAPSCOPE@DUMMY".to_string(),
        general_info: "Dummy collector\n32 blocks of 32K".to_string(),
        ..ServerConfig::default()
    };
    let mut server = ServerInterpreter::builder()
        .bind(&addr)
        .config(config)
        .events(["Start GC", "End GC"])
        .space(semispace()?)
        .build()
        .await?;
    tracing::info!(addr = %server.local_addr(), "dummy server started");

    let mut phase = 0;
    let mut event = START_GC;
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;

        if server.is_connected().await {
            server.start_compensation_timer();
            pulse(server.space_mut(0)?, phase)?;
            server.stop_compensation_timer();
            phase = (phase + 1) % 3;
        }
        if let Err(e) = server.counting_event_boundary(event).await {
            tracing::warn!(error = %e, "event not delivered");
        }
        if let Err(e) = server.safepoint().await {
            tracing::warn!(error = %e, "safepoint failed");
        }

        event = if event == START_GC { END_GC } else { START_GC };
    }
}
