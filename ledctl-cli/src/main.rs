use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::info;

use ledctl_core::channel::{BufferChannel, OutputChannel};
use ledctl_core::config::{self, RuntimeConfig};
use ledctl_core::shutdown::priority;
use ledctl_core::zone::ZoneId;
use ledctl_core::{
    AnimationEngine, Color, FrameManager, ParamId, ParamValue, ShutdownCoordinator, TaskCategory, TaskRegistry,
    TransitionService,
};

use args::{Cli, CliCommand};

mod args;

fn parse_zone_id(name: &str) -> Result<ZoneId> {
    match name {
        "Floor" | "floor" => Ok(ZoneId::Floor),
        "Lamp" | "lamp" => Ok(ZoneId::Lamp),
        "Top" | "top" => Ok(ZoneId::Top),
        "Left" | "left" => Ok(ZoneId::Left),
        "Right" | "right" => Ok(ZoneId::Right),
        "Bottom" | "bottom" => Ok(ZoneId::Bottom),
        "Preview" | "preview" => Ok(ZoneId::Preview),
        other => Err(anyhow!("unknown zone id `{other}`")),
    }
}

/// Parse `raw:R,G,B`, `hue:DEGREES`, or `preset:NAME` into a `Color`.
fn parse_color(spec: &str, config: &RuntimeConfig) -> Result<Color> {
    let (kind, rest) = spec.split_once(':').ok_or_else(|| anyhow!("color spec `{spec}` missing `kind:` prefix"))?;
    match kind {
        "raw" => {
            let parts: Vec<&str> = rest.split(',').collect();
            let [r, g, b] = parts.as_slice() else {
                return Err(anyhow!("raw color `{rest}` needs exactly 3 comma-separated components"));
            };
            Ok(Color::Raw(r.trim().parse()?, g.trim().parse()?, b.trim().parse()?))
        }
        "hue" => Ok(Color::hue(rest.trim().parse()?)),
        "preset" => Ok(config.resolve_preset(rest.trim())?),
        other => Err(anyhow!("unknown color spec kind `{other}`, expected raw/hue/preset")),
    }
}

fn parse_param_id(name: &str) -> Result<ParamId> {
    match name {
        "speed" => Ok(ParamId::Speed),
        "intensity" => Ok(ParamId::Intensity),
        "hue" => Ok(ParamId::Hue),
        "length" => Ok(ParamId::Length),
        "hue_offset" => Ok(ParamId::HueOffset),
        other => Err(anyhow!("unknown parameter name `{other}`")),
    }
}

fn parse_param_value(param: ParamId, raw: &str) -> Result<ParamValue> {
    if param == ParamId::Hue {
        return Ok(ParamValue::Hue(raw.parse()?));
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Ok(ParamValue::Bool(b));
    }
    if let Ok(i) = raw.parse::<i32>() {
        return Ok(ParamValue::Int(i));
    }
    if let Ok(f) = raw.parse::<f32>() {
        return Ok(ParamValue::Float(f));
    }
    Err(anyhow!("could not parse `{raw}` as a bool, int, or float parameter value"))
}

fn build_channels(config: &RuntimeConfig) -> Vec<Box<dyn OutputChannel>> {
    config
        .channel_pixel_counts
        .iter()
        .map(|(id, pixel_count)| {
            let zones = config
                .zones
                .values()
                .filter(|z| z.channel == *id)
                .map(|z| (z.id, z.range))
                .collect();
            let byte_order = config.channel_byte_order.get(id).copied().unwrap_or_default();
            Box::new(BufferChannel::new(*id, *pixel_count, zones).with_byte_order(byte_order)) as Box<dyn OutputChannel>
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = config::load_from_paths(&cli.hardware, &cli.zones, &cli.colors)?;

    match cli.verb {
        CliCommand::Validate => {
            for zone in config.zones.values() {
                println!("{:?}: channel={:?} range={:?}", zone.id, zone.channel, zone.range);
            }
            Ok(())
        }
        CliCommand::Run {
            start_zone,
            start_animation,
            rate,
            http_addr,
            color_zone,
            color,
            color_brightness,
            stop_zone,
            stop_skip_fade,
            param_zone,
            param_name,
            param_value,
            power_off,
            power_on,
        } => {
            run(RunArgs {
                config,
                start_zone,
                start_animation,
                rate,
                http_addr,
                color_zone,
                color,
                color_brightness,
                stop_zone,
                stop_skip_fade,
                param_zone,
                param_name,
                param_value,
                power_off,
                power_on,
            })
            .await
        }
    }
}

struct RunArgs {
    config: RuntimeConfig,
    start_zone: Option<String>,
    start_animation: Option<args::AnimationArg>,
    rate: u32,
    http_addr: String,
    color_zone: Option<String>,
    color: Option<String>,
    color_brightness: u8,
    stop_zone: Option<String>,
    stop_skip_fade: bool,
    param_zone: Option<String>,
    param_name: Option<String>,
    param_value: Option<String>,
    power_off: bool,
    power_on: bool,
}

async fn run(args: RunArgs) -> Result<()> {
    let RunArgs {
        config,
        start_zone,
        start_animation,
        rate,
        http_addr,
        color_zone,
        color,
        color_brightness,
        stop_zone,
        stop_skip_fade,
        param_zone,
        param_name,
        param_value,
        power_off,
        power_on,
    } = args;

    let channels = build_channels(&config);
    let frame_manager = Arc::new(FrameManager::new(channels));
    frame_manager.set_rate(rate as i64).await?;

    let transitions = Arc::new(TransitionService::new(frame_manager.clone()));
    let task_registry = Arc::new(TaskRegistry::new());
    let engine = Arc::new(AnimationEngine::new(
        frame_manager.clone(),
        transitions,
        task_registry.clone(),
        config.zones.clone(),
    ));

    let shutdown = Arc::new(ShutdownCoordinator::new());

    let fm_for_handler = frame_manager.clone();
    shutdown.register(priority::OUTPUT_CHANNEL_CLEAR, "clear-output-channels", move || {
        let fm = fm_for_handler.clone();
        async move {
            fm.clear_all().await;
            info!("output channels cleared");
        }
    }).await;

    let engine_for_handler = engine.clone();
    shutdown.register(priority::ANIMATION_STOP_ALL, "animation-engine-stop-all", move || {
        let engine = engine_for_handler.clone();
        async move { engine.stop_all().await }
    }).await;

    let registry_for_handler = task_registry.clone();
    shutdown.register(priority::REMAINING_TASKS_CANCEL, "cancel-remaining-tasks", move || {
        let registry = registry_for_handler.clone();
        async move {
            let summary = registry.summary().await;
            info!(?summary, "remaining tracked tasks at shutdown");
        }
    }).await;

    let render_cancel = ledctl_core::frame_manager::tokio_util_cancel::CancelSignal::new();
    let fm_for_render = frame_manager.clone();
    let render_cancel_for_task = render_cancel.clone();
    let render_task_id = task_registry
        .register(TaskCategory::Render, "frame manager render loop", None)
        .await;
    tokio::spawn(async move {
        fm_for_render.run(render_cancel_for_task).await;
    });

    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    let http_task_id = task_registry.register(TaskCategory::Api, format!("http introspection on {http_addr}"), None).await;
    let http_router = ledctl_http::router(task_registry.clone());
    let http_handle = tokio::spawn(async move {
        let _ = axum::serve(http_listener, http_router).await;
    });
    let http_abort = http_handle.abort_handle();

    let registry_for_api_handler = task_registry.clone();
    shutdown.register(priority::EXTERNAL_API, "http-introspection-server", move || {
        let abort = http_abort.clone();
        let registry = registry_for_api_handler.clone();
        let task_id = http_task_id;
        async move {
            abort.abort();
            registry.mark_cancelled(task_id).await;
        }
    }).await;

    // Control-surface flags are applied once, in this order, right after
    // boot -- this CLI is a long-lived daemon, not a one-shot client, so
    // there is no separate control channel to reach the engine through once
    // `shutdown.wait_for_signal()` below starts blocking.
    if let (Some(zone_name), Some(animation)) = (start_zone, start_animation) {
        let zone = parse_zone_id(&zone_name)?;
        engine.start(zone, animation.into(), HashMap::new()).await?;
        info!(?zone, "initial animation started");
    }

    if let (Some(zone_name), Some(spec)) = (color_zone, color) {
        let zone = parse_zone_id(&zone_name)?;
        let color = parse_color(&spec, &config)?;
        engine.set_zone_color(zone, color, color_brightness).await?;
        info!(?zone, "zone color set");
    }

    if let Some(zone_name) = stop_zone {
        let zone = parse_zone_id(&zone_name)?;
        engine.stop(zone, stop_skip_fade).await?;
        info!(?zone, "animation stopped");
    }

    if let (Some(zone_name), Some(name), Some(raw_value)) = (param_zone, param_name, param_value) {
        let zone = parse_zone_id(&zone_name)?;
        let param_id = parse_param_id(&name)?;
        let value = parse_param_value(param_id, &raw_value)?;
        engine.update_parameter(zone, param_id, value).await?;
        info!(?zone, param = name, "animation parameter updated");
    }

    if power_off {
        engine.power_off().await;
        info!("power off");
    }
    if power_on {
        engine.power_on().await;
        info!("power on");
    }

    info!("ledctl running, waiting for shutdown signal");
    shutdown.wait_for_signal().await;
    info!("shutdown signal received");

    shutdown.shutdown_all().await;
    render_cancel.cancel();
    task_registry.mark_cancelled(render_task_id).await;

    Ok(())
}
