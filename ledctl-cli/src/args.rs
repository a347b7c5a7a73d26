use clap::*;

#[derive(Clone, Debug, clap::Subcommand)]
pub(super) enum CliCommand {
    /// Validate the manifests and print the resolved zone-to-channel layout.
    Validate,
    /// Boot the rendering core (FrameManager + AnimationEngine +
    /// ShutdownCoordinator) and run until SIGINT/SIGTERM. The control-surface
    /// flags below are applied once, in the listed order, right after boot.
    Run {
        /// Optional zone to start an animation on immediately.
        #[arg(long)]
        start_zone: Option<String>,
        /// Animation id to start on `--start-zone` (one of the catalog names).
        #[arg(long, value_enum)]
        start_animation: Option<AnimationArg>,
        /// Render tick rate in Hz.
        #[arg(long, default_value_t = 60)]
        rate: u32,
        /// Address the read-only task introspection HTTP surface binds to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        http_addr: String,

        /// Zone to apply `--color` to via `set_zone_color`.
        #[arg(long)]
        color_zone: Option<String>,
        /// Color spec: `raw:R,G,B`, `hue:DEGREES`, or `preset:NAME`.
        #[arg(long)]
        color: Option<String>,
        /// Brightness paired with `--color` (0-255).
        #[arg(long, default_value_t = 255)]
        color_brightness: u8,

        /// Zone to stop the running animation on via `stop_animation`.
        #[arg(long)]
        stop_zone: Option<String>,
        /// Skip the fade-out when stopping `--stop-zone`.
        #[arg(long)]
        stop_skip_fade: bool,

        /// Zone to update a running animation's parameter on.
        #[arg(long)]
        param_zone: Option<String>,
        /// Parameter name: `speed`, `intensity`, `hue`, `length`, or `hue_offset`.
        #[arg(long)]
        param_name: Option<String>,
        /// Parameter value. Parsed as a bool, then an int, then a float,
        /// unless `--param-name hue`, which always parses as an integer
        /// degree value.
        #[arg(long)]
        param_value: Option<String>,

        /// Fade every zone to black through TransitionService at boot.
        #[arg(long)]
        power_off: bool,
        /// Fade every zone back in from black at boot.
        #[arg(long)]
        power_on: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(super) enum AnimationArg {
    Breathe,
    ColorFade,
    ColorCycle,
    Snake,
    ColorSnake,
    Matrix,
}

impl From<AnimationArg> for ledctl_core::AnimationId {
    fn from(value: AnimationArg) -> Self {
        match value {
            AnimationArg::Breathe => ledctl_core::AnimationId::Breathe,
            AnimationArg::ColorFade => ledctl_core::AnimationId::ColorFade,
            AnimationArg::ColorCycle => ledctl_core::AnimationId::ColorCycle,
            AnimationArg::Snake => ledctl_core::AnimationId::Snake,
            AnimationArg::ColorSnake => ledctl_core::AnimationId::ColorSnake,
            AnimationArg::Matrix => ledctl_core::AnimationId::Matrix,
        }
    }
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub(super) struct Cli {
    #[command(subcommand)]
    pub verb: CliCommand,

    /// Path to the hardware manifest (channels, chip, byte order).
    #[arg(long, default_value = "config/hardware.toml")]
    pub hardware: String,

    /// Path to the zone manifest (zone-to-channel mapping, pixel counts).
    #[arg(long, default_value = "config/zones.toml")]
    pub zones: String,

    /// Path to the preset color dictionary.
    #[arg(long, default_value = "config/colors.toml")]
    pub colors: String,
}
