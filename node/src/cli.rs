use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about = "rollcall - proximity-verified attendance",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Subcommand,

    /// TOML configuration file. Command-line flags take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Shared session document used by every role.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Where this actor believes it is.
#[derive(Debug, Clone, clap::Args)]
pub struct PositionArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    #[arg(long, default_value = "10")]
    pub accuracy: f64,

    /// Report positions jittered uniformly within this radius.
    #[arg(long, default_value = "0")]
    pub jitter_meters: f64,

    #[arg(long, default_value = "0")]
    pub gps_latency_ms: u64,

    #[arg(long, default_value = "42")]
    pub seed: u64,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Start a session and watch the roster until interrupted.
    Organizer(OrganizerCmd),

    /// Poll for a session and mark attendance.
    Participant(ParticipantCmd),

    /// Log the current shared session state.
    Status,

    /// Clear the shared session (organizer logout).
    End,

    /// One organizer and several participants against an in-memory store.
    Demo(DemoCmd),
}

#[derive(Debug, clap::Args)]
pub struct OrganizerCmd {
    #[command(flatten)]
    pub position: PositionArgs,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// End the session after this many seconds instead of waiting for ctrl-c.
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct ParticipantCmd {
    /// Defaults to a random SID-NNNN.
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub position: PositionArgs,

    /// randomized | always | never
    #[arg(long)]
    pub proximity: Option<String>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long)]
    pub max_distance: Option<f64>,

    #[arg(long, default_value = "3")]
    pub max_attempts: u32,
}

#[derive(Debug, clap::Args)]
pub struct DemoCmd {
    #[arg(long, default_value = "40.0", allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, default_value = "-75.0", allow_hyphen_values = true)]
    pub lon: f64,

    #[arg(long, default_value = "5")]
    pub participants: u32,

    /// Participants are scattered uniformly within this radius.
    #[arg(long, default_value = "80")]
    pub spread_meters: f64,

    #[arg(long, default_value = "42")]
    pub seed: u64,
}
