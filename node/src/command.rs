use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rollcall_engine::Participant;
use rollcall_primitives::{Coordinate, ParticipantId, SessionStore};
use rollcall_store::FileStore;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Cli, Subcommand};
use crate::config::NodeConfig;
use crate::logger::init_logger;
use crate::service;

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?.apply_cli(&cli);
    init_logger(&config.log_level, config.log_file.as_deref())?;

    let mut engine = config.engine()?;
    let store = Arc::new(FileStore::new(&config.store));

    match cli.subcommand {
        Subcommand::Organizer(cmd) => {
            if let Some(ms) = cmd.poll_interval_ms {
                engine.organizer_poll_interval = Duration::from_millis(ms);
            }
            log::info!("Organizer using shared store {:?}", store.path());
            let location = service::location_from(&cmd.position)?;
            service::run_organizer(
                location,
                store,
                engine,
                cmd.duration_secs.map(Duration::from_secs),
                ctrl_c(),
            )
            .await?;
        }
        Subcommand::Participant(cmd) => {
            if let Some(ms) = cmd.poll_interval_ms {
                engine.participant_poll_interval = Duration::from_millis(ms);
            }
            if let Some(meters) = cmd.max_distance {
                engine = engine.with_max_distance(meters)?;
            }

            let mut proximity = config.proximity()?;
            if let Some(mode) = &cmd.proximity {
                proximity.mode = mode.parse().map_err(anyhow::Error::msg)?;
            }

            let id = match &cmd.id {
                Some(id) => ParticipantId::new(id.as_str())?,
                None => ParticipantId::random(&mut ChaCha8Rng::from_entropy()),
            };
            log::info!("Participant {} using shared store {:?}", id, store.path());

            let mut participant = Participant::new(
                id,
                service::location_from(&cmd.position)?,
                proximity.build()?,
                store,
                engine,
            );
            service::run_participant(&mut participant, cmd.max_attempts, ctrl_c()).await?;
        }
        Subcommand::Status => {
            let snapshot = store
                .snapshot()
                .await
                .with_context(|| format!("failed to read {:?}", store.path()))?;
            service::log_snapshot(&snapshot);
        }
        Subcommand::End => {
            store.end_session().await?;
            log::info!("Logged out, session data cleared.");
        }
        Subcommand::Demo(cmd) => {
            let anchor = Coordinate::new(cmd.lat, cmd.lon, 0.0)?;
            service::run_demo(
                anchor,
                cmd.participants,
                cmd.spread_meters,
                cmd.seed,
                engine,
                config.proximity()?,
            )
            .await?;
        }
    }

    Ok(())
}
