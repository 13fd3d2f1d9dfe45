//! rollcall node - organizer and participant roles over a shared session store.

mod cli;
mod command;
mod config;
mod logger;
mod service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    command::run().await
}
