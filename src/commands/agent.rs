//! Remote half of `buildlog run --remote`
//!
//! Reconstructs the parent's listener and forwards everything over stdout, so
//! nothing else may print to stdout in this process.

use buildlog::{ChannelTransport, SerializedListener, StreamListener};
use eyre::{Context, Result};
use std::io;

use super::run::execute;

pub fn run(listener_json: &str, command: &[String]) -> Result<i32> {
    let serialized = SerializedListener::from_json(listener_json).context("Invalid --listener value")?;
    let transport = ChannelTransport::connect(serialized.token.channel.clone(), io::stdout());
    let listener =
        StreamListener::reconstruct(&serialized, &transport).context("Failed to reconstruct build listener")?;
    log::info!("Agent attached to {}", serialized.token);

    execute(&listener, command)
}
