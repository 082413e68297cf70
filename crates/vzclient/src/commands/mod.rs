//! Command dispatch: bridges CLI args -> repository requests -> output formatting.

pub mod channels;
pub mod config_cmd;
pub mod data;
pub mod server;

use futures_util::StreamExt;
use tracing::debug;

use vzclient_core::{ChannelRepository, RequestState, RequestStream};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    repo: &ChannelRepository,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Channels(args) => channels::handle(repo, args, global).await,
        Command::Data(args) => data::handle(repo, args, global).await,
        Command::Server(args) => server::handle(repo, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the server dispatcher".into(),
        )),
    }
}

/// Drive a request stream to its terminal state.
pub(crate) async fn settle<T>(mut stream: RequestStream<T>, what: &str) -> Result<T, CliError> {
    while let Some(state) = stream.next().await {
        match state {
            RequestState::Loading => debug!("loading {what}"),
            RequestState::Success(value) => return Ok(value),
            RequestState::Error(err) => return Err(err.into()),
        }
    }
    Err(CliError::Internal(format!("request for {what} ended without a result")))
}
