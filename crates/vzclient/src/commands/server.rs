//! Server command handlers.

use vzclient_core::{ChannelRepository, ServerInfo};

use crate::cli::{GlobalOpts, ServerArgs, ServerCommand};
use crate::error::CliError;
use crate::output;

fn detail(info: &ServerInfo) -> String {
    let sections = if info.sections.is_empty() {
        "-".into()
    } else {
        info.sections.join(", ")
    };
    [
        format!("URL:          {}", info.url),
        format!(
            "Server:       {}",
            info.server_version.as_deref().unwrap_or("-")
        ),
        format!("API version:  {}", info.api_version.as_deref().unwrap_or("-")),
        format!("Capabilities: {sections}"),
    ]
    .join("\n")
}

pub async fn handle(
    repo: &ChannelRepository,
    args: ServerArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ServerCommand::Info => {
            let info = repo.fetch_server_info().await?;
            let out = output::render_single(&global.output, &info, detail, |i| {
                i.server_version.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
