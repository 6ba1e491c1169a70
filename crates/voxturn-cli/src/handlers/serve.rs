//! Serve command handler.

use anyhow::Result;
use tracing::info;

use crate::commands::ServeArgs;

/// Run the turn server until Ctrl-C.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let server = args.server_config();
    let openai = args.openai_config();

    info!(
        port = server.port,
        audio_base = %server.base_url(),
        audio_ttl_secs = server.audio_ttl.as_secs(),
        "Starting turn server"
    );
    voxturn_axum::start_server(server, openai).await
}
