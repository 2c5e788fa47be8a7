use std::path::Path;

use dealer_server::AppState;

use crate::cmd::{load_config, source_for};

pub fn run(root: &Path, port: u16, offline: bool, no_open: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    // Descriptions need a reasoning service; the rest of the dashboard does not.
    let source = match source_for(&config, offline) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::warn!("vehicle descriptions disabled: {e:#}");
            None
        }
    };
    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("Dashboard for '{}' → http://localhost:{actual_port}", config.dealer.name);
        println!("Read-only: start `dealer run --port` to enable manual triggers.");

        let mut state = AppState::with_config(root_buf, &config);
        if let Some(source) = source {
            state = state.with_source(source);
        }
        tokio::select! {
            res = dealer_server::serve_on(state, listener, !no_open) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
