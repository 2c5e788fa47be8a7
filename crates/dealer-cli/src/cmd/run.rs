use std::path::Path;

use anyhow::Context;
use dealer_agent::{CycleRunner, Scheduler};
use dealer_core::config::RunMode;
use dealer_server::AppState;

use crate::cmd::{load_config, source_for};

pub fn run(
    root: &Path,
    mode: RunMode,
    port: Option<u16>,
    offline: bool,
    no_open: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let layout = config.layout(root);
    if !layout.inventory().exists() {
        anyhow::bail!(
            "no inventory in {}: run `dealer generate` first",
            layout.data_dir.display()
        );
    }
    let source = source_for(&config, offline)?;
    let interval = mode.interval(&config.schedule);
    let runner = CycleRunner::from_config(source.clone(), &config, layout, mode.execution_mode());

    println!(
        "Running in {mode} mode ({}), every {}s. Ctrl-C to stop.",
        mode.execution_mode(),
        interval.as_secs()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let root_buf = root.to_path_buf();
    rt.block_on(async move {
        let (handle, task) = Scheduler::new(runner, interval).spawn();

        let served = async {
            match port {
                Some(port) => {
                    let state = AppState::with_config(root_buf, &config)
                        .with_scheduler(handle.clone())
                        .with_source(source);
                    serve_dashboard(state, port, no_open).await
                }
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            res = served => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        };

        println!("Stopping after the current cycle...");
        handle.stop();
        task.await.context("scheduler task failed")?;
        result
    })
}

async fn serve_dashboard(state: AppState, port: u16, no_open: bool) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    dealer_server::serve_on(state, listener, !no_open).await
}
