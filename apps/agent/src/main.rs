//! thermolink agent entry point.

mod app;
mod config;
mod link;

fn main() -> anyhow::Result<()> {
    app::init_tracing();
    app::start(config::Config::load()?)
}
