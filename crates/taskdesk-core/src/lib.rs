pub mod accessors;
pub mod board;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod render;
pub mod session;
pub mod sort;
pub mod view_state;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::{
  CommandFactory,
  Parser
};
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdesk CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let Some(command) = cli.command
  else {
    cli::GlobalCli::command()
      .print_help()?;
    return Ok(());
  };

  let mut cfg = config::Config::load(
    cli.taskdeskrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let sessions =
    session::SessionStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open session store \
         at {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let client =
    client::ApiClient::from_config(&cfg)
      .context(
        "failed to configure API client"
      )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let stdin = io::stdin();
  let mut input = stdin.lock();
  runtime.block_on(commands::dispatch(
    &client,
    &sessions,
    &cfg,
    &renderer,
    command,
    &mut input
  ))?;

  info!("done");
  Ok(())
}
