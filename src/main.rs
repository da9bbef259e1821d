use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

use newsrelay::comms::Tag;
use newsrelay::config::Config;
use newsrelay::env::{Environment, ProcessEnvironment, SOCIAL_PASSWORD};
use newsrelay::logging;
use newsrelay::system::System;

#[derive(Parser, Debug)]
#[command(name = "newsrelay")]
#[command(about = "Search news content and relay it by email or social post")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/newsrelay/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Log at debug level
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Search tags matching a query
  Tags { query: String },

  /// List content for a tag
  Content {
    tag: String,
    #[arg(short, long, default_value = "")]
    query: String,
    #[arg(short, long, default_value_t = 1)]
    page: u32,
    /// Serve from the cache when possible
    #[arg(long)]
    cache: bool,
  },

  /// Check whether a content page is cached
  Cached {
    tag: String,
    #[arg(short, long, default_value = "")]
    query: String,
    #[arg(short, long, default_value_t = 1)]
    page: u32,
  },

  /// Remove every cached content page
  ClearCache,

  /// Email the first page of content for a tag
  Email {
    tag: String,
    recipient: String,
    #[arg(short, long, default_value = "")]
    query: String,
  },

  /// Authenticate and post the first page of content for a tag
  ///
  /// The password is read from NEWSRELAY_SOCIAL_PASSWORD.
  Post {
    tag: String,
    #[arg(short, long)]
    user: String,
    #[arg(short, long, default_value = "")]
    query: String,
  },

  /// Verify that the live content and message keys are set
  CheckEnv,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let log_guard = logging::init(None, args.verbose)?;

  let config = Config::load(args.config.as_deref())?;
  let system = System::from_config(&config, Arc::new(ProcessEnvironment))?;

  // Report failures as they are broadcast
  let observed = system.clone();
  system.register_observer(move || {
    if observed.is_error_state() {
      if let Some(message) = observed.last_error_message() {
        eprintln!("error: {}", message);
      }
    }
  });

  let ok = run(&system, &config, args.command).await;
  system.shutdown();

  if !ok {
    // exit skips destructors, flush the log first
    drop(log_guard);
    std::process::exit(1);
  }
  Ok(())
}

async fn run(system: &System, config: &Config, command: Command) -> bool {
  match command {
    Command::Tags { query } => {
      let tags = system.search_tags(&query).await;
      for tag in &tags {
        println!("{}\t{}", tag.id, tag.title);
      }
      system.last_error_message().is_none()
    }
    Command::Content {
      tag,
      query,
      page,
      cache,
    } => {
      let items = system
        .search_content(&Tag::from_id(tag), &query, page, cache)
        .await;
      if let Some(first) = items.first() {
        println!("Page {} of {}", first.page, first.total_pages);
      }
      for item in &items {
        println!("{}", item);
      }
      system.last_error_message().is_none()
    }
    Command::Cached { tag, query, page } => {
      let cached = system.is_content_cached(&Tag::from_id(tag), &query, page);
      println!("{}", if cached { "cached" } else { "not cached" });
      true
    }
    Command::ClearCache => {
      system.clear_cache();
      system.last_error_message().is_none()
    }
    Command::Email {
      tag,
      recipient,
      query,
    } => {
      let tag = Tag::from_id(tag);
      let items = system.search_content(&tag, &query, 1, true).await;
      system.last_error_message().is_none()
        && system.send_message(&tag, &items, &recipient).await
    }
    Command::Post { tag, user, query } => {
      let Some(password) = ProcessEnvironment.lookup(SOCIAL_PASSWORD) else {
        eprintln!("error: {} is not set", SOCIAL_PASSWORD);
        return false;
      };
      let tag = Tag::from_id(tag);
      let items = system.search_content(&tag, &query, 1, true).await;
      system.last_error_message().is_none()
        && system.authenticate(&user, &password).await
        && system.post_message(&tag, &items).await
    }
    Command::CheckEnv => {
      system.check_environment(config.modes.content.is_live(), config.modes.message.is_live())
    }
  }
}
