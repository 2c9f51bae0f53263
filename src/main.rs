use std::{io::IsTerminal, sync::Arc};

use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, error, info};

use lerobot_gui_client::{
    GuiClient,
    endpoints::{Endpoint, STATIC_ENDPOINTS},
    events::{FeedKind, StreamEvent},
};
use lerobot_panel::{
    Error, Result,
    cards::{BuildOutcome, CardBuilder, CardGrid, CardSource},
    config::{Config, check_and_create_config},
    dispatch::{CommandDispatcher, Outcome},
    feed::{FeedView, LiveFeed, LogPanel, RowMatching, StateActionTable},
    form::{ConfigForm, DirectoryIndicator, DirectoryWatch, FormSynchronizer, presets},
    logging::init_logging,
    notify::{Notifier, TerminalNotifier},
    panel::{Panel, open_panel, run_session},
    region::Region,
};

mod cli;

use cli::{Cli, Command, ConfigCommand};

/// Log panel that also echoes every line to stdout.
struct TerminalLog(LogPanel);

impl FeedView for TerminalLog {
    fn render(&mut self, event: &StreamEvent) {
        self.0.render(event);
        if let StreamEvent::Line(line) = event {
            println!("{line}");
        }
    }
}

/// State table that reprints itself after every update.
struct TerminalTable(StateActionTable);

impl FeedView for TerminalTable {
    fn render(&mut self, event: &StreamEvent) {
        self.0.render(event);
        if matches!(event, StreamEvent::Joints(_)) {
            println!("{}", self.0);
        }
    }

    fn render_empty(&mut self) {
        self.0.render_empty();
        println!("{}", self.0);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Init = cli.command {
        let path = check_and_create_config()?;
        println!("{}", path.display());
        return Ok(());
    }

    if cli.command.prompts_for_setup()
        && cli.args.config.is_none()
        && cli.args.backend.is_none()
        && std::io::stdin().is_terminal()
    {
        check_and_create_config()?;
    }

    let config = cli.args.get_config()?;
    init_logging(&config.logging)?;
    debug!(config = ?config, "Parsed config successfully");

    let client = GuiClient::new(config.backend.clone())?;
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier);
    let dispatcher = CommandDispatcher::new(client.clone(), notifier.clone());

    info!(backend = %client.base_url(), "Using backend");

    match cli.command {
        Command::Init => Ok(()),
        Command::Endpoints => {
            for endpoint in STATIC_ENDPOINTS.iter() {
                let descriptor = endpoint.descriptor();
                println!(
                    "{:<30}{:<6}{}",
                    descriptor.name, descriptor.method, descriptor.path
                );
            }
            Ok(())
        }
        Command::Panel { mode } => {
            let panel = Panel::for_mode(mode, &config.panel);
            let snapshot = open_panel(&client, notifier, &panel).await;

            for control in &panel.controls {
                println!("{:<20}{}", control.name, control.endpoint);
            }
            if let Some(form) = &snapshot.form {
                print!("\n{form}");
                if let Some(indicator) = &snapshot.directory {
                    print_directory(form, indicator);
                }
            }
            for (source, grid) in &snapshot.cards {
                print!("\n[{source}]\n{grid}");
            }
            Ok(())
        }
        Command::Mode { mode } => command(&dispatcher, Endpoint::SelectMode(mode)).await,
        Command::Stop => command(&dispatcher, Endpoint::Stop).await,
        Command::Reset => command(&dispatcher, Endpoint::Reset).await,
        Command::Home => command(&dispatcher, Endpoint::HomeRobot).await,
        Command::Record { event } => {
            command(&dispatcher, Endpoint::RecordEvent(event.into())).await
        }
        Command::HgDagger { event } => {
            command(&dispatcher, Endpoint::HgDaggerEvent(event.into())).await
        }
        Command::Calibrate { arm: Some(arm) } => {
            command(&dispatcher, Endpoint::CalibrateArm(arm)).await
        }
        Command::Calibrate { arm: None } => {
            show_cards(&client, CardSource::CalibrationArms).await?;
            show_cards(&client, CardSource::CameraPorts).await
        }
        Command::Cameras => show_cards(&client, CardSource::Cameras).await,
        Command::Videos => show_cards(&client, CardSource::DatasetVideos).await,
        Command::Dataset { episode } => {
            if let Some(episode) = episode {
                command(&dispatcher, Endpoint::ChangeEpisode(episode)).await?;
            }
            let info = client.dataset_info().await?;
            println!("repo:     {}", info.repo_id);
            println!("episodes: {}", info.num_episodes);
            println!("samples:  {}", info.num_samples);
            println!("fps:      {}", info.fps);
            Ok(())
        }
        Command::Config { command } => edit_config(&client, notifier, &config, command).await,
        Command::CheckDir {
            path,
            mode,
            warn_when,
        } => {
            let indicator = Region::new(DirectoryIndicator::default());
            let watch = DirectoryWatch::new(
                client,
                cli::check_dir_polarity(mode, warn_when)?,
                config.panel.directory_check_debounce,
                &indicator,
            );
            watch
                .input(&path)
                .await
                .map_err(|e| Error::General(format!("Directory check task failed: {e}")))?;

            let indicator = indicator.snapshot();
            match indicator.checked {
                None => Err(Error::General(format!("Could not check {path}"))),
                Some(_) if indicator.visible => {
                    println!("{path}: {}", watch.warn_when().message());
                    Ok(())
                }
                Some(_) => {
                    println!("{path}: ok");
                    Ok(())
                }
            }
        }
        Command::Key { key } => {
            let key = lerobot_panel::panel::key_for(&key);
            outcome_to_result(key, dispatcher.send_key(key).await)
        }
        Command::Logs => {
            let region = Region::new(TerminalLog(LogPanel::new(config.panel.log_limit())));
            follow(LiveFeed::new(client, FeedKind::Logs, &region)).await;
            Ok(())
        }
        Command::State { matching, dataset } => {
            let (kind, default_matching) = if dataset {
                (FeedKind::DatasetStateAction, RowMatching::Rebuild)
            } else {
                (FeedKind::StateAction, config.panel.row_matching)
            };
            let table = StateActionTable::new(matching.unwrap_or(default_matching));
            let region = Region::new(TerminalTable(table));
            follow(LiveFeed::new(client, kind, &region)).await;
            Ok(())
        }
        Command::Session { mode } => {
            let region = Region::new(TerminalLog(LogPanel::new(config.panel.log_limit())));
            let input = BufReader::new(tokio::io::stdin());
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(err = ?err, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };

            let summary = run_session(client, notifier, mode, &region, input, shutdown).await;
            info!(
                keys_sent = summary.keys_sent,
                feed_closed = ?summary.feed_closed,
                "Session summary"
            );
            outcome_to_result("stop", summary.stopped)
        }
    }
}

async fn command(dispatcher: &CommandDispatcher, endpoint: Endpoint) -> Result<()> {
    let outcome = dispatcher.dispatch(&endpoint).await;
    outcome_to_result(&endpoint.to_string(), outcome)
}

fn outcome_to_result(what: &str, outcome: Outcome) -> Result<()> {
    println!("{what}: {outcome}");
    match outcome {
        Outcome::Completed { .. } => Ok(()),
        other => Err(Error::General(format!("{what}: {other}"))),
    }
}

fn print_directory(form: &ConfigForm, indicator: &DirectoryIndicator) {
    let Some(check) = &form.schema().directory_check else {
        return;
    };
    match &indicator.checked {
        None => println!("{}: not checked", check.field),
        Some(path) if indicator.visible => {
            println!("{}: {path}: {}", check.field, check.warn_when.message())
        }
        Some(path) => println!("{}: {path}: ok", check.field),
    }
}

async fn show_cards(client: &GuiClient, source: CardSource) -> Result<()> {
    let grid = Region::new(CardGrid::default());
    let builder = CardBuilder::new(client.clone(), &grid);

    match builder.build(&source).await {
        BuildOutcome::Failed(err) => Err(Error::General(format!("{source}: {err}"))),
        _ => {
            print!("{}", grid.snapshot());
            Ok(())
        }
    }
}

async fn follow<V: FeedView>(mut feed: LiveFeed<V>) {
    feed.start();
    tokio::select! {
        reason = feed.closed() => info!(feed = %feed.kind(), ?reason, "Feed ended"),
        _ = tokio::signal::ctrl_c() => feed.stop(),
    }
}

async fn edit_config(
    client: &GuiClient,
    notifier: Arc<dyn Notifier>,
    config: &Config,
    command: ConfigCommand,
) -> Result<()> {
    let mode = match &command {
        ConfigCommand::Show { mode } | ConfigCommand::Set { mode, .. } => *mode,
    };
    let schema = presets::schema_with_overrides(mode, &config.panel.form_actions)
        .ok_or_else(|| Error::Form(format!("{mode} has no config form")))?;

    let synchronizer = FormSynchronizer::new(client.clone(), notifier);
    let mut form = ConfigForm::new(schema);
    synchronizer.try_load(&mut form).await?;

    let indicator = Region::new(DirectoryIndicator::default());
    let watch = synchronizer.directory_watch(
        form.schema(),
        config.panel.directory_check_debounce,
        &indicator,
    );

    match command {
        ConfigCommand::Show { .. } => {
            synchronizer.load_options(&mut form).await;
            if let Some(watch) = &watch {
                synchronizer.check_directory(&form, watch).await;
            }
            print!("{form}");
            if watch.is_some() {
                print_directory(&form, &indicator.snapshot());
            }
            for (spec, _) in form.fields() {
                if let Some(options) = form.options(&spec.name) {
                    println!("{} options: {}", spec.name, options.join(", "));
                }
            }
            Ok(())
        }
        ConfigCommand::Set { assignments, .. } => {
            for assignment in &assignments {
                let (name, value) = assignment.split_once('=').ok_or_else(|| {
                    Error::Form(format!("Expected field=value, got {assignment}"))
                })?;
                if let Some(check) = form.edit(name.trim(), value, watch.as_ref())? {
                    check
                        .await
                        .map_err(|e| Error::General(format!("Directory check task failed: {e}")))?;
                    print_directory(&form, &indicator.snapshot());
                }
            }
            let outcome = synchronizer.submit(&form).await;
            outcome_to_result(&form.schema().action, outcome)
        }
    }
}
