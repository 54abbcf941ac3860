use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use waqt::prelude::*;
use waqt::{ENGINE_NAME, VERSION as LIB_VERSION};

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", ENGINE_NAME.cyan().bold());
    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-".repeat(64).dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "Distributed under the MIT OR Apache-2.0 license. Use at your own risk.".dimmed()
    );
    println!("{}", "-".repeat(64).dimmed());
}

/// Prints every scheduler event while the shell is open.
fn spawn_event_listener(scheduler: &ReminderScheduler) {
    let mut events = scheduler.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SchedulerEvent::Dispatched { .. } => {}
                other => println!("{}", format!("<-- [EVENT] {:?}", other).dimmed()),
            }
        }
    });
}

fn print_reminders(list: &[Occurrence]) {
    if list.is_empty() {
        println!("  (nothing pending)");
    }
    for o in list {
        println!(
            "  {}  {:<12} {:<32} {}",
            o.trigger_at.format("%Y-%m-%d %H:%M"),
            o.category.to_string().cyan(),
            o.title,
            o.id.to_string().dimmed()
        );
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  status                      - Shows run state, date and counters.");
    println!("  upcoming [N]                - Lists the next N pending reminders (default 10).");
    println!("  prayer <Name=HH:MM,...>     - Supplies today's prayer times.");
    println!("  prayer clear                - Drops the prayer timetable.");
    println!("  enable <category>           - Turns a category on.");
    println!("  disable <category>          - Turns a category off (takes effect at once).");
    println!("  time <category> <HH:MM>     - Sets a category's fixed time.");
    println!("  repeat <category> <M|off>   - Repeats a daily category every M minutes.");
    println!("  lead <M>                    - Sets the prayer reminder lead in minutes.");
    println!("  settings                    - Prints the current settings.");
    println!("  tick                        - Runs one scheduler pass now.");
    println!("  start | stop                - Starts or stops the tick loop.");
    println!("  exit                        - Quits the shell.");
    println!(
        "Categories: {}",
        Category::ALL.map(|c| c.as_str()).join(", ")
    );
}

/// Handles one input line. Returns `false` when the shell should exit.
async fn run_command(scheduler: &ReminderScheduler, args: &[&str]) -> bool {
    let Some(command) = args.first() else {
        return true;
    };
    match *command {
        "status" => {
            let stats = scheduler.stats();
            println!(
                "--> running: {}, generated for: {}",
                scheduler.is_running(),
                scheduler
                    .last_generated_date()
                    .await
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into())
            );
            println!(
                "--> dispatched: {}, failed: {}, full regenerations: {}, prayer updates: {}",
                stats.dispatched,
                stats.failed_dispatches,
                stats.full_regenerations,
                stats.partial_regenerations
            );
        }
        "upcoming" => {
            let n = match args.get(1).map(|s| s.parse::<usize>()) {
                None => 10,
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    println!("Usage: upcoming [N]");
                    return true;
                }
            };
            print_reminders(&scheduler.get_upcoming_reminders(n).await);
        }
        "prayer" => match args.get(1) {
            Some(&"clear") => {
                scheduler.on_prayer_times_updated(None).await;
                println!("--> Prayer times cleared.");
            }
            Some(_) => {
                let today = scheduler
                    .last_generated_date()
                    .await
                    .unwrap_or_else(|| chrono::Local::now().date_naive());
                match PrayerTimes::parse(today, &args[1..].join(" ")) {
                    Ok(times) => {
                        let count = times.times.len();
                        scheduler.on_prayer_times_updated(Some(times)).await;
                        println!("--> Supplied {} prayer times for {}.", count, today);
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            None => println!("Usage: prayer <Name=HH:MM,...> | prayer clear"),
        },
        "enable" | "disable" => match args.get(1).map(|s| s.parse::<Category>()) {
            Some(Ok(category)) => {
                let enabled = *command == "enable";
                scheduler
                    .apply_settings(SettingsPatch::for_category(
                        category,
                        CategoryPatch::enabled(enabled),
                    ))
                    .await;
                println!("--> {} {}.", category, if enabled { "enabled" } else { "disabled" });
            }
            Some(Err(e)) => println!("Error: {}", e),
            None => println!("Usage: {} <category>", command),
        },
        "time" => match (args.get(1).map(|s| s.parse::<Category>()), args.get(2)) {
            (Some(Ok(category)), Some(time)) => match time.parse::<ClockTime>() {
                Ok(time) => {
                    let patch = CategoryPatch {
                        time: Some(time),
                        ..CategoryPatch::default()
                    };
                    scheduler
                        .apply_settings(SettingsPatch::for_category(category, patch))
                        .await;
                    println!("--> {} set to {}.", category, time);
                }
                Err(e) => println!("Error: {}", e),
            },
            (Some(Err(e)), _) => println!("Error: {}", e),
            _ => println!("Usage: time <category> <HH:MM>"),
        },
        "repeat" => match (args.get(1).map(|s| s.parse::<Category>()), args.get(2)) {
            (Some(Ok(category)), Some(&"off")) => {
                let patch = CategoryPatch {
                    repeat: Some(false),
                    ..CategoryPatch::default()
                };
                scheduler
                    .apply_settings(SettingsPatch::for_category(category, patch))
                    .await;
                println!("--> {} no longer repeats.", category);
            }
            (Some(Ok(category)), Some(minutes)) => match minutes.parse::<u32>() {
                Ok(minutes) if minutes > 0 => {
                    let patch = CategoryPatch {
                        repeat: Some(true),
                        repeat_interval_minutes: Some(minutes),
                        ..CategoryPatch::default()
                    };
                    scheduler
                        .apply_settings(SettingsPatch::for_category(category, patch))
                        .await;
                    println!("--> {} repeats every {} minutes.", category, minutes);
                }
                _ => println!("Error: '{}' is not a positive number of minutes.", minutes),
            },
            (Some(Err(e)), _) => println!("Error: {}", e),
            _ => println!("Usage: repeat <category> <MINUTES|off>"),
        },
        "lead" => match args.get(1).map(|s| s.parse::<u32>()) {
            Some(Ok(minutes)) => {
                scheduler
                    .apply_settings(SettingsPatch {
                        prayer_reminder_lead_minutes: Some(minutes),
                        ..SettingsPatch::default()
                    })
                    .await;
                println!("--> Prayer reminders now fire {} minutes early.", minutes);
            }
            _ => println!("Usage: lead <MINUTES>"),
        },
        "settings" => println!("{:#?}", scheduler.settings().await),
        "tick" => {
            scheduler.tick_now().await;
            println!("--> Tick complete.");
        }
        "start" => {
            if scheduler.start().await {
                println!("--> Scheduler started.");
            } else {
                println!("--> Scheduler is already running.");
            }
        }
        "stop" => {
            if scheduler.stop().await {
                println!("--> Scheduler stopped.");
            } else {
                println!("--> Scheduler is not running.");
            }
        }
        "help" => print_help(),
        "exit" => return false,
        _ => println!("Unknown command: '{}'. Type 'help'.", args.join(" ")),
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = SchedulerConfig::load(config_path.as_deref())?;
    let scheduler = ReminderScheduler::new(config);

    spawn_event_listener(&scheduler);
    scheduler
        .set_on_reminder_callback(|reminder| {
            println!(
                "\n<-- {} {} {}\n>> ",
                "[REMINDER]".green().bold(),
                reminder.title.bold(),
                reminder.message
            );
            Ok(())
        })
        .await;

    info!("Starting {} in the background...", ENGINE_NAME);
    scheduler.start().await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(MyHighlighter {}));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                if !run_command(&scheduler, &args).await {
                    break;
                }
            }
            Err(_) => {
                println!("Exiting waqtshell...");
                break;
            }
        }
    }

    scheduler.stop().await;
    Ok(())
}
