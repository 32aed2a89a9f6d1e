use std::io::{self, BufRead};

use anyhow::Result;
use terminal_demo::{publish_line, App, Command};
use weft_html::{render_to_html, render_to_text};
use weft_runtime_std::{AppRunner, RunnerConfig};

fn main() -> Result<()> {
    #[cfg(feature = "logging")]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!("=== weft terminal demo ===");
    println!("Type `+`, `-` or `reset` to drive the counter; any other line is echoed.");
    println!("Commands: :tree, :trace, :html, :q");
    println!();

    let mut runner = AppRunner::start(RunnerConfig::default(), |scheduler| {
        scheduler.enable_tracing();
        App.el().prop("title", "weft terminal demo").build()
    })?;
    print_screen(&runner);

    for line in io::stdin().lock().lines() {
        let Some(command) = Command::parse(&line?) else {
            continue;
        };
        match command {
            Command::Quit => break,
            Command::Tree => print!("{}", runner.dump_tree().unwrap_or_default()),
            Command::Trace => match runner.last_trace() {
                Some(trace) => print!("{trace}"),
                None => println!("no render trace recorded yet"),
            },
            Command::Html => {
                let html = runner.query(|root| render_to_html(root.node()));
                println!("{}", html.unwrap_or_default());
            }
            Command::Unknown(name) => println!("unknown command `{name}`"),
            Command::Line(line) => {
                let settled = runner.invoke(
                    move |root| {
                        publish_line(root, &line);
                    },
                    true,
                );
                if !settled {
                    log::warn!("app did not settle within {:?}", runner.config().idle_timeout);
                }
                print_screen(&runner);
            }
        }
    }

    runner.shutdown();
    Ok(())
}

fn print_screen(runner: &AppRunner) {
    if let Some(screen) = runner.query(|root| render_to_text(root.node())) {
        println!("{screen}");
    }
}
