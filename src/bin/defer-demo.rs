use clap::Parser;
use defer_frame::sites::{self, Client, ResourceTable};
use defer_frame::{Frame, FrameError, Slot, defer, scope, scope_named};
use env_logger::Builder;
use log::LevelFilter;
use std::time::Duration;

#[derive(clap::Parser)]
struct CliArgs {
    #[clap(short, long, default_value = "warn")]
    log_level: LevelFilter,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Three deferred prints, executed in reverse.
    Order,
    /// Loop-variable snapshots next to a live reference.
    Capture {
        #[clap(short, long, default_value = "3")]
        iterations: u32,
    },
    /// Anonymous vs named result under a deferred increment.
    Results,
    /// Fetch a url and close the body only if the fetch worked.
    Fetch {
        url: String,
        #[clap(long, default_value = "50")]
        latency_ms: u64,
    },
    /// Open a resource repeatedly, one deferred close per open.
    Open {
        #[clap(short, long, default_value = "5")]
        count: usize,
        #[clap(short, long, default_value = "/etc/hosts")]
        path: String,
    },
    /// Panic with releases pending.
    Unwind,
    /// Exit the process from nested frames with actions pending.
    Abrupt {
        #[clap(short, long, default_value = "3")]
        depth: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    Builder::new()
        .filter(Some("defer_frame"), args.log_level)
        .filter(Some("defer_demo"), args.log_level)
        .init();

    match args.command {
        Command::Order => order()?,
        Command::Capture { iterations } => capture(iterations)?,
        Command::Results => {
            println!("{}", anonymous_result()?);
            println!("{}", named_result()?);
        }
        Command::Fetch { url, latency_ms } => {
            let client = Client::new(Duration::from_millis(latency_ms));
            match sites::fetch_status(&client, &url).await {
                Ok(status) => println!("{url}: {status}"),
                Err(err) => println!("{err}"),
            }
        }
        Command::Open { count, path } => {
            let table = ResourceTable::with_paths([path.as_str()]);
            let registered = sites::open_all(&table, &path, count)?;
            println!("registered {registered} close(s), closed {:?}", table.closed());
        }
        Command::Unwind => unwind()?,
        Command::Abrupt { depth } => nest(depth)?,
    }
    Ok(())
}

fn order() -> Result<(), FrameError> {
    scope("order", |frame| {
        defer!(frame, println!("1"))?;
        defer!(frame, println!("2"))?;
        defer!(frame, println!("3"))?;
        Ok(())
    })
}

fn capture(iterations: u32) -> Result<(), FrameError> {
    scope("snapshot", |frame| {
        for i in 0..iterations {
            defer!(frame, [i] println!("captured {i}"))?;
        }
        Ok(())
    })?;

    let live = Slot::new(0);
    scope("live", |frame| {
        for i in 0..iterations {
            let view = live.clone();
            frame.defer(move || println!("live {}", view.get()))?;
            live.set(i + 1);
        }
        Ok(())
    })
}

fn anonymous_result() -> Result<i32, FrameError> {
    scope("anonymous", |frame| {
        let result = Slot::new(0);
        let counter = result.clone();
        frame.defer(move || {
            counter.update(|value| *value += 1);
            println!("defer");
        })?;
        Ok(result.get())
    })
}

fn named_result() -> Result<i32, FrameError> {
    scope_named("named", 0, |frame, result| {
        let result = result.clone();
        frame.defer(move || {
            result.update(|value| *value += 1);
            println!("defer");
        })?;
        Ok(())
    })
}

fn unwind() -> Result<(), FrameError> {
    scope("unwind", |frame| -> anyhow::Result<()> {
        for name in ["first", "second", "third"] {
            frame.defer_with(name, |name| println!("release {name}"))?;
        }
        panic!("unrecoverable failure");
    })
}

fn nest(depth: u32) -> anyhow::Result<()> {
    let mut frame: Frame<()> = Frame::with_label(format!("depth-{depth}"));
    frame.defer(move || println!("deferred at depth {depth}"))?;
    if depth == 0 {
        println!("exiting process");
        frame.exit_abrupt(0);
    }
    nest(depth - 1)?;
    frame.return_anonymous(())?;
    Ok(frame.exit_normal()?)
}
