use anyhow::Result;
use std::env;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use merchmail::api::RestClient;
use merchmail::config::Config;
use merchmail::constants::SESSION_FILE_NAME;
use merchmail::navigator::{Anchor, Navigator, StepOutcome};
use merchmail::records::{Record, ReplyDraft};
use merchmail::session::FileSessionStore;

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug,merchmail=debug"));

    // Try to create a log file in the config directory
    let log_file = Config::config_dir()
        .ok()
        .map(|dir| dir.join("merchmail.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        // Log to file
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        // Fallback to stderr if file logging fails
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"merchmail - Support inbox client

Usage: merchmail [command]

Commands:
    (none)      Open the inbox at the saved position
    open <n>    Open the inbox at record n
    setup       Write a starter configuration file
    help        Show this help message

Keys inside the reader:
    n           Next record
    p           Previous record
    t           Show conversation thread
    d           Delete the current record
    r <text>    Reply with <text> and close the record
    q           Quit

Configuration file: ~/.config/merchmail/config.toml
"#
    );
}

fn run_setup() -> Result<()> {
    println!("Merchmail Setup");
    println!("===============\n");

    let config_path = Config::config_path()?;
    if config_path.exists() {
        print!("Configuration already exists. Overwrite? [y/N]: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    print!("Backend base URL (e.g. https://api.example.com/v1): ");
    io::stdout().flush()?;
    let mut base_url = String::new();
    io::stdin().read_line(&mut base_url)?;
    let base_url = base_url.trim().to_string();
    if base_url.is_empty() {
        anyhow::bail!("Base URL must not be empty");
    }

    print!("API token (optional): ");
    io::stdout().flush()?;
    let mut token = String::new();
    io::stdin().read_line(&mut token)?;
    let token = token.trim();

    let config = Config {
        api: merchmail::config::ApiConfig {
            base_url,
            timeout_secs: merchmail::constants::DEFAULT_FETCH_TIMEOUT_SECS,
            auth_token: (!token.is_empty()).then(|| token.to_string()),
        },
        navigator: Default::default(),
        cache: Default::default(),
        retry: Default::default(),
    };

    config.validate()?;
    config.ensure_dirs()?;
    config.save()?;
    println!("Configuration saved to {}", config_path.display());
    println!("\nSetup complete! Run 'merchmail' to start.");
    Ok(())
}

fn render(record: &Record, position: Option<usize>) {
    println!("{}", "-".repeat(72));
    if let Some(position) = position {
        println!("[{}] {}", position, record.subject);
    } else {
        println!("{}", record.subject);
    }
    println!(
        "From: {} <{}>   {}",
        record.display_from(),
        record.from_addr,
        record.display_date("%b %d, %Y at %H:%M")
    );
    println!("{}", "-".repeat(72));
    println!("{}", record.body.display_text());
}

async fn run(start_index: Option<usize>) -> Result<()> {
    let config = Config::load()?;
    config.ensure_dirs()?;

    let source = Arc::new(RestClient::new(&config.api)?);
    let store = Arc::new(FileSessionStore::new(
        Config::data_dir()?.join(SESSION_FILE_NAME),
    ));
    let nav = Navigator::new(source, store, &config);

    let anchor = match start_index {
        Some(index) => nav.initialize(index).await?,
        None => match nav.resume().await? {
            Some(anchor) => anchor,
            None => nav.initialize(0).await?,
        },
    };

    match anchor {
        Anchor::Current(record) => render(&record, nav.position().await),
        Anchor::Exhausted => {
            println!("Inbox is empty.");
            return Ok(());
        }
    }

    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "q" | "quit" => break,
            "n" | "next" => match nav.next().await {
                Ok(StepOutcome::Moved(record)) => render(&record, nav.position().await),
                Ok(StepOutcome::Boundary) => println!("Already at the last record."),
                Err(e) => eprintln!("Error: {}", e),
            },
            "p" | "prev" => match nav.previous().await {
                Ok(StepOutcome::Moved(record)) => render(&record, nav.position().await),
                Ok(StepOutcome::Boundary) => println!("Already at the first record."),
                Err(e) => eprintln!("Error: {}", e),
            },
            "t" | "thread" => match nav.thread().await {
                Ok(thread) => {
                    for message in &thread.messages {
                        let direction = if message.outbound { "->" } else { "<-" };
                        println!("{} {}: {}", direction, message.display_author(), message.body);
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            },
            "d" | "delete" => match nav.delete_current().await {
                Ok(Anchor::Current(record)) => render(&record, nav.position().await),
                Ok(Anchor::Exhausted) => {
                    println!("Inbox is empty.");
                    break;
                }
                Err(e) => eprintln!("Error: {}", e),
            },
            _ if input.starts_with("r ") => {
                let body = input[2..].trim();
                let Some(current) = nav.current().await else {
                    eprintln!("No current record.");
                    continue;
                };
                let draft = ReplyDraft::reply_to(&current, body);
                match nav.reply_and_close(draft).await {
                    Ok(Anchor::Current(record)) => {
                        println!("Reply sent.");
                        render(&record, nav.position().await);
                    }
                    Ok(Anchor::Exhausted) => {
                        println!("Reply sent. Inbox is empty.");
                        break;
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            "" => {}
            _ => println!("Unknown command '{}'. Try n, p, t, d, r <text>, q.", input),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("setup") => run_setup(),
        Some("open") => {
            let index = args
                .get(2)
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| anyhow::anyhow!("Usage: merchmail open <index>"))?;
            setup_logging();
            run(Some(index)).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
        None => {
            setup_logging();
            run(None).await
        }
    }
}
