use anyhow::{Context, Result};
use clap::Parser;
use lending_service::adapters::console::spawn_line_reader;
use lending_service::adapters::fifo::{open_writer, OwnedFifo};
use lending_service::core::codec::{self, FrameReader, DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_NAME_LEN};
use lending_service::core::reply::{reply_channel_name, DEFAULT_REPLY_PREFIX};
use lending_service::domain::model::{Operation, OperationKind};
use lending_service::utils::logger;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "lending-requester")]
#[command(about = "Sends loan, return and renewal requests to a lending service")]
struct RequesterArgs {
    /// Inbound FIFO of the service
    #[arg(short, long)]
    pipe: PathBuf,

    /// Operations file with `kind,name,isbn` lines; interactive when absent
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for this process's reply FIFO
    #[arg(long, default_value = ".")]
    reply_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_REPLY_PREFIX)]
    reply_prefix: String,

    #[arg(long, help = "Send a quit request to the service when done")]
    quit_on_exit: bool,

    /// How long to wait for each reply
    #[arg(long, default_value = "500")]
    reply_wait_ms: u64,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

struct Session {
    inbound: pipe::Sender,
    replies: FrameReader<pipe::Receiver>,
    requester_id: u32,
    reply_wait: Duration,
    sent_quit: bool,
}

impl Session {
    async fn run(&mut self, mut lines: mpsc::Receiver<String>, interactive: bool) -> Result<()> {
        loop {
            if interactive {
                print!("Operation: ");
                std::io::stdout().flush()?;
            }
            let Some(line) = lines.recv().await else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let op = match codec::decode_submission(line, self.requester_id, DEFAULT_MAX_NAME_LEN) {
                Ok(op) => op,
                Err(e) => {
                    println!("Invalid operation {:?}: {}. Use kind,name,isbn", line, e);
                    continue;
                }
            };

            self.submit(&op).await?;
            if op.kind == OperationKind::Quit {
                break;
            }
        }
        Ok(())
    }

    async fn submit(&mut self, op: &Operation) -> Result<()> {
        let record = codec::encode_request(op);
        tracing::debug!("Sending {}", record);

        let mut frame = record.clone().into_bytes();
        frame.push(b'\0');
        self.inbound
            .write_all(&frame)
            .await
            .context("lending service pipe closed")?;

        if op.kind == OperationKind::Quit {
            self.sent_quit = true;
            println!("Quit sent");
            return Ok(());
        }

        match tokio::time::timeout(self.reply_wait, self.replies.next_frame()).await {
            Ok(Ok(Some(Ok(text)))) => println!("Response: {}", text),
            Ok(Ok(Some(Err(e)))) => println!("Unreadable response for {}: {}", record, e),
            Ok(Ok(None)) | Err(_) => println!("No response for {}", record),
            Ok(Err(e)) => return Err(e).context("reading reply pipe failed"),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = RequesterArgs::parse();
    logger::init_cli_logger(args.verbose);

    let requester_id = std::process::id();
    let inbound = open_writer(&args.pipe)
        .with_context(|| format!("cannot open service pipe {}", args.pipe.display()))?;

    let reply_path = args
        .reply_dir
        .join(reply_channel_name(&args.reply_prefix, requester_id));
    let reply_fifo = OwnedFifo::create(&reply_path)
        .with_context(|| format!("cannot create reply pipe {}", reply_path.display()))?;
    let replies = reply_fifo
        .open_receiver()
        .with_context(|| format!("cannot open reply pipe {}", reply_path.display()))?;

    let (lines, interactive) = match &args.input {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("cannot open operations file {}", path.display()))?;
            (spawn_line_reader(BufReader::new(file), 8), false)
        }
        None => {
            println!("Enter operations as kind,name,isbn (e.g. P,Clean Code,111)");
            println!("Kinds: P (loan), D (return), R (renew), Q (stop the service)");
            (
                spawn_line_reader(BufReader::new(std::io::stdin()), 8),
                true,
            )
        }
    };

    let mut session = Session {
        inbound,
        replies: FrameReader::new(replies, DEFAULT_MAX_FRAME_LEN),
        requester_id,
        reply_wait: Duration::from_millis(args.reply_wait_ms),
        sent_quit: false,
    };

    let outcome = tokio::select! {
        outcome = session.run(lines, interactive) => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!();
            tracing::info!("Interrupted");
            Ok(())
        }
    };

    if outcome.is_ok() && args.quit_on_exit && !session.sent_quit {
        let quit = Operation::new(OperationKind::Quit, "shutdown", 0, requester_id);
        session.submit(&quit).await?;
    }

    drop(reply_fifo);
    outcome
}
