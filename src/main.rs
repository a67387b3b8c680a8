use clap::Parser;
use lending_service::adapters::console::stdin_commands;
use lending_service::adapters::fifo::{FifoTransport, OwnedFifo};
use lending_service::core::control::render_report;
use lending_service::domain::ports::InventoryRepository;
use lending_service::utils::logger;
use lending_service::{
    CliConfig, InventoryFile, InventoryStore, LendingService, ReplyChannelManager, RuntimeConfig,
    ServiceError,
};
use std::sync::Arc;

fn fail(context: &str, e: &ServiceError) -> ! {
    tracing::error!("❌ {}: {}", context, e);
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(1);
}

fn pipe_error(config: &RuntimeConfig, e: std::io::Error) -> ServiceError {
    ServiceError::ChannelError {
        channel: config.pipe.display().to_string(),
        message: e.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting lending-service");
    tracing::debug!("CLI config: {:?}", cli);

    let config = match RuntimeConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => fail("Configuration validation failed", &e),
    };
    let settings = config.settings.clone();

    let inventory = match InventoryFile::new(
        &config.inventory_file,
        settings.max_titles,
        settings.max_copies,
    )
    .load()
    {
        Ok(inventory) => inventory,
        Err(e) => fail("Inventory load failed", &e),
    };

    let inbound = match OwnedFifo::create(&config.pipe) {
        Ok(fifo) => fifo,
        Err(e) => fail("Inbound pipe creation failed", &pipe_error(&config, e)),
    };
    let receiver = match inbound.open_receiver() {
        Ok(receiver) => receiver,
        Err(e) => {
            drop(inbound);
            fail("Inbound pipe open failed", &pipe_error(&config, e))
        }
    };

    let store = Arc::new(InventoryStore::new(inventory));
    let replies = Arc::new(ReplyChannelManager::new(
        FifoTransport::new(&config.reply_dir),
        settings.reply.clone(),
    ));
    let service = LendingService::new(Arc::clone(&store), replies, settings);

    let signal = service.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Ctrl-C received, shutting down");
            signal.request();
        }
    });

    let repository = config.save.as_ref().map(|save| {
        InventoryFile::new(save, config.settings.max_titles, config.settings.max_copies)
    });

    println!("📖 Listening on {}", config.pipe.display());
    let outcome = service
        .run_and_save(
            receiver,
            stdin_commands(),
            tokio::io::stdout(),
            repository.as_ref().map(|r| r as &dyn InventoryRepository),
        )
        .await;

    // no more requests once the pipe is gone
    drop(inbound);

    print!("Final state\n{}", render_report(&store.snapshot()));

    if let Err(e) = outcome {
        fail("Lending service failed", &e);
    }
    if let Some(repository) = &repository {
        println!("💾 Inventory saved to {}", repository.path().display());
    }

    Ok(())
}
