use clap::Parser;
use lookout::cli::{
    cancel, handle_completions, handle_config_init, jobs, load_config, logs, metrics, watch, Cli,
    Commands, ConfigCommands,
};
use lookout::logging::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Jobs(args) => {
            let config = load_config(&args.config)?;
            init_tracing(&config.logging)?;

            let output = jobs::handle_jobs(&args, &config).await?;
            println!("{}", output);
            Ok(())
        }
        Commands::Watch(args) => {
            let config = load_config(&args.config)?;
            init_tracing(&config.logging)?;

            watch::handle_watch(&args, config).await
        }
        Commands::Logs(args) => {
            let config = load_config(&args.config)?;
            init_tracing(&config.logging)?;

            logs::handle_logs(&args, config).await
        }
        Commands::Metrics(args) => {
            let config = load_config(&args.config)?;
            init_tracing(&config.logging)?;

            metrics::handle_metrics(&args, config).await
        }
        Commands::Cancel(args) => {
            let config = load_config(&args.config)?;
            init_tracing(&config.logging)?;

            let message = cancel::handle_cancel(&args, &config).await?;
            println!("{}", message);
            Ok(())
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    }
}
