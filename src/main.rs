use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use stratenv::{
    backtest::BacktestScope,
    commands::{auth, backtest, environments, results, simulations, stocks, strategies},
    config::ClientSettings,
    context::AppContext,
};

#[derive(Parser)]
#[command(name = "stratenv")]
#[command(about = "Configure trading environments and run backtests on a remote server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access token in the session file
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in
    Signup {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user and token expiry
    Whoami,
    /// Manage environments
    #[command(subcommand)]
    Env(EnvCommand),
    /// Manage strategies attached to an environment
    #[command(subcommand)]
    Strategy(StrategyCommand),
    /// Manage simulations inside an environment
    #[command(subcommand)]
    Simulation(SimulationCommand),
    /// Ask the server to backtest an environment or one of its simulations
    Backtest {
        environment: String,
        #[arg(long)]
        simulation: Option<String>,
    },
    /// Fetch returns, portfolio and trades and summarize them
    Results {
        environment: String,
        #[arg(long)]
        simulation: Option<String>,
        /// Print the raw series and summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse the built-in stock catalog
    Stocks {
        /// Matches ticker or company name
        query: Option<String>,
        #[arg(long)]
        sector: Option<String>,
    },
}

#[derive(Subcommand)]
enum EnvCommand {
    List,
    Show {
        name: String,
    },
    Create {
        name: String,
        /// Comma separated tickers (1 to 10)
        #[arg(long, value_delimiter = ',', required = true)]
        stocks: Vec<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        start: String,
        /// YYYY-MM-DD
        #[arg(long)]
        end: String,
    },
    /// Replace an environment; omitted fields keep their current values
    Update {
        name: String,
        #[arg(long = "rename")]
        new_name: Option<String>,
        #[arg(long, value_delimiter = ',')]
        stocks: Option<Vec<String>>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    Delete {
        name: String,
    },
}

#[derive(clap::Args)]
struct StrategyDefinition {
    /// e.g. RSIStrategy, SMAStrategy, PercentageSMAStrategy
    #[arg(long = "type")]
    strategy_type: String,
    /// Strategy parameter as key=value, repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,
    #[arg(long)]
    stop_loss: Option<f64>,
    #[arg(long)]
    take_profit: Option<f64>,
}

impl StrategyDefinition {
    fn args<'a>(&'a self, name: &'a str) -> strategies::StrategyArgs<'a> {
        strategies::StrategyArgs {
            name,
            strategy_type: &self.strategy_type,
            params: &self.params,
            stop_loss_pct: self.stop_loss,
            take_profit_pct: self.take_profit,
        }
    }
}

#[derive(Subcommand)]
enum StrategyCommand {
    Add {
        environment: String,
        name: String,
        #[command(flatten)]
        definition: StrategyDefinition,
    },
    /// Swap a strategy for a new definition in one request
    Replace {
        environment: String,
        name: String,
        /// New strategy name (defaults to the current one)
        #[arg(long = "rename")]
        new_name: Option<String>,
        #[command(flatten)]
        definition: StrategyDefinition,
    },
    Delete {
        environment: String,
        name: String,
    },
}

#[derive(Subcommand)]
enum SimulationCommand {
    Create {
        environment: String,
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Environment strategy to include, repeatable
        #[arg(long = "strategy")]
        strategies: Vec<String>,
    },
    Show {
        environment: String,
        name: String,
    },
    Delete {
        environment: String,
        name: String,
    },
}

fn scope(environment: String, simulation: Option<String>) -> BacktestScope {
    match simulation {
        Some(simulation) => BacktestScope::simulation(environment, simulation),
        None => BacktestScope::environment(environment),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Cli { command } = cli;

    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err.into());
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = ClientSettings::from_env()?;
    let app_context = AppContext::initialize(settings)?;
    debug!("Session file: {}", app_context.session_path().display());

    match command {
        Commands::Login { username, password } => {
            auth::login(&app_context, &username, password).await?;
        }
        Commands::Signup { username, password } => {
            auth::signup(&app_context, &username, password).await?;
        }
        Commands::Logout => {
            auth::logout(&app_context).await?;
        }
        Commands::Whoami => {
            auth::whoami(&app_context).await?;
        }
        Commands::Env(command) => match command {
            EnvCommand::List => environments::list(&app_context).await?,
            EnvCommand::Show { name } => environments::show(&app_context, &name).await?,
            EnvCommand::Create {
                name,
                stocks,
                start,
                end,
            } => environments::create(&app_context, &name, &stocks, &start, &end).await?,
            EnvCommand::Update {
                name,
                new_name,
                stocks,
                start,
                end,
            } => {
                environments::update(
                    &app_context,
                    &name,
                    new_name.as_deref(),
                    stocks.as_deref(),
                    start.as_deref(),
                    end.as_deref(),
                )
                .await?
            }
            EnvCommand::Delete { name } => environments::delete(&app_context, &name).await?,
        },
        Commands::Strategy(command) => match command {
            StrategyCommand::Add {
                environment,
                name,
                definition,
            } => strategies::add(&app_context, &environment, definition.args(&name)).await?,
            StrategyCommand::Replace {
                environment,
                name,
                new_name,
                definition,
            } => {
                let new_name = new_name.unwrap_or_else(|| name.clone());
                strategies::replace(
                    &app_context,
                    &environment,
                    &name,
                    definition.args(&new_name),
                )
                .await?
            }
            StrategyCommand::Delete { environment, name } => {
                strategies::delete(&app_context, &environment, &name).await?
            }
        },
        Commands::Simulation(command) => match command {
            SimulationCommand::Create {
                environment,
                name,
                start,
                end,
                strategies,
            } => {
                simulations::create(&app_context, &environment, &name, &start, &end, &strategies)
                    .await?
            }
            SimulationCommand::Show { environment, name } => {
                simulations::show(&app_context, &environment, &name).await?
            }
            SimulationCommand::Delete { environment, name } => {
                simulations::delete(&app_context, &environment, &name).await?
            }
        },
        Commands::Backtest {
            environment,
            simulation,
        } => {
            backtest::run(&app_context, scope(environment, simulation)).await?;
        }
        Commands::Results {
            environment,
            simulation,
            json,
        } => {
            results::run(&app_context, scope(environment, simulation), json).await?;
        }
        Commands::Stocks { query, sector } => {
            stocks::run(query.as_deref(), sector.as_deref()).await?;
        }
    }

    Ok(())
}
