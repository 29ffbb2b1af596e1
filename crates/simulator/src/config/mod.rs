mod cli;
mod generate;
mod run;

pub use cli::Cli;
pub use cli::Commands;
pub use generate::GenerateArgs;
pub use run::OutputFormat;
pub use run::RunArgs;
