use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "komainu-server", about = "Komainu community bot backend")]
pub struct Args {
    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(short, long, default_value = "komainu.toml")]
    pub config: String,

    /// Log as JSON lines instead of human-readable text.
    #[arg(long)]
    pub json_logs: bool,

    /// Print the slash-command definitions as JSON and exit.
    #[arg(long)]
    pub print_commands: bool,
}
