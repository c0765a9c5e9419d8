use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pse_proxy::ServeOptions;

#[derive(Parser)]
#[command(name = "pse-proxy", about = "Policy-enforcing, TLS-intercepting forward proxy for build systems")]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Run the proxy (default)
	Serve {
		/// External policy decision endpoint; omit to allow every request
		#[arg(long)]
		policy: Option<String>,
		/// Ecosystem-prefix allowlist YAML
		#[arg(long, default_value = "cfg.yaml")]
		config: PathBuf,
		/// Secret-scanning rule TOML
		#[arg(long, default_value = "leaks.toml")]
		leaks: PathBuf,
		/// Track a single global session instead of keying by remote address
		#[arg(long, default_value_t = false)]
		global_session: bool,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let command = cli.command.unwrap_or(Commands::Serve {
		policy: None,
		config: PathBuf::from("cfg.yaml"),
		leaks: PathBuf::from("leaks.toml"),
		global_session: false,
	});

	match command {
		Commands::Serve { policy, config, leaks, global_session } => {
			let opts = ServeOptions { policy_endpoint: policy, repo_config_path: config, leaks_path: leaks, global_session };
			pse_proxy::run(opts).await
		}
	}
}
