use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default caller identity: an ordinary app.
pub const DEFAULT_PACKAGE: &str = "com.example.notes";

#[derive(Parser, Debug)]
#[command(name = "capturectl")]
#[command(about = "Drive a content capture manager against an in-process capture service")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Manager configuration file (JSON)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Package the client acts as
	#[arg(short, long, global = true, default_value = DEFAULT_PACKAGE)]
	pub package: String,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run a start/flush/stop cycle and print the manager dump
	Simulate {
		/// Disable capture for the app before starting
		#[arg(long)]
		disable: bool,
		/// Stop the activity at the end of the cycle
		#[arg(long)]
		stop: bool,
		/// Activity class to report as started
		#[arg(long, default_value = ".MainActivity")]
		activity: String,
	},

	/// Read or toggle the per-user capture feature (service owner only)
	Feature {
		#[command(subcommand)]
		action: FeatureAction,
	},

	/// Print the component of the capture service
	Service,
}

#[derive(Subcommand, Debug)]
pub enum FeatureAction {
	/// Print whether the feature is enabled
	Get,
	/// Enable or disable the feature
	Set {
		#[arg(action = clap::ArgAction::Set)]
		enabled: bool,
	},
}
