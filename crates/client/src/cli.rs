// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  switchboard watch gh --token <t>         Stream notifications for a topic
  switchboard pending                      Show messages waiting to be sent
  switchboard send gh --token <t> \\
      --code 42 --user 7 --message \"Hi\"    Reply in a betting code's chat";

#[derive(Parser, Debug)]
#[command(name = "switchboard", version)]
#[command(about = "Real-time operator client with offline delivery")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: <config dir>/switchboard/config.toml)
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print notifications until interrupted
    Watch {
        /// Topic identity the connection is opened for (e.g. a country code)
        identity: String,

        /// Session token
        #[arg(long, env = "SWITCHBOARD_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List messages waiting in the offline queue
    Pending {
        /// Print the queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a chat message for a betting code, queuing it if offline
    Send {
        /// Topic identity the connection is opened for
        identity: String,

        /// Session token
        #[arg(long, env = "SWITCHBOARD_TOKEN", hide_env_values = true)]
        token: String,

        /// Betting code the conversation belongs to
        #[arg(long)]
        code: String,

        /// User the message is addressed to
        #[arg(long)]
        user: String,

        /// Message text
        #[arg(long, short)]
        message: String,

        /// Admin id recorded as the author
        #[arg(long, default_value = "1")]
        admin: String,

        /// Seconds to wait for the connection before queuing
        #[arg(long, default_value_t = 5)]
        wait: u64,
    },
}
