// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct HcfArgs {
    /// The folder containing the config.
    #[arg(short, long)]
    pub config: Option<Utf8PathBuf>,
    /// Overrides the log level from the config.
    #[arg(long)]
    pub override_log_level: Option<log::LevelFilter>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Writes an example config.
    ExampleConfig {
        #[arg(short, long, default_value = "hcf_example.json")]
        output: Utf8PathBuf,
    },
    /// Writes the urls in a file, one per line, to the producer frontier.
    Push {
        urls: Utf8PathBuf,
    },
    /// Reads requests from the consumer slot and prints them as json lines.
    ///
    /// Whole batches are read and deleted, so every request of the last batch is printed.
    Pull {
        /// The number of requests, falls back to max_next_requests.
        #[arg(short, long)]
        n: Option<usize>,
    },
    /// Deletes a slot of the consumer frontier.
    DeleteSlot {
        slot: String,
    },
}

#[cfg(test)]
mod test {
    use crate::app::args::{Command, HcfArgs};
    use clap::Parser;

    #[test]
    fn parses_the_commands() {
        let args = HcfArgs::try_parse_from(["hcf", "--config", "cfg", "pull", "-n", "5"]).unwrap();
        assert_eq!(Some("cfg"), args.config.as_deref().map(|path| path.as_str()));
        assert_eq!(Command::Pull { n: Some(5) }, args.command);

        let args = HcfArgs::try_parse_from(["hcf", "delete-slot", "s3"]).unwrap();
        assert_eq!(
            Command::DeleteSlot {
                slot: "s3".to_string()
            },
            args.command
        );

        let args = HcfArgs::try_parse_from(["hcf", "--override-log-level", "debug", "push", "urls.txt"]).unwrap();
        assert_eq!(Some(log::LevelFilter::Debug), args.override_log_level);
        assert!(HcfArgs::try_parse_from(["hcf"]).is_err());
    }
}
