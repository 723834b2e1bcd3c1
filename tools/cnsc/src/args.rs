// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::PathBuf;

use clap::builder::ValueHint;
use clap_derive::{Parser, ValueEnum};
use cns_bytecode::Constants;
use cns_compiler::CompileOptions;
use eyre::eyre;
use figment::Figment;
use figment::providers::{Format as ProviderFormat, Serialized, Yaml};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// State, function and command counts, then any warnings.
    #[default]
    Summary,
    /// The whole compiled character as JSON.
    Json,
    /// Every state and function, one instruction per line.
    Disasm,
}

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(
        value_name = "FILES",
        help = "Source files in load order. `.zss` files use the block syntax; anything else is read as classic sections",
        value_hint = ValueHint::FilePath,
        required = true
    )]
    pub files: Vec<PathBuf>,

    #[arg(
        long = "config",
        value_name = "FILE",
        help = "YAML file with compiler settings and host constants",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[arg(
        long,
        help = "Treat legacy problems in classic files as errors instead of warnings"
    )]
    pub strict: bool,

    #[arg(long, help = "Name reported with each warning")]
    pub actor: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,

    #[arg(long, help = "Enable debug logging")]
    pub debug: bool,
}

/// Settings for one compilation. Command line flags override the config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub strict_classic: bool,
    pub actor: String,
    /// Values `const(name)` resolves to when the name is not a built-in constant.
    pub constants: Constants,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict_classic: false,
            actor: "character".to_string(),
            constants: Constants::new(),
        }
    }
}

impl CompilerConfig {
    pub fn options(&self) -> CompileOptions {
        CompileOptions {
            strict_classic: self.strict_classic,
        }
    }
}

impl Args {
    fn merge_config(&self, config: &mut CompilerConfig) {
        if self.strict {
            config.strict_classic = true;
        }
        if let Some(actor) = &self.actor {
            config.actor = actor.clone();
        }
    }

    /// Load the config file if there is one, then apply the command line on top.
    pub fn load_config(&self) -> Result<CompilerConfig, eyre::Report> {
        let mut config = match &self.config_file {
            Some(config_path) => Figment::new()
                .merge(Serialized::defaults(CompilerConfig::default()))
                .merge(Yaml::file(config_path))
                .extract::<CompilerConfig>()
                .map_err(|e| {
                    eyre!(
                        "Failed to parse configuration from {:?}: {}",
                        config_path,
                        e
                    )
                })?,
            None => CompilerConfig::default(),
        };
        self.merge_config(&mut config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use cns_bytecode::Constant;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from(["cnsc", "--strict", "--actor", "kfm", "kfm.cns"]);
        let config = args.load_config().unwrap();
        assert!(config.strict_classic);
        assert_eq!(config.actor, "kfm");
        assert_eq!(args.format, OutputFormat::Summary);
    }

    #[test]
    fn yaml_config_is_merged() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cnsc.yaml",
                "actor: kfm\nconstants:\n  data.life: 1000\n  size.xscale: 1.5\n",
            )?;
            let args = Args::parse_from(["cnsc", "--config", "cnsc.yaml", "--actor", "kfm2", "a.zss"]);
            let config = args.load_config().unwrap();
            assert!(!config.strict_classic);
            assert_eq!(config.actor, "kfm2");
            assert_eq!(config.constants.get("data.life"), Some(Constant::Int(1000)));
            assert_eq!(config.constants.get("size.xscale"), Some(Constant::Float(1.5)));
            Ok(())
        });
    }
}
