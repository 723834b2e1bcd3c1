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

mod args;
mod render;

use std::path::Path;

use clap::Parser;
use cns_bytecode::StringPool;
use cns_compiler::{CompilationContext, CompileSession, SourceFile};
use eyre::{WrapErr, eyre};
use tracing::{debug, error, info};
use tracing_subscriber::fmt::format::FmtSpan;

use crate::args::Args;
use crate::render::render;

fn read_source(path: &Path) -> Result<SourceFile, eyre::Report> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Unable to read {}", path.display()))?;
    Ok(SourceFile::from_path(path, text))
}

fn main() -> Result<(), eyre::Report> {
    color_eyre::install()?;
    let args: Args = Args::parse();

    let main_subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_span_events(FmtSpan::NONE)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(main_subscriber).unwrap_or_else(|e| {
        eprintln!("Unable to set configure logging: {e}");
        std::process::exit(1);
    });

    let config = args.load_config()?;
    debug!(?config, "loaded configuration");

    let sources = args
        .files
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut strings = StringPool::new();
    let ctx = CompilationContext::new(&config.actor, &config.constants, &mut strings);
    let mut session = CompileSession::new(config.options(), ctx);
    if let Err(e) = session.compile_files(&sources) {
        error!(file = %e.file, line = e.line, "compilation failed");
        return Err(eyre!("{e}"));
    }
    let warnings = session.warnings().to_vec();
    let character = session.finish();
    info!(
        states = character.states.len(),
        functions = character.functions.len(),
        warnings = warnings.len(),
        "compiled {}",
        config.actor
    );

    print!("{}", render(args.format, &character, &strings, &warnings)?);
    Ok(())
}
