// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::Result;
use clap::Parser;
use rbn_sim::Args;
use slog::Drain;
use slog::Logger;
use slog_term::FullFormat;
use slog_term::TermDecorator;

fn main() -> Result<()> {
    let args = Args::parse();

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog::LevelFilter::new(drain, args.log_level).fuse();
    let log = Logger::root(drain, slog::o!("component" => "rbn-sim"));

    let report = rbn_sim::run(&log, &args)?;
    print!("{report}");
    Ok(())
}
