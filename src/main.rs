// Copyright 2020 by Michael Thies <mail@mhthies.de>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fs::File;

use log::{debug, error, info, warn};

use ttopt::solver::{self, SolverConfig};

fn main() {
    // Setup logging & parse command line arguments
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!(
        "This is the course timetabling optimizer (ttopt), version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = parse_cli_args();

    if args.get_one::<String>("OUTPUT").is_none() && !args.get_flag("print") {
        warn!("No OUTPUT file and no --print option given. Schedule will not be exported anywhere.");
    }

    // Open & read input file
    let inpath: &String = args.get_one("INPUT").unwrap();
    debug!("Opening input file {} ...", inpath);
    let file = File::open(inpath).unwrap_or_else(|e| {
        error!("Could not open input file {}: {}", inpath, e);
        std::process::exit(exitcode::NOINPUT)
    });
    let problem = ttopt::io::simple::read(file).unwrap_or_else(|e| {
        error!("Could not read input file: {}", e);
        std::process::exit(exitcode::DATAERR)
    });

    // In debug build: Check consistency of imported data
    if cfg!(debug_assertions) {
        ttopt::io::assert_data_consistency(&problem);
    }

    info!(
        "Found {} sections, {} timeslots and {} rooms for timetabling.",
        problem.sections.len(),
        problem.timeslots.len(),
        problem.rooms.len()
    );

    let mut config = SolverConfig::default();
    config.use_beam_search = args.get_flag("beam");
    if let Some(passes) = args.get_one::<u32>("improver_passes") {
        config.improver_passes = *passes;
    }

    // Execute the timetabling algorithm
    let solution = solver::solve(&problem, config).unwrap_or_else(|e| {
        error!("Could not solve the timetabling problem: {}", e);
        std::process::exit(exitcode::DATAERR)
    });
    info!("Finished solving. {}", solution.statistics);
    info!(
        "Schedule found with total penalty {}. (Lower is better, 0.0 is perfect.)",
        solution.penalty.total()
    );
    info!("Penalty report:\n{}", solution.penalty);

    if let Some(outpath) = args.get_one::<String>("OUTPUT") {
        debug!("Opening output file {} ...", outpath);
        match File::create(outpath) {
            Err(e) => error!("Could not open output file {}: {}.", outpath, e),
            Ok(file) => {
                match ttopt::io::simple::write(file, &solution.placements, &problem, &solution.penalty)
                {
                    Ok(_) => debug!("Schedule written to {}.", outpath),
                    Err(e) => error!("Could not write schedule to {}: {}.", outpath, e),
                }
            }
        }
    }

    if args.get_flag("print") {
        print!(
            "The schedule is:\n{}",
            ttopt::io::format_schedule(&solution.placements, &problem)
        );
    }
}

/// Helper function to construct and execute parser for command line options
fn parse_cli_args() -> clap::ArgMatches {
    clap::command!()
        .arg(
            clap::Arg::new("beam")
                .short('b')
                .long("beam")
                .help(
                    "Use the priority-queue (beam search) constructor instead of the one-pass \
                     greedy constructor. Slower, but explores several partial schedules.",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("improver_passes")
                .long("improver-passes")
                .help("Number of local-search improvement passes to run after construction.")
                .value_name("PASSES")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            clap::Arg::new("print")
                .short('p')
                .long("print")
                .help("Print the calculated schedule to stdout in a human readable format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("INPUT")
                .help("Sets the input file to use")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("OUTPUT")
                .help("Sets the output file to use")
                .index(2),
        )
        .get_matches()
}
