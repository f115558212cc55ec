// BSD 2-Clause License
//
// Copyright (c) 2019, 2020 Alasdair Armstrong
// Copyright (c) 2020 Brian Campbell
//
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
// 1. Redistributions of source code must retain the above copyright
// notice, this list of conditions and the following disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright
// notice, this list of conditions and the following disclaimer in the
// documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use getopts::{Matches, Options};
use std::process::exit;

use kestrel_lib::config::{CheckConfig, ConfigFile};
use kestrel_lib::log;

fn tool_name() -> Option<String> {
    match std::env::current_exe() {
        Ok(path) => Some(path.components().last()?.as_os_str().to_str()?.to_string()),
        Err(_) => None,
    }
}

pub fn print_usage(opts: &Options, code: i32) -> ! {
    let tool = match tool_name() {
        Some(name) => name,
        None => "kestrel".to_string(),
    };
    let brief = format!("Usage: {} [options] <goto-binary>", tool);
    eprint!("{}", opts.usage(&brief));
    exit(code)
}

pub fn common_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("", "unwind", "unwind loops and recursion up to this bound", "<k>");
    opts.optmulti("", "unwindset", "per-instruction unwind bounds", "<id>:<k>,...");
    opts.optflag("", "no-unwinding-assertions", "do not assert that unwind bounds suffice");
    opts.optopt("", "depth", "bound the number of instructions per thread", "<n>");
    opts.optflag("", "16", "16-bit target integers");
    opts.optflag("", "32", "32-bit target integers");
    opts.optflag("", "64", "64-bit target integers");
    opts.optflag("", "floatbv", "encode floating point down to bit-vectors (default)");
    opts.optopt("", "smt-solver", "solver command spoken to over stdin", "<command>");
    opts.optopt("", "context-bound", "bound on thread context switches", "<n>");
    opts.optopt("", "clib", "prelinked C library blob for the chosen width", "<file>");
    opts.optopt("C", "config", "load defaults from a toml file", "<file>");
    opts.optflag("h", "help", "print this help message");
    opts.optflag("", "verbose", "print verbose output");
    opts.optopt("D", "debug", "set debugging flags", "<flags>");
    opts
}

pub fn parse_config(matches: &Matches, opts: &Options) -> CheckConfig {
    let mut cfg = CheckConfig::default();

    if let Some(file) = matches.opt_str("config") {
        let contents = match std::fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) => {
                eprintln!("Failed to read {}: {}", file, e);
                exit(2)
            }
        };
        let parsed = match ConfigFile::parse(&contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("Bad config file: {}", e);
                exit(2)
            }
        };
        if let Err(e) = parsed.apply(&mut cfg) {
            eprintln!("Bad config file: {}", e);
            exit(2)
        }
    }

    if matches.opt_present("16") {
        cfg.set_int_width(16)
    }
    if matches.opt_present("32") {
        cfg.set_int_width(32)
    }
    if matches.opt_present("64") {
        cfg.set_int_width(64)
    }
    cfg.floatbv = true;

    if let Some(k) = matches.opt_str("unwind") {
        match k.parse::<u32>() {
            Ok(k) => cfg.unwind = Some(k),
            Err(_) => print_usage(opts, 2),
        }
    }
    for arg in matches.opt_strs("unwindset") {
        if let Err(e) = cfg.parse_unwindset(&arg) {
            eprintln!("{}", e);
            print_usage(opts, 2)
        }
    }
    if matches.opt_present("no-unwinding-assertions") {
        cfg.unwinding_assertions = false
    }
    if let Some(n) = matches.opt_str("depth") {
        match n.parse::<usize>() {
            Ok(n) => cfg.max_depth = Some(n),
            Err(_) => print_usage(opts, 2),
        }
    }
    if let Some(n) = matches.opt_str("context-bound") {
        match n.parse::<u32>() {
            Ok(n) => cfg.context_bound = n,
            Err(_) => print_usage(opts, 2),
        }
    }
    if let Some(solver) = matches.opt_str("smt-solver") {
        cfg.solver = solver
    }

    if matches.opt_present("verbose") {
        log::set_flags(log::VERBOSE)
    }
    if let Some(flags) = matches.opt_str("debug") {
        let mut mask = 0u32;
        for c in flags.chars() {
            mask |= match c {
                'v' => log::VERBOSE,
                's' => log::SYMEX,
                'u' => log::UNWIND,
                'p' => log::PHI,
                'q' => log::SOLVER,
                'c' => log::SCHEDULE,
                _ => {
                    eprintln!("Unknown debug flag: {}", c);
                    exit(2)
                }
            }
        }
        log::set_flags(mask)
    }

    cfg
}
