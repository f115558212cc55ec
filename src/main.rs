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

mod opts;

use std::fs;
use std::process::exit;

use kestrel_lib::clib;
use kestrel_lib::ir::serialize::read_binary;
use kestrel_lib::ir::{Symtab, TypeNamespace};
use kestrel_lib::smt::convert::Lowerer;
use kestrel_lib::smt::solver::{check_formula, ProcessSolver, PropertyVerdict};
use kestrel_lib::smt::TermArena;
use kestrel_lib::symex::Executor;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = opts::common_opts();
    let matches = match opts.parse(&args) {
        Ok(matches) => matches,
        Err(e) => {
            eprintln!("{}", e);
            opts::print_usage(&opts, 2)
        }
    };
    if matches.opt_present("help") {
        opts::print_usage(&opts, 0)
    }
    let file = match matches.free.first() {
        Some(file) => file.clone(),
        None => opts::print_usage(&opts, 2),
    };
    let cfg = opts::parse_config(&matches, &opts);

    let bytes = match fs::read(&file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {}", file, e);
            exit(2)
        }
    };
    let binary = match read_binary(&bytes) {
        Ok(binary) => binary,
        Err(e) => {
            eprintln!("{}", e);
            exit(2)
        }
    };
    let mut symtab = Symtab::from_raw_table(&binary.symbols);
    let mut program = binary.program;

    if let Some(clib_file) = matches.opt_str("clib") {
        let blob = match fs::read(&clib_file) {
            Ok(blob) => blob,
            Err(e) => {
                eprintln!("Failed to read {}: {}", clib_file, e);
                exit(2)
            }
        };
        match clib::link(&mut program, &mut symtab, &blob) {
            Ok(imported) => eprintln!("Linked {} library symbols", imported),
            Err(e) => {
                eprintln!("{}", e);
                exit(2)
            }
        }
    }
    program.assign_ids();

    let ns = TypeNamespace::new(cfg.pointer_width);
    let executor = Executor::new(&program, &symtab, &ns, &cfg);
    let paths = match executor.run() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("{}", e);
            exit(2)
        }
    };

    let solver = match ProcessSolver::new(&cfg.solver) {
        Ok(solver) => Some(solver),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    };

    let mut violated = false;
    let mut unknown = false;
    let mut exhausted = false;
    for path in &paths {
        exhausted |= path.exhausted;
        let mut ctx = TermArena::new();
        let formula = match Lowerer::new(&mut ctx, &path.trace, &symtab, &ns).lower() {
            Ok(formula) => formula,
            Err(e) => {
                eprintln!("{}", e);
                exit(2)
            }
        };
        let outcomes = match check_formula(&ctx, &formula, solver.as_ref()) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                eprintln!("{}", e);
                exit(2)
            }
        };
        for outcome in outcomes {
            let location = outcome.property.loc.location_string(&program.files);
            match outcome.verdict {
                PropertyVerdict::Verified => (),
                PropertyVerdict::Violated => {
                    violated = true;
                    println!("[{}] {}: FAILURE", location, outcome.property.msg);
                    if let Some(model) = outcome.model {
                        if !model.is_empty() {
                            println!("  counterexample: {:?}", model);
                        }
                    }
                }
                PropertyVerdict::Unknown(reason) => {
                    unknown = true;
                    println!("[{}] {}: UNKNOWN ({})", location, outcome.property.msg, reason);
                }
            }
        }
    }

    if violated {
        println!("VERIFICATION FAILED");
        exit(1)
    }
    if exhausted {
        println!("VERIFICATION INCOMPLETE (resource bound)");
        exit(6)
    }
    if unknown {
        println!("VERIFICATION UNKNOWN");
        exit(6)
    }
    println!("VERIFICATION SUCCESSFUL");
    exit(0)
}
