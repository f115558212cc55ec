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

//! The solver boundary: terms are rendered to SMT-LIB2 (the
//! quantifier-free bit-vector fragment) and shipped to an external
//! solver process over stdin/stdout, one query per proof obligation.
//! Obligations whose negation already folded to a constant never
//! reach the solver.

use num_bigint::BigUint;
#[cfg(test)]
use num_traits::Zero;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::process::{Command, Stdio};

use crate::error::ExecError;
use crate::smt::convert::Formula;
#[cfg(test)]
use crate::smt::Sort;
use crate::smt::{FuncKind, TermArena, TermId, TermKind};
use crate::trace::Property;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SmtResult {
    Sat,
    Unsat,
    Unknown,
}

/// A counterexample valuation as reported by the solver, keyed on the
/// declared symbol names.
#[derive(Clone, Debug, Default)]
pub struct Model {
    values: HashMap<String, String>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse the s-expression list `(get-value ...)` returns. The
    /// format is `((|name| value) ...)`; anything that does not look
    /// like a binding is skipped.
    pub fn parse(output: &str) -> Self {
        let mut values = HashMap::new();
        let mut rest = output;
        while let Some(start) = rest.find("(|") {
            rest = &rest[start + 2..];
            let name_end = match rest.find('|') {
                Some(i) => i,
                None => break,
            };
            let name = &rest[..name_end];
            rest = &rest[name_end + 1..];
            let value_end = match rest.find(')') {
                Some(i) => i,
                None => break,
            };
            values.insert(name.to_string(), rest[..value_end].trim().to_string());
            rest = &rest[value_end + 1..];
        }
        Model { values }
    }
}

fn render_bits(out: &mut String, bits: &BigUint, width: u32) {
    if width % 4 == 0 {
        let hex = format!("{:x}", bits);
        let digits = (width / 4) as usize;
        let _ = write!(out, "#x{}{}", "0".repeat(digits.saturating_sub(hex.len())), hex);
    } else {
        let bin = format!("{:b}", bits);
        let digits = width as usize;
        let _ = write!(out, "#b{}{}", "0".repeat(digits.saturating_sub(bin.len())), bin);
    }
}

fn func_symbol(kind: FuncKind) -> &'static str {
    use FuncKind::*;
    match kind {
        Eq => "=",
        Not => "not",
        And => "and",
        Or => "or",
        Xor => "xor",
        Bvadd => "bvadd",
        Bvsub => "bvsub",
        Bvmul => "bvmul",
        Bvudiv => "bvudiv",
        Bvsdiv => "bvsdiv",
        Bvurem => "bvurem",
        Bvsrem => "bvsrem",
        Bvshl => "bvshl",
        Bvlshr => "bvlshr",
        Bvashr => "bvashr",
        Bvand => "bvand",
        Bvor => "bvor",
        Bvxor => "bvxor",
        Bvnot => "bvnot",
        Bvneg => "bvneg",
        Bvult => "bvult",
        Bvule => "bvule",
        Bvslt => "bvslt",
        Bvsle => "bvsle",
        Concat => "concat",
    }
}

fn collect_reachable(ctx: &TermArena, roots: &[TermId], reachable: &mut Vec<bool>) {
    let mut stack: Vec<TermId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        if reachable[id.index()] {
            continue;
        }
        reachable[id.index()] = true;
        match &ctx.term(id).kind {
            TermKind::Bool(_) | TermKind::Bits(_) | TermKind::Symbol(_) => (),
            TermKind::Extract(_, _, x)
            | TermKind::ZeroExtend(_, x)
            | TermKind::SignExtend(_, x)
            | TermKind::Reinterpret(x) => stack.push(*x),
            TermKind::Ite(c, t, e) => {
                stack.push(*c);
                stack.push(*t);
                stack.push(*e);
            }
            TermKind::App(_, args) => stack.extend(args.iter().copied()),
        }
    }
}

/// A leaf reference or the name of the definition introduced for a
/// composite term.
fn term_ref(ctx: &TermArena, id: TermId) -> String {
    match &ctx.term(id).kind {
        TermKind::Bool(b) => b.to_string(),
        TermKind::Bits(bits) => {
            let mut out = String::new();
            render_bits(&mut out, bits, ctx.term(id).sort.data_width());
            out
        }
        TermKind::Symbol(name) => format!("|{}|", name),
        TermKind::Reinterpret(inner) => term_ref(ctx, *inner),
        _ => format!("?t{}", id.index()),
    }
}

/// Render a complete SMT-LIB2 script checking the satisfiability of
/// `defs ∧ obligation`. Composite terms become `define-fun`s in arena
/// order, which is already topological.
pub fn render_script(
    ctx: &TermArena,
    defs: &[TermId],
    obligation: TermId,
    produce_model: bool,
) -> String {
    let mut roots = defs.to_vec();
    roots.push(obligation);
    let mut reachable = vec![false; ctx.len()];
    collect_reachable(ctx, &roots, &mut reachable);

    let mut script = String::new();
    let _ = writeln!(script, "(set-logic QF_BV)");
    if produce_model {
        let _ = writeln!(script, "(set-option :produce-models true)");
    }

    let mut symbols = Vec::new();
    for index in 0..ctx.len() {
        if !reachable[index] {
            continue;
        }
        let id = TermId::from_index(index);
        let term = ctx.term(id);
        match &term.kind {
            TermKind::Bool(_) | TermKind::Bits(_) => (),
            TermKind::Symbol(name) => {
                let _ = writeln!(script, "(declare-const |{}| {})", name, term.sort);
                symbols.push(name.clone());
            }
            TermKind::Reinterpret(_) => (),
            TermKind::Extract(hi, lo, x) => {
                let _ = writeln!(
                    script,
                    "(define-fun ?t{} () {} ((_ extract {} {}) {}))",
                    index,
                    term.sort,
                    hi,
                    lo,
                    term_ref(ctx, *x)
                );
            }
            TermKind::ZeroExtend(extra, x) => {
                let _ = writeln!(
                    script,
                    "(define-fun ?t{} () {} ((_ zero_extend {}) {}))",
                    index,
                    term.sort,
                    extra,
                    term_ref(ctx, *x)
                );
            }
            TermKind::SignExtend(extra, x) => {
                let _ = writeln!(
                    script,
                    "(define-fun ?t{} () {} ((_ sign_extend {}) {}))",
                    index,
                    term.sort,
                    extra,
                    term_ref(ctx, *x)
                );
            }
            TermKind::Ite(c, t, e) => {
                let _ = writeln!(
                    script,
                    "(define-fun ?t{} () {} (ite {} {} {}))",
                    index,
                    term.sort,
                    term_ref(ctx, *c),
                    term_ref(ctx, *t),
                    term_ref(ctx, *e)
                );
            }
            TermKind::App(kind, args) => {
                let mut body = format!("({}", func_symbol(*kind));
                for arg in args {
                    let _ = write!(body, " {}", term_ref(ctx, *arg));
                }
                body.push(')');
                let _ = writeln!(script, "(define-fun ?t{} () {} {})", index, term.sort, body);
            }
        }
    }

    for def in defs {
        let _ = writeln!(script, "(assert {})", term_ref(ctx, *def));
    }
    let _ = writeln!(script, "(assert {})", term_ref(ctx, obligation));
    let _ = writeln!(script, "(check-sat)");
    if produce_model && !symbols.is_empty() {
        let mut line = String::from("(get-value (");
        for (i, name) in symbols.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            let _ = write!(line, "|{}|", name);
        }
        line.push_str("))");
        let _ = writeln!(script, "{}", line);
    }
    script
}

/// An external SMT solver spoken to over stdin/stdout in SMT-LIB2,
/// e.g. `z3 -in` or `cvc5 --incremental`.
#[derive(Clone, Debug)]
pub struct ProcessSolver {
    program: String,
    args: Vec<String>,
}

impl ProcessSolver {
    pub fn new(command: &str) -> Result<Self, ExecError> {
        let mut parts = command.split_whitespace().map(|s| s.to_string());
        let program = parts
            .next()
            .ok_or_else(|| ExecError::Solver("empty solver command".to_string()))?;
        Ok(ProcessSolver { program, args: parts.collect() })
    }

    fn invoke(&self, script: &str) -> Result<String, ExecError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecError::Solver(format!("failed to start {}: {}", self.program, e)))?;

        child
            .stdin
            .take()
            .ok_or_else(|| ExecError::Solver("no solver stdin".to_string()))?
            .write_all(script.as_bytes())
            .map_err(|e| ExecError::Solver(format!("failed to write query: {}", e)))?;

        let output = child
            .wait_with_output()
            .map_err(|e| ExecError::Solver(format!("solver did not exit: {}", e)))?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn check(
        &self,
        ctx: &TermArena,
        defs: &[TermId],
        obligation: TermId,
    ) -> Result<(SmtResult, Option<Model>), ExecError> {
        let script = render_script(ctx, defs, obligation, true);
        let output = self.invoke(&script)?;
        let mut lines = output.lines();
        let verdict = match lines.next().map(str::trim) {
            Some("sat") => SmtResult::Sat,
            Some("unsat") => SmtResult::Unsat,
            Some("unknown") => SmtResult::Unknown,
            Some(other) => {
                return Err(ExecError::Solver(format!("unexpected solver output: {}", other)))
            }
            None => return Err(ExecError::Solver("empty solver output".to_string())),
        };
        let model = if verdict == SmtResult::Sat {
            let rest: String = lines.collect::<Vec<_>>().join("\n");
            Some(Model::parse(&rest))
        } else {
            None
        };
        Ok((verdict, model))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyVerdict {
    Verified,
    Violated,
    Unknown(String),
}

#[derive(Clone, Debug)]
pub struct PropertyOutcome {
    pub property: Property,
    pub verdict: PropertyVerdict,
    pub model: Option<Model>,
}

/// Discharge every obligation of a lowered formula. Obligations whose
/// negation folded to a constant are decided without the solver; the
/// rest are shipped out, one query each.
pub fn check_formula(
    ctx: &TermArena,
    formula: &Formula,
    solver: Option<&ProcessSolver>,
) -> Result<Vec<PropertyOutcome>, ExecError> {
    // a constant-false definition means the whole path is infeasible
    let infeasible = formula.defs.iter().any(|def| ctx.as_bool(*def) == Some(false));

    let mut outcomes = Vec::new();
    for obligation in &formula.obligations {
        let verdict = if infeasible {
            PropertyVerdict::Verified
        } else {
            match ctx.as_bool(obligation.negated) {
                Some(false) => PropertyVerdict::Verified,
                Some(true) => PropertyVerdict::Violated,
                None => match solver {
                    Some(solver) => {
                        match solver.check(ctx, &formula.defs, obligation.negated)? {
                            (SmtResult::Unsat, _) => PropertyVerdict::Verified,
                            (SmtResult::Sat, model) => {
                                outcomes.push(PropertyOutcome {
                                    property: obligation.property.clone(),
                                    verdict: PropertyVerdict::Violated,
                                    model,
                                });
                                continue;
                            }
                            (SmtResult::Unknown, _) => {
                                PropertyVerdict::Unknown("solver returned unknown".to_string())
                            }
                        }
                    }
                    None => PropertyVerdict::Unknown("no solver configured".to_string()),
                },
            }
        };
        outcomes.push(PropertyOutcome {
            property: obligation.property.clone(),
            verdict,
            model: None,
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::convert::Obligation;
    use crate::smt::SmtCtx;
    use crate::source_loc::SourceLoc;
    use num_bigint::BigInt;

    #[test]
    fn test_render_script_shape() {
        let mut ctx = TermArena::new();
        let x = ctx.mk_smt_symbol("x?0.1.0!1", Sort::BitVec(32));
        let one = ctx.mk_smt_bv(Sort::BitVec(32), BigInt::from(1));
        let sum = ctx.mk_func_app(Sort::BitVec(32), FuncKind::Bvadd, &[x, one]);
        let gt = ctx.mk_func_app(Sort::Bool, FuncKind::Bvslt, &[x, sum]);
        let not = ctx.mk_func_app(Sort::Bool, FuncKind::Not, &[gt]);

        let script = render_script(&ctx, &[], not, false);
        assert!(script.contains("(set-logic QF_BV)"));
        assert!(script.contains("(declare-const |x?0.1.0!1| (_ BitVec 32))"));
        assert!(script.contains("bvadd"));
        assert!(script.contains("(check-sat)"));
        assert!(script.trim_end().ends_with("(check-sat)"));
    }

    #[test]
    fn test_render_constants() {
        let mut out = String::new();
        render_bits(&mut out, &BigUint::from(0xABu32), 8);
        assert_eq!(out, "#xab");
        let mut out = String::new();
        render_bits(&mut out, &BigUint::from(5u32), 3);
        assert_eq!(out, "#b101");
        let mut out = String::new();
        render_bits(&mut out, &BigUint::zero(), 16);
        assert_eq!(out, "#x0000");
    }

    #[test]
    fn test_model_parse() {
        let model = Model::parse("(((|x?0.1.0!1| #x7fffffff))\n((|nondet!0| #b101)))");
        assert_eq!(model.get("x?0.1.0!1"), Some("#x7fffffff"));
        assert_eq!(model.get("nondet!0"), Some("#b101"));
        assert_eq!(model.get("missing"), None);
    }

    #[test]
    fn test_check_formula_constant_shortcuts() {
        let mut ctx = TermArena::new();
        let t = ctx.mk_smt_bool(true);
        let f = ctx.mk_smt_bool(false);
        let property = Property { index: 0, msg: "p".to_string(), loc: SourceLoc::unknown() };

        let formula = Formula {
            defs: vec![],
            obligations: vec![
                Obligation { property: property.clone(), negated: f },
                Obligation { property: property.clone(), negated: t },
            ],
        };
        let outcomes = check_formula(&ctx, &formula, None).unwrap();
        assert_eq!(outcomes[0].verdict, PropertyVerdict::Verified);
        assert_eq!(outcomes[1].verdict, PropertyVerdict::Violated);

        // an infeasible path verifies everything vacuously
        let formula = Formula {
            defs: vec![f],
            obligations: vec![Obligation { property, negated: t }],
        };
        let outcomes = check_formula(&ctx, &formula, None).unwrap();
        assert_eq!(outcomes[0].verdict, PropertyVerdict::Verified);
    }

    #[test]
    fn test_symbolic_without_solver_is_unknown() {
        let mut ctx = TermArena::new();
        let x = ctx.mk_smt_symbol("x", Sort::Bool);
        let property = Property { index: 0, msg: "p".to_string(), loc: SourceLoc::unknown() };
        let formula =
            Formula { defs: vec![], obligations: vec![Obligation { property, negated: x }] };
        let outcomes = check_formula(&ctx, &formula, None).unwrap();
        assert!(matches!(outcomes[0].verdict, PropertyVerdict::Unknown(_)));
    }
}
