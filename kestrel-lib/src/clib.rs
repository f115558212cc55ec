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

//! Linkage of the prelinked C library. The library ships as GOTO
//! binaries, one per target integer width, in the same blob format as
//! user programs. Only symbols that are referenced but bodyless in
//! the user program are imported; symbols the user program already
//! defines win, and the import closes over the references of imported
//! bodies until a fixed point.

use std::collections::HashMap;

use crate::error::ExecError;
use crate::ir::serialize::read_binary;
use crate::ir::{collect_instr_ids, Exp, Function, Instr, InstrKind, Name, Program, Symtab, Ty};

/// The width-indexed library blobs, as loaded from disk.
#[derive(Default)]
pub struct PrelinkedLibrary {
    blobs: HashMap<u32, Vec<u8>>,
}

impl PrelinkedLibrary {
    pub fn new() -> Self {
        PrelinkedLibrary::default()
    }

    pub fn insert(&mut self, int_width: u32, blob: Vec<u8>) {
        self.blobs.insert(int_width, blob);
    }

    pub fn for_width(&self, int_width: u32) -> Option<&[u8]> {
        self.blobs.get(&int_width).map(|b| b.as_slice())
    }
}

fn remap_name(mapping: &[Name], name: Name) -> Name {
    mapping.get(name.to_u32() as usize).copied().unwrap_or(name)
}

fn remap_ty(mapping: &[Name], ty: &Ty) -> Ty {
    match ty {
        Ty::Pointer(inner) => Ty::Pointer(Box::new(remap_ty(mapping, inner))),
        Ty::Array(elem, n) => Ty::Array(Box::new(remap_ty(mapping, elem)), *n),
        Ty::Struct(name) => Ty::Struct(remap_name(mapping, *name)),
        Ty::Union(name) => Ty::Union(remap_name(mapping, *name)),
        Ty::Named(name) => Ty::Named(remap_name(mapping, *name)),
        Ty::Code { args, ret } => Ty::Code {
            args: args.iter().map(|ty| remap_ty(mapping, ty)).collect(),
            ret: Box::new(remap_ty(mapping, ret)),
        },
        ty => ty.clone(),
    }
}

fn remap_exp(mapping: &[Name], exp: &Exp<Name>) -> Exp<Name> {
    let remapped: Result<Exp<Name>, ()> =
        exp.map_ids(&mut |name| Ok(Exp::Id(remap_name(mapping, *name))));
    let mut remapped = remapped.unwrap();
    remap_exp_tys(mapping, &mut remapped);
    remapped
}

/// `map_ids` only touches identifier leaves; field names and embedded
/// types are fixed up here.
fn remap_exp_tys(mapping: &[Name], exp: &mut Exp<Name>) {
    use Exp::*;
    match exp {
        Nondet(ty, _) | Invalid(ty) | Cast(ty, _) => *ty = remap_ty(mapping, ty),
        Field(_, field) => *field = remap_name(mapping, *field),
        WithField(_, field, _) => *field = remap_name(mapping, *field),
        _ => (),
    }
    match exp {
        Pointer { offset, .. } => remap_exp_tys(mapping, offset),
        AddrOf(inner) | Deref(inner) | Cast(_, inner) => remap_exp_tys(mapping, inner),
        Field(base, _) => remap_exp_tys(mapping, base),
        Index(lhs, rhs) => {
            remap_exp_tys(mapping, lhs);
            remap_exp_tys(mapping, rhs);
        }
        Ite(c, t, e) | With(c, t, e) => {
            remap_exp_tys(mapping, c);
            remap_exp_tys(mapping, t);
            remap_exp_tys(mapping, e);
        }
        WithField(base, _, value) => {
            remap_exp_tys(mapping, base);
            remap_exp_tys(mapping, value);
        }
        Call(_, args) => args.iter_mut().for_each(|arg| remap_exp_tys(mapping, arg)),
        _ => (),
    }
}

fn remap_instr(mapping: &[Name], instr: &Instr) -> Instr {
    use InstrKind::*;
    let kind = match &instr.kind {
        Assign(lhs, rhs) => Assign(remap_exp(mapping, lhs), remap_exp(mapping, rhs)),
        Assume(cond) => Assume(remap_exp(mapping, cond)),
        Assert(cond, msg) => Assert(remap_exp(mapping, cond), msg.clone()),
        Goto { target, cond } => Goto {
            target: *target,
            cond: cond.as_ref().map(|cond| remap_exp(mapping, cond)),
        },
        FunctionCall { lhs, function, args } => FunctionCall {
            lhs: lhs.as_ref().map(|lhs| remap_exp(mapping, lhs)),
            function: remap_exp(mapping, function),
            args: args.iter().map(|arg| remap_exp(mapping, arg)).collect(),
        },
        Return(value) => Return(value.as_ref().map(|value| remap_exp(mapping, value))),
        Decl(name, ty) => Decl(remap_name(mapping, *name), remap_ty(mapping, ty)),
        Dead(name) => Dead(remap_name(mapping, *name)),
        Throw(tag, value) => Throw(
            remap_name(mapping, *tag),
            value.as_ref().map(|value| remap_exp(mapping, value)),
        ),
        Catch(handlers) => Catch(
            handlers.iter().map(|(tag, index)| (remap_name(mapping, *tag), *index)).collect(),
        ),
        ThrowDecl(tags) => ThrowDecl(tags.iter().map(|tag| remap_name(mapping, *tag)).collect()),
        StartThread(f) => StartThread(remap_name(mapping, *f)),
        Output(args) => Output(args.iter().map(|arg| remap_exp(mapping, arg)).collect()),
        kind => kind.clone(),
    };
    Instr { kind, id: instr.id, loc: instr.loc }
}

fn remap_function(mapping: &[Name], function: &Function) -> Function {
    Function {
        name: remap_name(mapping, function.name),
        params: function
            .params
            .iter()
            .map(|(name, ty)| (remap_name(mapping, *name), remap_ty(mapping, ty)))
            .collect(),
        ret_ty: remap_ty(mapping, &function.ret_ty),
        body: function.body.iter().map(|instr| remap_instr(mapping, instr)).collect(),
    }
}

/// Link a library blob into `program`. Returns the number of imported
/// functions.
pub fn link(program: &mut Program, symtab: &mut Symtab, blob: &[u8]) -> Result<usize, ExecError> {
    let binary = read_binary(blob)?;
    let mapping: Vec<Name> = binary.symbols.iter().map(|sym| symtab.intern(sym)).collect();

    // library functions under their host names
    let mut available: HashMap<Name, &Function> = HashMap::new();
    for function in binary.program.functions.values() {
        available.insert(remap_name(&mapping, function.name), function);
    }
    let lib_globals: HashMap<Name, Ty> = binary
        .program
        .globals
        .iter()
        .map(|(name, ty)| (remap_name(&mapping, *name), remap_ty(&mapping, ty)))
        .collect();

    let mut worklist: Vec<Name> = program
        .referenced_symbols()
        .into_iter()
        .filter(|name| !program.functions.contains_key(name))
        .collect();
    worklist.sort();

    let mut imported = 0;
    while let Some(host) = worklist.pop() {
        if program.functions.contains_key(&host) {
            continue;
        }
        let function = match available.get(&host) {
            Some(function) => remap_function(&mapping, function),
            None => continue,
        };

        let mut refs = std::collections::HashSet::new();
        for instr in &function.body {
            collect_instr_ids(&instr.kind, &mut refs);
        }
        for reference in refs {
            if available.contains_key(&reference) && !program.functions.contains_key(&reference) {
                worklist.push(reference);
            }
            if let Some(ty) = lib_globals.get(&reference) {
                if !program.is_global(reference) {
                    program.globals.push((reference, ty.clone()));
                }
            }
        }

        program.add_function(function);
        imported += 1;
    }

    if imported > 0 {
        program.assign_ids();
    }
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::serialize::write_binary;
    use crate::ir::{Signedness, MAIN};
    use crate::bitvector::B64;

    fn int_lit(v: i64) -> Exp<Name> {
        Exp::Bits(B64::from_i64(v, 32), Signedness::Signed)
    }

    fn library_blob() -> (Vec<u8>, Vec<String>) {
        let mut symtab = Symtab::new();
        let my_abs = symtab.intern("abs");
        let helper = symtab.intern("helper");
        let unused = symtab.intern("unused");
        let mut program = Program::new(MAIN);
        // abs calls helper; unused references nothing
        program.add_function(Function {
            name: my_abs,
            params: vec![(symtab.intern("v"), Ty::Signed(32))],
            ret_ty: Ty::Signed(32),
            body: vec![
                Instr::new(InstrKind::FunctionCall {
                    lhs: None,
                    function: Exp::Id(helper),
                    args: Vec::new(),
                }),
                Instr::new(InstrKind::EndFunction),
            ],
        });
        program.add_function(Function {
            name: helper,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: vec![Instr::new(InstrKind::EndFunction)],
        });
        program.add_function(Function {
            name: unused,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: vec![Instr::new(InstrKind::EndFunction)],
        });
        program.assign_ids();
        (write_binary(&symtab, &program).unwrap(), symtab.to_raw_table())
    }

    #[test]
    fn test_linkage_fixed_point() {
        let (blob, _) = library_blob();

        let mut symtab = Symtab::new();
        let y = symtab.intern("y");
        let my_abs = symtab.intern("abs");
        let mut program = Program::new(MAIN);
        program.add_function(Function {
            name: MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: vec![
                Instr::new(InstrKind::Decl(y, Ty::Signed(32))),
                Instr::new(InstrKind::FunctionCall {
                    lhs: Some(Exp::Id(y)),
                    function: Exp::Id(my_abs),
                    args: vec![int_lit(-3)],
                }),
                Instr::new(InstrKind::EndFunction),
            ],
        });
        program.assign_ids();

        let imported = link(&mut program, &mut symtab, &blob).unwrap();
        // abs plus its transitive helper, but not the unused symbol
        assert_eq!(imported, 2);
        assert!(program.functions.contains_key(&my_abs));
        assert!(program.functions.contains_key(&symtab.intern("helper")));
        assert!(!program.functions.contains_key(&symtab.intern("unused")));
    }

    #[test]
    fn test_existing_definitions_win() {
        let (blob, _) = library_blob();

        let mut symtab = Symtab::new();
        let my_abs = symtab.intern("abs");
        let mut program = Program::new(MAIN);
        let own_abs = Function {
            name: my_abs,
            params: Vec::new(),
            ret_ty: Ty::Signed(32),
            body: vec![
                Instr::new(InstrKind::Return(Some(int_lit(7)))),
                Instr::new(InstrKind::EndFunction),
            ],
        };
        program.add_function(own_abs);
        program.add_function(Function {
            name: MAIN,
            params: Vec::new(),
            ret_ty: Ty::Empty,
            body: vec![
                Instr::new(InstrKind::FunctionCall {
                    lhs: None,
                    function: Exp::Id(my_abs),
                    args: Vec::new(),
                }),
                Instr::new(InstrKind::EndFunction),
            ],
        });
        program.assign_ids();

        let imported = link(&mut program, &mut symtab, &blob).unwrap();
        assert_eq!(imported, 0);
        // the user's definition is untouched
        let body = &program.function(my_abs).unwrap().body;
        assert!(matches!(body[0].kind, InstrKind::Return(_)));
    }

    #[test]
    fn test_width_indexed_blobs() {
        let (blob, _) = library_blob();
        let mut library = PrelinkedLibrary::new();
        library.insert(32, blob.clone());
        library.insert(64, blob);
        assert!(library.for_width(32).is_some());
        assert!(library.for_width(16).is_none());
    }
}
