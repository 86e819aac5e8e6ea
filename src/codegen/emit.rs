//! Assembly of the generated evaluator source
//!
//! The emitted program contains a fixed prelude (the `Bv<W>` representation,
//! bit-vector helpers and the `Cell` text codec), the pure `formula`
//! function, and a driver that streams pattern rows through it.

use crate::codegen::generator::GeneratedFunction;
use crate::error::{SimError, SimResult};
use std::fmt::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the generated evaluator function
pub const FUNCTION_NAME: &str = "formula";

const PRELUDE: &str = r#"#![allow(unused_parens, unused_variables, unused_imports, dead_code)]
#![allow(non_snake_case, arithmetic_overflow, clippy::all)]

use std::io::{BufWriter, Write};

/// `W`-bit vector stored in the low bits of a `u64`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Bv<const W: u32>(u64);

impl<const W: u32> Bv<W> {
    const MASK: u64 = if W >= 64 { u64::MAX } else { (1u64 << W) - 1 };

    #[inline(always)]
    const fn new(v: u64) -> Self {
        Bv(v & Self::MASK)
    }

    #[inline(always)]
    fn from_unsigned(v: u64) -> Self {
        Self::new(v)
    }

    #[inline(always)]
    fn from_signed(v: i64) -> Self {
        Self::new(v as u64)
    }

    #[inline(always)]
    fn unsigned(self) -> u64 {
        self.0
    }

    #[inline(always)]
    fn signed(self) -> i64 {
        let s = 64 - W;
        ((self.0 << s) as i64) >> s
    }
}

impl<const W: u32> std::ops::BitAnd for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self {
        Bv(self.0 & rhs.0)
    }
}

impl<const W: u32> std::ops::BitOr for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Bv(self.0 | rhs.0)
    }
}

impl<const W: u32> std::ops::BitXor for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn bitxor(self, rhs: Self) -> Self {
        Bv(self.0 ^ rhs.0)
    }
}

impl<const W: u32> std::ops::Not for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self {
        Self::new(!self.0)
    }
}

impl<const W: u32> std::ops::Neg for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn neg(self) -> Self {
        Self::new(self.0.wrapping_neg())
    }
}

impl<const W: u32> std::ops::Shl for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn shl(self, rhs: Self) -> Self {
        if rhs.0 >= W as u64 { Bv(0) } else { Self::new(self.0 << rhs.0) }
    }
}

impl<const W: u32> std::ops::Shr for Bv<W> {
    type Output = Self;
    #[inline(always)]
    fn shr(self, rhs: Self) -> Self {
        if rhs.0 >= W as u64 { Bv(0) } else { Bv(self.0 >> rhs.0) }
    }
}

#[inline(always)]
fn bv_ashr<const W: u32>(a: Bv<W>, b: Bv<W>) -> Bv<W> {
    Bv::from_signed(a.signed() >> b.unsigned().min(63))
}

#[inline(always)]
fn bv_sdiv<const W: u32>(a: Bv<W>, b: Bv<W>) -> Bv<W> {
    let (n, d) = (a.signed(), b.signed());
    if d == 0 {
        Bv::from_signed(if n < 0 { 1 } else { -1 })
    } else {
        Bv::from_signed(n.wrapping_div(d))
    }
}

/// Bits `start..=end` of `a`, bit 0 being the least significant
#[inline(always)]
fn bv_extract<const OUT: u32, const IN: u32>(a: Bv<IN>, start: u32, end: u32) -> Bv<OUT> {
    debug_assert!(start <= end && end < IN && end - start + 1 == OUT);
    Bv::new(a.0 >> start)
}

/// `hi` occupies the most significant bits
#[inline(always)]
fn bv_concat<const HI: u32, const LO: u32, const OUT: u32>(hi: Bv<HI>, lo: Bv<LO>) -> Bv<OUT> {
    debug_assert!(HI + LO == OUT);
    Bv::new((hi.0 << LO) | lo.0)
}

#[inline(always)]
fn int_div(a: i64, b: i64) -> i64 {
    a.checked_div_euclid(b).unwrap_or(0)
}

/// Text codec for pattern columns and result rows
trait Cell: Sized {
    fn parse_cell(tok: &str) -> Result<Self, String>;
    fn render(&self) -> String;
}

impl Cell for bool {
    fn parse_cell(tok: &str) -> Result<Self, String> {
        match tok {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(format!("invalid bool '{}'", tok)),
        }
    }
    fn render(&self) -> String {
        if *self { "1".to_string() } else { "0".to_string() }
    }
}

impl Cell for i64 {
    fn parse_cell(tok: &str) -> Result<Self, String> {
        tok.parse().map_err(|e| format!("invalid int '{}': {}", tok, e))
    }
    fn render(&self) -> String {
        self.to_string()
    }
}

impl Cell for f64 {
    fn parse_cell(tok: &str) -> Result<Self, String> {
        tok.parse().map_err(|e| format!("invalid real '{}': {}", tok, e))
    }
    fn render(&self) -> String {
        self.to_string()
    }
}

impl<const W: u32> Cell for Bv<W> {
    fn parse_cell(tok: &str) -> Result<Self, String> {
        tok.parse::<u64>()
            .map(Bv::new)
            .map_err(|e| format!("invalid bit-vector '{}': {}", tok, e))
    }
    fn render(&self) -> String {
        self.0.to_string()
    }
}

fn next_cell<T: Cell>(
    tokens: &mut std::str::SplitWhitespace<'_>,
    row: usize,
    column: usize,
) -> Result<T, String> {
    let tok = tokens
        .next()
        .ok_or_else(|| format!("row {}: missing column {}", row, column))?;
    T::parse_cell(tok).map_err(|e| format!("row {}: column {}: {}", row, column, e))
}
"#;

/// Render the complete evaluator program
pub fn render_source(func: &GeneratedFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by smtsim. Do not edit.");
    for (i, arg) in func.arguments.iter().enumerate() {
        let _ = writeln!(out, "// column {}: {} ({})", i, arg.name, arg.ty);
    }
    out.push_str(PRELUDE);
    write_function(&mut out, func);
    write_driver(&mut out, func);
    out
}

fn write_function(out: &mut String, func: &GeneratedFunction) {
    let params: Vec<String> = func
        .arguments
        .iter()
        .map(|a| format!("{}: {}", a.ident, a.ty.rust_name()))
        .collect();
    let _ = writeln!(
        out,
        "\nfn {}({}) -> {} {{",
        FUNCTION_NAME,
        params.join(", "),
        func.ret.ty.rust_name()
    );
    for stmt in &func.statements {
        let _ = writeln!(out, "    {}", stmt);
    }
    let _ = writeln!(out, "    {}", func.ret.text);
    let _ = writeln!(out, "}}");
}

fn write_driver(out: &mut String, func: &GeneratedFunction) {
    out.push_str(
        "\nfn run(input: &str, output: &str) -> Result<(), String> {\n\
         \x20   let text = std::fs::read_to_string(input)\n\
         \x20       .map_err(|e| format!(\"cannot open {}: {}\", input, e))?;\n\
         \x20   let file = std::fs::File::create(output)\n\
         \x20       .map_err(|e| format!(\"cannot open {}: {}\", output, e))?;\n\
         \x20   let mut out = BufWriter::new(file);\n\
         \x20   let mut tokens = text.split_whitespace();\n\
         \x20   let rows: usize = tokens\n\
         \x20       .next()\n\
         \x20       .ok_or_else(|| \"missing row count\".to_string())?\n\
         \x20       .parse()\n\
         \x20       .map_err(|e| format!(\"invalid row count: {}\", e))?;\n\
         \x20   for row in 0..rows {\n",
    );
    for (i, arg) in func.arguments.iter().enumerate() {
        let _ = writeln!(
            out,
            "        let a{}: {} = next_cell(&mut tokens, row, {})?;",
            i,
            arg.ty.rust_name(),
            i
        );
    }
    let call_args: Vec<String> = (0..func.arguments.len()).map(|i| format!("a{}", i)).collect();
    let _ = writeln!(
        out,
        "        writeln!(out, \"{{}}\", {}({}).render()).map_err(|e| e.to_string())?;",
        FUNCTION_NAME,
        call_args.join(", ")
    );
    out.push_str(
        "    }\n\
         \x20   out.flush().map_err(|e| e.to_string())\n\
         }\n\
         \n\
         fn main() {\n\
         \x20   let args: Vec<String> = std::env::args().collect();\n\
         \x20   if args.len() != 3 {\n\
         \x20       eprintln!(\"usage: {} <patterns> <results>\", args[0]);\n\
         \x20       std::process::exit(2);\n\
         \x20   }\n\
         \x20   if let Err(e) = run(&args[1], &args[2]) {\n\
         \x20       eprintln!(\"{}\", e);\n\
         \x20       std::process::exit(1);\n\
         \x20   }\n\
         }\n",
    );
}

/// Write `source` to `path` atomically
///
/// The text goes to a temporary file in the destination directory and is
/// renamed into place only once fully written.
pub fn write_atomic(path: &Path, source: &str) -> SimResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| SimError::io(&dir, e))?;
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| SimError::io(&dir, e))?;
    std::io::Write::write_all(&mut tmp, source.as_bytes()).map_err(|e| SimError::io(path, e))?;
    tmp.persist(path).map_err(|e| SimError::io(path, e.error))?;
    debug!(path = %path.display(), bytes = source.len(), "wrote evaluator source");
    Ok(())
}
