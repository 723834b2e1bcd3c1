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

use std::fmt::Write;

use cns_bytecode::{BytecodeExp, CompiledCharacter, OpCode, Operand, StringPool};
use cns_compiler::CompileWarning;
use eyre::WrapErr;
use serde_json::json;

use crate::args::OutputFormat;

pub fn render(
    format: OutputFormat,
    character: &CompiledCharacter,
    strings: &StringPool,
    warnings: &[CompileWarning],
) -> Result<String, eyre::Report> {
    match format {
        OutputFormat::Summary => Ok(summary(character, warnings)),
        OutputFormat::Json => {
            let document = json!({
                "character": character,
                "strings": strings,
            });
            let mut out = serde_json::to_string_pretty(&document)
                .wrap_err("Unable to serialize compiled character")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Disasm => disassemble(character, strings),
    }
}

fn summary(character: &CompiledCharacter, warnings: &[CompileWarning]) -> String {
    let controllers: usize = character
        .states
        .values()
        .map(|s| s.block.controllers().len())
        .sum();
    let mut out = String::new();
    let _ = writeln!(out, "states:      {}", character.states.len());
    let _ = writeln!(out, "controllers: {controllers}");
    let _ = writeln!(out, "functions:   {}", character.functions.len());
    let _ = writeln!(out, "commands:    {}", character.commands.commands.len());
    for warning in warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

fn listing(out: &mut String, code: &BytecodeExp, strings: &StringPool) -> Result<(), eyre::Report> {
    for ins in code.instructions().wrap_err("Unable to decode compiled code")? {
        let _ = write!(out, "  {ins}");
        if let (true, Operand::I32(id)) = (ins.op == OpCode::Str.into(), ins.operand)
            && let Some(s) = strings.get(id)
        {
            let _ = write!(out, " ; {s:?}");
        }
        out.push('\n');
    }
    Ok(())
}

fn disassemble(character: &CompiledCharacter, strings: &StringPool) -> Result<String, eyre::Report> {
    let mut out = String::new();
    for (number, state) in &character.states {
        let _ = writeln!(
            out,
            "state {number} type={} movetype={} physics={} locals={}",
            state.state_type, state.move_type, state.physics, state.num_locals
        );
        for (index, controller) in state.block.controllers().iter().enumerate() {
            let _ = writeln!(out, "  ; controller {index}: {}", controller.kind);
        }
        listing(&mut out, &state.code, strings)?;
    }
    for (id, function) in character.functions.iter().enumerate() {
        let _ = writeln!(
            out,
            "function {id} {}({} -> {}) locals={}",
            function.name, function.num_args, function.num_rets, function.num_locals
        );
        listing(&mut out, &function.code, strings)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cns_bytecode::Constants;
    use cns_compiler::{CompilationContext, CompileOptions, CompileSession, SourceFile, Syntax};

    fn compile(strings: &mut StringPool) -> CompiledCharacter {
        let constants = Constants::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, strings),
        );
        let source = SourceFile::new(
            "kfm.zss",
            "[StateDef 5] { if time = 3 { DisplayToClipboard { text: \"hi\"; } } }",
            Syntax::Modern,
        );
        session.compile_file(&source).unwrap();
        session.finish()
    }

    #[test]
    fn summary_counts() {
        let mut strings = StringPool::new();
        let character = compile(&mut strings);
        let text = render(OutputFormat::Summary, &character, &strings, &[]).unwrap();
        assert!(text.starts_with("states:      1\ncontrollers: 1\n"));
    }

    #[test]
    fn disassembly_lists_controllers() {
        let mut strings = StringPool::new();
        let character = compile(&mut strings);
        let text = render(OutputFormat::Disasm, &character, &strings, &[]).unwrap();
        assert!(text.starts_with("state 5 type=S movetype=I physics=N locals=0\n"));
        assert!(text.contains("; controller 0: displaytoclipboard"));
        assert!(text.contains("controller 0\n"));
    }

    #[test]
    fn json_has_strings() {
        let mut strings = StringPool::new();
        let character = compile(&mut strings);
        let text = render(OutputFormat::Json, &character, &strings, &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["strings"]["strings"][0], "hi");
        assert!(value["character"]["states"]["5"].is_object());
    }
}
