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

#[cfg(test)]
mod tests {
    use cns_bytecode::{
        Button, BytecodeExp, CompileTimeValue, CompiledCharacter, Constant, Constants,
        ControllerKind, Direction, Key, OpCode, Operand, StringPool,
    };
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use unindent::unindent;

    use crate::{
        CompilationContext, CompileError, CompileOptions, CompileSession, CompileWarning,
        SourceError, SourceFile, Syntax,
    };

    use CompileTimeValue::*;

    fn compile_with(
        options: CompileOptions,
        syntax: Syntax,
        text: &str,
    ) -> Result<(CompiledCharacter, Vec<CompileWarning>), SourceError> {
        let constants = Constants::new();
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            options,
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        let name = match syntax {
            Syntax::Classic => "kfm.cns",
            Syntax::Modern => "kfm.zss",
        };
        session.compile_file(&SourceFile::new(name, &unindent(text), syntax))?;
        let warnings = session.warnings().to_vec();
        Ok((session.finish(), warnings))
    }

    fn classic(text: &str) -> Result<CompiledCharacter, SourceError> {
        compile_with(CompileOptions::default(), Syntax::Classic, text).map(|(c, _)| c)
    }

    fn modern(text: &str) -> Result<CompiledCharacter, SourceError> {
        compile_with(CompileOptions::default(), Syntax::Modern, text).map(|(c, _)| c)
    }

    fn expression(text: &str) -> Result<(CompileTimeValue, BytecodeExp), CompileError> {
        let mut constants = Constants::new();
        constants.insert("data.custom", Constant::Int(7));
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        session.compile_expression(text)
    }

    fn ops(code: &BytecodeExp) -> Vec<String> {
        code.instructions()
            .unwrap()
            .iter()
            .map(|i| i.op.to_string())
            .collect()
    }

    #[test_case("1+2*3", Int(7); "precedence")]
    #[test_case("(1+2)*3", Int(9); "parentheses")]
    #[test_case("2**3**2", Int(512); "power is right associative")]
    #[test_case("ifelse(1=1,2,3)", Int(2); "ifelse folds")]
    #[test_case("cond(0, 1, 4)", Int(4); "cond folds")]
    #[test_case("7/2", Int(3); "integer division")]
    #[test_case("7.0/2", Float(3.5); "float division")]
    #[test_case("const(data.custom) * 2", Int(14); "host constant folds")]
    #[test_case("2147483648", Int(i32::MAX); "literal saturates")]
    #[test_case("-2147483649", Int(i32::MIN); "negative literal saturates")]
    fn constant_expressions_fold(text: &str, expected: CompileTimeValue) {
        let (value, code) = expression(text).unwrap();
        assert_eq!(value, expected);
        assert!(code.is_empty(), "{text} emitted {code:?}");
    }

    #[test_case("5=[0,10]", true; "closed range includes interior")]
    #[test_case("0=[0,10]", true; "closed range includes bound")]
    #[test_case("0=(0,10)", false; "open range excludes low bound")]
    #[test_case("10=(0,10)", false; "open range excludes high bound")]
    #[test_case("10=(0,10]", true; "half open range")]
    #[test_case("5!=[0,10]", false; "negated range")]
    fn ranges_fold(text: &str, expected: bool) {
        let (value, code) = expression(text).unwrap();
        assert_eq!(value.to_bool(), Some(expected));
        assert!(code.is_empty());
    }

    #[test]
    fn operands_are_emitted_in_source_order() {
        let (value, code) = expression("time - var(2)").unwrap();
        assert_eq!(value, Indeterminate);
        let mut expected = BytecodeExp::new();
        expected.append_op(OpCode::Time);
        expected.append_int(2);
        expected.append_op(OpCode::Var);
        expected.append_op(OpCode::Sub);
        assert_eq!(code, expected);
        assert_eq!(code.stack_delta(), Ok(1));
    }

    #[test_case("time > 3 && var(1) || animtime = 0"; "logic")]
    #[test_case("ifelse(time, var(1), 2) * 3"; "ifelse")]
    #[test_case("cond(time, var(1), fvar(2))"; "cond")]
    #[test_case("time = [1, var(3)]"; "range")]
    #[test_case("abs(vel x) + const(size.xscale)"; "math and constants")]
    #[test_case("parent, time + root, var(4)"; "redirections")]
    #[test_case("helper(1000), pos y < 0"; "redirection with argument")]
    #[test_case("animelem = 3, >= 2"; "animelem comparison")]
    #[test_case("statetype != A"; "state type")]
    fn runtime_expressions_leave_one_value(text: &str) {
        let (value, code) = expression(text).unwrap();
        assert_eq!(value, Indeterminate);
        assert_eq!(code.stack_delta(), Ok(1), "{text}");
    }

    #[test]
    fn short_circuit_skips_the_right_operand() {
        let (_, code) = expression("time && var(1)").unwrap();
        assert_eq!(ops(&code), vec!["time", "jz8", "pop", "int8", "var"]);
    }

    #[test_case("parent, root, time", "root"; "nested redirection")]
    #[test_case("parent, (time)", "("; "parenthesized redirection")]
    #[test_case("parent, -time", "-"; "negated redirection")]
    fn redirection_restrictions(text: &str, token: &str) {
        assert_eq!(
            expression(text),
            Err(CompileError::InRedirection(token.to_string()))
        );
    }

    #[test_case("1 +", CompileError::MissingValue; "dangling operator")]
    #[test_case("1 + * 2", CompileError::ContiguousOperator("*".to_string()); "contiguous")]
    #[test_case("1 2", CompileError::Unexpected("2".to_string()); "trailing token")]
    #[test_case("$x", CompileError::UndefinedVariable("x".to_string()); "undefined local")]
    #[test_case("var(1, 2)", CompileError::ArgumentCount { name: "var".to_string(), expected: 1, got: 2 }; "argument count")]
    fn expression_errors(text: &str, error: CompileError) {
        assert_eq!(expression(text), Err(error));
    }

    #[test]
    fn compilation_is_idempotent() {
        let text = r#"
            [Statedef 200]
            type = S
            movetype = A
            anim = 200

            [State 200, Hit]
            type = HitDef
            trigger1 = time = 0 && var(3) = [1, 5)
            attr = S, NA
            hitflag = MAF
            damage = 20, 5

            [State 200, End]
            type = ChangeState
            trigger1 = animtime = 0
            value = 0
            ctrl = 1
        "#;
        assert_eq!(classic(text).unwrap(), classic(text).unwrap());
    }

    #[test]
    fn always_true_controller() {
        let character = classic(
            r#"
            [Statedef 0]
            type = S
            [State 0]
            type = Null
            trigger1 = 1
            "#,
        )
        .unwrap();
        assert_eq!(character.states.len(), 1);
        let state = &character.states[&0];
        assert_eq!(state.block.controllers().len(), 1);
        let mut expected = BytecodeExp::new();
        expected.append_op_i32(OpCode::Controller, 0);
        assert_eq!(state.code, expected);
    }

    #[test]
    fn never_true_controller() {
        let character = classic(
            r#"
            [Statedef 0]
            type = S
            [State 0]
            type = Null
            trigger1 = 0
            "#,
        )
        .unwrap();
        let state = &character.states[&0];
        assert_eq!(state.block.controllers().len(), 1);
        assert!(state.code.is_empty());
    }

    #[test_case(false; "lenient")]
    #[test_case(true; "strict")]
    fn missing_trigger1_is_always_an_error(strict_classic: bool) {
        let result = compile_with(
            CompileOptions { strict_classic },
            Syntax::Classic,
            r#"
            [Statedef 0]
            type = S
            [State 0]
            type = Null
            "#,
        );
        let error = result.unwrap_err();
        assert_eq!(error.error, CompileError::MissingTrigger1);
        assert_eq!(error.to_string(), "kfm.cns:4:\nmissing trigger1");
    }

    #[test]
    fn disabled_controller_parameters_are_not_compiled() {
        let (character, warnings) = compile_with(
            CompileOptions {
                strict_classic: true,
            },
            Syntax::Classic,
            r#"
            [Statedef 0]
            [State 0]
            type = ChangeState
            triggerall = 0
            trigger1 = time
            bogus = )(
            "#,
        )
        .unwrap();
        assert!(warnings.is_empty());
        let state = &character.states[&0];
        assert_eq!(state.block.controllers()[0].kind, ControllerKind::ChangeState);
        assert!(state.code.is_empty());
    }

    #[test]
    fn unknown_parameters_are_downgraded_unless_strict() {
        let text = r#"
            [Statedef 0]
            [State 0]
            type = PosAdd
            trigger1 = time
            x = 2
            bogus = 1
        "#;
        let (character, warnings) =
            compile_with(CompileOptions::default(), Syntax::Classic, text).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 6);
        assert_eq!(warnings[0].state, Some(0));
        assert_eq!(
            warnings[0].to_string(),
            "kfm.cns:6: kfm state 0: posadd: unknown parameter 'bogus'"
        );
        assert!(character.states[&0].block.controllers()[0].param("x").is_some());

        let error = compile_with(
            CompileOptions {
                strict_classic: true,
            },
            Syntax::Classic,
            text,
        )
        .unwrap_err();
        assert_eq!(
            error.error,
            CompileError::UnknownParameter {
                controller: "posadd".to_string(),
                name: "bogus".to_string(),
            }
        );
        assert_eq!(error.line, 6);
    }

    #[test]
    fn first_statedef_wins() {
        let character = classic(
            r#"
            [Statedef 10]
            type = C
            [Statedef 10]
            type = A
            [State 10]
            type = Null
            trigger1 = 1
            "#,
        )
        .unwrap();
        let state = &character.states[&10];
        assert_eq!(state.state_type, cns_bytecode::StateType::Crouching);
        assert!(state.block.controllers().is_empty());
    }

    #[test]
    fn commands_are_collected() {
        let constants = Constants::new();
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        let cmd = unindent(
            r#"
            [Defaults]
            command.time = 20

            [Command]
            name = "QCF_x"
            command = ~D, DF, F, x
            [Command]
            name = "charge"
            command = ~30$B, >F+/a
            time = 10
            "#,
        );
        session
            .compile_file(&SourceFile::new("kfm.cmd", &cmd, Syntax::Classic))
            .unwrap();
        let commands = session.commands();
        assert_eq!(commands.commands.len(), 2);

        let qcf = &commands.commands[0];
        assert_eq!(qcf.name, "QCF_x");
        assert_eq!(qcf.time, 20);
        assert_eq!(qcf.steps.len(), 4);
        assert!(qcf.steps[0].keys[0].release);
        assert_eq!(qcf.steps[1].keys[0].key, Key::Direction(Direction::DF));
        assert_eq!(qcf.steps[3].keys[0].key, Key::Button(Button::X));

        let charge = &commands.commands[1];
        assert_eq!(charge.time, 10);
        let back = charge.steps[0].keys[0];
        assert_eq!((back.charge, back.four_way), (30, true));
        assert!(charge.steps[1].strict);
        assert_eq!(charge.steps[1].keys.len(), 2);
        assert!(charge.steps[1].keys[1].hold);

        let (value, code) = session.compile_expression(r#"command = "QCF_x""#).unwrap();
        assert_eq!(value, Indeterminate);
        assert_eq!(code.stack_delta(), Ok(1));
    }

    #[test]
    fn block_syntax_state() {
        let character = modern(
            r#"
            [StateDef 100; type: C; movetype: A; anim: 100;]
            {
                if time = 0 {
                    VelSet { x: 0; }
                }
                persistent(0) ignorehitpause PlaySnd { value: S5, 0; }
                if animtime = 0 {
                    ChangeState { value: 11; ctrl: 1; }
                }
            }
            "#,
        )
        .unwrap();
        let state = &character.states[&100];
        assert_eq!(state.state_type, cns_bytecode::StateType::Crouching);
        assert_eq!(state.persistent, vec![0]);
        let controllers = state.block.controllers();
        assert_eq!(controllers.len(), 3);
        assert!(controllers[1].ignore_hit_pause);
        assert!(!controllers[2].ignore_hit_pause);
        assert_eq!(state.code.stack_delta(), Ok(0));
    }

    #[test]
    fn switch_compiles_like_an_if_chain() {
        let switch = modern(
            r#"
            [StateDef 0] {
                switch var(0) {
                case 1; 2:
                    ChangeState { value: 10; }
                default:
                    Turn {}
                }
            }
            "#,
        )
        .unwrap();
        let chain = modern(
            r#"
            [StateDef 0] {
                if var(0) = 1 || var(0) = 2 {
                    ChangeState { value: 10; }
                } else {
                    Turn {}
                }
            }
            "#,
        )
        .unwrap();
        assert_eq!(switch.states[&0].code, chain.states[&0].code);
    }

    #[test]
    fn functions_calls_and_let() {
        let character = modern(
            r#"
            [StateDef 0] {
                let lo, hi = call bounds(time);
                let hi, lo = $lo, $hi;
                call bounds(1);
                if $lo > $hi { Turn {} }
            }

            function bounds(t)[low, high] {
                let low = $t - 1;
                let high = $t + 1;
            }
            "#,
        )
        .unwrap();
        assert_eq!(character.functions.len(), 1);
        let bounds = &character.functions[0];
        assert_eq!((bounds.num_args, bounds.num_rets, bounds.num_locals), (1, 2, 3));

        let state = &character.states[&0];
        assert_eq!(state.num_locals, 2);
        assert_eq!(state.code.stack_delta(), Ok(0));
        let calls: Vec<_> = state
            .code
            .instructions()
            .unwrap()
            .into_iter()
            .filter(|i| i.op == OpCode::Call.into())
            .map(|i| i.operand)
            .collect();
        assert_eq!(
            calls,
            vec![
                Operand::Call { func: 0, args: 1, rets: 2 },
                Operand::Call { func: 0, args: 1, rets: 2 },
            ]
        );
    }

    #[test_case("call missing();", CompileError::UndefinedFunction("missing".to_string()); "undefined")]
    #[test_case("call one(1, 2);", CompileError::ArgumentCount { name: "one".to_string(), expected: 1, got: 2 }; "arity")]
    #[test_case("let a, b = call one(1);", CompileError::ReturnCount { name: "one".to_string(), expected: 1, got: 2 }; "returns")]
    #[test_case("break;", CompileError::OutsideLoop("break"); "break outside loop")]
    #[test_case("persistent(1) Turn {}", CompileError::InvalidPersistent("persistent(1) is the default"); "persistent one")]
    fn block_syntax_errors(statement: &str, error: CompileError) {
        let text = format!(
            "function one(x)[y] {{ let y = $x; }}\n[StateDef 0] {{\n    {statement}\n}}\n"
        );
        assert_eq!(modern(&text).unwrap_err().error, error);
    }

    #[test]
    fn local_slots_are_limited() {
        let lets = |n: usize| -> String {
            let body: String = (0..n).map(|i| format!("let v{i} = {i};\n")).collect();
            format!("[StateDef 0] {{\n{body}}}\n")
        };
        let character = modern(&lets(256)).unwrap();
        assert_eq!(character.states[&0].num_locals, 256);

        let error = modern(&lets(257)).unwrap_err();
        assert_eq!(error.error, CompileError::LocalLimit { max: 256 });
    }

    #[test]
    fn long_branches_use_wide_jumps() {
        let body = "Turn {}\n".repeat(60);
        let character = modern(&format!("[StateDef 0] {{ if time {{ {body} }} }}")).unwrap();
        let code = &character.states[&0].code;
        let instructions = code.instructions().unwrap();
        let jz = instructions
            .iter()
            .find(|i| i.op == OpCode::Jz.into())
            .unwrap();
        assert_eq!(jz.jump_target(), Some(code.len() - 1));
        assert_eq!(code.stack_delta(), Ok(0));
    }

    #[test]
    fn loops() {
        let character = modern(
            r#"
            [StateDef 0] {
                for i = 0; 3 {
                    if $i = 1 { continue; }
                    VarAdd { v: 1; value: $i; }
                }
                while var(1) < 10 {
                    var(1) := var(1) + 1;
                    if var(1) = 5 { break; }
                }
            }
            "#,
        )
        .unwrap();
        let state = &character.states[&0];
        assert_eq!(state.num_locals, 1);
        assert_eq!(state.code.stack_delta(), Ok(0));
        assert!(ops(&state.code).contains(&"for".to_string()));
        assert!(ops(&state.code).contains(&"loop".to_string()));
    }

    #[test]
    fn functions_are_visible_across_files() {
        let constants = Constants::new();
        let mut strings = StringPool::new();
        let mut session = CompileSession::new(
            CompileOptions::default(),
            CompilationContext::new("kfm", &constants, &mut strings),
        );
        let caller = SourceFile::new(
            "states.zss",
            "[StateDef 0] { call reset(); }",
            Syntax::Modern,
        );
        let callee = SourceFile::new(
            "common.zss",
            "function reset() { var(0) := 0; }",
            Syntax::Modern,
        );
        session.compile_files(&[caller, callee]).unwrap();
        let character = session.finish();
        assert_eq!(character.functions[0].name, "reset");
        assert_eq!(character.states.len(), 1);
    }

    #[test_case("statetype S", "statetype"; "state type letter")]
    #[test_case("animelem 3", "animelem"; "animation element")]
    #[test_case("animelem 3, > 2", "animelem"; "animation element time")]
    #[test_case("hitdefattr SC, NA", "hitdefattr"; "hit attribute")]
    #[test_case(r#"command "QCF_x""#, "command"; "command name")]
    fn missing_equality_disables_the_trigger(trigger: &str, name: &str) {
        let text = format!(
            "[Statedef 0]\n[State 0]\ntype = Turn\ntrigger1 = {trigger}\n[State 0]\ntype = Null\ntrigger1 = 1\n"
        );
        let (character, warnings) =
            compile_with(CompileOptions::default(), Syntax::Classic, &text).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 4);
        assert_eq!(
            warnings[0].message,
            CompileError::Missing(format!("= or != after {name}")).to_string()
        );
        let state = &character.states[&0];
        assert_eq!(state.block.controllers().len(), 2);
        assert_eq!(ops(&state.code), vec!["controller"]);

        let error = compile_with(
            CompileOptions {
                strict_classic: true,
            },
            Syntax::Classic,
            &text,
        )
        .unwrap_err();
        assert_eq!(error.error, CompileError::Missing(format!("= or != after {name}")));
    }

    #[test]
    fn block_syntax_parameters_keep_the_statement_going() {
        let character = modern(
            r#"
            [StateDef 0; anim: 5; ctrl: 0;] {
                VelSet { x: 0; }
                Turn {}
                PosAdd { x: 1; y: -2 }
            }
            "#,
        )
        .unwrap();
        let state = &character.states[&0];
        assert!(state.statedef.param("anim").is_some());
        let kinds: Vec<_> = state.block.controllers().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ControllerKind::VelSet, ControllerKind::Turn, ControllerKind::PosAdd]
        );
        assert_eq!(state.code.stack_delta(), Ok(0));
    }

    #[test]
    fn block_syntax_errors_point_at_the_entry() {
        let error = modern("[StateDef 0]\n{\n  Null {\n    bogus: 1;\n  }\n  \n}\n").unwrap_err();
        assert_eq!(error.line, 4);
        assert_eq!(
            error.error,
            CompileError::UnknownParameter {
                controller: "null".to_string(),
                name: "bogus".to_string(),
            }
        );

        let error = modern("[StateDef 0]\n{\n  Turn {}\n\n  if time = {\n  }\n}\n").unwrap_err();
        assert_eq!(error.line, 5);
    }

    #[test]
    fn function_lists_fit_their_counts() {
        let function = |n: usize| {
            let args: Vec<String> = (0..n).map(|i| format!("a{i}")).collect();
            format!("function wide({}) {{ }}\n", args.join(", "))
        };
        let character = modern(&function(255)).unwrap();
        assert_eq!(character.functions[0].num_args, 255);

        let error = modern(&function(256)).unwrap_err();
        assert_eq!(
            error.error,
            CompileError::ListLimit {
                what: "arguments",
                max: 255,
            }
        );
    }
}
