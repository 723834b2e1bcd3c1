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

use std::collections::HashMap;
use std::str::FromStr;

use cns_bytecode::{BytecodeExp, CompileTimeValue, ConstOp, Ex2Op, ExOp, Op, OpCode};
use lazy_static::lazy_static;

use crate::errors::CompileError;
use crate::expr::BinOp;
use crate::flags::{assert_flag, move_type_bit, parse_attr, state_type_bit};
use crate::lexer::{next_token, read_string};
use crate::primary::emit_arg;
use crate::session::CompileSession;

/// How a trigger takes its arguments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TriggerForm {
    /// No arguments.
    Nullary,
    /// One argument in parentheses.
    Unary,
    /// One optional argument in parentheses; `default` is pushed when it is left out.
    Optional(i32),
    /// An axis word follows the name: `pos x`, `vel y`.
    Component(&'static [(&'static str, Op)]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TriggerDef {
    pub(crate) op: Op,
    pub(crate) form: TriggerForm,
}

/// Fields `gethitvar` can read, in the order of their runtime ids.
pub(crate) const GETHITVAR_FIELDS: &[&str] = &[
    "xveladd", "yveladd", "type", "animtype", "airtype", "groundtype", "damage", "hitcount",
    "fallcount", "hitshaketime", "hittime", "slidetime", "ctrltime", "recovertime", "xoff",
    "yoff", "xvel", "yvel", "yaccel", "hitid", "chainid", "guarded", "isbound", "fall",
    "fall.damage", "fall.xvel", "fall.yvel", "fall.recover", "fall.time", "fall.recovertime",
    "fall.kill", "fall.envshake.time", "fall.envshake.freq", "fall.envshake.ampl",
    "fall.envshake.phase", "attr", "dizzypoints", "guardpoints", "id", "playerno", "redlife",
    "score", "hitdamage", "guarddamage", "power", "hitpower", "guardpower", "kill",
];

const POS: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::PosX)),
    ("y", Op::Base(OpCode::PosY)),
    ("z", Op::Ex(ExOp::PosZ)),
];
const VEL: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::VelX)),
    ("y", Op::Base(OpCode::VelY)),
    ("z", Op::Ex(ExOp::VelZ)),
];
const SCREEN_POS: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::ScreenPosX)),
    ("y", Op::Base(OpCode::ScreenPosY)),
];
const P2_DIST: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::P2DistX)),
    ("y", Op::Base(OpCode::P2DistY)),
];
const P2_BODY_DIST: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::P2BodyDistX)),
    ("y", Op::Base(OpCode::P2BodyDistY)),
];
const PARENT_DIST: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::ParentDistX)),
    ("y", Op::Base(OpCode::ParentDistY)),
];
const ROOT_DIST: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::RootDistX)),
    ("y", Op::Base(OpCode::RootDistY)),
];
const CAMERA_POS: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::CameraPosX)),
    ("y", Op::Base(OpCode::CameraPosY)),
];
const HIT_VEL: &[(&str, Op)] = &[
    ("x", Op::Base(OpCode::HitVelX)),
    ("y", Op::Base(OpCode::HitVelY)),
];
const SCALE: &[(&str, Op)] = &[
    ("x", Op::Ex(ExOp::ScaleX)),
    ("y", Op::Ex(ExOp::ScaleY)),
];

lazy_static! {
    /// Triggers that compile to a single accessor, by name.
    pub(crate) static ref TRIGGERS: HashMap<&'static str, TriggerDef> = {
        use TriggerForm::*;
        let mut t = HashMap::new();
        let mut add = |name, op: Op, form| {
            t.insert(name, TriggerDef { op, form });
        };
        for (name, op) in [
            ("time", OpCode::Time),
            ("alive", OpCode::Alive),
            ("anim", OpCode::Anim),
            ("animtime", OpCode::AnimTime),
            ("ctrl", OpCode::Ctrl),
            ("life", OpCode::Life),
            ("lifemax", OpCode::LifeMax),
            ("power", OpCode::Power),
            ("powermax", OpCode::PowerMax),
            ("stateno", OpCode::StateNo),
            ("prevstateno", OpCode::PrevStateNo),
            ("movecontact", OpCode::MoveContact),
            ("movehit", OpCode::MoveHit),
            ("moveguarded", OpCode::MoveGuarded),
            ("movereversed", OpCode::MoveReversed),
            ("hitcount", OpCode::HitCount),
            ("uniqhitcount", OpCode::UniqHitCount),
            ("hitshakeover", OpCode::HitShakeOver),
            ("hitover", OpCode::HitOver),
            ("hitfall", OpCode::HitFall),
            ("canrecover", OpCode::CanRecover),
            ("roundno", OpCode::RoundNo),
            ("roundstate", OpCode::RoundState),
            ("matchno", OpCode::MatchNo),
            ("matchover", OpCode::MatchOver),
            ("gametime", OpCode::GameTime),
            ("numenemy", OpCode::NumEnemy),
            ("numpartner", OpCode::NumPartner),
            ("numproj", OpCode::NumProj),
            ("id", OpCode::Id),
            ("teamside", OpCode::TeamSide),
            ("random", OpCode::Random),
            ("facing", OpCode::Facing),
            ("frontedgedist", OpCode::FrontEdgeDist),
            ("backedgedist", OpCode::BackEdgeDist),
            ("frontedgebodydist", OpCode::FrontEdgeBodyDist),
            ("backedgebodydist", OpCode::BackEdgeBodyDist),
            ("inguarddist", OpCode::InGuardDist),
            ("ishometeam", OpCode::IsHomeTeam),
            ("palno", OpCode::PalNo),
            ("ailevel", OpCode::AiLevel),
            ("p2life", OpCode::P2Life),
            ("p2stateno", OpCode::P2StateNo),
        ] {
            add(name, op.into(), Nullary);
        }
        for (name, op) in [
            ("animelemtime", OpCode::AnimElemTime),
            ("animexist", OpCode::AnimExist),
            ("selfanimexist", OpCode::SelfAnimExist),
            ("numprojid", OpCode::NumProjId),
            ("projcontacttime", OpCode::ProjContactTime),
            ("projhittime", OpCode::ProjHitTime),
            ("projguardedtime", OpCode::ProjGuardedTime),
        ] {
            add(name, op.into(), Unary);
        }
        for (name, op) in [
            ("numtarget", OpCode::NumTarget),
            ("numhelper", OpCode::NumHelper),
            ("numexplod", OpCode::NumExplod),
            ("ishelper", OpCode::IsHelper),
        ] {
            add(name, op.into(), Optional(-1));
        }
        for (name, axes) in [
            ("pos", POS),
            ("vel", VEL),
            ("screenpos", SCREEN_POS),
            ("p2dist", P2_DIST),
            ("p2bodydist", P2_BODY_DIST),
            ("parentdist", PARENT_DIST),
            ("rootdist", ROOT_DIST),
            ("camerapos", CAMERA_POS),
            ("hitvel", HIT_VEL),
            ("scale", SCALE),
        ] {
            add(name, axes[0].1, Component(axes));
        }
        for (name, op) in [
            ("angle", ExOp::Angle),
            ("xshear", ExOp::XShear),
            ("drawgame", ExOp::DrawGame),
            ("win", ExOp::Win),
            ("winko", ExOp::WinKo),
            ("wintime", ExOp::WinTime),
            ("winperfect", ExOp::WinPerfect),
            ("lose", ExOp::Lose),
            ("loseko", ExOp::LoseKo),
            ("losetime", ExOp::LoseTime),
            ("tickspersecond", ExOp::TicksPerSecond),
            ("hitpausetime", ExOp::HitPauseTime),
            ("receiveddamage", ExOp::ReceivedDamage),
            ("receivedhits", ExOp::ReceivedHits),
            ("consecutivewins", ExOp::ConsecutiveWins),
            ("stagetime", ExOp::StageTime),
            ("groundlevel", ExOp::GroundLevel),
            ("layerno", ExOp::LayerNo),
            ("memberno", ExOp::MemberNo),
            ("roundsexisted", ExOp::RoundsExisted),
        ] {
            add(name, op.into(), Nullary);
        }
        for (name, op) in [
            ("guardpoints", Ex2Op::GuardPoints),
            ("guardpointsmax", Ex2Op::GuardPointsMax),
            ("dizzypoints", Ex2Op::DizzyPoints),
            ("dizzypointsmax", Ex2Op::DizzyPointsMax),
            ("redlife", Ex2Op::RedLife),
            ("score", Ex2Op::Score),
            ("scoretotal", Ex2Op::ScoreTotal),
            ("dizzy", Ex2Op::Dizzy),
            ("guardbreak", Ex2Op::GuardBreak),
            ("incustomstate", Ex2Op::InCustomState),
            ("runorder", Ex2Op::RunOrder),
            ("fighttime", Ex2Op::FightTime),
            ("standby", Ex2Op::StandBy),
        ] {
            add(name, op.into(), Nullary);
        }
        t
    };
}

/// Triggers whose value is only meaningful compared with `=` or `!=`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Comparand {
    Command,
    StateType(OpCode),
    MoveType(OpCode),
    HitDefAttr,
    Name(ExOp),
}

fn comparand(name: &str) -> Option<Comparand> {
    Some(match name {
        "command" => Comparand::Command,
        "statetype" => Comparand::StateType(OpCode::StateType),
        "p2statetype" => Comparand::StateType(OpCode::P2StateType),
        "movetype" => Comparand::MoveType(OpCode::MoveType),
        "p2movetype" => Comparand::MoveType(OpCode::P2MoveType),
        "hitdefattr" => Comparand::HitDefAttr,
        "name" => Comparand::Name(ExOp::NameEq),
        "authorname" => Comparand::Name(ExOp::AuthorNameEq),
        "p1name" => Comparand::Name(ExOp::P1NameEq),
        "p2name" => Comparand::Name(ExOp::P2NameEq),
        "p3name" => Comparand::Name(ExOp::P3NameEq),
        "p4name" => Comparand::Name(ExOp::P4NameEq),
        _ => return None,
    })
}

impl CompileSession<'_> {
    /// Everything named that is not a variable, a math function or a redirection.
    pub(crate) fn trigger(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        name: &str,
    ) -> Result<CompileTimeValue, CompileError> {
        if let Some(kind) = comparand(name) {
            return self.comparand_trigger(out, input, name, kind);
        }
        match name {
            "const" => return self.constant(out, input),
            "gethitvar" => {
                let field = self.word_arg(input)?;
                let index = GETHITVAR_FIELDS
                    .iter()
                    .position(|f| *f == field)
                    .ok_or(CompileError::InvalidLiteral {
                        what: "gethitvar field",
                        value: field,
                    })?;
                out.append_int(index as i32);
                out.append_op(ExOp::GetHitVar);
                return Ok(CompileTimeValue::Indeterminate);
            }
            "isasserted" => {
                let flag = self.word_arg(input)?;
                let bit = assert_flag(&flag).ok_or(CompileError::InvalidLiteral {
                    what: "assert flag",
                    value: flag,
                })?;
                out.append_int(bit);
                out.append_op(Ex2Op::IsAsserted);
                return Ok(CompileTimeValue::Indeterminate);
            }
            "animelem" => return self.anim_elem(out, input),
            _ => {}
        }

        let def = *TRIGGERS
            .get(name)
            .ok_or_else(|| CompileError::InvalidData(name.to_string()))?;
        match def.form {
            TriggerForm::Nullary => {
                self.advance(input);
                out.append_op(def.op);
            }
            TriggerForm::Unary => {
                let args = self.call_args(input, name, 1)?;
                emit_arg(out, &args[0]);
                out.append_op(def.op);
            }
            TriggerForm::Optional(default) => {
                self.advance(input);
                if self.token == "(" {
                    let args = self.paren_args(input)?;
                    if args.len() != 1 {
                        return Err(CompileError::ArgumentCount {
                            name: name.to_string(),
                            expected: 1,
                            got: args.len(),
                        });
                    }
                    emit_arg(out, &args[0]);
                } else {
                    out.append_int(default);
                }
                out.append_op(def.op);
            }
            TriggerForm::Component(axes) => {
                self.advance(input);
                let op = axes
                    .iter()
                    .find(|(axis, _)| *axis == self.token)
                    .map(|(_, op)| *op)
                    .ok_or_else(|| CompileError::InvalidLiteral {
                        what: "component",
                        value: format!("{name} {}", self.token),
                    })?;
                self.advance(input);
                out.append_op(op);
            }
        }
        Ok(CompileTimeValue::Indeterminate)
    }

    /// With a function name current: the single bare word in its parentheses.
    fn word_arg(&mut self, input: &mut &str) -> Result<String, CompileError> {
        self.advance(input);
        self.expect("(", input)?;
        let word = std::mem::take(&mut self.token);
        if word.is_empty() {
            return Err(CompileError::MissingValue);
        }
        self.advance(input);
        self.expect(")", input)?;
        Ok(word)
    }

    /// `const(name)`: an engine constant read at runtime, or a host constant folded now.
    fn constant(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let name = self.word_arg(input)?;
        if let Ok(op) = ConstOp::from_str(&name) {
            out.append_op(op);
            return Ok(CompileTimeValue::Indeterminate);
        }
        match self.ctx.constants.get(&name) {
            Some(value) => Ok(value.into()),
            None => Err(CompileError::InvalidLiteral {
                what: "constant",
                value: name,
            }),
        }
    }

    /// Reads `=` or `!=` after a trigger that requires one and moves on to the operand.
    /// `None` when the operator is missing and lenient; the operand is then current already.
    fn equality(&mut self, input: &mut &str, name: &str) -> Result<Option<bool>, CompileError> {
        self.advance(input);
        let negate = match self.token.as_str() {
            "=" => false,
            "!=" => true,
            _ => {
                return self.lenient(CompileError::Missing(format!("= or != after {name}")), None);
            }
        };
        self.advance(input);
        Ok(Some(negate))
    }

    /// The operand is read even when the operator is missing, so that compilation can go on
    /// after the line's substitute value.
    fn comparand_trigger(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
        name: &str,
        kind: Comparand,
    ) -> Result<CompileTimeValue, CompileError> {
        let negate = self.equality(input, name)?;
        let mut code = BytecodeExp::new();
        match kind {
            Comparand::Command | Comparand::Name(_) => {
                if self.token != "\"" {
                    return Err(CompileError::Missing("\"".to_string()));
                }
                let text = read_string(input)
                    .ok_or_else(|| CompileError::Missing("\"".to_string()))?;
                let op: Op = match kind {
                    Comparand::Name(op) => op.into(),
                    _ => {
                        if !self.commands.is_empty() && !self.commands.contains(&text) {
                            self.lenient(
                                CompileError::InvalidLiteral {
                                    what: "command",
                                    value: text.clone(),
                                },
                                (),
                            )?;
                        }
                        OpCode::Command.into()
                    }
                };
                let id = self.ctx.strings.intern(&text);
                code.append_op_i32(OpCode::Str, id);
                code.append_op(op);
            }
            Comparand::StateType(op) | Comparand::MoveType(op) => {
                let letters = std::mem::take(&mut self.token);
                let to_bit = match kind {
                    Comparand::StateType(_) => state_type_bit,
                    _ => move_type_bit,
                };
                let mut chars = letters.chars();
                let bit = match (chars.next().and_then(to_bit), chars.next()) {
                    (Some(bit), None) => Some(bit),
                    (Some(bit), Some(_)) if !self.strict => Some(bit),
                    _ => None,
                };
                let Some(bit) = bit else {
                    let error = CompileError::InvalidLiteral {
                        what: "type letter",
                        value: letters,
                    };
                    self.advance(input);
                    return self.lenient(error, CompileTimeValue::Bool(false));
                };
                code.append_int(bit);
                code.append_op(op);
            }
            Comparand::HitDefAttr => {
                let mut text = std::mem::take(&mut self.token);
                loop {
                    let mut look = *input;
                    if next_token(&mut look) != "," {
                        break;
                    }
                    let class = next_token(&mut look);
                    if class.len() != 2 || !class.chars().all(|c| c.is_ascii_alphabetic()) {
                        break;
                    }
                    *input = look;
                    text.push(',');
                    text.push_str(&class);
                }
                let mask = parse_attr(&text);
                if let Some(invalid) = mask.invalid {
                    self.lenient(
                        CompileError::InvalidLiteral {
                            what: "hit attribute",
                            value: invalid,
                        },
                        (),
                    )?;
                }
                code.append_int(mask.value);
                code.append_op(OpCode::HitDefAttr);
            }
        }
        self.advance(input);
        let Some(negate) = negate else {
            return Ok(CompileTimeValue::Bool(false));
        };
        out.append_exp(&code);
        if negate {
            out.append_op(OpCode::BlNot);
        }
        Ok(CompileTimeValue::Indeterminate)
    }

    /// `animelem = n` is true on the first tick of element `n`; `animelem = n, > t` compares
    /// the time since element `n` started with `t`.
    fn anim_elem(
        &mut self,
        out: &mut BytecodeExp,
        input: &mut &str,
    ) -> Result<CompileTimeValue, CompileError> {
        let negate = self.equality(input, "animelem")?;
        let mut element = BytecodeExp::new();
        let n = self.expr_additive(&mut element, input)?;
        element.append_value(n);

        let mut compare = BinOp::Eq;
        let mut time = BytecodeExp::new();
        let mut t = CompileTimeValue::Int(0);
        if self.token == "," {
            let mut look = *input;
            if let Some(op) = BinOp::comparison(&next_token(&mut look)) {
                *input = look;
                compare = op;
                self.advance(input);
                t = self.expr_additive(&mut time, input)?;
            }
        }
        time.append_value(t);

        let Some(negate) = negate else {
            return Ok(CompileTimeValue::Bool(false));
        };
        out.append_exp(&element);
        out.append_op(OpCode::AnimElemTime);
        out.append_exp(&time);
        out.append_op(compare.opcode());
        if negate {
            out.append_op(OpCode::BlNot);
        }
        Ok(CompileTimeValue::Indeterminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_comparand_names() {
        for name in TRIGGERS.keys() {
            assert!(comparand(name).is_none(), "{name}");
        }
    }

    #[test]
    fn components() {
        let pos = TRIGGERS.get("pos").unwrap();
        assert_eq!(pos.op, Op::Base(OpCode::PosX));
        let TriggerForm::Component(axes) = pos.form else {
            panic!("pos should take an axis");
        };
        assert_eq!(axes.len(), 3);
        assert_eq!(TRIGGERS.get("numhelper").unwrap().form, TriggerForm::Optional(-1));
    }

    #[test]
    fn gethitvar_fields_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(GETHITVAR_FIELDS.iter().all(|f| seen.insert(*f)));
    }
}
