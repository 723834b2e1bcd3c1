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

//! The instruction set understood by the runtime.
//!
//! Opcodes are split into tiers. The base tier is a single byte. The `ex`, `ex2` and `const`
//! tiers are reached through a prefix byte followed by a one byte sub-opcode, which lets new
//! accessors be added without renumbering anything already written out by older compilers.
//! Numeric values are part of the on-disk contract: append only, never reorder.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum::{Display as StrumDisplay, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Base tier opcodes.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumIter,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum OpCode {
    // Jumps. Operands are forward byte counts measured from the end of the jump instruction.
    // The conditional forms test the top of the stack without popping it.
    Jmp8 = 0,
    Jz8,
    Jnz8,
    Jmp,
    Jz,
    Jnz,
    /// Evaluate the following region as an isolated sub-program which leaves exactly one value.
    Run,

    Int8,
    Int,
    Float,
    Bool,
    /// Push a string pool index.
    Str,

    Pop,
    Dup,
    Swap,

    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    BitNot,
    BitAnd,
    BitXor,
    BitOr,
    BlNot,
    BlAnd,
    BlXor,
    BlOr,
    IfElse,

    Abs,
    Acos,
    Asin,
    Atan,
    Ceil,
    Cos,
    Exp,
    Floor,
    Ln,
    Log,
    Sin,
    Tan,
    Min,
    Max,

    Var,
    FVar,
    SysVar,
    SysFVar,
    SetVar,
    SetFVar,
    SetSysVar,
    SetSysFVar,
    Local,
    SetLocal,

    // Redirections. Operand is the byte length of the redirected region that follows.
    Parent,
    Root,
    Helper,
    Target,
    Partner,
    Enemy,
    EnemyNear,
    PlayerId,
    P2,
    StateOwner,
    HelperIndex,

    // Statement level instructions produced by block lowering.
    Controller,
    Call,
    Loop,
    LoopCond,
    For,
    Break,
    Continue,
    Persist,

    // Base tier triggers.
    Time,
    Alive,
    Anim,
    AnimTime,
    AnimElemTime,
    AnimExist,
    SelfAnimExist,
    Ctrl,
    Life,
    LifeMax,
    Power,
    PowerMax,
    StateNo,
    PrevStateNo,
    MoveContact,
    MoveHit,
    MoveGuarded,
    MoveReversed,
    HitCount,
    UniqHitCount,
    HitShakeOver,
    HitOver,
    HitFall,
    CanRecover,
    RoundNo,
    RoundState,
    MatchNo,
    MatchOver,
    GameTime,
    NumEnemy,
    NumPartner,
    NumTarget,
    NumHelper,
    NumExplod,
    NumProjId,
    NumProj,
    Id,
    TeamSide,
    Random,
    Facing,
    FrontEdgeDist,
    BackEdgeDist,
    FrontEdgeBodyDist,
    BackEdgeBodyDist,
    PosX,
    PosY,
    VelX,
    VelY,
    ScreenPosX,
    ScreenPosY,
    P2DistX,
    P2DistY,
    P2BodyDistX,
    P2BodyDistY,
    ParentDistX,
    ParentDistY,
    RootDistX,
    RootDistY,
    CameraPosX,
    CameraPosY,
    HitVelX,
    HitVelY,
    StateType,
    MoveType,
    P2StateType,
    P2MoveType,
    Command,
    HitDefAttr,
    InGuardDist,
    IsHelper,
    IsHomeTeam,
    PalNo,
    ProjContactTime,
    ProjHitTime,
    ProjGuardedTime,
    AiLevel,
    P2Life,
    P2StateNo,

    Ex = 253,
    Ex2 = 254,
    Const = 255,
}

/// Second tier accessors, reached through [`OpCode::Ex`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumIter,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum ExOp {
    PosZ = 0,
    VelZ,
    Angle,
    ScaleX,
    ScaleY,
    XShear,
    DrawGame,
    Win,
    WinKo,
    WinTime,
    WinPerfect,
    Lose,
    LoseKo,
    LoseTime,
    TicksPerSecond,
    HitPauseTime,
    ReceivedDamage,
    ReceivedHits,
    ConsecutiveWins,
    GetHitVar,
    NameEq,
    AuthorNameEq,
    P1NameEq,
    P2NameEq,
    P3NameEq,
    P4NameEq,
    StageTime,
    GroundLevel,
    LayerNo,
    MemberNo,
    RoundsExisted,
}

/// Third tier accessors, reached through [`OpCode::Ex2`].
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumIter,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
pub enum Ex2Op {
    GuardPoints = 0,
    GuardPointsMax,
    DizzyPoints,
    DizzyPointsMax,
    RedLife,
    Score,
    ScoreTotal,
    Dizzy,
    GuardBreak,
    InCustomState,
    IsAsserted,
    RunOrder,
    FightTime,
    StandBy,
}

/// Character constant accessors, reached through [`OpCode::Const`]. The string form is the
/// dotted name used inside `const(...)`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumIter,
    EnumString,
    IntoStaticStr,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum ConstOp {
    #[strum(serialize = "data.life")]
    DataLife = 0,
    #[strum(serialize = "data.power")]
    DataPower,
    #[strum(serialize = "data.dizzypoints")]
    DataDizzyPoints,
    #[strum(serialize = "data.guardpoints")]
    DataGuardPoints,
    #[strum(serialize = "data.attack")]
    DataAttack,
    #[strum(serialize = "data.defence")]
    DataDefence,
    #[strum(serialize = "data.fall.defence_mul")]
    DataFallDefenceMul,
    #[strum(serialize = "data.liedown.time")]
    DataLieDownTime,
    #[strum(serialize = "data.airjuggle")]
    DataAirJuggle,
    #[strum(serialize = "data.sparkno")]
    DataSparkNo,
    #[strum(serialize = "data.guard.sparkno")]
    DataGuardSparkNo,
    #[strum(serialize = "data.ko.echo")]
    DataKoEcho,
    #[strum(serialize = "data.intpersistindex")]
    DataIntPersistIndex,
    #[strum(serialize = "data.floatpersistindex")]
    DataFloatPersistIndex,
    #[strum(serialize = "size.xscale")]
    SizeXScale,
    #[strum(serialize = "size.yscale")]
    SizeYScale,
    #[strum(serialize = "size.ground.back")]
    SizeGroundBack,
    #[strum(serialize = "size.ground.front")]
    SizeGroundFront,
    #[strum(serialize = "size.air.back")]
    SizeAirBack,
    #[strum(serialize = "size.air.front")]
    SizeAirFront,
    #[strum(serialize = "size.height")]
    SizeHeight,
    #[strum(serialize = "size.attack.dist")]
    SizeAttackDist,
    #[strum(serialize = "size.proj.attack.dist")]
    SizeProjAttackDist,
    #[strum(serialize = "size.proj.doscale")]
    SizeProjDoScale,
    #[strum(serialize = "size.head.pos.x")]
    SizeHeadPosX,
    #[strum(serialize = "size.head.pos.y")]
    SizeHeadPosY,
    #[strum(serialize = "size.mid.pos.x")]
    SizeMidPosX,
    #[strum(serialize = "size.mid.pos.y")]
    SizeMidPosY,
    #[strum(serialize = "size.shadowoffset")]
    SizeShadowOffset,
    #[strum(serialize = "size.draw.offset.x")]
    SizeDrawOffsetX,
    #[strum(serialize = "size.draw.offset.y")]
    SizeDrawOffsetY,
    #[strum(serialize = "velocity.walk.fwd.x")]
    VelocityWalkFwdX,
    #[strum(serialize = "velocity.walk.back.x")]
    VelocityWalkBackX,
    #[strum(serialize = "velocity.run.fwd.x")]
    VelocityRunFwdX,
    #[strum(serialize = "velocity.run.fwd.y")]
    VelocityRunFwdY,
    #[strum(serialize = "velocity.run.back.x")]
    VelocityRunBackX,
    #[strum(serialize = "velocity.run.back.y")]
    VelocityRunBackY,
    #[strum(serialize = "velocity.jump.y")]
    VelocityJumpY,
    #[strum(serialize = "velocity.jump.neu.x")]
    VelocityJumpNeuX,
    #[strum(serialize = "velocity.jump.back.x")]
    VelocityJumpBackX,
    #[strum(serialize = "velocity.jump.fwd.x")]
    VelocityJumpFwdX,
    #[strum(serialize = "velocity.runjump.back.x")]
    VelocityRunJumpBackX,
    #[strum(serialize = "velocity.runjump.fwd.x")]
    VelocityRunJumpFwdX,
    #[strum(serialize = "velocity.airjump.y")]
    VelocityAirJumpY,
    #[strum(serialize = "velocity.airjump.neu.x")]
    VelocityAirJumpNeuX,
    #[strum(serialize = "velocity.airjump.back.x")]
    VelocityAirJumpBackX,
    #[strum(serialize = "velocity.airjump.fwd.x")]
    VelocityAirJumpFwdX,
    #[strum(serialize = "movement.airjump.num")]
    MovementAirJumpNum,
    #[strum(serialize = "movement.airjump.height")]
    MovementAirJumpHeight,
    #[strum(serialize = "movement.yaccel")]
    MovementYAccel,
    #[strum(serialize = "movement.stand.friction")]
    MovementStandFriction,
    #[strum(serialize = "movement.crouch.friction")]
    MovementCrouchFriction,
}

/// An opcode of any tier. This is what the compiler emits; the tier prefix is an encoding
/// detail handled by [`crate::BytecodeExp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Base(OpCode),
    Ex(ExOp),
    Ex2(Ex2Op),
    Const(ConstOp),
}

impl From<OpCode> for Op {
    fn from(value: OpCode) -> Self {
        Op::Base(value)
    }
}

impl From<ExOp> for Op {
    fn from(value: ExOp) -> Self {
        Op::Ex(value)
    }
}

impl From<Ex2Op> for Op {
    fn from(value: Ex2Op) -> Self {
        Op::Ex2(value)
    }
}

impl From<ConstOp> for Op {
    fn from(value: ConstOp) -> Self {
        Op::Const(value)
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Base(op) => write!(f, "{op}"),
            Op::Ex(op) => write!(f, "ex.{op}"),
            Op::Ex2(op) => write!(f, "ex2.{op}"),
            Op::Const(op) => write!(f, "const({op})"),
        }
    }
}

/// How the bytes following an opcode are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandLayout {
    None,
    I8,
    U8,
    I32,
    F32,
    /// A local slot followed by a region length (`for`).
    U8I32,
    /// A counter slot followed by a region length (`persist`).
    I32I32,
    /// Function id, argument count, return count (`call`).
    Call,
    /// One byte naming an opcode of the next tier.
    SubOp,
}

impl OperandLayout {
    pub fn width(self) -> usize {
        match self {
            OperandLayout::None => 0,
            OperandLayout::I8 | OperandLayout::U8 | OperandLayout::SubOp => 1,
            OperandLayout::I32 | OperandLayout::F32 => 4,
            OperandLayout::U8I32 => 5,
            OperandLayout::Call => 6,
            OperandLayout::I32I32 => 8,
        }
    }
}

impl OpCode {
    pub fn operand_layout(self) -> OperandLayout {
        use OpCode::*;
        match self {
            Jmp8 | Jz8 | Jnz8 | Bool | Local | SetLocal => OperandLayout::U8,
            Int8 => OperandLayout::I8,
            Jmp | Jz | Jnz | Run | Int | Str | Controller | Loop => OperandLayout::I32,
            Parent | Root | Helper | Target | Partner | Enemy | EnemyNear | PlayerId | P2
            | StateOwner | HelperIndex => OperandLayout::I32,
            Float => OperandLayout::F32,
            For => OperandLayout::U8I32,
            Persist => OperandLayout::I32I32,
            Call => OperandLayout::Call,
            Ex | Ex2 | Const => OperandLayout::SubOp,
            _ => OperandLayout::None,
        }
    }

    /// Number of redirection arguments popped by a redirection opcode, `None` for anything
    /// else. The compiler always pushes the full argument count, substituting defaults.
    pub fn redirect_args(self) -> Option<u8> {
        use OpCode::*;
        match self {
            Parent | Root | P2 | StateOwner => Some(0),
            PlayerId | HelperIndex | Partner | Enemy | EnemyNear => Some(1),
            Helper | Target => Some(2),
            _ => None,
        }
    }

    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jmp8 | OpCode::Jz8 | OpCode::Jnz8 | OpCode::Jmp | OpCode::Jz | OpCode::Jnz
        )
    }
}

impl Op {
    /// `(pops, pushes)` for value-producing instructions. Instructions whose effect depends on
    /// their operands (`call`, redirections) are resolved by [`crate::Instruction`].
    pub fn stack_effect(self) -> (u8, u8) {
        match self {
            Op::Base(op) => base_stack_effect(op),
            Op::Ex(op) => match op {
                ExOp::GetHitVar
                | ExOp::NameEq
                | ExOp::AuthorNameEq
                | ExOp::P1NameEq
                | ExOp::P2NameEq
                | ExOp::P3NameEq
                | ExOp::P4NameEq => (1, 1),
                _ => (0, 1),
            },
            Op::Ex2(op) => match op {
                Ex2Op::IsAsserted => (1, 1),
                _ => (0, 1),
            },
            Op::Const(_) => (0, 1),
        }
    }
}

fn base_stack_effect(op: OpCode) -> (u8, u8) {
    use OpCode::*;
    match op {
        Jmp8 | Jz8 | Jnz8 | Jmp | Jz | Jnz | Run => (0, 0),
        Int8 | Int | Float | Bool | Str | Local => (0, 1),
        Pop => (1, 0),
        Dup => (1, 2),
        Swap => (2, 2),
        Neg | BitNot | BlNot => (1, 1),
        Add | Sub | Mul | Div | Mod | Pow | Eq | Ne | Gt | Ge | Lt | Le | BitAnd | BitXor
        | BitOr | BlAnd | BlXor | BlOr => (2, 1),
        IfElse => (3, 1),
        Abs | Acos | Asin | Atan | Ceil | Cos | Exp | Floor | Ln | Sin | Tan => (1, 1),
        Log | Min | Max => (2, 1),
        Var | FVar | SysVar | SysFVar | SetLocal => (1, 1),
        SetVar | SetFVar | SetSysVar | SetSysFVar => (2, 1),
        Parent | Root | Helper | Target | Partner | Enemy | EnemyNear | PlayerId | P2
        | StateOwner | HelperIndex => (op.redirect_args().unwrap_or(0), 0),
        Controller | Loop | Break | Continue | Persist | Call => (0, 0),
        LoopCond => (1, 0),
        For => (3, 0),
        AnimElemTime | AnimExist | SelfAnimExist | NumTarget | NumHelper | NumExplod
        | NumProjId | StateType | MoveType | P2StateType | P2MoveType | Command | HitDefAttr
        | IsHelper | ProjContactTime | ProjHitTime | ProjGuardedTime => (1, 1),
        Ex | Ex2 | Const => (0, 0),
        _ => (0, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn base_tier_stays_below_prefixes() {
        for op in OpCode::iter() {
            if matches!(op, OpCode::Ex | OpCode::Ex2 | OpCode::Const) {
                continue;
            }
            assert!((op as u8) < OpCode::Ex as u8, "{op} collides with a tier prefix");
        }
    }

    #[test]
    fn repr_round_trips() {
        for op in OpCode::iter() {
            assert_eq!(OpCode::from_repr(op as u8), Some(op));
        }
        for op in ConstOp::iter() {
            assert_eq!(ConstOp::from_repr(op as u8), Some(op));
        }
    }

    #[test]
    fn const_names_parse() {
        use std::str::FromStr;
        assert_eq!(
            ConstOp::from_str("velocity.walk.fwd.x").unwrap(),
            ConstOp::VelocityWalkFwdX
        );
        assert_eq!(ConstOp::DataLife.to_string(), "data.life");
    }
}
