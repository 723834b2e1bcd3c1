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

//! The closed set of state controller kinds and the parameters each one accepts.
//!
//! A parameter's id is its index in [`ControllerKind::params`]. Like opcodes, the tables are
//! append only once content has been compiled against them.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use strum::{Display, EnumCount, EnumIter, EnumString};

use crate::exp::BytecodeExp;

/// How the value text of a parameter is compiled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    /// Between `min` and `max` comma separated expressions.
    Exprs { min: u8, max: u8 },
    /// A quoted string, interned in the actor's string pool.
    Text,
    /// Hit flag letters such as `MAF`, with the `+`/`-` modifiers.
    HitFlags,
    /// Hit attribute, `SCA, NA, SP` style.
    Attr,
    StateType,
    MoveType,
    Physics,
    /// One of the assertable engine flags.
    AssertFlags,
    /// One word out of a fixed list; compiles to the index of the word.
    Keyword(&'static [&'static str]),
    /// An animation or sound reference with an optional `F` (common) or `S` (own) prefix,
    /// followed by up to `max` expressions.
    Resource { max: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    /// The arity bounds of an expression-list parameter.
    pub fn arity(&self) -> (u8, u8) {
        match self.kind {
            ParamKind::Exprs { min, max } => (min, max),
            ParamKind::Resource { max } => (1, max),
            _ => (1, 1),
        }
    }
}

const fn e(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Exprs { min: 1, max: 1 })
}

const fn n(name: &'static str, max: u8) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Exprs { min: 1, max })
}

const fn text(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Text)
}

const fn kw(name: &'static str, words: &'static [&'static str]) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Keyword(words))
}

const fn anim(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Resource { max: 1 })
}

const fn sound(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Resource { max: 2 })
}

const fn attr(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::Attr)
}

const fn flags(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::HitFlags)
}

const fn assert_flags(name: &'static str) -> ParamSpec {
    ParamSpec::new(name, ParamKind::AssertFlags)
}

pub const TRANS: &[&str] = &["default", "none", "add", "addalpha", "add1", "sub"];
pub const POSTYPE: &[&str] = &["p1", "p2", "front", "back", "left", "right", "none"];
pub const HIT_ANIM_TYPE: &[&str] = &["light", "medium", "hard", "back", "up", "diagup"];
pub const HIT_TYPE: &[&str] = &["high", "low", "trip", "none"];
pub const TEAM: &[&str] = &["enemy", "friend", "both"];
pub const HELPER_TYPE: &[&str] = &["normal", "player", "projectile"];
pub const WAVEFORM: &[&str] = &["sine", "square", "sinesquare", "off"];
pub const SPACE: &[&str] = &["stage", "screen"];

/// Engine flags accepted by `AssertSpecial` and friends, in bit order.
pub const ASSERT_FLAGS: &[&str] = &[
    "intro",
    "invisible",
    "roundnotover",
    "nobardisplay",
    "nobg",
    "nofg",
    "nostandguard",
    "nocrouchguard",
    "noairguard",
    "noautoturn",
    "nojugglecheck",
    "nokosnd",
    "nokoslow",
    "noshadow",
    "globalnoshadow",
    "nomusic",
    "nowalk",
    "timerfreeze",
    "unguardable",
    "nokovelocity",
    "noailevel",
    "nointroreset",
    "immovable",
    "animatehitpause",
    "nofacep2",
    "postroundinput",
    "skipfightdisplay",
    "skipkodisplay",
    "skiprounddisplay",
    "skipwindisplay",
];

const VAR_PARAMS: &[ParamSpec] = &[
    e("v"),
    e("fv"),
    e("sysvar"),
    e("sysfvar"),
    e("value"),
];

const PALFX_PARAMS: &[ParamSpec] = &[
    e("time"),
    n("add", 3),
    n("mul", 3),
    n("sinadd", 4),
    e("invertall"),
    e("color"),
    n("sinmul", 4),
    n("sincolor", 2),
    n("sinhue", 2),
    e("hue"),
];

const EXPLOD_PARAMS: &[ParamSpec] = &[
    anim("anim"),
    e("id"),
    n("pos", 3),
    kw("postype", POSTYPE),
    kw("space", SPACE),
    e("facing"),
    e("vfacing"),
    e("bindtime"),
    n("vel", 3),
    n("accel", 3),
    n("random", 3),
    e("removetime"),
    e("supermove"),
    e("supermovetime"),
    e("pausemovetime"),
    n("scale", 2),
    e("sprpriority"),
    e("ontop"),
    n("shadow", 3),
    e("ownpal"),
    e("removeongethit"),
    e("ignorehitpause"),
    kw("trans", TRANS),
    n("alpha", 2),
    e("angle"),
    e("xangle"),
    e("yangle"),
    e("animelem"),
    n("bindid", 1),
    e("under"),
];

const HITDEF_PARAMS: &[ParamSpec] = &[
    attr("attr"),
    flags("hitflag"),
    flags("guardflag"),
    kw("affectteam", TEAM),
    kw("animtype", HIT_ANIM_TYPE),
    kw("air.animtype", HIT_ANIM_TYPE),
    kw("fall.animtype", HIT_ANIM_TYPE),
    n("priority", 2),
    n("damage", 2),
    n("pausetime", 2),
    n("guard.pausetime", 2),
    anim("sparkno"),
    anim("guard.sparkno"),
    n("sparkxy", 2),
    sound("hitsound"),
    sound("guardsound"),
    kw("ground.type", HIT_TYPE),
    kw("air.type", HIT_TYPE),
    e("ground.slidetime"),
    e("guard.slidetime"),
    e("ground.hittime"),
    e("guard.hittime"),
    e("air.hittime"),
    e("guard.ctrltime"),
    e("guard.dist"),
    e("yaccel"),
    n("ground.velocity", 2),
    e("guard.velocity"),
    n("air.velocity", 2),
    n("airguard.velocity", 2),
    e("ground.cornerpush.veloff"),
    e("air.cornerpush.veloff"),
    e("down.cornerpush.veloff"),
    e("guard.cornerpush.veloff"),
    e("airguard.cornerpush.veloff"),
    e("airguard.ctrltime"),
    e("air.juggle"),
    n("mindist", 2),
    n("maxdist", 2),
    n("snap", 2),
    e("p1sprpriority"),
    e("p2sprpriority"),
    e("p1facing"),
    e("p1getp2facing"),
    e("p2facing"),
    e("p1stateno"),
    e("p2stateno"),
    e("p2getp1state"),
    e("forcestand"),
    e("fall"),
    e("fall.xvelocity"),
    e("fall.yvelocity"),
    e("fall.recover"),
    e("fall.recovertime"),
    e("fall.damage"),
    e("air.fall"),
    e("forcenofall"),
    n("down.velocity", 2),
    e("down.hittime"),
    e("down.bounce"),
    e("id"),
    e("chainid"),
    n("nochainid", 2),
    e("hitonce"),
    e("kill"),
    e("guard.kill"),
    e("fall.kill"),
    e("numhits"),
    n("getpower", 2),
    n("givepower", 2),
    e("palfx.time"),
    n("palfx.mul", 3),
    n("palfx.add", 3),
    e("envshake.time"),
    e("envshake.freq"),
    e("envshake.ampl"),
    e("envshake.phase"),
    e("fall.envshake.time"),
    e("fall.envshake.freq"),
    e("fall.envshake.ampl"),
    e("fall.envshake.phase"),
    n("dizzypoints", 1),
    n("guardpoints", 1),
    n("redlife", 1),
    e("score"),
];

macro_rules! controllers {
    ( $( $(#[$meta:meta])* $kind:ident => $params:expr ),* $(,)? ) => {
        /// Every state controller kind the compiler can build.
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display,
            EnumString, EnumIter, EnumCount, Serialize,
        )]
        #[strum(serialize_all = "lowercase", ascii_case_insensitive)]
        pub enum ControllerKind {
            $( $(#[$meta])* $kind, )*
        }

        impl ControllerKind {
            /// The parameters this kind accepts, indexed by parameter id.
            pub fn params(self) -> &'static [ParamSpec] {
                match self {
                    $( ControllerKind::$kind => {
                        const PARAMS: &[ParamSpec] = $params;
                        PARAMS
                    } )*
                }
            }
        }
    };
}

controllers! {
    AfterImage => &[
        e("time"), e("length"), e("palcolor"), e("palinvertall"), n("palbright", 3),
        n("palcontrast", 3), n("palpostbright", 3), n("paladd", 3), n("palmul", 3),
        e("timegap"), e("framegap"), kw("trans", TRANS),
    ],
    AfterImageTime => &[e("time").required()],
    AllPalFx => PALFX_PARAMS,
    AngleAdd => &[e("value").required()],
    AngleDraw => &[e("value"), n("scale", 2)],
    AngleMul => &[e("value").required()],
    AngleSet => &[e("value").required()],
    AppendToClipboard => &[text("text").required(), ParamSpec::new("params", ParamKind::Exprs { min: 0, max: 32 })],
    AssertCommand => &[text("name").required(), e("buffertime")],
    AssertInput => &[assert_flags("flag").required(), assert_flags("flag2"), assert_flags("flag3")],
    AssertSpecial => &[assert_flags("flag").required(), assert_flags("flag2"), assert_flags("flag3")],
    AttackDist => &[n("value", 2).required()],
    AttackMulSet => &[e("value").required()],
    BgPalFx => PALFX_PARAMS,
    BindToParent => &[e("time"), e("facing"), n("pos", 3)],
    BindToRoot => &[e("time"), e("facing"), n("pos", 3)],
    BindToTarget => &[e("time"), e("id"), n("pos", 3)],
    CameraCtrl => &[n("view", 2), n("pos", 2), e("followid")],
    ChangeAnim => &[anim("value").required(), e("elem"), e("elemtime"), e("animplayerno")],
    ChangeAnim2 => &[anim("value").required(), e("elem"), e("elemtime")],
    ChangeState => &[e("value").required(), e("ctrl"), anim("anim")],
    ClearClipboard => &[],
    CtrlSet => &[e("value").required()],
    DefenceMulSet => &[e("value").required(), e("onhit"), e("multype")],
    Depth => &[n("edge", 2), n("player", 2), n("value", 2)],
    DestroySelf => &[e("recursive"), e("removeexplods")],
    DisplayToClipboard => &[text("text").required(), ParamSpec::new("params", ParamKind::Exprs { min: 0, max: 32 })],
    DizzyPointsAdd => &[e("value").required(), e("absolute")],
    DizzyPointsSet => &[e("value").required()],
    DizzySet => &[e("value").required()],
    EnvColor => &[n("value", 3), e("time"), e("under")],
    EnvShake => &[e("time").required(), e("freq"), e("ampl"), e("phase"), e("mul"), e("dir")],
    Explod => EXPLOD_PARAMS,
    ExplodBindTime => &[e("id"), e("time")],
    FallEnvShake => &[],
    ForceFeedback => &[kw("waveform", WAVEFORM), e("time"), n("freq", 4), n("ampl", 4), e("self")],
    GameMakeAnim => &[anim("value"), e("under"), n("pos", 2), e("random")],
    GetHitVarSet => &[
        e("airtype"), e("animtype"), e("attr"), e("chainid"), e("ctrltime"), e("damage"),
        e("dizzypoints"), e("down.recover"), e("down.recovertime"), e("fall"), e("fall.damage"),
        e("fall.envshake.ampl"), e("fall.envshake.freq"), e("fall.envshake.phase"),
        e("fall.envshake.time"), e("fall.kill"), e("fall.recover"), e("fall.recovertime"),
        e("fall.xvel"), e("fall.yvel"), e("fallcount"), e("groundtype"), e("guarded"),
        e("guardpoints"), e("hitcount"), e("hitshaketime"), e("hittime"), e("id"), e("playerno"),
        e("redlife"), e("slidetime"), e("xvel"), e("yaccel"), e("yvel"),
    ],
    Gravity => &[],
    GroundLevelOffset => &[e("value").required()],
    GuardBreakSet => &[e("value").required()],
    GuardPointsAdd => &[e("value").required(), e("absolute")],
    GuardPointsSet => &[e("value").required()],
    Helper => &[
        kw("helpertype", HELPER_TYPE), text("name"), e("id"), n("pos", 3), kw("postype", POSTYPE),
        e("facing"), e("stateno"), e("keyctrl"), e("ownpal"), e("supermovetime"),
        e("pausemovetime"), e("size.xscale"), e("size.yscale"), e("size.ground.back"),
        e("size.ground.front"), e("size.air.back"), e("size.air.front"), e("size.height"),
        e("size.proj.doscale"), n("size.head.pos", 2), n("size.mid.pos", 2),
        e("size.shadowoffset"), e("inheritjuggle"), e("immortal"),
    ],
    HitAdd => &[e("value").required()],
    HitBy => &[attr("value"), attr("value2"), e("time")],
    HitDef => HITDEF_PARAMS,
    HitFallDamage => &[],
    HitFallSet => &[e("value"), e("xvel"), e("yvel")],
    HitFallVel => &[],
    HitOverride => &[attr("attr").required(), e("slot"), e("stateno").required(), e("time"), e("forceair")],
    HitScaleSet => &[e("affects"), e("mul"), e("add"), e("addtype"), e("min"), e("max"), e("time")],
    HitVelSet => &[e("x"), e("y")],
    LifeAdd => &[e("value").required(), e("kill"), e("absolute")],
    LifeSet => &[e("value").required()],
    LifebarAction => &[e("top"), e("time"), e("timemul"), anim("anim"), sound("snd"), text("text")],
    LoadFile => &[text("path").required(), kw("savedata", &["map", "var", "fvar"])],
    MakeDust => &[n("pos", 2), n("pos2", 2), e("spacing")],
    MapAdd => &[text("map").required(), e("value").required()],
    MapSet => &[text("map").required(), e("value").required()],
    MatchRestart => &[e("reload"), text("stagedef"), text("p1def"), text("p2def")],
    ModifyBgCtrl => &[e("id").required(), e("time"), n("value", 3), n("x", 2), n("y", 2)],
    ModifyBgm => &[e("volume"), e("loopstart"), e("loopend"), e("position"), e("freqmul")],
    ModifyExplod => EXPLOD_PARAMS,
    ModifyHitDef => HITDEF_PARAMS,
    ModifyPlayer => &[e("lifemax"), e("powermax"), e("dizzypointsmax"), e("guardpointsmax"), text("displayname")],
    ModifyProjectile => &[e("projid"), e("id"), n("velocity", 2), n("accel", 2), e("projremove")],
    ModifyReflection => &[n("offset", 2), n("scale", 2), e("yshear"), e("angle"), e("color")],
    ModifyReversalDef => &[attr("reversal.attr"), n("pausetime", 2), anim("sparkno"), sound("hitsound"), e("p1stateno"), e("p2stateno")],
    ModifyShadow => &[n("offset", 2), n("scale", 2), e("yshear"), e("angle"), e("color"), e("intensity")],
    ModifySnd => &[e("channel").required(), e("volume"), e("pan"), e("freqmul"), e("priority")],
    ModifyStageBg => &[e("id").required(), n("pos", 2), n("vel", 2), e("visible")],
    ModifyStageVar => &[e("camera.boundleft"), e("camera.boundright"), e("camera.boundhigh"), e("camera.boundlow"), e("playerinfo.leftbound"), e("playerinfo.rightbound")],
    MoveHitReset => &[],
    MoveHitSet => &[e("movehit"), e("moveguarded"), e("movereversed"), e("movecontact")],
    NotHitBy => &[attr("value"), attr("value2"), e("time")],
    #[default]
    Null => &[],
    Offset => &[e("x"), e("y")],
    PalFx => PALFX_PARAMS,
    ParentMapAdd => &[text("map").required(), e("value").required()],
    ParentMapSet => &[text("map").required(), e("value").required()],
    ParentVarAdd => VAR_PARAMS,
    ParentVarSet => VAR_PARAMS,
    Pause => &[e("time").required(), e("endcmdbuftime"), e("movetime"), e("pausebg")],
    PlayBgm => &[text("bgm"), e("volume"), e("loop"), e("loopstart"), e("loopend")],
    PlayerPush => &[e("value").required(), e("priority")],
    PlaySnd => &[
        sound("value").required(), e("volume"), e("volumescale"), e("channel"), e("lowpriority"),
        e("freqmul"), e("loop"), e("pan"), e("abspan"), e("priority"),
    ],
    PosAdd => &[e("x"), e("y"), e("z")],
    PosFreeze => &[e("value")],
    PosSet => &[e("x"), e("y"), e("z")],
    PowerAdd => &[e("value").required()],
    PowerSet => &[e("value").required()],
    PrintToConsole => &[text("text").required(), ParamSpec::new("params", ParamKind::Exprs { min: 0, max: 32 })],
    Projectile => &[
        e("projid"), anim("projanim"), anim("projhitanim"), anim("projremanim"),
        anim("projcancelanim"), n("projscale", 2), e("projremove"), e("projremovetime"),
        n("velocity", 2), n("remvelocity", 2), n("accel", 2), n("velmul", 2), e("projhits"),
        e("projmisstime"), e("projpriority"), e("projsprpriority"), e("projedgebound"),
        e("projstagebound"), n("projheightbound", 2), n("offset", 2), kw("postype", POSTYPE),
        n("projshadow", 3), e("supermovetime"), e("pausemovetime"), e("afterimage.time"),
        e("afterimage.length"), attr("attr"), flags("hitflag"), flags("guardflag"),
        n("damage", 2), n("pausetime", 2), anim("sparkno"), sound("hitsound"),
        kw("animtype", HIT_ANIM_TYPE), kw("ground.type", HIT_TYPE), n("ground.velocity", 2),
        n("air.velocity", 2), e("ground.hittime"), e("ground.slidetime"), e("fall"),
        e("p2stateno"), n("getpower", 2), n("givepower", 2),
    ],
    RedLifeAdd => &[e("value").required(), e("absolute")],
    RedLifeSet => &[e("value").required()],
    RemapPal => &[n("source", 2), n("dest", 2)],
    RemapSprite => &[e("reset"), n("preset", 2), n("source", 2), n("dest", 2)],
    RemoveExplod => &[e("id")],
    ReversalDef => &[attr("reversal.attr").required(), n("pausetime", 2), anim("sparkno"), sound("hitsound"), e("p1stateno"), e("p2stateno")],
    RootMapAdd => &[text("map").required(), e("value").required()],
    RootMapSet => &[text("map").required(), e("value").required()],
    RoundTimeAdd => &[e("value").required()],
    RoundTimeSet => &[e("value").required()],
    SaveFile => &[text("path").required(), kw("savedata", &["map", "var", "fvar"])],
    ScoreAdd => &[e("value").required()],
    ScreenBound => &[e("value"), n("movecamera", 2), e("stagebound")],
    SelfState => &[e("value").required(), e("ctrl"), anim("anim")],
    ShiftInput => &[e("input"), e("output")],
    SndPan => &[e("channel").required(), e("pan"), e("abspan")],
    SprPriority => &[e("value")],
    StateTypeSet => &[
        ParamSpec::new("statetype", ParamKind::StateType),
        ParamSpec::new("movetype", ParamKind::MoveType),
        ParamSpec::new("physics", ParamKind::Physics),
    ],
    StopSnd => &[e("channel").required()],
    SuperPause => &[
        e("time"), anim("anim"), sound("sound"), n("pos", 2), e("darken"), e("p2defmul"),
        e("poweradd"), e("unhittable"), e("endcmdbuftime"), e("movetime"), e("pausebg"),
    ],
    TagIn => &[e("stateno"), e("partnerstateno"), e("self"), e("partner"), e("ctrl"), e("partnerctrl")],
    TagOut => &[e("self"), e("partner"), e("stateno"), e("partnerstateno")],
    TargetAdd => &[e("id").required()],
    TargetBind => &[e("time"), e("id"), n("pos", 2)],
    TargetDizzyPointsAdd => &[e("value").required(), e("id"), e("absolute")],
    TargetDrop => &[e("excludeid"), e("keepone")],
    TargetFacing => &[e("value").required(), e("id")],
    TargetGuardPointsAdd => &[e("value").required(), e("id"), e("absolute")],
    TargetLifeAdd => &[e("value").required(), e("id"), e("kill"), e("absolute")],
    TargetPowerAdd => &[e("value").required(), e("id")],
    TargetRedLifeAdd => &[e("value").required(), e("id"), e("absolute")],
    TargetScoreAdd => &[e("value").required(), e("id")],
    TargetState => &[e("value").required(), e("id")],
    TargetVelAdd => &[e("x"), e("y"), e("id")],
    TargetVelSet => &[e("x"), e("y"), e("id")],
    TeamMapAdd => &[text("map").required(), e("value").required()],
    TeamMapSet => &[text("map").required(), e("value").required()],
    Text => &[text("text").required(), e("id"), e("removetime"), n("pos", 2), e("layerno"), n("scale", 2), n("font", 2), n("color", 3), e("align")],
    Trans => &[kw("trans", TRANS).required(), n("alpha", 2)],
    TransformClsn => &[n("scale", 2), e("angle")],
    TransformSprite => &[n("window", 4), e("xshear"), e("focallength"), e("projection")],
    Turn => &[],
    VarAdd => VAR_PARAMS,
    VarRandom => &[e("v").required(), n("range", 2)],
    VarRangeSet => &[e("value"), e("fvalue"), e("first"), e("last")],
    VarSet => VAR_PARAMS,
    VelAdd => &[e("x"), e("y"), e("z")],
    VelMul => &[e("x"), e("y"), e("z")],
    VelSet => &[e("x"), e("y"), e("z")],
    VictoryQuote => &[e("value")],
    Width => &[n("edge", 2), n("player", 2), n("value", 2)],
    Zoom => &[n("pos", 2), e("scale"), e("lag"), e("camerabound"), e("stagebound"), e("time")],
    /// The properties of a `[Statedef]` header. Not nameable from a `type` key.
    StateDef => &[
        anim("anim"), n("velset", 3), e("ctrl"), e("poweradd"), e("juggle"), e("facep2"),
        e("hitdefpersist"), e("movehitpersist"), e("hitcountpersist"), e("sprpriority"),
    ],
}

impl ControllerKind {
    /// Resolve the value of a `type` key.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match ControllerKind::from_str(name.trim()) {
            Ok(ControllerKind::StateDef) | Err(_) => None,
            Ok(kind) => Some(kind),
        }
    }

    /// Parameter id and spec for a key name.
    pub fn param(self, name: &str) -> Option<(u8, &'static ParamSpec)> {
        self.params()
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .map(|(i, p)| (i as u8, p))
    }

    /// Whether the controller accepts the `var(N) = value` key form.
    pub fn takes_var_keys(self) -> bool {
        matches!(
            self,
            ControllerKind::VarSet
                | ControllerKind::VarAdd
                | ControllerKind::ParentVarSet
                | ControllerKind::ParentVarAdd
        )
    }

    /// The first required parameter missing from `params`, if any.
    pub fn missing_required(self, params: &BTreeMap<u8, Vec<BytecodeExp>>) -> Option<&'static str> {
        if self.takes_var_keys() {
            let value = self.param("value").map(|(id, _)| id);
            return match value {
                Some(id) if params.contains_key(&id) => None,
                _ => Some("value"),
            };
        }
        self.params()
            .iter()
            .enumerate()
            .find(|(i, p)| p.required && !params.contains_key(&(*i as u8)))
            .map(|(_, p)| p.name)
    }
}

/// A state controller ready for the runtime: its kind and the bytecode of every parameter it
/// was given, keyed by parameter id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StateController {
    pub kind: ControllerKind,
    pub params: BTreeMap<u8, Vec<BytecodeExp>>,
    pub ignore_hit_pause: bool,
}

impl StateController {
    /// Build a controller of `kind`, checking that every required parameter was supplied.
    pub fn build(
        kind: ControllerKind,
        params: BTreeMap<u8, Vec<BytecodeExp>>,
        ignore_hit_pause: bool,
    ) -> Result<Self, &'static str> {
        if let Some(missing) = kind.missing_required(&params) {
            return Err(missing);
        }
        Ok(Self {
            kind,
            params,
            ignore_hit_pause,
        })
    }

    /// A controller that never runs, left in place so controller indices stay stable.
    pub fn inert(kind: ControllerKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
            ignore_hit_pause: false,
        }
    }

    pub fn param(&self, name: &str) -> Option<&[BytecodeExp]> {
        let (id, _) = self.kind.param(name)?;
        self.params.get(&id).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn type_names_are_case_insensitive() {
        assert_eq!(
            ControllerKind::from_type_name("ChangeState"),
            Some(ControllerKind::ChangeState)
        );
        assert_eq!(
            ControllerKind::from_type_name("changestate"),
            Some(ControllerKind::ChangeState)
        );
        assert_eq!(ControllerKind::from_type_name("NULL"), Some(ControllerKind::Null));
        assert_eq!(ControllerKind::from_type_name("StateDef"), None);
        assert_eq!(ControllerKind::from_type_name("NoSuchThing"), None);
    }

    #[test]
    fn registry_size() {
        assert!(ControllerKind::COUNT >= 140);
    }

    #[test]
    fn param_names_are_unique_per_kind() {
        for kind in ControllerKind::iter() {
            let params = kind.params();
            assert!(params.len() < u8::MAX as usize);
            for (i, p) in params.iter().enumerate() {
                assert!(
                    params[i + 1..].iter().all(|q| q.name != p.name),
                    "{kind}: duplicate parameter {}",
                    p.name
                );
            }
        }
    }

    #[test]
    fn required_params_are_checked() {
        assert_eq!(
            StateController::build(ControllerKind::ChangeState, BTreeMap::new(), false),
            Err("value")
        );
        let mut params = BTreeMap::new();
        params.insert(0, vec![BytecodeExp::new()]);
        assert!(StateController::build(ControllerKind::ChangeState, params, false).is_ok());
        assert!(StateController::build(ControllerKind::Null, BTreeMap::new(), false).is_ok());
    }
}
