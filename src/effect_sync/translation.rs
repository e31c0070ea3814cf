//! Mapping of fan-out effects onto whatever a device can actually do.
//!
//! [`plan`] is a pure function of the incoming effect, its parameters and the
//! method arities bound on the target surface.

use std::collections::BTreeMap;

use crate::capability::Value;

/// Colour used when the source effect carries none.
pub const FALLBACK_COLOUR: [u8; 3] = [0x00, 0xFF, 0x00];

/// A call the synchronizer should make on the target device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub method: String,
    pub params: Vec<Value>,
}

impl PlannedCall {
    fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Args {
    Empty,
    Forward,
    FirstColour,
    Fallback,
    Flag(bool),
}

impl Args {
    fn build(&self, source: &[Value]) -> Vec<Value> {
        match self {
            Self::Empty => Vec::new(),
            Self::Forward => source.to_vec(),
            Self::FirstColour => source.iter().take(3).cloned().collect(),
            Self::Fallback => colour(FALLBACK_COLOUR),
            Self::Flag(flag) => vec![Value::Bool(*flag)],
        }
    }
}

struct Step {
    method: &'static str,
    args: Args,
}

const fn step(method: &'static str, args: Args) -> Step {
    Step { method, args }
}

struct Rule {
    effect: &'static str,
    activate: bool,
    steps: &'static [Step],
}

const ACTIVATE: &[Step] = &[
    step("setScrollActive", Args::Flag(true)),
    step("setLogoActive", Args::Flag(true)),
    step("setBacklightActive", Args::Flag(true)),
];

const BREATH_STEPS: &[Step] = &[
    step("setPulsate", Args::Empty),
    step("setScrollPulsate", Args::FirstColour),
    step("setLogoPulsate", Args::FirstColour),
    step("setBacklightPulsate", Args::FirstColour),
];

const RULES: &[Rule] = &[
    Rule {
        effect: "setPulsate",
        activate: true,
        steps: &[
            step("setBreathSingle", Args::Fallback),
            step("setScrollPulsate", Args::Fallback),
            step("setLogoPulsate", Args::Fallback),
            step("setBacklightPulsate", Args::Fallback),
        ],
    },
    Rule {
        effect: "setBreathSingle",
        activate: true,
        steps: BREATH_STEPS,
    },
    Rule {
        effect: "setBreathDual",
        activate: true,
        steps: BREATH_STEPS,
    },
    Rule {
        effect: "setBreathRandom",
        activate: true,
        steps: &[
            step("setPulsate", Args::Empty),
            step("setScrollPulsate", Args::Fallback),
            step("setLogoPulsate", Args::Fallback),
            step("setBacklightPulsate", Args::Fallback),
        ],
    },
    Rule {
        effect: "setNone",
        activate: false,
        steps: &[
            step("setScrollActive", Args::Flag(false)),
            step("setLogoActive", Args::Flag(false)),
            step("setBacklightActive", Args::Flag(false)),
        ],
    },
    Rule {
        effect: "setSpectrum",
        activate: true,
        steps: &[
            step("setScrollSpectrum", Args::Empty),
            step("setLogoSpectrum", Args::Empty),
            step("setBacklightSpectrum", Args::Empty),
        ],
    },
    Rule {
        effect: "setStatic",
        activate: true,
        steps: &[
            step("setScrollStatic", Args::Forward),
            step("setLogoStatic", Args::Forward),
            step("setBacklightStatic", Args::Forward),
        ],
    },
];

fn colour(rgb: [u8; 3]) -> Vec<Value> {
    rgb.into_iter().map(Value::U8).collect()
}

fn push_if_bound(
    calls: &mut Vec<PlannedCall>,
    arities: &BTreeMap<&'static str, usize>,
    step: &Step,
    source: &[Value],
) {
    let params = step.args.build(source);
    if arities.get(step.method) == Some(&params.len()) {
        calls.push(PlannedCall::new(step.method, params));
    }
}

/// Decides which calls satisfy `effect(params)` on a surface with the given
/// method arities. An empty plan means the message is dropped.
pub fn plan(
    effect: &str,
    params: &[Value],
    arities: &BTreeMap<&'static str, usize>,
) -> Vec<PlannedCall> {
    match arities.get(effect) {
        Some(&arity) if arity == params.len() => {
            return vec![PlannedCall::new(effect, params.to_vec())];
        }
        Some(&arity) => {
            if effect == "setStatic" {
                let params = if arity == 0 {
                    Vec::new()
                } else {
                    colour(FALLBACK_COLOUR)
                };
                if params.len() == arity {
                    return vec![PlannedCall::new(effect, params)];
                }
            }
            return Vec::new();
        }
        None => {}
    }

    let Some(rule) = RULES.iter().find(|rule| rule.effect == effect) else {
        return Vec::new();
    };

    let mut calls = Vec::new();
    if rule.activate {
        for step in ACTIVATE {
            push_if_bound(&mut calls, arities, step, params);
        }
    }
    for step in rule.steps {
        push_if_bound(&mut calls, arities, step, params);
    }
    calls
}
