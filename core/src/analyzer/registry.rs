//! The fixed host API and event signature tables (spec.md §4.3, recorded as
//! an explicit decision in `SPEC_FULL.md` since no upstream source survived
//! to read the exact names from). Import indices are the order these
//! functions appear here — the emitter relies on that order being stable.

use crate::types::Type;

/// One entry of the fixed host import registry.
pub struct ApiFunc {
    pub name: &'static str,
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
}

pub fn api_registry() -> Vec<ApiFunc> {
    use Type::*;
    vec![
        ApiFunc { name: "drive", params: vec![Float, Angle], returns: vec![] },
        ApiFunc { name: "stop", params: vec![], returns: vec![] },
        ApiFunc { name: "turn", params: vec![Angle], returns: vec![] },
        ApiFunc { name: "fire", params: vec![Float], returns: vec![] },
        ApiFunc { name: "aimGun", params: vec![Angle], returns: vec![] },
        ApiFunc { name: "gunHeading", params: vec![], returns: vec![Angle] },
        ApiFunc { name: "scan", params: vec![], returns: vec![] },
        ApiFunc { name: "aimRadar", params: vec![Angle], returns: vec![] },
        ApiFunc { name: "radarHeading", params: vec![], returns: vec![Angle] },
        ApiFunc { name: "health", params: vec![], returns: vec![Float] },
        ApiFunc { name: "x", params: vec![], returns: vec![Float] },
        ApiFunc { name: "y", params: vec![], returns: vec![Float] },
        ApiFunc { name: "heading", params: vec![], returns: vec![Angle] },
        ApiFunc { name: "speed", params: vec![], returns: vec![Float] },
        ApiFunc { name: "arenaWidth", params: vec![], returns: vec![Float] },
        ApiFunc { name: "arenaHeight", params: vec![], returns: vec![Float] },
        ApiFunc { name: "random", params: vec![], returns: vec![Float] },
        ApiFunc { name: "randomInt", params: vec![Int], returns: vec![Int] },
        ApiFunc { name: "sin", params: vec![Angle], returns: vec![Float] },
        ApiFunc { name: "cos", params: vec![Angle], returns: vec![Float] },
        ApiFunc { name: "sqrt", params: vec![Float], returns: vec![Float] },
        ApiFunc { name: "abs", params: vec![Float], returns: vec![Float] },
        ApiFunc { name: "debugInt", params: vec![Int], returns: vec![] },
        ApiFunc { name: "debugFloat", params: vec![Float], returns: vec![] },
        ApiFunc { name: "debugBool", params: vec![Bool], returns: vec![] },
    ]
}

/// The fixed event → parameter-type signature table.
pub fn event_signature(name: &str) -> Option<Vec<Type>> {
    use Type::*;
    Some(match name {
        "scan" => vec![Float, Angle],
        "scanned" => vec![Angle],
        "hit" => vec![Float, Angle],
        "bulletHit" => vec![Int],
        "wallHit" => vec![Angle],
        "robotHit" => vec![Angle],
        "bulletMiss" => vec![],
        "robotDeath" => vec![Int],
        _ => return None,
    })
}
