use serde::{Deserialize, Deserializer, Serialize};

/// AI expert profile (a configured reply prompt) as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expert {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Backend sends either `true`/`false` or `1`/`0`
    #[serde(default, deserialize_with = "bool_or_int", alias = "isActive")]
    pub is_active: bool,
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        None => false,
    })
}

/// Expert used when none is configured: the active one, else the first listed.
pub fn default_expert(experts: &[Expert]) -> Option<&Expert> {
    experts
        .iter()
        .find(|e| e.is_active)
        .or_else(|| experts.first())
}
