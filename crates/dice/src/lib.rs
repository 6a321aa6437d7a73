//! Dice expression parsing and rolling.
//!
//! Pure and side-effect-free apart from the RNG: parsing never touches a
//! store, and rolling takes any `rand::Rng` so tests can pin the seed.
//!
//! Grammar: `[count]d<sides>[+|-modifier]`, case-insensitive, whitespace
//! ignored. A missing count means one die. Count must be at least 1 and
//! sides at least 2.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use thiserror::Error;

static DICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([0-9]*)d([0-9]+)([+-][0-9]+)?$").expect("dice regex"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice expression: {0}")]
    Invalid(String),

    #[error("Die count must be at least 1: {0}")]
    CountTooSmall(String),

    #[error("Die sides must be at least 2: {0}")]
    SidesTooSmall(String),
}

/// A parsed dice expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

impl DiceExpr {
    /// Smallest total this expression can produce.
    pub fn min_total(&self) -> i64 {
        i64::from(self.count) + self.modifier
    }

    /// Largest total this expression can produce.
    pub fn max_total(&self) -> i64 {
        i64::from(self.count) * i64::from(self.sides) + self.modifier
    }
}

/// The outcome of one roll: the total plus a display breakdown like
/// `"2d6+3: [4, 2]+3=9"` (a bare integer instead of the list when a single
/// die was rolled, modifier omitted when zero).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub result: i64,
    pub breakdown: String,
}

/// Parse a dice expression, stripping whitespace first.
pub fn parse(expr: &str) -> Result<DiceExpr, DiceError> {
    let cleaned: String = expr.chars().filter(|c| !c.is_whitespace()).collect();

    let caps = DICE_RE
        .captures(&cleaned)
        .ok_or_else(|| DiceError::Invalid(expr.to_string()))?;

    let count_str = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| DiceError::Invalid(expr.to_string()))?
    };
    let sides: u32 = caps[2]
        .parse()
        .map_err(|_| DiceError::Invalid(expr.to_string()))?;
    let modifier: i64 = caps
        .get(3)
        .map(|m| m.as_str().parse())
        .transpose()
        .map_err(|_| DiceError::Invalid(expr.to_string()))?
        .unwrap_or(0);

    if count < 1 {
        return Err(DiceError::CountTooSmall(expr.to_string()));
    }
    if sides < 2 {
        return Err(DiceError::SidesTooSmall(expr.to_string()));
    }

    Ok(DiceExpr {
        count,
        sides,
        modifier,
    })
}

/// Parse and roll with the given RNG.
pub fn roll_with<R: Rng + ?Sized>(expr: &str, rng: &mut R) -> Result<RollOutcome, DiceError> {
    let parsed = parse(expr)?;

    let rolls: Vec<i64> = (0..parsed.count)
        .map(|_| rng.gen_range(1..=i64::from(parsed.sides)))
        .collect();
    let total: i64 = rolls.iter().sum::<i64>() + parsed.modifier;

    let rolls_str = if rolls.len() == 1 {
        rolls[0].to_string()
    } else {
        let parts: Vec<String> = rolls.iter().map(|r| r.to_string()).collect();
        format!("[{}]", parts.join(", "))
    };

    let breakdown = match parsed.modifier {
        m if m > 0 => format!("{expr}: {rolls_str}+{m}={total}"),
        m if m < 0 => format!("{expr}: {rolls_str}{m}={total}"),
        _ => format!("{expr}: {rolls_str}={total}"),
    };

    Ok(RollOutcome {
        result: total,
        breakdown,
    })
}

/// Parse and roll with the thread-local RNG.
pub fn roll(expr: &str) -> Result<RollOutcome, DiceError> {
    roll_with(expr, &mut rand::thread_rng())
}
