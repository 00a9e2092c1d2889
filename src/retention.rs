//! Retention schema rules.
//!
//! An ordered rules file decides, per metric name, how many archive tiers
//! a series gets and how they are shaped. The format follows the classic
//! storage-schemas layout:
//!
//! ```text
//! [apache]
//! pattern = ^servers\.apache\.
//! retentions = 10s:8d:2h,5m:90d:6h
//!
//! [default]
//! pattern = .*
//! retentions = 60s:35d:2h
//! ```
//!
//! Each retention is `seconds_per_point:ttl[:chunk_span]`, every field
//! either raw seconds or a duration with an `s`/`m`/`h`/`d`/`w`/`y`
//! suffix. The first rule whose pattern matches the metric name wins; a
//! catch-all default is appended when the file doesn't end in one.

use crate::store::MONTH_SECONDS;
use crate::{Error, Result};
use regex::Regex;

/// Chunk span used when a retention doesn't name one.
pub const DEFAULT_CHUNK_SPAN: u32 = 2 * 60 * 60;

const DEFAULT_RETENTIONS: &str = "60s:35d:2h";

/// How an aggregate tier rolls raw points up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggMethod {
    Avg,
    Sum,
    Min,
    Max,
    /// Last value wins.
    Lst,
}

impl AggMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AggMethod::Avg => "avg",
            AggMethod::Sum => "sum",
            AggMethod::Min => "min",
            AggMethod::Max => "max",
            AggMethod::Lst => "lst",
        }
    }
}

impl std::str::FromStr for AggMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<AggMethod> {
        match s {
            "avg" => Ok(AggMethod::Avg),
            "sum" => Ok(AggMethod::Sum),
            "min" => Ok(AggMethod::Min),
            "max" => Ok(AggMethod::Max),
            "lst" => Ok(AggMethod::Lst),
            other => Err(Error::BadRequest(format!(
                "unknown aggregation method {other:?}"
            ))),
        }
    }
}

/// Storage key of an aggregate tier: raw series id, rollup method, and
/// the tier's resolution.
pub fn agg_key(id: &str, method: AggMethod, seconds_per_point: u32) -> String {
    format!("{id}_{}_{seconds_per_point}", method.as_str())
}

/// One archive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub seconds_per_point: u32,
    pub num_points: u32,
    pub chunk_span: u32,
}

impl Retention {
    /// Parse `spp:ttl[:chunk_span]`.
    pub fn parse(raw: &str) -> Result<Retention> {
        let mut parts = raw.split(':');
        let spp = parts
            .next()
            .ok_or_else(|| Error::Config(format!("empty retention in {raw:?}")))?;
        let ttl = parts
            .next()
            .ok_or_else(|| Error::Config(format!("retention {raw:?} is missing its ttl")))?;
        let span = parts.next();
        if parts.next().is_some() {
            return Err(Error::Config(format!(
                "retention {raw:?} has too many fields"
            )));
        }

        let seconds_per_point = parse_duration(spp)?;
        if seconds_per_point == 0 {
            return Err(Error::Config(format!(
                "retention {raw:?} has a zero resolution"
            )));
        }
        let ttl = parse_duration(ttl)?;
        if ttl < seconds_per_point {
            return Err(Error::Config(format!(
                "retention {raw:?} keeps less than one point"
            )));
        }
        let chunk_span = match span {
            Some(s) => parse_duration(s)?,
            None => DEFAULT_CHUNK_SPAN,
        };

        Ok(Retention {
            seconds_per_point,
            num_points: ttl / seconds_per_point,
            chunk_span,
        })
    }

    /// Seconds this tier keeps data for.
    pub fn ttl(&self) -> u32 {
        self.seconds_per_point * self.num_points
    }

    /// Chunk spans must divide the storage row span, otherwise the chunk
    /// preceding a query's start could live outside the start's row.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_span == 0 || MONTH_SECONDS % self.chunk_span != 0 {
            return Err(Error::Config(format!(
                "chunk span {} does not divide the {MONTH_SECONDS}s row span",
                self.chunk_span
            )));
        }
        if self.chunk_span < self.seconds_per_point {
            return Err(Error::Config(format!(
                "chunk span {} is shorter than the point interval {}",
                self.chunk_span, self.seconds_per_point
            )));
        }
        Ok(())
    }
}

/// One named rule: a name pattern and the tiers it grants.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub pattern: Regex,
    pub retentions: Vec<Retention>,
}

impl Schema {
    /// TTL of the longest tier, used for the persisted chunk's TTL.
    pub fn ttl(&self) -> u32 {
        self.retentions.iter().map(Retention::ttl).max().unwrap_or(0)
    }
}

/// The ordered rule set.
#[derive(Debug, Clone)]
pub struct Schemas {
    schemas: Vec<Schema>,
}

impl Schemas {
    /// Parse the rules file. Every tier of every rule is validated, and a
    /// catch-all default is appended when the last rule isn't one.
    pub fn parse(text: &str) -> Result<Schemas> {
        let mut schemas: Vec<Schema> = Vec::new();
        let mut section: Option<String> = None;
        let mut pattern: Option<String> = None;
        let mut retentions: Option<String> = None;

        let flush = |section: &mut Option<String>,
                         pattern: &mut Option<String>,
                         retentions: &mut Option<String>,
                         schemas: &mut Vec<Schema>|
         -> Result<()> {
            let Some(name) = section.take() else {
                return Ok(());
            };
            let pattern = pattern.take().ok_or_else(|| {
                Error::Config(format!("schema rule [{name}] has no pattern"))
            })?;
            let retentions = retentions.take().ok_or_else(|| {
                Error::Config(format!("schema rule [{name}] has no retentions"))
            })?;
            schemas.push(Schema {
                name,
                pattern: Regex::new(&pattern)?,
                retentions: retentions
                    .split(',')
                    .map(|r| Retention::parse(r.trim()))
                    .collect::<Result<_>>()?,
            });
            Ok(())
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                flush(&mut section, &mut pattern, &mut retentions, &mut schemas)?;
                section = Some(name.to_string());
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::Config(format!(
                    "unparseable schema rule line {line:?}"
                )));
            };
            match key.trim() {
                "pattern" => pattern = Some(value.trim().to_string()),
                "retentions" => retentions = Some(value.trim().to_string()),
                other => {
                    return Err(Error::Config(format!(
                        "unknown schema rule key {other:?}"
                    )))
                }
            }
        }
        flush(&mut section, &mut pattern, &mut retentions, &mut schemas)?;

        let needs_default = schemas
            .last()
            .map_or(true, |s| s.pattern.as_str() != ".*");
        if needs_default {
            schemas.push(Schema {
                name: "default".to_string(),
                pattern: Regex::new(".*").expect("static pattern"),
                retentions: DEFAULT_RETENTIONS
                    .split(',')
                    .map(Retention::parse)
                    .collect::<Result<_>>()?,
            });
        }

        let out = Schemas { schemas };
        out.validate()?;
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        for schema in &self.schemas {
            if schema.retentions.is_empty() {
                return Err(Error::Config(format!(
                    "schema rule [{}] has no tiers",
                    schema.name
                )));
            }
            for retention in &schema.retentions {
                retention.validate()?;
            }
        }
        Ok(())
    }

    /// First rule whose pattern matches `name`. The trailing default
    /// guarantees a match.
    pub fn match_name(&self, name: &str) -> (usize, &Schema) {
        for (i, schema) in self.schemas.iter().enumerate() {
            if schema.pattern.is_match(name) {
                return (i, schema);
            }
        }
        let last = self.schemas.len() - 1;
        (last, &self.schemas[last])
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Schema> {
        self.schemas.get(index)
    }
}

/// Seconds from a raw count or a suffixed duration.
fn parse_duration(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Config("empty duration".to_string()));
    }
    if let Ok(secs) = raw.parse::<u32>() {
        return Ok(secs);
    }

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| Error::Config(format!("unparseable duration {raw:?}")))?;
    let (count, unit) = raw.split_at(split);
    let count: u32 = count
        .parse()
        .map_err(|_| Error::Config(format!("unparseable duration {raw:?}")))?;
    let unit_secs: u32 = match unit {
        "s" | "sec" => 1,
        "m" | "min" => 60,
        "h" | "hour" => 60 * 60,
        "d" | "day" => 60 * 60 * 24,
        "w" | "week" => 60 * 60 * 24 * 7,
        "y" | "year" => 60 * 60 * 24 * 365,
        other => {
            return Err(Error::Config(format!(
                "unknown duration unit {other:?} in {raw:?}"
            )))
        }
    };
    count
        .checked_mul(unit_secs)
        .ok_or_else(|| Error::Config(format!("duration {raw:?} overflows")))
}
