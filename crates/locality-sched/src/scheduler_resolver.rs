use std::collections::BTreeMap;
use std::str::FromStr;

use itertools::Itertools;

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::schedulers::dmda::DmdaScheduler;
use crate::schedulers::greedy::GreedyScheduler;
use crate::schedulers::hfp::HfpScheduler;
use crate::schedulers::hfp_heter::HfpHeterScheduler;

/// Scheduler name with optional parameters, written as `Name` or `Name[key=value,...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerParams {
    name: String,
    params: BTreeMap<String, String>,
}

impl SchedulerParams {
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        let Some(open) = s.find('[') else {
            return Some(Self {
                name: s.to_string(),
                params: BTreeMap::new(),
            });
        };
        if !s.ends_with(']') {
            return None;
        }

        let mut params = BTreeMap::new();
        let body = &s[open + 1..s.len() - 1];
        if !body.trim().is_empty() {
            for param in body.split(',') {
                let pos = param.find('=')?;
                params.insert(param[..pos].trim().to_string(), param[pos + 1..].trim().to_string());
            }
        }

        Some(Self {
            name: s[..open].to_string(),
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies parameter overrides on top of `base` and validates the result.
    ///
    /// Recognized keys are `num_proc`, `block_size`, `max_mem` (a number, or `inf` for no bound) and `fetch_cost`.
    pub fn apply_to(&self, base: &SchedulerConfig) -> Result<SchedulerConfig> {
        let mut config = base.clone();
        for (key, value) in self.params.iter() {
            match key.as_str() {
                "num_proc" => config.num_proc = self.parse_value(key, value)?,
                "block_size" => config.cache_block_size = self.parse_value(key, value)?,
                "max_mem" => {
                    config.max_mem = match value.as_str() {
                        "inf" | "none" => None,
                        _ => Some(self.parse_value(key, value)?),
                    }
                }
                "fetch_cost" => config.fetch_cost = self.parse_value(key, value)?,
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "unknown parameter {key} for scheduler {}",
                        self.name
                    )))
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn parse_value<T: FromStr>(&self, key: &str, value: &str) -> Result<T> {
        value.parse().map_err(|_| {
            Error::InvalidConfig(format!("can't parse {key}={value} for scheduler {}", self.name))
        })
    }
}

impl std::fmt::Display for SchedulerParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(
                f,
                "{}[{}]",
                self.name,
                self.params.iter().map(|(k, v)| format!("{k}={v}")).join(",")
            )
        }
    }
}

pub fn default_scheduler_resolver(params: &SchedulerParams, base: &SchedulerConfig) -> Result<Box<dyn Scheduler>> {
    let config = params.apply_to(base)?;
    match params.name() {
        "Greedy" => Ok(Box::new(GreedyScheduler::new(config)?)),
        "Dmda" => Ok(Box::new(DmdaScheduler::new(config)?)),
        "Hfp" => Ok(Box::new(HfpScheduler::new(config)?)),
        "HfpHeter" => Ok(Box::new(HfpHeterScheduler::new(config)?)),
        name => Err(Error::InvalidConfig(format!("unknown scheduler {name}"))),
    }
}
