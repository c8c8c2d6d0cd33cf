//! Built-in contracts: `url`, `returns`, `scrapes`

use crate::contracts::{Contract, ContractViolation};
use crate::spider::{Callback, Output};

/// `url <address>`: the callback runs without error on the declared URL.
///
/// Applies to every callback that declares a URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlContract;

impl Contract for UrlContract {
    fn name(&self) -> &str {
        "url"
    }

    fn applies_to(&self, callback: &Callback) -> bool {
        callback.url().is_some()
    }
}

/// `returns <items|item|requests|request> [min [max]]`
#[derive(Debug, Default, Clone, Copy)]
pub struct ReturnsContract;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Items,
    Requests,
}

impl ReturnsContract {
    fn parse_args(args: &[String]) -> Result<(Kind, usize, Option<usize>), ContractViolation> {
        if args.is_empty() || args.len() > 3 {
            return Err(ContractViolation::invalid(
                "returns",
                format!("expected 1 to 3 arguments, got {}", args.len()),
            ));
        }

        let kind = match args[0].as_str() {
            "item" | "items" => Kind::Items,
            "request" | "requests" => Kind::Requests,
            other => {
                return Err(ContractViolation::invalid(
                    "returns",
                    format!("unknown kind '{}'", other),
                ))
            }
        };

        let bound = |raw: &String| {
            raw.parse::<usize>().map_err(|_| {
                ContractViolation::invalid("returns", format!("bound '{}' is not a number", raw))
            })
        };

        let min = args.get(1).map(bound).transpose()?.unwrap_or(1);
        let max = args.get(2).map(bound).transpose()?;
        Ok((kind, min, max))
    }
}

impl Contract for ReturnsContract {
    fn name(&self) -> &str {
        "returns"
    }

    fn post_process(&self, args: &[String], output: &[Output]) -> Result<(), ContractViolation> {
        let (kind, min, max) = Self::parse_args(args)?;

        let occurrences = output
            .iter()
            .filter(|o| match kind {
                Kind::Items => o.is_item(),
                Kind::Requests => o.is_request(),
            })
            .count();

        let within = occurrences >= min && max.map_or(true, |max| occurrences <= max);
        if within {
            return Ok(());
        }

        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{}..{}", min, max),
            None => format!("{}..", min),
        };
        Err(ContractViolation::fail(format!(
            "Returned {} {}, expected {}",
            occurrences, args[0], expected
        )))
    }
}

/// `scrapes <field>...`: every returned item carries all listed fields
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrapesContract;

impl Contract for ScrapesContract {
    fn name(&self) -> &str {
        "scrapes"
    }

    fn post_process(&self, args: &[String], output: &[Output]) -> Result<(), ContractViolation> {
        for out in output {
            let Output::Item(item) = out else { continue };

            let missing: Vec<&str> = args
                .iter()
                .filter(|field| !item.contains_key(field.as_str()))
                .map(String::as_str)
                .collect();

            if !missing.is_empty() {
                return Err(ContractViolation::fail(format!(
                    "Missing fields: {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}
