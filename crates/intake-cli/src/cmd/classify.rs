use crate::output::{print_json, print_table};
use anyhow::Context;
use intake_core::{Alliance, AllianceColor, ColorClassifier, Config};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Classification {
    hue: Option<f64>,
    detected: Option<Alliance>,
    class: AllianceColor,
}

/// `none` (any case) stands for "no object in front of the sensor".
fn parse_hue(raw: &str) -> anyhow::Result<Option<f64>> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let hue: f64 = raw
        .parse()
        .with_context(|| format!("invalid hue '{raw}': expected a number or 'none'"))?;
    Ok(Some(hue))
}

pub fn run(
    config: &Config,
    hues: &[String],
    alliance: Option<Alliance>,
    json: bool,
) -> anyhow::Result<()> {
    let alliance = alliance.unwrap_or(config.alliance);
    let classifier = ColorClassifier::new(config.colors.clone());

    let results = hues
        .iter()
        .map(|raw| {
            let hue = parse_hue(raw)?;
            Ok(Classification {
                hue,
                detected: hue.and_then(|h| classifier.detect(h)),
                class: classifier.classify(hue, alliance),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if json {
        return print_json(&results);
    }

    let rows = results
        .iter()
        .map(|c| {
            vec![
                c.hue.map_or_else(|| "none".to_string(), |h| h.to_string()),
                c.detected.map_or_else(|| "-".to_string(), |a| a.to_string()),
                c.class.to_string(),
            ]
        })
        .collect();
    println!("alliance: {alliance}");
    print_table(&["HUE", "DETECTED", "CLASS"], rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hue_accepts_none_and_numbers() {
        assert_eq!(parse_hue("none").unwrap(), None);
        assert_eq!(parse_hue("NONE").unwrap(), None);
        assert_eq!(parse_hue("330").unwrap(), Some(330.0));
        assert_eq!(parse_hue("12.5").unwrap(), Some(12.5));
        assert!(parse_hue("red").is_err());
    }
}
