use std::path::Path;

use anyhow::bail;
use indoc::indoc;

use crate::Config;

/// Block kind names accepted in per-kind option maps. `chat` is a legacy
/// alias for `user` and is folded together with it by the selector.
const KIND_NAMES: [&str; 8] = [
    "system",
    "developer",
    "user",
    "chat",
    "assistant",
    "tool",
    "doc",
    "constraint",
];

const FRACTION_SUM_TOLERANCE: f32 = 1e-3;

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let limits = &config.limits;

    if limits.target_budget_tokens == 0 {
        bail!("limits.target_budget_tokens must be greater than zero");
    }

    if limits.safety_margin_tokens >= limits.target_budget_tokens {
        bail!(
            "limits.safety_margin_tokens ({}) must be smaller than limits.target_budget_tokens ({})",
            limits.safety_margin_tokens,
            limits.target_budget_tokens
        );
    }

    let semantic = &config.semantic;

    if !(0.0..=1.0).contains(&semantic.mmr_lambda) {
        bail!(
            "semantic.mmr_lambda must be within [0.0, 1.0], got {}",
            semantic.mmr_lambda
        );
    }

    if semantic.recency_tau <= 0.0 {
        bail!("semantic.recency_tau must be positive, got {}", semantic.recency_tau);
    }

    validate_kind_keys("semantic.type_fractions", semantic.type_fractions.keys())?;
    validate_kind_keys("semantic.vector_topk", semantic.vector_topk.keys())?;

    let fraction_sum: f32 = semantic.type_fractions.values().sum();

    if !semantic.type_fractions.is_empty()
        && (fraction_sum - 1.0).abs() > FRACTION_SUM_TOLERANCE
    {
        bail!(indoc! {r#"
            semantic.type_fractions must sum to 1.0. Example:

              [semantic.type_fractions]
              doc = 0.4
              assistant = 0.3
              tool = 0.2
              user = 0.1
        "#});
    }

    for (source, trust) in &semantic.source_trust {
        if !(0.0..=1.0).contains(trust) {
            bail!("semantic.source_trust.{source} must be within [0.0, 1.0], got {trust}");
        }
    }

    let compression = &config.compression;

    if !(0.0..1.0).contains(&compression.ratio) || compression.ratio == 0.0 {
        bail!(
            "compression.ratio must be within (0.0, 1.0), got {}",
            compression.ratio
        );
    }

    if !(0.0..=1.0).contains(&compression.faithfulness_threshold) {
        bail!(
            "compression.faithfulness_threshold must be within [0.0, 1.0], got {}",
            compression.faithfulness_threshold
        );
    }

    if config.embedding.dimensions == 0 {
        bail!("embedding.dimensions must be greater than zero");
    }

    if config.embedding.base_url.is_some() && config.embedding.api_key.is_none() {
        log::warn!("embedding.base_url is set without embedding.api_key; requests go unauthenticated");
    }

    Ok(())
}

fn validate_kind_keys<'a>(
    option: &str,
    keys: impl Iterator<Item = &'a String>,
) -> anyhow::Result<()> {
    for key in keys {
        if !KIND_NAMES.contains(&key.as_str()) {
            bail!(
                "{option} contains unknown block kind '{key}'; expected one of {}",
                KIND_NAMES.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_snapshot;

    use crate::Config;

    fn validate(config_str: &str) -> anyhow::Result<()> {
        let config: Config = toml::from_str(config_str).unwrap();
        super::validate(&config)
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate("").is_ok());
    }

    #[test]
    fn rejects_margin_swallowing_the_budget() {
        let err = validate(indoc! {r#"
            [limits]
            target_budget_tokens = 100
            safety_margin_tokens = 100
        "#})
        .unwrap_err();

        assert_snapshot!(err.to_string(), @"limits.safety_margin_tokens (100) must be smaller than limits.target_budget_tokens (100)");
    }

    #[test]
    fn rejects_fractions_not_summing_to_one() {
        let err = validate(indoc! {r#"
            [semantic.type_fractions]
            doc = 0.5
            assistant = 0.2
        "#})
        .unwrap_err();

        assert_snapshot!(err.to_string(), @r#"
        semantic.type_fractions must sum to 1.0. Example:

          [semantic.type_fractions]
          doc = 0.4
          assistant = 0.3
          tool = 0.2
          user = 0.1
        "#);
    }

    #[test]
    fn accepts_chat_as_user_alias() {
        let result = validate(indoc! {r#"
            [semantic.type_fractions]
            doc = 0.5
            chat = 0.5
        "#});

        assert!(result.is_ok());
    }

    #[test]
    fn rejects_unknown_fraction_kind() {
        let err = validate(indoc! {r#"
            [semantic.type_fractions]
            widget = 1.0
        "#})
        .unwrap_err();

        assert!(
            err.to_string()
                .contains("semantic.type_fractions contains unknown block kind 'widget'")
        );
    }

    #[test]
    fn rejects_out_of_range_lambda() {
        let err = validate(indoc! {r#"
            [semantic]
            mmr_lambda = 1.5
        "#})
        .unwrap_err();

        assert_snapshot!(err.to_string(), @"semantic.mmr_lambda must be within [0.0, 1.0], got 1.5");
    }

    #[test]
    fn rejects_degenerate_compression_ratio() {
        let err = validate(indoc! {r#"
            [compression]
            ratio = 1.0
        "#})
        .unwrap_err();

        assert_snapshot!(err.to_string(), @"compression.ratio must be within (0.0, 1.0), got 1");
    }
}
